//! Chat message data model.

use chatmark_render::escape_html;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who a message is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
    Error,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
            Sender::Error => "error",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot-message",
            Sender::Error => "err",
        }
    }
}

/// One entry of a conversation.
///
/// `text` is the raw accumulated text. `html` is only set once a markdown
/// message has been finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub is_streaming: bool,
    pub is_markdown: bool,
    pub html: Option<String>,
    /// Seeded greeting, not part of what the model has said
    #[serde(default)]
    pub is_greeting: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    fn new(sender: Sender, text: String, is_markdown: bool, is_streaming: bool) -> Self {
        Self {
            id: new_message_id(sender),
            text,
            sender,
            is_streaming,
            is_markdown,
            html: None,
            is_greeting: false,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: &str) -> Self {
        Self::new(Sender::User, text.to_string(), false, false)
    }

    /// A greeting whose markdown was rendered up front
    pub fn greeting(text: &str, html: String) -> Self {
        let mut message = Self::new(Sender::Bot, text.to_string(), true, false);
        message.html = Some(html);
        message.is_greeting = true;
        message
    }

    /// The empty, streaming bot message a reply grows into
    pub fn bot_placeholder() -> Self {
        Self::new(Sender::Bot, String::new(), true, true)
    }

    pub fn error(text: &str) -> Self {
        Self::new(Sender::Error, text.to_string(), false, false)
    }

    /// True for a bot reply that finished streaming and carries its render.
    pub fn is_finalized_reply(&self) -> bool {
        self.sender == Sender::Bot
            && self.is_markdown
            && !self.is_streaming
            && !self.is_greeting
            && self.html.is_some()
    }

    /// HTML to display for this message.
    ///
    /// Finalized markdown replies and greetings use their render. Everything
    /// else (user text, errors, text still streaming) is escaped plain text
    /// with newlines turned into `<br>`.
    pub fn display_html(&self) -> String {
        match &self.html {
            Some(html) if self.is_markdown && !self.is_streaming => html.clone(),
            _ => escape_html(&self.text).replace('\n', "<br>"),
        }
    }
}

fn new_message_id(sender: Sender) -> String {
    format!("{}-{}", sender.id_prefix(), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_prefixes() {
        assert!(ChatMessage::user("hi").id.starts_with("user-"));
        assert!(ChatMessage::bot_placeholder().id.starts_with("bot-message-"));
        assert!(ChatMessage::greeting("hello", "hello".to_string())
            .id
            .starts_with("bot-message-"));
        assert!(ChatMessage::error("oops").id.starts_with("err-"));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ChatMessage::user("x");
        let b = ChatMessage::user("x");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_placeholder_shape() {
        let msg = ChatMessage::bot_placeholder();
        assert_eq!(msg.sender, Sender::Bot);
        assert!(msg.text.is_empty());
        assert!(msg.is_streaming);
        assert!(msg.is_markdown);
        assert!(msg.html.is_none());
        assert!(!msg.is_finalized_reply());
    }

    #[test]
    fn test_display_html_escapes_plain_text() {
        let msg = ChatMessage::user("<b>hi</b>\n**not bold**");
        assert_eq!(
            msg.display_html(),
            "&lt;b&gt;hi&lt;/b&gt;<br>**not bold**"
        );
    }

    #[test]
    fn test_display_html_uses_render_once_finalized() {
        let mut msg = ChatMessage::bot_placeholder();
        msg.text = "**x**".to_string();
        msg.html = Some("<strong>x</strong>".to_string());
        // Still streaming: raw text only
        assert_eq!(msg.display_html(), "**x**");

        msg.is_streaming = false;
        assert_eq!(msg.display_html(), "<strong>x</strong>");
        assert!(msg.is_finalized_reply());
    }

    #[test]
    fn test_greeting_displays_render_but_is_not_a_reply() {
        let msg = ChatMessage::greeting("Hello **there**", "Hello <strong>there</strong>".to_string());
        assert_eq!(msg.sender, Sender::Bot);
        assert!(msg.is_markdown);
        assert!(!msg.is_streaming);
        assert_eq!(msg.display_html(), "Hello <strong>there</strong>");
        assert!(!msg.is_finalized_reply());
    }

    #[test]
    fn test_sender_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Sender::Error).unwrap(), "\"error\"");
        assert_eq!(Sender::Bot.as_str(), "bot");
    }
}
