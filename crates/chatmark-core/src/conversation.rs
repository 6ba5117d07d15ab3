//! Ordered message list owned by a chat session.
//!
//! Every mutation is a single call (push, update by id, remove by id), so a
//! reader never sees a message half way through a transition.

use chatmark_providers::{Message, MessageRole};

use crate::message::{ChatMessage, Sender};

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its id.
    pub fn push(&mut self, message: ChatMessage) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Apply `f` to the message with `id`. Returns false if there is none.
    pub fn update<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut ChatMessage),
    {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                f(message);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<ChatMessage> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(idx))
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Provider-facing history: user turns and finalized replies, in order.
    ///
    /// Greetings, errors and anything still streaming are not part of what
    /// the model has seen.
    pub fn history(&self, system_prompt: Option<&str>) -> Vec<Message> {
        let system = system_prompt
            .filter(|p| !p.trim().is_empty())
            .map(|p| Message::new(MessageRole::System, p.to_string()));

        system
            .into_iter()
            .chain(self.messages.iter().filter_map(|m| match m.sender {
                Sender::User => Some(Message::new(MessageRole::User, m.text.clone())),
                Sender::Bot if m.is_finalized_reply() => {
                    Some(Message::new(MessageRole::Assistant, m.text.clone()))
                }
                _ => None,
            }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_get_update_remove() {
        let mut conv = Conversation::new();
        let id = conv.push(ChatMessage::user("hello"));

        assert_eq!(conv.get(&id).map(|m| m.text.as_str()), Some("hello"));
        assert!(conv.update(&id, |m| m.text.push('!')));
        assert_eq!(conv.get(&id).unwrap().text, "hello!");

        assert!(conv.remove(&id).is_some());
        assert!(conv.get(&id).is_none());
        assert!(!conv.update(&id, |_| {}));
        assert!(conv.remove(&id).is_none());
        assert!(conv.is_empty());
    }

    #[test]
    fn test_order_is_preserved() {
        let mut conv = Conversation::new();
        let a = conv.push(ChatMessage::user("a"));
        let b = conv.push(ChatMessage::greeting("b", "b".to_string()));
        let c = conv.push(ChatMessage::error("c"));
        conv.remove(&b);

        let ids: Vec<&str> = conv.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![a.as_str(), c.as_str()]);
        assert_eq!(conv.last().unwrap().id, c);
    }

    #[test]
    fn test_history_skips_greetings_errors_and_streaming() {
        let mut conv = Conversation::new();
        conv.push(ChatMessage::greeting("Hello!", "Hello!".to_string()));
        conv.push(ChatMessage::user("q1"));
        let mut reply = ChatMessage::bot_placeholder();
        reply.text = "a1".to_string();
        reply.html = Some("a1".to_string());
        reply.is_streaming = false;
        conv.push(reply);
        conv.push(ChatMessage::user("q2"));
        conv.push(ChatMessage::error("failed"));
        conv.push(ChatMessage::bot_placeholder());

        let history = conv.history(Some("Be brief."));
        let roles: Vec<MessageRole> = history.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User
            ]
        );
        assert_eq!(history[2].content, "a1");

        assert_eq!(conv.history(Some("  ")).len(), 3);
        assert_eq!(conv.history(None).len(), 3);
    }
}
