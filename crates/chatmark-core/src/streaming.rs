//! Lifecycle of one streamed bot reply.
//!
//! ```text
//! Pending --begin--> Streaming --complete--> Finalized
//!    |                   |
//!    +---fail/cancel-----+--complete(empty)/fail/cancel--> Discarded
//! ```
//!
//! While streaming, deltas only touch the placeholder's raw text. The
//! markdown renderer runs exactly once, when the reply completes.

use std::fmt;

use chatmark_render::Renderer;
use tracing::{debug, trace};

use crate::conversation::Conversation;
use crate::error::StreamError;
use crate::message::ChatMessage;

const FAILURE_TEXT: &str = "Sorry, something went wrong while generating a response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    Pending,
    Streaming,
    Finalized,
    Discarded,
}

impl fmt::Display for ReplyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplyState::Pending => "pending",
            ReplyState::Streaming => "streaming",
            ReplyState::Finalized => "finalized",
            ReplyState::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

/// Result of completing a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The placeholder now holds the rendered reply
    Finalized(String),
    /// Nothing but whitespace arrived; the placeholder was removed
    Empty(String),
}

/// User-facing text for a failed generation.
pub fn failure_text(detail: &str) -> String {
    let detail = detail.trim();
    if detail.is_empty() {
        FAILURE_TEXT.to_string()
    } else {
        format!("{} Details: {}", FAILURE_TEXT, detail)
    }
}

#[derive(Debug)]
pub struct StreamingReply {
    state: ReplyState,
    placeholder_id: Option<String>,
    buffer: String,
}

impl Default for StreamingReply {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingReply {
    pub fn new() -> Self {
        Self {
            state: ReplyState::Pending,
            placeholder_id: None,
            buffer: String::new(),
        }
    }

    pub fn state(&self) -> ReplyState {
        self.state
    }

    pub fn placeholder_id(&self) -> Option<&str> {
        self.placeholder_id.as_deref()
    }

    /// Text accumulated so far
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    fn expect_state(
        &self,
        allowed: &[ReplyState],
        operation: &'static str,
    ) -> Result<(), StreamError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(StreamError::IllegalTransition {
                from: self.state,
                operation,
            })
        }
    }

    fn streaming_id(&self) -> Result<String, StreamError> {
        self.placeholder_id
            .clone()
            .ok_or(StreamError::IllegalTransition {
                from: self.state,
                operation: "use",
            })
    }

    /// Push the empty placeholder and return its id.
    pub fn begin(&mut self, conversation: &mut Conversation) -> Result<String, StreamError> {
        self.expect_state(&[ReplyState::Pending], "begin")?;

        let id = conversation.push(ChatMessage::bot_placeholder());
        debug!("Reply {} started", id);
        self.placeholder_id = Some(id.clone());
        self.state = ReplyState::Streaming;
        Ok(id)
    }

    /// Add a delta to the raw text. No rendering happens here.
    pub fn append(
        &mut self,
        conversation: &mut Conversation,
        delta: &str,
    ) -> Result<(), StreamError> {
        self.expect_state(&[ReplyState::Streaming], "append to")?;
        let id = self.streaming_id()?;

        let mut text = String::with_capacity(self.buffer.len() + delta.len());
        text.push_str(&self.buffer);
        text.push_str(delta);
        if !conversation.update(&id, |m| m.text.clone_from(&text)) {
            return Err(StreamError::MissingPlaceholder(id));
        }
        self.buffer = text;
        trace!("Reply {} grew to {} bytes", id, self.buffer.len());
        Ok(())
    }

    /// Render the buffer once and finalize the placeholder, or drop it if
    /// nothing but whitespace arrived.
    pub fn complete(
        &mut self,
        conversation: &mut Conversation,
        renderer: &dyn Renderer,
    ) -> Result<Completion, StreamError> {
        self.expect_state(&[ReplyState::Streaming], "complete")?;
        let id = self.streaming_id()?;

        if self.buffer.trim().is_empty() {
            conversation.remove(&id);
            self.state = ReplyState::Discarded;
            debug!("Reply {} was empty, removed", id);
            return Ok(Completion::Empty(id));
        }

        let html = renderer.render(&self.buffer);
        let text = &self.buffer;
        let updated = conversation.update(&id, |m| {
            m.text.clone_from(text);
            m.html = Some(html);
            m.is_streaming = false;
        });
        if !updated {
            return Err(StreamError::MissingPlaceholder(id));
        }

        self.state = ReplyState::Finalized;
        debug!("Reply {} finalized ({} bytes)", id, self.buffer.len());
        Ok(Completion::Finalized(id))
    }

    /// Drop the placeholder and append an error message. Returns the error
    /// message id.
    pub fn fail(
        &mut self,
        conversation: &mut Conversation,
        detail: &str,
    ) -> Result<String, StreamError> {
        self.expect_state(&[ReplyState::Pending, ReplyState::Streaming], "fail")?;

        if let Some(id) = &self.placeholder_id {
            conversation.remove(id);
        }
        self.state = ReplyState::Discarded;
        Ok(conversation.push(ChatMessage::error(&failure_text(detail))))
    }

    /// Drop the placeholder without leaving any trace.
    pub fn cancel(&mut self, conversation: &mut Conversation) -> Result<(), StreamError> {
        self.expect_state(&[ReplyState::Pending, ReplyState::Streaming], "cancel")?;

        if let Some(id) = &self.placeholder_id {
            conversation.remove(id);
            debug!("Reply {} cancelled", id);
        }
        self.state = ReplyState::Discarded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Sender;
    use chatmark_render::MarkdownRenderer;

    #[test]
    fn test_happy_path() {
        let mut conv = Conversation::new();
        let mut reply = StreamingReply::new();

        let id = reply.begin(&mut conv).unwrap();
        assert_eq!(reply.state(), ReplyState::Streaming);
        assert!(conv.get(&id).unwrap().is_streaming);

        reply.append(&mut conv, "**Hel").unwrap();
        reply.append(&mut conv, "lo**").unwrap();
        assert_eq!(conv.get(&id).unwrap().text, "**Hello**");
        assert!(conv.get(&id).unwrap().html.is_none());

        let done = reply.complete(&mut conv, &MarkdownRenderer).unwrap();
        assert_eq!(done, Completion::Finalized(id.clone()));
        let msg = conv.get(&id).unwrap();
        assert!(!msg.is_streaming);
        assert_eq!(msg.html.as_deref(), Some("<strong>Hello</strong>"));
        assert_eq!(reply.state(), ReplyState::Finalized);
    }

    #[test]
    fn test_whitespace_reply_is_discarded() {
        let mut conv = Conversation::new();
        let mut reply = StreamingReply::new();
        let id = reply.begin(&mut conv).unwrap();
        reply.append(&mut conv, " \n\t ").unwrap();

        assert_eq!(
            reply.complete(&mut conv, &MarkdownRenderer).unwrap(),
            Completion::Empty(id)
        );
        assert!(conv.is_empty());
        assert_eq!(reply.state(), ReplyState::Discarded);
    }

    #[test]
    fn test_fail_replaces_placeholder_with_error() {
        let mut conv = Conversation::new();
        let mut reply = StreamingReply::new();
        let id = reply.begin(&mut conv).unwrap();
        reply.append(&mut conv, "partial").unwrap();

        let err_id = reply.fail(&mut conv, "timeout").unwrap();
        assert!(conv.get(&id).is_none());
        let err = conv.get(&err_id).unwrap();
        assert_eq!(err.sender, Sender::Error);
        assert_eq!(
            err.text,
            "Sorry, something went wrong while generating a response. Details: timeout"
        );
    }

    #[test]
    fn test_fail_from_pending() {
        let mut conv = Conversation::new();
        let mut reply = StreamingReply::new();
        reply.fail(&mut conv, "").unwrap();
        assert_eq!(conv.len(), 1);
        assert_eq!(
            conv.last().unwrap().text,
            "Sorry, something went wrong while generating a response."
        );
    }

    #[test]
    fn test_cancel_removes_placeholder_silently() {
        let mut conv = Conversation::new();
        let mut reply = StreamingReply::new();
        reply.begin(&mut conv).unwrap();
        reply.append(&mut conv, "half").unwrap();

        reply.cancel(&mut conv).unwrap();
        assert!(conv.is_empty());
        assert_eq!(reply.state(), ReplyState::Discarded);
    }

    #[test]
    fn test_illegal_transitions() {
        let mut conv = Conversation::new();
        let mut reply = StreamingReply::new();

        assert_eq!(
            reply.append(&mut conv, "x"),
            Err(StreamError::IllegalTransition {
                from: ReplyState::Pending,
                operation: "append to"
            })
        );
        assert!(reply.complete(&mut conv, &MarkdownRenderer).is_err());

        reply.begin(&mut conv).unwrap();
        assert!(reply.begin(&mut conv).is_err());
        reply.append(&mut conv, "done").unwrap();
        reply.complete(&mut conv, &MarkdownRenderer).unwrap();

        for result in [
            reply.append(&mut conv, "more"),
            reply.cancel(&mut conv),
            reply.fail(&mut conv, "late").map(|_| ()),
            reply.complete(&mut conv, &MarkdownRenderer).map(|_| ()),
        ] {
            assert!(matches!(
                result,
                Err(StreamError::IllegalTransition {
                    from: ReplyState::Finalized,
                    ..
                })
            ));
        }
        // The finalized message is untouched
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.last().unwrap().text, "done");
    }

    #[test]
    fn test_missing_placeholder() {
        let mut conv = Conversation::new();
        let mut reply = StreamingReply::new();
        let id = reply.begin(&mut conv).unwrap();
        reply.append(&mut conv, "kept").unwrap();
        conv.remove(&id);

        assert_eq!(
            reply.append(&mut conv, "x"),
            Err(StreamError::MissingPlaceholder(id))
        );
        assert_eq!(reply.buffer(), "kept");
    }

    #[test]
    fn test_error_messages_display() {
        let err = StreamError::IllegalTransition {
            from: ReplyState::Discarded,
            operation: "complete",
        };
        assert_eq!(err.to_string(), "cannot complete a reply that is discarded");
    }
}
