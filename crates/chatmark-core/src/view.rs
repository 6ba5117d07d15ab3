use crate::message::ChatMessage;

/// Observer for conversation changes.
///
/// A session calls these in the order the changes happen, so a front end
/// can mirror the conversation without reading it back.
pub trait ChatView: Send + Sync {
    /// A message was appended (user text, placeholder, error, greeting)
    fn message_added(&self, message: &ChatMessage);

    /// Raw text arrived for a streaming placeholder
    fn stream_delta(&self, id: &str, delta: &str);

    /// A streaming reply finished and now carries its HTML
    fn message_finalized(&self, message: &ChatMessage);

    /// A message left the conversation (empty, failed or cancelled reply)
    fn message_removed(&self, id: &str);
}

/// Discards every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullChatView;

impl ChatView for NullChatView {
    fn message_added(&self, _message: &ChatMessage) {}
    fn stream_delta(&self, _id: &str, _delta: &str) {}
    fn message_finalized(&self, _message: &ChatMessage) {}
    fn message_removed(&self, _id: &str) {}
}
