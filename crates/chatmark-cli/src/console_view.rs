//! Terminal rendition of the chat: raw deltas on stdout, errors on stderr.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use chatmark_core::{ChatMessage, ChatView, Sender};
use tracing::debug;

type Sink = Mutex<Box<dyn Write + Send>>;

/// Console implementation of ChatView.
///
/// Streaming replies are shown as plain text while they arrive; the rendered
/// HTML only goes to the transcript. User input is not echoed.
pub struct ConsoleView {
    out: Sink,
    err: Sink,
    line_open: Mutex<bool>,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self::with_writers(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    pub fn with_writers(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
            line_open: Mutex::new(false),
        }
    }

    fn write(sink: &Sink, text: &str) {
        let mut writer = sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer.write_all(text.as_bytes()).and_then(|_| writer.flush()) {
            debug!("Console write failed: {}", e);
        }
    }

    /// End a partially printed reply line.
    fn close_line(&self) {
        let mut open = self.line_open.lock().unwrap_or_else(PoisonError::into_inner);
        if *open {
            Self::write(&self.out, "\n");
            *open = false;
        }
    }
}

impl Default for ConsoleView {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatView for ConsoleView {
    fn message_added(&self, message: &ChatMessage) {
        match message.sender {
            Sender::User => {}
            Sender::Bot if message.is_streaming => {}
            Sender::Bot => Self::write(&self.out, &format!("{}\n", message.text)),
            Sender::Error => {
                self.close_line();
                Self::write(&self.err, &format!("{}\n", message.text));
            }
        }
    }

    fn stream_delta(&self, _id: &str, delta: &str) {
        Self::write(&self.out, delta);
        *self.line_open.lock().unwrap_or_else(PoisonError::into_inner) = !delta.ends_with('\n');
    }

    fn message_finalized(&self, _message: &ChatMessage) {
        self.close_line();
    }

    fn message_removed(&self, _id: &str) {
        self.close_line();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn view() -> (ConsoleView, SharedBuffer, SharedBuffer) {
        let out = SharedBuffer::default();
        let err = SharedBuffer::default();
        let view = ConsoleView::with_writers(Box::new(out.clone()), Box::new(err.clone()));
        (view, out, err)
    }

    #[test]
    fn test_deltas_printed_raw_then_newline() {
        let (view, out, err) = view();
        let placeholder = ChatMessage::bot_placeholder();

        view.message_added(&ChatMessage::user("hi"));
        view.message_added(&placeholder);
        view.stream_delta(&placeholder.id, "**Hel");
        view.stream_delta(&placeholder.id, "lo**");
        view.message_finalized(&placeholder);

        assert_eq!(out.contents(), "**Hello**\n");
        assert!(err.contents().is_empty());
    }

    #[test]
    fn test_no_extra_newline_after_trailing_newline() {
        let (view, out, _) = view();
        view.stream_delta("bot-message-1", "line\n");
        view.message_removed("bot-message-1");
        assert_eq!(out.contents(), "line\n");
    }

    #[test]
    fn test_errors_go_to_stderr() {
        let (view, out, err) = view();
        view.stream_delta("bot-message-1", "partial");
        view.message_removed("bot-message-1");
        view.message_added(&ChatMessage::error("AI service is not available."));

        assert_eq!(out.contents(), "partial\n");
        assert_eq!(err.contents(), "AI service is not available.\n");
    }

    #[test]
    fn test_greetings_printed_as_lines() {
        let (view, out, _) = view();
        view.message_added(&ChatMessage::greeting(
            "Hello! How can I assist you today?",
            "Hello! How can I assist you today?".to_string(),
        ));
        assert_eq!(out.contents(), "Hello! How can I assist you today?\n");
    }
}
