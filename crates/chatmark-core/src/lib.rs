//! Chat core: message model, conversation, streamed reply lifecycle and
//! the session that ties a provider stream to the markdown renderer.

pub mod conversation;
pub mod error;
pub mod message;
pub mod session;
pub mod streaming;
pub mod transcript;
pub mod view;

pub use conversation::Conversation;
pub use error::{ChatError, StreamError};
pub use message::{ChatMessage, Sender};
pub use session::{ChatSession, SendOutcome, UNAVAILABLE_TEXT};
pub use streaming::{failure_text, Completion, ReplyState, StreamingReply};
pub use transcript::{transcript_html, write_transcript};
pub use view::{ChatView, NullChatView};
