use thiserror::Error;

use crate::streaming::ReplyState;

/// A streaming reply was driven in a way its state does not allow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("cannot {operation} a reply that is {from}")]
    IllegalTransition {
        from: ReplyState,
        operation: &'static str,
    },

    #[error("placeholder message {0} is no longer in the conversation")]
    MissingPlaceholder(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("a reply is already being generated")]
    Busy,

    #[error(transparent)]
    Stream(#[from] StreamError),
}
