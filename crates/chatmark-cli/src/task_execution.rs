//! Sending one prompt with Ctrl-C cancellation.

use chatmark_core::{ChatError, ChatSession, ChatView, SendOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::simple_output::SimpleOutput;

/// Send `input` and wait for the reply. Ctrl-C while the reply streams
/// cancels it; the partial reply is dropped.
pub async fn send_with_interrupt<V: ChatView>(
    session: &ChatSession<V>,
    input: &str,
    output: &SimpleOutput,
) -> Option<SendOutcome> {
    let cancellation_token = CancellationToken::new();
    let send = session.send(input, cancellation_token.clone());
    tokio::pin!(send);

    let result = tokio::select! {
        result = &mut send => result,
        _ = tokio::signal::ctrl_c() => {
            cancellation_token.cancel();
            send.await
        }
    };

    match result {
        Ok(SendOutcome::Cancelled) => {
            output.print_error("⚠️  Reply cancelled by user (Ctrl+C)");
            Some(SendOutcome::Cancelled)
        }
        Ok(outcome) => {
            debug!("Send finished: {:?}", outcome);
            Some(outcome)
        }
        Err(ChatError::Busy) => {
            output.print_error("A reply is still streaming, please wait.");
            None
        }
        Err(e) => {
            error!("Chat session error: {}", e);
            output.print_error(&format!("❌ Error: {}", e));
            None
        }
    }
}
