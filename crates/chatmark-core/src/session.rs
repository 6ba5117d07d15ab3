//! Chat session: takes user input and drives one streamed reply at a time.
//!
//! The session owns the conversation behind a mutex that is never held
//! across an await, so views and callers can snapshot it while a reply is
//! streaming. Deltas are consumed strictly in arrival order, each one raced
//! against the caller's cancellation token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chatmark_providers::{CompletionChunk, CompletionRequest, LLMProvider};
use chatmark_render::Renderer;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::conversation::Conversation;
use crate::error::ChatError;
use crate::message::ChatMessage;
use crate::streaming::{Completion, StreamingReply};
use crate::view::ChatView;

pub const UNAVAILABLE_TEXT: &str = "AI service is not available.";

/// How a call to [`ChatSession::send`] ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input, nothing happened
    Ignored,
    /// No provider; an error message was appended
    Unavailable,
    /// The reply with this id was rendered
    Finalized(String),
    /// The reply was blank and was removed
    Empty,
    /// The cancellation token fired; the reply was removed
    Cancelled,
    /// The provider failed with this detail; an error message was appended
    Failed(String),
}

pub struct ChatSession<V: ChatView> {
    conversation: Mutex<Conversation>,
    provider: Option<Arc<dyn LLMProvider>>,
    renderer: Arc<dyn Renderer>,
    view: V,
    system_prompt: Option<String>,
    in_flight: AtomicBool,
}

/// Held for the duration of a send. If the send future is dropped while a
/// placeholder is still live, the placeholder is removed here.
struct InFlight<'a, V: ChatView> {
    session: &'a ChatSession<V>,
    placeholder: Option<String>,
}

impl<V: ChatView> Drop for InFlight<'_, V> {
    fn drop(&mut self) {
        if let Some(id) = self.placeholder.take() {
            let removed = self.session.lock().remove(&id).is_some();
            if removed {
                warn!("Reply {} abandoned mid-stream, removed", id);
                self.session.view.message_removed(&id);
            }
        }
        self.session.in_flight.store(false, Ordering::Release);
    }
}

enum Step {
    Cancelled,
    Next(Option<anyhow::Result<CompletionChunk>>),
}

impl<V: ChatView> ChatSession<V> {
    /// `provider` is `None` when the AI service could not be set up; every
    /// send then answers with [`UNAVAILABLE_TEXT`].
    pub fn new(
        provider: Option<Arc<dyn LLMProvider>>,
        renderer: Arc<dyn Renderer>,
        view: V,
    ) -> Self {
        Self {
            conversation: Mutex::new(Conversation::new()),
            provider,
            renderer,
            view,
            system_prompt: None,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    /// Add greeting messages if the conversation is still empty.
    ///
    /// Greetings are markdown, rendered once here.
    pub fn seed_greetings(&self, greetings: &[String]) {
        if !self.lock().is_empty() {
            return;
        }
        for greeting in greetings {
            let html = self.renderer.render(greeting);
            self.push_and_notify(ChatMessage::greeting(greeting, html));
        }
    }

    /// Record an error message outside of a send, e.g. a failed provider setup.
    pub fn push_error(&self, text: &str) {
        self.push_and_notify(ChatMessage::error(text));
    }

    fn lock(&self) -> MutexGuard<'_, Conversation> {
        self.conversation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the conversation
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages().to_vec()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    fn push_and_notify(&self, message: ChatMessage) -> String {
        let snapshot = message.clone();
        let id = self.lock().push(message);
        self.view.message_added(&snapshot);
        id
    }

    fn notify_added(&self, id: &str) {
        let message = self.lock().get(id).cloned();
        if let Some(message) = message {
            self.view.message_added(&message);
        }
    }

    /// Send user input and stream the reply into the conversation.
    ///
    /// Only one send runs at a time; a concurrent call gets
    /// [`ChatError::Busy`]. Provider failures are not errors here: they end
    /// as [`SendOutcome::Failed`] with an error message in the conversation.
    pub async fn send(
        &self,
        input: &str,
        cancel: CancellationToken,
    ) -> Result<SendOutcome, ChatError> {
        let input = input.trim();
        if input.is_empty() {
            debug!("Ignoring blank input");
            return Ok(SendOutcome::Ignored);
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            warn!("Send refused, a reply is already streaming");
            return Err(ChatError::Busy);
        }
        let mut flight = InFlight {
            session: self,
            placeholder: None,
        };

        let Some(provider) = self.provider.clone() else {
            warn!("No AI provider available");
            self.push_and_notify(ChatMessage::error(UNAVAILABLE_TEXT));
            return Ok(SendOutcome::Unavailable);
        };

        self.push_and_notify(ChatMessage::user(input));

        let mut reply = StreamingReply::new();
        let (request, id) = {
            let mut conversation = self.lock();
            let history = conversation.history(self.system_prompt.as_deref());
            let id = reply.begin(&mut conversation)?;
            (CompletionRequest::streaming(history), id)
        };
        flight.placeholder = Some(id.clone());
        self.notify_added(&id);

        info!(
            "Streaming reply {} from {} ({})",
            id,
            provider.name(),
            provider.model()
        );

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = provider.stream(request) => Some(result),
        };
        let mut stream = match opened {
            None => return self.cancel_reply(&mut reply, &mut flight),
            Some(Err(e)) => return self.fail_reply(&mut reply, &mut flight, &e),
            Some(Ok(stream)) => stream,
        };

        loop {
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                item = stream.next() => Step::Next(item),
            };

            match step {
                Step::Cancelled => return self.cancel_reply(&mut reply, &mut flight),
                Step::Next(None) => break,
                Step::Next(Some(Err(e))) => return self.fail_reply(&mut reply, &mut flight, &e),
                Step::Next(Some(Ok(chunk))) => {
                    if !chunk.content.is_empty() {
                        reply.append(&mut self.lock(), &chunk.content)?;
                        self.view.stream_delta(&id, &chunk.content);
                    }
                    if chunk.finished {
                        debug!(
                            "Reply {} finished (stop reason: {:?})",
                            id, chunk.stop_reason
                        );
                        break;
                    }
                }
            }
        }

        let completion = reply.complete(&mut self.lock(), self.renderer.as_ref())?;
        flight.placeholder = None;

        match completion {
            Completion::Finalized(id) => {
                let finalized = self.lock().get(&id).cloned();
                if let Some(message) = finalized {
                    self.view.message_finalized(&message);
                }
                Ok(SendOutcome::Finalized(id))
            }
            Completion::Empty(id) => {
                self.view.message_removed(&id);
                Ok(SendOutcome::Empty)
            }
        }
    }

    fn cancel_reply(
        &self,
        reply: &mut StreamingReply,
        flight: &mut InFlight<'_, V>,
    ) -> Result<SendOutcome, ChatError> {
        reply.cancel(&mut self.lock())?;
        if let Some(id) = flight.placeholder.take() {
            info!("Reply {} cancelled", id);
            self.view.message_removed(&id);
        }
        Ok(SendOutcome::Cancelled)
    }

    fn fail_reply(
        &self,
        reply: &mut StreamingReply,
        flight: &mut InFlight<'_, V>,
        err: &anyhow::Error,
    ) -> Result<SendOutcome, ChatError> {
        let detail = err.to_string();
        error!("Reply failed: {}", detail);

        let error_id = reply.fail(&mut self.lock(), &detail)?;
        if let Some(id) = flight.placeholder.take() {
            self.view.message_removed(&id);
        }
        self.notify_added(&error_id);
        Ok(SendOutcome::Failed(detail))
    }
}
