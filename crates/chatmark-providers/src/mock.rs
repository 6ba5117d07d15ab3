//! Mock LLM Provider for Testing
//!
//! A configurable provider that replays scripted responses, so the chat
//! session can be exercised without network access. It allows precise
//! control over streamed chunks, mid-stream failures and stalls.
//!
//! # Example
//!
//! ```rust,ignore
//! use chatmark_providers::mock::{MockProvider, MockResponse};
//!
//! // Simple text-only response
//! let provider = MockProvider::new()
//!     .with_response(MockResponse::text("Hello, world!"));
//!
//! // Multi-chunk streaming response
//! let provider = MockProvider::new()
//!     .with_response(MockResponse::streaming(vec!["Hello, ", "world!"]));
//!
//! // Two chunks, then a transport error
//! let provider = MockProvider::new()
//!     .with_response(MockResponse::failing_after(vec!["par", "tial"], "connection reset"));
//! ```

use crate::{CompletionChunk, CompletionRequest, CompletionStream, LLMProvider, Usage};
use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// A single chunk in a mock streaming response
#[derive(Debug, Clone)]
pub enum MockChunk {
    /// A text delta
    Content(String),
    /// The final chunk with a stop reason
    Finished(String),
    /// A stream error item
    Error(String),
}

impl MockChunk {
    pub fn content(text: &str) -> Self {
        Self::Content(text.to_string())
    }

    pub fn finished(stop_reason: &str) -> Self {
        Self::Finished(stop_reason.to_string())
    }

    pub fn error(message: &str) -> Self {
        Self::Error(message.to_string())
    }
}

/// What happens once every scripted chunk has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Drop the sender; the stream ends.
    Close,
    /// Keep the stream open until the receiver goes away.
    Hang,
}

/// A mock response that can be configured for testing
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub chunks: Vec<MockChunk>,
    pub usage: Usage,
    /// When set, `stream()` itself fails with this message
    pub open_error: Option<String>,
    pub end: StreamEnd,
}

fn usage_for(content: &str) -> Usage {
    let completion_tokens = content.len() as u32 / 4;
    Usage {
        prompt_tokens: 100,
        completion_tokens,
        total_tokens: 100 + completion_tokens,
    }
}

impl MockResponse {
    /// Create a simple text-only response (single chunk + finish)
    pub fn text(content: &str) -> Self {
        Self::streaming(vec![content])
    }

    /// Create a streaming text response with multiple chunks
    pub fn streaming(chunks: Vec<&str>) -> Self {
        let total_content: String = chunks.concat();
        let mut mock_chunks: Vec<MockChunk> = chunks.into_iter().map(MockChunk::content).collect();
        mock_chunks.push(MockChunk::finished("end_turn"));

        Self {
            chunks: mock_chunks,
            usage: usage_for(&total_content),
            open_error: None,
            end: StreamEnd::Close,
        }
    }

    /// Send the given chunks, then a stream error
    pub fn failing_after(chunks: Vec<&str>, error: &str) -> Self {
        let total_content: String = chunks.concat();
        let mut mock_chunks: Vec<MockChunk> = chunks.into_iter().map(MockChunk::content).collect();
        mock_chunks.push(MockChunk::error(error));

        Self {
            chunks: mock_chunks,
            usage: usage_for(&total_content),
            open_error: None,
            end: StreamEnd::Close,
        }
    }

    /// `stream()` returns an error before any chunk is produced
    pub fn open_failure(error: &str) -> Self {
        Self {
            chunks: Vec::new(),
            usage: Usage::default(),
            open_error: Some(error.to_string()),
            end: StreamEnd::Close,
        }
    }

    /// Send the given chunks, then stall without finishing
    pub fn stalled(chunks: Vec<&str>) -> Self {
        let total_content: String = chunks.concat();
        Self {
            chunks: chunks.into_iter().map(MockChunk::content).collect(),
            usage: usage_for(&total_content),
            open_error: None,
            end: StreamEnd::Hang,
        }
    }

    /// Create a response that gets cut off by max_tokens
    pub fn truncated(content: &str) -> Self {
        Self {
            chunks: vec![MockChunk::content(content), MockChunk::finished("max_tokens")],
            usage: usage_for(content),
            open_error: None,
            end: StreamEnd::Close,
        }
    }

    /// Create a custom response with explicit chunks
    pub fn custom(chunks: Vec<MockChunk>, usage: Usage) -> Self {
        Self {
            chunks,
            usage,
            open_error: None,
            end: StreamEnd::Close,
        }
    }

    /// Builder: set custom usage
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}

/// A mock LLM provider for testing
///
/// The provider maintains a queue of responses that are returned in order.
/// It also tracks all requests made for verification in tests.
pub struct MockProvider {
    name: String,
    model: String,
    /// Queue of responses to return (FIFO)
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// All requests received (for verification)
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Default response when queue is empty
    default_response: Option<MockResponse>,
    chunk_delay: Duration,
}

/// Test doubles keep working after a panicking test thread.
fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProvider {
    /// Create a new mock provider with default settings
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            model: "mock-model".to_string(),
            responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            default_response: None,
            chunk_delay: Duration::from_micros(100),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Pause between streamed chunks
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Add a response to the queue
    pub fn with_response(self, response: MockResponse) -> Self {
        locked(&self.responses).push(response);
        self
    }

    /// Add multiple responses to the queue
    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        locked(&self.responses).extend(responses);
        self
    }

    /// Set a default response when queue is empty
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.default_response = Some(response);
        self
    }

    /// Get all requests that were made to this provider
    pub fn get_requests(&self) -> Vec<CompletionRequest> {
        locked(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        locked(&self.requests).len()
    }

    pub fn clear_requests(&self) {
        locked(&self.requests).clear();
    }

    fn next_response(&self) -> MockResponse {
        let mut responses = locked(&self.responses);
        if responses.is_empty() {
            self.default_response
                .clone()
                .unwrap_or_else(|| MockResponse::text("Mock response (no responses configured)"))
        } else {
            responses.remove(0)
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LLMProvider for MockProvider {
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        locked(&self.requests).push(request);

        let response = self.next_response();
        if let Some(error) = response.open_error {
            anyhow::bail!("{}", error);
        }

        let (tx, rx) = mpsc::channel(32);
        let delay = self.chunk_delay;
        let MockResponse {
            chunks, usage, end, ..
        } = response;
        let num_chunks = chunks.len();

        tokio::spawn(async move {
            for (i, chunk) in chunks.into_iter().enumerate() {
                let item = match chunk {
                    MockChunk::Content(text) => Ok(CompletionChunk {
                        content: text,
                        finished: false,
                        usage: None,
                        stop_reason: None,
                    }),
                    MockChunk::Finished(stop_reason) => Ok(CompletionChunk {
                        content: String::new(),
                        finished: true,
                        usage: Some(usage.clone()),
                        stop_reason: Some(stop_reason),
                    }),
                    MockChunk::Error(message) => Err(anyhow::anyhow!("{}", message)),
                };

                if tx.send(item).await.is_err() {
                    // Receiver dropped, stop sending
                    return;
                }

                if i + 1 < num_chunks {
                    tokio::time::sleep(delay).await;
                }
            }

            if end == StreamEnd::Hang {
                tx.closed().await;
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}
