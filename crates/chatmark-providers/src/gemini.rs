//! Google Gemini provider implementation for the chatmark-providers crate.
//!
//! This module provides an implementation of the `LLMProvider` trait for Google's Gemini models,
//! streaming replies through the Generative Language API.
//!
//! # Features
//!
//! - Support for Gemini models (gemini-2.5-flash, gemini-2.0-flash, etc.)
//! - Server-sent event streaming with incremental JSON parsing
//! - Error objects sent mid-stream surface as stream errors
//! - Message format conversion between chatmark and Gemini formats
//! - UTF-8 safe decoding across network chunk boundaries
//!
//! # Usage
//!
//! ```rust,no_run
//! use chatmark_providers::{GeminiProvider, LLMProvider, CompletionRequest, Message, MessageRole};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = GeminiProvider::new(
//!         "your-api-key".to_string(),
//!         Some("gemini-2.5-flash".to_string()),
//!         Some(8192),
//!         Some(0.7),
//!     )?;
//!
//!     let request = CompletionRequest::streaming(vec![
//!         Message::new(MessageRole::System, "You are a helpful assistant.".to_string()),
//!         Message::new(MessageRole::User, "Hello! How are you?".to_string()),
//!     ]);
//!
//!     let mut stream = provider.stream(request).await?;
//!     while let Some(chunk) = stream.next().await {
//!         print!("{}", chunk?.content);
//!     }
//!
//!     Ok(())
//! }
//! ```

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::{
    streaming::{decode_utf8_streaming, make_final_chunk, make_text_chunk},
    CompletionChunk, CompletionRequest, CompletionStream, LLMProvider, Message, MessageRole, Usage,
};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// Provider Struct
// ============================================================================

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    name: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: String,
        model: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<Self> {
        Self::new_with_name(
            "gemini".to_string(),
            api_key,
            model,
            max_tokens,
            temperature,
        )
    }

    pub fn new_with_name(
        name: String,
        api_key: String,
        model: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("Gemini API key is empty");
        }
        Ok(Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(8192),
            temperature: temperature.unwrap_or(0.7),
            name,
            base_url: API_BASE.to_string(),
        })
    }

    /// Point the provider at another endpoint (e.g. a local proxy).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn get_api_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?key={}&alt=sse",
            self.base_url, self.model, self.api_key
        )
    }

    /// The request URL with the key masked, for logging.
    fn redacted_url(&self) -> String {
        self.get_api_url().replace(&self.api_key, "***")
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

/// Gemini API request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Gemini API response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsageMetadata>,
    error: Option<GeminiError>,
}

/// Error object Gemini sends in place of a response
#[derive(Debug, Deserialize)]
struct GeminiError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
    status: Option<String>,
}

impl std::fmt::Display for GeminiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.status {
            Some(status) => write!(f, "Gemini API error ({} {}): {}", self.code, status, self.message),
            None => write!(f, "Gemini API error ({}): {}", self.code, self.message),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    total_token_count: Option<u32>,
}

// ============================================================================
// Message Conversion
// ============================================================================

/// Convert chatmark messages to Gemini format
///
/// - Gemini uses "model" instead of "assistant"
/// - System messages go in system_instruction, not contents
fn convert_messages(messages: &[Message]) -> (Vec<GeminiContent>, Option<GeminiContent>) {
    let mut contents = Vec::new();
    let mut system_instruction = None;

    for msg in messages {
        let part = GeminiPart {
            text: msg.content.clone(),
        };
        match msg.role {
            MessageRole::System => {
                system_instruction = Some(GeminiContent {
                    role: None,
                    parts: vec![part],
                });
            }
            MessageRole::User => contents.push(GeminiContent {
                role: Some("user".to_string()),
                parts: vec![part],
            }),
            MessageRole::Assistant => contents.push(GeminiContent {
                role: Some("model".to_string()),
                parts: vec![part],
            }),
        }
    }

    (contents, system_instruction)
}

fn extract_text_from_parts(parts: &[GeminiPart]) -> String {
    parts.iter().map(|part| part.text.as_str()).collect()
}

fn convert_usage(metadata: Option<&GeminiUsageMetadata>) -> Usage {
    match metadata {
        Some(m) => Usage {
            prompt_tokens: m.prompt_token_count.unwrap_or(0),
            completion_tokens: m.candidates_token_count.unwrap_or(0),
            total_tokens: m.total_token_count.unwrap_or(0),
        },
        None => Usage::default(),
    }
}

/// Convert Gemini finish reason to a provider-neutral stop reason
fn convert_finish_reason(reason: Option<&str>) -> Option<String> {
    reason.map(|r| match r {
        "STOP" => "end_turn".to_string(),
        "MAX_TOKENS" => "max_tokens".to_string(),
        "SAFETY" | "RECITATION" => "content_filter".to_string(),
        other => other.to_lowercase(),
    })
}

// ============================================================================
// Streaming Parser
// ============================================================================

/// What one streamed response object carried.
enum StreamEvent {
    Delta {
        text: String,
        finish_reason: Option<String>,
        usage: Option<GeminiUsageMetadata>,
    },
    Failed(GeminiError),
}

/// Parse one JSON object from Gemini's SSE stream
fn parse_streaming_chunk(data: &str) -> Option<StreamEvent> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }

    let response: GeminiResponse = match serde_json::from_str(data) {
        Ok(r) => r,
        Err(e) => {
            debug!("Failed to parse Gemini streaming chunk: {} - data: {}", e, data);
            return None;
        }
    };

    if let Some(error) = response.error {
        return Some(StreamEvent::Failed(error));
    }

    let candidate = response.candidates.as_ref().and_then(|c| c.first());
    let text = candidate
        .and_then(|c| c.content.as_ref())
        .map(|c| extract_text_from_parts(&c.parts))
        .unwrap_or_default();
    let finish_reason = convert_finish_reason(candidate.and_then(|c| c.finish_reason.as_deref()));

    Some(StreamEvent::Delta {
        text,
        finish_reason,
        usage: response.usage_metadata,
    })
}

/// Process streaming response from Gemini
async fn process_stream(
    mut response: reqwest::Response,
    tx: mpsc::Sender<Result<CompletionChunk>>,
) {
    let mut byte_buffer: Vec<u8> = Vec::new();
    let mut buffer = String::new();
    let mut last_usage: Option<GeminiUsageMetadata> = None;
    let mut last_finish_reason: Option<String> = None;

    while let Some(chunk_result) = response.chunk().await.transpose() {
        let bytes = match chunk_result {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Error reading Gemini stream: {}", e);
                let _ = tx.send(Err(anyhow::anyhow!("Stream error: {}", e))).await;
                return;
            }
        };

        byte_buffer.extend_from_slice(&bytes);
        let Some(text) = decode_utf8_streaming(&mut byte_buffer) else {
            continue;
        };
        buffer.push_str(&text);

        while let Some(parsed) = try_parse_json_from_buffer(&mut buffer) {
            let (text, finish_reason, usage) = match parse_streaming_chunk(&parsed) {
                None => continue,
                Some(StreamEvent::Failed(api_error)) => {
                    error!("{}", api_error);
                    let _ = tx.send(Err(anyhow::anyhow!("{}", api_error))).await;
                    return;
                }
                Some(StreamEvent::Delta {
                    text,
                    finish_reason,
                    usage,
                }) => (text, finish_reason, usage),
            };
            if usage.is_some() {
                last_usage = usage;
            }
            if finish_reason.is_some() {
                last_finish_reason = finish_reason;
            }
            if !text.is_empty() && tx.send(Ok(make_text_chunk(text))).await.is_err() {
                debug!("Gemini stream receiver dropped");
                return;
            }
        }
    }

    let final_chunk = make_final_chunk(
        Some(convert_usage(last_usage.as_ref())),
        last_finish_reason,
    );
    let _ = tx.send(Ok(final_chunk)).await;
}

/// Try to extract a complete JSON object from the buffer
///
/// Handles both SSE framing (`data: {...}`) and a bare JSON array
/// (`[{...}, {...}]`); anything before the first `{` is skipped.
fn try_parse_json_from_buffer(buffer: &mut String) -> Option<String> {
    let absolute_start = buffer.find('{')?;

    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut end_idx = None;

    for (i, c) in buffer[absolute_start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    end_idx = Some(absolute_start + i + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    let end = end_idx?;
    let json_str = buffer[absolute_start..end].to_string();
    buffer.drain(..end);
    Some(json_str)
}

// ============================================================================
// LLMProvider Implementation
// ============================================================================

impl GeminiProvider {
    fn build_request(&self, request: &CompletionRequest) -> GeminiRequest {
        let (contents, system_instruction) = convert_messages(&request.messages);
        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig {
                max_output_tokens: request.max_tokens.or(Some(self.max_tokens)),
                temperature: request.temperature.or(Some(self.temperature)),
            },
        }
    }

    async fn post(&self, url: &str, body: &GeminiRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error ({}): {}", status, error_text);
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }
        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let gemini_request = self.build_request(&request);

        debug!("Gemini streaming request URL: {}", self.redacted_url());

        let response = self.post(&self.get_api_url(), &gemini_request).await?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(process_stream(response, tx));

        Ok(ReceiverStream::new(rx))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
