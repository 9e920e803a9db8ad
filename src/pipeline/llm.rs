//! LLM interaction: build the chat request, call the endpoint, retry.
//!
//! The endpoint sits behind the [`ChatClient`] capability trait with one
//! production adapter ([`OllamaChatClient`]) so retry classification and
//! salvage parsing can be exercised against scripted fakes.
//!
//! ## Retry strategy
//!
//! A local model server under load answers with 5xx or drops connections;
//! both resolve on their own within seconds. Each attempt is classified:
//!
//! * **transient** — HTTP ≥ 500, network error, timeout, or a 2xx reply
//!   whose body could not be salvaged into JSON (a re-prompt may well
//!   produce valid JSON, so parse failures consume a retry attempt too);
//! * **terminal** — any other non-success status, or a reply with no
//!   assistant content. Retrying cannot change these.
//!
//! Transient failures back off `2^(attempt-1)` whole seconds (1 s, then
//! 2 s) before the next attempt, up to 3 attempts total; there is never a
//! wait after the final attempt. All waits honour cancellation.
//!
//! This module never errors through its boundary: every expected failure
//! becomes a `success: false` result.

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::pipeline::salvage;
use crate::prompts::{self, DEFAULT_SYSTEM_PROMPT};
use crate::result::DocumentExtractionResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// One role-tagged message in a chat-completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Failure of a single chat attempt, carrying enough to classify it.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Non-success HTTP status; `body` is an excerpt, not the full reply.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection-level failure with no status code.
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// 2xx reply whose envelope held no assistant message content.
    #[error("LLM response did not contain content")]
    MissingContent,
}

impl ChatError {
    /// Transient failures are worth retrying; terminal ones are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ChatError::Status { status, .. } => *status >= 500,
            ChatError::Network(_) | ChatError::Timeout => true,
            ChatError::MissingContent => false,
        }
    }
}

/// Capability interface over a chat-completion endpoint.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send one chat request and return the raw assistant message text.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

// ── Ollama adapter ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Production adapter: POST `/api/chat` against an Ollama-style endpoint.
pub struct OllamaChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaChatClient {
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Internal(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatClient for OllamaChatClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChatError::Timeout
                } else {
                    ChatError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        // A 2xx reply with an undecodable or contentless envelope is
        // terminal: the server answered, it just had nothing usable.
        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|_| ChatError::MissingContent)?;

        match payload.message.and_then(|m| m.content) {
            Some(content) if !content.trim().is_empty() => Ok(content),
            _ => Err(ChatError::MissingContent),
        }
    }
}

/// First 200 chars of a response body, for error messages and logs.
fn excerpt(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_CHARS {
        trimmed.to_string()
    } else {
        let mut out: String = trimmed.chars().take(MAX_CHARS).collect();
        out.push('…');
        out
    }
}

// ── Retry controller ─────────────────────────────────────────────────────

enum AttemptOutcome {
    Success(DocumentExtractionResult),
    Transient(String),
    Terminal(String),
}

/// Extract fields from `ocr_text` per `instruction` via the chat endpoint.
///
/// Never fails through its boundary — every expected failure mode comes
/// back as `DocumentExtractionResult { success: false, .. }`.
pub(crate) async fn extract_fields(
    client: &dyn ChatClient,
    ocr_text: &str,
    instruction: &str,
    config: &ExtractionConfig,
    cancel: &CancellationToken,
) -> DocumentExtractionResult {
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let messages = [
        ChatMessage::system(system_prompt),
        ChatMessage::user(prompts::build_user_message(instruction, ocr_text)),
    ];

    for attempt in 1..=config.max_attempts {
        if cancel.is_cancelled() {
            return DocumentExtractionResult::failure("Extraction was cancelled");
        }

        match attempt_once(client, &messages, ocr_text).await {
            AttemptOutcome::Success(result) => {
                debug!(attempt, fields = result.fields.len(), "LLM extraction succeeded");
                return result;
            }
            AttemptOutcome::Terminal(message) => {
                error!(attempt, %message, "terminal LLM failure");
                return DocumentExtractionResult::failure(message);
            }
            AttemptOutcome::Transient(cause) => {
                warn!(attempt, max_attempts = config.max_attempts, %cause, "transient LLM failure");
            }
        }

        // No wait after the final attempt.
        if attempt < config.max_attempts && backoff(attempt, cancel).await.is_err() {
            return DocumentExtractionResult::failure("Extraction was cancelled");
        }
    }

    DocumentExtractionResult::failure("LLM extraction failed after retries")
}

async fn attempt_once(
    client: &dyn ChatClient,
    messages: &[ChatMessage],
    ocr_text: &str,
) -> AttemptOutcome {
    match client.chat(messages).await {
        Ok(content) => match salvage::try_parse(&content) {
            Ok(mut result) => {
                // Backfill the audit text when the model left it out.
                if result
                    .raw_text
                    .as_deref()
                    .map_or(true, |t| t.trim().is_empty())
                {
                    result.raw_text = Some(ocr_text.to_string());
                }
                AttemptOutcome::Success(result)
            }
            Err(e) => AttemptOutcome::Transient(e.to_string()),
        },
        Err(e) if e.is_transient() => AttemptOutcome::Transient(e.to_string()),
        Err(ChatError::MissingContent) => {
            AttemptOutcome::Terminal("LLM response did not contain content".to_string())
        }
        Err(ChatError::Status { status, body }) => AttemptOutcome::Terminal(if body.is_empty() {
            format!("LLM request failed with status {status}")
        } else {
            format!("LLM request failed with status {status}: {body}")
        }),
        // Network/Timeout are always transient and taken by the guard arm;
        // kept for match exhaustiveness.
        Err(e) => AttemptOutcome::Transient(e.to_string()),
    }
}

/// Exponential backoff: `2^(attempt-1)` whole seconds, cancellation-aware.
async fn backoff(attempt: u32, cancel: &CancellationToken) -> Result<(), ExtractionError> {
    let delay = Duration::from_secs(1u64 << (attempt - 1));
    debug!(attempt, delay_secs = delay.as_secs(), "backing off before retry");
    tokio::select! {
        _ = cancel.cancelled() => Err(ExtractionError::Canceled),
        _ = sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Scripted fake: pops one reply per call, counts calls.
    struct FakeChatClient {
        replies: Mutex<VecDeque<Result<String, ChatError>>>,
        calls: AtomicUsize,
    }

    impl FakeChatClient {
        fn new(replies: Vec<Result<String, ChatError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatClient for FakeChatClient {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("fake client called more times than scripted")
        }
    }

    fn server_error(status: u16) -> Result<String, ChatError> {
        Err(ChatError::Status {
            status,
            body: "overloaded".into(),
        })
    }

    fn config() -> ExtractionConfig {
        ExtractionConfig::default()
    }

    #[tokio::test(start_paused = true)]
    async fn three_transient_failures_exhaust_retries_with_backoff() {
        let client = FakeChatClient::new(vec![
            server_error(503),
            server_error(503),
            server_error(503),
        ]);
        let started = Instant::now();

        let result = extract_fields(
            &client,
            "doc text",
            "extract things",
            &config(),
            &CancellationToken::new(),
        )
        .await;

        assert!(!result.success);
        assert_eq!(
            result.error_message.as_deref(),
            Some("LLM extraction failed after retries")
        );
        assert_eq!(client.calls(), 3, "exactly 3 attempts");
        // Two waits: 1s after attempt 1, 2s after attempt 2, none after 3.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_status_short_circuits() {
        let client = FakeChatClient::new(vec![Err(ChatError::Status {
            status: 404,
            body: "model not found".into(),
        })]);
        let started = Instant::now();

        let result = extract_fields(
            &client,
            "doc",
            "prompt",
            &config(),
            &CancellationToken::new(),
        )
        .await;

        assert!(!result.success);
        let msg = result.error_message.unwrap();
        assert!(msg.contains("404"), "got: {msg}");
        assert!(msg.contains("model not found"));
        assert_eq!(client.calls(), 1, "no retry on terminal failure");
        assert_eq!(started.elapsed(), Duration::ZERO, "no backoff wait");
    }

    #[tokio::test]
    async fn missing_content_is_terminal() {
        let client = FakeChatClient::new(vec![Err(ChatError::MissingContent)]);

        let result = extract_fields(
            &client,
            "doc",
            "prompt",
            &config(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(
            result.error_message.as_deref(),
            Some("LLM response did not contain content")
        );
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn parse_failure_consumes_attempts() {
        let client = FakeChatClient::new(vec![
            Ok("I'm sorry, I cannot help with that.".into()),
            Ok("still not json".into()),
            Ok("nope".into()),
        ]);

        let result = extract_fields(
            &client,
            "doc",
            "prompt",
            &config(),
            &CancellationToken::new(),
        )
        .await;

        assert!(!result.success);
        assert_eq!(
            result.error_message.as_deref(),
            Some("LLM extraction failed after retries")
        );
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_one_transient_failure() {
        let client = FakeChatClient::new(vec![
            server_error(502),
            Ok(r#"{"success":true,"fields":[{"name":"Total","value":"99","confidence":0.5}]}"#
                .into()),
        ]);

        let result = extract_fields(
            &client,
            "doc text",
            "prompt",
            &config(),
            &CancellationToken::new(),
        )
        .await;

        assert!(result.success);
        assert_eq!(result.fields.len(), 1);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn raw_text_backfilled_from_ocr_text() {
        let client =
            FakeChatClient::new(vec![Ok(r#"{"success":true,"fields":[]}"#.into())]);

        let result = extract_fields(
            &client,
            "the ocr text",
            "prompt",
            &config(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.raw_text.as_deref(), Some("the ocr text"));
    }

    #[tokio::test]
    async fn raw_text_from_model_is_preserved() {
        let client = FakeChatClient::new(vec![Ok(
            r#"{"success":true,"fields":[],"rawText":"model's own copy"}"#.into(),
        )]);

        let result = extract_fields(
            &client,
            "ocr text",
            "prompt",
            &config(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.raw_text.as_deref(), Some("model's own copy"));
    }

    #[tokio::test]
    async fn cancelled_before_first_attempt() {
        let client = FakeChatClient::new(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = extract_fields(&client, "doc", "prompt", &config(), &cancel).await;

        assert!(!result.success);
        assert_eq!(client.calls(), 0, "no attempt after cancellation");
    }

    #[test]
    fn transient_classification() {
        assert!(ChatError::Status {
            status: 500,
            body: String::new()
        }
        .is_transient());
        assert!(ChatError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(ChatError::Network("reset".into()).is_transient());
        assert!(ChatError::Timeout.is_transient());
        assert!(!ChatError::Status {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!ChatError::MissingContent.is_transient());
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(500);
        let e = excerpt(&long);
        assert!(e.chars().count() <= 201);
        assert!(e.ends_with('…'));
        assert_eq!(excerpt("  short  "), "short");
    }
}
