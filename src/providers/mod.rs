//! Language-model access for drafting replies and batch summaries.
//!
//! Every call the service makes is one-shot: a system instruction, one user
//! prompt, and a token budget. [`LlmProvider`] is the seam; the only
//! implementation is [`openai::OpenAiProvider`], which speaks the
//! OpenAI-compatible `/chat/completions` API.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

pub mod openai;

/// Longest upstream error body kept in a [`ProviderError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Credentials that must never reach logs or API responses.
static SECRET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"sk-proj-[A-Za-z0-9_\-]{10,}",
        r"sk-[A-Za-z0-9]{32,}",
        r"Bearer\s+[A-Za-z0-9._\-]{16,}",
    ]
    .into_iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// A single drafting request.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    /// Instruction that frames the task.
    pub system: String,
    /// The material to work on.
    pub user: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Why the model stopped producing text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// The model finished on its own.
    Stop,
    /// The token budget ran out; the text is cut short.
    Length,
    /// A content filter withheld part of the output.
    Filtered,
    /// Any other upstream reason.
    Other(String),
}

impl FinishReason {
    /// Map the wire value; a missing reason counts as a normal stop.
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            None | Some("stop") => Self::Stop,
            Some("length") => Self::Length,
            Some("content_filter") => Self::Filtered,
            Some(other) => Self::Other(other.to_owned()),
        }
    }
}

/// Text returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Trimmed generated text, never empty.
    pub text: String,
    /// Why generation ended.
    pub finish: FinishReason,
    /// Model that served the request.
    pub model: String,
    /// Prompt tokens billed, 0 when not reported.
    pub prompt_tokens: u32,
    /// Completion tokens billed, 0 when not reported.
    pub completion_tokens: u32,
}

/// Errors returned by model providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP exchange itself failed.
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream answered with a non-2xx status.
    #[error("provider returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Redacted, truncated response body.
        body: String,
    },

    /// The body could not be read as a completion.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// The provider cannot serve requests right now.
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Language-model backend used by the responder.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one prompt to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on transport, status or parse failure.
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, ProviderError>;

    /// Model identifier requests are sent for.
    fn model_id(&self) -> &str;
}

/// Return the body of a 2xx response, or a [`ProviderError::Status`] with
/// the body redacted.
///
/// # Errors
///
/// Returns [`ProviderError::Transport`] when the body cannot be read and
/// [`ProviderError::Status`] for any non-success status.
pub async fn read_success_body(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(ProviderError::Status {
            status: status.as_u16(),
            body: redact_error_body(&body),
        })
    }
}

/// Collapse whitespace, mask credentials and cap the length of an upstream
/// error body.
#[doc(hidden)]
pub fn redact_error_body(raw: &str) -> String {
    let mut cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    for pattern in SECRET_PATTERNS.iter() {
        cleaned = pattern.replace_all(&cleaned, "[REDACTED]").into_owned();
    }

    match cleaned.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...[truncated]", cleaned.get(..cut).unwrap_or_default()),
        None => cleaned,
    }
}
