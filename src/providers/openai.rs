//! OpenAI-compatible `/chat/completions` provider.
//!
//! Works against api.openai.com and any server exposing the same shape
//! (Azure deployments, vLLM, LiteLLM) through `llm.base_url`.

use serde::{Deserialize, Serialize};

use super::{read_success_body, Completion, FinishReason, LlmProvider, Prompt, ProviderError};
use crate::config::LlmConfig;

/// Request body sent to `/chat/completions`.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    /// Model identifier.
    pub model: &'a str,
    /// System instruction followed by the user prompt.
    pub messages: [ChatMessage<'a>; 2],
    /// Token budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// One chat turn on the wire.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    /// `system` or `user`.
    pub role: &'static str,
    /// Turn text.
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: ChatUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Chat-completions client bound to one model and key.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Client for `model` at `base_url` (without the `/chat/completions` suffix).
    pub fn new(base_url: &str, model: String, api_key: String) -> Self {
        Self {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Provider described by `[llm]`, or `None` when no usable key is set.
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        let key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())?;
        Some(Self::new(&config.base_url, config.model.clone(), key.to_owned()))
    }
}

/// Wire body for `prompt`.
#[doc(hidden)]
pub fn build_request<'a>(model: &'a str, prompt: &'a Prompt) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: [
            ChatMessage {
                role: "system",
                content: &prompt.system,
            },
            ChatMessage {
                role: "user",
                content: &prompt.user,
            },
        ],
        max_tokens: prompt.max_tokens,
        temperature: prompt.temperature,
    }
}

/// Read the first choice of a chat-completions body.
///
/// # Errors
///
/// Returns [`ProviderError::Malformed`] for invalid JSON, no choices, or a
/// blank first choice.
#[doc(hidden)]
pub fn parse_completion(body: &str) -> Result<Completion, ProviderError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Malformed("no choices returned".to_owned()))?;
    let text = choice
        .message
        .content
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ProviderError::Malformed("first choice has no text".to_owned()))?
        .to_owned();

    Ok(Completion {
        text,
        finish: FinishReason::from_wire(choice.finish_reason.as_deref()),
        model: response.model,
        prompt_tokens: response.usage.prompt_tokens,
        completion_tokens: response.usage.completion_tokens,
    })
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&build_request(&self.model, prompt))
            .send()
            .await?;
        let completion = parse_completion(&read_success_body(response).await?)?;

        if completion.finish == FinishReason::Length {
            tracing::warn!(model = %completion.model, "completion hit the token budget");
        }
        tracing::debug!(
            model = %completion.model,
            prompt_tokens = completion.prompt_tokens,
            completion_tokens = completion.completion_tokens,
            "completion received"
        );
        Ok(completion)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
