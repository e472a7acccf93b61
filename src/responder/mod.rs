//! Reply drafting.
//!
//! [`ResponseGenerator`] is the seam the queue calls to fill in a missing
//! reply. [`LlmResponder`] grounds the prompt in the knowledge base and asks
//! the configured [`LlmProvider`]; without a provider it renders a fixed
//! template so the pipeline still produces a reply.

pub mod insights;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::classifier::{ExtractedInfo, Priority, Sentiment};
use crate::config::LlmConfig;
use crate::knowledge::{numbered, KnowledgeBase};
use crate::providers::{LlmProvider, Prompt, ProviderError};
use crate::store::Email;

/// Fields of an email a reply is drafted from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplyRequest {
    /// Subject line.
    pub subject: String,
    /// Sender address.
    pub sender_email: String,
    /// Plain text body.
    pub body: String,
    /// Body tone.
    pub sentiment: Sentiment,
    /// Queue priority.
    pub priority: Priority,
    /// Facts extracted from the body.
    pub extracted_info: ExtractedInfo,
}

impl From<&Email> for ReplyRequest {
    fn from(email: &Email) -> Self {
        Self {
            subject: email.subject.clone(),
            sender_email: email.sender_email.clone(),
            body: email.body.clone(),
            sentiment: email.sentiment,
            priority: email.priority,
            extracted_info: email.extracted_info.clone(),
        }
    }
}

/// Errors from reply generation.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The model provider failed.
    #[error("response generation failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Drafts a reply for one email.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Draft a reply, optionally steered by operator-supplied context.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] when the backing model fails.
    async fn generate(
        &self,
        request: &ReplyRequest,
        custom_context: Option<&str>,
    ) -> Result<String, GenerationError>;
}

const SYSTEM_PROMPT: &str = "You are a professional customer support representative with access \
to a comprehensive knowledge base. Generate a helpful, empathetic response to customer emails \
using the provided knowledge base context.

Guidelines:
1. Be professional, friendly, and empathetic
2. Address the customer's specific concerns mentioned in their email
3. If the sentiment is negative, acknowledge their frustration with empathy
4. Use the knowledge base context to provide accurate, helpful information
5. Provide actionable next steps when possible
6. Keep responses concise but comprehensive (150-300 words)
7. Use a warm, helpful tone
8. Include relevant information based on extracted details
9. If urgent, acknowledge the priority and provide timeline expectations
10. Reference specific solutions from the knowledge base when applicable";

/// Knowledge-grounded generator backed by an optional LLM provider.
pub struct LlmResponder {
    provider: Option<Arc<dyn LlmProvider>>,
    knowledge: Arc<KnowledgeBase>,
    max_tokens: u32,
    temperature: f32,
}

impl LlmResponder {
    /// Build a responder. `provider = None` selects the template reply.
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        knowledge: Arc<KnowledgeBase>,
        config: &LlmConfig,
    ) -> Self {
        Self {
            provider,
            knowledge,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Whether replies come from a model rather than the template.
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Model id of the configured provider.
    pub fn model_id(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.model_id())
    }

    pub(crate) fn provider(&self) -> Option<&Arc<dyn LlmProvider>> {
        self.provider.as_ref()
    }

    /// System prompt with the knowledge context for `request`.
    #[doc(hidden)]
    pub fn system_prompt(&self, request: &ReplyRequest) -> String {
        let context = self.knowledge.context_for(&request.subject, &request.body);
        let solutions = self
            .knowledge
            .suggested_solutions(&request.subject, &request.body);
        format!(
            "{SYSTEM_PROMPT}\n\nKnowledge Base Context:\n{}\n\nAvailable Solutions:\n{}",
            context.trim(),
            numbered(&solutions).trim_end()
        )
    }
}

/// User prompt describing the email and its extracted facts.
#[doc(hidden)]
pub fn user_prompt(request: &ReplyRequest, custom_context: Option<&str>) -> String {
    let info = &request.extracted_info;
    let mut facts: Vec<String> = Vec::new();
    if !info.phone_numbers.is_empty() {
        facts.push(format!("- Phone Numbers: {}", info.phone_numbers.join(", ")));
    }
    if !info.mentioned_products.is_empty() {
        facts.push(format!(
            "- Mentioned Products/Services: {}",
            info.mentioned_products.join(", ")
        ));
    }
    if !info.urgency_indicators.is_empty() {
        facts.push(format!(
            "- Urgency Indicators: {}",
            info.urgency_indicators.join(", ")
        ));
    }
    if !info.customer_requirements.is_empty() {
        facts.push(format!(
            "- Customer Requirements: {}",
            info.customer_requirements.join("; ")
        ));
    }

    let mut prompt = format!(
        "Please generate a response to this customer email using the knowledge base context \
         provided:\n\nEmail Details:\n- From: {}\n- Subject: {}\n- Priority: {}\n- Sentiment: {}\n\
         - Body: {}\n\nExtracted Information:\n{}\n",
        request.sender_email,
        request.subject,
        request.priority,
        request.sentiment,
        request.body,
        facts.join("\n"),
    );
    if let Some(extra) = custom_context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("\nAdditional Context: {extra}\n"));
    }
    prompt.push_str(
        "\nGenerate a professional, helpful response that addresses their concerns using the \
         knowledge base information.",
    );
    prompt
}

/// Deterministic reply used when no model is configured.
pub fn fallback_response(request: &ReplyRequest) -> String {
    let name = request
        .sender_email
        .split('@')
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("customer");
    let urgent = request.priority == Priority::Urgent;

    let mut reply = format!("Dear {name},\n\n");
    reply.push_str(match request.sentiment {
        Sentiment::Negative => {
            "Thank you for reaching out to us, and I sincerely apologize for any inconvenience \
             you've experienced. "
        }
        Sentiment::Positive => {
            "Thank you so much for your kind words and for taking the time to contact us. "
        }
        Sentiment::Neutral => "Thank you for contacting our support team. ",
    });
    if urgent {
        reply.push_str(
            "I understand this is an urgent matter, and I want to assure you that we're treating \
             it with the highest priority. ",
        );
    }
    reply.push_str("We have received your message and our team is reviewing your request carefully. ");
    reply.push_str(if urgent {
        "Given the urgent nature of your inquiry, you can expect a detailed response within 2-4 hours. "
    } else {
        "You can expect a detailed response within 24 hours. "
    });
    reply.push_str(
        "If you have any additional information that might help us assist you better, please \
         don't hesitate to reply to this email.\n\nBest regards,\nCustomer Support Team",
    );
    reply
}

#[async_trait]
impl ResponseGenerator for LlmResponder {
    async fn generate(
        &self,
        request: &ReplyRequest,
        custom_context: Option<&str>,
    ) -> Result<String, GenerationError> {
        let Some(provider) = &self.provider else {
            tracing::debug!(subject = %request.subject, "no provider configured, using template reply");
            return Ok(fallback_response(request));
        };

        let completion = provider
            .complete(&Prompt {
                system: self.system_prompt(request),
                user: user_prompt(request, custom_context),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            })
            .await?;
        Ok(completion.text)
    }
}
