//! Batch insights over a set of emails.

use std::collections::BTreeMap;

use serde::Serialize;

use super::LlmResponder;
use crate::classifier::{tokenize, NEGATIVE_WORDS, URGENT_KEYWORDS};
use crate::providers::Prompt;
use crate::store::Email;

const SUMMARY_BATCH: usize = 10;
const SUMMARY_MAX_TOKENS: u32 = 300;
const SUMMARY_TEMPERATURE: f32 = 0.5;

/// Frequency tables over a batch of emails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAnalysis {
    /// Complaint and urgency words seen in bodies.
    pub common_issues: BTreeMap<String, u64>,
    /// Emails per sentiment.
    pub sentiment_trends: BTreeMap<String, u64>,
    /// Emails per priority.
    pub urgency_patterns: BTreeMap<String, u64>,
    /// Extracted product mentions.
    pub product_mentions: BTreeMap<String, u64>,
}

fn bump(map: &mut BTreeMap<String, u64>, key: &str) {
    let n = map.entry(key.to_owned()).or_insert(0);
    *n = n.saturating_add(1);
}

/// Count issue words, sentiments, priorities and product mentions.
pub fn analyze_content(emails: &[Email]) -> ContentAnalysis {
    let mut analysis = ContentAnalysis::default();
    for email in emails {
        for word in tokenize(&email.body).filter(|w| {
            NEGATIVE_WORDS.contains(&w.as_str()) || URGENT_KEYWORDS.contains(&w.as_str())
        }) {
            bump(&mut analysis.common_issues, &word);
        }
        bump(&mut analysis.sentiment_trends, email.sentiment.as_str());
        bump(&mut analysis.urgency_patterns, email.priority.as_str());
        for product in &email.extracted_info.mentioned_products {
            bump(&mut analysis.product_mentions, product);
        }
    }
    analysis
}

impl LlmResponder {
    /// Short narrative summary of up to ten emails.
    ///
    /// Falls back to a fixed sentence when there is nothing to summarise, no
    /// provider is configured, or the provider fails.
    pub async fn batch_summary(&self, emails: &[Email]) -> String {
        let Some(provider) = self.provider().filter(|_| !emails.is_empty()) else {
            return "No emails to summarize or AI service unavailable.".to_owned();
        };

        let lines = emails
            .iter()
            .take(SUMMARY_BATCH)
            .map(|e| {
                format!(
                    "Subject: {} | Sender: {} | Priority: {} | Sentiment: {}",
                    e.subject, e.sender_email, e.priority, e.sentiment
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = Prompt {
            system: "You are an AI assistant that summarizes customer support email batches. \
                     Provide a concise summary highlighting key trends, urgent issues, and \
                     overall sentiment."
                .to_owned(),
            user: format!(
                "Please provide a summary of these customer support emails:\n\n{lines}\n\n\
                 Focus on: urgent issues, common themes, sentiment distribution, and any \
                 patterns you notice."
            ),
            max_tokens: SUMMARY_MAX_TOKENS,
            temperature: SUMMARY_TEMPERATURE,
        };

        match provider.complete(&prompt).await {
            Ok(completion) => completion.text,
            Err(e) => {
                tracing::warn!(error = %e, "batch summary failed");
                "Unable to generate summary at this time.".to_owned()
            }
        }
    }
}
