//! Batch content analysis and summaries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use supportdesk::classifier::{Priority, Sentiment};
use supportdesk::config::LlmConfig;
use supportdesk::knowledge::KnowledgeBase;
use supportdesk::providers::{Completion, FinishReason, LlmProvider, Prompt, ProviderError};
use supportdesk::responder::insights::analyze_content;
use supportdesk::responder::LlmResponder;
use supportdesk::store::Email;

struct EchoCount;

#[async_trait]
impl LlmProvider for EchoCount {
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, ProviderError> {
        let lines = prompt.user.matches("Subject: ").count();
        Ok(Completion {
            text: format!("{lines} emails summarised"),
            finish: FinishReason::Stop,
            model: "echo".to_owned(),
            prompt_tokens: 0,
            completion_tokens: 0,
        })
    }

    fn model_id(&self) -> &str {
        "echo"
    }
}

struct Broken;

#[async_trait]
impl LlmProvider for Broken {
    async fn complete(&self, _prompt: &Prompt) -> Result<Completion, ProviderError> {
        Err(ProviderError::Malformed("garbled".to_owned()))
    }

    fn model_id(&self) -> &str {
        "broken"
    }
}

fn email(body: &str, priority: Priority, sentiment: Sentiment, products: &[&str]) -> Email {
    let mut e = Email::new("a@x.com", "subject", body, Utc::now());
    e.priority = priority;
    e.sentiment = sentiment;
    e.extracted_info.mentioned_products = products.iter().map(|p| (*p).to_owned()).collect();
    e
}

fn responder(provider: Option<Arc<dyn LlmProvider>>) -> LlmResponder {
    LlmResponder::new(provider, Arc::new(KnowledgeBase::new()), &LlmConfig::default())
}

#[test]
fn content_analysis_counts_issue_words_and_labels() {
    let emails = vec![
        email(
            "The dashboard is broken, error everywhere. Urgent!",
            Priority::Urgent,
            Sentiment::Negative,
            &["dashboard"],
        ),
        email("Another error.", Priority::Normal, Sentiment::Negative, &["dashboard", "api"]),
        email("Thanks a lot", Priority::Normal, Sentiment::Positive, &[]),
    ];

    let analysis = analyze_content(&emails);

    assert_eq!(analysis.common_issues.get("error"), Some(&2));
    assert_eq!(analysis.common_issues.get("broken"), Some(&1));
    assert_eq!(analysis.common_issues.get("urgent"), Some(&1));
    assert_eq!(analysis.sentiment_trends.get("negative"), Some(&2));
    assert_eq!(analysis.sentiment_trends.get("positive"), Some(&1));
    assert_eq!(analysis.urgency_patterns.get("normal"), Some(&2));
    assert_eq!(analysis.product_mentions.get("dashboard"), Some(&2));
    assert_eq!(analysis.product_mentions.get("api"), Some(&1));
}

#[test]
fn empty_batch_has_empty_tables() {
    let analysis = analyze_content(&[]);
    assert!(analysis.common_issues.is_empty());
    assert!(analysis.sentiment_trends.is_empty());

    let json = serde_json::to_value(&analysis).expect("analysis should serialise");
    assert!(json["commonIssues"].is_object());
}

#[tokio::test]
async fn summary_covers_at_most_ten_emails() {
    let emails: Vec<Email> = (0..12)
        .map(|_| email("hi", Priority::Normal, Sentiment::Neutral, &[]))
        .collect();
    let summary = responder(Some(Arc::new(EchoCount))).batch_summary(&emails).await;
    assert_eq!(summary, "10 emails summarised");
}

#[tokio::test]
async fn summary_falls_back_without_provider_or_emails() {
    let one = vec![email("hi", Priority::Normal, Sentiment::Neutral, &[])];
    let expected = "No emails to summarize or AI service unavailable.";

    assert_eq!(responder(None).batch_summary(&one).await, expected);
    assert_eq!(
        responder(Some(Arc::new(EchoCount))).batch_summary(&[]).await,
        expected
    );
}

#[tokio::test]
async fn summary_provider_failure_has_fixed_message() {
    let one = vec![email("hi", Priority::Normal, Sentiment::Neutral, &[])];
    assert_eq!(
        responder(Some(Arc::new(Broken))).batch_summary(&one).await,
        "Unable to generate summary at this time."
    );
}
