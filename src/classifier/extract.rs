//! Regex extraction of contact details, products and requests from a body.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::URGENT_KEYWORDS;

/// Product and service names worth surfacing to an agent.
pub(crate) const PRODUCT_KEYWORDS: &[&str] = &[
    "account",
    "subscription",
    "billing",
    "payment",
    "login",
    "password",
    "api",
    "integration",
    "webhook",
    "authentication",
    "oauth",
    "token",
    "database",
    "server",
    "service",
    "platform",
    "dashboard",
    "analytics",
];

const REQUIREMENT_PHRASES: &[&str] = &[
    "need to",
    "want to",
    "would like to",
    "can you",
    "please",
    "help me",
    "assist with",
];

const MAX_REQUIREMENTS: usize = 3;
const MIN_REQUIREMENT_CHARS: usize = 10;

static PHONE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}").ok()
});

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").ok());

static SENTENCE_END: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[.!?]+").ok());

/// Structured facts pulled out of an email body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedInfo {
    /// Distinct phone numbers, in order of first appearance.
    pub phone_numbers: Vec<String>,
    /// Distinct email addresses, in order of first appearance.
    pub email_addresses: Vec<String>,
    /// Product keywords mentioned anywhere in the body.
    pub mentioned_products: Vec<String>,
    /// Urgency keywords mentioned anywhere in the body.
    pub urgency_indicators: Vec<String>,
    /// Up to three sentences that ask for something.
    pub customer_requirements: Vec<String>,
}

/// Extract phones, addresses, products, urgency markers and requests from `body`.
pub fn extract_information(body: &str) -> ExtractedInfo {
    let lower = body.to_lowercase();

    let customer_requirements = match SENTENCE_END.as_ref() {
        Some(re) => re
            .split(body)
            .filter(|sentence| {
                let s = sentence.to_lowercase();
                REQUIREMENT_PHRASES.iter().any(|p| s.contains(p))
            })
            .map(str::trim)
            .filter(|s| s.chars().count() > MIN_REQUIREMENT_CHARS)
            .take(MAX_REQUIREMENTS)
            .map(str::to_owned)
            .collect(),
        None => Vec::new(),
    };

    ExtractedInfo {
        phone_numbers: distinct_matches(PHONE.as_ref(), body),
        email_addresses: distinct_matches(EMAIL.as_ref(), body),
        mentioned_products: keyword_hits(PRODUCT_KEYWORDS, &lower),
        urgency_indicators: keyword_hits(URGENT_KEYWORDS, &lower),
        customer_requirements,
    }
}

fn distinct_matches(re: Option<&Regex>, text: &str) -> Vec<String> {
    let Some(re) = re else {
        return Vec::new();
    };
    let mut out: Vec<String> = Vec::new();
    for m in re.find_iter(text) {
        let s = m.as_str().trim();
        if !out.iter().any(|seen| seen == s) {
            out.push(s.to_owned());
        }
    }
    out
}

fn keyword_hits(keywords: &[&str], lower: &str) -> Vec<String> {
    keywords
        .iter()
        .filter(|k| lower.contains(*k))
        .map(|k| (*k).to_owned())
        .collect()
}
