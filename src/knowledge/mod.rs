//! Knowledge base used to ground generated replies.
//!
//! A small keyword-indexed table of support articles. Lookups score each
//! entry by how often its keywords occur in the email; the best entry's
//! context and suggested solutions are injected into the reply prompt.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Category used when nothing in an email matches.
pub const GENERAL_SUPPORT: &str = "general_support";

/// One knowledge base article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Lower-case trigger phrases.
    pub keywords: Vec<String>,
    /// Free-form background text for the prompt.
    pub context: String,
    /// Ordered suggestions an agent can offer.
    pub solutions: Vec<String>,
}

/// A scored match returned by [`KnowledgeBase::find_relevant`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevantKnowledge {
    /// Entry key.
    pub category: String,
    /// Total keyword occurrences in the email.
    pub match_score: usize,
    /// The matched entry.
    #[serde(flatten)]
    pub entry: KnowledgeEntry,
}

/// A match returned by [`KnowledgeBase::search`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// Entry key.
    pub category: String,
    /// 2 when the query appears in the context text, 1 for a keyword match.
    pub relevance: u8,
    /// The matched entry.
    #[serde(flatten)]
    pub entry: KnowledgeEntry,
}

/// Partial update applied by [`KnowledgeBase::update`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnowledgePatch {
    /// Replacement keywords.
    pub keywords: Option<Vec<String>>,
    /// Replacement context.
    pub context: Option<String>,
    /// Replacement solutions.
    pub solutions: Option<Vec<String>>,
}

/// Thread-safe keyword-scored knowledge base.
#[derive(Debug)]
pub struct KnowledgeBase {
    entries: RwLock<BTreeMap<String, KnowledgeEntry>>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::with_entries(builtin_entries())
    }
}

impl KnowledgeBase {
    /// Knowledge base seeded with the built-in support articles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Knowledge base over an explicit set of entries.
    pub fn with_entries(entries: impl IntoIterator<Item = (String, KnowledgeEntry)>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, KnowledgeEntry>> {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, KnowledgeEntry>> {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Entries whose keywords occur in the email, best first.
    pub fn find_relevant(&self, subject: &str, body: &str) -> Vec<RelevantKnowledge> {
        let text = format!("{subject} {body}").to_lowercase();
        let mut hits: Vec<RelevantKnowledge> = self
            .read()
            .iter()
            .filter_map(|(category, entry)| {
                let match_score = entry
                    .keywords
                    .iter()
                    .map(|k| k.to_lowercase())
                    .filter(|k| !k.is_empty())
                    .map(|k| text.matches(k.as_str()).count())
                    .fold(0_usize, usize::saturating_add);
                (match_score > 0).then(|| RelevantKnowledge {
                    category: category.clone(),
                    match_score,
                    entry: entry.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.match_score.cmp(&a.match_score));
        hits
    }

    /// Prompt context for an email: the best entry's context followed by its
    /// numbered solutions, or the general support context when nothing matches.
    pub fn context_for(&self, subject: &str, body: &str) -> String {
        let Some(best) = self.find_relevant(subject, body).into_iter().next() else {
            return self
                .read()
                .get(GENERAL_SUPPORT)
                .map(|e| e.context.clone())
                .unwrap_or_default();
        };

        let mut context = best.entry.context;
        if !best.entry.solutions.is_empty() {
            context.push_str("\n\nSuggested solutions:\n");
            context.push_str(&numbered(&best.entry.solutions));
        }
        context
    }

    /// Solutions of the best matching entry, or the general support ones.
    pub fn suggested_solutions(&self, subject: &str, body: &str) -> Vec<String> {
        match self.find_relevant(subject, body).into_iter().next() {
            Some(best) => best.entry.solutions,
            None => self
                .read()
                .get(GENERAL_SUPPORT)
                .map(|e| e.solutions.clone())
                .unwrap_or_default(),
        }
    }

    /// All entry keys.
    pub fn categories(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Full-text search over context and keywords.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let query = query.to_lowercase();
        let mut hits: Vec<SearchHit> = self
            .read()
            .iter()
            .filter_map(|(category, entry)| {
                let context_match = entry.context.to_lowercase().contains(&query);
                let keyword_match = entry.keywords.iter().any(|k| {
                    let k = k.to_lowercase();
                    k.contains(&query) || query.contains(&k)
                });
                (context_match || keyword_match).then(|| SearchHit {
                    category: category.clone(),
                    relevance: if context_match { 2 } else { 1 },
                    entry: entry.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.relevance.cmp(&a.relevance));
        hits
    }

    /// Entry stored under `category`.
    pub fn get(&self, category: &str) -> Option<KnowledgeEntry> {
        self.read().get(category).cloned()
    }

    /// Insert or replace an entry.
    pub fn add(&self, category: &str, entry: KnowledgeEntry) {
        tracing::info!(category, "knowledge entry added");
        self.write().insert(category.to_owned(), entry);
    }

    /// Merge `patch` into an existing entry. Returns `false` when `category` is unknown.
    pub fn update(&self, category: &str, patch: KnowledgePatch) -> bool {
        let mut entries = self.write();
        let Some(entry) = entries.get_mut(category) else {
            return false;
        };
        if let Some(keywords) = patch.keywords {
            entry.keywords = keywords;
        }
        if let Some(context) = patch.context {
            entry.context = context;
        }
        if let Some(solutions) = patch.solutions {
            entry.solutions = solutions;
        }
        tracing::info!(category, "knowledge entry updated");
        true
    }
}

/// `1. a\n2. b\n` rendering used in prompts.
pub fn numbered(items: &[String]) -> String {
    items
        .iter()
        .zip(1_usize..)
        .map(|(item, n)| format!("{n}. {item}\n"))
        .collect()
}

fn entry(keywords: &[&str], context: &str, solutions: &[&str]) -> KnowledgeEntry {
    KnowledgeEntry {
        keywords: keywords.iter().map(|s| (*s).to_owned()).collect(),
        context: context.to_owned(),
        solutions: solutions.iter().map(|s| (*s).to_owned()).collect(),
    }
}

fn builtin_entries() -> Vec<(String, KnowledgeEntry)> {
    vec![
        (
            "account_access".to_owned(),
            entry(
                &["login", "password", "access", "account", "credentials", "sign in"],
                "Common account access solutions:\n\
                 1. Password reset: users can reset passwords via the \"Forgot Password\" link\n\
                 2. Account lockout: accounts lock for 30 minutes after 5 failed attempts\n\
                 3. Two-factor authentication: when enabled, both password and 2FA code are required\n\
                 4. Browser issues: clear cache and cookies or try a private window\n\
                 5. Account suspension: check whether the account is suspended for policy violations\n\
                 Escalation: persistent issues go to the technical support team.",
                &[
                    "Try password reset using the \"Forgot Password\" link",
                    "Clear browser cache and cookies",
                    "Try accessing from an incognito/private browser window",
                    "Check if two-factor authentication is enabled",
                    "Wait 30 minutes if account is temporarily locked",
                ],
            ),
        ),
        (
            "api_integration".to_owned(),
            entry(
                &["api", "integration", "webhook", "authentication", "oauth", "token", "endpoint"],
                "API integration support:\n\
                 1. Authentication: OAuth 2.0 with the client credentials flow\n\
                 2. Rate limits: 1000 requests per hour on standard plans, 10000 on enterprise\n\
                 3. Webhooks: configure webhook URLs in dashboard settings\n\
                 4. Documentation: https://docs.example.com/api\n\
                 5. Testing: use sandbox.example.com\n\
                 Common issues: invalid API keys (regenerate in dashboard), rate limiting \
                 (use exponential backoff), webhook failures (check endpoint reachability and TLS).",
                &[
                    "Verify API key is correct and active",
                    "Check rate limiting and implement proper backoff",
                    "Ensure webhook endpoints are accessible and use HTTPS",
                    "Review API documentation for correct request format",
                    "Test in sandbox environment first",
                ],
            ),
        ),
        (
            "billing_subscription".to_owned(),
            entry(
                &["billing", "payment", "subscription", "invoice", "charge", "plan", "upgrade"],
                "Billing and subscription information:\n\
                 1. Billing cycles: monthly or annual\n\
                 2. Payment methods: credit card, PayPal, bank transfer (enterprise)\n\
                 3. Plan changes: upgrades apply immediately, downgrades at the next cycle\n\
                 4. Refunds: within 30 days for annual plans\n\
                 5. Invoices: account dashboard under \"Billing\"\n\
                 Plans: Basic 1000 API calls/month with email support; Pro 10000 calls/month with \
                 priority support and webhooks; Enterprise unlimited calls, dedicated support, SLA.",
                &[
                    "Check billing section in account dashboard",
                    "Update payment method if card expired",
                    "Contact billing team for refund requests",
                    "Review plan features and upgrade if needed",
                    "Download invoices from dashboard for accounting",
                ],
            ),
        ),
        (
            "technical_issues".to_owned(),
            entry(
                &["error", "bug", "broken", "not working", "issue", "problem", "down", "outage"],
                "Technical issue resolution:\n\
                 1. System status: check status.example.com for known incidents\n\
                 2. Error codes: see the error code reference\n\
                 3. Logs: enable debug logging for detailed errors\n\
                 4. Browsers: Chrome 90+, Firefox 88+, Safari 14+\n\
                 5. Mobile: iOS 14+ and Android 10+\n\
                 Troubleshooting: check the status page, review error logs, try another \
                 browser or device, clear application cache, test basic connectivity.",
                &[
                    "Check system status page for known issues",
                    "Clear browser cache and application data",
                    "Try accessing from different browser or device",
                    "Review error logs for specific error codes",
                    "Test basic connectivity and DNS resolution",
                ],
            ),
        ),
        (
            GENERAL_SUPPORT.to_owned(),
            entry(
                &["help", "support", "question", "how to", "guide", "tutorial"],
                "General support resources:\n\
                 1. Documentation: docs.example.com\n\
                 2. Video tutorials on our YouTube channel\n\
                 3. Community forum: community.example.com\n\
                 4. Support hours: Monday-Friday 9AM-6PM EST\n\
                 5. Response times: 24 hours standard, 4 hours priority, 1 hour enterprise\n\
                 Self-service: 500+ knowledge base articles, interactive tutorials, FAQ, \
                 community solutions.",
                &[
                    "Check our comprehensive documentation",
                    "Watch video tutorials for step-by-step guidance",
                    "Search the knowledge base for similar issues",
                    "Join our community forum for peer support",
                    "Contact support team for personalized assistance",
                ],
            ),
        ),
    ]
}
