//! Rule-based email classification.
//!
//! Every function here is pure and deterministic: priority and category come
//! from case-insensitive keyword and regex rules, sentiment from word lists,
//! and [`extract_information`] pulls structured facts out of a body.
//!
//! The priority label decides queue ordering (see [`crate::queue`]).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

mod extract;
mod sentiment;

pub use extract::{extract_information, ExtractedInfo};
pub use sentiment::{analyze_sentiment, sentiment_score};
pub(crate) use sentiment::{tokenize, NEGATIVE_WORDS};

/// Keywords that mark an email as urgent when found anywhere in subject or body.
pub const URGENT_KEYWORDS: &[&str] = &[
    "urgent",
    "critical",
    "immediately",
    "asap",
    "emergency",
    "cannot access",
    "down",
    "broken",
    "critical issue",
    "production down",
    "losing money",
    "business impact",
    "escalate",
    "priority",
    "crisis",
];

/// Time-sensitive phrases, matched case-insensitively.
const TIME_SENSITIVE_PATTERNS: &[&str] = &[
    r"(?i)asap",
    r"(?i)as soon as possible",
    r"(?i)immediately",
    r"(?i)right away",
    r"(?i)urgent",
    r"(?i)critical",
    r"(?i)emergency",
    r"(?i)production.*down",
    r"(?i)cannot.*access",
    r"(?i)system.*down",
];

/// Words that identify an inbound message as a support request.
const SUPPORT_KEYWORDS: &[&str] = &[
    "support",
    "query",
    "request",
    "help",
    "issue",
    "problem",
    "bug",
    "error",
    "assistance",
];

static TIME_SENSITIVE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    TIME_SENSITIVE_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Error returned when parsing an unknown label string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseLabelError {
    kind: &'static str,
    value: String,
}

macro_rules! label_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Lower-case wire/storage form.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseLabelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $( $text => Ok(Self::$variant), )+
                    _ => Err(ParseLabelError { kind: $kind, value: s.to_owned() }),
                }
            }
        }
    };
}

label_enum! {
    /// Queue priority assigned to an email.
    Priority, "priority" {
        /// Needs attention now; processed ahead of normal mail and auto-sent.
        Urgent => "urgent",
        /// Everything else.
        Normal => "normal",
    }
}

label_enum! {
    /// Coarse category derived from the subject line.
    Category, "category" {
        /// Default bucket.
        Support => "support",
        /// Questions.
        Query => "query",
        /// Explicit requests.
        Request => "request",
        /// Help wanted.
        Help => "help",
    }
}

label_enum! {
    /// Overall tone of an email body.
    Sentiment, "sentiment" {
        /// Praise or thanks.
        Positive => "positive",
        /// Complaints or frustration.
        Negative => "negative",
        /// Neither.
        Neutral => "neutral",
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::Support
    }
}

impl Default for Sentiment {
    fn default() -> Self {
        Self::Neutral
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Classify priority from subject and body.
///
/// Urgent when any urgency keyword occurs as a substring of
/// `subject + " " + body` or any time-sensitive pattern matches; normal
/// otherwise. There is no scoring.
pub fn classify_priority(subject: &str, body: &str) -> Priority {
    let text = format!("{subject} {body}").to_lowercase();

    let has_keyword = URGENT_KEYWORDS.iter().any(|k| text.contains(k));
    let has_pattern = TIME_SENSITIVE.iter().any(|re| re.is_match(&text));

    if has_keyword || has_pattern {
        Priority::Urgent
    } else {
        Priority::Normal
    }
}

/// Classify category from the subject line. First match wins.
pub fn classify_category(subject: &str) -> Category {
    let subject = subject.to_lowercase();
    if subject.contains("query") || subject.contains("question") {
        Category::Query
    } else if subject.contains("request") {
        Category::Request
    } else if subject.contains("help") {
        Category::Help
    } else {
        Category::Support
    }
}

/// Whether an inbound message looks like a support request at all.
pub fn is_support_email(subject: &str, body: &str) -> bool {
    let text = format!("{subject} {body}").to_lowercase();
    SUPPORT_KEYWORDS.iter().any(|k| text.contains(k))
}

/// All labels and facts derived from one email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Queue priority.
    pub priority: Priority,
    /// Subject-derived category.
    pub category: Category,
    /// Body tone.
    pub sentiment: Sentiment,
    /// Structured facts from the body.
    pub extracted_info: ExtractedInfo,
}

/// Run every classifier over one email.
pub fn classify(subject: &str, body: &str) -> Classification {
    Classification {
        priority: classify_priority(subject, body),
        category: classify_category(subject),
        sentiment: analyze_sentiment(body),
        extracted_info: extract_information(body),
    }
}
