//! Email record model and repository interface.
//!
//! [`EmailStore`] is the seam the queue, sender and API talk to.
//! [`SqliteEmailStore`] is the production implementation; [`stats`] adds the
//! aggregate queries behind the dashboard.

pub mod sqlite;
pub mod stats;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::{Category, ExtractedInfo, Priority, Sentiment};

pub use sqlite::SqliteEmailStore;

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// Handling state of an email.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    /// Awaiting a reply.
    #[default]
    Pending,
    /// A reply has been sent.
    Responded,
    /// Closed by an operator.
    Resolved,
}

impl EmailStatus {
    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Responded => "responded",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "responded" => Ok(Self::Responded),
            "resolved" => Ok(Self::Resolved),
            other => Err(StoreError::InvalidEnum {
                field: "status",
                value: other.to_owned(),
            }),
        }
    }
}

/// Record of a reply that was actually transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentResponse {
    /// Transport message id.
    pub message_id: String,
    /// When the reply left.
    pub sent_at: DateTime<Utc>,
    /// The text that was sent.
    pub response_text: String,
}

/// Attachment summary kept with an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    /// Original file name.
    pub filename: String,
    /// MIME type.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
}

/// Transport metadata carried over from ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailMetadata {
    /// Inbound `Message-ID`.
    pub message_id: Option<String>,
    /// Thread identifier, when the source has one.
    pub thread_id: Option<String>,
    /// Mailbox labels.
    pub labels: Vec<String>,
    /// Attachment summaries.
    pub attachments: Vec<AttachmentMeta>,
}

/// A persisted support email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    /// UUID v4.
    pub id: String,
    /// Lower-cased, trimmed sender address.
    pub sender_email: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
    /// When the email arrived.
    pub received_at: DateTime<Utc>,
    /// Body tone.
    pub sentiment: Sentiment,
    /// Queue priority.
    pub priority: Priority,
    /// Subject category.
    pub category: Category,
    /// Drafted reply, once generated.
    pub ai_response: Option<String>,
    /// Handling state.
    pub status: EmailStatus,
    /// Facts extracted from the body.
    pub extracted_info: ExtractedInfo,
    /// Milliseconds from receipt to reply.
    pub response_time_ms: Option<i64>,
    /// Transmitted reply, once sent.
    pub sent_response: Option<SentResponse>,
    /// Transport metadata.
    pub metadata: EmailMetadata,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
}

impl Email {
    /// New pending email with default labels and a fresh id.
    pub fn new(sender_email: &str, subject: &str, body: &str, received_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender_email: sender_email.trim().to_lowercase(),
            subject: subject.trim().to_owned(),
            body: body.to_owned(),
            received_at,
            sentiment: Sentiment::default(),
            priority: Priority::default(),
            category: Category::default(),
            ai_response: None,
            status: EmailStatus::Pending,
            extracted_info: ExtractedInfo::default(),
            response_time_ms: None,
            sent_response: None,
            metadata: EmailMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Column a listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    /// Arrival time.
    #[default]
    #[serde(alias = "receivedDate", alias = "received_at")]
    ReceivedAt,
    /// Row creation time.
    #[serde(alias = "created_at")]
    CreatedAt,
    /// Priority label.
    Priority,
    /// Sentiment label.
    Sentiment,
    /// Handling state.
    Status,
    /// Category label.
    Category,
}

impl SortField {
    /// SQL column name.
    pub fn column(self) -> &'static str {
        match self {
            Self::ReceivedAt => "received_at",
            Self::CreatedAt => "created_at",
            Self::Priority => "priority",
            Self::Sentiment => "sentiment",
            Self::Status => "status",
            Self::Category => "category",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

impl SortOrder {
    /// SQL keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Default page size for listings.
pub const DEFAULT_LIMIT: u32 = 50;

fn default_limit() -> Option<u32> {
    Some(DEFAULT_LIMIT)
}

/// Listing filter. Unset label fields match anything.
///
/// Without a priority filter, urgent emails sort ahead of normal ones as a
/// secondary key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailFilter {
    /// Only this priority.
    pub priority: Option<Priority>,
    /// Only this sentiment.
    pub sentiment: Option<Sentiment>,
    /// Only this handling state.
    pub status: Option<EmailStatus>,
    /// Only this category.
    pub category: Option<Category>,
    /// Page size; `None` returns every match.
    #[serde(default = "default_limit")]
    pub limit: Option<u32>,
    /// Rows to skip.
    pub skip: u32,
    /// Primary sort column.
    pub sort_by: SortField,
    /// Primary sort direction.
    pub sort_order: SortOrder,
}

impl Default for EmailFilter {
    fn default() -> Self {
        Self {
            priority: None,
            sentiment: None,
            status: None,
            category: None,
            limit: default_limit(),
            skip: 0,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from email repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem error preparing the database location.
    #[error("database path error: {0}")]
    Io(#[from] std::io::Error),

    /// An invalid enum value was read from the database.
    #[error("invalid {field} value: {value:?}")]
    InvalidEnum {
        /// Which field contained the bad value.
        field: &'static str,
        /// The unexpected value.
        value: String,
    },

    /// A stored JSON or timestamp column could not be decoded.
    #[error("corrupt {field} column: {reason}")]
    Corrupt {
        /// Which column failed to decode.
        field: &'static str,
        /// Decoder message.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Email repository.
#[async_trait]
pub trait EmailStore: Send + Sync {
    /// Look an email up by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    async fn find_by_id(&self, id: &str) -> Result<Option<Email>, StoreError>;

    /// Insert or replace an email.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    async fn save(&self, email: &Email) -> Result<(), StoreError>;

    /// List emails matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    async fn find(&self, filter: &EmailFilter) -> Result<Vec<Email>, StoreError>;

    /// First email with this sender and subject, used for duplicate detection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    async fn find_by_sender_and_subject(
        &self,
        sender_email: &str,
        subject: &str,
    ) -> Result<Option<Email>, StoreError>;

    /// Record a drafted reply without touching any other column, and return
    /// the current record. `None` when the email no longer exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    async fn set_ai_response(&self, id: &str, text: &str) -> Result<Option<Email>, StoreError>;

    /// Set the status of one email and return the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    async fn update_status(
        &self,
        id: &str,
        status: EmailStatus,
    ) -> Result<Option<Email>, StoreError>;

    /// Set the status of many emails. Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    async fn bulk_update_status(
        &self,
        ids: &[String],
        status: EmailStatus,
    ) -> Result<u64, StoreError>;

    /// Emails received in the last `hours`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    async fn find_recent(&self, hours: u32) -> Result<Vec<Email>, StoreError>;

    /// Emails with the given ids, newest first. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure.
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Email>, StoreError>;
}

// ---------------------------------------------------------------------------
// Timestamp encoding
// ---------------------------------------------------------------------------

/// Encode a timestamp for storage. Fixed width, so lexical order is time order.
pub(crate) fn ts_to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a stored timestamp.
pub(crate) fn ts_from_db(field: &'static str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            field,
            reason: e.to_string(),
        })
}
