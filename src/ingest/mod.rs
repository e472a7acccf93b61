//! Inbound email intake.
//!
//! Turns raw messages from any source into classified, persisted
//! [`Email`] records and enqueues each one with its classified priority.

mod sample;

pub use sample::sample_inbox;

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::classifier::{self, is_support_email};
use crate::queue::PriorityQueue;
use crate::store::{AttachmentMeta, Email, EmailMetadata, EmailStatus, EmailStore};

/// Sender address used when a message has no usable `From`.
pub const UNKNOWN_SENDER: &str = "unknown@example.com";

static ANGLE_ADDRESS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<(.+?)>").ok());

/// A message as fetched from a mailbox, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEmail {
    /// Inbound `Message-ID`, if the source provided one.
    pub message_id: Option<String>,
    /// Raw `From` header, `Name <addr>` or a bare address.
    pub from: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
    /// `Date` header; arrival time defaults to now.
    pub date: Option<DateTime<Utc>>,
    /// Attachment summaries.
    pub attachments: Vec<AttachmentMeta>,
}

/// Pull the address out of a `From` header.
///
/// `"Jane <jane@x.com>"` yields `jane@x.com`; a header without angle brackets
/// is returned trimmed; an empty header yields [`UNKNOWN_SENDER`].
pub fn extract_address(from: &str) -> String {
    let from = from.trim();
    if from.is_empty() {
        return UNKNOWN_SENDER.to_owned();
    }
    ANGLE_ADDRESS
        .as_ref()
        .and_then(|re| re.captures(from))
        .and_then(|caps| caps.get(1))
        .map_or_else(|| from.to_owned(), |m| m.as_str().trim().to_owned())
}

/// Classifies, persists and enqueues raw emails.
pub struct Ingestor {
    store: Arc<dyn EmailStore>,
    queue: Arc<PriorityQueue>,
}

impl Ingestor {
    /// Ingestor writing to `store` and feeding `queue`.
    pub fn new(store: Arc<dyn EmailStore>, queue: Arc<PriorityQueue>) -> Self {
        Self { store, queue }
    }

    /// Ingest a batch and return the newly stored emails.
    ///
    /// Messages that do not look like support mail, or that repeat the sender
    /// and subject of a stored email, are skipped. A failure on one message is
    /// logged and does not stop the rest.
    pub async fn ingest(&self, raws: Vec<RawEmail>) -> Vec<Email> {
        let mut stored = Vec::with_capacity(raws.len());
        for raw in raws {
            let subject = raw.subject.clone();
            match self.ingest_one(raw).await {
                Ok(Some(email)) => stored.push(email),
                Ok(None) => {}
                Err(e) => warn!(%subject, error = %e, "failed to ingest email"),
            }
        }
        info!(stored = stored.len(), "ingest batch finished");
        stored
    }

    async fn ingest_one(&self, raw: RawEmail) -> anyhow::Result<Option<Email>> {
        if !is_support_email(&raw.subject, &raw.body) {
            debug!(subject = %raw.subject, "not a support email, skipping");
            return Ok(None);
        }

        let sender = extract_address(&raw.from).to_lowercase();
        if let Some(existing) = self
            .store
            .find_by_sender_and_subject(&sender, raw.subject.trim())
            .await?
        {
            if existing.status == EmailStatus::Pending && existing.ai_response.is_none() {
                self.queue.enqueue(&existing.id, existing.priority).await?;
                debug!(email_id = %existing.id, "already ingested, still unanswered, queued");
            } else {
                debug!(%sender, subject = %raw.subject, "already ingested, skipping");
            }
            return Ok(None);
        }

        let labels = classifier::classify(&raw.subject, &raw.body);
        let mut email = Email::new(
            &sender,
            &raw.subject,
            &raw.body,
            raw.date.unwrap_or_else(Utc::now),
        );
        email.sentiment = labels.sentiment;
        email.priority = labels.priority;
        email.category = labels.category;
        email.extracted_info = labels.extracted_info;
        email.metadata = EmailMetadata {
            message_id: raw.message_id,
            thread_id: None,
            labels: vec!["inbox".to_owned()],
            attachments: raw.attachments,
        };

        self.store.save(&email).await?;
        if let Err(e) = self.queue.enqueue(&email.id, email.priority).await {
            error!(
                email_id = %email.id,
                error = %e,
                "email stored but not queued, will be queued when it is seen again"
            );
            return Err(e.into());
        }
        info!(
            email_id = %email.id,
            priority = %email.priority,
            sentiment = %email.sentiment,
            "email ingested"
        );
        Ok(Some(email))
    }
}
