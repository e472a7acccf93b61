//! Queue item lifecycle and report types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classifier::Priority;

/// Position of a queue item in its lifecycle.
///
/// ```text
/// queued -> processing -> completed
///                      -> queued     (failure, attempts < max_attempts)
///                      -> failed     (failure, attempts >= max_attempts, or email missing)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Waiting for a sweep.
    Queued,
    /// Selected by a sweep and running.
    Processing,
    /// Finished successfully. Terminal.
    Completed,
    /// Gave up. Terminal.
    Failed,
}

impl ItemStatus {
    /// `completed` or `failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// `queued` or `processing`.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

/// One unit of work referencing an email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Identity of this entry in the live list.
    #[serde(skip)]
    pub(crate) key: u64,
    /// Referenced email.
    pub email_id: String,
    /// Ordering label copied at enqueue time.
    pub priority: Priority,
    /// Lifecycle state.
    pub status: ItemStatus,
    /// Attempts started so far.
    pub attempts: u32,
    /// Attempt cap.
    pub max_attempts: u32,
    /// Enqueue time.
    pub added_at: DateTime<Utc>,
    /// Completion time, once completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Last failure message.
    pub error: Option<String>,
}

impl QueueItem {
    pub(crate) fn new(key: u64, email_id: &str, priority: Priority, max_attempts: u32) -> Self {
        Self {
            key,
            email_id: email_id.to_owned(),
            priority,
            status: ItemStatus::Queued,
            attempts: 0,
            max_attempts,
            added_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// `queued -> processing`, counting the attempt.
    pub(crate) fn begin_attempt(&mut self) {
        self.status = ItemStatus::Processing;
        self.attempts = self.attempts.saturating_add(1);
    }

    pub(crate) fn complete(&mut self) {
        self.status = ItemStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.error = None;
    }

    /// Record a retryable failure; fails the item once the attempt cap is reached.
    pub(crate) fn record_failure(&mut self, message: String) {
        self.error = Some(message);
        self.status = if self.attempts >= self.max_attempts {
            ItemStatus::Failed
        } else {
            ItemStatus::Queued
        };
    }

    /// Fail immediately regardless of remaining attempts.
    pub(crate) fn fail(&mut self, message: &str) {
        self.error = Some(message.to_owned());
        self.status = ItemStatus::Failed;
    }
}

/// Result of one item within a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    /// Referenced email.
    pub email_id: String,
    /// State after the attempt.
    pub status: ItemStatus,
    /// Attempts started so far.
    pub attempts: u32,
    /// Failure message, if the attempt failed.
    pub error: Option<String>,
}

impl From<&QueueItem> for ItemOutcome {
    fn from(item: &QueueItem) -> Self {
        Self {
            email_id: item.email_id.clone(),
            status: item.status,
            attempts: item.attempts,
            error: item.error.clone(),
        }
    }
}

/// What a call to [`PriorityQueue::sweep`](super::PriorityQueue::sweep) did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Another sweep was already running, so nothing happened.
    pub skipped: bool,
    /// Items picked for this batch.
    pub selected: usize,
    /// Per-item results, in batch order.
    pub outcomes: Vec<ItemOutcome>,
    /// Terminal items removed at the end of the sweep.
    pub purged: usize,
}

/// Read-only queue snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Items in the live list.
    pub total_items: usize,
    /// Item count per status.
    pub status_breakdown: BTreeMap<ItemStatus, usize>,
    /// Whether a sweep is in flight.
    pub is_processing: bool,
    /// Items with urgent priority, in any state.
    pub urgent_items: usize,
    /// Earliest enqueue time among live items.
    pub oldest_item: Option<DateTime<Utc>>,
}

/// An urgent email picked up by
/// [`PriorityQueue::process_urgent_now`](super::PriorityQueue::process_urgent_now).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgentEmailSummary {
    /// Email id.
    pub id: String,
    /// Subject line.
    pub subject: String,
    /// Sender address.
    pub sender: String,
    /// Arrival time.
    pub received_at: DateTime<Utc>,
}

/// Result of an urgent drain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrgentDrain {
    /// Urgent pending emails found, not necessarily all finished.
    pub processed: usize,
    /// The emails that were found.
    pub emails: Vec<UrgentEmailSummary>,
}

/// Result of a forced single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForceResult {
    /// The attempt completed.
    pub success: bool,
    /// Terminal state of the attempt.
    pub status: ItemStatus,
    /// Failure message, if any.
    pub error: Option<String>,
}
