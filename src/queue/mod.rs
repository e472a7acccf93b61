//! Priority processing queue.
//!
//! The [`PriorityQueue`] owns an ordered live list of [`QueueItem`]s, one per
//! email awaiting a drafted reply. Urgent items are inserted at the front
//! (so they are LIFO among themselves), normal items at the tail. A sweep
//! takes the first `max_concurrent_processing` queued items in list order,
//! runs them concurrently, then purges every terminal item. There is no
//! re-sorting: a retried item keeps its position.
//!
//! Per item a sweep fills in a missing reply through the
//! [`ResponseGenerator`] and auto-sends it through the [`ResponseSender`]
//! when the email is urgent and still pending. Failures are retried until
//! the attempt cap; a missing email fails immediately.
//!
//! Sweeps are single-flight. [`PriorityQueue::start`] runs one every
//! `interval_ms` on a background task until [`PriorityQueue::stop`].

mod item;

pub use item::{
    ForceResult, ItemOutcome, ItemStatus, QueueItem, QueueStatus, SweepReport, UrgentDrain,
    UrgentEmailSummary,
};

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::classifier::Priority;
use crate::config::QueueConfig;
use crate::responder::{ReplyRequest, ResponseGenerator};
use crate::sender::{ResponseSender, SendError};
use crate::store::{EmailFilter, EmailStatus, EmailStore, SortField, SortOrder, StoreError};

/// Error message recorded when an item's email has disappeared.
pub const EMAIL_NOT_FOUND: &str = "Email not found";

/// Errors from queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The referenced email does not exist. Never retried.
    #[error("Email not found: {0}")]
    NotFound(String),

    /// Drafting the reply failed or timed out.
    #[error("response generation failed: {0}")]
    GenerationFailure(String),

    /// Auto-sending an urgent reply failed or timed out.
    #[error("auto-send failed: {0}")]
    SendFailure(String),

    /// The attempt cap was reached; carries the last underlying error.
    #[error("gave up after {attempts} attempts: {last_error}")]
    ExhaustedRetries {
        /// Attempts made.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },

    /// The email store failed. Retried like a collaborator failure.
    #[error("email store error: {0}")]
    Store(#[from] StoreError),
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Clears the single-flight flag when a sweep ends, however it ends.
struct SweepGuard<'a>(&'a AtomicBool);

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// In-memory priority queue and scheduler for reply processing.
pub struct PriorityQueue {
    store: Arc<dyn EmailStore>,
    generator: Arc<dyn ResponseGenerator>,
    sender: Arc<dyn ResponseSender>,
    config: QueueConfig,
    live: Mutex<Vec<QueueItem>>,
    next_key: AtomicU64,
    processing: AtomicBool,
    worker: std::sync::Mutex<Option<Worker>>,
}

impl PriorityQueue {
    /// Create an idle queue. Nothing runs until [`start`](Self::start) or an
    /// explicit [`sweep`](Self::sweep).
    pub fn new(
        store: Arc<dyn EmailStore>,
        generator: Arc<dyn ResponseGenerator>,
        sender: Arc<dyn ResponseSender>,
        mut config: QueueConfig,
    ) -> Self {
        config.enforce_minimums();
        Self {
            store,
            generator,
            sender,
            config,
            live: Mutex::new(Vec::new()),
            next_key: AtomicU64::new(1),
            processing: AtomicBool::new(false),
            worker: std::sync::Mutex::new(None),
        }
    }

    fn next_key(&self) -> u64 {
        self.next_key.fetch_add(1, Ordering::Relaxed)
    }

    // -----------------------------------------------------------------------
    // Intake
    // -----------------------------------------------------------------------

    /// Add an email to the live list.
    ///
    /// Urgent items go to the front, normal items to the tail. An email that
    /// already has a queued or processing item is not added twice: the
    /// existing item is returned, after being promoted to the front when an
    /// urgent enqueue finds it queued as normal.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotFound`] if the email does not exist.
    pub async fn enqueue(
        &self,
        email_id: &str,
        priority: Priority,
    ) -> Result<QueueItem, QueueError> {
        if self.store.find_by_id(email_id).await?.is_none() {
            return Err(QueueError::NotFound(email_id.to_owned()));
        }

        let mut live = self.live.lock().await;

        if let Some(pos) = live
            .iter()
            .position(|i| i.email_id == email_id && i.status.is_active())
        {
            let promote = live.get(pos).is_some_and(|existing| {
                priority == Priority::Urgent
                    && existing.priority == Priority::Normal
                    && existing.status == ItemStatus::Queued
            });
            if promote {
                let mut item = live.remove(pos);
                item.priority = Priority::Urgent;
                live.insert(0, item.clone());
                info!(email_id, "queued item promoted to urgent");
                return Ok(item);
            }
            if let Some(existing) = live.get(pos) {
                debug!(email_id, status = ?existing.status, "email already in queue");
                return Ok(existing.clone());
            }
        }

        let item = QueueItem::new(
            self.next_key(),
            email_id,
            priority,
            self.config.max_attempts,
        );
        match priority {
            Priority::Urgent => live.insert(0, item.clone()),
            Priority::Normal => live.push(item.clone()),
        }
        info!(email_id, %priority, queue_len = live.len(), "email enqueued");
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Run one drain pass over the live list.
    ///
    /// Does nothing if another sweep is in flight or the list is empty.
    /// Otherwise selects up to `max_concurrent_processing` queued items in
    /// list order, processes them concurrently, waits for every outcome and
    /// then removes all completed and failed items.
    pub async fn sweep(&self) -> SweepReport {
        let Some(_guard) = SweepGuard::acquire(&self.processing) else {
            debug!("sweep already in progress, skipping");
            return SweepReport {
                skipped: true,
                ..SweepReport::default()
            };
        };

        let batch: Vec<QueueItem> = {
            let mut live = self.live.lock().await;
            if live.is_empty() {
                return SweepReport::default();
            }
            let batch: Vec<QueueItem> = live
                .iter_mut()
                .filter(|i| i.status == ItemStatus::Queued)
                .take(self.config.max_concurrent_processing)
                .map(|i| {
                    i.begin_attempt();
                    i.clone()
                })
                .collect();
            info!(live = live.len(), selected = batch.len(), "sweep started");
            batch
        };

        let selected = batch.len();
        let outcomes = futures::future::join_all(batch.into_iter().map(|item| async move {
            let done = self.run_attempt(item).await;
            self.write_back(&done).await;
            ItemOutcome::from(&done)
        }))
        .await;

        let purged = {
            let mut live = self.live.lock().await;
            let before = live.len();
            live.retain(|i| !i.status.is_terminal());
            before.saturating_sub(live.len())
        };
        debug!(selected, purged, "sweep finished");

        SweepReport {
            skipped: false,
            selected,
            outcomes,
            purged,
        }
    }

    async fn write_back(&self, done: &QueueItem) {
        let mut live = self.live.lock().await;
        if let Some(slot) = live.iter_mut().find(|i| i.key == done.key) {
            *slot = done.clone();
        }
    }

    /// Run one attempt on an item already marked processing and return it in
    /// its resulting state. Never fails: errors are recorded on the item.
    async fn run_attempt(&self, mut item: QueueItem) -> QueueItem {
        match self.attempt(&item.email_id).await {
            Ok(()) => {
                item.complete();
                info!(email_id = %item.email_id, attempts = item.attempts, "queue item completed");
            }
            Err(QueueError::NotFound(_)) => {
                item.fail(EMAIL_NOT_FOUND);
                warn!(email_id = %item.email_id, "queued email no longer exists");
            }
            Err(e) => {
                item.record_failure(e.to_string());
                if item.status == ItemStatus::Failed {
                    let exhausted = QueueError::ExhaustedRetries {
                        attempts: item.attempts,
                        last_error: e.to_string(),
                    };
                    error!(email_id = %item.email_id, error = %exhausted, "queue item failed");
                } else {
                    warn!(
                        email_id = %item.email_id,
                        attempts = item.attempts,
                        max_attempts = item.max_attempts,
                        error = %e,
                        "queue item attempt failed, will retry"
                    );
                }
            }
        }
        item
    }

    /// Generate a missing reply, then auto-send it for urgent pending emails.
    async fn attempt(&self, email_id: &str) -> Result<(), QueueError> {
        let mut email = self
            .store
            .find_by_id(email_id)
            .await?
            .ok_or_else(|| QueueError::NotFound(email_id.to_owned()))?;

        if email.ai_response.is_none() {
            let request = ReplyRequest::from(&email);
            let text = self
                .bounded(self.generator.generate(&request, None))
                .await
                .map_err(QueueError::GenerationFailure)?
                .map_err(|e| QueueError::GenerationFailure(e.to_string()))?;
            email = self
                .store
                .set_ai_response(email_id, &text)
                .await?
                .ok_or_else(|| QueueError::NotFound(email_id.to_owned()))?;
            debug!(email_id, status = %email.status, "reply drafted");
        }

        if email.priority == Priority::Urgent && email.status == EmailStatus::Pending {
            let text = email.ai_response.as_deref().unwrap_or_default();
            let subject = format!("[URGENT] Re: {}", email.subject);
            let receipt = self
                .bounded(self.sender.send(&email.id, text, Some(&subject)))
                .await
                .map_err(QueueError::SendFailure)?
                .map_err(|e| match e {
                    SendError::NotFound(_) => QueueError::NotFound(email_id.to_owned()),
                    other => QueueError::SendFailure(other.to_string()),
                })?;
            info!(email_id, message_id = %receipt.message_id, "urgent reply auto-sent");
        }

        Ok(())
    }

    /// Await `fut` for at most the configured call timeout.
    async fn bounded<T>(&self, fut: impl Future<Output = T>) -> Result<T, String> {
        let limit = self.config.call_timeout();
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| format!("timed out after {}s", limit.as_secs()))
    }

    // -----------------------------------------------------------------------
    // Operator triggers
    // -----------------------------------------------------------------------

    /// Enqueue every urgent pending email, oldest first, then run one sweep.
    ///
    /// `processed` is the number of emails found, which can exceed what the
    /// sweep finished; the rest stay queued for the next sweep.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Store`] if the urgent emails cannot be listed.
    pub async fn process_urgent_now(&self) -> Result<UrgentDrain, QueueError> {
        let filter = EmailFilter {
            priority: Some(Priority::Urgent),
            status: Some(EmailStatus::Pending),
            limit: None,
            sort_by: SortField::ReceivedAt,
            sort_order: SortOrder::Asc,
            ..EmailFilter::default()
        };
        let emails = self.store.find(&filter).await?;

        for email in &emails {
            if let Err(e) = self.enqueue(&email.id, Priority::Urgent).await {
                warn!(email_id = %email.id, error = %e, "could not enqueue urgent email");
            }
        }

        info!(found = emails.len(), "urgent drain requested");
        self.sweep().await;

        Ok(UrgentDrain {
            processed: emails.len(),
            emails: emails
                .into_iter()
                .map(|e| UrgentEmailSummary {
                    id: e.id,
                    subject: e.subject,
                    sender: e.sender_email,
                    received_at: e.received_at,
                })
                .collect(),
        })
    }

    /// Run a single attempt for one email outside the live list.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotFound`] if the email does not exist.
    pub async fn force_process_email(&self, email_id: &str) -> Result<ForceResult, QueueError> {
        let email = self
            .store
            .find_by_id(email_id)
            .await?
            .ok_or_else(|| QueueError::NotFound(email_id.to_owned()))?;

        let mut item = QueueItem::new(self.next_key(), email_id, email.priority, 1);
        item.begin_attempt();
        let done = self.run_attempt(item).await;
        info!(email_id, status = ?done.status, "forced processing finished");

        Ok(ForceResult {
            success: done.status == ItemStatus::Completed,
            status: done.status,
            error: done.error,
        })
    }

    /// Drop completed items. Returns how many were removed.
    pub async fn clear_completed(&self) -> usize {
        let mut live = self.live.lock().await;
        let before = live.len();
        live.retain(|i| i.status != ItemStatus::Completed);
        let removed = before.saturating_sub(live.len());
        info!(removed, "completed items cleared");
        removed
    }

    // -----------------------------------------------------------------------
    // Observability
    // -----------------------------------------------------------------------

    /// Snapshot of queue counters.
    pub async fn status(&self) -> QueueStatus {
        let live = self.live.lock().await;
        let mut status_breakdown: BTreeMap<ItemStatus, usize> = BTreeMap::new();
        for item in live.iter() {
            let n = status_breakdown.entry(item.status).or_insert(0);
            *n = n.saturating_add(1);
        }
        QueueStatus {
            total_items: live.len(),
            status_breakdown,
            is_processing: self.is_processing(),
            urgent_items: live
                .iter()
                .filter(|i| i.priority == Priority::Urgent)
                .count(),
            oldest_item: live.iter().map(|i| i.added_at).min(),
        }
    }

    /// Up to `limit` items, urgent first then oldest first.
    pub async fn items(&self, limit: usize) -> Vec<QueueItem> {
        let mut items = self.live.lock().await.clone();
        items.sort_by_key(|i| (i.priority != Priority::Urgent, i.added_at, i.key));
        items.truncate(limit);
        items
    }

    /// Live list in storage order.
    pub async fn live_items(&self) -> Vec<QueueItem> {
        self.live.lock().await.clone()
    }

    /// Whether a sweep is in flight.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the periodic sweep task. Returns `false` if it is already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if worker.is_some() {
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let queue = Arc::clone(self);
        let handle = tokio::spawn(async move { queue.run(shutdown_rx).await });
        *worker = Some(Worker { shutdown, handle });
        true
    }

    /// Stop the periodic sweep task and wait for it to exit.
    ///
    /// A sweep that is already running finishes first.
    pub async fn stop(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            let _ = worker.shutdown.send(true);
            if let Err(e) = worker.handle.await {
                error!(error = %e, "queue worker panicked");
            }
        }
    }

    async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let period = self.config.interval().max(Duration::from_millis(1));
        info!(interval_ms = self.config.interval_ms, "queue worker started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Skip the first immediate tick.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep().await;
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("queue worker shutting down");
                        break;
                    }
                }
            }
        }

        info!("queue worker stopped");
    }
}
