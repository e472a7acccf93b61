//! Operator triggers: urgent drain, forced processing, clearing.

use chrono::{Duration, Utc};

use supportdesk::classifier::Priority;
use supportdesk::queue::{ItemStatus, QueueError};
use supportdesk::store::{EmailStatus, EmailStore};

use super::support::{
    add_email, add_email_at, config, harness, MockGenerator, RecordingSender,
};

#[tokio::test]
async fn urgent_drain_picks_pending_urgent_emails_oldest_first() {
    let h = harness(MockGenerator::replying("On it"), RecordingSender::new(), config()).await;
    let hours_ago = |n: i64| {
        Utc::now()
            .checked_sub_signed(Duration::hours(n))
            .expect("timestamp should be in range")
    };
    let older = add_email_at(&h.store, "older outage", Priority::Urgent, hours_ago(2)).await;
    let newer = add_email_at(&h.store, "newer outage", Priority::Urgent, hours_ago(1)).await;
    let mut closed = add_email(&h.store, "closed outage", Priority::Urgent).await;
    closed.status = EmailStatus::Resolved;
    h.store.save(&closed).await.expect("save should succeed");
    add_email(&h.store, "plain question", Priority::Normal).await;

    let drain = h
        .queue
        .process_urgent_now()
        .await
        .expect("drain should succeed");

    assert_eq!(drain.processed, 2);
    let ids: Vec<&str> = drain.emails.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec![older.id.as_str(), newer.id.as_str()]);
    assert_eq!(drain.emails[0].subject, "older outage");
    assert_eq!(drain.emails[0].sender, "alice@example.com");

    let sent = h.sender.calls();
    assert_eq!(sent.len(), 2);
    assert!(sent
        .iter()
        .all(|c| c.subject.as_deref().is_some_and(|s| s.starts_with("[URGENT] Re: "))));
    assert!(h.queue.live_items().await.is_empty());
}

#[tokio::test]
async fn urgent_drain_with_nothing_pending_reports_zero() {
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), config()).await;
    add_email(&h.store, "plain question", Priority::Normal).await;

    let drain = h
        .queue
        .process_urgent_now()
        .await
        .expect("drain should succeed");

    assert_eq!(drain.processed, 0);
    assert!(drain.emails.is_empty());
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn forced_processing_completes_outside_the_live_list() {
    let h = harness(MockGenerator::replying("Sure"), RecordingSender::new(), config()).await;
    let email = add_email(&h.store, "Question", Priority::Normal).await;

    let result = h
        .queue
        .force_process_email(&email.id)
        .await
        .expect("force should succeed");

    assert!(result.success);
    assert_eq!(result.status, ItemStatus::Completed);
    assert!(result.error.is_none());
    assert!(h.queue.live_items().await.is_empty());
    let stored = h
        .store
        .find_by_id(&email.id)
        .await
        .expect("lookup should succeed")
        .expect("email should exist");
    assert_eq!(stored.ai_response.as_deref(), Some("Sure"));
}

#[tokio::test]
async fn forced_processing_fails_after_one_attempt() {
    let h = harness(MockGenerator::replying("Hello"), RecordingSender::failing(), config()).await;
    let email = add_email(&h.store, "Outage", Priority::Urgent).await;

    let result = h
        .queue
        .force_process_email(&email.id)
        .await
        .expect("force should return a result");

    assert!(!result.success);
    assert_eq!(result.status, ItemStatus::Failed);
    assert!(result
        .error
        .as_deref()
        .is_some_and(|e| e.contains("relay refused")));
    assert_eq!(h.sender.calls().len(), 1);
    assert!(h.queue.live_items().await.is_empty());
}

#[tokio::test]
async fn forced_processing_of_unknown_email_is_not_found() {
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), config()).await;

    let err = h
        .queue
        .force_process_email("missing")
        .await
        .expect_err("unknown email should be rejected");

    assert!(matches!(err, QueueError::NotFound(_)));
}

#[tokio::test]
async fn clear_completed_leaves_queued_items() {
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), config()).await;
    for subject in ["a", "b"] {
        let email = add_email(&h.store, subject, Priority::Normal).await;
        h.queue
            .enqueue(&email.id, Priority::Normal)
            .await
            .expect("enqueue should succeed");
    }

    assert_eq!(h.queue.clear_completed().await, 0);
    assert_eq!(h.queue.live_items().await.len(), 2);
}
