//! Sweep selection, concurrency, retries and auto-send.

use std::time::Duration;

use supportdesk::classifier::Priority;
use supportdesk::config::QueueConfig;
use supportdesk::queue::{ItemStatus, SweepReport, EMAIL_NOT_FOUND};
use supportdesk::store::{EmailStatus, EmailStore};

use super::support::{
    add_email, config, delete_email, harness, MockGenerator, RecordingSender,
};

#[tokio::test]
async fn sweep_of_empty_queue_does_nothing() {
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), config()).await;
    assert_eq!(h.queue.sweep().await, SweepReport::default());
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn urgent_item_is_processed_before_normal() {
    let cfg = QueueConfig {
        max_concurrent_processing: 1,
        ..config()
    };
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), cfg).await;
    let normal = add_email(&h.store, "normal", Priority::Normal).await;
    let urgent = add_email(&h.store, "urgent", Priority::Urgent).await;
    h.queue
        .enqueue(&normal.id, Priority::Normal)
        .await
        .expect("enqueue should succeed");
    h.queue
        .enqueue(&urgent.id, Priority::Urgent)
        .await
        .expect("enqueue should succeed");

    let report = h.queue.sweep().await;

    assert_eq!(report.selected, 1);
    assert_eq!(report.outcomes[0].email_id, urgent.id);
    assert_eq!(report.outcomes[0].status, ItemStatus::Completed);
    let live = h.queue.live_items().await;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].email_id, normal.id);
}

#[tokio::test]
async fn at_most_five_items_run_at_once() {
    let generator = MockGenerator::replying("ok").with_delay(Duration::from_millis(30));
    let h = harness(generator, RecordingSender::new(), config()).await;
    for n in 0..8 {
        let email = add_email(&h.store, &format!("question {n}"), Priority::Normal).await;
        h.queue
            .enqueue(&email.id, Priority::Normal)
            .await
            .expect("enqueue should succeed");
    }

    let report = h.queue.sweep().await;

    assert_eq!(report.selected, 5);
    assert_eq!(report.purged, 5);
    assert!(h.generator.peak() <= 5);
    assert!(h.generator.peak() > 1, "batch should run concurrently");
    let live = h.queue.live_items().await;
    assert_eq!(live.len(), 3);
    assert!(live.iter().all(|i| i.status == ItemStatus::Queued));
}

#[tokio::test]
async fn completed_normal_item_has_reply_and_is_not_sent() {
    let h = harness(MockGenerator::replying("Thanks"), RecordingSender::new(), config()).await;
    let email = add_email(&h.store, "Question", Priority::Normal).await;
    h.queue
        .enqueue(&email.id, Priority::Normal)
        .await
        .expect("enqueue should succeed");

    let report = h.queue.sweep().await;

    assert_eq!(report.outcomes[0].status, ItemStatus::Completed);
    assert_eq!(report.purged, 1);
    let stored = h
        .store
        .find_by_id(&email.id)
        .await
        .expect("lookup should succeed")
        .expect("email should exist");
    assert_eq!(stored.ai_response.as_deref(), Some("Thanks"));
    assert_eq!(stored.status, EmailStatus::Pending);
    assert!(h.sender.calls().is_empty());
}

#[tokio::test]
async fn urgent_pending_email_is_drafted_and_auto_sent() {
    let h = harness(MockGenerator::replying("Hello"), RecordingSender::new(), config()).await;
    let email = add_email(&h.store, "Server down", Priority::Urgent).await;
    h.queue
        .enqueue(&email.id, Priority::Urgent)
        .await
        .expect("enqueue should succeed");

    let report = h.queue.sweep().await;

    assert_eq!(report.outcomes[0].status, ItemStatus::Completed);
    assert_eq!(report.outcomes[0].attempts, 1);
    let sent = h.sender.calls();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].email_id, email.id);
    assert_eq!(sent[0].text, "Hello");
    assert_eq!(sent[0].subject.as_deref(), Some("[URGENT] Re: Server down"));
    assert!(h.queue.live_items().await.is_empty());
}

#[tokio::test]
async fn existing_reply_is_not_regenerated() {
    let h = harness(MockGenerator::replying("new"), RecordingSender::new(), config()).await;
    let mut email = add_email(&h.store, "Question", Priority::Normal).await;
    email.ai_response = Some("drafted earlier".to_owned());
    h.store.save(&email).await.expect("save should succeed");
    h.queue
        .enqueue(&email.id, Priority::Normal)
        .await
        .expect("enqueue should succeed");

    let report = h.queue.sweep().await;

    assert_eq!(report.outcomes[0].status, ItemStatus::Completed);
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn urgent_email_already_responded_is_not_resent() {
    let h = harness(MockGenerator::replying("new"), RecordingSender::new(), config()).await;
    let mut email = add_email(&h.store, "Outage", Priority::Urgent).await;
    email.ai_response = Some("sent before".to_owned());
    email.status = EmailStatus::Responded;
    h.store.save(&email).await.expect("save should succeed");
    h.queue
        .enqueue(&email.id, Priority::Urgent)
        .await
        .expect("enqueue should succeed");

    h.queue.sweep().await;

    assert!(h.sender.calls().is_empty());
}

#[tokio::test]
async fn failing_generator_retries_then_fails_and_is_purged() {
    let h = harness(MockGenerator::failing(), RecordingSender::new(), config()).await;
    let email = add_email(&h.store, "Question", Priority::Normal).await;
    h.queue
        .enqueue(&email.id, Priority::Normal)
        .await
        .expect("enqueue should succeed");

    for attempt in 1..=2_u32 {
        let report = h.queue.sweep().await;
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, ItemStatus::Queued);
        assert_eq!(outcome.attempts, attempt);
        assert!(outcome
            .error
            .as_deref()
            .is_some_and(|e| e.contains("model offline")));
        assert_eq!(report.purged, 0);
    }

    let last = h.queue.sweep().await;
    assert_eq!(last.outcomes[0].status, ItemStatus::Failed);
    assert_eq!(last.outcomes[0].attempts, 3);
    assert_eq!(last.purged, 1);
    assert!(h.queue.live_items().await.is_empty());
    assert_eq!(h.generator.calls(), 3);
    assert!(h.sender.calls().is_empty());
}

#[tokio::test]
async fn failed_send_keeps_draft_for_retry() {
    let h = harness(MockGenerator::replying("Hello"), RecordingSender::failing(), config()).await;
    let email = add_email(&h.store, "Outage", Priority::Urgent).await;
    h.queue
        .enqueue(&email.id, Priority::Urgent)
        .await
        .expect("enqueue should succeed");

    let first = h.queue.sweep().await;
    assert_eq!(first.outcomes[0].status, ItemStatus::Queued);
    assert!(first.outcomes[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("relay refused")));

    h.queue.sweep().await;

    // The draft saved by the first attempt is reused.
    assert_eq!(h.generator.calls(), 1);
    assert_eq!(h.sender.calls().len(), 2);
}

#[tokio::test]
async fn missing_email_fails_without_retry() {
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), config()).await;
    let email = add_email(&h.store, "Question", Priority::Normal).await;
    h.queue
        .enqueue(&email.id, Priority::Normal)
        .await
        .expect("enqueue should succeed");
    delete_email(&h.store, &email.id).await;

    let report = h.queue.sweep().await;

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, ItemStatus::Failed);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.error.as_deref(), Some(EMAIL_NOT_FOUND));
    assert_eq!(report.purged, 1);
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn status_change_during_drafting_is_kept() {
    let generator = MockGenerator::replying("draft").with_delay(Duration::from_millis(150));
    let h = harness(generator, RecordingSender::new(), config()).await;
    let email = add_email(&h.store, "Outage", Priority::Urgent).await;
    h.queue
        .enqueue(&email.id, Priority::Urgent)
        .await
        .expect("enqueue should succeed");

    let (report, ()) = tokio::join!(h.queue.sweep(), async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        h.store
            .update_status(&email.id, EmailStatus::Resolved)
            .await
            .expect("status update should succeed")
            .expect("email should exist");
    });

    assert_eq!(report.outcomes[0].status, ItemStatus::Completed);
    let stored = h
        .store
        .find_by_id(&email.id)
        .await
        .expect("lookup should succeed")
        .expect("email should exist");
    assert_eq!(stored.status, EmailStatus::Resolved);
    assert_eq!(stored.ai_response.as_deref(), Some("draft"));
    assert!(h.sender.calls().is_empty(), "resolved email must not be auto-sent");
}

#[tokio::test]
async fn email_deleted_during_drafting_fails_without_retry() {
    let generator = MockGenerator::replying("draft").with_delay(Duration::from_millis(100));
    let h = harness(generator, RecordingSender::new(), config()).await;
    let email = add_email(&h.store, "Outage", Priority::Urgent).await;
    h.queue
        .enqueue(&email.id, Priority::Urgent)
        .await
        .expect("enqueue should succeed");

    let (report, ()) = tokio::join!(h.queue.sweep(), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        delete_email(&h.store, &email.id).await;
    });

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, ItemStatus::Failed);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.error.as_deref(), Some(EMAIL_NOT_FOUND));
    assert!(h.sender.calls().is_empty());
}

#[tokio::test]
async fn sender_reporting_missing_email_fails_without_retry() {
    let h = harness(MockGenerator::replying("Hello"), RecordingSender::email_gone(), config()).await;
    let email = add_email(&h.store, "Outage", Priority::Urgent).await;
    h.queue
        .enqueue(&email.id, Priority::Urgent)
        .await
        .expect("enqueue should succeed");

    let report = h.queue.sweep().await;

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, ItemStatus::Failed);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.error.as_deref(), Some(EMAIL_NOT_FOUND));
    assert_eq!(report.purged, 1);
    assert_eq!(h.sender.calls().len(), 1);
}

#[tokio::test]
async fn zero_limits_still_process_one_item_once() {
    let cfg = QueueConfig {
        max_concurrent_processing: 0,
        max_attempts: 0,
        ..config()
    };
    let h = harness(MockGenerator::failing(), RecordingSender::new(), cfg).await;
    let email = add_email(&h.store, "Question", Priority::Normal).await;
    let item = h
        .queue
        .enqueue(&email.id, Priority::Normal)
        .await
        .expect("enqueue should succeed");
    assert_eq!(item.max_attempts, 1);

    let report = h.queue.sweep().await;

    assert_eq!(report.selected, 1);
    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, ItemStatus::Failed);
    assert_eq!(outcome.attempts, 1);
}

#[tokio::test]
async fn slow_generator_times_out_as_failure() {
    let cfg = QueueConfig {
        call_timeout_secs: 0,
        ..config()
    };
    let generator = MockGenerator::replying("late").with_delay(Duration::from_millis(50));
    let h = harness(generator, RecordingSender::new(), cfg).await;
    let email = add_email(&h.store, "Question", Priority::Normal).await;
    h.queue
        .enqueue(&email.id, Priority::Normal)
        .await
        .expect("enqueue should succeed");

    let report = h.queue.sweep().await;

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, ItemStatus::Queued);
    assert!(outcome
        .error
        .as_deref()
        .is_some_and(|e| e.contains("timed out")));
}

#[tokio::test]
async fn overlapping_sweep_is_skipped() {
    let generator = MockGenerator::replying("ok").with_delay(Duration::from_millis(100));
    let h = harness(generator, RecordingSender::new(), config()).await;
    let email = add_email(&h.store, "Question", Priority::Normal).await;
    h.queue
        .enqueue(&email.id, Priority::Normal)
        .await
        .expect("enqueue should succeed");

    let (first, (busy, second)) = tokio::join!(h.queue.sweep(), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        (h.queue.is_processing(), h.queue.sweep().await)
    });

    assert!(!first.skipped);
    assert_eq!(first.selected, 1);
    assert!(busy);
    assert!(second.skipped);
    assert_eq!(second.selected, 0);
    assert!(!h.queue.is_processing());
    assert_eq!(h.generator.calls(), 1);
}
