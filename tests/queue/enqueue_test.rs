//! Enqueue ordering, dedup and snapshots.

use supportdesk::classifier::Priority;
use supportdesk::queue::{ItemStatus, QueueError};

use super::support::{add_email, config, harness, MockGenerator, RecordingSender};

fn ids(items: &[supportdesk::queue::QueueItem]) -> Vec<String> {
    items.iter().map(|i| i.email_id.clone()).collect()
}

#[tokio::test]
async fn urgent_items_go_to_the_front() {
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), config()).await;
    let n1 = add_email(&h.store, "first normal", Priority::Normal).await;
    let n2 = add_email(&h.store, "second normal", Priority::Normal).await;
    let u1 = add_email(&h.store, "first urgent", Priority::Urgent).await;
    let u2 = add_email(&h.store, "second urgent", Priority::Urgent).await;

    for (email, priority) in [
        (&n1, Priority::Normal),
        (&n2, Priority::Normal),
        (&u1, Priority::Urgent),
        (&u2, Priority::Urgent),
    ] {
        h.queue
            .enqueue(&email.id, priority)
            .await
            .expect("enqueue should succeed");
    }

    // Urgent items are LIFO among themselves.
    assert_eq!(
        ids(&h.queue.live_items().await),
        vec![u2.id, u1.id, n1.id, n2.id]
    );
}

#[tokio::test]
async fn new_item_starts_queued() {
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), config()).await;
    let email = add_email(&h.store, "hello", Priority::Normal).await;

    let item = h
        .queue
        .enqueue(&email.id, Priority::Normal)
        .await
        .expect("enqueue should succeed");

    assert_eq!(item.status, ItemStatus::Queued);
    assert_eq!(item.attempts, 0);
    assert_eq!(item.max_attempts, 3);
    assert!(item.error.is_none());
    assert!(item.completed_at.is_none());
}

#[tokio::test]
async fn unknown_email_is_rejected() {
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), config()).await;

    let err = h
        .queue
        .enqueue("no-such-id", Priority::Urgent)
        .await
        .expect_err("unknown email should be rejected");

    assert!(matches!(err, QueueError::NotFound(ref id) if id == "no-such-id"));
    assert!(h.queue.live_items().await.is_empty());
}

#[tokio::test]
async fn active_email_is_not_queued_twice() {
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), config()).await;
    let email = add_email(&h.store, "hello", Priority::Normal).await;

    h.queue
        .enqueue(&email.id, Priority::Normal)
        .await
        .expect("first enqueue should succeed");
    h.queue
        .enqueue(&email.id, Priority::Normal)
        .await
        .expect("second enqueue should succeed");

    assert_eq!(h.queue.live_items().await.len(), 1);
}

#[tokio::test]
async fn urgent_enqueue_promotes_queued_normal_item() {
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), config()).await;
    let a = add_email(&h.store, "a", Priority::Normal).await;
    let b = add_email(&h.store, "b", Priority::Normal).await;

    for email in [&a, &b] {
        h.queue
            .enqueue(&email.id, Priority::Normal)
            .await
            .expect("enqueue should succeed");
    }
    let promoted = h
        .queue
        .enqueue(&b.id, Priority::Urgent)
        .await
        .expect("promotion should succeed");

    assert_eq!(promoted.priority, Priority::Urgent);
    let live = h.queue.live_items().await;
    assert_eq!(ids(&live), vec![b.id.clone(), a.id.clone()]);
    assert_eq!(live[0].priority, Priority::Urgent);
}

#[tokio::test]
async fn items_list_urgent_first_and_honours_limit() {
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), config()).await;
    let n = add_email(&h.store, "normal", Priority::Normal).await;
    let u = add_email(&h.store, "urgent", Priority::Urgent).await;

    h.queue
        .enqueue(&n.id, Priority::Normal)
        .await
        .expect("enqueue should succeed");
    h.queue
        .enqueue(&u.id, Priority::Urgent)
        .await
        .expect("enqueue should succeed");

    assert_eq!(ids(&h.queue.items(10).await), vec![u.id.clone(), n.id]);
    assert_eq!(ids(&h.queue.items(1).await), vec![u.id]);
}

#[tokio::test]
async fn status_counts_live_items() {
    let h = harness(MockGenerator::replying("ok"), RecordingSender::new(), config()).await;

    let empty = h.queue.status().await;
    assert_eq!(empty.total_items, 0);
    assert!(empty.oldest_item.is_none());

    let n = add_email(&h.store, "normal", Priority::Normal).await;
    let u = add_email(&h.store, "urgent", Priority::Urgent).await;
    h.queue
        .enqueue(&n.id, Priority::Normal)
        .await
        .expect("enqueue should succeed");
    h.queue
        .enqueue(&u.id, Priority::Urgent)
        .await
        .expect("enqueue should succeed");

    let status = h.queue.status().await;
    assert_eq!(status.total_items, 2);
    assert_eq!(status.urgent_items, 1);
    assert_eq!(status.status_breakdown.get(&ItemStatus::Queued), Some(&2));
    assert!(!status.is_processing);
    assert!(status.oldest_item.is_some());

    let json = serde_json::to_value(&status).expect("status should serialise");
    assert_eq!(json["statusBreakdown"]["queued"], 2);
    assert_eq!(json["totalItems"], 2);
}
