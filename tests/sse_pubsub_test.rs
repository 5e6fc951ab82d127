// SSE pub/sub and retention tests against real Redis.

mod common;

use serial_test::serial;
use std::time::Duration;
use uuid::Uuid;

use dashtam_backend_core::sse::{SseCategory, SseEvent, SseEventType};

fn event(event_type: SseEventType, user_id: Uuid) -> SseEvent {
    SseEvent::new(
        event_type,
        user_id,
        serde_json::json!({ "marker": Uuid::new_v4().to_string() }),
    )
}

#[tokio::test]
#[serial]
async fn published_event_reaches_the_subscriber() {
    let redis = common::test_redis_pool().await;
    let publisher = common::sse_publisher(&redis, false);
    let subscriber = common::sse_subscriber(&redis, false);

    let user_id = Uuid::new_v4();
    let mut subscription = subscriber.subscribe(user_id, vec![]).await.unwrap();

    // Give the pub/sub connection a moment to be registered
    tokio::time::sleep(Duration::from_millis(100)).await;

    let sent = event(SseEventType::SyncAccountsCompleted, user_id);
    publisher.publish(&sent).await;

    let received = tokio::time::timeout(Duration::from_secs(2), subscription.next())
        .await
        .expect("event within timeout")
        .expect("subscription open");

    assert_eq!(received.event_id, sent.event_id);
    assert_eq!(received.event_type, SseEventType::SyncAccountsCompleted);
    assert_eq!(received.data, sent.data);
}

#[tokio::test]
#[serial]
async fn category_filter_drops_other_categories() {
    let redis = common::test_redis_pool().await;
    let publisher = common::sse_publisher(&redis, false);
    let subscriber = common::sse_subscriber(&redis, false);

    let user_id = Uuid::new_v4();
    let mut subscription = subscriber
        .subscribe(user_id, vec![SseCategory::DataSync, SseCategory::Provider])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Filtered out: import category
    publisher.publish(&event(SseEventType::ImportCompleted, user_id)).await;
    // Passes: provider category
    let wanted = event(SseEventType::ProviderTokenRefreshed, user_id);
    publisher.publish(&wanted).await;

    let received = tokio::time::timeout(Duration::from_secs(2), subscription.next())
        .await
        .expect("event within timeout")
        .expect("subscription open");

    // The first thing through the filter is the provider event; the
    // import event was never yielded
    assert_eq!(received.event_id, wanted.event_id);
}

#[tokio::test]
#[serial]
async fn broadcast_reaches_every_user_channel() {
    let redis = common::test_redis_pool().await;
    let publisher = common::sse_publisher(&redis, false);
    let subscriber = common::sse_subscriber(&redis, false);

    let user_id = Uuid::new_v4();
    let mut subscription = subscriber.subscribe(user_id, vec![]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Broadcast with someone else's user id still reaches this stream
    let sent = event(SseEventType::SecuritySessionExpiring, Uuid::new_v4());
    publisher.broadcast(&sent).await;

    let received = tokio::time::timeout(Duration::from_secs(2), subscription.next())
        .await
        .expect("event within timeout")
        .expect("subscription open");
    assert_eq!(received.event_id, sent.event_id);
}

#[tokio::test]
#[serial]
async fn replay_returns_events_after_last_id_in_order() {
    let redis = common::test_redis_pool().await;
    let publisher = common::sse_publisher(&redis, true);
    let subscriber = common::sse_subscriber(&redis, true);

    let user_id = Uuid::new_v4();

    // S6 shape: e1 seen before disconnect; e2 filtered out by category;
    // e3 and e4 expected on reconnect.
    let e1 = event(SseEventType::SyncAccountsCompleted, user_id);
    let e2 = event(SseEventType::ProviderTokenRefreshed, user_id);
    let e3 = event(SseEventType::SyncTransactionsCompleted, user_id);
    let e4 = event(SseEventType::SyncHoldingsCompleted, user_id);

    for e in [&e1, &e2, &e3, &e4] {
        publisher.publish(e).await;
    }

    let missed = subscriber
        .get_missed_events(user_id, e1.event_id, &[SseCategory::DataSync])
        .await;

    let ids: Vec<_> = missed.iter().map(|e| e.event_id).collect();
    assert_eq!(ids, vec![e3.event_id, e4.event_id]);

    // Monotonicity: strictly increasing, all beyond the cursor
    for window in missed.windows(2) {
        assert!(window[0].event_id < window[1].event_id);
    }
    for e in &missed {
        assert!(e.event_id > e1.event_id);
    }
}

#[tokio::test]
#[serial]
async fn replay_with_unknown_cursor_is_empty() {
    let redis = common::test_redis_pool().await;
    let publisher = common::sse_publisher(&redis, true);
    let subscriber = common::sse_subscriber(&redis, true);

    let user_id = Uuid::new_v4();
    publisher.publish(&event(SseEventType::SyncAccountsCompleted, user_id)).await;

    let missed = subscriber
        .get_missed_events(user_id, Uuid::new_v4(), &[])
        .await;
    assert!(missed.is_empty());
}

#[tokio::test]
#[serial]
async fn replay_is_empty_when_retention_disabled() {
    let redis = common::test_redis_pool().await;
    let publisher = common::sse_publisher(&redis, false);
    let subscriber = common::sse_subscriber(&redis, false);

    let user_id = Uuid::new_v4();
    let e1 = event(SseEventType::SyncAccountsCompleted, user_id);
    publisher.publish(&e1).await;
    publisher.publish(&event(SseEventType::SyncHoldingsCompleted, user_id)).await;

    let missed = subscriber.get_missed_events(user_id, e1.event_id, &[]).await;
    assert!(missed.is_empty());
}
