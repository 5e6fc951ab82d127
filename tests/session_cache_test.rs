// Session cache contract tests against real Redis.

mod common;

use chrono::{Duration, Utc};
use serial_test::serial;
use uuid::Uuid;

use dashtam_backend_core::cache::{CacheKeys, SessionCache};
use dashtam_backend_core::models::Session;

fn sample_session(user_id: Uuid, expires_in: Duration) -> Session {
    let now = Utc::now();
    Session {
        id: Uuid::new_v4(),
        user_id,
        device_info: Some("Chrome 120 on Mac OSX".to_string()),
        user_agent: Some("Mozilla/5.0 Chrome/120".to_string()),
        ip_address: Some("203.0.113.45".to_string()),
        last_ip_address: Some("203.0.113.45".to_string()),
        location: None,
        created_at: now,
        last_activity_at: now,
        expires_at: now + expires_in,
        is_revoked: false,
        revoked_at: None,
        revoked_reason: None,
        is_trusted: false,
        refresh_token_id: None,
        suspicious_activity_count: 0,
        last_provider_accessed: None,
        last_provider_sync_at: None,
    }
}

async fn cache() -> SessionCache {
    let redis = common::test_redis_pool().await;
    SessionCache::new(
        redis,
        CacheKeys::new(format!("cache-test-{}", Uuid::new_v4().simple())),
    )
}

#[tokio::test]
#[serial]
async fn set_then_get_round_trips() {
    let cache = cache().await;
    let session = sample_session(Uuid::new_v4(), Duration::days(30));

    cache.set(&session, None).await.unwrap();

    let cached = cache.get(session.id).await.unwrap().expect("cached");
    assert_eq!(cached.id, session.id);
    assert_eq!(cached.user_id, session.user_id);
    assert_eq!(cached.device_info, session.device_info);
}

#[tokio::test]
#[serial]
async fn get_miss_returns_none() {
    let cache = cache().await;
    assert!(cache.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn delete_removes_the_entry() {
    let cache = cache().await;
    let session = sample_session(Uuid::new_v4(), Duration::days(30));

    cache.set(&session, None).await.unwrap();
    assert!(cache.exists(session.id).await.unwrap());

    assert!(cache.delete(session.id).await.unwrap());
    assert!(!cache.exists(session.id).await.unwrap());
    assert!(!cache.delete(session.id).await.unwrap());
}

#[tokio::test]
#[serial]
async fn user_index_tracks_sessions() {
    let cache = cache().await;
    let user_id = Uuid::new_v4();

    let first = sample_session(user_id, Duration::days(30));
    let second = sample_session(user_id, Duration::days(30));
    cache.set(&first, None).await.unwrap();
    cache.set(&second, None).await.unwrap();

    let mut ids = cache.get_user_session_ids(user_id).await.unwrap();
    ids.sort();
    let mut expected = vec![first.id, second.id];
    expected.sort();
    assert_eq!(ids, expected);

    cache.remove_user_session(user_id, first.id).await.unwrap();
    let ids = cache.get_user_session_ids(user_id).await.unwrap();
    assert_eq!(ids, vec![second.id]);
}

#[tokio::test]
#[serial]
async fn delete_all_for_user_clears_entries_and_index() {
    let cache = cache().await;
    let user_id = Uuid::new_v4();

    let first = sample_session(user_id, Duration::days(30));
    let second = sample_session(user_id, Duration::days(30));
    cache.set(&first, None).await.unwrap();
    cache.set(&second, None).await.unwrap();

    let removed = cache.delete_all_for_user(user_id).await.unwrap();
    assert_eq!(removed, 2);

    assert!(cache.get(first.id).await.unwrap().is_none());
    assert!(cache.get(second.id).await.unwrap().is_none());
    assert!(cache.get_user_session_ids(user_id).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn update_last_activity_touches_cached_copy() {
    let cache = cache().await;
    let session = sample_session(Uuid::new_v4(), Duration::days(30));
    cache.set(&session, None).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    cache
        .update_last_activity(session.id, Some("198.51.100.7"))
        .await
        .unwrap();

    let cached = cache.get(session.id).await.unwrap().unwrap();
    assert!(cached.last_activity_at > session.last_activity_at);
    assert_eq!(cached.last_ip_address.as_deref(), Some("198.51.100.7"));

    // Touching a missing session is a no-op, not an error
    cache.update_last_activity(Uuid::new_v4(), None).await.unwrap();
}
