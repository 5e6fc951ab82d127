// Session-limit FIFO eviction tests against real Postgres and Redis.

mod common;

use serial_test::serial;
use uuid::Uuid;

use dashtam_backend_core::events::{EventContext, EventType};
use dashtam_backend_core::models::Session;
use dashtam_backend_core::services::session::CreateSessionInput;

fn create_input(user_id: Uuid, ua: &str) -> CreateSessionInput {
    CreateSessionInput {
        user_id,
        ip_address: Some("203.0.113.45".to_string()),
        user_agent: Some(ua.to_string()),
        expires_at: None,
        refresh_token_id: None,
    }
}

#[tokio::test]
#[serial]
async fn basic_tier_evicts_oldest_at_the_cap() {
    let services = common::test_services().await;
    let user = common::create_test_user(&services.pool, "P@ssw0rd!", "basic").await;

    // Three sessions fill the basic cap
    let mut session_ids = Vec::new();
    for i in 0..3 {
        // Distinct creation instants keep FIFO order deterministic
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let created = services
            .sessions
            .create(
                create_input(user.id, &format!("Mozilla/5.0 Device/{}", i)),
                EventContext::default(),
            )
            .await
            .unwrap();
        session_ids.push(created.session_id);
    }

    services.recorder.clear();

    // The fourth session evicts exactly the first
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let fourth = services
        .sessions
        .create(
            create_input(user.id, "Mozilla/5.0 Device/3"),
            EventContext::default(),
        )
        .await
        .unwrap();

    let mut conn = services.pool.get().await.unwrap();
    let active = Session::find_by_user_id(&mut conn, user.id, true).await.unwrap();
    assert_eq!(active.len(), 3);

    let active_ids: Vec<_> = active.iter().map(|s| s.id).collect();
    assert!(!active_ids.contains(&session_ids[0]), "oldest was evicted");
    assert!(active_ids.contains(&session_ids[1]));
    assert!(active_ids.contains(&session_ids[2]));
    assert!(active_ids.contains(&fourth.session_id));

    // The evicted session carries the eviction reason
    let evicted = Session::find_by_id(&mut conn, session_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert!(evicted.is_revoked);
    assert_eq!(
        evicted.revoked_reason.as_deref(),
        Some("session_limit_exceeded")
    );

    // SessionEvicted precedes SessionCreated in publish order
    let types = services.recorder.types();
    let evicted_pos = types
        .iter()
        .position(|t| *t == EventType::SessionEvicted)
        .expect("SessionEvicted published");
    let created_pos = types
        .iter()
        .position(|t| *t == EventType::SessionCreated)
        .expect("SessionCreated published");
    assert!(evicted_pos < created_pos);
    assert_eq!(services.recorder.count_of(EventType::SessionEvicted), 1);
}

#[tokio::test]
#[serial]
async fn unlimited_tier_never_evicts() {
    let services = common::test_services().await;
    let user = common::create_test_user(&services.pool, "P@ssw0rd!", "unlimited").await;

    for i in 0..5 {
        services
            .sessions
            .create(
                create_input(user.id, &format!("Mozilla/5.0 Device/{}", i)),
                EventContext::default(),
            )
            .await
            .unwrap();
    }

    let mut conn = services.pool.get().await.unwrap();
    let active = Session::find_by_user_id(&mut conn, user.id, true).await.unwrap();
    assert_eq!(active.len(), 5);
    assert_eq!(services.recorder.count_of(EventType::SessionEvicted), 0);
}

#[tokio::test]
#[serial]
async fn created_session_is_cached_and_enriched() {
    let services = common::test_services().await;
    let user = common::create_test_user(&services.pool, "P@ssw0rd!", "basic").await;

    let created = services
        .sessions
        .create(
            CreateSessionInput {
                user_id: user.id,
                ip_address: Some("192.168.1.20".to_string()),
                user_agent: Some(
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                        .to_string(),
                ),
                expires_at: None,
                refresh_token_id: None,
            },
            EventContext::default(),
        )
        .await
        .unwrap();

    assert!(created
        .device_info
        .as_deref()
        .unwrap_or_default()
        .contains("Chrome"));
    assert_eq!(created.location.as_deref(), Some("Local network"));

    let cached = services
        .cache
        .get(created.session_id)
        .await
        .unwrap()
        .expect("write-through cached the session");
    assert_eq!(cached.user_id, user.id);
}

#[tokio::test]
#[serial]
async fn create_for_unknown_user_fails() {
    let services = common::test_services().await;
    let result = services
        .sessions
        .create(create_input(Uuid::new_v4(), "ua"), EventContext::default())
        .await;

    assert_eq!(
        result.unwrap_err(),
        dashtam_backend_core::services::CreateSessionError::UserNotFound
    );
}
