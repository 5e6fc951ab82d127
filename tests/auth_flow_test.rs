// End-to-end authentication workflow tests against real Postgres and
// Redis: registration, verification, login, refresh rotation, logout
// reuse, and the password reset chain.

mod common;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serial_test::serial;
use uuid::Uuid;

use dashtam_backend_core::events::{EventContext, EventType};
use dashtam_backend_core::models::{
    NewRefreshToken, RefreshTokenData, SecurityConfig, Session, User,
};
use dashtam_backend_core::schema::{email_verification_tokens, password_reset_tokens};
use dashtam_backend_core::services::auth::{AuthenticateError, RefreshError, RegisterError};
use dashtam_backend_core::services::session::{CreateSessionInput, CurrentSessionError};

fn ctx() -> EventContext {
    EventContext::with_metadata(
        Some("203.0.113.45".to_string()),
        Some("Mozilla/5.0 Chrome/120".to_string()),
    )
}

fn unique_email() -> String {
    format!("alice-{}@example.com", Uuid::new_v4().simple())
}

#[tokio::test]
#[serial]
async fn register_verify_then_login() {
    let services = common::test_services().await;
    let email = unique_email();

    // Register
    let registered = services
        .auth
        .register(&email, "P@ssw0rd!", ctx())
        .await
        .unwrap();
    assert_eq!(registered.email, email);

    // Unverified accounts cannot authenticate
    let denied = services
        .auth
        .authenticate(&email, "P@ssw0rd!", None, ctx())
        .await;
    assert_eq!(denied.unwrap_err(), AuthenticateError::EmailNotVerified);

    // Pull the verification token the way the email link would carry it
    let mut conn = services.pool.get().await.unwrap();
    let token: String = email_verification_tokens::table
        .filter(email_verification_tokens::user_id.eq(registered.user_id))
        .select(email_verification_tokens::token)
        .first(&mut conn)
        .await
        .unwrap();
    assert_eq!(token.len(), 64);
    drop(conn);

    services.auth.verify_email(&token, ctx()).await.unwrap();

    // Second use of the one-shot token fails
    let reused = services.auth.verify_email(&token, ctx()).await;
    assert!(reused.is_err());

    // Login now succeeds and issues the documented token shape
    let login = services
        .auth
        .login(&email, "P@ssw0rd!", Some("203.0.113.45".to_string()), None, ctx())
        .await
        .unwrap();
    assert_eq!(login.token_type, "bearer");
    assert_eq!(login.expires_in, 900);
    assert!(login.refresh_token.len() >= 40);

    // Event flow: attempted before succeeded, exactly one login success
    let types = services.recorder.types();
    let attempted = types
        .iter()
        .position(|t| *t == EventType::UserLoginAttempted)
        .unwrap();
    let succeeded = types
        .iter()
        .position(|t| *t == EventType::UserLoginSucceeded)
        .unwrap();
    assert!(attempted < succeeded);
    assert_eq!(services.recorder.count_of(EventType::UserLoginSucceeded), 1);
    assert_eq!(services.recorder.count_of(EventType::SessionCreated), 1);
}

#[tokio::test]
#[serial]
async fn duplicate_registration_reports_duplicate_email() {
    let services = common::test_services().await;
    let email = unique_email();

    services.auth.register(&email, "P@ssw0rd!", ctx()).await.unwrap();
    let second = services.auth.register(&email, "P@ssw0rd!", ctx()).await;
    assert_eq!(second.unwrap_err(), RegisterError::DuplicateEmail);

    // Case variation does not evade the unique constraint
    let shouted = services
        .auth
        .register(&email.to_uppercase(), "P@ssw0rd!", ctx())
        .await;
    assert_eq!(shouted.unwrap_err(), RegisterError::DuplicateEmail);
}

#[tokio::test]
#[serial]
async fn repeated_wrong_passwords_lock_the_account() {
    let services = common::test_services().await;
    let user = common::create_test_user(&services.pool, "P@ssw0rd!", "basic").await;

    for _ in 0..5 {
        let denied = services
            .auth
            .authenticate(&user.email, "WrongP@ss1!", None, ctx())
            .await;
        assert_eq!(denied.unwrap_err(), AuthenticateError::InvalidPassword);
    }

    // Sixth attempt hits the lockout, even with the right password
    let locked = services
        .auth
        .authenticate(&user.email, "P@ssw0rd!", None, ctx())
        .await;
    assert_eq!(locked.unwrap_err(), AuthenticateError::AccountLocked);

    let mut conn = services.pool.get().await.unwrap();
    let stored = User::find_by_id(&mut conn, user.id).await.unwrap();
    assert_eq!(stored.failed_login_attempts, 5);
    assert!(stored.locked_until.is_some());
}

#[tokio::test]
#[serial]
async fn successful_login_resets_the_failure_counter() {
    let services = common::test_services().await;
    let user = common::create_test_user(&services.pool, "P@ssw0rd!", "basic").await;

    for _ in 0..3 {
        let _ = services
            .auth
            .authenticate(&user.email, "WrongP@ss1!", None, ctx())
            .await;
    }

    services
        .auth
        .authenticate(&user.email, "P@ssw0rd!", None, ctx())
        .await
        .unwrap();

    let mut conn = services.pool.get().await.unwrap();
    let stored = User::find_by_id(&mut conn, user.id).await.unwrap();
    assert_eq!(stored.failed_login_attempts, 0);
}

#[tokio::test]
#[serial]
async fn refresh_rotates_and_old_token_dies() {
    let services = common::test_services().await;
    let user = common::create_test_user(&services.pool, "P@ssw0rd!", "basic").await;

    let login = services
        .auth
        .login(&user.email, "P@ssw0rd!", None, None, ctx())
        .await
        .unwrap();

    // First refresh rotates the pair
    let refreshed = services
        .auth
        .refresh(&login.refresh_token, ctx())
        .await
        .unwrap();
    assert_ne!(refreshed.access_token, login.access_token);
    assert_ne!(refreshed.refresh_token, login.refresh_token);

    // Replaying the original refresh token fails lookup: rotation
    // deleted the record
    let replay = services.auth.refresh(&login.refresh_token, ctx()).await;
    assert_eq!(replay.unwrap_err(), RefreshError::TokenInvalid);

    // The rotated token keeps working
    services
        .auth
        .refresh(&refreshed.refresh_token, ctx())
        .await
        .unwrap();
}

#[tokio::test]
#[serial]
async fn stale_token_version_is_rejected_after_rotation() {
    let services = common::test_services().await;
    let user = common::create_test_user(&services.pool, "P@ssw0rd!", "basic").await;

    let mut conn = services.pool.get().await.unwrap();
    let security = SecurityConfig::get_or_create_default(&mut conn).await.unwrap();
    let current = security.global_min_token_version;

    // Session for the stale token
    let session = services
        .sessions
        .create(
            CreateSessionInput {
                user_id: user.id,
                ip_address: None,
                user_agent: None,
                expires_at: None,
                refresh_token_id: None,
            },
            EventContext::default(),
        )
        .await
        .unwrap();

    // Hand-craft a token two generations behind: outside any grace
    // allowance regardless of the rotation timestamp
    let (plain, hash) = services.refresh_tokens.generate_token().unwrap();
    RefreshTokenData::store(
        &mut conn,
        NewRefreshToken {
            user_id: user.id,
            token_hash: hash,
            session_id: session.session_id,
            expires_at: services.refresh_tokens.calculate_expiration(),
            token_version: current,
            global_version_at_issuance: current,
        },
    )
    .await
    .unwrap();

    // Advance the global floor twice
    SecurityConfig::update_global_version(&mut conn, current + 2, Some("breach drill"))
        .await
        .unwrap();
    drop(conn);

    services.recorder.clear();
    let rejected = services.auth.refresh(&plain, ctx()).await;
    assert_eq!(rejected.unwrap_err(), RefreshError::TokenVersionRejected);

    assert_eq!(
        services
            .recorder
            .count_of(EventType::TokenRejectedDueToRotation),
        1
    );

    // Restore a sane floor for subsequent tests (monotonic, so bump is
    // permanent within this database; later issuances use the new floor)
}

#[tokio::test]
#[serial]
async fn previous_generation_token_survives_within_grace() {
    let services = common::test_services().await;
    let user = common::create_test_user(&services.pool, "P@ssw0rd!", "basic").await;

    let mut conn = services.pool.get().await.unwrap();
    let security = SecurityConfig::get_or_create_default(&mut conn).await.unwrap();
    let current = security.global_min_token_version;

    let session = services
        .sessions
        .create(
            CreateSessionInput {
                user_id: user.id,
                ip_address: None,
                user_agent: None,
                expires_at: None,
                refresh_token_id: None,
            },
            EventContext::default(),
        )
        .await
        .unwrap();

    let (plain, hash) = services.refresh_tokens.generate_token().unwrap();
    RefreshTokenData::store(
        &mut conn,
        NewRefreshToken {
            user_id: user.id,
            token_hash: hash,
            session_id: session.session_id,
            expires_at: services.refresh_tokens.calculate_expiration(),
            token_version: current,
            global_version_at_issuance: current,
        },
    )
    .await
    .unwrap();

    // One generation forward: the default 24h grace window is open and
    // the token was issued under the previous generation
    SecurityConfig::update_global_version(&mut conn, current + 1, Some("scheduled rotation"))
        .await
        .unwrap();
    drop(conn);

    services.auth.refresh(&plain, ctx()).await.unwrap();
}

#[tokio::test]
#[serial]
async fn logout_revokes_the_session_and_refresh_tokens() {
    let services = common::test_services().await;
    let user = common::create_test_user(&services.pool, "P@ssw0rd!", "basic").await;

    let login = services
        .auth
        .login(&user.email, "P@ssw0rd!", None, None, ctx())
        .await
        .unwrap();

    services
        .auth
        .logout(user.id, &login.refresh_token, ctx())
        .await;

    // Event-driven session cleanup runs inside publish, which has
    // completed by now: the session binding check refuses the session
    let check = services.sessions.current_session(login.session_id).await;
    assert_eq!(check.unwrap_err(), CurrentSessionError::SessionRevoked);

    // The refresh token is gone too
    let refreshed = services.auth.refresh(&login.refresh_token, ctx()).await;
    assert_eq!(refreshed.unwrap_err(), RefreshError::TokenRevoked);

    // Logout is quiet about unknown tokens: no panic, success reported,
    // failure reason only in events
    services.recorder.clear();
    services.auth.logout(user.id, "definitely-not-a-token", ctx()).await;
    assert_eq!(services.recorder.count_of(EventType::UserLogoutFailed), 1);
}

#[tokio::test]
#[serial]
async fn password_reset_chain_revokes_everything() {
    let services = common::test_services().await;
    let user = common::create_test_user(&services.pool, "P@ssw0rd!", "basic").await;

    let login = services
        .auth
        .login(&user.email, "P@ssw0rd!", None, None, ctx())
        .await
        .unwrap();

    // Request: externally silent, internally a 15-minute token
    services
        .auth
        .request_password_reset(&user.email, Some("203.0.113.45".to_string()), None, ctx())
        .await;

    let mut conn = services.pool.get().await.unwrap();
    let token: String = password_reset_tokens::table
        .filter(password_reset_tokens::user_id.eq(user.id))
        .order(password_reset_tokens::created_at.desc())
        .select(password_reset_tokens::token)
        .first(&mut conn)
        .await
        .unwrap();
    drop(conn);

    // Confirm with a new password
    services
        .auth
        .confirm_password_reset(&token, "NewP@ssw0rd!", ctx())
        .await
        .unwrap();

    // Pre-existing refresh tokens are dead
    let stale = services.auth.refresh(&login.refresh_token, ctx()).await;
    assert_eq!(stale.unwrap_err(), RefreshError::TokenRevoked);

    // Pre-existing sessions are revoked by the handler chain
    let mut conn = services.pool.get().await.unwrap();
    let session = Session::find_by_id(&mut conn, login.session_id)
        .await
        .unwrap()
        .unwrap();
    assert!(session.is_revoked);
    assert_eq!(session.revoked_reason.as_deref(), Some("password_reset"));
    drop(conn);

    // Old password is gone, the new one signs in
    let old = services
        .auth
        .authenticate(&user.email, "P@ssw0rd!", None, ctx())
        .await;
    assert_eq!(old.unwrap_err(), AuthenticateError::InvalidPassword);

    services
        .auth
        .login(&user.email, "NewP@ssw0rd!", None, None, ctx())
        .await
        .unwrap();
}

#[tokio::test]
#[serial]
async fn reset_requests_are_rate_limited_per_user() {
    let services = common::test_services().await;
    let user = common::create_test_user(&services.pool, "P@ssw0rd!", "basic").await;

    for _ in 0..3 {
        services
            .auth
            .request_password_reset(&user.email, None, None, ctx())
            .await;
    }

    services.recorder.clear();
    services
        .auth
        .request_password_reset(&user.email, None, None, ctx())
        .await;

    assert_eq!(
        services
            .recorder
            .count_of(EventType::PasswordResetRequestFailed),
        1
    );
    assert_eq!(
        services
            .recorder
            .count_of(EventType::PasswordResetRequestSucceeded),
        0
    );
}

#[tokio::test]
#[serial]
async fn reset_request_for_unknown_email_fails_only_internally() {
    let services = common::test_services().await;

    services
        .auth
        .request_password_reset(&unique_email(), None, None, ctx())
        .await;

    // No token row, no success event - just the internal failure record
    assert_eq!(
        services
            .recorder
            .count_of(EventType::PasswordResetRequestFailed),
        1
    );
}
