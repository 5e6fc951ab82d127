// HTTP handlers and route builders

pub mod auth;
pub mod docs;
pub mod events;
pub mod health;
pub mod sessions;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::app::AppState;

/// Routes that require no bearer token
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/verify-email", post(auth::verify_email))
        .route("/password-reset-tokens", post(auth::forgot_password))
        .route("/password-resets", post(auth::reset_password))
}

/// Routes behind the auth middleware (bearer JWT + session binding)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions", delete(sessions::revoke_all_sessions))
        .route("/sessions/current", delete(auth::logout))
        .route("/sessions/{id}", get(sessions::get_session))
        .route("/sessions/{id}", delete(sessions::revoke_session))
        .route("/auth/change-password", post(auth::change_password))
        .route("/admin/token-rotations", post(auth::trigger_global_rotation))
        .route(
            "/admin/users/{id}/token-rotations",
            post(auth::trigger_user_rotation),
        )
        .route("/events", get(events::get_events))
}
