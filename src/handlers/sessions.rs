// Session management endpoints: list, inspect, revoke one, revoke all
// except the current session.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use axum_extra::{headers::UserAgent, TypedHeader};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    app::AppState,
    events::types::SessionTerminationReason,
    events::EventContext,
    middleware::auth::AuthenticatedUser,
    models::Session,
    services::session::RevokeSessionError,
    utils::Problem,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub id: Uuid,
    pub device_info: Option<String>,
    pub location: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_trusted: bool,
    pub is_current: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokeAllResponse {
    pub revoked: u64,
}

fn session_view(session: &Session, current_session_id: Option<Uuid>) -> SessionView {
    SessionView {
        id: session.id,
        device_info: session.device_info.clone(),
        location: session.location.clone(),
        ip_address: session.last_ip_address.clone(),
        created_at: session.created_at,
        last_activity_at: session.last_activity_at,
        expires_at: session.expires_at,
        is_trusted: session.is_trusted,
        is_current: current_session_id == Some(session.id),
    }
}

fn request_context(addr: &SocketAddr, user_agent: &Option<TypedHeader<UserAgent>>) -> EventContext {
    EventContext::with_metadata(
        Some(addr.ip().to_string()),
        user_agent.as_ref().map(|TypedHeader(ua)| ua.to_string()),
    )
}

/// GET /api/v1/sessions - active sessions for the current user
pub async fn list_sessions(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Response {
    match state.session_service.list(auth_user.user_id, true).await {
        Ok(sessions) => Json(SessionListResponse {
            sessions: sessions
                .iter()
                .map(|s| session_view(s, auth_user.session_id))
                .collect(),
        })
        .into_response(),
        Err(_) => Problem::internal().into_response(),
    }
}

/// GET /api/v1/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(session_id): Path<Uuid>,
) -> Response {
    match state
        .session_service
        .get(session_id, auth_user.user_id)
        .await
    {
        Ok(session) => Json(session_view(&session, auth_user.session_id)).into_response(),
        Err(RevokeSessionError::SessionNotFound) => {
            Problem::not_found("session_not_found", "No such session").into_response()
        },
        Err(RevokeSessionError::NotSessionOwner) => {
            Problem::forbidden("not_session_owner", "Session belongs to another user")
                .into_response()
        },
        Err(_) => Problem::internal().into_response(),
    }
}

/// DELETE /api/v1/sessions/{id}
pub async fn revoke_session(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Path(session_id): Path<Uuid>,
) -> Response {
    let ctx = request_context(&addr, &user_agent);

    match state
        .session_service
        .revoke(
            session_id,
            auth_user.user_id,
            SessionTerminationReason::UserRequest,
            ctx,
        )
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(RevokeSessionError::SessionNotFound) => {
            Problem::not_found("session_not_found", "No such session").into_response()
        },
        Err(RevokeSessionError::NotSessionOwner) => {
            Problem::forbidden("not_session_owner", "Session belongs to another user")
                .into_response()
        },
        Err(RevokeSessionError::SessionAlreadyRevoked) => {
            Problem::conflict("session_already_revoked", "Session is already revoked")
                .into_response()
        },
        Err(RevokeSessionError::Internal) => Problem::internal().into_response(),
    }
}

/// DELETE /api/v1/sessions - revoke everything except the current
/// session
pub async fn revoke_all_sessions(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
) -> Response {
    let ctx = request_context(&addr, &user_agent);

    match state
        .session_service
        .revoke_all(
            auth_user.user_id,
            SessionTerminationReason::UserRequest,
            auth_user.session_id,
            ctx,
        )
        .await
    {
        Ok(revoked) => Json(RevokeAllResponse { revoked }).into_response(),
        Err(_) => Problem::internal().into_response(),
    }
}
