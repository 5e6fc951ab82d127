// Bearer authentication middleware.
//
// Two layers on every protected request: the JWT itself (signature,
// expiry, audience), then the server-side session binding - a revoked
// or deleted session rejects the token even before its exp. This is
// what makes logout effective immediately.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{
    app::AppState, middleware::auth::AuthenticatedUser,
    services::session::CurrentSessionError, utils::Problem,
};

/// Literal prefix of the Authorization header value
const BEARER_PREFIX: &str = "Bearer ";

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(value) if value.starts_with(BEARER_PREFIX) => &value[BEARER_PREFIX.len()..],
        _ => {
            return Problem::unauthorized(
                "missing_bearer_token",
                "Missing or invalid authorization header",
            )
            .into_response();
        },
    };

    let claims = match state.jwt_service.validate_access_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "JWT validation failed");
            return Problem::unauthorized("invalid_token", "Invalid or expired token")
                .into_response();
        },
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => {
            return Problem::unauthorized("invalid_token", "Invalid or expired token")
                .into_response();
        },
    };
    let session_id = claims
        .session_id
        .as_deref()
        .and_then(|raw| Uuid::parse_str(raw).ok());

    // Session binding check. Legacy tokens without a session claim are
    // accepted for backward compatibility.
    if let Some(session_id) = session_id {
        match state.session_service.current_session(session_id).await {
            Ok(_) => {},
            Err(CurrentSessionError::SessionRevoked) => {
                return Problem::unauthorized("session_revoked", "Session has been revoked")
                    .into_response();
            },
            Err(CurrentSessionError::SessionNotFound) => {
                return Problem::unauthorized("session_not_found", "Session no longer exists")
                    .into_response();
            },
            Err(CurrentSessionError::Internal) => {
                return Problem::internal().into_response();
            },
        }

        // Activity tracking is best-effort and runs off the request path
        let sessions = state.session_service.clone();
        let ip = client_ip(&request);
        tokio::spawn(async move {
            sessions.touch_activity(session_id, user_id, ip).await;
        });
    }

    let auth_user = AuthenticatedUser {
        user_id,
        email: claims.email,
        roles: claims.roles,
        session_id,
        jti: claims.jti,
        token_version: claims.token_version,
        exp: claims.exp,
    };

    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

fn client_ip(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
}

/// Extractor so handlers can take AuthenticatedUser directly
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = (StatusCode, axum::Json<Problem>);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(Problem::unauthorized(
                        "authentication_required",
                        "Authentication required",
                    )),
                )
            })
    }
}
