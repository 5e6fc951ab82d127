// Authentication endpoints: register, login, logout, refresh, email
// verification, password reset, password change, and the admin token
// rotation triggers.
//
// User-enumeration-sensitive flows (register, request-reset, logout)
// return identical external responses across their internal failure
// reasons; the true reasons live in the event stream and audit trail.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use axum_extra::{headers::UserAgent, TypedHeader};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    events::EventContext,
    middleware::auth::AuthenticatedUser,
    services::auth::{
        password_meets_policy, AuthenticateError, ChangePasswordError, RefreshError,
        RegisterError, ResetConfirmError, RotationError, VerifyEmailError,
    },
    utils::Problem,
};

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 320, message = "Email must be less than 320 characters"))]
    pub email: String,

    #[validate(custom(function = "validate_password"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RotationRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GlobalRotationResponseBody {
    pub previous_version: i32,
    pub new_version: i32,
    pub grace_period_seconds: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserRotationResponseBody {
    pub user_id: Uuid,
    pub previous_version: i32,
    pub new_version: i32,
}

/// Password policy: at least 8 chars with upper, lower, digit, symbol
fn validate_password(password: &str) -> Result<(), validator::ValidationError> {
    if !password_meets_policy(password) {
        return Err(validator::ValidationError::new("password_policy"));
    }
    Ok(())
}

fn request_context(addr: &SocketAddr, user_agent: &Option<TypedHeader<UserAgent>>) -> EventContext {
    EventContext::with_metadata(
        Some(addr.ip().to_string()),
        user_agent.as_ref().map(|TypedHeader(ua)| ua.to_string()),
    )
}

// =============================================================================
// HANDLERS
// =============================================================================

/// POST /api/v1/auth/register
///
/// The external response is identical for fresh and already-registered
/// emails. Only a policy-violating password is reported distinctly.
pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return Problem::bad_request("validation_error", e.to_string()).into_response();
    }

    let ctx = request_context(&addr, &user_agent);
    let result = state
        .auth_service
        .register(&request.email, &request.password, ctx)
        .await;

    match result {
        Ok(_) | Err(RegisterError::DuplicateEmail) => (
            StatusCode::CREATED,
            Json(MessageResponse {
                message: "Account created. Check your email for a verification link.".to_string(),
            }),
        )
            .into_response(),
        Err(RegisterError::WeakPassword) => Problem::bad_request(
            "weak_password",
            "Password must be at least 8 characters with upper and lower case, a digit, and a symbol",
        )
        .into_response(),
        Err(RegisterError::Internal) => Problem::internal().into_response(),
    }
}

/// POST /api/v1/sessions (login)
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(request): Json<LoginRequest>,
) -> Response {
    let email = request.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Problem::unauthorized("invalid_credentials", "Invalid email or password")
            .into_response();
    }

    let ctx = request_context(&addr, &user_agent);
    let ip = Some(addr.ip().to_string());
    let ua = user_agent.as_ref().map(|TypedHeader(v)| v.to_string());

    match state
        .auth_service
        .login(&email, &request.password, ip, ua, ctx)
        .await
    {
        Ok(tokens) => (
            StatusCode::CREATED,
            Json(TokenResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                token_type: tokens.token_type.to_string(),
                expires_in: tokens.expires_in,
                session_id: Some(tokens.session_id),
            }),
        )
            .into_response(),
        Err(e) => login_error_response(e),
    }
}

/// Collapse enumeration-sensitive authenticate failures into
/// invalid_credentials; locked and unverified accounts are explicit
/// (they only surface for valid account holders anyway).
fn login_error_response(error: AuthenticateError) -> Response {
    match error {
        AuthenticateError::UserNotFound
        | AuthenticateError::InvalidPassword
        | AuthenticateError::AccountInactive => {
            Problem::unauthorized("invalid_credentials", "Invalid email or password")
                .into_response()
        },
        AuthenticateError::EmailNotVerified => Problem::forbidden(
            "email_not_verified",
            "Verify your email address before signing in",
        )
        .into_response(),
        AuthenticateError::AccountLocked => Problem::forbidden(
            "account_locked",
            "Account temporarily locked after repeated failed sign-ins",
        )
        .into_response(),
        AuthenticateError::Internal => Problem::internal().into_response(),
    }
}

/// DELETE /api/v1/sessions/current (logout)
///
/// Always 204: the caller learns nothing about the token they
/// presented. The access token dies on its next use via the session
/// revocation check.
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(request): Json<LogoutRequest>,
) -> Response {
    let ctx = request_context(&addr, &user_agent);
    state
        .auth_service
        .logout(auth_user.user_id, &request.refresh_token, ctx)
        .await;

    StatusCode::NO_CONTENT.into_response()
}

/// POST /api/v1/auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(request): Json<RefreshRequest>,
) -> Response {
    let ctx = request_context(&addr, &user_agent);

    match state.auth_service.refresh(&request.refresh_token, ctx).await {
        Ok(tokens) => Json(TokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type.to_string(),
            expires_in: tokens.expires_in,
            session_id: None,
        })
        .into_response(),
        Err(RefreshError::TokenInvalid) | Err(RefreshError::UserNotFound) => {
            Problem::unauthorized("token_invalid", "Refresh token is not valid").into_response()
        },
        Err(RefreshError::TokenExpired) => {
            Problem::unauthorized("token_expired", "Refresh token has expired").into_response()
        },
        Err(RefreshError::TokenRevoked) => {
            Problem::unauthorized("token_revoked", "Refresh token has been revoked")
                .into_response()
        },
        Err(RefreshError::TokenVersionRejected) => Problem::unauthorized(
            "token_version_rejected",
            "Refresh token was invalidated by a security rotation",
        )
        .into_response(),
        Err(RefreshError::UserInactive) => {
            Problem::forbidden("account_inactive", "Account is inactive").into_response()
        },
        Err(RefreshError::Internal) => Problem::internal().into_response(),
    }
}

/// POST /api/v1/auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(request): Json<VerifyEmailRequest>,
) -> Response {
    if !is_hex_token(&request.token) {
        return Problem::bad_request("token_not_found", "Unknown verification token")
            .into_response();
    }

    let ctx = request_context(&addr, &user_agent);
    match state.auth_service.verify_email(&request.token, ctx).await {
        Ok(()) => Json(MessageResponse {
            message: "Email verified. You can sign in now.".to_string(),
        })
        .into_response(),
        Err(VerifyEmailError::TokenNotFound) | Err(VerifyEmailError::UserNotFound) => {
            Problem::bad_request("token_not_found", "Unknown verification token").into_response()
        },
        Err(VerifyEmailError::TokenExpired) => {
            Problem::bad_request("token_expired", "Verification token has expired")
                .into_response()
        },
        Err(VerifyEmailError::TokenAlreadyUsed) => {
            Problem::bad_request("token_already_used", "Verification token was already used")
                .into_response()
        },
        Err(VerifyEmailError::Internal) => Problem::internal().into_response(),
    }
}

/// POST /api/v1/password-reset-tokens
///
/// 202 with a generic message regardless of outcome.
pub async fn forgot_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Response {
    if request.validate().is_err() {
        // Even malformed emails get the generic answer
        return generic_reset_response();
    }

    let ctx = request_context(&addr, &user_agent);
    let ip = Some(addr.ip().to_string());
    let ua = user_agent.as_ref().map(|TypedHeader(v)| v.to_string());

    state
        .auth_service
        .request_password_reset(&request.email, ip, ua, ctx)
        .await;

    generic_reset_response()
}

fn generic_reset_response() -> Response {
    (
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "If an account with that email exists, a password reset link has been sent."
                .to_string(),
        }),
    )
        .into_response()
}

/// POST /api/v1/password-resets
pub async fn reset_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Response {
    let ctx = request_context(&addr, &user_agent);

    match state
        .auth_service
        .confirm_password_reset(&request.token, &request.new_password, ctx)
        .await
    {
        Ok(()) => Json(MessageResponse {
            message: "Password updated. Sign in with your new password.".to_string(),
        })
        .into_response(),
        Err(ResetConfirmError::TokenNotFound) | Err(ResetConfirmError::UserNotFound) => {
            Problem::bad_request("token_not_found", "Unknown reset token").into_response()
        },
        Err(ResetConfirmError::TokenExpired) => {
            Problem::bad_request("token_expired", "Reset token has expired").into_response()
        },
        Err(ResetConfirmError::TokenAlreadyUsed) => {
            Problem::bad_request("token_already_used", "Reset token was already used")
                .into_response()
        },
        Err(ResetConfirmError::WeakPassword) => Problem::bad_request(
            "weak_password",
            "Password must be at least 8 characters with upper and lower case, a digit, and a symbol",
        )
        .into_response(),
        Err(ResetConfirmError::Internal) => Problem::internal().into_response(),
    }
}

/// POST /api/v1/auth/change-password (authenticated)
pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(request): Json<ChangePasswordRequest>,
) -> Response {
    let ctx = request_context(&addr, &user_agent);

    match state
        .auth_service
        .change_password(
            auth_user.user_id,
            &request.current_password,
            &request.new_password,
            ctx,
        )
        .await
    {
        Ok(()) => Json(MessageResponse {
            message: "Password changed. Other devices have been signed out.".to_string(),
        })
        .into_response(),
        Err(ChangePasswordError::InvalidCurrentPassword) => {
            Problem::unauthorized("invalid_credentials", "Current password is incorrect")
                .into_response()
        },
        Err(ChangePasswordError::WeakPassword) => Problem::bad_request(
            "weak_password",
            "Password must be at least 8 characters with upper and lower case, a digit, and a symbol",
        )
        .into_response(),
        Err(ChangePasswordError::UserNotFound) => {
            Problem::unauthorized("invalid_credentials", "Current password is incorrect")
                .into_response()
        },
        Err(ChangePasswordError::Internal) => Problem::internal().into_response(),
    }
}

/// POST /api/v1/admin/token-rotations - advance the global minimum
/// token version (admin only)
pub async fn trigger_global_rotation(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(request): Json<RotationRequest>,
) -> Response {
    if !auth_user.is_admin() {
        return Problem::forbidden("admin_required", "Administrator role required")
            .into_response();
    }

    let ctx = request_context(&addr, &user_agent);
    match state
        .auth_service
        .trigger_global_rotation(auth_user.user_id, request.reason.as_deref(), ctx)
        .await
    {
        Ok(result) => Json(GlobalRotationResponseBody {
            previous_version: result.previous_version,
            new_version: result.new_version,
            grace_period_seconds: result.grace_period_seconds,
        })
        .into_response(),
        Err(_) => Problem::internal().into_response(),
    }
}

/// POST /api/v1/admin/users/{id}/token-rotations - advance one user's
/// minimum token version (admin only)
pub async fn trigger_user_rotation(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Path(user_id): Path<Uuid>,
) -> Response {
    if !auth_user.is_admin() {
        return Problem::forbidden("admin_required", "Administrator role required")
            .into_response();
    }

    let ctx = request_context(&addr, &user_agent);
    match state
        .auth_service
        .trigger_user_rotation(user_id, auth_user.user_id, ctx)
        .await
    {
        Ok(result) => Json(UserRotationResponseBody {
            user_id: result.user_id,
            previous_version: result.previous_version,
            new_version: result.new_version,
        })
        .into_response(),
        Err(RotationError::UserNotFound) => {
            Problem::not_found("user_not_found", "No such user").into_response()
        },
        Err(RotationError::Internal) => Problem::internal().into_response(),
    }
}

/// One-shot tokens are exactly 64 lowercase hex chars
fn is_hex_token(token: &str) -> bool {
    static HEX_TOKEN: once_cell::sync::Lazy<regex::Regex> =
        once_cell::sync::Lazy::new(|| regex::Regex::new("^[0-9a-f]{64}$").unwrap());
    HEX_TOKEN.is_match(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_token_format_guard() {
        assert!(is_hex_token(&"a".repeat(64)));
        assert!(is_hex_token(&"0123456789abcdef".repeat(4)));

        assert!(!is_hex_token(&"A".repeat(64)));
        assert!(!is_hex_token(&"a".repeat(63)));
        assert!(!is_hex_token(&"g".repeat(64)));
        assert!(!is_hex_token(""));
    }

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            email: "alice@example.com".to_string(),
            password: "P@ssw0rd!".to_string(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "P@ssw0rd!".to_string(),
        };
        assert!(bad_email.validate().is_err());

        let weak_password = RegisterRequest {
            email: "alice@example.com".to_string(),
            password: "weak".to_string(),
        };
        assert!(weak_password.validate().is_err());
    }
}
