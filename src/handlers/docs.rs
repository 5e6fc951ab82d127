// OpenAPI document for the public surface, served through Swagger UI
// in non-production environments.

use utoipa::OpenApi;

use crate::handlers::auth::{
    ChangePasswordRequest, ForgotPasswordRequest, GlobalRotationResponseBody, LoginRequest,
    LogoutRequest, MessageResponse, RefreshRequest, RegisterRequest, ResetPasswordRequest,
    RotationRequest, TokenResponse, UserRotationResponseBody, VerifyEmailRequest,
};
use crate::handlers::sessions::{RevokeAllResponse, SessionListResponse, SessionView};
use crate::utils::Problem;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dashtam Backend Core API",
        description = "Authentication, session management, and real-time event streaming",
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        LogoutRequest,
        RefreshRequest,
        VerifyEmailRequest,
        ForgotPasswordRequest,
        ResetPasswordRequest,
        ChangePasswordRequest,
        RotationRequest,
        TokenResponse,
        MessageResponse,
        GlobalRotationResponseBody,
        UserRotationResponseBody,
        SessionView,
        SessionListResponse,
        RevokeAllResponse,
        Problem,
    )),
    tags(
        (name = "auth", description = "Registration, login, tokens, password lifecycle"),
        (name = "sessions", description = "Server-side session management"),
        (name = "events", description = "Server-Sent Events streaming"),
    )
)]
pub struct ApiDoc;
