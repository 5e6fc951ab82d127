// Service layer for the Dashtam backend core

pub mod auth;
pub mod email;
pub mod enrichment;
pub mod jwt;
pub mod refresh_token;
pub mod session;

pub use auth::{
    password_meets_policy, AuthService, AuthenticateError, ChangePasswordError,
    GlobalRotationResponse, LoginResponse, RefreshError, RefreshResponse, RegisterError,
    RegisterResponse, ResetConfirmError, RotationError, UserRotationResponse, VerifyEmailError,
};
pub use email::{EmailError, EmailService};
pub use jwt::{JwtConfig, JwtError, JwtService};
pub use refresh_token::RefreshTokenService;
pub use session::{
    CreateSessionError, CreateSessionInput, CreateSessionResponse, CurrentSessionError,
    RevokeSessionError, SessionService,
};
