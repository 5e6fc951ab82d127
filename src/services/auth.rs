// Authentication workflows.
//
// Every workflow publishes exactly three events: ATTEMPTED before the
// business logic, then SUCCEEDED xor FAILED. Failure reasons are the
// closed enums from the events module; the HTTP layer collapses
// enumeration-sensitive reasons into identical external responses.

use chrono::Utc;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::cache::CacheKeys;
use crate::db::{DieselPool, RedisPool};
use crate::events::types::{
    AuthenticationFailureReason, EventPayload, LogoutFailureReason, PasswordChangeFailureReason,
    RefreshFailureReason, RegistrationFailureReason, ResetConfirmFailureReason,
    ResetRequestFailureReason, RotationFailureReason, RotationRejectionReason,
    VerificationFailureReason,
};
use crate::events::{DomainEvent, EventBus, EventContext};
use crate::models::{
    EmailVerificationToken, NewRefreshToken, NewUser, PasswordResetToken, RefreshTokenData,
    SecurityConfig, Session, User, UserError,
};
use crate::services::email::EmailService;
use crate::services::jwt::JwtService;
use crate::services::refresh_token::RefreshTokenService;
use crate::services::session::{CreateSessionError, CreateSessionInput, SessionService};
use crate::utils::{generate_hex_token, hash_password, verify_password};

/// Reset requests tolerated per user per rolling window
const RESET_REQUESTS_PER_WINDOW: i64 = 3;
const RESET_WINDOW_MINUTES: i64 = 60;

// ---------------------------------------------------------------------------
// Workflow error sets (the internal, uncollapsed reasons)
// ---------------------------------------------------------------------------

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RegisterError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Password does not meet the policy")]
    WeakPassword,

    #[error("Internal error")]
    Internal,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AuthenticateError {
    #[error("User not found")]
    UserNotFound,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("Account locked")]
    AccountLocked,

    #[error("Account inactive")]
    AccountInactive,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Internal error")]
    Internal,
}

impl AuthenticateError {
    fn reason(&self) -> AuthenticationFailureReason {
        match self {
            AuthenticateError::UserNotFound => AuthenticationFailureReason::UserNotFound,
            AuthenticateError::EmailNotVerified => AuthenticationFailureReason::EmailNotVerified,
            AuthenticateError::AccountLocked => AuthenticationFailureReason::AccountLocked,
            AuthenticateError::AccountInactive => AuthenticationFailureReason::AccountInactive,
            AuthenticateError::InvalidPassword => AuthenticationFailureReason::InvalidPassword,
            AuthenticateError::Internal => AuthenticationFailureReason::InternalError,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RefreshError {
    #[error("Token invalid")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Token version rejected")]
    TokenVersionRejected,

    #[error("User not found")]
    UserNotFound,

    #[error("User inactive")]
    UserInactive,

    #[error("Internal error")]
    Internal,
}

impl RefreshError {
    fn reason(&self) -> RefreshFailureReason {
        match self {
            RefreshError::TokenInvalid => RefreshFailureReason::TokenInvalid,
            RefreshError::TokenExpired => RefreshFailureReason::TokenExpired,
            RefreshError::TokenRevoked => RefreshFailureReason::TokenRevoked,
            RefreshError::TokenVersionRejected => RefreshFailureReason::TokenVersionRejected,
            RefreshError::UserNotFound => RefreshFailureReason::UserNotFound,
            RefreshError::UserInactive => RefreshFailureReason::UserInactive,
            RefreshError::Internal => RefreshFailureReason::InternalError,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum VerifyEmailError {
    #[error("Token not found")]
    TokenNotFound,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token already used")]
    TokenAlreadyUsed,

    #[error("User not found")]
    UserNotFound,

    #[error("Internal error")]
    Internal,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ResetConfirmError {
    #[error("Token not found")]
    TokenNotFound,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token already used")]
    TokenAlreadyUsed,

    #[error("User not found")]
    UserNotFound,

    #[error("Password does not meet the policy")]
    WeakPassword,

    #[error("Internal error")]
    Internal,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ChangePasswordError {
    #[error("User not found")]
    UserNotFound,

    #[error("Current password is incorrect")]
    InvalidCurrentPassword,

    #[error("Password does not meet the policy")]
    WeakPassword,

    #[error("Internal error")]
    Internal,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RotationError {
    #[error("User not found")]
    UserNotFound,

    #[error("Internal error")]
    Internal,
}

// ---------------------------------------------------------------------------
// Workflow responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub session_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
pub struct GlobalRotationResponse {
    pub previous_version: i32,
    pub new_version: i32,
    pub grace_period_seconds: i32,
}

#[derive(Debug, Clone)]
pub struct UserRotationResponse {
    pub user_id: Uuid,
    pub previous_version: i32,
    pub new_version: i32,
}

/// Password policy: at least 8 chars with upper, lower, digit, and a
/// symbol.
pub fn password_meets_policy(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric())
}

pub struct AuthService {
    pool: DieselPool,
    redis: RedisPool,
    bus: Arc<EventBus>,
    jwt: Arc<JwtService>,
    refresh_tokens: RefreshTokenService,
    sessions: Arc<SessionService>,
    email: Arc<EmailService>,
    cache_keys: CacheKeys,
    verification_ttl_hours: i64,
    reset_ttl_minutes: i64,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: DieselPool,
        redis: RedisPool,
        bus: Arc<EventBus>,
        jwt: Arc<JwtService>,
        refresh_tokens: RefreshTokenService,
        sessions: Arc<SessionService>,
        email: Arc<EmailService>,
        cache_keys: CacheKeys,
        verification_ttl_hours: i64,
        reset_ttl_minutes: i64,
    ) -> Self {
        Self {
            pool,
            redis,
            bus,
            jwt,
            refresh_tokens,
            sessions,
            email,
            cache_keys,
            verification_ttl_hours,
            reset_ttl_minutes,
        }
    }

    async fn publish(&self, payload: EventPayload, ctx: &EventContext) {
        self.bus.publish(DomainEvent::new(payload), ctx.clone()).await;
    }

    // -- Register ----------------------------------------------------------

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        ctx: EventContext,
    ) -> Result<RegisterResponse, RegisterError> {
        let email = email.trim().to_lowercase();

        self.publish(
            EventPayload::UserRegistrationAttempted {
                email: email.clone(),
            },
            &ctx,
        )
        .await;

        let outcome = self.register_inner(&email, password).await;

        match &outcome {
            Ok(response) => {
                // verification_token rides on the event for the email
                // handler; the log sink redacts it
                self.publish(
                    EventPayload::UserRegistrationSucceeded {
                        user_id: response.user_id,
                        email: response.email.clone(),
                        verification_token: response.verification_token.clone(),
                    },
                    &ctx,
                )
                .await;
            },
            Err(error) => {
                let reason = match error {
                    RegisterError::DuplicateEmail => RegistrationFailureReason::DuplicateEmail,
                    RegisterError::WeakPassword => RegistrationFailureReason::WeakPassword,
                    RegisterError::Internal => RegistrationFailureReason::InternalError,
                };
                self.publish(
                    EventPayload::UserRegistrationFailed {
                        email: email.clone(),
                        reason,
                    },
                    &ctx,
                )
                .await;
            },
        }

        outcome.map(|r| RegisterResponse {
            user_id: r.user_id,
            email: r.email,
        })
    }

    async fn register_inner(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RegisteredUser, RegisterError> {
        if !password_meets_policy(password) {
            return Err(RegisterError::WeakPassword);
        }

        let password_hash = hash_password(password).map_err(|_| RegisterError::Internal)?;

        let mut conn = self.pool.get().await.map_err(|_| RegisterError::Internal)?;
        let user = User::create(
            &mut conn,
            NewUser {
                email: email.to_string(),
                password_hash,
                is_verified: false,
                is_active: true,
                session_tier: crate::models::SessionTier::Basic.as_str().to_string(),
            },
        )
        .await
        .map_err(|e| match e {
            UserError::DuplicateEmail => RegisterError::DuplicateEmail,
            _ => RegisterError::Internal,
        })?;

        let token = generate_hex_token();
        EmailVerificationToken::issue(&mut conn, user.id, token.clone(), self.verification_ttl_hours)
            .await
            .map_err(|_| RegisterError::Internal)?;

        Ok(RegisteredUser {
            user_id: user.id,
            email: user.email,
            verification_token: token,
        })
    }

    // -- Authenticate (credentials only) -----------------------------------

    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        ip_address: Option<String>,
        ctx: EventContext,
    ) -> Result<User, AuthenticateError> {
        let email = email.trim().to_lowercase();

        self.publish(
            EventPayload::UserLoginAttempted {
                email: email.clone(),
                ip_address: ip_address.clone(),
            },
            &ctx,
        )
        .await;

        let outcome = self.authenticate_inner(&email, password).await;

        if let Err(error) = &outcome {
            self.publish(
                EventPayload::UserLoginFailed {
                    email: email.clone(),
                    reason: error.reason(),
                    ip_address,
                },
                &ctx,
            )
            .await;
        }

        outcome
    }

    async fn authenticate_inner(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AuthenticateError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| AuthenticateError::Internal)?;

        let user = match User::find_by_email(&mut conn, email).await {
            Ok(user) => user,
            Err(UserError::NotFound) => return Err(AuthenticateError::UserNotFound),
            Err(_) => return Err(AuthenticateError::Internal),
        };

        if !user.is_verified {
            return Err(AuthenticateError::EmailNotVerified);
        }
        if user.is_locked(Utc::now()) {
            return Err(AuthenticateError::AccountLocked);
        }
        if !user.is_active {
            return Err(AuthenticateError::AccountInactive);
        }

        if !verify_password(password, &user.password_hash) {
            User::record_failed_login(&mut conn, user.id)
                .await
                .map_err(|_| AuthenticateError::Internal)?;
            return Err(AuthenticateError::InvalidPassword);
        }

        User::reset_failed_login(&mut conn, user.id)
            .await
            .map_err(|_| AuthenticateError::Internal)
    }

    // -- Login (composite) --------------------------------------------------

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
        ctx: EventContext,
    ) -> Result<LoginResponse, AuthenticateError> {
        let user = self
            .authenticate(email, password, ip_address.clone(), ctx.clone())
            .await?;

        let session = self
            .sessions
            .create(
                CreateSessionInput {
                    user_id: user.id,
                    ip_address: ip_address.clone(),
                    user_agent,
                    expires_at: None,
                    refresh_token_id: None,
                },
                ctx.clone(),
            )
            .await
            .map_err(|e| match e {
                CreateSessionError::UserNotFound => AuthenticateError::UserNotFound,
                _ => AuthenticateError::Internal,
            })?;

        let tokens = self
            .issue_token_pair(&user, session.session_id)
            .await
            .map_err(|_| AuthenticateError::Internal)?;

        self.publish(
            EventPayload::UserLoginSucceeded {
                user_id: user.id,
                email: user.email.clone(),
                session_id: session.session_id,
                ip_address,
            },
            &ctx,
        )
        .await;

        Ok(LoginResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "bearer",
            expires_in: self.jwt.access_token_expiry(),
            session_id: session.session_id,
        })
    }

    /// Mint an access JWT and a refresh record bound to the session
    async fn issue_token_pair(
        &self,
        user: &User,
        session_id: Uuid,
    ) -> anyhow::Result<IssuedTokens> {
        let mut conn = self.pool.get().await?;
        let security = SecurityConfig::get_or_create_default(&mut conn).await?;

        let (plain, token_hash) = self.refresh_tokens.generate_token()?;
        let record = RefreshTokenData::store(
            &mut conn,
            NewRefreshToken {
                user_id: user.id,
                token_hash,
                session_id,
                expires_at: self.refresh_tokens.calculate_expiration(),
                token_version: security.global_min_token_version.max(user.min_token_version),
                global_version_at_issuance: security.global_min_token_version,
            },
        )
        .await?;

        // Bind the session to its (single) active refresh token
        if let Some(mut session) = Session::find_by_id(&mut conn, session_id).await? {
            session.refresh_token_id = Some(record.id);
            session.save(&mut conn).await?;
        }

        let access_token =
            self.jwt
                .generate_access_token(user, Some(session_id), vec!["user".to_string()])?;

        Ok(IssuedTokens {
            access_token,
            refresh_token: plain,
        })
    }

    // -- Logout -------------------------------------------------------------

    /// Logout always reports success to the caller; the FAILED event
    /// records the true reason so token probing learns nothing.
    pub async fn logout(&self, user_id: Uuid, refresh_token: &str, ctx: EventContext) {
        self.publish(EventPayload::UserLogoutAttempted { user_id }, &ctx)
            .await;

        let outcome = self.logout_inner(user_id, refresh_token).await;

        match outcome {
            Ok(session_id) => {
                self.publish(
                    EventPayload::UserLogoutSucceeded {
                        user_id,
                        session_id,
                    },
                    &ctx,
                )
                .await;
            },
            Err(reason) => {
                self.publish(EventPayload::UserLogoutFailed { user_id, reason }, &ctx)
                    .await;
            },
        }
    }

    async fn logout_inner(
        &self,
        user_id: Uuid,
        refresh_token: &str,
    ) -> Result<Uuid, LogoutFailureReason> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| LogoutFailureReason::InternalError)?;

        let live = RefreshTokenData::find_by_token_verification(&mut conn, refresh_token, |p, h| {
            self.refresh_tokens.verify_token(p, h)
        })
        .await
        .map_err(|_| LogoutFailureReason::InternalError)?;

        let record = match live {
            Some(record) => record,
            None => {
                // Distinguish an already-revoked token from an unknown one
                let stale = RefreshTokenData::classify_presented_token(
                    &mut conn,
                    refresh_token,
                    |p, h| self.refresh_tokens.verify_token(p, h),
                )
                .await
                .map_err(|_| LogoutFailureReason::InternalError)?;

                return match stale {
                    Some(t) if t.is_revoked() => Err(LogoutFailureReason::TokenAlreadyRevoked),
                    _ => Err(LogoutFailureReason::TokenNotFound),
                };
            },
        };

        if record.user_id != user_id {
            return Err(LogoutFailureReason::TokenUserMismatch);
        }

        RefreshTokenData::revoke_all_for_session(&mut conn, record.session_id)
            .await
            .map_err(|_| LogoutFailureReason::InternalError)?;

        // The session itself is revoked by the session event handler in
        // response to UserLogoutSucceeded
        Ok(record.session_id)
    }

    // -- Refresh -------------------------------------------------------------

    pub async fn refresh(
        &self,
        refresh_token: &str,
        ctx: EventContext,
    ) -> Result<RefreshResponse, RefreshError> {
        self.publish(EventPayload::AuthTokenRefreshAttempted { user_id: None }, &ctx)
            .await;

        let outcome = self.refresh_inner(refresh_token, &ctx).await;

        match &outcome {
            Ok((response, user_id, session_id)) => {
                self.publish(
                    EventPayload::AuthTokenRefreshSucceeded {
                        user_id: *user_id,
                        session_id: *session_id,
                    },
                    &ctx,
                )
                .await;
                return Ok(response.clone());
            },
            Err((error, user_id)) => {
                self.publish(
                    EventPayload::AuthTokenRefreshFailed {
                        user_id: *user_id,
                        reason: error.reason(),
                    },
                    &ctx,
                )
                .await;
            },
        }

        Err(outcome.unwrap_err().0)
    }

    async fn refresh_inner(
        &self,
        refresh_token: &str,
        ctx: &EventContext,
    ) -> Result<(RefreshResponse, Uuid, Uuid), (RefreshError, Option<Uuid>)> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| (RefreshError::Internal, None))?;

        // Fast path scans live rows only; the fallback classifies
        // revoked/expired presentations for the precise reject code.
        let live = RefreshTokenData::find_by_token_verification(&mut conn, refresh_token, |p, h| {
            self.refresh_tokens.verify_token(p, h)
        })
        .await
        .map_err(|_| (RefreshError::Internal, None))?;

        let record = match live {
            Some(record) => record,
            None => {
                let stale = RefreshTokenData::classify_presented_token(
                    &mut conn,
                    refresh_token,
                    |p, h| self.refresh_tokens.verify_token(p, h),
                )
                .await
                .map_err(|_| (RefreshError::Internal, None))?;

                return Err(match stale {
                    Some(t) if t.is_revoked() => (RefreshError::TokenRevoked, Some(t.user_id)),
                    Some(t) => (RefreshError::TokenExpired, Some(t.user_id)),
                    None => (RefreshError::TokenInvalid, None),
                });
            },
        };

        let user = match User::find_by_id(&mut conn, record.user_id).await {
            Ok(user) => user,
            Err(UserError::NotFound) => {
                return Err((RefreshError::UserNotFound, Some(record.user_id)))
            },
            Err(_) => return Err((RefreshError::Internal, Some(record.user_id))),
        };

        // Two-level rotation check
        let security = SecurityConfig::get_or_create_default(&mut conn)
            .await
            .map_err(|_| (RefreshError::Internal, Some(user.id)))?;
        let required = security.global_min_token_version.max(user.min_token_version);

        if record.token_version < required {
            let now = Utc::now();
            let within_grace = security.is_within_grace_period(now);

            if !within_grace || record.global_version_at_issuance < required - 1 {
                let rejection_reason = if security.global_min_token_version > record.token_version {
                    RotationRejectionReason::GlobalRotation
                } else {
                    RotationRejectionReason::UserRotation
                };

                self.publish(
                    EventPayload::TokenRejectedDueToRotation {
                        user_id: user.id,
                        token_version: record.token_version,
                        required_version: required,
                        rejection_reason,
                    },
                    ctx,
                )
                .await;

                return Err((RefreshError::TokenVersionRejected, Some(user.id)));
            }
        }

        if !user.is_active {
            return Err((RefreshError::UserInactive, Some(user.id)));
        }

        // Rotation: delete the old record and persist the replacement
        // atomically so concurrent refreshes cannot both succeed.
        let session_id = record.session_id;
        let (plain, token_hash) = self
            .refresh_tokens
            .generate_token()
            .map_err(|_| (RefreshError::Internal, Some(user.id)))?;
        let expires_at = self.refresh_tokens.calculate_expiration();
        let global_version = security.global_min_token_version;
        let old_id = record.id;
        let user_id = user.id;

        use diesel_async::scoped_futures::ScopedFutureExt;
        use diesel_async::AsyncConnection;

        let new_record_id = conn
            .transaction::<Uuid, diesel::result::Error, _>(|tx| {
                async move {
                    use crate::schema::refresh_tokens::dsl as rt;
                    use diesel::prelude::*;
                    use diesel_async::RunQueryDsl;

                    let deleted = diesel::delete(rt::refresh_tokens.filter(rt::id.eq(old_id)))
                        .execute(tx)
                        .await?;
                    if deleted == 0 {
                        // A concurrent refresh already rotated this token
                        return Err(diesel::result::Error::NotFound);
                    }

                    let record: RefreshTokenData = diesel::insert_into(rt::refresh_tokens)
                        .values(&NewRefreshToken {
                            user_id,
                            token_hash,
                            session_id,
                            expires_at,
                            token_version: global_version,
                            global_version_at_issuance: global_version,
                        })
                        .get_result(tx)
                        .await?;

                    Ok(record.id)
                }
                .scope_boxed()
            })
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => (RefreshError::TokenInvalid, Some(user_id)),
                _ => (RefreshError::Internal, Some(user_id)),
            })?;

        // Keep the session's refresh binding current
        if let Ok(Some(mut session)) = Session::find_by_id(&mut conn, session_id).await {
            session.refresh_token_id = Some(new_record_id);
            if session.save(&mut conn).await.is_err() {
                warn!(session_id = %session_id, "failed to update session refresh binding");
            }
        }

        let access_token = self
            .jwt
            .generate_access_token(&user, Some(session_id), vec!["user".to_string()])
            .map_err(|_| (RefreshError::Internal, Some(user.id)))?;

        Ok((
            RefreshResponse {
                access_token,
                refresh_token: plain,
                token_type: "bearer",
                expires_in: self.jwt.access_token_expiry(),
            },
            user.id,
            session_id,
        ))
    }

    // -- Verify email --------------------------------------------------------

    pub async fn verify_email(
        &self,
        token: &str,
        ctx: EventContext,
    ) -> Result<(), VerifyEmailError> {
        let token_prefix: String = token.chars().take(8).collect();
        self.publish(
            EventPayload::EmailVerificationAttempted {
                token_prefix: token_prefix.clone(),
            },
            &ctx,
        )
        .await;

        let outcome = self.verify_email_inner(token).await;

        match &outcome {
            Ok((user_id, email)) => {
                self.publish(
                    EventPayload::EmailVerificationSucceeded {
                        user_id: *user_id,
                        email: email.clone(),
                    },
                    &ctx,
                )
                .await;
            },
            Err(error) => {
                let reason = match error {
                    VerifyEmailError::TokenNotFound => VerificationFailureReason::TokenNotFound,
                    VerifyEmailError::TokenExpired => VerificationFailureReason::TokenExpired,
                    VerifyEmailError::TokenAlreadyUsed => {
                        VerificationFailureReason::TokenAlreadyUsed
                    },
                    VerifyEmailError::UserNotFound => VerificationFailureReason::UserNotFound,
                    VerifyEmailError::Internal => VerificationFailureReason::InternalError,
                };
                self.publish(EventPayload::EmailVerificationFailed { reason }, &ctx)
                    .await;
            },
        }

        outcome.map(|_| ())
    }

    async fn verify_email_inner(&self, token: &str) -> Result<(Uuid, String), VerifyEmailError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| VerifyEmailError::Internal)?;

        let record = EmailVerificationToken::find_by_token(&mut conn, token)
            .await
            .map_err(|_| VerifyEmailError::Internal)?
            .ok_or(VerifyEmailError::TokenNotFound)?;

        if record.is_used() {
            return Err(VerifyEmailError::TokenAlreadyUsed);
        }
        if record.is_expired(Utc::now()) {
            return Err(VerifyEmailError::TokenExpired);
        }

        let user = match User::mark_verified(&mut conn, record.user_id).await {
            Ok(user) => user,
            Err(UserError::NotFound) => return Err(VerifyEmailError::UserNotFound),
            Err(_) => return Err(VerifyEmailError::Internal),
        };

        record
            .mark_used(&mut conn)
            .await
            .map_err(|_| VerifyEmailError::Internal)?;

        Ok((user.id, user.email))
    }

    // -- Password reset request ---------------------------------------------

    /// Always resolves to the same generic success externally. The
    /// internal outcome lands in events only.
    pub async fn request_password_reset(
        &self,
        email: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
        ctx: EventContext,
    ) {
        let email = email.trim().to_lowercase();

        self.publish(
            EventPayload::PasswordResetRequestAttempted {
                email: email.clone(),
            },
            &ctx,
        )
        .await;

        let outcome = self
            .request_password_reset_inner(&email, ip_address, user_agent)
            .await;

        match outcome {
            Ok((user_id, token_prefix)) => {
                self.publish(
                    EventPayload::PasswordResetRequestSucceeded {
                        user_id,
                        email: email.clone(),
                        token_prefix,
                    },
                    &ctx,
                )
                .await;
            },
            Err(reason) => {
                self.publish(
                    EventPayload::PasswordResetRequestFailed {
                        email: email.clone(),
                        reason,
                    },
                    &ctx,
                )
                .await;
            },
        }
    }

    async fn request_password_reset_inner(
        &self,
        email: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(Uuid, String), ResetRequestFailureReason> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| ResetRequestFailureReason::InternalError)?;

        let user = match User::find_by_email(&mut conn, email).await {
            Ok(user) => user,
            Err(UserError::NotFound) => return Err(ResetRequestFailureReason::UserNotFound),
            Err(_) => return Err(ResetRequestFailureReason::InternalError),
        };

        if !user.is_verified {
            return Err(ResetRequestFailureReason::EmailNotVerified);
        }

        if self.reset_requests_exhausted(&mut conn, user.id).await {
            return Err(ResetRequestFailureReason::RateLimited);
        }

        let token = generate_hex_token();
        PasswordResetToken::issue(
            &mut conn,
            user.id,
            token.clone(),
            self.reset_ttl_minutes,
            ip_address,
            user_agent,
        )
        .await
        .map_err(|_| ResetRequestFailureReason::InternalError)?;

        // The reset link carries the full token and is dispatched here;
        // events only ever see the 8-char prefix.
        if let Err(e) = self.email.send_password_reset_email(email, &token).await {
            warn!(error = %e, "password reset email dispatch failed");
        }

        Ok((user.id, token.chars().take(8).collect()))
    }

    /// At most 3 reset requests per rolling 60 minutes per user. Redis
    /// is the fast path; the token table backs it up when Redis is
    /// down.
    async fn reset_requests_exhausted(
        &self,
        conn: &mut diesel_async::AsyncPgConnection,
        user_id: Uuid,
    ) -> bool {
        let key = self.cache_keys.reset_rate(user_id);
        match self
            .redis
            .incr_with_window(&key, RESET_WINDOW_MINUTES * 60)
            .await
        {
            Ok(count) => count > RESET_REQUESTS_PER_WINDOW,
            Err(e) => {
                warn!(error = %e, "reset rate limit degraded to repository count");
                PasswordResetToken::count_recent_for_user(conn, user_id, RESET_WINDOW_MINUTES)
                    .await
                    .map(|count| count >= RESET_REQUESTS_PER_WINDOW)
                    .unwrap_or(false)
            },
        }
    }

    // -- Password reset confirm ----------------------------------------------

    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
        ctx: EventContext,
    ) -> Result<(), ResetConfirmError> {
        let token_prefix: String = token.chars().take(8).collect();
        self.publish(
            EventPayload::PasswordResetConfirmAttempted { token_prefix },
            &ctx,
        )
        .await;

        let outcome = self.confirm_password_reset_inner(token, new_password).await;

        match &outcome {
            Ok((user_id, email)) => {
                // Session revocation and the notification mail ride the
                // handler chain
                self.publish(
                    EventPayload::PasswordResetConfirmSucceeded {
                        user_id: *user_id,
                        email: email.clone(),
                    },
                    &ctx,
                )
                .await;
            },
            Err(error) => {
                let reason = match error {
                    ResetConfirmError::TokenNotFound => ResetConfirmFailureReason::TokenNotFound,
                    ResetConfirmError::TokenExpired => ResetConfirmFailureReason::TokenExpired,
                    ResetConfirmError::TokenAlreadyUsed => {
                        ResetConfirmFailureReason::TokenAlreadyUsed
                    },
                    ResetConfirmError::UserNotFound => ResetConfirmFailureReason::UserNotFound,
                    ResetConfirmError::WeakPassword => ResetConfirmFailureReason::WeakPassword,
                    ResetConfirmError::Internal => ResetConfirmFailureReason::InternalError,
                };
                self.publish(EventPayload::PasswordResetConfirmFailed { reason }, &ctx)
                    .await;
            },
        }

        outcome.map(|_| ())
    }

    async fn confirm_password_reset_inner(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(Uuid, String), ResetConfirmError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| ResetConfirmError::Internal)?;

        let record = PasswordResetToken::find_by_token(&mut conn, token)
            .await
            .map_err(|_| ResetConfirmError::Internal)?
            .ok_or(ResetConfirmError::TokenNotFound)?;

        if record.is_used() {
            return Err(ResetConfirmError::TokenAlreadyUsed);
        }
        if record.is_expired(Utc::now()) {
            return Err(ResetConfirmError::TokenExpired);
        }

        if !password_meets_policy(new_password) {
            return Err(ResetConfirmError::WeakPassword);
        }

        let password_hash = hash_password(new_password).map_err(|_| ResetConfirmError::Internal)?;
        let user = match User::set_password_hash(&mut conn, record.user_id, &password_hash).await {
            Ok(user) => user,
            Err(UserError::NotFound) => return Err(ResetConfirmError::UserNotFound),
            Err(_) => return Err(ResetConfirmError::Internal),
        };

        record
            .mark_used(&mut conn)
            .await
            .map_err(|_| ResetConfirmError::Internal)?;

        // Force re-login everywhere
        RefreshTokenData::revoke_all_for_user(&mut conn, user.id)
            .await
            .map_err(|_| ResetConfirmError::Internal)?;

        Ok((user.id, user.email))
    }

    // -- Change password (authenticated) -------------------------------------

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
        ctx: EventContext,
    ) -> Result<(), ChangePasswordError> {
        self.publish(EventPayload::UserPasswordChangeAttempted { user_id }, &ctx)
            .await;

        let outcome = self
            .change_password_inner(user_id, current_password, new_password)
            .await;

        match &outcome {
            Ok(email) => {
                self.publish(
                    EventPayload::UserPasswordChangeSucceeded {
                        user_id,
                        email: email.clone(),
                    },
                    &ctx,
                )
                .await;
            },
            Err(error) => {
                let reason = match error {
                    ChangePasswordError::UserNotFound => PasswordChangeFailureReason::UserNotFound,
                    ChangePasswordError::InvalidCurrentPassword => {
                        PasswordChangeFailureReason::InvalidCurrentPassword
                    },
                    ChangePasswordError::WeakPassword => PasswordChangeFailureReason::WeakPassword,
                    ChangePasswordError::Internal => PasswordChangeFailureReason::InternalError,
                };
                self.publish(
                    EventPayload::UserPasswordChangeFailed { user_id, reason },
                    &ctx,
                )
                .await;
            },
        }

        outcome.map(|_| ())
    }

    async fn change_password_inner(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<String, ChangePasswordError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| ChangePasswordError::Internal)?;

        let user = match User::find_by_id(&mut conn, user_id).await {
            Ok(user) => user,
            Err(UserError::NotFound) => return Err(ChangePasswordError::UserNotFound),
            Err(_) => return Err(ChangePasswordError::Internal),
        };

        if !verify_password(current_password, &user.password_hash) {
            return Err(ChangePasswordError::InvalidCurrentPassword);
        }
        if !password_meets_policy(new_password) {
            return Err(ChangePasswordError::WeakPassword);
        }

        let password_hash =
            hash_password(new_password).map_err(|_| ChangePasswordError::Internal)?;
        User::set_password_hash(&mut conn, user_id, &password_hash)
            .await
            .map_err(|_| ChangePasswordError::Internal)?;

        RefreshTokenData::revoke_all_for_user(&mut conn, user_id)
            .await
            .map_err(|_| ChangePasswordError::Internal)?;

        Ok(user.email)
    }

    // -- Token rotation (admin) ----------------------------------------------

    pub async fn trigger_global_rotation(
        &self,
        initiated_by: Uuid,
        reason: Option<&str>,
        ctx: EventContext,
    ) -> Result<GlobalRotationResponse, RotationError> {
        self.publish(EventPayload::GlobalTokenRotationAttempted { initiated_by }, &ctx)
            .await;

        let outcome: Result<GlobalRotationResponse, RotationError> = async {
            let mut conn = self.pool.get().await.map_err(|_| RotationError::Internal)?;
            let current = SecurityConfig::get_or_create_default(&mut conn)
                .await
                .map_err(|_| RotationError::Internal)?;

            let updated = SecurityConfig::update_global_version(
                &mut conn,
                current.global_min_token_version + 1,
                reason,
            )
            .await
            .map_err(|_| RotationError::Internal)?;

            Ok(GlobalRotationResponse {
                previous_version: current.global_min_token_version,
                new_version: updated.global_min_token_version,
                grace_period_seconds: updated.grace_period_seconds,
            })
        }
        .await;

        match &outcome {
            Ok(response) => {
                self.publish(
                    EventPayload::GlobalTokenRotationSucceeded {
                        initiated_by,
                        previous_version: response.previous_version,
                        new_version: response.new_version,
                        grace_period_seconds: response.grace_period_seconds,
                    },
                    &ctx,
                )
                .await;
            },
            Err(_) => {
                self.publish(
                    EventPayload::GlobalTokenRotationFailed {
                        initiated_by,
                        reason: RotationFailureReason::InternalError,
                    },
                    &ctx,
                )
                .await;
            },
        }

        outcome
    }

    pub async fn trigger_user_rotation(
        &self,
        user_id: Uuid,
        initiated_by: Uuid,
        ctx: EventContext,
    ) -> Result<UserRotationResponse, RotationError> {
        self.publish(
            EventPayload::UserTokenRotationAttempted {
                user_id,
                initiated_by,
            },
            &ctx,
        )
        .await;

        let outcome: Result<UserRotationResponse, RotationError> = async {
            let mut conn = self.pool.get().await.map_err(|_| RotationError::Internal)?;
            let user = match User::find_by_id(&mut conn, user_id).await {
                Ok(user) => user,
                Err(UserError::NotFound) => return Err(RotationError::UserNotFound),
                Err(_) => return Err(RotationError::Internal),
            };

            let updated =
                User::advance_min_token_version(&mut conn, user_id, user.min_token_version + 1)
                    .await
                    .map_err(|_| RotationError::Internal)?;

            Ok(UserRotationResponse {
                user_id,
                previous_version: user.min_token_version,
                new_version: updated.min_token_version,
            })
        }
        .await;

        match &outcome {
            Ok(response) => {
                self.publish(
                    EventPayload::UserTokenRotationSucceeded {
                        user_id,
                        previous_version: response.previous_version,
                        new_version: response.new_version,
                    },
                    &ctx,
                )
                .await;
            },
            Err(error) => {
                let reason = match error {
                    RotationError::UserNotFound => RotationFailureReason::UserNotFound,
                    RotationError::Internal => RotationFailureReason::InternalError,
                };
                self.publish(
                    EventPayload::UserTokenRotationFailed { user_id, reason },
                    &ctx,
                )
                .await;
            },
        }

        outcome
    }
}

struct RegisteredUser {
    user_id: Uuid,
    email: String,
    verification_token: String,
}

struct IssuedTokens {
    access_token: String,
    refresh_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_policy() {
        assert!(password_meets_policy("P@ssw0rd!"));
        assert!(password_meets_policy("NewP@ssw0rd!"));

        assert!(!password_meets_policy("short1!"));
        assert!(!password_meets_policy("alllowercase1!"));
        assert!(!password_meets_policy("ALLUPPERCASE1!"));
        assert!(!password_meets_policy("NoDigits!!"));
        assert!(!password_meets_policy("NoSymbols123"));
    }
}
