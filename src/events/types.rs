// Domain events: immutable records of facts that already happened.
//
// DomainEvent is a thin envelope (time-sortable v7 id + UTC timestamp)
// around an EventPayload variant. Failure payloads never carry free-form
// strings; every reason is drawn from a closed enum below so events stay
// machine-readable end to end (logs, audit context, SSE).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::registry::EventType;

/// Envelope shared by every domain event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl DomainEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }
}

// ---------------------------------------------------------------------------
// Closed failure-reason sets (one per workflow)
// ---------------------------------------------------------------------------

macro_rules! reason_enum {
    ($name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }
    };
}

reason_enum!(RegistrationFailureReason {
    DuplicateEmail => "duplicate_email",
    WeakPassword => "weak_password",
    InternalError => "internal_error",
});

reason_enum!(AuthenticationFailureReason {
    UserNotFound => "user_not_found",
    EmailNotVerified => "email_not_verified",
    AccountLocked => "account_locked",
    AccountInactive => "account_inactive",
    InvalidPassword => "invalid_password",
    InternalError => "internal_error",
});

reason_enum!(VerificationFailureReason {
    TokenNotFound => "token_not_found",
    TokenExpired => "token_expired",
    TokenAlreadyUsed => "token_already_used",
    UserNotFound => "user_not_found",
    InternalError => "internal_error",
});

reason_enum!(PasswordChangeFailureReason {
    UserNotFound => "user_not_found",
    InvalidCurrentPassword => "invalid_current_password",
    WeakPassword => "weak_password",
    InternalError => "internal_error",
});

reason_enum!(RefreshFailureReason {
    TokenInvalid => "token_invalid",
    TokenExpired => "token_expired",
    TokenRevoked => "token_revoked",
    TokenVersionRejected => "token_version_rejected",
    UserNotFound => "user_not_found",
    UserInactive => "user_inactive",
    InternalError => "internal_error",
});

reason_enum!(LogoutFailureReason {
    TokenNotFound => "token_not_found",
    TokenUserMismatch => "token_user_mismatch",
    TokenAlreadyRevoked => "token_already_revoked",
    InternalError => "internal_error",
});

reason_enum!(ResetRequestFailureReason {
    UserNotFound => "user_not_found",
    EmailNotVerified => "email_not_verified",
    RateLimited => "rate_limited",
    InternalError => "internal_error",
});

reason_enum!(ResetConfirmFailureReason {
    TokenNotFound => "token_not_found",
    TokenExpired => "token_expired",
    TokenAlreadyUsed => "token_already_used",
    UserNotFound => "user_not_found",
    WeakPassword => "weak_password",
    InternalError => "internal_error",
});

reason_enum!(RotationFailureReason {
    VersionRegression => "version_regression",
    UserNotFound => "user_not_found",
    InternalError => "internal_error",
});

reason_enum!(RotationRejectionReason {
    GlobalRotation => "global_rotation",
    UserRotation => "user_rotation",
});

reason_enum!(RoleChangeFailureReason {
    UserNotFound => "user_not_found",
    RoleNotFound => "role_not_found",
    AlreadyAssigned => "already_assigned",
    NotAssigned => "not_assigned",
    InternalError => "internal_error",
});

reason_enum!(ProviderFailureReason {
    OauthError => "oauth_error",
    Timeout => "timeout",
    Unauthorized => "unauthorized",
    InternalError => "internal_error",
});

reason_enum!(SessionRevocationFailureReason {
    SessionNotFound => "session_not_found",
    NotSessionOwner => "not_session_owner",
    SessionAlreadyRevoked => "session_already_revoked",
    InternalError => "internal_error",
});

reason_enum!(AllSessionsRevocationFailureReason {
    InternalError => "internal_error",
});

reason_enum!(SyncFailureReason {
    ProviderError => "provider_error",
    Timeout => "timeout",
    Unauthorized => "unauthorized",
    InternalError => "internal_error",
});

reason_enum!(ImportFailureReason {
    UnsupportedFormat => "unsupported_format",
    ParseError => "parse_error",
    InternalError => "internal_error",
});

// Why a session was terminated. Persisted verbatim in
// sessions.revoked_reason and surfaced in audit context.
reason_enum!(SessionTerminationReason {
    UserRequest => "user_request",
    Logout => "logout",
    SessionLimitExceeded => "session_limit_exceeded",
    PasswordChanged => "password_changed",
    PasswordReset => "password_reset",
    AdminAction => "admin_action",
    SecurityEvent => "security_event",
});

// ---------------------------------------------------------------------------
// Event payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // -- Authentication ----------------------------------------------------
    UserRegistrationAttempted {
        email: String,
    },
    UserRegistrationSucceeded {
        user_id: Uuid,
        email: String,
        verification_token: String,
    },
    UserRegistrationFailed {
        email: String,
        reason: RegistrationFailureReason,
    },
    UserLoginAttempted {
        email: String,
        ip_address: Option<String>,
    },
    UserLoginSucceeded {
        user_id: Uuid,
        email: String,
        session_id: Uuid,
        ip_address: Option<String>,
    },
    UserLoginFailed {
        email: String,
        reason: AuthenticationFailureReason,
        ip_address: Option<String>,
    },
    EmailVerificationAttempted {
        token_prefix: String,
    },
    EmailVerificationSucceeded {
        user_id: Uuid,
        email: String,
    },
    EmailVerificationFailed {
        reason: VerificationFailureReason,
    },
    UserPasswordChangeAttempted {
        user_id: Uuid,
    },
    UserPasswordChangeSucceeded {
        user_id: Uuid,
        email: String,
    },
    UserPasswordChangeFailed {
        user_id: Uuid,
        reason: PasswordChangeFailureReason,
    },
    AuthTokenRefreshAttempted {
        user_id: Option<Uuid>,
    },
    AuthTokenRefreshSucceeded {
        user_id: Uuid,
        session_id: Uuid,
    },
    AuthTokenRefreshFailed {
        user_id: Option<Uuid>,
        reason: RefreshFailureReason,
    },
    UserLogoutAttempted {
        user_id: Uuid,
    },
    UserLogoutSucceeded {
        user_id: Uuid,
        session_id: Uuid,
    },
    UserLogoutFailed {
        user_id: Uuid,
        reason: LogoutFailureReason,
    },
    PasswordResetRequestAttempted {
        email: String,
    },
    PasswordResetRequestSucceeded {
        user_id: Uuid,
        email: String,
        /// First 8 chars only; the full token never enters an event
        token_prefix: String,
    },
    PasswordResetRequestFailed {
        email: String,
        reason: ResetRequestFailureReason,
    },
    PasswordResetConfirmAttempted {
        token_prefix: String,
    },
    PasswordResetConfirmSucceeded {
        user_id: Uuid,
        email: String,
    },
    PasswordResetConfirmFailed {
        reason: ResetConfirmFailureReason,
    },
    GlobalTokenRotationAttempted {
        initiated_by: Uuid,
    },
    GlobalTokenRotationSucceeded {
        initiated_by: Uuid,
        previous_version: i32,
        new_version: i32,
        grace_period_seconds: i32,
    },
    GlobalTokenRotationFailed {
        initiated_by: Uuid,
        reason: RotationFailureReason,
    },
    UserTokenRotationAttempted {
        user_id: Uuid,
        initiated_by: Uuid,
    },
    UserTokenRotationSucceeded {
        user_id: Uuid,
        previous_version: i32,
        new_version: i32,
    },
    UserTokenRotationFailed {
        user_id: Uuid,
        reason: RotationFailureReason,
    },
    TokenRejectedDueToRotation {
        user_id: Uuid,
        token_version: i32,
        required_version: i32,
        rejection_reason: RotationRejectionReason,
    },

    // -- Authorization -----------------------------------------------------
    RoleAssignmentAttempted {
        user_id: Uuid,
        role: String,
    },
    RoleAssignmentSucceeded {
        user_id: Uuid,
        role: String,
    },
    RoleAssignmentFailed {
        user_id: Uuid,
        role: String,
        reason: RoleChangeFailureReason,
    },
    RoleRevocationAttempted {
        user_id: Uuid,
        role: String,
    },
    RoleRevocationSucceeded {
        user_id: Uuid,
        role: String,
    },
    RoleRevocationFailed {
        user_id: Uuid,
        role: String,
        reason: RoleChangeFailureReason,
    },

    // -- Provider ----------------------------------------------------------
    ProviderConnectionAttempted {
        user_id: Uuid,
        provider_slug: String,
    },
    ProviderConnectionSucceeded {
        user_id: Uuid,
        connection_id: Uuid,
        provider_slug: String,
    },
    ProviderConnectionFailed {
        user_id: Uuid,
        provider_slug: String,
        reason: ProviderFailureReason,
    },
    ProviderDisconnectionAttempted {
        user_id: Uuid,
        connection_id: Uuid,
        provider_slug: String,
    },
    ProviderDisconnectionSucceeded {
        user_id: Uuid,
        connection_id: Uuid,
        provider_slug: String,
    },
    ProviderDisconnectionFailed {
        user_id: Uuid,
        connection_id: Uuid,
        provider_slug: String,
        reason: ProviderFailureReason,
    },
    ProviderTokenRefreshAttempted {
        user_id: Uuid,
        connection_id: Uuid,
        provider_slug: String,
    },
    ProviderTokenRefreshSucceeded {
        user_id: Uuid,
        connection_id: Uuid,
        provider_slug: String,
    },
    ProviderTokenRefreshFailed {
        user_id: Uuid,
        connection_id: Uuid,
        provider_slug: String,
        needs_user_action: bool,
        reason: ProviderFailureReason,
    },

    // -- Rate limiting -----------------------------------------------------
    RateLimitCheckAttempted {
        endpoint: String,
        identifier: Option<String>,
        ip_address: Option<String>,
        rule: String,
    },
    RateLimitCheckAllowed {
        endpoint: String,
        identifier: Option<String>,
        rule: String,
    },
    RateLimitCheckDenied {
        endpoint: String,
        identifier: Option<String>,
        ip_address: Option<String>,
        rule: String,
        limit: i32,
        window_seconds: i32,
        violation_count: i32,
    },

    // -- Sessions ----------------------------------------------------------
    SessionCreated {
        session_id: Uuid,
        user_id: Uuid,
        device_info: Option<String>,
        ip_address: Option<String>,
        location: Option<String>,
    },
    SessionRevocationAttempted {
        session_id: Uuid,
        user_id: Uuid,
    },
    SessionRevoked {
        session_id: Uuid,
        user_id: Uuid,
        reason: SessionTerminationReason,
    },
    SessionRevocationFailed {
        session_id: Uuid,
        user_id: Uuid,
        reason: SessionRevocationFailureReason,
    },
    SessionEvicted {
        session_id: Uuid,
        user_id: Uuid,
        reason: SessionTerminationReason,
        device_info: Option<String>,
    },
    AllSessionsRevocationAttempted {
        user_id: Uuid,
        reason: SessionTerminationReason,
    },
    AllSessionsRevoked {
        user_id: Uuid,
        count: u64,
        reason: SessionTerminationReason,
    },
    AllSessionsRevocationFailed {
        user_id: Uuid,
        reason: AllSessionsRevocationFailureReason,
    },
    SessionActivityUpdated {
        session_id: Uuid,
        user_id: Uuid,
        ip_address: Option<String>,
    },
    SessionProviderAccess {
        session_id: Uuid,
        user_id: Uuid,
        provider_slug: String,
    },
    SuspiciousSessionActivity {
        session_id: Uuid,
        user_id: Uuid,
        activity_count: i32,
    },
    SessionLimitExceeded {
        user_id: Uuid,
        active_count: i64,
        max_sessions: i64,
    },

    // -- Data sync ---------------------------------------------------------
    AccountSyncAttempted {
        user_id: Uuid,
        connection_id: Uuid,
    },
    AccountSyncSucceeded {
        user_id: Uuid,
        connection_id: Uuid,
        account_count: u32,
    },
    AccountSyncFailed {
        user_id: Uuid,
        connection_id: Uuid,
        reason: SyncFailureReason,
    },
    TransactionSyncAttempted {
        user_id: Uuid,
        connection_id: Uuid,
        account_id: Option<Uuid>,
    },
    TransactionSyncSucceeded {
        user_id: Uuid,
        connection_id: Uuid,
        account_id: Option<Uuid>,
        transaction_count: u32,
    },
    TransactionSyncFailed {
        user_id: Uuid,
        connection_id: Uuid,
        account_id: Option<Uuid>,
        reason: SyncFailureReason,
    },
    HoldingsSyncAttempted {
        user_id: Uuid,
        account_id: Uuid,
    },
    HoldingsSyncSucceeded {
        user_id: Uuid,
        account_id: Uuid,
        holding_count: u32,
    },
    HoldingsSyncFailed {
        user_id: Uuid,
        account_id: Uuid,
        reason: SyncFailureReason,
    },
    FileImportAttempted {
        user_id: Uuid,
        file_name: String,
        file_format: String,
    },
    FileImportSucceeded {
        user_id: Uuid,
        file_name: String,
        transaction_count: u32,
    },
    FileImportFailed {
        user_id: Uuid,
        file_name: String,
        reason: ImportFailureReason,
    },
    FileImportProgress {
        user_id: Uuid,
        file_name: String,
        progress_percent: u8,
        records_processed: u32,
    },
}

impl EventPayload {
    /// Discriminant used for bus routing and registry lookup
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::UserRegistrationAttempted { .. } => EventType::UserRegistrationAttempted,
            EventPayload::UserRegistrationSucceeded { .. } => EventType::UserRegistrationSucceeded,
            EventPayload::UserRegistrationFailed { .. } => EventType::UserRegistrationFailed,
            EventPayload::UserLoginAttempted { .. } => EventType::UserLoginAttempted,
            EventPayload::UserLoginSucceeded { .. } => EventType::UserLoginSucceeded,
            EventPayload::UserLoginFailed { .. } => EventType::UserLoginFailed,
            EventPayload::EmailVerificationAttempted { .. } => {
                EventType::EmailVerificationAttempted
            },
            EventPayload::EmailVerificationSucceeded { .. } => {
                EventType::EmailVerificationSucceeded
            },
            EventPayload::EmailVerificationFailed { .. } => EventType::EmailVerificationFailed,
            EventPayload::UserPasswordChangeAttempted { .. } => {
                EventType::UserPasswordChangeAttempted
            },
            EventPayload::UserPasswordChangeSucceeded { .. } => {
                EventType::UserPasswordChangeSucceeded
            },
            EventPayload::UserPasswordChangeFailed { .. } => EventType::UserPasswordChangeFailed,
            EventPayload::AuthTokenRefreshAttempted { .. } => EventType::AuthTokenRefreshAttempted,
            EventPayload::AuthTokenRefreshSucceeded { .. } => EventType::AuthTokenRefreshSucceeded,
            EventPayload::AuthTokenRefreshFailed { .. } => EventType::AuthTokenRefreshFailed,
            EventPayload::UserLogoutAttempted { .. } => EventType::UserLogoutAttempted,
            EventPayload::UserLogoutSucceeded { .. } => EventType::UserLogoutSucceeded,
            EventPayload::UserLogoutFailed { .. } => EventType::UserLogoutFailed,
            EventPayload::PasswordResetRequestAttempted { .. } => {
                EventType::PasswordResetRequestAttempted
            },
            EventPayload::PasswordResetRequestSucceeded { .. } => {
                EventType::PasswordResetRequestSucceeded
            },
            EventPayload::PasswordResetRequestFailed { .. } => {
                EventType::PasswordResetRequestFailed
            },
            EventPayload::PasswordResetConfirmAttempted { .. } => {
                EventType::PasswordResetConfirmAttempted
            },
            EventPayload::PasswordResetConfirmSucceeded { .. } => {
                EventType::PasswordResetConfirmSucceeded
            },
            EventPayload::PasswordResetConfirmFailed { .. } => {
                EventType::PasswordResetConfirmFailed
            },
            EventPayload::GlobalTokenRotationAttempted { .. } => {
                EventType::GlobalTokenRotationAttempted
            },
            EventPayload::GlobalTokenRotationSucceeded { .. } => {
                EventType::GlobalTokenRotationSucceeded
            },
            EventPayload::GlobalTokenRotationFailed { .. } => EventType::GlobalTokenRotationFailed,
            EventPayload::UserTokenRotationAttempted { .. } => {
                EventType::UserTokenRotationAttempted
            },
            EventPayload::UserTokenRotationSucceeded { .. } => {
                EventType::UserTokenRotationSucceeded
            },
            EventPayload::UserTokenRotationFailed { .. } => EventType::UserTokenRotationFailed,
            EventPayload::TokenRejectedDueToRotation { .. } => {
                EventType::TokenRejectedDueToRotation
            },
            EventPayload::RoleAssignmentAttempted { .. } => EventType::RoleAssignmentAttempted,
            EventPayload::RoleAssignmentSucceeded { .. } => EventType::RoleAssignmentSucceeded,
            EventPayload::RoleAssignmentFailed { .. } => EventType::RoleAssignmentFailed,
            EventPayload::RoleRevocationAttempted { .. } => EventType::RoleRevocationAttempted,
            EventPayload::RoleRevocationSucceeded { .. } => EventType::RoleRevocationSucceeded,
            EventPayload::RoleRevocationFailed { .. } => EventType::RoleRevocationFailed,
            EventPayload::ProviderConnectionAttempted { .. } => {
                EventType::ProviderConnectionAttempted
            },
            EventPayload::ProviderConnectionSucceeded { .. } => {
                EventType::ProviderConnectionSucceeded
            },
            EventPayload::ProviderConnectionFailed { .. } => EventType::ProviderConnectionFailed,
            EventPayload::ProviderDisconnectionAttempted { .. } => {
                EventType::ProviderDisconnectionAttempted
            },
            EventPayload::ProviderDisconnectionSucceeded { .. } => {
                EventType::ProviderDisconnectionSucceeded
            },
            EventPayload::ProviderDisconnectionFailed { .. } => {
                EventType::ProviderDisconnectionFailed
            },
            EventPayload::ProviderTokenRefreshAttempted { .. } => {
                EventType::ProviderTokenRefreshAttempted
            },
            EventPayload::ProviderTokenRefreshSucceeded { .. } => {
                EventType::ProviderTokenRefreshSucceeded
            },
            EventPayload::ProviderTokenRefreshFailed { .. } => {
                EventType::ProviderTokenRefreshFailed
            },
            EventPayload::RateLimitCheckAttempted { .. } => EventType::RateLimitCheckAttempted,
            EventPayload::RateLimitCheckAllowed { .. } => EventType::RateLimitCheckAllowed,
            EventPayload::RateLimitCheckDenied { .. } => EventType::RateLimitCheckDenied,
            EventPayload::SessionCreated { .. } => EventType::SessionCreated,
            EventPayload::SessionRevocationAttempted { .. } => {
                EventType::SessionRevocationAttempted
            },
            EventPayload::SessionRevoked { .. } => EventType::SessionRevoked,
            EventPayload::SessionRevocationFailed { .. } => EventType::SessionRevocationFailed,
            EventPayload::SessionEvicted { .. } => EventType::SessionEvicted,
            EventPayload::AllSessionsRevocationAttempted { .. } => {
                EventType::AllSessionsRevocationAttempted
            },
            EventPayload::AllSessionsRevoked { .. } => EventType::AllSessionsRevoked,
            EventPayload::AllSessionsRevocationFailed { .. } => {
                EventType::AllSessionsRevocationFailed
            },
            EventPayload::SessionActivityUpdated { .. } => EventType::SessionActivityUpdated,
            EventPayload::SessionProviderAccess { .. } => EventType::SessionProviderAccess,
            EventPayload::SuspiciousSessionActivity { .. } => EventType::SuspiciousSessionActivity,
            EventPayload::SessionLimitExceeded { .. } => EventType::SessionLimitExceeded,
            EventPayload::AccountSyncAttempted { .. } => EventType::AccountSyncAttempted,
            EventPayload::AccountSyncSucceeded { .. } => EventType::AccountSyncSucceeded,
            EventPayload::AccountSyncFailed { .. } => EventType::AccountSyncFailed,
            EventPayload::TransactionSyncAttempted { .. } => EventType::TransactionSyncAttempted,
            EventPayload::TransactionSyncSucceeded { .. } => EventType::TransactionSyncSucceeded,
            EventPayload::TransactionSyncFailed { .. } => EventType::TransactionSyncFailed,
            EventPayload::HoldingsSyncAttempted { .. } => EventType::HoldingsSyncAttempted,
            EventPayload::HoldingsSyncSucceeded { .. } => EventType::HoldingsSyncSucceeded,
            EventPayload::HoldingsSyncFailed { .. } => EventType::HoldingsSyncFailed,
            EventPayload::FileImportAttempted { .. } => EventType::FileImportAttempted,
            EventPayload::FileImportSucceeded { .. } => EventType::FileImportSucceeded,
            EventPayload::FileImportFailed { .. } => EventType::FileImportFailed,
            EventPayload::FileImportProgress { .. } => EventType::FileImportProgress,
        }
    }

    /// The user a payload concerns, when it names one
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            EventPayload::UserRegistrationSucceeded { user_id, .. }
            | EventPayload::UserLoginSucceeded { user_id, .. }
            | EventPayload::EmailVerificationSucceeded { user_id, .. }
            | EventPayload::UserPasswordChangeAttempted { user_id }
            | EventPayload::UserPasswordChangeSucceeded { user_id, .. }
            | EventPayload::UserPasswordChangeFailed { user_id, .. }
            | EventPayload::AuthTokenRefreshSucceeded { user_id, .. }
            | EventPayload::UserLogoutAttempted { user_id }
            | EventPayload::UserLogoutSucceeded { user_id, .. }
            | EventPayload::UserLogoutFailed { user_id, .. }
            | EventPayload::PasswordResetRequestSucceeded { user_id, .. }
            | EventPayload::PasswordResetConfirmSucceeded { user_id, .. }
            | EventPayload::UserTokenRotationAttempted { user_id, .. }
            | EventPayload::UserTokenRotationSucceeded { user_id, .. }
            | EventPayload::UserTokenRotationFailed { user_id, .. }
            | EventPayload::TokenRejectedDueToRotation { user_id, .. }
            | EventPayload::RoleAssignmentAttempted { user_id, .. }
            | EventPayload::RoleAssignmentSucceeded { user_id, .. }
            | EventPayload::RoleAssignmentFailed { user_id, .. }
            | EventPayload::RoleRevocationAttempted { user_id, .. }
            | EventPayload::RoleRevocationSucceeded { user_id, .. }
            | EventPayload::RoleRevocationFailed { user_id, .. }
            | EventPayload::ProviderConnectionAttempted { user_id, .. }
            | EventPayload::ProviderConnectionSucceeded { user_id, .. }
            | EventPayload::ProviderConnectionFailed { user_id, .. }
            | EventPayload::ProviderDisconnectionAttempted { user_id, .. }
            | EventPayload::ProviderDisconnectionSucceeded { user_id, .. }
            | EventPayload::ProviderDisconnectionFailed { user_id, .. }
            | EventPayload::ProviderTokenRefreshAttempted { user_id, .. }
            | EventPayload::ProviderTokenRefreshSucceeded { user_id, .. }
            | EventPayload::ProviderTokenRefreshFailed { user_id, .. }
            | EventPayload::SessionCreated { user_id, .. }
            | EventPayload::SessionRevocationAttempted { user_id, .. }
            | EventPayload::SessionRevoked { user_id, .. }
            | EventPayload::SessionRevocationFailed { user_id, .. }
            | EventPayload::SessionEvicted { user_id, .. }
            | EventPayload::AllSessionsRevocationAttempted { user_id, .. }
            | EventPayload::AllSessionsRevoked { user_id, .. }
            | EventPayload::AllSessionsRevocationFailed { user_id, .. }
            | EventPayload::SessionActivityUpdated { user_id, .. }
            | EventPayload::SessionProviderAccess { user_id, .. }
            | EventPayload::SuspiciousSessionActivity { user_id, .. }
            | EventPayload::SessionLimitExceeded { user_id, .. }
            | EventPayload::AccountSyncAttempted { user_id, .. }
            | EventPayload::AccountSyncSucceeded { user_id, .. }
            | EventPayload::AccountSyncFailed { user_id, .. }
            | EventPayload::TransactionSyncAttempted { user_id, .. }
            | EventPayload::TransactionSyncSucceeded { user_id, .. }
            | EventPayload::TransactionSyncFailed { user_id, .. }
            | EventPayload::HoldingsSyncAttempted { user_id, .. }
            | EventPayload::HoldingsSyncSucceeded { user_id, .. }
            | EventPayload::HoldingsSyncFailed { user_id, .. }
            | EventPayload::FileImportAttempted { user_id, .. }
            | EventPayload::FileImportSucceeded { user_id, .. }
            | EventPayload::FileImportFailed { user_id, .. }
            | EventPayload::FileImportProgress { user_id, .. } => Some(*user_id),
            EventPayload::AuthTokenRefreshAttempted { user_id }
            | EventPayload::AuthTokenRefreshFailed { user_id, .. } => *user_id,
            EventPayload::GlobalTokenRotationAttempted { initiated_by }
            | EventPayload::GlobalTokenRotationSucceeded { initiated_by, .. }
            | EventPayload::GlobalTokenRotationFailed { initiated_by, .. } => Some(*initiated_by),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ids_are_time_sortable() {
        let first = DomainEvent::new(EventPayload::UserRegistrationAttempted {
            email: "a@example.com".to_string(),
        });
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = DomainEvent::new(EventPayload::UserRegistrationAttempted {
            email: "b@example.com".to_string(),
        });

        assert!(second.event_id > first.event_id);
    }

    #[test]
    fn test_event_type_discriminant() {
        let event = DomainEvent::new(EventPayload::SessionCreated {
            session_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            device_info: None,
            ip_address: None,
            location: None,
        });
        assert_eq!(event.event_type(), EventType::SessionCreated);
    }

    #[test]
    fn test_failure_reasons_serialize_snake_case() {
        let json = serde_json::to_string(&RefreshFailureReason::TokenVersionRejected).unwrap();
        assert_eq!(json, "\"token_version_rejected\"");
        assert_eq!(
            RotationRejectionReason::GlobalRotation.as_str(),
            "global_rotation"
        );
    }

    #[test]
    fn test_user_id_extraction() {
        let user = Uuid::new_v4();
        let payload = EventPayload::UserLogoutAttempted { user_id: user };
        assert_eq!(payload.user_id(), Some(user));

        let anon = EventPayload::UserLoginAttempted {
            email: "a@example.com".to_string(),
            ip_address: None,
        };
        assert_eq!(anon.user_id(), None);
    }
}
