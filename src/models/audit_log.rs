// Append-only audit trail. Every action identifier is enumerated here;
// the event registry's compliance tests assert that each audited event
// maps onto exactly one variant.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::audit_logs;

/// Stable machine-readable audit action identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    // User registration
    UserRegistrationAttempted,
    UserRegistered,
    UserRegistrationFailed,
    // User login
    UserLoginAttempted,
    UserLoginSuccess,
    UserLoginFailed,
    // Email verification
    UserEmailVerificationAttempted,
    UserEmailVerified,
    UserEmailVerificationFailed,
    // Password change
    UserPasswordChangeAttempted,
    UserPasswordChanged,
    UserPasswordChangeFailed,
    // Auth token refresh
    AuthTokenRefreshAttempted,
    AuthTokenRefreshed,
    AuthTokenRefreshFailed,
    // Logout
    UserLogoutAttempted,
    UserLogout,
    UserLogoutFailed,
    // Password reset request
    PasswordResetRequestAttempted,
    UserPasswordResetRequested,
    UserPasswordResetFailed,
    // Password reset confirm
    PasswordResetConfirmAttempted,
    UserPasswordResetCompleted,
    PasswordResetConfirmFailed,
    // Global token rotation
    GlobalTokenRotationAttempted,
    GlobalTokenRotationSucceeded,
    GlobalTokenRotationFailed,
    // Per-user token rotation
    UserTokenRotationAttempted,
    UserTokenRotationSucceeded,
    UserTokenRotationFailed,
    // Rotation enforcement
    TokenRejectedVersionMismatch,
    // Authorization
    RoleAssignmentAttempted,
    RoleAssigned,
    RoleAssignmentFailed,
    RoleRevocationAttempted,
    RoleRevoked,
    RoleRevocationFailed,
    // Provider
    ProviderConnectionAttempted,
    ProviderConnected,
    ProviderConnectionFailed,
    ProviderDisconnectionAttempted,
    ProviderDisconnected,
    ProviderDisconnectionFailed,
    ProviderTokenRefreshAttempted,
    ProviderTokenRefreshed,
    ProviderTokenRefreshFailed,
    // Rate limiting
    RateLimitCheckAttempted,
    RateLimitCheckAllowed,
    RateLimitCheckDenied,
    // Sessions
    SessionCreated,
    SessionRevocationAttempted,
    SessionRevoked,
    SessionRevocationFailed,
    SessionEvicted,
    AllSessionsRevocationAttempted,
    AllSessionsRevoked,
    AllSessionsRevocationFailed,
    SessionActivityUpdated,
    SessionProviderAccess,
    SuspiciousSessionActivity,
    SessionLimitExceeded,
    // Data sync
    AccountSyncAttempted,
    AccountSyncSucceeded,
    AccountSyncFailed,
    TransactionSyncAttempted,
    TransactionSyncSucceeded,
    TransactionSyncFailed,
    HoldingsSyncAttempted,
    HoldingsSyncSucceeded,
    HoldingsSyncFailed,
    FileImportAttempted,
    FileImportSucceeded,
    FileImportFailed,
    FileImportProgress,
}

impl AuditAction {
    /// Stable identifier persisted in audit rows
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::UserRegistrationAttempted => "USER_REGISTRATION_ATTEMPTED",
            AuditAction::UserRegistered => "USER_REGISTERED",
            AuditAction::UserRegistrationFailed => "USER_REGISTRATION_FAILED",
            AuditAction::UserLoginAttempted => "USER_LOGIN_ATTEMPTED",
            AuditAction::UserLoginSuccess => "USER_LOGIN_SUCCESS",
            AuditAction::UserLoginFailed => "USER_LOGIN_FAILED",
            AuditAction::UserEmailVerificationAttempted => "USER_EMAIL_VERIFICATION_ATTEMPTED",
            AuditAction::UserEmailVerified => "USER_EMAIL_VERIFIED",
            AuditAction::UserEmailVerificationFailed => "USER_EMAIL_VERIFICATION_FAILED",
            AuditAction::UserPasswordChangeAttempted => "USER_PASSWORD_CHANGE_ATTEMPTED",
            AuditAction::UserPasswordChanged => "USER_PASSWORD_CHANGED",
            AuditAction::UserPasswordChangeFailed => "USER_PASSWORD_CHANGE_FAILED",
            AuditAction::AuthTokenRefreshAttempted => "AUTH_TOKEN_REFRESH_ATTEMPTED",
            AuditAction::AuthTokenRefreshed => "AUTH_TOKEN_REFRESHED",
            AuditAction::AuthTokenRefreshFailed => "AUTH_TOKEN_REFRESH_FAILED",
            AuditAction::UserLogoutAttempted => "USER_LOGOUT_ATTEMPTED",
            AuditAction::UserLogout => "USER_LOGOUT",
            AuditAction::UserLogoutFailed => "USER_LOGOUT_FAILED",
            AuditAction::PasswordResetRequestAttempted => "PASSWORD_RESET_REQUEST_ATTEMPTED",
            AuditAction::UserPasswordResetRequested => "USER_PASSWORD_RESET_REQUESTED",
            AuditAction::UserPasswordResetFailed => "USER_PASSWORD_RESET_FAILED",
            AuditAction::PasswordResetConfirmAttempted => "PASSWORD_RESET_CONFIRM_ATTEMPTED",
            AuditAction::UserPasswordResetCompleted => "USER_PASSWORD_RESET_COMPLETED",
            AuditAction::PasswordResetConfirmFailed => "PASSWORD_RESET_CONFIRM_FAILED",
            AuditAction::GlobalTokenRotationAttempted => "GLOBAL_TOKEN_ROTATION_ATTEMPTED",
            AuditAction::GlobalTokenRotationSucceeded => "GLOBAL_TOKEN_ROTATION_SUCCEEDED",
            AuditAction::GlobalTokenRotationFailed => "GLOBAL_TOKEN_ROTATION_FAILED",
            AuditAction::UserTokenRotationAttempted => "USER_TOKEN_ROTATION_ATTEMPTED",
            AuditAction::UserTokenRotationSucceeded => "USER_TOKEN_ROTATION_SUCCEEDED",
            AuditAction::UserTokenRotationFailed => "USER_TOKEN_ROTATION_FAILED",
            AuditAction::TokenRejectedVersionMismatch => "TOKEN_REJECTED_VERSION_MISMATCH",
            AuditAction::RoleAssignmentAttempted => "ROLE_ASSIGNMENT_ATTEMPTED",
            AuditAction::RoleAssigned => "ROLE_ASSIGNED",
            AuditAction::RoleAssignmentFailed => "ROLE_ASSIGNMENT_FAILED",
            AuditAction::RoleRevocationAttempted => "ROLE_REVOCATION_ATTEMPTED",
            AuditAction::RoleRevoked => "ROLE_REVOKED",
            AuditAction::RoleRevocationFailed => "ROLE_REVOCATION_FAILED",
            AuditAction::ProviderConnectionAttempted => "PROVIDER_CONNECTION_ATTEMPTED",
            AuditAction::ProviderConnected => "PROVIDER_CONNECTED",
            AuditAction::ProviderConnectionFailed => "PROVIDER_CONNECTION_FAILED",
            AuditAction::ProviderDisconnectionAttempted => "PROVIDER_DISCONNECTION_ATTEMPTED",
            AuditAction::ProviderDisconnected => "PROVIDER_DISCONNECTED",
            AuditAction::ProviderDisconnectionFailed => "PROVIDER_DISCONNECTION_FAILED",
            AuditAction::ProviderTokenRefreshAttempted => "PROVIDER_TOKEN_REFRESH_ATTEMPTED",
            AuditAction::ProviderTokenRefreshed => "PROVIDER_TOKEN_REFRESHED",
            AuditAction::ProviderTokenRefreshFailed => "PROVIDER_TOKEN_REFRESH_FAILED",
            AuditAction::RateLimitCheckAttempted => "RATE_LIMIT_CHECK_ATTEMPTED",
            AuditAction::RateLimitCheckAllowed => "RATE_LIMIT_CHECK_ALLOWED",
            AuditAction::RateLimitCheckDenied => "RATE_LIMIT_CHECK_DENIED",
            AuditAction::SessionCreated => "SESSION_CREATED",
            AuditAction::SessionRevocationAttempted => "SESSION_REVOCATION_ATTEMPTED",
            AuditAction::SessionRevoked => "SESSION_REVOKED",
            AuditAction::SessionRevocationFailed => "SESSION_REVOCATION_FAILED",
            AuditAction::SessionEvicted => "SESSION_EVICTED",
            AuditAction::AllSessionsRevocationAttempted => "ALL_SESSIONS_REVOCATION_ATTEMPTED",
            AuditAction::AllSessionsRevoked => "ALL_SESSIONS_REVOKED",
            AuditAction::AllSessionsRevocationFailed => "ALL_SESSIONS_REVOCATION_FAILED",
            AuditAction::SessionActivityUpdated => "SESSION_ACTIVITY_UPDATED",
            AuditAction::SessionProviderAccess => "SESSION_PROVIDER_ACCESS",
            AuditAction::SuspiciousSessionActivity => "SUSPICIOUS_SESSION_ACTIVITY",
            AuditAction::SessionLimitExceeded => "SESSION_LIMIT_EXCEEDED",
            AuditAction::AccountSyncAttempted => "ACCOUNT_SYNC_ATTEMPTED",
            AuditAction::AccountSyncSucceeded => "ACCOUNT_SYNC_SUCCEEDED",
            AuditAction::AccountSyncFailed => "ACCOUNT_SYNC_FAILED",
            AuditAction::TransactionSyncAttempted => "TRANSACTION_SYNC_ATTEMPTED",
            AuditAction::TransactionSyncSucceeded => "TRANSACTION_SYNC_SUCCEEDED",
            AuditAction::TransactionSyncFailed => "TRANSACTION_SYNC_FAILED",
            AuditAction::HoldingsSyncAttempted => "HOLDINGS_SYNC_ATTEMPTED",
            AuditAction::HoldingsSyncSucceeded => "HOLDINGS_SYNC_SUCCEEDED",
            AuditAction::HoldingsSyncFailed => "HOLDINGS_SYNC_FAILED",
            AuditAction::FileImportAttempted => "FILE_IMPORT_ATTEMPTED",
            AuditAction::FileImportSucceeded => "FILE_IMPORT_SUCCEEDED",
            AuditAction::FileImportFailed => "FILE_IMPORT_FAILED",
            AuditAction::FileImportProgress => "FILE_IMPORT_PROGRESS",
        }
    }
}

/// Audit log row
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = audit_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AuditLog {
    pub id: Uuid,
    pub action: String,
    pub user_id: Option<Uuid>,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub context: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// New audit record
#[derive(Debug, Insertable)]
#[diesel(table_name = audit_logs)]
pub struct NewAuditLog {
    pub action: String,
    pub user_id: Option<Uuid>,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub context: serde_json::Value,
}

impl AuditLog {
    /// Append an audit record. The table is append-only; there are no
    /// update or delete paths.
    pub async fn append(
        conn: &mut AsyncPgConnection,
        record: NewAuditLog,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(audit_logs::table)
            .values(&record)
            .get_result::<AuditLog>(conn)
            .await
    }

    /// Recent audit rows for a user, newest first
    pub async fn recent_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        use crate::schema::audit_logs::dsl::*;

        audit_logs
            .filter(user_id.eq(owner))
            .order(created_at.desc())
            .limit(limit)
            .load::<AuditLog>(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_identifiers_are_screaming_snake() {
        for action in [
            AuditAction::UserLoginSuccess,
            AuditAction::SessionEvicted,
            AuditAction::TokenRejectedVersionMismatch,
        ] {
            let name = action.as_str();
            assert!(name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit()));
        }
    }
}
