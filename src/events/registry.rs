// Domain event registry - single source of truth.
//
// One row per domain event: category, workflow, phase, which standard
// handlers must process it, and the audit action recorded for it. The
// composition root wires bus subscriptions by iterating this table, and
// the compliance tests enumerate it to catch drift between events,
// handlers, and audit actions.

use std::collections::BTreeMap;

use crate::models::audit_log::AuditAction;

/// Routing discriminant for every domain event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    // Authentication
    UserRegistrationAttempted,
    UserRegistrationSucceeded,
    UserRegistrationFailed,
    UserLoginAttempted,
    UserLoginSucceeded,
    UserLoginFailed,
    EmailVerificationAttempted,
    EmailVerificationSucceeded,
    EmailVerificationFailed,
    UserPasswordChangeAttempted,
    UserPasswordChangeSucceeded,
    UserPasswordChangeFailed,
    AuthTokenRefreshAttempted,
    AuthTokenRefreshSucceeded,
    AuthTokenRefreshFailed,
    UserLogoutAttempted,
    UserLogoutSucceeded,
    UserLogoutFailed,
    PasswordResetRequestAttempted,
    PasswordResetRequestSucceeded,
    PasswordResetRequestFailed,
    PasswordResetConfirmAttempted,
    PasswordResetConfirmSucceeded,
    PasswordResetConfirmFailed,
    GlobalTokenRotationAttempted,
    GlobalTokenRotationSucceeded,
    GlobalTokenRotationFailed,
    UserTokenRotationAttempted,
    UserTokenRotationSucceeded,
    UserTokenRotationFailed,
    TokenRejectedDueToRotation,
    // Authorization
    RoleAssignmentAttempted,
    RoleAssignmentSucceeded,
    RoleAssignmentFailed,
    RoleRevocationAttempted,
    RoleRevocationSucceeded,
    RoleRevocationFailed,
    // Provider
    ProviderConnectionAttempted,
    ProviderConnectionSucceeded,
    ProviderConnectionFailed,
    ProviderDisconnectionAttempted,
    ProviderDisconnectionSucceeded,
    ProviderDisconnectionFailed,
    ProviderTokenRefreshAttempted,
    ProviderTokenRefreshSucceeded,
    ProviderTokenRefreshFailed,
    // Rate limit
    RateLimitCheckAttempted,
    RateLimitCheckAllowed,
    RateLimitCheckDenied,
    // Session
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

/// Event categories for organization and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventCategory {
    Authentication,
    Authorization,
    Provider,
    DataSync,
    Session,
    RateLimit,
    Admin,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Authentication => "authentication",
            EventCategory::Authorization => "authorization",
            EventCategory::Provider => "provider",
            EventCategory::DataSync => "data_sync",
            EventCategory::Session => "session",
            EventCategory::RateLimit => "rate_limit",
            EventCategory::Admin => "admin",
        }
    }
}

/// Workflow phases: ATTEMPT -> OUTCOME, with rate-limit and operational
/// special cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkflowPhase {
    Attempted,
    Succeeded,
    Failed,
    Allowed,
    Denied,
    Operational,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Attempted => "attempted",
            WorkflowPhase::Succeeded => "succeeded",
            WorkflowPhase::Failed => "failed",
            WorkflowPhase::Allowed => "allowed",
            WorkflowPhase::Denied => "denied",
            WorkflowPhase::Operational => "operational",
        }
    }
}

/// Registry row for one domain event
#[derive(Debug, Clone, Copy)]
pub struct EventMeta {
    pub event_type: EventType,
    pub category: EventCategory,
    pub workflow: &'static str,
    pub phase: WorkflowPhase,
    pub requires_logging: bool,
    pub requires_audit: bool,
    pub requires_email: bool,
    pub requires_session: bool,
    pub audit_action: AuditAction,
}

/// Default row shape: logged and audited, no email, no session handling
const fn meta(
    event_type: EventType,
    category: EventCategory,
    workflow: &'static str,
    phase: WorkflowPhase,
    audit_action: AuditAction,
) -> EventMeta {
    EventMeta {
        event_type,
        category,
        workflow,
        phase,
        requires_logging: true,
        requires_audit: true,
        requires_email: false,
        requires_session: false,
        audit_action,
    }
}

use self::EventCategory as C;
use self::EventType as E;
use self::WorkflowPhase as P;
use crate::models::audit_log::AuditAction as A;

pub static EVENT_REGISTRY: &[EventMeta] = &[
    // -- Authentication ----------------------------------------------------
    meta(E::UserRegistrationAttempted, C::Authentication, "user_registration", P::Attempted, A::UserRegistrationAttempted),
    EventMeta {
        requires_email: true, // verification link
        ..meta(E::UserRegistrationSucceeded, C::Authentication, "user_registration", P::Succeeded, A::UserRegistered)
    },
    meta(E::UserRegistrationFailed, C::Authentication, "user_registration", P::Failed, A::UserRegistrationFailed),
    meta(E::UserLoginAttempted, C::Authentication, "user_login", P::Attempted, A::UserLoginAttempted),
    meta(E::UserLoginSucceeded, C::Authentication, "user_login", P::Succeeded, A::UserLoginSuccess),
    meta(E::UserLoginFailed, C::Authentication, "user_login", P::Failed, A::UserLoginFailed),
    meta(E::EmailVerificationAttempted, C::Authentication, "email_verification", P::Attempted, A::UserEmailVerificationAttempted),
    EventMeta {
        requires_email: true, // welcome mail
        ..meta(E::EmailVerificationSucceeded, C::Authentication, "email_verification", P::Succeeded, A::UserEmailVerified)
    },
    meta(E::EmailVerificationFailed, C::Authentication, "email_verification", P::Failed, A::UserEmailVerificationFailed),
    meta(E::UserPasswordChangeAttempted, C::Authentication, "user_password_change", P::Attempted, A::UserPasswordChangeAttempted),
    EventMeta {
        requires_email: true,   // password-changed notification
        requires_session: true, // revoke all sessions
        ..meta(E::UserPasswordChangeSucceeded, C::Authentication, "user_password_change", P::Succeeded, A::UserPasswordChanged)
    },
    meta(E::UserPasswordChangeFailed, C::Authentication, "user_password_change", P::Failed, A::UserPasswordChangeFailed),
    meta(E::AuthTokenRefreshAttempted, C::Authentication, "auth_token_refresh", P::Attempted, A::AuthTokenRefreshAttempted),
    meta(E::AuthTokenRefreshSucceeded, C::Authentication, "auth_token_refresh", P::Succeeded, A::AuthTokenRefreshed),
    meta(E::AuthTokenRefreshFailed, C::Authentication, "auth_token_refresh", P::Failed, A::AuthTokenRefreshFailed),
    meta(E::UserLogoutAttempted, C::Authentication, "user_logout", P::Attempted, A::UserLogoutAttempted),
    EventMeta {
        requires_session: true, // session cleanup
        ..meta(E::UserLogoutSucceeded, C::Authentication, "user_logout", P::Succeeded, A::UserLogout)
    },
    meta(E::UserLogoutFailed, C::Authentication, "user_logout", P::Failed, A::UserLogoutFailed),
    meta(E::PasswordResetRequestAttempted, C::Authentication, "password_reset_request", P::Attempted, A::PasswordResetRequestAttempted),
    EventMeta {
        requires_email: true, // reset link
        ..meta(E::PasswordResetRequestSucceeded, C::Authentication, "password_reset_request", P::Succeeded, A::UserPasswordResetRequested)
    },
    meta(E::PasswordResetRequestFailed, C::Authentication, "password_reset_request", P::Failed, A::UserPasswordResetFailed),
    meta(E::PasswordResetConfirmAttempted, C::Authentication, "password_reset_confirm", P::Attempted, A::PasswordResetConfirmAttempted),
    EventMeta {
        requires_email: true,   // password-changed notification
        requires_session: true, // revoke all sessions
        ..meta(E::PasswordResetConfirmSucceeded, C::Authentication, "password_reset_confirm", P::Succeeded, A::UserPasswordResetCompleted)
    },
    meta(E::PasswordResetConfirmFailed, C::Authentication, "password_reset_confirm", P::Failed, A::PasswordResetConfirmFailed),
    // -- Admin (token rotation control plane) --------------------------------
    meta(E::GlobalTokenRotationAttempted, C::Admin, "global_token_rotation", P::Attempted, A::GlobalTokenRotationAttempted),
    meta(E::GlobalTokenRotationSucceeded, C::Admin, "global_token_rotation", P::Succeeded, A::GlobalTokenRotationSucceeded),
    meta(E::GlobalTokenRotationFailed, C::Admin, "global_token_rotation", P::Failed, A::GlobalTokenRotationFailed),
    meta(E::UserTokenRotationAttempted, C::Admin, "user_token_rotation", P::Attempted, A::UserTokenRotationAttempted),
    meta(E::UserTokenRotationSucceeded, C::Admin, "user_token_rotation", P::Succeeded, A::UserTokenRotationSucceeded),
    meta(E::UserTokenRotationFailed, C::Admin, "user_token_rotation", P::Failed, A::UserTokenRotationFailed),
    meta(E::TokenRejectedDueToRotation, C::Admin, "token_rejected_due_to_rotation", P::Operational, A::TokenRejectedVersionMismatch),
    // -- Authorization -----------------------------------------------------
    meta(E::RoleAssignmentAttempted, C::Authorization, "role_assignment", P::Attempted, A::RoleAssignmentAttempted),
    meta(E::RoleAssignmentSucceeded, C::Authorization, "role_assignment", P::Succeeded, A::RoleAssigned),
    meta(E::RoleAssignmentFailed, C::Authorization, "role_assignment", P::Failed, A::RoleAssignmentFailed),
    meta(E::RoleRevocationAttempted, C::Authorization, "role_revocation", P::Attempted, A::RoleRevocationAttempted),
    meta(E::RoleRevocationSucceeded, C::Authorization, "role_revocation", P::Succeeded, A::RoleRevoked),
    meta(E::RoleRevocationFailed, C::Authorization, "role_revocation", P::Failed, A::RoleRevocationFailed),
    // -- Provider ----------------------------------------------------------
    meta(E::ProviderConnectionAttempted, C::Provider, "provider_connection", P::Attempted, A::ProviderConnectionAttempted),
    EventMeta {
        requires_email: true, // provider-connected notification
        ..meta(E::ProviderConnectionSucceeded, C::Provider, "provider_connection", P::Succeeded, A::ProviderConnected)
    },
    meta(E::ProviderConnectionFailed, C::Provider, "provider_connection", P::Failed, A::ProviderConnectionFailed),
    meta(E::ProviderDisconnectionAttempted, C::Provider, "provider_disconnection", P::Attempted, A::ProviderDisconnectionAttempted),
    meta(E::ProviderDisconnectionSucceeded, C::Provider, "provider_disconnection", P::Succeeded, A::ProviderDisconnected),
    meta(E::ProviderDisconnectionFailed, C::Provider, "provider_disconnection", P::Failed, A::ProviderDisconnectionFailed),
    meta(E::ProviderTokenRefreshAttempted, C::Provider, "provider_token_refresh", P::Attempted, A::ProviderTokenRefreshAttempted),
    meta(E::ProviderTokenRefreshSucceeded, C::Provider, "provider_token_refresh", P::Succeeded, A::ProviderTokenRefreshed),
    meta(E::ProviderTokenRefreshFailed, C::Provider, "provider_token_refresh", P::Failed, A::ProviderTokenRefreshFailed),
    // -- Rate limit --------------------------------------------------------
    meta(E::RateLimitCheckAttempted, C::RateLimit, "rate_limit_check", P::Attempted, A::RateLimitCheckAttempted),
    meta(E::RateLimitCheckAllowed, C::RateLimit, "rate_limit_check", P::Allowed, A::RateLimitCheckAllowed),
    meta(E::RateLimitCheckDenied, C::RateLimit, "rate_limit_check", P::Denied, A::RateLimitCheckDenied),
    // -- Session -----------------------------------------------------------
    EventMeta {
        requires_audit: false, // informational
        ..meta(E::SessionCreated, C::Session, "session_created", P::Operational, A::SessionCreated)
    },
    meta(E::SessionRevocationAttempted, C::Session, "session_revocation", P::Attempted, A::SessionRevocationAttempted),
    meta(E::SessionRevoked, C::Session, "session_revocation", P::Succeeded, A::SessionRevoked),
    meta(E::SessionRevocationFailed, C::Session, "session_revocation", P::Failed, A::SessionRevocationFailed),
    meta(E::SessionEvicted, C::Session, "session_evicted", P::Operational, A::SessionEvicted),
    meta(E::AllSessionsRevocationAttempted, C::Session, "all_sessions_revocation", P::Attempted, A::AllSessionsRevocationAttempted),
    meta(E::AllSessionsRevoked, C::Session, "all_sessions_revocation", P::Succeeded, A::AllSessionsRevoked),
    meta(E::AllSessionsRevocationFailed, C::Session, "all_sessions_revocation", P::Failed, A::AllSessionsRevocationFailed),
    EventMeta {
        requires_audit: false, // lightweight telemetry
        ..meta(E::SessionActivityUpdated, C::Session, "session_activity_updated", P::Operational, A::SessionActivityUpdated)
    },
    meta(E::SessionProviderAccess, C::Session, "session_provider_access", P::Operational, A::SessionProviderAccess),
    meta(E::SuspiciousSessionActivity, C::Session, "suspicious_session_activity", P::Operational, A::SuspiciousSessionActivity),
    EventMeta {
        requires_audit: false, // informational
        ..meta(E::SessionLimitExceeded, C::Session, "session_limit_exceeded", P::Operational, A::SessionLimitExceeded)
    },
    // -- Data sync ---------------------------------------------------------
    meta(E::AccountSyncAttempted, C::DataSync, "account_sync", P::Attempted, A::AccountSyncAttempted),
    meta(E::AccountSyncSucceeded, C::DataSync, "account_sync", P::Succeeded, A::AccountSyncSucceeded),
    meta(E::AccountSyncFailed, C::DataSync, "account_sync", P::Failed, A::AccountSyncFailed),
    meta(E::TransactionSyncAttempted, C::DataSync, "transaction_sync", P::Attempted, A::TransactionSyncAttempted),
    meta(E::TransactionSyncSucceeded, C::DataSync, "transaction_sync", P::Succeeded, A::TransactionSyncSucceeded),
    meta(E::TransactionSyncFailed, C::DataSync, "transaction_sync", P::Failed, A::TransactionSyncFailed),
    meta(E::HoldingsSyncAttempted, C::DataSync, "holdings_sync", P::Attempted, A::HoldingsSyncAttempted),
    meta(E::HoldingsSyncSucceeded, C::DataSync, "holdings_sync", P::Succeeded, A::HoldingsSyncSucceeded),
    meta(E::HoldingsSyncFailed, C::DataSync, "holdings_sync", P::Failed, A::HoldingsSyncFailed),
    meta(E::FileImportAttempted, C::DataSync, "file_import", P::Attempted, A::FileImportAttempted),
    meta(E::FileImportSucceeded, C::DataSync, "file_import", P::Succeeded, A::FileImportSucceeded),
    meta(E::FileImportFailed, C::DataSync, "file_import", P::Failed, A::FileImportFailed),
    EventMeta {
        requires_audit: false, // progress ticks don't need audit rows
        ..meta(E::FileImportProgress, C::DataSync, "file_import", P::Operational, A::FileImportProgress)
    },
];

/// Registry row for an event type. Every EventType has exactly one row.
pub fn meta_for(event_type: EventType) -> &'static EventMeta {
    EVENT_REGISTRY
        .iter()
        .find(|m| m.event_type == event_type)
        .expect("every EventType has a registry row")
}

/// Aggregate registry statistics: the single source for documentation
/// and the compliance tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStatistics {
    pub total_events: usize,
    pub total_workflows: usize,
    pub by_category: BTreeMap<&'static str, usize>,
    pub by_phase: BTreeMap<&'static str, usize>,
    pub requiring_logging: usize,
    pub requiring_audit: usize,
    pub requiring_email: usize,
    pub requiring_session: usize,
}

pub fn registry_statistics() -> RegistryStatistics {
    let mut by_category: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut by_phase: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut workflows: std::collections::BTreeSet<&'static str> = Default::default();

    for row in EVENT_REGISTRY {
        *by_category.entry(row.category.as_str()).or_default() += 1;
        *by_phase.entry(row.phase.as_str()).or_default() += 1;
        workflows.insert(row.workflow);
    }

    RegistryStatistics {
        total_events: EVENT_REGISTRY.len(),
        total_workflows: workflows.len(),
        by_category,
        by_phase,
        requiring_logging: EVENT_REGISTRY.iter().filter(|m| m.requires_logging).count(),
        requiring_audit: EVENT_REGISTRY.iter().filter(|m| m.requires_audit).count(),
        requiring_email: EVENT_REGISTRY.iter().filter(|m| m.requires_email).count(),
        requiring_session: EVENT_REGISTRY.iter().filter(|m| m.requires_session).count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_has_no_duplicate_event_types() {
        let mut seen = HashSet::new();
        for row in EVENT_REGISTRY {
            assert!(
                seen.insert(row.event_type),
                "duplicate registry row for {:?}",
                row.event_type
            );
        }
    }

    #[test]
    fn test_registry_totals() {
        let stats = registry_statistics();
        assert_eq!(stats.total_events, 74);
        assert_eq!(stats.by_category["authentication"], 24);
        assert_eq!(stats.by_category["authorization"], 6);
        assert_eq!(stats.by_category["provider"], 9);
        assert_eq!(stats.by_category["rate_limit"], 3);
        assert_eq!(stats.by_category["session"], 12);
        assert_eq!(stats.by_category["data_sync"], 13);
        assert_eq!(stats.by_category["admin"], 7);
    }

    #[test]
    fn test_every_event_is_logged() {
        let stats = registry_statistics();
        assert_eq!(stats.requiring_logging, stats.total_events);
    }

    #[test]
    fn test_three_state_workflows_have_all_phases() {
        use std::collections::BTreeMap;

        let mut phases: BTreeMap<&str, Vec<WorkflowPhase>> = BTreeMap::new();
        for row in EVENT_REGISTRY {
            phases.entry(row.workflow).or_default().push(row.phase);
        }

        for (workflow, seen) in phases {
            if seen.contains(&WorkflowPhase::Succeeded) && seen.contains(&WorkflowPhase::Failed) {
                assert!(
                    seen.contains(&WorkflowPhase::Attempted),
                    "workflow {} has outcomes but no ATTEMPTED",
                    workflow
                );
            }
        }
    }

    #[test]
    fn test_meta_for_lookup() {
        let row = meta_for(EventType::UserLoginSucceeded);
        assert_eq!(row.workflow, "user_login");
        assert_eq!(row.phase, WorkflowPhase::Succeeded);
        assert!(row.requires_audit);
    }
}
