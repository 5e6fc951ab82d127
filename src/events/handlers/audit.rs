// Audit sink: one append-only row per audited domain event.
//
// The handler prefers a request-scoped pool supplied on the publish
// context (so test-scoped transactions see their own rows) and falls
// back to the process pool otherwise. The action identifier comes from
// the event registry; the full (sanitized) payload lands in the
// context JSON together with the event id.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::db::DieselPool;
use crate::events::bus::{EventContext, EventHandler};
use crate::events::registry::meta_for;
use crate::events::types::{DomainEvent, EventPayload};
use crate::models::{AuditLog, NewAuditLog, NewRateLimitAuditLog, RateLimitAuditLog};

use super::redaction::sanitized_payload;

pub struct AuditEventHandler {
    pool: DieselPool,
}

impl AuditEventHandler {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }

    /// Resource coordinates for the audit row
    fn resource_for(payload: &EventPayload) -> (&'static str, Option<String>) {
        match payload {
            EventPayload::SessionCreated { session_id, .. }
            | EventPayload::SessionRevocationAttempted { session_id, .. }
            | EventPayload::SessionRevoked { session_id, .. }
            | EventPayload::SessionRevocationFailed { session_id, .. }
            | EventPayload::SessionEvicted { session_id, .. }
            | EventPayload::SessionActivityUpdated { session_id, .. }
            | EventPayload::SessionProviderAccess { session_id, .. }
            | EventPayload::SuspiciousSessionActivity { session_id, .. } => {
                ("session", Some(session_id.to_string()))
            },
            EventPayload::ProviderConnectionSucceeded { connection_id, .. }
            | EventPayload::ProviderDisconnectionAttempted { connection_id, .. }
            | EventPayload::ProviderDisconnectionSucceeded { connection_id, .. }
            | EventPayload::ProviderDisconnectionFailed { connection_id, .. }
            | EventPayload::ProviderTokenRefreshAttempted { connection_id, .. }
            | EventPayload::ProviderTokenRefreshSucceeded { connection_id, .. }
            | EventPayload::ProviderTokenRefreshFailed { connection_id, .. }
            | EventPayload::AccountSyncAttempted { connection_id, .. }
            | EventPayload::AccountSyncSucceeded { connection_id, .. }
            | EventPayload::AccountSyncFailed { connection_id, .. }
            | EventPayload::TransactionSyncAttempted { connection_id, .. }
            | EventPayload::TransactionSyncSucceeded { connection_id, .. }
            | EventPayload::TransactionSyncFailed { connection_id, .. } => {
                ("provider_connection", Some(connection_id.to_string()))
            },
            EventPayload::HoldingsSyncAttempted { account_id, .. }
            | EventPayload::HoldingsSyncSucceeded { account_id, .. }
            | EventPayload::HoldingsSyncFailed { account_id, .. } => {
                ("account", Some(account_id.to_string()))
            },
            EventPayload::FileImportAttempted { file_name, .. }
            | EventPayload::FileImportSucceeded { file_name, .. }
            | EventPayload::FileImportFailed { file_name, .. }
            | EventPayload::FileImportProgress { file_name, .. } => {
                ("import_file", Some(file_name.clone()))
            },
            EventPayload::RateLimitCheckAttempted { endpoint, .. }
            | EventPayload::RateLimitCheckAllowed { endpoint, .. }
            | EventPayload::RateLimitCheckDenied { endpoint, .. } => {
                ("endpoint", Some(endpoint.clone()))
            },
            other => ("user", other.user_id().map(|id: Uuid| id.to_string())),
        }
    }
}

#[async_trait]
impl EventHandler for AuditEventHandler {
    fn name(&self) -> &'static str {
        "audit"
    }

    async fn handle(&self, event: &DomainEvent, ctx: &EventContext) -> anyhow::Result<()> {
        let meta = meta_for(event.event_type());
        if !meta.requires_audit {
            return Ok(());
        }

        let (resource_type, resource_id) = Self::resource_for(&event.payload);
        let metadata = ctx.metadata.as_ref();

        // The audit trail stores the same redacted view the log stream
        // gets; both go through the shared redaction pass
        let payload = sanitized_payload(&event.payload);

        let record = NewAuditLog {
            action: meta.audit_action.as_str().to_string(),
            user_id: event.payload.user_id(),
            resource_type: resource_type.to_string(),
            resource_id,
            ip_address: metadata.and_then(|m| m.ip_address.clone()),
            user_agent: metadata.and_then(|m| m.user_agent.clone()),
            context: json!({
                "event_id": event.event_id.to_string(),
                "workflow": meta.workflow,
                "phase": meta.phase.as_str(),
                "payload": payload,
            }),
        };

        // Mirror to the audit log target before persistence so the row
        // survives in logs even when the insert fails
        info!(
            target: "audit",
            action = record.action.as_str(),
            user_id = ?record.user_id,
            resource_type = record.resource_type.as_str(),
            event_id = %event.event_id,
            "audit record"
        );

        let pool = ctx.db.as_ref().unwrap_or(&self.pool);
        let mut conn = pool.get().await?;
        AuditLog::append(&mut conn, record).await?;

        // Denied rate-limit checks additionally land in the dedicated
        // violation table used for abuse analysis
        if let EventPayload::RateLimitCheckDenied {
            endpoint,
            identifier,
            ip_address,
            rule,
            limit,
            window_seconds,
            violation_count,
        } = &event.payload
        {
            RateLimitAuditLog::append(
                &mut conn,
                NewRateLimitAuditLog {
                    endpoint: endpoint.clone(),
                    identifier: identifier.clone(),
                    ip_address: ip_address.clone(),
                    rule: rule.clone(),
                    limit_value: *limit,
                    window_seconds: *window_seconds,
                    violation_count: *violation_count,
                },
            )
            .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::SessionTerminationReason;

    #[test]
    fn test_session_events_audit_the_session_resource() {
        let session_id = Uuid::new_v4();
        let payload = EventPayload::SessionRevoked {
            session_id,
            user_id: Uuid::new_v4(),
            reason: SessionTerminationReason::UserRequest,
        };

        let (resource_type, resource_id) = AuditEventHandler::resource_for(&payload);
        assert_eq!(resource_type, "session");
        assert_eq!(resource_id, Some(session_id.to_string()));
    }

    #[test]
    fn test_auth_events_audit_the_user_resource() {
        let user_id = Uuid::new_v4();
        let payload = EventPayload::UserLogoutAttempted { user_id };

        let (resource_type, resource_id) = AuditEventHandler::resource_for(&payload);
        assert_eq!(resource_type, "user");
        assert_eq!(resource_id, Some(user_id.to_string()));
    }

    #[test]
    fn test_rate_limit_events_audit_the_endpoint() {
        let payload = EventPayload::RateLimitCheckDenied {
            endpoint: "/api/v1/sessions".to_string(),
            identifier: Some("user:abc".to_string()),
            ip_address: Some("203.0.113.45".to_string()),
            rule: "login_per_ip".to_string(),
            limit: 10,
            window_seconds: 60,
            violation_count: 3,
        };

        let (resource_type, resource_id) = AuditEventHandler::resource_for(&payload);
        assert_eq!(resource_type, "endpoint");
        assert_eq!(resource_id, Some("/api/v1/sessions".to_string()));
    }
}
