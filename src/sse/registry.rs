// SSE event registry - single source of truth.
//
// Two tables: metadata describing every SSE event type (category +
// expected payload fields), and the domain-to-SSE mapping that drives
// both composition-root wiring and the bridge handler. A domain event
// without a mapping is silently ignored; the payload and user-id
// extraction in map_to_sse is pure.

use serde_json::json;

use crate::events::registry::EventType;
use crate::events::types::{DomainEvent, EventPayload};

use super::event::{SseCategory, SseEvent, SseEventType};

/// Metadata for one SSE event type
#[derive(Debug, Clone, Copy)]
pub struct SseEventMeta {
    pub event_type: SseEventType,
    pub category: SseCategory,
    pub description: &'static str,
    pub payload_fields: &'static [&'static str],
}

pub static SSE_EVENT_REGISTRY: &[SseEventMeta] = &[
    // -- Data sync ---------------------------------------------------------
    SseEventMeta {
        event_type: SseEventType::SyncAccountsStarted,
        category: SseCategory::DataSync,
        description: "Account sync operation started",
        payload_fields: &["connection_id"],
    },
    SseEventMeta {
        event_type: SseEventType::SyncAccountsCompleted,
        category: SseCategory::DataSync,
        description: "Account sync operation completed successfully",
        payload_fields: &["connection_id", "account_count"],
    },
    SseEventMeta {
        event_type: SseEventType::SyncAccountsFailed,
        category: SseCategory::DataSync,
        description: "Account sync operation failed",
        payload_fields: &["connection_id", "error"],
    },
    SseEventMeta {
        event_type: SseEventType::SyncTransactionsStarted,
        category: SseCategory::DataSync,
        description: "Transaction sync operation started",
        payload_fields: &["connection_id", "account_id"],
    },
    SseEventMeta {
        event_type: SseEventType::SyncTransactionsCompleted,
        category: SseCategory::DataSync,
        description: "Transaction sync operation completed successfully",
        payload_fields: &["connection_id", "account_id", "transaction_count"],
    },
    SseEventMeta {
        event_type: SseEventType::SyncTransactionsFailed,
        category: SseCategory::DataSync,
        description: "Transaction sync operation failed",
        payload_fields: &["connection_id", "account_id", "error"],
    },
    SseEventMeta {
        event_type: SseEventType::SyncHoldingsStarted,
        category: SseCategory::DataSync,
        description: "Holdings sync operation started",
        payload_fields: &["account_id"],
    },
    SseEventMeta {
        event_type: SseEventType::SyncHoldingsCompleted,
        category: SseCategory::DataSync,
        description: "Holdings sync operation completed successfully",
        payload_fields: &["account_id", "holding_count"],
    },
    SseEventMeta {
        event_type: SseEventType::SyncHoldingsFailed,
        category: SseCategory::DataSync,
        description: "Holdings sync operation failed",
        payload_fields: &["account_id", "error"],
    },
    // -- Provider ----------------------------------------------------------
    SseEventMeta {
        event_type: SseEventType::ProviderTokenExpiring,
        category: SseCategory::Provider,
        description: "Provider OAuth token expiring soon",
        payload_fields: &["connection_id", "provider_slug", "expires_in_seconds"],
    },
    SseEventMeta {
        event_type: SseEventType::ProviderTokenRefreshed,
        category: SseCategory::Provider,
        description: "Provider OAuth token refreshed successfully",
        payload_fields: &["connection_id", "provider_slug"],
    },
    SseEventMeta {
        event_type: SseEventType::ProviderTokenFailed,
        category: SseCategory::Provider,
        description: "Provider OAuth token refresh failed",
        payload_fields: &["connection_id", "provider_slug", "needs_reauth"],
    },
    SseEventMeta {
        event_type: SseEventType::ProviderDisconnected,
        category: SseCategory::Provider,
        description: "Provider connection disconnected",
        payload_fields: &["connection_id", "provider_slug"],
    },
    // -- AI ----------------------------------------------------------------
    SseEventMeta {
        event_type: SseEventType::AiResponseChunk,
        category: SseCategory::Ai,
        description: "AI response text chunk (streaming)",
        payload_fields: &["conversation_id", "chunk", "is_final"],
    },
    SseEventMeta {
        event_type: SseEventType::AiToolExecuting,
        category: SseCategory::Ai,
        description: "AI is executing a tool",
        payload_fields: &["conversation_id", "tool_name"],
    },
    SseEventMeta {
        event_type: SseEventType::AiResponseComplete,
        category: SseCategory::Ai,
        description: "AI response generation completed",
        payload_fields: &["conversation_id"],
    },
    // -- Import ------------------------------------------------------------
    SseEventMeta {
        event_type: SseEventType::ImportStarted,
        category: SseCategory::Import,
        description: "File import operation started",
        payload_fields: &["file_name", "file_format"],
    },
    SseEventMeta {
        event_type: SseEventType::ImportProgress,
        category: SseCategory::Import,
        description: "File import progress update",
        payload_fields: &["file_name", "progress_percent", "records_processed"],
    },
    SseEventMeta {
        event_type: SseEventType::ImportCompleted,
        category: SseCategory::Import,
        description: "File import operation completed successfully",
        payload_fields: &["file_name", "records_imported"],
    },
    SseEventMeta {
        event_type: SseEventType::ImportFailed,
        category: SseCategory::Import,
        description: "File import operation failed",
        payload_fields: &["file_name", "error"],
    },
    // -- Portfolio ---------------------------------------------------------
    SseEventMeta {
        event_type: SseEventType::PortfolioBalanceUpdated,
        category: SseCategory::Portfolio,
        description: "Account balance updated after sync",
        payload_fields: &["account_id", "previous_balance", "new_balance", "currency"],
    },
    SseEventMeta {
        event_type: SseEventType::PortfolioHoldingsUpdated,
        category: SseCategory::Portfolio,
        description: "Portfolio holdings updated after sync",
        payload_fields: &["account_id", "holdings_count"],
    },
    // -- Security ----------------------------------------------------------
    SseEventMeta {
        event_type: SseEventType::SecuritySessionNew,
        category: SseCategory::Security,
        description: "New session created (login from new device/location)",
        payload_fields: &["session_id", "device_info", "location"],
    },
    SseEventMeta {
        event_type: SseEventType::SecuritySessionSuspicious,
        category: SseCategory::Security,
        description: "Suspicious session activity detected",
        payload_fields: &["session_id", "reason"],
    },
    SseEventMeta {
        event_type: SseEventType::SecuritySessionExpiring,
        category: SseCategory::Security,
        description: "Session expiring soon",
        payload_fields: &["session_id", "expires_in_seconds"],
    },
    SseEventMeta {
        event_type: SseEventType::SecuritySessionRevoked,
        category: SseCategory::Security,
        description: "Session revoked on another device",
        payload_fields: &["session_id", "reason"],
    },
    SseEventMeta {
        event_type: SseEventType::SecurityPasswordChanged,
        category: SseCategory::Security,
        description: "Account password was changed",
        payload_fields: &[],
    },
    SseEventMeta {
        event_type: SseEventType::SecurityLoginFailed,
        category: SseCategory::Security,
        description: "Failed login attempt on the account",
        payload_fields: &["ip_address"],
    },
];

/// One domain-to-SSE wiring row. The composition root subscribes the
/// SSE bridge handler to exactly these domain event types.
#[derive(Debug, Clone, Copy)]
pub struct DomainToSseMapping {
    pub domain_event: EventType,
    pub sse_event_type: SseEventType,
}

pub static DOMAIN_TO_SSE: &[DomainToSseMapping] = &[
    // Data sync progress
    DomainToSseMapping {
        domain_event: EventType::AccountSyncAttempted,
        sse_event_type: SseEventType::SyncAccountsStarted,
    },
    DomainToSseMapping {
        domain_event: EventType::AccountSyncSucceeded,
        sse_event_type: SseEventType::SyncAccountsCompleted,
    },
    DomainToSseMapping {
        domain_event: EventType::AccountSyncFailed,
        sse_event_type: SseEventType::SyncAccountsFailed,
    },
    DomainToSseMapping {
        domain_event: EventType::TransactionSyncAttempted,
        sse_event_type: SseEventType::SyncTransactionsStarted,
    },
    DomainToSseMapping {
        domain_event: EventType::TransactionSyncSucceeded,
        sse_event_type: SseEventType::SyncTransactionsCompleted,
    },
    DomainToSseMapping {
        domain_event: EventType::TransactionSyncFailed,
        sse_event_type: SseEventType::SyncTransactionsFailed,
    },
    DomainToSseMapping {
        domain_event: EventType::HoldingsSyncAttempted,
        sse_event_type: SseEventType::SyncHoldingsStarted,
    },
    DomainToSseMapping {
        domain_event: EventType::HoldingsSyncSucceeded,
        sse_event_type: SseEventType::SyncHoldingsCompleted,
    },
    DomainToSseMapping {
        domain_event: EventType::HoldingsSyncFailed,
        sse_event_type: SseEventType::SyncHoldingsFailed,
    },
    // Provider health
    DomainToSseMapping {
        domain_event: EventType::ProviderTokenRefreshSucceeded,
        sse_event_type: SseEventType::ProviderTokenRefreshed,
    },
    DomainToSseMapping {
        domain_event: EventType::ProviderTokenRefreshFailed,
        sse_event_type: SseEventType::ProviderTokenFailed,
    },
    DomainToSseMapping {
        domain_event: EventType::ProviderDisconnectionSucceeded,
        sse_event_type: SseEventType::ProviderDisconnected,
    },
    // File import progress
    DomainToSseMapping {
        domain_event: EventType::FileImportAttempted,
        sse_event_type: SseEventType::ImportStarted,
    },
    DomainToSseMapping {
        domain_event: EventType::FileImportProgress,
        sse_event_type: SseEventType::ImportProgress,
    },
    DomainToSseMapping {
        domain_event: EventType::FileImportSucceeded,
        sse_event_type: SseEventType::ImportCompleted,
    },
    DomainToSseMapping {
        domain_event: EventType::FileImportFailed,
        sse_event_type: SseEventType::ImportFailed,
    },
];

/// Mapping row for a domain event type, if it is client-visible
pub fn mapping_for(domain_event: EventType) -> Option<&'static DomainToSseMapping> {
    DOMAIN_TO_SSE.iter().find(|m| m.domain_event == domain_event)
}

/// Transform a domain event into its SSE wire event.
///
/// Returns None for domain events without a mapping - most are not
/// client-visible. Payload and user-id extraction are pure field
/// projections of the domain payload.
pub fn map_to_sse(event: &DomainEvent) -> Option<SseEvent> {
    let (sse_type, user_id, data) = match &event.payload {
        EventPayload::AccountSyncAttempted {
            user_id,
            connection_id,
        } => (
            SseEventType::SyncAccountsStarted,
            *user_id,
            json!({ "connection_id": connection_id.to_string() }),
        ),
        EventPayload::AccountSyncSucceeded {
            user_id,
            connection_id,
            account_count,
        } => (
            SseEventType::SyncAccountsCompleted,
            *user_id,
            json!({
                "connection_id": connection_id.to_string(),
                "account_count": account_count,
            }),
        ),
        EventPayload::AccountSyncFailed {
            user_id,
            connection_id,
            reason,
        } => (
            SseEventType::SyncAccountsFailed,
            *user_id,
            json!({
                "connection_id": connection_id.to_string(),
                "error": reason.as_str(),
            }),
        ),
        EventPayload::TransactionSyncAttempted {
            user_id,
            connection_id,
            account_id,
        } => (
            SseEventType::SyncTransactionsStarted,
            *user_id,
            json!({
                "connection_id": connection_id.to_string(),
                "account_id": account_id.map(|a| a.to_string()),
            }),
        ),
        EventPayload::TransactionSyncSucceeded {
            user_id,
            connection_id,
            account_id,
            transaction_count,
        } => (
            SseEventType::SyncTransactionsCompleted,
            *user_id,
            json!({
                "connection_id": connection_id.to_string(),
                "account_id": account_id.map(|a| a.to_string()),
                "transaction_count": transaction_count,
            }),
        ),
        EventPayload::TransactionSyncFailed {
            user_id,
            connection_id,
            account_id,
            reason,
        } => (
            SseEventType::SyncTransactionsFailed,
            *user_id,
            json!({
                "connection_id": connection_id.to_string(),
                "account_id": account_id.map(|a| a.to_string()),
                "error": reason.as_str(),
            }),
        ),
        EventPayload::HoldingsSyncAttempted {
            user_id,
            account_id,
        } => (
            SseEventType::SyncHoldingsStarted,
            *user_id,
            json!({ "account_id": account_id.to_string() }),
        ),
        EventPayload::HoldingsSyncSucceeded {
            user_id,
            account_id,
            holding_count,
        } => (
            SseEventType::SyncHoldingsCompleted,
            *user_id,
            json!({
                "account_id": account_id.to_string(),
                "holding_count": holding_count,
            }),
        ),
        EventPayload::HoldingsSyncFailed {
            user_id,
            account_id,
            reason,
        } => (
            SseEventType::SyncHoldingsFailed,
            *user_id,
            json!({
                "account_id": account_id.to_string(),
                "error": reason.as_str(),
            }),
        ),
        EventPayload::ProviderTokenRefreshSucceeded {
            user_id,
            connection_id,
            provider_slug,
        } => (
            SseEventType::ProviderTokenRefreshed,
            *user_id,
            json!({
                "connection_id": connection_id.to_string(),
                "provider_slug": provider_slug,
            }),
        ),
        EventPayload::ProviderTokenRefreshFailed {
            user_id,
            connection_id,
            provider_slug,
            needs_user_action,
            ..
        } => (
            SseEventType::ProviderTokenFailed,
            *user_id,
            json!({
                "connection_id": connection_id.to_string(),
                "provider_slug": provider_slug,
                "needs_reauth": needs_user_action,
            }),
        ),
        EventPayload::ProviderDisconnectionSucceeded {
            user_id,
            connection_id,
            provider_slug,
        } => (
            SseEventType::ProviderDisconnected,
            *user_id,
            json!({
                "connection_id": connection_id.to_string(),
                "provider_slug": provider_slug,
            }),
        ),
        EventPayload::FileImportAttempted {
            user_id,
            file_name,
            file_format,
        } => (
            SseEventType::ImportStarted,
            *user_id,
            json!({ "file_name": file_name, "file_format": file_format }),
        ),
        EventPayload::FileImportProgress {
            user_id,
            file_name,
            progress_percent,
            records_processed,
        } => (
            SseEventType::ImportProgress,
            *user_id,
            json!({
                "file_name": file_name,
                "progress_percent": progress_percent,
                "records_processed": records_processed,
            }),
        ),
        EventPayload::FileImportSucceeded {
            user_id,
            file_name,
            transaction_count,
        } => (
            SseEventType::ImportCompleted,
            *user_id,
            json!({
                "file_name": file_name,
                "records_imported": transaction_count,
            }),
        ),
        EventPayload::FileImportFailed {
            user_id,
            file_name,
            reason,
        } => (
            SseEventType::ImportFailed,
            *user_id,
            json!({ "file_name": file_name, "error": reason.as_str() }),
        ),
        _ => return None,
    };

    Some(SseEvent::new(sse_type, user_id, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_mapped_domain_event_produces_sse_event() {
        let user = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let event = DomainEvent::new(EventPayload::AccountSyncSucceeded {
            user_id: user,
            connection_id: conn,
            account_count: 3,
        });

        let sse = map_to_sse(&event).expect("mapping exists");
        assert_eq!(sse.event_type, SseEventType::SyncAccountsCompleted);
        assert_eq!(sse.user_id, user);
        assert_eq!(sse.data["connection_id"], conn.to_string());
        assert_eq!(sse.data["account_count"], 3);
    }

    #[test]
    fn test_unmapped_domain_event_is_ignored() {
        let event = DomainEvent::new(EventPayload::UserLoginAttempted {
            email: "alice@example.com".to_string(),
            ip_address: None,
        });
        assert!(map_to_sse(&event).is_none());
    }

    #[test]
    fn test_failure_reason_becomes_error_field() {
        let event = DomainEvent::new(EventPayload::HoldingsSyncFailed {
            user_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            reason: crate::events::types::SyncFailureReason::Timeout,
        });

        let sse = map_to_sse(&event).unwrap();
        assert_eq!(sse.data["error"], "timeout");
    }

    #[test]
    fn test_mapping_table_and_extractor_agree() {
        // Every table row must be produced by map_to_sse and vice versa
        for row in DOMAIN_TO_SSE {
            assert!(
                mapping_for(row.domain_event).is_some(),
                "{:?} missing from lookup",
                row.domain_event
            );
        }
        assert_eq!(DOMAIN_TO_SSE.len(), 16);
    }

    #[test]
    fn test_registry_covers_all_sse_types() {
        use std::collections::HashSet;
        let described: HashSet<_> = SSE_EVENT_REGISTRY.iter().map(|m| m.event_type).collect();
        for row in DOMAIN_TO_SSE {
            assert!(
                described.contains(&row.sse_event_type),
                "{:?} has no metadata entry",
                row.sse_event_type
            );
        }
    }
}
