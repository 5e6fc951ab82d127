// SSE wire event model.
//
// SSE events are the client-facing wire format, distinct from domain
// events. Event ids are UUID v7 so Last-Event-ID replay is
// well-ordered; event types use dot-notation (sync.accounts.completed)
// and group into categories clients can filter on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Categories clients can subscribe to via ?categories=
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SseCategory {
    DataSync,
    Provider,
    Ai,
    Import,
    Portfolio,
    Security,
}

impl SseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SseCategory::DataSync => "data_sync",
            SseCategory::Provider => "provider",
            SseCategory::Ai => "ai",
            SseCategory::Import => "import",
            SseCategory::Portfolio => "portfolio",
            SseCategory::Security => "security",
        }
    }

    pub const ALL: [SseCategory; 6] = [
        SseCategory::DataSync,
        SseCategory::Provider,
        SseCategory::Ai,
        SseCategory::Import,
        SseCategory::Portfolio,
        SseCategory::Security,
    ];
}

impl FromStr for SseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data_sync" => Ok(SseCategory::DataSync),
            "provider" => Ok(SseCategory::Provider),
            "ai" => Ok(SseCategory::Ai),
            "import" => Ok(SseCategory::Import),
            "portfolio" => Ok(SseCategory::Portfolio),
            "security" => Ok(SseCategory::Security),
            other => Err(format!(
                "Invalid category '{}'. Valid categories: data_sync, provider, ai, import, portfolio, security",
                other
            )),
        }
    }
}

/// All SSE event types. Naming convention: {category}.{resource}.{action}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SseEventType {
    // Data sync
    SyncAccountsStarted,
    SyncAccountsCompleted,
    SyncAccountsFailed,
    SyncTransactionsStarted,
    SyncTransactionsCompleted,
    SyncTransactionsFailed,
    SyncHoldingsStarted,
    SyncHoldingsCompleted,
    SyncHoldingsFailed,
    // Provider
    ProviderTokenExpiring,
    ProviderTokenRefreshed,
    ProviderTokenFailed,
    ProviderDisconnected,
    // AI
    AiResponseChunk,
    AiToolExecuting,
    AiResponseComplete,
    // Import
    ImportStarted,
    ImportProgress,
    ImportCompleted,
    ImportFailed,
    // Portfolio
    PortfolioBalanceUpdated,
    PortfolioHoldingsUpdated,
    // Security
    SecuritySessionNew,
    SecuritySessionSuspicious,
    SecuritySessionExpiring,
    SecuritySessionRevoked,
    SecurityPasswordChanged,
    SecurityLoginFailed,
}

impl SseEventType {
    /// Dot-notation wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            SseEventType::SyncAccountsStarted => "sync.accounts.started",
            SseEventType::SyncAccountsCompleted => "sync.accounts.completed",
            SseEventType::SyncAccountsFailed => "sync.accounts.failed",
            SseEventType::SyncTransactionsStarted => "sync.transactions.started",
            SseEventType::SyncTransactionsCompleted => "sync.transactions.completed",
            SseEventType::SyncTransactionsFailed => "sync.transactions.failed",
            SseEventType::SyncHoldingsStarted => "sync.holdings.started",
            SseEventType::SyncHoldingsCompleted => "sync.holdings.completed",
            SseEventType::SyncHoldingsFailed => "sync.holdings.failed",
            SseEventType::ProviderTokenExpiring => "provider.token.expiring",
            SseEventType::ProviderTokenRefreshed => "provider.token.refreshed",
            SseEventType::ProviderTokenFailed => "provider.token.failed",
            SseEventType::ProviderDisconnected => "provider.disconnected",
            SseEventType::AiResponseChunk => "ai.response.chunk",
            SseEventType::AiToolExecuting => "ai.tool.executing",
            SseEventType::AiResponseComplete => "ai.response.complete",
            SseEventType::ImportStarted => "import.started",
            SseEventType::ImportProgress => "import.progress",
            SseEventType::ImportCompleted => "import.completed",
            SseEventType::ImportFailed => "import.failed",
            SseEventType::PortfolioBalanceUpdated => "portfolio.balance.updated",
            SseEventType::PortfolioHoldingsUpdated => "portfolio.holdings.updated",
            SseEventType::SecuritySessionNew => "security.session.new",
            SseEventType::SecuritySessionSuspicious => "security.session.suspicious",
            SseEventType::SecuritySessionExpiring => "security.session.expiring",
            SseEventType::SecuritySessionRevoked => "security.session.revoked",
            SseEventType::SecurityPasswordChanged => "security.password.changed",
            SseEventType::SecurityLoginFailed => "security.login.failed",
        }
    }

    /// Category this event type belongs to
    pub fn category(&self) -> SseCategory {
        match self {
            SseEventType::SyncAccountsStarted
            | SseEventType::SyncAccountsCompleted
            | SseEventType::SyncAccountsFailed
            | SseEventType::SyncTransactionsStarted
            | SseEventType::SyncTransactionsCompleted
            | SseEventType::SyncTransactionsFailed
            | SseEventType::SyncHoldingsStarted
            | SseEventType::SyncHoldingsCompleted
            | SseEventType::SyncHoldingsFailed => SseCategory::DataSync,
            SseEventType::ProviderTokenExpiring
            | SseEventType::ProviderTokenRefreshed
            | SseEventType::ProviderTokenFailed
            | SseEventType::ProviderDisconnected => SseCategory::Provider,
            SseEventType::AiResponseChunk
            | SseEventType::AiToolExecuting
            | SseEventType::AiResponseComplete => SseCategory::Ai,
            SseEventType::ImportStarted
            | SseEventType::ImportProgress
            | SseEventType::ImportCompleted
            | SseEventType::ImportFailed => SseCategory::Import,
            SseEventType::PortfolioBalanceUpdated | SseEventType::PortfolioHoldingsUpdated => {
                SseCategory::Portfolio
            },
            SseEventType::SecuritySessionNew
            | SseEventType::SecuritySessionSuspicious
            | SseEventType::SecuritySessionExpiring
            | SseEventType::SecuritySessionRevoked
            | SseEventType::SecurityPasswordChanged
            | SseEventType::SecurityLoginFailed => SseCategory::Security,
        }
    }
}

impl FromStr for SseEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync.accounts.started" => Ok(SseEventType::SyncAccountsStarted),
            "sync.accounts.completed" => Ok(SseEventType::SyncAccountsCompleted),
            "sync.accounts.failed" => Ok(SseEventType::SyncAccountsFailed),
            "sync.transactions.started" => Ok(SseEventType::SyncTransactionsStarted),
            "sync.transactions.completed" => Ok(SseEventType::SyncTransactionsCompleted),
            "sync.transactions.failed" => Ok(SseEventType::SyncTransactionsFailed),
            "sync.holdings.started" => Ok(SseEventType::SyncHoldingsStarted),
            "sync.holdings.completed" => Ok(SseEventType::SyncHoldingsCompleted),
            "sync.holdings.failed" => Ok(SseEventType::SyncHoldingsFailed),
            "provider.token.expiring" => Ok(SseEventType::ProviderTokenExpiring),
            "provider.token.refreshed" => Ok(SseEventType::ProviderTokenRefreshed),
            "provider.token.failed" => Ok(SseEventType::ProviderTokenFailed),
            "provider.disconnected" => Ok(SseEventType::ProviderDisconnected),
            "ai.response.chunk" => Ok(SseEventType::AiResponseChunk),
            "ai.tool.executing" => Ok(SseEventType::AiToolExecuting),
            "ai.response.complete" => Ok(SseEventType::AiResponseComplete),
            "import.started" => Ok(SseEventType::ImportStarted),
            "import.progress" => Ok(SseEventType::ImportProgress),
            "import.completed" => Ok(SseEventType::ImportCompleted),
            "import.failed" => Ok(SseEventType::ImportFailed),
            "portfolio.balance.updated" => Ok(SseEventType::PortfolioBalanceUpdated),
            "portfolio.holdings.updated" => Ok(SseEventType::PortfolioHoldingsUpdated),
            "security.session.new" => Ok(SseEventType::SecuritySessionNew),
            "security.session.suspicious" => Ok(SseEventType::SecuritySessionSuspicious),
            "security.session.expiring" => Ok(SseEventType::SecuritySessionExpiring),
            "security.session.revoked" => Ok(SseEventType::SecuritySessionRevoked),
            "security.password.changed" => Ok(SseEventType::SecurityPasswordChanged),
            "security.login.failed" => Ok(SseEventType::SecurityLoginFailed),
            other => Err(format!("Unknown SSE event type: {}", other)),
        }
    }
}

/// One SSE message, immutable after construction. Transport encoding
/// goes through to_transport_json/from_transport_json so the wire
/// names stay dot-notation.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event_id: Uuid,
    pub event_type: SseEventType,
    pub user_id: Uuid,
    pub data: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl SseEvent {
    pub fn new(event_type: SseEventType, user_id: Uuid, data: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type,
            user_id,
            data,
            occurred_at: Utc::now(),
        }
    }

    pub fn category(&self) -> SseCategory {
        self.event_type.category()
    }

    /// Serialize to the text/event-stream wire format:
    ///
    /// ```text
    /// id: <uuid>
    /// event: <dot.notation>
    /// data: <json>
    /// <blank line>
    /// ```
    pub fn to_sse_format(&self) -> String {
        format!(
            "id: {}\nevent: {}\ndata: {}\n\n",
            self.event_id,
            self.event_type.as_str(),
            self.data
        )
    }

    /// Transport encoding for the pub/sub channel
    pub fn to_transport_json(&self) -> String {
        serde_json::json!({
            "event_id": self.event_id.to_string(),
            "event_type": self.event_type.as_str(),
            "user_id": self.user_id.to_string(),
            "data": self.data,
            "occurred_at": self.occurred_at.to_rfc3339(),
        })
        .to_string()
    }

    /// Decode a pub/sub message produced by to_transport_json
    pub fn from_transport_json(raw: &str) -> Result<Self, String> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {}", e))?;

        let field = |name: &str| -> Result<&str, String> {
            value
                .get(name)
                .and_then(|v| v.as_str())
                .ok_or_else(|| format!("missing field {}", name))
        };

        Ok(Self {
            event_id: Uuid::parse_str(field("event_id")?)
                .map_err(|e| format!("invalid event_id: {}", e))?,
            event_type: field("event_type")?.parse()?,
            user_id: Uuid::parse_str(field("user_id")?)
                .map_err(|e| format!("invalid user_id: {}", e))?,
            data: value.get("data").cloned().unwrap_or(serde_json::Value::Null),
            occurred_at: DateTime::parse_from_rfc3339(field("occurred_at")?)
                .map_err(|e| format!("invalid occurred_at: {}", e))?
                .with_timezone(&Utc),
        })
    }
}

/// Parse and validate category query parameters (closed set, rejected
/// up front).
pub fn parse_categories(raw: &[String]) -> Result<Vec<SseCategory>, String> {
    raw.iter().map(|s| s.parse::<SseCategory>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let event = SseEvent::new(
            SseEventType::SyncAccountsCompleted,
            Uuid::new_v4(),
            serde_json::json!({"connection_id": "abc", "account_count": 3}),
        );

        let wire = event.to_sse_format();
        assert!(wire.starts_with(&format!("id: {}\n", event.event_id)));
        assert!(wire.contains("event: sync.accounts.completed\n"));
        assert!(wire.contains("data: {"));
        assert!(wire.ends_with("\n\n"));
    }

    #[test]
    fn test_transport_round_trip() {
        let event = SseEvent::new(
            SseEventType::ProviderTokenRefreshed,
            Uuid::new_v4(),
            serde_json::json!({"connection_id": "c1", "provider_slug": "schwab"}),
        );

        let decoded = SseEvent::from_transport_json(&event.to_transport_json()).unwrap();
        assert_eq!(decoded.event_id, event.event_id);
        assert_eq!(decoded.event_type, event.event_type);
        assert_eq!(decoded.user_id, event.user_id);
        assert_eq!(decoded.data, event.data);
    }

    #[test]
    fn test_from_transport_rejects_garbage() {
        assert!(SseEvent::from_transport_json("not json").is_err());
        assert!(SseEvent::from_transport_json("{}").is_err());
    }

    #[test]
    fn test_event_ids_are_monotonic() {
        let first = SseEvent::new(SseEventType::ImportStarted, Uuid::new_v4(), serde_json::json!({}));
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = SseEvent::new(SseEventType::ImportStarted, Uuid::new_v4(), serde_json::json!({}));
        assert!(second.event_id > first.event_id);
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            SseEventType::SyncHoldingsFailed.category(),
            SseCategory::DataSync
        );
        assert_eq!(
            SseEventType::SecurityPasswordChanged.category(),
            SseCategory::Security
        );
    }

    #[test]
    fn test_parse_categories_closed_set() {
        let valid = parse_categories(&["data_sync".to_string(), "provider".to_string()]).unwrap();
        assert_eq!(valid, vec![SseCategory::DataSync, SseCategory::Provider]);

        assert!(parse_categories(&["datasync".to_string()]).is_err());
    }

    #[test]
    fn test_every_type_round_trips_through_name() {
        let all = [
            SseEventType::SyncAccountsStarted,
            SseEventType::ProviderDisconnected,
            SseEventType::AiResponseChunk,
            SseEventType::ImportProgress,
            SseEventType::PortfolioBalanceUpdated,
            SseEventType::SecurityLoginFailed,
        ];
        for ty in all {
            assert_eq!(ty.as_str().parse::<SseEventType>().unwrap(), ty);
        }
    }
}
