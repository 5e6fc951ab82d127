// In-memory event bus: typed subscribe, concurrent fail-open fan-out.
//
// Routing is by exact EventType discriminant. Each handler runs in its
// own spawned task so a panic is contained by the JoinError and an Err
// is logged; neither cancels sibling handlers nor reaches the
// publisher. publish() returns only after every handler finished.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::db::DieselPool;

use super::registry::EventType;
use super::types::DomainEvent;

/// Request metadata attached to a publish for audit enrichment
/// (PCI DSS 10.2.7: origin of security-relevant actions).
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Optional per-publish context. Carried as a method parameter, never
/// task-local state. The db handle lets the audit handler reuse a
/// request-scoped pool (test-scoped transactions) instead of opening
/// its own.
#[derive(Clone, Default)]
pub struct EventContext {
    pub metadata: Option<RequestMetadata>,
    pub db: Option<DieselPool>,
}

impl EventContext {
    pub fn with_metadata(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            metadata: Some(RequestMetadata {
                ip_address,
                user_agent,
            }),
            db: None,
        }
    }
}

/// A subscriber on the bus. Handlers must be idempotent: fan-out offers
/// no ordering or exactly-once guarantees.
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &DomainEvent, ctx: &EventContext) -> anyhow::Result<()>;
}

/// In-memory event bus. Subscriptions are wired once at startup by the
/// composition root; the handler table is read-only afterwards.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventType, Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for an event type. Multiple handlers per type
    /// are allowed and run concurrently.
    pub fn subscribe(&mut self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        self.handlers.entry(event_type).or_default().push(handler);
    }

    /// Number of handlers registered for an event type
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.handlers
            .get(&event_type)
            .map(|h| h.len())
            .unwrap_or(0)
    }

    /// Publish an event to all registered handlers.
    ///
    /// Zero handlers is a no-op, not an error. Handler failures and
    /// panics are logged (one warning each) and swallowed.
    pub async fn publish(&self, event: DomainEvent, ctx: EventContext) {
        let event_type = event.event_type();
        let Some(handlers) = self.handlers.get(&event_type) else {
            return;
        };
        if handlers.is_empty() {
            return;
        }

        debug!(
            event_type = ?event_type,
            event_id = %event.event_id,
            handler_count = handlers.len(),
            "publishing domain event"
        );

        let event = Arc::new(event);
        let ctx = Arc::new(ctx);

        let tasks: Vec<_> = handlers
            .iter()
            .map(|handler| {
                let handler = handler.clone();
                let event = event.clone();
                let ctx = ctx.clone();
                let name = handler.name();
                let task = tokio::spawn(async move { handler.handle(&event, &ctx).await });
                (name, task)
            })
            .collect();

        for (name, task) in tasks {
            match task.await {
                Ok(Ok(())) => {},
                Ok(Err(error)) => {
                    warn!(
                        event_type = ?event_type,
                        event_id = %event.event_id,
                        handler = name,
                        error = %error,
                        "event handler failed"
                    );
                },
                Err(join_error) => {
                    warn!(
                        event_type = ?event_type,
                        event_id = %event.event_id,
                        handler = name,
                        error = %join_error,
                        "event handler panicked"
                    );
                },
            }
        }
    }
}
