// Structured logging sink for every domain event.
//
// Level policy: failures and denials log at WARN, everything else at
// INFO. Every line carries the event id and ISO-8601 UTC timestamp.
// Payloads go through the shared redaction pass so raw tokens never
// reach the log stream.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::bus::{EventContext, EventHandler};
use crate::events::registry::{meta_for, WorkflowPhase};
use crate::events::types::DomainEvent;

use super::redaction::sanitized_payload;

pub struct LoggingEventHandler;

impl LoggingEventHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventHandler for LoggingEventHandler {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn handle(&self, event: &DomainEvent, _ctx: &EventContext) -> anyhow::Result<()> {
        let meta = meta_for(event.event_type());
        let payload = sanitized_payload(&event.payload);
        let occurred_at = event.occurred_at.to_rfc3339();

        match meta.phase {
            WorkflowPhase::Failed | WorkflowPhase::Denied => {
                warn!(
                    event_id = %event.event_id,
                    occurred_at = %occurred_at,
                    workflow = meta.workflow,
                    phase = meta.phase.as_str(),
                    category = meta.category.as_str(),
                    payload = %payload,
                    "domain event"
                );
            },
            _ => {
                info!(
                    event_id = %event.event_id,
                    occurred_at = %occurred_at,
                    workflow = meta.workflow,
                    phase = meta.phase.as_str(),
                    category = meta.category.as_str(),
                    payload = %payload,
                    "domain event"
                );
            },
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::EventPayload;
    use uuid::Uuid;

    #[test]
    fn test_logged_payload_masks_the_verification_token() {
        let event = DomainEvent::new(EventPayload::UserRegistrationSucceeded {
            user_id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            verification_token: "a".repeat(64),
        });

        let payload = sanitized_payload(&event.payload);
        let token = payload["UserRegistrationSucceeded"]["verification_token"]
            .as_str()
            .unwrap();

        assert_eq!(token, "aaaaaaaa...");
    }

    #[tokio::test]
    async fn test_handler_accepts_any_event() {
        let handler = LoggingEventHandler::new();
        let event = DomainEvent::new(EventPayload::SessionLimitExceeded {
            user_id: Uuid::new_v4(),
            active_count: 3,
            max_sessions: 3,
        });

        handler
            .handle(&event, &EventContext::default())
            .await
            .unwrap();
    }
}
