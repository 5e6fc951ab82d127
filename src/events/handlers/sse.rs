// Bridge from domain events to the SSE fan-out.
//
// Subscribed (by the composition root) to exactly the domain event
// types with an SSE mapping; consults the registry extractors and hands
// the wire event to the publisher. Unmapped events are silently
// ignored, and publishing is already fail-open.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::events::bus::{EventContext, EventHandler};
use crate::events::types::DomainEvent;
use crate::sse::{map_to_sse, SsePublisher};

pub struct SseEventHandler {
    publisher: Arc<SsePublisher>,
}

impl SseEventHandler {
    pub fn new(publisher: Arc<SsePublisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl EventHandler for SseEventHandler {
    fn name(&self) -> &'static str {
        "sse"
    }

    async fn handle(&self, event: &DomainEvent, _ctx: &EventContext) -> anyhow::Result<()> {
        let Some(sse_event) = map_to_sse(event) else {
            return Ok(());
        };

        debug!(
            domain_event = ?event.event_type(),
            sse_event_type = sse_event.event_type.as_str(),
            user_id = %sse_event.user_id,
            event_id = %sse_event.event_id,
            "bridging domain event to SSE"
        );

        self.publisher.publish(&sse_event).await;
        Ok(())
    }
}
