// SSE subscriber: a dedicated Redis pub/sub connection per open client
// stream, forwarded through a bounded channel, plus Last-Event-ID
// replay from the retention stream.

use redis::streams::StreamRangeReply;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::RedisPool;

use super::channels::SseChannels;
use super::event::{SseCategory, SseEvent};

/// Buffered events per connection before backpressure applies
const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Clone)]
pub struct SseSubscriber {
    redis: RedisPool,
    enable_retention: bool,
}

/// A live subscription. Dropping it aborts the forwarding task, which
/// closes the pub/sub connection and unsubscribes cleanly.
pub struct SseSubscription {
    rx: mpsc::Receiver<SseEvent>,
    handle: JoinHandle<()>,
}

impl SseSubscription {
    /// Next event matching the subscription's filter; None once the
    /// connection is gone.
    pub async fn next(&mut self) -> Option<SseEvent> {
        self.rx.recv().await
    }
}

impl Drop for SseSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl SseSubscriber {
    pub fn new(redis: RedisPool, enable_retention: bool) -> Self {
        Self {
            redis,
            enable_retention,
        }
    }

    /// Subscribe to a user's event stream (user channel + broadcast
    /// channel), yielding events that pass the category filter. An
    /// empty filter means all categories.
    pub async fn subscribe(
        &self,
        user_id: Uuid,
        categories: Vec<SseCategory>,
    ) -> Result<SseSubscription, redis::RedisError> {
        let user_channel = SseChannels::user_channel(user_id);
        let broadcast_channel = SseChannels::broadcast_channel();

        let mut pubsub = self.redis.client().get_async_pubsub().await?;
        pubsub.subscribe(&user_channel).await?;
        pubsub.subscribe(&broadcast_channel).await?;

        debug!(
            user_id = %user_id,
            categories = ?categories,
            "subscribed to SSE channels"
        );

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        let handle = tokio::spawn(async move {
            use futures_util::StreamExt;

            let mut messages = pubsub.on_message();
            while let Some(message) = messages.next().await {
                let payload: String = match message.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "unreadable SSE pub/sub payload");
                        continue;
                    },
                };

                let event = match SseEvent::from_transport_json(&payload) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "invalid SSE event on channel");
                        continue;
                    },
                };

                if !matches_filter(&event, &categories) {
                    continue;
                }

                // Receiver dropped means the client disconnected
                if tx.send(event).await.is_err() {
                    break;
                }
            }

            debug!(user_id = %user_id, "SSE subscription ended");
        });

        Ok(SseSubscription { rx, handle })
    }

    /// Events published after last_event_id, in stream (chronological)
    /// order, filtered by category. Empty when retention is disabled,
    /// the stream has aged out, or the id is unknown.
    pub async fn get_missed_events(
        &self,
        user_id: Uuid,
        last_event_id: Uuid,
        categories: &[SseCategory],
    ) -> Vec<SseEvent> {
        if !self.enable_retention {
            return Vec::new();
        }

        let stream_key = SseChannels::user_stream(user_id);

        let reply: StreamRangeReply = match async {
            let mut conn = self.redis.get_connection().await?;
            conn.xrange_all(&stream_key).await
        }
        .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "failed to read SSE retention stream");
                return Vec::new();
            },
        };

        let mut events = Vec::new();
        let mut found_last = false;

        for entry in reply.ids {
            let event_id: String = entry.get("event_id").unwrap_or_default();

            if !found_last {
                if event_id == last_event_id.to_string() {
                    found_last = true;
                }
                continue;
            }

            match parse_stream_entry(&entry, user_id) {
                Ok(event) => {
                    if matches_filter(&event, categories) {
                        events.push(event);
                    }
                },
                Err(e) => {
                    warn!(entry_id = %entry.id, error = %e, "skipping malformed stream entry");
                },
            }
        }

        debug!(
            user_id = %user_id,
            last_event_id = %last_event_id,
            count = events.len(),
            "replayed missed SSE events"
        );

        events
    }
}

fn matches_filter(event: &SseEvent, categories: &[SseCategory]) -> bool {
    categories.is_empty() || categories.contains(&event.category())
}

fn parse_stream_entry(
    entry: &redis::streams::StreamId,
    user_id: Uuid,
) -> Result<SseEvent, String> {
    let event_id: String = entry
        .get("event_id")
        .ok_or_else(|| "missing event_id".to_string())?;
    let event_type: String = entry
        .get("event_type")
        .ok_or_else(|| "missing event_type".to_string())?;
    let data: String = entry.get("data").ok_or_else(|| "missing data".to_string())?;
    let occurred_at: String = entry
        .get("occurred_at")
        .ok_or_else(|| "missing occurred_at".to_string())?;

    Ok(SseEvent {
        event_id: Uuid::parse_str(&event_id).map_err(|e| e.to_string())?,
        event_type: event_type.parse()?,
        user_id,
        data: serde_json::from_str(&data).map_err(|e| e.to_string())?,
        occurred_at: chrono::DateTime::parse_from_rfc3339(&occurred_at)
            .map_err(|e| e.to_string())?
            .with_timezone(&chrono::Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::event::SseEventType;

    fn event_of(category_type: SseEventType) -> SseEvent {
        SseEvent::new(category_type, Uuid::new_v4(), serde_json::json!({}))
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(matches_filter(&event_of(SseEventType::ImportStarted), &[]));
        assert!(matches_filter(
            &event_of(SseEventType::SecurityLoginFailed),
            &[]
        ));
    }

    #[test]
    fn test_filter_excludes_other_categories() {
        let filter = vec![SseCategory::DataSync, SseCategory::Provider];

        assert!(matches_filter(
            &event_of(SseEventType::SyncAccountsCompleted),
            &filter
        ));
        assert!(matches_filter(
            &event_of(SseEventType::ProviderTokenRefreshed),
            &filter
        ));
        assert!(!matches_filter(
            &event_of(SseEventType::ImportCompleted),
            &filter
        ));
        assert!(!matches_filter(
            &event_of(SseEventType::SecuritySessionNew),
            &filter
        ));
    }
}
