// SSE publisher over Redis pub/sub, with optional Streams retention.
//
// Fail-open throughout: SSE delivery is best-effort and never disturbs
// the domain workflow that triggered it.

use redis::streams::StreamMaxlen;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::db::RedisPool;

use super::channels::SseChannels;
use super::event::SseEvent;

#[derive(Debug, Clone)]
pub struct SsePublisherConfig {
    pub enable_retention: bool,
    pub retention_max_len: usize,
    pub retention_ttl_seconds: i64,
}

#[derive(Clone)]
pub struct SsePublisher {
    redis: RedisPool,
    config: SsePublisherConfig,
}

impl SsePublisher {
    pub fn new(redis: RedisPool, config: SsePublisherConfig) -> Self {
        Self { redis, config }
    }

    /// Publish an event to its user's channel. When retention is on,
    /// also append to the user's capped stream for replay.
    pub async fn publish(&self, event: &SseEvent) {
        let channel = SseChannels::user_channel(event.user_id);

        if let Err(e) = self.publish_to_channel(&channel, event).await {
            warn!(
                event_type = event.event_type.as_str(),
                user_id = %event.user_id,
                error = %e,
                "failed to publish SSE event"
            );
            return;
        }

        debug!(
            event_type = event.event_type.as_str(),
            event_id = %event.event_id,
            channel = %channel,
            "published SSE event"
        );

        if self.config.enable_retention {
            if let Err(e) = self.store_in_stream(event).await {
                warn!(
                    event_id = %event.event_id,
                    user_id = %event.user_id,
                    error = %e,
                    "failed to store SSE event in retention stream"
                );
            }
        }
    }

    /// Publish an event to every connected client
    pub async fn broadcast(&self, event: &SseEvent) {
        let channel = SseChannels::broadcast_channel();
        if let Err(e) = self.publish_to_channel(&channel, event).await {
            warn!(
                event_type = event.event_type.as_str(),
                error = %e,
                "failed to broadcast SSE event"
            );
        }
    }

    async fn publish_to_channel(
        &self,
        channel: &str,
        event: &SseEvent,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.get_connection().await?;
        conn.publish::<_, _, ()>(channel, event.to_transport_json())
            .await
    }

    /// XADD with an approximate MAXLEN cap; the stream gets a TTL the
    /// first time it is created so abandoned streams age out.
    async fn store_in_stream(&self, event: &SseEvent) -> Result<(), redis::RedisError> {
        let stream_key = SseChannels::user_stream(event.user_id);
        let mut conn = self.redis.get_connection().await?;

        conn.xadd_maxlen::<_, _, _, _, ()>(
            &stream_key,
            StreamMaxlen::Approx(self.config.retention_max_len),
            "*",
            &[
                ("event_id", event.event_id.to_string()),
                ("event_type", event.event_type.as_str().to_string()),
                ("data", event.data.to_string()),
                ("occurred_at", event.occurred_at.to_rfc3339()),
            ],
        )
        .await?;

        let ttl: i64 = conn.ttl(&stream_key).await?;
        if ttl == -1 {
            conn.expire::<_, ()>(&stream_key, self.config.retention_ttl_seconds)
                .await?;
        }

        Ok(())
    }
}
