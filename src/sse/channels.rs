// Redis channel naming for SSE pub/sub and retention streams.
//
// Patterns:
//   sse:user:{user_id}        per-user pub/sub channel
//   sse:broadcast             system-wide pub/sub channel
//   sse:stream:user:{user_id} capped stream for Last-Event-ID replay

use uuid::Uuid;

const SSE_CHANNEL_PREFIX: &str = "sse";

pub struct SseChannels;

impl SseChannels {
    pub fn user_channel(user_id: Uuid) -> String {
        format!("{}:user:{}", SSE_CHANNEL_PREFIX, user_id)
    }

    pub fn broadcast_channel() -> String {
        format!("{}:broadcast", SSE_CHANNEL_PREFIX)
    }

    pub fn user_stream(user_id: Uuid) -> String {
        format!("{}:stream:user:{}", SSE_CHANNEL_PREFIX, user_id)
    }

    /// Extract the user id from a per-user channel name; None for the
    /// broadcast channel or anything malformed.
    pub fn parse_user_id_from_channel(channel: &str) -> Option<Uuid> {
        let mut parts = channel.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(SSE_CHANNEL_PREFIX), Some("user"), Some(raw), None) => {
                Uuid::parse_str(raw).ok()
            },
            _ => None,
        }
    }

    pub fn is_broadcast_channel(channel: &str) -> bool {
        channel == Self::broadcast_channel()
    }
}
