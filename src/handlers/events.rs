// SSE streaming endpoint.
//
// Authenticated (JWT + session revocation check via the middleware), so
// a revoked session cannot hold a stream open past its next reconnect.
// Replays missed events when the client resumes with Last-Event-ID,
// then streams live events filtered by category. Heartbeats come from
// the keep-alive layer when the stream idles.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
};
use axum_extra::extract::Query;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    app::AppState,
    cache::metrics::SSE_ACTIVE_CONNECTIONS,
    middleware::auth::AuthenticatedUser,
    sse::{parse_categories, SseEvent, SseSubscription},
    utils::Problem,
};

/// Keep-alive comment interval on idle streams
const HEARTBEAT_INTERVAL_SECONDS: u64 = 15;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Repeated ?categories= filters; empty means all categories
    #[serde(default)]
    pub categories: Vec<String>,
    /// Query fallback for clients that cannot set the Last-Event-ID
    /// header
    #[serde(default, rename = "Last-Event-ID")]
    pub last_event_id: Option<String>,
}

/// Decrements the connection gauge when the stream is dropped
struct ConnectionGuard;

impl ConnectionGuard {
    fn new() -> Self {
        SSE_ACTIVE_CONNECTIONS.inc();
        Self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_ACTIVE_CONNECTIONS.dec();
    }
}

/// GET /api/v1/events
pub async fn get_events(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Response {
    // Invalid categories are rejected up front with the closed set
    let categories = match parse_categories(&query.categories) {
        Ok(categories) => categories,
        Err(message) => {
            return Problem::bad_request("invalid_category", message).into_response();
        },
    };

    // Last-Event-ID header wins over the query fallback
    let last_event_id = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(query.last_event_id)
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok());

    // Replay before going live so ordering survives the reconnect
    let missed = match last_event_id {
        Some(last_id) => {
            state
                .sse_subscriber
                .get_missed_events(auth_user.user_id, last_id, &categories)
                .await
        },
        None => Vec::new(),
    };

    let subscription = match state
        .sse_subscriber
        .subscribe(auth_user.user_id, categories)
        .await
    {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::error!(user_id = %auth_user.user_id, error = %e, "SSE subscribe failed");
            return Problem::internal().into_response();
        },
    };

    let guard = ConnectionGuard::new();
    let retry_ms = state.config.sse.retry_interval_ms;

    let sse = Sse::new(event_stream(missed, subscription, guard, retry_ms))
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECONDS))
                .text(""),
        );

    let mut response = sse.into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response_headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    // Disable buffering in nginx-style proxies
    response_headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

/// retry hint, then replay, then the live subscription
fn event_stream(
    missed: Vec<SseEvent>,
    subscription: SseSubscription,
    guard: ConnectionGuard,
    retry_ms: u64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let initial = stream::once(async move {
        Ok(Event::default()
            .retry(Duration::from_millis(retry_ms))
            .comment("stream established"))
    });

    let replay = stream::iter(missed.into_iter().map(|event| Ok(to_wire_event(&event))));

    let live = stream::unfold(
        (subscription, guard),
        |(mut subscription, guard)| async move {
            subscription
                .next()
                .await
                .map(|event| (Ok(to_wire_event(&event)), (subscription, guard)))
        },
    );

    initial.chain(replay).chain(live)
}

fn to_wire_event(event: &SseEvent) -> Event {
    Event::default()
        .id(event.event_id.to_string())
        .event(event.event_type.as_str())
        .data(event.data.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::SseEventType;

    #[test]
    fn test_wire_event_fields() {
        let event = SseEvent::new(
            SseEventType::SyncAccountsCompleted,
            Uuid::new_v4(),
            serde_json::json!({"account_count": 2}),
        );

        // The axum Event renders through the Sse responder; here we
        // only assert construction does not panic and the source event
        // serializes the documented wire shape.
        let _ = to_wire_event(&event);
        let wire = event.to_sse_format();
        assert!(wire.contains("event: sync.accounts.completed"));
    }
}
