// Cache and SSE observability counters, registered on the default
// prometheus registry and rendered by the /metrics handler.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};

pub static SESSION_CACHE_HITS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "dashtam_session_cache_hits_total",
        "Session cache lookups served from Redis"
    )
    .expect("register session cache hit counter")
});

pub static SESSION_CACHE_MISSES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "dashtam_session_cache_misses_total",
        "Session cache lookups that fell through to the repository"
    )
    .expect("register session cache miss counter")
});

pub static SESSION_CACHE_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "dashtam_session_cache_errors_total",
        "Session cache operations that failed open"
    )
    .expect("register session cache error counter")
});

pub static SSE_ACTIVE_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "dashtam_sse_active_connections",
        "Currently open SSE client connections"
    )
    .expect("register SSE connection gauge")
});

/// Render all registered metrics in the Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_and_render() {
        SESSION_CACHE_HITS.inc();
        SESSION_CACHE_MISSES.inc();
        SSE_ACTIVE_CONNECTIONS.set(2);

        let rendered = render_metrics();
        assert!(rendered.contains("dashtam_session_cache_hits_total"));
        assert!(rendered.contains("dashtam_sse_active_connections"));
    }
}
