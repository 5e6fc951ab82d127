// Redis-backed caching: key construction, the write-through session
// cache, and cache observability counters.

pub mod keys;
pub mod metrics;
pub mod session_cache;

pub use keys::CacheKeys;
pub use metrics::render_metrics;
pub use session_cache::{log_cache_error, CacheError, SessionCache};
