// Library exports for the Dashtam backend core

pub mod app;
pub mod app_config;
pub mod cache;
pub mod db;
pub mod events;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod sse;
pub mod utils;

// Re-export commonly used types
pub use app::AppState;
pub use app_config::{AppConfig, EventBusType, CONFIG};
pub use db::{DieselPool, RedisConfig, RedisPool};
pub use events::{DomainEvent, EventBus, EventContext, EventPayload, EventType, EVENT_REGISTRY};
pub use middleware::{auth_middleware, AuthenticatedUser};
pub use models::auth::AccessTokenClaims;
pub use services::{
    AuthService, EmailService, JwtConfig, JwtError, JwtService, RefreshTokenService,
    SessionService,
};
pub use sse::{SseCategory, SseEvent, SseEventType, SsePublisher, SseSubscriber};

use std::sync::Arc;
use tracing::info;

use cache::{CacheKeys, SessionCache};
use events::handlers::{
    AuditEventHandler, EmailEventHandler, LoggingEventHandler, SessionEventHandler,
    SseEventHandler,
};
use sse::{SsePublisherConfig, DOMAIN_TO_SSE};

/// Wire every standard handler onto the bus, driven row by row from the
/// event registry and the SSE mapping table. This is the statically
/// typed replacement for discovering handler methods by name.
pub fn wire_event_subscriptions(
    bus: &mut EventBus,
    logging: Arc<LoggingEventHandler>,
    audit: Arc<AuditEventHandler>,
    email: Arc<EmailEventHandler>,
    session: Arc<SessionEventHandler>,
    sse_bridge: Arc<SseEventHandler>,
) {
    for row in EVENT_REGISTRY {
        if row.requires_logging {
            bus.subscribe(row.event_type, logging.clone());
        }
        if row.requires_audit {
            bus.subscribe(row.event_type, audit.clone());
        }
        if row.requires_email {
            bus.subscribe(row.event_type, email.clone());
        }
        if row.requires_session {
            bus.subscribe(row.event_type, session.clone());
        }
    }

    for mapping in DOMAIN_TO_SSE {
        bus.subscribe(mapping.domain_event, sse_bridge.clone());
    }
}

/// Composition root: build every process-scoped singleton and return
/// the shared application state.
pub async fn initialize_app_state() -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    dotenv::dotenv().ok();

    let config = app_config::config();

    // Only the in-memory bus is implemented; refuse to start with a
    // bus type we would silently drop events for.
    if config.event_bus_type != EventBusType::InMemory {
        return Err(format!(
            "EVENT_BUS_TYPE {:?} is not implemented; use in-memory",
            config.event_bus_type
        )
        .into());
    }

    info!("Initializing database pool...");
    let db_config = db::DieselDatabaseConfig::default();
    let diesel_pool = db::create_diesel_pool(db_config).await?;

    info!("Running embedded migrations...");
    db::run_migrations(&config.database_url).await?;

    info!("Initializing Redis pool...");
    let redis_config = RedisConfig::from_env();
    let redis_pool = RedisPool::new(redis_config).await?;

    let cache_keys = CacheKeys::new(config.cache_key_prefix.clone());
    let session_cache = SessionCache::new(redis_pool.clone(), cache_keys.clone());

    let jwt_service = Arc::new(JwtService::new(JwtConfig::from_env()));
    let refresh_token_service = RefreshTokenService::from_env();
    let email_service = Arc::new(EmailService::from_env()?);

    let sse_publisher = Arc::new(SsePublisher::new(
        redis_pool.clone(),
        SsePublisherConfig {
            enable_retention: config.sse.enable_retention,
            retention_max_len: config.sse.retention_max_len,
            retention_ttl_seconds: config.sse.retention_ttl_seconds,
        },
    ));
    let sse_subscriber = Arc::new(SseSubscriber::new(
        redis_pool.clone(),
        config.sse.enable_retention,
    ));

    // Event bus wiring: registry-driven, once, before the bus is shared
    info!("Wiring event bus subscriptions from the registry...");
    let mut bus = EventBus::new();
    wire_event_subscriptions(
        &mut bus,
        Arc::new(LoggingEventHandler::new()),
        Arc::new(AuditEventHandler::new(diesel_pool.clone())),
        Arc::new(EmailEventHandler::new(
            email_service.clone(),
            diesel_pool.clone(),
        )),
        Arc::new(SessionEventHandler::new(
            diesel_pool.clone(),
            session_cache.clone(),
        )),
        Arc::new(SseEventHandler::new(sse_publisher.clone())),
    );
    let event_bus = Arc::new(bus);

    let session_service = Arc::new(SessionService::new(
        diesel_pool.clone(),
        session_cache,
        event_bus.clone(),
    ));

    let auth_service = Arc::new(AuthService::new(
        diesel_pool.clone(),
        redis_pool.clone(),
        event_bus.clone(),
        jwt_service.clone(),
        refresh_token_service,
        session_service.clone(),
        email_service.clone(),
        cache_keys,
        config.verification_token_ttl_hours,
        config.reset_token_ttl_minutes,
    ));

    Ok(AppState {
        config: Arc::new(config.clone()),
        diesel_pool,
        redis_pool,
        event_bus,
        jwt_service,
        auth_service,
        session_service,
        email_service,
        sse_publisher,
        sse_subscriber,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_drives_complete_wiring() {
        // Count the subscriptions the composition root would make; it
        // must match the registry's per-requirement totals plus the SSE
        // mappings.
        let stats = events::registry::registry_statistics();
        let expected = stats.requiring_logging
            + stats.requiring_audit
            + stats.requiring_email
            + stats.requiring_session
            + DOMAIN_TO_SSE.len();

        let mut actual = 0;
        for row in EVENT_REGISTRY {
            actual += [
                row.requires_logging,
                row.requires_audit,
                row.requires_email,
                row.requires_session,
            ]
            .iter()
            .filter(|b| **b)
            .count();
        }
        actual += DOMAIN_TO_SSE.len();

        assert_eq!(actual, expected);
    }
}
