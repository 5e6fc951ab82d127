// Application state shared across handlers
use std::sync::Arc;

use crate::{
    app_config::AppConfig,
    db::DieselPool,
    events::EventBus,
    services::{AuthService, EmailService, JwtService, SessionService},
    sse::{SsePublisher, SseSubscriber},
    RedisPool,
};

// Application state shared across handlers. Everything here is a
// process-scoped singleton built once by the composition root.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub diesel_pool: DieselPool,
    pub redis_pool: RedisPool,
    pub event_bus: Arc<EventBus>,
    pub jwt_service: Arc<JwtService>,
    pub auth_service: Arc<AuthService>,
    pub session_service: Arc<SessionService>,
    pub email_service: Arc<EmailService>,
    pub sse_publisher: Arc<SsePublisher>,
    pub sse_subscriber: Arc<SseSubscriber>,
}
