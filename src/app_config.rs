// Centralized configuration management for the Dashtam backend core.
// Load ALL env vars ONCE at startup; everything else reads CONFIG.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    // For tests, load .env file first
    #[cfg(test)]
    dotenv::dotenv().ok();

    AppConfig::from_env().expect("Failed to load configuration")
});

/// Get a reference to the global configuration
pub fn config() -> &'static AppConfig {
    &CONFIG
}

/// Environment type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Ci,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" => Ok(Environment::Development),
            "testing" => Ok(Environment::Testing),
            "ci" => Ok(Environment::Ci),
            "production" => Ok(Environment::Production),
            other => Err(ConfigError::InvalidValue(
                "ENVIRONMENT".to_string(),
                format!("{} (expected development|testing|ci|production)", other),
            )),
        }
    }
}

/// Event bus backend selection. Only the in-memory bus is implemented;
/// the variants exist so a misconfigured deployment fails at startup
/// instead of silently dropping events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventBusType {
    InMemory,
    RabbitMq,
    Kafka,
}

impl EventBusType {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "in-memory" => Ok(EventBusType::InMemory),
            "rabbitmq" => Ok(EventBusType::RabbitMq),
            "kafka" => Ok(EventBusType::Kafka),
            other => Err(ConfigError::InvalidValue(
                "EVENT_BUS_TYPE".to_string(),
                format!("{} (expected in-memory|rabbitmq|kafka)", other),
            )),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Server
    pub bind_address: String,
    pub environment: Environment,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_connect_timeout: u64,

    // Redis
    pub redis_url: String,
    pub redis_pool_size: u32,
    pub redis_retry_attempts: u32,
    pub redis_retry_delay_ms: u64,

    // JWT
    pub jwt_secret: String,
    pub jwt_access_expiry: u64,
    pub jwt_audience: String,
    pub jwt_issuer: String,

    // Token lifetimes
    pub refresh_token_expiry_days: i64,
    pub verification_token_ttl_hours: i64,
    pub reset_token_ttl_minutes: i64,

    // Credential encryption (provider secrets at rest)
    pub credential_secret: String,

    // Event bus
    pub event_bus_type: EventBusType,

    // SSE
    pub sse: SseConfig,

    // Cache
    pub cache_key_prefix: String,

    // Email
    pub email: EmailConfig,

    // Observability
    pub aws_region: Option<String>,
    pub enable_swagger_ui: bool,
}

/// SSE fan-out configuration
#[derive(Debug, Clone)]
pub struct SseConfig {
    pub enable_retention: bool,
    pub retry_interval_ms: u64,
    pub retention_max_len: usize,
    pub retention_ttl_seconds: i64,
}

/// Email delivery configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub resend_api_key: String,
    pub resend_api_url: String,
    pub from_email: String,
    pub from_name: String,
    pub support_email: String,
    pub frontend_url: String,
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

fn parse_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(default)
}

impl AppConfig {
    /// Load the full configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::parse(&optional("ENVIRONMENT", "development"))?;

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < 32 && environment == Environment::Production {
            return Err(ConfigError::InvalidValue(
                "JWT_SECRET".to_string(),
                "must be at least 32 bytes in production".to_string(),
            ));
        }

        Ok(AppConfig {
            bind_address: optional("BIND_ADDRESS", "0.0.0.0:8000"),
            environment,

            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 20)?,
            database_min_connections: parse_var("DATABASE_MIN_CONNECTIONS", 2)?,
            database_connect_timeout: parse_var("DATABASE_CONNECT_TIMEOUT", 5)?,

            redis_url: optional("REDIS_URL", "redis://127.0.0.1:6379"),
            redis_pool_size: parse_var("REDIS_POOL_SIZE", 10)?,
            redis_retry_attempts: parse_var("REDIS_RETRY_ATTEMPTS", 3)?,
            redis_retry_delay_ms: parse_var("REDIS_RETRY_DELAY_MS", 100)?,

            jwt_secret,
            jwt_access_expiry: parse_var("JWT_ACCESS_EXPIRY", 900)?,
            jwt_audience: optional("JWT_AUDIENCE", "dashtam"),
            jwt_issuer: optional("JWT_ISSUER", "dashtam"),

            refresh_token_expiry_days: parse_var("REFRESH_TOKEN_EXPIRY_DAYS", 30)?,
            verification_token_ttl_hours: parse_var("VERIFICATION_TOKEN_TTL_HOURS", 24)?,
            reset_token_ttl_minutes: parse_var("RESET_TOKEN_TTL_MINUTES", 15)?,

            credential_secret: optional("CREDENTIAL_SECRET", ""),

            event_bus_type: EventBusType::parse(&optional("EVENT_BUS_TYPE", "in-memory"))?,

            sse: SseConfig {
                enable_retention: parse_bool("SSE_ENABLE_RETENTION", false),
                retry_interval_ms: parse_var("SSE_RETRY_INTERVAL_MS", 3000)?,
                retention_max_len: parse_var("SSE_RETENTION_MAXLEN", 1000)?,
                retention_ttl_seconds: parse_var("SSE_RETENTION_TTL_SECONDS", 86400)?,
            },

            cache_key_prefix: optional("CACHE_KEY_PREFIX", "dashtam"),

            email: EmailConfig {
                resend_api_key: optional("RESEND_API_KEY", ""),
                resend_api_url: optional("RESEND_API_URL", "https://api.resend.com/emails"),
                from_email: optional("EMAIL_FROM", "no-reply@dashtam.com"),
                from_name: optional("EMAIL_FROM_NAME", "Dashtam"),
                support_email: optional("EMAIL_SUPPORT", "support@dashtam.com"),
                frontend_url: optional("FRONTEND_URL", "http://localhost:3000"),
            },

            aws_region: env::var("AWS_REGION").ok(),
            enable_swagger_ui: parse_bool(
                "ENABLE_SWAGGER_UI",
                environment != Environment::Production,
            ),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// True when the remote (CloudWatch-style) log adapter should be used.
    /// Development/testing/ci environments log to the console.
    pub fn use_remote_logging(&self) -> bool {
        self.is_production() && self.aws_region.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::parse("development").unwrap(),
            Environment::Development
        );
        assert_eq!(Environment::parse("ci").unwrap(), Environment::Ci);
        assert!(Environment::parse("staging").is_err());
    }

    #[test]
    fn test_event_bus_type_parsing() {
        assert_eq!(
            EventBusType::parse("in-memory").unwrap(),
            EventBusType::InMemory
        );
        assert_eq!(EventBusType::parse("kafka").unwrap(), EventBusType::Kafka);
        assert!(EventBusType::parse("zeromq").is_err());
    }
}
