use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub redis_url: String,
    pub pool_size: u32,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl RedisConfig {
    /// Create configuration from centralized app config
    pub fn from_env() -> Self {
        let config = crate::app_config::config();

        Self {
            redis_url: config.redis_url.clone(),
            pool_size: config.redis_pool_size,
            retry_attempts: config.redis_retry_attempts,
            retry_delay: Duration::from_millis(config.redis_retry_delay_ms),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.redis_url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }
        if self.pool_size == 0 {
            return Err("Pool size must be greater than 0".to_string());
        }
        if self.pool_size > 1000 {
            return Err("Pool size too large (max: 1000)".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(url: &str, pool_size: u32) -> RedisConfig {
        RedisConfig {
            redis_url: url.to_string(),
            pool_size,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(100),
        }
    }

    #[test]
    fn test_validate_accepts_sane_config() {
        assert!(test_config("redis://localhost:6379", 10).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        assert!(test_config("", 10).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_pool() {
        assert!(test_config("redis://localhost:6379", 0).validate().is_err());
    }
}
