// Write-through session cache over Redis.
//
// The repository is the source of truth; on every mutation the caller
// writes the repository first and synchronizes the cache second. Reads
// go cache-first and fall through to the repository on miss. Every
// operation returns a tagged outcome and callers degrade gracefully -
// no cache error ever reaches the HTTP layer.

use chrono::Utc;
use redis::AsyncCommands;
use tracing::warn;
use uuid::Uuid;

use crate::db::RedisPool;
use crate::models::Session;

use super::keys::CacheKeys;
use super::metrics::{SESSION_CACHE_ERRORS, SESSION_CACHE_HITS, SESSION_CACHE_MISSES};

/// Fallback TTL when a session has no usable expiry (30 days)
const DEFAULT_TTL_SECONDS: i64 = 30 * 24 * 3600;

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        SESSION_CACHE_ERRORS.inc();
        CacheError::Redis(e.to_string())
    }
}

#[derive(Clone)]
pub struct SessionCache {
    redis: RedisPool,
    keys: CacheKeys,
}

impl SessionCache {
    pub fn new(redis: RedisPool, keys: CacheKeys) -> Self {
        Self { redis, keys }
    }

    /// TTL for a session entry: expires_at - now, falling back to 30
    /// days when the expiry is missing or already past.
    fn ttl_for(session: &Session) -> i64 {
        let remaining = (session.expires_at - Utc::now()).num_seconds();
        if remaining > 0 {
            remaining
        } else {
            DEFAULT_TTL_SECONDS
        }
    }

    /// Get a cached session
    pub async fn get(&self, session_id: Uuid) -> Result<Option<Session>, CacheError> {
        let mut conn = self.redis.get_connection().await?;
        let raw: Option<String> = conn.get(self.keys.session(session_id)).await?;

        match raw {
            Some(json) => {
                let session = serde_json::from_str::<Session>(&json).map_err(|e| {
                    SESSION_CACHE_ERRORS.inc();
                    CacheError::Serialization(e.to_string())
                })?;
                SESSION_CACHE_HITS.inc();
                Ok(Some(session))
            },
            None => {
                SESSION_CACHE_MISSES.inc();
                Ok(None)
            },
        }
    }

    /// Cache a session and index it under its user. TTL defaults to the
    /// session's remaining lifetime.
    pub async fn set(
        &self,
        session: &Session,
        ttl_seconds: Option<i64>,
    ) -> Result<(), CacheError> {
        let ttl = ttl_seconds.unwrap_or_else(|| Self::ttl_for(session));
        let json = serde_json::to_string(session)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        let mut conn = self.redis.get_connection().await?;
        conn.set_ex::<_, _, ()>(self.keys.session(session.id), json, ttl as u64)
            .await?;

        self.add_user_session(session.user_id, session.id).await?;
        Ok(())
    }

    /// Remove a session entry. Returns true when a key was deleted.
    pub async fn delete(&self, session_id: Uuid) -> Result<bool, CacheError> {
        let mut conn = self.redis.get_connection().await?;
        let deleted: i64 = conn.del(self.keys.session(session_id)).await?;
        Ok(deleted > 0)
    }

    /// Drop every cached session for a user, including the index set.
    /// Returns the number of session entries removed.
    pub async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, CacheError> {
        let ids = self.get_user_session_ids(user_id).await?;
        let mut conn = self.redis.get_connection().await?;

        let mut removed = 0u64;
        for session_id in &ids {
            let deleted: i64 = conn.del(self.keys.session(*session_id)).await?;
            removed += deleted as u64;
        }
        conn.del::<_, ()>(self.keys.user_sessions(user_id)).await?;

        Ok(removed)
    }

    /// Existence probe without deserialization
    pub async fn exists(&self, session_id: Uuid) -> Result<bool, CacheError> {
        let mut conn = self.redis.get_connection().await?;
        Ok(conn.exists(self.keys.session(session_id)).await?)
    }

    /// Session ids indexed for a user
    pub async fn get_user_session_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, CacheError> {
        let mut conn = self.redis.get_connection().await?;
        let members: Vec<String> = conn.smembers(self.keys.user_sessions(user_id)).await?;
        Ok(members
            .iter()
            .filter_map(|m| Uuid::parse_str(m).ok())
            .collect())
    }

    /// Add a session to the user's index set
    pub async fn add_user_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<(), CacheError> {
        let mut conn = self.redis.get_connection().await?;
        let key = self.keys.user_sessions(user_id);
        conn.sadd::<_, _, ()>(&key, session_id.to_string()).await?;
        conn.expire::<_, ()>(&key, DEFAULT_TTL_SECONDS).await?;
        Ok(())
    }

    /// Remove a session from the user's index set
    pub async fn remove_user_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<(), CacheError> {
        let mut conn = self.redis.get_connection().await?;
        conn.srem::<_, _, ()>(self.keys.user_sessions(user_id), session_id.to_string())
            .await?;
        Ok(())
    }

    /// Touch last_activity_at (and optionally last_ip_address) on the
    /// cached copy, preserving the entry's remaining TTL.
    pub async fn update_last_activity(
        &self,
        session_id: Uuid,
        ip: Option<&str>,
    ) -> Result<(), CacheError> {
        let key = self.keys.session(session_id);
        let mut conn = self.redis.get_connection().await?;

        let raw: Option<String> = conn.get(&key).await?;
        let Some(json) = raw else {
            SESSION_CACHE_MISSES.inc();
            return Ok(());
        };

        let mut session = serde_json::from_str::<Session>(&json)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        session.last_activity_at = Utc::now();
        if let Some(addr) = ip {
            session.last_ip_address = Some(addr.to_string());
        }

        let ttl: i64 = conn.ttl(&key).await?;
        let ttl = if ttl > 0 { ttl } else { Self::ttl_for(&session) };

        let updated = serde_json::to_string(&session)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        conn.set_ex::<_, _, ()>(&key, updated, ttl as u64).await?;
        Ok(())
    }
}

/// Log-and-continue helper for call sites that degrade on cache errors
pub fn log_cache_error<T>(operation: &'static str, result: Result<T, CacheError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(operation, error = %e, "session cache degraded");
            None
        },
    }
}
