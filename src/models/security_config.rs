// Security configuration singleton: the global minimum token version,
// the timestamp of the last rotation, and the grace window during which
// previous-generation tokens are still honored.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::schema::security_config;

/// The singleton row always has this id
const SINGLETON_ID: i32 = 1;

/// Default grace window after a global rotation (24 hours)
pub const DEFAULT_GRACE_PERIOD_SECONDS: i32 = 86400;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = security_config)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SecurityConfig {
    pub id: i32,
    pub global_min_token_version: i32,
    pub last_rotation_at: Option<DateTime<Utc>>,
    pub grace_period_seconds: i32,
    pub rotation_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(thiserror::Error, Debug)]
pub enum SecurityConfigError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Version must be monotonically non-decreasing")]
    VersionRegression,
}

impl SecurityConfig {
    /// Tokens from the previous generation are honored while
    /// now <= last_rotation_at + grace_period_seconds.
    pub fn is_within_grace_period(&self, now: DateTime<Utc>) -> bool {
        match self.last_rotation_at {
            Some(rotated_at) => {
                now <= rotated_at + Duration::seconds(self.grace_period_seconds as i64)
            },
            None => false,
        }
    }

    /// Fetch the singleton, creating the default row on first access
    pub async fn get_or_create_default(
        conn: &mut AsyncPgConnection,
    ) -> Result<Self, SecurityConfigError> {
        use crate::schema::security_config::dsl::*;

        if let Some(existing) = security_config
            .filter(id.eq(SINGLETON_ID))
            .first::<SecurityConfig>(conn)
            .await
            .optional()?
        {
            return Ok(existing);
        }

        diesel::insert_into(security_config)
            .values((
                id.eq(SINGLETON_ID),
                global_min_token_version.eq(0),
                grace_period_seconds.eq(DEFAULT_GRACE_PERIOD_SECONDS),
                updated_at.eq(Utc::now()),
            ))
            .on_conflict(id)
            .do_nothing()
            .execute(conn)
            .await?;

        security_config
            .filter(id.eq(SINGLETON_ID))
            .first::<SecurityConfig>(conn)
            .await
            .map_err(SecurityConfigError::Database)
    }

    /// Advance the global minimum token version. The version is
    /// monotonic; attempts to move it backwards are rejected.
    pub async fn update_global_version(
        conn: &mut AsyncPgConnection,
        new_version: i32,
        reason: Option<&str>,
    ) -> Result<Self, SecurityConfigError> {
        use crate::schema::security_config::dsl::*;

        let current = Self::get_or_create_default(conn).await?;
        if new_version < current.global_min_token_version {
            return Err(SecurityConfigError::VersionRegression);
        }

        diesel::update(security_config.filter(id.eq(SINGLETON_ID)))
            .set((
                global_min_token_version.eq(new_version),
                last_rotation_at.eq(Some(Utc::now())),
                rotation_reason.eq(reason.map(|r| r.to_string())),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<SecurityConfig>(conn)
            .await
            .map_err(SecurityConfigError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(rotated_secs_ago: Option<i64>, grace: i32) -> SecurityConfig {
        let now = Utc::now();
        SecurityConfig {
            id: 1,
            global_min_token_version: 1,
            last_rotation_at: rotated_secs_ago.map(|s| now - Duration::seconds(s)),
            grace_period_seconds: grace,
            rotation_reason: None,
            updated_at: now,
        }
    }

    #[test]
    fn test_grace_period_within_window() {
        let config = sample_config(Some(3600), 86400);
        assert!(config.is_within_grace_period(Utc::now()));
    }

    #[test]
    fn test_grace_period_after_window() {
        let config = sample_config(Some(90000), 86400);
        assert!(!config.is_within_grace_period(Utc::now()));
    }

    #[test]
    fn test_grace_period_without_rotation() {
        let config = sample_config(None, 86400);
        assert!(!config.is_within_grace_period(Utc::now()));
    }
}
