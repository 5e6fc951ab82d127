// User database model: identity anchor for authentication, session
// tiers, and per-user token rotation.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::users;

/// Failed logins tolerated before the account locks
pub const MAX_FAILED_LOGIN_ATTEMPTS: i32 = 5;

/// How long a lockout lasts
pub const LOCKOUT_DURATION_MINUTES: i64 = 30;

/// Session tier determining the concurrent-session cap
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionTier {
    Basic,     // 3 concurrent sessions
    Premium,   // 10 concurrent sessions
    Unlimited, // no cap
}

impl SessionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionTier::Basic => "basic",
            SessionTier::Premium => "premium",
            SessionTier::Unlimited => "unlimited",
        }
    }

    /// Maximum concurrent active sessions; None means unbounded
    pub fn max_sessions(&self) -> Option<i64> {
        match self {
            SessionTier::Basic => Some(3),
            SessionTier::Premium => Some(10),
            SessionTier::Unlimited => None,
        }
    }
}

impl FromStr for SessionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(SessionTier::Basic),
            "premium" => Ok(SessionTier::Premium),
            "unlimited" => Ok(SessionTier::Unlimited),
            _ => Err(format!("Invalid session tier: {}", s)),
        }
    }
}

/// User database model
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub session_tier: String,
    pub min_token_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub is_active: bool,
    pub session_tier: String,
}

/// Errors for user operations
#[derive(thiserror::Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("User not found")]
    NotFound,

    #[error("Email already registered")]
    DuplicateEmail,
}

impl User {
    /// Account is locked iff a lockout deadline exists and lies in the future
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.map(|until| until >= now).unwrap_or(false)
    }

    /// Session tier as enum; unknown values degrade to Basic with a warning
    pub fn session_tier_enum(&self) -> SessionTier {
        SessionTier::from_str(&self.session_tier).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid session tier '{}' for user {}, defaulting to basic: {}",
                self.session_tier,
                self.id,
                e
            );
            SessionTier::Basic
        })
    }

    /// Find user by ID
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(id.eq(user_id))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Find user by email. Emails are stored lowercased, so the lookup
    /// lowercases too.
    pub async fn find_by_email(
        conn: &mut AsyncPgConnection,
        email_str: &str,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(email.eq(email_str.trim().to_lowercase()))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Create a new user. Unique-violation surfaces as DuplicateEmail.
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_user: NewUser,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        diesel::insert_into(users)
            .values(&new_user)
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => UserError::DuplicateEmail,
                _ => UserError::Database(e),
            })
    }

    /// Record a failed login attempt. The counter never decreases; once
    /// it reaches the threshold the account locks for
    /// LOCKOUT_DURATION_MINUTES.
    pub async fn record_failed_login(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        let user = Self::find_by_id(conn, user_id).await?;
        let attempts = user.failed_login_attempts + 1;
        let lock = if attempts >= MAX_FAILED_LOGIN_ATTEMPTS {
            Some(Utc::now() + Duration::minutes(LOCKOUT_DURATION_MINUTES))
        } else {
            user.locked_until
        };

        diesel::update(users.filter(id.eq(user_id)))
            .set((
                failed_login_attempts.eq(attempts),
                locked_until.eq(lock),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<User>(conn)
            .await
            .map_err(UserError::Database)
    }

    /// Zero the failed-login counter after a successful authentication
    pub async fn reset_failed_login(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user_id)))
            .set((
                failed_login_attempts.eq(0),
                locked_until.eq(None::<DateTime<Utc>>),
                updated_at.eq(Utc::now()),
            ))
            .get_result::<User>(conn)
            .await
            .map_err(UserError::Database)
    }

    /// Mark the user's email as verified
    pub async fn mark_verified(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user_id)))
            .set((is_verified.eq(true), updated_at.eq(Utc::now())))
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Replace the stored password hash
    pub async fn set_password_hash(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        new_hash: &str,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user_id)))
            .set((password_hash.eq(new_hash), updated_at.eq(Utc::now())))
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Advance the user's minimum accepted token version (monotonic).
    /// A target below the current version is a no-op on the stored value.
    pub async fn advance_min_token_version(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        new_version: i32,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        let user = Self::find_by_id(conn, user_id).await?;
        let target = new_version.max(user.min_token_version);

        diesel::update(users.filter(id.eq(user_id)))
            .set((min_token_version.eq(target), updated_at.eq(Utc::now())))
            .get_result::<User>(conn)
            .await
            .map_err(UserError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(tier: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            is_verified: true,
            is_active: true,
            failed_login_attempts: 0,
            locked_until: None,
            session_tier: tier.to_string(),
            min_token_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_session_tier_caps() {
        assert_eq!(SessionTier::Basic.max_sessions(), Some(3));
        assert_eq!(SessionTier::Premium.max_sessions(), Some(10));
        assert_eq!(SessionTier::Unlimited.max_sessions(), None);
    }

    #[test]
    fn test_session_tier_parsing() {
        assert_eq!(SessionTier::from_str("basic"), Ok(SessionTier::Basic));
        assert_eq!(SessionTier::from_str("premium"), Ok(SessionTier::Premium));
        assert_eq!(
            SessionTier::from_str("unlimited"),
            Ok(SessionTier::Unlimited)
        );
        assert!(SessionTier::from_str("gold").is_err());
    }

    #[test]
    fn test_unknown_tier_defaults_to_basic() {
        let user = sample_user("gold");
        assert_eq!(user.session_tier_enum(), SessionTier::Basic);
    }

    #[test]
    fn test_is_locked() {
        let now = Utc::now();

        let mut user = sample_user("basic");
        assert!(!user.is_locked(now));

        user.locked_until = Some(now + Duration::minutes(10));
        assert!(user.is_locked(now));

        user.locked_until = Some(now - Duration::minutes(10));
        assert!(!user.is_locked(now));
    }
}
