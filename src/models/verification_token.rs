// One-shot hex token models: email verification (24h TTL) and password
// reset (15m TTL). Tokens are 64-char lowercase hex stored plain - the
// 256 bits of entropy are already unguessable - and burn on first use.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{email_verification_tokens, password_reset_tokens};

/// Errors shared by both one-shot token tables
#[derive(thiserror::Error, Debug)]
pub enum OneShotTokenError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Email verification token row
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = email_verification_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EmailVerificationToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = email_verification_tokens)]
pub struct NewEmailVerificationToken {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl EmailVerificationToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Issue a token with the given TTL in hours
    pub async fn issue(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        token_value: String,
        ttl_hours: i64,
    ) -> Result<Self, OneShotTokenError> {
        diesel::insert_into(email_verification_tokens::table)
            .values(&NewEmailVerificationToken {
                user_id: owner,
                token: token_value,
                expires_at: Utc::now() + Duration::hours(ttl_hours),
            })
            .get_result::<EmailVerificationToken>(conn)
            .await
            .map_err(OneShotTokenError::Database)
    }

    pub async fn find_by_token(
        conn: &mut AsyncPgConnection,
        token_value: &str,
    ) -> Result<Option<Self>, OneShotTokenError> {
        use crate::schema::email_verification_tokens::dsl::*;

        email_verification_tokens
            .filter(token.eq(token_value))
            .first::<EmailVerificationToken>(conn)
            .await
            .optional()
            .map_err(OneShotTokenError::Database)
    }

    /// Burn the token
    pub async fn mark_used(
        &self,
        conn: &mut AsyncPgConnection,
    ) -> Result<(), OneShotTokenError> {
        use crate::schema::email_verification_tokens::dsl::*;

        diesel::update(email_verification_tokens.filter(id.eq(self.id)))
            .set(used_at.eq(Some(Utc::now())))
            .execute(conn)
            .await?;
        Ok(())
    }
}

/// Password reset token row. Requester IP/UA are stored for the audit
/// trail.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = password_reset_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = password_reset_tokens)]
pub struct NewPasswordResetToken {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl PasswordResetToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Issue a token with the given TTL in minutes
    pub async fn issue(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        token_value: String,
        ttl_minutes: i64,
        ip: Option<String>,
        ua: Option<String>,
    ) -> Result<Self, OneShotTokenError> {
        diesel::insert_into(password_reset_tokens::table)
            .values(&NewPasswordResetToken {
                user_id: owner,
                token: token_value,
                expires_at: Utc::now() + Duration::minutes(ttl_minutes),
                ip_address: ip,
                user_agent: ua,
            })
            .get_result::<PasswordResetToken>(conn)
            .await
            .map_err(OneShotTokenError::Database)
    }

    pub async fn find_by_token(
        conn: &mut AsyncPgConnection,
        token_value: &str,
    ) -> Result<Option<Self>, OneShotTokenError> {
        use crate::schema::password_reset_tokens::dsl::*;

        password_reset_tokens
            .filter(token.eq(token_value))
            .first::<PasswordResetToken>(conn)
            .await
            .optional()
            .map_err(OneShotTokenError::Database)
    }

    /// Burn the token
    pub async fn mark_used(
        &self,
        conn: &mut AsyncPgConnection,
    ) -> Result<(), OneShotTokenError> {
        use crate::schema::password_reset_tokens::dsl::*;

        diesel::update(password_reset_tokens.filter(id.eq(self.id)))
            .set(used_at.eq(Some(Utc::now())))
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Reset requests issued for a user inside the rolling window
    /// (request-rate guard: at most 3 per 60 minutes).
    pub async fn count_recent_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        window_minutes: i64,
    ) -> Result<i64, OneShotTokenError> {
        use crate::schema::password_reset_tokens::dsl::*;

        password_reset_tokens
            .filter(user_id.eq(owner))
            .filter(created_at.gt(Utc::now() - Duration::minutes(window_minutes)))
            .count()
            .get_result::<i64>(conn)
            .await
            .map_err(OneShotTokenError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_token_state_flags() {
        let now = Utc::now();
        let token = EmailVerificationToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "a".repeat(64),
            expires_at: now + Duration::hours(24),
            used_at: None,
            created_at: now,
        };

        assert!(!token.is_expired(now));
        assert!(!token.is_used());
        assert!(token.is_expired(now + Duration::hours(25)));
    }

    #[test]
    fn test_reset_token_state_flags() {
        let now = Utc::now();
        let mut token = PasswordResetToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "b".repeat(64),
            expires_at: now + Duration::minutes(15),
            used_at: None,
            created_at: now,
            ip_address: Some("203.0.113.45".to_string()),
            user_agent: None,
        };

        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + Duration::minutes(16)));

        token.used_at = Some(now);
        assert!(token.is_used());
    }
}
