// Refresh token database model: opaque tokens hashed at rest, rotated
// on every use, versioned for two-level breach rotation.
//
// Because bcrypt hashes are salted, a presented token cannot be looked
// up by hashing it. find_by_token_verification narrows candidates as
// tightly as the table permits (non-revoked, non-expired) and verifies
// each stored hash until one matches.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::refresh_tokens;

/// Refresh token row
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = refresh_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RefreshTokenData {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub token_version: i32,
    pub global_version_at_issuance: i32,
}

/// New refresh token for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub token_version: i32,
    pub global_version_at_issuance: i32,
}

/// Errors for refresh token operations
#[derive(thiserror::Error, Debug)]
pub enum RefreshTokenError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Token not found")]
    NotFound,
}

impl RefreshTokenData {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Persist a new refresh token record
    pub async fn store(
        conn: &mut AsyncPgConnection,
        new_token: NewRefreshToken,
    ) -> Result<Self, RefreshTokenError> {
        diesel::insert_into(refresh_tokens::table)
            .values(&new_token)
            .get_result::<RefreshTokenData>(conn)
            .await
            .map_err(RefreshTokenError::Database)
    }

    /// Locate the record matching a presented opaque token.
    ///
    /// Candidates are narrowed to non-revoked, non-expired rows before
    /// the (deliberately slow) hash verification runs; the scan exits on
    /// the first match. O(candidates) per refresh is the accepted MVP
    /// cost.
    pub async fn find_by_token_verification<F>(
        conn: &mut AsyncPgConnection,
        presented: &str,
        verify_fn: F,
    ) -> Result<Option<Self>, RefreshTokenError>
    where
        F: Fn(&str, &str) -> bool,
    {
        use crate::schema::refresh_tokens::dsl::*;

        let candidates = refresh_tokens
            .filter(revoked_at.is_null())
            .filter(expires_at.gt(Utc::now()))
            .order(created_at.desc())
            .load::<RefreshTokenData>(conn)
            .await?;

        Ok(candidates
            .into_iter()
            .find(|candidate| verify_fn(presented, &candidate.token_hash)))
    }

    /// Classify a presented token against the rows the live scan skips
    /// (revoked or expired). Used by refresh and logout to distinguish
    /// token_revoked / token_expired from plain token_invalid.
    pub async fn classify_presented_token<F>(
        conn: &mut AsyncPgConnection,
        presented: &str,
        verify_fn: F,
    ) -> Result<Option<Self>, RefreshTokenError>
    where
        F: Fn(&str, &str) -> bool,
    {
        use crate::schema::refresh_tokens::dsl::*;

        let candidates = refresh_tokens
            .filter(revoked_at.is_not_null().or(expires_at.le(Utc::now())))
            .order(created_at.desc())
            .load::<RefreshTokenData>(conn)
            .await?;

        Ok(candidates
            .into_iter()
            .find(|candidate| verify_fn(presented, &candidate.token_hash)))
    }

    /// Delete a record (rotation removes the old token entirely).
    /// Returns true when a row was removed.
    pub async fn delete(
        conn: &mut AsyncPgConnection,
        token_id: Uuid,
    ) -> Result<bool, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let deleted = diesel::delete(refresh_tokens.filter(id.eq(token_id)))
            .execute(conn)
            .await?;
        Ok(deleted > 0)
    }

    /// Revoke every live token for a user. Returns the revoked count.
    pub async fn revoke_all_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
    ) -> Result<usize, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        diesel::update(
            refresh_tokens
                .filter(user_id.eq(owner))
                .filter(revoked_at.is_null()),
        )
        .set(revoked_at.eq(Some(Utc::now())))
        .execute(conn)
        .await
        .map_err(RefreshTokenError::Database)
    }

    /// Revoke every live token bound to a session (logout)
    pub async fn revoke_all_for_session(
        conn: &mut AsyncPgConnection,
        session: Uuid,
    ) -> Result<usize, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        diesel::update(
            refresh_tokens
                .filter(session_id.eq(session))
                .filter(revoked_at.is_null()),
        )
        .set(revoked_at.eq(Some(Utc::now())))
        .execute(conn)
        .await
        .map_err(RefreshTokenError::Database)
    }

    /// Remove expired and long-revoked rows (scheduled cleanup)
    pub async fn cleanup_expired(
        conn: &mut AsyncPgConnection,
        before: Option<DateTime<Utc>>,
    ) -> Result<usize, RefreshTokenError> {
        use crate::schema::refresh_tokens::dsl::*;

        let cutoff = before.unwrap_or_else(Utc::now);
        diesel::delete(refresh_tokens.filter(expires_at.lt(cutoff)))
            .execute(conn)
            .await
            .map_err(RefreshTokenError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_token(expires_in: Duration) -> RefreshTokenData {
        let now = Utc::now();
        RefreshTokenData {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "$2b$12$hash".to_string(),
            session_id: Uuid::new_v4(),
            created_at: now,
            expires_at: now + expires_in,
            revoked_at: None,
            token_version: 0,
            global_version_at_issuance: 0,
        }
    }

    #[test]
    fn test_expiry_and_revocation_flags() {
        let now = Utc::now();

        let live = sample_token(Duration::days(30));
        assert!(!live.is_expired(now));
        assert!(!live.is_revoked());

        let expired = sample_token(Duration::seconds(-1));
        assert!(expired.is_expired(now));

        let mut revoked = sample_token(Duration::days(30));
        revoked.revoked_at = Some(now);
        assert!(revoked.is_revoked());
    }
}
