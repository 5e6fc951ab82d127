// Session database model and repository surface.
//
// A session is one authenticated device. "Active" always means
// not-revoked AND not-expired; every query below that narrows to active
// rows applies both filters.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::sessions;

/// Session row. Serialize/Deserialize because the session cache stores
/// the same shape as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Insertable)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_info: Option<String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub last_ip_address: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub is_trusted: bool,
    pub refresh_token_id: Option<Uuid>,
    pub suspicious_activity_count: i32,
    pub last_provider_accessed: Option<String>,
    pub last_provider_sync_at: Option<DateTime<Utc>>,
}

/// Errors for session persistence operations
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Session not found")]
    NotFound,
}

impl Session {
    /// Session is active iff not revoked and not expired
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && self.expires_at > now
    }

    /// Save (insert or update) a session
    pub async fn save(&self, conn: &mut AsyncPgConnection) -> Result<(), SessionError> {
        diesel::insert_into(sessions::table)
            .values(self)
            .on_conflict(sessions::id)
            .do_update()
            .set((
                sessions::last_ip_address.eq(&self.last_ip_address),
                sessions::last_activity_at.eq(self.last_activity_at),
                sessions::expires_at.eq(self.expires_at),
                sessions::is_revoked.eq(self.is_revoked),
                sessions::revoked_at.eq(self.revoked_at),
                sessions::revoked_reason.eq(&self.revoked_reason),
                sessions::is_trusted.eq(self.is_trusted),
                sessions::refresh_token_id.eq(self.refresh_token_id),
                sessions::suspicious_activity_count.eq(self.suspicious_activity_count),
                sessions::last_provider_accessed.eq(&self.last_provider_accessed),
                sessions::last_provider_sync_at.eq(self.last_provider_sync_at),
            ))
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Find session by ID
    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        session_id: Uuid,
    ) -> Result<Option<Self>, SessionError> {
        use crate::schema::sessions::dsl::*;

        sessions
            .filter(id.eq(session_id))
            .first::<Session>(conn)
            .await
            .optional()
            .map_err(SessionError::Database)
    }

    /// All sessions for a user, newest first. With active_only, revoked
    /// and expired rows are filtered out.
    pub async fn find_by_user_id(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        active_only: bool,
    ) -> Result<Vec<Self>, SessionError> {
        use crate::schema::sessions::dsl::*;

        if active_only {
            sessions
                .filter(user_id.eq(owner))
                .filter(is_revoked.eq(false))
                .filter(expires_at.gt(Utc::now()))
                .order(created_at.desc())
                .load::<Session>(conn)
                .await
                .map_err(SessionError::Database)
        } else {
            sessions
                .filter(user_id.eq(owner))
                .order(created_at.desc())
                .load::<Session>(conn)
                .await
                .map_err(SessionError::Database)
        }
    }

    /// Find the session bound to a refresh token
    pub async fn find_by_refresh_token_id(
        conn: &mut AsyncPgConnection,
        token_id: Uuid,
    ) -> Result<Option<Self>, SessionError> {
        use crate::schema::sessions::dsl::*;

        sessions
            .filter(refresh_token_id.eq(token_id))
            .first::<Session>(conn)
            .await
            .optional()
            .map_err(SessionError::Database)
    }

    /// Count active sessions for a user (session-limit enforcement)
    pub async fn count_active_sessions(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
    ) -> Result<i64, SessionError> {
        use crate::schema::sessions::dsl::*;

        sessions
            .filter(user_id.eq(owner))
            .filter(is_revoked.eq(false))
            .filter(expires_at.gt(Utc::now()))
            .count()
            .get_result::<i64>(conn)
            .await
            .map_err(SessionError::Database)
    }

    /// Oldest active session for a user (FIFO eviction target)
    pub async fn get_oldest_active_session(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
    ) -> Result<Option<Self>, SessionError> {
        use crate::schema::sessions::dsl::*;

        sessions
            .filter(user_id.eq(owner))
            .filter(is_revoked.eq(false))
            .filter(expires_at.gt(Utc::now()))
            .order(created_at.asc())
            .first::<Session>(conn)
            .await
            .optional()
            .map_err(SessionError::Database)
    }

    /// Revoke all of a user's active sessions, optionally sparing one.
    /// Returns the number of sessions revoked.
    pub async fn revoke_all_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
        reason: &str,
        except_session_id: Option<Uuid>,
    ) -> Result<usize, SessionError> {
        use crate::schema::sessions::dsl::*;

        let now = Utc::now();
        let base = diesel::update(
            sessions
                .filter(user_id.eq(owner))
                .filter(is_revoked.eq(false)),
        );

        let updated = match except_session_id {
            Some(spared) => {
                diesel::update(
                    sessions
                        .filter(user_id.eq(owner))
                        .filter(is_revoked.eq(false))
                        .filter(id.ne(spared)),
                )
                .set((
                    is_revoked.eq(true),
                    revoked_at.eq(Some(now)),
                    revoked_reason.eq(Some(reason.to_string())),
                ))
                .execute(conn)
                .await?
            },
            None => {
                base.set((
                    is_revoked.eq(true),
                    revoked_at.eq(Some(now)),
                    revoked_reason.eq(Some(reason.to_string())),
                ))
                .execute(conn)
                .await?
            },
        };

        Ok(updated)
    }

    /// Hard-delete a session. Returns true when a row was removed.
    pub async fn delete(
        conn: &mut AsyncPgConnection,
        session_id: Uuid,
    ) -> Result<bool, SessionError> {
        use crate::schema::sessions::dsl::*;

        let deleted = diesel::delete(sessions.filter(id.eq(session_id)))
            .execute(conn)
            .await?;
        Ok(deleted > 0)
    }

    /// Hard-delete all sessions for a user (account deletion)
    pub async fn delete_all_for_user(
        conn: &mut AsyncPgConnection,
        owner: Uuid,
    ) -> Result<usize, SessionError> {
        use crate::schema::sessions::dsl::*;

        diesel::delete(sessions.filter(user_id.eq(owner)))
            .execute(conn)
            .await
            .map_err(SessionError::Database)
    }

    /// Batch cleanup of sessions expired before the cutoff (defaults to now)
    pub async fn cleanup_expired_sessions(
        conn: &mut AsyncPgConnection,
        before: Option<DateTime<Utc>>,
    ) -> Result<usize, SessionError> {
        use crate::schema::sessions::dsl::*;

        let cutoff = before.unwrap_or_else(Utc::now);
        diesel::delete(sessions.filter(expires_at.lt(cutoff)))
            .execute(conn)
            .await
            .map_err(SessionError::Database)
    }

    /// Per-request activity touch
    pub async fn touch_activity(
        conn: &mut AsyncPgConnection,
        session_id: Uuid,
        ip: Option<&str>,
    ) -> Result<(), SessionError> {
        use crate::schema::sessions::dsl::*;

        let now = Utc::now();
        match ip {
            Some(addr) => {
                diesel::update(sessions.filter(id.eq(session_id)))
                    .set((
                        last_activity_at.eq(now),
                        last_ip_address.eq(Some(addr.to_string())),
                    ))
                    .execute(conn)
                    .await?;
            },
            None => {
                diesel::update(sessions.filter(id.eq(session_id)))
                    .set(last_activity_at.eq(now))
                    .execute(conn)
                    .await?;
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_session(expires_in: Duration) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            device_info: Some("Chrome 120 on macOS".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            ip_address: Some("203.0.113.45".to_string()),
            last_ip_address: Some("203.0.113.45".to_string()),
            location: None,
            created_at: now,
            last_activity_at: now,
            expires_at: now + expires_in,
            is_revoked: false,
            revoked_at: None,
            revoked_reason: None,
            is_trusted: false,
            refresh_token_id: None,
            suspicious_activity_count: 0,
            last_provider_accessed: None,
            last_provider_sync_at: None,
        }
    }

    #[test]
    fn test_is_active() {
        let now = Utc::now();

        let live = sample_session(Duration::days(30));
        assert!(live.is_active(now));

        let expired = sample_session(Duration::seconds(-10));
        assert!(!expired.is_active(now));

        let mut revoked = sample_session(Duration::days(30));
        revoked.is_revoked = true;
        assert!(!revoked.is_active(now));
    }

    #[test]
    fn test_session_round_trips_through_json() {
        let session = sample_session(Duration::days(30));
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, session.id);
        assert_eq!(back.expires_at, session.expires_at);
    }
}
