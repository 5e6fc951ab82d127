// Session sink: terminates sessions in response to SUCCEEDED events
// that require it (password change, password-reset confirm, logout).
//
// The handler mutates the repository and cache directly instead of
// going back through the session workflows - a handler publishing onto
// the bus it is consumed by would recurse.

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::cache::SessionCache;
use crate::db::DieselPool;
use crate::events::bus::{EventContext, EventHandler};
use crate::events::registry::EventType;
use crate::events::types::{DomainEvent, EventPayload, SessionTerminationReason};
use crate::models::Session;

/// What a session-requiring event demands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Revoke every session the user has
    RevokeAll(SessionTerminationReason),
    /// Revoke the single session named by the event
    RevokeOne(SessionTerminationReason),
}

pub struct SessionEventHandler {
    pool: DieselPool,
    cache: SessionCache,
}

impl SessionEventHandler {
    pub fn new(pool: DieselPool, cache: SessionCache) -> Self {
        Self { pool, cache }
    }

    /// Which action (if any) an event type triggers. The registry
    /// compliance tests assert coverage of every requires_session row.
    pub fn action_for(event_type: EventType) -> Option<SessionAction> {
        match event_type {
            EventType::UserPasswordChangeSucceeded => Some(SessionAction::RevokeAll(
                SessionTerminationReason::PasswordChanged,
            )),
            EventType::PasswordResetConfirmSucceeded => Some(SessionAction::RevokeAll(
                SessionTerminationReason::PasswordReset,
            )),
            EventType::UserLogoutSucceeded => {
                Some(SessionAction::RevokeOne(SessionTerminationReason::Logout))
            },
            _ => None,
        }
    }

    async fn revoke_all(
        &self,
        user_id: Uuid,
        reason: SessionTerminationReason,
    ) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await?;
        let revoked =
            Session::revoke_all_for_user(&mut conn, user_id, reason.as_str(), None).await?;
        drop(conn);

        if let Err(e) = self.cache.delete_all_for_user(user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "session cache cleanup degraded");
        }

        debug!(user_id = %user_id, revoked, reason = reason.as_str(), "revoked all sessions");
        Ok(())
    }

    async fn revoke_one(
        &self,
        session_id: Uuid,
        reason: SessionTerminationReason,
    ) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await?;
        let Some(mut session) = Session::find_by_id(&mut conn, session_id).await? else {
            return Ok(());
        };
        if session.is_revoked {
            return Ok(());
        }

        session.is_revoked = true;
        session.revoked_at = Some(chrono::Utc::now());
        session.revoked_reason = Some(reason.as_str().to_string());
        session.save(&mut conn).await?;
        drop(conn);

        if let Err(e) = self.cache.delete(session_id).await {
            tracing::warn!(session_id = %session_id, error = %e, "session cache cleanup degraded");
        }
        let _ = self
            .cache
            .remove_user_session(session.user_id, session_id)
            .await;

        debug!(session_id = %session_id, reason = reason.as_str(), "revoked session");
        Ok(())
    }
}

#[async_trait]
impl EventHandler for SessionEventHandler {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn handle(&self, event: &DomainEvent, _ctx: &EventContext) -> anyhow::Result<()> {
        let Some(action) = Self::action_for(event.event_type()) else {
            return Ok(());
        };

        match (action, &event.payload) {
            (
                SessionAction::RevokeAll(reason),
                EventPayload::UserPasswordChangeSucceeded { user_id, .. }
                | EventPayload::PasswordResetConfirmSucceeded { user_id, .. },
            ) => self.revoke_all(*user_id, reason).await,
            (
                SessionAction::RevokeOne(reason),
                EventPayload::UserLogoutSucceeded { session_id, .. },
            ) => self.revoke_one(*session_id, reason).await,
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_events_revoke_all_sessions() {
        assert_eq!(
            SessionEventHandler::action_for(EventType::UserPasswordChangeSucceeded),
            Some(SessionAction::RevokeAll(
                SessionTerminationReason::PasswordChanged
            ))
        );
        assert_eq!(
            SessionEventHandler::action_for(EventType::PasswordResetConfirmSucceeded),
            Some(SessionAction::RevokeAll(
                SessionTerminationReason::PasswordReset
            ))
        );
    }

    #[test]
    fn test_logout_revokes_only_its_session() {
        assert_eq!(
            SessionEventHandler::action_for(EventType::UserLogoutSucceeded),
            Some(SessionAction::RevokeOne(SessionTerminationReason::Logout))
        );
    }

    #[test]
    fn test_other_events_touch_no_sessions() {
        assert!(SessionEventHandler::action_for(EventType::UserLoginSucceeded).is_none());
        assert!(SessionEventHandler::action_for(EventType::SessionCreated).is_none());
    }
}
