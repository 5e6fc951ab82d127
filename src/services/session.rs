// Session workflows: creation with enrichment and FIFO eviction,
// listing, revocation (single and bulk), per-request activity touch,
// and the JWT-to-session binding check that blocks post-logout token
// reuse.
//
// Ordering discipline on every mutation: repository write, then cache
// synchronization, then event publish. The repository is the source of
// truth; the cache rebuilds lazily if the process dies in between.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::cache::{log_cache_error, SessionCache};
use crate::db::DieselPool;
use crate::events::types::{
    AllSessionsRevocationFailureReason, EventPayload, SessionRevocationFailureReason,
    SessionTerminationReason,
};
use crate::events::{DomainEvent, EventBus, EventContext};
use crate::models::{Session, User, UserError};
use crate::services::enrichment::{enrich_device, enrich_location};

/// Default session lifetime when the caller does not pin an expiry
const DEFAULT_SESSION_LIFETIME_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct CreateSessionInput {
    pub user_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_token_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub device_info: Option<String>,
    pub location: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CreateSessionError {
    #[error("User not found")]
    UserNotFound,

    #[error("Failed to evict oldest session")]
    EvictionFailed,

    #[error("Internal error")]
    Internal,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RevokeSessionError {
    #[error("Session not found")]
    SessionNotFound,

    #[error("Not the session owner")]
    NotSessionOwner,

    #[error("Session already revoked")]
    SessionAlreadyRevoked,

    #[error("Internal error")]
    Internal,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CurrentSessionError {
    #[error("Session not found")]
    SessionNotFound,

    #[error("Session revoked")]
    SessionRevoked,

    #[error("Internal error")]
    Internal,
}

pub struct SessionService {
    pool: DieselPool,
    cache: SessionCache,
    bus: Arc<EventBus>,
}

impl SessionService {
    pub fn new(pool: DieselPool, cache: SessionCache, bus: Arc<EventBus>) -> Self {
        Self { pool, cache, bus }
    }

    /// Create a session for a user, enforcing the tier's session cap by
    /// FIFO eviction. SessionEvicted (if any) is published before
    /// SessionCreated.
    pub async fn create(
        &self,
        input: CreateSessionInput,
        ctx: EventContext,
    ) -> Result<CreateSessionResponse, CreateSessionError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| CreateSessionError::Internal)?;

        let user = match User::find_by_id(&mut conn, input.user_id).await {
            Ok(user) => user,
            Err(UserError::NotFound) => return Err(CreateSessionError::UserNotFound),
            Err(_) => return Err(CreateSessionError::Internal),
        };

        let device_info = enrich_device(input.user_agent.as_deref().unwrap_or(""));
        let location = enrich_location(input.ip_address.as_deref().unwrap_or(""));

        // Tier cap with FIFO eviction
        if let Some(max_sessions) = user.session_tier_enum().max_sessions() {
            let active = Session::count_active_sessions(&mut conn, input.user_id)
                .await
                .map_err(|_| CreateSessionError::Internal)?;

            if active >= max_sessions {
                self.bus
                    .publish(
                        DomainEvent::new(EventPayload::SessionLimitExceeded {
                            user_id: input.user_id,
                            active_count: active,
                            max_sessions,
                        }),
                        ctx.clone(),
                    )
                    .await;

                let oldest = Session::get_oldest_active_session(&mut conn, input.user_id)
                    .await
                    .map_err(|_| CreateSessionError::EvictionFailed)?;

                if let Some(mut oldest) = oldest {
                    oldest.is_revoked = true;
                    oldest.revoked_at = Some(Utc::now());
                    oldest.revoked_reason =
                        Some(SessionTerminationReason::SessionLimitExceeded.as_str().to_string());
                    oldest
                        .save(&mut conn)
                        .await
                        .map_err(|_| CreateSessionError::EvictionFailed)?;

                    log_cache_error("delete", self.cache.delete(oldest.id).await);
                    log_cache_error(
                        "remove_user_session",
                        self.cache.remove_user_session(input.user_id, oldest.id).await,
                    );

                    self.bus
                        .publish(
                            DomainEvent::new(EventPayload::SessionEvicted {
                                session_id: oldest.id,
                                user_id: input.user_id,
                                reason: SessionTerminationReason::SessionLimitExceeded,
                                device_info: oldest.device_info.clone(),
                            }),
                            ctx.clone(),
                        )
                        .await;
                }
            }
        }

        let now = Utc::now();
        let expires_at = input
            .expires_at
            .unwrap_or_else(|| now + Duration::days(DEFAULT_SESSION_LIFETIME_DAYS));

        let session = Session {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            device_info: device_info.clone(),
            user_agent: input.user_agent.clone(),
            ip_address: input.ip_address.clone(),
            last_ip_address: input.ip_address.clone(),
            location: location.clone(),
            created_at: now,
            last_activity_at: now,
            expires_at,
            is_revoked: false,
            revoked_at: None,
            revoked_reason: None,
            is_trusted: false,
            refresh_token_id: input.refresh_token_id,
            suspicious_activity_count: 0,
            last_provider_accessed: None,
            last_provider_sync_at: None,
        };

        session
            .save(&mut conn)
            .await
            .map_err(|_| CreateSessionError::Internal)?;
        drop(conn);

        log_cache_error("set", self.cache.set(&session, None).await);

        self.bus
            .publish(
                DomainEvent::new(EventPayload::SessionCreated {
                    session_id: session.id,
                    user_id: input.user_id,
                    device_info: device_info.clone(),
                    ip_address: input.ip_address.clone(),
                    location: location.clone(),
                }),
                ctx,
            )
            .await;

        Ok(CreateSessionResponse {
            session_id: session.id,
            device_info,
            location,
            expires_at,
        })
    }

    /// All sessions for a user (newest first)
    pub async fn list(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Session>, CurrentSessionError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| CurrentSessionError::Internal)?;
        Session::find_by_user_id(&mut conn, user_id, active_only)
            .await
            .map_err(|_| CurrentSessionError::Internal)
    }

    /// One session, with an ownership guard
    pub async fn get(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<Session, RevokeSessionError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| RevokeSessionError::Internal)?;
        let session = Session::find_by_id(&mut conn, session_id)
            .await
            .map_err(|_| RevokeSessionError::Internal)?
            .ok_or(RevokeSessionError::SessionNotFound)?;

        if session.user_id != user_id {
            return Err(RevokeSessionError::NotSessionOwner);
        }
        Ok(session)
    }

    /// Revoke a single session after ownership and state guards
    pub async fn revoke(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        reason: SessionTerminationReason,
        ctx: EventContext,
    ) -> Result<(), RevokeSessionError> {
        self.bus
            .publish(
                DomainEvent::new(EventPayload::SessionRevocationAttempted {
                    session_id,
                    user_id,
                }),
                ctx.clone(),
            )
            .await;

        let outcome = self.revoke_inner(session_id, user_id, reason).await;

        match &outcome {
            Ok(()) => {
                self.bus
                    .publish(
                        DomainEvent::new(EventPayload::SessionRevoked {
                            session_id,
                            user_id,
                            reason,
                        }),
                        ctx,
                    )
                    .await;
            },
            Err(error) => {
                let reason = match error {
                    RevokeSessionError::SessionNotFound => {
                        SessionRevocationFailureReason::SessionNotFound
                    },
                    RevokeSessionError::NotSessionOwner => {
                        SessionRevocationFailureReason::NotSessionOwner
                    },
                    RevokeSessionError::SessionAlreadyRevoked => {
                        SessionRevocationFailureReason::SessionAlreadyRevoked
                    },
                    RevokeSessionError::Internal => SessionRevocationFailureReason::InternalError,
                };
                self.bus
                    .publish(
                        DomainEvent::new(EventPayload::SessionRevocationFailed {
                            session_id,
                            user_id,
                            reason,
                        }),
                        ctx,
                    )
                    .await;
            },
        }

        outcome
    }

    async fn revoke_inner(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        reason: SessionTerminationReason,
    ) -> Result<(), RevokeSessionError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| RevokeSessionError::Internal)?;

        let mut session = Session::find_by_id(&mut conn, session_id)
            .await
            .map_err(|_| RevokeSessionError::Internal)?
            .ok_or(RevokeSessionError::SessionNotFound)?;

        if session.user_id != user_id {
            return Err(RevokeSessionError::NotSessionOwner);
        }
        if session.is_revoked {
            return Err(RevokeSessionError::SessionAlreadyRevoked);
        }

        session.is_revoked = true;
        session.revoked_at = Some(Utc::now());
        session.revoked_reason = Some(reason.as_str().to_string());
        session
            .save(&mut conn)
            .await
            .map_err(|_| RevokeSessionError::Internal)?;
        drop(conn);

        log_cache_error("delete", self.cache.delete(session_id).await);
        log_cache_error(
            "remove_user_session",
            self.cache.remove_user_session(user_id, session_id).await,
        );

        Ok(())
    }

    /// Revoke all of a user's sessions, optionally sparing the current
    /// one. Returns the number revoked.
    pub async fn revoke_all(
        &self,
        user_id: Uuid,
        reason: SessionTerminationReason,
        except_session_id: Option<Uuid>,
        ctx: EventContext,
    ) -> Result<u64, CurrentSessionError> {
        self.bus
            .publish(
                DomainEvent::new(EventPayload::AllSessionsRevocationAttempted { user_id, reason }),
                ctx.clone(),
            )
            .await;

        let result: Result<u64, CurrentSessionError> = async {
            let mut conn = self
                .pool
                .get()
                .await
                .map_err(|_| CurrentSessionError::Internal)?;
            let revoked =
                Session::revoke_all_for_user(&mut conn, user_id, reason.as_str(), except_session_id)
                    .await
                    .map_err(|_| CurrentSessionError::Internal)? as u64;

            log_cache_error(
                "delete_all_for_user",
                self.cache.delete_all_for_user(user_id).await,
            );

            // The spared session was dropped with the rest of the user's
            // cache entries; restore it if it is still live.
            if let Some(spared) = except_session_id {
                if let Ok(Some(session)) = Session::find_by_id(&mut conn, spared).await {
                    if session.is_active(Utc::now()) {
                        log_cache_error("set", self.cache.set(&session, None).await);
                    }
                }
            }

            Ok(revoked)
        }
        .await;

        match &result {
            Ok(count) => {
                self.bus
                    .publish(
                        DomainEvent::new(EventPayload::AllSessionsRevoked {
                            user_id,
                            count: *count,
                            reason,
                        }),
                        ctx,
                    )
                    .await;
            },
            Err(_) => {
                self.bus
                    .publish(
                        DomainEvent::new(EventPayload::AllSessionsRevocationFailed {
                            user_id,
                            reason: AllSessionsRevocationFailureReason::InternalError,
                        }),
                        ctx,
                    )
                    .await;
            },
        }

        result
    }

    /// JWT-to-session binding check for authenticated requests.
    ///
    /// Cache first; on miss the repository is consulted and the cache
    /// repopulated iff the session is live. Revoked beats absent: a
    /// revoked session must fail closed even while still cached.
    pub async fn current_session(&self, session_id: Uuid) -> Result<Session, CurrentSessionError> {
        if let Some(cached) = log_cache_error("get", self.cache.get(session_id).await).flatten() {
            if cached.is_revoked {
                return Err(CurrentSessionError::SessionRevoked);
            }
            return Ok(cached);
        }

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|_| CurrentSessionError::Internal)?;
        let session = Session::find_by_id(&mut conn, session_id)
            .await
            .map_err(|_| CurrentSessionError::Internal)?
            .ok_or(CurrentSessionError::SessionNotFound)?;
        drop(conn);

        if session.is_revoked {
            return Err(CurrentSessionError::SessionRevoked);
        }

        log_cache_error("set", self.cache.set(&session, None).await);
        Ok(session)
    }

    /// Per-request activity touch: cache plus repository, then an
    /// operational event. Failures degrade silently - activity
    /// tracking must never fail a request.
    pub async fn touch_activity(&self, session_id: Uuid, user_id: Uuid, ip: Option<String>) {
        log_cache_error(
            "update_last_activity",
            self.cache
                .update_last_activity(session_id, ip.as_deref())
                .await,
        );

        match self.pool.get().await {
            Ok(mut conn) => {
                if let Err(e) = Session::touch_activity(&mut conn, session_id, ip.as_deref()).await
                {
                    warn!(session_id = %session_id, error = %e, "activity touch failed");
                }
            },
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "activity touch skipped: no connection");
            },
        }

        self.bus
            .publish(
                DomainEvent::new(EventPayload::SessionActivityUpdated {
                    session_id,
                    user_id,
                    ip_address: ip,
                }),
                EventContext::default(),
            )
            .await;
    }
}
