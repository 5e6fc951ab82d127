// Email sink: notification mail for SUCCEEDED events that require it.
//
// message_for is the declarative surface the registry compliance tests
// check: every registry row with requires_email must classify to a
// message kind here. Delivery failures are caught and logged; mail is
// never allowed to fail a workflow.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::db::DieselPool;
use crate::events::bus::{EventContext, EventHandler};
use crate::events::registry::EventType;
use crate::events::types::{DomainEvent, EventPayload};
use crate::models::User;
use crate::services::email::EmailService;

/// The messages this handler can dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailMessageKind {
    Verification,
    Welcome,
    PasswordChanged,
    ResetRequested,
    ProviderConnected,
}

pub struct EmailEventHandler {
    email: Arc<EmailService>,
    pool: DieselPool,
}

impl EmailEventHandler {
    pub fn new(email: Arc<EmailService>, pool: DieselPool) -> Self {
        Self { email, pool }
    }

    /// Which message (if any) an event type triggers. Only SUCCEEDED
    /// events map to mail.
    pub fn message_for(event_type: EventType) -> Option<EmailMessageKind> {
        match event_type {
            EventType::UserRegistrationSucceeded => Some(EmailMessageKind::Verification),
            EventType::EmailVerificationSucceeded => Some(EmailMessageKind::Welcome),
            EventType::UserPasswordChangeSucceeded => Some(EmailMessageKind::PasswordChanged),
            EventType::PasswordResetRequestSucceeded => Some(EmailMessageKind::ResetRequested),
            EventType::PasswordResetConfirmSucceeded => Some(EmailMessageKind::PasswordChanged),
            EventType::ProviderConnectionSucceeded => Some(EmailMessageKind::ProviderConnected),
            _ => None,
        }
    }

    async fn email_for_user(&self, user_id: Uuid) -> Option<String> {
        let mut conn = self.pool.get().await.ok()?;
        User::find_by_id(&mut conn, user_id)
            .await
            .ok()
            .map(|u| u.email)
    }

    async fn dispatch(&self, event: &DomainEvent) -> anyhow::Result<()> {
        match &event.payload {
            EventPayload::UserRegistrationSucceeded {
                email,
                verification_token,
                ..
            } => {
                self.email
                    .send_verification_email(email, verification_token)
                    .await?;
            },
            EventPayload::EmailVerificationSucceeded { email, .. } => {
                self.email.send_welcome_email(email).await?;
            },
            EventPayload::UserPasswordChangeSucceeded { email, .. }
            | EventPayload::PasswordResetConfirmSucceeded { email, .. } => {
                self.email.send_password_changed_email(email).await?;
            },
            EventPayload::PasswordResetRequestSucceeded { email, .. } => {
                // The reset link itself is sent by the workflow, which
                // holds the full token; this is the security notice.
                self.email.send_reset_requested_email(email).await?;
            },
            EventPayload::ProviderConnectionSucceeded {
                user_id,
                provider_slug,
                ..
            } => {
                if let Some(email) = self.email_for_user(*user_id).await {
                    self.email
                        .send_provider_connected_email(&email, provider_slug)
                        .await?;
                }
            },
            _ => {},
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for EmailEventHandler {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn handle(&self, event: &DomainEvent, _ctx: &EventContext) -> anyhow::Result<()> {
        if Self::message_for(event.event_type()).is_none() {
            return Ok(());
        }

        if let Err(e) = self.dispatch(event).await {
            warn!(
                event_id = %event.event_id,
                event_type = ?event.event_type(),
                error = %e,
                "email dispatch failed"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeded_events_map_to_messages() {
        assert_eq!(
            EmailEventHandler::message_for(EventType::UserRegistrationSucceeded),
            Some(EmailMessageKind::Verification)
        );
        assert_eq!(
            EmailEventHandler::message_for(EventType::PasswordResetConfirmSucceeded),
            Some(EmailMessageKind::PasswordChanged)
        );
    }

    #[test]
    fn test_attempts_and_failures_never_mail() {
        assert!(EmailEventHandler::message_for(EventType::UserRegistrationAttempted).is_none());
        assert!(EmailEventHandler::message_for(EventType::UserRegistrationFailed).is_none());
        assert!(EmailEventHandler::message_for(EventType::UserLoginFailed).is_none());
    }
}
