// Email service: handlebars-rendered notification mail delivered via
// the Resend API. One send_* method per message the system dispatches.

pub mod sender;
pub mod types;

use handlebars::Handlebars;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::app_config::EmailConfig;
use sender::EmailSender;

pub use types::{EmailError, EmailMessage};

pub struct EmailService {
    sender: EmailSender,
    config: EmailConfig,
    templates: Arc<Handlebars<'static>>,
    verification_ttl_hours: i64,
    reset_ttl_minutes: i64,
}

impl EmailService {
    pub fn new(
        config: EmailConfig,
        verification_ttl_hours: i64,
        reset_ttl_minutes: i64,
    ) -> Result<Self, EmailError> {
        let mut templates = Handlebars::new();
        Self::register_templates(&mut templates)?;

        let sender = EmailSender::new(config.resend_api_url.clone(), config.resend_api_key.clone())
            .with_max_retries(3);

        Ok(Self {
            sender,
            config,
            templates: Arc::new(templates),
            verification_ttl_hours,
            reset_ttl_minutes,
        })
    }

    pub fn from_env() -> Result<Self, EmailError> {
        let config = crate::app_config::config();
        Self::new(
            config.email.clone(),
            config.verification_token_ttl_hours,
            config.reset_token_ttl_minutes,
        )
    }

    fn register_templates(templates: &mut Handlebars) -> Result<(), EmailError> {
        let entries = [
            ("verification", include_str!("../../../templates/email/verification.html")),
            ("welcome", include_str!("../../../templates/email/welcome.html")),
            ("password_reset", include_str!("../../../templates/email/password_reset.html")),
            ("password_changed", include_str!("../../../templates/email/password_changed.html")),
            ("reset_requested", include_str!("../../../templates/email/reset_requested.html")),
            ("provider_connected", include_str!("../../../templates/email/provider_connected.html")),
        ];

        for (name, source) in entries {
            templates
                .register_template_string(name, source)
                .map_err(|e| EmailError::TemplateError(e.to_string()))?;
        }

        Ok(())
    }

    fn from_header(&self) -> String {
        format!("{} <{}>", self.config.from_name, self.config.from_email)
    }

    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String, EmailError> {
        self.templates
            .render(template, data)
            .map_err(|e| EmailError::TemplateError(e.to_string()))
    }

    /// Email-verification link after registration
    #[instrument(skip(self, token))]
    pub async fn send_verification_email(
        &self,
        to_email: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        info!("Sending verification email to {}", to_email);

        let verification_url = format!(
            "{}/verify-email?token={}",
            self.config.frontend_url, token
        );
        let html = self.render(
            "verification",
            &json!({
                "app_name": self.config.from_name,
                "support_email": self.config.support_email,
                "verification_url": verification_url,
                "expiry_hours": self.verification_ttl_hours,
            }),
        )?;

        let message = EmailMessage::new(
            self.from_header(),
            vec![to_email.to_string()],
            format!("Verify your {} email address", self.config.from_name),
            html,
        )
        .with_text(format!(
            "Verify your email address: {}\nThis link expires in {} hours.",
            verification_url, self.verification_ttl_hours
        ));

        self.sender.send_with_retry(message).await
    }

    /// Welcome mail once the email address is confirmed
    #[instrument(skip(self))]
    pub async fn send_welcome_email(&self, to_email: &str) -> Result<(), EmailError> {
        info!("Sending welcome email to {}", to_email);

        let html = self.render(
            "welcome",
            &json!({
                "app_name": self.config.from_name,
                "app_url": self.config.frontend_url,
                "support_email": self.config.support_email,
            }),
        )?;

        let message = EmailMessage::new(
            self.from_header(),
            vec![to_email.to_string()],
            format!("Welcome to {}", self.config.from_name),
            html,
        );

        self.sender.send_with_retry(message).await
    }

    /// Password-reset link. Security mail: sent once, no retry queueing.
    #[instrument(skip(self, token))]
    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        info!("Sending password reset email to {}", to_email);

        let reset_url = format!("{}/reset-password?token={}", self.config.frontend_url, token);
        let html = self.render(
            "password_reset",
            &json!({
                "app_name": self.config.from_name,
                "support_email": self.config.support_email,
                "reset_url": reset_url,
                "expiry_minutes": self.reset_ttl_minutes,
            }),
        )?;

        let message = EmailMessage::new(
            self.from_header(),
            vec![to_email.to_string()],
            format!("Reset your {} password", self.config.from_name),
            html,
        )
        .with_text(format!(
            "Reset your password: {}\nThis link expires in {} minutes.",
            reset_url, self.reset_ttl_minutes
        ));

        self.sender.send(message).await
    }

    /// Security notice that a reset was requested
    #[instrument(skip(self))]
    pub async fn send_reset_requested_email(&self, to_email: &str) -> Result<(), EmailError> {
        let html = self.render(
            "reset_requested",
            &json!({
                "app_name": self.config.from_name,
                "support_email": self.config.support_email,
            }),
        )?;

        let message = EmailMessage::new(
            self.from_header(),
            vec![to_email.to_string()],
            format!("{} password reset requested", self.config.from_name),
            html,
        );

        self.sender.send(message).await
    }

    /// Security notice after a password change or reset completion
    #[instrument(skip(self))]
    pub async fn send_password_changed_email(&self, to_email: &str) -> Result<(), EmailError> {
        info!("Sending password changed notification to {}", to_email);

        let html = self.render(
            "password_changed",
            &json!({
                "app_name": self.config.from_name,
                "support_email": self.config.support_email,
            }),
        )?;

        let message = EmailMessage::new(
            self.from_header(),
            vec![to_email.to_string()],
            format!("Your {} password was changed", self.config.from_name),
            html,
        );

        self.sender.send(message).await
    }

    /// Notice after a financial institution is connected
    #[instrument(skip(self))]
    pub async fn send_provider_connected_email(
        &self,
        to_email: &str,
        provider_name: &str,
    ) -> Result<(), EmailError> {
        let html = self.render(
            "provider_connected",
            &json!({
                "app_name": self.config.from_name,
                "support_email": self.config.support_email,
                "provider_name": provider_name,
            }),
        )?;

        let message = EmailMessage::new(
            self.from_header(),
            vec![to_email.to_string()],
            format!("{} connected to {}", provider_name, self.config.from_name),
            html,
        );

        self.sender.send(message).await
    }
}
