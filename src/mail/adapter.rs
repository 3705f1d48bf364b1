//! Template rendering and dispatch of outgoing mail.

use std::sync::Arc;

use crate::mail::config::{MailAdapterConfig, PASSWORD_RESET_TEMPLATE, VERIFICATION_TEMPLATE};
use crate::mail::error::MailError;
use crate::mail::hooks::MailHooks;
use crate::mail::payload::{ApiPayload, MailUser, Placeholders, SendEmailOptions};
use crate::mail::template::{fill_placeholders, load_localized};

/// Composes mails from templates and hands them to [`MailHooks::deliver`].
#[derive(Clone)]
pub struct MailAdapter {
    config: Arc<MailAdapterConfig>,
    hooks: Arc<dyn MailHooks>,
}

impl MailAdapter {
    pub fn new(config: MailAdapterConfig, hooks: Arc<dyn MailHooks>) -> Self {
        Self {
            config: Arc::new(config),
            hooks,
        }
    }

    pub fn config(&self) -> &MailAdapterConfig {
        &self.config
    }

    /// Framework entry point for address verification mails.
    pub async fn send_verification_email(
        &self,
        link: &str,
        app_name: &str,
        user: MailUser,
    ) -> Result<(), MailError> {
        self.send_reserved(VERIFICATION_TEMPLATE, link, app_name, user).await
    }

    /// Framework entry point for password reset mails.
    pub async fn send_password_reset_email(
        &self,
        link: &str,
        app_name: &str,
        user: MailUser,
    ) -> Result<(), MailError> {
        self.send_reserved(PASSWORD_RESET_TEMPLATE, link, app_name, user).await
    }

    async fn send_reserved(
        &self,
        template: &str,
        link: &str,
        app_name: &str,
        user: MailUser,
    ) -> Result<(), MailError> {
        let mut placeholders = Placeholders::new();
        placeholders.insert("link".to_string(), link.to_string());
        placeholders.insert("appName".to_string(), app_name.to_string());
        if let Some(email) = user.get("email") {
            placeholders.insert("email".to_string(), email.to_string());
        }
        if let Some(username) = user.get("username") {
            placeholders.insert("username".to_string(), username.to_string());
        }

        self.send_email(SendEmailOptions {
            template_name: Some(template.to_string()),
            recipient: user.email.clone(),
            user: Some(user),
            placeholders,
            ..Default::default()
        })
        .await
    }

    /// Compose and deliver one mail.
    pub async fn send_email(&self, options: SendEmailOptions) -> Result<(), MailError> {
        let (payload, locale) = self.compose(options).await?;

        tracing::debug!(to = %payload.to, subject = %payload.subject, "Delivering mail");
        self.hooks.deliver(payload, locale.as_deref()).await
    }

    /// Build the payload without delivering it.
    pub async fn compose(
        &self,
        options: SendEmailOptions,
    ) -> Result<(ApiPayload, Option<String>), MailError> {
        let recipient = options
            .recipient
            .clone()
            .or_else(|| options.user.as_ref().and_then(|u| u.email.clone()))
            .ok_or(MailError::MissingRecipient)?;
        let from = self.config.sender.clone();

        if options.direct {
            let subject = options.subject.ok_or(MailError::IncompleteDirectMail)?;
            if options.text.is_none() && options.html.is_none() {
                return Err(MailError::IncompleteDirectMail);
            }
            let payload = ApiPayload {
                from,
                to: recipient,
                subject,
                text: options.text,
                html: options.html,
                extra: options.extra,
            };
            return Ok((payload, None));
        }

        let name = options
            .template_name
            .clone()
            .ok_or_else(|| MailError::UnknownTemplate(String::new()))?;
        let template = self
            .config
            .template(&name)
            .ok_or(MailError::UnknownTemplate(name))?;

        let locale = match &options.user {
            Some(user) => self.hooks.resolve_locale(user).await,
            None => None,
        };

        let mut placeholders = template.placeholders.clone();
        placeholders.extend(options.placeholders);
        if let Some(user) = &options.user {
            let resolved = self
                .hooks
                .resolve_placeholders(user, locale.as_deref(), &placeholders)
                .await?;
            placeholders.extend(resolved);
        }

        let subject = load_localized(&template.subject_path, locale.as_deref()).await?;
        let text = load_localized(&template.text_path, locale.as_deref()).await?;
        let html = load_localized(&template.html_path, locale.as_deref()).await?;

        let mut extra = template.extra.clone();
        extra.extend(options.extra);

        let payload = ApiPayload {
            from,
            to: recipient,
            subject: fill_placeholders(subject.trim(), &placeholders)?,
            text: Some(fill_placeholders(&text, &placeholders)?),
            html: Some(fill_placeholders(&html, &placeholders)?),
            extra,
        };
        Ok((payload, locale))
    }
}
