//! Customisation points of the mail adapter.

use async_trait::async_trait;

use crate::mail::error::MailError;
use crate::mail::mailgun::MailgunTransport;
use crate::mail::payload::{ApiPayload, MailUser, Placeholders};

/// The three callbacks the adapter invokes while sending.
///
/// `resolve_placeholders` runs once per templated mail and its result is
/// merged over the template's placeholders. `deliver` is the terminal step
/// and is called at most once per mail; the adapter never retries.
#[async_trait]
pub trait MailHooks: Send + Sync {
    async fn resolve_placeholders(
        &self,
        user: &MailUser,
        locale: Option<&str>,
        placeholders: &Placeholders,
    ) -> Result<Placeholders, MailError>;

    async fn resolve_locale(&self, user: &MailUser) -> Option<String>;

    async fn deliver(&self, payload: ApiPayload, locale: Option<&str>) -> Result<(), MailError>;
}

/// Default hooks: username placeholder, locale from the user record,
/// delivery through Mailgun.
pub struct ParseUserHooks {
    transport: MailgunTransport,
}

impl ParseUserHooks {
    pub fn new(transport: MailgunTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl MailHooks for ParseUserHooks {
    async fn resolve_placeholders(
        &self,
        user: &MailUser,
        _locale: Option<&str>,
        _placeholders: &Placeholders,
    ) -> Result<Placeholders, MailError> {
        let mut resolved = Placeholders::new();
        if let Some(username) = user.get("username") {
            resolved.insert("username".to_string(), username.to_string());
        }
        Ok(resolved)
    }

    async fn resolve_locale(&self, user: &MailUser) -> Option<String> {
        user.get("locale").map(str::to_string)
    }

    async fn deliver(&self, payload: ApiPayload, _locale: Option<&str>) -> Result<(), MailError> {
        self.transport.send(&payload).await
    }
}
