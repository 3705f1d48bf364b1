//! Declarative mail adapter configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::mail::payload::Placeholders;

/// Template used by the framework for password reset mails.
pub const PASSWORD_RESET_TEMPLATE: &str = "passwordResetEmail";
/// Template used by the framework for address verification mails.
pub const VERIFICATION_TEMPLATE: &str = "verificationEmail";
/// Free-form template available to cloud code.
pub const CUSTOM_TEMPLATE: &str = "customEmail";

pub const DEFAULT_SENDER: &str = "My Custom App Notifications <noreply@example.com>";
pub const DEFAULT_MAILGUN_API: &str = "https://api.eu.mailgun.net";

/// Mail adapter options: sender, templates and delivery credentials.
#[derive(Debug, Clone, Serialize)]
pub struct MailAdapterConfig {
    pub sender: String,

    pub templates: BTreeMap<String, MailTemplate>,

    #[serde(skip)]
    pub mailgun: MailgunConfig,
}

/// File locations and defaults for one template. Files are read at send
/// time, never at startup.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MailTemplate {
    pub subject_path: PathBuf,
    pub text_path: PathBuf,
    pub html_path: PathBuf,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub placeholders: Placeholders,

    /// Extra delivery fields copied onto the outgoing payload.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl MailTemplate {
    /// Template whose three files share a stem under `./templates`.
    pub fn from_stem(stem: &str) -> Self {
        let dir = PathBuf::from("./templates");
        Self {
            subject_path: dir.join(format!("{}_subject.txt", stem)),
            text_path: dir.join(format!("{}.txt", stem)),
            html_path: dir.join(format!("{}.html", stem)),
            placeholders: Placeholders::new(),
            extra: BTreeMap::new(),
        }
    }
}

/// Mailgun API credentials.
#[derive(Clone, Default)]
pub struct MailgunConfig {
    pub api_key: Option<String>,
    pub domain: Option<String>,
    pub api_url: String,
}

impl std::fmt::Debug for MailgunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailgunConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("domain", &self.domain)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl MailAdapterConfig {
    /// Build the adapter configuration from the values read at startup.
    pub fn from_env(
        app_name: Option<&str>,
        api_key: Option<&str>,
        domain: Option<&str>,
    ) -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(
            PASSWORD_RESET_TEMPLATE.to_string(),
            MailTemplate::from_stem("password_reset_email"),
        );
        templates.insert(
            VERIFICATION_TEMPLATE.to_string(),
            MailTemplate::from_stem("verification_email"),
        );

        let mut custom = MailTemplate::from_stem("custom_email");
        if let Some(name) = app_name {
            custom
                .placeholders
                .insert("appName".to_string(), name.to_string());
        }
        custom
            .extra
            .insert("replyTo".to_string(), "somebody@example.com".to_string());
        templates.insert(CUSTOM_TEMPLATE.to_string(), custom);

        Self {
            sender: DEFAULT_SENDER.to_string(),
            templates,
            mailgun: MailgunConfig {
                api_key: api_key.map(str::to_string),
                domain: domain.map(str::to_string),
                api_url: DEFAULT_MAILGUN_API.to_string(),
            },
        }
    }

    pub fn template(&self, name: &str) -> Option<&MailTemplate> {
        self.templates.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_three_templates() {
        let config = MailAdapterConfig::from_env(Some("Acme"), Some("key"), Some("mg.acme.io"));

        assert_eq!(config.templates.len(), 3);
        let reset = config.template(PASSWORD_RESET_TEMPLATE).unwrap();
        assert_eq!(
            reset.subject_path,
            PathBuf::from("./templates/password_reset_email_subject.txt")
        );
        assert_eq!(reset.html_path, PathBuf::from("./templates/password_reset_email.html"));

        let custom = config.template(CUSTOM_TEMPLATE).unwrap();
        assert_eq!(custom.placeholders.get("appName").map(String::as_str), Some("Acme"));
        assert_eq!(
            custom.extra.get("replyTo").map(String::as_str),
            Some("somebody@example.com")
        );
    }

    #[test]
    fn test_serialized_shape_hides_credentials() {
        let config = MailAdapterConfig::from_env(None, Some("secret-key"), Some("mg.acme.io"));
        let json = serde_json::to_string(&config).unwrap();

        assert!(json.contains("\"subjectPath\""));
        assert!(!json.contains("secret-key"));
        assert!(format!("{:?}", config.mailgun).contains("<redacted>"));
    }
}
