//! Values flowing through the mail adapter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder name → replacement value.
pub type Placeholders = BTreeMap<String, String>;

/// The recipient's user record as the framework hands it over.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MailUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Every other attribute of the user object.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl MailUser {
    /// Look up a string attribute by its framework name.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "objectId" => self.object_id.as_deref(),
            "username" => self.username.as_deref(),
            "email" => self.email.as_deref(),
            "locale" => self.locale.as_deref(),
            other => self.attributes.get(other).and_then(Value::as_str),
        }
    }
}

/// Options for one outgoing mail, as cloud code passes them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendEmailOptions {
    pub template_name: Option<String>,
    pub recipient: Option<String>,
    pub user: Option<MailUser>,
    pub placeholders: Placeholders,
    pub extra: BTreeMap<String, String>,

    /// Send `subject`/`text`/`html` as given instead of rendering a template.
    pub direct: bool,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
}

/// Composed mail handed to the delivery hook.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApiPayload {
    pub from: String,
    pub to: String,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Template and call extras, e.g. `replyTo`.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_attributes() {
        let user: MailUser = serde_json::from_value(serde_json::json!({
            "objectId": "abc",
            "username": "jane",
            "email": "jane@example.com",
            "locale": "de-AT",
            "nickname": "J",
            "age": 42
        }))
        .unwrap();

        assert_eq!(user.get("username"), Some("jane"));
        assert_eq!(user.get("locale"), Some("de-AT"));
        assert_eq!(user.get("nickname"), Some("J"));
        assert_eq!(user.get("age"), None);
        assert_eq!(user.get("missing"), None);
    }

    #[test]
    fn test_send_options_from_cloud_code() {
        let options: SendEmailOptions = serde_json::from_value(serde_json::json!({
            "templateName": "customEmail",
            "recipient": "a@example.com",
            "placeholders": { "code": "1234" }
        }))
        .unwrap();

        assert_eq!(options.template_name.as_deref(), Some("customEmail"));
        assert_eq!(options.placeholders.get("code").map(String::as_str), Some("1234"));
        assert!(!options.direct);
        assert!(options.user.is_none());
    }
}
