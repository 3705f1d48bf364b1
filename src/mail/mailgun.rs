//! Delivery through the Mailgun messages API.

use std::time::Instant;

use crate::mail::config::MailgunConfig;
use crate::mail::error::MailError;
use crate::mail::payload::ApiPayload;
use crate::observability::metrics;

/// Sends composed mails to Mailgun. One request per mail, no retries.
#[derive(Clone)]
pub struct MailgunTransport {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    domain: Option<String>,
}

impl MailgunTransport {
    pub fn new(config: &MailgunConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            domain: config.domain.clone(),
        }
    }

    /// Convert a payload to Mailgun's form fields. `replyTo` becomes the
    /// `h:Reply-To` header field; other extras pass through by name.
    pub fn form_fields(payload: &ApiPayload) -> Vec<(String, String)> {
        let mut fields = vec![
            ("from".to_string(), payload.from.clone()),
            ("to".to_string(), payload.to.clone()),
            ("subject".to_string(), payload.subject.clone()),
        ];
        if let Some(text) = &payload.text {
            fields.push(("text".to_string(), text.clone()));
        }
        if let Some(html) = &payload.html {
            fields.push(("html".to_string(), html.clone()));
        }
        for (key, value) in &payload.extra {
            let name = match key.as_str() {
                "replyTo" => "h:Reply-To".to_string(),
                other => other.to_string(),
            };
            fields.push((name, value.clone()));
        }
        fields
    }

    /// Messages endpoint for the configured domain.
    pub fn endpoint(&self) -> Result<String, MailError> {
        let domain = self
            .domain
            .as_deref()
            .ok_or(MailError::NotConfigured("MAILGUN_DOMAIN"))?;
        Ok(format!("{}/v3/{}/messages", self.api_url, domain))
    }

    pub async fn send(&self, payload: &ApiPayload) -> Result<(), MailError> {
        let endpoint = self.endpoint()?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(MailError::NotConfigured("MAILGUN_API_KEY"))?;

        let start = Instant::now();
        let result = self
            .client
            .post(&endpoint)
            .basic_auth("api", Some(api_key))
            .header("Accept", "application/json")
            .form(&Self::form_fields(payload))
            .send()
            .await;
        metrics::record_mail_send("mailgun", start);

        let response = result.map_err(|e| {
            tracing::error!(error = %e, "Mailgun request failed");
            MailError::Delivery(e)
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(to = %payload.to, "Mail accepted by Mailgun");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = status.as_u16(), body = %body, "Mailgun rejected mail");
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
