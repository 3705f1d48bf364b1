use std::path::PathBuf;

use thiserror::Error;

/// Failure to compose or deliver one mail. Never fatal to the sender.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("unknown mail template {0:?}")]
    UnknownTemplate(String),

    #[error("mail has no recipient")]
    MissingRecipient,

    #[error("direct mail requires a subject and a text or html body")]
    IncompleteDirectMail,

    #[error("could not read template {}: {source}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not render template: {0}")]
    Render(#[from] mustache::Error),

    #[error("placeholder callback failed: {0}")]
    Placeholders(String),

    #[error("mail delivery is not configured: {0} missing")]
    NotConfigured(&'static str),

    #[error("mail delivery failed: {0}")]
    Delivery(#[from] reqwest::Error),

    #[error("mail provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl MailError {
    /// Whether the failure happened talking to the provider rather than
    /// while composing the mail.
    pub fn is_delivery(&self) -> bool {
        matches!(
            self,
            MailError::NotConfigured(_) | MailError::Delivery(_) | MailError::Rejected { .. }
        )
    }
}
