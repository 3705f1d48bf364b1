use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DsnError {
    #[error("invalid DSN url: {0}")]
    Url(#[from] url::ParseError),
    #[error("DSN has no public key")]
    MissingKey,
    #[error("DSN has no project id")]
    MissingProject,
    #[error("DSN scheme must be http or https")]
    Scheme,
}

/// Parsed crash telemetry DSN: `{scheme}://{key}@{host}[:port]/{path/}{project}`.
#[derive(Clone, PartialEq, Eq)]
pub struct Dsn {
    public_key: String,
    project_id: String,
    store_url: Url,
}

impl Dsn {
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Endpoint events are posted to.
    pub fn store_url(&self) -> &Url {
        &self.store_url
    }

    /// Value for the `X-Sentry-Auth` header.
    pub fn auth_header(&self, client: &str) -> String {
        format!(
            "Sentry sentry_version=7, sentry_client={}, sentry_key={}",
            client, self.public_key
        )
    }
}

impl FromStr for Dsn {
    type Err = DsnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s.trim())?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(DsnError::Scheme);
        }

        let public_key = url.username().to_string();
        if public_key.is_empty() {
            return Err(DsnError::MissingKey);
        }

        let path = url.path().trim_end_matches('/');
        let (prefix, project_id) = match path.rsplit_once('/') {
            Some((prefix, project)) if !project.is_empty() => (prefix, project),
            _ => return Err(DsnError::MissingProject),
        };

        let mut store_url = url.clone();
        // Credentials never travel in the URL.
        let _ = store_url.set_username("");
        let _ = store_url.set_password(None);
        store_url.set_path(&format!("{}/api/{}/store/", prefix, project_id));

        Ok(Self {
            public_key,
            project_id: project_id.to_string(),
            store_url,
        })
    }
}

impl fmt::Debug for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dsn")
            .field("project_id", &self.project_id)
            .field("store_url", &self.store_url.as_str())
            .finish()
    }
}
