//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic checks on the loaded configuration
//! - Flag values that fell back to insecure or placeholder defaults
//! - Validate mount paths before they reach the router
//!
//! # Design Decisions
//! - Returns all findings, not just the first
//! - Findings are warnings: the process starts regardless
//! - Validation is a pure function: GatewayConfig → Vec<ValidationWarning>

use std::fmt;

use crate::config::schema::GatewayConfig;

/// A configuration issue worth reporting at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub field: &'static str,
    pub message: String,
}

impl ValidationWarning {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Mount paths must be absolute and must not be the root.
pub fn check_mount_path(field: &'static str, path: &str) -> Result<(), ValidationWarning> {
    if !path.starts_with('/') {
        return Err(ValidationWarning::new(field, format!("mount path {:?} must start with '/'", path)));
    }
    if path.trim_end_matches('/').is_empty() {
        return Err(ValidationWarning::new(field, "mount path cannot be the root"));
    }
    if path.contains('{') || path.contains('}') {
        return Err(ValidationWarning::new(field, format!("mount path {:?} cannot contain captures", path)));
    }
    Ok(())
}

/// Collect every semantic issue in `config`.
pub fn validate(config: &GatewayConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let server = &config.server;

    if server.master_key.is_empty() {
        warnings.push(ValidationWarning::new("MASTER_KEY", "master key is empty"));
    }

    if server.public_server_url.is_none() {
        warnings.push(ValidationWarning::new(
            "SERVER_URL",
            "not set; verification and reset links will not resolve",
        ));
    }

    if server.custom_pages.choose_password.starts_with("/public/") {
        warnings.push(ValidationWarning::new(
            "SERVER_BASE",
            "not set; custom page URLs are relative",
        ));
    }

    let mailgun = &server.email_adapter.options.mailgun;
    if mailgun.api_key.is_none() || mailgun.domain.is_none() {
        warnings.push(ValidationWarning::new(
            "MAILGUN_API_KEY",
            "mail credentials incomplete; outgoing mail will fail",
        ));
    }

    if config.listeners.api_address.port() == config.listeners.dashboard_address.port() {
        warnings.push(ValidationWarning::new(
            "DASHBOARD_PORT",
            "API and dashboard listeners share a port",
        ));
    }

    if config.dashboard.users.is_empty() && !config.dashboard.options.allow_insecure_http {
        warnings.push(ValidationWarning::new(
            "PARSE_DASHBOARD_USER_ID",
            "no dashboard users configured; the dashboard is only reachable from loopback",
        ));
    }

    if config.hooks.key.is_none() {
        warnings.push(ValidationWarning::new(
            "HOOKS_KEY",
            "not set; mail webhooks are not served",
        ));
    }

    if config.profile.is_production() && config.observability.sentry_dsn.is_none() {
        warnings.push(ValidationWarning::new(
            "SENTRY_DSN",
            "not set; crash telemetry disabled",
        ));
    }

    warnings
}
