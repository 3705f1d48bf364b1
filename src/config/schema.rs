//! Configuration schema definitions.
//!
//! `ServerConfig` and `DashboardConfig` serialize to the option shapes the
//! mounted frameworks expect, so `print-config` output can be handed to them
//! unchanged. Everything here is built once at startup and shared via `Arc`.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::profile::Profile;
use crate::mail::MailAdapterConfig;

pub const DEFAULT_DATABASE_URI: &str = "mongodb://localhost:27017/dev";
pub const DEFAULT_APP_ID: &str = "myAppId";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:1337/parse";
pub const DEFAULT_CLOUD_CODE: &str = "./cloud/main.js";
pub const DEFAULT_API_MOUNT: &str = "/parse";
pub const DEFAULT_DASHBOARD_MOUNT: &str = "/dashboard";
pub const DEFAULT_API_PORT: u16 = 1337;
pub const DEFAULT_DASHBOARD_PORT: u16 = 4040;
pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:1338/parse";

/// Root configuration for both applications.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayConfig {
    pub profile: Profile,

    /// Options handed to the mounted BaaS framework.
    pub server: ServerConfig,

    /// Options handed to the mounted dashboard framework.
    pub dashboard: DashboardConfig,

    pub listeners: ListenerConfig,

    pub mounts: MountConfig,

    pub upstream: UpstreamConfig,

    pub assets: AssetConfig,

    pub observability: ObservabilityConfig,

    pub hooks: HooksConfig,

    pub security: SecurityConfig,
}

/// BaaS framework options.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(rename = "databaseURI")]
    pub database_uri: String,

    pub cloud: String,

    pub app_id: String,

    pub master_key: String,

    #[serde(rename = "serverURL")]
    pub server_url: String,

    #[serde(rename = "publicServerURL", skip_serializing_if = "Option::is_none")]
    pub public_server_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    pub live_query: LiveQueryConfig,

    pub verify_user_emails: bool,

    /// Seconds.
    pub email_verify_token_validity_duration: u64,

    pub email_adapter: EmailAdapterOptions,

    pub password_policy: PasswordPolicyConfig,

    pub custom_pages: CustomPages,
}

/// Classes the live-query server accepts subscriptions for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LiveQueryConfig {
    pub class_names: Vec<String>,
}

impl Default for LiveQueryConfig {
    fn default() -> Self {
        Self {
            class_names: vec!["Posts".to_string(), "Comments".to_string()],
        }
    }
}

impl LiveQueryConfig {
    pub fn allows(&self, class_name: &str) -> bool {
        self.class_names.iter().any(|c| c == class_name)
    }
}

/// `emailAdapter` entry in the framework options.
#[derive(Debug, Clone, Serialize)]
pub struct EmailAdapterOptions {
    pub module: String,
    pub options: MailAdapterConfig,
}

impl EmailAdapterOptions {
    pub fn new(options: MailAdapterConfig) -> Self {
        Self {
            module: "parse-server-api-mail-adapter".to_string(),
            options,
        }
    }
}

/// Password policy options.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PasswordPolicyConfig {
    pub validator_pattern: String,
    pub validation_error: String,
    /// Seconds a password reset link stays valid.
    pub reset_token_validity_duration: u64,
}

impl Default for PasswordPolicyConfig {
    fn default() -> Self {
        Self {
            validator_pattern: r"^([1-9])(?!\1+$)\d{4}$".to_string(),
            validation_error: "PIN must consist of exactly 5 digits (which cannot all be the same, like 22222) and cannot start with zero".to_string(),
            reset_token_validity_duration: 60 * 60,
        }
    }
}

/// Pages the framework redirects to after account flows.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustomPages {
    pub password_reset_success: String,
    pub verify_email_success: String,
    pub invalid_verification_link: String,
    pub invalid_link: String,
    pub choose_password: String,
    pub link_send_success: String,
    pub link_send_fail: String,
}

impl CustomPages {
    /// Build every page URL under `{base}/public/pages/`.
    pub fn under(base: &str) -> Self {
        let page = |name: &str| format!("{}/public/pages/{}.html", base, name);
        Self {
            password_reset_success: page("password_reset_success"),
            verify_email_success: page("verify_email_success"),
            invalid_verification_link: page("invalid_verification_link"),
            invalid_link: page("invalid_link"),
            choose_password: page("choose_password"),
            link_send_success: page("link_send_success"),
            link_send_fail: page("link_send_fail"),
        }
    }
}

/// Dashboard framework configuration.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    pub apps: Vec<DashboardApp>,

    pub users: Vec<DashboardUser>,

    pub use_encrypted_passwords: bool,

    /// Passed to the framework separately from the config proper.
    #[serde(skip)]
    pub options: DashboardOptions,

    /// Optional middleware for the dashboard application.
    #[serde(skip)]
    pub middleware: DashboardMiddleware,
}

/// One app the dashboard can manage.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardApp {
    #[serde(rename = "serverURL")]
    pub server_url: Option<String>,
    pub app_id: Option<String>,
    pub master_key: Option<String>,
    pub app_name: Option<String>,
}

/// Dashboard operator credentials. `pass` is an argon2 PHC string when
/// encrypted passwords are enabled.
#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct DashboardUser {
    pub user: String,
    pub pass: String,
}

impl std::fmt::Debug for DashboardUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardUser")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOptions {
    #[serde(rename = "allowInsecureHTTP")]
    pub allow_insecure_http: bool,
    /// Number of proxy hops whose forwarding headers are trusted.
    pub trust_proxy: u8,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            allow_insecure_http: false,
            trust_proxy: 1,
        }
    }
}

/// Middleware present on the dashboard application but off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardMiddleware {
    pub sanitize: bool,
    pub compression: bool,
    pub cors: bool,
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ListenerConfig {
    pub api_address: SocketAddr,
    pub dashboard_address: SocketAddr,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            api_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_API_PORT)),
            dashboard_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_DASHBOARD_PORT)),
        }
    }
}

/// Where the frameworks are mounted.
#[derive(Debug, Clone, Serialize)]
pub struct MountConfig {
    pub api: String,
    pub dashboard: String,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            api: DEFAULT_API_MOUNT.to_string(),
            dashboard: DEFAULT_DASHBOARD_MOUNT.to_string(),
        }
    }
}

/// Location of the BaaS framework process.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamConfig {
    pub baas_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            baas_url: DEFAULT_UPSTREAM_URL.to_string(),
        }
    }
}

/// Directories served from disk.
#[derive(Debug, Clone, Serialize)]
pub struct AssetConfig {
    pub public_dir: PathBuf,
    pub dashboard_dir: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("public"),
            dashboard_dir: PathBuf::from("dashboard"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObservabilityConfig {
    /// Crash telemetry DSN. Only used in production.
    #[serde(skip_serializing)]
    pub sentry_dsn: Option<String>,

    /// Prometheus exporter bind address, disabled when unset.
    pub metrics_address: Option<SocketAddr>,
}

/// Cloud function webhook settings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HooksConfig {
    /// Shared webhook key. The webhooks are not served without one.
    #[serde(skip_serializing)]
    pub key: Option<String>,
}

/// Request hardening.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityConfig {
    /// Largest body the sanitizer will buffer.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
