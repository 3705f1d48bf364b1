//! Configuration loading from the process environment.
//!
//! Loading is best effort: a missing or unparsable value is replaced by its
//! development default and reported, never treated as fatal.

use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::config::profile::Profile;
use crate::config::schema::*;
use crate::config::validation::{check_mount_path, validate};
use crate::mail::MailAdapterConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read environment: {0}")]
    Env(#[from] envy::Error),
}

/// Outcome of [`load_env_file`]. Loading runs before logging is set up, so
/// the outcome is reported separately through [`EnvFile::report`].
#[derive(Debug)]
pub enum EnvFile {
    Loaded(PathBuf),
    Missing(PathBuf),
    Malformed { path: PathBuf, error: dotenvy::Error },
}

impl EnvFile {
    pub fn path(&self) -> Option<&Path> {
        match self {
            EnvFile::Loaded(path) => Some(path),
            _ => None,
        }
    }

    pub fn report(&self) {
        match self {
            EnvFile::Loaded(path) => tracing::debug!(path = %path.display(), "Loaded env file"),
            EnvFile::Missing(path) => tracing::debug!(path = %path.display(), "No env file loaded"),
            EnvFile::Malformed { path, error } => {
                tracing::warn!(path = %path.display(), error = %error, "Ignoring malformed env file")
            }
        }
    }
}

/// Load `path` into the process environment. Variables that are already set
/// win over the file. A missing file is not an error.
pub fn load_env_file(path: &Path) -> EnvFile {
    let path = path.to_path_buf();
    match dotenvy::from_path(&path) {
        Ok(()) => EnvFile::Loaded(path),
        Err(dotenvy::Error::Io(_)) => EnvFile::Missing(path),
        Err(error) => EnvFile::Malformed { path, error },
    }
}

/// Recognised variables. Every field is optional; `envy` lower-cases the
/// variable names when matching.
#[derive(Debug, Default, Deserialize)]
struct RawEnv {
    node_env: Option<String>,
    database_uri: Option<String>,
    mongodb_uri: Option<String>,
    cloud_code_main: Option<String>,
    app_id: Option<String>,
    master_key: Option<String>,
    server_url: Option<String>,
    app_name: Option<String>,
    server_base: Option<String>,
    mailgun_api_key: Option<String>,
    mailgun_domain: Option<String>,
    parse_mount: Option<String>,
    port: Option<String>,
    dashboard_app_name: Option<String>,
    parse_dashboard_mount: Option<String>,
    parse_dashboard_user_id: Option<String>,
    parse_dashboard_user_password: Option<String>,
    encrypted_passwords: Option<String>,
    insecure_http: Option<String>,
    dashboard_port: Option<String>,
    sentry_dsn: Option<String>,

    parse_upstream_url: Option<String>,
    dashboard_assets: Option<String>,
    public_dir: Option<String>,
    metrics_address: Option<String>,
    hooks_key: Option<String>,
}

impl RawEnv {
    /// Empty strings count as unset.
    fn normalized(self) -> Self {
        fn present(v: Option<String>) -> Option<String> {
            v.filter(|s| !s.trim().is_empty())
        }
        Self {
            node_env: present(self.node_env),
            database_uri: present(self.database_uri),
            mongodb_uri: present(self.mongodb_uri),
            cloud_code_main: present(self.cloud_code_main),
            app_id: present(self.app_id),
            master_key: present(self.master_key),
            server_url: present(self.server_url),
            app_name: present(self.app_name),
            server_base: present(self.server_base),
            mailgun_api_key: present(self.mailgun_api_key),
            mailgun_domain: present(self.mailgun_domain),
            parse_mount: present(self.parse_mount),
            port: present(self.port),
            dashboard_app_name: present(self.dashboard_app_name),
            parse_dashboard_mount: present(self.parse_dashboard_mount),
            parse_dashboard_user_id: present(self.parse_dashboard_user_id),
            parse_dashboard_user_password: present(self.parse_dashboard_user_password),
            encrypted_passwords: present(self.encrypted_passwords),
            insecure_http: present(self.insecure_http),
            dashboard_port: present(self.dashboard_port),
            sentry_dsn: present(self.sentry_dsn),
            parse_upstream_url: present(self.parse_upstream_url),
            dashboard_assets: present(self.dashboard_assets),
            public_dir: present(self.public_dir),
            metrics_address: present(self.metrics_address),
            hooks_key: present(self.hooks_key),
        }
    }
}

impl GatewayConfig {
    /// Build the configuration from the current process environment.
    /// Variables whose name or value is not UTF-8 are skipped.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(utf8_vars(std::env::vars_os()))
    }

    /// Build the configuration from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawEnv = envy::from_iter(vars)?;
        let config = Self::from_raw(raw.normalized());

        for warning in validate(&config) {
            tracing::warn!("{}", warning);
        }

        Ok(config)
    }

    fn from_raw(raw: RawEnv) -> Self {
        let profile = Profile::parse(raw.node_env.as_deref());

        let database_uri = raw.database_uri.or(raw.mongodb_uri).unwrap_or_else(|| {
            tracing::warn!("DATABASE_URI not specified, falling back to localhost.");
            DEFAULT_DATABASE_URI.to_string()
        });

        let server_base = raw.server_base.clone().unwrap_or_default();

        let mail = MailAdapterConfig::from_env(
            raw.app_name.as_deref(),
            raw.mailgun_api_key.as_deref(),
            raw.mailgun_domain.as_deref(),
        );

        let server = ServerConfig {
            database_uri,
            cloud: raw
                .cloud_code_main
                .unwrap_or_else(|| DEFAULT_CLOUD_CODE.to_string()),
            app_id: raw.app_id.clone().unwrap_or_else(|| DEFAULT_APP_ID.to_string()),
            master_key: raw.master_key.clone().unwrap_or_default(),
            server_url: raw
                .server_url
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            public_server_url: raw.server_url.clone(),
            app_name: raw.app_name,
            live_query: LiveQueryConfig::default(),
            verify_user_emails: true,
            email_verify_token_validity_duration: 60 * 60,
            email_adapter: EmailAdapterOptions::new(mail),
            password_policy: PasswordPolicyConfig::default(),
            custom_pages: CustomPages::under(&server_base),
        };

        let users = match raw.parse_dashboard_user_id {
            Some(user) => vec![DashboardUser {
                user,
                pass: raw.parse_dashboard_user_password.unwrap_or_default(),
            }],
            None => Vec::new(),
        };

        let dashboard = DashboardConfig {
            apps: vec![DashboardApp {
                server_url: raw.server_url,
                app_id: raw.app_id,
                master_key: raw.master_key,
                app_name: raw.dashboard_app_name,
            }],
            users,
            use_encrypted_passwords: is_true(raw.encrypted_passwords.as_deref()),
            options: DashboardOptions {
                allow_insecure_http: is_true(raw.insecure_http.as_deref()),
                trust_proxy: 1,
            },
            middleware: DashboardMiddleware::default(),
        };

        let listeners = ListenerConfig {
            api_address: SocketAddr::from((
                [0, 0, 0, 0],
                parse_port("PORT", raw.port.as_deref(), DEFAULT_API_PORT),
            )),
            dashboard_address: SocketAddr::from((
                [0, 0, 0, 0],
                parse_port(
                    "DASHBOARD_PORT",
                    raw.dashboard_port.as_deref(),
                    DEFAULT_DASHBOARD_PORT,
                ),
            )),
        };

        let mounts = MountConfig {
            api: mount_or_default("PARSE_MOUNT", raw.parse_mount, DEFAULT_API_MOUNT),
            dashboard: mount_or_default(
                "PARSE_DASHBOARD_MOUNT",
                raw.parse_dashboard_mount,
                DEFAULT_DASHBOARD_MOUNT,
            ),
        };

        let metrics_address = raw.metrics_address.and_then(|addr| match addr.parse() {
            Ok(addr) => Some(addr),
            Err(_) => {
                tracing::error!(metrics_address = %addr, "Failed to parse metrics address");
                None
            }
        });

        let defaults = AssetConfig::default();

        Self {
            profile,
            server,
            dashboard,
            listeners,
            mounts,
            upstream: UpstreamConfig {
                baas_url: raw
                    .parse_upstream_url
                    .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
            },
            assets: AssetConfig {
                public_dir: raw.public_dir.map(PathBuf::from).unwrap_or(defaults.public_dir),
                dashboard_dir: raw
                    .dashboard_assets
                    .map(PathBuf::from)
                    .unwrap_or(defaults.dashboard_dir),
            },
            observability: ObservabilityConfig {
                sentry_dsn: raw.sentry_dsn,
                metrics_address,
            },
            hooks: HooksConfig { key: raw.hooks_key },
            security: SecurityConfig::default(),
        }
    }
}

fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter().filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
        (Ok(name), Ok(value)) => Some((name, value)),
        (Ok(name), Err(_)) => {
            tracing::warn!(variable = %name, "Skipping variable with a non UTF-8 value");
            None
        }
        (Err(_), _) => None,
    })
}

fn is_true(value: Option<&str>) -> bool {
    value == Some("true")
}

fn parse_port(name: &str, value: Option<&str>, default: u16) -> u16 {
    match value {
        None => default,
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = name, value = v, default, "Invalid port, using default");
            default
        }),
    }
}

fn mount_or_default(name: &'static str, value: Option<String>, default: &str) -> String {
    match value {
        None => default.to_string(),
        Some(path) => match check_mount_path(name, &path) {
            Ok(()) => path.trim_end_matches('/').to_string(),
            Err(warning) => {
                tracing::warn!("{}; using {}", warning, default);
                default.to_string()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_file_outcomes() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join(".absent.env");
        assert!(matches!(load_env_file(&missing), EnvFile::Missing(p) if p == missing));

        let malformed = dir.path().join(".broken.env");
        std::fs::write(&malformed, "BAAS_GATEWAY_TEST_BROKEN='unterminated\n").unwrap();
        let outcome = load_env_file(&malformed);
        assert!(matches!(outcome, EnvFile::Malformed { .. }));
        assert!(outcome.path().is_none());
        assert!(std::env::var("BAAS_GATEWAY_TEST_BROKEN").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("APP_ID"), OsString::from("demo")),
            (OsString::from("APP_NAME"), OsString::from_vec(vec![0x66, 0xff, 0x6f])),
            (OsString::from_vec(vec![0xfe]), OsString::from("x")),
        ];
        let kept: Vec<_> = utf8_vars(vars).collect();
        assert_eq!(kept, vec![("APP_ID".to_string(), "demo".to_string())]);
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = GatewayConfig::from_vars(Vec::new()).unwrap();

        assert_eq!(config.profile, Profile::Development);
        assert_eq!(config.server.database_uri, "mongodb://localhost:27017/dev");
        assert_eq!(config.server.app_id, "myAppId");
        assert_eq!(config.server.master_key, "");
        assert_eq!(config.server.server_url, "http://localhost:1337/parse");
        assert_eq!(config.server.public_server_url, None);
        assert_eq!(config.server.cloud, "./cloud/main.js");
        assert_eq!(config.mounts.api, "/parse");
        assert_eq!(config.mounts.dashboard, "/dashboard");
        assert_eq!(config.listeners.api_address.port(), 1337);
        assert_eq!(config.listeners.dashboard_address.port(), 4040);
        assert!(config.dashboard.users.is_empty());
        assert!(!config.dashboard.use_encrypted_passwords);
        assert!(!config.dashboard.options.allow_insecure_http);
        assert_eq!(config.dashboard.options.trust_proxy, 1);
    }

    #[test]
    fn test_database_uri_precedence() {
        let config = GatewayConfig::from_vars(vars(&[
            ("MONGODB_URI", "mongodb://mongo/b"),
            ("DATABASE_URI", "mongodb://mongo/a"),
        ]))
        .unwrap();
        assert_eq!(config.server.database_uri, "mongodb://mongo/a");

        let config = GatewayConfig::from_vars(vars(&[("MONGODB_URI", "mongodb://mongo/b")])).unwrap();
        assert_eq!(config.server.database_uri, "mongodb://mongo/b");

        let config = GatewayConfig::from_vars(vars(&[("DATABASE_URI", "")])).unwrap();
        assert_eq!(config.server.database_uri, DEFAULT_DATABASE_URI);
    }

    #[test]
    fn test_full_environment() {
        let config = GatewayConfig::from_vars(vars(&[
            ("NODE_ENV", "production"),
            ("APP_ID", "app"),
            ("MASTER_KEY", "master"),
            ("SERVER_URL", "https://api.example.com/parse"),
            ("SERVER_BASE", "https://api.example.com"),
            ("APP_NAME", "Example"),
            ("PARSE_MOUNT", "/api/"),
            ("PORT", "8080"),
            ("DASHBOARD_PORT", "8081"),
            ("DASHBOARD_APP_NAME", "Example Dashboard"),
            ("PARSE_DASHBOARD_USER_ID", "admin"),
            ("PARSE_DASHBOARD_USER_PASSWORD", "pw"),
            ("ENCRYPTED_PASSWORDS", "true"),
            ("INSECURE_HTTP", "true"),
            ("SENTRY_DSN", "https://key@sentry.example.com/42"),
        ]))
        .unwrap();

        assert_eq!(config.profile, Profile::Production);
        assert_eq!(config.mounts.api, "/api");
        assert_eq!(config.listeners.api_address.port(), 8080);
        assert_eq!(config.listeners.dashboard_address.port(), 8081);
        assert_eq!(
            config.server.public_server_url.as_deref(),
            Some("https://api.example.com/parse")
        );
        assert_eq!(
            config.server.custom_pages.choose_password,
            "https://api.example.com/public/pages/choose_password.html"
        );
        assert_eq!(config.dashboard.apps[0].app_name.as_deref(), Some("Example Dashboard"));
        assert_eq!(config.dashboard.users[0].user, "admin");
        assert!(config.dashboard.use_encrypted_passwords);
        assert!(config.dashboard.options.allow_insecure_http);
        assert!(config.observability.sentry_dsn.is_some());
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = GatewayConfig::from_vars(vars(&[
            ("PORT", "not-a-port"),
            ("PARSE_MOUNT", "parse"),
            ("PARSE_DASHBOARD_MOUNT", "/"),
            ("ENCRYPTED_PASSWORDS", "yes"),
            ("METRICS_ADDRESS", "nowhere"),
        ]))
        .unwrap();

        assert_eq!(config.listeners.api_address.port(), DEFAULT_API_PORT);
        assert_eq!(config.mounts.api, DEFAULT_API_MOUNT);
        assert_eq!(config.mounts.dashboard, DEFAULT_DASHBOARD_MOUNT);
        assert!(!config.dashboard.use_encrypted_passwords);
        assert!(config.observability.metrics_address.is_none());
    }
}
