//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order (telemetry, metrics, mail)
//! - Assemble both applications from the shared configuration
//! - Bind both listeners and hand each to its own supervisor
//!
//! # Design Decisions
//! - Fail fast: a startup error is returned before any listener serves
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use axum::Router;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::http::{hooks, upstream, ApiApp, DashboardApp};
use crate::http::upstream::{Upstream, UpstreamError};
use crate::http::websocket::LiveQueryBridge;
use crate::lifecycle::events::{spawn_supervised, ProcessEvents};
use crate::lifecycle::signals::forward_signals;
use crate::lifecycle::supervisor::{ExitFn, Shutdown, Supervisor, SupervisorError};
use crate::mail::{MailAdapter, MailgunTransport, ParseUserHooks};
use crate::observability::metrics;
use crate::observability::telemetry::CrashReporter;
use crate::security::PasswordPolicy;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("invalid live query upstream: {0}")]
    LiveQuery(#[from] url::ParseError),

    #[error(transparent)]
    Listener(#[from] SupervisorError),

    #[error("could not start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Crash reporting is a production concern only.
pub fn crash_reporter(
    config: &GatewayConfig,
    client: reqwest::Client,
    events: &ProcessEvents,
) -> CrashReporter {
    if config.profile.is_production() {
        CrashReporter::from_dsn(config.observability.sentry_dsn.as_deref(), client, events)
    } else {
        CrashReporter::disabled()
    }
}

/// The mail adapter the framework options describe, delivering through
/// Mailgun.
pub fn mail_adapter(config: &GatewayConfig, client: reqwest::Client) -> MailAdapter {
    let options = config.server.email_adapter.options.clone();
    let transport = MailgunTransport::new(&options.mailgun, client);
    MailAdapter::new(options, Arc::new(ParseUserHooks::new(transport)))
}

/// API router with the forwarding mount, webhooks and live-query bridge.
/// The webhooks are only served when a webhook key is configured.
pub fn api_router(
    config: &Arc<GatewayConfig>,
    mail: MailAdapter,
    reporter: CrashReporter,
    events: &ProcessEvents,
) -> Result<Router, StartupError> {
    let policy = PasswordPolicy::new(&config.server.password_policy);
    let upstream = Upstream::new(
        &config.upstream.baas_url,
        policy,
        config.security.max_body_size,
    )?;
    let bridge = LiveQueryBridge::new(
        &config.upstream.baas_url,
        config.server.live_query.clone(),
        events.clone(),
    )?;
    let app_name = config
        .server
        .app_name
        .clone()
        .unwrap_or_else(|| config.server.app_id.clone());

    let mut app = ApiApp::new(config.clone())
        .with_reporter(reporter)
        .with_baas(upstream::router(upstream))
        .with_live_query(bridge);
    match &config.hooks.key {
        Some(key) => app = app.with_hooks(hooks::router(mail, app_name, key.clone())),
        None => tracing::warn!("HOOKS_KEY not set; mail webhooks are disabled"),
    }
    Ok(app.into_router())
}

/// Build everything, serve both applications and wait for both
/// supervisors to finish.
pub async fn run(config: GatewayConfig, exit: ExitFn) -> Result<(), StartupError> {
    let config = Arc::new(config);
    let client = reqwest::Client::builder()
        .user_agent(concat!("baas-gateway/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let events = ProcessEvents::new();
    let reporter = crash_reporter(&config, client.clone(), &events);

    if let Some(addr) = config.observability.metrics_address {
        metrics::init_metrics(addr)?;
    }

    let mail = mail_adapter(&config, client);
    let api = api_router(&config, mail, reporter.clone(), &events)?;
    let dashboard = DashboardApp::new(config.clone())
        .with_reporter(reporter.clone())
        .into_router();

    spawn_supervised(&events, "signals", forward_signals(events.clone()));

    let api_supervisor = Supervisor::new("api", events.clone(), exit.clone()).with_reporter(reporter.clone());
    let dashboard_supervisor = Supervisor::new("dashboard", events, exit).with_reporter(reporter);

    let api_listener = api_supervisor.bind(config.listeners.api_address).await?;
    let dashboard_listener = dashboard_supervisor
        .bind(config.listeners.dashboard_address)
        .await?;

    tracing::info!(
        address = %config.listeners.api_address,
        mount = %config.mounts.api,
        profile = %config.profile,
        "API application running"
    );
    tracing::info!(
        address = %config.listeners.dashboard_address,
        mount = %config.mounts.dashboard,
        "Dashboard application running"
    );

    let (api, dashboard) = tokio::join!(
        api_supervisor.run(api_listener, api),
        dashboard_supervisor.run(dashboard_listener, dashboard),
    );

    if api == Shutdown::Terminated && dashboard == Shutdown::Terminated {
        tracing::info!("Shutdown complete");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;

    fn config(vars: &[(&str, &str)]) -> GatewayConfig {
        GatewayConfig::from_vars(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>(),
        )
        .unwrap()
    }

    #[test]
    fn test_crash_reporter_only_in_production() {
        let dsn = "https://public@o1.ingest.example.com/42";
        let client = reqwest::Client::new();
        let events = ProcessEvents::new();

        let dev = config(&[("SENTRY_DSN", dsn)]);
        assert!(!crash_reporter(&dev, client.clone(), &events).is_enabled());

        let mut prod = config(&[("SENTRY_DSN", dsn), ("NODE_ENV", "production")]);
        assert_eq!(prod.profile, Profile::Production);
        assert!(crash_reporter(&prod, client.clone(), &events).is_enabled());

        prod.observability.sentry_dsn = None;
        assert!(!crash_reporter(&prod, client, &events).is_enabled());
    }

    #[test]
    fn test_api_router_rejects_https_upstream() {
        let config = Arc::new(config(&[("PARSE_UPSTREAM_URL", "https://baas.example.com/parse")]));
        let mail = mail_adapter(&config, reqwest::Client::new());
        let err = api_router(&config, mail, CrashReporter::disabled(), &ProcessEvents::new()).unwrap_err();
        assert!(matches!(err, StartupError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_webhooks_need_a_configured_key() {
        use axum::{body::Body, http::Request};
        use tower::ServiceExt;

        let call = || {
            Request::post("/hooks/functions/sendEmail")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"params":{"direct":true,"recipient":"a@b.c"}}"#))
                .unwrap()
        };

        let open = Arc::new(config(&[]));
        let mail = mail_adapter(&open, reqwest::Client::new());
        let router = api_router(&open, mail, CrashReporter::disabled(), &ProcessEvents::new()).unwrap();
        assert_eq!(router.oneshot(call()).await.unwrap().status(), 404);

        let keyed = Arc::new(config(&[("HOOKS_KEY", "s3cret")]));
        let mail = mail_adapter(&keyed, reqwest::Client::new());
        let router = api_router(&keyed, mail, CrashReporter::disabled(), &ProcessEvents::new()).unwrap();
        assert_eq!(router.oneshot(call()).await.unwrap().status(), 401);
    }
}
