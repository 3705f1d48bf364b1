//! Dashboard application.
//!
//! The dashboard mount is an access gate in front of two things: the
//! framework configuration document and the prebuilt UI bundle. Unlike the
//! API app there is no not-found route and no error handler, so unmatched
//! paths get the router's own empty 404.

use std::path::Path;
use std::sync::Arc;

use axum::{extract::State, middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::services::{ServeDir, ServeFile};

use crate::config::{DashboardConfig, GatewayConfig};
use crate::http::middleware::{access_control_middleware, DashboardAccess};
use crate::http::stages::{compose, dashboard_stages, Mount, Stage, StageContext};
use crate::observability::telemetry::CrashReporter;

pub const CONFIG_PATH: &str = "/parse-dashboard-config.json";

/// Document the UI bundle loads on start.
pub fn dashboard_document(config: &DashboardConfig) -> Value {
    json!({
        "apps": config.apps,
        "newFeaturesInLatestVersion": [],
    })
}

async fn dashboard_config(State(document): State<Arc<Value>>) -> Json<Value> {
    Json(document.as_ref().clone())
}

/// Gate, configuration document and UI bundle, to be nested at the
/// dashboard mount path.
pub fn mount_router(config: &DashboardConfig, assets: &Path) -> Router {
    let index = ServeFile::new(assets.join("index.html"));
    let bundle = ServeDir::new(assets).fallback(index);

    Router::new()
        .route(CONFIG_PATH, get(dashboard_config))
        .with_state(Arc::new(dashboard_document(config)))
        .fallback_service(bundle)
        .layer(middleware::from_fn_with_state(
            DashboardAccess::new(config),
            access_control_middleware,
        ))
}

pub struct DashboardApp {
    config: Arc<GatewayConfig>,
    reporter: CrashReporter,
    mount: Option<Router>,
}

impl DashboardApp {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        Self {
            config,
            reporter: CrashReporter::disabled(),
            mount: None,
        }
    }

    pub fn with_reporter(mut self, reporter: CrashReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replace the default dashboard mount.
    pub fn with_mount(mut self, router: Router) -> Self {
        self.mount = Some(router);
        self
    }

    pub fn stages(&self) -> Vec<Stage> {
        dashboard_stages(self.config.profile, self.config.dashboard.middleware)
    }

    pub fn into_router(self) -> Router {
        let stages = self.stages();
        let config = self.config;

        let mount = self.mount.unwrap_or_else(|| {
            mount_router(&config.dashboard, &config.assets.dashboard_dir)
        });

        let ctx = StageContext {
            app: "dashboard",
            trust_proxy: config.dashboard.options.trust_proxy,
            max_body_size: config.security.max_body_size,
            reporter: self.reporter,
            public_dir: config.assets.public_dir.clone(),
            baas: None,
            hooks: None,
            dashboard: Some(Mount {
                path: config.mounts.dashboard.clone(),
                router: mount,
            }),
        };

        compose(&stages, ctx)
    }
}
