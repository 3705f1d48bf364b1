//! API application.
//!
//! Serves `GET /`, `/public/*`, the BaaS framework mount and, when a key is
//! configured, its webhooks. Answers everything else with a JSON 404 and
//! translates every handler error into a JSON error body. The live-query
//! bridge sits outside the stage list and takes websocket upgrades before any
//! stage runs.

use std::sync::Arc;

use axum::{middleware, Router};

use crate::config::GatewayConfig;
use crate::http::stages::{api_stages, compose, Mount, Stage, StageContext};
use crate::http::websocket::{live_query_upgrade, LiveQueryBridge};
use crate::observability::telemetry::CrashReporter;

/// Client addresses are taken from the forwarding headers of every proxy.
const TRUST_ALL_PROXIES: u8 = u8::MAX;

pub struct ApiApp {
    config: Arc<GatewayConfig>,
    reporter: CrashReporter,
    baas: Option<Router>,
    hooks: Option<Router>,
    live_query: Option<LiveQueryBridge>,
}

impl ApiApp {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        Self {
            config,
            reporter: CrashReporter::disabled(),
            baas: None,
            hooks: None,
            live_query: None,
        }
    }

    pub fn with_reporter(mut self, reporter: CrashReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Router mounted at the configured API mount path.
    pub fn with_baas(mut self, router: Router) -> Self {
        self.baas = Some(router);
        self
    }

    /// Router mounted at `/hooks`.
    pub fn with_hooks(mut self, router: Router) -> Self {
        self.hooks = Some(router);
        self
    }

    pub fn with_live_query(mut self, bridge: LiveQueryBridge) -> Self {
        self.live_query = Some(bridge);
        self
    }

    pub fn stages(&self) -> Vec<Stage> {
        api_stages(self.config.profile)
    }

    pub fn into_router(self) -> Router {
        let stages = self.stages();
        let config = self.config;

        let ctx = StageContext {
            app: "api",
            trust_proxy: TRUST_ALL_PROXIES,
            max_body_size: config.security.max_body_size,
            reporter: self.reporter,
            public_dir: config.assets.public_dir.clone(),
            baas: self.baas.map(|router| Mount {
                path: config.mounts.api.clone(),
                router,
            }),
            hooks: self.hooks,
            dashboard: None,
        };

        let router = compose(&stages, ctx);
        match self.live_query {
            Some(bridge) => router.layer(middleware::from_fn_with_state(bridge, live_query_upgrade)),
            None => router,
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::config::Profile;
    use crate::http::error::HttpError;
    use crate::http::stages::GREETING;

    fn config(profile: Profile) -> Arc<GatewayConfig> {
        let mut config = GatewayConfig::from_vars(Vec::<(String, String)>::new()).unwrap();
        config.profile = profile;
        Arc::new(config)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_liveness_in_every_profile() {
        for profile in [Profile::Production, Profile::Development, Profile::Test] {
            let app = ApiApp::new(config(profile)).into_router();
            let response = app
                .oneshot(Request::get("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&body[..], GREETING.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_unmatched_route_is_json_404() {
        let app = ApiApp::new(config(Profile::Test)).into_router();
        let response = app
            .oneshot(Request::get("/no/such/route").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": 404, "statusCode": 404, "expose": true, "message": "Not Found"})
        );
    }

    #[tokio::test]
    async fn test_mounted_handler_errors() {
        let baas = Router::new()
            .route("/teapot", get(|| async { HttpError::new(StatusCode::IM_A_TEAPOT, "short") }))
            .route(
                "/panic",
                get(|| async {
                    if true {
                        panic!("mounted handler exploded");
                    }
                    "unreachable"
                }),
            );
        let app = ApiApp::new(config(Profile::Development))
            .with_baas(baas)
            .into_router();

        let response = app
            .clone()
            .oneshot(Request::get("/parse/teapot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_json(response).await["message"], "short");

        let response = app
            .oneshot(Request::get("/parse/panic").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": 500, "statusCode": 500, "expose": false})
        );
    }

    #[tokio::test]
    async fn test_cors_override_on_mounted_routes() {
        let baas = Router::new().route("/health", get(|| async { "ok" }));
        let app = ApiApp::new(config(Profile::Development))
            .with_baas(baas)
            .into_router();

        let response = app
            .oneshot(Request::get("/parse/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    }

    #[tokio::test]
    async fn test_test_profile_skips_mounts() {
        let baas = Router::new().route("/health", get(|| async { "ok" }));
        let app = ApiApp::new(config(Profile::Test)).with_baas(baas).into_router();

        let response = app
            .oneshot(Request::get("/parse/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
