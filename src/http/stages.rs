//! Ordered middleware stages.
//!
//! Each application is described by an explicit list of [`Stage`]s and
//! turned into a router by [`compose`]. The list is the single source of
//! ordering:
//!
//! ```text
//! wrapping stages   Telemetry, RequestLogging, Sanitize, Compression, Cors
//!                   (first in the list is outermost)
//! error stages      TelemetryErrorHook, ErrorHandler
//!                   (wrap every route stage; later is outer)
//! route stages      StaticAssets, CorsOverride, Mount*, Liveness, NotFound
//!                   (a stage only affects the route stages after it)
//! ```
//!
//! Handler panics are caught just outside the route stages and become 500
//! [`HttpError`](crate::http::error::HttpError)s.

use std::path::PathBuf;

use axum::{handler::HandlerWithoutStateExt, middleware, routing::get, Router};
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, services::ServeDir};

use crate::config::{DashboardMiddleware, Profile};
use crate::http::error::{error_handler, not_found, panic_response};
use crate::http::middleware::{
    access_log, cors_layer, cors_override, error_hook, request_hook, sanitize, AccessLog, Sanitizer,
    Telemetry,
};
use crate::observability::telemetry::CrashReporter;

/// Where the mail webhooks are nested. Their bodies carry markup meant for
/// the mail and are exempt from sanitization.
pub const HOOKS_PATH: &str = "/hooks";

/// Body of `GET /` on the API app.
pub const GREETING: &str = "Hello there, stranger ...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Telemetry,
    RequestLogging,
    Sanitize,
    Compression,
    Cors,
    StaticAssets,
    CorsOverride,
    MountBaas,
    MountDashboard,
    Liveness,
    NotFound,
    TelemetryErrorHook,
    ErrorHandler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Wrapping,
    Route,
    Error,
}

impl Stage {
    fn placement(self) -> Placement {
        match self {
            Stage::Telemetry
            | Stage::RequestLogging
            | Stage::Sanitize
            | Stage::Compression
            | Stage::Cors => Placement::Wrapping,
            Stage::TelemetryErrorHook | Stage::ErrorHandler => Placement::Error,
            _ => Placement::Route,
        }
    }
}

/// Stage list of the API application.
pub fn api_stages(profile: Profile) -> Vec<Stage> {
    let mut stages = Vec::new();
    if profile.is_production() {
        stages.push(Stage::Telemetry);
    }
    if !profile.is_test() {
        stages.push(Stage::RequestLogging);
    }
    stages.extend([Stage::Sanitize, Stage::Compression, Stage::Cors, Stage::StaticAssets]);
    if !profile.is_test() {
        stages.extend([Stage::CorsOverride, Stage::MountBaas]);
    }
    stages.extend([Stage::Liveness, Stage::NotFound]);
    if profile.is_production() {
        stages.push(Stage::TelemetryErrorHook);
    }
    stages.push(Stage::ErrorHandler);
    stages
}

/// Stage list of the dashboard application. It has neither a not-found
/// route nor an error handler.
pub fn dashboard_stages(profile: Profile, toggles: DashboardMiddleware) -> Vec<Stage> {
    let mut stages = Vec::new();
    if profile.is_production() {
        stages.push(Stage::Telemetry);
    }
    if !profile.is_test() {
        stages.push(Stage::RequestLogging);
    }
    if toggles.sanitize {
        stages.push(Stage::Sanitize);
    }
    if toggles.compression {
        stages.push(Stage::Compression);
    }
    if toggles.cors {
        stages.push(Stage::Cors);
    }
    if !profile.is_test() {
        stages.push(Stage::MountDashboard);
    }
    if profile.is_production() {
        stages.push(Stage::TelemetryErrorHook);
    }
    stages
}

/// A framework router and the path it is nested under.
pub struct Mount {
    pub path: String,
    pub router: Router,
}

/// Everything the stages need to build themselves.
pub struct StageContext {
    pub app: &'static str,
    pub trust_proxy: u8,
    pub max_body_size: usize,
    pub reporter: CrashReporter,
    pub public_dir: PathBuf,
    pub baas: Option<Mount>,
    pub hooks: Option<Router>,
    pub dashboard: Option<Mount>,
}

async fn liveness() -> &'static str {
    GREETING
}

/// Build a router from an ordered stage list.
pub fn compose(stages: &[Stage], mut ctx: StageContext) -> Router {
    let telemetry = Telemetry {
        app: ctx.app,
        reporter: ctx.reporter.clone(),
    };
    let sanitizer = Sanitizer {
        max_body_size: ctx.max_body_size,
        skip_prefix: ctx.hooks.as_ref().map(|_| HOOKS_PATH),
    };

    // Route stages, innermost first.
    let mut router = Router::new();
    for stage in stages.iter().rev().filter(|s| s.placement() == Placement::Route) {
        router = match stage {
            Stage::NotFound => router.fallback(not_found),
            Stage::Liveness => Router::new().route("/", get(liveness)).merge(router),
            Stage::CorsOverride => router.layer(middleware::from_fn(cors_override)),
            Stage::StaticAssets => {
                let files = ServeDir::new(&ctx.public_dir)
                    .not_found_service(not_found.into_service());
                Router::new().nest_service("/public", files).merge(router)
            }
            Stage::MountBaas => {
                let mut mounted = Router::new();
                if let Some(baas) = ctx.baas.take() {
                    mounted = mounted.nest(&baas.path, baas.router);
                }
                if let Some(hooks) = ctx.hooks.take() {
                    mounted = mounted.nest(HOOKS_PATH, hooks);
                }
                mounted.merge(router)
            }
            Stage::MountDashboard => match ctx.dashboard.take() {
                Some(dashboard) => Router::new().nest(&dashboard.path, dashboard.router).merge(router),
                None => router,
            },
            _ => router,
        };
    }

    router = router.layer(CatchPanicLayer::custom(panic_response));

    for stage in stages.iter().filter(|s| s.placement() == Placement::Error) {
        router = match stage {
            Stage::TelemetryErrorHook => {
                router.layer(middleware::from_fn_with_state(telemetry.clone(), error_hook))
            }
            Stage::ErrorHandler => router.layer(middleware::from_fn(error_handler)),
            _ => router,
        };
    }

    for stage in stages.iter().rev().filter(|s| s.placement() == Placement::Wrapping) {
        router = match stage {
            Stage::Telemetry => {
                router.layer(middleware::from_fn_with_state(telemetry.clone(), request_hook))
            }
            Stage::RequestLogging => router.layer(middleware::from_fn_with_state(
                AccessLog {
                    app: ctx.app,
                    trust_proxy: ctx.trust_proxy,
                },
                access_log,
            )),
            Stage::Sanitize => router.layer(middleware::from_fn_with_state(sanitizer, sanitize)),
            Stage::Compression => router.layer(CompressionLayer::new()),
            Stage::Cors => router.layer(cors_layer()),
            _ => router,
        };
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_stages_production() {
        assert_eq!(
            api_stages(Profile::Production),
            vec![
                Stage::Telemetry,
                Stage::RequestLogging,
                Stage::Sanitize,
                Stage::Compression,
                Stage::Cors,
                Stage::StaticAssets,
                Stage::CorsOverride,
                Stage::MountBaas,
                Stage::Liveness,
                Stage::NotFound,
                Stage::TelemetryErrorHook,
                Stage::ErrorHandler,
            ]
        );
    }

    #[test]
    fn test_api_stages_development_and_test() {
        let dev = api_stages(Profile::Development);
        assert!(!dev.contains(&Stage::Telemetry));
        assert!(!dev.contains(&Stage::TelemetryErrorHook));
        assert_eq!(dev.first(), Some(&Stage::RequestLogging));
        assert_eq!(dev.last(), Some(&Stage::ErrorHandler));

        assert_eq!(
            api_stages(Profile::Test),
            vec![
                Stage::Sanitize,
                Stage::Compression,
                Stage::Cors,
                Stage::StaticAssets,
                Stage::Liveness,
                Stage::NotFound,
                Stage::ErrorHandler,
            ]
        );
    }

    #[test]
    fn test_dashboard_stages() {
        let stages = dashboard_stages(Profile::Production, DashboardMiddleware::default());
        assert_eq!(
            stages,
            vec![
                Stage::Telemetry,
                Stage::RequestLogging,
                Stage::MountDashboard,
                Stage::TelemetryErrorHook,
            ]
        );

        let toggles = DashboardMiddleware {
            sanitize: true,
            compression: false,
            cors: true,
        };
        assert_eq!(
            dashboard_stages(Profile::Development, toggles),
            vec![
                Stage::RequestLogging,
                Stage::Sanitize,
                Stage::Cors,
                Stage::MountDashboard,
            ]
        );

        for profile in [Profile::Production, Profile::Development, Profile::Test] {
            let stages = dashboard_stages(profile, toggles);
            assert!(!stages.contains(&Stage::NotFound));
            assert!(!stages.contains(&Stage::ErrorHandler));
        }
    }
}
