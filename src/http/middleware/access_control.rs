//! Dashboard access control.
//! Enforces transport security and operator credentials.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::warn;

use crate::config::{DashboardConfig, DashboardUser};
use crate::http::request::{is_secure, peer_addr};
use crate::security::credentials;

pub const HTTPS_REQUIRED: &str = "Parse Dashboard can only be remotely accessed via HTTPS";
pub const AUTH_REALM: &str = "Basic realm=\"Authorization Required\"";

/// Operator that passed the credential check.
#[derive(Clone, Debug)]
pub struct OperatorContext {
    pub user: String,
}

/// Gate settings derived from the dashboard configuration.
#[derive(Clone, Debug)]
pub struct DashboardAccess {
    users: Arc<[DashboardUser]>,
    encrypted: bool,
    allow_insecure_http: bool,
    trust_proxy: u8,
}

impl DashboardAccess {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            users: config.users.clone().into(),
            encrypted: config.use_encrypted_passwords,
            allow_insecure_http: config.options.allow_insecure_http,
            trust_proxy: config.options.trust_proxy,
        }
    }
}

/// `user:password` from a Basic authorization header.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

fn unauthorized() -> Response {
    let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(AUTH_REALM));
    response
}

pub async fn access_control_middleware(
    State(access): State<DashboardAccess>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // 1. Transport: remote clients must come in over HTTPS.
    if !access.allow_insecure_http {
        let local = peer_addr(&req).map(|a| a.ip().is_loopback()).unwrap_or(false);
        if !local && !is_secure(&req, access.trust_proxy) {
            warn!(uri = %req.uri(), "Rejected insecure dashboard request");
            return (StatusCode::FORBIDDEN, HTTPS_REQUIRED).into_response();
        }
    }

    // 2. Operators. No configured users means an open dashboard.
    if access.users.is_empty() {
        return next.run(req).await;
    }

    let (user, password) = match basic_credentials(req.headers()) {
        Some(credentials) => credentials,
        None => return unauthorized(),
    };

    if !credentials::verify(&access.users, access.encrypted, &user, &password) {
        warn!(user = %user, "Dashboard login failed");
        return unauthorized();
    }

    req.extensions_mut().insert(OperatorContext { user });
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{extract::ConnectInfo, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    use super::*;
    use crate::config::DashboardOptions;

    fn config(users: Vec<DashboardUser>, allow_insecure_http: bool) -> DashboardConfig {
        DashboardConfig {
            users,
            options: DashboardOptions {
                allow_insecure_http,
                trust_proxy: 1,
            },
            ..DashboardConfig::default()
        }
    }

    fn app(config: &DashboardConfig) -> Router {
        Router::new()
            .route(
                "/",
                get(|Extension(op): Extension<OperatorContext>| async move { op.user }),
            )
            .route("/open", get(|| async { "open" }))
            .layer(middleware::from_fn_with_state(
                DashboardAccess::new(config),
                access_control_middleware,
            ))
    }

    fn request(uri: &str, peer: &str, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::get(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        request
    }

    #[tokio::test]
    async fn test_https_gate() {
        let app = app(&config(vec![], false));

        let response = app
            .clone()
            .oneshot(request("/open", "203.0.113.9:4000", &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(request("/open", "203.0.113.9:4000", &[("x-forwarded-proto", "https")]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request("/open", "127.0.0.1:4000", &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_basic_auth() {
        let users = vec![DashboardUser {
            user: "admin".to_string(),
            pass: "secret".to_string(),
        }];
        let app = app(&config(users, true));

        let response = app
            .clone()
            .oneshot(request("/", "203.0.113.9:4000", &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], AUTH_REALM);

        let good = format!("Basic {}", STANDARD.encode("admin:secret"));
        let response = app
            .clone()
            .oneshot(request("/", "203.0.113.9:4000", &[("authorization", &good)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"admin");

        let bad = format!("Basic {}", STANDARD.encode("admin:nope"));
        let response = app
            .oneshot(request("/", "203.0.113.9:4000", &[("authorization", &bad)]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
