//! Cross-origin headers.
//!
//! The API app runs two CORS stages: the permissive [`cors_layer`] that
//! answers preflight requests, and [`cors_override`] which stamps a fixed
//! header set on every response routed past it. Both are kept; the override
//! wins where they disagree.

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowHeaders, Any, CorsLayer};

pub const OVERRIDE_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const OVERRIDE_ALLOW_HEADERS: &str =
    "Origin, X-Requested-With, Content-Type, Accept, X-Parse-Session-Token";

/// Permissive CORS: any origin, the common verbs, whatever headers the
/// preflight asks for.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::mirror_request())
}

/// Fixed CORS headers for everything routed past this stage.
pub async fn cors_override(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(OVERRIDE_ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(OVERRIDE_ALLOW_HEADERS),
    );
    response
}
