//! Telemetry hooks.
//!
//! [`request_hook`] is the first stage of a production app: it stamps a
//! request ID, opens a tracing span and records request metrics.
//! [`error_hook`] sits just outside the route stages and reports server
//! errors as crash events before the error handler serializes them.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::http::error::HttpError;
use crate::http::request::{RequestContext, RequestId, X_REQUEST_ID};
use crate::observability::metrics;
use crate::observability::telemetry::{CrashEvent, CrashReporter, Level};

/// Which app a hook reports for, and where crash events go.
#[derive(Clone)]
pub struct Telemetry {
    pub app: &'static str,
    pub reporter: CrashReporter,
}

pub async fn request_hook(State(telemetry): State<Telemetry>, mut request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let request_id = RequestId::from_headers(request.headers());
    request.extensions_mut().insert(request_id.clone());

    let method = request.method().to_string();
    let span = tracing::info_span!(
        "http.request",
        app = telemetry.app,
        request_id = %request_id.as_str(),
        method = %method,
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;

    metrics::record_request(telemetry.app, &method, response.status().as_u16(), start);
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

pub async fn error_hook(State(telemetry): State<Telemetry>, request: Request<Body>, next: Next) -> Response {
    let context = RequestContext::from_request(&request);
    let response = next.run(request).await;

    if let Some(error) = response.extensions().get::<HttpError>() {
        if error.status().is_server_error() {
            metrics::record_error(telemetry.app, error.status().as_u16());
            let event = CrashEvent::new(Level::Error, telemetry.app, error.message())
                .with_request(&context.method, &context.url)
                .with_tag("request_id", context.request_id.as_str())
                .with_tag("status", error.status().as_str());
            telemetry.reporter.capture(event);
        }
    }

    response
}
