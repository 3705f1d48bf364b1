//! Request logging.
//!
//! One line per request once the response is known. Successful responses
//! log at `info`; anything `>= 400` logs at `error` with the error message
//! when the response carries an [`HttpError`].

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::error::HttpError;
use crate::http::request::client_ip;

/// Proxy hops to trust when resolving the client address.
#[derive(Debug, Clone, Copy)]
pub struct AccessLog {
    pub app: &'static str,
    pub trust_proxy: u8,
}

pub async fn access_log(State(log): State<AccessLog>, request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let remote_addr = client_ip(&request, log.trust_proxy)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "-".to_string());
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_millis() as u64;

    if status < 400 {
        tracing::info!(
            app = log.app,
            remote_addr = %remote_addr,
            method = %method,
            uri = %uri,
            status,
            latency_ms,
            "Request completed"
        );
    } else {
        let message = response
            .extensions()
            .get::<HttpError>()
            .map(|e| e.message().to_string())
            .unwrap_or_default();
        tracing::error!(
            app = log.app,
            remote_addr = %remote_addr,
            method = %method,
            uri = %uri,
            status,
            latency_ms,
            error = %message,
            "Request failed"
        );
    }

    response
}
