//! BaaS framework mount.
//!
//! The framework runs as its own process; everything under the API mount is
//! forwarded to it. Account writes carrying a password are checked against
//! the password policy before they leave the gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        uri::{Authority, PathAndQuery, Scheme},
        Method, Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::http::error::HttpError;
use crate::http::request::{RequestId, X_FORWARDED_FOR, X_FORWARDED_PROTO, X_REQUEST_ID};
use crate::security::password_policy::{PasswordPolicy, VALIDATION_ERROR_CODE};

const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Headers that describe one hop and are not forwarded.
static HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Where and how requests are forwarded.
#[derive(Clone)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    authority: Authority,
    base_path: String,
    policy: Arc<PasswordPolicy>,
    max_body_size: usize,
}

impl Upstream {
    /// `base_url` must be a plain `http://` URL; its path is prefixed to every
    /// forwarded request.
    pub fn new(base_url: &str, policy: PasswordPolicy, max_body_size: usize) -> Result<Self, UpstreamError> {
        let invalid = |reason: &str| UpstreamError::InvalidUrl {
            url: base_url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = base_url.parse().map_err(|_| invalid("not a URI"))?;
        if uri.scheme() != Some(&Scheme::HTTP) {
            return Err(invalid("only http:// upstreams are supported"));
        }
        let authority = uri.authority().cloned().ok_or_else(|| invalid("missing host"))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            authority,
            base_path: uri.path().trim_end_matches('/').to_string(),
            policy: Arc::new(policy),
            max_body_size,
        })
    }

    fn target(&self, uri: &Uri) -> Result<Uri, HttpError> {
        let path = match uri.query() {
            Some(query) => format!("{}{}?{}", self.base_path, uri.path(), query),
            None => format!("{}{}", self.base_path, uri.path()),
        };
        let path_and_query = PathAndQuery::try_from(path)
            .map_err(|e| HttpError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| HttpError::internal(e.to_string()))
    }
}

/// Router forwarding every path to the upstream framework.
pub fn router(upstream: Upstream) -> Router {
    Router::new()
        .route("/", any(proxy_handler))
        .route("/{*path}", any(proxy_handler))
        .with_state(upstream)
}

/// Whether a request creates or updates a user account.
fn is_account_write(method: &Method, path: &str) -> bool {
    let path = path.trim_end_matches('/');
    match *method {
        Method::POST => path == "/users",
        Method::PUT => path
            .strip_prefix("/users/")
            .map(|id| !id.is_empty() && !id.contains('/'))
            .unwrap_or(false),
        _ => false,
    }
}

/// Policy violation in the framework's own error shape.
fn policy_rejection(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"code": VALIDATION_ERROR_CODE, "error": message})),
    )
        .into_response()
}

fn forwarded_headers(source: &HeaderMap, client: Option<SocketAddr>, request_id: &RequestId) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len() + 4);
    for (name, value) in source.iter() {
        if HOP_BY_HOP.contains(name) || name == header::HOST {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Some(host) = source.get(header::HOST) {
        headers.insert(X_FORWARDED_HOST, host.clone());
    }
    if let Some(client) = client {
        let chain = match source.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{}, {}", prior, client.ip()),
            None => client.ip().to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
    if !headers.contains_key(X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        headers.insert(X_REQUEST_ID, value);
    }
    headers
}

/// Main forwarding handler.
/// Checks account writes, rewrites the URI and streams the exchange.
async fn proxy_handler(State(upstream): State<Upstream>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| RequestId::from_headers(request.headers()));
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (parts, body) = request.into_parts();

    tracing::debug!(
        request_id = %request_id.as_str(),
        method = %parts.method,
        path = %parts.uri.path(),
        "Forwarding request"
    );

    // 1. Password policy on account writes
    let body = if is_account_write(&parts.method, parts.uri.path()) {
        let bytes = match axum::body::to_bytes(body, upstream.max_body_size).await {
            Ok(bytes) => bytes,
            Err(_) => return HttpError::from_status(StatusCode::PAYLOAD_TOO_LARGE).into_response(),
        };
        let password = serde_json::from_slice::<Value>(&bytes)
            .ok()
            .and_then(|v| v.get("password").and_then(Value::as_str).map(str::to_string));
        if let Some(password) = password {
            if let Err(violation) = upstream.policy.validate(&password) {
                tracing::info!(request_id = %request_id.as_str(), "Password rejected by policy");
                return policy_rejection(&violation.message);
            }
        }
        Body::from(bytes)
    } else {
        body
    };

    // 2. Rewrite
    let uri = match upstream.target(&parts.uri) {
        Ok(uri) => uri,
        Err(e) => return e.into_response(),
    };
    let mut outbound = Request::new(body);
    *outbound.method_mut() = parts.method.clone();
    *outbound.uri_mut() = uri;
    *outbound.headers_mut() = forwarded_headers(&parts.headers, client, &request_id);

    // 3. Forward
    match upstream.client.request(outbound).await {
        Ok(response) => {
            tracing::debug!(
                request_id = %request_id.as_str(),
                status = response.status().as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Upstream responded"
            );
            let (mut parts, body) = response.into_parts();
            for name in HOP_BY_HOP.iter() {
                parts.headers.remove(name);
            }
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id.as_str(), error = %e, "Upstream error");
            HttpError::new(StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
