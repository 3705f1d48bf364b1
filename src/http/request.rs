//! Per-request context.
//!
//! # Responsibilities
//! - Generate or adopt a request ID (UUID v4)
//! - Resolve the client address, honouring trusted forwarding headers
//! - Carry method and URL for logs and crash events

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::ConnectInfo,
    http::{HeaderMap, Request},
};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Unique ID attached to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Adopt a client supplied ID or mint a new one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty() && v.len() <= 128)
            .map(|v| Self(v.to_string()))
            .unwrap_or_else(|| Self(Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What the logs and telemetry know about a request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: String,
    pub url: String,
}

impl RequestContext {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| RequestId::from_headers(request.headers()));
        Self {
            request_id,
            method: request.method().to_string(),
            url: request.uri().to_string(),
        }
    }
}

/// Peer address of the connection, if the server recorded it.
pub fn peer_addr<B>(request: &Request<B>) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Client address: the peer, or the address `trust_proxy` hops back in
/// `X-Forwarded-For` when forwarding headers are trusted.
pub fn client_ip<B>(request: &Request<B>, trust_proxy: u8) -> Option<IpAddr> {
    let peer = peer_addr(request).map(|a| a.ip());
    if trust_proxy == 0 {
        return peer;
    }

    let forwarded: Vec<IpAddr> = request
        .headers()
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|part| part.trim().parse().ok())
        .collect();

    let hops = trust_proxy as usize;
    if forwarded.is_empty() {
        return peer;
    }
    let index = forwarded.len().saturating_sub(hops);
    forwarded.get(index).copied().or(peer)
}

/// Whether the client connected over TLS, as reported by a trusted proxy.
pub fn is_secure<B>(request: &Request<B>, trust_proxy: u8) -> bool {
    if request.uri().scheme_str() == Some("https") {
        return true;
    }
    trust_proxy > 0
        && request
            .headers()
            .get(X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().eq_ignore_ascii_case("https"))
            .unwrap_or(false)
}
