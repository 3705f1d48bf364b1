//! Live-query websocket bridge.
//!
//! # Responsibilities
//! - Detect WebSocket upgrade requests on the API listener
//! - Complete upgrade handshake with client
//! - Establish WebSocket connection to the framework's live-query server
//! - Bidirectional frame forwarding
//! - Refuse subscriptions to classes outside the allowlist
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Gateway ←──── WebSocket frames ────→ Framework
//! ```
//!
//! # Design Decisions
//! - Frame-level forwarding (no message buffering)
//! - Close frames propagated in both directions
//! - Only `subscribe`/`update` ops are inspected; everything else passes
//! - Every relay task is supervised; a panic in one is fatal to the process

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        ws::{Message as ClientMessage, WebSocket, WebSocketUpgrade},
        FromRequestParts, State,
    },
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as UpstreamMessage};
use url::Url;

use crate::config::LiveQueryConfig;
use crate::lifecycle::events::{spawn_supervised, ProcessEvents};

/// Error code sent when a subscription targets a class that is not served.
pub const FORBIDDEN_CLASS_CODE: u16 = 119;

/// Forwards live-query sessions to the framework.
#[derive(Clone)]
pub struct LiveQueryBridge {
    upstream: Arc<Url>,
    classes: Arc<LiveQueryConfig>,
    events: ProcessEvents,
}

impl LiveQueryBridge {
    /// `baas_url` is the framework's HTTP URL; the websocket endpoint lives
    /// on the same host and path.
    pub fn new(
        baas_url: &str,
        classes: LiveQueryConfig,
        events: ProcessEvents,
    ) -> Result<Self, url::ParseError> {
        let mut upstream = Url::parse(baas_url)?;
        let scheme = if upstream.scheme() == "https" { "wss" } else { "ws" };
        // Switching between special schemes cannot fail.
        let _ = upstream.set_scheme(scheme);
        Ok(Self {
            upstream: Arc::new(upstream),
            classes: Arc::new(classes),
            events,
        })
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    /// Error frame for a client message, or `None` when it may be forwarded.
    pub fn screen(&self, text: &str) -> Option<Value> {
        let message: Value = serde_json::from_str(text).ok()?;
        let op = message.get("op").and_then(Value::as_str)?;
        if op != "subscribe" && op != "update" {
            return None;
        }

        let class_name = message
            .pointer("/query/className")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if self.classes.allows(class_name) {
            return None;
        }

        let mut error = json!({
            "op": "error",
            "code": FORBIDDEN_CLASS_CODE,
            "error": format!("Live queries are not enabled for class {:?}", class_name),
            "reconnect": false,
        });
        if let Some(id) = message.get("requestId") {
            error["requestId"] = id.clone();
        }
        Some(error)
    }

    /// Relay one upgraded client connection until either side closes.
    pub async fn relay(self, client: WebSocket) {
        let events = self.events.clone();
        let session = spawn_supervised(&events, "live-query", async move {
            self.run(client).await;
            Ok::<(), Infallible>(())
        });
        let _ = session.await;
    }

    async fn run(self, client: WebSocket) {
        let (upstream, _) = match connect_async(self.upstream.as_str()).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(upstream = %self.upstream, error = %e, "Live query upstream unreachable");
                return;
            }
        };

        let (mut client_tx, mut client_rx) = client.split();
        let (mut upstream_tx, mut upstream_rx) = upstream.split();
        let (to_client, mut outbox) = mpsc::channel::<ClientMessage>(32);

        let writer = spawn_supervised(&self.events, "live-query writer", async move {
            while let Some(message) = outbox.recv().await {
                let closing = matches!(message, ClientMessage::Close(_));
                if client_tx.send(message).await.is_err() || closing {
                    break;
                }
            }
            Ok::<(), Infallible>(())
        });

        let downstream = {
            let to_client = to_client.clone();
            spawn_supervised(&self.events, "live-query downstream", async move {
                while let Some(Ok(message)) = upstream_rx.next().await {
                    let Some(message) = from_upstream(message) else { continue };
                    let closing = matches!(message, ClientMessage::Close(_));
                    if to_client.send(message).await.is_err() || closing {
                        break;
                    }
                }
                Ok::<(), Infallible>(())
            })
        };

        while let Some(Ok(message)) = client_rx.next().await {
            if let ClientMessage::Text(text) = &message {
                if let Some(error) = self.screen(text.as_str()) {
                    tracing::info!(frame = %text.as_str(), "Refused live query subscription");
                    if to_client.send(ClientMessage::Text(error.to_string().into())).await.is_err() {
                        break;
                    }
                    continue;
                }
            }
            let closing = matches!(message, ClientMessage::Close(_));
            if upstream_tx.send(to_upstream(message)).await.is_err() || closing {
                break;
            }
        }

        let _ = upstream_tx.close().await;
        downstream.abort();
        drop(to_client);
        let _ = writer.await;
        tracing::debug!("Live query session closed");
    }
}

fn to_upstream(message: ClientMessage) -> UpstreamMessage {
    match message {
        ClientMessage::Text(text) => UpstreamMessage::text(text.as_str().to_string()),
        ClientMessage::Binary(data) => UpstreamMessage::binary(data),
        ClientMessage::Ping(data) => UpstreamMessage::Ping(data),
        ClientMessage::Pong(data) => UpstreamMessage::Pong(data),
        ClientMessage::Close(_) => UpstreamMessage::Close(None),
    }
}

fn from_upstream(message: UpstreamMessage) -> Option<ClientMessage> {
    match message {
        UpstreamMessage::Text(text) => Some(ClientMessage::Text(text.as_str().to_string().into())),
        UpstreamMessage::Binary(data) => Some(ClientMessage::Binary(data)),
        UpstreamMessage::Ping(data) => Some(ClientMessage::Ping(data)),
        UpstreamMessage::Pong(data) => Some(ClientMessage::Pong(data)),
        UpstreamMessage::Close(_) => Some(ClientMessage::Close(None)),
        UpstreamMessage::Frame(_) => None,
    }
}

fn is_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

/// Takes websocket upgrades off the listener before any stage sees them.
pub async fn live_query_upgrade(
    State(bridge): State<LiveQueryBridge>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !is_upgrade(request.headers()) {
        return next.run(request).await;
    }

    let (mut parts, _body) = request.into_parts();
    match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade.on_upgrade(move |socket| bridge.relay(socket)),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Not a live query handshake");
            rejection.into_response()
        }
    }
}
