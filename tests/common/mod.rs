//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use baas_gateway::config::GatewayConfig;
use baas_gateway::http::HttpServer;

/// One request as the mock upstream saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Recorded>>>);

impl Recorder {
    pub fn requests(&self) -> Vec<Recorded> {
        self.0.lock().unwrap().clone()
    }
}

async fn record(
    State((recorder, status, reply)): State<(Recorder, StatusCode, &'static str)>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    recorder.0.lock().unwrap().push(Recorded {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });
    (status, [("content-type", "application/json")], reply).into_response()
}

/// Start a mock BaaS framework answering every request with `status` and
/// `reply`. Returns its address and what it received.
pub async fn start_mock_upstream(status: StatusCode, reply: &'static str) -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let app = Router::new()
        .fallback(record)
        .with_state((recorder.clone(), status, reply));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, recorder)
}

/// Frames a mock live-query server received, `"close"` for a close frame.
#[derive(Clone, Default)]
pub struct Frames(Arc<Mutex<Vec<String>>>);

impl Frames {
    pub fn received(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Start a mock live-query server. Every text frame is answered with
/// `echo:<frame>`; the text `bye` makes the server close the session.
pub async fn start_mock_live_query() -> (SocketAddr, Frames) {
    let frames = Frames::default();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = frames.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen = seen.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else { return };
                while let Some(Ok(message)) = ws.next().await {
                    match message {
                        Message::Text(text) if text.as_str() == "bye" => {
                            seen.0.lock().unwrap().push(text.as_str().to_string());
                            let _ = ws.send(Message::Close(None)).await;
                            break;
                        }
                        Message::Text(text) => {
                            seen.0.lock().unwrap().push(text.as_str().to_string());
                            let reply = format!("echo:{}", text.as_str());
                            if ws.send(Message::text(reply)).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => {
                            seen.0.lock().unwrap().push("close".to_string());
                            break;
                        }
                        _ => {}
                    }
                }
            });
        }
    });
    (addr, frames)
}

/// Serve `router` on an ephemeral port until the test ends.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(HttpServer::new("test", router).run(listener, std::future::pending()));
    addr
}

/// Configuration from explicit variables only.
pub fn config(vars: &[(&str, &str)]) -> GatewayConfig {
    GatewayConfig::from_vars(
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<Vec<_>>(),
    )
    .unwrap()
}

/// HTTP client that never goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
