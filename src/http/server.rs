//! HTTP server setup.
//!
//! # Responsibilities
//! - Bind an application router to its listener
//! - Record peer addresses for client IP resolution
//! - Stop accepting and drain in-flight requests on shutdown

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

/// One application served on one listener.
pub struct HttpServer {
    name: &'static str,
    router: Router,
}

impl HttpServer {
    pub fn new(name: &'static str, router: Router) -> Self {
        Self { name, router }
    }

    /// Serve until `shutdown` resolves, then let in-flight requests finish.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(app = self.name, address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!(app = self.name, "HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::get;
    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route("/", get(|| async { "up" }));
        let (stop, stopped) = oneshot::channel::<()>();

        let server = tokio::spawn(HttpServer::new("test", router).run(listener, async {
            let _ = stopped.await;
        }));

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let body = client
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "up");

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
