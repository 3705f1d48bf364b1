//! Per-application lifecycle supervision.
//!
//! A [`Supervisor`] owns one listener. It reacts to process events:
//!
//! ```text
//! Terminate:  Listening → Closing → Closed, return (the process ends on its own)
//! Fatal:      log → Listening → Closing → Closed → "Server closed" → exit(1)
//! ```
//!
//! A panic that escapes every stage of the application is published as
//! `Fatal`. Handler panics never get that far; the stages answer them with
//! a 500.
//!
//! Supervisors never talk to each other; each reacts to the same events.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot, watch};
use tower_http::catch_panic::CatchPanicLayer;

use crate::http::HttpServer;
use crate::lifecycle::events::{panic_message, ProcessEvent, ProcessEvents};
use crate::observability::telemetry::{CrashEvent, CrashReporter, Level};

/// How long in-flight requests get to finish once closing starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit code used for every fatal condition.
pub const FATAL_EXIT_CODE: i32 = 1;

/// Terminates the process. Injected so the fatal path can be observed.
pub type ExitFn = Arc<dyn Fn(i32) + Send + Sync>;

/// The real process exit.
pub fn process_exit() -> ExitFn {
    Arc::new(|code| std::process::exit(code))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Starting,
    Listening,
    Closing,
    Closed,
}

/// Why a supervisor stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shutdown {
    /// Closed on a termination signal. Exit was not called.
    Terminated,
    /// Closed on a fatal error. Exit was called with [`FATAL_EXIT_CODE`].
    Fatal(String),
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

enum Cause {
    Event(ProcessEvent),
    ServerStopped(String),
}

pub struct Supervisor {
    name: &'static str,
    events: ProcessEvents,
    exit: ExitFn,
    reporter: CrashReporter,
    state: watch::Sender<ListenerState>,
}

impl Supervisor {
    pub fn new(name: &'static str, events: ProcessEvents, exit: ExitFn) -> Self {
        let (state, _) = watch::channel(ListenerState::Starting);
        Self {
            name,
            events,
            exit,
            reporter: CrashReporter::disabled(),
            state,
        }
    }

    /// Fatal errors are also shipped as crash events.
    pub fn with_reporter(mut self, reporter: CrashReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    pub async fn bind(&self, addr: SocketAddr) -> Result<TcpListener, SupervisorError> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| SupervisorError::Bind { addr, source })
    }

    /// Serve `router` on `listener` until a process event or a server
    /// failure ends it.
    pub async fn run(self, listener: TcpListener, router: Router) -> Shutdown {
        let mut events = self.events.subscribe();
        let (close, closed) = oneshot::channel::<()>();

        let escalate = escalate_panic(self.name, self.events.clone());
        let router = router.layer(CatchPanicLayer::custom(escalate));
        let server = HttpServer::new(self.name, router);
        let mut serving = tokio::spawn(server.run(listener, async move {
            let _ = closed.await;
        }));
        self.state.send_replace(ListenerState::Listening);

        let cause = tokio::select! {
            event = next_event(&mut events) => Cause::Event(event),
            result = &mut serving => Cause::ServerStopped(match result {
                Ok(Ok(())) => "server stopped unexpectedly".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("server task failed: {}", e),
            }),
        };

        let reason = match cause {
            Cause::Event(ProcessEvent::Terminate) => {
                tracing::info!(app = self.name, "SIGTERM received");
                None
            }
            Cause::Event(ProcessEvent::Fatal(reason)) | Cause::ServerStopped(reason) => {
                tracing::error!(app = self.name, error = %reason, "Fatal error");
                Some(reason)
            }
        };

        self.state.send_replace(ListenerState::Closing);
        let _ = close.send(());
        if !serving.is_finished() && tokio::time::timeout(DRAIN_TIMEOUT, &mut serving).await.is_err() {
            tracing::warn!(app = self.name, "Connections still open after drain timeout");
            serving.abort();
        }
        self.state.send_replace(ListenerState::Closed);
        tracing::info!(app = self.name, "Server closed");

        match reason {
            None => Shutdown::Terminated,
            Some(reason) => {
                let event = CrashEvent::new(Level::Fatal, self.name, reason.clone());
                self.reporter.capture_and_flush(event).await;
                (self.exit)(FATAL_EXIT_CODE);
                Shutdown::Fatal(reason)
            }
        }
    }
}

fn escalate_panic(
    name: &'static str,
    events: ProcessEvents,
) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone + Send + Sync + 'static {
    move |panic| {
        events.fatal(format!("{} panicked: {}", name, panic_message(panic.as_ref())));
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

async fn next_event(events: &mut broadcast::Receiver<ProcessEvent>) -> ProcessEvent {
    loop {
        match events.recv().await {
            Ok(event) => return event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Missed process events");
            }
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}
