//! Process-wide lifecycle events.

use std::future::Future;
use std::panic;

use futures_util::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Something every supervisor must react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// The process was asked to terminate.
    Terminate,
    /// An error nobody handled; the process must restart.
    Fatal(String),
}

/// Broadcast channel all supervisors subscribe to.
#[derive(Clone)]
pub struct ProcessEvents {
    tx: broadcast::Sender<ProcessEvent>,
}

impl ProcessEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProcessEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ProcessEvent) {
        let _ = self.tx.send(event);
    }

    pub fn terminate(&self) {
        self.publish(ProcessEvent::Terminate);
    }

    pub fn fatal(&self, reason: impl Into<String>) {
        self.publish(ProcessEvent::Fatal(reason.into()));
    }

    /// Number of subscribed supervisors.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ProcessEvents {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

/// Run a background task whose failure is fatal to the process: an error
/// or a panic is published as [`ProcessEvent::Fatal`].
pub fn spawn_supervised<F, E>(events: &ProcessEvents, name: &'static str, task: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let events = events.clone();
    tokio::spawn(async move {
        match panic::AssertUnwindSafe(task).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => events.fatal(format!("{}: {}", name, e)),
            Err(payload) => events.fatal(format!("{} panicked: {}", name, panic_message(payload.as_ref()))),
        }
    })
}

/// Route panic reports through `tracing` instead of stderr.
pub fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        tracing::error!(
            panic = %panic_message(info.payload()),
            location = %location,
            "Panic"
        );
    }));
}
