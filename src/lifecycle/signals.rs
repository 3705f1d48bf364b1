//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, plus Ctrl+C)
//! - Translate signals to [`ProcessEvent::Terminate`]
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A failed registration is fatal: the process could not be stopped cleanly.
//!   The forwarder runs under `spawn_supervised`, which turns its error into
//!   a `Fatal` event.

use crate::lifecycle::events::{ProcessEvent, ProcessEvents};

/// Wait for a termination signal.
pub async fn terminate_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = term.recv() => {}
            result = tokio::signal::ctrl_c() => result?,
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

/// Publish a `Terminate` event for every termination signal received.
/// Only returns when a handler cannot be installed.
pub async fn forward_signals(events: ProcessEvents) -> std::io::Result<()> {
    loop {
        terminate_signal().await.map_err(|e| {
            std::io::Error::new(e.kind(), format!("could not install signal handler: {}", e))
        })?;
        tracing::info!("Termination signal received");
        events.publish(ProcessEvent::Terminate);
    }
}
