//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → telemetry, metrics, mail → both routers → bind → supervisors
//!
//! Events (events.rs):
//!     Supervised task error/panic → ProcessEvent::Fatal
//!
//! Signals (signals.rs):
//!     SIGTERM/Ctrl+C → ProcessEvent::Terminate
//!
//! Supervision (supervisor.rs):
//!     Terminate → graceful close, no exit
//!     Fatal     → graceful close → exit(1)
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - Drain has a timeout so a stuck connection cannot hold the exit

pub mod events;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use events::{install_panic_hook, spawn_supervised, ProcessEvent, ProcessEvents};
pub use supervisor::{process_exit, ListenerState, Shutdown, Supervisor};
