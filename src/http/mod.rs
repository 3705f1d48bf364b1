//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, peer address, graceful drain)
//!     → websocket.rs (live-query upgrades, API listener only)
//!     → stages.rs (ordered middleware built by api.rs / dashboard.rs)
//!     → middleware/ (telemetry, access log, sanitize, CORS, access gate)
//!     → upstream.rs / hooks.rs / dashboard mount
//!     → error.rs (HttpError → JSON, API only)
//!     → Send to client
//! ```

pub mod api;
pub mod dashboard;
pub mod error;
pub mod hooks;
pub mod middleware;
pub mod request;
pub mod server;
pub mod stages;
pub mod upstream;
pub mod websocket;

pub use api::ApiApp;
pub use dashboard::DashboardApp;
pub use error::HttpError;
pub use request::{RequestId, X_REQUEST_ID};
pub use server::HttpServer;
pub use stages::Stage;
