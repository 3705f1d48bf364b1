//! BaaS gateway library: the API and dashboard applications, their
//! configuration and their lifecycle.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod mail;
pub mod observability;
pub mod security;

pub use config::schema::GatewayConfig;
pub use http::{ApiApp, DashboardApp, HttpServer};
pub use lifecycle::{ProcessEvents, Supervisor};
