//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Both applications produce:
//!     → logging.rs (structured log events, access logs)
//!     → metrics.rs (counters, histograms)
//!     → telemetry/ (crash events for 5xx and fatal conditions)
//!
//! Consumers:
//!     → Log aggregation (stderr)
//!     → Metrics endpoint (Prometheus scrape, optional)
//!     → Crash telemetry endpoint (production only)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through logs, spans and crash events
//! - Metrics are cheap (atomic increments)
//! - Crash delivery never blocks a request

pub mod logging;
pub mod metrics;
pub mod telemetry;
