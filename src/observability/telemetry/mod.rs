//! Crash telemetry.
//!
//! Errors observed by the error hook (5xx responses) and fatal process
//! conditions are shipped as events to the endpoint named by `SENTRY_DSN`.
//! Only the production profile installs the request and error hooks.

pub mod dsn;
pub mod reporter;

pub use dsn::{Dsn, DsnError};
pub use reporter::{CrashEvent, CrashReporter, Level};
