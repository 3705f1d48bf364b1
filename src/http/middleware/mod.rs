//! Request middleware used by the stage lists.

pub mod access_control;
pub mod access_log;
pub mod cors;
pub mod sanitize;
pub mod telemetry;

pub use access_control::{access_control_middleware, DashboardAccess};
pub use access_log::{access_log, AccessLog};
pub use cors::{cors_layer, cors_override};
pub use sanitize::{sanitize, Sanitizer};
pub use telemetry::{error_hook, request_hook, Telemetry};
