//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! NODE_ENV
//!     → profile.rs (production / development / test, env file choice)
//!     → loader.rs (env file + process env → typed config, defaults applied)
//!     → validation.rs (semantic checks, reported as warnings)
//!     → GatewayConfig (immutable)
//!     → shared via Arc with both applications
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; handlers never touch the environment
//! - Every value has a development default; nothing is fatal at this layer
//! - Framework option structs serialize to the shapes the frameworks accept

pub mod loader;
pub mod profile;
pub mod schema;
pub mod validation;

pub use loader::{load_env_file, ConfigError, EnvFile};
pub use profile::Profile;
pub use schema::{
    DashboardConfig, DashboardMiddleware, DashboardOptions, DashboardUser, GatewayConfig,
    LiveQueryConfig, ServerConfig,
};
