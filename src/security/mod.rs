//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Account writes forwarded to the BaaS mount:
//!     → password_policy.rs (reject passwords outside the policy)
//! Dashboard requests:
//!     → credentials.rs (operator basic auth, plaintext or argon2)
//! ```
//!
//! # Design Decisions
//! - Fail closed: malformed stored hashes never authenticate
//! - Policy messages come from configuration

pub mod credentials;
pub mod password_policy;

pub use password_policy::{PasswordPolicy, PolicyViolation};
