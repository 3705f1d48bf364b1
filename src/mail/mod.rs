//! Mail subsystem.
//!
//! # Data Flow
//! ```text
//! framework / cloud code
//!     → adapter.rs (template lookup, locale, placeholder merge)
//!     → template.rs (localized file lookup, {{placeholder}} filling)
//!     → hooks.rs (resolve_placeholders / resolve_locale / deliver)
//!     → mailgun.rs (payload → Mailgun form, one POST)
//! ```
//!
//! # Design Decisions
//! - Template files are read at send time, never validated at startup
//! - Callback placeholders win over call placeholders, which win over template defaults
//! - One delivery attempt per mail; failures are returned, not retried

pub mod adapter;
pub mod config;
pub mod error;
pub mod hooks;
pub mod mailgun;
pub mod payload;
pub mod template;

pub use adapter::MailAdapter;
pub use config::{MailAdapterConfig, MailTemplate, MailgunConfig};
pub use error::MailError;
pub use hooks::{MailHooks, ParseUserHooks};
pub use mailgun::MailgunTransport;
pub use payload::{ApiPayload, MailUser, Placeholders, SendEmailOptions};
