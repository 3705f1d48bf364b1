//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, human-readable format elsewhere
//! - Log level follows the profile; `RUST_LOG` overrides it

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Profile;

/// Default filter for a profile when `RUST_LOG` is not set.
pub fn default_filter(profile: Profile) -> &'static str {
    if profile.is_production() {
        "baas_gateway=info,tower_http=info"
    } else {
        "baas_gateway=debug,tower_http=debug"
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(profile: Profile) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(profile)));

    let registry = tracing_subscriber::registry().with(filter);

    if profile.is_production() {
        registry
            .with(fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).try_init()
    }
}
