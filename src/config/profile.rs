//! Runtime profile selection.
//!
//! The profile decides which env file is loaded and which middleware stages
//! are installed (telemetry only in production, request logging and the
//! framework mounts everywhere except under test).

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Environment variable holding the profile name.
pub const PROFILE_VAR: &str = "NODE_ENV";

/// Deployment profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Production,
    #[default]
    Development,
    Test,
}

impl Profile {
    /// Parse a profile name. Anything unknown is development.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("production") => Profile::Production,
            Some("test") => Profile::Test,
            _ => Profile::Development,
        }
    }

    /// Read the profile from the process environment.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(PROFILE_VAR).ok().as_deref())
    }

    /// Env file loaded for this profile.
    pub fn env_file(&self) -> PathBuf {
        match self {
            Profile::Production => PathBuf::from(".prod.env"),
            _ => PathBuf::from(".env"),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Profile::Production)
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Profile::Test)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Profile::Production => "production",
            Profile::Development => "development",
            Profile::Test => "test",
        };
        f.write_str(name)
    }
}
