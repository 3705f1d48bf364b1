//! Password policy enforcement.
//!
//! The configured policy is a five digit PIN: no leading zero and not all
//! digits equal. The framework pattern uses a back-reference, which the
//! `regex` crate does not support, so the repetition rule is checked
//! separately from the shape.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::config::schema::PasswordPolicyConfig;

/// Framework error code for failed validation.
pub const VALIDATION_ERROR_CODE: u16 = 142;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct PolicyViolation {
    pub message: String,
}

fn pin_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^[1-9][0-9]{4}$").expect("static pattern is valid"))
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    validation_error: String,
}

impl PasswordPolicy {
    pub fn new(config: &PasswordPolicyConfig) -> Self {
        Self {
            validation_error: config.validation_error.clone(),
        }
    }

    /// Whether `password` satisfies the policy.
    pub fn accepts(password: &str) -> bool {
        if !pin_shape().is_match(password) {
            return false;
        }
        let first = password.as_bytes()[0];
        !password.bytes().all(|b| b == first)
    }

    pub fn validate(&self, password: &str) -> Result<(), PolicyViolation> {
        if Self::accepts(password) {
            Ok(())
        } else {
            Err(PolicyViolation {
                message: self.validation_error.clone(),
            })
        }
    }
}
