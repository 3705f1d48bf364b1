//! Dashboard operator credential checks.

use argon2::password_hash::{Error as PasswordHashError, PasswordHash, PasswordVerifier};
use argon2::Argon2;
use subtle::ConstantTimeEq;

use crate::config::DashboardUser;

/// Check `user`/`password` against the configured operators. With
/// `encrypted` set, stored passwords are argon2 PHC strings.
pub fn verify(users: &[DashboardUser], encrypted: bool, user: &str, password: &str) -> bool {
    users
        .iter()
        .filter(|u| u.user == user)
        .any(|u| {
            if encrypted {
                verify_hash(&u.pass, password)
            } else {
                secret_eq(password, &u.pass)
            }
        })
}

fn verify_hash(expected_hash: &str, candidate: &str) -> bool {
    let parsed = match PasswordHash::new(expected_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!(error = %e, "Stored dashboard password is not a valid hash");
            return false;
        }
    };
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => true,
        Err(PasswordHashError::Password) => false,
        Err(e) => {
            tracing::error!(error = %e, "Dashboard password verification failed");
            false
        }
    }
}

/// Constant-time comparison of a presented secret with the expected one.
/// A length mismatch still runs one comparison over `expected`.
pub fn secret_eq(presented: &str, expected: &str) -> bool {
    let presented = presented.as_bytes();
    let expected = expected.as_bytes();
    if presented.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    presented.ct_eq(expected).into()
}

#[cfg(test)]
mod tests {
    use argon2::password_hash::{PasswordHasher, SaltString};

    use super::*;

    fn user(name: &str, pass: &str) -> DashboardUser {
        DashboardUser {
            user: name.to_string(),
            pass: pass.to_string(),
        }
    }

    #[test]
    fn test_plaintext_credentials() {
        let users = vec![user("admin", "secret")];
        assert!(verify(&users, false, "admin", "secret"));
        assert!(!verify(&users, false, "admin", "secrets"));
        assert!(!verify(&users, false, "root", "secret"));
    }

    #[test]
    fn test_secret_eq() {
        assert!(secret_eq("s3cret", "s3cret"));
        assert!(!secret_eq("s3creT", "s3cret"));
        assert!(!secret_eq("s3cret-and-more", "s3cret"));
        assert!(!secret_eq("", "s3cret"));
    }

    #[test]
    fn test_hashed_credentials() {
        let salt = SaltString::from_b64("c29tZXNhbHR2YWx1ZQ").unwrap();
        let hash = Argon2::default()
            .hash_password(b"secret", &salt)
            .unwrap()
            .to_string();
        let users = vec![user("admin", &hash)];

        assert!(verify(&users, true, "admin", "secret"));
        assert!(!verify(&users, true, "admin", "wrong"));
        // A plaintext entry never matches in encrypted mode.
        assert!(!verify(&[user("admin", "secret")], true, "admin", "secret"));
    }
}
