use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn check_email(email: &str) -> Result<(), AppError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AppError::validation("Invalid email"))
    }
}

pub fn check_password(plain: &str) -> Result<(), AppError> {
    if plain.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn internal(e: password_hash::Error, what: &'static str) -> AppError {
    AppError::Internal(anyhow::anyhow!("{what}: {e}"))
}

pub fn hash_password(plain: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| internal(e, "hashing password"))
}

/// `Ok(false)` on mismatch; a stored hash that does not parse is an internal error.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored).map_err(|e| internal(e, "parsing stored hash"))?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(internal(e, "verifying password")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_hash_accepts_only_its_password() {
        let hash = hash_password("matatu-route-46").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("matatu-route-46", &hash).unwrap());
        assert!(!verify_password("matatu-route-47", &hash).unwrap());
        assert_ne!(hash, hash_password("matatu-route-46").unwrap());
    }

    #[test]
    fn corrupt_stored_hash_is_internal() {
        let err = verify_password("anything", "plaintext").unwrap_err();
        assert_eq!(err.kind(), "internal_error");
    }

    #[test]
    fn email_and_password_rules() {
        assert!(check_email("kamau@example.co.ke").is_ok());
        for bad in ["kamau@localhost", "no at sign.com", ""] {
            assert_eq!(check_email(bad).unwrap_err().kind(), "validation_error");
        }
        assert!(check_password("12345678").is_ok());
        assert!(check_password("ñandú-7").is_err());
        assert!(check_password("short").is_err());
    }
}
