//! Password hashing and verification using Argon2id.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;

/// Password hashing and verification errors.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),
}

/// Hash a plaintext password using Argon2id with the library defaults
/// (OWASP-recommended parameters). The PHC string carries the salt, so the
/// result can be stored as-is.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC-format hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("s3cret-Pass!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3cret-Pass!", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn same_password_different_salts() {
        let a = hash_password("repeatable").unwrap();
        let b = hash_password("repeatable").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("repeatable", &a).unwrap());
        assert!(verify_password("repeatable", &b).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("x", "not-a-phc-string"),
            Err(PasswordError::InvalidHashFormat)
        ));
    }
}
