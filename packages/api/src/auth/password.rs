//! # Password hashing and verification — Argon2id
//!
//! Used by [`super::LocalIdentity`] to keep registered passwords out of memory
//! in plaintext:
//!
//! - [`hash_password`] — generates a random salt via [`OsRng`], hashes the plaintext
//!   password with the default Argon2id parameters, and returns the result as a
//!   PHC-format string (e.g. `$argon2id$v=19$m=19456,t=2,p=1$...`).
//!
//! - [`verify_password`] — parses a PHC-format hash and checks whether the provided
//!   plaintext matches. Returns `Ok(true)` on success, `Ok(false)` on mismatch, or
//!   `Err` if the stored hash is malformed.
//!
//! Vault secrets are **not** passed through here; they are stored as entered.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use store::AuthError;

/// Hash a password using Argon2id. Returns a PHC-format string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Unavailable(format!("failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a password against a PHC-format hash string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::Unavailable(format!("invalid password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
