//! Password hashing and reset codes

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Duration;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Shortest password accepted at registration, change or reset
pub const MIN_PASSWORD_LEN: usize = 6;

/// How long a reset code stays valid
pub fn reset_code_ttl() -> Duration {
    Duration::minutes(10)
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Hash a password into a PHC string (Argon2id, random salt)
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// A fresh six-digit reset code
pub fn generate_reset_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// Reset codes are stored only as their SHA-256 hex digest
pub fn hash_reset_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.trim().as_bytes()))
}
