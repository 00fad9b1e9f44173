//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or malformed input. Rejected before any write.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The owner has no active budget to project against
    #[error("No active budget found")]
    NoActiveBudget,

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// A uniqueness rule was violated (e.g. an email already registered)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Credentials or a reset code did not check out
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Email error: {0}")]
    Email(String),

    /// A money total no longer fits in a decimal
    #[error("Amount overflow: {0}")]
    Overflow(String),
}

impl Error {
    /// True for errors caused by the caller's input rather than the backend
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound(_)
                | Self::NoActiveBudget
                | Self::InvalidPeriod(_)
                | Self::Conflict(_)
                | Self::Unauthorized(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
