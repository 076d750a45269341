//! Error taxonomy shared across Careloop crates.

use thiserror::Error;

/// Careloop error type.
#[derive(Debug, Error)]
pub enum CareloopError {
    /// Configuration is missing or malformed.
    #[error("Config error: {0}")]
    Config(String),

    /// Document store failure (connectivity, query, decode).
    #[error("Store error: {0}")]
    Store(String),

    /// SMTP transport failure.
    #[error("Mail error: {0}")]
    Mail(String),

    /// Calendar provider failure (auth or event insert).
    #[error("Calendar error: {0}")]
    Calendar(String),

    /// Messaging channel failure.
    #[error("Channel error: {0}")]
    Channel(String),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, CareloopError>;
