//! Common error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid device ID '{input}': {reason}")]
    InvalidDeviceId { input: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
