//! Application-level error type.
//!
//! Wraps the weather layer's typed failures together with storage and
//! configuration problems, and maps each to text fit for an error banner.

use nimbus_weather::{ApiError, StoreError, GENERIC_FAILURE};
use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Weather service error: {0}")]
    Weather(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Weather(e) => e.user_message(),
            AppError::Config(_) => "Invalid configuration. Check your settings.".to_string(),
            AppError::Storage(_) | AppError::Io(_) | AppError::Other(_) => {
                GENERIC_FAILURE.to_string()
            }
        }
    }
}
