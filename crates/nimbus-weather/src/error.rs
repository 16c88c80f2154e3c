//! Typed failures returned by the API client.

use serde_json::Value;
use thiserror::Error;

/// Generic message used when neither the body nor the status has one.
pub const REQUEST_FAILED: &str = "Request failed";

/// Banner text for failures with no more specific explanation.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Failure classification used by callers to pick display text and by the
/// client to decide whether stale data may be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 4xx: the caller must fix the input. Never served from cache.
    Client,
    /// 5xx: transient upstream failure.
    Server,
    /// Transport failure, malformed response, or unclassified status.
    Network,
    /// A response that arrived intact but did not have the expected shape.
    Unexpected,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400..=499 => Self::Client,
            500..=u16::MAX => Self::Server,
            _ => Self::Network,
        }
    }

    /// Whether the persisted fallback may be consulted for this failure.
    pub fn allows_fallback(self) -> bool {
        matches!(self, Self::Server | Self::Network)
    }
}

/// Whatever accompanied the failure.
#[derive(Debug)]
pub enum ErrorPayload {
    Empty,
    /// Error body that parsed as JSON.
    Json(Value),
    /// Error body that was not JSON.
    Text(String),
    /// The underlying transport or decode error.
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

impl ErrorPayload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("{message} (status {status})")]
pub struct ApiError {
    pub kind: ErrorKind,
    /// HTTP status, or 0 when no response was received.
    pub status: u16,
    pub message: String,
    pub payload: ErrorPayload,
}

impl ApiError {
    /// Build an error from a received non-success status.
    pub fn from_status(status: u16, message: impl Into<String>, payload: ErrorPayload) -> Self {
        Self {
            kind: ErrorKind::from_status(status),
            status,
            message: message.into(),
            payload,
        }
    }

    /// Build a status-0 error wrapping a transport failure.
    pub fn network<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: ErrorKind::Network,
            status: 0,
            message: message.into(),
            payload: ErrorPayload::Transport(Box::new(source)),
        }
    }

    /// Build a status-0 error for a response body of the wrong shape.
    pub fn unexpected<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: ErrorKind::Unexpected,
            ..Self::network(message, source)
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// User-facing text for an inline error banner.
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Client if self.message.trim().is_empty() => {
                "Invalid request. Please check the city name.".to_string()
            }
            ErrorKind::Client => self.message.clone(),
            ErrorKind::Server => {
                "The weather service is currently unavailable. Please try again later.".to_string()
            }
            ErrorKind::Network => {
                "Network error. Please check your internet connection and try again.".to_string()
            }
            ErrorKind::Unexpected => GENERIC_FAILURE.to_string(),
        }
    }
}
