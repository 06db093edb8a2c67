use reqwest::StatusCode;
use thiserror::Error;

/// Error taxonomy for every operation against the search service
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced collection, alias or document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A collection with the requested name already exists
    #[error("Name conflict: {0}")]
    NameConflict(String),

    /// The service rejected a document or request body
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed builder input, rejected before any network call
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Network or service failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Operation timed out at the transport layer
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map a non-success service response onto the taxonomy
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = service_message(body);
        match status {
            StatusCode::NOT_FOUND => Error::NotFound(message),
            StatusCode::CONFLICT => Error::NameConflict(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Error::Validation(message)
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Error::Timeout(message),
            _ => Error::Transport(format!("service returned {}: {}", status, message)),
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            Error::NotFound(_) => "NOT_FOUND",
            Error::NameConflict(_) => "NAME_CONFLICT",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::InvalidArgument(_) => "INVALID_ARGUMENT",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::Timeout(_) => "TIMEOUT",
            Error::Configuration(_) => "CONFIGURATION_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_name_conflict(&self) -> bool {
        matches!(self, Error::NameConflict(_))
    }
}

/// The service answers errors as `{"message": "..."}`; fall back to the raw body.
fn service_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "No response body".to_string()
            } else {
                body.to_string()
            }
        })
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else if err.is_connect() {
            Error::Transport(format!("Failed to connect to search service: {}", err))
        } else {
            Error::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
