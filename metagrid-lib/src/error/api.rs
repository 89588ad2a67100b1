//! API error types

use std::time::Duration;

/// Errors that can occur during API calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// Structured error response from the server.
    #[error("HTTP {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
        /// Per-field validation messages reported by the server.
        field_errors: Vec<String>,
    },

    /// HTTP 429.
    #[error("Rate limited")]
    RateLimited,

    /// HTTP 401. `expired` is set when the challenge header marks the session as expired.
    #[error("Unauthorized (expired: {expired})")]
    Unauthorized { expired: bool },

    /// No response reached us.
    #[error("Network error: {0}")]
    Network(String),

    /// Request timed out.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse API response.
    #[error("Response parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Raw response body, if available.
        body: Option<String>,
    },

    /// Token provider could not supply a token.
    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl ApiError {
    /// Creates a new server error.
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
            field_errors: Vec::new(),
        }
    }

    /// Creates a new parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: None,
        }
    }

    /// Creates a new parse error with the raw response body.
    pub fn parse_with_body(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: Some(body.into()),
        }
    }

    /// Returns the HTTP status code if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::RateLimited => Some(429),
            Self::Unauthorized { .. } => Some(401),
            _ => None,
        }
    }

    /// Returns `true` if no response reached the client.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// Returns `true` if the user must sign in again.
    pub fn requires_logout(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// The text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Server {
                message,
                field_errors,
                ..
            } => {
                if field_errors.is_empty() {
                    message.clone()
                } else {
                    format!("{}\n{}", message, field_errors.join("\n"))
                }
            }
            Self::RateLimited => {
                "Too many requests in a short time. Please try again a bit later.".to_string()
            }
            Self::Unauthorized { expired: true } => "Session expired - please login again".to_string(),
            Self::Unauthorized { expired: false } => "Unauthorized".to_string(),
            Self::Network(_) | Self::Timeout(_) => "No response from server".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
