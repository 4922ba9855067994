//! Unified error handling module
use thiserror::Error;

/// Errors produced while loading an APOD record
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("External API error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {status}: {url}")]
    Http { status: u16, url: String },

    #[error("Failed to parse APOD response: {0}")]
    Parse(String),

    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    Format(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(String),
}

/// Coarse error taxonomy used for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Parse,
    Format,
    Cancelled,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Parse => "parse",
            ErrorKind::Format => "format",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
        }
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Transport(_) | ApiError::Network(_) | ApiError::Http { .. } => {
                ErrorKind::Network
            }
            ApiError::Parse(_) => ErrorKind::Parse,
            ApiError::Format(_) => ErrorKind::Format,
            ApiError::Cancelled => ErrorKind::Cancelled,
            ApiError::Config(_) => ErrorKind::Config,
        }
    }

    /// Upstream HTTP status, if the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Short message suitable for showing next to stale data.
    ///
    /// The full error goes to the log; this never includes URLs or
    /// transport internals.
    pub fn user_message(&self) -> String {
        if let Some(status) = self.status() {
            let msg = match status {
                403 => "API key rejected by NASA",
                404 => "No picture published for this date",
                429 => "Rate limit reached, try again later",
                500..=599 => "NASA service unavailable",
                _ => "Load data failed",
            };
            return msg.to_string();
        }

        match self.kind() {
            ErrorKind::Network => "Load data failed, check your connection".to_string(),
            ErrorKind::Parse => "Unexpected response from NASA".to_string(),
            ErrorKind::Format => "Response contained an invalid date".to_string(),
            ErrorKind::Cancelled => "Request cancelled".to_string(),
            ErrorKind::Config => "Client is misconfigured".to_string(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Parse(err.to_string())
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
