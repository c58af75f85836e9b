//! Error taxonomy for geocoding operations.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Coarse discriminator callers branch on instead of matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    InvalidInput,
    Unauthorized,
    RateLimited,
    NotFound,
    Upstream,
    Network,
    MalformedResponse,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configuration => "configuration",
            Self::InvalidInput => "invalid_input",
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::Upstream => "upstream",
            Self::Network => "network",
            Self::MalformedResponse => "malformed_response",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Geocoding errors.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Missing API key or unusable client settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Rejected before any request was sent.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider rejected the API key (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Provider rate limit exceeded (HTTP {status})")]
    RateLimited { status: u16 },

    /// HTTP 404, or an empty candidate list.
    #[error("Location not found: '{query}'")]
    NotFound { query: String, status: Option<u16> },

    #[error("Provider returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    /// DNS, connection or timeout failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Undecodable body, or coordinates that fail parse or range checks.
    #[error("Invalid API response: {0}")]
    MalformedResponse(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl GeocodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Network(_) => ErrorKind::Network,
            Self::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// HTTP status from the provider, when the failure came with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status }
            | Self::RateLimited { status }
            | Self::Upstream { status, .. } => Some(*status),
            Self::NotFound { status, .. } => *status,
            _ => None,
        }
    }

    /// Map a non-2xx provider status to its error.
    pub(crate) fn from_status(status: u16, query: &str, body: &str) -> Self {
        match status {
            401 => Self::Unauthorized { status },
            429 => Self::RateLimited { status },
            404 => Self::NotFound {
                query: query.to_string(),
                status: Some(status),
            },
            _ => Self::Upstream {
                status,
                message: upstream_message(body),
            },
        }
    }
}

/// Pull `{"error": "..."}` out of a provider body, else a truncated excerpt.
fn upstream_message(body: &str) -> String {
    if let Ok(val) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = val.get("error").and_then(|v| v.as_str()) {
            return msg.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".into();
    }
    trimmed.chars().take(200).collect()
}
