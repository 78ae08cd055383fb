//! Error types for the GEE analysis client.

use thiserror::Error;

use crate::guard::OperationKind;

/// Result type alias using ClientError.
pub type ApiResult<T> = Result<T, ClientError>;

/// Fallback message when neither the backend nor the transport says anything useful.
pub const GENERIC_NETWORK_ERROR: &str = "Network error";

/// Primary error type for client operations.
///
/// `Display` always yields a human-readable string suitable for an alert.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    // === Transport Errors ===
    /// Non-2xx response. `message` is already resolved from the body or status text.
    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Network(String),

    #[error("Invalid response from backend: {0}")]
    Decode(String),

    // === Orchestration Errors ===
    #[error("{0}")]
    Precondition(String),

    #[error("{} is already running", .0.label())]
    Busy(OperationKind),

    #[error("Display error: {0}")]
    Ui(String),
}

/// Alert severity shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Danger,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }
}

impl ClientError {
    /// Build an HTTP error, resolving the message from the response body first,
    /// then the status text, then the generic fallback.
    pub fn from_response(status: u16, status_text: Option<&str>, body: &str) -> Self {
        let from_body = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .filter(|s| !s.is_empty());

        let message = from_body
            .or_else(|| {
                status_text
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| GENERIC_NETWORK_ERROR.to_string());

        ClientError::Http { status, message }
    }

    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Timeout(_) | ClientError::Network(_) => true,
            ClientError::Http { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }

    /// Alert severity for this failure.
    pub fn severity(&self) -> Severity {
        match self {
            ClientError::Precondition(_) | ClientError::Busy(_) => Severity::Warning,
            _ => Severity::Danger,
        }
    }

    /// HTTP status code, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ClientError::Decode(err.to_string());
        }
        let text = err.to_string();
        if text.is_empty() {
            ClientError::Network(GENERIC_NETWORK_ERROR.to_string())
        } else {
            ClientError::Network(text)
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}
