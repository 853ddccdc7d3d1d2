//! Error taxonomy shared by every gateway operation.
//!
//! Each failure carries a stable [`ErrorKind`] plus a human-readable message.
//! Nothing opaque is allowed to cross the gateway boundary: remote failures keep
//! the platform's message, validation failures say which input was wrong.

use serde::Serialize;

/// Stable error classification, serialized verbatim (e.g. `"UpstreamError"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    MissingDependency,
    UpstreamError,
    PartialFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::MissingDependency => "MissingDependency",
            ErrorKind::UpstreamError => "UpstreamError",
            ErrorKind::PartialFailure => "PartialFailure",
        };
        f.write_str(name)
    }
}

/// Errors returned by the gateway core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// Malformed or missing input, detected before any remote call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The target does not exist in the caller's scope.
    #[error("not found: {0}")]
    NotFound(String),

    /// A prop was configured before all of its dependencies had values.
    #[error("missing dependency for '{prop}': {}", .missing.join(", "))]
    MissingDependency { prop: String, missing: Vec<String> },

    /// The remote platform failed or answered with an unexpected shape.
    #[error("upstream error{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    /// Some sub-operations of a cascade failed.
    #[error("partial failure: {failed} of {total} operations failed")]
    PartialFailure { failed: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn invalid(message: impl Into<String>) -> Self {
        GatewayError::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        GatewayError::NotFound(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        GatewayError::Upstream {
            status: None,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::MissingDependency { .. } => ErrorKind::MissingDependency,
            GatewayError::Upstream { .. } => ErrorKind::UpstreamError,
            GatewayError::PartialFailure { .. } => ErrorKind::PartialFailure,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            "request to platform timed out".to_string()
        } else if e.is_decode() {
            format!("unexpected response shape: {}", e)
        } else {
            format!("platform request failed: {}", e)
        };
        GatewayError::Upstream {
            status: e.status().map(|s| s.as_u16()),
            message,
        }
    }
}

/// Serializable error payload used in result envelopes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    /// Unmet dependencies, only present for `MissingDependency`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

impl From<&GatewayError> for ErrorBody {
    fn from(e: &GatewayError) -> Self {
        let missing = match e {
            GatewayError::MissingDependency { missing, .. } => Some(missing.clone()),
            _ => None,
        };
        ErrorBody {
            kind: e.kind(),
            message: e.to_string(),
            missing,
        }
    }
}
