//! Tagging client errors

/// Failure talking to the tagging endpoint
#[derive(Debug, thiserror::Error)]
pub enum TaggingError {
    /// A configured header name or value is not valid HTTP
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// Transport failure, timeout included
    #[error("tagging request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with an error status
    #[error("tagging service returned {status}: {code}: {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    /// Success body could not be decoded
    #[error("cannot decode GetResources response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl TaggingError {
    /// HTTP status of a service error
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}
