use thiserror::Error;

/// Errors surfaced by the sync layer.
///
/// Remote failures keep the human-readable message the service sent so the
/// caller can show it in a notification.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// True when the error came back from the remote service rather than
    /// being produced client-side.
    pub fn is_remote(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Api { .. })
    }
}
