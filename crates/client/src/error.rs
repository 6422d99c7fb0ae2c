//! Client-level error type.

use thiserror::Error;

/// Errors returned by an [`ExecutionService`](crate::ExecutionService).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered 401; the credential is missing or expired.
    /// Callers must not retry.
    #[error("authentication required")]
    AuthRequired,

    /// The request never produced a response (connect, timeout, TLS, …).
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// `true` for [`ClientError::AuthRequired`].
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthRequired)
    }
}
