use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    #[error("embedding provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),
}

impl EmbedError {
    /// Classify a transport failure, separating client-side deadlines from unreachable hosts.
    #[must_use]
    pub fn from_transport(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, EmbedError>;
