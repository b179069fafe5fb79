use std::fmt;

use recall_llm::EmbedError;

use crate::store::StoreError;

/// Pipeline stage a [`MemoryError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embedding,
    Storage,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedding => f.write_str("embedding"),
            Self::Storage => f.write_str("storage"),
        }
    }
}

/// Failure classes shared by every layer. Transport surfaces map these to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    DimensionMismatch,
    ProviderUnavailable,
    ProviderError,
    MalformedResponse,
    ConnectionError,
    SchemaError,
    StatsUnavailable,
    NotReady,
    Timeout,
    NotFound,
    DuplicateKey,
    Engine,
}

impl ErrorKind {
    /// Fixed caller-facing message. Never includes the underlying cause.
    #[must_use]
    pub fn public_message(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid input",
            Self::DimensionMismatch => "embedding dimension does not match the collection",
            Self::ProviderUnavailable => "embedding provider unavailable",
            Self::ProviderError => "embedding provider rejected the request",
            Self::MalformedResponse => "embedding provider returned an unexpected response",
            Self::ConnectionError => "vector store unavailable",
            Self::SchemaError => "vector collection schema mismatch",
            Self::StatsUnavailable => "statistics unavailable",
            Self::NotReady => "vector store not ready",
            Self::Timeout => "request timed out",
            Self::NotFound => "record not found",
            Self::DuplicateKey => "a record with this id already exists",
            Self::Engine => "vector store error",
        }
    }
}

impl From<&EmbedError> for ErrorKind {
    fn from(err: &EmbedError) -> Self {
        match err {
            EmbedError::InvalidInput(_) => Self::InvalidInput,
            EmbedError::Unavailable(_) => Self::ProviderUnavailable,
            EmbedError::Provider { .. } => Self::ProviderError,
            EmbedError::MalformedResponse(_) => Self::MalformedResponse,
            EmbedError::Timeout(_) => Self::Timeout,
        }
    }
}

/// Error from [`MemoryService`](crate::MemoryService), tagged with the failing stage.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("embedding stage failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("storage stage failed: {0}")]
    Storage(#[from] StoreError),
}

impl MemoryError {
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Embedding(_) => Stage::Embedding,
            Self::Storage(_) => Stage::Storage,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Embedding(e) => ErrorKind::from(e),
            Self::Storage(e) => e.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::collection::CollectionState;

    #[test]
    fn embedding_errors_tagged_with_stage() {
        let err = MemoryError::from(EmbedError::Unavailable("dns".into()));
        assert_eq!(err.stage(), Stage::Embedding);
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
        assert!(err.to_string().starts_with("embedding stage failed"));
    }

    #[test]
    fn storage_errors_tagged_with_stage() {
        let err = MemoryError::from(StoreError::NotReady(CollectionState::Created));
        assert_eq!(err.stage(), Stage::Storage);
        assert_eq!(err.kind(), ErrorKind::NotReady);
    }

    #[test]
    fn timeout_kind_from_either_stage() {
        let a = MemoryError::from(EmbedError::Timeout(Duration::from_secs(1)));
        let b = MemoryError::from(StoreError::Timeout(Duration::from_secs(1)));
        assert_eq!(a.kind(), ErrorKind::Timeout);
        assert_eq!(b.kind(), ErrorKind::Timeout);
        assert_ne!(a.stage(), b.stage());
    }

    #[test]
    fn public_message_hides_cause() {
        let err = MemoryError::from(EmbedError::Provider {
            status: 401,
            message: "Incorrect API key provided: sk-abc".into(),
        });
        assert!(!err.kind().public_message().contains("sk-abc"));
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Embedding.to_string(), "embedding");
        assert_eq!(Stage::Storage.to_string(), "storage");
    }
}
