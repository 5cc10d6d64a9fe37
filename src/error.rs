//! Error taxonomy shared across the serving and indexing paths.
//!
//! The split matters for callers: provider/index unavailability is a
//! retryable service condition surfaced to the caller, malformed provider
//! *content* is recovered locally, and schema mismatches are fatal to an
//! indexing run before any partial corruption can land.

use thiserror::Error;

/// Failure from an external generative provider (embeddings or chat).
///
/// `Unavailable` covers transport, auth, and timeout failures and is always
/// surfaced. `MalformedResponse` is only surfaced from the embedding path;
/// the keyword extractor recovers from it by degrading to an empty list.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Failure from the search index store.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The store is unreachable or timed out. No in-request retry.
    #[error("search index unavailable: {0}")]
    Unavailable(String),
    /// The store answered but rejected the request (bad query, missing index).
    #[error("search index rejected request: {0}")]
    Rejected(String),
}

/// Fatal failure of an indexing run.
///
/// Per-document bulk failures are *not* errors; they are collected in the
/// load report and the run continues.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(
        "embedding dimension mismatch for song {song_id}: expected {expected}, got {actual}"
    )]
    SchemaMismatch {
        song_id: String,
        expected: usize,
        actual: usize,
    },
    #[error("catalog error: {0}")]
    Catalog(#[from] anyhow::Error),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Failure of one search request, distinct from a genuine zero-match result.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl ServiceError {
    /// Whether the failure indicates a backend being down (service-unavailable
    /// to the caller) rather than a caller mistake.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Provider(ProviderError::Unavailable(_)) | Self::Index(IndexError::Unavailable(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_unavailable_classification() {
        let e = ServiceError::Provider(ProviderError::Unavailable("timeout".into()));
        assert!(e.is_backend_unavailable());

        let e = ServiceError::Index(IndexError::Unavailable("refused".into()));
        assert!(e.is_backend_unavailable());

        let e = ServiceError::InvalidRequest("empty prompt".into());
        assert!(!e.is_backend_unavailable());

        let e = ServiceError::Index(IndexError::Rejected("no such index".into()));
        assert!(!e.is_backend_unavailable());
    }
}
