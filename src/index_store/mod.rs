//! Search index store: narrow capability interface to the external
//! document/vector engine.
//!
//! - **[`schema`]**: index mapping owned by the pipeline.
//! - **[`http`]**: Elasticsearch-compatible HTTP implementation.
//! - **[`memory`]**: in-process implementation scoring the same signals,
//!   for tests and offline runs.

pub mod http;
pub mod memory;
pub mod schema;

use crate::error::IndexError;
use crate::model::types::{SearchHit, SongDocument};
use crate::search::compose::ComposedQuery;

/// One document that failed inside a bulk batch, with its reason.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkFailure {
    pub song_id: String,
    pub reason: String,
}

/// Outcome of one bulk upsert: successes commit, failures are enumerated.
#[derive(Debug, Clone, Default)]
pub struct BulkReport {
    pub succeeded: usize,
    pub failures: Vec<BulkFailure>,
}

impl BulkReport {
    pub fn merge(&mut self, other: BulkReport) {
        self.succeeded += other.succeeded;
        self.failures.extend(other.failures);
    }
}

/// Capability interface to the search engine. Implementations must be
/// shareable across threads; the indexing path dispatches bulk chunks
/// concurrently.
pub trait SearchIndex: Send + Sync {
    /// Execute a composed query, returning ranked hits bounded by the
    /// query's size.
    fn search(&self, query: &ComposedQuery) -> Result<Vec<SearchHit>, IndexError>;

    /// Upsert documents keyed by `song_id`. Per-document failures are
    /// collected in the report; the batch continues.
    fn bulk_upsert(&self, docs: &[SongDocument]) -> Result<BulkReport, IndexError>;

    /// Create the index with the given embedding dimension. Idempotent:
    /// an existing index is left untouched.
    fn create_index(&self, dims: usize) -> Result<(), IndexError>;

    /// Destroy the index. Explicit, single-writer operation; never an
    /// implicit side effect of a partial run.
    fn drop_index(&self) -> Result<(), IndexError>;

    /// Cheap reachability probe for bootstrap and health reporting.
    fn ping(&self) -> Result<(), IndexError>;
}
