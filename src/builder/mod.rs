//! Index builder / sync pipeline.
//!
//! Batch ETL joining the catalog with the precomputed embedding store and
//! republishing the search index idempotently: re-running on unchanged
//! source data reproduces an identical index. Rows without an embedding
//! are excluded with a logged count; per-document bulk failures are
//! collected and reported while the run continues. Only a schema mismatch
//! halts the run before partial corruption.

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::catalog::artists::parse_artist_map;
use crate::catalog::{CatalogRow, CatalogStore};
use crate::error::BuildError;
use crate::index_store::{BulkFailure, BulkReport, SearchIndex};
use crate::model::types::SongDocument;

/// Default documents per bulk chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Constant embedding dimension enforced across the run.
    pub dims: usize,
    pub chunk_size: usize,
    /// Destructive drop+create before loading. Explicit operation only.
    pub recreate: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            dims: crate::config::DEFAULT_EMBED_DIMS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            recreate: false,
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Documents handed to the bulk loader.
    pub loaded: usize,
    /// Source rows excluded for lacking an embedding.
    pub skipped_missing_embedding: usize,
    pub succeeded: usize,
    pub failures: Vec<BulkFailure>,
}

impl LoadReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Run the full extract → transform → load pipeline.
pub fn build_index(
    catalog: &CatalogStore,
    index: &dyn SearchIndex,
    opts: &BuildOptions,
) -> Result<LoadReport, BuildError> {
    let rows = catalog.load_rows()?;
    let artist_names = catalog.load_artist_names()?;
    info!(rows = rows.len(), "pipeline_extract_complete");

    let mut report = LoadReport::default();
    let mut docs = Vec::with_capacity(rows.len());
    for row in rows {
        match transform_row(row, &artist_names, opts.dims)? {
            Some(doc) => docs.push(doc),
            None => report.skipped_missing_embedding += 1,
        }
    }
    report.loaded = docs.len();
    info!(
        loaded = report.loaded,
        skipped_missing_embedding = report.skipped_missing_embedding,
        "pipeline_transform_complete"
    );

    if opts.recreate {
        index.drop_index()?;
    }
    index.create_index(opts.dims)?;

    // Chunks are dispatched concurrently; each is independently retryable
    // because upserts are idempotent.
    let chunk_reports: Vec<BulkReport> = docs
        .par_chunks(opts.chunk_size.max(1))
        .map(|chunk| index.bulk_upsert(chunk))
        .collect::<Result<Vec<_>, _>>()?;

    let mut bulk = BulkReport::default();
    for chunk in chunk_reports {
        bulk.merge(chunk);
    }
    report.succeeded = bulk.succeeded;
    report.failures = bulk.failures;

    for failure in &report.failures {
        warn!(song_id = %failure.song_id, reason = %failure.reason, "bulk_document_failed");
    }
    info!(
        succeeded = report.succeeded,
        failed = report.failed(),
        "pipeline_load_complete"
    );
    Ok(report)
}

/// Transform one joined row into an index document.
///
/// Returns `Ok(None)` for rows without a usable embedding (excluded and
/// counted). A present embedding with the wrong dimension is fatal.
fn transform_row(
    row: CatalogRow,
    artist_names: &std::collections::HashMap<String, String>,
    dims: usize,
) -> Result<Option<SongDocument>, BuildError> {
    let embedding = match parse_embedding(row.embedding_json.as_deref(), &row.song_id) {
        Some(vector) => vector,
        None => return Ok(None),
    };
    if embedding.len() != dims {
        return Err(BuildError::SchemaMismatch {
            song_id: row.song_id,
            expected: dims,
            actual: embedding.len(),
        });
    }

    let primary = row.artists_raw.as_deref().and_then(parse_artist_map);
    let (artist_id, name_artists) = match primary {
        Some(primary) => {
            // Prefer the canonical name from the artists table; fall back
            // to the name embedded in the serialized map.
            let name = artist_names
                .get(&primary.artist_id)
                .cloned()
                .or(primary.name);
            (Some(primary.artist_id), name)
        }
        None => (None, None),
    };

    Ok(Some(SongDocument {
        song_name: row.song_name.unwrap_or_default(),
        artist_id,
        name_artists,
        album_name: row.album_name,
        song_type: row.song_type,
        release_date: row.release_date.as_deref().and_then(normalize_date),
        popularity: row.popularity,
        lyrics: row.lyrics,
        genre: row.genre,
        embedding,
        spotify_url: row.spotify_url,
        youtube_url: row.youtube_url,
        energy: row.energy.filter(|e| (0.0..=1.0).contains(e)),
        song_id: row.song_id,
    }))
}

fn parse_embedding(raw: Option<&str>, song_id: &str) -> Option<Vec<f32>> {
    let raw = raw?;
    match serde_json::from_str::<Vec<f32>>(raw) {
        Ok(vector) if !vector.is_empty() => Some(vector),
        Ok(_) => {
            warn!(song_id = song_id, "embedding_empty");
            None
        }
        Err(e) => {
            warn!(song_id = song_id, "embedding_unparseable: {e}");
            None
        }
    }
}

/// Normalize a release date to `YYYY-MM-DD`. Catalog rows carry full dates,
/// bare years, and occasional junk; junk becomes null rather than aborting
/// the batch.
fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    if let Ok(year) = raw.parse::<i32>()
        && let Some(date) = NaiveDate::from_ymd_opt(year, 1, 1)
    {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    None
}
