//! End-to-end pipeline tests: catalog fixture → build → search.

use std::sync::Arc;

use rusqlite::Connection;
use tempfile::TempDir;

use melody_search::builder::{BuildOptions, build_index};
use melody_search::catalog::CatalogStore;
use melody_search::error::{BuildError, IndexError, ProviderError};
use melody_search::index_store::memory::MemoryIndex;
use melody_search::index_store::{BulkFailure, BulkReport, SearchIndex};
use melody_search::model::types::{SearchHit, SearchRequest, SongDocument};
use melody_search::providers::embedder::Embedder;
use melody_search::providers::embedding_cache::EmbeddingCache;
use melody_search::providers::keywords::{ChatCompleter, KeywordExtractor};
use melody_search::search::compose::ComposedQuery;
use melody_search::search::service::SearchService;

const SCHEMA: &str = "\
    CREATE TABLE songs (
        song_id TEXT PRIMARY KEY,
        song_name TEXT,
        artists TEXT,
        popularity INTEGER,
        song_type TEXT,
        album_name TEXT,
        release_date TEXT,
        energy REAL
    );
    CREATE TABLE lyrics (song_id TEXT PRIMARY KEY, lyrics TEXT);
    CREATE TABLE embeddings (song_id TEXT PRIMARY KEY, embedding TEXT);
    CREATE TABLE artists (artist_id TEXT PRIMARY KEY, name TEXT);
    CREATE TABLE song_genres (song_id TEXT PRIMARY KEY, genre TEXT);
    CREATE TABLE song_links (
        song_id TEXT PRIMARY KEY,
        spotify_url TEXT,
        youtube_url TEXT
    );";

/// Three-song corpus where song A ('sA') lacks an embedding.
fn seed_catalog(dir: &TempDir) -> CatalogStore {
    let path = dir.path().join("catalog.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn.execute_batch(
        "INSERT INTO songs VALUES
            ('sA', 'Ghost Track', '{''a1'': ''Johnny Cash''}', 10, 'Solo', 'Lost', '1994-01-01', 0.2),
            ('sB', 'Piano Man', '{''a2'': ''Billy Joel''}', 85, 'Solo', 'Piano Man', '1973-11-09', 0.5),
            ('sC', 'Night Drive', '{''a3'': ''M83''}', 60, 'remix', 'Saturdays', '2011', 0.9);
         INSERT INTO lyrics VALUES
            ('sB', 'sing us a song you are the piano man'),
            ('sC', 'city lights fading in the mirror');
         INSERT INTO embeddings VALUES
            ('sB', '[1.0, 0.0, 0.0]'),
            ('sC', '[0.0, 1.0, 0.0]');
         INSERT INTO artists VALUES
            ('a2', 'Billy Joel'),
            ('a3', 'M83');
         INSERT INTO song_genres VALUES ('sB', 'rock'), ('sC', 'electronic');
         INSERT INTO song_links VALUES ('sB', 'https://open.spotify.com/track/b', NULL);",
    )
    .unwrap();
    drop(conn);
    CatalogStore::open(&path).unwrap()
}

fn opts(dims: usize) -> BuildOptions {
    BuildOptions {
        dims,
        chunk_size: 1,
        recreate: false,
    }
}

#[test]
fn build_reports_skip_counts_and_excludes_rows_without_embeddings() {
    let dir = TempDir::new().unwrap();
    let catalog = seed_catalog(&dir);
    let index = MemoryIndex::new();

    let report = build_index(&catalog, &index, &opts(3)).unwrap();
    assert_eq!(report.loaded, 2);
    assert_eq!(report.skipped_missing_embedding, 1);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed(), 0);

    assert_eq!(index.len(), 2);
    assert!(!index.contains("sA"));
    assert!(index.contains("sB"));
    assert!(index.contains("sC"));
}

#[test]
fn rebuild_on_unchanged_source_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let catalog = seed_catalog(&dir);
    let index = MemoryIndex::new();

    build_index(&catalog, &index, &opts(3)).unwrap();
    let first = index.documents();
    let report = build_index(&catalog, &index, &opts(3)).unwrap();
    let second = index.documents();

    assert_eq!(first, second);
    assert_eq!(report.succeeded, 2);
}

#[test]
fn transformed_documents_carry_canonical_fields() {
    let dir = TempDir::new().unwrap();
    let catalog = seed_catalog(&dir);
    let index = MemoryIndex::new();
    build_index(&catalog, &index, &opts(3)).unwrap();

    let docs = index.documents();
    let b = docs.iter().find(|d| d.song_id == "sB").unwrap();
    assert_eq!(b.name_artists.as_deref(), Some("Billy Joel"));
    assert_eq!(b.artist_id.as_deref(), Some("a2"));
    assert_eq!(b.genre.as_deref(), Some("rock"));
    assert_eq!(b.spotify_url.as_deref(), Some("https://open.spotify.com/track/b"));
    assert_eq!(b.release_date.as_deref(), Some("1973-11-09"));

    // Bare-year release dates are normalized, not dropped.
    let c = docs.iter().find(|d| d.song_id == "sC").unwrap();
    assert_eq!(c.release_date.as_deref(), Some("2011-01-01"));
    assert_eq!(c.song_type.as_deref(), Some("remix"));
}

#[test]
fn recreate_destroys_stale_documents() {
    let dir = TempDir::new().unwrap();
    let catalog = seed_catalog(&dir);
    let index = MemoryIndex::new();

    // A document from an earlier run that the catalog no longer contains.
    index.create_index(3).unwrap();
    index.bulk_upsert(&[stale_doc()]).unwrap();

    // Plain rebuild upserts around it and leaves it in place.
    build_index(&catalog, &index, &opts(3)).unwrap();
    assert!(index.contains("stale"));

    let recreate = BuildOptions {
        recreate: true,
        ..opts(3)
    };
    let report = build_index(&catalog, &index, &recreate).unwrap();
    assert_eq!(report.succeeded, 2);
    assert!(!index.contains("stale"));
    assert_eq!(index.len(), 2);
}

fn stale_doc() -> SongDocument {
    SongDocument {
        song_id: "stale".to_string(),
        song_name: "Removed From Catalog".to_string(),
        artist_id: None,
        name_artists: None,
        album_name: None,
        song_type: None,
        release_date: None,
        popularity: None,
        lyrics: None,
        genre: None,
        embedding: vec![0.5, 0.5, 0.5],
        spotify_url: None,
        youtube_url: None,
        energy: None,
    }
}

#[test]
fn catalog_read_failure_is_surfaced_as_build_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no-schema.db");
    drop(Connection::open(&path).unwrap());
    let catalog = CatalogStore::open(&path).unwrap();
    let index = MemoryIndex::new();

    let out = build_index(&catalog, &index, &opts(3));
    assert!(matches!(out, Err(BuildError::Catalog(_))));
}

#[test]
fn dimension_mismatch_halts_the_run_before_load() {
    let dir = TempDir::new().unwrap();
    let catalog = seed_catalog(&dir);
    let index = MemoryIndex::new();

    let out = build_index(&catalog, &index, &opts(1536));
    assert!(matches!(out, Err(BuildError::SchemaMismatch { .. })));
    // Nothing was loaded: the run halted before any partial corruption.
    assert_eq!(index.len(), 0);
}

/// Wrapper that rejects one specific document, for continue-on-error tests.
struct FlakyIndex {
    inner: MemoryIndex,
    poison_id: String,
}

impl SearchIndex for FlakyIndex {
    fn search(&self, query: &ComposedQuery) -> Result<Vec<SearchHit>, IndexError> {
        self.inner.search(query)
    }

    fn bulk_upsert(&self, docs: &[SongDocument]) -> Result<BulkReport, IndexError> {
        let mut report = BulkReport::default();
        for doc in docs {
            if doc.song_id == self.poison_id {
                report.failures.push(BulkFailure {
                    song_id: doc.song_id.clone(),
                    reason: "mapper_parsing_exception".to_string(),
                });
            } else {
                report.merge(self.inner.bulk_upsert(std::slice::from_ref(doc))?);
            }
        }
        Ok(report)
    }

    fn create_index(&self, dims: usize) -> Result<(), IndexError> {
        self.inner.create_index(dims)
    }

    fn drop_index(&self) -> Result<(), IndexError> {
        self.inner.drop_index()
    }

    fn ping(&self) -> Result<(), IndexError> {
        self.inner.ping()
    }
}

#[test]
fn per_document_failures_are_collected_without_aborting() {
    let dir = TempDir::new().unwrap();
    let catalog = seed_catalog(&dir);
    let index = FlakyIndex {
        inner: MemoryIndex::new(),
        poison_id: "sB".to_string(),
    };

    let report = build_index(&catalog, &index, &opts(3)).unwrap();
    assert_eq!(report.loaded, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures[0].song_id, "sB");
    // The rest of the batch committed.
    assert!(index.inner.contains("sC"));
    assert!(!index.inner.contains("sB"));
}

// ---------------------------------------------------------------------------
// Serving over a built index
// ---------------------------------------------------------------------------

struct AxisEmbedder;

impl Embedder for AxisEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        // Route piano-ish prompts to sB's axis, night-ish to sC's.
        if text.contains("piano") {
            Ok(vec![1.0, 0.0, 0.0])
        } else if text.contains("night") {
            Ok(vec![0.0, 1.0, 0.0])
        } else {
            Ok(vec![0.0, 0.0, 1.0])
        }
    }

    fn dimension(&self) -> usize {
        3
    }

    fn model_id(&self) -> &str {
        "axis-3"
    }
}

struct EchoCompleter;

impl ChatCompleter for EchoCompleter {
    fn complete(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
        let kws: Vec<&str> = user.split_whitespace().take(5).collect();
        Ok(serde_json::json!({ "keywords": kws }).to_string())
    }
}

fn service_over(index: Arc<dyn SearchIndex>) -> SearchService {
    SearchService::new(
        Arc::new(EmbeddingCache::new(Arc::new(AxisEmbedder), 16)),
        KeywordExtractor::new(Arc::new(EchoCompleter)),
        index,
    )
}

#[test]
fn no_prompt_ever_surfaces_the_skipped_song() {
    let dir = TempDir::new().unwrap();
    let catalog = seed_catalog(&dir);
    let index = Arc::new(MemoryIndex::new());
    build_index(&catalog, index.as_ref(), &opts(3)).unwrap();

    let service = service_over(index);
    for prompt in [
        "piano man bar song",
        "night drive synthwave",
        "ghost track lost album",
        "anything at all",
    ] {
        let hits = service.search(&SearchRequest::new(prompt)).unwrap();
        assert!(
            hits.iter().all(|h| h.song_id != "sA"),
            "skipped song surfaced for prompt: {prompt}"
        );
    }
}

#[test]
fn search_over_built_index_ranks_and_explains() {
    let dir = TempDir::new().unwrap();
    let catalog = seed_catalog(&dir);
    let index = Arc::new(MemoryIndex::new());
    build_index(&catalog, index.as_ref(), &opts(3)).unwrap();

    let service = service_over(index);
    let hits = service
        .search(&SearchRequest::new("piano man").with_size(5))
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.len() <= 5);
    assert_eq!(hits[0].song_id, "sB");
    assert!(!hits[0].matched_signals.is_empty());
    assert_eq!(hits[0].artist, "Billy Joel");
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}
