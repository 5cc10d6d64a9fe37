pub mod builder;
pub mod catalog;
pub mod config;
pub mod error;
pub mod index_store;
pub mod model;
pub mod providers;
pub mod retry;
pub mod search;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

use crate::builder::{BuildOptions, DEFAULT_CHUNK_SIZE};
use crate::catalog::CatalogStore;
use crate::config::Config;
use crate::index_store::SearchIndex;
use crate::index_store::http::HttpIndex;
use crate::model::types::{DEFAULT_SEARCH_SIZE, RangeFilter, SearchFilters, SearchRequest};
use crate::providers::embedder::HttpEmbedder;
use crate::providers::embedding_cache::EmbeddingCache;
use crate::providers::keywords::{HttpChatCompleter, KeywordExtractor};
use crate::retry::Backoff;
use crate::search::service::SearchService;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "melody",
    version,
    about = "Hybrid song search: semantic + lexical retrieval over a catalog index"
)]
pub struct Cli {
    /// Search index endpoint (Elasticsearch-compatible)
    #[arg(long, global = true, env = "MELODY_INDEX_URL")]
    pub index_url: Option<String>,

    /// Index name holding song documents
    #[arg(long, global = true, env = "MELODY_INDEX_NAME")]
    pub index_name: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search songs matching a free-text description
    Search {
        /// Free-text description of the music you want
        prompt: String,

        /// Maximum results to return (server-capped)
        #[arg(long, default_value_t = DEFAULT_SEARCH_SIZE)]
        size: usize,

        /// Exact artist name
        #[arg(long)]
        artist: Option<String>,

        /// Exact album name
        #[arg(long)]
        album: Option<String>,

        /// Exact song type (e.g. "Solo", "remix")
        #[arg(long)]
        song_type: Option<String>,

        /// Exact genre tag
        #[arg(long)]
        genre: Option<String>,

        /// Earliest release date (YYYY-MM-DD)
        #[arg(long)]
        release_from: Option<String>,

        /// Latest release date (YYYY-MM-DD)
        #[arg(long)]
        release_to: Option<String>,

        #[arg(long)]
        popularity_min: Option<i64>,

        #[arg(long)]
        popularity_max: Option<i64>,

        /// Minimum acoustic energy (0.0-1.0)
        #[arg(long)]
        energy_min: Option<f64>,

        /// Maximum acoustic energy (0.0-1.0)
        #[arg(long)]
        energy_max: Option<f64>,

        /// Emit hits as JSON instead of the readable listing
        #[arg(long)]
        json: bool,
    },
    /// Build the search index from the catalog and embedding store
    Index {
        /// Path to the catalog SQLite database
        #[arg(long, env = "MELODY_DB")]
        db: Option<PathBuf>,

        /// Documents per bulk chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// Create (or destructively recreate) the index schema
    Schema {
        /// Drop the existing index first. Destroys all documents.
        #[arg(long)]
        recreate: bool,
    },
    /// Report index reachability and provider configuration
    Health,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = Config::from_env();
    if let Some(url) = cli.index_url {
        cfg.index_url = url;
    }
    if let Some(name) = cli.index_name {
        cfg.index_name = name;
    }

    match cli.command {
        Commands::Search {
            prompt,
            size,
            artist,
            album,
            song_type,
            genre,
            release_from,
            release_to,
            popularity_min,
            popularity_max,
            energy_min,
            energy_max,
            json,
        } => {
            let filters = SearchFilters {
                artist,
                album,
                song_type,
                genre,
                release_date: RangeFilter::new(release_from, release_to),
                popularity: RangeFilter::new(popularity_min, popularity_max),
                energy: RangeFilter::new(energy_min, energy_max),
            };
            let request = SearchRequest::new(prompt)
                .with_size(size)
                .with_filters(filters);
            run_search(&cfg, &request, json)
        }
        Commands::Index { db, chunk_size } => run_index(&cfg, db, chunk_size),
        Commands::Schema { recreate } => run_schema(&cfg, recreate),
        Commands::Health => run_health(&cfg),
    }
}

fn connect_index(cfg: &Config) -> Result<HttpIndex> {
    let index = HttpIndex::new(&cfg.index_url, &cfg.index_name, cfg.timeout)
        .with_context(|| format!("initialize index client for {}", cfg.index_url))?;
    retry::with_backoff("index_connect", &Backoff::default(), || index.ping())
        .with_context(|| format!("search index unreachable at {}", cfg.index_url))?;
    Ok(index)
}

fn build_service(cfg: &Config, index: HttpIndex) -> Result<SearchService> {
    let api_key = cfg
        .api_key
        .as_deref()
        .ok_or_else(|| anyhow!("OPENAI_API_KEY is not set; providers are unavailable"))?;
    let embedder = HttpEmbedder::new(
        &cfg.provider_base_url,
        api_key,
        &cfg.embed_model,
        cfg.embed_dims,
        cfg.timeout,
    )?;
    let completer =
        HttpChatCompleter::new(&cfg.provider_base_url, api_key, &cfg.chat_model, cfg.timeout)?;
    Ok(SearchService::new(
        Arc::new(EmbeddingCache::new(
            Arc::new(embedder),
            cfg.embed_cache_size,
        )),
        KeywordExtractor::new(Arc::new(completer)),
        Arc::new(index),
    ))
}

fn run_search(cfg: &Config, request: &SearchRequest, json: bool) -> Result<()> {
    let index = connect_index(cfg)?;
    let service = build_service(cfg, index)?;
    let hits = service.search(request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("No songs matched.");
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{:>2}. {} — {}  [score {:.3}; {}]",
            rank + 1,
            hit.title,
            hit.artist,
            hit.score,
            hit.matched_signals.join(", "),
        );
        if let Some(url) = &hit.spotify_url {
            println!("      {url}");
        }
    }
    Ok(())
}

fn run_index(cfg: &Config, db_override: Option<PathBuf>, chunk_size: usize) -> Result<()> {
    let db_path = db_override
        .or_else(|| cfg.db_path.clone())
        .ok_or_else(|| anyhow!("catalog database path is required (--db or MELODY_DB)"))?;
    let catalog = CatalogStore::open(&db_path)?;
    let index = connect_index(cfg)?;

    let opts = BuildOptions {
        dims: cfg.embed_dims,
        chunk_size,
        recreate: false,
    };
    let report = builder::build_index(&catalog, &index, &opts)?;

    println!(
        "Indexed into '{}': {} loaded, {} skipped (missing embedding), {} succeeded, {} failed",
        cfg.index_name,
        report.loaded,
        report.skipped_missing_embedding,
        report.succeeded,
        report.failed(),
    );
    for failure in &report.failures {
        println!("  failed {}: {}", failure.song_id, failure.reason);
    }
    Ok(())
}

fn run_schema(cfg: &Config, recreate: bool) -> Result<()> {
    let index = connect_index(cfg)?;
    if recreate {
        index.drop_index()?;
    }
    index.create_index(cfg.embed_dims)?;
    println!(
        "Index '{}' ready ({} dims{})",
        cfg.index_name,
        cfg.embed_dims,
        if recreate { ", recreated" } else { "" },
    );
    Ok(())
}

fn run_health(cfg: &Config) -> Result<()> {
    let index = HttpIndex::new(&cfg.index_url, &cfg.index_name, cfg.timeout)?;
    let index_status = match index.ping() {
        Ok(()) => "connected".to_string(),
        Err(e) => format!("disconnected ({e})"),
    };
    println!("index endpoint:   {}", cfg.index_url);
    println!("index status:     {index_status}");
    println!(
        "providers:        {}",
        if cfg.api_key.is_some() {
            "configured"
        } else {
            "not configured (OPENAI_API_KEY unset)"
        },
    );
    Ok(())
}
