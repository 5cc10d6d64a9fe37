//! Environment-backed runtime configuration.
//!
//! Every knob has a default that works against a local stack; `.env` files
//! are honored via `dotenvy` so the CLI and the index builder read the same
//! settings.

use std::path::PathBuf;
use std::time::Duration;

/// Default embedding model (1536-dimensional).
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

/// Default chat model for keyword extraction.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Embedding dimension for the default model.
pub const DEFAULT_EMBED_DIMS: usize = 1536;

/// Default bounded size of the in-process embedding cache.
pub const DEFAULT_EMBED_CACHE_SIZE: usize = 256;

/// Default timeout applied to every external call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// Search index endpoint (Elasticsearch-compatible).
    pub index_url: String,
    /// Index name holding song documents.
    pub index_name: String,
    /// Path to the catalog SQLite database (required for indexing).
    pub db_path: Option<PathBuf>,
    /// Provider API key. Absent means providers are unconfigured.
    pub api_key: Option<String>,
    /// Provider base URL (OpenAI-compatible).
    pub provider_base_url: String,
    pub embed_model: String,
    pub chat_model: String,
    pub embed_dims: usize,
    pub embed_cache_size: usize,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: "http://localhost:9200".to_string(),
            index_name: "songs".to_string(),
            db_path: None,
            api_key: None,
            provider_base_url: "https://api.openai.com".to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embed_dims: DEFAULT_EMBED_DIMS,
            embed_cache_size: DEFAULT_EMBED_CACHE_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(val) = dotenvy::var("MELODY_INDEX_URL") {
            cfg.index_url = val;
        }
        if let Ok(val) = dotenvy::var("MELODY_INDEX_NAME") {
            cfg.index_name = val;
        }
        if let Ok(val) = dotenvy::var("MELODY_DB") {
            cfg.db_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = dotenvy::var("OPENAI_API_KEY")
            && !val.trim().is_empty()
        {
            cfg.api_key = Some(val);
        }
        if let Ok(val) = dotenvy::var("OPENAI_BASE_URL") {
            cfg.provider_base_url = val;
        }
        if let Ok(val) = dotenvy::var("OPENAI_EMBED_MODEL") {
            cfg.embed_model = val;
        }
        if let Ok(val) = dotenvy::var("OPENAI_CHAT_MODEL") {
            cfg.chat_model = val;
        }
        if let Ok(val) = dotenvy::var("MELODY_EMBED_DIMS")
            && let Ok(dims) = val.parse()
        {
            cfg.embed_dims = dims;
        }
        if let Ok(val) = dotenvy::var("MELODY_EMBED_CACHE_SIZE")
            && let Ok(size) = val.parse()
        {
            cfg.embed_cache_size = size;
        }
        if let Ok(val) = dotenvy::var("MELODY_TIMEOUT_SECS")
            && let Ok(secs) = val.parse()
        {
            cfg.timeout = Duration::from_secs(secs);
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_local_stack() {
        let cfg = Config::default();
        assert_eq!(cfg.index_url, "http://localhost:9200");
        assert_eq!(cfg.index_name, "songs");
        assert_eq!(cfg.embed_dims, 1536);
        assert_eq!(cfg.embed_cache_size, 256);
        assert!(cfg.api_key.is_none());
        assert!(cfg.db_path.is_none());
    }
}
