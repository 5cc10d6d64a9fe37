//! External generative-text providers behind capability traits.
//!
//! - **[`embedder`]**: `Embedder` trait + OpenAI-compatible HTTP implementation.
//! - **[`embedding_cache`]**: bounded LRU memoization with single-flight miss collapse.
//! - **[`keywords`]**: keyword extraction with a defensive parse fallback chain.

pub mod embedder;
pub mod embedding_cache;
pub mod keywords;
