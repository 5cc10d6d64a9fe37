//! Request orchestration: prompt → embedding + keywords → composed query →
//! ranked hits.

use std::sync::Arc;

use tracing::info;

use crate::error::ServiceError;
use crate::index_store::SearchIndex;
use crate::model::types::{SearchHit, SearchRequest};
use crate::providers::embedding_cache::EmbeddingCache;
use crate::providers::keywords::KeywordExtractor;
use crate::search::compose::compose;

/// Serving-path entry point. Collaborators are constructed once and
/// injected, so tests substitute fakes at every seam.
pub struct SearchService {
    cache: Arc<EmbeddingCache>,
    extractor: KeywordExtractor,
    index: Arc<dyn SearchIndex>,
}

impl SearchService {
    pub fn new(
        cache: Arc<EmbeddingCache>,
        extractor: KeywordExtractor,
        index: Arc<dyn SearchIndex>,
    ) -> Self {
        Self {
            cache,
            extractor,
            index,
        }
    }

    /// Execute one search request.
    ///
    /// The embedding and keyword calls run in parallel; a provider being
    /// unavailable fails the whole request rather than silently degrading.
    /// Malformed keyword *content* has already degraded to an empty list
    /// inside the extractor, which simply drops the lexical clause.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, ServiceError> {
        if request.prompt.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("prompt is empty".to_string()));
        }
        let size = request.effective_size();

        let (embedding, extraction) = std::thread::scope(|scope| {
            let embed = scope.spawn(|| self.cache.embed(&request.prompt));
            let keywords = scope.spawn(|| self.extractor.extract(&request.prompt));
            (
                embed.join().expect("embedding worker panicked"),
                keywords.join().expect("keyword worker panicked"),
            )
        });
        let embedding = embedding?;
        let extraction = extraction?;

        info!(
            size = size,
            keywords = extraction.keywords.len(),
            degraded = extraction.degraded,
            filtered = !request.filters.is_empty(),
            "search_start"
        );

        let query = compose(
            &request.prompt,
            size,
            request.filters.clone(),
            embedding,
            &extraction.keywords,
        );
        let hits = self.index.search(&query)?;
        info!(hits = hits.len(), "search_complete");
        Ok(hits)
    }
}
