//! Normalized entity structs shared by the serving and indexing paths.

use serde::{Deserialize, Serialize};

/// Default result-size bound when the caller does not specify one.
pub const DEFAULT_SEARCH_SIZE: usize = 20;

/// Hard server-side cap on requested result size.
pub const MAX_SEARCH_SIZE: usize = 100;

/// One song as persisted in the search index.
///
/// The document is created and fully replaced only by the index builder
/// (upsert by `song_id`). A document with no embedding never enters the
/// index, so `embedding` is non-optional here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongDocument {
    pub song_id: String,
    pub song_name: String,
    pub artist_id: Option<String>,
    /// Canonical primary artist name (first-listed when several are linked).
    pub name_artists: Option<String>,
    pub album_name: Option<String>,
    pub song_type: Option<String>,
    /// ISO date string (`YYYY-MM-DD`).
    pub release_date: Option<String>,
    pub popularity: Option<i64>,
    pub lyrics: Option<String>,
    pub genre: Option<String>,
    /// Fixed-length vector, cosine metric. Length is constant across the index.
    pub embedding: Vec<f32>,
    pub spotify_url: Option<String>,
    pub youtube_url: Option<String>,
    /// Acoustic energy in [0, 1].
    pub energy: Option<f64>,
}

/// Inclusive range filter; either bound may be open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter<T> {
    pub from: Option<T>,
    pub to: Option<T>,
}

impl<T> RangeFilter<T> {
    pub fn new(from: Option<T>, to: Option<T>) -> Option<Self> {
        if from.is_none() && to.is_none() {
            None
        } else {
            Some(Self { from, to })
        }
    }
}

impl<T: PartialOrd> RangeFilter<T> {
    /// Whether `value` falls inside the range. A range with `from > to`
    /// admits nothing, which is the contract for impossible filters:
    /// zero results, never an error.
    pub fn contains(&self, value: &T) -> bool {
        if let Some(from) = &self.from
            && value < from
        {
            return false;
        }
        if let Some(to) = &self.to
            && value > to
        {
            return false;
        }
        true
    }
}

/// Structured filters; all supplied filters must hold (conjunctive).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub song_type: Option<String>,
    pub genre: Option<String>,
    pub release_date: Option<RangeFilter<String>>,
    pub popularity: Option<RangeFilter<i64>>,
    pub energy: Option<RangeFilter<f64>>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// One search request as consumed by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub prompt: String,
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default)]
    pub filters: SearchFilters,
}

fn default_size() -> usize {
    DEFAULT_SEARCH_SIZE
}

impl SearchRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            size: DEFAULT_SEARCH_SIZE,
            filters: SearchFilters::default(),
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Requested size clamped to the server cap, never zero.
    pub fn effective_size(&self) -> usize {
        self.size.clamp(1, MAX_SEARCH_SIZE)
    }
}

/// One ranked hit. Scores order results within a single request only;
/// they are not calibrated across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub score: f32,
    /// Names of the clauses that contributed to this hit.
    pub matched_signals: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spotify_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_size_is_capped_and_positive() {
        assert_eq!(SearchRequest::new("x").with_size(0).effective_size(), 1);
        assert_eq!(SearchRequest::new("x").with_size(5).effective_size(), 5);
        assert_eq!(
            SearchRequest::new("x").with_size(10_000).effective_size(),
            MAX_SEARCH_SIZE
        );
    }

    #[test]
    fn impossible_range_admits_nothing() {
        let r = RangeFilter {
            from: Some(90),
            to: Some(10),
        };
        assert!(!r.contains(&10));
        assert!(!r.contains(&50));
        assert!(!r.contains(&90));
    }

    #[test]
    fn open_ended_ranges() {
        let r = RangeFilter {
            from: Some(50),
            to: None,
        };
        assert!(r.contains(&50));
        assert!(r.contains(&99));
        assert!(!r.contains(&49));

        let r = RangeFilter {
            from: None,
            to: Some(0.5f64),
        };
        assert!(r.contains(&0.1));
        assert!(!r.contains(&0.9));
    }

    #[test]
    fn range_filter_new_drops_fully_open() {
        assert!(RangeFilter::<i64>::new(None, None).is_none());
        assert!(RangeFilter::new(Some(1), None).is_some());
    }
}
