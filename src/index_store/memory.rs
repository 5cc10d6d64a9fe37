//! In-process [`SearchIndex`] implementation.
//!
//! Scores the same three signals as the HTTP store: cosine similarity over
//! the embedding (restricted to the candidate pool), weighted term overlap
//! for the lexical clause, and normalized edit similarity for the fuzzy
//! clause. Scores only need to rank within a request, not match the
//! external engine's calibration.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::error::IndexError;
use crate::index_store::{BulkFailure, BulkReport, SearchIndex};
use crate::model::types::{SearchFilters, SearchHit, SongDocument};
use crate::search::compose::{
    ComposedQuery, MATCH_FIELDS, SIGNAL_KEYWORD, SIGNAL_PROMPT, SIGNAL_VECTOR, TextClause,
};

/// Minimum normalized edit similarity for a fuzzy term match.
const FUZZY_THRESHOLD: f64 = 0.8;

struct State {
    dims: usize,
    docs: HashMap<String, SongDocument>,
}

/// Thread-safe in-memory index. `None` state means the index does not exist.
#[derive(Default)]
pub struct MemoryIndex {
    state: RwLock<Option<State>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents currently in the index, ordered by key (test/diagnostic use).
    pub fn documents(&self) -> Vec<SongDocument> {
        let state = self.state.read();
        let mut docs: Vec<SongDocument> = state
            .as_ref()
            .map(|s| s.docs.values().cloned().collect())
            .unwrap_or_default();
        docs.sort_by(|a, b| a.song_id.cmp(&b.song_id));
        docs
    }

    pub fn len(&self) -> usize {
        self.state.read().as_ref().map_or(0, |s| s.docs.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, song_id: &str) -> bool {
        self.state
            .read()
            .as_ref()
            .is_some_and(|s| s.docs.contains_key(song_id))
    }
}

impl SearchIndex for MemoryIndex {
    fn search(&self, query: &ComposedQuery) -> Result<Vec<SearchHit>, IndexError> {
        let state = self.state.read();
        let state = state
            .as_ref()
            .ok_or_else(|| IndexError::Rejected("index does not exist".to_string()))?;

        // Candidate pool for the vector clause: top-N by cosine.
        let pool: HashSet<&str> = match &query.vector {
            Some(vector) => {
                let mut ranked: Vec<(&str, f64)> = state
                    .docs
                    .values()
                    .map(|d| (d.song_id.as_str(), cosine(&vector.embedding, &d.embedding)))
                    .collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
                ranked
                    .into_iter()
                    .take(vector.num_candidates)
                    .map(|(id, _)| id)
                    .collect()
            }
            None => HashSet::new(),
        };

        let mut hits: Vec<SearchHit> = Vec::new();
        for doc in state.docs.values() {
            if !matches_filters(doc, &query.filters) {
                continue;
            }

            let mut score = 0.0f64;
            let mut signals = Vec::new();

            if let Some(vector) = &query.vector
                && pool.contains(doc.song_id.as_str())
            {
                // Same shape as the dense-vector cosine score: 1.0 at
                // distance zero, maximal vector contribution.
                let contribution = (1.0 + cosine(&vector.embedding, &doc.embedding)) / 2.0;
                if contribution > 0.0 {
                    score += contribution;
                    signals.push(SIGNAL_VECTOR.to_string());
                }
            }
            if let Some(lexical) = &query.lexical {
                let contribution = text_score(doc, lexical);
                if contribution > 0.0 {
                    score += contribution;
                    signals.push(SIGNAL_KEYWORD.to_string());
                }
            }
            if let Some(fuzzy) = &query.fuzzy {
                let contribution = text_score(doc, fuzzy);
                if contribution > 0.0 {
                    score += contribution;
                    signals.push(SIGNAL_PROMPT.to_string());
                }
            }

            if score > 0.0 {
                hits.push(SearchHit {
                    song_id: doc.song_id.clone(),
                    title: doc.song_name.clone(),
                    artist: doc.name_artists.clone().unwrap_or_default(),
                    score: score as f32,
                    matched_signals: signals,
                    spotify_url: doc.spotify_url.clone(),
                    youtube_url: doc.youtube_url.clone(),
                    popularity: doc.popularity,
                    release_date: doc.release_date.clone(),
                });
            }
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.song_id.cmp(&b.song_id)));
        hits.truncate(query.size);
        Ok(hits)
    }

    fn bulk_upsert(&self, docs: &[SongDocument]) -> Result<BulkReport, IndexError> {
        let mut state = self.state.write();
        let state = state
            .as_mut()
            .ok_or_else(|| IndexError::Rejected("index does not exist".to_string()))?;

        let mut report = BulkReport::default();
        for doc in docs {
            if doc.embedding.len() != state.dims {
                report.failures.push(BulkFailure {
                    song_id: doc.song_id.clone(),
                    reason: format!(
                        "embedding dims {} do not match index dims {}",
                        doc.embedding.len(),
                        state.dims
                    ),
                });
                continue;
            }
            state.docs.insert(doc.song_id.clone(), doc.clone());
            report.succeeded += 1;
        }
        Ok(report)
    }

    fn create_index(&self, dims: usize) -> Result<(), IndexError> {
        let mut state = self.state.write();
        if state.is_none() {
            *state = Some(State {
                dims,
                docs: HashMap::new(),
            });
        }
        Ok(())
    }

    fn drop_index(&self) -> Result<(), IndexError> {
        *self.state.write() = None;
        Ok(())
    }

    fn ping(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn field_text<'a>(doc: &'a SongDocument, field: &str) -> Option<&'a str> {
    match field {
        "song_name" => Some(doc.song_name.as_str()),
        "name_artists" => doc.name_artists.as_deref(),
        "lyrics" => doc.lyrics.as_deref(),
        _ => None,
    }
}

/// Weighted multi-field match score in [0, 1]: per field, the fraction of
/// query terms found (exactly, or within edit distance for fuzzy clauses),
/// weighted by field and normalized by total weight.
fn text_score(doc: &SongDocument, clause: &TextClause) -> f64 {
    let terms = tokens(&clause.query);
    if terms.is_empty() {
        return 0.0;
    }
    let total_weight: f64 = MATCH_FIELDS.iter().map(|(_, w)| f64::from(*w)).sum();

    let mut score = 0.0f64;
    for (field, weight) in MATCH_FIELDS {
        let Some(text) = field_text(doc, field) else {
            continue;
        };
        let field_tokens = tokens(text);
        if field_tokens.is_empty() {
            continue;
        }
        let mut matched = 0.0f64;
        for term in &terms {
            if clause.fuzzy {
                let best = field_tokens
                    .iter()
                    .map(|t| strsim::normalized_levenshtein(term, t))
                    .fold(0.0f64, f64::max);
                if best >= FUZZY_THRESHOLD {
                    matched += best;
                }
            } else if field_tokens.iter().any(|t| t == term) {
                matched += 1.0;
            }
        }
        score += f64::from(*weight) * (matched / terms.len() as f64);
    }
    score / total_weight
}

fn matches_filters(doc: &SongDocument, filters: &SearchFilters) -> bool {
    if let Some(artist) = &filters.artist
        && doc.name_artists.as_deref() != Some(artist.as_str())
    {
        return false;
    }
    if let Some(album) = &filters.album
        && doc.album_name.as_deref() != Some(album.as_str())
    {
        return false;
    }
    if let Some(song_type) = &filters.song_type
        && doc.song_type.as_deref() != Some(song_type.as_str())
    {
        return false;
    }
    if let Some(genre) = &filters.genre
        && doc.genre.as_deref() != Some(genre.as_str())
    {
        return false;
    }
    if let Some(range) = &filters.release_date {
        // ISO dates order lexicographically.
        match &doc.release_date {
            Some(date) => {
                if !range.contains(date) {
                    return false;
                }
            }
            None => return false,
        }
    }
    if let Some(range) = &filters.popularity {
        match doc.popularity {
            Some(popularity) => {
                if !range.contains(&popularity) {
                    return false;
                }
            }
            None => return false,
        }
    }
    if let Some(range) = &filters.energy {
        match doc.energy {
            Some(energy) => {
                if !range.contains(&energy) {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}
