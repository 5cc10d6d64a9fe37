//! Query composition: one ranked request from prompt, filters, and the
//! embedding/keyword outputs.
//!
//! The three text signals combine **disjunctively**: each matching clause
//! contributes to the score and no single signal gates the others. A strong
//! semantic match surfaces even with weak lexical overlap, and a literal
//! title/artist mention in the prompt surfaces even when keyword extraction
//! yields nothing. Filters combine **conjunctively** and must all pass.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::model::types::{RangeFilter, SearchFilters};

/// Candidate pool examined by the nearest-neighbor clause before final
/// ranking. Oversampling keeps recall while capping cost.
pub const NUM_CANDIDATES: usize = 100;

/// Weighted match fields shared by the lexical and fuzzy clauses:
/// title highest, artist medium, lyrics lowest.
pub const MATCH_FIELDS: &[(&str, f32)] = &[
    ("song_name", 3.0),
    ("name_artists", 2.0),
    ("lyrics", 1.0),
];

/// Signal names carried on hits for explainability.
pub const SIGNAL_VECTOR: &str = "vector_search";
pub const SIGNAL_KEYWORD: &str = "keyword_search";
pub const SIGNAL_PROMPT: &str = "prompt_search";

/// Nearest-neighbor clause over the embedding field.
#[derive(Debug, Clone)]
pub struct VectorClause {
    pub embedding: Arc<Vec<f32>>,
    pub num_candidates: usize,
}

/// Weighted multi-field text clause; `fuzzy` adds edit-distance tolerance.
#[derive(Debug, Clone)]
pub struct TextClause {
    pub query: String,
    pub fuzzy: bool,
}

/// The assembled multi-signal request executed by a search index backend.
#[derive(Debug, Clone)]
pub struct ComposedQuery {
    pub size: usize,
    pub vector: Option<VectorClause>,
    /// Lexical clause over the extracted keyword string; omitted when
    /// extraction yielded nothing (the degraded state).
    pub lexical: Option<TextClause>,
    /// Fuzzy clause over the raw prompt.
    pub fuzzy: Option<TextClause>,
    pub filters: SearchFilters,
}

/// Assemble one ranked request.
pub fn compose(
    prompt: &str,
    size: usize,
    filters: SearchFilters,
    embedding: Arc<Vec<f32>>,
    keywords: &[String],
) -> ComposedQuery {
    let lexical = if keywords.is_empty() {
        None
    } else {
        Some(TextClause {
            query: keywords.join(" "),
            fuzzy: false,
        })
    };
    ComposedQuery {
        size,
        vector: Some(VectorClause {
            embedding,
            num_candidates: NUM_CANDIDATES,
        }),
        lexical,
        fuzzy: Some(TextClause {
            query: prompt.to_string(),
            fuzzy: true,
        }),
        filters,
    }
}

/// Render the composed query as an Elasticsearch-compatible request body.
///
/// Clauses carry `_name` tags so the store reports which signals matched
/// each hit; filters land in the bool `filter` context so they constrain
/// without contributing to the score.
pub fn to_index_dsl(query: &ComposedQuery) -> Value {
    let mut should: Vec<Value> = Vec::new();

    if let Some(vector) = &query.vector {
        should.push(json!({
            "knn": {
                "field": "embedding",
                "query_vector": vector.embedding.as_slice(),
                "num_candidates": vector.num_candidates,
                "_name": SIGNAL_VECTOR,
            }
        }));
    }
    if let Some(lexical) = &query.lexical {
        should.push(multi_match(&lexical.query, false, SIGNAL_KEYWORD));
    }
    if let Some(fuzzy) = &query.fuzzy {
        should.push(multi_match(&fuzzy.query, fuzzy.fuzzy, SIGNAL_PROMPT));
    }

    let mut bool_clause = json!({ "should": should });
    let filters = filter_clauses(&query.filters);
    if !filters.is_empty() {
        bool_clause["filter"] = Value::Array(filters);
    }

    json!({
        "size": query.size,
        "query": { "bool": bool_clause },
    })
}

fn multi_match(text: &str, fuzzy: bool, name: &str) -> Value {
    let fields: Vec<String> = MATCH_FIELDS
        .iter()
        .map(|(field, weight)| {
            if (*weight - 1.0).abs() < f32::EPSILON {
                (*field).to_string()
            } else {
                format!("{field}^{weight:.0}")
            }
        })
        .collect();
    let mut clause = json!({
        "query": text,
        "fields": fields,
        "type": "most_fields",
        "_name": name,
    });
    if fuzzy {
        clause["fuzziness"] = json!("AUTO");
    }
    json!({ "multi_match": clause })
}

fn filter_clauses(filters: &SearchFilters) -> Vec<Value> {
    let mut out = Vec::new();
    if let Some(artist) = &filters.artist {
        out.push(json!({ "term": { "name_artists.keyword": artist } }));
    }
    if let Some(album) = &filters.album {
        out.push(json!({ "term": { "album_name.keyword": album } }));
    }
    if let Some(song_type) = &filters.song_type {
        out.push(json!({ "term": { "song_type": song_type } }));
    }
    if let Some(genre) = &filters.genre {
        out.push(json!({ "term": { "genre": genre } }));
    }
    if let Some(range) = &filters.release_date {
        out.push(range_clause("release_date", range, |v| json!(v)));
    }
    if let Some(range) = &filters.popularity {
        out.push(range_clause("popularity", range, |v| json!(v)));
    }
    if let Some(range) = &filters.energy {
        out.push(range_clause("energy", range, |v| json!(v)));
    }
    out
}

fn range_clause<T, F>(field: &str, range: &RangeFilter<T>, to_value: F) -> Value
where
    F: Fn(&T) -> Value,
{
    let mut bounds = serde_json::Map::new();
    if let Some(from) = &range.from {
        bounds.insert("gte".to_string(), to_value(from));
    }
    if let Some(to) = &range.to {
        bounds.insert("lte".to_string(), to_value(to));
    }
    json!({ "range": { field: bounds } })
}
