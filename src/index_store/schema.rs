//! Index mapping for song documents.
//!
//! The pipeline owns this schema; serving code never mutates it.

use serde_json::{Value, json};

/// Mapping body for index creation. `dims` is the constant embedding
/// dimension enforced across every document.
pub fn index_mapping(dims: usize) -> Value {
    json!({
        "mappings": {
            "properties": {
                "song_id": { "type": "keyword" },
                "song_name": { "type": "text", "analyzer": "standard" },
                "lyrics": { "type": "text", "analyzer": "standard" },
                "popularity": { "type": "integer" },
                "song_type": { "type": "keyword" },
                "album_name": {
                    "type": "text",
                    "analyzer": "standard",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "release_date": { "type": "date" },
                "artist_id": { "type": "keyword" },
                "name_artists": {
                    "type": "text",
                    "analyzer": "standard",
                    "fields": { "keyword": { "type": "keyword" } }
                },
                "genre": { "type": "keyword" },
                "spotify_url": { "type": "keyword" },
                "youtube_url": { "type": "keyword" },
                "energy": { "type": "float" },
                "embedding": {
                    "type": "dense_vector",
                    "dims": dims,
                    "index": true,
                    "similarity": "cosine"
                }
            }
        }
    })
}
