//! Elasticsearch-compatible HTTP implementation of [`SearchIndex`].
//!
//! Every call carries the configured timeout; a timeout surfaces as
//! [`IndexError::Unavailable`] and is never retried inside a request.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::IndexError;
use crate::index_store::{BulkFailure, BulkReport, SearchIndex, schema};
use crate::model::types::{SearchHit, SongDocument};
use crate::search::compose::{ComposedQuery, to_index_dsl};

pub struct HttpIndex {
    client: reqwest::blocking::Client,
    base_url: String,
    index: String,
}

impl HttpIndex {
    pub fn new(base_url: &str, index: &str, timeout: Duration) -> Result<Self, IndexError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Unavailable(format!("http client init: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.base_url, self.index, suffix)
    }

    fn send_json(&self, req: reqwest::blocking::RequestBuilder) -> Result<Value, IndexError> {
        let resp = req
            .send()
            .map_err(|e| IndexError::Unavailable(format!("index request: {e}")))?;
        let status = resp.status();
        let body: Value = resp
            .json()
            .map_err(|e| IndexError::Rejected(format!("index response body: {e}")))?;
        if !status.is_success() {
            return Err(IndexError::Rejected(format!(
                "index returned {status}: {body}"
            )));
        }
        Ok(body)
    }
}

impl SearchIndex for HttpIndex {
    fn search(&self, query: &ComposedQuery) -> Result<Vec<SearchHit>, IndexError> {
        let dsl = to_index_dsl(query);
        debug!(index = %self.index, "index_search_execute");
        let body = self.send_json(self.client.post(self.url("/_search")).json(&dsl))?;
        let hits = body["hits"]["hits"]
            .as_array()
            .map(|hits| hits.iter().map(hit_from_value).collect())
            .unwrap_or_default();
        Ok(hits)
    }

    fn bulk_upsert(&self, docs: &[SongDocument]) -> Result<BulkReport, IndexError> {
        if docs.is_empty() {
            return Ok(BulkReport::default());
        }

        let mut ndjson = String::new();
        for doc in docs {
            let action = serde_json::json!({
                "index": { "_index": self.index, "_id": doc.song_id }
            });
            ndjson.push_str(&action.to_string());
            ndjson.push('\n');
            ndjson.push_str(
                &serde_json::to_string(doc)
                    .map_err(|e| IndexError::Rejected(format!("serialize document: {e}")))?,
            );
            ndjson.push('\n');
        }

        let body = self.send_json(
            self.client
                .post(format!("{}/_bulk", self.base_url))
                .header("content-type", "application/x-ndjson")
                .body(ndjson),
        )?;

        let mut report = BulkReport::default();
        if let Some(items) = body["items"].as_array() {
            for item in items {
                let entry = &item["index"];
                if let Some(error) = entry.get("error") {
                    report.failures.push(BulkFailure {
                        song_id: entry["_id"].as_str().unwrap_or("unknown").to_string(),
                        reason: error.to_string(),
                    });
                } else {
                    report.succeeded += 1;
                }
            }
        } else {
            // A store that acknowledges without per-item detail commits all.
            report.succeeded = docs.len();
        }
        Ok(report)
    }

    fn create_index(&self, dims: usize) -> Result<(), IndexError> {
        let resp = self
            .client
            .put(self.url(""))
            .json(&schema::index_mapping(dims))
            .send()
            .map_err(|e| IndexError::Unavailable(format!("create index: {e}")))?;
        let status = resp.status();
        if status.is_success() {
            info!(index = %self.index, dims = dims, "index_created");
            return Ok(());
        }
        let body: Value = resp.json().unwrap_or(Value::Null);
        // Idempotent create: an existing index is not an error.
        if body["error"]["type"]
            .as_str()
            .is_some_and(|t| t == "resource_already_exists_exception")
        {
            debug!(index = %self.index, "index_already_exists");
            return Ok(());
        }
        Err(IndexError::Rejected(format!(
            "create index returned {status}: {body}"
        )))
    }

    fn drop_index(&self) -> Result<(), IndexError> {
        let resp = self
            .client
            .delete(self.url(""))
            .send()
            .map_err(|e| IndexError::Unavailable(format!("drop index: {e}")))?;
        let status = resp.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            info!(index = %self.index, "index_dropped");
            return Ok(());
        }
        Err(IndexError::Rejected(format!("drop index returned {status}")))
    }

    fn ping(&self) -> Result<(), IndexError> {
        let resp = self
            .client
            .get(&self.base_url)
            .send()
            .map_err(|e| IndexError::Unavailable(format!("ping: {e}")))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(IndexError::Unavailable(format!(
                "ping returned {}",
                resp.status()
            )))
        }
    }
}

fn hit_from_value(hit: &Value) -> SearchHit {
    let source = &hit["_source"];
    let matched_signals = hit["matched_queries"]
        .as_array()
        .map(|names| {
            names
                .iter()
                .filter_map(|n| n.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    SearchHit {
        song_id: source["song_id"].as_str().unwrap_or("").to_string(),
        title: source["song_name"].as_str().unwrap_or("").to_string(),
        artist: source["name_artists"].as_str().unwrap_or("").to_string(),
        score: hit["_score"].as_f64().unwrap_or(0.0) as f32,
        matched_signals,
        spotify_url: source["spotify_url"].as_str().map(str::to_string),
        youtube_url: source["youtube_url"].as_str().map(str::to_string),
        popularity: source["popularity"].as_i64(),
        release_date: source["release_date"].as_str().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_mapping_from_store_response() {
        let raw = serde_json::json!({
            "_id": "s1",
            "_score": 4.2,
            "matched_queries": ["vector_search", "prompt_search"],
            "_source": {
                "song_id": "s1",
                "song_name": "Hurt",
                "name_artists": "Johnny Cash",
                "popularity": 80,
                "release_date": "2002-11-04",
                "spotify_url": "https://open.spotify.com/track/x",
            }
        });
        let hit = hit_from_value(&raw);
        assert_eq!(hit.song_id, "s1");
        assert_eq!(hit.title, "Hurt");
        assert_eq!(hit.artist, "Johnny Cash");
        assert!((hit.score - 4.2).abs() < 1e-5);
        assert_eq!(hit.matched_signals, vec!["vector_search", "prompt_search"]);
        assert_eq!(hit.popularity, Some(80));
        assert!(hit.youtube_url.is_none());
    }

    #[test]
    fn missing_fields_degrade_to_defaults() {
        let hit = hit_from_value(&serde_json::json!({ "_score": null, "_source": {} }));
        assert_eq!(hit.song_id, "");
        assert_eq!(hit.score, 0.0);
        assert!(hit.matched_signals.is_empty());
    }
}
