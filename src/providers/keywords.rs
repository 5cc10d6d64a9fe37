//! Keyword extraction over a generative chat provider.
//!
//! The provider is intentionally nondeterministic across calls, so results
//! are never cached. Its output is also unreliable: the contract asks for
//! `{"keywords": [...]}` but real responses drift. Parsing goes through an
//! explicit fallback chain and malformed *content* degrades to an empty
//! keyword list instead of failing the request. Only transport/auth
//! failures raise.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::ProviderError;

/// Upper bound on keywords kept from one extraction.
pub const MAX_KEYWORDS: usize = 10;

const SYSTEM_PROMPT: &str = "You are a music assistant. \
    Extract up to 10 concise English keywords that best describe the prompt. \
    Return exactly: {\"keywords\": [ ... ]}";

/// Capability: one chat completion round-trip, returning the raw content.
pub trait ChatCompleter: Send + Sync {
    fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}

/// Outcome of parsing a keyword payload, handled exhaustively by the
/// extractor instead of nested existence checks.
#[derive(Debug, Clone, PartialEq)]
pub enum KeywordParse {
    /// Strict shape: object with a `keywords` list field.
    Object(Vec<String>),
    /// Provider returned a bare list whose elements are all strings.
    BareList(Vec<String>),
    /// Unusable content; the reason is logged, the result degrades.
    Malformed(String),
}

/// Ordered keyword list, possibly empty. Emptiness is a valid degraded
/// state, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordExtraction {
    pub keywords: Vec<String>,
    /// True when the provider payload was malformed and we fell back to
    /// an empty list.
    pub degraded: bool,
}

impl KeywordExtraction {
    pub fn empty_degraded() -> Self {
        Self {
            keywords: Vec::new(),
            degraded: true,
        }
    }
}

/// Parse raw provider content through the fallback chain.
pub fn parse_keyword_payload(raw: &str) -> KeywordParse {
    let value: Value = match serde_json::from_str(raw.trim()) {
        Ok(v) => v,
        Err(e) => return KeywordParse::Malformed(format!("not JSON: {e}")),
    };

    match value {
        Value::Object(map) => match map.get("keywords") {
            Some(Value::Array(items)) => match collect_strings(items) {
                Some(kws) => KeywordParse::Object(kws),
                None => KeywordParse::Malformed(
                    "keywords list contains non-string elements".to_string(),
                ),
            },
            Some(other) => {
                KeywordParse::Malformed(format!("keywords field is not a list: {other}"))
            }
            None => KeywordParse::Malformed("object has no keywords field".to_string()),
        },
        Value::Array(items) => match collect_strings(&items) {
            Some(kws) => KeywordParse::BareList(kws),
            None => KeywordParse::Malformed("bare list contains non-string elements".to_string()),
        },
        other => KeywordParse::Malformed(format!("unexpected JSON shape: {other}")),
    }
}

fn collect_strings(items: &[Value]) -> Option<Vec<String>> {
    items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Trim, drop empties, cap at [`MAX_KEYWORDS`], preserving order.
fn clean_keywords(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .take(MAX_KEYWORDS)
        .collect()
}

/// Extractor over any [`ChatCompleter`].
pub struct KeywordExtractor {
    completer: Arc<dyn ChatCompleter>,
}

impl KeywordExtractor {
    pub fn new(completer: Arc<dyn ChatCompleter>) -> Self {
        Self { completer }
    }

    /// Extract an ordered keyword list from a prompt.
    ///
    /// Never raises on malformed content; raises
    /// [`ProviderError::Unavailable`] only on transport/auth failure.
    pub fn extract(&self, prompt: &str) -> Result<KeywordExtraction, ProviderError> {
        let raw = match self.completer.complete(SYSTEM_PROMPT, prompt) {
            Ok(raw) => raw,
            Err(ProviderError::Unavailable(reason)) => {
                return Err(ProviderError::Unavailable(reason));
            }
            Err(ProviderError::MalformedResponse(reason)) => {
                warn!(reason = %reason, "keyword_payload_malformed");
                return Ok(KeywordExtraction::empty_degraded());
            }
        };

        match parse_keyword_payload(&raw) {
            KeywordParse::Object(kws) => Ok(KeywordExtraction {
                keywords: clean_keywords(kws),
                degraded: false,
            }),
            KeywordParse::BareList(kws) => {
                warn!("keyword_payload_bare_list");
                Ok(KeywordExtraction {
                    keywords: clean_keywords(kws),
                    degraded: false,
                })
            }
            KeywordParse::Malformed(reason) => {
                warn!(reason = %reason, "keyword_payload_malformed");
                Ok(KeywordExtraction::empty_degraded())
            }
        }
    }
}

/// OpenAI-compatible `/v1/chat/completions` client.
pub struct HttpChatCompleter {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl HttpChatCompleter {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("http client init: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

impl ChatCompleter for HttpChatCompleter {
    fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user },
                ],
                "response_format": { "type": "json_object" },
                "temperature": 0,
            }))
            .send()
            .map_err(|e| ProviderError::Unavailable(format!("chat request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "chat request returned {status}"
            )));
        }

        let body: ChatResponse = resp
            .json()
            .map_err(|e| ProviderError::MalformedResponse(format!("chat body: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                ProviderError::MalformedResponse("chat response had no choices".to_string())
            })
    }
}
