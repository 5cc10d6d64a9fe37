//! Defensive parser for the serialized artist map carried on catalog rows.
//!
//! The `songs.artists` column holds a map of artist id to display name,
//! usually Python-repr style: `{'3Nrfpe0tUJi4K4DXYWgMUX': 'BTS'}`. Real
//! rows also contain double-quoted JSON, names with apostrophes, and plain
//! garbage. Parsing goes through an explicit fallback chain - structured
//! parse, then heuristic split, then nothing - so malformed input yields a
//! null field instead of cascading across pipeline stages.

/// First-listed artist from a serialized artist map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryArtist {
    pub artist_id: String,
    pub name: Option<String>,
}

/// Parse the serialized map, returning the first-listed artist (the
/// canonical primary artist when several are linked). `None` when the
/// value is unusable.
pub fn parse_artist_map(raw: &str) -> Option<PrimaryArtist> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    structured_parse(raw)
        .or_else(|| heuristic_split(raw))
        .filter(|a| !a.artist_id.is_empty())
}

/// Strict path: treat the value as JSON after normalizing Python-style
/// single quotes. Key order is preserved, so the first entry is the
/// first-listed artist.
fn structured_parse(raw: &str) -> Option<PrimaryArtist> {
    let candidate = if raw.contains('"') {
        raw.to_string()
    } else {
        raw.replace('\'', "\"")
    };
    let value: serde_json::Value = serde_json::from_str(&candidate).ok()?;
    let map = value.as_object()?;
    let (artist_id, name) = map.iter().next()?;
    Some(PrimaryArtist {
        artist_id: artist_id.clone(),
        name: name.as_str().map(str::to_string),
    })
}

/// Loose path: take the text between the first and second quote as the id,
/// and between the third and fourth as the name.
fn heuristic_split(raw: &str) -> Option<PrimaryArtist> {
    let parts: Vec<&str> = raw.split(['\'', '"']).collect();
    let artist_id = parts.get(1)?.trim();
    if artist_id.is_empty() || artist_id.contains(['{', '}', ':', ',']) {
        return None;
    }
    let name = parts
        .get(3)
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    Some(PrimaryArtist {
        artist_id: artist_id.to_string(),
        name,
    })
}
