//! Source-of-truth catalog: SQLite backend for songs, lyrics, artists,
//! genres, links, and the precomputed embedding store.
//!
//! The indexing pipeline is a pure reader here; it never mutates the
//! catalog.

pub mod artists;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::info;

/// One joined row as read from the catalog, before transformation.
/// Everything except the key is nullable at this stage.
#[derive(Debug, Clone)]
pub struct CatalogRow {
    pub song_id: String,
    pub song_name: Option<String>,
    /// Serialized artist map, parsed defensively downstream.
    pub artists_raw: Option<String>,
    pub popularity: Option<i64>,
    pub song_type: Option<String>,
    pub album_name: Option<String>,
    pub release_date: Option<String>,
    pub energy: Option<f64>,
    pub lyrics: Option<String>,
    /// JSON-serialized embedding vector from the embedding store.
    pub embedding_json: Option<String>,
    pub genre: Option<String>,
    pub spotify_url: Option<String>,
    pub youtube_url: Option<String>,
}

const ROWS_SQL: &str = "\
    SELECT
        s.song_id,
        s.song_name,
        s.artists,
        s.popularity,
        s.song_type,
        s.album_name,
        s.release_date,
        s.energy,
        l.lyrics,
        e.embedding,
        g.genre,
        k.spotify_url,
        k.youtube_url
    FROM songs s
    LEFT JOIN lyrics l ON l.song_id = s.song_id
    LEFT JOIN embeddings e ON e.song_id = s.song_id
    LEFT JOIN song_genres g ON g.song_id = s.song_id
    LEFT JOIN song_links k ON k.song_id = s.song_id
    ORDER BY s.song_id";

pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    /// Open the catalog read-only. Fails when the file is missing rather
    /// than silently creating an empty database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("open catalog at {}", path.display()))?;
        info!(path = %path.display(), "catalog_opened");
        Ok(Self { conn })
    }

    /// Wrap an existing connection (fixtures and tests).
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Load every joined song row, ordered by key for deterministic runs.
    pub fn load_rows(&self) -> Result<Vec<CatalogRow>> {
        let mut stmt = self
            .conn
            .prepare(ROWS_SQL)
            .context("prepare catalog row query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CatalogRow {
                    song_id: row.get(0)?,
                    song_name: row.get(1)?,
                    artists_raw: row.get(2)?,
                    popularity: row.get(3)?,
                    song_type: row.get(4)?,
                    album_name: row.get(5)?,
                    release_date: row.get(6)?,
                    energy: row.get(7)?,
                    lyrics: row.get(8)?,
                    embedding_json: row.get(9)?,
                    genre: row.get(10)?,
                    spotify_url: row.get(11)?,
                    youtube_url: row.get(12)?,
                })
            })
            .context("query catalog rows")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("read catalog rows")?;
        info!(rows = rows.len(), "catalog_rows_loaded");
        Ok(rows)
    }

    /// Canonical artist names keyed by artist id.
    pub fn load_artist_names(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT artist_id, name FROM artists")
            .context("prepare artist name query")?;
        let names = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("query artist names")?
            .collect::<std::result::Result<HashMap<_, _>, _>>()
            .context("read artist names")?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal catalog schema shared by unit fixtures.
    pub(crate) const FIXTURE_SCHEMA: &str = "\
        CREATE TABLE songs (
            song_id TEXT PRIMARY KEY,
            song_name TEXT,
            artists TEXT,
            popularity INTEGER,
            song_type TEXT,
            album_name TEXT,
            release_date TEXT,
            energy REAL
        );
        CREATE TABLE lyrics (song_id TEXT PRIMARY KEY, lyrics TEXT);
        CREATE TABLE embeddings (song_id TEXT PRIMARY KEY, embedding TEXT);
        CREATE TABLE artists (artist_id TEXT PRIMARY KEY, name TEXT);
        CREATE TABLE song_genres (song_id TEXT PRIMARY KEY, genre TEXT);
        CREATE TABLE song_links (
            song_id TEXT PRIMARY KEY,
            spotify_url TEXT,
            youtube_url TEXT
        );";

    fn fixture() -> CatalogStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(FIXTURE_SCHEMA).unwrap();
        conn.execute_batch(
            "INSERT INTO songs VALUES
                ('s1', 'Hurt', '{''a1'': ''Johnny Cash''}', 80, 'Solo', 'American IV', '2002-11-04', 0.3),
                ('s2', 'No Embedding', NULL, NULL, NULL, NULL, NULL, NULL);
             INSERT INTO lyrics VALUES ('s1', 'what have I become');
             INSERT INTO embeddings VALUES ('s1', '[0.1, 0.2, 0.3]');
             INSERT INTO artists VALUES ('a1', 'Johnny Cash');
             INSERT INTO song_genres VALUES ('s1', 'country');
             INSERT INTO song_links VALUES ('s1', 'https://open.spotify.com/track/x', NULL);",
        )
        .unwrap();
        CatalogStore::from_connection(conn)
    }

    #[test]
    fn joined_rows_are_ordered_and_nullable() {
        let store = fixture();
        let rows = store.load_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].song_id, "s1");
        assert_eq!(rows[0].lyrics.as_deref(), Some("what have I become"));
        assert_eq!(rows[0].genre.as_deref(), Some("country"));
        assert!(rows[0].embedding_json.is_some());
        assert_eq!(rows[1].song_id, "s2");
        assert!(rows[1].embedding_json.is_none());
        assert!(rows[1].song_name.is_some());
        assert!(rows[1].artists_raw.is_none());
    }

    #[test]
    fn artist_names_by_id() {
        let store = fixture();
        let names = store.load_artist_names().unwrap();
        assert_eq!(names.get("a1").map(String::as_str), Some("Johnny Cash"));
    }

    #[test]
    fn open_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(CatalogStore::open(&tmp.path().join("absent.db")).is_err());
    }
}
