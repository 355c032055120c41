//! Content-addressed embedding cache.
//!
//! Keyed by `(model, content hash)` and stored independently of any index, so
//! rebuilding or deleting an index never throws away paid-for vectors.

use crate::hash::hash_text;
use crate::types::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

// ---------------------------------------------------------------------------
// Vector (de)serialization — f32 little-endian blobs
// ---------------------------------------------------------------------------

pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub models: Vec<String>,
}

pub struct EmbeddingCache {
    conn: Connection,
}

impl EmbeddingCache {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS embeddings (
                model        TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                vector       BLOB NOT NULL,
                created_at   TEXT NOT NULL,
                PRIMARY KEY (model, content_hash)
            );",
        )?;
        Ok(EmbeddingCache { conn })
    }

    /// In-memory cache for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS embeddings (
                model        TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                vector       BLOB NOT NULL,
                created_at   TEXT NOT NULL,
                PRIMARY KEY (model, content_hash)
            );",
        )?;
        Ok(EmbeddingCache { conn })
    }

    pub fn get(&self, model: &str, content: &str) -> Result<Option<Vec<f32>>> {
        let key = hash_text(content);
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT vector FROM embeddings WHERE model = ?1 AND content_hash = ?2",
                params![model, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.map(|b| bytes_to_vector(&b)))
    }

    pub fn put(&self, model: &str, content: &str, vector: &[f32]) -> Result<()> {
        let key = hash_text(content);
        self.conn.execute(
            "INSERT OR REPLACE INTO embeddings (model, content_hash, vector, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![model, key, vector_to_bytes(vector), chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Write back a batch of resolved misses in one transaction.
    pub fn put_batch(&mut self, model: &str, entries: &[(&str, &[f32])]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO embeddings (model, content_hash, vector, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let now = chrono::Utc::now().to_rfc3339();
            for (content, vector) in entries {
                stmt.execute(params![model, hash_text(content), vector_to_bytes(vector), now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let entries: usize =
            self.conn.query_row("SELECT COUNT(*) FROM embeddings", [], |r| r.get(0))?;
        let mut stmt =
            self.conn.prepare("SELECT DISTINCT model FROM embeddings ORDER BY model")?;
        let models = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(CacheStats { entries, models })
    }

    pub fn clear(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM embeddings", [])?;
        Ok(removed)
    }

    pub fn close(self) {
        let _ = self.conn.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_miss() {
        let cache = EmbeddingCache::open_in_memory().unwrap();
        assert!(cache.get("m:a", "text").unwrap().is_none());

        let vector = vec![0.25f32, -1.0, 3.5];
        cache.put("m:a", "text", &vector).unwrap();
        assert_eq!(cache.get("m:a", "text").unwrap().unwrap(), vector);

        // different model, same content: separate entry
        assert!(cache.get("m:b", "text").unwrap().is_none());
    }

    #[test]
    fn test_batch_stats_clear() {
        let mut cache = EmbeddingCache::open_in_memory().unwrap();
        let v1 = vec![1.0f32];
        let v2 = vec![2.0f32];
        cache
            .put_batch("m:a", &[("one", v1.as_slice()), ("two", v2.as_slice())])
            .unwrap();
        cache.put("m:b", "one", &v1).unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.models, vec!["m:a".to_string(), "m:b".to_string()]);

        assert_eq!(cache.clear().unwrap(), 3);
        assert_eq!(cache.stats().unwrap().entries, 0);
    }

    #[test]
    fn test_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("embeddings.db");
        {
            let cache = EmbeddingCache::open(&path).unwrap();
            cache.put("m:a", "persisted", &[9.0]).unwrap();
            cache.close();
        }
        let cache = EmbeddingCache::open(&path).unwrap();
        assert_eq!(cache.get("m:a", "persisted").unwrap().unwrap(), vec![9.0]);
    }

    #[test]
    fn test_vector_bytes_round_trip() {
        let v = vec![0.0f32, -0.5, 123.456, f32::MIN_POSITIVE];
        assert_eq!(bytes_to_vector(&vector_to_bytes(&v)), v);
    }
}
