/*!
 * Repository layer for the durable translation cache.
 *
 * All SQL lives here. Rows are keyed by the SHA256 of the normalized source
 * text together with both languages and the engine identity; writes are
 * atomic upserts where the latest translation wins.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::path::Path;

use super::connection::DatabaseConnection;
use super::models::{CacheRecord, DurableStats};

/// Repository for cache database operations
#[derive(Clone, Debug)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open (or create) a repository backed by the file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new(path)?))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    /// Compute SHA256 hash of text
    pub fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up a translation and record the hit
    pub fn get_cached_translation(
        &self,
        source_text: &str,
        source_language: &str,
        target_language: &str,
        engine: &str,
    ) -> Result<Option<String>> {
        let source_text_hash = Self::hash_text(source_text);

        self.db.execute(|conn| {
            let found: Option<(i64, String)> = conn
                .query_row(
                    r#"
                    SELECT id, translated_text
                    FROM translation_cache
                    WHERE source_text_hash = ?1
                      AND source_language = ?2
                      AND target_language = ?3
                      AND engine = ?4
                    "#,
                    params![source_text_hash, source_language, target_language, engine],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match found {
                Some((id, translated_text)) => {
                    conn.execute(
                        "UPDATE translation_cache SET hit_count = hit_count + 1, last_accessed = ?2 WHERE id = ?1",
                        params![id, chrono::Utc::now().to_rfc3339()],
                    )?;
                    Ok(Some(translated_text))
                }
                None => Ok(None),
            }
        })
    }

    /// Store a translation; an existing row for the same key is overwritten
    pub fn cache_translation(&self, record: &CacheRecord) -> Result<()> {
        self.db.execute(|conn| {
            conn.execute(
                r#"
                INSERT INTO translation_cache (
                    source_text_hash, source_text, source_language, target_language,
                    engine, translated_text, created_at, last_accessed, hit_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(source_text_hash, source_language, target_language, engine)
                DO UPDATE SET
                    translated_text = excluded.translated_text,
                    source_text = excluded.source_text,
                    last_accessed = excluded.last_accessed
                "#,
                params![
                    record.source_text_hash,
                    record.source_text,
                    record.source_language,
                    record.target_language,
                    record.engine,
                    record.translated_text,
                    record.created_at,
                    record.last_accessed,
                    record.hit_count,
                ],
            )?;
            Ok(())
        })
    }

    /// Number of stored translations
    pub fn count(&self) -> Result<i64> {
        self.db.execute(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM translation_cache", [], |row| row.get(0))?)
        })
    }

    /// Get cache statistics
    pub fn get_cache_stats(&self) -> Result<DurableStats> {
        let (total_entries, total_hits): (i64, i64) = self.db.execute(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(hit_count), 0) FROM translation_cache",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?)
        })?;

        Ok(DurableStats {
            total_entries,
            total_hits,
            file_size_bytes: self.db.file_size(),
        })
    }

    /// Delete every stored translation
    pub fn clear_cache(&self) -> Result<i64> {
        self.db.execute(|conn| {
            let deleted = conn.execute("DELETE FROM translation_cache", [])?;
            debug!("Cleared {} cached translations", deleted);
            Ok(deleted as i64)
        })
    }

    /// Delete rows whose translation merely repeats the source
    pub fn prune_identical(&self) -> Result<i64> {
        self.db.execute(|conn| {
            let deleted = conn.execute(
                "DELETE FROM translation_cache WHERE LOWER(TRIM(translated_text)) = LOWER(TRIM(source_text))",
                [],
            )?;
            Ok(deleted as i64)
        })
    }

    /// Delete rows not accessed in the last `days` days
    pub fn prune_older_than(&self, days: u32) -> Result<i64> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(i64::from(days))).to_rfc3339();
        self.db.execute(|conn| {
            let deleted = conn.execute(
                "DELETE FROM translation_cache WHERE last_accessed < ?1",
                params![cutoff],
            )?;
            Ok(deleted as i64)
        })
    }

    /// Reclaim space after pruning
    pub async fn optimize(&self) -> Result<()> {
        self.db
            .execute_async(|conn| {
                conn.execute_batch("VACUUM; ANALYZE;")?;
                Ok(())
            })
            .await
    }
}
