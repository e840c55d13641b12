/*!
 * Row types for the durable cache.
 */

use serde::{Deserialize, Serialize};

/// One row of `translation_cache`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheRecord {
    /// Database ID (0 until stored)
    pub id: i64,
    /// SHA256 hash of the normalized source text
    pub source_text_hash: String,
    /// Normalized source text
    pub source_text: String,
    /// Source language code
    pub source_language: String,
    /// Target language code
    pub target_language: String,
    /// Backend identity that produced the translation
    pub engine: String,
    /// Translated text
    pub translated_text: String,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last read or write (RFC 3339)
    pub last_accessed: String,
    /// Number of cache hits
    pub hit_count: i64,
}

impl CacheRecord {
    /// Create a new, not yet stored record
    pub fn new(
        source_text_hash: String,
        source_text: String,
        source_language: String,
        target_language: String,
        engine: String,
        translated_text: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: 0,
            source_text_hash,
            source_text,
            source_language,
            target_language,
            engine,
            translated_text,
            created_at: now.clone(),
            last_accessed: now,
            hit_count: 0,
        }
    }
}

/// Row counts and hit totals of the durable cache
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DurableStats {
    /// Total number of cache entries
    pub total_entries: i64,
    /// Total number of cache hits over all entries
    pub total_hits: i64,
    /// Database file size in bytes
    pub file_size_bytes: u64,
}

impl std::fmt::Display for DurableStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Entries: {}, Hits: {}, Size: {} KB",
            self.total_entries,
            self.total_hits,
            self.file_size_bytes / 1024
        )
    }
}
