/*!
 * Translation caching.
 *
 * `TranslationStore` is the capability the pipeline needs. Three
 * implementations compose into the default setup:
 *
 * - `MemoryCache`: bounded LRU, lost on restart
 * - `DurableCache`: SQLite table, unbounded, survives restarts
 * - `HybridCache`: memory in front of durable; durable hits are promoted into
 *   memory and every `put` writes both tiers before returning
 */

use anyhow::Result;
use log::debug;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::database::Repository;
use crate::database::models::CacheRecord;
use crate::errors::ConfigError;
use crate::language_utils::canonical_code;

/// Identity of one cached translation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Source text, trimmed with whitespace runs collapsed
    pub source_text: String,

    /// Source language code
    pub source_language: String,

    /// Target language code
    pub target_language: String,

    /// Backend identity (provider and model)
    pub engine: String,
}

impl CacheKey {
    /// Create a key, normalizing text and language codes
    pub fn new(source_text: &str, source_language: &str, target_language: &str, engine: &str) -> Self {
        Self {
            source_text: normalize_text(source_text),
            source_language: canonical_code(source_language),
            target_language: canonical_code(target_language),
            engine: engine.to_string(),
        }
    }
}

/// Trim every line and collapse runs of spaces; line breaks are kept
pub fn normalize_text(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hit/miss counters and sizes of a store
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Lookups that found a value in any tier
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Hits served from memory
    pub memory_hits: u64,
    /// Hits served from the durable tier
    pub durable_hits: u64,
    /// Entries in the authoritative tier
    pub entries: u64,
    /// Entries currently held in memory
    pub memory_entries: u64,
}

impl CacheStats {
    /// hits / (hits + misses), 0 when nothing was looked up
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} hits ({} memory, {} durable), {} misses, hit rate {:.1}%, {} entries ({} in memory)",
            self.hits,
            self.memory_hits,
            self.durable_hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.entries,
            self.memory_entries
        )
    }
}

/// Capability required by the pipeline: look up and store translations
pub trait TranslationStore: Send + Sync {
    /// Cached translation for `key`, if any
    fn get(&self, key: &CacheKey) -> Result<Option<String>>;

    /// Store `value` for `key`, replacing any previous value
    fn put(&self, key: &CacheKey, value: &str) -> Result<()>;

    /// Counters since creation
    fn stats(&self) -> CacheStats;

    /// Remove every entry
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn record(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Bounded in-memory LRU tier
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<LruCache<CacheKey, String>>,
    counters: Counters,
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(ConfigError::ZeroCacheCapacity)?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
            counters: Counters::default(),
        })
    }

    /// Number of entries held
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is held
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }
}

impl TranslationStore for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>> {
        let value = self.entries.lock().get(key).cloned();
        self.counters.record(value.is_some());
        Ok(value)
    }

    fn put(&self, key: &CacheKey, value: &str) -> Result<()> {
        self.entries.lock().put(key.clone(), value.to_string());
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        let len = self.len() as u64;
        CacheStats {
            hits: self.counters.hits(),
            misses: self.counters.misses(),
            memory_hits: self.counters.hits(),
            durable_hits: 0,
            entries: len,
            memory_entries: len,
        }
    }

    fn clear(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// SQLite-backed tier
#[derive(Debug)]
pub struct DurableCache {
    repo: Repository,
    counters: Counters,
}

impl DurableCache {
    /// Wrap an existing repository
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            counters: Counters::default(),
        }
    }

    /// Open (or create) the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(Repository::open(path)?))
    }

    /// Underlying repository, for maintenance operations
    pub fn repository(&self) -> &Repository {
        &self.repo
    }
}

impl TranslationStore for DurableCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>> {
        let value = self.repo.get_cached_translation(
            &key.source_text,
            &key.source_language,
            &key.target_language,
            &key.engine,
        )?;
        self.counters.record(value.is_some());
        Ok(value)
    }

    fn put(&self, key: &CacheKey, value: &str) -> Result<()> {
        let record = CacheRecord::new(
            Repository::hash_text(&key.source_text),
            key.source_text.clone(),
            key.source_language.clone(),
            key.target_language.clone(),
            key.engine.clone(),
            value.to_string(),
        );
        self.repo.cache_translation(&record)
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits(),
            misses: self.counters.misses(),
            memory_hits: 0,
            durable_hits: self.counters.hits(),
            entries: self.repo.count().unwrap_or(0) as u64,
            memory_entries: 0,
        }
    }

    fn clear(&self) -> Result<()> {
        self.repo.clear_cache()?;
        Ok(())
    }
}

/// Memory tier written through to the durable tier
#[derive(Debug)]
pub struct HybridCache {
    memory: MemoryCache,
    durable: DurableCache,
    counters: Counters,
    memory_hits: AtomicU64,
    durable_hits: AtomicU64,
}

impl HybridCache {
    /// Compose the two tiers
    pub fn new(memory: MemoryCache, durable: DurableCache) -> Self {
        Self {
            memory,
            durable,
            counters: Counters::default(),
            memory_hits: AtomicU64::new(0),
            durable_hits: AtomicU64::new(0),
        }
    }

    /// Memory tier of `capacity` entries over the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        Ok(Self::new(MemoryCache::new(capacity)?, DurableCache::open(path)?))
    }

    /// Durable tier, for maintenance operations
    pub fn durable(&self) -> &DurableCache {
        &self.durable
    }

    /// Drop the memory tier only, as a process restart would
    pub fn clear_memory(&self) -> Result<()> {
        self.memory.clear()
    }
}

impl TranslationStore for HybridCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>> {
        if let Some(value) = self.memory.get(key)? {
            self.counters.record(true);
            self.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(value));
        }

        match self.durable.get(key)? {
            Some(value) => {
                debug!("Promoting durable cache hit for '{}'", truncate_text(&key.source_text, 30));
                self.memory.put(key, &value)?;
                self.counters.record(true);
                self.durable_hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            None => {
                self.counters.record(false);
                Ok(None)
            }
        }
    }

    fn put(&self, key: &CacheKey, value: &str) -> Result<()> {
        // memory never holds what the database refused
        self.durable.put(key, value)?;
        self.memory.put(key, value)
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits(),
            misses: self.counters.misses(),
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            durable_hits: self.durable_hits.load(Ordering::Relaxed),
            entries: self.durable.stats().entries,
            memory_entries: self.memory.len() as u64,
        }
    }

    fn clear(&self) -> Result<()> {
        self.memory.clear()?;
        self.durable.clear()
    }
}

/// Truncate text to a maximum number of characters with ellipsis
pub(crate) fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
