/*!
 * Tests for the translation cache tiers
 */

use subtrans::translation::cache::{CacheKey, DurableCache, HybridCache, MemoryCache, TranslationStore};

use crate::common::in_memory_store;

fn key(text: &str, target: &str) -> CacheKey {
    CacheKey::new(text, "en", target, "mock:test")
}

#[test]
fn test_hybrid_putThenGet_shouldReturnValue() {
    let cache = in_memory_store();
    cache.put(&key("Hello", "fr"), "Bonjour").unwrap();
    assert_eq!(cache.get(&key("Hello", "fr")).unwrap().as_deref(), Some("Bonjour"));
}

#[test]
fn test_hybrid_withDifferentTargetOrEngine_shouldMiss() {
    let cache = in_memory_store();
    cache.put(&key("Hello", "fr"), "Bonjour").unwrap();

    assert!(cache.get(&key("Hello", "es")).unwrap().is_none());
    assert!(cache.get(&CacheKey::new("Hello", "en", "fr", "ollama:other")).unwrap().is_none());
}

#[test]
fn test_hybrid_withEquivalentLanguageCodes_shouldHit() {
    let cache = in_memory_store();
    cache.put(&CacheKey::new("Hello", "eng", "fre", "mock:test"), "Bonjour").unwrap();
    assert_eq!(cache.get(&key("Hello", "fr")).unwrap().as_deref(), Some("Bonjour"));
}

#[test]
fn test_hybrid_afterRestart_shouldServeFromDurableTier() {
    let cache = in_memory_store();
    cache.put(&key("See you tomorrow", "fr"), "À demain").unwrap();
    cache.clear_memory().unwrap();

    assert_eq!(
        cache.get(&key("See you tomorrow", "fr")).unwrap().as_deref(),
        Some("À demain")
    );
    assert_eq!(cache.stats().durable_hits, 1);
}

#[test]
fn test_durable_reopenFile_shouldKeepEntries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.db");

    {
        let cache = HybridCache::open(&path, 10).unwrap();
        cache.put(&key("Good luck", "de"), "Viel Glück").unwrap();
    }

    let reopened = DurableCache::open(&path).unwrap();
    assert_eq!(reopened.get(&key("Good luck", "de")).unwrap().as_deref(), Some("Viel Glück"));
    assert_eq!(reopened.stats().entries, 1);
}

#[test]
fn test_memory_clear_shouldEmptyTier() {
    let cache = MemoryCache::new(4).unwrap();
    cache.put(&key("a", "fr"), "b").unwrap();
    cache.clear().unwrap();
    assert!(cache.is_empty());
    assert_eq!(cache.capacity(), 4);
}

#[test]
fn test_hybrid_clear_shouldEmptyBothTiers() {
    let cache = in_memory_store();
    cache.put(&key("Hello", "fr"), "Bonjour").unwrap();
    cache.clear().unwrap();
    cache.clear_memory().unwrap();

    assert!(cache.get(&key("Hello", "fr")).unwrap().is_none());
    assert_eq!(cache.stats().entries, 0);
}

#[test]
fn test_durable_pruneIdentical_shouldRemoveEchoes() {
    let cache = in_memory_store();
    cache.put(&key("Tokyo", "fr"), "Tokyo").unwrap();
    cache.put(&key("Hello", "fr"), "Bonjour").unwrap();

    assert_eq!(cache.durable().repository().prune_identical().unwrap(), 1);
    assert_eq!(cache.stats().entries, 1);
}
