/*!
 * Common test utilities for the subtrans test suite
 */

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use subtrans::app_config::Config;
use subtrans::database::Repository;
use subtrans::providers::mock::MockBackend;
use subtrans::translation::{
    DurableCache, HybridCache, MemoryCache, Orchestrator, RequestGate, TranslationService, TranslationStore,
};

/// Turn string literals into owned lines
pub fn lines(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|t| t.to_string()).collect()
}

/// Default config without rate limiting, so tests do not wait
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.source_language = "en".to_string();
    config.target_language = "fr".to_string();
    config.pipeline.rate_limit_interval_ms = 0;
    config
}

/// A private gate so parallel tests do not share permits
pub fn test_gate() -> Arc<RequestGate> {
    Arc::new(RequestGate::new(2, Duration::ZERO))
}

/// Hybrid cache over an in-memory SQLite database
pub fn in_memory_store() -> Arc<HybridCache> {
    Arc::new(HybridCache::new(
        MemoryCache::new(100).expect("capacity"),
        DurableCache::new(Repository::new_in_memory().expect("in-memory db")),
    ))
}

/// Hybrid cache over a SQLite file
pub fn file_store(path: &Path) -> Arc<HybridCache> {
    Arc::new(HybridCache::open(path, 100).expect("cache file"))
}

/// Session over `backend` with an optional store
pub fn orchestrator(backend: Arc<MockBackend>, store: Option<Arc<dyn TranslationStore>>) -> Orchestrator {
    orchestrator_with(test_config(), backend, store)
}

/// Session with custom settings
pub fn orchestrator_with(
    config: Config,
    backend: Arc<MockBackend>,
    store: Option<Arc<dyn TranslationStore>>,
) -> Orchestrator {
    Orchestrator::new(&config, backend, store, test_gate()).expect("valid config")
}

/// Service over `backend` with a private gate
pub fn service(backend: Arc<MockBackend>, store: Option<Arc<dyn TranslationStore>>) -> TranslationService {
    TranslationService::new(test_config(), backend, store)
        .expect("valid config")
        .with_gate(test_gate())
}
