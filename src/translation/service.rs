/*!
 * Long-lived translation service.
 *
 * Owns the backend, the cache and the request gate, which outlive any single
 * document. Each translation session is an `Orchestrator` created by
 * `session()`; sessions share the cache and the gate but have their own
 * circuit breaker.
 */

use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::app_config::Config;
use crate::database::DatabaseConnection;
use crate::errors::ConfigError;
use crate::providers::TranslationBackend;
use crate::providers::ollama::Ollama;
use crate::translation::cache::{CacheStats, DurableCache, HybridCache, MemoryCache, TranslationStore};
use crate::translation::concurrency::RequestGate;
use crate::translation::orchestrator::{Orchestrator, ProgressCallback};
use crate::translation::report::DocumentOutcome;

/// Entry point for translating documents with shared resources
pub struct TranslationService {
    config: Config,
    backend: Arc<dyn TranslationBackend>,
    store: Option<Arc<dyn TranslationStore>>,
    gate: Arc<RequestGate>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for TranslationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationService")
            .field("engine", &self.backend.engine_id())
            .field("cache_enabled", &self.store.is_some())
            .field("max_in_flight", &self.gate.max_in_flight())
            .finish()
    }
}

impl TranslationService {
    /// Assemble a service from parts; the process-wide gate is used
    pub fn new(
        config: Config,
        backend: Arc<dyn TranslationBackend>,
        store: Option<Arc<dyn TranslationStore>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let gate = RequestGate::global_with(Duration::from_millis(config.pipeline.rate_limit_interval_ms));

        Ok(Self {
            config,
            backend,
            store,
            gate,
            cancel: CancellationToken::new(),
        })
    }

    /// Build the Ollama backend and the SQLite-backed hybrid cache from `config`
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        // retries inside one gated call are paced by the same limiter as the calls themselves
        let gate = RequestGate::global_with(Duration::from_millis(config.pipeline.rate_limit_interval_ms));
        let backend = Ollama::from_config(&config.backend)
            .context("Failed to create Ollama client")?
            .with_rate_limiter(gate.rate_limiter());

        let store: Option<Arc<dyn TranslationStore>> = if config.cache.enabled {
            let path = match &config.cache.database_path {
                Some(path) => path.clone(),
                None => DatabaseConnection::default_database_path()?,
            };
            let cache = HybridCache::new(
                MemoryCache::new(config.cache.memory_capacity)?,
                DurableCache::open(&path)
                    .with_context(|| format!("Failed to open cache database: {}", path.display()))?,
            );
            Some(Arc::new(cache))
        } else {
            warn!("Translation cache disabled");
            None
        };

        info!(
            "Translation service ready: {} at {}",
            backend.engine_id(),
            backend.base_url()
        );

        Ok(Self::new(config, Arc::new(backend), store)?.with_gate(gate))
    }

    /// Use a dedicated gate instead of the process-wide one
    pub fn with_gate(mut self, gate: Arc<RequestGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Cancel every session of this service through `token`
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Settings the service was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Backend all sessions send to
    pub fn backend(&self) -> &Arc<dyn TranslationBackend> {
        &self.backend
    }

    /// Start a translation session with its own circuit breaker
    pub fn session(&self) -> Result<Orchestrator, ConfigError> {
        Ok(Orchestrator::new(
            &self.config,
            Arc::clone(&self.backend),
            self.store.clone(),
            Arc::clone(&self.gate),
        )?
        .with_cancellation(self.cancel.clone()))
    }

    /// Start a session that reports progress
    pub fn session_with_progress(&self, progress: ProgressCallback) -> Result<Orchestrator, ConfigError> {
        Ok(self.session()?.with_progress(progress))
    }

    /// Translate one document in a fresh session
    pub async fn translate_document(
        &self,
        lines: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>, ConfigError> {
        Ok(self
            .translate_document_detailed(lines, source_language, target_language)
            .await?
            .lines)
    }

    /// Translate one document in a fresh session and return its report
    pub async fn translate_document_detailed(
        &self,
        lines: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<DocumentOutcome, ConfigError> {
        let mut session = self.session()?;
        Ok(session
            .translate_document_detailed(lines, source_language, target_language)
            .await)
    }

    /// Counters of the cache, or zeros when caching is disabled
    pub fn cache_stats(&self) -> CacheStats {
        self.store.as_ref().map(|s| s.stats()).unwrap_or_default()
    }
}
