/*!
 * Per-session translation pipeline.
 *
 * An `Orchestrator` turns a list of subtitle lines into translated lines:
 *
 * 1. deduplicate, pass blank and untranslatable lines through, answer what
 *    the cache knows
 * 2. pack the misses into batches and send them through the request gate
 * 3. parse each response, validate every line, cache accepted translations
 * 4. look the lines of failed batches up again, then translate the rest one
 *    at a time
 * 5. expand back to the input order
 *
 * The circuit breaker lives here, so a session that tripped it stays in
 * single-line mode for every later document until `reset_breaker`. Nothing
 * in this module fails a document: every problem degrades to keeping the
 * source text for the affected lines.
 */

use futures::stream::{self, Stream, StreamExt};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::app_config::Config;
use crate::errors::{BatchFailure, ConfigError, ProviderError};
use crate::providers::TranslationBackend;
use crate::translation::batch::SmartBatcher;
use crate::translation::breaker::{BreakerState, CircuitBreaker};
use crate::translation::cache::{CacheKey, TranslationStore, truncate_text};
use crate::translation::concurrency::RequestGate;
use crate::translation::dedup::{self, UniqueSet};
use crate::translation::parser::{BatchResponseParser, ParseOutcome, clean_response};
use crate::translation::prompts::PromptBuilder;
use crate::translation::quality::QualityValidator;
use crate::translation::report::{DocumentOutcome, DocumentReport};
use crate::translation::translatable;

/// Progress callback receiving `(unique lines done, unique lines total)`
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// A subtitle line with opaque timing carried through translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// Position in the track, from 0
    pub index: usize,
    /// Line text
    pub text: String,
    /// Timing as found in the source file, never interpreted
    pub timing: Option<String>,
}

impl SourceLine {
    /// Create a line without timing
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            timing: None,
        }
    }

    /// Attach timing metadata
    pub fn with_timing(mut self, timing: impl Into<String>) -> Self {
        self.timing = Some(timing.into());
        self
    }

    /// Same line and timing with different text
    pub fn with_text(&self, text: String) -> Self {
        Self {
            index: self.index,
            text,
            timing: self.timing.clone(),
        }
    }
}

/// Everything one document needs while it is being translated
struct DocumentRun<'a> {
    set: &'a UniqueSet,
    results: Vec<Option<String>>,
    report: DocumentReport,
    validator: QualityValidator,
    prompts: PromptBuilder,
    source_language: &'a str,
    target_language: &'a str,
    engine: String,
    done: usize,
}

impl DocumentRun<'_> {
    fn text(&self, canonical_index: usize) -> &str {
        &self.set.unique[canonical_index]
    }

    fn key(&self, canonical_index: usize) -> CacheKey {
        CacheKey::new(
            self.text(canonical_index),
            self.source_language,
            self.target_language,
            &self.engine,
        )
    }
}

/// Translation pipeline for one session
pub struct Orchestrator {
    session_id: Uuid,
    backend: Arc<dyn TranslationBackend>,
    store: Option<Arc<dyn TranslationStore>>,
    gate: Arc<RequestGate>,
    batcher: SmartBatcher,
    parser: BatchResponseParser,
    validator: QualityValidator,
    breaker: CircuitBreaker,
    batch_enabled: bool,
    skip_untranslatable: bool,
    max_in_flight: usize,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("session_id", &self.session_id)
            .field("engine", &self.backend.engine_id())
            .field("breaker", &self.breaker.state())
            .field("batch_enabled", &self.batch_enabled)
            .field("max_in_flight", &self.max_in_flight)
            .finish()
    }
}

impl Orchestrator {
    /// Build a session from pipeline and validation settings
    pub fn new(
        config: &Config,
        backend: Arc<dyn TranslationBackend>,
        store: Option<Arc<dyn TranslationStore>>,
        gate: Arc<RequestGate>,
    ) -> Result<Self, ConfigError> {
        config.pipeline.validate()?;

        let max_in_flight = config.pipeline.effective_in_flight().min(gate.max_in_flight());

        Ok(Self {
            session_id: Uuid::new_v4(),
            backend,
            store,
            gate,
            batcher: SmartBatcher::new(config.pipeline.max_batch_lines, config.pipeline.max_batch_chars)?,
            parser: BatchResponseParser::from_config(&config.pipeline)?,
            validator: QualityValidator::new(&config.validation)?,
            breaker: CircuitBreaker::new(config.pipeline.breaker_failure_threshold)?,
            batch_enabled: config.pipeline.batch_enabled,
            skip_untranslatable: config.pipeline.skip_untranslatable,
            max_in_flight,
            cancel: CancellationToken::new(),
            progress: None,
        })
    }

    /// Stop before the next backend call once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report progress after every batch and every single-line call
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Identifier used in log lines of this session
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Breaker counters and mode
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Re-enable batch mode after the breaker tripped
    pub fn reset_breaker(&mut self) {
        info!("Session {}: circuit breaker reset", self.session_id);
        self.breaker.reset();
    }

    /// Translate `lines`; the result always has the same length and order
    pub async fn translate_document(
        &mut self,
        lines: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Vec<String> {
        self.translate_document_detailed(lines, source_language, target_language)
            .await
            .lines
    }

    /// Translate lines that carry timing, keeping index and timing
    pub async fn translate_source_lines(
        &mut self,
        lines: &[SourceLine],
        source_language: &str,
        target_language: &str,
    ) -> Vec<SourceLine> {
        let texts: Vec<String> = lines.iter().map(|l| l.text.clone()).collect();
        let translated = self.translate_document(&texts, source_language, target_language).await;
        lines.iter().zip(translated).map(|(line, text)| line.with_text(text)).collect()
    }

    /// Translate `lines` and report what happened
    pub async fn translate_document_detailed(
        &mut self,
        lines: &[String],
        source_language: &str,
        target_language: &str,
    ) -> DocumentOutcome {
        let started = Instant::now();
        let set = dedup::reduce(lines);

        let mut run = DocumentRun {
            set: &set,
            results: vec![None; set.unique.len()],
            report: DocumentReport {
                total_lines: lines.len(),
                unique_lines: set.unique.len(),
                ..Default::default()
            },
            validator: self.validator.clone().for_target(target_language),
            prompts: PromptBuilder::new(source_language, target_language),
            source_language,
            target_language,
            engine: self.backend.engine_id(),
            done: 0,
        };

        debug!(
            "Session {}: {} lines, {} unique ({} duplicates)",
            self.session_id,
            set.original_len(),
            set.unique.len(),
            set.duplicate_count()
        );

        let candidates = self.filter_passthrough(&mut run);
        let pending = self.take_cached(&mut run, candidates);
        self.notify(&run);

        if !pending.is_empty() {
            let use_batches = self.batch_enabled && self.breaker.is_batch_enabled() && pending.len() > 1;
            let leftovers = if use_batches {
                let failed = self.translate_batches(&mut run, &pending).await;
                // another session sharing the store may have answered some of these meanwhile
                let failed = self.take_cached(&mut run, failed);
                self.notify(&run);
                failed
            } else {
                pending
            };
            if !leftovers.is_empty() {
                self.translate_single_lines(&mut run, &leftovers).await;
            }
        }

        let mut output = dedup::expand(
            &run.results
                .iter()
                .enumerate()
                .map(|(i, r)| r.clone().unwrap_or_else(|| set.unique[i].clone()))
                .collect::<Vec<_>>(),
            &set.index_map,
        );
        // untranslated lines come back exactly as given, surrounding whitespace included
        for (position, canonical) in set.index_map.iter().enumerate() {
            if run.results[*canonical].is_none() {
                output[position] = lines[position].clone();
            }
        }

        let mut report = run.report;
        report.cancelled = self.cancel.is_cancelled();
        report.duration = started.elapsed();
        info!("Session {}: {}", self.session_id, report.summary());

        DocumentOutcome { lines: output, report }
    }

    /// Count blank and untranslatable lines as done; returns the rest
    fn filter_passthrough(&self, run: &mut DocumentRun<'_>) -> Vec<usize> {
        let mut candidates = Vec::with_capacity(run.set.unique.len());

        for i in 0..run.set.unique.len() {
            if run.text(i).is_empty() {
                run.report.blank_lines += 1;
                run.done += 1;
                continue;
            }

            if self.skip_untranslatable {
                if let Some(reason) = translatable::skip_reason(run.text(i)) {
                    debug!("Keeping '{}' untranslated: {}", truncate_text(run.text(i), 40), reason);
                    run.report.skipped_lines += 1;
                    run.done += 1;
                    continue;
                }
            }

            candidates.push(i);
        }

        candidates
    }

    /// Fill cached results; returns the canonical indices still to translate
    fn take_cached(&self, run: &mut DocumentRun<'_>, indices: Vec<usize>) -> Vec<usize> {
        let Some(store) = &self.store else {
            return indices;
        };

        let mut missing = Vec::with_capacity(indices.len());
        for i in indices {
            match store.get(&run.key(i)) {
                Ok(Some(cached)) => {
                    debug!("Cache hit for '{}'", truncate_text(run.text(i), 40));
                    run.results[i] = Some(cached);
                    run.report.cache_hits += 1;
                    run.done += 1;
                }
                Ok(None) => missing.push(i),
                Err(e) => {
                    error!("Cache lookup failed, translating instead: {:#}", e);
                    missing.push(i);
                }
            }
        }

        missing
    }

    /// Send the pending lines in batches; returns lines that need single-line calls
    async fn translate_batches(&mut self, run: &mut DocumentRun<'_>, pending: &[usize]) -> Vec<usize> {
        let batches = self
            .batcher
            .batch(pending.iter().map(|&i| (i, run.set.unique[i].as_str())));
        let prompts: Vec<String> = batches.iter().map(|b| run.prompts.batch_prompt(b)).collect();

        debug!(
            "Session {}: {} lines in {} batches",
            self.session_id,
            pending.len(),
            batches.len()
        );

        let stop = Arc::new(AtomicBool::new(false));
        let mut responses = gated_calls(
            Arc::clone(&self.backend),
            Arc::clone(&self.gate),
            prompts,
            self.max_in_flight,
            Arc::clone(&stop),
            self.cancel.clone(),
        )
        .enumerate();

        let mut leftovers = Vec::new();

        while let Some((batch_index, response)) = responses.next().await {
            let batch = &batches[batch_index];

            let Some(response) = response else {
                // skipped: cancelled, or the breaker tripped before this batch started
                leftovers.extend(batch.canonical_indices());
                continue;
            };

            let failure = match response {
                Ok(raw) => match self.parser.parse(&raw, batch.len()) {
                    ParseOutcome::Parsed(parsed) => {
                        self.breaker.record_success();
                        run.report.batches_parsed += 1;
                        for member in &batch.members {
                            match parsed.get(member.number) {
                                Some(text) => {
                                    self.accept(run, member.canonical_index, text);
                                }
                                None => {
                                    warn!(
                                        "Line {} missing from batch response, keeping source: '{}'",
                                        member.number,
                                        truncate_text(&member.text, 40)
                                    );
                                    run.report.gaps += 1;
                                }
                            }
                        }
                        run.done += batch.len();
                        self.notify(run);
                        None
                    }
                    ParseOutcome::NoResult { found, expected, found_ratio, .. } => {
                        Some(BatchFailure::ParseIncomplete { found, expected, found_ratio })
                    }
                },
                Err(e) => {
                    run.report.transport_failures += 1;
                    Some(BatchFailure::Transport(e))
                }
            };

            if let Some(failure) = failure {
                warn!("Batch of {} lines failed: {}", batch.len(), failure);
                run.report.batches_failed += 1;
                leftovers.extend(batch.canonical_indices());

                if self.breaker.record_failure() {
                    run.report.breaker_tripped = true;
                    stop.store(true, Ordering::SeqCst);
                }
            }
        }

        leftovers
    }

    /// One backend call per line, in order
    async fn translate_single_lines(&mut self, run: &mut DocumentRun<'_>, indices: &[usize]) {
        let prompts: Vec<String> = indices.iter().map(|&i| run.prompts.line_prompt(run.text(i))).collect();

        let mut responses = gated_calls(
            Arc::clone(&self.backend),
            Arc::clone(&self.gate),
            prompts,
            self.max_in_flight,
            Arc::new(AtomicBool::new(false)),
            self.cancel.clone(),
        )
        .enumerate();

        while let Some((position, response)) = responses.next().await {
            let canonical_index = indices[position];

            match response {
                Some(Ok(raw)) => {
                    run.report.single_line_calls += 1;
                    let cleaned = clean_response(&raw);
                    self.accept(run, canonical_index, &cleaned);
                }
                Some(Err(e)) => {
                    run.report.single_line_calls += 1;
                    run.report.transport_failures += 1;
                    warn!(
                        "Single-line request failed, keeping source '{}': {}",
                        truncate_text(run.text(canonical_index), 40),
                        e
                    );
                }
                None => {}
            }

            run.done += 1;
            self.notify(run);
        }
    }

    /// Validate one translation and, when accepted, record and cache it
    fn accept(&self, run: &mut DocumentRun<'_>, canonical_index: usize, translated: &str) -> bool {
        let source = run.text(canonical_index);

        if let Err(rejection) = run.validator.check(source, translated) {
            warn!(
                "Rejected translation of '{}' ({}), keeping source",
                truncate_text(source, 40),
                rejection
            );
            run.report.lines_rejected += 1;
            return false;
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.put(&run.key(canonical_index), translated) {
                error!("Failed to cache translation: {:#}", e);
            }
        }

        run.results[canonical_index] = Some(translated.to_string());
        run.report.lines_translated += 1;
        true
    }

    fn notify(&self, run: &DocumentRun<'_>) {
        if let Some(progress) = &self.progress {
            progress(run.done.min(run.set.unique.len()), run.set.unique.len());
        }
    }
}

/// Backend calls through the gate, yielded in prompt order
///
/// An item is `None` when the call was skipped because `cancel` or `stop`
/// was set before it started.
fn gated_calls(
    backend: Arc<dyn TranslationBackend>,
    gate: Arc<RequestGate>,
    prompts: Vec<String>,
    max_in_flight: usize,
    stop: Arc<AtomicBool>,
    cancel: CancellationToken,
) -> impl Stream<Item = Option<Result<String, ProviderError>>> {
    stream::iter(prompts.into_iter().map(move |prompt| {
        let backend = Arc::clone(&backend);
        let gate = Arc::clone(&gate);
        let stop = Arc::clone(&stop);
        let cancel = cancel.clone();

        async move {
            let skip = || cancel.is_cancelled() || stop.load(Ordering::SeqCst);
            if skip() {
                return None;
            }
            gate.run(async {
                if skip() {
                    None
                } else {
                    Some(backend.translate(&prompt).await)
                }
            })
            .await
        }
    }))
    .buffered(max_in_flight.max(1))
}
