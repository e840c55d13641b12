/*!
 * End-to-end document translation against mock backends
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use subtrans::errors::ProviderError;
use subtrans::providers::TranslationBackend;
use subtrans::providers::mock::MockBackend;
use subtrans::translation::breaker::BreakerMode;
use subtrans::translation::cache::{CacheKey, HybridCache, TranslationStore};
use subtrans::translation::{Orchestrator, RequestGate};
use tokio_util::sync::CancellationToken;

use crate::common::{in_memory_store, lines, orchestrator, orchestrator_with, test_config, test_gate};

fn is_batch_prompt(prompt: &str) -> bool {
    prompt.contains("INPUT (")
}

/// Fails every batch, but not before another session stored one of its lines
struct RacedBackend {
    store: Arc<HybridCache>,
    calls: AtomicUsize,
}

#[async_trait]
impl TranslationBackend for RacedBackend {
    async fn translate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if is_batch_prompt(prompt) {
            self.store
                .put(&CacheKey::new("World", "en", "fr", &self.engine_id()), "Monde")
                .unwrap();
            return Err(ProviderError::ConnectionError("connection reset".to_string()));
        }
        Ok("Bonjour".to_string())
    }

    fn engine_id(&self) -> String {
        "raced:test".to_string()
    }
}

#[tokio::test]
async fn test_translateDocument_withRepeatedLines_shouldSendOneBatch() {
    let backend = Arc::new(MockBackend::fixed("1. Hola\n2. Mundo"));
    let mut session = orchestrator(backend.clone(), None);

    let out = session
        .translate_document(&lines(&["Hello", "Hello", "World", "Hello"]), "en", "es")
        .await;

    assert_eq!(out, lines(&["Hola", "Hola", "Mundo", "Hola"]));
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_translateDocument_withEchoedLine_shouldKeepSourceAndCountRejection() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = Arc::new(MockBackend::translating(|line| line.to_string()));
    let store = in_memory_store();
    let mut session = orchestrator(backend, Some(store.clone()));

    let outcome = session
        .translate_document_detailed(&lines(&["Tokyo"]), "en", "fr")
        .await;

    assert_eq!(outcome.lines, lines(&["Tokyo"]));
    assert_eq!(outcome.report.lines_rejected, 1);
    assert_eq!(outcome.report.transport_failures, 0);
    assert_eq!(store.stats().entries, 0);
}

#[tokio::test]
async fn test_translateDocument_withFailingBackend_shouldTripBreakerAndReturnSources() {
    let backend = Arc::new(MockBackend::failing());
    let mut session = orchestrator(backend.clone(), None);
    let input: Vec<String> = (0..24).map(|i| format!("Distinct subtitle line {}", i)).collect();

    let outcome = session.translate_document_detailed(&input, "en", "fr").await;

    assert_eq!(outcome.lines, input);
    assert!(outcome.report.breaker_tripped);
    assert_eq!(outcome.report.batches_failed, 3);
    assert_eq!(outcome.report.single_line_calls, 24);
    assert_eq!(session.breaker_state().mode, BreakerMode::BatchDisabled);
    assert_eq!(backend.call_count(), 27);
}

#[tokio::test]
async fn test_translateDocument_withManyBatchesFailing_shouldStopBatchingAfterTrip() {
    let backend = Arc::new(MockBackend::failing());
    let mut session = orchestrator(backend.clone(), None);
    let input: Vec<String> = (0..48).map(|i| format!("Distinct subtitle line {}", i)).collect();

    let outcome = session.translate_document_detailed(&input, "en", "fr").await;

    // six batches of eight, but only the first three are sent
    assert_eq!(outcome.report.batches_failed, 3);
    assert_eq!(outcome.report.batches_parsed, 0);
    assert_eq!(outcome.report.single_line_calls, 48);
    assert_eq!(backend.call_count(), 51);

    let prompts = backend.prompts();
    assert!(prompts[..3].iter().all(|p| is_batch_prompt(p)));
    assert!(prompts[3..].iter().all(|p| !is_batch_prompt(p)));
    assert_eq!(outcome.lines, input);
}

#[tokio::test]
async fn test_translateDocument_withLineCachedDuringFailedBatch_shouldServeItFromCache() {
    let store = in_memory_store();
    let backend = Arc::new(RacedBackend {
        store: store.clone(),
        calls: AtomicUsize::new(0),
    });
    let mut config = test_config();
    config.pipeline.breaker_failure_threshold = 1;
    let mut session = Orchestrator::new(&config, backend.clone(), Some(store.clone()), test_gate()).unwrap();

    let outcome = session
        .translate_document_detailed(&lines(&["Hello", "World"]), "en", "fr")
        .await;

    assert_eq!(outcome.lines, lines(&["Bonjour", "Monde"]));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.report.cache_hits, 1);
    assert_eq!(outcome.report.single_line_calls, 1);
    assert!(outcome.report.breaker_tripped);
}

#[tokio::test]
async fn test_translateDocument_withUntranslatableLines_shouldKeepThemWithoutRequests() {
    let backend = Arc::new(MockBackend::tagging("fr"));
    let mut session = orchestrator(backend.clone(), None);
    let input = lines(&["♪ Under the sea ♪", r"{\an8}", "Where were we?", "12", "...", "Let's go"]);

    let outcome = session.translate_document_detailed(&input, "en", "fr").await;

    assert_eq!(
        outcome.lines,
        lines(&["♪ Under the sea ♪", r"{\an8}", "[fr] Where were we?", "12", "...", "[fr] Let's go"])
    );
    assert_eq!(outcome.report.skipped_lines, 4);
    assert_eq!(backend.call_count(), 1);
    assert!(backend.prompts().iter().all(|p| !p.contains("Under the sea")));
}

#[tokio::test]
async fn test_translateDocument_withSkippingDisabled_shouldSendEveryLine() {
    let mut config = test_config();
    config.pipeline.skip_untranslatable = false;
    let backend = Arc::new(MockBackend::tagging("fr"));
    let mut session = orchestrator_with(config, backend.clone(), None);

    let outcome = session
        .translate_document_detailed(&lines(&["♪ Under the sea ♪", "Where were we?"]), "en", "fr")
        .await;

    assert_eq!(outcome.report.skipped_lines, 0);
    assert!(backend.prompts()[0].contains("Under the sea"));
}

#[tokio::test]
async fn test_translateDocument_afterTrip_shouldStayInSingleLineModeUntilReset() {
    let backend = Arc::new(MockBackend::failing());
    let mut session = orchestrator(backend.clone(), None);
    let input: Vec<String> = (0..24).map(|i| format!("Line {}", i)).collect();
    session.translate_document(&input, "en", "fr").await;

    let before = backend.prompts().len();
    session.translate_document(&lines(&["One more", "And another"]), "en", "fr").await;
    let later: Vec<String> = backend.prompts().split_off(before);
    assert_eq!(later.len(), 2);
    assert!(later.iter().all(|p| !is_batch_prompt(p)));

    session.reset_breaker();
    session.translate_document(&lines(&["Third", "Fourth"]), "en", "fr").await;
    let last = backend.prompts();
    assert!(is_batch_prompt(&last[before + 2]));
}

#[tokio::test]
async fn test_translateDocument_withFailedBatch_shouldRecoverPerLine() {
    let backend = Arc::new(MockBackend::scripted(vec![Err("connection reset".to_string())]));
    let mut session = orchestrator(backend.clone(), None);

    let outcome = session
        .translate_document_detailed(&lines(&["Good evening", "Good evening", "Sleep well"]), "en", "fr")
        .await;

    // the scripted queue echoes after the failure, so every line is rejected as identical
    assert_eq!(outcome.report.batches_failed, 1);
    assert_eq!(outcome.report.transport_failures, 1);
    assert_eq!(outcome.report.single_line_calls, 2);
    assert_eq!(outcome.lines, lines(&["Good evening", "Good evening", "Sleep well"]));
    assert_eq!(session.breaker_state().consecutive_failures, 1);
}

#[tokio::test]
async fn test_translateDocument_withCachedLines_shouldOnlyRequestMisses() {
    let backend = Arc::new(MockBackend::tagging("fr"));
    let store = in_memory_store();
    store
        .put(&CacheKey::new("Hello", "en", "fr", "mock:test"), "Bonjour")
        .unwrap();
    let mut session = orchestrator(backend.clone(), Some(store.clone()));

    let outcome = session
        .translate_document_detailed(&lines(&["Hello", "Welcome home"]), "en", "fr")
        .await;

    assert_eq!(outcome.lines, lines(&["Bonjour", "[fr] Welcome home"]));
    assert_eq!(outcome.report.cache_hits, 1);
    assert_eq!(backend.call_count(), 1);
    assert!(!is_batch_prompt(&backend.prompts()[0]));
}

#[tokio::test]
async fn test_translateDocument_withBatchingDisabled_shouldSendOneCallPerUniqueLine() {
    let mut config = test_config();
    config.pipeline.batch_enabled = false;
    let backend = Arc::new(MockBackend::tagging("fr"));
    let mut session = orchestrator_with(config, backend.clone(), None);

    let out = session
        .translate_document(&lines(&["First line", "Second line", "First line"]), "en", "fr")
        .await;

    assert_eq!(out, lines(&["[fr] First line", "[fr] Second line", "[fr] First line"]));
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrentSessions_sharingGate_shouldNeverExceedTwoInFlight() {
    let backend = Arc::new(MockBackend::tagging("fr").with_delay(Duration::from_millis(200)));
    let gate = Arc::new(RequestGate::new(2, Duration::ZERO));
    let mut config = test_config();
    config.pipeline.max_batch_lines = 2;

    let mut handles = Vec::new();
    for doc in 0..3 {
        let mut session = Orchestrator::new(&config, backend.clone(), None, gate.clone()).unwrap();
        let input: Vec<String> = (0..10).map(|i| format!("Document {} line {}", doc, i)).collect();
        handles.push(tokio::spawn(async move {
            session.translate_document(&input, "en", "fr").await
        }));
    }

    for handle in handles {
        let out = handle.await.unwrap();
        assert!(out.iter().all(|line| line.starts_with("[fr] ")));
    }
    assert!(backend.peak_in_flight() <= 2);
    assert_eq!(backend.peak_in_flight(), 2);
}

#[tokio::test]
async fn test_singleLineCalls_shouldBeSpacedByRateLimit() {
    let mut config = test_config();
    config.pipeline.batch_enabled = false;
    let backend = Arc::new(MockBackend::tagging("fr"));
    let gate = Arc::new(RequestGate::new(2, Duration::from_millis(50)));
    let mut session = Orchestrator::new(&config, backend.clone(), None, gate).unwrap();

    let start = Instant::now();
    session
        .translate_document(&lines(&["one", "two", "three", "four", "five"]), "en", "fr")
        .await;

    assert_eq!(backend.call_count(), 5);
    assert!(start.elapsed() >= Duration::from_millis(195));
}

#[tokio::test]
async fn test_translateDocument_withCancelledToken_shouldMakeNoCalls() {
    let backend = Arc::new(MockBackend::tagging("fr"));
    let token = CancellationToken::new();
    token.cancel();
    let mut session = orchestrator(backend.clone(), None).with_cancellation(token);
    let input = lines(&["Hello", "World", " padded "]);

    let outcome = session.translate_document_detailed(&input, "en", "fr").await;

    assert_eq!(outcome.lines, input);
    assert!(outcome.report.cancelled);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_translateDocument_withEmptyInput_shouldReturnEmpty() {
    let backend = Arc::new(MockBackend::tagging("fr"));
    let mut session = orchestrator(backend.clone(), None);
    assert!(session.translate_document(&[], "en", "fr").await.is_empty());
    assert_eq!(backend.call_count(), 0);
}
