/*!
 * Translations surviving a process restart through the SQLite cache
 */

use std::sync::Arc;

use subtrans::providers::mock::MockBackend;
use subtrans::translation::TranslationStore;

use crate::common::{file_store, lines, service};

#[tokio::test]
async fn test_service_afterRestart_shouldServeDocumentFromDisk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("translations.db");
    let input = lines(&["Where are you going?", "Home.", "Where are you going?"]);

    let first_backend = Arc::new(MockBackend::tagging("fr"));
    {
        let first = service(first_backend.clone(), Some(file_store(&path)));
        let out = first.translate_document(&input, "en", "fr").await.unwrap();
        assert_eq!(out[0], "[fr] Where are you going?");
        assert_eq!(first.cache_stats().entries, 2);
    }
    assert_eq!(first_backend.call_count(), 1);

    let second_backend = Arc::new(MockBackend::tagging("fr"));
    let second = service(second_backend.clone(), Some(file_store(&path)));
    let outcome = second.translate_document_detailed(&input, "en", "fr").await.unwrap();

    assert_eq!(second_backend.call_count(), 0);
    assert_eq!(outcome.report.cache_hits, 2);
    assert_eq!(outcome.lines[2], "[fr] Where are you going?");
    assert_eq!(second.cache_stats().durable_hits, 2);
}

#[tokio::test]
async fn test_service_afterRestart_withOtherTarget_shouldTranslateAgain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("translations.db");
    let input = lines(&["Good night"]);

    let backend = Arc::new(MockBackend::tagging("fr"));
    service(backend.clone(), Some(file_store(&path)))
        .translate_document(&input, "en", "fr")
        .await
        .unwrap();

    let german = Arc::new(MockBackend::tagging("de"));
    let out = service(german.clone(), Some(file_store(&path)))
        .translate_document(&input, "en", "de")
        .await
        .unwrap();

    assert_eq!(out, lines(&["[de] Good night"]));
    assert_eq!(german.call_count(), 1);
}

#[tokio::test]
async fn test_service_withRejectedLine_shouldNotPersistIt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("translations.db");

    let echo = Arc::new(MockBackend::translating(|line| line.to_string()));
    service(echo, Some(file_store(&path)))
        .translate_document(&lines(&["Paris"]), "en", "fr")
        .await
        .unwrap();

    let store = file_store(&path);
    assert_eq!(store.stats().entries, 0);
    assert_eq!(store.durable().repository().prune_older_than(30).unwrap(), 0);
}
