/*!
 * Tests for configuration loading and validation
 */

use subtrans::app_config::{Config, LogLevel};
use subtrans::errors::ConfigError;

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path).unwrap();

    assert!(path.exists());
    let reloaded = Config::from_file(&path).unwrap();
    assert_eq!(reloaded.backend.model, config.backend.model);
    assert_eq!(reloaded.pipeline.max_batch_lines, 8);
}

#[test]
fn test_fromFile_withPartialJson_shouldKeepDefaultsForMissingSections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(
        &path,
        r#"{ "target_language": "de", "pipeline": { "max_batch_lines": 4 }, "log_level": "debug" }"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.target_language, "de");
    assert_eq!(config.pipeline.max_batch_lines, 4);
    assert_eq!(config.pipeline.max_batch_chars, 1200);
    assert_eq!(config.pipeline.breaker_failure_threshold, 3);
    assert_eq!(config.validation.min_length_ratio, 0.2);
    assert!(config.pipeline.skip_untranslatable);
    assert!(matches!(config.log_level, LogLevel::Debug));
    assert!(config.validate().is_ok());
}

#[test]
fn test_fromFile_withInvalidJson_shouldFail() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_validate_withUnknownLanguage_shouldFail() {
    let config = Config {
        source_language: "zz".to_string(),
        ..Config::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::InvalidLanguage(_))));
}

#[test]
fn test_validate_withBadEndpoint_shouldFail() {
    let mut config = Config::default();
    config.backend.endpoint = "not a url".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::InvalidBackend(_))));
}

#[test]
fn test_validate_withZeroConcurrency_shouldFail() {
    let mut config = Config::default();
    config.pipeline.max_in_flight = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidConcurrency { .. })));
}

#[test]
fn test_validate_withZeroCacheCapacity_shouldFail() {
    let mut config = Config::default();
    config.cache.memory_capacity = 0;
    assert_eq!(config.validate(), Err(ConfigError::ZeroCacheCapacity));
}
