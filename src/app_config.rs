/*!
 * Application configuration.
 *
 * Settings are stored as JSON (`conf.json` by default). Every field has a
 * serde default so partial files load cleanly, and `Config::validate` turns
 * impossible values into a `ConfigError` before any pipeline is built.
 */

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;
use crate::translation::concurrency::MAX_IN_FLIGHT_REQUESTS;

/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Backend connection settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Batching, parsing and resilience settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Line-level quality checks
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Translation cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Ollama backend settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    /// Model name (e.g. "llama3.2:3b")
    #[serde(default = "default_model")]
    pub model: String,

    /// Service endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Transport retries per backend call
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base delay for exponential backoff between retries
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// System prompt sent with every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// How long Ollama keeps the model loaded between calls
    #[serde(default)]
    pub keep_alive: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            system_prompt: default_system_prompt(),
            keep_alive: None,
        }
    }
}

/// Batching, parsing, breaker and request-gate settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Send several lines per backend call
    #[serde(default = "default_true")]
    pub batch_enabled: bool,

    /// Maximum lines in one batch
    #[serde(default = "default_max_batch_lines")]
    pub max_batch_lines: usize,

    /// Maximum total characters in one batch
    #[serde(default = "default_max_batch_chars")]
    pub max_batch_chars: usize,

    /// Below this found ratio the backend ignored the numbered format
    #[serde(default = "default_min_found_ratio")]
    pub min_found_ratio: f64,

    /// Below this found ratio too many lines are missing to use the batch
    #[serde(default = "default_usable_found_ratio")]
    pub usable_found_ratio: f64,

    /// Consecutive batch failures before batch mode is abandoned
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: usize,

    /// Minimum gap between two backend calls
    #[serde(default = "default_rate_limit_interval_ms")]
    pub rate_limit_interval_ms: u64,

    /// Simultaneous backend calls (clamped to the process ceiling)
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Append unnumbered lines to the preceding numbered entry
    #[serde(default = "default_true")]
    pub join_continuation_lines: bool,

    /// Keep lyrics, tag-only lines and letterless lines without a request
    #[serde(default = "default_true")]
    pub skip_untranslatable: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_enabled: true,
            max_batch_lines: default_max_batch_lines(),
            max_batch_chars: default_max_batch_chars(),
            min_found_ratio: default_min_found_ratio(),
            usable_found_ratio: default_usable_found_ratio(),
            breaker_failure_threshold: default_breaker_failure_threshold(),
            rate_limit_interval_ms: default_rate_limit_interval_ms(),
            max_in_flight: default_max_in_flight(),
            join_continuation_lines: true,
            skip_untranslatable: true,
        }
    }
}

impl PipelineConfig {
    /// Check batch limits, thresholds and concurrency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_lines == 0 {
            return Err(ConfigError::ZeroBatchLimit("max_batch_lines"));
        }
        if self.max_batch_chars == 0 {
            return Err(ConfigError::ZeroBatchLimit("max_batch_chars"));
        }
        if self.breaker_failure_threshold == 0 {
            return Err(ConfigError::ZeroBreakerThreshold);
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::InvalidConcurrency {
                value: self.max_in_flight,
                max: MAX_IN_FLIGHT_REQUESTS,
            });
        }

        let in_range = |r: f64| r > 0.0 && r <= 1.0;
        if !in_range(self.min_found_ratio)
            || !in_range(self.usable_found_ratio)
            || self.min_found_ratio > self.usable_found_ratio
        {
            return Err(ConfigError::InvalidThresholds {
                min: self.min_found_ratio,
                usable: self.usable_found_ratio,
            });
        }

        Ok(())
    }

    /// Concurrency actually used, never above the process-wide ceiling
    pub fn effective_in_flight(&self) -> usize {
        if self.max_in_flight > MAX_IN_FLIGHT_REQUESTS {
            warn!(
                "max_in_flight={} exceeds the ceiling of {}, clamping",
                self.max_in_flight, MAX_IN_FLIGHT_REQUESTS
            );
        }
        self.max_in_flight.clamp(1, MAX_IN_FLIGHT_REQUESTS)
    }
}

/// Line-level quality check settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationConfig {
    /// Shortest acceptable translation relative to its source
    #[serde(default = "default_min_length_ratio")]
    pub min_length_ratio: f64,

    /// Longest acceptable translation relative to its source
    #[serde(default = "default_max_length_ratio")]
    pub max_length_ratio: f64,

    /// Length ratio is only checked for sources at least this long
    #[serde(default = "default_min_source_chars_for_ratio")]
    pub min_source_chars_for_ratio: usize,

    /// Reject output that degenerates into a repeated short pattern
    #[serde(default = "default_true")]
    pub reject_repetition: bool,

    /// Leading labels that mark model chatter instead of a translation
    #[serde(default = "default_artifact_prefixes")]
    pub artifact_prefixes: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_length_ratio: default_min_length_ratio(),
            max_length_ratio: default_max_length_ratio(),
            min_source_chars_for_ratio: default_min_source_chars_for_ratio(),
            reject_repetition: true,
            artifact_prefixes: default_artifact_prefixes(),
        }
    }
}

impl ValidationConfig {
    /// Check the length ratio bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_length_ratio <= 0.0 || self.max_length_ratio <= self.min_length_ratio {
            return Err(ConfigError::InvalidLengthRatio {
                min: self.min_length_ratio,
                max: self.max_length_ratio,
            });
        }
        Ok(())
    }
}

/// Translation cache settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Whether translations are cached at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entries kept in the in-memory LRU tier
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// SQLite file for the durable tier (platform data dir when unset)
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_capacity: default_memory_capacity(),
            database_path: None,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "fr".to_string()
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.3
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_system_prompt() -> String {
    "You are a professional subtitle translator. Translate exactly what you are given \
     and answer with the translation only, without notes or explanations."
        .to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_batch_lines() -> usize {
    8
}

fn default_max_batch_chars() -> usize {
    1200
}

fn default_min_found_ratio() -> f64 {
    0.60
}

fn default_usable_found_ratio() -> f64 {
    0.70
}

fn default_breaker_failure_threshold() -> usize {
    3
}

fn default_rate_limit_interval_ms() -> u64 {
    100
}

fn default_max_in_flight() -> usize {
    MAX_IN_FLIGHT_REQUESTS
}

fn default_min_length_ratio() -> f64 {
    0.2
}

fn default_max_length_ratio() -> f64 {
    4.0
}

fn default_min_source_chars_for_ratio() -> usize {
    10
}

fn default_memory_capacity() -> usize {
    5000
}

fn default_artifact_prefixes() -> Vec<String> {
    [
        "translation:",
        "translated:",
        "here is",
        "here's",
        "note:",
        "output:",
        "result:",
        "i cannot",
        "i can't",
        "as an ai",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ConfigError> {
        for code in [&self.source_language, &self.target_language] {
            crate::language_utils::get_language_name(code)
                .map_err(|_| ConfigError::InvalidLanguage(code.clone()))?;
        }

        if self.backend.model.trim().is_empty() {
            return Err(ConfigError::InvalidBackend("model name is empty".to_string()));
        }
        url::Url::parse(&self.backend.endpoint)
            .map_err(|e| ConfigError::InvalidBackend(format!("endpoint '{}': {}", self.backend.endpoint, e)))?;

        self.pipeline.validate()?;
        self.validation.validate()?;

        if self.cache.enabled && self.cache.memory_capacity == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }

        Ok(())
    }

    /// Read a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load a configuration file, writing the defaults first when it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            backend: BackendConfig::default(),
            pipeline: PipelineConfig::default(),
            validation: ValidationConfig::default(),
            cache: CacheConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
