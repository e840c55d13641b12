/*!
 * Line-level quality checks.
 *
 * A rejected translation is never an error for the document: the caller keeps
 * the source line, logs the rejection and counts it.
 */

use thiserror::Error;

use crate::app_config::ValidationConfig;
use crate::errors::ConfigError;
use crate::language_utils::canonical_code;

/// Consecutive repeats of a two-character pattern treated as degenerate output
const REPETITION_RUN: usize = 5;

/// Target languages that are expected to produce CJK characters
const CJK_TARGETS: &[&str] = &["zh", "ja", "ko"];

/// Why a translated line was not accepted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Nothing but whitespace came back
    #[error("empty translation")]
    Empty,

    /// The backend echoed the source
    #[error("translation identical to source")]
    Identical,

    /// Suspiciously short compared to the source
    #[error("translation too short (ratio {ratio:.2})")]
    TooShort {
        /// translated / source length in characters
        ratio: f64,
    },

    /// Suspiciously long compared to the source
    #[error("translation too long (ratio {ratio:.2})")]
    TooLong {
        /// translated / source length in characters
        ratio: f64,
    },

    /// Starts with model chatter such as "Here is"
    #[error("model artifact '{0}'")]
    Artifact(String),

    /// Degenerated into a repeated short pattern
    #[error("repetitive output")]
    Repetition,

    /// Contains CJK characters the target language should not have
    #[error("unexpected CJK characters")]
    UnexpectedScript,
}

/// Accept/reject decision for one (source, translation) pair
#[derive(Debug, Clone)]
pub struct QualityValidator {
    min_length_ratio: f64,
    max_length_ratio: f64,
    min_source_chars_for_ratio: usize,
    reject_repetition: bool,
    artifact_prefixes: Vec<String>,
    allows_cjk: bool,
}

impl Default for QualityValidator {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

impl QualityValidator {
    /// Build from validated settings
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            min_length_ratio: config.min_length_ratio,
            max_length_ratio: config.max_length_ratio,
            min_source_chars_for_ratio: config.min_source_chars_for_ratio,
            reject_repetition: config.reject_repetition,
            artifact_prefixes: config.artifact_prefixes.iter().map(|p| p.to_lowercase()).collect(),
            allows_cjk: true,
        }
    }

    /// Build from settings, checking them first
    pub fn new(config: &ValidationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    /// Tune the script check to the language being produced
    pub fn for_target(mut self, target_language: &str) -> Self {
        self.allows_cjk = CJK_TARGETS.contains(&canonical_code(target_language).as_str());
        self
    }

    /// Whether `translated` may be used in place of `source`
    pub fn accept(&self, source: &str, translated: &str) -> bool {
        self.check(source, translated).is_ok()
    }

    /// Same as `accept` but says why a line was rejected
    pub fn check(&self, source: &str, translated: &str) -> Result<(), Rejection> {
        let source = source.trim();
        let translated = translated.trim();

        if translated.is_empty() {
            return Err(Rejection::Empty);
        }
        if translated.to_lowercase() == source.to_lowercase() {
            return Err(Rejection::Identical);
        }

        let translated_lower = translated.to_lowercase();
        let source_lower = source.to_lowercase();
        if let Some(prefix) = self
            .artifact_prefixes
            .iter()
            .find(|p| translated_lower.starts_with(p.as_str()) && !source_lower.starts_with(p.as_str()))
        {
            return Err(Rejection::Artifact(prefix.clone()));
        }

        if self.reject_repetition && has_repetition(translated) && !has_repetition(source) {
            return Err(Rejection::Repetition);
        }

        if !self.allows_cjk && contains_cjk(translated) && !contains_cjk(source) {
            return Err(Rejection::UnexpectedScript);
        }

        let source_len = source.chars().count();
        if source_len >= self.min_source_chars_for_ratio {
            let ratio = translated.chars().count() as f64 / source_len as f64;
            if ratio < self.min_length_ratio {
                return Err(Rejection::TooShort { ratio });
            }
            if ratio > self.max_length_ratio {
                return Err(Rejection::TooLong { ratio });
            }
        }

        Ok(())
    }
}

/// A two-character pattern repeated `REPETITION_RUN` times in a row
fn has_repetition(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let span = 2 * REPETITION_RUN;
    if chars.len() < span {
        return false;
    }

    chars.windows(span).any(|w| {
        let (a, b) = (w[0], w[1]);
        !(a.is_whitespace() && b.is_whitespace())
            && w.chunks(2).all(|pair| pair[0] == a && pair[1] == b)
    })
}

fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c as u32,
            0x4E00..=0x9FFF   // CJK unified ideographs
            | 0x3040..=0x309F // hiragana
            | 0x30A0..=0x30FF // katakana
            | 0xAC00..=0xD7AF // hangul syllables
        )
    })
}
