/*!
 * Lines that are never sent to the backend.
 *
 * Song lyrics framed by note marks and ASS override blocks with no text are
 * kept as they are, and so is anything with fewer than two letters (track
 * numbers, "?!", "...").
 */

use once_cell::sync::Lazy;
use regex::Regex;

static MUSIC_LYRICS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^\s*[♪♫🎵🎶]+.*[♪♫🎵🎶]+\s*$").unwrap());

static TAG_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:\{[^}]*\}\s*)+$").unwrap());

/// Minimum alphabetic characters for a line to be worth a request
const MIN_LETTERS: usize = 2;

/// Why a line was kept without asking the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Lyrics between note marks
    MusicLyrics,
    /// Only `{...}` formatting blocks
    TagOnly,
    /// Numbers, punctuation or a single letter
    TooFewLetters,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MusicLyrics => write!(f, "song lyrics"),
            Self::TagOnly => write!(f, "formatting tags only"),
            Self::TooFewLetters => write!(f, "too few letters"),
        }
    }
}

/// Reason to keep `text` untranslated, or `None` when it should be translated
pub fn skip_reason(text: &str) -> Option<SkipReason> {
    if MUSIC_LYRICS.is_match(text) {
        return Some(SkipReason::MusicLyrics);
    }
    if TAG_ONLY.is_match(text) {
        return Some(SkipReason::TagOnly);
    }
    if text.chars().filter(|c| c.is_alphabetic()).count() < MIN_LETTERS {
        return Some(SkipReason::TooFewLetters);
    }
    None
}

/// Whether `text` is worth a backend call
pub fn is_translatable(text: &str) -> bool {
    skip_reason(text).is_none()
}
