/*!
 * Parsing of free-form numbered batch responses.
 *
 * Backends are asked to answer `N│ text` per line but in practice reply with
 * `N.`, `N)`, `N:`, `N -`, `[N]` or just `N text`, add a preamble, wrap lines
 * in quotes or break one entry over two lines. `BatchResponseParser` reads all
 * of that in a single pass over the lines and then decides, from the share of
 * numbers it recovered, whether the batch is usable at all.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

use crate::app_config::PipelineConfig;
use crate::errors::ConfigError;

/// Characters accepted between a line number and its text.
/// Plain whitespace and the `[N]` form are accepted as well.
pub const ACCEPTED_SEPARATORS: &[char] = &['.', ')', ':', '|', '│', '-', '–', '—'];

/// Below this share of recovered numbers the backend ignored the format
pub const MIN_FOUND_RATIO: f64 = 0.60;

/// Below this share too many lines are missing to use the batch
pub const USABLE_FOUND_RATIO: f64 = 0.70;

static NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| {
    let class: String = ACCEPTED_SEPARATORS
        .iter()
        .map(|c| regex::escape(&c.to_string()))
        .collect();
    Regex::new(&format!(
        r"^(?:\[(\d{{1,4}})\]|(\d{{1,4}})(?:\s*[{class}]+|\s+))\s*(.*)$"
    ))
    .unwrap()
});

static LEADING_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:translation|translated text|output)\s*:\s*").unwrap()
});

static EXCESS_DOTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{4,}").unwrap());

static REPEATED_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&nbsp;", " "),
    ("&amp;", "&"),
];

const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('“', '”'), ('«', '»'), ('「', '」')];

/// Why a response was not usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoResultReason {
    /// Fewer than `min_found_ratio` of the numbers were found
    FormatIgnored,
    /// Between the two cut points: format followed but too many gaps
    TooManyMissing,
}

/// Entries recovered from one batch response
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    /// Local number -> translated text; absent numbers are gaps
    pub entries: BTreeMap<usize, String>,

    /// Size of the batch the response belongs to
    pub expected: usize,
}

impl ParsedResponse {
    /// Recovered entries divided by batch size
    pub fn found_ratio(&self) -> f64 {
        if self.expected == 0 {
            1.0
        } else {
            self.entries.len() as f64 / self.expected as f64
        }
    }

    /// Translation for a local number, if it was recovered
    pub fn get(&self, number: usize) -> Option<&str> {
        self.entries.get(&number).map(String::as_str)
    }

    /// Local numbers with no recovered entry
    pub fn missing(&self) -> Vec<usize> {
        (1..=self.expected).filter(|n| !self.entries.contains_key(n)).collect()
    }
}

/// Result of parsing one batch response
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Usable, possibly with gaps
    Parsed(ParsedResponse),

    /// Not usable; the whole batch falls back to single-line requests
    NoResult {
        /// Entries recovered
        found: usize,
        /// Batch size
        expected: usize,
        /// found / expected
        found_ratio: f64,
        /// Which cut point was missed
        reason: NoResultReason,
    },
}

impl ParseOutcome {
    /// Share of numbers recovered, whichever way the outcome went
    pub fn found_ratio(&self) -> f64 {
        match self {
            Self::Parsed(parsed) => parsed.found_ratio(),
            Self::NoResult { found_ratio, .. } => *found_ratio,
        }
    }
}

/// Tolerant reader for numbered-list responses
#[derive(Debug, Clone)]
pub struct BatchResponseParser {
    min_found_ratio: f64,
    usable_found_ratio: f64,
    join_continuation_lines: bool,
}

impl Default for BatchResponseParser {
    fn default() -> Self {
        Self {
            min_found_ratio: MIN_FOUND_RATIO,
            usable_found_ratio: USABLE_FOUND_RATIO,
            join_continuation_lines: true,
        }
    }
}

impl BatchResponseParser {
    /// Create a parser with custom cut points (both in (0, 1], min <= usable)
    pub fn new(min_found_ratio: f64, usable_found_ratio: f64) -> Result<Self, ConfigError> {
        let in_range = |r: f64| r > 0.0 && r <= 1.0;
        if !in_range(min_found_ratio) || !in_range(usable_found_ratio) || min_found_ratio > usable_found_ratio {
            return Err(ConfigError::InvalidThresholds {
                min: min_found_ratio,
                usable: usable_found_ratio,
            });
        }
        Ok(Self {
            min_found_ratio,
            usable_found_ratio,
            join_continuation_lines: true,
        })
    }

    /// Create a parser from pipeline settings
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.min_found_ratio, config.usable_found_ratio)?
            .with_continuation_lines(config.join_continuation_lines))
    }

    /// Whether unnumbered lines extend the preceding entry
    pub fn with_continuation_lines(mut self, join: bool) -> Self {
        self.join_continuation_lines = join;
        self
    }

    /// Parse `raw` as the answer to a batch of `expected` lines
    pub fn parse(&self, raw: &str, expected: usize) -> ParseOutcome {
        if expected == 0 {
            return ParseOutcome::Parsed(ParsedResponse {
                entries: BTreeMap::new(),
                expected: 0,
            });
        }

        let entries = self.extract_entries(raw, expected);
        let found = entries.len();
        let found_ratio = found as f64 / expected as f64;

        if found_ratio < self.min_found_ratio {
            return ParseOutcome::NoResult {
                found,
                expected,
                found_ratio,
                reason: NoResultReason::FormatIgnored,
            };
        }
        if found_ratio < self.usable_found_ratio {
            return ParseOutcome::NoResult {
                found,
                expected,
                found_ratio,
                reason: NoResultReason::TooManyMissing,
            };
        }

        ParseOutcome::Parsed(ParsedResponse { entries, expected })
    }

    fn extract_entries(&self, raw: &str, expected: usize) -> BTreeMap<usize, String> {
        let mut collected: BTreeMap<usize, String> = BTreeMap::new();
        let mut seen: HashSet<usize> = HashSet::new();
        let mut current: Option<usize> = None;

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                current = None;
                continue;
            }

            if let Some((number, text)) = match_marker(line, expected) {
                if seen.insert(number) {
                    collected.insert(number, text.to_string());
                    current = Some(number);
                } else {
                    // first occurrence wins; drop the repeat and anything it carries
                    current = None;
                }
                continue;
            }

            if let Some(number) = current {
                if let Some(entry) = collected.get_mut(&number) {
                    if entry.is_empty() {
                        entry.push_str(line);
                    } else if self.join_continuation_lines {
                        entry.push('\n');
                        entry.push_str(line);
                    }
                }
            }
        }

        collected
            .into_iter()
            .filter_map(|(number, text)| {
                let cleaned = clean_response(&text);
                (!is_blank_or_punctuation(&cleaned)).then_some((number, cleaned))
            })
            .collect()
    }
}

/// Parse with the default cut points
pub fn parse(raw: &str, expected: usize) -> ParseOutcome {
    BatchResponseParser::default().parse(raw, expected)
}

fn match_marker(line: &str, expected: usize) -> Option<(usize, &str)> {
    let caps = NUMBERED_LINE.captures(line)?;
    let number: usize = caps.get(1).or_else(|| caps.get(2))?.as_str().parse().ok()?;
    if number == 0 || number > expected {
        return None;
    }
    let text = caps.get(3).map_or("", |m| m.as_str());
    Some((number, text))
}

fn is_blank_or_punctuation(text: &str) -> bool {
    text.chars().all(|c| !c.is_alphanumeric())
}

/// Remove a single pair of quotes wrapping the whole text
fn strip_wrapping_quotes(text: &str) -> &str {
    for (open, close) in QUOTE_PAIRS {
        if let Some(inner) = text.strip_prefix(*open).and_then(|t| t.strip_suffix(*close)) {
            if !inner.is_empty() {
                return inner.trim();
            }
        }
    }
    text
}

/// Tidy a raw backend answer: labels, quotes, HTML entities, ellipses, spacing
pub fn clean_response(text: &str) -> String {
    let mut cleaned = LEADING_LABEL.replace(text.trim(), "").into_owned();

    for (entity, replacement) in HTML_ENTITIES {
        if cleaned.contains(entity) {
            cleaned = cleaned.replace(entity, replacement);
        }
    }

    let cleaned = EXCESS_DOTS.replace_all(&cleaned, "...");
    let cleaned = REPEATED_SPACES.replace_all(&cleaned, " ");
    strip_wrapping_quotes(cleaned.trim()).to_string()
}
