/*!
 * Per-document counters.
 */

use serde::Serialize;
use std::time::Duration;

/// What happened while translating one document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentReport {
    /// Lines in the input
    pub total_lines: usize,
    /// Distinct lines after deduplication
    pub unique_lines: usize,
    /// Unique lines that were blank and passed through
    pub blank_lines: usize,
    /// Unique lines answered from the cache
    pub cache_hits: usize,
    /// Unique lines kept as-is without a request (lyrics, tags, no letters)
    pub skipped_lines: usize,
    /// Batch calls whose response was parsed
    pub batches_parsed: usize,
    /// Batch calls that failed or returned no usable result
    pub batches_failed: usize,
    /// Unique lines with an accepted translation from the backend
    pub lines_translated: usize,
    /// Unique lines whose translation was rejected by the validator
    pub lines_rejected: usize,
    /// Unique lines missing from an otherwise usable batch response
    pub gaps: usize,
    /// Backend calls made for a single line
    pub single_line_calls: usize,
    /// Backend calls that failed at the transport level
    pub transport_failures: usize,
    /// The breaker switched the session to single-line mode during this document
    pub breaker_tripped: bool,
    /// Cancellation was requested before the document finished
    pub cancelled: bool,
    /// Wall-clock time spent
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl DocumentReport {
    /// Unique lines that kept their source text
    pub fn untranslated_lines(&self) -> usize {
        self.unique_lines
            .saturating_sub(self.blank_lines + self.skipped_lines + self.cache_hits + self.lines_translated)
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} lines ({} unique, {} cached): {} translated, {} skipped, {} rejected, {} gaps, {} kept; \
             {} batches ({} failed), {} single-line calls in {:.1}s",
            self.total_lines,
            self.unique_lines,
            self.cache_hits,
            self.lines_translated,
            self.skipped_lines,
            self.lines_rejected,
            self.gaps,
            self.untranslated_lines(),
            self.batches_parsed + self.batches_failed,
            self.batches_failed,
            self.single_line_calls,
            self.duration.as_secs_f64()
        );
        if self.breaker_tripped {
            summary.push_str(" [batch mode disabled]");
        }
        if self.cancelled {
            summary.push_str(" [cancelled]");
        }
        summary
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

/// Translated lines together with the report that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutcome {
    /// One output line per input line, in input order
    pub lines: Vec<String>,
    /// Counters for this document
    pub report: DocumentReport,
}
