/*!
 * Line deduplication.
 *
 * Subtitle tracks repeat short lines constantly ("Yeah.", "What?", names).
 * `reduce` collapses them to one canonical entry per distinct trimmed text and
 * `expand` fans the canonical results back out to every original position.
 */

use std::collections::HashMap;

/// Distinct lines plus the mapping back to the original positions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UniqueSet {
    /// Distinct trimmed texts in order of first appearance
    pub unique: Vec<String>,

    /// For each original position, the index into `unique`
    pub index_map: Vec<usize>,
}

impl UniqueSet {
    /// Number of original lines
    pub fn original_len(&self) -> usize {
        self.index_map.len()
    }

    /// Lines that were folded into an earlier identical line
    pub fn duplicate_count(&self) -> usize {
        self.index_map.len() - self.unique.len()
    }

    /// Whether there was nothing to reduce
    pub fn is_empty(&self) -> bool {
        self.index_map.is_empty()
    }
}

/// Collapse identical (after trimming) lines to one canonical entry each
pub fn reduce<S: AsRef<str>>(lines: &[S]) -> UniqueSet {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(lines.len());
    let mut unique = Vec::new();
    let mut index_map = Vec::with_capacity(lines.len());

    for line in lines {
        let text = line.as_ref().trim();
        let canonical = *seen.entry(text).or_insert_with(|| {
            unique.push(text.to_string());
            unique.len() - 1
        });
        index_map.push(canonical);
    }

    UniqueSet { unique, index_map }
}

/// Restore original order and length from per-unique results
///
/// `unique_results` must be indexed like `UniqueSet::unique`.
pub fn expand(unique_results: &[String], index_map: &[usize]) -> Vec<String> {
    index_map
        .iter()
        .map(|&canonical| unique_results[canonical].clone())
        .collect()
}
