/*!
 * Size-aware batching of unique lines.
 *
 * Lines are packed greedily in their original order. A batch is closed as
 * soon as the next line would push it past either the line-count or the
 * character bound. A line that is longer than the character bound on its own
 * is never split: it travels alone in a singleton batch.
 */

use crate::errors::ConfigError;

/// One line inside a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchMember {
    /// 1-based number used in the prompt and expected back in the response
    pub number: usize,

    /// Index into the unique set this line came from
    pub canonical_index: usize,

    /// Text sent to the backend
    pub text: String,
}

/// An ordered group of lines sent in one backend call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    /// Members, numbered contiguously from 1
    pub members: Vec<BatchMember>,
}

impl Batch {
    /// Number of lines in the batch
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the batch has no lines
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Total characters across all member texts
    pub fn char_count(&self) -> usize {
        self.members.iter().map(|m| m.text.chars().count()).sum()
    }

    /// Canonical indices of all members, in batch order
    pub fn canonical_indices(&self) -> Vec<usize> {
        self.members.iter().map(|m| m.canonical_index).collect()
    }

    fn push(&mut self, canonical_index: usize, text: &str) {
        self.members.push(BatchMember {
            number: self.members.len() + 1,
            canonical_index,
            text: text.to_string(),
        });
    }
}

/// Greedy packer bounded by line count and total characters
#[derive(Debug, Clone, Copy)]
pub struct SmartBatcher {
    max_count: usize,
    max_chars: usize,
}

impl SmartBatcher {
    /// Create a batcher; both bounds must be non-zero
    pub fn new(max_count: usize, max_chars: usize) -> Result<Self, ConfigError> {
        if max_count == 0 {
            return Err(ConfigError::ZeroBatchLimit("max_batch_lines"));
        }
        if max_chars == 0 {
            return Err(ConfigError::ZeroBatchLimit("max_batch_chars"));
        }
        Ok(Self { max_count, max_chars })
    }

    /// Maximum lines per batch
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Maximum characters per batch
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Pack `(canonical_index, text)` pairs into batches, preserving order
    pub fn batch<'a, I>(&self, lines: I) -> Vec<Batch>
    where
        I: IntoIterator<Item = (usize, &'a str)>,
    {
        let mut batches = Vec::new();
        let mut current = Batch::default();
        let mut current_chars = 0;

        for (canonical_index, text) in lines {
            let len = text.chars().count();

            if len > self.max_chars {
                if !current.is_empty() {
                    batches.push(std::mem::take(&mut current));
                    current_chars = 0;
                }
                let mut single = Batch::default();
                single.push(canonical_index, text);
                batches.push(single);
                continue;
            }

            if !current.is_empty()
                && (current.len() + 1 > self.max_count || current_chars + len > self.max_chars)
            {
                batches.push(std::mem::take(&mut current));
                current_chars = 0;
            }

            current.push(canonical_index, text);
            current_chars += len;
        }

        if !current.is_empty() {
            batches.push(current);
        }

        batches
    }
}

/// Batch a list of unique lines, using each line's position as its canonical index
pub fn make_batches(unique: &[String], max_count: usize, max_chars: usize) -> Result<Vec<Batch>, ConfigError> {
    let batcher = SmartBatcher::new(max_count, max_chars)?;
    Ok(batcher.batch(unique.iter().enumerate().map(|(i, s)| (i, s.as_str()))))
}
