/*!
 * Prompt construction for batch and single-line requests.
 *
 * Batch prompts number every line as `N│ text` and ask for the same format
 * back, which is what `parser` knows how to read.
 */

use crate::language_utils::get_language_name;
use crate::translation::batch::Batch;

/// Separator placed between a line number and its text in batch prompts
pub const PROMPT_SEPARATOR: char = '│';

/// Lines shown in the format example before eliding with "..."
const EXAMPLE_LINES: usize = 3;

/// Builds backend prompts for one language pair
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    source_name: String,
    target_name: String,
}

impl PromptBuilder {
    /// Create a builder; unknown codes are used verbatim in the wording
    pub fn new(source_language: &str, target_language: &str) -> Self {
        Self {
            source_name: get_language_name(source_language).unwrap_or_else(|_| source_language.to_string()),
            target_name: get_language_name(target_language).unwrap_or_else(|_| target_language.to_string()),
        }
    }

    /// Numbered lines exactly as they appear in the batch prompt
    pub fn numbered_lines(batch: &Batch) -> String {
        batch
            .members
            .iter()
            .map(|m| format!("{}{} {}", m.number, PROMPT_SEPARATOR, m.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Prompt asking for every line of `batch` back in numbered form
    pub fn batch_prompt(&self, batch: &Batch) -> String {
        let n = batch.len();
        let mut example = (1..=n.min(EXAMPLE_LINES))
            .map(|i| format!("{}{} ...", i, PROMPT_SEPARATOR))
            .collect::<Vec<_>>()
            .join("\n");
        if n > EXAMPLE_LINES {
            example.push_str(&format!("\n...\n{}{} ...", n, PROMPT_SEPARATOR));
        }

        format!(
            "Translate the {n} numbered subtitle lines below from {src} to {tgt}.\n\
             Answer with exactly {n} lines in this format and nothing else:\n\
             {example}\n\n\
             Rules:\n\
             - keep the numbering and the order\n\
             - one translated line per number\n\
             - keep names, sound effects and formatting tags as they are\n\n\
             INPUT ({n} lines):\n\
             {lines}",
            n = n,
            src = self.source_name,
            tgt = self.target_name,
            example = example,
            lines = Self::numbered_lines(batch),
        )
    }

    /// Prompt for a single line
    pub fn line_prompt(&self, text: &str) -> String {
        format!(
            "Translate this subtitle line from {} to {}. Answer with the translation only.\n\n{}",
            self.source_name, self.target_name, text
        )
    }
}
