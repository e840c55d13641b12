/*!
 * Mock backend for testing.
 *
 * Simulates the behaviors the pipeline must survive:
 * - `MockBackend::translating(f)` - answers every prompt in the expected
 *   numbered format, applying `f` to each line
 * - `MockBackend::fixed(text)` - always answers with the same text
 * - `MockBackend::scripted(answers)` - answers from a queue, then echoes
 * - `MockBackend::failing()` - always fails with a transport error
 * - `MockBackend::garbage()` - answers with text containing no numbered lines
 *
 * Every mock counts calls, records prompts and tracks peak concurrency.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::TranslationBackend;
use crate::translation::prompts::PROMPT_SEPARATOR;

/// Header that precedes the numbered lines of a batch prompt
const BATCH_INPUT_HEADER: &str = "INPUT (";

type LineFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Behavior mode for the mock backend
#[derive(Clone)]
pub enum MockBehavior {
    /// Translate every line with the function, in numbered form for batches
    Translating(LineFn),
    /// Always answer with this text
    Fixed(String),
    /// Pop answers from the queue; each entry is either text or a failure
    Scripted(Arc<Mutex<VecDeque<Result<String, String>>>>),
    /// Always fail with a connection error
    Failing,
    /// Answer with prose that contains no numbered lines
    Garbage,
}

impl std::fmt::Debug for MockBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Translating(_) => write!(f, "Translating"),
            Self::Fixed(text) => write!(f, "Fixed({:?})", text),
            Self::Scripted(queue) => write!(f, "Scripted({} left)", queue.lock().len()),
            Self::Failing => write!(f, "Failing"),
            Self::Garbage => write!(f, "Garbage"),
        }
    }
}

/// Mock backend for testing translation behavior
#[derive(Debug)]
pub struct MockBackend {
    behavior: MockBehavior,
    delay: Option<Duration>,
    engine: String,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            engine: "mock:test".to_string(),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer every line with `f(line)`
    pub fn translating<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self::new(MockBehavior::Translating(Arc::new(f)))
    }

    /// Prefix every line with `[target]`
    pub fn tagging(target: &str) -> Self {
        let tag = format!("[{}]", target);
        Self::translating(move |line| format!("{} {}", tag, line))
    }

    /// Always answer with `text`
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(MockBehavior::Fixed(text.into()))
    }

    /// Answer from `answers` in order; `Err` entries become connection errors
    pub fn scripted(answers: Vec<Result<String, String>>) -> Self {
        Self::new(MockBehavior::Scripted(Arc::new(Mutex::new(answers.into()))))
    }

    /// Create a failing mock that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that ignores the requested format
    pub fn garbage() -> Self {
        Self::new(MockBehavior::Garbage)
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report a different engine identity
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Number of calls received
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous calls observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Every prompt received, in arrival order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    fn respond(&self, prompt: &str) -> Result<String, ProviderError> {
        match &self.behavior {
            MockBehavior::Translating(f) => Ok(answer_prompt(prompt, f.as_ref())),
            MockBehavior::Fixed(text) => Ok(text.clone()),
            MockBehavior::Scripted(queue) => match queue.lock().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(ProviderError::ConnectionError(message)),
                None => Ok(answer_prompt(prompt, &|line: &str| line.to_string())),
            },
            MockBehavior::Failing => Err(ProviderError::ConnectionError("Simulated backend failure".to_string())),
            MockBehavior::Garbage => Ok("I'm sorry, I can only help with one sentence at a time.".to_string()),
        }
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.respond(prompt);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn engine_id(&self) -> String {
        self.engine.clone()
    }
}

/// Numbered lines of a batch prompt, or `None` for a single-line prompt
pub fn prompt_lines(prompt: &str) -> Option<Vec<(usize, String)>> {
    let start = prompt.find(BATCH_INPUT_HEADER)?;
    let body = prompt[start..].split_once('\n').map(|(_, rest)| rest)?;
    Some(
        body.lines()
            .filter_map(|line| {
                let (number, text) = line.split_once(PROMPT_SEPARATOR)?;
                Some((number.trim().parse().ok()?, text.trim().to_string()))
            })
            .collect(),
    )
}

fn answer_prompt(prompt: &str, f: &dyn Fn(&str) -> String) -> String {
    match prompt_lines(prompt) {
        Some(lines) => lines
            .iter()
            .map(|(n, text)| format!("{}. {}", n, f(text)))
            .collect::<Vec<_>>()
            .join("\n"),
        None => {
            let line = prompt.rsplit("\n\n").next().unwrap_or(prompt);
            f(line)
        }
    }
}
