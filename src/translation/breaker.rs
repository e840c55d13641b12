/*!
 * Batch-mode circuit breaker.
 *
 * Counts consecutive batch outcomes for one session. Once
 * `failure_threshold` batches in a row fail (transport error or unusable
 * response) batch mode is switched off for the rest of the session and every
 * remaining line goes through single-line requests. Only `reset` turns batch
 * mode back on.
 */

use log::{debug, warn};

use crate::errors::ConfigError;

/// Default number of consecutive failed batches before tripping
pub const DEFAULT_FAILURE_THRESHOLD: usize = 3;

/// Whether batches may still be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakerMode {
    /// Normal operation
    #[default]
    BatchEnabled,
    /// Tripped: single-line requests only
    BatchDisabled,
}

/// Snapshot of the breaker counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BreakerState {
    /// Failed batches since the last success
    pub consecutive_failures: usize,
    /// Successful batches since the last failure
    pub consecutive_successes: usize,
    /// Current mode
    pub mode: BreakerMode,
}

/// One-way switch from batch to single-line translation
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: usize,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            state: BreakerState::default(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl CircuitBreaker {
    /// Create a breaker that trips after `failure_threshold` consecutive failures
    pub fn new(failure_threshold: usize) -> Result<Self, ConfigError> {
        if failure_threshold == 0 {
            return Err(ConfigError::ZeroBreakerThreshold);
        }
        Ok(Self {
            state: BreakerState::default(),
            failure_threshold,
        })
    }

    /// A batch was parsed successfully
    pub fn record_success(&mut self) {
        self.state.consecutive_successes += 1;
        self.state.consecutive_failures = 0;
    }

    /// A batch failed; returns true when this failure tripped the breaker
    pub fn record_failure(&mut self) -> bool {
        self.state.consecutive_failures += 1;
        self.state.consecutive_successes = 0;

        if self.state.mode == BreakerMode::BatchEnabled
            && self.state.consecutive_failures >= self.failure_threshold
        {
            self.state.mode = BreakerMode::BatchDisabled;
            warn!(
                "{} consecutive batch failures, switching to line-by-line translation",
                self.state.consecutive_failures
            );
            return true;
        }

        debug!(
            "Batch failure {}/{}",
            self.state.consecutive_failures, self.failure_threshold
        );
        false
    }

    /// Whether batches may still be sent
    pub fn is_batch_enabled(&self) -> bool {
        self.state.mode == BreakerMode::BatchEnabled
    }

    /// Current counters and mode
    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Configured trip threshold
    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    /// Return to the initial state (manual recovery)
    pub fn reset(&mut self) {
        self.state = BreakerState::default();
    }
}
