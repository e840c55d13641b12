/*!
 * Request gating in front of the translation backend.
 *
 * Local generation servers share one GPU, so the process never has more than
 * `MAX_IN_FLIGHT_REQUESTS` backend calls running and successive calls are
 * spaced by a minimum interval whichever worker issues them. Both limits live
 * in `RequestGate`; `RequestGate::global()` is the instance every service in
 * the process shares.
 */

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as DirectLimiter};
use log::debug;
use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Hard ceiling on simultaneous backend calls
pub const MAX_IN_FLIGHT_REQUESTS: usize = 2;

/// Default minimum gap between two backend calls
pub const DEFAULT_RATE_LIMIT_INTERVAL: Duration = Duration::from_millis(100);

static GLOBAL_GATE: OnceCell<Arc<RequestGate>> = OnceCell::new();

type GcraLimiter = DirectLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Enforces a minimum wall-clock gap between successive calls
///
/// One cell per interval with no burst, so callers leave one interval apart
/// in the order they asked. A zero interval disables limiting.
pub struct RateLimiter {
    interval: Duration,
    limiter: Option<GcraLimiter>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("interval", &self.interval)
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter with the given minimum gap
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            limiter: Quota::with_period(interval).map(DirectLimiter::direct),
        }
    }

    /// Minimum gap between calls
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until a call may start and record it as started
    pub async fn wait(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        if limiter.check().is_err() {
            debug!("Rate limiting backend call ({:?} interval)", self.interval);
            limiter.until_ready().await;
        }
    }
}

/// Concurrency ceiling plus rate limiter shared by all backend calls
#[derive(Debug)]
pub struct RequestGate {
    semaphore: Semaphore,
    max_in_flight: usize,
    limiter: Arc<RateLimiter>,
}

impl RequestGate {
    /// Create a gate; `max_in_flight` is clamped to `1..=MAX_IN_FLIGHT_REQUESTS`
    pub fn new(max_in_flight: usize, interval: Duration) -> Self {
        let max_in_flight = max_in_flight.clamp(1, MAX_IN_FLIGHT_REQUESTS);
        Self {
            semaphore: Semaphore::new(max_in_flight),
            max_in_flight,
            limiter: Arc::new(RateLimiter::new(interval)),
        }
    }

    /// The process-wide gate with default settings
    pub fn global() -> Arc<Self> {
        Self::global_with(DEFAULT_RATE_LIMIT_INTERVAL)
    }

    /// The process-wide gate; the interval of the first caller wins
    pub fn global_with(interval: Duration) -> Arc<Self> {
        GLOBAL_GATE
            .get_or_init(|| Arc::new(Self::new(MAX_IN_FLIGHT_REQUESTS, interval)))
            .clone()
    }

    /// Permits this gate hands out
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Minimum gap between calls
    pub fn interval(&self) -> Duration {
        self.limiter.interval()
    }

    /// The limiter behind this gate, for backends that retry inside one call
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Calls currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.semaphore.available_permits()
    }

    /// Run `call` once a permit is free and the rate limit allows it
    pub async fn run<F>(&self, call: F) -> F::Output
    where
        F: Future,
    {
        // never closed, so acquire cannot fail
        let _permit = self.semaphore.acquire().await.ok();
        self.limiter.wait().await;
        call.await
    }
}
