/*!
 * Subtitle line translation pipeline.
 *
 * Leaf components first:
 *
 * - `dedup`: collapse repeated lines and expand results back
 * - `translatable`: lines kept as-is without a request
 * - `concurrency`: process-wide request gate (in-flight ceiling + rate limit)
 * - `batch`: size-aware packing of lines into numbered batches
 * - `prompts`: batch and single-line prompt wording
 * - `parser`: tolerant reader for numbered responses with found-ratio policy
 * - `quality`: per-line accept/reject checks
 * - `breaker`: switches a session to single-line mode after repeated failures
 * - `cache`: memory, durable and hybrid translation stores
 * - `report`: per-document counters
 * - `orchestrator`: the per-session pipeline composed from the above
 * - `service`: long-lived owner of backend, cache and gate
 */

pub mod batch;
pub mod breaker;
pub mod cache;
pub mod concurrency;
pub mod dedup;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod quality;
pub mod report;
pub mod service;
pub mod translatable;

pub use self::batch::{Batch, BatchMember, SmartBatcher, make_batches};
pub use self::breaker::{BreakerMode, BreakerState, CircuitBreaker};
pub use self::cache::{CacheKey, CacheStats, DurableCache, HybridCache, MemoryCache, TranslationStore};
pub use self::concurrency::{MAX_IN_FLIGHT_REQUESTS, RateLimiter, RequestGate};
pub use self::dedup::{UniqueSet, expand, reduce};
pub use self::orchestrator::{Orchestrator, ProgressCallback, SourceLine};
pub use self::parser::{BatchResponseParser, ParseOutcome, ParsedResponse};
pub use self::quality::{QualityValidator, Rejection};
pub use self::report::{DocumentOutcome, DocumentReport};
pub use self::service::TranslationService;
pub use self::translatable::{SkipReason, is_translatable};
