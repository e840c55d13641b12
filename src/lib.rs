/*!
 * # subtrans
 *
 * Batched subtitle translation against an unreliable local LLM backend.
 *
 * ## Features
 *
 * - Deduplication of repeated lines before any request is made
 * - Lyrics, formatting-only and letterless lines kept without a request
 * - Size-aware batching with numbered prompts and a tolerant response parser
 * - Per-line quality checks with fallback to the source text
 * - Circuit breaker that degrades to one request per line
 * - Two-tier translation cache (LRU in memory, SQLite on disk)
 * - Process-wide ceiling of two in-flight requests plus a rate limiter
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `translation`: the pipeline, see `translation::orchestrator`
 * - `providers`: backend trait, Ollama client and a mock for tests
 * - `database`: SQLite persistence for the durable cache tier
 * - `language_utils`: ISO 639 language code utilities
 * - `errors`: error types for the library
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod database;
pub mod errors;
pub mod language_utils;
pub mod providers;
pub mod translation;

pub use app_config::Config;
pub use errors::{AppError, BatchFailure, ConfigError, ProviderError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use providers::TranslationBackend;
pub use translation::{DocumentOutcome, DocumentReport, Orchestrator, TranslationService};
