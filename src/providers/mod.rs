/*!
 * Translation backends.
 *
 * - `ollama`: local Ollama server over HTTP
 * - `mock`: scripted backend for tests and benchmarks
 */

use async_trait::async_trait;

use crate::errors::ProviderError;

/// Text-generation backend the pipeline sends prompts to
///
/// Implementations must be safe to call from several tasks at once; the
/// pipeline bounds concurrency itself through the request gate.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Send one prompt and return the raw completion text
    async fn translate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Identity of provider and model, part of every cache key
    fn engine_id(&self) -> String;

    /// Check that the backend is reachable
    async fn test_connection(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

pub mod mock;
pub mod ollama;
