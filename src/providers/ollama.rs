/*!
 * Ollama client.
 *
 * Posts non-streaming requests to `/api/generate`. Transport failures that
 * may be transient are retried with exponential backoff, and each retry also
 * waits for the shared rate limiter when one is attached. The final error is
 * returned as a `ProviderError` for the pipeline to classify.
 */

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::BackendConfig;
use crate::errors::ProviderError;
use crate::providers::TranslationBackend;
use crate::translation::concurrency::RateLimiter;

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    /// Model used for every request
    model: String,
    /// Sampling temperature
    temperature: f32,
    /// System prompt sent with every request
    system_prompt: String,
    /// How long the server keeps the model loaded
    keep_alive: Option<String>,
    /// Request timeout, reported in timeout errors
    timeout_secs: u64,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
    /// Limiter retries wait for, normally the request gate's
    rate_limiter: Option<Arc<RateLimiter>>,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
}

/// Generation options for the Ollama API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Generated text
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// Number of prompt tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

impl GenerationRequest {
    /// Create a new non-streaming generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            options: None,
            stream: Some(false),
            keep_alive: None,
        }
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }

    /// Cap the number of generated tokens
    pub fn num_predict(mut self, num_predict: u32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).num_predict = Some(num_predict);
        self
    }

    /// Set the keep-alive duration
    pub fn keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }
}

impl Ollama {
    /// Build a client from backend settings
    pub fn from_config(config: &BackendConfig) -> Result<Self, ProviderError> {
        let base_url = url::Url::parse(&config.endpoint)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid endpoint '{}': {}", config.endpoint, e)))?
            .as_str()
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            // Ollama speaks HTTP/1.1
            .http1_only()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::ConnectionError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            system_prompt: config.system_prompt.clone(),
            keep_alive: config.keep_alive.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.retry_count,
            backoff_base_ms: config.retry_backoff_ms,
            rate_limiter: None,
        })
    }

    /// Pace retries through `limiter` like first attempts
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request for `prompt` with this client's settings
    pub fn request_for(&self, prompt: &str) -> GenerationRequest {
        let mut request = GenerationRequest::new(&self.model, prompt).temperature(self.temperature);
        if !self.system_prompt.is_empty() {
            request = request.system(&self.system_prompt);
        }
        if let Some(keep_alive) = &self.keep_alive {
            request = request.keep_alive(keep_alive);
        }
        request
    }

    /// Generate text from the Ollama API with retry logic
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let mut attempt = 0;

        loop {
            let error = match self.send_once(&url, request).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= self.max_retries {
                error!("Ollama request failed after {} attempt(s): {}", attempt + 1, error);
                return Err(error);
            }

            attempt += 1;
            let backoff_ms = self.backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(16));
            warn!(
                "Ollama request failed: {} - retrying in {}ms (attempt {}/{})",
                error,
                backoff_ms,
                attempt + 1,
                self.max_retries + 1
            );
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            if let Some(limiter) = &self.rate_limiter {
                limiter.wait().await;
            }
        }
    }

    async fn send_once(&self, url: &str, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: body,
            });
        }

        parse_generation_body(&body)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            ProviderError::ConnectionError(e.to_string())
        } else {
            ProviderError::RequestFailed(e.to_string())
        }
    }

    /// Get the Ollama API version
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response: serde_json::Value = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Ollama version response: {}", e)))?;

        response["version"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ParseError("Invalid version format in response".to_string()))
    }
}

#[async_trait]
impl TranslationBackend for Ollama {
    async fn translate(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = self.request_for(prompt);
        let response = self.generate(&request).await?;
        debug!(
            "Ollama answered with {} chars (prompt tokens: {:?}, eval tokens: {:?})",
            response.response.chars().count(),
            response.prompt_eval_count,
            response.eval_count
        );
        Ok(response.response)
    }

    fn engine_id(&self) -> String {
        format!("ollama:{}", self.model)
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let version = self.version().await?;
        debug!("Connected to Ollama {} at {}", version, self.base_url);
        Ok(())
    }
}

/// Decode a `/api/generate` body
///
/// A single JSON object is expected, but some servers stream JSONL even when
/// asked not to; the `response` pieces of every line are then concatenated.
pub fn parse_generation_body(body: &str) -> Result<GenerationResponse, ProviderError> {
    if let Ok(response) = serde_json::from_str::<GenerationResponse>(body) {
        return Ok(response);
    }

    let values: Vec<serde_json::Value> = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    if values.is_empty() {
        let preview: String = body.chars().take(500).collect();
        error!("Failed to parse Ollama API response. Raw response (first 500 chars): {}", preview);
        return Err(ProviderError::ParseError("Response contains invalid JSON".to_string()));
    }

    let text: String = values
        .iter()
        .filter_map(|v| v.get("response").and_then(|r| r.as_str()))
        .collect();
    let last = &values[values.len() - 1];

    Ok(GenerationResponse {
        model: last.get("model").and_then(|v| v.as_str()).unwrap_or("unknown").to_string(),
        response: text,
        done: last.get("done").and_then(|v| v.as_bool()).unwrap_or(true),
        prompt_eval_count: last.get("prompt_eval_count").and_then(|v| v.as_u64()),
        eval_count: last.get("eval_count").and_then(|v| v.as_u64()),
    })
}
