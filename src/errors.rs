/*!
 * Error types for the subtrans library.
 *
 * Backend transport failures, batch classification, configuration problems
 * and the application-level wrapper are all defined here with thiserror.
 * Line-level quality rejections live next to the validator in
 * `translation::quality`.
 */

use thiserror::Error;

/// Errors that can occur when talking to a translation backend
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete in time
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

impl ProviderError {
    /// Whether another attempt at the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 429,
            Self::ConnectionError(_) | Self::Timeout(_) | Self::RequestFailed(_) => true,
            Self::ParseError(_) => false,
        }
    }
}

/// Why a whole batch could not be used
#[derive(Error, Debug)]
pub enum BatchFailure {
    /// The backend call itself failed
    #[error("Backend call failed: {0}")]
    Transport(#[from] ProviderError),

    /// The backend answered but too few numbered lines could be recovered
    #[error("Parsed {found} of {expected} numbered lines ({found_ratio:.2})")]
    ParseIncomplete {
        /// Number of entries recovered
        found: usize,
        /// Number of entries the batch contained
        expected: usize,
        /// found / expected
        found_ratio: f64,
    },
}

/// Invalid settings detected when building a pipeline component
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A batch limit was zero
    #[error("Batch limit '{0}' must be greater than zero")]
    ZeroBatchLimit(&'static str),

    /// Breaker threshold was zero
    #[error("Circuit breaker failure threshold must be greater than zero")]
    ZeroBreakerThreshold,

    /// Requested concurrency outside the allowed range
    #[error("max_in_flight must be between 1 and {max}, got {value}")]
    InvalidConcurrency {
        /// Requested value
        value: usize,
        /// Hard ceiling
        max: usize,
    },

    /// A found-ratio threshold was outside (0, 1] or the pair was misordered
    #[error("Invalid parse thresholds: min_found_ratio={min}, usable_found_ratio={usable}")]
    InvalidThresholds {
        /// Lower cut point
        min: f64,
        /// Upper cut point
        usable: f64,
    },

    /// Length ratio bounds were not positive or misordered
    #[error("Invalid length ratio bounds: min={min}, max={max}")]
    InvalidLengthRatio {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },

    /// In-memory cache capacity was zero
    #[error("Cache memory capacity must be greater than zero")]
    ZeroCacheCapacity,

    /// An unknown language code was supplied
    #[error("Invalid language code: {0}")]
    InvalidLanguage(String),

    /// Backend settings could not be used
    #[error("Invalid backend configuration: {0}")]
    InvalidBackend(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from the persistent cache
    #[error("Cache error: {0}")]
    Cache(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
