//! Crate-wide error hierarchy for git-archive-fetch.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type FetchResult<T> = Result<T, FetchError>;

/// Root error type for the git-archive-fetch crate.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Provider (GitLab/GitHub) related failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Local I/O failure while writing the downloaded archive.
    #[error("archive io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration problems (bad base URL, unreadable CA bundle, etc.).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Input validation errors (empty owner/repo/ref).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Provider-specific error used inside the provider layer.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403).
    #[error("forbidden")]
    Forbidden,

    /// Repository or ref not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Rate limited (HTTP 429).
    #[error("rate limited")]
    RateLimited {
        /// Optional `Retry-After` hint in seconds when available.
        retry_after_secs: Option<u64>,
    },

    /// Gateway / server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status (non-2xx) not covered by specific variants.
    #[error("http status error: status {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without HTTP status (DNS/connect/reset/TLS).
    #[error("network error: {0}")]
    Network(String),
}

/// Configuration and setup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Base URL could not be parsed.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),

    /// Extra CA bundle could not be read or parsed.
    #[error("invalid ca bundle: {0}")]
    InvalidCaBundle(String),

    /// HTTP client could not be constructed.
    #[error("http client setup failed: {0}")]
    Client(String),
}

impl ProviderError {
    /// Maps a non-success HTTP status into a provider error.
    pub fn from_status(code: u16, retry_after_secs: Option<u64>) -> Self {
        match code {
            401 => ProviderError::Unauthorized,
            403 => ProviderError::Forbidden,
            404 => ProviderError::NotFound,
            429 => ProviderError::RateLimited { retry_after_secs },
            500..=599 => ProviderError::Server(code),
            _ => ProviderError::HttpStatus(code),
        }
    }
}

// ===== Conversions for `?` ergonomics at the crate root =====

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Provider(ProviderError::from(e))
    }
}

// ===== Mapping from reqwest::Error into ProviderError =====

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ProviderError::Timeout;
        }

        if let Some(status) = e.status() {
            return ProviderError::from_status(status.as_u16(), None);
        }

        ProviderError::Network(e.to_string())
    }
}
