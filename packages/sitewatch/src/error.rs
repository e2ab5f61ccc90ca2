//! Typed errors for the sitewatch pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Only the runner binary
//! reaches for `anyhow`.

use thiserror::Error;

/// Errors that escape the pipeline.
///
/// Fetch failures and data-quality problems never show up here: they are
/// absorbed into snapshots, signals, or per-target dispositions. What is
/// left is storage trouble and programming errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Storage operation failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// An internal invariant was broken (malformed signal list, bad confidence, ...)
    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },
}

/// Errors from a single scrape backend call.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// URL rejected by the guard
    #[error("guard error: {0}")]
    Guard(#[from] GuardError),

    /// Transport-level failure (DNS, connection refused, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request timed out
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// The backend service itself refused or failed (bad API key, quota, outage)
    #[error("{backend} backend unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },
}

impl ScrapeError {
    /// Build an `Http` error from a plain message.
    pub fn http(message: impl Into<String>) -> Self {
        ScrapeError::Http(message.into().into())
    }

    /// Map a reqwest error, keeping timeouts distinct.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScrapeError::Timeout {
                url: url.to_string(),
            }
        } else {
            ScrapeError::Http(Box::new(err))
        }
    }
}

/// URL validation errors, primarily for SSRF protection.
#[derive(Debug, Error)]
pub enum GuardError {
    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Host is blocked (e.g., localhost, metadata services)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP in blocked CIDR range (e.g., 10.0.0.0/8)
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database driver error
    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON (de)serialization of a stored column failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded
    #[error("corrupt {what}: {reason}")]
    Corrupt { what: &'static str, reason: String },

    /// Target does not exist in the registry
    #[error("target not found: {id}")]
    TargetNotFound { id: String },

    /// The store is locked by another writer
    #[error("store locked: {0}")]
    Locked(String),

    /// Retries were exhausted on a transient error
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<StoreError>,
    },
}

impl StoreError {
    /// Build a `Corrupt` error for a column that failed to decode.
    pub fn corrupt(what: &'static str, reason: impl ToString) -> Self {
        StoreError::Corrupt {
            what,
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the same operation might succeed.
    ///
    /// SQLite reports write contention as `SQLITE_BUSY` (5) or
    /// `SQLITE_LOCKED` (6), possibly as extended codes.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Locked(_) => true,
            #[cfg(feature = "sqlite")]
            StoreError::Database(err) => match err {
                sqlx::Error::PoolTimedOut => true,
                sqlx::Error::Database(db) => {
                    let code_busy = db
                        .code()
                        .and_then(|c| c.parse::<i32>().ok())
                        .map(|c| matches!(c & 0xff, 5 | 6))
                        .unwrap_or(false);
                    let message = db.message().to_lowercase();
                    code_busy || message.contains("database is locked") || message.contains("busy")
                }
                _ => false,
            },
            _ => false,
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for scrape backend operations.
pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for URL guard operations.
pub type GuardResult<T> = std::result::Result<T, GuardError>;
