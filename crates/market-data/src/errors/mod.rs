//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the scheduler treats a failed job.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// Transport failure or a non-success HTTP status.
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded its deadline.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider signalled its own throttling (HTTP 429 or a "Note" payload).
    #[error("Rate limited by provider: {provider}")]
    ProviderRateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The provider answered with an explicit error ("Error Message" payload).
    #[error("Provider error: {provider} - {message}")]
    Provider {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The payload did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The local limiter refused the request: daily cap reached or spacing not elapsed.
    #[error("Local rate limit exceeded: {remaining_today} requests left today, next allowed at {next_allowed_at}")]
    LocalRateLimitExceeded {
        /// Earliest instant at which a request may be issued
        next_allowed_at: DateTime<Utc>,
        /// Requests still available for the current day
        remaining_today: u32,
    },

    /// Reading or writing the snapshot file failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use options_tutor_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::Parse("missing price".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Retry);
    ///
    /// let error = MarketDataError::Provider {
    ///     provider: "ALPHA_VANTAGE".to_string(),
    ///     message: "Invalid API call".to_string(),
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Network(_)
            | Self::Timeout { .. }
            | Self::ProviderRateLimited { .. }
            | Self::Parse(_)
            | Self::Persistence(_) => RetryClass::Retry,

            Self::LocalRateLimitExceeded { .. } => RetryClass::Defer,

            Self::Provider { .. } => RetryClass::Never,
        }
    }

    /// True when the error came from the local limiter rather than the provider.
    pub fn is_local_rate_limit(&self) -> bool {
        matches!(self, Self::LocalRateLimitExceeded { .. })
    }
}

impl From<serde_json::Error> for MarketDataError {
    fn from(err: serde_json::Error) -> Self {
        MarketDataError::Parse(err.to_string())
    }
}
