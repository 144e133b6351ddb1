//! Market data provider trait definitions.
//!
//! This module defines the core `QuoteProvider` trait that the service
//! drives for every outbound fetch.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{CompanyOverview, HistoricalSeries, Quote};

/// Trait for market data providers.
///
/// Implementations perform exactly one outbound call per method invocation
/// and return a fully parsed record, or an error. They never touch the
/// cache: the caller decides what to store.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use options_tutor_market_data::provider::QuoteProvider;
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl QuoteProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     // ... implement the fetch methods
/// }
/// ```
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier for this provider, e.g. "ALPHA_VANTAGE".
    fn id(&self) -> &'static str;

    /// Fetch the latest quote for a symbol.
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    /// Fetch company fundamentals for a symbol.
    async fn fetch_company_overview(&self, symbol: &str)
        -> Result<CompanyOverview, MarketDataError>;

    /// Fetch recent daily bars for a symbol, newest first.
    async fn fetch_daily_series(&self, symbol: &str) -> Result<HistoricalSeries, MarketDataError>;
}
