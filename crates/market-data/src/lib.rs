//! Options Tutor Market Data Crate
//!
//! Quota-aware market data for the Options Tutor application: quotes, daily
//! history and company overviews from Alpha Vantage, cached on disk and
//! refreshed on a schedule that stays inside the free-tier request budget.
//!
//! # Architecture
//!
//! ```text
//! +------------------+        +--------------------+
//! |  DataScheduler   | -----> |                    | ---> RateLimiter
//! +------------------+        |                    |
//!                             | MarketDataService  | ---> QuoteProvider (Alpha Vantage)
//! +------------------+        |                    |
//! |  read API / UI   | -----> |                    | ---> QuoteStore + SnapshotFile
//! +------------------+        +--------------------+
//!                                      |
//!                                      v
//!                             broadcast<MarketDataEvent>
//!
//! +------------------+        +--------------------+
//! |   PriceSource    | -----> |     PriceFeed      | ---> mpsc<Vec<PriceUpdate>>
//! +------------------+        +--------------------+
//! ```
//!
//! # Core Types
//!
//! - [`MarketDataService`] - cache-first reads, limiter-gated fetches, persistence
//! - [`RateLimiter`] - daily cap plus minimum spacing between requests
//! - [`DataScheduler`] - daily job planning, ticking, bounded retries
//! - [`PriceFeed`] - batched live prices with reconnect handling
//! - [`Quote`], [`HistoricalSeries`], [`CompanyOverview`] - the cached records

pub mod config;
pub mod errors;
pub mod limiter;
pub mod models;
pub mod provider;
pub mod realtime;
pub mod scheduler;
pub mod service;
pub mod store;

pub use config::{MarketDataConfig, SchedulerConfig, MARKET_TIMEZONE};

pub use errors::{MarketDataError, RetryClass};

pub use limiter::{FetchPermit, RateLimiter, RequestMeter};

pub use models::{
    normalize_symbol, CompanyOverview, DailyBar, DataKind, HistoricalSeries, Quote,
    MAX_DAILY_BARS,
};

pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::QuoteProvider;

pub use realtime::{
    ConnectionState, FeedConfig, PriceBatcher, PriceFeed, PriceFeedHandle, PriceSource,
    PriceUpdate, ReconnectPolicy, Reconnector, SimulatedPriceSource,
};

pub use scheduler::{
    parse_fetch_times, DataScheduler, FetchJob, JobQueue, JobStatus, SchedulePlan, TickReport,
};

pub use service::{FetchedRecord, MarketDataEvent, MarketDataService, RefreshFailure, RefreshReport};

pub use store::{QuoteStore, Snapshot, SnapshotFile};
