//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Record kinds and symbol normalization
//! - `quote` - Latest quote per symbol (Quote)
//! - `historical` - Daily bars (DailyBar, HistoricalSeries)
//! - `profile` - Company fundamentals (CompanyOverview)

mod historical;
mod profile;
mod quote;
mod types;

pub use historical::{normalize_bars, DailyBar, HistoricalSeries, MAX_DAILY_BARS};
pub use profile::CompanyOverview;
pub use quote::Quote;
pub use types::{normalize_symbol, DataKind};
