use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest quote for a symbol.
///
/// One record per symbol; every successful fetch replaces it wholesale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Ticker symbol (upper case)
    pub symbol: String,

    /// Last traded price
    pub price: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<Decimal>,

    /// Absolute change against the previous close
    pub change: Decimal,

    /// Change in percentage points (1.5 means +1.5%)
    pub change_percent: Decimal,

    pub volume: u64,

    /// Trading day the provider reported the quote for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_trading_day: Option<NaiveDate>,

    /// When the record was fetched
    pub refreshed_at: DateTime<Utc>,

    /// When the last outbound fetch for this record completed
    pub last_fetch_at: DateTime<Utc>,

    /// Generated placeholder, not market data
    #[serde(default)]
    pub synthetic: bool,
}

impl Quote {
    /// Create a quote with the minimal set of fields.
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        change: Decimal,
        change_percent: Decimal,
        volume: u64,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            open: None,
            high: None,
            low: None,
            previous_close: None,
            change,
            change_percent,
            volume,
            latest_trading_day: None,
            refreshed_at: fetched_at,
            last_fetch_at: fetched_at,
            synthetic: false,
        }
    }

    /// Age of the record at `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.refreshed_at)
    }
}
