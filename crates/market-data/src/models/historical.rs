use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maximum number of daily bars kept per symbol.
pub const MAX_DAILY_BARS: usize = 100;

/// One daily OHLCV bar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

/// Daily price history for a symbol, newest bar first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalSeries {
    pub symbol: String,
    pub bars: Vec<DailyBar>,
    pub refreshed_at: DateTime<Utc>,
    #[serde(default)]
    pub synthetic: bool,
}

impl HistoricalSeries {
    /// Build a series from bars in any order.
    ///
    /// Bars are sorted newest first and truncated to [`MAX_DAILY_BARS`].
    pub fn from_bars(
        symbol: impl Into<String>,
        bars: Vec<DailyBar>,
        refreshed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            bars: normalize_bars(bars),
            refreshed_at,
            synthetic: false,
        }
    }

    pub fn latest(&self) -> Option<&DailyBar> {
        self.bars.first()
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.refreshed_at)
    }
}

/// Sort newest first, drop duplicate dates and keep the most recent bars.
pub fn normalize_bars(mut bars: Vec<DailyBar>) -> Vec<DailyBar> {
    bars.sort_by(|a, b| b.date.cmp(&a.date));
    bars.dedup_by(|a, b| a.date == b.date);
    bars.truncate(MAX_DAILY_BARS);
    bars
}
