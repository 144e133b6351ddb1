//! Placeholder records served when nothing is cached and no fetch is possible.
//!
//! Every record produced here carries `synthetic = true` so callers can tell
//! it apart from market data. Base prices are derived from the symbol so the
//! same ticker always lands in the same range.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::models::{normalize_symbol, DailyBar, HistoricalSeries, Quote, MAX_DAILY_BARS};

/// Stable pseudo price in [20, 520) for a symbol.
pub fn base_price(symbol: &str) -> f64 {
    let hash = normalize_symbol(symbol)
        .bytes()
        .fold(17u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
    20.0 + (hash % 50_000) as f64 / 100.0
}

pub(crate) fn to_price(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or(Decimal::ONE)
        .round_dp(2)
}

/// Placeholder quote for `symbol`.
pub fn placeholder_quote(symbol: &str, now: DateTime<Utc>) -> Quote {
    let base = base_price(symbol);
    let drift: f64 = rand::thread_rng().gen_range(-0.02..0.02);
    let price = to_price(base * (1.0 + drift));
    let previous_close = to_price(base);
    let change = price - previous_close;
    let change_percent = if previous_close.is_zero() {
        Decimal::ZERO
    } else {
        (change / previous_close * Decimal::ONE_HUNDRED).round_dp(4)
    };

    Quote {
        previous_close: Some(previous_close),
        synthetic: true,
        ..Quote::new(normalize_symbol(symbol), price, change, change_percent, 0, now)
    }
}

/// Placeholder daily series for `symbol`: a random walk over recent weekdays.
pub fn placeholder_series(symbol: &str, now: DateTime<Utc>) -> HistoricalSeries {
    let mut rng = rand::thread_rng();
    let mut close = base_price(symbol);
    let mut day = now.date_naive();
    let mut bars = Vec::with_capacity(MAX_DAILY_BARS);

    while bars.len() < MAX_DAILY_BARS {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            let open = close * (1.0 + rng.gen_range(-0.01..0.01));
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            bars.push(DailyBar {
                date: day,
                open: to_price(open),
                high: to_price(high),
                low: to_price(low),
                close: to_price(close),
                volume: rng.gen_range(100_000..5_000_000),
            });
            // walking backwards in time
            close = (open * (1.0 + rng.gen_range(-0.015..0.015))).max(1.0);
        }
        day -= Duration::days(1);
    }

    HistoricalSeries {
        synthetic: true,
        ..HistoricalSeries::from_bars(normalize_symbol(symbol), bars, now)
    }
}
