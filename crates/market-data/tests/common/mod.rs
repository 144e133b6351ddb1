#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use options_tutor_market_data::{
    CompanyOverview, DailyBar, HistoricalSeries, MarketDataConfig, MarketDataError, Quote,
    QuoteProvider,
};
use rust_decimal_macros::dec;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Outcome {
    Ok,
    Network,
    Parse,
    Rejected,
}

/// In-memory provider that counts calls and fails on demand.
pub struct StubProvider {
    calls: AtomicUsize,
    outcome: Mutex<Outcome>,
    log: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl StubProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcome: Mutex::new(Outcome::Ok),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Symbol and wall-clock time of every call, in call order.
    pub fn call_log(&self) -> Vec<(String, DateTime<Utc>)> {
        self.log.lock().unwrap().clone()
    }

    fn answer(&self, symbol: &str) -> Result<(), MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push((symbol.to_string(), Utc::now()));
        match *self.outcome.lock().unwrap() {
            Outcome::Ok => Ok(()),
            Outcome::Network => Err(MarketDataError::Network("connection reset".into())),
            Outcome::Parse => Err(MarketDataError::Parse("missing 'Global Quote'".into())),
            Outcome::Rejected => Err(MarketDataError::Provider {
                provider: "STUB".into(),
                message: "Invalid API call".into(),
            }),
        }
    }
}

#[async_trait]
impl QuoteProvider for StubProvider {
    fn id(&self) -> &'static str {
        "STUB"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        self.answer(symbol)?;
        Ok(Quote::new(symbol, dec!(123.45), dec!(0.55), dec!(0.4475), 1_000, Utc::now()))
    }

    async fn fetch_company_overview(&self, symbol: &str) -> Result<CompanyOverview, MarketDataError> {
        self.answer(symbol)?;
        Ok(CompanyOverview {
            name: Some(format!("{} Inc", symbol)),
            ..CompanyOverview::empty(symbol, Utc::now())
        })
    }

    async fn fetch_daily_series(&self, symbol: &str) -> Result<HistoricalSeries, MarketDataError> {
        self.answer(symbol)?;
        let bar = DailyBar {
            date: Utc::now().date_naive(),
            open: dec!(120),
            high: dec!(125),
            low: dec!(119),
            close: dec!(123.45),
            volume: 1_000,
        };
        Ok(HistoricalSeries::from_bars(symbol, vec![bar], Utc::now()))
    }
}

/// Unpaced config in UTC so tests never sleep.
pub fn service_config(daily_cap: u32) -> MarketDataConfig {
    MarketDataConfig {
        daily_cap,
        min_request_interval: Duration::ZERO,
        timezone: chrono_tz::UTC,
        ..MarketDataConfig::default()
    }
}
