//! Market data service: cache, limiter and provider behind one handle.
//!
//! # Architecture
//!
//! ```text
//! MarketDataService
//!       │
//!       ├─► RateLimiter   (daily cap + spacing, consulted before every call)
//!       ├─► QuoteProvider (one outbound call per fetch)
//!       ├─► QuoteStore    (write-through on success only)
//!       ├─► SnapshotFile  (flushed after every outbound call)
//!       └─► broadcast     (MarketDataEvent for listeners)
//! ```
//!
//! Outbound calls are serialized by an async fetch gate held from the limiter
//! check until the provider answers, so the spacing invariant holds even when
//! on-demand reads race with the scheduler.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::MarketDataConfig;
use crate::errors::MarketDataError;
use crate::limiter::{FetchPermit, RateLimiter, RequestMeter};
use crate::models::{normalize_symbol, CompanyOverview, DataKind, HistoricalSeries, Quote};
use crate::provider::{synthetic, QuoteProvider};
use crate::store::{QuoteStore, SnapshotFile};

/// Shortest sleep while waiting for the spacing window.
const MIN_PACING_SLEEP: Duration = Duration::from_millis(10);

/// Change notifications emitted after every successful write.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MarketDataEvent {
    #[serde(rename_all = "camelCase")]
    QuoteUpdated { quote: Quote },
    #[serde(rename_all = "camelCase")]
    HistoricalUpdated { symbol: String, bars: usize },
    #[serde(rename_all = "camelCase")]
    CompanyUpdated { symbol: String },
}

/// A record returned by a successful fetch.
#[derive(Clone, Debug)]
pub enum FetchedRecord {
    Quote(Quote),
    Historical(HistoricalSeries),
    Company(CompanyOverview),
}

impl FetchedRecord {
    pub fn kind(&self) -> DataKind {
        match self {
            Self::Quote(_) => DataKind::Quote,
            Self::Historical(_) => DataKind::Historical,
            Self::Company(_) => DataKind::Company,
        }
    }

    pub fn into_quote(self) -> Option<Quote> {
        match self {
            Self::Quote(q) => Some(q),
            _ => None,
        }
    }

    pub fn into_historical(self) -> Option<HistoricalSeries> {
        match self {
            Self::Historical(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_company(self) -> Option<CompanyOverview> {
        match self {
            Self::Company(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshFailure {
    pub kind: DataKind,
    pub error: String,
}

/// Outcome of [`MarketDataService::force_refresh`].
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub symbol: String,
    pub fetched: Vec<DataKind>,
    pub failed: Vec<RefreshFailure>,
    /// Kinds not attempted because the daily quota ran out.
    pub skipped: Vec<DataKind>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FetchMode {
    /// Wait for an in-flight call, then fail if the limiter refuses.
    Immediate,
    /// Give up at once if another call is in flight or the limiter refuses.
    NoWait,
    /// Wait for in-flight calls and for the spacing window; fail only on the daily cap.
    Paced,
}

pub struct MarketDataService {
    provider: Arc<dyn QuoteProvider>,
    config: MarketDataConfig,
    limiter: Mutex<RateLimiter>,
    store: RwLock<QuoteStore>,
    snapshot: Option<SnapshotFile>,
    fetch_gate: tokio::sync::Mutex<()>,
    events: broadcast::Sender<MarketDataEvent>,
}

impl MarketDataService {
    /// Build the service, restoring cached data and request accounting from
    /// the snapshot when one is configured.
    pub fn new(provider: Arc<dyn QuoteProvider>, config: MarketDataConfig) -> Self {
        let snapshot = config.snapshot_path.clone().map(SnapshotFile::new);
        let (store, meter) = match &snapshot {
            Some(file) => {
                let loaded = file.load();
                let meter = loaded.metadata.meter.clone();
                (QuoteStore::from_snapshot(loaded), meter)
            }
            None => (QuoteStore::new(), RequestMeter::default()),
        };

        let limiter = RateLimiter::with_meter(
            config.daily_cap,
            config.min_request_interval,
            config.timezone,
            meter,
        );
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        info!(
            "Market data service ready: provider {}, {} cached symbols, daily cap {}",
            provider.id(),
            store.symbols().len(),
            config.daily_cap
        );

        Self {
            provider,
            config,
            limiter: Mutex::new(limiter),
            store: RwLock::new(store),
            snapshot,
            fetch_gate: tokio::sync::Mutex::new(()),
            events,
        }
    }

    pub fn config(&self) -> &MarketDataConfig {
        &self.config
    }

    pub fn provider_id(&self) -> &'static str {
        self.provider.id()
    }

    // ------------------------------------------------------------------
    // Lock helpers. Poisoning only means a panic happened mid-update of
    // plain bookkeeping, so the data is still usable.
    // ------------------------------------------------------------------

    fn limiter(&self) -> MutexGuard<'_, RateLimiter> {
        self.limiter.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn store_read(&self) -> RwLockReadGuard<'_, QuoteStore> {
        self.store.read().unwrap_or_else(|poisoned| {
            warn!("Quote store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn store_write(&self) -> RwLockWriteGuard<'_, QuoteStore> {
        self.store.write().unwrap_or_else(|poisoned| {
            warn!("Quote store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    // ------------------------------------------------------------------
    // Cache reads
    // ------------------------------------------------------------------

    pub fn cached_quote(&self, symbol: &str) -> Option<Quote> {
        self.store_read().get_quote(symbol).cloned()
    }

    pub fn cached_historical(&self, symbol: &str) -> Option<HistoricalSeries> {
        self.store_read().get_historical(symbol).cloned()
    }

    pub fn cached_company(&self, symbol: &str) -> Option<CompanyOverview> {
        self.store_read().get_company(symbol).cloned()
    }

    pub fn cached_quotes(&self) -> Vec<Quote> {
        self.store_read().quotes()
    }

    /// Current limiter status. Does not consume quota.
    pub fn rate_status(&self) -> FetchPermit {
        self.limiter().check(Utc::now())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketDataEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Read-through accessors. These never fail.
    // ------------------------------------------------------------------

    /// Latest quote for `symbol`.
    ///
    /// Serves a fresh cached record, else tries an on-demand fetch, else the
    /// stale cached record, else a synthetic placeholder (never stored).
    pub async fn get_quote(&self, symbol: &str) -> Quote {
        let symbol = normalize_symbol(symbol);
        let now = Utc::now();
        let cached = self.cached_quote(&symbol);

        if let Some(quote) = &cached {
            if is_fresh(quote.refreshed_at, now, self.config.quote_ttl) {
                return quote.clone();
            }
        }

        match self.fetch_with(DataKind::Quote, &symbol, FetchMode::NoWait).await {
            Ok(record) => {
                if let Some(quote) = record.into_quote() {
                    return quote;
                }
            }
            Err(e) => debug!("On-demand quote fetch for {} not possible: {}", symbol, e),
        }

        cached.unwrap_or_else(|| {
            debug!("Serving placeholder quote for {}", symbol);
            synthetic::placeholder_quote(&symbol, now)
        })
    }

    /// Daily bars for `symbol`, same fallback chain as [`get_quote`](Self::get_quote).
    pub async fn get_historical(&self, symbol: &str) -> HistoricalSeries {
        let symbol = normalize_symbol(symbol);
        let now = Utc::now();
        let cached = self.cached_historical(&symbol);

        if let Some(series) = &cached {
            if is_fresh(series.refreshed_at, now, self.config.historical_ttl) {
                return series.clone();
            }
        }

        match self
            .fetch_with(DataKind::Historical, &symbol, FetchMode::NoWait)
            .await
        {
            Ok(record) => {
                if let Some(series) = record.into_historical() {
                    return series;
                }
            }
            Err(e) => debug!("On-demand history fetch for {} not possible: {}", symbol, e),
        }

        cached.unwrap_or_else(|| synthetic::placeholder_series(&symbol, now))
    }

    /// Company overview for `symbol`; `None` when nothing is cached or fetchable.
    pub async fn get_company(&self, symbol: &str) -> Option<CompanyOverview> {
        let symbol = normalize_symbol(symbol);
        let now = Utc::now();
        let cached = self.cached_company(&symbol);

        if let Some(overview) = &cached {
            if is_fresh(overview.refreshed_at, now, self.config.company_ttl) {
                return cached;
            }
        }

        match self
            .fetch_with(DataKind::Company, &symbol, FetchMode::NoWait)
            .await
        {
            Ok(record) => {
                if let Some(overview) = record.into_company() {
                    return Some(overview);
                }
            }
            Err(e) => debug!("On-demand overview fetch for {} not possible: {}", symbol, e),
        }

        cached
    }

    // ------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------

    /// Fetch one record now. Fails with `LocalRateLimitExceeded` when the
    /// limiter refuses instead of waiting.
    pub async fn fetch(
        &self,
        kind: DataKind,
        symbol: &str,
    ) -> Result<FetchedRecord, MarketDataError> {
        self.fetch_with(kind, &normalize_symbol(symbol), FetchMode::Immediate)
            .await
    }

    /// Fetch one record, waiting out the spacing window while daily quota remains.
    pub async fn fetch_paced(
        &self,
        kind: DataKind,
        symbol: &str,
    ) -> Result<FetchedRecord, MarketDataError> {
        self.fetch_with(kind, &normalize_symbol(symbol), FetchMode::Paced)
            .await
    }

    /// Refresh quote, history and overview for `symbol` outside the schedule.
    ///
    /// Fails outright when no quota remains for the day. Otherwise the three
    /// fetches run back to back with normal spacing; kinds that fail are
    /// reported, kinds left once the quota runs out are skipped.
    pub async fn force_refresh(&self, symbol: &str) -> Result<RefreshReport, MarketDataError> {
        let symbol = normalize_symbol(symbol);
        let permit = self.rate_status();
        if permit.remaining_today == 0 {
            return Err(MarketDataError::LocalRateLimitExceeded {
                next_allowed_at: permit.next_allowed_at,
                remaining_today: 0,
            });
        }

        info!("Forced refresh of {}", symbol);
        let mut report = RefreshReport {
            symbol: symbol.clone(),
            ..RefreshReport::default()
        };

        for kind in DataKind::ALL {
            if !report.skipped.is_empty() {
                report.skipped.push(kind);
                continue;
            }
            match self.fetch_with(kind, &symbol, FetchMode::Paced).await {
                Ok(_) => report.fetched.push(kind),
                Err(e) if e.is_local_rate_limit() => report.skipped.push(kind),
                Err(e) => report.failed.push(RefreshFailure {
                    kind,
                    error: e.to_string(),
                }),
            }
        }

        Ok(report)
    }

    async fn fetch_with(
        &self,
        kind: DataKind,
        symbol: &str,
        mode: FetchMode,
    ) -> Result<FetchedRecord, MarketDataError> {
        let _gate = match mode {
            FetchMode::NoWait => match self.fetch_gate.try_lock() {
                Ok(gate) => gate,
                Err(_) => {
                    let permit = self.rate_status();
                    return Err(MarketDataError::LocalRateLimitExceeded {
                        next_allowed_at: permit.next_allowed_at,
                        remaining_today: permit.remaining_today,
                    });
                }
            },
            FetchMode::Immediate | FetchMode::Paced => self.fetch_gate.lock().await,
        };

        loop {
            let now = Utc::now();
            let permit = self.limiter().check(now);
            if permit.allowed {
                self.limiter().record_request(now);
                break;
            }
            if mode != FetchMode::Paced || permit.remaining_today == 0 {
                return Err(MarketDataError::LocalRateLimitExceeded {
                    next_allowed_at: permit.next_allowed_at,
                    remaining_today: permit.remaining_today,
                });
            }
            let wait = (permit.next_allowed_at - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .max(MIN_PACING_SLEEP);
            debug!("Pacing {} fetch for {}: waiting {:?}", kind, symbol, wait);
            tokio::time::sleep(wait).await;
        }

        let result = self.execute(kind, symbol).await;
        // The request counter moved either way
        self.persist();
        result
    }

    async fn execute(
        &self,
        kind: DataKind,
        symbol: &str,
    ) -> Result<FetchedRecord, MarketDataError> {
        let result = match kind {
            DataKind::Quote => self
                .provider
                .fetch_quote(symbol)
                .await
                .map(FetchedRecord::Quote),
            DataKind::Historical => self
                .provider
                .fetch_daily_series(symbol)
                .await
                .map(FetchedRecord::Historical),
            DataKind::Company => self
                .provider
                .fetch_company_overview(symbol)
                .await
                .map(FetchedRecord::Company),
        };

        match result {
            Ok(record) => {
                self.write_through(&record);
                Ok(record)
            }
            Err(e) => {
                warn!("{} fetch for {} failed: {}", kind, symbol, e);
                Err(e)
            }
        }
    }

    fn write_through(&self, record: &FetchedRecord) {
        let event = {
            let mut store = self.store_write();
            match record {
                FetchedRecord::Quote(quote) => {
                    store.put_quote(quote.clone());
                    MarketDataEvent::QuoteUpdated {
                        quote: quote.clone(),
                    }
                }
                FetchedRecord::Historical(series) => {
                    store.put_historical(series.clone());
                    MarketDataEvent::HistoricalUpdated {
                        symbol: series.symbol.clone(),
                        bars: series.bars.len(),
                    }
                }
                FetchedRecord::Company(overview) => {
                    store.put_company(overview.clone());
                    MarketDataEvent::CompanyUpdated {
                        symbol: overview.symbol.clone(),
                    }
                }
            }
        };
        // No receivers is fine
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Write the snapshot now.
    pub fn flush(&self) -> Result<(), MarketDataError> {
        let Some(file) = &self.snapshot else {
            return Ok(());
        };
        let meter = self.limiter().meter().clone();
        let snapshot = self.store_read().to_snapshot(&meter);
        file.flush(&snapshot)?;
        self.store_write().mark_clean();
        Ok(())
    }

    /// Flush, logging and swallowing failures. Memory stays authoritative.
    fn persist(&self) {
        if let Err(e) = self.flush() {
            warn!("Failed to persist market data snapshot: {}", e);
        }
    }
}

fn is_fresh(refreshed_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match (now - refreshed_at).to_std() {
        Ok(age) => age < ttl,
        // refreshed in the future: clock skew, treat as fresh
        Err(_) => true,
    }
}
