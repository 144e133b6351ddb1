#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use options_tutor_market_data::{
    CompanyOverview, HistoricalSeries, MarketDataError, Quote, QuoteProvider,
};
use options_tutor_server::{api::app_router, build_state_with_provider, config::Config};
use rust_decimal_macros::dec;
use serde_json::Value;
use tower::ServiceExt;

pub struct StubProvider {
    pub calls: AtomicUsize,
}

impl StubProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for StubProvider {
    fn id(&self) -> &'static str {
        "STUB"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Quote::new(symbol, dec!(410.10), dec!(2.05), dec!(0.5024), 99, Utc::now()))
    }

    async fn fetch_company_overview(&self, symbol: &str) -> Result<CompanyOverview, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CompanyOverview::empty(symbol, Utc::now()))
    }

    async fn fetch_daily_series(&self, symbol: &str) -> Result<HistoricalSeries, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HistoricalSeries::from_bars(symbol, Vec::new(), Utc::now()))
    }
}

pub fn test_config(cache_dir: &Path, daily_request_cap: u32) -> Config {
    Config {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        cors_allow: vec!["*".to_string()],
        request_timeout: Duration::from_secs(10),
        alpha_vantage_api_key: "test".to_string(),
        alpha_vantage_base_url: "http://127.0.0.1:9/query".to_string(),
        cache_path: Some(cache_dir.join("market_cache.json")),
        watchlist: Vec::new(),
        daily_request_cap,
        min_request_interval: Duration::ZERO,
        fetch_times: Vec::new(),
        market_timezone: chrono_tz::UTC,
        scheduler_enabled: false,
        realtime_enabled: false,
    }
}

pub async fn build_router(config: &Config, provider: Arc<StubProvider>) -> Router {
    let state = build_state_with_provider(config, provider).await.unwrap();
    app_router(state, config)
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}
