//! Alpha Vantage market data provider implementation.
//!
//! This module provides market data from the Alpha Vantage API:
//! - Latest quotes via the GLOBAL_QUOTE endpoint
//! - Company fundamentals via the OVERVIEW endpoint
//! - Daily bars via the TIME_SERIES_DAILY endpoint
//!
//! Note: the Alpha Vantage free tier is limited to 25 calls per day and
//! 5 calls per minute. The limits are enforced by the caller, not here.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{normalize_symbol, CompanyOverview, DailyBar, HistoricalSeries, Quote};
use crate::provider::QuoteProvider;

pub const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";

/// Per-request deadline when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Alpha Vantage market data provider.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// Sentinel fields Alpha Vantage returns instead of data.
#[derive(Debug, Default, Deserialize)]
struct ApiNotice {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(flatten)]
    notice: ApiNotice,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "02. open")]
    open: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

/// TIME_SERIES_DAILY response
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyRecord>>,
    #[serde(flatten)]
    notice: ApiNotice,
}

#[derive(Debug, Deserialize)]
struct DailyRecord {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

/// OVERVIEW response for company fundamentals.
/// Only includes fields that map to CompanyOverview; the API returns many more.
#[derive(Debug, Deserialize)]
struct OverviewResponse {
    #[serde(rename = "Symbol")]
    symbol: Option<String>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Description")]
    description: Option<String>,
    #[serde(rename = "Exchange")]
    exchange: Option<String>,
    #[serde(rename = "Currency")]
    currency: Option<String>,
    #[serde(rename = "Country")]
    country: Option<String>,
    #[serde(rename = "Sector")]
    sector: Option<String>,
    #[serde(rename = "Industry")]
    industry: Option<String>,
    #[serde(rename = "MarketCapitalization")]
    market_capitalization: Option<String>,
    #[serde(rename = "PERatio")]
    pe_ratio: Option<String>,
    #[serde(rename = "PEGRatio")]
    peg_ratio: Option<String>,
    #[serde(rename = "BookValue")]
    book_value: Option<String>,
    #[serde(rename = "DividendYield")]
    dividend_yield: Option<String>,
    #[serde(rename = "EPS")]
    eps: Option<String>,
    #[serde(rename = "Beta")]
    beta: Option<String>,
    #[serde(rename = "52WeekHigh")]
    week_52_high: Option<String>,
    #[serde(rename = "52WeekLow")]
    week_52_low: Option<String>,
    #[serde(rename = "50DayMovingAverage")]
    moving_average_50_day: Option<String>,
    #[serde(rename = "200DayMovingAverage")]
    moving_average_200_day: Option<String>,
    #[serde(rename = "SharesOutstanding")]
    shares_outstanding: Option<String>,
    #[serde(flatten)]
    notice: ApiNotice,
}

impl OverviewResponse {
    /// Parse a string field as f64, handling "None" and "-" values
    fn parse_f64(s: &Option<String>) -> Option<f64> {
        s.as_ref()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && *v != "None" && *v != "-")
            .and_then(|v| v.parse::<f64>().ok())
    }

    /// Drop "None" placeholders from text fields
    fn text(s: &Option<String>) -> Option<String> {
        s.as_ref()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && *v != "None" && *v != "-")
            .map(str::to_string)
    }

    fn into_overview(self, symbol: String, fetched_at: DateTime<Utc>) -> CompanyOverview {
        CompanyOverview {
            symbol,
            name: Self::text(&self.name),
            description: Self::text(&self.description),
            exchange: Self::text(&self.exchange),
            currency: Self::text(&self.currency),
            country: Self::text(&self.country),
            sector: Self::text(&self.sector),
            industry: Self::text(&self.industry),
            market_cap: Self::parse_f64(&self.market_capitalization),
            pe_ratio: Self::parse_f64(&self.pe_ratio),
            peg_ratio: Self::parse_f64(&self.peg_ratio),
            book_value: Self::parse_f64(&self.book_value),
            dividend_yield: Self::parse_f64(&self.dividend_yield),
            eps: Self::parse_f64(&self.eps),
            beta: Self::parse_f64(&self.beta),
            week_52_high: Self::parse_f64(&self.week_52_high),
            week_52_low: Self::parse_f64(&self.week_52_low),
            moving_average_50_day: Self::parse_f64(&self.moving_average_50_day),
            moving_average_200_day: Self::parse_f64(&self.moving_average_200_day),
            shares_outstanding: Self::parse_f64(&self.shares_outstanding),
            refreshed_at: fetched_at,
        }
    }
}

// ============================================================================
// Response parsing
// ============================================================================

/// Check for API-level errors in the response.
fn check_api_error(notice: &ApiNotice) -> Result<(), MarketDataError> {
    if let Some(ref msg) = notice.error_message {
        return Err(MarketDataError::Provider {
            provider: PROVIDER_ID.to_string(),
            message: msg.clone(),
        });
    }

    // "Note" is how Alpha Vantage reports its own throttling
    if let Some(ref msg) = notice.note {
        debug!("Alpha Vantage note: {}", msg);
        return Err(MarketDataError::ProviderRateLimited {
            provider: PROVIDER_ID.to_string(),
        });
    }

    // "Information" is used both for throttling and for premium/demo notices
    if let Some(ref msg) = notice.information {
        let lower = msg.to_ascii_lowercase();
        if lower.contains("call frequency")
            || lower.contains("rate limit")
            || lower.contains("requests per day")
        {
            return Err(MarketDataError::ProviderRateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        warn!("Alpha Vantage info: {}", msg);
    }

    Ok(())
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s.trim()).ok()
}

fn parse_volume(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, MarketDataError> {
    field
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| MarketDataError::Parse(format!("missing field '{}'", name)))
}

fn required_decimal(field: &Option<String>, name: &str) -> Result<Decimal, MarketDataError> {
    let raw = required(field, name)?;
    parse_decimal(raw)
        .ok_or_else(|| MarketDataError::Parse(format!("malformed '{}': {}", name, raw)))
}

/// Parse a GLOBAL_QUOTE body.
///
/// The whole record is built before anything is returned, so a malformed
/// payload never yields a partial quote.
pub fn parse_global_quote(
    body: &str,
    symbol: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Quote, MarketDataError> {
    let response: GlobalQuoteResponse = serde_json::from_str(body)?;
    check_api_error(&response.notice)?;

    let raw = response
        .global_quote
        .ok_or_else(|| MarketDataError::Parse("missing 'Global Quote'".to_string()))?;

    let price = required_decimal(&raw.price, "05. price")?;
    let change = required_decimal(&raw.change, "09. change")?;
    let change_percent = {
        let value = required(&raw.change_percent, "10. change percent")?;
        parse_decimal(value.trim().trim_end_matches('%')).ok_or_else(|| {
            MarketDataError::Parse(format!("malformed '10. change percent': {}", value))
        })?
    };
    let volume = {
        let value = required(&raw.volume, "06. volume")?;
        parse_volume(value)
            .ok_or_else(|| MarketDataError::Parse(format!("malformed '06. volume': {}", value)))?
    };

    let symbol = raw
        .symbol
        .as_deref()
        .map(normalize_symbol)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| normalize_symbol(symbol));

    Ok(Quote {
        symbol,
        price,
        open: raw.open.as_deref().and_then(parse_decimal),
        high: raw.high.as_deref().and_then(parse_decimal),
        low: raw.low.as_deref().and_then(parse_decimal),
        previous_close: raw.previous_close.as_deref().and_then(parse_decimal),
        change,
        change_percent,
        volume,
        latest_trading_day: raw.latest_trading_day.as_deref().and_then(parse_date),
        refreshed_at: fetched_at,
        last_fetch_at: fetched_at,
        synthetic: false,
    })
}

/// Parse an OVERVIEW body. An empty object (unknown symbol) is a parse error.
pub fn parse_company_overview(
    body: &str,
    symbol: &str,
    fetched_at: DateTime<Utc>,
) -> Result<CompanyOverview, MarketDataError> {
    let response: OverviewResponse = serde_json::from_str(body)?;
    check_api_error(&response.notice)?;

    let reported = required(&response.symbol, "Symbol")?;
    let reported = normalize_symbol(reported);
    if reported != normalize_symbol(symbol) {
        debug!(
            "Alpha Vantage: overview for {} reported symbol {}",
            symbol, reported
        );
    }

    Ok(response.into_overview(reported, fetched_at))
}

/// Parse a TIME_SERIES_DAILY body into a normalized series.
///
/// Individually malformed bars are skipped; a series with no valid bar is a
/// parse error.
pub fn parse_daily_series(
    body: &str,
    symbol: &str,
    fetched_at: DateTime<Utc>,
) -> Result<HistoricalSeries, MarketDataError> {
    let response: TimeSeriesResponse = serde_json::from_str(body)?;
    check_api_error(&response.notice)?;

    let time_series = response
        .time_series
        .ok_or_else(|| MarketDataError::Parse("missing 'Time Series (Daily)'".to_string()))?;

    let total = time_series.len();
    let bars: Vec<DailyBar> = time_series
        .into_iter()
        .filter_map(|(date_str, daily)| {
            Some(DailyBar {
                date: parse_date(&date_str)?,
                open: parse_decimal(&daily.open)?,
                high: parse_decimal(&daily.high)?,
                low: parse_decimal(&daily.low)?,
                close: parse_decimal(&daily.close)?,
                volume: parse_volume(&daily.volume)?,
            })
        })
        .collect();

    if bars.len() < total {
        warn!(
            "Alpha Vantage: skipped {} malformed daily bars for {}",
            total - bars.len(),
            symbol
        );
    }
    if bars.is_empty() {
        return Err(MarketDataError::Parse(format!(
            "no valid daily bars for {}",
            symbol
        )));
    }

    Ok(HistoricalSeries::from_bars(
        normalize_symbol(symbol),
        bars,
        fetched_at,
    ))
}

// ============================================================================
// AlphaVantageProvider implementation
// ============================================================================

impl AlphaVantageProvider {
    /// Create a provider against the public endpoint.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, MarketDataError> {
        Self::with_base_url(api_key, BASE_URL.to_string(), timeout)
    }

    /// Create a provider against a custom endpoint (proxies, tests).
    ///
    /// Fails on an unparsable URL or when the client cannot be built with
    /// `timeout` as its per-call deadline.
    pub fn with_base_url(
        api_key: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, MarketDataError> {
        reqwest::Url::parse(&base_url).map_err(|e| {
            MarketDataError::Network(format!("Invalid Alpha Vantage URL '{}': {}", base_url, e))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketDataError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    fn redact(&self, url: &str) -> String {
        if self.api_key.is_empty() {
            url.to_string()
        } else {
            url.replace(&self.api_key, "***")
        }
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", &self.api_key));

        let url = reqwest::Url::parse_with_params(&self.base_url, &all_params)
            .map_err(|e| MarketDataError::Network(format!("Failed to build URL: {}", e)))?;

        debug!("Alpha Vantage request: {}", self.redact(url.as_str()));

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::Network(self.redact(&e.to_string()))
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::ProviderRateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if !status.is_success() {
            return Err(MarketDataError::Network(format!("HTTP {}", status)));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                MarketDataError::Network(self.redact(&e.to_string()))
            }
        })
    }
}

// ============================================================================
// QuoteProvider trait implementation
// ============================================================================

#[async_trait]
impl QuoteProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let text = self
            .fetch(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        let quote = parse_global_quote(&text, symbol, Utc::now())?;
        debug!("Alpha Vantage: fetched quote for {} at {}", symbol, quote.price);
        Ok(quote)
    }

    async fn fetch_company_overview(
        &self,
        symbol: &str,
    ) -> Result<CompanyOverview, MarketDataError> {
        let text = self
            .fetch(&[("function", "OVERVIEW"), ("symbol", symbol)])
            .await?;
        let overview = parse_company_overview(&text, symbol, Utc::now())?;
        debug!("Alpha Vantage: fetched company overview for {}", symbol);
        Ok(overview)
    }

    async fn fetch_daily_series(&self, symbol: &str) -> Result<HistoricalSeries, MarketDataError> {
        let params = [
            ("function", "TIME_SERIES_DAILY"),
            ("symbol", symbol),
            ("outputsize", "compact"), // 'full' is premium-only
        ];
        let text = self.fetch(&params).await?;
        let series = parse_daily_series(&text, symbol, Utc::now())?;
        debug!(
            "Alpha Vantage: fetched {} daily bars for {}",
            series.bars.len(),
            symbol
        );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;

    const GLOBAL_QUOTE: &str = r#"{
        "Global Quote": {
            "01. symbol": "IBM",
            "02. open": "187.5000",
            "03. high": "189.2000",
            "04. low": "186.9100",
            "05. price": "188.6300",
            "06. volume": "3284523",
            "07. latest trading day": "2024-05-31",
            "08. previous close": "187.4500",
            "09. change": "1.1800",
            "10. change percent": "0.6295%"
        }
    }"#;

    #[test]
    fn test_parse_global_quote() {
        let now = Utc::now();
        let quote = parse_global_quote(GLOBAL_QUOTE, "ibm", now).unwrap();

        assert_eq!(quote.symbol, "IBM");
        assert_eq!(quote.price, dec!(188.6300));
        assert_eq!(quote.change, dec!(1.1800));
        assert_eq!(quote.change_percent, dec!(0.6295));
        assert_eq!(quote.volume, 3_284_523);
        assert_eq!(quote.previous_close, Some(dec!(187.4500)));
        assert_eq!(
            quote.latest_trading_day,
            NaiveDate::from_ymd_opt(2024, 5, 31)
        );
        assert_eq!(quote.refreshed_at, now);
        assert!(!quote.synthetic);
    }

    #[test]
    fn test_parse_global_quote_empty_body_is_parse_error() {
        let err = parse_global_quote(r#"{"Global Quote": {}}"#, "NOPE", Utc::now()).unwrap_err();
        assert!(matches!(err, MarketDataError::Parse(_)));
    }

    #[test]
    fn test_parse_global_quote_malformed_price() {
        let body = GLOBAL_QUOTE.replace("188.6300", "n/a");
        let err = parse_global_quote(&body, "IBM", Utc::now()).unwrap_err();
        assert!(matches!(err, MarketDataError::Parse(_)));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = parse_global_quote("<html>oops</html>", "IBM", Utc::now()).unwrap_err();
        assert!(matches!(err, MarketDataError::Parse(_)));
    }

    #[test]
    fn test_note_is_provider_rate_limit() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        let err = parse_global_quote(body, "IBM", Utc::now()).unwrap_err();
        assert!(matches!(err, MarketDataError::ProviderRateLimited { .. }));
    }

    #[test]
    fn test_information_rate_limit_is_provider_rate_limit() {
        let body = r#"{"Information": "We have detected your API key and our standard API rate limit is 25 requests per day."}"#;
        let err = parse_daily_series(body, "IBM", Utc::now()).unwrap_err();
        assert!(matches!(err, MarketDataError::ProviderRateLimited { .. }));
    }

    #[test]
    fn test_error_message_is_provider_error() {
        let body = r#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#;
        let err = parse_company_overview(body, "XXXX", Utc::now()).unwrap_err();
        match err {
            MarketDataError::Provider { provider, message } => {
                assert_eq!(provider, "ALPHA_VANTAGE");
                assert!(message.starts_with("Invalid API call"));
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_company_overview() {
        let json = r#"{
            "Symbol": "IBM",
            "AssetType": "Common Stock",
            "Name": "International Business Machines",
            "Description": "IBM provides integrated solutions.",
            "Exchange": "NYSE",
            "Currency": "USD",
            "Country": "USA",
            "Sector": "TECHNOLOGY",
            "Industry": "COMPUTER & OFFICE EQUIPMENT",
            "MarketCapitalization": "191234567890",
            "PERatio": "22.5",
            "PEGRatio": "None",
            "DividendYield": "0.0455",
            "Beta": "0.71",
            "52WeekHigh": "199.18",
            "52WeekLow": "128.06",
            "50DayMovingAverage": "175.2",
            "SharesOutstanding": "918741000"
        }"#;

        let overview = parse_company_overview(json, "IBM", Utc::now()).unwrap();

        assert_eq!(overview.symbol, "IBM");
        assert_eq!(
            overview.name.as_deref(),
            Some("International Business Machines")
        );
        assert_eq!(overview.exchange.as_deref(), Some("NYSE"));
        assert_eq!(overview.sector.as_deref(), Some("TECHNOLOGY"));
        assert_eq!(overview.market_cap, Some(191234567890.0));
        assert_eq!(overview.pe_ratio, Some(22.5));
        assert_eq!(overview.peg_ratio, None);
        assert_eq!(overview.dividend_yield, Some(0.0455));
        assert_eq!(overview.week_52_low, Some(128.06));
        assert_eq!(overview.moving_average_200_day, None);
    }

    #[test]
    fn test_parse_company_overview_empty_object() {
        let err = parse_company_overview("{}", "NOPE", Utc::now()).unwrap_err();
        assert!(matches!(err, MarketDataError::Parse(_)));
    }

    #[test]
    fn test_overview_parse_f64() {
        assert_eq!(
            OverviewResponse::parse_f64(&Some("123.45".to_string())),
            Some(123.45)
        );
        assert_eq!(OverviewResponse::parse_f64(&Some("None".to_string())), None);
        assert_eq!(OverviewResponse::parse_f64(&Some("-".to_string())), None);
        assert_eq!(OverviewResponse::parse_f64(&Some("0".to_string())), Some(0.0));
        assert_eq!(OverviewResponse::parse_f64(&None), None);
    }

    fn daily_series_body(days: i64) -> String {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let entries: Vec<String> = (0..days)
            .map(|i| {
                let date = start + ChronoDuration::days(i);
                format!(
                    r#""{}": {{"1. open": "{i}.0", "2. high": "{i}.5", "3. low": "{i}.0", "4. close": "{i}.25", "5. volume": "{}"}}"#,
                    date,
                    1000 + i,
                )
            })
            .collect();
        format!(
            r#"{{"Meta Data": {{"2. Symbol": "SPY"}}, "Time Series (Daily)": {{{}}}}}"#,
            entries.join(",")
        )
    }

    #[test]
    fn test_parse_daily_series_keeps_100_newest_first() {
        let body = daily_series_body(150);
        let series = parse_daily_series(&body, "spy", Utc::now()).unwrap();

        assert_eq!(series.symbol, "SPY");
        assert_eq!(series.bars.len(), 100);
        let newest = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + ChronoDuration::days(149);
        assert_eq!(series.bars[0].date, newest);
        assert_eq!(series.bars[0].close, dec!(149.25));
        assert_eq!(series.bars[99].date, newest - ChronoDuration::days(99));
        assert!(series.bars.windows(2).all(|w| w[0].date > w[1].date));
    }

    #[test]
    fn test_parse_daily_series_skips_malformed_bars() {
        let body = r#"{"Time Series (Daily)": {
            "2024-01-02": {"1. open": "1", "2. high": "2", "3. low": "0.5", "4. close": "1.5", "5. volume": "10"},
            "2024-01-03": {"1. open": "x", "2. high": "2", "3. low": "0.5", "4. close": "1.5", "5. volume": "10"}
        }}"#;
        let series = parse_daily_series(body, "SPY", Utc::now()).unwrap();
        assert_eq!(series.bars.len(), 1);
        assert_eq!(series.bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_parse_daily_series_without_valid_bars() {
        let body = r#"{"Time Series (Daily)": {}}"#;
        let err = parse_daily_series(body, "SPY", Utc::now()).unwrap_err();
        assert!(matches!(err, MarketDataError::Parse(_)));
    }

    #[test]
    fn test_redact_hides_api_key() {
        let provider = AlphaVantageProvider::new("secret123".to_string(), DEFAULT_TIMEOUT).unwrap();
        let redacted = provider.redact("https://x/query?function=OVERVIEW&apikey=secret123");
        assert!(!redacted.contains("secret123"));
        assert!(redacted.ends_with("apikey=***"));
    }

    #[test]
    fn test_provider_id() {
        let provider = AlphaVantageProvider::new("test_key".to_string(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(provider.id(), "ALPHA_VANTAGE");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let provider = AlphaVantageProvider::with_base_url(
            "test_key".to_string(),
            "http://127.0.0.1:9/query".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = provider.fetch_quote("IBM").await.unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::Network(_) | MarketDataError::Timeout { .. }
        ));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = AlphaVantageProvider::with_base_url(
            "test_key".to_string(),
            "not a url".to_string(),
            DEFAULT_TIMEOUT,
        );
        assert!(matches!(result, Err(MarketDataError::Network(_))));
    }
}
