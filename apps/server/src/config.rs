use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use chrono::NaiveTime;
use chrono_tz::Tz;
use options_tutor_market_data::{
    parse_fetch_times, provider::alpha_vantage, MarketDataConfig, SchedulerConfig,
    MARKET_TIMEZONE,
};

pub const DEFAULT_WATCHLIST: &str = "SPY,QQQ,AAPL,MSFT,TSLA";

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub alpha_vantage_api_key: String,
    pub alpha_vantage_base_url: String,
    /// `None` keeps the cache in memory only (`OT_CACHE_PATH=""`).
    pub cache_path: Option<PathBuf>,
    pub watchlist: Vec<String>,
    pub daily_request_cap: u32,
    pub min_request_interval: Duration,
    pub fetch_times: Vec<NaiveTime>,
    pub market_timezone: Tz,
    pub scheduler_enabled: bool,
    pub realtime_enabled: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = env_or("OT_LISTEN_ADDR", "0.0.0.0:8080")
            .parse()
            .context("Invalid OT_LISTEN_ADDR")?;
        let cors_allow = split_list(&env_or("OT_CORS_ALLOW_ORIGINS", "*"));
        let timeout_ms: u64 = parse_env("OT_REQUEST_TIMEOUT_MS", 60_000)?;

        let alpha_vantage_api_key = env_or("OT_ALPHA_VANTAGE_API_KEY", "demo");
        let alpha_vantage_base_url =
            env_or("OT_ALPHA_VANTAGE_BASE_URL", alpha_vantage::BASE_URL);

        let cache_path = Some(env_or("OT_CACHE_PATH", "./data/market_cache.json"))
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let watchlist = split_list(&env_or("OT_WATCHLIST", DEFAULT_WATCHLIST))
            .into_iter()
            .map(|s| s.to_ascii_uppercase())
            .collect();

        let daily_request_cap = parse_env("OT_DAILY_REQUEST_CAP", 25u32)?;
        let min_interval_secs = parse_env("OT_MIN_REQUEST_INTERVAL_SECS", 12u64)?;

        let fetch_times = match std::env::var("OT_FETCH_TIMES") {
            Ok(raw) => parse_fetch_times(&raw)
                .map_err(|e| anyhow!("Invalid OT_FETCH_TIMES '{}': {}", raw, e))?,
            Err(_) => SchedulerConfig::default().fetch_times,
        };
        let market_timezone = match std::env::var("OT_MARKET_TIMEZONE") {
            Ok(raw) => Tz::from_str(raw.trim())
                .map_err(|e| anyhow!("Invalid OT_MARKET_TIMEZONE '{}': {}", raw, e))?,
            Err(_) => MARKET_TIMEZONE,
        };

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            alpha_vantage_api_key,
            alpha_vantage_base_url,
            cache_path,
            watchlist,
            daily_request_cap,
            min_request_interval: Duration::from_secs(min_interval_secs),
            fetch_times,
            market_timezone,
            scheduler_enabled: parse_bool_env("OT_SCHEDULER_ENABLED", true)?,
            realtime_enabled: parse_bool_env("OT_REALTIME_ENABLED", true)?,
        })
    }

    pub fn market_data_config(&self) -> MarketDataConfig {
        MarketDataConfig {
            daily_cap: self.daily_request_cap,
            min_request_interval: self.min_request_interval,
            snapshot_path: self.cache_path.clone(),
            timezone: self.market_timezone,
            ..MarketDataConfig::default()
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            fetch_times: self.fetch_times.clone(),
            timezone: self.market_timezone,
            ..SchedulerConfig::default()
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {} '{}': {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

fn parse_bool_env(key: &str, default: bool) -> anyhow::Result<bool> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow!("Invalid {} '{}': expected true or false", key, raw)),
        },
        Err(_) => Ok(default),
    }
}
