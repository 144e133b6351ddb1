//! Tunables for the service and the scheduler.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::limiter::{DEFAULT_DAILY_CAP, DEFAULT_MIN_INTERVAL};
use crate::provider::alpha_vantage::DEFAULT_TIMEOUT;

/// US equity market timezone.
pub const MARKET_TIMEZONE: Tz = chrono_tz::America::New_York;

/// Settings for [`MarketDataService`](crate::service::MarketDataService).
#[derive(Clone, Debug)]
pub struct MarketDataConfig {
    /// Outbound requests allowed per calendar day.
    pub daily_cap: u32,
    /// Minimum spacing between two outbound requests.
    pub min_request_interval: Duration,
    /// Deadline for a single HTTP call.
    pub request_timeout: Duration,
    /// Cached quotes younger than this are served without fetching.
    pub quote_ttl: Duration,
    pub historical_ttl: Duration,
    pub company_ttl: Duration,
    /// Snapshot file; `None` keeps the cache in memory only.
    pub snapshot_path: Option<PathBuf>,
    /// Timezone whose calendar day resets the daily counter.
    pub timezone: Tz,
    /// Capacity of the change-event broadcast channel.
    pub event_capacity: usize,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            daily_cap: DEFAULT_DAILY_CAP,
            min_request_interval: DEFAULT_MIN_INTERVAL,
            request_timeout: DEFAULT_TIMEOUT,
            quote_ttl: Duration::from_secs(15 * 60),
            historical_ttl: Duration::from_secs(12 * 60 * 60),
            company_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            snapshot_path: None,
            timezone: MARKET_TIMEZONE,
            event_capacity: 256,
        }
    }
}

/// Settings for [`DataScheduler`](crate::scheduler::DataScheduler).
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// How often the scheduler wakes up to look for due jobs.
    pub tick_interval: Duration,
    /// Attempts before a failing job is marked failed.
    pub max_attempts: u32,
    /// Fixed delay before a failed attempt is retried.
    pub retry_delay: Duration,
    /// Delay applied to a whole batch the limiter refused.
    pub deferral_delay: Duration,
    /// Completed and failed jobs older than this are swept.
    pub job_retention: Duration,
    /// Market-local times at which watched symbols are refreshed.
    pub fetch_times: Vec<NaiveTime>,
    pub timezone: Tz,
    /// Skip Saturdays and Sundays when planning.
    pub trading_days_only: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            max_attempts: 3,
            retry_delay: Duration::from_secs(5 * 60),
            deferral_delay: Duration::from_secs(5 * 60),
            job_retention: Duration::from_secs(24 * 60 * 60),
            fetch_times: default_fetch_times(),
            timezone: MARKET_TIMEZONE,
            trading_days_only: true,
        }
    }
}

/// Shortly after the open, midday, and shortly after the close.
fn default_fetch_times() -> Vec<NaiveTime> {
    [(9, 35), (12, 30), (16, 5)]
        .into_iter()
        .filter_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0))
        .collect()
}
