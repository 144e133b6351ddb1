//! Daily-cap rate limiter for outbound provider calls.
//!
//! Two rules gate every request:
//! - at most `daily_cap` requests per calendar day (in the limiter timezone)
//! - at least `min_interval` between two consecutive requests
//!
//! Day rollover is detected lazily: every status check compares the stored
//! calendar day to today's, so a process that sleeps across midnight still
//! resets correctly on its next check.

mod meter;

pub use meter::RequestMeter;

use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, warn};
use serde::Serialize;

use crate::errors::MarketDataError;

/// Alpha Vantage free tier: 25 requests per day.
pub const DEFAULT_DAILY_CAP: u32 = 25;

/// Alpha Vantage free tier: 5 requests per minute.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(12);

/// Outcome of a limiter check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchPermit {
    pub allowed: bool,
    pub next_allowed_at: DateTime<Utc>,
    pub remaining_today: u32,
}

/// Rate limiter backed by a [`RequestMeter`].
///
/// Not synchronized: the owner wraps it in a mutex.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    daily_cap: u32,
    min_interval: chrono::Duration,
    timezone: Tz,
    meter: RequestMeter,
}

impl RateLimiter {
    pub fn new(daily_cap: u32, min_interval: Duration, timezone: Tz) -> Self {
        Self::with_meter(daily_cap, min_interval, timezone, RequestMeter::default())
    }

    /// Restore a limiter from persisted accounting.
    pub fn with_meter(
        daily_cap: u32,
        min_interval: Duration,
        timezone: Tz,
        mut meter: RequestMeter,
    ) -> Self {
        if meter.requests_today > daily_cap {
            warn!(
                "Restored request meter reports {} requests, above the cap of {}; clamping",
                meter.requests_today, daily_cap
            );
            meter.requests_today = daily_cap;
        }
        // Out-of-range intervals are treated as "one request per week"
        let min_interval =
            chrono::Duration::from_std(min_interval).unwrap_or_else(|_| chrono::Duration::weeks(1));
        Self {
            daily_cap,
            min_interval,
            timezone,
            meter,
        }
    }

    pub fn daily_cap(&self) -> u32 {
        self.daily_cap
    }

    pub fn meter(&self) -> &RequestMeter {
        &self.meter
    }

    /// Check whether a request may be issued at `now`. Does not consume quota.
    pub fn check(&mut self, now: DateTime<Utc>) -> FetchPermit {
        self.roll_over(now);

        let remaining_today = self.daily_cap.saturating_sub(self.meter.requests_today);
        let spacing_ready_at = self
            .meter
            .last_request_at
            .map(|last| last + self.min_interval)
            .unwrap_or(now);

        let allowed = remaining_today > 0 && spacing_ready_at <= now;
        let next_allowed_at = if remaining_today == 0 {
            spacing_ready_at.max(self.start_of_next_day(now))
        } else {
            spacing_ready_at.max(now)
        };

        FetchPermit {
            allowed,
            next_allowed_at,
            remaining_today,
        }
    }

    /// Account for one outbound request issued at `now`.
    ///
    /// Must be called exactly once per real provider call, never on cache hits.
    /// The counter never goes past the daily cap.
    pub fn record_request(&mut self, now: DateTime<Utc>) {
        self.roll_over(now);

        if self.meter.requests_today >= self.daily_cap {
            warn!(
                "Request recorded with the daily cap of {} already reached",
                self.daily_cap
            );
        } else {
            self.meter.requests_today += 1;
        }
        self.meter.last_request_date = Some(self.day_of(now));
        self.meter.last_request_at = Some(now);

        debug!(
            "Rate limiter: {}/{} requests used today",
            self.meter.requests_today, self.daily_cap
        );
    }

    /// Check and record in one step.
    pub fn try_acquire(&mut self, now: DateTime<Utc>) -> Result<FetchPermit, MarketDataError> {
        let permit = self.check(now);
        if !permit.allowed {
            return Err(MarketDataError::LocalRateLimitExceeded {
                next_allowed_at: permit.next_allowed_at,
                remaining_today: permit.remaining_today,
            });
        }
        self.record_request(now);
        Ok(FetchPermit {
            remaining_today: permit.remaining_today - 1,
            ..permit
        })
    }

    fn roll_over(&mut self, now: DateTime<Utc>) {
        let today = self.day_of(now);
        if self.meter.roll_over(today) {
            debug!("Rate limiter: new day {}, daily counter reset", today);
        }
    }

    fn day_of(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    fn start_of_next_day(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.day_of(now)
            .succ_opt()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .and_then(|midnight| self.timezone.from_local_datetime(&midnight).earliest())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| now + chrono::Duration::days(1))
    }
}
