//! When watched symbols get refreshed.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::SchedulerConfig;

/// Market-local fetch times, projected onto UTC for a given day.
#[derive(Clone, Debug)]
pub struct SchedulePlan {
    timezone: Tz,
    fetch_times: Vec<NaiveTime>,
    trading_days_only: bool,
}

impl SchedulePlan {
    pub fn new(timezone: Tz, mut fetch_times: Vec<NaiveTime>, trading_days_only: bool) -> Self {
        fetch_times.sort();
        fetch_times.dedup();
        Self {
            timezone,
            fetch_times,
            trading_days_only,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(
            config.timezone,
            config.fetch_times.clone(),
            config.trading_days_only,
        )
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn fetch_times(&self) -> &[NaiveTime] {
        &self.fetch_times
    }

    /// Market-local calendar date of `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// Weekends are skipped; exchange holidays are not modelled.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Every fetch instant on `date`, in order.
    pub fn occurrences(&self, date: NaiveDate) -> Vec<DateTime<Utc>> {
        if self.trading_days_only && !self.is_trading_day(date) {
            return Vec::new();
        }
        self.fetch_times
            .iter()
            .filter_map(|t| {
                // A time inside a DST gap does not exist that day
                self.timezone
                    .from_local_datetime(&date.and_time(*t))
                    .earliest()
            })
            .map(|local| local.with_timezone(&Utc))
            .collect()
    }

    /// Fetch instants on `date` that are not yet past.
    pub fn remaining(&self, date: NaiveDate, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        self.occurrences(date)
            .into_iter()
            .filter(|at| *at >= now)
            .collect()
    }
}

/// Parse a comma-separated list of `HH:MM` times, e.g. `"09:35,12:30,16:05"`.
pub fn parse_fetch_times(raw: &str) -> Result<Vec<NaiveTime>, chrono::ParseError> {
    let mut times = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| NaiveTime::parse_from_str(s, "%H:%M"))
        .collect::<Result<Vec<_>, _>>()?;
    times.sort();
    times.dedup();
    Ok(times)
}
