use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Daily request accounting persisted alongside the cached data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeter {
    /// Outbound requests issued on `last_request_date`.
    #[serde(default)]
    pub requests_today: u32,

    /// Calendar day (limiter timezone) of the last outbound request.
    #[serde(default)]
    pub last_request_date: Option<NaiveDate>,

    /// Instant of the last outbound request.
    #[serde(default)]
    pub last_request_at: Option<DateTime<Utc>>,
}

impl RequestMeter {
    /// Zero the counter when `today` differs from the recorded day.
    ///
    /// Returns true if a reset happened.
    pub(crate) fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.last_request_date == Some(today) {
            return false;
        }
        let reset = self.requests_today > 0;
        self.requests_today = 0;
        if self.last_request_date.is_some() {
            self.last_request_date = Some(today);
        }
        reset
    }
}
