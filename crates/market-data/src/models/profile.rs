use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Company fundamentals from the provider's OVERVIEW endpoint.
///
/// Replaced wholesale on every successful fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyOverview {
    pub symbol: String,

    /// Company name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Business description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Listing exchange (e.g., "NYSE")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    /// Reporting currency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Business sector (e.g., "TECHNOLOGY")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,

    /// Industry within sector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub peg_ratio: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_value: Option<f64>,

    /// Dividend yield (as decimal, e.g., 0.025 for 2.5%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub eps: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub week_52_high: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub week_52_low: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub moving_average_50_day: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub moving_average_200_day: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares_outstanding: Option<f64>,

    pub refreshed_at: DateTime<Utc>,
}

impl CompanyOverview {
    /// An overview with only the symbol filled in.
    pub fn empty(symbol: impl Into<String>, refreshed_at: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            description: None,
            exchange: None,
            currency: None,
            country: None,
            sector: None,
            industry: None,
            market_cap: None,
            pe_ratio: None,
            peg_ratio: None,
            book_value: None,
            dividend_yield: None,
            eps: None,
            beta: None,
            week_52_high: None,
            week_52_low: None,
            moving_average_50_day: None,
            moving_average_200_day: None,
            shares_outstanding: None,
            refreshed_at,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.refreshed_at)
    }
}
