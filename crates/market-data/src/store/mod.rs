//! In-memory quote store with explicit snapshot persistence.
//!
//! Records are replaced wholesale; there is no partial merge. Flushing is
//! explicit: the owner calls [`SnapshotFile::flush`] after a write.

mod snapshot;

pub use snapshot::{Snapshot, SnapshotFile, SnapshotMetadata};

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::limiter::RequestMeter;
use crate::models::{normalize_symbol, CompanyOverview, HistoricalSeries, Quote};

/// Last known data per symbol.
#[derive(Debug, Default)]
pub struct QuoteStore {
    quotes: HashMap<String, Quote>,
    historical: HashMap<String, HistoricalSeries>,
    company: HashMap<String, CompanyOverview>,
    last_update: Option<DateTime<Utc>>,
    dirty: bool,
}

impl QuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a snapshot. Keys and record symbols are normalized, so a
    /// hand-edited file with lowercase symbols still serves lookups.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            quotes: rekey(snapshot.quotes),
            historical: rekey(snapshot.historical),
            company: rekey(snapshot.company),
            last_update: snapshot.metadata.last_update,
            dirty: false,
        }
    }

    pub fn get_quote(&self, symbol: &str) -> Option<&Quote> {
        self.quotes.get(&normalize_symbol(symbol))
    }

    pub fn get_historical(&self, symbol: &str) -> Option<&HistoricalSeries> {
        self.historical.get(&normalize_symbol(symbol))
    }

    pub fn get_company(&self, symbol: &str) -> Option<&CompanyOverview> {
        self.company.get(&normalize_symbol(symbol))
    }

    pub fn put_quote(&mut self, quote: Quote) {
        self.touch(quote.refreshed_at);
        self.quotes.insert(normalize_symbol(&quote.symbol), quote);
    }

    pub fn put_historical(&mut self, series: HistoricalSeries) {
        self.touch(series.refreshed_at);
        self.historical.insert(normalize_symbol(&series.symbol), series);
    }

    pub fn put_company(&mut self, overview: CompanyOverview) {
        self.touch(overview.refreshed_at);
        self.company.insert(normalize_symbol(&overview.symbol), overview);
    }

    /// All cached quotes, ordered by symbol.
    pub fn quotes(&self) -> Vec<Quote> {
        let mut quotes: Vec<Quote> = self.quotes.values().cloned().collect();
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        quotes
    }

    /// Every symbol with at least one cached record.
    pub fn symbols(&self) -> BTreeSet<String> {
        self.quotes
            .keys()
            .chain(self.historical.keys())
            .chain(self.company.keys())
            .cloned()
            .collect()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Copy the full state for persistence.
    pub fn to_snapshot(&self, meter: &RequestMeter) -> Snapshot {
        Snapshot {
            quotes: self
                .quotes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            historical: self
                .historical
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            company: self
                .company
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            metadata: SnapshotMetadata {
                last_update: self.last_update,
                meter: meter.clone(),
            },
        }
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.dirty = true;
        self.last_update = Some(self.last_update.map_or(at, |prev| prev.max(at)));
    }
}

/// Cached records that carry their own symbol.
trait Keyed {
    fn symbol_mut(&mut self) -> &mut String;
}

impl Keyed for Quote {
    fn symbol_mut(&mut self) -> &mut String {
        &mut self.symbol
    }
}

impl Keyed for HistoricalSeries {
    fn symbol_mut(&mut self) -> &mut String {
        &mut self.symbol
    }
}

impl Keyed for CompanyOverview {
    fn symbol_mut(&mut self) -> &mut String {
        &mut self.symbol
    }
}

fn rekey<T: Keyed>(entries: BTreeMap<String, T>) -> HashMap<String, T> {
    entries
        .into_iter()
        .map(|(key, mut record)| {
            let symbol = record.symbol_mut();
            if symbol.trim().is_empty() {
                *symbol = key;
            }
            let normalized = normalize_symbol(symbol);
            *symbol = normalized.clone();
            (normalized, record)
        })
        .collect()
}
