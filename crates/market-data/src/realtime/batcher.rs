use std::collections::BTreeMap;

use super::PriceUpdate;

/// Coalesces price updates so each flush carries at most one update per symbol.
#[derive(Debug)]
pub struct PriceBatcher {
    pending: BTreeMap<String, PriceUpdate>,
    max_batch: usize,
}

impl PriceBatcher {
    pub fn new(max_batch: usize) -> Self {
        Self {
            pending: BTreeMap::new(),
            max_batch: max_batch.max(1),
        }
    }

    /// Buffer an update, replacing any older one for the same symbol.
    /// Returns a full batch once `max_batch` symbols are pending.
    pub fn push(&mut self, update: PriceUpdate) -> Option<Vec<PriceUpdate>> {
        self.pending.insert(update.symbol.clone(), update);
        if self.pending.len() >= self.max_batch {
            Some(self.drain())
        } else {
            None
        }
    }

    /// Take everything pending, ordered by symbol.
    pub fn drain(&mut self) -> Vec<PriceUpdate> {
        std::mem::take(&mut self.pending).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
