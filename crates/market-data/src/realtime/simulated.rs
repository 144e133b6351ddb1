//! Random-walk price source for development and demos.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use super::{PriceSource, PriceUpdate};
use crate::errors::MarketDataError;
use crate::models::{normalize_symbol, Quote};
use crate::provider::synthetic::{base_price, to_price};

const CHANNEL_CAPACITY: usize = 256;

/// Emits one update per symbol every `tick_interval`, walking from the last
/// known price. Symbols without a seed start from the synthetic base price.
pub struct SimulatedPriceSource {
    seeds: HashMap<String, Decimal>,
    tick_interval: Duration,
    /// Max relative move per tick.
    volatility: f64,
    rng_seed: Option<u64>,
}

impl SimulatedPriceSource {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            seeds: HashMap::new(),
            tick_interval,
            volatility: 0.002,
            rng_seed: None,
        }
    }

    /// Seed starting prices from cached quotes.
    pub fn from_quotes(quotes: &[Quote], tick_interval: Duration) -> Self {
        let mut source = Self::new(tick_interval);
        for quote in quotes {
            source
                .seeds
                .insert(normalize_symbol(&quote.symbol), quote.price);
        }
        source
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility.abs();
        self
    }

    fn start_price(&self, symbol: &str) -> f64 {
        self.seeds
            .get(symbol)
            .and_then(|p| p.to_f64())
            .filter(|p| *p > 0.0)
            .unwrap_or_else(|| base_price(symbol))
    }
}

#[async_trait]
impl PriceSource for SimulatedPriceSource {
    fn name(&self) -> &'static str {
        "SIMULATED"
    }

    async fn connect(
        &self,
        symbols: &[String],
    ) -> Result<mpsc::Receiver<PriceUpdate>, MarketDataError> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        // (symbol, opening price, current price)
        let mut book: Vec<(String, f64, f64)> = symbols
            .iter()
            .map(|s| normalize_symbol(s))
            .map(|s| {
                let start = self.start_price(&s);
                (s, start, start)
            })
            .collect();
        let mut rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let period = self.tick_interval.max(Duration::from_millis(1));
        let volatility = self.volatility;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                for (symbol, open, price) in book.iter_mut() {
                    let step = if volatility > 0.0 {
                        rng.gen_range(-volatility..volatility)
                    } else {
                        0.0
                    };
                    *price = (*price * (1.0 + step)).max(0.01);

                    let current = to_price(*price);
                    let reference = to_price(*open);
                    let change = current - reference;
                    let change_percent = if reference.is_zero() {
                        Decimal::ZERO
                    } else {
                        (change / reference * Decimal::ONE_HUNDRED).round_dp(4)
                    };

                    let update = PriceUpdate {
                        symbol: symbol.clone(),
                        price: current,
                        change,
                        change_percent,
                        timestamp: Utc::now(),
                    };
                    if tx.send(update).await.is_err() {
                        debug!("Simulated price stream closed by consumer");
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}
