use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::batcher::PriceBatcher;
use super::reconnect::{ConnectionState, ReconnectPolicy, Reconnector};
use crate::errors::MarketDataError;

/// One live price tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Something that streams price ticks for a set of symbols.
///
/// The returned channel closing means the connection dropped.
#[async_trait]
pub trait PriceSource: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn connect(
        &self,
        symbols: &[String],
    ) -> Result<mpsc::Receiver<PriceUpdate>, MarketDataError>;
}

#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Flush pending updates at least this often.
    pub throttle: Duration,
    /// Flush early once this many symbols are pending.
    pub max_batch: usize,
    /// Capacity of the outgoing batch channel.
    pub channel_capacity: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(250),
            max_batch: 50,
            channel_capacity: 64,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

enum PumpEnd {
    Shutdown,
    ConsumerGone,
    SourceClosed,
}

pub struct PriceFeed;

impl PriceFeed {
    /// Spawn the supervisor. Batches arrive on the returned receiver until
    /// the feed stops, gives up reconnecting, or the receiver is dropped.
    pub fn start(
        source: Arc<dyn PriceSource>,
        symbols: Vec<String>,
        config: FeedConfig,
    ) -> (PriceFeedHandle, mpsc::Receiver<Vec<PriceUpdate>>) {
        let (batch_tx, batch_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(supervise(
            source,
            symbols,
            config,
            state_tx,
            batch_tx,
            shutdown_rx,
        ));

        (
            PriceFeedHandle {
                state: state_rx,
                shutdown: shutdown_tx,
                task,
            },
            batch_rx,
        )
    }
}

pub struct PriceFeedHandle {
    state: watch::Receiver<ConnectionState>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PriceFeedHandle {
    /// Watch connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal the supervisor and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Price feed task ended abnormally: {}", e);
        }
    }
}

async fn supervise(
    source: Arc<dyn PriceSource>,
    symbols: Vec<String>,
    config: FeedConfig,
    state: watch::Sender<ConnectionState>,
    out: mpsc::Sender<Vec<PriceUpdate>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut reconnector = Reconnector::new(config.reconnect.clone());
    let mut batcher = PriceBatcher::new(config.max_batch);
    info!(
        "Price feed starting: {} source, {} symbols",
        source.name(),
        symbols.len()
    );

    loop {
        if *shutdown.borrow() {
            break;
        }

        let _ = state.send(reconnector.begin_connect());
        let connected = tokio::select! {
            result = source.connect(&symbols) => result,
            _ = shutdown.changed() => break,
        };

        match connected {
            Ok(mut updates) => {
                let _ = state.send(reconnector.on_connected());
                info!("Price feed connected to {}", source.name());
                match pump(&mut updates, &mut batcher, &out, &mut shutdown, config.throttle).await {
                    PumpEnd::Shutdown => break,
                    PumpEnd::ConsumerGone => {
                        debug!("Price batch consumer dropped, stopping feed");
                        break;
                    }
                    PumpEnd::SourceClosed => warn!("Price feed connection lost"),
                }
            }
            Err(e) => warn!("Price feed connect to {} failed: {}", source.name(), e),
        }

        let next = reconnector.on_failure();
        let _ = state.send(next);
        if reconnector.has_given_up() {
            warn!(
                "Price feed giving up after {} consecutive failures",
                reconnector.failures()
            );
            break;
        }
        if let ConnectionState::Backoff { attempt, delay } = next {
            info!("Reconnecting price feed in {:?} (attempt {})", delay, attempt);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }
    }

    let _ = state.send(ConnectionState::Disconnected);
    info!("Price feed stopped");
}

async fn pump(
    updates: &mut mpsc::Receiver<PriceUpdate>,
    batcher: &mut PriceBatcher,
    out: &mpsc::Sender<Vec<PriceUpdate>>,
    shutdown: &mut watch::Receiver<bool>,
    throttle: Duration,
) -> PumpEnd {
    let mut flush = interval(throttle.max(Duration::from_millis(1)));
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = updates.recv() => match received {
                Some(update) => {
                    if let Some(batch) = batcher.push(update) {
                        if let Err(end) = deliver(out, batch, shutdown).await {
                            return end;
                        }
                    }
                }
                None => {
                    if !batcher.is_empty() {
                        if let Err(end) = deliver(out, batcher.drain(), shutdown).await {
                            return end;
                        }
                    }
                    return PumpEnd::SourceClosed;
                }
            },
            _ = flush.tick() => {
                if !batcher.is_empty() {
                    if let Err(end) = deliver(out, batcher.drain(), shutdown).await {
                        return end;
                    }
                }
            }
            _ = shutdown.changed() => return PumpEnd::Shutdown,
        }
    }
}

/// Send one batch; a stalled consumer must not block shutdown.
async fn deliver(
    out: &mpsc::Sender<Vec<PriceUpdate>>,
    batch: Vec<PriceUpdate>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), PumpEnd> {
    tokio::select! {
        sent = out.send(batch) => sent.map_err(|_| PumpEnd::ConsumerGone),
        _ = shutdown.changed() => Err(PumpEnd::Shutdown),
    }
}
