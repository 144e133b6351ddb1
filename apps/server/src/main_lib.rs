use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    events::{
        EventBus, ServerEvent, COMPANY_UPDATED, FEED_STATE, HISTORICAL_UPDATED, PRICE_BATCH,
        QUOTE_UPDATED,
    },
};
use options_tutor_market_data::{
    AlphaVantageProvider, DataScheduler, FeedConfig, MarketDataEvent, MarketDataService,
    PriceFeed, PriceFeedHandle, QuoteProvider, SimulatedPriceSource,
};
use tokio::sync::{broadcast::error::RecvError, Mutex};
use tokio::task::JoinHandle;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Tick rate of the simulated price source.
const SIMULATED_TICK: Duration = Duration::from_secs(1);

pub struct AppState {
    pub market_data: Arc<MarketDataService>,
    pub scheduler: Arc<DataScheduler>,
    pub event_bus: EventBus,
    pub scheduler_enabled: bool,
    pub realtime_enabled: bool,
    background: Mutex<Background>,
}

#[derive(Default)]
struct Background {
    feed: Option<PriceFeedHandle>,
    tasks: Vec<JoinHandle<()>>,
}

pub fn init_tracing() {
    let log_format = std::env::var("OT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let market_config = config.market_data_config();
    let provider: Arc<dyn QuoteProvider> = Arc::new(AlphaVantageProvider::with_base_url(
        config.alpha_vantage_api_key.clone(),
        config.alpha_vantage_base_url.clone(),
        market_config.request_timeout,
    )?);
    if config.alpha_vantage_api_key == "demo" {
        tracing::warn!("Using the Alpha Vantage demo key; set OT_ALPHA_VANTAGE_API_KEY");
    }
    build_state_with_provider(config, provider).await
}

/// Wire the service, scheduler and event bus around an arbitrary provider.
pub async fn build_state_with_provider(
    config: &Config,
    provider: Arc<dyn QuoteProvider>,
) -> anyhow::Result<Arc<AppState>> {
    let market_config = config.market_data_config();
    if let Some(path) = &market_config.snapshot_path {
        tracing::info!("Market data cache: {}", path.display());
    }
    let event_capacity = market_config.event_capacity;

    let market_data = Arc::new(MarketDataService::new(provider, market_config));
    let scheduler = Arc::new(DataScheduler::new(
        market_data.clone(),
        config.scheduler_config(),
    ));
    for symbol in &config.watchlist {
        scheduler.watch(symbol);
    }

    let event_bus = EventBus::new(event_capacity);
    let forwarder = spawn_market_event_forwarder(&market_data, event_bus.clone());

    Ok(Arc::new(AppState {
        market_data,
        scheduler,
        event_bus,
        scheduler_enabled: config.scheduler_enabled,
        realtime_enabled: config.realtime_enabled,
        background: Mutex::new(Background {
            feed: None,
            tasks: vec![forwarder],
        }),
    }))
}

/// Start the scheduler ticker and the price feed, as configured.
pub async fn start_background(state: &Arc<AppState>) {
    if state.scheduler_enabled {
        state.scheduler.start();
    } else {
        tracing::info!("Scheduler disabled (OT_SCHEDULER_ENABLED=false)");
    }

    if !state.realtime_enabled {
        tracing::info!("Price feed disabled (OT_REALTIME_ENABLED=false)");
        return;
    }

    let mut background = state.background.lock().await;
    if background.feed.is_some() {
        return;
    }

    let source = Arc::new(SimulatedPriceSource::from_quotes(
        &state.market_data.cached_quotes(),
        SIMULATED_TICK,
    ));
    let (feed, mut batches) = PriceFeed::start(
        source,
        state.scheduler.watchlist(),
        FeedConfig::default(),
    );

    let bus = state.event_bus.clone();
    background.tasks.push(tokio::spawn(async move {
        while let Some(batch) = batches.recv().await {
            match serde_json::to_value(&batch) {
                Ok(payload) => bus.publish(ServerEvent::with_payload(PRICE_BATCH, payload)),
                Err(err) => tracing::error!("Failed to serialize price batch: {}", err),
            }
        }
    }));

    let bus = state.event_bus.clone();
    let mut connection = feed.state();
    background.tasks.push(tokio::spawn(async move {
        while connection.changed().await.is_ok() {
            let current = *connection.borrow_and_update();
            match serde_json::to_value(current) {
                Ok(payload) => bus.publish(ServerEvent::with_payload(FEED_STATE, payload)),
                Err(err) => tracing::error!("Failed to serialize feed state: {}", err),
            }
        }
    }));

    background.feed = Some(feed);
}

/// Stop background work and flush the cache.
pub async fn shutdown(state: &Arc<AppState>) {
    state.scheduler.stop().await;

    let mut background = state.background.lock().await;
    if let Some(feed) = background.feed.take() {
        feed.stop().await;
    }
    for task in background.tasks.drain(..) {
        task.abort();
    }

    if let Err(err) = state.market_data.flush() {
        tracing::warn!("Final cache flush failed: {}", err);
    }
    tracing::info!("Background tasks stopped");
}

fn spawn_market_event_forwarder(service: &MarketDataService, bus: EventBus) -> JoinHandle<()> {
    let mut events = service.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(server_event) = to_server_event(&event) {
                        bus.publish(server_event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event forwarder lagged, {} events dropped", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn to_server_event(event: &MarketDataEvent) -> Option<ServerEvent> {
    let name = match event {
        MarketDataEvent::QuoteUpdated { .. } => QUOTE_UPDATED,
        MarketDataEvent::HistoricalUpdated { .. } => HISTORICAL_UPDATED,
        MarketDataEvent::CompanyUpdated { .. } => COMPANY_UPDATED,
    };
    match serde_json::to_value(event) {
        Ok(payload) => Some(ServerEvent::with_payload(name, payload)),
        Err(err) => {
            tracing::error!("Failed to serialize {} event: {}", name, err);
            None
        }
    }
}
