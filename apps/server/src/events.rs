use serde_json::Value;
use tokio::sync::broadcast;

/// Event names pushed to UI clients over SSE.
pub const QUOTE_UPDATED: &str = "market:quote-updated";
pub const HISTORICAL_UPDATED: &str = "market:historical-updated";
pub const COMPANY_UPDATED: &str = "market:company-updated";
pub const PRICE_BATCH: &str = "prices:batch";
pub const FEED_STATE: &str = "prices:connection";

/// Event name plus optional JSON payload.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    pub name: &'static str,
    pub payload: Option<Value>,
}

impl ServerEvent {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            payload: None,
        }
    }

    pub fn with_payload(name: &'static str, payload: Value) -> Self {
        Self {
            name,
            payload: Some(payload),
        }
    }
}

/// Broadcast bus that fans events out to every connected client.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ServerEvent) {
        // Lagging listeners are ignored to avoid blocking producers.
        let _ = self.sender.send(event);
    }
}
