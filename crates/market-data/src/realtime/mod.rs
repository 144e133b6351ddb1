//! Live price feed.
//!
//! A supervisor task connects to a [`PriceSource`], coalesces ticks per
//! symbol and forwards them in batches over a bounded channel. Dropped
//! connections go through an explicit reconnect state machine.

mod batcher;
mod feed;
mod reconnect;
mod simulated;

pub use batcher::PriceBatcher;
pub use feed::{FeedConfig, PriceFeed, PriceFeedHandle, PriceSource, PriceUpdate};
pub use reconnect::{ConnectionState, ReconnectPolicy, Reconnector};
pub use simulated::SimulatedPriceSource;
