//! Market data feed abstraction and an in-process pub/sub hub.
//!
//! Delivery is at-least-once and ordered only within a single symbol
//! topic. Dropping a receiver unsubscribes; pausing a session is exactly
//! that.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// One price update for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketTick {
    pub symbol: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Publish/subscribe channel per symbol topic.
pub trait MarketFeed: Send + Sync {
    /// Subscribe to a symbol's topic. The receiver observes every tick
    /// published after this call, in publish order.
    fn subscribe(&self, symbol: &str) -> broadcast::Receiver<MarketTick>;
}

/// In-process feed hub backed by one broadcast channel per symbol.
///
/// Slow subscribers that fall more than `capacity` ticks behind see a
/// `Lagged` error and continue from the oldest retained tick, which is the
/// at-least-once part of the contract.
pub struct ChannelFeed {
    topics: Mutex<HashMap<String, broadcast::Sender<MarketTick>>>,
    capacity: usize,
}

impl ChannelFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Publish a tick to its symbol topic. Returns the number of active
    /// subscribers that will observe it.
    pub fn publish(&self, tick: MarketTick) -> usize {
        let sender = {
            let mut topics = self.topics.lock().expect("feed topics lock poisoned");
            topics
                .entry(tick.symbol.clone())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .clone()
        };
        sender.send(tick).unwrap_or(0)
    }

    pub fn subscriber_count(&self, symbol: &str) -> usize {
        self.topics
            .lock()
            .expect("feed topics lock poisoned")
            .get(symbol)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

impl MarketFeed for ChannelFeed {
    fn subscribe(&self, symbol: &str) -> broadcast::Receiver<MarketTick> {
        let mut topics = self.topics.lock().expect("feed topics lock poisoned");
        topics
            .entry(symbol.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}
