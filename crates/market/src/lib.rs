//! Shared market data cache.
//!
//! [`MarketData`] is created once by the application and handed to every
//! driver. Drivers reference the stores; they never own the entries.

pub mod key;
pub mod store;

pub use key::MarketKey;
pub use store::SnapshotStore;

use std::sync::Arc;
use xchg_core::{OrderBook, Ticker};

pub type TickerStore = SnapshotStore<Ticker>;
pub type OrderBookStore = SnapshotStore<OrderBook>;

/// One ticker store and one order book store.
#[derive(Debug, Clone)]
pub struct MarketData {
    pub tickers: TickerStore,
    pub order_books: OrderBookStore,
}

impl MarketData {
    pub fn new() -> Self {
        Self {
            tickers: SnapshotStore::new("ticker"),
            order_books: SnapshotStore::new("order book"),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Drop every snapshot held by both stores.
    pub fn clear(&self) {
        self.tickers.clear();
        self.order_books.clear();
    }

    /// Drop every snapshot for one exchange, e.g. when its driver is disabled.
    pub fn remove_exchange(&self, exchange: &str) {
        let tickers = self.tickers.remove_exchange(exchange);
        let books = self.order_books.remove_exchange(exchange);
        tracing::debug!(exchange, tickers, books, "Evicted exchange snapshots");
    }
}

impl Default for MarketData {
    fn default() -> Self {
        Self::new()
    }
}
