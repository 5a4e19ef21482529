//! Bitstamp exchange driver.
//!
//! REST market data, trading pair housekeeping and signed balances over the
//! v2 API, plus a websocket handle for live trades.

pub mod client;
pub mod exchange;
pub mod protocol;

pub use client::BitstampClient;
pub use exchange::Bitstamp;
