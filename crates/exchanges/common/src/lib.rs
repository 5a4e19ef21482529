//! Shared building blocks for venue drivers.

pub mod base;
pub mod nonce;
pub mod parse;
pub mod runner;
pub mod traits;
pub mod websocket;

pub use base::{ExchangeBase, FeeSchedule, PairDiff};
pub use nonce::Nonce;
pub use runner::{start, DriverHandle};
pub use traits::{Exchange, SnapshotFetch};
pub use websocket::WebsocketHandle;
