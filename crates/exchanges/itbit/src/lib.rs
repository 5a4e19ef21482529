//! ItBit exchange driver: public ticker and order book over the v1 REST API.
//! Withdrawals are website-only and account operations are not offered.

pub mod client;
pub mod exchange;
pub mod protocol;

pub use client::ItBitClient;
pub use exchange::ItBit;
