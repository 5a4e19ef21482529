//! Gemini exchange driver: public market data and signed balances over the
//! v1 REST API, with an optional sandbox endpoint.

pub mod client;
pub mod exchange;
pub mod protocol;

pub use client::GeminiClient;
pub use exchange::Gemini;
