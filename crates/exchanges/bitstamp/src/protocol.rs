//! Bitstamp wire types and their mapping onto the common models.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use xchg_core::{AccountCurrency, AccountInfo, AssetType, CurrencyPair, OrderBook, Ticker};
use xchg_exchanges_common::parse::{decimal_or_zero, levels_from_arrays, timestamp_or_now};

/// Entry of `/v2/trading-pairs-info/`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TradingPairInfo {
    /// "BTC/USD"
    pub name: String,
    /// "btcusd"
    pub url_symbol: String,
    /// "Enabled" or "Disabled"
    pub trading: String,
    pub description: String,
}

impl TradingPairInfo {
    pub fn is_trading(&self) -> bool {
        self.trading.eq_ignore_ascii_case("enabled")
    }
}

/// `/v2/order_book/{pair}/`; levels are `[price, amount]` string arrays.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderBookResponse {
    pub timestamp: Option<Value>,
    pub bids: Vec<Vec<Value>>,
    pub asks: Vec<Vec<Value>>,
}

/// Error body Bitstamp returns with HTTP 200 on signed endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub reason: Value,
}

pub fn ticker(exchange: &str, pair: CurrencyPair, raw: &Value) -> Ticker {
    Ticker {
        pair,
        last: decimal_or_zero(exchange, "last", raw.get("last")),
        high: decimal_or_zero(exchange, "high", raw.get("high")),
        low: decimal_or_zero(exchange, "low", raw.get("low")),
        bid: decimal_or_zero(exchange, "bid", raw.get("bid")),
        ask: decimal_or_zero(exchange, "ask", raw.get("ask")),
        volume: decimal_or_zero(exchange, "volume", raw.get("volume")),
        last_updated: timestamp_or_now(raw.get("timestamp")),
    }
}

pub fn order_book(
    exchange: &str,
    pair: CurrencyPair,
    asset: AssetType,
    raw: &OrderBookResponse,
) -> OrderBook {
    OrderBook {
        exchange: exchange.to_string(),
        pair,
        asset,
        bids: levels_from_arrays(exchange, &raw.bids),
        asks: levels_from_arrays(exchange, &raw.asks),
        last_updated: raw
            .timestamp
            .as_ref()
            .map(|ts| timestamp_or_now(Some(ts)))
            .unwrap_or_else(Utc::now),
    }
}

/// Balances come back flat: `btc_available`, `btc_reserved`, `btc_balance`,
/// ... Every currency with an `_available` field is reported, with the
/// reserved amount as the hold.
pub fn account(exchange: &str, raw: &Map<String, Value>) -> AccountInfo {
    let mut currencies: Vec<AccountCurrency> = raw
        .keys()
        .filter_map(|field| field.strip_suffix("_available"))
        .map(|currency| AccountCurrency {
            currency: currency.to_uppercase(),
            total: decimal_or_zero(exchange, "available", raw.get(&format!("{}_available", currency))),
            hold: decimal_or_zero(exchange, "reserved", raw.get(&format!("{}_reserved", currency))),
        })
        .collect();
    currencies.sort_by(|a, b| a.currency.cmp(&b.currency));

    AccountInfo {
        exchange: exchange.to_string(),
        currencies,
    }
}
