//! ItBit wire types and their mapping onto the common models.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use xchg_core::{AssetType, CurrencyPair, OrderBook, Ticker};
use xchg_exchanges_common::parse::{decimal_or_zero, levels_from_arrays};

/// `/markets/{symbol}/order_book`. Levels are `[price, amount]` strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrderBookResponse {
    pub bids: Vec<Vec<Value>>,
    pub asks: Vec<Vec<Value>>,
}

/// ItBit calls bitcoin XBT on the wire.
pub fn wire_currency(code: &str) -> &str {
    match code {
        "BTC" => "XBT",
        other => other,
    }
}

/// `/markets/{symbol}/ticker`. The 24h fields are reported.
pub fn ticker(exchange: &str, pair: CurrencyPair, raw: &Value) -> Ticker {
    let mut ticker = Ticker::new(pair);
    ticker.last = decimal_or_zero(exchange, "lastPrice", raw.get("lastPrice"));
    ticker.bid = decimal_or_zero(exchange, "bid", raw.get("bid"));
    ticker.ask = decimal_or_zero(exchange, "ask", raw.get("ask"));
    ticker.high = decimal_or_zero(exchange, "high24h", raw.get("high24h"));
    ticker.low = decimal_or_zero(exchange, "low24h", raw.get("low24h"));
    ticker.volume = decimal_or_zero(exchange, "volume24h", raw.get("volume24h"));
    ticker.last_updated = server_time_or_now(raw.get("serverTimeUTC"));
    ticker
}

pub fn order_book(
    exchange: &str,
    pair: CurrencyPair,
    asset: AssetType,
    raw: &OrderBookResponse,
) -> OrderBook {
    OrderBook::new(
        exchange,
        pair,
        asset,
        levels_from_arrays(exchange, &raw.bids),
        levels_from_arrays(exchange, &raw.asks),
    )
}

fn server_time_or_now(value: Option<&Value>) -> DateTime<Utc> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}
