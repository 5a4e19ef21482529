//! Gemini wire types and their mapping onto the common models.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use xchg_core::{AccountCurrency, AccountInfo, AssetType, CurrencyPair, OrderBook, Ticker};
use xchg_exchanges_common::parse::{decimal_or_zero, level};

/// `/v1/book/{symbol}` level.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookLevel {
    pub price: String,
    pub amount: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookResponse {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// `/v1/balances` entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Balance {
    #[serde(rename = "type")]
    pub account_type: String,
    pub currency: String,
    pub amount: Option<Value>,
    pub available: Option<Value>,
    pub available_for_withdrawal: Option<Value>,
}

/// JSON body of a signed request, sent base64 encoded in a header.
///
/// Field order is part of the signature.
#[derive(Debug, Clone, Serialize)]
pub struct SignedPayload<'a> {
    pub request: &'a str,
    pub nonce: u64,
}

/// Volume is keyed by currency inside `volume`; the quote side is reported.
pub fn ticker(exchange: &str, pair: CurrencyPair, raw: &Value) -> Ticker {
    let volume = raw.get("volume");
    let mut ticker = Ticker::new(pair);
    ticker.last = decimal_or_zero(exchange, "last", raw.get("last"));
    ticker.bid = decimal_or_zero(exchange, "bid", raw.get("bid"));
    ticker.ask = decimal_or_zero(exchange, "ask", raw.get("ask"));
    ticker.volume = decimal_or_zero(
        exchange,
        "volume",
        volume.and_then(|v| v.get(ticker.pair.quote())),
    );
    ticker.last_updated = millis_or_now(volume.and_then(|v| v.get("timestamp")));
    ticker
}

pub fn order_book(
    exchange: &str,
    pair: CurrencyPair,
    asset: AssetType,
    raw: &BookResponse,
) -> OrderBook {
    let levels = |side: &[BookLevel]| -> Vec<_> {
        side.iter()
            .filter_map(|l| level(exchange, &l.price, &l.amount))
            .collect()
    };
    OrderBook::new(exchange, pair, asset, levels(&raw.bids), levels(&raw.asks))
}

/// Hold is whatever part of the amount is not available.
pub fn account(exchange: &str, raw: &[Balance]) -> AccountInfo {
    let currencies = raw
        .iter()
        .map(|balance| {
            let total = decimal_or_zero(exchange, "amount", balance.amount.as_ref());
            let available = decimal_or_zero(exchange, "available", balance.available.as_ref());
            AccountCurrency {
                currency: balance.currency.to_uppercase(),
                total,
                hold: (total - available).max(Decimal::ZERO),
            }
        })
        .collect();

    AccountInfo {
        exchange: exchange.to_string(),
        currencies,
    }
}

fn millis_or_now(value: Option<&Value>) -> DateTime<Utc> {
    let millis = match value {
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    };
    millis
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}
