//! Lenient field parsing for venue payloads.
//!
//! One bad field never fails a whole snapshot: numbers default to zero and
//! order book levels that cannot be read are dropped. Both are logged at debug.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;
use xchg_core::PriceLevel;

/// Parse a decimal string, accepting scientific notation.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Decimal from a JSON string or number; zero when absent or malformed.
pub fn decimal_or_zero(exchange: &str, field: &str, value: Option<&Value>) -> Decimal {
    let parsed = match value {
        Some(Value::String(s)) => parse_decimal(s),
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        debug!(exchange, field, value = ?value, "Defaulting malformed number to zero");
        Decimal::ZERO
    })
}

/// Build a level from raw price and amount strings, or `None` if either is bad.
pub fn level(exchange: &str, price: &str, amount: &str) -> Option<PriceLevel> {
    match (parse_decimal(price), parse_decimal(amount)) {
        (Some(price), Some(amount)) => Some(PriceLevel::new(price, amount)),
        _ => {
            debug!(exchange, price, amount, "Dropping malformed order book level");
            None
        }
    }
}

/// Levels from `[[price, amount, ...], ...]` arrays, preserving order.
pub fn levels_from_arrays(exchange: &str, raw: &[Vec<Value>]) -> Vec<PriceLevel> {
    raw.iter()
        .filter_map(|entry| match (entry.first(), entry.get(1)) {
            (Some(price), Some(amount)) => level(exchange, &as_text(price), &as_text(amount)),
            _ => {
                debug!(exchange, entry = ?entry, "Dropping short order book level");
                None
            }
        })
        .collect()
}

/// Unix-seconds timestamp from a JSON string or number; now when unreadable.
pub fn timestamp_or_now(value: Option<&Value>) -> DateTime<Utc> {
    let seconds = match value {
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    };
    seconds
        .and_then(|s| Utc.timestamp_opt(s, 0).single())
        .unwrap_or_else(Utc::now)
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_decimal_or_zero() {
        let payload = json!({"bid": "100.5", "ask": 101, "last": "n/a"});
        assert_eq!(decimal_or_zero("x", "bid", payload.get("bid")), dec!(100.5));
        assert_eq!(decimal_or_zero("x", "ask", payload.get("ask")), dec!(101));
        assert_eq!(decimal_or_zero("x", "last", payload.get("last")), Decimal::ZERO);
        assert_eq!(decimal_or_zero("x", "high", payload.get("high")), Decimal::ZERO);
    }

    #[test]
    fn test_scientific_notation() {
        assert_eq!(parse_decimal("1e-3"), Some(dec!(0.001)));
    }

    #[test]
    fn test_bad_levels_are_dropped_in_order() {
        let raw = vec![
            vec![json!("100"), json!("1")],
            vec![json!("oops"), json!("2")],
            vec![json!("99")],
            vec![json!(98.5), json!("3")],
        ];
        let levels = levels_from_arrays("x", &raw);
        assert_eq!(
            levels,
            vec![
                PriceLevel::new(dec!(100), dec!(1)),
                PriceLevel::new(dec!(98.5), dec!(3)),
            ]
        );
    }

    #[test]
    fn test_timestamp() {
        let ts = timestamp_or_now(Some(&json!("1700000000")));
        assert_eq!(ts.timestamp(), 1_700_000_000);
    }
}
