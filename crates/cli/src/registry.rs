//! Driver construction by exchange name.

use anyhow::{bail, Result};
use std::sync::Arc;
use xchg_core::{Config, ExchangeConfig};
use xchg_exchanges_bitstamp::Bitstamp;
use xchg_exchanges_btcc::Btcc;
use xchg_exchanges_common::Exchange;
use xchg_exchanges_gemini::Gemini;
use xchg_exchanges_itbit::ItBit;
use xchg_market::MarketData;

/// Names accepted by [`build`].
pub const KNOWN_EXCHANGES: [&str; 4] = ["Bitstamp", "BTCC", "Gemini", "ITBIT"];

/// Build a driver with its defaults, without applying any config.
pub fn build(name: &str, market: Arc<MarketData>) -> Result<Box<dyn Exchange>> {
    let driver: Box<dyn Exchange> = match name.to_ascii_lowercase().as_str() {
        "bitstamp" => Box::new(Bitstamp::new(market)),
        "btcc" => Box::new(Btcc::new(market)),
        "gemini" => Box::new(Gemini::new(market)),
        "itbit" => Box::new(ItBit::new(market)),
        _ => bail!(
            "Unknown exchange: {} (known: {})",
            name,
            KNOWN_EXCHANGES.join(", ")
        ),
    };
    Ok(driver)
}

/// Build a driver and apply its config section. Without a section the
/// driver is enabled with its defaults.
pub fn configured(
    name: &str,
    config: &Config,
    market: Arc<MarketData>,
) -> Result<Box<dyn Exchange>> {
    let mut driver = build(name, market)?;
    let section = config.exchange(name).cloned().unwrap_or_else(|| ExchangeConfig {
        name: driver.name().to_string(),
        ..ExchangeConfig::default()
    });
    driver.apply_config(&section)?;
    Ok(driver)
}

/// Every driver named in the config, configured.
pub fn from_config(config: &Config, market: Arc<MarketData>) -> Result<Vec<Box<dyn Exchange>>> {
    config
        .exchanges
        .iter()
        .map(|section| {
            let mut driver = build(&section.name, market.clone())?;
            driver.apply_config(section)?;
            Ok(driver)
        })
        .collect()
}
