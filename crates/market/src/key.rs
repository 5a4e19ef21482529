use serde::{Deserialize, Serialize};
use std::fmt;
use xchg_core::{AssetType, CurrencyPair};

/// Identity of one snapshot: (exchange, pair, asset type).
///
/// Exchange names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketKey {
    exchange: String,
    pair: CurrencyPair,
    asset: AssetType,
}

impl MarketKey {
    pub fn new(exchange: &str, pair: CurrencyPair, asset: AssetType) -> Self {
        Self {
            exchange: exchange.trim().to_lowercase(),
            pair,
            asset,
        }
    }

    pub fn spot(exchange: &str, pair: CurrencyPair) -> Self {
        Self::new(exchange, pair, AssetType::Spot)
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    pub fn asset(&self) -> AssetType {
        self.asset
    }

    pub fn is_exchange(&self, exchange: &str) -> bool {
        self.exchange.eq_ignore_ascii_case(exchange.trim())
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.exchange, self.pair, self.asset)
    }
}
