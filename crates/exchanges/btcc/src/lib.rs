//! BTCC driver.
//!
//! The venue retired its REST API; market data is websocket only and every
//! REST-backed operation answers `Unsupported`.

use async_trait::async_trait;
use futures_util::FutureExt;
use std::sync::Arc;
use tracing::{info, warn};
use xchg_core::*;
use xchg_exchanges_common::{Exchange, ExchangeBase, SnapshotFetch, WebsocketHandle};
use xchg_market::MarketData;
use xchg_request::{HttpTransport, RateLimit, Requester, RequesterConfig};

pub const NAME: &str = "BTCC";
pub const WEBSOCKET_URL: &str = "wss://ws.btcc.com";

/// The only market left after the CNY books closed.
const SUPPORTED_PAIR: &str = "BTCUSD";
const RETIRED_CURRENCY: &str = "CNY";

pub struct Btcc {
    base: ExchangeBase,
}

impl Btcc {
    pub fn new(market: Arc<MarketData>) -> Self {
        Self::from_requester(market, requester())
    }

    pub fn with_transport(market: Arc<MarketData>, transport: Arc<dyn HttpTransport>) -> Self {
        Self::from_requester(market, requester().with_transport(transport))
    }

    fn from_requester(market: Arc<MarketData>, requester: Requester) -> Self {
        let mut exchange = Self {
            base: ExchangeBase::new(NAME, requester, market),
        };
        exchange.configure_defaults();
        exchange
    }

    /// Move any CNY configuration onto BTCUSD. Returns whether anything changed.
    fn migrate_retired_pairs(&self) -> Result<bool> {
        let base = &self.base;
        let mentions_cny = |pairs: Vec<CurrencyPair>| {
            pairs
                .iter()
                .any(|p| p.base() == RETIRED_CURRENCY || p.quote() == RETIRED_CURRENCY)
        };
        let stale = mentions_cny(base.enabled_pairs())
            || mentions_cny(base.available_pairs())
            || base.base_currencies.iter().any(|c| c == RETIRED_CURRENCY);
        if !stale {
            return Ok(false);
        }

        warn!(
            exchange = %base.name,
            "BTCC only supports BTCUSD now, upgrading available and enabled pairs to BTCUSD"
        );
        let pair = CurrencyPair::parse_with_delimiter(SUPPORTED_PAIR, "")
            .map_err(|e| ExchangeError::Internal(e.to_string()))?;
        base.update_pairs(vec![pair.clone()], false);
        base.update_pairs(vec![pair], true);
        Ok(true)
    }

    fn rest_unsupported() -> ExchangeError {
        ExchangeError::unsupported("BTCC REST API")
    }
}

fn requester() -> Requester {
    Requester::new(
        NAME,
        RateLimit::unlimited(),
        RateLimit::unlimited(),
        RequesterConfig::default(),
    )
}

#[async_trait]
impl Exchange for Btcc {
    fn base(&self) -> &ExchangeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExchangeBase {
        &mut self.base
    }

    fn configure_defaults(&mut self) {
        let base = &mut self.base;
        base.name = NAME.to_string();
        base.enabled = false;
        base.verbose = false;
        base.withdraw_permissions = WithdrawPermissions::NONE;
        base.request_format = PairFormat::new("", true);
        base.config_format = PairFormat::new("", true);
        base.asset_types = vec![AssetType::Spot];
        base.base_currencies = vec!["USD".to_string()];
        base.supports = FeatureFlags {
            rest: false,
            websocket: true,
            auto_pair_updates: true,
        };
        base.features = EnabledFeatures {
            websocket: false,
            auto_pair_updates: true,
        };
        base.websocket = Some(Arc::new(WebsocketHandle::new(NAME, WEBSOCKET_URL)));
    }

    fn apply_config(&mut self, config: &ExchangeConfig) -> Result<()> {
        self.base.apply_config(config)?;
        if self.migrate_retired_pairs()? {
            self.base.base_currencies = vec!["USD".to_string()];
        }
        Ok(())
    }

    async fn run(&self) -> Result<()> {
        let base = &self.base;
        if base.verbose {
            let websocket = base.websocket.as_ref().map(|ws| ws.is_enabled()).unwrap_or(false);
            let enabled = base.enabled_pairs();
            info!(
                exchange = %base.name,
                websocket,
                count = enabled.len(),
                pairs = ?enabled,
                "Enabled pairs"
            );
        }
        self.migrate_retired_pairs()?;
        Ok(())
    }

    fn ticker_request(&self, _pair: &CurrencyPair, _asset: AssetType) -> SnapshotFetch<Ticker> {
        async { Err(Self::rest_unsupported()) }.boxed()
    }

    fn order_book_request(
        &self,
        _pair: &CurrencyPair,
        _asset: AssetType,
    ) -> SnapshotFetch<OrderBook> {
        async { Err(Self::rest_unsupported()) }.boxed()
    }

    async fn account_balances(&self) -> Result<AccountInfo> {
        Err(Self::rest_unsupported())
    }

    async fn funding_history(&self) -> Result<Vec<FundHistory>> {
        Err(Self::rest_unsupported())
    }

    async fn trade_history(
        &self,
        _pair: &CurrencyPair,
        _asset: AssetType,
    ) -> Result<Vec<TradeHistory>> {
        Err(Self::rest_unsupported())
    }
}
