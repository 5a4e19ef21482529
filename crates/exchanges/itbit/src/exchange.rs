use crate::client::ItBitClient;
use crate::protocol;
use async_trait::async_trait;
use futures_util::FutureExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use xchg_core::*;
use xchg_exchanges_common::{Exchange, ExchangeBase, FeeSchedule, SnapshotFetch};
use xchg_market::MarketData;
use xchg_request::{HttpTransport, RateLimit, Requester, RequesterConfig};

pub const NAME: &str = "ITBIT";
pub const API_URL: &str = "https://api.itbit.com/v1";

const RATE_WINDOW: Duration = Duration::from_secs(1);
const AUTH_RATE: u32 = 10;
const UNAUTH_RATE: u32 = 10;

/// ItBit driver. REST market data only; the venue offers no pair listing, so
/// the configured pairs are used as they are.
pub struct ItBit {
    base: ExchangeBase,
}

impl ItBit {
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

    fn client(&self) -> ItBitClient {
        ItBitClient::from_base(&self.base)
    }

    fn wire_symbol(&self, pair: &CurrencyPair) -> String {
        let wire = CurrencyPair::new(
            protocol::wire_currency(pair.base()),
            protocol::wire_currency(pair.quote()),
        );
        self.base.format_pair(&wire)
    }
}

fn requester() -> Requester {
    Requester::new(
        NAME,
        RateLimit::new(RATE_WINDOW, AUTH_RATE),
        RateLimit::new(RATE_WINDOW, UNAUTH_RATE),
        RequesterConfig::default(),
    )
}

#[async_trait]
impl Exchange for ItBit {
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
        base.withdraw_permissions = WithdrawCapability::WithdrawCryptoViaWebsiteOnly
            | WithdrawCapability::WithdrawFiatViaWebsiteOnly;
        // Maker orders earn a rebate.
        base.fees = FeeSchedule {
            maker: dec!(-0.001),
            taker: dec!(0.005),
            flat: Decimal::ZERO,
        };
        base.request_format = PairFormat::new("", true);
        base.config_format = PairFormat::new("", true);
        base.asset_types = vec![AssetType::Spot];
        base.supports = FeatureFlags {
            rest: true,
            websocket: false,
            auto_pair_updates: false,
        };
        base.features = EnabledFeatures {
            websocket: false,
            auto_pair_updates: true,
        };
        base.set_default_url(API_URL);
        base.validator = CredentialValidator {
            requires_client_id: true,
            ..CredentialValidator::default()
        };
        base.websocket = None;
    }

    async fn run(&self) -> Result<()> {
        let base = &self.base;
        if base.verbose {
            let enabled = base.enabled_pairs();
            info!(
                exchange = %base.name,
                count = enabled.len(),
                pairs = ?enabled,
                "Enabled pairs"
            );
        }
        Ok(())
    }

    fn ticker_request(&self, pair: &CurrencyPair, _asset: AssetType) -> SnapshotFetch<Ticker> {
        let client = self.client();
        let symbol = self.wire_symbol(pair);
        let pair = pair.clone();
        async move {
            let raw = client.ticker(&symbol).await?;
            Ok(protocol::ticker(NAME, pair, &raw))
        }
        .boxed()
    }

    fn order_book_request(
        &self,
        pair: &CurrencyPair,
        asset: AssetType,
    ) -> SnapshotFetch<OrderBook> {
        let client = self.client();
        let symbol = self.wire_symbol(pair);
        let pair = pair.clone();
        async move {
            let raw = client.order_book(&symbol).await?;
            Ok(protocol::order_book(NAME, pair, asset, &raw))
        }
        .boxed()
    }

    async fn funding_history(&self) -> Result<Vec<FundHistory>> {
        Err(ExchangeError::unsupported("ItBit does not expose funding history"))
    }

    fn fee_estimate(&self, fee: &FeeBuilder) -> Result<Decimal> {
        match fee.fee_type {
            FeeType::CryptocurrencyTradeFee => {
                let rate = if fee.is_maker {
                    self.base.fees.maker
                } else {
                    self.base.fees.taker
                };
                Ok(fee.notional() * rate)
            }
            FeeType::BankFee => Err(ExchangeError::unsupported("ItBit bank fee")),
            _ => Ok(Decimal::ZERO),
        }
    }
}
