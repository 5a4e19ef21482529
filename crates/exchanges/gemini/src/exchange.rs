use crate::client::GeminiClient;
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

pub const NAME: &str = "Gemini";
pub const API_URL: &str = "https://api.gemini.com";
pub const SANDBOX_URL: &str = "https://api.sandbox.gemini.com";

const RATE_WINDOW: Duration = Duration::from_secs(60);
const AUTH_RATE: u32 = 600;
const UNAUTH_RATE: u32 = 120;

/// Gemini driver. REST only.
pub struct Gemini {
    base: ExchangeBase,
}

impl Gemini {
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

    fn client(&self) -> GeminiClient {
        GeminiClient::from_base(&self.base)
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
impl Exchange for Gemini {
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
        base.withdraw_permissions = WithdrawCapability::AutoWithdrawCryptoWithApiPermission
            | WithdrawCapability::AutoWithdrawCryptoWithSetup
            | WithdrawCapability::WithdrawFiatViaWebsiteOnly;
        base.fees = FeeSchedule {
            maker: dec!(0.001),
            taker: dec!(0.0035),
            flat: Decimal::ZERO,
        };
        base.request_format = PairFormat::new("", false);
        base.config_format = PairFormat::new("", true);
        base.asset_types = vec![AssetType::Spot];
        base.supports = FeatureFlags {
            rest: true,
            websocket: false,
            auto_pair_updates: true,
        };
        base.features = EnabledFeatures {
            websocket: false,
            auto_pair_updates: true,
        };
        base.set_default_url(API_URL);
        base.validator = CredentialValidator::default();
        base.websocket = None;
    }

    /// Sandbox applies only while the endpoint is still the production default.
    fn apply_config(&mut self, config: &ExchangeConfig) -> Result<()> {
        self.base.apply_config(config)?;
        if self.base.use_sandbox && self.base.api_url == self.base.api_url_default {
            self.base.api_url = SANDBOX_URL.to_string();
            info!(exchange = %self.base.name, url = SANDBOX_URL, "Using sandbox endpoint");
        }
        Ok(())
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
        if !base.features.auto_pair_updates {
            return Ok(());
        }

        let available: Vec<CurrencyPair> = self
            .client()
            .symbols()
            .await?
            .iter()
            .filter_map(|symbol| CurrencyPair::parse_with_delimiter(symbol, "").ok())
            .collect();
        base.update_pairs(available, false);
        Ok(())
    }

    fn ticker_request(&self, pair: &CurrencyPair, _asset: AssetType) -> SnapshotFetch<Ticker> {
        let client = self.client();
        let symbol = self.base.format_pair(pair);
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
        let symbol = self.base.format_pair(pair);
        let pair = pair.clone();
        async move {
            let raw = client.order_book(&symbol).await?;
            Ok(protocol::order_book(NAME, pair, asset, &raw))
        }
        .boxed()
    }

    async fn account_balances(&self) -> Result<AccountInfo> {
        self.base.require_authenticated("account_balances")?;
        let raw = self.client().balances().await?;
        Ok(protocol::account(NAME, &raw))
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
            FeeType::BankFee => Err(ExchangeError::unsupported("Gemini bank fee")),
            _ => Ok(Decimal::ZERO),
        }
    }
}
