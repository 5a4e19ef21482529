use crate::client::BitstampClient;
use crate::protocol;
use async_trait::async_trait;
use futures_util::FutureExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use xchg_core::*;
use xchg_exchanges_common::{
    Exchange, ExchangeBase, FeeSchedule, SnapshotFetch, WebsocketHandle,
};
use xchg_market::MarketData;
use xchg_request::{HttpTransport, RateLimit, Requester, RequesterConfig};

pub const NAME: &str = "Bitstamp";
pub const API_URL: &str = "https://www.bitstamp.net/api";
pub const WEBSOCKET_URL: &str = "wss://ws.bitstamp.net";

const RATE_WINDOW: Duration = Duration::from_secs(10 * 60);
const AUTH_RATE: u32 = 600;
const UNAUTH_RATE: u32 = 600;

/// Bitstamp driver.
pub struct Bitstamp {
    base: ExchangeBase,
}

impl Bitstamp {
    pub fn new(market: Arc<MarketData>) -> Self {
        Self::from_requester(market, requester())
    }

    /// Build with a custom HTTP transport (offline tests, proxies).
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

    fn client(&self) -> BitstampClient {
        BitstampClient::from_base(&self.base)
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

/// Flat crypto withdrawal fees, in units of the withdrawn currency.
fn crypto_withdrawal_fee(currency: &str) -> Option<Decimal> {
    match currency {
        "BTC" => Some(dec!(0.0005)),
        "BCH" => Some(dec!(0.0001)),
        "ETH" => Some(dec!(0.001)),
        "LTC" => Some(dec!(0.001)),
        "XRP" => Some(dec!(0.02)),
        _ => None,
    }
}

/// Percentage with a floor, both in the fiat currency.
fn bank_fee(amount: Decimal, rate: Decimal, minimum: Decimal) -> Decimal {
    (amount * rate).max(minimum)
}

#[async_trait]
impl Exchange for Bitstamp {
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
        base.withdraw_permissions =
            WithdrawCapability::AutoWithdrawCrypto | WithdrawCapability::AutoWithdrawFiat;
        base.fees = FeeSchedule {
            maker: dec!(0.0025),
            taker: dec!(0.0025),
            flat: Decimal::ZERO,
        };
        base.request_format = PairFormat::new("", false);
        base.config_format = PairFormat::new("", true);
        base.asset_types = vec![AssetType::Spot];
        base.supports = FeatureFlags {
            rest: true,
            websocket: true,
            auto_pair_updates: true,
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
        base.websocket = Some(Arc::new(WebsocketHandle::new(NAME, WEBSOCKET_URL)));
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
        if !base.features.auto_pair_updates {
            return Ok(());
        }

        let pairs = self.client().trading_pairs().await?;
        let available: Vec<CurrencyPair> = pairs
            .iter()
            .filter(|info| info.is_trading())
            .filter_map(|info| CurrencyPair::parse_with_delimiter(&info.name, "/").ok())
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
        let raw = self.client().balance().await?;
        Ok(protocol::account(NAME, &raw))
    }

    async fn funding_history(&self) -> Result<Vec<FundHistory>> {
        Err(ExchangeError::unsupported("Bitstamp does not expose funding history"))
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
            FeeType::CryptocurrencyDepositFee => Ok(Decimal::ZERO),
            FeeType::CryptocurrencyWithdrawalFee => {
                let currency = fee
                    .pair
                    .as_ref()
                    .map(|pair| pair.base().to_string())
                    .ok_or_else(|| {
                        ExchangeError::InvalidConfig("withdrawal fee needs a currency".to_string())
                    })?;
                crypto_withdrawal_fee(&currency).ok_or_else(|| {
                    ExchangeError::unsupported(format!("No Bitstamp withdrawal fee for {}", currency))
                })
            }
            FeeType::InternationalBankDepositFee => {
                Ok(bank_fee(fee.amount, dec!(0.0005), dec!(7.5)))
            }
            FeeType::InternationalBankWithdrawalFee => {
                Ok(bank_fee(fee.amount, dec!(0.0009), dec!(15)))
            }
            FeeType::BankFee => Err(ExchangeError::unsupported("Bitstamp bank fee")),
        }
    }

    /// Websocket subscription frames for the live trade channel of every
    /// enabled pair.
    fn subscriptions(&self) -> Vec<String> {
        self.base
            .enabled_pairs()
            .iter()
            .map(|pair| {
                serde_json::json!({
                    "event": "bts:subscribe",
                    "data": { "channel": format!("live_trades_{}", self.base.format_pair(pair)) }
                })
                .to_string()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xchg_request::CannedTransport;

    const TICKER: &str = r#"{"high":"30000.00","last":"29500.50","timestamp":"1700000000","bid":"29500.00","vwap":"29700","volume":"1234.5","low":"29000","ask":"29501.00","open":"29400"}"#;
    const BOOK: &str = r#"{"timestamp":"1700000000","bids":[["29500.00","1.5"],["29499.00","2"]],"asks":[["29501.00","0.5"],["29502.00","3"]]}"#;
    const PAIRS: &str = r#"[{"name":"BTC/USD","url_symbol":"btcusd","trading":"Enabled"},{"name":"ETH/EUR","url_symbol":"etheur","trading":"Enabled"},{"name":"XRP/USD","url_symbol":"xrpusd","trading":"Disabled"}]"#;

    fn driver(transport: Arc<CannedTransport>) -> Bitstamp {
        let mut driver = Bitstamp::with_transport(MarketData::shared(), transport);
        let config = Config::from_toml_str(
            r#"
[[exchanges]]
name = "Bitstamp"
enabled_pairs = ["BTCUSD"]

[exchanges.api]
authenticated_support = true

[exchanges.api.credentials]
key = "key"
secret = "secret"
client_id = "client"

[exchanges.features.enabled]
auto_pair_updates = true
"#,
        )
        .unwrap();
        driver.apply_config(&config.exchanges[0]).unwrap();
        driver
    }

    fn btc_usd() -> CurrencyPair {
        CurrencyPair::new("BTC", "USD")
    }

    #[tokio::test]
    async fn test_fetch_ticker_hits_upstream_once() {
        let transport = Arc::new(CannedTransport::new().with_route("/v2/ticker/btcusd/", 200, TICKER));
        let driver = driver(transport.clone());

        let first = driver.fetch_ticker(&btc_usd(), AssetType::Spot).await.unwrap();
        assert_eq!(first.bid, dec!(29500.00));
        assert_eq!(first.ask, dec!(29501.00));

        let second = driver.fetch_ticker(&btc_usd(), AssetType::Spot).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_order_book_is_cached_in_shared_market() {
        let transport = Arc::new(CannedTransport::new().with_route("/v2/order_book/btcusd/", 200, BOOK));
        let driver = driver(transport);

        let book = driver.refresh_order_book(&btc_usd(), AssetType::Spot).await.unwrap();
        assert_eq!(book.bids[0].price, dec!(29500.00));
        assert_eq!(book.asks[1].amount, dec!(3));

        let key = driver.base().market_key(&btc_usd(), AssetType::Spot);
        assert!(driver.base().market().order_books.get(&key).is_ok());
    }

    #[tokio::test]
    async fn test_upstream_failure_surfaces_and_does_not_poison() {
        let transport = Arc::new(CannedTransport::new().with_route("/v2/ticker/btcusd/", 500, "boom"));
        let driver = driver(transport.clone());

        let err = driver.fetch_ticker(&btc_usd(), AssetType::Spot).await.unwrap_err();
        assert!(err.is_retryable());

        transport.route("/v2/ticker/btcusd/", xchg_request::HttpResponse::ok(TICKER));
        let ticker = driver.fetch_ticker(&btc_usd(), AssetType::Spot).await.unwrap();
        assert_eq!(ticker.last, dec!(29500.50));
    }

    #[tokio::test]
    async fn test_run_updates_available_pairs() {
        let transport = Arc::new(CannedTransport::new().with_route("/v2/trading-pairs-info/", 200, PAIRS));
        let driver = driver(transport);

        driver.run().await.unwrap();
        assert_eq!(
            driver.base().available_pairs(),
            vec![CurrencyPair::new("BTC", "USD"), CurrencyPair::new("ETH", "EUR")]
        );
    }

    #[tokio::test]
    async fn test_balances_are_signed() {
        let transport = Arc::new(CannedTransport::new().with_route(
            "/v2/balance/",
            200,
            r#"{"usd_available":"10","usd_reserved":"1","btc_available":"0.1","btc_reserved":"0"}"#,
        ));
        let driver = driver(transport.clone());

        let account = driver.account_balances().await.unwrap();
        assert_eq!(account.currencies.len(), 2);

        let request = &transport.requests()[0];
        let body = request.body.clone().unwrap_or_default();
        assert!(body.contains("key=key"));
        assert!(body.contains("signature="));
        assert!(body.contains("nonce="));
    }

    #[tokio::test]
    async fn test_balances_without_client_id_refused() {
        let transport = Arc::new(CannedTransport::new());
        let mut driver = Bitstamp::with_transport(MarketData::shared(), transport.clone());
        let config = Config::from_toml_str(
            "[[exchanges]]\nname = \"Bitstamp\"\n[exchanges.api]\nauthenticated_support = true\n[exchanges.api.credentials]\nkey = \"k\"\nsecret = \"s\"",
        )
        .unwrap();
        driver.apply_config(&config.exchanges[0]).unwrap();

        assert!(driver.account_balances().await.is_err());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_unbacked_operations() {
        let driver = driver(Arc::new(CannedTransport::new()));
        assert!(matches!(
            driver.funding_history().await,
            Err(ExchangeError::Unsupported(_))
        ));
        assert_eq!(
            driver.trade_history(&btc_usd(), AssetType::Spot).await.unwrap_err(),
            ExchangeError::unimplemented("trade_history")
        );
        assert!(driver.websocket().is_ok());
        assert_eq!(
            driver.withdrawal_capabilities().format(),
            "AUTO WITHDRAW CRYPTO & AUTO WITHDRAW FIAT"
        );
    }

    #[test]
    fn test_fee_estimates() {
        let driver = driver(Arc::new(CannedTransport::new()));

        let trade = FeeBuilder::trade(btc_usd(), false, dec!(20000), dec!(1));
        assert_eq!(driver.fee_estimate(&trade).unwrap(), dec!(50));

        let withdrawal =
            FeeBuilder::new(FeeType::CryptocurrencyWithdrawalFee).with_pair(btc_usd());
        assert_eq!(driver.fee_estimate(&withdrawal).unwrap(), dec!(0.0005));

        let small_deposit = FeeBuilder::new(FeeType::InternationalBankDepositFee)
            .with_fiat("USD")
            .with_amount(dec!(100));
        assert_eq!(driver.fee_estimate(&small_deposit).unwrap(), dec!(7.5));

        let large_withdrawal = FeeBuilder::new(FeeType::InternationalBankWithdrawalFee)
            .with_amount(dec!(100000));
        assert_eq!(driver.fee_estimate(&large_withdrawal).unwrap(), dec!(90));

        assert!(driver
            .fee_estimate(&FeeBuilder::new(FeeType::BankFee))
            .unwrap_err()
            .is_permanent());
    }

    #[test]
    fn test_subscriptions_use_wire_symbols() {
        let driver = driver(Arc::new(CannedTransport::new()));
        let subs = driver.subscriptions();
        assert_eq!(subs.len(), 1);
        assert!(subs[0].contains("live_trades_btcusd"));
    }
}
