use crate::base::ExchangeBase;
use crate::websocket::WebsocketHandle;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use std::sync::Arc;
use xchg_core::*;

/// Future that fetches one snapshot from the venue. Owned, so it can outlive
/// the caller that started it.
pub type SnapshotFetch<T> = BoxFuture<'static, Result<T>>;

// ---------------------------------------------------------------------------
// Exchange Trait
// ---------------------------------------------------------------------------

/// Common interface every venue driver implements.
///
/// Market data goes through the shared [`MarketData`](xchg_market::MarketData)
/// stores, so concurrent callers asking for the same key share one upstream
/// call. Account, order and funds operations default to
/// [`ExchangeError::Unimplemented`]; callers treat that as an ordinary answer.
#[async_trait]
pub trait Exchange: Send + Sync {
    fn base(&self) -> &ExchangeBase;

    fn base_mut(&mut self) -> &mut ExchangeBase;

    fn name(&self) -> &str {
        &self.base().name
    }

    fn is_enabled(&self) -> bool {
        self.base().enabled
    }

    // ---- Lifecycle ----

    /// Reset the base to the venue's defaults.
    fn configure_defaults(&mut self);

    fn apply_config(&mut self, config: &ExchangeConfig) -> Result<()> {
        self.base_mut().apply_config(config)
    }

    /// One housekeeping pass (pair list refresh and the like).
    async fn run(&self) -> Result<()>;

    // ---- Market data ----

    /// Build the upstream ticker fetch for `pair`.
    fn ticker_request(&self, pair: &CurrencyPair, asset: AssetType) -> SnapshotFetch<Ticker>;

    /// Build the upstream order book fetch for `pair`.
    fn order_book_request(&self, pair: &CurrencyPair, asset: AssetType)
        -> SnapshotFetch<OrderBook>;

    /// Cached ticker, fetched on a miss.
    async fn fetch_ticker(&self, pair: &CurrencyPair, asset: AssetType) -> Result<Arc<Ticker>> {
        self.check_rest(asset)?;
        let key = self.base().market_key(pair, asset);
        self.base()
            .market()
            .tickers
            .get_or_refresh(key, || self.ticker_request(pair, asset))
            .await
    }

    /// Fetch a fresh ticker and store it.
    async fn refresh_ticker(&self, pair: &CurrencyPair, asset: AssetType) -> Result<Arc<Ticker>> {
        self.check_rest(asset)?;
        let key = self.base().market_key(pair, asset);
        self.base()
            .market()
            .tickers
            .refresh(key, || self.ticker_request(pair, asset))
            .await
    }

    /// Cached order book, fetched on a miss.
    async fn fetch_order_book(
        &self,
        pair: &CurrencyPair,
        asset: AssetType,
    ) -> Result<Arc<OrderBook>> {
        self.check_rest(asset)?;
        let key = self.base().market_key(pair, asset);
        self.base()
            .market()
            .order_books
            .get_or_refresh(key, || self.order_book_request(pair, asset))
            .await
    }

    /// Fetch a fresh order book and store it.
    async fn refresh_order_book(
        &self,
        pair: &CurrencyPair,
        asset: AssetType,
    ) -> Result<Arc<OrderBook>> {
        self.check_rest(asset)?;
        let key = self.base().market_key(pair, asset);
        self.base()
            .market()
            .order_books
            .refresh(key, || self.order_book_request(pair, asset))
            .await
    }

    fn check_rest(&self, asset: AssetType) -> Result<()> {
        let base = self.base();
        if !base.supports.rest {
            return Err(ExchangeError::unsupported(format!(
                "{} has no REST API",
                base.name
            )));
        }
        base.check_asset(asset)
    }

    // ---- Account ----

    async fn account_balances(&self) -> Result<AccountInfo> {
        Err(ExchangeError::unimplemented("account_balances"))
    }

    async fn funding_history(&self) -> Result<Vec<FundHistory>> {
        Err(ExchangeError::unimplemented("funding_history"))
    }

    async fn trade_history(
        &self,
        _pair: &CurrencyPair,
        _asset: AssetType,
    ) -> Result<Vec<TradeHistory>> {
        Err(ExchangeError::unimplemented("trade_history"))
    }

    // ---- Orders ----

    async fn submit_order(&self, _order: &OrderRequest) -> Result<OrderId> {
        Err(ExchangeError::unimplemented("submit_order"))
    }

    async fn modify_order(&self, _action: &ModifyOrder) -> Result<OrderId> {
        Err(ExchangeError::unimplemented("modify_order"))
    }

    async fn cancel_order(&self, _order_id: &OrderId) -> Result<()> {
        Err(ExchangeError::unimplemented("cancel_order"))
    }

    async fn cancel_all_orders(&self) -> Result<()> {
        Err(ExchangeError::unimplemented("cancel_all_orders"))
    }

    async fn order_status(&self, _order_id: &OrderId) -> Result<OrderDetail> {
        Err(ExchangeError::unimplemented("order_status"))
    }

    // ---- Funds ----

    async fn deposit_address(&self, _currency: &str) -> Result<String> {
        Err(ExchangeError::unimplemented("deposit_address"))
    }

    async fn withdraw_crypto(
        &self,
        _address: &str,
        _currency: &str,
        _amount: Decimal,
    ) -> Result<String> {
        Err(ExchangeError::unimplemented("withdraw_crypto"))
    }

    async fn withdraw_fiat(&self, _currency: &str, _amount: Decimal) -> Result<String> {
        Err(ExchangeError::unimplemented("withdraw_fiat"))
    }

    async fn withdraw_fiat_to_bank(&self, _currency: &str, _amount: Decimal) -> Result<String> {
        Err(ExchangeError::unimplemented("withdraw_fiat_to_bank"))
    }

    // ---- Introspection ----

    fn fee_estimate(&self, _fee: &FeeBuilder) -> Result<Decimal> {
        Err(ExchangeError::unimplemented("fee_estimate"))
    }

    fn withdrawal_capabilities(&self) -> WithdrawPermissions {
        self.base().withdraw_permissions
    }

    fn websocket(&self) -> Result<Arc<WebsocketHandle>> {
        self.base().websocket_handle()
    }

    /// Frames sent right after the websocket connects.
    fn subscriptions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Called by the runner for every text frame the websocket delivers.
    fn on_websocket_frame(&self, frame: &str) {
        tracing::debug!(exchange = %self.name(), frame, "Websocket frame");
    }
}
