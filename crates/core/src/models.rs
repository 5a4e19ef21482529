use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Currency Pair
// ---------------------------------------------------------------------------

/// Error returned when a symbol cannot be split into a base and quote currency.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid currency pair: {0:?}")]
pub struct InvalidPair(pub String);

/// Delimiters tried, in order, when parsing a pair without a known format.
const KNOWN_DELIMITERS: [&str; 4] = ["/", "-", "_", ":"];

/// An ordered (base, quote) pair of currency symbols.
///
/// Symbols are stored upper-case, so `btc/usd` and `BTC/USD` are the same pair.
/// Venue-specific spelling is produced by [`CurrencyPair::format`] and never
/// changes the pair's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyPair {
    base: String,
    quote: String,
}

impl CurrencyPair {
    pub fn new(base: impl AsRef<str>, quote: impl AsRef<str>) -> Self {
        Self {
            base: base.as_ref().trim().to_uppercase(),
            quote: quote.as_ref().trim().to_uppercase(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Parse a symbol written with a specific delimiter.
    ///
    /// An empty delimiter means the symbols are concatenated; the first three
    /// characters are then taken as the base currency.
    pub fn parse_with_delimiter(symbol: &str, delimiter: &str) -> Result<Self, InvalidPair> {
        let symbol = symbol.trim();
        let (base, quote) = if delimiter.is_empty() {
            if symbol.len() < 6 || !symbol.is_char_boundary(3) {
                return Err(InvalidPair(symbol.to_string()));
            }
            symbol.split_at(3)
        } else {
            symbol
                .split_once(delimiter)
                .ok_or_else(|| InvalidPair(symbol.to_string()))?
        };

        if base.is_empty() || quote.is_empty() {
            return Err(InvalidPair(symbol.to_string()));
        }
        Ok(Self::new(base, quote))
    }

    /// Project the pair into a venue's spelling.
    pub fn format(&self, format: &PairFormat) -> String {
        let joined = format!("{}{}{}", self.base, format.delimiter, self.quote);
        if format.uppercase {
            joined
        } else {
            joined.to_lowercase()
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for CurrencyPair {
    type Err = InvalidPair;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match KNOWN_DELIMITERS.iter().find(|d| s.contains(*d)) {
            Some(delimiter) => Self::parse_with_delimiter(s, delimiter),
            None => Self::parse_with_delimiter(s, ""),
        }
    }
}

impl TryFrom<String> for CurrencyPair {
    type Error = InvalidPair;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyPair> for String {
    fn from(pair: CurrencyPair) -> Self {
        pair.to_string()
    }
}

/// How a venue spells currency pairs on the wire or in config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairFormat {
    pub delimiter: String,
    pub uppercase: bool,
}

impl PairFormat {
    pub fn new(delimiter: impl Into<String>, uppercase: bool) -> Self {
        Self {
            delimiter: delimiter.into(),
            uppercase,
        }
    }
}

impl Default for PairFormat {
    fn default() -> Self {
        Self {
            delimiter: String::new(),
            uppercase: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Asset Type
// ---------------------------------------------------------------------------

/// The market kind a cache entry is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum AssetType {
    Spot,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Spot => "SPOT",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spot" => Ok(AssetType::Spot),
            other => Err(format!("Unknown asset type: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Market Data
// ---------------------------------------------------------------------------

/// Point-in-time summary for one pair on one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: CurrencyPair,
    pub last: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl Ticker {
    /// A zeroed ticker stamped with the current time.
    pub fn new(pair: CurrencyPair) -> Self {
        Self {
            pair,
            last: Decimal::ZERO,
            high: Decimal::ZERO,
            low: Decimal::ZERO,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            volume: Decimal::ZERO,
            last_updated: Utc::now(),
        }
    }

    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

/// One price level of an order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub amount: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, amount: Decimal) -> Self {
        Self { price, amount }
    }
}

/// Whole-book snapshot. Bids are expected best (highest) first and asks best
/// (lowest) first; levels are kept exactly in the order they were supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub exchange: String,
    pub pair: CurrencyPair,
    pub asset: AssetType,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub last_updated: DateTime<Utc>,
}

impl OrderBook {
    pub fn new(
        exchange: impl Into<String>,
        pair: CurrencyPair,
        asset: AssetType,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            pair,
            asset,
            bids,
            asks,
            last_updated: Utc::now(),
        }
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// True when the best bid is at or above the best ask. Such books are
    /// stored as received; callers decide what to do with them.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price >= ask.price,
            _ => false,
        }
    }

    /// Copy of the book limited to the top `levels` on each side.
    pub fn depth(&self, levels: usize) -> Self {
        Self {
            bids: self.bids.iter().take(levels).copied().collect(),
            asks: self.asks.iter().take(levels).copied().collect(),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Holdings of one exchange across its currencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub exchange: String,
    pub currencies: Vec<AccountCurrency>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCurrency {
    pub currency: String,
    pub total: Decimal,
    /// Amount reserved by open orders or pending withdrawals.
    pub hold: Decimal,
}

/// A deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundHistory {
    pub exchange: String,
    pub status: String,
    pub transfer_id: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub currency: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub transfer_type: String,
    pub crypto_to_address: Option<String>,
    pub crypto_from_address: Option<String>,
    pub crypto_tx_id: Option<String>,
    pub bank_to: Option<String>,
    pub bank_from: Option<String>,
}

/// A public trade print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeHistory {
    pub exchange: String,
    pub trade_id: String,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub amount: Decimal,
    pub side: Option<OrderSide>,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

/// Venue-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An order to submit to a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub pair: CurrencyPair,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: Decimal,
    pub price: Option<Decimal>,
    /// Caller-chosen identifier echoed back by venues that support it.
    pub client_id: String,
}

impl OrderRequest {
    pub fn market(pair: CurrencyPair, side: OrderSide, amount: Decimal) -> Self {
        Self {
            pair,
            side,
            order_type: OrderType::Market,
            amount,
            price: None,
            client_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn limit(pair: CurrencyPair, side: OrderSide, amount: Decimal, price: Decimal) -> Self {
        Self {
            pair,
            side,
            order_type: OrderType::Limit,
            amount,
            price: Some(price),
            client_id: Uuid::new_v4().to_string(),
        }
    }
}

/// Requested changes to a working order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyOrder {
    pub order_id: OrderId,
    pub price: Option<Decimal>,
    pub amount: Option<Decimal>,
    /// Set to convert a resting limit order to market.
    pub order_type: Option<OrderType>,
}

/// Venue view of a single order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub exchange: String,
    pub order_id: OrderId,
    pub pair: CurrencyPair,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub price: Decimal,
    pub amount: Decimal,
    pub open_volume: Decimal,
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// Transaction classification a fee is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeType {
    BankFee,
    InternationalBankDepositFee,
    InternationalBankWithdrawalFee,
    CryptocurrencyTradeFee,
    CryptocurrencyDepositFee,
    CryptocurrencyWithdrawalFee,
}

impl FromStr for FeeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank" | "bank_fee" => Ok(FeeType::BankFee),
            "bank_deposit" | "international_bank_deposit_fee" => {
                Ok(FeeType::InternationalBankDepositFee)
            }
            "bank_withdrawal" | "international_bank_withdrawal_fee" => {
                Ok(FeeType::InternationalBankWithdrawalFee)
            }
            "trade" | "cryptocurrency_trade_fee" => Ok(FeeType::CryptocurrencyTradeFee),
            "crypto_deposit" | "cryptocurrency_deposit_fee" => {
                Ok(FeeType::CryptocurrencyDepositFee)
            }
            "crypto_withdrawal" | "cryptocurrency_withdrawal_fee" => {
                Ok(FeeType::CryptocurrencyWithdrawalFee)
            }
            other => Err(format!("Unknown fee type: {}", other)),
        }
    }
}

/// International transfer method used for fiat deposits and withdrawals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankTransactionType {
    WireTransfer,
    PerfectMoney,
    Neteller,
    AdvCash,
    Payeer,
    Skrill,
    Simplex,
    Sepa,
    Swift,
    RapidTransfer,
    MisterTangoSepa,
    Qiwi,
    VisaMastercard,
    WebMoney,
    Capitalist,
    WesternUnion,
    MoneyGram,
    Contact,
}

/// Everything a venue needs to estimate a fee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBuilder {
    pub fee_type: FeeType,
    /// Traded pair, or the withdrawn/deposited currency as the base.
    pub pair: Option<CurrencyPair>,
    pub delimiter: String,
    pub is_maker: bool,
    /// Fiat currency for bank deposits and withdrawals.
    pub fiat_currency: Option<String>,
    pub bank_transaction_type: Option<BankTransactionType>,
    pub purchase_price: Decimal,
    pub amount: Decimal,
}

impl FeeBuilder {
    pub fn new(fee_type: FeeType) -> Self {
        Self {
            fee_type,
            pair: None,
            delimiter: String::new(),
            is_maker: false,
            fiat_currency: None,
            bank_transaction_type: None,
            purchase_price: Decimal::ZERO,
            amount: Decimal::ZERO,
        }
    }

    /// Fee for trading `amount` of `pair` at `price`.
    pub fn trade(pair: CurrencyPair, is_maker: bool, price: Decimal, amount: Decimal) -> Self {
        Self {
            pair: Some(pair),
            is_maker,
            purchase_price: price,
            amount,
            ..Self::new(FeeType::CryptocurrencyTradeFee)
        }
    }

    pub fn with_pair(mut self, pair: CurrencyPair) -> Self {
        self.pair = Some(pair);
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_fiat(mut self, currency: impl Into<String>) -> Self {
        self.fiat_currency = Some(currency.into());
        self
    }

    pub fn with_bank_transaction(mut self, kind: BankTransactionType) -> Self {
        self.bank_transaction_type = Some(kind);
        self
    }

    /// Price times amount.
    pub fn notional(&self) -> Decimal {
        self.purchase_price * self.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pair_identity_ignores_case_and_format() {
        let a = CurrencyPair::new("btc", "usd");
        let b: CurrencyPair = "BTC-USD".parse().unwrap();
        assert_eq!(a, b);

        let format = PairFormat::new("_", false);
        assert_eq!(a.format(&format), "btc_usd");
        assert_eq!(a, CurrencyPair::new("BTC", "USD"));
    }

    #[test]
    fn test_pair_parse() {
        assert_eq!(
            "ETHEUR".parse::<CurrencyPair>().unwrap(),
            CurrencyPair::new("ETH", "EUR")
        );
        assert_eq!(
            CurrencyPair::parse_with_delimiter("XRP/BTC", "/").unwrap(),
            CurrencyPair::new("XRP", "BTC")
        );
        assert!("BTC".parse::<CurrencyPair>().is_err());
        assert!("BTC/".parse::<CurrencyPair>().is_err());
    }

    #[test]
    fn test_pair_serde_as_string() {
        let pair = CurrencyPair::new("BTC", "USD");
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, "\"BTC/USD\"");
        let back: CurrencyPair = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pair);
    }

    #[test]
    fn test_order_book_helpers() {
        let book = OrderBook::new(
            "Bitstamp",
            CurrencyPair::new("BTC", "USD"),
            AssetType::Spot,
            vec![
                PriceLevel::new(dec!(100), dec!(1)),
                PriceLevel::new(dec!(99), dec!(2)),
            ],
            vec![
                PriceLevel::new(dec!(101), dec!(1)),
                PriceLevel::new(dec!(102), dec!(2)),
            ],
        );
        assert_eq!(book.best_bid().unwrap().price, dec!(100));
        assert_eq!(book.best_ask().unwrap().price, dec!(101));
        assert!(!book.is_crossed());
        assert_eq!(book.depth(1).bids.len(), 1);
        assert_eq!(book.depth(1).asks[0].price, dec!(101));
    }

    #[test]
    fn test_crossed_book_is_reported_not_rejected() {
        let book = OrderBook::new(
            "Gemini",
            CurrencyPair::new("ETH", "USD"),
            AssetType::Spot,
            vec![PriceLevel::new(dec!(105), dec!(1))],
            vec![PriceLevel::new(dec!(101), dec!(1))],
        );
        assert!(book.is_crossed());
        assert_eq!(book.bids.len(), 1);
    }

    #[test]
    fn test_fee_builder_notional() {
        let fee = FeeBuilder::trade(CurrencyPair::new("BTC", "USD"), true, dec!(20000), dec!(0.5));
        assert_eq!(fee.fee_type, FeeType::CryptocurrencyTradeFee);
        assert_eq!(fee.notional(), dec!(10000));
        assert_eq!("trade".parse::<FeeType>().unwrap(), FeeType::CryptocurrencyTradeFee);
    }
}
