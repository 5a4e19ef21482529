use crate::nonce::Nonce;
use crate::websocket::WebsocketHandle;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use xchg_core::{
    AssetType, CredentialValidator, Credentials, CurrencyPair, EnabledFeatures, ExchangeConfig,
    ExchangeError, FeatureFlags, PairFormat, Result, WithdrawPermissions,
};
use xchg_market::{MarketData, MarketKey};
use xchg_request::Requester;

// ---------------------------------------------------------------------------
// Fee schedule
// ---------------------------------------------------------------------------

/// Headline fee numbers; rates are fractions (0.0025 = 0.25%).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeSchedule {
    pub maker: Decimal,
    pub taker: Decimal,
    pub flat: Decimal,
}

// ---------------------------------------------------------------------------
// Pairs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct PairSets {
    available: Vec<CurrencyPair>,
    enabled: Vec<CurrencyPair>,
}

/// Result of a pair list replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairDiff {
    pub added: Vec<CurrencyPair>,
    pub removed: Vec<CurrencyPair>,
}

impl PairDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Exchange base
// ---------------------------------------------------------------------------

/// State every driver is built on.
///
/// Fields are set by the driver's defaults and then by [`apply_config`];
/// pair lists stay mutable afterwards so housekeeping can refresh them while
/// the driver is shared.
///
/// [`apply_config`]: ExchangeBase::apply_config
#[derive(Debug)]
pub struct ExchangeBase {
    pub name: String,
    pub enabled: bool,
    pub verbose: bool,
    pub withdraw_permissions: WithdrawPermissions,
    pub fees: FeeSchedule,
    pub base_currencies: Vec<String>,
    pub asset_types: Vec<AssetType>,
    pub supports: FeatureFlags,
    pub features: EnabledFeatures,
    pub request_format: PairFormat,
    pub config_format: PairFormat,
    pub api_url_default: String,
    pub api_url: String,
    pub api_url_secondary: Option<String>,
    pub credentials: Credentials,
    pub validator: CredentialValidator,
    pub authenticated_support: bool,
    pub use_sandbox: bool,
    pub requester: Arc<Requester>,
    pub nonce: Arc<Nonce>,
    pub websocket: Option<Arc<WebsocketHandle>>,
    market: Arc<MarketData>,
    pairs: RwLock<PairSets>,
}

impl ExchangeBase {
    pub fn new(name: impl Into<String>, requester: Requester, market: Arc<MarketData>) -> Self {
        Self {
            name: name.into(),
            enabled: false,
            verbose: false,
            withdraw_permissions: WithdrawPermissions::NONE,
            fees: FeeSchedule::default(),
            base_currencies: Vec::new(),
            asset_types: vec![AssetType::Spot],
            supports: FeatureFlags::default(),
            features: EnabledFeatures::default(),
            request_format: PairFormat::default(),
            config_format: PairFormat::default(),
            api_url_default: String::new(),
            api_url: String::new(),
            api_url_secondary: None,
            credentials: Credentials::default(),
            validator: CredentialValidator::default(),
            authenticated_support: false,
            use_sandbox: false,
            requester: Arc::new(requester),
            nonce: Arc::new(Nonce::new()),
            websocket: None,
            market,
            pairs: RwLock::new(PairSets::default()),
        }
    }

    /// Set the default REST endpoint and point the active URL at it.
    pub fn set_default_url(&mut self, url: impl Into<String>) {
        self.api_url_default = url.into();
        self.api_url = self.api_url_default.clone();
    }

    pub fn market(&self) -> &Arc<MarketData> {
        &self.market
    }

    // ---- Configuration ----

    /// Apply a config section on top of the driver's defaults.
    ///
    /// A disabled section only turns the exchange off. Incomplete credentials
    /// turn authenticated support off with a warning instead of failing.
    pub fn apply_config(&mut self, config: &ExchangeConfig) -> Result<()> {
        if !config.enabled {
            self.enabled = false;
            info!(exchange = %self.name, "Exchange disabled by config");
            return Ok(());
        }

        self.enabled = true;
        self.verbose = config.verbose;
        self.use_sandbox = config.use_sandbox;
        self.requester.set_verbose(config.verbose);

        let timeout = config.http.timeout();
        if timeout.is_some() || config.http.user_agent.is_some() {
            self.requester
                .reconfigure_http(timeout, config.http.user_agent.clone());
        }

        if let Some(format) = &config.request_format {
            self.request_format = format.clone();
        }
        if let Some(format) = &config.config_format {
            self.config_format = format.clone();
        }

        if let Some(supports) = config.features.supports {
            self.supports = supports;
        }
        self.features = config.features.enabled;
        if self.features.websocket && !self.supports.websocket {
            warn!(exchange = %self.name, "Websocket enabled in config but not supported; ignoring");
            self.features.websocket = false;
        }
        if self.features.auto_pair_updates && !self.supports.auto_pair_updates {
            warn!(exchange = %self.name, "Auto pair updates not supported; ignoring");
            self.features.auto_pair_updates = false;
        }

        let endpoints = &config.api.endpoints;
        if let Some(url) = endpoints.url.as_deref().filter(|u| !u.trim().is_empty()) {
            self.api_url = url.to_string();
        }
        if let Some(url) = endpoints.url_secondary.as_deref().filter(|u| !u.trim().is_empty()) {
            self.api_url_secondary = Some(url.to_string());
        }
        if let Some(websocket) = &self.websocket {
            websocket.setup(self.features.websocket, endpoints.websocket_url.as_deref());
        }

        self.credentials = config.api.credentials.clone();
        if let Some(validator) = &config.api.validator {
            self.validator = validator.clone();
        }
        self.authenticated_support = config.api.authenticated_support;
        if self.authenticated_support {
            let problems = self.validator.problems(&self.credentials);
            if !problems.is_empty() {
                warn!(
                    exchange = %self.name,
                    missing = ?problems,
                    "Credentials incomplete; authenticated API support disabled"
                );
                self.authenticated_support = false;
            }
        }

        let available = self.parse_pairs(&config.available_pairs)?;
        let enabled = self.parse_pairs(&config.enabled_pairs)?;
        {
            let mut pairs = self.pairs.write();
            if !available.is_empty() {
                pairs.available = available;
            }
            if !enabled.is_empty() {
                pairs.enabled = enabled;
            }
        }

        if self.verbose {
            info!(
                exchange = %self.name,
                url = %self.api_url,
                authenticated = self.authenticated_support,
                websocket = self.features.websocket,
                "Exchange configured"
            );
        }
        Ok(())
    }

    fn parse_pairs(&self, raw: &[String]) -> Result<Vec<CurrencyPair>> {
        raw.iter()
            .map(|symbol| {
                CurrencyPair::parse_with_delimiter(symbol, &self.config_format.delimiter)
                    .or_else(|_| symbol.parse())
                    .map_err(|e| ExchangeError::InvalidConfig(format!("{}: {}", self.name, e)))
            })
            .collect()
    }

    // ---- Credentials ----

    /// Fails unless authenticated calls are configured and allowed.
    pub fn require_authenticated(&self, operation: &str) -> Result<()> {
        if self.authenticated_support {
            Ok(())
        } else {
            Err(ExchangeError::InvalidConfig(format!(
                "{}: {} requires authenticated API support",
                self.name, operation
            )))
        }
    }

    // ---- Pairs ----

    pub fn available_pairs(&self) -> Vec<CurrencyPair> {
        self.pairs.read().available.clone()
    }

    pub fn enabled_pairs(&self) -> Vec<CurrencyPair> {
        self.pairs.read().enabled.clone()
    }

    pub fn is_pair_enabled(&self, pair: &CurrencyPair) -> bool {
        self.pairs.read().enabled.contains(pair)
    }

    /// Replace the available (or enabled) pair list and report what changed.
    pub fn update_pairs(&self, new_pairs: Vec<CurrencyPair>, enabled: bool) -> PairDiff {
        let mut pairs = self.pairs.write();
        let target = if enabled {
            &mut pairs.enabled
        } else {
            &mut pairs.available
        };

        let diff = PairDiff {
            added: new_pairs
                .iter()
                .filter(|p| !target.contains(p))
                .cloned()
                .collect(),
            removed: target
                .iter()
                .filter(|p| !new_pairs.contains(p))
                .cloned()
                .collect(),
        };
        *target = new_pairs;
        drop(pairs);

        if !diff.is_empty() {
            let list = if enabled { "enabled" } else { "available" };
            info!(
                exchange = %self.name,
                list,
                added = ?diff.added,
                removed = ?diff.removed,
                "Updated pairs"
            );
        }
        diff
    }

    // ---- Market data ----

    pub fn market_key(&self, pair: &CurrencyPair, asset: AssetType) -> MarketKey {
        MarketKey::new(&self.name, pair.clone(), asset)
    }

    /// Pair as the venue spells it on the wire.
    pub fn format_pair(&self, pair: &CurrencyPair) -> String {
        pair.format(&self.request_format)
    }

    pub fn check_asset(&self, asset: AssetType) -> Result<()> {
        if self.asset_types.contains(&asset) {
            Ok(())
        } else {
            Err(ExchangeError::unsupported(format!(
                "{} does not trade {} assets",
                self.name, asset
            )))
        }
    }

    pub fn websocket_handle(&self) -> Result<Arc<WebsocketHandle>> {
        self.websocket
            .clone()
            .ok_or_else(|| ExchangeError::unsupported(format!("{} has no websocket", self.name)))
    }
}
