use crate::error::{ExchangeError, Result};
use crate::models::PairFormat;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

/// Configuration file: one `[[exchanges]]` table per venue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub exchanges: Vec<ExchangeConfig>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ExchangeError::InvalidConfig(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ExchangeError::InvalidConfig(e.to_string()))
    }

    /// Case-insensitive lookup by exchange name.
    pub fn exchange(&self, name: &str) -> Option<&ExchangeConfig> {
        self.exchanges
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }
}

// ---------------------------------------------------------------------------
// Per-exchange
// ---------------------------------------------------------------------------

/// Settings applied to a driver at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub name: String,
    pub enabled: bool,
    pub verbose: bool,
    pub use_sandbox: bool,
    pub http: HttpConfig,
    pub api: ApiConfig,
    pub features: FeaturesConfig,
    /// Overrides the driver's wire spelling of pairs.
    pub request_format: Option<PairFormat>,
    /// Overrides how pairs are spelled in this file.
    pub config_format: Option<PairFormat>,
    /// Pairs the venue lists, spelled in `config_format`.
    pub available_pairs: Vec<String>,
    /// Pairs this process tracks, spelled in `config_format`.
    pub enabled_pairs: Vec<String>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            verbose: false,
            use_sandbox: false,
            http: HttpConfig::default(),
            api: ApiConfig::default(),
            features: FeaturesConfig::default(),
            request_format: None,
            config_format: None,
            available_pairs: Vec::new(),
            enabled_pairs: Vec::new(),
        }
    }
}

/// Optional overrides for the shared HTTP client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl HttpConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub authenticated_support: bool,
    pub credentials: Credentials,
    /// Overrides the driver's credential requirements.
    pub validator: Option<CredentialValidator>,
    pub endpoints: Endpoints,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
    pub client_id: String,
    pub pem_key: String,
}

// Secrets stay out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &redact(&self.key))
            .field("secret", &redact(&self.secret))
            .field("client_id", &self.client_id)
            .field("pem_key", &redact(&self.pem_key))
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Which credential fields a venue needs before authenticated calls are allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialValidator {
    pub requires_key: bool,
    pub requires_secret: bool,
    pub requires_client_id: bool,
    pub requires_pem: bool,
    pub requires_base64_secret: bool,
}

impl Default for CredentialValidator {
    fn default() -> Self {
        Self {
            requires_key: true,
            requires_secret: true,
            requires_client_id: false,
            requires_pem: false,
            requires_base64_secret: false,
        }
    }
}

impl CredentialValidator {
    /// Names of the required fields that are missing or malformed.
    pub fn problems(&self, credentials: &Credentials) -> Vec<&'static str> {
        let mut problems = Vec::new();
        if self.requires_key && credentials.key.trim().is_empty() {
            problems.push("key");
        }
        if self.requires_secret && credentials.secret.trim().is_empty() {
            problems.push("secret");
        }
        if self.requires_client_id && credentials.client_id.trim().is_empty() {
            problems.push("client_id");
        }
        if self.requires_pem && credentials.pem_key.trim().is_empty() {
            problems.push("pem_key");
        }
        if self.requires_base64_secret && !is_base64(&credentials.secret) {
            problems.push("secret (base64)");
        }
        problems
    }
}

fn is_base64(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && STANDARD.decode(value).is_ok()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub url: Option<String>,
    pub url_secondary: Option<String>,
    pub websocket_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Overrides what the driver declares the venue supports.
    pub supports: Option<FeatureFlags>,
    pub enabled: EnabledFeatures,
}

/// What the venue offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub rest: bool,
    pub websocket: bool,
    pub auto_pair_updates: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            rest: true,
            websocket: false,
            auto_pair_updates: false,
        }
    }
}

/// What this process turns on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledFeatures {
    pub websocket: bool,
    pub auto_pair_updates: bool,
}
