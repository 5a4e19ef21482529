use crate::protocol::{ErrorResponse, OrderBookResponse, TradingPairInfo};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;
use std::sync::Arc;
use xchg_core::{Credentials, ExchangeError, Result, UpstreamError};
use xchg_exchanges_common::{ExchangeBase, Nonce};
use xchg_request::{AuthClass, HttpRequest, Requester};

type HmacSha256 = Hmac<Sha256>;

/// Owned REST client. Cheap to clone into a fetch task.
#[derive(Debug, Clone)]
pub struct BitstampClient {
    requester: Arc<Requester>,
    api_url: String,
    credentials: Credentials,
    nonce: Arc<Nonce>,
}

impl BitstampClient {
    pub fn from_base(base: &ExchangeBase) -> Self {
        Self {
            requester: base.requester.clone(),
            api_url: base.api_url.trim_end_matches('/').to_string(),
            credentials: base.credentials.clone(),
            nonce: base.nonce.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{}/", self.api_url, path)
    }

    // ---- Public ----

    pub async fn ticker(&self, symbol: &str) -> Result<Value> {
        self.requester
            .send_json(
                AuthClass::Unauthenticated,
                HttpRequest::get(self.url(&format!("ticker/{}", symbol))),
            )
            .await
    }

    pub async fn order_book(&self, symbol: &str) -> Result<OrderBookResponse> {
        self.requester
            .send_json(
                AuthClass::Unauthenticated,
                HttpRequest::get(self.url(&format!("order_book/{}", symbol))),
            )
            .await
    }

    pub async fn trading_pairs(&self) -> Result<Vec<TradingPairInfo>> {
        self.requester
            .send_json(
                AuthClass::Unauthenticated,
                HttpRequest::get(self.url("trading-pairs-info")),
            )
            .await
    }

    // ---- Signed ----

    pub async fn balance(&self) -> Result<Map<String, Value>> {
        let body: Value = self.signed_post("balance").await?;
        if let Ok(error) = serde_json::from_value::<ErrorResponse>(body.clone()) {
            if error.status == "error" {
                return Err(UpstreamError::Status {
                    status: 200,
                    body: error.reason.to_string(),
                }
                .into());
            }
        }
        match body {
            Value::Object(map) => Ok(map),
            other => Err(ExchangeError::malformed(format!(
                "Bitstamp balance: expected object, got {}",
                other
            ))),
        }
    }

    async fn signed_post(&self, path: &str) -> Result<Value> {
        let endpoint = self.url(path);
        self.requester
            .send_signed_json(AuthClass::Authenticated, || {
                let nonce = self.nonce.next().to_string();
                let signature = sign(
                    &self.credentials.secret,
                    &nonce,
                    &self.credentials.client_id,
                    &self.credentials.key,
                )?;
                let form = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("key", &self.credentials.key)
                    .append_pair("signature", &signature)
                    .append_pair("nonce", &nonce)
                    .finish();
                Ok(HttpRequest::post(endpoint).with_form(form))
            })
            .await
    }
}

/// Upper-case hex HMAC-SHA256 of `nonce + client_id + key`.
pub fn sign(secret: &str, nonce: &str, client_id: &str, key: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::InvalidConfig(format!("Invalid HMAC secret: {}", e)))?;
    mac.update(nonce.as_bytes());
    mac.update(client_id.as_bytes());
    mac.update(key.as_bytes());
    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}
