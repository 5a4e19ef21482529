use crate::protocol::{Balance, BookResponse, SignedPayload};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha384;
use std::sync::Arc;
use xchg_core::{Credentials, ExchangeError, Result};
use xchg_exchanges_common::{ExchangeBase, Nonce};
use xchg_request::{AuthClass, HttpRequest, Requester};

type HmacSha384 = Hmac<Sha384>;

/// Owned REST client. Cheap to clone into a fetch task.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    requester: Arc<Requester>,
    api_url: String,
    credentials: Credentials,
    nonce: Arc<Nonce>,
}

impl GeminiClient {
    pub fn from_base(base: &ExchangeBase) -> Self {
        Self {
            requester: base.requester.clone(),
            api_url: base.api_url.trim_end_matches('/').to_string(),
            credentials: base.credentials.clone(),
            nonce: base.nonce.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn public<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.requester
            .send_json(AuthClass::Unauthenticated, HttpRequest::get(self.url(path)))
            .await
    }

    // ---- Public ----

    pub async fn symbols(&self) -> Result<Vec<String>> {
        self.public("/v1/symbols").await
    }

    pub async fn ticker(&self, symbol: &str) -> Result<Value> {
        self.public(&format!("/v1/pubticker/{}", symbol)).await
    }

    pub async fn order_book(&self, symbol: &str) -> Result<BookResponse> {
        self.public(&format!("/v1/book/{}", symbol)).await
    }

    // ---- Signed ----

    pub async fn balances(&self) -> Result<Vec<Balance>> {
        self.signed_post("/v1/balances").await
    }

    async fn signed_post<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.requester
            .send_signed_json(AuthClass::Authenticated, || {
                let payload = encode_payload(path, self.nonce.next())?;
                let signature = sign(&self.credentials.secret, &payload)?;
                Ok(HttpRequest::post(self.url(path))
                    .with_header("Content-Type", "text/plain")
                    .with_header("Cache-Control", "no-cache")
                    .with_header("X-GEMINI-APIKEY", self.credentials.key.clone())
                    .with_header("X-GEMINI-PAYLOAD", payload)
                    .with_header("X-GEMINI-SIGNATURE", signature))
            })
            .await
    }
}

/// Base64 of the compact JSON request body.
pub fn encode_payload(path: &str, nonce: u64) -> Result<String> {
    let json = serde_json::to_vec(&SignedPayload {
        request: path,
        nonce,
    })
    .map_err(|e| ExchangeError::Internal(format!("Encoding Gemini payload: {}", e)))?;
    Ok(STANDARD.encode(json))
}

/// Lower-case hex HMAC-SHA384 of the encoded payload.
pub fn sign(secret: &str, payload: &str) -> Result<String> {
    let mut mac = HmacSha384::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::InvalidConfig(format!("Invalid HMAC secret: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
