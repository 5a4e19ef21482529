use crate::protocol::OrderBookResponse;
use serde_json::Value;
use std::sync::Arc;
use xchg_core::Result;
use xchg_exchanges_common::ExchangeBase;
use xchg_request::{AuthClass, HttpRequest, Requester};

/// Owned REST client for the public market endpoints.
#[derive(Debug, Clone)]
pub struct ItBitClient {
    requester: Arc<Requester>,
    api_url: String,
}

impl ItBitClient {
    pub fn from_base(base: &ExchangeBase) -> Self {
        Self {
            requester: base.requester.clone(),
            api_url: base.api_url.trim_end_matches('/').to_string(),
        }
    }

    fn market_url(&self, symbol: &str, resource: &str) -> String {
        format!("{}/markets/{}/{}", self.api_url, symbol, resource)
    }

    pub async fn ticker(&self, symbol: &str) -> Result<Value> {
        self.requester
            .send_json(
                AuthClass::Unauthenticated,
                HttpRequest::get(self.market_url(symbol, "ticker")),
            )
            .await
    }

    pub async fn order_book(&self, symbol: &str) -> Result<OrderBookResponse> {
        self.requester
            .send_json(
                AuthClass::Unauthenticated,
                HttpRequest::get(self.market_url(symbol, "order_book")),
            )
            .await
    }
}
