use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use xchg_core::{ExchangeError, Result, UpstreamError};

const CHANNEL_CAPACITY: usize = 1024;

/// Streaming connection to a venue, independent of the REST path.
///
/// The handle only moves text frames; decoding them is the driver's concern.
#[derive(Debug)]
pub struct WebsocketHandle {
    exchange: String,
    url: RwLock<String>,
    enabled: AtomicBool,
    connected: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WebsocketHandle {
    pub fn new(exchange: impl Into<String>, default_url: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            url: RwLock::new(default_url.into()),
            enabled: AtomicBool::new(false),
            connected: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
        }
    }

    /// Apply configuration: enable or disable, and optionally override the URL.
    pub fn setup(&self, enabled: bool, url: Option<&str>) {
        self.enabled.store(enabled, Ordering::Release);
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            *self.url.write() = url.to_string();
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn url(&self) -> String {
        self.url.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Connect, send `subscriptions` as text frames, and stream incoming text
    /// frames. Pings are answered; the channel closes with the connection.
    pub async fn connect(&self, subscriptions: Vec<String>) -> Result<mpsc::Receiver<String>> {
        if !self.is_enabled() {
            return Err(ExchangeError::InvalidConfig(format!(
                "{} websocket is disabled",
                self.exchange
            )));
        }
        self.disconnect();

        let url = self.url();
        info!(exchange = %self.exchange, url = %url, "Connecting websocket");
        let (mut stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        debug!(exchange = %self.exchange, status = %response.status(), "Websocket connected");

        for subscription in subscriptions {
            stream
                .send(Message::Text(subscription))
                .await
                .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let connected = self.connected.clone();
        let exchange = self.exchange.clone();
        connected.store(true, Ordering::Release);

        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        if let Err(e) = stream.send(Message::Pong(payload)).await {
                            warn!(exchange = %exchange, error = %e, "Failed to answer ping");
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        info!(exchange = %exchange, frame = ?frame, "Websocket closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(exchange = %exchange, error = %e, "Websocket read failed");
                        break;
                    }
                }
            }
            connected.store(false, Ordering::Release);
        });
        *self.reader.lock() = Some(reader);

        Ok(rx)
    }

    pub fn disconnect(&self) {
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
            debug!(exchange = %self.exchange, "Websocket reader stopped");
        }
        self.connected.store(false, Ordering::Release);
    }
}

impl Drop for WebsocketHandle {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_handle_refuses_to_connect() {
        let handle = WebsocketHandle::new("Bitstamp", "wss://ws.bitstamp.net");
        let err = handle.connect(Vec::new()).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidConfig(_)));
        assert!(!handle.is_connected());
    }

    #[test]
    fn test_setup_overrides_url() {
        let handle = WebsocketHandle::new("Bitstamp", "wss://default");
        handle.setup(true, Some("wss://override"));
        assert!(handle.is_enabled());
        assert_eq!(handle.url(), "wss://override");

        handle.setup(false, Some("  "));
        assert!(!handle.is_enabled());
        assert_eq!(handle.url(), "wss://override");
    }
}
