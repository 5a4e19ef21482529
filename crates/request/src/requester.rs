use crate::rate_limit::RateLimit;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use xchg_core::{ExchangeError, Result, UpstreamError};

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_USER_AGENT: &str = concat!("xchg/", env!("CARGO_PKG_VERSION"));

/// Call class. Each class has its own budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthClass {
    Authenticated,
    Unauthenticated,
}

impl fmt::Display for AuthClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthClass::Authenticated => write!(f, "authenticated"),
            AuthClass::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// Shared HTTP settings and dispatch behaviour.
#[derive(Debug, Clone)]
pub struct RequesterConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// Applied to `send` when set; `admit_within` always takes its own deadline.
    pub admission_deadline: Option<Duration>,
    pub verbose: bool,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HTTP_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            admission_deadline: None,
            verbose: false,
        }
    }
}

/// Per-exchange request dispatcher.
///
/// Owns one [`RateLimit`] per [`AuthClass`] and the HTTP transport. Two
/// requesters never share state, so venues run fully in parallel.
pub struct Requester {
    name: String,
    authenticated: RateLimit,
    unauthenticated: RateLimit,
    config: RwLock<RequesterConfig>,
    transport: RwLock<Arc<dyn HttpTransport>>,
    custom_transport: bool,
}

impl Requester {
    pub fn new(
        name: impl Into<String>,
        authenticated: RateLimit,
        unauthenticated: RateLimit,
        config: RequesterConfig,
    ) -> Self {
        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::new(config.timeout, &config.user_agent));
        Self {
            name: name.into(),
            authenticated,
            unauthenticated,
            config: RwLock::new(config),
            transport: RwLock::new(transport),
            custom_transport: false,
        }
    }

    /// Replace the HTTP transport. A custom transport survives
    /// [`reconfigure_http`](Self::reconfigure_http).
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = RwLock::new(transport);
        self.custom_transport = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limit(&self, class: AuthClass) -> &RateLimit {
        match class {
            AuthClass::Authenticated => &self.authenticated,
            AuthClass::Unauthenticated => &self.unauthenticated,
        }
    }

    pub fn config(&self) -> RequesterConfig {
        self.config.read().clone()
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.config.write().verbose = verbose;
    }

    pub fn set_admission_deadline(&self, deadline: Option<Duration>) {
        self.config.write().admission_deadline = deadline;
    }

    /// Apply HTTP overrides and rebuild the client. Rate limit state is kept.
    pub fn reconfigure_http(&self, timeout: Option<Duration>, user_agent: Option<String>) {
        let (timeout, user_agent) = {
            let mut config = self.config.write();
            if let Some(timeout) = timeout {
                config.timeout = timeout;
            }
            if let Some(user_agent) = user_agent {
                config.user_agent = user_agent;
            }
            (config.timeout, config.user_agent.clone())
        };

        if self.custom_transport {
            debug!(exchange = %self.name, "Custom transport kept; HTTP overrides recorded only");
            return;
        }
        *self.transport.write() = Arc::new(ReqwestTransport::new(timeout, &user_agent));
        debug!(exchange = %self.name, ?timeout, user_agent = %user_agent, "HTTP client rebuilt");
    }

    // ---- Admission ----

    /// Block until `class` has a free slot, bounded by the configured default
    /// deadline if one is set.
    pub async fn admit(&self, class: AuthClass) -> Result<()> {
        let deadline = self.config.read().admission_deadline;
        match deadline {
            Some(deadline) => self.admit_within(class, deadline).await,
            None => {
                self.limit(class).acquire().await;
                Ok(())
            }
        }
    }

    pub async fn admit_within(&self, class: AuthClass, deadline: Duration) -> Result<()> {
        self.limit(class).acquire_within(deadline).await
    }

    // ---- Dispatch ----

    /// Admit, execute, and map non-2xx statuses to [`UpstreamError::Status`].
    pub async fn send(&self, class: AuthClass, request: HttpRequest) -> Result<HttpResponse> {
        self.admit(class).await?;
        self.execute(class, request).await
    }

    /// [`send`](Self::send) and decode the body as JSON.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        class: AuthClass,
        request: HttpRequest,
    ) -> Result<T> {
        let response = self.send(class, request).await?;
        self.decode(&response)
    }

    /// Admit first, then build the request with `sign`. Nonces taken inside
    /// `sign` therefore reach the venue in admission order.
    pub async fn send_signed_json<T, F>(&self, class: AuthClass, sign: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnOnce() -> Result<HttpRequest> + Send,
    {
        self.admit(class).await?;
        let request = sign()?;
        let response = self.execute(class, request).await?;
        self.decode(&response)
    }

    async fn execute(&self, class: AuthClass, request: HttpRequest) -> Result<HttpResponse> {
        let verbose = self.config.read().verbose;
        if verbose {
            debug!(
                exchange = %self.name,
                class = %class,
                method = ?request.method,
                url = %request.url,
                "Sending request"
            );
        }

        let transport = self.transport.read().clone();
        let response = transport.execute(request).await?;

        if verbose {
            debug!(exchange = %self.name, status = response.status, "Received response");
        }

        if !response.is_success() {
            return Err(UpstreamError::Status {
                status: response.status,
                body: response.body,
            }
            .into());
        }
        Ok(response)
    }

    fn decode<T: DeserializeOwned>(&self, response: &HttpResponse) -> Result<T> {
        serde_json::from_str(&response.body).map_err(|e| {
            ExchangeError::malformed(format!("{} response: {}", self.name, e))
        })
    }
}

impl fmt::Debug for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requester")
            .field("name", &self.name)
            .field("authenticated", &self.authenticated)
            .field("unauthenticated", &self.unauthenticated)
            .field("config", &*self.config.read())
            .field("custom_transport", &self.custom_transport)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canned::CannedTransport;
    use serde::Deserialize;

    fn requester(transport: Arc<CannedTransport>, auth: RateLimit, unauth: RateLimit) -> Requester {
        Requester::new("Test", auth, unauth, RequesterConfig::default()).with_transport(transport)
    }

    #[tokio::test]
    async fn test_unauthenticated_scenario_two_per_second() {
        let transport = Arc::new(CannedTransport::new().with_route("/ticker", 200, "{}"));
        let req = requester(
            transport.clone(),
            RateLimit::unlimited(),
            RateLimit::new(Duration::from_secs(1), 2),
        );
        let start = std::time::Instant::now();

        req.send(AuthClass::Unauthenticated, HttpRequest::get("https://x/ticker"))
            .await
            .unwrap();
        req.send(AuthClass::Unauthenticated, HttpRequest::get("https://x/ticker"))
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_millis(200));

        req.send(AuthClass::Unauthenticated, HttpRequest::get("https://x/ticker"))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_classes_do_not_share_budget() {
        let transport = Arc::new(CannedTransport::new());
        let req = requester(
            transport,
            RateLimit::new(Duration::from_secs(10), 1),
            RateLimit::new(Duration::from_secs(10), 1),
        );

        req.admit(AuthClass::Unauthenticated).await.unwrap();
        req.admit_within(AuthClass::Authenticated, Duration::from_millis(50))
            .await
            .unwrap();

        let err = req
            .admit_within(AuthClass::Unauthenticated, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_default_deadline_applies_to_send() {
        let transport = Arc::new(CannedTransport::new().with_route("/x", 200, "{}"));
        let req = requester(
            transport.clone(),
            RateLimit::unlimited(),
            RateLimit::new(Duration::from_secs(10), 1),
        );
        req.set_admission_deadline(Some(Duration::from_millis(50)));

        req.send(AuthClass::Unauthenticated, HttpRequest::get("https://x/x"))
            .await
            .unwrap();
        let err = req
            .send(AuthClass::Unauthenticated, HttpRequest::get("https://x/x"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_error() {
        let transport = Arc::new(CannedTransport::new().with_route("/busy", 429, "slow down"));
        let req = requester(transport, RateLimit::unlimited(), RateLimit::unlimited());

        let err = req
            .send(AuthClass::Unauthenticated, HttpRequest::get("https://x/busy"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExchangeError::Upstream(UpstreamError::Status {
                status: 429,
                body: "slow down".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_send_json_decodes_or_reports_malformed() {
        #[derive(Debug, Deserialize)]
        struct Last {
            last: String,
        }

        let transport = Arc::new(
            CannedTransport::new()
                .with_route("/good", 200, r#"{"last":"101.5"}"#)
                .with_route("/bad", 200, "<html>"),
        );
        let req = requester(transport, RateLimit::unlimited(), RateLimit::unlimited());

        let last: Last = req
            .send_json(AuthClass::Unauthenticated, HttpRequest::get("https://x/good"))
            .await
            .unwrap();
        assert_eq!(last.last, "101.5");

        let err = req
            .send_json::<Last>(AuthClass::Unauthenticated, HttpRequest::get("https://x/bad"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Upstream(UpstreamError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_reconfigure_keeps_custom_transport() {
        let transport = Arc::new(CannedTransport::new().with_route("/ping", 200, "pong"));
        let req = requester(transport.clone(), RateLimit::unlimited(), RateLimit::unlimited());

        req.reconfigure_http(Some(Duration::from_secs(3)), Some("bot/1".to_string()));
        let config = req.config();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.user_agent, "bot/1");

        req.send(AuthClass::Unauthenticated, HttpRequest::get("https://x/ping"))
            .await
            .unwrap();
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_signed_requests_are_built_after_admission() {
        let transport = Arc::new(CannedTransport::new().with_route("/private", 200, "{}"));
        let req = Arc::new(requester(
            transport.clone(),
            RateLimit::new(Duration::from_millis(100), 1),
            RateLimit::unlimited(),
        ));
        let nonce = Arc::new(std::sync::atomic::AtomicU64::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let req = req.clone();
            let nonce = nonce.clone();
            handles.push(tokio::spawn(async move {
                req.send_signed_json::<serde_json::Value, _>(AuthClass::Authenticated, || {
                    let next = nonce.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                    Ok(HttpRequest::post("https://x/private")
                        .with_header("X-Nonce", next.to_string()))
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let nonces: Vec<u64> = transport
            .requests()
            .iter()
            .filter_map(|r| r.headers.get("x-nonce").and_then(|n| n.parse().ok()))
            .collect();
        assert_eq!(nonces, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_signing_failure_skips_transport() {
        let transport = Arc::new(CannedTransport::new());
        let req = requester(transport.clone(), RateLimit::unlimited(), RateLimit::unlimited());

        let err = req
            .send_signed_json::<serde_json::Value, _>(AuthClass::Authenticated, || {
                Err(ExchangeError::InvalidConfig("missing secret".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidConfig(_)));
        assert_eq!(transport.calls(), 0);
    }
}
