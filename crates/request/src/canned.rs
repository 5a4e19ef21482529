//! Offline transport for driver tests.

use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use xchg_core::UpstreamError;

/// Offline transport answering from a table of URL fragments.
///
/// The longest fragment contained in the request URL wins. Every request is
/// recorded so tests can assert on call counts and signed headers.
#[derive(Debug, Default)]
pub struct CannedTransport {
    routes: Mutex<Vec<(String, HttpResponse)>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl CannedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(self, fragment: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        self.route(fragment, HttpResponse::new(status, body));
        self
    }

    /// Delay every response, to hold fetches in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn route(&self, fragment: impl Into<String>, response: HttpResponse) {
        let fragment = fragment.into();
        let mut routes = self.routes.lock();
        routes.retain(|(f, _)| *f != fragment);
        routes.push((fragment, response));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn calls_matching(&self, fragment: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for CannedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, UpstreamError> {
        let url = request.url.clone();
        self.requests.lock().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let routes = self.routes.lock();
        routes
            .iter()
            .filter(|(fragment, _)| url.contains(fragment.as_str()))
            .max_by_key(|(fragment, _)| fragment.len())
            .map(|(_, response)| response.clone())
            .ok_or_else(|| UpstreamError::Transport(format!("No canned response for {}", url)))
    }
}
