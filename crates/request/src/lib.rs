//! Per-exchange request dispatch.
//!
//! Every outbound venue call is admitted through a [`Requester`], which keeps
//! one sliding-window [`RateLimit`] per [`AuthClass`] and executes requests on
//! a pluggable [`HttpTransport`].

#[cfg(any(test, feature = "testing"))]
pub mod canned;
pub mod rate_limit;
pub mod requester;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub use canned::CannedTransport;
pub use rate_limit::RateLimit;
pub use requester::{AuthClass, Requester, RequesterConfig};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
