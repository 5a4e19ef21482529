use std::time::Duration;

// ---------------------------------------------------------------------------
// Upstream failures
// ---------------------------------------------------------------------------

/// A failure reported by, or while talking to, a venue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// Exchange Error
// ---------------------------------------------------------------------------

/// Typed condition returned by every dispatcher, cache and driver operation.
///
/// `Clone` so that a single coalesced fetch can hand its outcome to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    /// The driver does not back this operation (yet).
    #[error("{operation} is not implemented")]
    Unimplemented { operation: &'static str },
    /// The venue fundamentally lacks the capability.
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),
    /// Admission or fetch exceeded the caller's deadline.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    /// Cache read miss with no refresh requested.
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExchangeError {
    pub fn unimplemented(operation: &'static str) -> Self {
        Self::Unimplemented { operation }
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }

    pub fn malformed(what: impl Into<String>) -> Self {
        Self::Upstream(UpstreamError::Malformed(what.into()))
    }

    /// "Try later": the same call may succeed on a subsequent attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Upstream(_))
    }

    /// "Will never work": the driver or venue cannot serve this call.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Unimplemented { .. } | Self::Unsupported(_))
    }
}

pub type Result<T, E = ExchangeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ExchangeError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ExchangeError::malformed("bad json").is_retryable());
        assert!(ExchangeError::unimplemented("submit_order").is_permanent());
        assert!(ExchangeError::unsupported("REST").is_permanent());

        let not_found = ExchangeError::NotFound("ticker".to_string());
        assert!(!not_found.is_retryable());
        assert!(!not_found.is_permanent());
    }

    #[test]
    fn test_display() {
        let err = ExchangeError::Upstream(UpstreamError::Status {
            status: 429,
            body: "slow down".to_string(),
        });
        assert_eq!(err.to_string(), "Upstream error: HTTP 429: slow down");
        assert_eq!(
            ExchangeError::unimplemented("cancel_order").to_string(),
            "cancel_order is not implemented"
        );
    }
}
