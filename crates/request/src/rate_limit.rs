use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use xchg_core::{ExchangeError, Result};

/// Sliding-window admission limiter.
///
/// At any instant no more than `max_calls` admissions fall within the trailing
/// `window`. Waiters queue on a FIFO mutex, so a caller cannot be overtaken
/// indefinitely by later arrivals. A `max_calls` of zero disables limiting.
#[derive(Debug)]
pub struct RateLimit {
    window: Duration,
    max_calls: u32,
    admitted: Mutex<VecDeque<Instant>>,
}

impl RateLimit {
    pub fn new(window: Duration, max_calls: u32) -> Self {
        Self {
            window,
            max_calls,
            admitted: Mutex::new(VecDeque::with_capacity(max_calls as usize)),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, 0)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_calls(&self) -> u32 {
        self.max_calls
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_calls == 0 || self.window.is_zero()
    }

    /// Wait until a slot is free, then take it.
    pub async fn acquire(&self) {
        if self.is_unlimited() {
            return;
        }

        let mut admitted = self.admitted.lock().await;
        loop {
            let now = Instant::now();
            while let Some(&oldest) = admitted.front() {
                if now.duration_since(oldest) >= self.window {
                    admitted.pop_front();
                } else {
                    break;
                }
            }

            if admitted.len() < self.max_calls as usize {
                admitted.push_back(now);
                return;
            }

            // Full window: hold the queue position until the oldest admission ages out.
            if let Some(&oldest) = admitted.front() {
                tokio::time::sleep_until(oldest + self.window).await;
            }
        }
    }

    /// Like [`acquire`](Self::acquire) but gives up after `deadline`.
    ///
    /// A caller that times out never consumes a slot.
    pub async fn acquire_within(&self, deadline: Duration) -> Result<()> {
        tokio::time::timeout(deadline, self.acquire())
            .await
            .map_err(|_| ExchangeError::Timeout(deadline))
    }

    /// Admissions currently counted against the window, if the limiter is idle.
    pub fn in_window(&self) -> Option<usize> {
        let admitted = self.admitted.try_lock().ok()?;
        let now = Instant::now();
        Some(
            admitted
                .iter()
                .filter(|at| now.duration_since(**at) < self.window)
                .count(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_third_call_waits_for_window() {
        let limit = RateLimit::new(Duration::from_secs(1), 2);
        let start = std::time::Instant::now();

        limit.acquire().await;
        limit.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(200));

        limit.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_deadline_returns_timeout() {
        let limit = RateLimit::new(Duration::from_secs(10), 1);
        limit.acquire().await;

        let err = limit
            .acquire_within(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, ExchangeError::Timeout(Duration::from_millis(50)));
        assert_eq!(limit.in_window(), Some(1));
    }

    #[tokio::test]
    async fn test_timed_out_waiter_does_not_take_slot() {
        let limit = RateLimit::new(Duration::from_millis(300), 1);
        limit.acquire().await;
        assert!(limit
            .acquire_within(Duration::from_millis(20))
            .await
            .is_err());

        tokio::time::sleep(Duration::from_millis(320)).await;
        limit
            .acquire_within(Duration::from_millis(50))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_zero_max_is_unlimited() {
        let limit = RateLimit::new(Duration::from_secs(60), 0);
        let start = std::time::Instant::now();
        for _ in 0..1_000 {
            limit.acquire().await;
        }
        assert!(limit.is_unlimited());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_never_exceed_max() {
        let limit = Arc::new(RateLimit::new(Duration::from_millis(400), 3));
        let start = std::time::Instant::now();

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let limit = limit.clone();
                tokio::spawn(async move {
                    limit.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();

        let early = admitted
            .iter()
            .filter(|at| **at < Duration::from_millis(400))
            .count();
        assert_eq!(early, 3);
        assert!(admitted[5] >= Duration::from_millis(400));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_waiters_admitted_in_arrival_order() {
        let limit = Arc::new(RateLimit::new(Duration::from_millis(150), 1));
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        limit.acquire().await;

        let mut handles = Vec::new();
        for waiter in 0..4 {
            let limit = limit.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                limit.acquire().await;
                order.lock().push(waiter);
            }));
            // Let this waiter queue before the next one arrives.
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
    }
}
