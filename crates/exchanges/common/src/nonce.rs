use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Strictly increasing request nonce, seeded from wall-clock microseconds.
///
/// Values never repeat within a process even when the clock stalls or steps
/// backwards.
#[derive(Debug, Default)]
pub struct Nonce {
    last: AtomicU64,
}

impl Nonce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = Utc::now().timestamp_micros().max(0) as u64;
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}
