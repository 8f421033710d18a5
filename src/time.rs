//! Epoch-millisecond clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// Wall clock in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Timestamp for persisted events.
///
/// Strictly increasing across the process even when the wall clock stalls or
/// steps backwards.
pub fn timestamp() -> u64 {
    let now = now_millis();
    let mut last = LAST_TIMESTAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_TIMESTAMP.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_strictly_increasing() {
        let mut prev = timestamp();
        for _ in 0..1000 {
            let next = timestamp();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_timestamp_not_behind_wall_clock() {
        let wall = now_millis();
        assert!(timestamp() >= wall);
    }
}
