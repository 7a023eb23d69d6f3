//! Bounded retry counters for template and image downloads

use std::collections::HashMap;

use parking_lot::Mutex;

/// Failed attempts tolerated per key before giving up
pub const MAX_RETRY_COUNT: u32 = 10;

/// Per-key failure counters shared by every fetch completion
///
/// All access goes through one mutex, so concurrent completions for
/// different keys never lose an increment.
#[derive(Debug)]
pub struct RetryTracker {
    counts: Mutex<HashMap<String, u32>>,
    limit: u32,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::with_limit(MAX_RETRY_COUNT)
    }

    pub fn with_limit(limit: u32) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            limit,
        }
    }

    /// Whether another attempt is allowed for `key`
    pub fn is_retry_available(&self, key: &str) -> bool {
        self.retry_count(key) < self.limit
    }

    /// Record one failed attempt and return the new count
    pub fn increase_retry_count(&self, key: &str) -> u32 {
        let mut counts = self.counts.lock();
        let count = counts.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn retry_count(&self, key: &str) -> u32 {
        self.counts.lock().get(key).copied().unwrap_or(0)
    }

    /// Forget the failures recorded for `key`
    pub fn reset(&self, key: &str) {
        self.counts.lock().remove(key);
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl Default for RetryTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_ceiling_reached_on_tenth_failure() {
        let tracker = RetryTracker::new();
        for attempt in 1..=MAX_RETRY_COUNT {
            assert!(tracker.is_retry_available("k"));
            assert_eq!(tracker.increase_retry_count("k"), attempt);
        }
        assert!(!tracker.is_retry_available("k"));
        tracker.increase_retry_count("k");
        assert!(!tracker.is_retry_available("k"));
        assert!(tracker.is_retry_available("other"));
    }

    #[test]
    fn test_reset() {
        let tracker = RetryTracker::with_limit(1);
        tracker.increase_retry_count("k");
        assert!(!tracker.is_retry_available("k"));
        tracker.reset("k");
        assert!(tracker.is_retry_available("k"));
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let tracker = Arc::new(RetryTracker::with_limit(u32::MAX));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.increase_retry_count(if i % 2 == 0 { "a" } else { "b" });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.retry_count("a"), 400);
        assert_eq!(tracker.retry_count("b"), 400);
    }
}
