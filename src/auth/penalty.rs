//! Per-origin login penalties.
//!
//! A penalty is a binary gate: the first failed login from an origin blocks
//! every later attempt from that origin until a successful login or an
//! explicit clear. There is no decay timer and no attempt counter.

use super::shard::ShardedMap;
use tracing::debug;

#[derive(Default)]
pub struct PenaltyTracker {
    blocked: ShardedMap<String, ()>,
}

impl PenaltyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `origin` is currently blocked from attempting a login.
    #[must_use]
    pub fn penalised(&self, origin: &str) -> bool {
        self.blocked.contains(&origin.to_string())
    }

    /// Block `origin`. Idempotent.
    pub fn penalise(&self, origin: &str) {
        if self.blocked.insert(origin.to_string(), ()).is_none() {
            debug!(origin, "origin penalised");
        }
    }

    /// Lift the block on `origin`. Idempotent.
    pub fn clear(&self, origin: &str) {
        if self.blocked.remove(&origin.to_string()).is_some() {
            debug!(origin, "origin penalty cleared");
        }
    }
}

impl std::fmt::Debug for PenaltyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PenaltyTracker")
            .field("blocked", &self.blocked.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::PenaltyTracker;
    use std::sync::Arc;

    #[test]
    fn never_penalised_before_first_penalise() {
        let tracker = PenaltyTracker::new();
        assert!(!tracker.penalised("10.0.0.1"));
        tracker.clear("10.0.0.1");
        assert!(!tracker.penalised("10.0.0.1"));
    }

    #[test]
    fn penalise_holds_until_clear() {
        let tracker = PenaltyTracker::new();
        tracker.penalise("10.0.0.1");
        assert!(tracker.penalised("10.0.0.1"));
        assert!(tracker.penalised("10.0.0.1"));
        tracker.penalise("10.0.0.1");
        assert!(tracker.penalised("10.0.0.1"));
        tracker.clear("10.0.0.1");
        assert!(!tracker.penalised("10.0.0.1"));
    }

    #[test]
    fn origins_are_independent() {
        let tracker = PenaltyTracker::new();
        tracker.penalise("10.0.0.1");
        assert!(!tracker.penalised("10.0.0.2"));
        tracker.clear("10.0.0.2");
        assert!(tracker.penalised("10.0.0.1"));
    }

    #[test]
    fn concurrent_penalise_leaves_origin_penalised() {
        let tracker = Arc::new(PenaltyTracker::new());
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || tracker.penalise("192.0.2.7"))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().is_ok());
        }
        assert!(tracker.penalised("192.0.2.7"));
    }
}
