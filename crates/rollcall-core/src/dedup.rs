//! In-memory dedup cache over the attendance ledger.
//!
//! Tracks the last committed period per identity so the decision engine
//! can skip most redundant ledger writes. The cache is never the
//! authority: the ledger's unique constraint decides races, and a cold
//! start rebuilds this state from ledger contents.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::period::PeriodId;

#[derive(Debug, Default)]
pub struct DedupTracker {
    last_committed: Mutex<HashMap<String, PeriodId>>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from ledger contents, oldest commit first. Later entries
    /// for the same identity replace earlier ones.
    pub fn rebuild<I>(&self, pairs: I)
    where
        I: IntoIterator<Item = (String, PeriodId)>,
    {
        let mut map = self.lock();
        map.clear();
        for (identity, period) in pairs {
            map.insert(identity, period);
        }
    }

    /// Whether an attendance record is already committed for this
    /// identity in this period, as far as the cache knows.
    pub fn already_committed(&self, identity: &str, period: &PeriodId) -> bool {
        self.lock().get(identity) == Some(period)
    }

    /// Record a commit. Idempotent: marking the same (identity, period)
    /// twice leaves the tracker unchanged after the first call.
    pub fn mark_committed(&self, identity: &str, period: &PeriodId) {
        self.lock().insert(identity.to_string(), period.clone());
    }

    /// Number of identities with a cached commit.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PeriodId>> {
        // A poisoned cache is still just a cache; take the data as-is.
        self.last_committed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_identity_is_not_committed() {
        let tracker = DedupTracker::new();
        assert!(!tracker.already_committed("u1", &PeriodId::from("2025-06-01")));
    }

    #[test]
    fn test_mark_then_check() {
        let tracker = DedupTracker::new();
        let period = PeriodId::from("2025-06-01");
        tracker.mark_committed("u1", &period);
        assert!(tracker.already_committed("u1", &period));
        assert!(!tracker.already_committed("u2", &period));
    }

    #[test]
    fn test_mark_is_idempotent() {
        let tracker = DedupTracker::new();
        let period = PeriodId::from("2025-06-01");
        tracker.mark_committed("u1", &period);
        tracker.mark_committed("u1", &period);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.already_committed("u1", &period));
    }

    #[test]
    fn test_new_period_replaces_old() {
        let tracker = DedupTracker::new();
        let monday = PeriodId::from("2025-06-02");
        let tuesday = PeriodId::from("2025-06-03");
        tracker.mark_committed("u1", &monday);
        tracker.mark_committed("u1", &tuesday);
        assert!(tracker.already_committed("u1", &tuesday));
        assert!(!tracker.already_committed("u1", &monday));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_rebuild_keeps_latest_per_identity() {
        let tracker = DedupTracker::new();
        tracker.mark_committed("stale", &PeriodId::from("2025-05-30"));
        tracker.rebuild(vec![
            ("u1".to_string(), PeriodId::from("2025-06-01")),
            ("u2".to_string(), PeriodId::from("2025-06-01")),
            ("u1".to_string(), PeriodId::from("2025-06-02")),
        ]);
        assert_eq!(tracker.len(), 2);
        assert!(tracker.already_committed("u1", &PeriodId::from("2025-06-02")));
        assert!(!tracker.already_committed("u1", &PeriodId::from("2025-06-01")));
        assert!(tracker.already_committed("u2", &PeriodId::from("2025-06-01")));
        assert!(!tracker.already_committed("stale", &PeriodId::from("2025-05-30")));
    }
}
