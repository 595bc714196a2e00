use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Per-host record of when the most recent fetch started
///
/// Backed by a sharded concurrent map so that updates to one host never
/// serialize lookups for unrelated hosts. Entries are overwritten
/// (last write wins) and never evicted.
#[derive(Debug, Default)]
pub struct PolitenessTracker {
    last_visit: DashMap<String, DateTime<Utc>>,
}

impl PolitenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a fetch to `domain` started at `at`
    pub fn record_visit_start(&self, domain: &str, at: DateTime<Utc>) {
        self.last_visit.insert(domain.to_string(), at);
    }

    /// Stamps a fetch start at `now` unless the last one began less than `delay` ago
    ///
    /// The check and the stamp happen under the entry lock for `domain`, so of
    /// two callers racing on one host only the first gets through.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The visit start was recorded
    /// * `Err(ready_at)` - Too early; the host is free again at `ready_at`
    pub fn try_begin_visit(
        &self,
        domain: &str,
        delay: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), DateTime<Utc>> {
        match self.last_visit.entry(domain.to_string()) {
            Entry::Occupied(mut entry) => {
                let last = *entry.get();
                if delay > Duration::zero() && now - last < delay {
                    return Err(last + delay);
                }
                entry.insert(last.max(now));
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
            }
        }
        Ok(())
    }

    /// When the last fetch to `domain` started, if ever
    pub fn last_visit(&self, domain: &str) -> Option<DateTime<Utc>> {
        self.last_visit.get(domain).map(|entry| *entry)
    }

    /// Time elapsed since the last fetch to `domain` started
    pub fn time_since_last_visit(&self, domain: &str, now: DateTime<Utc>) -> Option<Duration> {
        self.last_visit(domain).map(|last| now - last)
    }

    /// Earliest time the next fetch to `domain` may start, when that is after `now`
    pub fn ready_at(
        &self,
        domain: &str,
        delay: Duration,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let last = self.last_visit(domain)?;
        if now - last < delay {
            Some(last + delay)
        } else {
            None
        }
    }

    /// Number of distinct hosts seen
    pub fn len(&self) -> usize {
        self.last_visit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_visit.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_unknown_domain_has_no_visit() {
        let tracker = PolitenessTracker::new();
        assert!(tracker.last_visit("a.test").is_none());
        assert!(tracker.time_since_last_visit("a.test", Utc::now()).is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_record_and_measure() {
        let tracker = PolitenessTracker::new();
        let start = Utc::now();
        tracker.record_visit_start("a.test", start);

        let elapsed = tracker
            .time_since_last_visit("a.test", start + Duration::milliseconds(250))
            .unwrap();
        assert_eq!(elapsed, Duration::milliseconds(250));
    }

    #[test]
    fn test_last_write_wins() {
        let tracker = PolitenessTracker::new();
        let first = Utc::now();
        let second = first - Duration::seconds(30);
        tracker.record_visit_start("a.test", first);
        tracker.record_visit_start("a.test", second);
        assert_eq!(tracker.last_visit("a.test"), Some(second));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_ready_at() {
        let tracker = PolitenessTracker::new();
        let start = Utc::now();
        let delay = Duration::seconds(1);
        tracker.record_visit_start("a.test", start);

        assert_eq!(
            tracker.ready_at("a.test", delay, start + Duration::milliseconds(100)),
            Some(start + delay)
        );
        assert_eq!(tracker.ready_at("a.test", delay, start + delay), None);
        assert_eq!(tracker.ready_at("b.test", delay, start), None);
    }

    #[test]
    fn test_try_begin_visit_stamps_when_free() {
        let tracker = PolitenessTracker::new();
        let start = Utc::now();
        let delay = Duration::seconds(1);

        assert_eq!(tracker.try_begin_visit("a.test", delay, start), Ok(()));
        assert_eq!(tracker.last_visit("a.test"), Some(start));

        let later = start + delay;
        assert_eq!(tracker.try_begin_visit("a.test", delay, later), Ok(()));
        assert_eq!(tracker.last_visit("a.test"), Some(later));
    }

    #[test]
    fn test_try_begin_visit_refuses_inside_delay() {
        let tracker = PolitenessTracker::new();
        let start = Utc::now();
        let delay = Duration::seconds(1);
        tracker.try_begin_visit("a.test", delay, start).unwrap();

        let early = start + Duration::milliseconds(300);
        assert_eq!(
            tracker.try_begin_visit("a.test", delay, early),
            Err(start + delay)
        );
        // A refused attempt leaves the original stamp in place
        assert_eq!(tracker.last_visit("a.test"), Some(start));
        assert_eq!(tracker.try_begin_visit("b.test", delay, early), Ok(()));
    }

    #[test]
    fn test_try_begin_visit_without_delay_never_refuses() {
        let tracker = PolitenessTracker::new();
        let later = Utc::now();
        let earlier = later - Duration::milliseconds(5);
        tracker.try_begin_visit("a.test", Duration::zero(), later).unwrap();

        // A caller that read the clock just before the last stamp
        assert_eq!(tracker.try_begin_visit("a.test", Duration::zero(), earlier), Ok(()));
        assert_eq!(tracker.last_visit("a.test"), Some(later));
    }

    #[test]
    fn test_try_begin_visit_admits_one_racer() {
        let tracker = Arc::new(PolitenessTracker::new());
        let now = Utc::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    tracker
                        .try_begin_visit("a.test", Duration::seconds(10), now)
                        .is_ok()
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_concurrent_updates_for_distinct_domains() {
        let tracker = Arc::new(PolitenessTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        tracker.record_visit_start(&format!("host{}-{}.test", i, j), Utc::now());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.len(), 800);
    }
}
