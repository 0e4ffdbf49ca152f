//! Quota-pressure eviction
//!
//! Picks entries older than a fraction of their own TTL, oldest first, and
//! takes the older half of them. This is a heuristic: it guarantees progress
//! when anything qualifies but not a particular number of freed bytes.

/// Age fraction of TTL past which an entry may be evicted
pub const DEFAULT_AGE_RATIO: f64 = 0.5;

/// Eviction candidate: (scoped key, timestamp, ttl)
pub type Candidate = (String, u64, u64);

#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    age_ratio: f64,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            age_ratio: DEFAULT_AGE_RATIO,
        }
    }
}

impl EvictionPolicy {
    pub fn new(age_ratio: f64) -> Self {
        Self { age_ratio }
    }

    /// Choose the keys to evict from `candidates` at time `now`
    pub fn select(&self, candidates: Vec<Candidate>, now: u64) -> Vec<String> {
        let mut qualifying: Vec<Candidate> = candidates
            .into_iter()
            .filter(|(_, timestamp, ttl)| {
                let age = now.saturating_sub(*timestamp);
                age as f64 > *ttl as f64 * self.age_ratio
            })
            .collect();

        if qualifying.is_empty() {
            return Vec::new();
        }

        qualifying.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        // Round up so a single qualifying entry is still evicted
        let take = qualifying.len().div_ceil(2);
        qualifying
            .into_iter()
            .take(take)
            .map(|(key, _, _)| key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(key: &str, timestamp: u64, ttl: u64) -> Candidate {
        (key.to_string(), timestamp, ttl)
    }

    #[test]
    fn test_only_old_entries_qualify() {
        let now = 10_000;
        let mut candidates = Vec::new();
        for i in 0..10 {
            // age 6000..=6900 of ttl 10000, past half
            candidates.push(candidate(&format!("old{i}"), 3_100 + i * 100, 10_000));
        }
        for i in 0..5 {
            // age 1000 of ttl 10000
            candidates.push(candidate(&format!("young{i}"), 9_000, 10_000));
        }

        let victims = EvictionPolicy::default().select(candidates, now);
        assert!(victims.len() >= 5);
        assert!(victims.iter().all(|k| k.starts_with("old")));
        // Oldest timestamps go first
        assert_eq!(victims[0], "old0");
    }

    #[test]
    fn test_single_candidate_is_evicted() {
        let victims = EvictionPolicy::default().select(vec![candidate("a", 0, 100)], 51);
        assert_eq!(victims, vec!["a".to_string()]);
    }

    #[test]
    fn test_nothing_qualifies() {
        let victims = EvictionPolicy::default().select(vec![candidate("a", 0, 100)], 50);
        assert!(victims.is_empty());
    }

    #[test]
    fn test_odd_count_rounds_up() {
        let candidates = (0..3).map(|i| candidate(&format!("k{i}"), i, 10)).collect();
        assert_eq!(EvictionPolicy::default().select(candidates, 100).len(), 2);
    }
}
