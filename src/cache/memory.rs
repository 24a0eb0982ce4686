//! Bounded in-process cache tier

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct Entry {
    value: Vec<u8>,
    /// `None` when the TTL is too large to represent
    expires_at: Option<Instant>,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    /// Keys in first-insertion order; the front is evicted first
    order: VecDeque<String>,
}

/// In-process key/value store with per-entry expiry.
///
/// When full, exactly one entry is evicted before an insert: the oldest
/// inserted key, regardless of how recently it was read. Overwriting a key
/// keeps its original position.
pub struct MemoryTier {
    capacity: usize,
    state: Mutex<State>,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(State::default()),
        }
    }

    /// Value for `key` if present and not yet expired
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut state = self.lock();
        let now = Instant::now();

        match state.entries.get(key) {
            Some(entry) if entry.expires_at.map_or(true, |at| now < at) => {
                Some(entry.value.clone())
            }
            Some(_) => {
                state.entries.remove(key);
                state.order.retain(|k| k != key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let mut state = self.lock();

        if state.entries.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }

        let entry = Entry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        if state.entries.insert(key.to_string(), entry).is_none() {
            state.order.push_back(key.to_string());
        }
    }

    pub fn remove(&self, key: &str) {
        let mut state = self.lock();
        if state.entries.remove(key).is_some() {
            state.order.retain(|k| k != key);
        }
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Number of stored entries, expired ones included until they are read
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_set_then_get() {
        let tier = MemoryTier::new(10);
        tier.set("a", vec![1, 2, 3], HOUR);
        assert_eq!(tier.get("a"), Some(vec![1, 2, 3]));
        assert_eq!(tier.get("missing"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_a_miss() {
        let tier = MemoryTier::new(10);
        tier.set("a", vec![1], Duration::from_secs(5));

        tokio::time::advance(Duration::from_millis(4999)).await;
        assert_eq!(tier.get("a"), Some(vec![1]));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(tier.get("a"), None);
        assert!(tier.is_empty());
    }

    #[test]
    fn test_evicts_oldest_insert_when_full() {
        let tier = MemoryTier::new(3);
        tier.set("a", vec![1], HOUR);
        tier.set("b", vec![2], HOUR);
        tier.set("c", vec![3], HOUR);

        // reading "a" does not protect it
        assert!(tier.get("a").is_some());
        tier.set("d", vec![4], HOUR);

        assert_eq!(tier.len(), 3);
        assert_eq!(tier.get("a"), None);
        assert!(tier.get("b").is_some());
        assert!(tier.get("d").is_some());
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let tier = MemoryTier::new(2);
        tier.set("a", vec![1], HOUR);
        tier.set("b", vec![2], HOUR);
        // full: evicts "a" even though "b" is being overwritten
        tier.set("b", vec![20], HOUR);

        assert_eq!(tier.get("a"), None);
        assert_eq!(tier.get("b"), Some(vec![20]));
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let tier = MemoryTier::new(2);
        tier.set("a", vec![1], Duration::MAX);
        tier.set("b", vec![2], Duration::from_secs(u64::MAX));
        assert_eq!(tier.get("a"), Some(vec![1]));
        assert_eq!(tier.get("b"), Some(vec![2]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_respect_capacity() {
        let tier = Arc::new(MemoryTier::new(8));

        let handles: Vec<_> = (0..16)
            .map(|task| {
                let tier = tier.clone();
                tokio::spawn(async move {
                    for i in 0..50 {
                        tier.set(&format!("{}-{}", task, i), vec![task as u8], HOUR);
                        assert!(tier.len() <= 8);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(tier.len(), 8);
        let state = tier.lock();
        assert_eq!(state.order.len(), state.entries.len());
        assert!(state.order.iter().all(|k| state.entries.contains_key(k)));
    }

    #[test]
    fn test_remove_and_clear() {
        let tier = MemoryTier::new(4);
        tier.set("a", vec![1], HOUR);
        tier.set("b", vec![2], HOUR);
        tier.remove("a");
        assert_eq!(tier.get("a"), None);
        assert_eq!(tier.len(), 1);

        tier.clear();
        assert!(tier.is_empty());
    }
}
