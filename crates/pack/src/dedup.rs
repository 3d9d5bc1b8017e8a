use ctpack_identity::{Category, ContentHash};
use parking_lot::Mutex;
use std::collections::HashSet;

/// Remembers which canonical identities have been admitted to the pack.
///
/// Identities are tracked per category, so the same hash may appear once as
/// a race track and once as a battle arena. Cheap to share behind an `Arc`;
/// the lock is only ever held for a single set insertion.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<(Category, ContentHash)>>,
}
impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` the first time a `(category, hash)` pair is offered, `false`
    /// for every repeat.
    pub fn admit(&self, category: Category, hash: &ContentHash) -> bool {
        self.seen.lock().insert((category, *hash))
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn h(n: u8) -> ContentHash {
        ContentHash::from_bytes([n; ContentHash::LEN])
    }

    #[test]
    fn test_first_admit_only() {
        let dedup = Deduplicator::new();
        assert!(dedup.admit(Category::Race, &h(1)));
        assert!(!dedup.admit(Category::Race, &h(1)));
        assert!(dedup.admit(Category::Race, &h(2)));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_categories_are_independent() {
        let dedup = Deduplicator::new();
        assert!(dedup.admit(Category::Race, &h(1)));
        assert!(dedup.admit(Category::Battle, &h(1)));
        assert!(!dedup.admit(Category::Battle, &h(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admits_of_one_pair() {
        let dedup = Arc::new(Deduplicator::new());
        let admitted = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(tokio::sync::Barrier::new(32));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let (dedup, admitted, barrier) = (dedup.clone(), admitted.clone(), barrier.clone());
                tokio::spawn(async move {
                    barrier.wait().await;
                    if dedup.admit(Category::Race, &h(7)) {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(admitted.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.len(), 1);
    }
}
