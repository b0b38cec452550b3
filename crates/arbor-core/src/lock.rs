//! # Partition Locks
//!
//! Mutual exclusion for structural mutations, one lock per partition.
//!
//! A mutation acquires every partition it touches in one step, so two writers
//! can never deadlock by taking the same pair in opposite order. Reads never
//! take these locks.

use crate::Partition;
use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex, PoisonError};

/// The set of partitions currently held by a writer.
#[derive(Debug, Default)]
pub struct PartitionLocks {
    held: Mutex<BTreeSet<Partition>>,
    released: Condvar,
}

impl PartitionLocks {
    /// Create a lock table with nothing held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until every partition in `partitions` is free, then hold them all.
    ///
    /// The returned guard releases them on drop.
    pub fn acquire<I>(&self, partitions: I) -> PartitionGuard<'_>
    where
        I: IntoIterator<Item = Partition>,
    {
        let wanted: BTreeSet<Partition> = partitions.into_iter().collect();

        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while wanted.iter().any(|p| held.contains(p)) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.extend(wanted.iter().cloned());

        PartitionGuard {
            locks: self,
            partitions: wanted,
        }
    }

    /// Whether a writer currently holds `partition`.
    #[must_use]
    pub fn is_held(&self, partition: &Partition) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(partition)
    }
}

/// Holds a set of partitions until dropped.
#[derive(Debug)]
pub struct PartitionGuard<'a> {
    locks: &'a PartitionLocks,
    partitions: BTreeSet<Partition>,
}

impl PartitionGuard<'_> {
    /// The partitions this guard holds.
    #[must_use]
    pub fn partitions(&self) -> &BTreeSet<Partition> {
        &self.partitions
    }
}

impl Drop for PartitionGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for partition in &self.partitions {
            held.remove(partition);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn p(name: &str) -> Partition {
        Partition::new(name)
    }

    #[test]
    fn guard_releases_on_drop() {
        let locks = PartitionLocks::new();
        {
            let guard = locks.acquire([p("admin"), p("user")]);
            assert_eq!(guard.partitions().len(), 2);
            assert!(locks.is_held(&p("admin")));
            assert!(locks.is_held(&p("user")));
        }
        assert!(!locks.is_held(&p("admin")));
        assert!(!locks.is_held(&p("user")));
    }

    #[test]
    fn different_partitions_do_not_block() {
        let locks = PartitionLocks::new();
        let _admin = locks.acquire([p("admin")]);
        let _user = locks.acquire([p("user")]);
        assert!(locks.is_held(&p("admin")));
        assert!(locks.is_held(&p("user")));
    }

    #[test]
    fn same_partition_is_exclusive() {
        let locks = Arc::new(PartitionLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _guard = locks.acquire([p("admin")]);
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_inside.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(1));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread panicked");
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
