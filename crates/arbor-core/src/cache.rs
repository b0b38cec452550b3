//! # Forest Cache
//!
//! Process-wide cache of built forests, keyed by partition and view.
//!
//! There is no expiry. Every successful mutation must call
//! `CacheInvalidator::invalidate` for each partition it touched; the
//! `TreeService` is the only mutation path and does so before releasing its
//! partition lock.
//!
//! Each partition carries a generation counter. A forest is only stored if no
//! invalidation happened between the start of its build and the store, so a
//! slow reader can never write back a tree built from a pre-mutation snapshot.

use crate::{Partition, tree::Forest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

// =============================================================================
// KEYS
// =============================================================================

/// Which nodes a cached forest contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TreeView {
    /// Active nodes only (display trees).
    Active,
    /// Every node (admin listing).
    All,
}

impl TreeView {
    /// View for an `include_inactive` flag.
    #[must_use]
    pub const fn from_include_inactive(include_inactive: bool) -> Self {
        if include_inactive { Self::All } else { Self::Active }
    }

    /// Every view, for invalidation.
    pub const ALL_VIEWS: [Self; 2] = [Self::Active, Self::All];
}

/// Cache key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub partition: Partition,
    pub view: TreeView,
}

impl CacheKey {
    #[must_use]
    pub fn new(partition: Partition, view: TreeView) -> Self {
        Self { partition, view }
    }
}

// =============================================================================
// CACHE BACKEND
// =============================================================================

/// Key-value backend with explicit deletion and no expiry.
pub trait ForestCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<Forest>>;
    fn set(&self, key: CacheKey, forest: Arc<Forest>);
    fn delete(&self, key: &CacheKey);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process cache backend.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<BTreeMap<CacheKey, Arc<Forest>>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ForestCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<Forest>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: CacheKey, forest: Arc<Forest>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, forest);
    }

    fn delete(&self, key: &CacheKey) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// =============================================================================
// INVALIDATOR
// =============================================================================

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub entries: usize,
}

/// Single entry point for cached forest reads and their invalidation.
#[derive(Debug)]
pub struct CacheInvalidator<C: ForestCache = MemoryCache> {
    cache: C,
    generations: Mutex<BTreeMap<Partition, u64>>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl Default for CacheInvalidator<MemoryCache> {
    fn default() -> Self {
        Self::new(MemoryCache::new())
    }
}

impl<C: ForestCache> CacheInvalidator<C> {
    /// Wrap a cache backend.
    pub fn new(cache: C) -> Self {
        Self {
            cache,
            generations: Mutex::new(BTreeMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Return the cached forest, or build, store and return it.
    ///
    /// `build` runs without any cache lock held. Its result is returned even
    /// when a concurrent invalidation prevents it from being stored.
    pub fn get_or_build<E, F>(&self, key: CacheKey, build: F) -> Result<Arc<Forest>, E>
    where
        F: FnOnce() -> Result<Forest, E>,
    {
        if let Some(forest) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(forest);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let generation = self.generation(&key.partition);
        let forest = Arc::new(build()?);

        let generations = self.lock_generations();
        if generations.get(&key.partition).copied().unwrap_or(0) == generation {
            self.cache.set(key, Arc::clone(&forest));
        } else {
            tracing::debug!(
                partition = %key.partition,
                "partition changed during build, result not cached"
            );
        }
        Ok(forest)
    }

    /// Drop every cached view of `partition`.
    pub fn invalidate(&self, partition: &Partition) {
        let mut generations = self.lock_generations();
        let next = generations
            .get(partition)
            .copied()
            .unwrap_or(0)
            .wrapping_add(1);
        generations.insert(partition.clone(), next);
        for view in TreeView::ALL_VIEWS {
            self.cache.delete(&CacheKey::new(partition.clone(), view));
        }
        drop(generations);

        self.invalidations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(partition = %partition, "tree cache invalidated");
    }

    /// Whether a view of `partition` is currently cached.
    #[must_use]
    pub fn is_cached(&self, key: &CacheKey) -> bool {
        self.cache.get(key).is_some()
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries: self.cache.len(),
        }
    }

    fn generation(&self, partition: &Partition) -> u64 {
        self.lock_generations()
            .get(partition)
            .copied()
            .unwrap_or(0)
    }

    fn lock_generations(&self) -> std::sync::MutexGuard<'_, BTreeMap<Partition, u64>> {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// TESTS
// =============================================================================
