//! Fingerprint-indexed memoizing cache over a canonical item store.
//!
//! Items live once in a canonical store ordered by a caller-supplied
//! comparator. Each query fingerprint maps to the ordered keys of the items
//! its supplier produced; lookups rebuild the list from the canonical store.
//!
//! Two behaviours are kept on purpose and are visible to callers:
//!
//! - The canonical store deduplicates by the comparator, not by key. Two
//!   items that compare equal are one member and the earlier one wins, so a
//!   fingerprint whose items lost that race can no longer be rebuilt.
//! - [`IndexedCache::evict_all`] empties the canonical store but keeps the
//!   fingerprint index. Evicted fingerprints stay "known" to
//!   [`IndexedCache::contains_key`] while every lookup for them misses.
//!
//! Calling [`IndexedCache::evict_all`] while another task is rebuilding a
//! list has no defined outcome beyond memory safety: the rebuild may see the
//! store before or after the clear.

use std::cmp::Ordering;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};

use super::generation::Generation;

type Comparator<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;
type KeyFn<T, K> = Box<dyn Fn(&T) -> K + Send + Sync>;

/// Memoizes "list of items for a fingerprint" with lazy population.
pub struct IndexedCache<T, K> {
    store: RwLock<Vec<T>>,
    index: DashMap<String, Arc<[K]>>,
    generation: watch::Sender<Generation>,
    compare: Comparator<T>,
    key_of: KeyFn<T, K>,
}

impl<T, K> IndexedCache<T, K>
where
    T: Clone + Send + Sync,
    K: PartialEq + Send + Sync,
{
    /// Create an empty cache.
    ///
    /// `compare` orders (and deduplicates) the canonical store; `key_of`
    /// extracts the identity recorded in the fingerprint index.
    pub fn new(
        compare: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static, key_of: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Self {
        let (generation, _) = watch::channel(Generation::new());
        Self {
            store: RwLock::new(Vec::new()),
            index: DashMap::new(),
            generation,
            compare: Box::new(compare),
            key_of: Box::new(key_of),
        }
    }

    /// Return the cached list for `fingerprint`, populating it from `supplier` on first use.
    ///
    /// - Indexed fingerprint: the list is rebuilt from the canonical store and
    ///   `supplier` is not called. A rebuild with any missing key yields `None`.
    /// - Unknown fingerprint: `supplier` runs once. `None` or an empty list is
    ///   returned as `None` and nothing is recorded. Otherwise the items are
    ///   merged, the fingerprint is indexed, and the supplied list is returned.
    ///
    /// Errors from `supplier` are passed through and leave the cache untouched.
    pub async fn sync_or_fetch<F, Fut, E>(&self, fingerprint: &str, supplier: F) -> Result<Option<Vec<T>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Vec<T>>, E>>,
    {
        let indexed = self.index.get(fingerprint).map(|entry| Arc::clone(entry.value()));
        if let Some(keys) = indexed {
            let rebuilt = self.reconstruct(&keys).await;
            tracing::debug!(fingerprint, hit = rebuilt.is_some(), "indexed cache lookup");
            return Ok(rebuilt);
        }

        let items = match supplier().await? {
            Some(items) if !items.is_empty() => items,
            _ => {
                tracing::debug!(fingerprint, "supplier returned nothing, not caching");
                return Ok(None);
            }
        };

        self.merge(&items).await;

        let keys: Arc<[K]> = items.iter().map(|item| (self.key_of)(item)).collect();
        self.index.entry(fingerprint.to_string()).or_insert(keys);
        self.generation.send_replace(Generation::new());

        tracing::debug!(fingerprint, items = items.len(), "indexed cache populated");

        Ok(Some(items))
    }

    /// Whether `fingerprint` has been indexed.
    pub fn contains_key(&self, fingerprint: &str) -> bool {
        self.index.contains_key(fingerprint)
    }

    /// Clear the canonical store. The fingerprint index is kept.
    pub async fn evict_all(&self) {
        let mut store = self.store.write().await;
        let evicted = store.len();
        store.clear();
        drop(store);

        self.generation.send_replace(Generation::new());
        tracing::info!(evicted, fingerprints = self.index.len(), "canonical store evicted, index kept");
    }

    /// Clear the canonical store and forget every indexed fingerprint.
    pub async fn evict_all_including_index(&self) {
        let mut store = self.store.write().await;
        let evicted = store.len();
        store.clear();
        self.index.clear();
        drop(store);

        self.generation.send_replace(Generation::new());
        tracing::info!(evicted, "canonical store and fingerprint index evicted");
    }

    /// Current generation token.
    pub fn generation(&self) -> Generation {
        *self.generation.borrow()
    }

    /// Subscribe to generation changes.
    pub fn subscribe(&self) -> watch::Receiver<Generation> {
        self.generation.subscribe()
    }

    /// Number of members in the canonical store.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    /// Whether the canonical store holds no members.
    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    /// Number of indexed fingerprints.
    pub fn fingerprint_count(&self) -> usize {
        self.index.len()
    }

    async fn merge(&self, items: &[T]) {
        let mut store = self.store.write().await;
        for item in items {
            match store.binary_search_by(|probe| (self.compare)(probe, item)) {
                Ok(_) => tracing::trace!("comparator-equal member already stored, keeping the earlier one"),
                Err(pos) => store.insert(pos, item.clone()),
            }
        }
    }

    async fn reconstruct(&self, keys: &[K]) -> Option<Vec<T>> {
        let store = self.store.read().await;
        keys.iter()
            .map(|key| store.iter().find(|item| (self.key_of)(item) == *key).cloned())
            .collect()
    }
}
