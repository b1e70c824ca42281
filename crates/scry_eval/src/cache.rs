// ==============================================================================
// Memoization Cache
// ==============================================================================
//
// One `MemoCache` per operation, owned by the session (the operation
// identifier of a classic `(op, key)` cache is realized as the cache field
// itself, which keeps values monomorphic). Entries never outlive the session.
//
// The protocol is split into `lookup` / `begin` / `finish` / `cancel` rather
// than a single `get_or_compute` closure because the computation needs the
// `&mut Session` that owns the cache; callers sequence the steps around their
// own compute call (see `guarded_evaluate` and the search-path resolver).

use std::hash::Hash;

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry<V> {
    /// Inserted by `begin` before the computation runs: re-entrant lookups
    /// observe the caller-supplied default instead of recursing. Must never
    /// survive the computation — `finish` overwrites it, `cancel` removes it.
    Provisional(V),
    Computed(V),
}

/// Session-scoped memoization for one operation. A computed-but-empty value
/// is a real entry, distinct from "never computed".
#[derive(Debug)]
pub struct MemoCache<K, V> {
    entries: FxHashMap<K, Entry<V>>,
}

impl<K, V> Default for MemoCache<K, V> {
    fn default() -> Self {
        MemoCache {
            entries: FxHashMap::default(),
        }
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Previously computed (or in-flight provisional) value for `key`.
    pub fn lookup(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| match entry {
            Entry::Provisional(value) | Entry::Computed(value) => value.clone(),
        })
    }

    /// Install the default a re-entrant call should observe while the real
    /// computation for `key` is running.
    pub fn begin(&mut self, key: K, default_on_absent: V) {
        self.entries
            .entry(key)
            .or_insert(Entry::Provisional(default_on_absent));
    }

    /// Record the computed value, replacing any provisional entry.
    pub fn finish(&mut self, key: K, value: V) {
        self.entries.insert(key, Entry::Computed(value));
    }

    /// Drop the in-flight entry after a failed computation; failures are not
    /// cached, the next call retries.
    pub fn cancel(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// True once `key` has a completed (non-provisional) result.
    pub fn is_computed(&self, key: &K) -> bool {
        matches!(self.entries.get(key), Some(Entry::Computed(_)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
