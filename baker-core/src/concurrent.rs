//! Thin, generic wrappers over `dashmap::DashMap`, grounded on
//! `ando-store::cache::ConfigCache` and `ando-core::router::Router`'s use of
//! `DashMap` as the concurrent source-of-truth store.

use std::hash::Hash;

use dashmap::{DashMap, DashSet};

pub struct ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    inner: DashMap<K, V>,
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self { inner: DashMap::new() }
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner.get(key).map(|r| r.value().clone())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter_values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.inner.iter().map(|r| r.value().clone()).collect()
    }

    /// Atomic get-or-insert-then-update, single critical section.
    ///
    /// `on_miss` builds the value to install when absent; `on_hit` receives
    /// the current value and returns the value to keep installed. Grounded
    /// on `MiddlewareCache.GetAndUpdate`'s atomicity contract (spec.md §5):
    /// exactly one of the two closures observes/produces the installed
    /// value per call.
    pub fn get_and_update<F, G>(&self, key: K, on_miss: F, on_hit: G) -> V
    where
        F: FnOnce() -> V,
        G: FnOnce(&V) -> V,
    {
        let mut entry = self.inner.entry(key).or_insert_with(on_miss);
        let updated = on_hit(&entry);
        *entry = updated;
        entry.value().clone()
    }
}

impl<K, V> Default for ConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

pub struct ConcurrentSet<T>
where
    T: Eq + Hash,
{
    inner: DashSet<T>,
}

impl<T> ConcurrentSet<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self { inner: DashSet::new() }
    }

    pub fn insert(&self, value: T) -> bool {
        self.inner.insert(value)
    }

    pub fn remove(&self, value: &T) -> bool {
        self.inner.remove(value).is_some()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.inner.contains(value)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T> Default for ConcurrentSet<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
