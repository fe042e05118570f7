//! Disposable key/value read models.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

/// Key/value store abstraction for disposable read models.
///
/// Projections own the write side; queries own the read side. Everything here
/// is rebuildable from the event store, so loss is never data loss.
pub trait KeyedStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;
    fn upsert(&self, key: K, value: V);
    fn remove(&self, key: &K);
    fn list(&self) -> Vec<V>;
    /// Drop every record (rebuild support).
    fn clear(&self);
}

impl<K, V, S> KeyedStore<K, V> for Arc<S>
where
    S: KeyedStore<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn upsert(&self, key: K, value: V) {
        (**self).upsert(key, value)
    }

    fn remove(&self, key: &K) {
        (**self).remove(key)
    }

    fn list(&self) -> Vec<V> {
        (**self).list()
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// In-memory keyed store for tests/dev.
#[derive(Debug)]
pub struct InMemoryKeyedStore<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> InMemoryKeyedStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryKeyedStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> KeyedStore<K, V> for InMemoryKeyedStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(key).cloned()
    }

    fn upsert(&self, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(key, value);
        }
    }

    fn remove(&self, key: &K) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(key);
        }
    }

    fn list(&self) -> Vec<V> {
        match self.inner.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => vec![],
        }
    }

    fn clear(&self) {
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
    }
}
