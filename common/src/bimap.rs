use std::collections::HashMap;
use std::hash::Hash;

/// One-to-one map that can be queried from either side.
#[derive(Debug, Clone)]
pub struct BiMap<K, V> {
    forward: HashMap<K, V>,
    backward: HashMap<V, K>,
}

impl<K, V> BiMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        BiMap {
            forward: HashMap::new(),
            backward: HashMap::new(),
        }
    }

    /// Inserts the pair, dropping any previous pairing of either side.
    pub fn insert(&mut self, k: K, v: V) {
        if let Some(old_v) = self.forward.remove(&k) {
            self.backward.remove(&old_v);
        }
        if let Some(old_k) = self.backward.remove(&v) {
            self.forward.remove(&old_k);
        }
        self.forward.insert(k.clone(), v.clone());
        self.backward.insert(v, k);
    }

    pub fn get_by_key(&self, k: &K) -> Option<&V> {
        self.forward.get(k)
    }

    pub fn get_by_value(&self, v: &V) -> Option<&K> {
        self.backward.get(v)
    }

    pub fn remove_by_key(&mut self, k: &K) -> Option<V> {
        let v = self.forward.remove(k)?;
        self.backward.remove(&v);
        Some(v)
    }

    pub fn remove_by_value(&mut self, v: &V) -> Option<K> {
        let k = self.backward.remove(v)?;
        self.forward.remove(&k);
        Some(k)
    }

    pub fn contains_key(&self, k: &K) -> bool {
        self.forward.contains_key(k)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

impl<K: Hash + Eq + Clone, V: Hash + Eq + Clone> Default for BiMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
