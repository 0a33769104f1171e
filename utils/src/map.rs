use std::hash::Hash;

use fnv::FnvHashMap;

/// Small-key lookup table backed by an FNV hasher.
///
/// Keys in this workspace are rotation indices and table identifiers, for
/// which FNV is faster than SipHash and collision resistance does not matter.
#[derive(Clone, Debug)]
pub struct Map<K, V>(pub FnvHashMap<K, V>);

impl<K: Eq + Hash, V> Map<K, V> {
    pub fn new() -> Self {
        Self(FnvHashMap::<K, V>::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(FnvHashMap::with_capacity_and_hasher(
            capacity,
            Default::default(),
        ))
    }

    pub fn insert(&mut self, k: K, data: V) -> Option<V> {
        self.0.insert(k, data)
    }

    pub fn get(&self, k: &K) -> Option<&V> {
        self.0.get(k)
    }

    pub fn contains_key(&self, k: &K) -> bool {
        self.0.contains_key(k)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.0.iter()
    }
}

impl<K: Eq + Hash, V> Default for Map<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for Map<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::Map;

    #[test]
    fn insert_get_replace() {
        let mut map: Map<usize, &str> = Map::new();
        assert!(map.is_empty());
        assert_eq!(map.insert(3, "a"), None);
        assert_eq!(map.insert(3, "b"), Some("a"));
        assert_eq!(map.get(&3), Some(&"b"));
        assert_eq!(map.get(&4), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn collect_from_pairs() {
        let map: Map<usize, usize> = (0..8).map(|i| (i, i * i)).collect();
        assert_eq!(map.len(), 8);
        assert!(map.contains_key(&7));
        assert_eq!(map.get(&5), Some(&25));
    }
}
