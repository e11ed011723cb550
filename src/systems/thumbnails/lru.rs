use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
};

/// Recency order over keys. Every `touch` moves a key to the most recent end;
/// `pop_oldest` hands back the least recently touched one.
#[derive(Debug, Clone)]
pub struct LruOrder<K> {
    stamps: HashMap<K, u64>,
    order: BTreeMap<u64, K>,
    next_stamp: u64,
}

impl<K> Default for LruOrder<K> {
    fn default() -> Self {
        Self {
            stamps: HashMap::new(),
            order: BTreeMap::new(),
            next_stamp: 0,
        }
    }
}

impl<K: Eq + Hash + Clone> LruOrder<K> {
    pub fn touch(&mut self, key: &K) {
        if let Some(stamp) = self.stamps.get(key) {
            self.order.remove(stamp);
        }
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.stamps.insert(key.clone(), stamp);
        self.order.insert(stamp, key.clone());
    }

    pub fn pop_oldest(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    /// Least recently used first.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.order.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_moves_key_to_most_recent() {
        let mut lru = LruOrder::default();
        for key in ["a", "b", "c"] {
            lru.touch(&key);
        }
        lru.touch(&"a");
        assert_eq!(lru.iter().copied().collect::<Vec<_>>(), vec!["b", "c", "a"]);
        assert_eq!(lru.len(), 3);
    }

    #[test]
    fn pop_forgets_keys_oldest_first() {
        let mut lru = LruOrder::default();
        lru.touch(&1);
        lru.touch(&2);
        lru.touch(&3);
        lru.touch(&1);
        assert_eq!(lru.pop_oldest(), Some(2));
        assert_eq!(lru.pop_oldest(), Some(3));
        assert_eq!(lru.pop_oldest(), Some(1));
        assert_eq!(lru.pop_oldest(), None);
        assert_eq!(lru.len(), 0);
        lru.touch(&2);
        assert_eq!(lru.iter().copied().collect::<Vec<_>>(), vec![2]);
    }
}
