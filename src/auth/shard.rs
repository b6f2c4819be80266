//! Sharded mutex map used by the penalty and session tables.
//!
//! Keys hash to one of a fixed number of shards, each behind its own
//! `std::sync::Mutex`. Operations on the same key serialize on one shard;
//! operations on different keys usually land on different shards and do not
//! contend. Closures run with the shard lock held and must not block.

use std::{
    collections::HashMap,
    hash::{BuildHasher, Hash, RandomState},
    sync::{Mutex, MutexGuard, PoisonError},
};

const DEFAULT_SHARDS: usize = 16;

pub(crate) struct ShardedMap<K, V> {
    shards: Box<[Mutex<HashMap<K, V>>]>,
    hasher: RandomState,
}

impl<K, V> ShardedMap<K, V>
where
    K: Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub(crate) fn with_shards(count: usize) -> Self {
        let shards = (0..count.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, key: &K) -> MutexGuard<'_, HashMap<K, V>> {
        let index = usize::try_from(self.hasher.hash_one(key) % self.shards.len() as u64)
            .unwrap_or_default();
        // A panic while holding a shard cannot leave a map entry half-written,
        // so recover the guard instead of propagating the poison.
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the shard owning `key`, atomically with respect to
    /// every other operation on that key.
    pub(crate) fn with_entry<R>(&self, key: &K, f: impl FnOnce(&mut HashMap<K, V>) -> R) -> R {
        let mut shard = self.shard(key);
        f(&mut shard)
    }

    pub(crate) fn insert(&self, key: K, value: V) -> Option<V> {
        let mut shard = self.shard(&key);
        shard.insert(key, value)
    }

    pub(crate) fn remove(&self, key: &K) -> Option<V> {
        self.shard(key).remove(key)
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.shard(key).contains_key(key)
    }

    /// Drop entries that fail `keep`, one shard at a time.
    pub(crate) fn retain(&self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        for shard in &*self.shards {
            shard
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|key, value| keep(key, value));
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }
}

impl<K, V> Default for ShardedMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::ShardedMap;

    #[test]
    fn insert_remove_contains() {
        let map = ShardedMap::new();
        assert!(!map.contains(&"a"));
        assert_eq!(map.insert("a", 1), None);
        assert_eq!(map.insert("a", 2), Some(1));
        assert!(map.contains(&"a"));
        assert_eq!(map.remove(&"a"), Some(2));
        assert!(!map.contains(&"a"));
    }

    #[test]
    fn retain_spans_all_shards() {
        let map = ShardedMap::with_shards(4);
        for i in 0..64 {
            map.insert(i, i);
        }
        assert_eq!(map.len(), 64);
        map.retain(|key, _| key % 2 == 0);
        assert_eq!(map.len(), 32);
        assert!(map.contains(&2));
        assert!(!map.contains(&3));
    }

    #[test]
    fn zero_shards_falls_back_to_one() {
        let map = ShardedMap::with_shards(0);
        map.insert("k", ());
        assert!(map.contains(&"k"));
    }

    #[test]
    fn with_entry_reads_and_writes_atomically() {
        let map = ShardedMap::new();
        let previous = map.with_entry(&"k", |entries| entries.insert("k", 1));
        assert_eq!(previous, None);
        let value = map.with_entry(&"k", |entries| entries.get(&"k").copied());
        assert_eq!(value, Some(1));
    }
}
