use std::hash::{BuildHasher, Hash};

use crate::hasher::placement_hash;

/// Internal key-value pair used while assigning perfect-hash indices.
///
/// The key hash is computed once up front; the index is written exactly once
/// by [`PerfectHashBuilder`](crate::PerfectHashBuilder) and read back by the
/// serializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfhashKeyValuePair<K, V> {
    pub key: K,
    pub value: V,
    hash: u64,
    index: Option<u32>,
}

impl<K, V> PerfhashKeyValuePair<K, V> {
    /// Creates a pair from a bare 32-bit key hash.
    ///
    /// Without the high bits the builder cannot separate two keys whose key
    /// hashes collide; prefer [`hashed`](Self::hashed) for real key sets.
    pub fn new(key: K, value: V, key_hash: u32) -> Self {
        Self::with_placement_hash(key, value, key_hash as u64)
    }

    /// Creates a pair from a precomputed 64-bit placement hash.
    pub fn with_placement_hash(key: K, value: V, hash: u64) -> Self {
        Self {
            key,
            value,
            hash,
            index: None,
        }
    }

    /// Creates a pair, hashing `key` with `build_hasher`.
    pub fn hashed<S: BuildHasher>(key: K, value: V, build_hasher: &S) -> Self
    where
        K: Hash,
    {
        let hash = placement_hash(build_hasher, &key);
        Self::with_placement_hash(key, value, hash)
    }

    /// Low 32 bits of the placement hash.
    pub fn key_hash(&self) -> u32 {
        self.hash as u32
    }

    /// Hash the builder places this pair by; feed it to
    /// [`PerfectHashTable::slot_of`](crate::PerfectHashTable::slot_of).
    pub fn placement_hash(&self) -> u64 {
        self.hash
    }

    /// Assigned dense index, `None` until the builder has run.
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    pub(crate) fn assign(&mut self, index: u32) {
        debug_assert!(self.index.is_none(), "index assigned twice");
        self.index = Some(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Take5DefaultHashLoader, Take5HashConfig, Take5HashLoader, key_hash};

    #[test]
    fn test_pair_starts_unassigned() {
        let hasher = Take5DefaultHashLoader::load(&Take5HashConfig::default()).unwrap();
        let mut pair = PerfhashKeyValuePair::hashed("apple", 1u32, &hasher);
        assert_eq!(pair.key_hash(), key_hash(&hasher, &"apple"));
        assert_eq!(pair.placement_hash(), placement_hash(&hasher, &"apple"));
        assert_eq!(pair.placement_hash() as u32, pair.key_hash());
        assert_eq!(pair.index(), None);

        pair.assign(3);
        assert_eq!(pair.index(), Some(3));
    }
}
