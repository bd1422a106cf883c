use std::hash::{BuildHasher, Hash};

use foldhash::fast::FixedState;
use serde::{Deserialize, Serialize};

use crate::{Result, Take5Error};

/// Names the hash function behind the key hashes of a perfect-hash batch.
///
/// A table is only usable with the configuration it was built with, so the
/// config is plain serde data that can be stored next to the table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Take5HashConfig {
    pub name: String,
    /// Loader-specific parameters; the foldhash loader reads `seed`.
    pub parameters: serde_json::Value,
}

impl Default for Take5HashConfig {
    fn default() -> Self {
        Take5HashConfig {
            name: Take5DefaultHashLoader::NAME.to_string(),
            parameters: serde_json::json!({ "seed": 0 }),
        }
    }
}

impl Take5HashConfig {
    /// Replaces the `seed` parameter.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.parameters["seed"] = serde_json::json!(seed);
        self
    }
}

/// Turns a [`Take5HashConfig`] into the hasher that computes key hashes.
pub trait Take5HashLoader {
    type BuildHasher: BuildHasher;

    fn load(config: &Take5HashConfig) -> Result<Self::BuildHasher>;
}

/// Seeded foldhash; the loader [`PerfectHashBuilder`](crate::PerfectHashBuilder)
/// uses unless told otherwise.
#[derive(Debug, Default)]
pub struct Take5DefaultHashLoader;

impl Take5DefaultHashLoader {
    pub const NAME: &'static str = "foldhash";
}

impl Take5HashLoader for Take5DefaultHashLoader {
    type BuildHasher = FixedState;

    fn load(config: &Take5HashConfig) -> Result<Self::BuildHasher> {
        if config.name != Self::NAME {
            return Err(Take5Error::InvalidHashConfig(format!(
                "key hash loader {:?} cannot build {:?} hashers",
                Self::NAME,
                config.name
            )));
        }
        match config.parameters.get("seed") {
            Some(seed) => seed.as_u64().map(FixedState::with_seed).ok_or_else(|| {
                Take5Error::InvalidHashConfig(format!(
                    "key hash seed must be an unsigned 64-bit integer, got {seed}"
                ))
            }),
            None => Err(Take5Error::InvalidHashConfig(
                "key hash config has no seed".to_string(),
            )),
        }
    }
}

/// Computes the full 64-bit hash a perfect-hash table places keys by.
///
/// Its low 32 bits are the [`key_hash`]; the high bits keep distinct keys
/// apart when their 32-bit key hashes collide, which a batch of a few hundred
/// thousand keys all but guarantees.
#[inline]
pub fn placement_hash<S: BuildHasher, K: Hash + ?Sized>(build_hasher: &S, key: &K) -> u64 {
    build_hasher.hash_one(key)
}

/// Computes the 32-bit key hash stored in a perfect-hash pair.
#[inline]
pub fn key_hash<S: BuildHasher, K: Hash + ?Sized>(build_hasher: &S, key: &K) -> u32 {
    placement_hash(build_hasher, key) as u32
}

/// splitmix64 finalizer; the mixing step of the perfect-hash construction.
#[inline]
pub(crate) fn mix64(mut x: u64) -> u64 {
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
