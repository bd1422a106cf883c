use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::hasher::mix64;
use crate::{
    PerfectHashInfo, PerfhashKeyValuePair, Result, Take5DefaultHashLoader, Take5Error,
    Take5HashConfig, Take5HashLoader,
};

const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;

/// Builder that assigns every key of a batch a dense, collision-free index.
///
/// Keys are distributed into buckets by their precomputed key hash, and the
/// high bits of their placement hash separate keys whose 32-bit key hashes
/// collide. Buckets are then placed one at a time, largest first, by searching for the first
/// displacement that moves every key of the bucket onto a free slot. The
/// resulting assignment is minimal: a batch of `N` pairs receives exactly the
/// indices `0..N`.
///
/// Construction is deterministic for a fixed batch order, hash configuration
/// and seed. A bucket that cannot be placed within the search window abandons
/// the attempt, which is retried with a new seed and more buckets; the builder
/// never emits duplicate indices.
///
/// The loader type parameter `H` selects the [`Take5HashLoader`] used by
/// [`pairs`](Self::pairs) to compute key hashes.
#[derive(Debug)]
pub struct PerfectHashBuilder<H: Take5HashLoader = Take5DefaultHashLoader> {
    hash_config: Take5HashConfig,
    seed: u64,
    load_factor: f64,
    max_displacement: Option<u64>,
    max_attempts: u32,
    phantom: std::marker::PhantomData<H>,
}

impl<H: Take5HashLoader> Default for PerfectHashBuilder<H> {
    fn default() -> Self {
        Self {
            hash_config: Take5HashConfig::default(),
            seed: 0,
            load_factor: 4.0,
            max_displacement: None,
            max_attempts: 16,
            phantom: std::marker::PhantomData,
        }
    }
}

impl PerfectHashBuilder {
    /// Creates a new default builder with the default hash loader.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        <Self as Default>::default()
    }
}

impl<H: Take5HashLoader> PerfectHashBuilder<H> {
    /// Replaces the hash configuration used to compute key hashes.
    pub fn with_hash_config(mut self, config: Take5HashConfig) -> Self {
        self.hash_config = config;
        self
    }

    /// Overrides the seed of the key hash function.
    pub fn with_hash_seed(mut self, seed: u64) -> Self {
        self.hash_config = self.hash_config.with_seed(seed);
        self
    }

    /// Overrides the seed of the first placement attempt.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the target number of keys per bucket.
    ///
    /// Larger buckets shrink the displacement table but make placement of the
    /// fullest buckets harder.
    pub fn with_load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Caps the number of displacements tried per bucket.
    ///
    /// Defaults to sixteen sweeps of the whole index space.
    pub fn with_max_displacement(mut self, limit: u64) -> Self {
        self.max_displacement = Some(limit);
        self
    }

    /// Sets how many seeds are tried before giving up.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Wraps key-value entries into pairs, hashing each key with the
    /// configured hash function.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHashConfig`](Take5Error::InvalidHashConfig) when the
    /// loader rejects the configuration.
    pub fn pairs<K, V>(
        &self,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Vec<PerfhashKeyValuePair<K, V>>>
    where
        K: std::hash::Hash,
    {
        let build_hasher = H::load(&self.hash_config)?;
        Ok(entries
            .into_iter()
            .map(|(key, value)| PerfhashKeyValuePair::hashed(key, value, &build_hasher))
            .collect())
    }

    /// Consumes the builder and assigns an index to every pair in `pairs`.
    ///
    /// On success every pair carries an index in `0..pairs.len()`, no two
    /// alike, and the returned [`PerfectHashTable`] reproduces each index from
    /// the pair's placement hash.
    ///
    /// # Errors
    ///
    /// - [`IndexAlreadyAssigned`](Take5Error::IndexAlreadyAssigned) if a pair
    ///   went through a builder before.
    /// - [`DuplicateKeyHash`](Take5Error::DuplicateKeyHash) if two pairs share
    ///   a full 64-bit placement hash, which distinct keys hashed through
    ///   [`pairs`](Self::pairs) do not in practice.
    /// - [`PerfectHashConstructionFailed`](Take5Error::PerfectHashConstructionFailed)
    ///   if every attempt exhausted its search window.
    ///
    /// # Examples
    ///
    /// ```
    /// use take5::PerfectHashBuilder;
    ///
    /// # fn main() -> take5::Result<()> {
    /// let builder = PerfectHashBuilder::default();
    /// let mut pairs = builder.pairs([("it", 1u32), ("works", 2u32)])?;
    /// let (table, info) = builder.build(&mut pairs)?;
    /// assert_eq!(info.entry_count, 2);
    /// for pair in &pairs {
    ///     assert_eq!(table.slot_of(pair.placement_hash()), pair.index());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn build<K, V>(
        self,
        pairs: &mut [PerfhashKeyValuePair<K, V>],
    ) -> Result<(PerfectHashTable, PerfectHashInfo)> {
        if let Some(position) = pairs.iter().position(|pair| pair.index().is_some()) {
            return Err(Take5Error::IndexAlreadyAssigned { position });
        }

        let n = pairs.len();
        if n == 0 {
            let table = PerfectHashTable {
                seed: self.seed,
                slot_count: 0,
                displacements: Vec::new(),
            };
            let info = PerfectHashInfo {
                seed: self.seed,
                ..Default::default()
            };
            return Ok((table, info));
        }
        if n > u32::MAX as usize {
            return Err(Take5Error::PerfectHashConstructionFailed {
                keys: n,
                attempts: 0,
            });
        }

        let hashes = pairs
            .iter()
            .map(|pair| pair.placement_hash())
            .collect::<Vec<_>>();
        let mut sorted = hashes.clone();
        sorted.sort_unstable();
        if let Some(w) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(Take5Error::DuplicateKeyHash { hash: w[0] });
        }

        let slot_count = n as u64;
        let window = self.max_displacement.unwrap_or(slot_count.saturating_mul(16));
        let load_factor = if self.load_factor.is_finite() && self.load_factor >= 1.0 {
            self.load_factor
        } else {
            1.0
        };
        let mut bucket_count = ((n as f64 / load_factor).ceil() as u64).max(1);

        for attempt in 0..self.max_attempts {
            let seed = self.seed.wrapping_add((attempt as u64).wrapping_mul(GOLDEN));
            tracing::debug!(
                attempt = attempt,
                seed = seed,
                bucket_count = bucket_count,
                keys = n,
                "Placing perfect hash buckets"
            );

            match place_buckets(&hashes, seed, bucket_count, window) {
                Some(placement) => {
                    for (pair, &slot) in pairs.iter_mut().zip(&placement.slots) {
                        pair.assign(slot);
                    }
                    let info = PerfectHashInfo {
                        entry_count: n as u64,
                        bucket_count,
                        slot_count,
                        seed,
                        attempts: attempt + 1,
                        largest_bucket: placement.largest_bucket,
                        max_displacement: placement
                            .displacements
                            .iter()
                            .copied()
                            .max()
                            .unwrap_or(0),
                    };
                    let table = PerfectHashTable {
                        seed,
                        slot_count,
                        displacements: placement.displacements,
                    };
                    return Ok((table, info));
                }
                None => {
                    tracing::debug!(attempt = attempt, seed = seed, "Perfect hash attempt failed");
                    bucket_count = (bucket_count * 5 / 4).max(bucket_count + 1);
                }
            }
        }

        Err(Take5Error::PerfectHashConstructionFailed {
            keys: n,
            attempts: self.max_attempts,
        })
    }
}

/// Displacement table produced by [`PerfectHashBuilder::build`].
///
/// Holds one displacement per bucket; together with the seed it maps any key
/// hash of the built batch back to its index without the batch itself.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PerfectHashTable {
    seed: u64,
    slot_count: u64,
    displacements: Vec<u64>,
}

impl PerfectHashTable {
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Size of the index space.
    pub fn slot_count(&self) -> u64 {
        self.slot_count
    }

    pub fn bucket_count(&self) -> u64 {
        self.displacements.len() as u64
    }

    pub fn displacements(&self) -> &[u64] {
        &self.displacements
    }

    /// Index assigned to the key with placement hash `hash`.
    ///
    /// Hashes outside the built batch still land on some index; `None` is
    /// only returned for an empty table.
    pub fn slot_of(&self, hash: u64) -> Option<u32> {
        if self.slot_count == 0 || self.displacements.is_empty() {
            return None;
        }
        let key = KeyParams::new(
            hash,
            self.seed,
            self.displacements.len() as u64,
            self.slot_count,
        );
        let d = self.displacements[key.bucket];
        Some(key.position(d, self.slot_count) as u32)
    }

    /// Serializes the table with MessagePack.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec(self)
            .map_err(|e| Take5Error::Encode(format!("failed to serialize displacement table: {e}")))
    }

    /// Deserializes a table written by [`to_bytes`](Self::to_bytes).
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let table: Self = rmp_serde::from_slice(data).map_err(|e| {
            Take5Error::Decode(format!("failed to deserialize displacement table: {e}"))
        })?;
        if table.slot_count > u32::MAX as u64 + 1
            || (table.slot_count > 0) == table.displacements.is_empty()
        {
            return Err(Take5Error::Decode(format!(
                "inconsistent displacement table: {} slots, {} buckets",
                table.slot_count,
                table.displacements.len()
            )));
        }
        Ok(table)
    }
}

/// Per-key placement parameters derived from the placement hash and seed.
///
/// The bucket is the seeded mix of the 32-bit key hash modulo the bucket
/// count, not the bare key hash, so every retry redistributes the keys.
/// `f1` and `f2` also mix in the high 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyParams {
    bucket: usize,
    f1: u64,
    f2: u64,
}

impl KeyParams {
    #[inline]
    fn new(hash: u64, seed: u64, bucket_count: u64, slot_count: u64) -> Self {
        let h = mix64(seed ^ (hash as u32 as u64).wrapping_mul(GOLDEN));
        let g = mix64(h ^ (hash >> 32).wrapping_mul(GOLDEN) ^ GOLDEN);
        let f2 = if slot_count > 1 {
            1 + mix64(g) % (slot_count - 1)
        } else {
            0
        };
        Self {
            bucket: (h % bucket_count) as usize,
            f1: g % slot_count,
            f2,
        }
    }

    /// Slot for displacement `d`: `(f1 + (d / m) * f2 + d % m) mod m`.
    #[inline]
    fn position(&self, d: u64, slot_count: u64) -> u64 {
        let (d0, d1) = (d / slot_count, d % slot_count);
        let base = (self.f1 + (d0 % slot_count) * self.f2 % slot_count) % slot_count;
        (base + d1) % slot_count
    }
}

struct Placement {
    slots: Vec<u32>,
    displacements: Vec<u64>,
    largest_bucket: u32,
}

/// One placement attempt; `None` when some bucket cannot be placed.
fn place_buckets(hashes: &[u64], seed: u64, bucket_count: u64, window: u64) -> Option<Placement> {
    let slot_count = hashes.len() as u64;
    let params = hashes
        .iter()
        .map(|&h| KeyParams::new(h, seed, bucket_count, slot_count))
        .collect::<Vec<_>>();

    // counting sort of keys by bucket, keeping batch order within a bucket
    let mut starts = vec![0usize; bucket_count as usize + 1];
    for key in &params {
        starts[key.bucket + 1] += 1;
    }
    for i in 1..starts.len() {
        starts[i] += starts[i - 1];
    }
    let mut members = vec![0usize; hashes.len()];
    let mut cursor = starts.clone();
    for (i, key) in params.iter().enumerate() {
        members[cursor[key.bucket]] = i;
        cursor[key.bucket] += 1;
    }

    let mut order = (0..bucket_count as usize)
        .filter(|&b| starts[b + 1] > starts[b])
        .collect::<Vec<_>>();
    order.sort_by_key(|&b| Reverse(starts[b + 1] - starts[b]));

    let mut occupied = vec![0u64; hashes.len().div_ceil(64)];
    let mut slots = vec![0u32; hashes.len()];
    let mut displacements = vec![0u64; bucket_count as usize];
    let mut positions = Vec::new();
    let largest_bucket = order
        .first()
        .map(|&b| (starts[b + 1] - starts[b]) as u32)
        .unwrap_or(0);

    for &b in &order {
        let bucket = &members[starts[b]..starts[b + 1]];
        for (i, &x) in bucket.iter().enumerate() {
            if bucket[i + 1..]
                .iter()
                .any(|&y| params[x].f1 == params[y].f1 && params[x].f2 == params[y].f2)
            {
                return None;
            }
        }

        let found = (0..window).find(|&d| {
            positions.clear();
            for &k in bucket {
                let pos = params[k].position(d, slot_count);
                if is_set(&occupied, pos) || positions.contains(&pos) {
                    return false;
                }
                positions.push(pos);
            }
            true
        })?;

        if found >= slot_count {
            tracing::trace!(
                bucket = b,
                size = bucket.len(),
                displacement = found,
                "Bucket needed a rearranged sweep"
            );
        }
        for (&k, &pos) in bucket.iter().zip(&positions) {
            set(&mut occupied, pos);
            slots[k] = pos as u32;
        }
        displacements[b] = found;
    }

    Some(Placement {
        slots,
        displacements,
        largest_bucket,
    })
}

#[inline]
fn is_set(bits: &[u64], idx: u64) -> bool {
    (bits[(idx >> 6) as usize] >> (idx & 63)) & 1 == 1
}

#[inline]
fn set(bits: &mut [u64], idx: u64) {
    bits[(idx >> 6) as usize] |= 1u64 << (idx & 63);
}
