//! Fixed-size bloom filter used to approximate unique visitors.
//!
//! Six seeded polynomial hashes map a string onto a bit array whose size is a
//! power of two, so the hash can be reduced with a mask. Bits live in
//! `AtomicU64` words: `add` and `contains` may run concurrently from any
//! number of requests without locking. A `contains` followed by an `add` is
//! NOT atomic as a pair; callers counting "first seen" events must accept
//! occasional double counts.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ReqmonError, Result};

/// Default capacity in bits (2^25, 4 MiB of words).
pub const DEFAULT_CAPACITY: usize = 1 << 25;

/// Seeds of the hash functions, one per function.
pub const SEEDS: [u64; 6] = [7, 11, 13, 31, 37, 61];

const WORD_BITS: usize = 64;

#[derive(Debug, Clone, Copy)]
struct SimpleHash {
    mask: u64,
    seed: u64,
}

impl SimpleHash {
    /// `acc = acc * seed + byte` over the bytes, reduced with `capacity - 1`.
    fn index(&self, value: &str) -> usize {
        let mut acc: u64 = 0;
        for b in value.bytes() {
            acc = acc.wrapping_mul(self.seed).wrapping_add(u64::from(b));
        }
        (acc & self.mask) as usize
    }
}

/// Probabilistic set of strings: no false negatives, rare false positives.
pub struct BloomFilter {
    words: Box<[AtomicU64]>,
    hashes: [SimpleHash; SEEDS.len()],
    capacity: usize,
}

impl fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomFilter")
            .field("capacity", &self.capacity)
            .field("seeds", &SEEDS)
            .finish_non_exhaustive()
    }
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl BloomFilter {
    /// Filter with [`DEFAULT_CAPACITY`] bits.
    pub fn new() -> Self {
        Self::build(DEFAULT_CAPACITY)
    }

    /// Filter with `capacity` bits. The capacity must be a non-zero power of
    /// two; anything else would make the mask reduction skip bits.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if !capacity.is_power_of_two() {
            return Err(ReqmonError::InvalidCapacity(capacity));
        }
        Ok(Self::build(capacity))
    }

    fn build(capacity: usize) -> Self {
        let word_count = capacity.div_ceil(WORD_BITS);
        let words = (0..word_count)
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let mask = (capacity - 1) as u64;
        let hashes = SEEDS.map(|seed| SimpleHash { mask, seed });
        Self {
            words,
            hashes,
            capacity,
        }
    }

    /// Number of bits in the filter.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of hash functions.
    pub fn hash_count(&self) -> usize {
        self.hashes.len()
    }

    /// Record `value`. The empty string is never recorded.
    pub fn add(&self, value: &str) {
        if value.is_empty() {
            return;
        }
        for h in &self.hashes {
            let (word, bit) = locate(h.index(value));
            self.words[word].fetch_or(bit, Ordering::Relaxed);
        }
    }

    /// Whether `value` may have been added. `false` is definitive.
    pub fn contains(&self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        self.hashes.iter().all(|h| {
            let (word, bit) = locate(h.index(value));
            self.words[word].load(Ordering::Relaxed) & bit != 0
        })
    }

    /// Number of bits currently set.
    pub fn count_ones(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }
}

fn locate(index: usize) -> (usize, u64) {
    (index / WORD_BITS, 1u64 << (index % WORD_BITS))
}
