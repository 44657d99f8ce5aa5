//! Bloom filter used by the bloom-gate decorator.
//!
//! Sized from the expected number of keys `n` and a target false-positive
//! rate `p`:
//!
//! ```text
//!   bits    m = ceil(-n · ln p / (ln 2)²)
//!   hashes  k = ceil(m / n · ln 2)
//!   probe i = (h1 + i · h2) mod m        (h2 forced odd)
//! ```
//!
//! `h1`/`h2` are two differently seeded `FxHasher` runs over the key, each
//! passed through a 64-bit finalizer so low-entropy keys still spread across
//! the bitset.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::error::ConfigError;
use crate::traits::ProbabilisticSet;

const SEED_PRIMARY: u64 = 0x51_7c_c1_b7_27_22_0a_95;
const SEED_SECONDARY: u64 = 0x9e_37_79_b9_7f_4a_7c_15;

/// Space-efficient set with false positives but no false negatives.
#[derive(Clone, PartialEq, Eq)]
pub struct BloomFilter {
    bits: Vec<u64>,
    bit_len: usize,
    num_hashes: usize,
    inserted: usize,
}

impl BloomFilter {
    /// Upper bound on the bitset size (~128 MiB).
    const MAX_BITS: usize = 1 << 30;

    /// Creates a filter for about `expected_items` keys at the given
    /// false-positive rate.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Result<Self, ConfigError> {
        if expected_items == 0 {
            return Err(ConfigError::new("bloom filter expected items must be positive"));
        }
        if !(false_positive_rate > 0.0 && false_positive_rate < 1.0) {
            return Err(ConfigError::new(format!(
                "bloom filter false positive rate must be in (0, 1), got {false_positive_rate}"
            )));
        }

        let bit_len = optimal_bits(expected_items, false_positive_rate);
        if bit_len > Self::MAX_BITS {
            return Err(ConfigError::new(format!(
                "bloom filter would need {bit_len} bits, limit is {}",
                Self::MAX_BITS
            )));
        }
        let num_hashes = optimal_hashes(bit_len, expected_items);

        Ok(Self {
            bits: vec![0; bit_len.div_ceil(64)],
            bit_len,
            num_hashes,
            inserted: 0,
        })
    }

    pub fn insert<T: ?Sized + Hash>(&mut self, item: &T) {
        for idx in self.probes(item) {
            self.bits[idx / 64] |= 1u64 << (idx % 64);
        }
        self.inserted = self.inserted.saturating_add(1);
    }

    pub fn contains<T: ?Sized + Hash>(&self, item: &T) -> bool {
        self.probes(item)
            .all(|idx| self.bits[idx / 64] & (1u64 << (idx % 64)) != 0)
    }

    /// Resets every bit and the insert counter.
    pub fn clear(&mut self) {
        self.bits.fill(0);
        self.inserted = 0;
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn num_hashes(&self) -> usize {
        self.num_hashes
    }

    /// Inserts since construction or the last clear, duplicates included.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// `(1 - e^{-kn/m})^k` for the current insert count.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        if self.inserted == 0 {
            return 0.0;
        }
        let m = self.bit_len as f64;
        let k = self.num_hashes as f64;
        let n = self.inserted as f64;
        (1.0 - (-k * n / m).exp()).powf(k).clamp(0.0, 1.0)
    }

    fn probes<T: ?Sized + Hash>(&self, item: &T) -> impl Iterator<Item = usize> + use<T> {
        let h1 = seeded_hash(SEED_PRIMARY, item);
        let h2 = seeded_hash(SEED_SECONDARY, item) | 1;
        let m = self.bit_len as u64;
        (0..self.num_hashes as u64)
            .map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % m) as usize)
    }
}

impl<K: ?Sized + Hash> ProbabilisticSet<K> for BloomFilter {
    fn add(&mut self, key: &K) {
        self.insert(key);
    }

    fn test(&self, key: &K) -> bool {
        self.contains(key)
    }

    fn clear(&mut self) {
        BloomFilter::clear(self);
    }
}

impl fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomFilter")
            .field("bit_len", &self.bit_len)
            .field("num_hashes", &self.num_hashes)
            .field("inserted", &self.inserted)
            .finish()
    }
}

fn seeded_hash<T: ?Sized + Hash>(seed: u64, item: &T) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_u64(seed);
    item.hash(&mut hasher);
    mix64(hasher.finish())
}

// splitmix64 finalizer
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn optimal_bits(n: usize, p: f64) -> usize {
    let ln2_sq = std::f64::consts::LN_2 * std::f64::consts::LN_2;
    let m = -(n as f64) * p.ln() / ln2_sq;
    (m.ceil() as usize).max(64)
}

fn optimal_hashes(m: usize, n: usize) -> usize {
    let k = (m as f64 / n as f64) * std::f64::consts::LN_2;
    (k.ceil() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloom_filter_rejects_bad_parameters() {
        assert!(BloomFilter::new(0, 0.01).is_err());
        assert!(BloomFilter::new(10, 0.0).is_err());
        assert!(BloomFilter::new(10, 1.0).is_err());
        assert!(BloomFilter::new(10, f64::NAN).is_err());
        let err = BloomFilter::new(10, 1.5).unwrap_err();
        assert!(err.message().contains("false positive rate"));
    }

    #[test]
    fn bloom_filter_refuses_bitsets_over_the_cap() {
        let err = BloomFilter::new(200_000_000, 0.001).unwrap_err();
        assert!(err.message().contains("limit is 1073741824"), "{}", err.message());
    }

    #[test]
    fn bloom_filter_sizing_follows_formulas() {
        let filter = BloomFilter::new(1000, 0.01).unwrap();
        // m ≈ 9586, k ≈ 7 for n = 1000, p = 1%.
        assert!((9_500..9_700).contains(&filter.bit_len()));
        assert_eq!(filter.num_hashes(), 7);
    }

    #[test]
    fn bloom_filter_has_no_false_negatives() {
        let mut filter = BloomFilter::new(500, 0.01).unwrap();
        for i in 0..500u32 {
            filter.insert(&i);
        }
        assert!((0..500u32).all(|i| filter.contains(&i)));
        assert_eq!(filter.inserted(), 500);
    }

    #[test]
    fn bloom_filter_false_positive_rate_is_reasonable() {
        let mut filter = BloomFilter::new(1000, 0.01).unwrap();
        for i in 0..1000u64 {
            filter.insert(&i);
        }
        let false_positives = (1_000_000..1_010_000u64)
            .filter(|i| filter.contains(i))
            .count();
        // 1% target; allow generous slack for hash variance.
        assert!(false_positives < 500, "got {false_positives} false positives");
        assert!(filter.estimated_false_positive_rate() < 0.05);
    }

    #[test]
    fn bloom_filter_clear_resets_membership() {
        let mut filter = BloomFilter::new(16, 0.01).unwrap();
        filter.insert("alpha");
        assert!(filter.contains("alpha"));
        filter.clear();
        assert!(!filter.contains("alpha"));
        assert_eq!(filter.inserted(), 0);
        assert_eq!(filter.estimated_false_positive_rate(), 0.0);
    }

    #[test]
    fn bloom_filter_through_probabilistic_set_trait() {
        fn gate<S: ProbabilisticSet<str>>(set: &mut S) -> bool {
            set.add("k");
            set.test("k")
        }
        let mut filter = BloomFilter::new(8, 0.1).unwrap();
        assert!(gate(&mut filter));
    }
}
