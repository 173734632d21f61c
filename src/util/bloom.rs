//! Bloom filter and bucket derivation
//!
//! Storage-layer readers consult Bloom filters to skip data files that
//! cannot contain a key. Filters are exchanged between replicas in
//! serialized form, so bucket derivation must be identical bit-for-bit
//! across versions for a given (key, hash count, bucket count): two 32-bit
//! Murmur mixes are combined per Kirsch-Mitzenmacher instead of k
//! independent hashes.

use bytes::{Buf, BufMut, BytesMut};
use tracing::warn;

use crate::error::{truncated_error, GalenaError, Result};
use crate::util::bitset::BitSet;
use crate::util::murmur::murmur32;

/// Slack bits allocated beyond `num_elements * buckets_per_element`.
const EXCESS: u64 = 20;

/// Hard cap on bitset size, for compatibility with filters sized by
/// 32-bit implementations.
const MAX_BUCKETS: u64 = i32::MAX as u64;

/// Derive `hash_count` bucket indices for `key` over `max` buckets.
///
/// `bucket[i] = |(h1 + i * h2) mod max|` computed in wrapping 32-bit
/// signed arithmetic, with the absolute value taken after the modulus so
/// every index lands in `[0, max)`. `max` must be in `(0, i32::MAX]`;
/// filter construction enforces the cap before this hot path runs.
pub fn hash_buckets(key: &[u8], hash_count: u32, max: u64) -> Vec<u64> {
    debug_assert!(max > 0 && max <= MAX_BUCKETS);
    let h1 = murmur32(key, 0) as i32;
    let h2 = murmur32(key, h1 as u32) as i32;
    let max = max as i32;

    let mut buckets = Vec::with_capacity(hash_count as usize);
    for i in 0..hash_count {
        let combined = h1.wrapping_add((i as i32).wrapping_mul(h2));
        buckets.push((combined % max).unsigned_abs() as u64);
    }
    buckets
}

// ---------------------------------------------------------------------------
// BloomSpec
// ---------------------------------------------------------------------------

/// A (hash count, buckets per element) pair chosen from the precomputed
/// false-positive table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BloomSpec {
    /// Number of hash functions.
    pub k: u32,
    /// Buckets allocated per element.
    pub buckets_per_element: usize,
}

/// Smallest usable buckets-per-element row.
const MIN_BUCKETS: usize = 2;
/// Smallest usable hash count.
const MIN_K: usize = 1;

/// Optimal hash count for each buckets-per-element row: the argmin of the
/// matching `PROBS` row. Rows 0 and 1 are placeholders so the table is
/// indexable by buckets-per-element. The spec search below relies on this
/// being the row minimum to terminate within the table.
const OPT_K_PER_BUCKETS: [u32; 16] = [1, 1, 1, 2, 3, 3, 4, 5, 6, 6, 7, 8, 8, 9, 10, 10];

/// False positive probability indexed as `PROBS[buckets_per_element][k]`.
/// Rows 0 and 1 are placeholders.
const PROBS: [&[f64]; 16] = [
    &[1.0],
    &[1.0, 1.0],
    &[1.0, 0.393, 0.400],
    &[1.0, 0.283, 0.237, 0.253],
    &[1.0, 0.221, 0.155, 0.147, 0.160],
    &[1.0, 0.181, 0.109, 0.092, 0.092, 0.101],
    &[1.0, 0.154, 0.0804, 0.0609, 0.0561, 0.0578, 0.0638],
    &[1.0, 0.133, 0.0618, 0.0423, 0.0359, 0.0347, 0.0364],
    &[1.0, 0.118, 0.0489, 0.0306, 0.024, 0.0217, 0.0216, 0.0229],
    &[1.0, 0.105, 0.0397, 0.0228, 0.0166, 0.0141, 0.0133, 0.0135, 0.0145],
    &[1.0, 0.0952, 0.0329, 0.0174, 0.0118, 0.00943, 0.00844, 0.00819, 0.00846],
    &[1.0, 0.0869, 0.0276, 0.0136, 0.00864, 0.0065, 0.00552, 0.00513, 0.00509],
    &[1.0, 0.08, 0.0236, 0.0108, 0.00646, 0.00459, 0.00371, 0.00329, 0.00314],
    &[
        1.0, 0.074, 0.0203, 0.00875, 0.00492, 0.00332, 0.00255, 0.00217, 0.00199, 0.00194,
    ],
    &[
        1.0, 0.0689, 0.0177, 0.00718, 0.00381, 0.00244, 0.00179, 0.00146, 0.00129, 0.00121, 0.0012,
    ],
    &[
        1.0, 0.0645, 0.0156, 0.00596, 0.003, 0.00183, 0.00128, 0.001, 0.000852, 0.000775, 0.000744,
    ],
];

/// Spec for a given buckets-per-element row: the row's optimal hash count.
pub fn bloom_spec_for_buckets(buckets_per_element: usize) -> BloomSpec {
    debug_assert!(buckets_per_element >= 1 && buckets_per_element < PROBS.len());
    BloomSpec {
        k: OPT_K_PER_BUCKETS[buckets_per_element],
        buckets_per_element,
    }
}

/// Smallest spec meeting `max_false_pos_prob` within `max_buckets_per_element`.
///
/// Fails with [`GalenaError::UnsupportedBloomSize`] when even the densest
/// row cannot reach the requested rate.
pub fn bloom_spec_for_false_positive(
    max_buckets_per_element: usize,
    max_false_pos_prob: f64,
) -> Result<BloomSpec> {
    debug_assert!(max_buckets_per_element >= 1 && max_buckets_per_element < PROBS.len());
    let max_k = PROBS[max_buckets_per_element].len() - 1;

    if max_false_pos_prob >= PROBS[MIN_BUCKETS][MIN_K] {
        return Ok(bloom_spec_for_buckets(MIN_BUCKETS));
    }
    if max_false_pos_prob < PROBS[max_buckets_per_element][max_k] {
        return Err(GalenaError::UnsupportedBloomSize(format!(
            "unable to satisfy false positive rate {max_false_pos_prob} with \
             {max_buckets_per_element} buckets per element"
        )));
    }

    // Minimal row that reaches the target rate at its optimal K.
    let mut buckets_per_element = MIN_BUCKETS;
    let mut k = OPT_K_PER_BUCKETS[MIN_BUCKETS] as usize;
    while PROBS[buckets_per_element][k] > max_false_pos_prob {
        buckets_per_element += 1;
        k = OPT_K_PER_BUCKETS[buckets_per_element] as usize;
    }
    // The row suffices; relax K while the target still holds.
    while PROBS[buckets_per_element][k - 1] <= max_false_pos_prob {
        k -= 1;
    }

    Ok(BloomSpec {
        k: k as u32,
        buckets_per_element,
    })
}

/// Densest buckets-per-element row representable for `num_elements` under
/// the bitset size cap.
fn max_buckets_per_element(num_elements: u64) -> Result<usize> {
    let num_elements = num_elements.max(1);
    let v = (MAX_BUCKETS - EXCESS) as f64 / num_elements as f64;
    if v < 1.0 {
        return Err(GalenaError::UnsupportedBloomSize(format!(
            "cannot compute probabilities for {num_elements} elements"
        )));
    }
    Ok((PROBS.len() - 1).min(v as usize))
}

// ---------------------------------------------------------------------------
// BloomFilter
// ---------------------------------------------------------------------------

/// A Bloom filter keyed by raw bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BloomFilter {
    hash_count: u32,
    bits: BitSet,
}

impl BloomFilter {
    fn buckets_for(num_elements: u64, buckets_per_element: usize) -> BitSet {
        let num_bits = num_elements
            .saturating_mul(buckets_per_element as u64)
            .saturating_add(EXCESS)
            .min(MAX_BUCKETS);
        BitSet::new(num_bits)
    }

    /// Filter with the lowest practical false positive probability for
    /// `num_elements`, using at most `target_buckets_per_element`.
    ///
    /// The per-element bucket count is lowered when the bitset size cap
    /// requires it.
    pub fn with_buckets_per_element(
        num_elements: u64,
        target_buckets_per_element: usize,
    ) -> Result<Self> {
        let max_buckets_per_element = max_buckets_per_element(num_elements)?.max(1);
        let buckets_per_element = target_buckets_per_element.min(max_buckets_per_element);
        if buckets_per_element < target_buckets_per_element {
            warn!(
                num_elements,
                buckets_per_element,
                target_buckets_per_element,
                "cannot provide an optimal bloom filter, lowering buckets per element"
            );
        }
        let spec = bloom_spec_for_buckets(buckets_per_element);
        Ok(Self {
            hash_count: spec.k,
            bits: Self::buckets_for(num_elements, spec.buckets_per_element),
        })
    }

    /// Smallest filter providing `max_false_pos_prob` for `num_elements`.
    ///
    /// Fails at construction when the rate cannot be met under the bitset
    /// size cap; membership operations never fail.
    pub fn with_false_positive_rate(num_elements: u64, max_false_pos_prob: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&max_false_pos_prob) {
            return Err(GalenaError::UnsupportedBloomSize(format!(
                "invalid false positive probability {max_false_pos_prob}"
            )));
        }
        let max_buckets_per_element = max_buckets_per_element(num_elements)?;
        let spec = bloom_spec_for_false_positive(max_buckets_per_element, max_false_pos_prob)?;
        Ok(Self {
            hash_count: spec.k,
            bits: Self::buckets_for(num_elements, spec.buckets_per_element),
        })
    }

    /// A one-hash filter with every bit set; matches any key. Test helper.
    pub fn always_matching() -> Self {
        let mut bits = BitSet::new(64);
        for i in 0..64 {
            bits.set(i);
        }
        Self {
            hash_count: 1,
            bits,
        }
    }

    /// Number of hash functions applied per key.
    pub fn hash_count(&self) -> u32 {
        self.hash_count
    }

    /// Total bucket count.
    pub fn num_buckets(&self) -> u64 {
        self.bits.len()
    }

    /// Mark `key` present.
    pub fn add(&mut self, key: &[u8]) {
        for bucket in hash_buckets(key, self.hash_count, self.bits.len()) {
            self.bits.set(bucket);
        }
    }

    /// True if `key` may have been added; false means definitely absent.
    pub fn is_present(&self, key: &[u8]) -> bool {
        hash_buckets(key, self.hash_count, self.bits.len())
            .into_iter()
            .all(|bucket| self.bits.get(bucket))
    }

    /// Clear all buckets.
    pub fn clear(&mut self) {
        self.bits.clear_all();
    }

    /// Number of buckets still unset.
    pub fn empty_buckets(&self) -> u64 {
        self.bits.len() - self.bits.count_ones()
    }

    /// Serialize as `hash_count`, bit length, then the raw words, all
    /// big-endian.
    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.put_u32(self.hash_count);
        buf.put_u64(self.bits.len());
        for &word in self.bits.words() {
            buf.put_u64(word);
        }
    }

    /// Inverse of [`serialize`](Self::serialize).
    pub fn deserialize(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < 4 + 8 {
            return Err(truncated_error("bloom filter header", 12, buf.remaining()));
        }
        let hash_count = buf.get_u32();
        let num_bits = buf.get_u64();
        if num_bits > MAX_BUCKETS {
            return Err(GalenaError::UnsupportedBloomSize(format!(
                "serialized filter claims {num_bits} buckets"
            )));
        }
        let num_words = num_bits.div_ceil(64) as usize;
        if buf.remaining() < num_words * 8 {
            return Err(truncated_error(
                "bloom filter words",
                num_words * 8,
                buf.remaining(),
            ));
        }
        let mut words = Vec::with_capacity(num_words);
        for _ in 0..num_words {
            words.push(buf.get_u64());
        }
        Ok(Self {
            hash_count,
            bits: BitSet::from_words(words, num_bits),
        })
    }
}
