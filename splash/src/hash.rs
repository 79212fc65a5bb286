//! Multiplicative hash family
//!
//! Each hash function is a single odd 32-bit multiplier. A key is mapped to a
//! bucket by keeping the high bits of the wrapping product `key * multiplier`,
//! which is well mixed across all bit positions because an odd multiplier is
//! invertible modulo 2^32.

use arrayvec::ArrayVec;
use rand::Rng;

/// Largest number of hash functions a table may use
pub const MAX_HASHES: usize = 100;

/// List of bucket indices, one per hash function
pub(crate) type Candidates = ArrayVec<usize, MAX_HASHES>;

/// Set of multiplicative hash functions sharing one output range
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct HashFamily {
    /// Multiplier for each hash function
    multipliers: ArrayVec<u32, MAX_HASHES>,
    /// Right shift that keeps `log2(num_buckets)` high bits of a product
    shift: u32,
}

impl HashFamily {
    /// Draw `num_hashes` random odd multipliers for a table of
    /// `2^bucket_bits` buckets.
    ///
    /// Callers must have already checked `num_hashes <= MAX_HASHES`.
    pub(crate) fn generate<R: Rng>(rng: &mut R, num_hashes: usize, bucket_bits: u32) -> Self {
        let multipliers = (0..num_hashes)
            .map(|_| rng.gen::<u32>().wrapping_mul(2).wrapping_add(1))
            .collect();
        Self {
            multipliers,
            shift: 32 - bucket_bits,
        }
    }

    /// Rebuild a family from multipliers taken verbatim from a dump.
    ///
    /// Returns `None` if there are more than [`MAX_HASHES`] multipliers.
    pub(crate) fn from_multipliers(multipliers: &[u32], bucket_bits: u32) -> Option<Self> {
        let mut list = ArrayVec::new();
        list.try_extend_from_slice(multipliers).ok()?;
        Some(Self {
            multipliers: list,
            shift: 32 - bucket_bits,
        })
    }

    /// Number of hash functions in the family
    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.multipliers.len()
    }

    /// All multipliers, in hash function order
    #[inline(always)]
    pub(crate) fn multipliers(&self) -> &[u32] {
        &self.multipliers
    }

    /// Shift applied to each product
    #[inline(always)]
    pub(crate) fn shift(&self) -> u32 {
        self.shift
    }

    /// Bucket index for `key` under hash function `function`.
    ///
    /// The shift happens at 64 bits so a single-bucket table, with a shift
    /// of 32, always lands in bucket 0.
    #[inline(always)]
    pub(crate) fn bucket_of(&self, function: usize, key: u32) -> usize {
        let product = key.wrapping_mul(self.multipliers[function]);
        (u64::from(product) >> self.shift) as usize
    }

    /// Candidate buckets for `key`, in hash function order.
    #[inline(always)]
    pub(crate) fn candidates(&self, key: u32) -> Candidates {
        (0..self.len()).map(|f| self.bucket_of(f, key)).collect()
    }
}
