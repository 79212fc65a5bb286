//! Lookup paths
//!
//! A probe checks every slot of every candidate bucket for a key and returns
//! the OR of the values stored next to matching keys. Only one slot can ever
//! hold a given key, so this is "the value, or 0 if absent". Both backends
//! get there without branching on the comparison, using the mask produced by
//! [`compare_to_mask()`] or its vector equivalent.

mod vector;

use crate::bucket_array::BucketArray;
use crate::err::ConfigError;
use crate::hash::HashFamily;
use crate::{ProbeBackend, ProbeOption};

pub(crate) use vector::VectorProbe;

/// All ones if `a == b`, all zeroes otherwise.
///
/// This is the wrapping negation of the comparison as an integer, so it
/// compiles to a compare and a negate rather than a branch.
#[inline(always)]
pub(crate) fn compare_to_mask(a: u32, b: u32) -> u32 {
    u32::from(a == b).wrapping_neg()
}

/// Common interface for probe implementations
pub(crate) trait Probe {
    /// Look up `key`, returning its value or 0 if it's absent.
    fn probe(&self, hashes: &HashFamily, buckets: &BucketArray, key: u32) -> u32;
}

/// Portable probe, works for any table shape
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ScalarProbe;

impl Probe for ScalarProbe {
    #[inline(always)]
    fn probe(&self, hashes: &HashFamily, buckets: &BucketArray, key: u32) -> u32 {
        let mut result = 0;
        for function in 0..hashes.len() {
            let bucket = hashes.bucket_of(function, key);
            for (&stored_key, &value) in buckets.keys(bucket).iter().zip(buckets.values(bucket)) {
                result |= value & compare_to_mask(stored_key, key);
            }
        }
        result
    }
}

/// Probe backend chosen for one table
#[derive(Debug, Clone)]
pub(crate) enum ProbeRuntime {
    /// Use the [`ScalarProbe`].
    Scalar(ScalarProbe),
    /// Use a [`VectorProbe`] prepared for this table's multipliers.
    Vector(VectorProbe),
}

impl ProbeRuntime {
    /// Pick a backend for a table according to a [`ProbeOption`].
    pub(crate) fn select(
        option: ProbeOption,
        hashes: &HashFamily,
        bucket_size: usize,
    ) -> Result<Self, ConfigError> {
        match option {
            ProbeOption::ScalarOnly => Ok(Self::Scalar(ScalarProbe)),
            ProbeOption::VectorOnly => Ok(Self::Vector(VectorProbe::new(hashes, bucket_size)?)),
            ProbeOption::TryVector => Ok(match VectorProbe::new(hashes, bucket_size) {
                Ok(vector) => Self::Vector(vector),
                Err(_) => Self::Scalar(ScalarProbe),
            }),
        }
    }

    /// Which backend this is
    pub(crate) fn backend(&self) -> ProbeBackend {
        match self {
            Self::Scalar(_) => ProbeBackend::Scalar,
            Self::Vector(_) => ProbeBackend::Vector,
        }
    }
}

impl Probe for ProbeRuntime {
    #[inline(always)]
    fn probe(&self, hashes: &HashFamily, buckets: &BucketArray, key: u32) -> u32 {
        match self {
            Self::Scalar(scalar) => scalar.probe(hashes, buckets, key),
            Self::Vector(vector) => vector.probe(hashes, buckets, key),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{compare_to_mask, Probe, ProbeRuntime, ScalarProbe};
    use crate::bucket_array::{BucketArray, Entry};
    use crate::err::ConfigError;
    use crate::hash::HashFamily;
    use crate::{ProbeBackend, ProbeOption};

    #[test]
    fn mask_values() {
        assert_eq!(compare_to_mask(5, 5), u32::MAX);
        assert_eq!(compare_to_mask(5, 6), 0);
        assert_eq!(compare_to_mask(0, 0), u32::MAX);
        assert_eq!(compare_to_mask(u32::MAX, 0), 0);
    }

    #[test]
    fn scalar_scans_all_candidates() {
        let hashes = HashFamily::from_multipliers(&[1, 3], 2).expect("two multipliers fit");
        let mut buckets = BucketArray::new(4, 2);
        let key = 0x4000_0001;
        let candidates = hashes.candidates(key);
        assert_eq!(candidates.as_slice(), &[1, 3]);

        assert_eq!(ScalarProbe.probe(&hashes, &buckets, key), 0);
        buckets.append(3, Entry::new(9, 90));
        buckets.append(3, Entry::new(key, 77));
        assert_eq!(ScalarProbe.probe(&hashes, &buckets, key), 77);
        assert_eq!(ScalarProbe.probe(&hashes, &buckets, 9), 0);
    }

    #[test]
    fn select_backend() {
        let two = HashFamily::from_multipliers(&[1, 3], 5).expect("two multipliers fit");
        let three = HashFamily::from_multipliers(&[1, 3, 5], 5).expect("three multipliers fit");

        let scalar = ProbeRuntime::select(ProbeOption::ScalarOnly, &two, 4).expect("scalar");
        assert_eq!(scalar.backend(), ProbeBackend::Scalar);

        let fallback = ProbeRuntime::select(ProbeOption::TryVector, &three, 4).expect("fallback");
        assert_eq!(fallback.backend(), ProbeBackend::Scalar);

        assert!(matches!(
            ProbeRuntime::select(ProbeOption::VectorOnly, &two, 8),
            Err(ConfigError::VectorShape {
                num_hashes: 2,
                bucket_size: 8
            })
        ));
    }
}
