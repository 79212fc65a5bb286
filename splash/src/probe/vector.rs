//! Vectorized probe for tables with two hash functions and 4-entry buckets
//!
//! Both candidate bucket indices come out of one vector multiply and shift.
//! Each bucket's four keys and four values are one 128-bit load each, so a
//! whole probe is two compares, two ANDs, an OR and a horizontal fold.

use super::Probe;
use crate::bucket_array::BucketArray;
use crate::err::ConfigError;
use crate::hash::HashFamily;

#[cfg(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64"))]
use crate::simd128::{self, Simd128};

/// Number of hash functions this probe is specialized for
const NUM_HASHES: usize = 2;

/// Bucket size this probe is specialized for
const BUCKET_SIZE: usize = 4;

/// Check that a table has the one shape the vector probe handles.
fn check_shape(hashes: &HashFamily, bucket_size: usize) -> Result<(), ConfigError> {
    if hashes.len() == NUM_HASHES && bucket_size == BUCKET_SIZE {
        Ok(())
    } else {
        Err(ConfigError::VectorShape {
            num_hashes: hashes.len(),
            bucket_size,
        })
    }
}

/// SIMD probe state: the table's multipliers, packed for one vector multiply
#[cfg(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64"))]
#[derive(Debug, Clone)]
pub(crate) struct VectorProbe {
    /// Both multipliers in the low lanes, the upper lanes unused
    multipliers: [u32; 4],
    /// Right shift that turns a product into a bucket index
    shift: u32,
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64"))]
impl VectorProbe {
    /// Prepare a vector probe for a table, if its shape and this CPU allow.
    pub(crate) fn new(hashes: &HashFamily, bucket_size: usize) -> Result<Self, ConfigError> {
        check_shape(hashes, bucket_size)?;
        if !simd128::is_supported() {
            return Err(ConfigError::VectorUnsupported);
        }
        let m = hashes.multipliers();
        Ok(Self {
            multipliers: [m[0], m[1], 0, 0],
            shift: hashes.shift(),
        })
    }

    /// Vector probe body
    ///
    /// # Safety
    ///
    /// Requires SSE4.1, checked by [`VectorProbe::new()`].
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    #[target_feature(enable = "sse4.1")]
    unsafe fn probe_x4(&self, buckets: &BucketArray, key: u32) -> u32 {
        self.probe_body(buckets, key)
    }

    /// Vector probe body
    ///
    /// # Safety
    ///
    /// Requires NEON, checked by [`VectorProbe::new()`].
    #[cfg(target_arch = "aarch64")]
    #[target_feature(enable = "neon")]
    unsafe fn probe_x4(&self, buckets: &BucketArray, key: u32) -> u32 {
        self.probe_body(buckets, key)
    }

    /// Architecture independent part of the probe, inlined into
    /// [`Self::probe_x4`] so it's compiled with the right target features.
    #[inline(always)]
    fn probe_body(&self, buckets: &BucketArray, key: u32) -> u32 {
        let key_vector = Simd128::splat(key);

        let bucket_ids = key_vector
            .mul(Simd128::read(&self.multipliers))
            .shr(self.shift);
        let b0 = bucket_ids.lane::<0>() as usize;
        let b1 = bucket_ids.lane::<1>() as usize;

        let mask0 = Simd128::read(buckets.keys_x4(b0)).cmpeq(key_vector);
        let values0 = Simd128::read(buckets.values_x4(b0)).and(mask0);

        let mask1 = Simd128::read(buckets.keys_x4(b1)).cmpeq(key_vector);
        let values1 = Simd128::read(buckets.values_x4(b1)).and(mask1);

        values0.or(values1).fold_or()
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64"))]
impl Probe for VectorProbe {
    #[inline(always)]
    fn probe(&self, _hashes: &HashFamily, buckets: &BucketArray, key: u32) -> u32 {
        // SAFETY: A VectorProbe only exists after new() confirmed CPU support.
        unsafe { self.probe_x4(buckets, key) }
    }
}

/// Placeholder on targets without a vector implementation; never constructed
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
#[derive(Debug, Clone)]
pub(crate) struct VectorProbe(std::convert::Infallible);

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
impl VectorProbe {
    /// Always fails, after reporting shape problems first.
    pub(crate) fn new(hashes: &HashFamily, bucket_size: usize) -> Result<Self, ConfigError> {
        check_shape(hashes, bucket_size)?;
        Err(ConfigError::VectorUnsupported)
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
impl Probe for VectorProbe {
    fn probe(&self, _hashes: &HashFamily, _buckets: &BucketArray, _key: u32) -> u32 {
        match self.0 {}
    }
}
