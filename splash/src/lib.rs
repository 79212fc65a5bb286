#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg))]
#![doc = include_str!("../README.md")]
// @@ begin lint list maintained by maint/add_warning @@
#![allow(renamed_and_removed_lints)] // @@REMOVE_WHEN(ci_arti_stable)
#![allow(unknown_lints)] // @@REMOVE_WHEN(ci_arti_nightly)
#![warn(missing_docs)]
#![warn(noop_method_call)]
#![warn(unreachable_pub)]
#![warn(clippy::all)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::cargo_common_metadata)]
#![deny(clippy::cast_lossless)]
#![deny(clippy::checked_conversions)]
#![warn(clippy::cognitive_complexity)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]
#![deny(clippy::expl_impl_clone_on_copy)]
#![deny(clippy::fallible_impl_from)]
#![deny(clippy::implicit_clone)]
#![deny(clippy::large_stack_arrays)]
#![warn(clippy::manual_ok_or)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::option_option)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![warn(clippy::rc_buffer)]
#![deny(clippy::ref_option_ref)]
#![warn(clippy::semicolon_if_nothing_returned)]
#![warn(clippy::trait_duplication_in_bounds)]
#![deny(clippy::unchecked_duration_subtraction)]
#![deny(clippy::unnecessary_wraps)]
#![warn(clippy::unseparated_literal_suffix)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::mod_module_files)]
#![allow(clippy::let_unit_value)] // This can reasonably be done for explicitness
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::significant_drop_in_scrutinee)] // arti/-/merge_requests/588/#note_2812945
#![allow(clippy::result_large_err)] // temporary workaround for arti#587
#![allow(clippy::needless_raw_string_hashes)] // complained-about code is fine, often best
#![allow(clippy::needless_lifetimes)] // See arti#1765
//! <!-- @@ end lint list maintained by maint/add_warning @@ -->

mod bucket_array;
mod codec;
mod err;
mod hash;
mod insert;
mod probe;
#[cfg(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64"))]
mod simd128;

use crate::bucket_array::{BucketArray, Entry};
use crate::hash::HashFamily;
use crate::probe::{Probe, ProbeRuntime, ScalarProbe};
use rand::{rngs::StdRng, SeedableRng};
use std::fmt;

pub use crate::codec::Dump;
pub use crate::err::{ConfigError, DecodeError, Error, InsertAllError};
pub use crate::hash::MAX_HASHES;

/// Largest supported table capacity, as a base 2 logarithm of the entry count
///
/// 32-bit targets are limited to one less.
pub const MAX_LOG2_CAPACITY: u32 = 31;

/// Largest log2 capacity usable on this target
///
/// Storage takes two words per slot, so the slot count times two must fit in
/// a `usize`. That only lowers the limit on 32-bit targets.
fn max_log2_capacity() -> u32 {
    MAX_LOG2_CAPACITY.min(usize::BITS - 2)
}

/// Option for selecting a probe backend
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum ProbeOption {
    /// Always use the portable scalar probe.
    ScalarOnly,
    /// Use the vectorized probe, and fail if the table shape or CPU can't.
    VectorOnly,
    /// Use the vectorized probe when possible, otherwise the scalar one.
    /// (This is the default)
    #[default]
    TryVector,
}

/// Effective probe backend for a constructed table
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum ProbeBackend {
    /// The portable scalar probe is active.
    Scalar,
    /// The SIMD probe for 2 hash functions and 4-entry buckets is active.
    Vector,
}

/// Requested table size, in whichever form the caller gave it
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum TableSize {
    /// A power-of-two number of buckets
    Buckets(usize),
    /// Base 2 logarithm of the total number of entries
    Log2Capacity(u32),
}

/// Validated table shape
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Geometry {
    /// Number of hash functions
    num_hashes: usize,
    /// Number of buckets, a power of two
    num_buckets: usize,
    /// Slots per bucket, a power of two
    bucket_size: usize,
}

impl Geometry {
    /// Check a shape given as a hash count, a bucket size, and a [`TableSize`].
    fn new(num_hashes: usize, bucket_size: usize, size: TableSize) -> Result<Self, ConfigError> {
        if !(1..=MAX_HASHES).contains(&num_hashes) {
            return Err(ConfigError::NumHashes {
                got: num_hashes,
                max: MAX_HASHES,
            });
        }
        if !bucket_size.is_power_of_two() {
            return Err(ConfigError::BucketSize(bucket_size));
        }
        let bucket_bits = bucket_size.trailing_zeros();
        let log2_capacity = match size {
            TableSize::Log2Capacity(log2) => log2,
            TableSize::Buckets(n) if n.is_power_of_two() => n.trailing_zeros() + bucket_bits,
            TableSize::Buckets(n) => return Err(ConfigError::NumBuckets(n)),
        };
        let max = max_log2_capacity();
        if log2_capacity > max {
            return Err(ConfigError::Capacity {
                got: log2_capacity,
                max,
            });
        }
        if bucket_bits > log2_capacity {
            return Err(ConfigError::BucketLargerThanTable {
                bucket_size,
                capacity: 1 << log2_capacity,
            });
        }
        Ok(Self {
            num_hashes,
            num_buckets: 1 << (log2_capacity - bucket_bits),
            bucket_size,
        })
    }

    /// Base 2 logarithm of the bucket count
    fn bucket_bits(&self) -> u32 {
        self.num_buckets.trailing_zeros()
    }
}

/// Bucketized multi-hash table mapping `u32` keys to `u32` values
///
/// Every key has one candidate bucket per hash function. Inserts that find
/// all candidates full displace older entries in a bounded random walk, and
/// lookups scan all candidates without branching.
///
/// Zero is used as the "absent" result of [`SplashTable::probe`], so keys
/// and values should be nonzero. Storing a zero value makes its key look
/// absent, and key zero matches every unused slot.
pub struct SplashTable {
    /// Multiplicative hash functions, one per candidate bucket
    hashes: HashFamily,
    /// Entry storage
    buckets: BucketArray,
    /// Largest number of displacements allowed in one insert
    max_reinserts: u32,
    /// Number of entries present
    size: usize,
    /// Random source for victim selection
    rng: StdRng,
    /// Active probe backend
    probe: ProbeRuntime,
}

impl fmt::Debug for SplashTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplashTable")
            .field("multipliers", &self.hashes.multipliers())
            .field("num_buckets", &self.buckets.num_buckets())
            .field("bucket_size", &self.buckets.bucket_size())
            .field("max_reinserts", &self.max_reinserts)
            .field("size", &self.size)
            .field("backend", &self.backend())
            .finish_non_exhaustive()
    }
}

impl SplashTable {
    /// Make a new empty table with default options.
    ///
    /// `num_buckets` and `bucket_size` must be powers of two, and
    /// `num_hashes` between 1 and [`MAX_HASHES`].
    pub fn new(
        num_hashes: usize,
        num_buckets: usize,
        bucket_size: usize,
        max_reinserts: u32,
    ) -> Result<Self, Error> {
        SplashTableBuilder::new()
            .num_hashes(num_hashes)
            .num_buckets(num_buckets)
            .bucket_size(bucket_size)
            .max_reinserts(max_reinserts)
            .build()
    }

    /// Assemble a table from parts, choosing the probe backend.
    fn from_parts(
        hashes: HashFamily,
        buckets: BucketArray,
        size: usize,
        builder: &SplashTableBuilder,
        rng: StdRng,
    ) -> Result<Self, ConfigError> {
        let probe = ProbeRuntime::select(builder.probe, &hashes, buckets.bucket_size())?;
        Ok(Self {
            hashes,
            buckets,
            max_reinserts: builder.max_reinserts,
            size,
            rng,
            probe,
        })
    }

    /// Insert a new key/value pair.
    ///
    /// Fails with [`Error::DuplicateKey`] if the key already probes to a
    /// nonzero value, or [`Error::EvictionBudgetExceeded`] if no room could
    /// be made within the reinsert budget. The table is unchanged after
    /// either error.
    pub fn insert(&mut self, key: u32, value: u32) -> Result<(), Error> {
        if self.probe(key) != 0 {
            return Err(Error::DuplicateKey { key });
        }
        insert::place(
            &self.hashes,
            &mut self.buckets,
            &mut self.rng,
            self.max_reinserts,
            Entry::new(key, value),
        )?;
        self.size += 1;
        Ok(())
    }

    /// Insert pairs in order, stopping at the first failure.
    ///
    /// Returns how many pairs were inserted. On failure, the pairs before the
    /// failing one stay in the table and the count is in the error.
    pub fn insert_all<I>(&mut self, pairs: I) -> Result<usize, InsertAllError>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut inserted = 0;
        for (key, value) in pairs {
            self.insert(key, value)
                .map_err(|err| InsertAllError::new(inserted, err))?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Look up a key, returning its value or 0 if it's absent.
    #[inline]
    pub fn probe(&self, key: u32) -> u32 {
        self.probe.probe(&self.hashes, &self.buckets, key)
    }

    /// Look up a key with the scalar probe, whatever backend is active.
    pub fn probe_scalar(&self, key: u32) -> u32 {
        ScalarProbe.probe(&self.hashes, &self.buckets, key)
    }

    /// Check which probe backend is in effect.
    pub fn backend(&self) -> ProbeBackend {
        self.probe.backend()
    }

    /// Number of entries in the table
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.buckets.num_buckets() * self.buckets.bucket_size()
    }

    /// Number of hash functions, and so of candidate buckets per key
    pub fn num_hashes(&self) -> usize {
        self.hashes.len()
    }

    /// Number of buckets
    pub fn num_buckets(&self) -> usize {
        self.buckets.num_buckets()
    }

    /// Slots per bucket
    pub fn bucket_size(&self) -> usize {
        self.buckets.bucket_size()
    }

    /// Largest number of displacements one insert may make
    pub fn max_reinserts(&self) -> u32 {
        self.max_reinserts
    }

    /// Hash multipliers, in hash function order
    pub fn multipliers(&self) -> &[u32] {
        self.hashes.multipliers()
    }

    /// Base 2 logarithm of [`Self::capacity()`]
    pub fn log2_capacity(&self) -> u32 {
        self.capacity().trailing_zeros()
    }
}

/// Builder for creating [`SplashTable`] instances with custom settings
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SplashTableBuilder {
    /// Number of hash functions
    num_hashes: usize,
    /// Slots per bucket
    bucket_size: usize,
    /// Table size, in buckets or as a log2 entry count
    size: TableSize,
    /// Displacement budget per insert
    max_reinserts: u32,
    /// Probe backend preference
    probe: ProbeOption,
    /// Fixed seed for the table's random source, if any
    seed: Option<u64>,
}

impl Default for SplashTableBuilder {
    fn default() -> Self {
        Self {
            num_hashes: 2,
            bucket_size: 4,
            size: TableSize::Log2Capacity(16),
            max_reinserts: 32,
            probe: ProbeOption::default(),
            seed: None,
        }
    }
}

impl SplashTableBuilder {
    /// Create a new [`SplashTableBuilder`] with default settings.
    ///
    /// The defaults are 2 hash functions, 4-entry buckets, 2^16 slots, a
    /// budget of 32 reinserts, [`ProbeOption::TryVector`], and a random
    /// seed drawn from the operating system.
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the number of hash functions.
    pub fn num_hashes(&mut self, num_hashes: usize) -> &mut Self {
        self.num_hashes = num_hashes;
        self
    }

    /// Set the number of slots per bucket. Must be a power of two.
    pub fn bucket_size(&mut self, bucket_size: usize) -> &mut Self {
        self.bucket_size = bucket_size;
        self
    }

    /// Set the number of buckets. Must be a power of two.
    ///
    /// Replaces any earlier [`Self::log2_capacity()`].
    pub fn num_buckets(&mut self, num_buckets: usize) -> &mut Self {
        self.size = TableSize::Buckets(num_buckets);
        self
    }

    /// Set the total number of slots to `2^log2_capacity`; the bucket count
    /// follows from the bucket size.
    ///
    /// Replaces any earlier [`Self::num_buckets()`].
    pub fn log2_capacity(&mut self, log2_capacity: u32) -> &mut Self {
        self.size = TableSize::Log2Capacity(log2_capacity);
        self
    }

    /// Set the largest number of displacements one insert may make.
    pub fn max_reinserts(&mut self, max_reinserts: u32) -> &mut Self {
        self.max_reinserts = max_reinserts;
        self
    }

    /// Select a new [`ProbeOption`].
    pub fn probe(&mut self, probe: ProbeOption) -> &mut Self {
        self.probe = probe;
        self
    }

    /// Seed the table's random source, making multipliers and eviction
    /// choices reproducible.
    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.seed = Some(seed);
        self
    }

    /// Build an empty [`SplashTable`] with the selected options.
    pub fn build(&self) -> Result<SplashTable, Error> {
        let geometry = Geometry::new(self.num_hashes, self.bucket_size, self.size)?;
        let mut rng = self.rng();
        let hashes = HashFamily::generate(&mut rng, geometry.num_hashes, geometry.bucket_bits());
        let buckets = BucketArray::new(geometry.num_buckets, geometry.bucket_size);
        let table = SplashTable::from_parts(hashes, buckets, 0, self, rng)?;
        log::debug!(
            "new splash table: {} hashes, {} buckets of {}, {:?} probe",
            table.num_hashes(),
            table.num_buckets(),
            table.bucket_size(),
            table.backend()
        );
        Ok(table)
    }

    /// Random source for a new table
    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
