//! Error types for the `splash` crate

use std::sync::Arc;

/// Errors applicable to building, filling, and loading a splash table
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The key is already present in the table.
    ///
    /// Nothing was written; the table is exactly as it was before the call.
    #[error("key {key} is already present in the table")]
    DuplicateKey {
        /// Key that was rejected
        key: u32,
    },

    /// The eviction cascade ran past the configured reinsert budget.
    ///
    /// Every relocation made by the cascade has been undone, so the table
    /// is unchanged and the requested entry was not placed.
    #[error("eviction cascade for key {key} exceeded the budget of {reinserts} reinserts")]
    EvictionBudgetExceeded {
        /// Key whose insertion was abandoned
        key: u32,
        /// Reinsert budget that was exhausted
        reinserts: u32,
    },

    /// The requested table configuration is not usable.
    #[error("invalid table configuration: {0}")]
    Config(#[from] ConfigError),

    /// A serialized table could not be parsed.
    #[error("invalid table dump: {0}")]
    Decode(#[from] DecodeError),
}

/// Problems with a table's shape or its probe backend
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The number of hash functions is outside the supported range.
    #[error("number of hash functions must be between 1 and {max}, got {got}")]
    NumHashes {
        /// Requested number of hash functions
        got: usize,
        /// Largest supported number of hash functions
        max: usize,
    },

    /// Bucket capacity must be a nonzero power of two.
    #[error("bucket size must be a power of two, got {0}")]
    BucketSize(usize),

    /// Bucket count must be a nonzero power of two.
    #[error("number of buckets must be a power of two, got {0}")]
    NumBuckets(usize),

    /// Table capacity, as a base 2 logarithm, is too large.
    #[error("log2 of the table capacity must be at most {max}, got {got}")]
    Capacity {
        /// Requested log2 of the capacity
        got: u32,
        /// Largest supported log2 of the capacity
        max: u32,
    },

    /// A single bucket would hold more entries than the whole table.
    #[error("bucket size {bucket_size} exceeds the table capacity of {capacity} entries")]
    BucketLargerThanTable {
        /// Requested bucket size
        bucket_size: usize,
        /// Total table capacity in entries
        capacity: usize,
    },

    /// The vectorized probe only handles two hash functions and 4-entry buckets.
    #[error(
        "vectorized probe requires 2 hash functions and bucket size 4, \
         got {num_hashes} hash functions and bucket size {bucket_size}"
    )]
    VectorShape {
        /// Number of hash functions in the table
        num_hashes: usize,
        /// Bucket size of the table
        bucket_size: usize,
    },

    /// The vectorized probe was required but this CPU or target can't run it.
    #[error("vectorized probe is not supported on this target")]
    VectorUnsupported,
}

/// Problems found while reading a table dump
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// Reading the underlying stream failed, with a [`std::io::Error`].
    #[error("I/O error while reading the dump: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// The dump ended before all expected lines were read.
    #[error("unexpected end of dump at line {line}")]
    UnexpectedEof {
        /// 1-based line number that was expected next
        line: usize,
    },

    /// The header line doesn't hold exactly four unsigned integers.
    #[error("malformed header on line {line}")]
    Header {
        /// 1-based line number of the header
        line: usize,
    },

    /// The multiplier line doesn't hold one u32 per hash function.
    #[error("malformed hash multiplier list on line {line}")]
    Multipliers {
        /// 1-based line number of the multiplier list
        line: usize,
    },

    /// A slot line doesn't hold exactly one u32 key and one u32 value.
    #[error("malformed slot on line {line}")]
    Slot {
        /// 1-based line number of the slot
        line: usize,
    },

    /// The header claims more entries than the table has slots.
    #[error("header on line {line} claims {size} entries but the table only has {capacity} slots")]
    Size {
        /// 1-based line number of the header
        line: usize,
        /// Entry count from the header
        size: usize,
        /// Total slots in the described table
        capacity: usize,
    },

    /// The header describes a table shape we can't build.
    #[error("header describes an invalid table: {0}")]
    Geometry(#[source] ConfigError),

    /// Non-blank content follows the last slot.
    #[error("unexpected trailing data on line {line}")]
    TrailingData {
        /// 1-based line number of the first trailing line
        line: usize,
    },
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// A bulk insert stopped early
///
/// Pairs ahead of the failing one stay in the table; the failing pair and
/// everything after it were not inserted.
#[derive(Clone, Debug, thiserror::Error)]
#[error("bulk insert stopped after {inserted} entries: {source}")]
pub struct InsertAllError {
    /// Number of pairs successfully inserted before the failure
    inserted: usize,
    /// The error reported by the failing insert
    #[source]
    source: Error,
}

impl InsertAllError {
    /// Build a new error from a count and the failing insert's error.
    pub(crate) fn new(inserted: usize, source: Error) -> Self {
        Self { inserted, source }
    }

    /// Number of pairs inserted before the failure.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// The error returned by the insert that failed.
    pub fn error(&self) -> &Error {
        &self.source
    }
}
