//! Bucket storage for the splash table
//!
//! All buckets live in one zero-initialized buffer of `u32`. Each bucket owns
//! a contiguous run of `2 * bucket_size` words: first its keys, then its
//! values. Keeping a bucket's keys adjacent to each other lets the vectorized
//! probe load them with a single 128-bit read.
//!
//! Alongside the buffer, a [`BucketState`] per bucket tracks the circular
//! window of live entries. Writes only happen through [`BucketArray::append`]
//! at the end of the window, and [`BucketArray::evict_oldest`] releases the
//! front of the window, which gives FIFO eviction order within a bucket.
//!
//! Probes don't consult the bucket state at all. They scan every slot,
//! relying on unused slots still holding zero.

use arrayref::array_ref;

/// One key/value pair as stored in a bucket slot
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub(crate) struct Entry {
    /// Lookup key
    pub(crate) key: u32,
    /// Associated value
    pub(crate) value: u32,
}

impl Entry {
    /// Pair up a key and a value.
    #[inline(always)]
    pub(crate) fn new(key: u32, value: u32) -> Self {
        Self { key, value }
    }
}

/// Circular window of live entries within one bucket
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
struct BucketState {
    /// Slot index of the oldest live entry
    start: usize,
    /// Number of live entries
    length: usize,
}

/// Fixed array of fixed-capacity circular buckets
#[derive(Debug, Clone)]
pub(crate) struct BucketArray {
    /// Backing memory, `[keys; bucket_size][values; bucket_size]` per bucket
    data: Box<[u32]>,
    /// Live window of each bucket
    state: Box<[BucketState]>,
    /// Slots per bucket, a power of two
    bucket_size: usize,
    /// `bucket_size - 1`, for wrapping slot indices
    slot_mask: usize,
}

impl BucketArray {
    /// Allocate `num_buckets` empty buckets of `bucket_size` slots each.
    ///
    /// `bucket_size` must be a power of two.
    pub(crate) fn new(num_buckets: usize, bucket_size: usize) -> Self {
        debug_assert!(bucket_size.is_power_of_two());
        Self {
            data: vec![0; num_buckets * bucket_size * 2].into_boxed_slice(),
            state: vec![BucketState::default(); num_buckets].into_boxed_slice(),
            bucket_size,
            slot_mask: bucket_size - 1,
        }
    }

    /// Number of buckets
    #[inline(always)]
    pub(crate) fn num_buckets(&self) -> usize {
        self.state.len()
    }

    /// Slots per bucket
    #[inline(always)]
    pub(crate) fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Offset of a bucket's first key within `data`
    #[inline(always)]
    fn key_offset(&self, bucket: usize) -> usize {
        bucket * self.bucket_size * 2
    }

    /// Offset of a bucket's first value within `data`
    #[inline(always)]
    fn value_offset(&self, bucket: usize) -> usize {
        self.key_offset(bucket) + self.bucket_size
    }

    /// All key slots of one bucket, live or not.
    #[inline(always)]
    pub(crate) fn keys(&self, bucket: usize) -> &[u32] {
        let offset = self.key_offset(bucket);
        &self.data[offset..offset + self.bucket_size]
    }

    /// All value slots of one bucket, live or not.
    #[inline(always)]
    pub(crate) fn values(&self, bucket: usize) -> &[u32] {
        let offset = self.value_offset(bucket);
        &self.data[offset..offset + self.bucket_size]
    }

    /// First four key slots of a bucket, for 128-bit loads.
    ///
    /// Panics if the bucket is out of range or the array ends early.
    #[inline(always)]
    pub(crate) fn keys_x4(&self, bucket: usize) -> &[u32; 4] {
        array_ref![self.data, self.key_offset(bucket), 4]
    }

    /// First four value slots of a bucket, for 128-bit loads.
    ///
    /// Panics if the bucket is out of range or the array ends early.
    #[inline(always)]
    pub(crate) fn values_x4(&self, bucket: usize) -> &[u32; 4] {
        array_ref![self.data, self.value_offset(bucket), 4]
    }

    /// Number of live entries in a bucket
    #[inline(always)]
    pub(crate) fn len(&self, bucket: usize) -> usize {
        self.state[bucket].length
    }

    /// Check whether a bucket has no free slot left.
    #[inline(always)]
    pub(crate) fn is_full(&self, bucket: usize) -> bool {
        self.state[bucket].length == self.bucket_size
    }

    /// Read one slot, live or not.
    #[inline(always)]
    pub(crate) fn slot(&self, bucket: usize, item: usize) -> Entry {
        Entry::new(
            self.data[self.key_offset(bucket) + item],
            self.data[self.value_offset(bucket) + item],
        )
    }

    /// Overwrite one slot without touching the bucket's live window.
    #[inline(always)]
    fn write_slot(&mut self, bucket: usize, item: usize, entry: Entry) {
        let key_offset = self.key_offset(bucket);
        let value_offset = self.value_offset(bucket);
        self.data[key_offset + item] = entry.key;
        self.data[value_offset + item] = entry.value;
    }

    /// Append an entry after the newest live entry of a bucket.
    ///
    /// The bucket must not be full.
    #[inline(always)]
    pub(crate) fn append(&mut self, bucket: usize, entry: Entry) {
        debug_assert!(!self.is_full(bucket));
        let BucketState { start, length } = self.state[bucket];
        self.write_slot(bucket, (start + length) & self.slot_mask, entry);
        self.state[bucket].length = length + 1;
    }

    /// Remove and return the oldest live entry of a bucket.
    ///
    /// The bucket must not be empty. The slot keeps its old contents until
    /// something is appended over it.
    #[inline(always)]
    pub(crate) fn evict_oldest(&mut self, bucket: usize) -> Entry {
        debug_assert!(self.state[bucket].length > 0);
        let BucketState { start, length } = self.state[bucket];
        let entry = self.slot(bucket, start);
        self.state[bucket] = BucketState {
            start: (start + 1) & self.slot_mask,
            length: length - 1,
        };
        entry
    }

    /// Undo one [`Self::evict_oldest`] followed by one [`Self::append`] on a
    /// bucket that was full before and after.
    ///
    /// The appended entry is dropped and `evicted` goes back to the front of
    /// the bucket, in the same slot it came from.
    #[inline(always)]
    pub(crate) fn restore_oldest(&mut self, bucket: usize, evicted: Entry) {
        debug_assert!(self.is_full(bucket));
        let start = self.state[bucket].start.wrapping_sub(1) & self.slot_mask;
        self.write_slot(bucket, start, evicted);
        self.state[bucket].start = start;
    }

    /// Every slot of every bucket, bucket-major and slot-minor.
    pub(crate) fn slots(&self) -> impl Iterator<Item = Entry> + '_ {
        (0..self.num_buckets())
            .flat_map(move |bucket| (0..self.bucket_size).map(move |item| self.slot(bucket, item)))
    }

    /// Fill every slot from a bucket-major, slot-minor sequence.
    ///
    /// Live windows are rebuilt afterwards: each bucket starts at slot 0 and
    /// its live entries are the leading slots holding a nonzero key.
    /// Returns the total number of live entries.
    ///
    /// The sequence must produce exactly `num_buckets * bucket_size` items.
    pub(crate) fn fill_from<I, E>(&mut self, entries: I) -> Result<usize, E>
    where
        I: IntoIterator<Item = Result<Entry, E>>,
    {
        let mut entries = entries.into_iter();
        let mut live = 0;
        for bucket in 0..self.num_buckets() {
            for item in 0..self.bucket_size {
                let entry = match entries.next() {
                    Some(entry) => entry?,
                    None => break,
                };
                self.write_slot(bucket, item, entry);
            }
            let length = self
                .keys(bucket)
                .iter()
                .take_while(|&&key| key != 0)
                .count();
            self.state[bucket] = BucketState { start: 0, length };
            live += length;
        }
        Ok(live)
    }
}

#[cfg(test)]
mod test {
    use super::{BucketArray, Entry};

    #[test]
    fn layout_is_keys_then_values() {
        let mut array = BucketArray::new(2, 4);
        array.append(1, Entry::new(10, 100));
        array.append(1, Entry::new(11, 101));
        assert_eq!(array.keys(0), &[0, 0, 0, 0]);
        assert_eq!(array.keys(1), &[10, 11, 0, 0]);
        assert_eq!(array.values(1), &[100, 101, 0, 0]);
        assert_eq!(array.keys_x4(1), &[10, 11, 0, 0]);
        assert_eq!(array.values_x4(1), &[100, 101, 0, 0]);
        assert_eq!(array.len(1), 2);
        assert!(!array.is_full(1));
    }

    #[test]
    fn fifo_eviction() {
        let mut array = BucketArray::new(1, 2);
        array.append(0, Entry::new(1, 1));
        array.append(0, Entry::new(2, 2));
        assert!(array.is_full(0));

        assert_eq!(array.evict_oldest(0), Entry::new(1, 1));
        array.append(0, Entry::new(3, 3));
        assert!(array.is_full(0));
        // The new entry landed in the slot freed by the eviction
        assert_eq!(array.keys(0), &[3, 2]);

        assert_eq!(array.evict_oldest(0), Entry::new(2, 2));
        array.append(0, Entry::new(4, 4));
        assert_eq!(array.evict_oldest(0), Entry::new(3, 3));
        assert_eq!(array.evict_oldest(0), Entry::new(4, 4));
        assert_eq!(array.len(0), 0);
    }

    #[test]
    fn restore_reverses_replacement() {
        let mut array = BucketArray::new(1, 4);
        for key in 1..=4 {
            array.append(0, Entry::new(key, key * 10));
        }
        let before = array.clone();

        let first = array.evict_oldest(0);
        array.append(0, Entry::new(50, 500));
        let second = array.evict_oldest(0);
        array.append(0, Entry::new(60, 600));
        assert_eq!(array.keys(0), &[50, 60, 3, 4]);

        array.restore_oldest(0, second);
        array.restore_oldest(0, first);
        assert_eq!(array.keys(0), before.keys(0));
        assert_eq!(array.values(0), before.values(0));
        assert_eq!(array.evict_oldest(0), Entry::new(1, 10));
    }

    #[test]
    fn restore_wraps_around() {
        let mut array = BucketArray::new(1, 2);
        array.append(0, Entry::new(1, 1));
        array.append(0, Entry::new(2, 2));
        let evicted = array.evict_oldest(0);
        array.append(0, Entry::new(3, 3));
        let evicted2 = array.evict_oldest(0);
        array.append(0, Entry::new(4, 4));
        // start has wrapped back to slot 0
        array.restore_oldest(0, evicted2);
        array.restore_oldest(0, evicted);
        assert_eq!(array.keys(0), &[1, 2]);
        assert_eq!(array.evict_oldest(0), Entry::new(1, 1));
    }

    #[test]
    fn fill_rebuilds_windows() {
        let mut array = BucketArray::new(2, 2);
        let slots = [(5, 50), (0, 0), (6, 60), (7, 70)]
            .map(|(k, v)| Ok::<_, ()>(Entry::new(k, v)));
        assert_eq!(array.fill_from(slots), Ok(3));
        assert_eq!(array.len(0), 1);
        assert!(array.is_full(1));
        assert_eq!(
            array.slots().collect::<Vec<_>>(),
            vec![
                Entry::new(5, 50),
                Entry::new(0, 0),
                Entry::new(6, 60),
                Entry::new(7, 70)
            ]
        );
        // Further appends go after the rebuilt window
        array.append(0, Entry::new(8, 80));
        assert_eq!(array.keys(0), &[5, 8]);
    }
}
