//! Insertion and the eviction cascade
//!
//! A new entry goes into the first of its candidate buckets with a free
//! slot. If every candidate is full, a victim bucket is picked at random, its
//! oldest entry is pushed out to make room, and the displaced entry then goes
//! through the same process with its own candidates. The walk stops when
//! something lands in a free slot or when the reinsert budget runs out.
//!
//! Each displacement is recorded in an [`UndoLog`]. If the budget runs out,
//! the log is replayed backwards so the table ends up exactly as it started.

use crate::bucket_array::{BucketArray, Entry};
use crate::err::Error;
use crate::hash::HashFamily;
use rand::Rng;

/// Displacements made by one insert, oldest first
#[derive(Debug, Default)]
struct UndoLog(Vec<(usize, Entry)>);

impl UndoLog {
    /// Note that `evicted` was pushed out of `bucket` and replaced.
    #[inline(always)]
    fn record(&mut self, bucket: usize, evicted: Entry) {
        self.0.push((bucket, evicted));
    }

    /// Undo every recorded displacement, newest first.
    fn rollback(self, buckets: &mut BucketArray) {
        for (bucket, evicted) in self.0.into_iter().rev() {
            buckets.restore_oldest(bucket, evicted);
        }
    }
}

/// Pick a victim among the candidate buckets, uniformly at random.
///
/// This is reservoir sampling over the candidates in hash function order,
/// skipping `avoid` (the bucket the entry being placed was just evicted
/// from). If every candidate is `avoid`, that bucket is returned anyway.
///
/// `candidates` must not be empty.
pub(crate) fn choose_victim<R: Rng>(rng: &mut R, candidates: &[usize], avoid: Option<usize>) -> usize {
    let mut chosen = None;
    let mut try_num = 1_u32;
    for &bucket in candidates {
        if Some(bucket) == avoid {
            continue;
        }
        if rng.gen_range(0..try_num) == 0 {
            chosen = Some(bucket);
        }
        try_num += 1;
    }
    chosen.or(avoid).unwrap_or_else(|| candidates[0])
}

/// Place an entry that's known not to be in the table yet.
///
/// On success the entry and everything it displaced have found slots. On
/// [`Error::EvictionBudgetExceeded`] the buckets are restored to their state
/// before the call.
pub(crate) fn place<R: Rng>(
    hashes: &HashFamily,
    buckets: &mut BucketArray,
    rng: &mut R,
    max_reinserts: u32,
    entry: Entry,
) -> Result<(), Error> {
    let mut undo = UndoLog::default();
    let mut current = entry;
    let mut avoid = None;
    let mut reinserts = 0_u64;

    loop {
        if reinserts > u64::from(max_reinserts) {
            undo.rollback(buckets);
            log::debug!(
                "giving up on key {} after {} reinserts, table restored",
                entry.key,
                max_reinserts
            );
            return Err(Error::EvictionBudgetExceeded {
                key: entry.key,
                reinserts: max_reinserts,
            });
        }

        let candidates = hashes.candidates(current.key);
        if let Some(&bucket) = candidates.iter().find(|&&bucket| !buckets.is_full(bucket)) {
            buckets.append(bucket, current);
            return Ok(());
        }

        let victim = choose_victim(rng, &candidates, avoid);
        let evicted = buckets.evict_oldest(victim);
        buckets.append(victim, current);
        undo.record(victim, evicted);
        log::trace!(
            "key {} displaced key {} from bucket {}",
            current.key,
            evicted.key,
            victim
        );

        current = evicted;
        avoid = Some(victim);
        reinserts += 1;
    }
}

#[cfg(test)]
mod test {
    use super::{choose_victim, place};
    use crate::bucket_array::{BucketArray, Entry};
    use crate::err::Error;
    use crate::hash::HashFamily;
    use rand::{rngs::StdRng, SeedableRng};
    use test_log::test;

    /// Pearson's chi-squared statistic against a uniform distribution.
    fn chi_squared(counts: &[u64]) -> f64 {
        let total: u64 = counts.iter().sum();
        let expected = total as f64 / counts.len() as f64;
        counts
            .iter()
            .map(|&c| (c as f64 - expected).powi(2) / expected)
            .sum()
    }

    #[test]
    fn victim_uniform_with_exclusion() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let candidates = [3, 7, 11, 19];
        let mut counts = [0_u64; 4];
        for _ in 0..30_000 {
            let victim = choose_victim(&mut rng, &candidates, Some(7));
            let index = candidates
                .iter()
                .position(|&b| b == victim)
                .expect("victim is a candidate");
            counts[index] += 1;
        }
        assert_eq!(counts[1], 0);
        let eligible = [counts[0], counts[2], counts[3]];
        // 2 degrees of freedom, p < 0.0001 at 18.4
        assert!(chi_squared(&eligible) < 18.4, "{eligible:?}");
    }

    #[test]
    fn victim_uniform_first_step() {
        let mut rng = StdRng::seed_from_u64(42);
        let candidates = [0, 1, 2, 3, 4];
        let mut counts = [0_u64; 5];
        for _ in 0..50_000 {
            counts[choose_victim(&mut rng, &candidates, None)] += 1;
        }
        // 4 degrees of freedom, p < 0.0001 at 23.5
        assert!(chi_squared(&counts) < 23.5, "{counts:?}");
    }

    #[test]
    fn victim_fallback_when_all_excluded() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(choose_victim(&mut rng, &[5], Some(5)), 5);
        assert_eq!(choose_victim(&mut rng, &[5, 5, 5], Some(5)), 5);
        assert_eq!(choose_victim(&mut rng, &[5], None), 5);
        for _ in 0..100 {
            assert_eq!(choose_victim(&mut rng, &[5, 8, 5], Some(5)), 8);
        }
    }

    /// Two buckets of one slot, with multipliers chosen so that odd keys can
    /// go in either bucket and even keys only in the one picked by their top
    /// bit.
    fn two_slot_table() -> (HashFamily, BucketArray) {
        let hashes = HashFamily::from_multipliers(&[1, 0x8000_0001], 1).expect("two multipliers");
        (hashes, BucketArray::new(2, 1))
    }

    #[test]
    fn cascade_relocates() {
        let (hashes, mut buckets) = two_slot_table();
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(hashes.candidates(3).as_slice(), &[0, 1]);
        assert_eq!(hashes.candidates(2).as_slice(), &[0, 0]);

        place(&hashes, &mut buckets, &mut rng, 1, Entry::new(3, 30)).expect("free slot");
        assert_eq!(buckets.keys(0), &[3]);

        // 2 can only go in bucket 0, so 3 moves over to bucket 1
        place(&hashes, &mut buckets, &mut rng, 1, Entry::new(2, 20)).expect("one reinsert");
        assert_eq!(buckets.keys(0), &[2]);
        assert_eq!(buckets.keys(1), &[3]);
        assert_eq!(buckets.values(1), &[30]);
    }

    #[test]
    fn cascade_budget_rolls_back() {
        let (hashes, mut buckets) = two_slot_table();
        let mut rng = StdRng::seed_from_u64(9);
        place(&hashes, &mut buckets, &mut rng, 0, Entry::new(3, 30)).expect("free slot");
        let before: Vec<Entry> = buckets.slots().collect();

        assert!(matches!(
            place(&hashes, &mut buckets, &mut rng, 0, Entry::new(2, 20)),
            Err(Error::EvictionBudgetExceeded { key: 2, reinserts: 0 })
        ));
        assert_eq!(buckets.slots().collect::<Vec<_>>(), before);
        assert_eq!(buckets.len(0), 1);
        assert_eq!(buckets.len(1), 0);
    }

    #[test]
    fn long_cascade_rolls_back() {
        let (hashes, mut buckets) = two_slot_table();
        let mut rng = StdRng::seed_from_u64(77);
        place(&hashes, &mut buckets, &mut rng, 8, Entry::new(3, 30)).expect("free slot");
        place(&hashes, &mut buckets, &mut rng, 8, Entry::new(5, 50)).expect("free slot");
        let before: Vec<Entry> = buckets.slots().collect();

        // No room for a third entry, however long the walk
        assert!(matches!(
            place(&hashes, &mut buckets, &mut rng, 8, Entry::new(7, 70)),
            Err(Error::EvictionBudgetExceeded { key: 7, reinserts: 8 })
        ));
        assert_eq!(buckets.slots().collect::<Vec<_>>(), before);
    }
}
