//! # Cuckoo Filter
//!
//! This implementation is based on the paper _Cuckoo Filter: Practically Better Than Bloom_, by Fan et. al.
//!
//! The paper recommends a (2, 4) CF (2 possible buckets for each item, and 4 fingerprints in each bucket) because it's space optimal for practical false positive rates. Unlike a growable filter, this one is a view over memory the caller owns: sizing happens once at `init`, and no operation allocates.
//!
//! The paper's authors have provided a reference C++ implementation in this repository: <https://github.com/efficient/cuckoofilter>

use log::{debug, trace};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{FilterConfig, MAX_KICKS_LIMIT, MAX_SLOTS_PER_BUCKET};
use crate::error::CuckooFilterError;
use crate::hash::{alternate_index, Fingerprint, ItemHash};
use crate::table::{self, BucketTable};

/// Parameters that describe a table laid over a region
///
/// Persist this next to the region to re-attach a filter later with [`CuckooFilter::restore`]. Field order and widths are part of the C ABI.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterHeader {
    pub bucket_count: u64,
    pub count: u64,
    pub slots_per_bucket: u32,
    pub fingerprint_bits: u32,
    pub max_kicks: u32,
}

/// The two buckets a fingerprint may legally occupy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidates<F: Fingerprint> {
    pub primary: usize,
    pub alternate: usize,
    pub fingerprint: F,
}

/// A Cuckoo Filter over a borrowed byte region
///
/// ### Notes
///
/// - Mutation takes `&mut self` and lookups take `&self`, so a shared filter gets the single-writer, multiple-reader discipline from the borrow checker
/// - The PRNG only picks eviction victims; lookups are fully deterministic
#[derive(Debug)]
pub struct CuckooFilter<'a, F: Fingerprint> {
    table: BucketTable<'a, F>,
    count: usize,
    max_kicks: u32,
    rng: ChaCha8Rng,
}

impl<'a, F: Fingerprint> CuckooFilter<'a, F> {
    /// Initialize a filter with default parameters over `memory`
    ///
    /// The table takes the largest power-of-two bucket count that fits. A `target_capacity` of 0 accepts whatever fits; otherwise the table must provide at least that many slots.
    pub fn init(memory: &'a mut [u8], target_capacity: usize) -> Result<Self, CuckooFilterError> {
        Self::init_with_config(memory, target_capacity, FilterConfig::default())
    }

    /// Initialize a filter over `memory`, zero-filling the bucket region
    ///
    /// ### Caveats
    ///
    /// - The bucket count is rounded down to a power of two so that indices can be masked and the alternate-bucket XOR stays inside the table. Bytes past the table are never touched.
    pub fn init_with_config(
        memory: &'a mut [u8],
        target_capacity: usize,
        config: FilterConfig,
    ) -> Result<Self, CuckooFilterError> {
        let slots = config.slots_per_bucket() as usize;
        let available = memory.len();
        let capacity_error = CuckooFilterError::Capacity {
            available,
            required: table::size_for_exactly(target_capacity, slots, F::BYTES),
        };

        let bucket_count = table::buckets_for(available, slots, F::BYTES);
        if bucket_count == 0 || bucket_count * slots < target_capacity {
            return Err(capacity_error);
        }
        let mut table = BucketTable::overlay(memory, bucket_count, slots).ok_or(capacity_error)?;
        table.clear();

        debug!(
            "cuckoo filter init: {} buckets x {} slots of {} bits ({} of {} bytes)",
            bucket_count,
            slots,
            F::BITS,
            bucket_count * slots * F::BYTES,
            available
        );
        Ok(CuckooFilter {
            table,
            count: 0,
            max_kicks: config.max_kicks(),
            rng: ChaCha8Rng::seed_from_u64(config.seed()),
        })
    }

    /// Re-attach to a region that already holds the buckets described by `header`
    ///
    /// The bucket contents are trusted as-is. This is how a caller moves a filter after copying or relocating its memory. `header.count` is only checked against the slot total; if it under-counts the occupied slots, `len` stays low and deletes stop decrementing at 0.
    pub fn restore(memory: &'a mut [u8], header: FilterHeader, seed: u64) -> Result<Self, CuckooFilterError> {
        let available = memory.len();
        let slots = header.slots_per_bucket as usize;
        let required = usize::try_from(header.bucket_count)
            .ok()
            .and_then(|buckets| buckets.checked_mul(slots))
            .and_then(|total| total.checked_mul(F::BYTES))
            .unwrap_or(usize::MAX);
        let capacity_error = CuckooFilterError::Capacity { available, required };

        let well_formed = header.fingerprint_bits == F::BITS
            && header.bucket_count.is_power_of_two()
            && (1..=MAX_SLOTS_PER_BUCKET).contains(&header.slots_per_bucket);
        if !well_formed {
            return Err(capacity_error);
        }
        let bucket_count = usize::try_from(header.bucket_count).map_err(|_| capacity_error)?;
        let table = BucketTable::overlay(memory, bucket_count, slots).ok_or(capacity_error)?;
        if header.count > table.total_slots() as u64 {
            return Err(capacity_error);
        }

        debug!(
            "cuckoo filter restore: {} buckets x {} slots of {} bits, {} occupied",
            header.bucket_count,
            slots,
            F::BITS,
            header.count
        );
        Ok(CuckooFilter {
            table,
            count: header.count as usize,
            max_kicks: header.max_kicks.min(MAX_KICKS_LIMIT),
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Bytes needed to hold `min_capacity` items at no more than 95% load with default parameters
    pub fn size_for(min_capacity: usize) -> usize {
        FilterConfig::default().size_for::<F>(min_capacity)
    }

    /// Bytes needed for the smallest default table with at least `min_capacity` slots
    pub fn size_for_exactly(min_capacity: usize) -> usize {
        FilterConfig::default().size_for_exactly::<F>(min_capacity)
    }

    /// Slots a default table over `size` bytes would provide
    pub fn capacity(size: usize) -> usize {
        FilterConfig::default().capacity::<F>(size)
    }

    pub fn header(&self) -> FilterHeader {
        FilterHeader {
            bucket_count: self.table.bucket_count() as u64,
            count: self.count as u64,
            slots_per_bucket: self.table.slots_per_bucket() as u32,
            fingerprint_bits: F::BITS,
            max_kicks: self.max_kicks,
        }
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.table.bucket_count()
    }

    pub fn slots_per_bucket(&self) -> usize {
        self.table.slots_per_bucket()
    }

    pub fn total_slots(&self) -> usize {
        self.table.total_slots()
    }

    /// Fraction of slots occupied
    pub fn load_factor(&self) -> f64 {
        self.count as f64 / self.total_slots() as f64
    }

    /// Bytes of the region the table occupies
    pub fn memory_size(&self) -> usize {
        self.total_slots() * F::BYTES
    }

    /// Empty every bucket
    pub fn clear(&mut self) {
        self.table.clear();
        self.count = 0;
    }

    /// Draw a fresh seed from the kick PRNG, so a handle can carry its state between calls
    pub(crate) fn next_seed(&mut self) -> u64 {
        self.rng.next_u64()
    }

    #[inline]
    fn mask(&self) -> u64 {
        self.table.bucket_count() as u64 - 1
    }

    /// We can calculate a new bucket for an evicted item despite only having that item's fingerprint
    #[inline]
    fn alternate(&self, bucket: usize, fingerprint: F) -> usize {
        alternate_index(bucket as u64, fingerprint, self.mask()) as usize
    }

    fn candidates_hashed(&self, hash: u64, fingerprint: F) -> Candidates<F> {
        let fingerprint = fingerprint.non_empty();
        let primary = (hash & self.mask()) as usize;
        Candidates {
            primary,
            alternate: self.alternate(primary, fingerprint),
            fingerprint,
        }
    }

    /// Candidate buckets and fingerprint of `item` under `seed`
    pub fn candidates(&self, seed: u32, item: &[u8]) -> Candidates<F> {
        let hash = ItemHash::of(item, seed);
        self.candidates_hashed(hash.index, hash.fingerprint())
    }

    /// Add item to filter. Returns Err if the eviction budget runs out, in which case the table is unchanged.
    pub fn add(&mut self, seed: u32, item: &[u8]) -> Result<(), CuckooFilterError> {
        let candidates = self.candidates(seed, item);
        self.place(candidates)
    }

    /// Add a pre-hashed item: `hash` selects the primary bucket and `fingerprint` is stored as given (0 is remapped to 1)
    pub fn add_hashed(&mut self, hash: u64, fingerprint: F) -> Result<(), CuckooFilterError> {
        let candidates = self.candidates_hashed(hash, fingerprint);
        self.place(candidates)
    }

    /// Check if item is in filter
    pub fn contains(&self, seed: u32, item: &[u8]) -> bool {
        self.lookup(self.candidates(seed, item))
    }

    pub fn contains_hashed(&self, hash: u64, fingerprint: F) -> bool {
        self.lookup(self.candidates_hashed(hash, fingerprint))
    }

    /// Delete an item from the filter
    pub fn delete(&mut self, seed: u32, item: &[u8]) -> Result<(), CuckooFilterError> {
        let candidates = self.candidates(seed, item);
        self.evict(candidates)
    }

    pub fn delete_hashed(&mut self, hash: u64, fingerprint: F) -> Result<(), CuckooFilterError> {
        let candidates = self.candidates_hashed(hash, fingerprint);
        self.evict(candidates)
    }

    fn lookup(&self, candidates: Candidates<F>) -> bool {
        self.table.contains(candidates.primary, candidates.fingerprint)
            || self.table.contains(candidates.alternate, candidates.fingerprint)
    }

    fn evict(&mut self, candidates: Candidates<F>) -> Result<(), CuckooFilterError> {
        if self.table.remove(candidates.primary, candidates.fingerprint)
            || self.table.remove(candidates.alternate, candidates.fingerprint)
        {
            // A restored header may under-count the region it describes
            self.count = self.count.saturating_sub(1);
            return Ok(());
        }
        Err(CuckooFilterError::NotFound)
    }

    fn place(&mut self, candidates: Candidates<F>) -> Result<(), CuckooFilterError> {
        let Candidates {
            primary,
            alternate,
            fingerprint,
        } = candidates;

        // Try inserting into either bucket
        if self.table.try_insert(primary, fingerprint) || self.table.try_insert(alternate, fingerprint) {
            self.count += 1;
            return Ok(());
        }

        // If both buckets are full, begin eviction process. `path[k]` is the slot swapped at kick k.
        let mut path = [0u8; MAX_KICKS_LIMIT as usize];
        let kicks = self.max_kicks as usize;
        let slots = self.table.slots_per_bucket();
        let mut bucket = if self.rng.gen::<bool>() { primary } else { alternate };
        let mut in_hand = fingerprint;

        for (kick, step) in path[..kicks].iter_mut().enumerate() {
            let slot = self.rng.gen_range(0..slots);
            *step = slot as u8;
            in_hand = self.table.swap(bucket, slot, in_hand);
            bucket = self.alternate(bucket, in_hand);
            if self.table.try_insert(bucket, in_hand) {
                self.count += 1;
                trace!("cuckoo filter insert settled after {} kicks", kick + 1);
                return Ok(());
            }
        }

        debug!(
            "cuckoo filter full after {} kicks at {} of {} slots, rolling back",
            kicks,
            self.count,
            self.total_slots()
        );
        // Walk the chain backwards: each fingerprint in hand returns to the bucket it was evicted from
        for &slot in path[..kicks].iter().rev() {
            bucket = self.alternate(bucket, in_hand);
            in_hand = self.table.swap(bucket, slot as usize, in_hand);
        }
        debug_assert_eq!(in_hand, fingerprint);
        Err(CuckooFilterError::FilterFull)
    }
}

/* -------------------- Unit Tests -------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn snapshot<F: Fingerprint>(cf: &CuckooFilter<'_, F>) -> Vec<F> {
        (0..cf.bucket_count())
            .flat_map(|b| (0..cf.slots_per_bucket()).map(move |s| (b, s)))
            .map(|(b, s)| cf.table.get(b, s))
            .collect()
    }

    #[test]
    fn make_filter_normal_conditions() {
        let mut memory = [0xAAu8; 256];
        let cf = CuckooFilter::<u8>::init(&mut memory, 256).unwrap();
        assert_eq!(cf.bucket_count(), 256 / 4);
        assert_eq!(cf.total_slots(), 256);
        assert_eq!(cf.memory_size(), 256);
        assert!(cf.is_empty());
        assert!(snapshot(&cf).iter().all(|&fp| fp == 0));
    }

    #[test]
    fn make_filter_rounds_down_to_power_of_two() {
        let mut memory = vec![0u8; 1000];
        let cf = CuckooFilter::<u16>::init(&mut memory, 0).unwrap();
        assert_eq!(cf.bucket_count(), 64);
        assert_eq!(cf.header().fingerprint_bits, 16);
    }

    #[test]
    fn make_filter_too_small() {
        let mut memory = [0u8; 15];
        let err = CuckooFilter::<u32>::init(&mut memory, 0).unwrap_err();
        assert_eq!(
            err,
            CuckooFilterError::Capacity {
                available: 15,
                required: 16
            }
        );
        let mut memory = [0u8; 256];
        assert!(matches!(
            CuckooFilter::<u8>::init(&mut memory, 257),
            Err(CuckooFilterError::Capacity { required: 512, .. })
        ));
    }

    #[test]
    fn insert_lookup_delete_item() {
        let mut memory = [0u8; 256];
        let mut cf = CuckooFilter::<u8>::init(&mut memory, 256).unwrap();
        assert_eq!(cf.add(0, b"a"), Ok(()));
        assert!(cf.contains(0, b"a"));
        assert!(!cf.contains(0, b"b"));
        assert_eq!(cf.len(), 1);
        assert_eq!(cf.delete(0, b"a"), Ok(()));
        assert!(!cf.contains(0, b"a"));
        assert_eq!(cf.delete(0, b"a"), Err(CuckooFilterError::NotFound));
        assert!(cf.is_empty());
    }

    #[test]
    fn candidates_are_symmetric() {
        let mut memory = vec![0u8; 4096];
        let cf = CuckooFilter::<u16>::init(&mut memory, 0).unwrap();
        for i in 0u32..500 {
            let c = cf.candidates(i % 3, &i.to_le_bytes());
            assert_ne!(c.fingerprint, 0);
            assert_eq!(cf.alternate(c.alternate, c.fingerprint), c.primary);
            assert_eq!(c, cf.candidates(i % 3, &i.to_le_bytes()));
        }
    }

    #[test]
    fn hashed_zero_fingerprint_is_remapped() {
        let mut memory = [0u8; 64];
        let mut cf = CuckooFilter::<u8>::init(&mut memory, 0).unwrap();
        cf.add_hashed(5, 0).unwrap();
        assert!(cf.contains_hashed(5, 0));
        assert!(cf.contains_hashed(5, 1));
        cf.delete_hashed(5, 1).unwrap();
        assert!(!cf.contains_hashed(5, 0));
    }

    #[test]
    fn failed_insert_leaves_table_untouched() {
        let mut memory = [0u8; 8];
        let config = FilterConfig::new().with_seed(3);
        let mut cf = CuckooFilter::<u8>::init_with_config(&mut memory, 8, config).unwrap();
        let mut inserted = Vec::new();
        for i in 0u32..1000 {
            let before = snapshot(&cf);
            let len = cf.len();
            match cf.add(0, &i.to_le_bytes()) {
                Ok(()) => inserted.push(i),
                Err(err) => {
                    assert_eq!(err, CuckooFilterError::FilterFull);
                    assert_eq!(snapshot(&cf), before);
                    assert_eq!(cf.len(), len);
                }
            }
            for j in &inserted {
                assert!(cf.contains(0, &j.to_le_bytes()));
            }
        }
        assert_eq!(cf.len(), inserted.len());
        assert!(cf.len() <= 8);
    }

    #[test]
    fn zero_kick_budget_fails_fast() {
        let mut memory = [0u8; 4];
        let config = FilterConfig::new().with_max_kicks(0);
        let mut cf = CuckooFilter::<u8>::init_with_config(&mut memory, 0, config).unwrap();
        for fp in 1..=4u8 {
            cf.add_hashed(0, fp).unwrap();
        }
        assert_eq!(cf.add_hashed(0, 5), Err(CuckooFilterError::FilterFull));
        assert_eq!(cf.len(), 4);
    }

    #[test]
    fn restore_validates_header() {
        let mut memory = [0u8; 64];
        let header = {
            let mut cf = CuckooFilter::<u16>::init(&mut memory, 0).unwrap();
            cf.add(1, b"kept").unwrap();
            cf.header()
        };
        let mut wrong_width = header;
        wrong_width.fingerprint_bits = 8;
        assert!(CuckooFilter::<u16>::restore(&mut memory, wrong_width, 0).is_err());
        let mut not_pow2 = header;
        not_pow2.bucket_count = 3;
        assert!(CuckooFilter::<u16>::restore(&mut memory, not_pow2, 0).is_err());
        let mut overfull = header;
        overfull.count = 33;
        assert!(CuckooFilter::<u16>::restore(&mut memory, overfull, 0).is_err());
        assert!(CuckooFilter::<u16>::restore(&mut memory[..63], header, 0).is_err());

        let cf = CuckooFilter::<u16>::restore(&mut memory, header, 0).unwrap();
        assert_eq!(cf.len(), 1);
        assert!(cf.contains(1, b"kept"));
    }

    #[test]
    fn under_counted_header_delete_stops_at_zero() {
        let mut memory = [0u8; 64];
        let mut header = {
            let mut cf = CuckooFilter::<u16>::init(&mut memory, 0).unwrap();
            cf.add(1, b"a").unwrap();
            cf.add(1, b"b").unwrap();
            cf.header()
        };
        header.count = 0;
        let mut cf = CuckooFilter::<u16>::restore(&mut memory, header, 0).unwrap();
        assert!(cf.is_empty());
        assert_eq!(cf.delete(1, b"a"), Ok(()));
        assert_eq!(cf.len(), 0);
        assert!(!cf.contains(1, b"a"));
        assert!(cf.contains(1, b"b"));
        assert_eq!(cf.delete_hashed(0, 7), Err(CuckooFilterError::NotFound));
        assert_eq!(cf.len(), 0);
    }

    #[test]
    fn clear_resets_count() {
        let mut memory = [0u8; 64];
        let mut cf = CuckooFilter::<u32>::init(&mut memory, 16).unwrap();
        cf.add(0, b"x").unwrap();
        cf.clear();
        assert!(cf.is_empty());
        assert!(!cf.contains(0, b"x"));
        assert_eq!(cf.table.occupied(), 0);
    }
}
