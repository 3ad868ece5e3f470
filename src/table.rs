//! Bucket table overlaid on caller memory, plus the sizing arithmetic behind it

use core::marker::PhantomData;
use core::ops::Range;

use crate::hash::Fingerprint;

/// Load factor `size_for` plans for; a (2, 4) filter reaches about 95% before kicks start failing
const TARGET_LOAD_PERCENT: usize = 95;

/// Largest power-of-two bucket count whose slots fit in `size` bytes, or 0 if not even one bucket fits
pub fn buckets_for(size: usize, slots_per_bucket: usize, fingerprint_bytes: usize) -> usize {
    let bucket_bytes = slots_per_bucket * fingerprint_bytes;
    if bucket_bytes == 0 {
        return 0;
    }
    let fitting = size / bucket_bytes;
    if fitting == 0 {
        0
    } else {
        1 << (usize::BITS - 1 - fitting.leading_zeros())
    }
}

/// Slots provided by a region of `size` bytes
pub fn capacity(size: usize, slots_per_bucket: usize, fingerprint_bytes: usize) -> usize {
    buckets_for(size, slots_per_bucket, fingerprint_bytes) * slots_per_bucket
}

/// Bytes needed for the smallest power-of-two table holding at least `min_capacity` slots
///
/// Saturates at `usize::MAX` when no such table is addressable.
pub fn size_for_exactly(min_capacity: usize, slots_per_bucket: usize, fingerprint_bytes: usize) -> usize {
    let buckets = min_capacity.div_ceil(slots_per_bucket.max(1)).max(1);
    buckets
        .checked_next_power_of_two()
        .and_then(|b| b.checked_mul(slots_per_bucket * fingerprint_bytes))
        .unwrap_or(usize::MAX)
}

/// Like `size_for_exactly`, but leaves room so `min_capacity` items stay under the target load
pub fn size_for(min_capacity: usize, slots_per_bucket: usize, fingerprint_bytes: usize) -> usize {
    let padded = min_capacity
        .saturating_mul(100)
        .div_ceil(TARGET_LOAD_PERCENT);
    size_for_exactly(padded, slots_per_bucket, fingerprint_bytes)
}

/// A fixed array of fixed-capacity buckets over borrowed bytes
///
/// Slot `s` of bucket `b` lives at byte offset `(b * slots_per_bucket + s) * F::BYTES`. The table never grows, shrinks or allocates.
#[derive(Debug)]
pub struct BucketTable<'a, F: Fingerprint> {
    bytes: &'a mut [u8],
    slots_per_bucket: usize,
    bucket_count: usize,
    _fingerprint: PhantomData<F>,
}

impl<'a, F: Fingerprint> BucketTable<'a, F> {
    /// Overlay a table on the front of `memory`
    ///
    /// Returns `None` if `memory` is shorter than `bucket_count * slots_per_bucket * F::BYTES`.
    pub fn overlay(
        memory: &'a mut [u8],
        bucket_count: usize,
        slots_per_bucket: usize,
    ) -> Option<BucketTable<'a, F>> {
        let len = bucket_count
            .checked_mul(slots_per_bucket)?
            .checked_mul(F::BYTES)?;
        let bytes = memory.get_mut(..len)?;
        Some(BucketTable {
            bytes,
            slots_per_bucket,
            bucket_count,
            _fingerprint: PhantomData,
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub fn slots_per_bucket(&self) -> usize {
        self.slots_per_bucket
    }

    pub fn total_slots(&self) -> usize {
        self.bucket_count * self.slots_per_bucket
    }

    /// Mark every slot empty
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    #[inline]
    fn slot_range(&self, bucket: usize, slot: usize) -> Range<usize> {
        let start = (bucket * self.slots_per_bucket + slot) * F::BYTES;
        start..start + F::BYTES
    }

    #[inline]
    pub fn get(&self, bucket: usize, slot: usize) -> F {
        F::read(&self.bytes[self.slot_range(bucket, slot)])
    }

    #[inline]
    fn set(&mut self, bucket: usize, slot: usize, fingerprint: F) {
        let range = self.slot_range(bucket, slot);
        fingerprint.write(&mut self.bytes[range]);
    }

    /// First slot in `bucket` holding `fingerprint`
    pub fn find(&self, bucket: usize, fingerprint: F) -> Option<usize> {
        (0..self.slots_per_bucket).find(|&slot| self.get(bucket, slot) == fingerprint)
    }

    pub fn contains(&self, bucket: usize, fingerprint: F) -> bool {
        self.find(bucket, fingerprint).is_some()
    }

    /// Place `fingerprint` in the first empty slot of `bucket`. False means the bucket was full.
    pub fn try_insert(&mut self, bucket: usize, fingerprint: F) -> bool {
        match self.find(bucket, F::EMPTY) {
            Some(slot) => {
                self.set(bucket, slot, fingerprint);
                true
            }
            None => false,
        }
    }

    /// Clear one copy of `fingerprint` from `bucket`
    pub fn remove(&mut self, bucket: usize, fingerprint: F) -> bool {
        match self.find(bucket, fingerprint) {
            Some(slot) => {
                self.set(bucket, slot, F::EMPTY);
                true
            }
            None => false,
        }
    }

    /// Swap an existing fingerprint for a new one (the Cuckoo mechanism)
    pub fn swap(&mut self, bucket: usize, slot: usize, fingerprint: F) -> F {
        let evicted = self.get(bucket, slot);
        self.set(bucket, slot, fingerprint);
        evicted
    }

    #[cfg(test)]
    pub fn occupied(&self) -> usize {
        (0..self.bucket_count)
            .flat_map(|bucket| (0..self.slots_per_bucket).map(move |slot| (bucket, slot)))
            .filter(|&(bucket, slot)| self.get(bucket, slot) != F::EMPTY)
            .count()
    }
}

/* -------------------- Unit Tests -------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_round_down_to_power_of_two() {
        assert_eq!(buckets_for(1024, 4, 1), 256);
        assert_eq!(buckets_for(1023, 4, 1), 128);
        assert_eq!(buckets_for(3, 4, 1), 0);
        assert_eq!(buckets_for(4, 4, 1), 1);
        assert_eq!(buckets_for(96, 4, 2), 8);
        assert_eq!(buckets_for(100, 0, 1), 0);
    }

    #[test]
    fn sizing_helpers_agree() {
        assert_eq!(size_for_exactly(256, 4, 1), 256);
        assert_eq!(size_for_exactly(257, 4, 1), 512);
        assert_eq!(size_for_exactly(0, 4, 4), 16);
        assert_eq!(capacity(size_for_exactly(1000, 4, 2), 4, 2), 1024);
        // 256 items at 95% needs 270 slots, which rounds to 128 buckets
        assert_eq!(size_for(256, 4, 1), 512);
        assert_eq!(size_for_exactly(usize::MAX, 4, 4), usize::MAX);
    }

    #[test]
    fn overlay_requires_enough_memory() {
        let mut memory = [0xFFu8; 31];
        assert!(BucketTable::<u16>::overlay(&mut memory, 4, 4).is_none());
        let mut memory = [0xFFu8; 40];
        let mut table = BucketTable::<u16>::overlay(&mut memory, 4, 4).unwrap();
        table.clear();
        assert_eq!(table.occupied(), 0);
        drop(table);
        // Bytes past the table are left alone
        assert_eq!(&memory[32..], &[0xFF; 8]);
        assert!(memory[..32].iter().all(|&b| b == 0));
    }

    #[test]
    fn bucket_fills_then_rejects() {
        let mut memory = [0u8; 8];
        let mut table = BucketTable::<u8>::overlay(&mut memory, 2, 4).unwrap();
        for fp in 1..=4u8 {
            assert!(table.try_insert(1, fp));
        }
        assert!(!table.try_insert(1, 5));
        assert!(table.contains(1, 3));
        assert!(!table.contains(0, 3));
        assert_eq!(table.find(1, 4), Some(3));
    }

    #[test]
    fn remove_clears_single_copy() {
        let mut memory = [0u8; 16];
        let mut table = BucketTable::<u32>::overlay(&mut memory, 1, 4).unwrap();
        assert!(table.try_insert(0, 9));
        assert!(table.try_insert(0, 9));
        assert!(table.remove(0, 9));
        assert!(table.contains(0, 9));
        assert!(table.remove(0, 9));
        assert!(!table.remove(0, 9));
        assert_eq!(table.occupied(), 0);
    }

    #[test]
    fn swap_returns_evicted() {
        let mut memory = [0u8; 8];
        let mut table = BucketTable::<u16>::overlay(&mut memory, 1, 4).unwrap();
        assert!(table.try_insert(0, 0x1234));
        assert_eq!(table.swap(0, 0, 0x5678), 0x1234);
        assert_eq!(table.get(0, 0), 0x5678);
        drop(table);
        assert_eq!(&memory[..2], &[0x78, 0x56]);
    }
}
