//! Filter parameters chosen at initialization

use core::sync::atomic::{AtomicU64, Ordering};

use crate::hash::Fingerprint;
use crate::table;

/// Kicks attempted before an insertion gives up (mentioned in paper)
pub const DEFAULT_MAX_KICKS: u32 = 500;
/// Upper bound on `max_kicks`; the kick path is recorded in a stack array of this length
pub const MAX_KICKS_LIMIT: u32 = 1024;
/// Each bucket holds 4 fingerprints unless configured otherwise
pub const DEFAULT_SLOTS_PER_BUCKET: u32 = 4;
/// Slot indices are recorded as `u8` and buckets are scanned linearly
pub const MAX_SLOTS_PER_BUCKET: u32 = 16;

static DEFAULT_SEED: AtomicU64 = AtomicU64::new(0x5eed_c0ff_ee00_0001);

/// Set the seed used for the kick PRNG of filters whose config carries no explicit seed
pub fn seed_default_prng(seed: u64) {
    DEFAULT_SEED.store(seed, Ordering::Relaxed);
}

pub fn default_seed() -> u64 {
    DEFAULT_SEED.load(Ordering::Relaxed)
}

/// Filter parameters
///
/// Out-of-range values are clamped by the `with_*` setters, so every config describes a buildable table shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    slots_per_bucket: u32,
    max_kicks: u32,
    seed: Option<u64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            slots_per_bucket: DEFAULT_SLOTS_PER_BUCKET,
            max_kicks: DEFAULT_MAX_KICKS,
            seed: None,
        }
    }
}

impl FilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots per bucket, clamped to `1..=MAX_SLOTS_PER_BUCKET`
    pub fn with_slots_per_bucket(mut self, slots: u32) -> Self {
        self.slots_per_bucket = slots.clamp(1, MAX_SLOTS_PER_BUCKET);
        self
    }

    /// Maximum evictions per insertion, clamped to `MAX_KICKS_LIMIT`
    pub fn with_max_kicks(mut self, kicks: u32) -> Self {
        self.max_kicks = kicks.min(MAX_KICKS_LIMIT);
        self
    }

    /// Seed for the PRNG that picks eviction victims
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn slots_per_bucket(&self) -> u32 {
        self.slots_per_bucket
    }

    pub fn max_kicks(&self) -> u32 {
        self.max_kicks
    }

    /// The explicit seed, or the process-wide default at the time of the call
    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(default_seed)
    }

    /// Bytes needed for the smallest table with at least `min_capacity` slots
    pub fn size_for_exactly<F: Fingerprint>(&self, min_capacity: usize) -> usize {
        table::size_for_exactly(min_capacity, self.slots_per_bucket as usize, F::BYTES)
    }

    /// Bytes needed to hold `min_capacity` items at no more than 95% load
    pub fn size_for<F: Fingerprint>(&self, min_capacity: usize) -> usize {
        table::size_for(min_capacity, self.slots_per_bucket as usize, F::BYTES)
    }

    /// Slots available in a region of `size` bytes
    pub fn capacity<F: Fingerprint>(&self, size: usize) -> usize {
        table::capacity(size, self.slots_per_bucket as usize, F::BYTES)
    }
}

/* -------------------- Unit Tests -------------------- */
