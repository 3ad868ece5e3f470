//! Hashing and fingerprint derivation

use core::fmt::Debug;

use crate::murmur3::murmur3_x86_128;

/// Multiplier used to spread a fingerprint across the bucket index space
///
/// The magic constant is from MurmurHash2 (as in the reference C++ implementation)
const FINGERPRINT_MIX: u64 = 0x5bd1_e995;

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width fingerprint stored in a bucket slot
///
/// Implemented for `u8`, `u16` and `u32`. Slots are serialized little-endian in `BYTES` bytes, and the value 0 is reserved for an empty slot.
pub trait Fingerprint: sealed::Sealed + Copy + Eq + Debug {
    /// Width of the fingerprint in bits
    const BITS: u32;
    /// Width of one slot in bytes
    const BYTES: usize;
    /// The empty-slot sentinel
    const EMPTY: Self;

    /// Truncate a hash to the fingerprint width. Never returns `EMPTY`.
    fn from_hash(hash: u64) -> Self;

    /// Remap a caller-supplied fingerprint away from the empty sentinel
    fn non_empty(self) -> Self;

    fn to_u64(self) -> u64;

    /// Read a slot. `bytes` is exactly `BYTES` long.
    fn read(bytes: &[u8]) -> Self;

    /// Write a slot. `bytes` is exactly `BYTES` long.
    fn write(self, bytes: &mut [u8]);
}

macro_rules! impl_fingerprint {
    ($($ty:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Fingerprint for $ty {
                const BITS: u32 = <$ty>::BITS;
                const BYTES: usize = core::mem::size_of::<$ty>();
                const EMPTY: Self = 0;

                #[inline]
                fn from_hash(hash: u64) -> Self {
                    (hash as $ty).non_empty()
                }

                #[inline]
                fn non_empty(self) -> Self {
                    // Prevent a fingerprint of 0 (because 0 implies empty slot)
                    self + (self == 0) as $ty
                }

                #[inline]
                fn to_u64(self) -> u64 {
                    self as u64
                }

                #[inline]
                fn read(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }

                #[inline]
                fn write(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_fingerprint!(u8, u16, u32);

/// The two independent halves of an item's 128-bit digest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemHash {
    /// Selects the primary bucket
    pub index: u64,
    /// Source of the fingerprint
    pub fingerprint: u64,
}

impl ItemHash {
    /// Hash an item under a caller-supplied seed
    ///
    /// The seed is folded into Murmur3's seed, so the same item under two seeds yields unrelated buckets and fingerprints.
    pub fn of(item: &[u8], seed: u32) -> ItemHash {
        let digest = murmur3_x86_128(item, seed);
        ItemHash {
            index: digest as u64,
            fingerprint: (digest >> 64) as u64,
        }
    }

    pub fn fingerprint<F: Fingerprint>(&self) -> F {
        F::from_hash(self.fingerprint)
    }
}

/// Spread a fingerprint over the index space before XORing it into a bucket index
#[inline]
pub fn mix_fingerprint<F: Fingerprint>(fingerprint: F) -> u64 {
    fingerprint.to_u64().wrapping_mul(FINGERPRINT_MIX)
}

/// The other candidate bucket of `fingerprint` when it sits in `index`
///
/// This is Equation 2 in Section 3.1 of the paper. `mask` is `bucket_count - 1`, so applying it twice returns the original index.
#[inline]
pub fn alternate_index<F: Fingerprint>(index: u64, fingerprint: F, mask: u64) -> u64 {
    (index ^ mix_fingerprint(fingerprint)) & mask
}

/* -------------------- Unit Tests -------------------- */
