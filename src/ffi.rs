//! Flat C ABI
//!
//! Each fingerprint width gets its own opaque 56-byte handle (`Filter8`, `Filter16`, `Filter32`) and its own family of functions. Every function returns a [`Status`] code as an `int`, 0 meaning success. The handle is read and written unaligned, so callers may declare it as `uint8_t cf[56]`.
//!
//! See `include/cuckoofilter_c.h` for the C declarations.
//!
//! ### Safety
//!
//! - The memory region handed to `cf_init*` or `cf_restore_memory*` must stay valid for as long as the handle is used
//! - No two calls may use the same handle concurrently if either one mutates it
//! - Item pointers must be valid for `item_len` bytes (a null pointer is read as the empty item)

use core::ffi::c_int;
use core::{ptr, slice};

use crate::config::{self, FilterConfig};
use crate::error::{CuckooFilterError, Status};
use crate::filter::{CuckooFilter, FilterHeader};
use crate::hash::Fingerprint;

/// Handle layout shared by every fingerprint width
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawFilter {
    memory: *mut u8,
    memory_len: usize,
    header: FilterHeader,
    rng_state: u64,
}

#[cfg(target_pointer_width = "64")]
const _: () = assert!(core::mem::size_of::<RawFilter>() == 56);

/// Any pointer or header problem looks like a region that cannot hold the filter
const BAD_HANDLE: CuckooFilterError = CuckooFilterError::Capacity {
    available: 0,
    required: 0,
};

unsafe fn item<'b>(item: *const u8, item_len: usize) -> &'b [u8] {
    if item.is_null() {
        &[]
    } else {
        slice::from_raw_parts(item, item_len)
    }
}

unsafe fn init_raw<F: Fingerprint>(
    memory: *mut u8,
    size: usize,
    target_capacity: usize,
    cf: *mut RawFilter,
) -> c_int {
    if memory.is_null() || cf.is_null() {
        return Status::CapacityError.code();
    }
    let region = slice::from_raw_parts_mut(memory, size);
    let raw = match CuckooFilter::<F>::init_with_config(region, target_capacity, FilterConfig::default()) {
        Ok(mut filter) => RawFilter {
            memory,
            memory_len: size,
            header: filter.header(),
            rng_state: filter.next_seed(),
        },
        Err(err) => return Status::from(err).code(),
    };
    ptr::write_unaligned(cf, raw);
    Status::Ok.code()
}

/// Rebuild a filter view from the handle, run `op`, and store the updated header and PRNG state back
unsafe fn with_filter<F: Fingerprint, T>(
    cf: *mut RawFilter,
    op: impl FnOnce(&mut CuckooFilter<'_, F>) -> Result<T, CuckooFilterError>,
) -> Result<T, CuckooFilterError> {
    if cf.is_null() {
        return Err(BAD_HANDLE);
    }
    let mut raw = ptr::read_unaligned(cf);
    if raw.memory.is_null() {
        return Err(BAD_HANDLE);
    }
    let memory = slice::from_raw_parts_mut(raw.memory, raw.memory_len);
    let mut filter = CuckooFilter::<F>::restore(memory, raw.header, raw.rng_state)?;
    let out = op(&mut filter);
    raw.header = filter.header();
    raw.rng_state = filter.next_seed();
    ptr::write_unaligned(cf, raw);
    out
}

unsafe fn write_out<T>(res: *mut T, value: T) -> Result<(), CuckooFilterError> {
    if res.is_null() {
        return Err(BAD_HANDLE);
    }
    ptr::write_unaligned(res, value);
    Ok(())
}

unsafe fn restore_raw<F: Fingerprint>(cf: *mut RawFilter, memory: *mut u8, memory_len: usize) -> c_int {
    if cf.is_null() || memory.is_null() {
        return Status::CapacityError.code();
    }
    let mut raw = ptr::read_unaligned(cf);
    let region = slice::from_raw_parts_mut(memory, memory_len);
    if let Err(err) = CuckooFilter::<F>::restore(region, raw.header, raw.rng_state) {
        return Status::from(err).code();
    }
    raw.memory = memory;
    raw.memory_len = memory_len;
    ptr::write_unaligned(cf, raw);
    Status::Ok.code()
}

/// Set the default seed for the kick PRNG of filters initialized afterwards
#[no_mangle]
pub extern "C" fn seed_default_prng(seed: u64) {
    config::seed_default_prng(seed);
}

macro_rules! c_filter {
    (
        $handle:ident, $fp:ty,
        size_for: $size_for:ident,
        size_for_exactly: $size_for_exactly:ident,
        capacity: $capacity:ident,
        init: $init:ident,
        init_for_capacity: $init_for_capacity:ident,
        count: $count:ident,
        add_item: $add_item:ident,
        contains_item: $contains_item:ident,
        delete_item: $delete_item:ident,
        add: $add:ident,
        maybe_contains: $maybe_contains:ident,
        remove: $remove:ident,
        is_broken: $is_broken:ident,
        is_toofull: $is_toofull:ident,
        fix_toofull: $fix_toofull:ident,
        restore_memory: $restore_memory:ident $(,)?
    ) => {
        #[doc = concat!("Opaque handle for a filter of `", stringify!($fp), "` fingerprints")]
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy)]
        pub struct $handle(RawFilter);

        impl $handle {
            fn raw(cf: *mut $handle) -> *mut RawFilter {
                cf.cast()
            }
        }

        /// Bytes of memory for `min_capacity` items at no more than 95% load
        #[no_mangle]
        pub extern "C" fn $size_for(min_capacity: usize) -> usize {
            CuckooFilter::<$fp>::size_for(min_capacity)
        }

        /// Bytes of memory for the smallest table with at least `min_capacity` slots
        #[no_mangle]
        pub extern "C" fn $size_for_exactly(min_capacity: usize) -> usize {
            CuckooFilter::<$fp>::size_for_exactly(min_capacity)
        }

        /// Slots a region of `size` bytes provides
        #[no_mangle]
        pub extern "C" fn $capacity(size: usize) -> usize {
            CuckooFilter::<$fp>::capacity(size)
        }

        /// # Safety
        ///
        /// `memory` must be valid for `size` bytes and `cf` must point to writable handle storage.
        #[no_mangle]
        pub unsafe extern "C" fn $init(memory: *mut u8, size: usize, cf: *mut $handle) -> c_int {
            init_raw::<$fp>(memory, size, 0, $handle::raw(cf))
        }

        /// # Safety
        ///
        /// Same as the plain init; fails with CapacityError when fewer than `capacity` slots fit.
        #[no_mangle]
        pub unsafe extern "C" fn $init_for_capacity(
            memory: *mut u8,
            size: usize,
            capacity: usize,
            cf: *mut $handle,
        ) -> c_int {
            init_raw::<$fp>(memory, size, capacity, $handle::raw(cf))
        }

        /// # Safety
        ///
        /// `cf` must be an initialized handle and `res` must be writable.
        #[no_mangle]
        pub unsafe extern "C" fn $count(cf: *mut $handle, res: *mut usize) -> c_int {
            Status::from(with_filter::<$fp, _>($handle::raw(cf), |filter| {
                write_out(res, filter.len())
            }))
            .code()
        }

        /// # Safety
        ///
        /// `cf` must be an initialized handle; `item` must be valid for `item_len` bytes.
        #[no_mangle]
        pub unsafe extern "C" fn $add_item(cf: *mut $handle, seed: u32, item: *const u8, item_len: usize) -> c_int {
            let item = self::item(item, item_len);
            Status::from(with_filter::<$fp, _>($handle::raw(cf), |filter| filter.add(seed, item))).code()
        }

        /// # Safety
        ///
        /// `cf` must be an initialized handle, `item` valid for `item_len` bytes and `res` writable.
        #[no_mangle]
        pub unsafe extern "C" fn $contains_item(
            cf: *mut $handle,
            seed: u32,
            item: *const u8,
            item_len: usize,
            res: *mut c_int,
        ) -> c_int {
            let item = self::item(item, item_len);
            Status::from(with_filter::<$fp, _>($handle::raw(cf), |filter| {
                write_out(res, filter.contains(seed, item) as c_int)
            }))
            .code()
        }

        /// # Safety
        ///
        /// `cf` must be an initialized handle; `item` must be valid for `item_len` bytes.
        #[no_mangle]
        pub unsafe extern "C" fn $delete_item(cf: *mut $handle, seed: u32, item: *const u8, item_len: usize) -> c_int {
            let item = self::item(item, item_len);
            Status::from(with_filter::<$fp, _>($handle::raw(cf), |filter| filter.delete(seed, item))).code()
        }

        /// # Safety
        ///
        /// `cf` must be an initialized handle.
        #[no_mangle]
        pub unsafe extern "C" fn $add(cf: *mut $handle, hash: u64, fp: $fp) -> c_int {
            Status::from(with_filter::<$fp, _>($handle::raw(cf), |filter| filter.add_hashed(hash, fp))).code()
        }

        /// # Safety
        ///
        /// `cf` must be an initialized handle and `res` writable.
        #[no_mangle]
        pub unsafe extern "C" fn $maybe_contains(cf: *mut $handle, hash: u64, fp: $fp, res: *mut c_int) -> c_int {
            Status::from(with_filter::<$fp, _>($handle::raw(cf), |filter| {
                write_out(res, filter.contains_hashed(hash, fp) as c_int)
            }))
            .code()
        }

        /// # Safety
        ///
        /// `cf` must be an initialized handle.
        #[no_mangle]
        pub unsafe extern "C" fn $remove(cf: *mut $handle, hash: u64, fp: $fp) -> c_int {
            Status::from(with_filter::<$fp, _>($handle::raw(cf), |filter| filter.delete_hashed(hash, fp))).code()
        }

        /// Always 0: deleting an absent item is reported without touching the table
        #[no_mangle]
        pub extern "C" fn $is_broken(_cf: *mut $handle) -> c_int {
            0
        }

        /// Always 0: a failed insertion rolls back, so no fingerprint is ever left homeless
        #[no_mangle]
        pub extern "C" fn $is_toofull(_cf: *mut $handle) -> c_int {
            0
        }

        /// Nothing to reinsert; checks that `cf` still describes a usable filter
        ///
        /// # Safety
        ///
        /// `cf` must be an initialized handle.
        #[no_mangle]
        pub unsafe extern "C" fn $fix_toofull(cf: *mut $handle) -> c_int {
            Status::from(with_filter::<$fp, _>($handle::raw(cf), |_| Ok(()))).code()
        }

        /// Point an initialized handle at a region holding a byte-for-byte copy of its buckets
        ///
        /// # Safety
        ///
        /// `cf` must be an initialized handle and `memory` valid for `memory_len` bytes.
        #[no_mangle]
        pub unsafe extern "C" fn $restore_memory(cf: *mut $handle, memory: *mut u8, memory_len: usize) -> c_int {
            restore_raw::<$fp>($handle::raw(cf), memory, memory_len)
        }
    };
}

c_filter!(
    Filter8, u8,
    size_for: cf_size_for8,
    size_for_exactly: cf_size_for_exactly8,
    capacity: cf_capacity8,
    init: cf_init8,
    init_for_capacity: cf_init_for_capacity8,
    count: cf_count8,
    add_item: cf_add_item8,
    contains_item: cf_contains_item8,
    delete_item: cf_delete_item8,
    add: cf_add8,
    maybe_contains: cf_maybe_contains8,
    remove: cf_remove8,
    is_broken: cf_is_broken8,
    is_toofull: cf_is_toofull8,
    fix_toofull: cf_fix_toofull8,
    restore_memory: cf_restore_memory8,
);

c_filter!(
    Filter16, u16,
    size_for: cf_size_for16,
    size_for_exactly: cf_size_for_exactly16,
    capacity: cf_capacity16,
    init: cf_init16,
    init_for_capacity: cf_init_for_capacity16,
    count: cf_count16,
    add_item: cf_add_item16,
    contains_item: cf_contains_item16,
    delete_item: cf_delete_item16,
    add: cf_add16,
    maybe_contains: cf_maybe_contains16,
    remove: cf_remove16,
    is_broken: cf_is_broken16,
    is_toofull: cf_is_toofull16,
    fix_toofull: cf_fix_toofull16,
    restore_memory: cf_restore_memory16,
);

c_filter!(
    Filter32, u32,
    size_for: cf_size_for32,
    size_for_exactly: cf_size_for_exactly32,
    capacity: cf_capacity32,
    init: cf_init32,
    init_for_capacity: cf_init_for_capacity32,
    count: cf_count32,
    add_item: cf_add_item32,
    contains_item: cf_contains_item32,
    delete_item: cf_delete_item32,
    add: cf_add32,
    maybe_contains: cf_maybe_contains32,
    remove: cf_remove32,
    is_broken: cf_is_broken32,
    is_toofull: cf_is_toofull32,
    fix_toofull: cf_fix_toofull32,
    restore_memory: cf_restore_memory32,
);

/* -------------------- Unit Tests -------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::MaybeUninit;

    #[test]
    fn handle_is_56_bytes() {
        assert_eq!(core::mem::size_of::<Filter8>(), core::mem::size_of::<RawFilter>());
        #[cfg(target_pointer_width = "64")]
        assert_eq!(core::mem::size_of::<Filter32>(), 56);
    }

    // Mirrors the C example: hash 0, fingerprint 'a'
    #[test]
    fn hashed_round_trip_through_handle() {
        let mut memory = [0u8; 1024];
        let mut cf = MaybeUninit::<Filter8>::uninit();
        let mut found: c_int = -1;
        unsafe {
            assert_eq!(cf_init8(memory.as_mut_ptr(), memory.len(), cf.as_mut_ptr()), 0);
            assert_eq!(cf_maybe_contains8(cf.as_mut_ptr(), 0, b'a', &mut found), 0);
            assert_eq!(found, 0);
            assert_eq!(cf_add8(cf.as_mut_ptr(), 0, b'a'), 0);
            assert_eq!(cf_maybe_contains8(cf.as_mut_ptr(), 0, b'a', &mut found), 0);
            assert_eq!(found, 1);
            assert_eq!(cf_maybe_contains8(cf.as_mut_ptr(), 0, 0, &mut found), 0);
            assert_eq!(found, 0);
            assert_eq!(cf_remove8(cf.as_mut_ptr(), 0, b'a'), 0);
            assert_eq!(cf_remove8(cf.as_mut_ptr(), 0, b'a'), 3);
        }
    }

    #[test]
    fn init_rejects_null_and_tiny_regions() {
        let mut cf = MaybeUninit::<Filter16>::uninit();
        let mut memory = [0u8; 7];
        unsafe {
            assert_eq!(cf_init16(ptr::null_mut(), 64, cf.as_mut_ptr()), 1);
            assert_eq!(cf_init16(memory.as_mut_ptr(), memory.len(), cf.as_mut_ptr()), 1);
            assert_eq!(cf_init16(memory.as_mut_ptr(), memory.len(), ptr::null_mut()), 1);
        }
    }

    #[test]
    fn zeroed_handle_is_rejected() {
        let mut cf = MaybeUninit::<Filter32>::zeroed();
        let mut count = 0usize;
        unsafe {
            assert_eq!(cf_count32(cf.as_mut_ptr(), &mut count), 1);
            assert_eq!(cf_add_item32(cf.as_mut_ptr(), 0, b"x".as_ptr(), 1), 1);
        }
    }

    #[test]
    fn sizing_functions_match_filter() {
        assert_eq!(cf_size_for_exactly8(256), 256);
        assert_eq!(cf_size_for_exactly32(256), 1024);
        assert_eq!(cf_capacity16(1024), 512);
        assert!(cf_size_for8(256) >= cf_size_for_exactly8(256));
    }
}
