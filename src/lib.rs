//! # Cuckoo Filter over caller-owned memory
//!
//! A Cuckoo Filter is an efficient data structure for determining "set membership" (i.e. 'have I seen this thing before?'). It is similar to a Bloom Filter, but unlike a Bloom Filter, Cuckoo Filters support item deletion.
//!
//! This crate lays the filter over a byte region the caller provides and never allocates. Capacity is fixed when the filter is initialized. Fingerprints are 8, 16 or 32 bits wide, and the [`ffi`] module exposes the same operations through a flat C ABI.
//!
//! ```
//! use cuckoofilter_mem::CuckooFilter;
//!
//! let mut memory = [0u8; 256];
//! let mut cf = CuckooFilter::<u8>::init(&mut memory, 256).unwrap();
//! cf.add(0, b"a").unwrap();
//! assert!(cf.contains(0, b"a"));
//! cf.delete(0, b"a").unwrap();
//! assert!(!cf.contains(0, b"a"));
//! ```

mod config;
mod error;
mod filter;
mod hash;
mod murmur3;
mod table;

pub mod ffi;

pub use config::seed_default_prng;
pub use config::FilterConfig;
pub use config::{DEFAULT_MAX_KICKS, DEFAULT_SLOTS_PER_BUCKET, MAX_KICKS_LIMIT, MAX_SLOTS_PER_BUCKET};
pub use error::CuckooFilterError;
pub use error::Status;
pub use filter::Candidates;
pub use filter::CuckooFilter;
pub use filter::FilterHeader;
pub use hash::Fingerprint;
pub use hash::ItemHash;
