//! Errors and the flat status codes reported across the C ABI

/// Possible errors for the Cuckoo Filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CuckooFilterError {
    /// The backing region cannot hold a usable table, or a restored header does not fit it
    #[error("backing region of {available} bytes cannot hold the requested filter (needs {required} bytes)")]
    Capacity { available: usize, required: usize },
    /// Insertion ran out of kicks; the table is unchanged
    #[error("filter is full: no free slot found within the eviction budget")]
    FilterFull,
    /// For `delete`, when the fingerprint is in neither candidate bucket
    #[error("item does not exist in the filter")]
    NotFound,
}

/// Outcome of an operation as seen by C callers. 0 means success.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok = 0,
    CapacityError = 1,
    FilterFullError = 2,
    NotFoundError = 3,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<CuckooFilterError> for Status {
    fn from(err: CuckooFilterError) -> Self {
        match err {
            CuckooFilterError::Capacity { .. } => Status::CapacityError,
            CuckooFilterError::FilterFull => Status::FilterFullError,
            CuckooFilterError::NotFound => Status::NotFoundError,
        }
    }
}

impl<T> From<Result<T, CuckooFilterError>> for Status {
    fn from(result: Result<T, CuckooFilterError>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(err) => err.into(),
        }
    }
}

/* -------------------- Unit Tests -------------------- */
