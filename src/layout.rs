//! Record type layout descriptors.

use crate::error::{SortError, SortResult};

/// Memory layout of a record field: the number of data bytes plus the
/// placement metadata (lower bounds and extents) that decides how
/// consecutive instances pack into a buffer.
///
/// Every public operation of the library re-checks its key and record
/// layouts with [`TypeLayout::is_valid`] before touching any buffer, so
/// that the algorithms may treat records as flat, relocatable byte blobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeLayout {
    size: usize,
    lb: isize,
    extent: usize,
    true_lb: isize,
    true_extent: usize,
}

impl TypeLayout {
    /// Creates a descriptor from raw layout numbers.
    pub fn new(size: usize, lb: isize, extent: usize, true_lb: isize, true_extent: usize) -> Self {
        TypeLayout {
            size,
            lb,
            extent,
            true_lb,
            true_extent,
        }
    }

    /// Creates a contiguous descriptor: `size` data bytes, zero lower
    /// bounds, no padding.
    pub fn contiguous(size: usize) -> Self {
        TypeLayout {
            size,
            lb: 0,
            extent: size,
            true_lb: 0,
            true_extent: size,
        }
    }

    /// Layout of the native signed integer key understood by the
    /// predefined comparators.
    pub fn int() -> Self {
        TypeLayout::contiguous(std::mem::size_of::<i32>())
    }

    /// Number of data bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Distance in bytes between consecutive instances.
    pub fn extent(&self) -> usize {
        self.extent
    }

    /// Checks that the layout is contiguous (size equals true extent),
    /// both lower bounds are zero, extent equals true extent, and the
    /// extent is positive.
    pub fn is_valid(&self) -> bool {
        if self.size != self.true_extent {
            return false;
        }
        if self.lb != 0 || self.true_lb != 0 {
            return false;
        }
        if self.extent != self.true_extent {
            return false;
        }
        if self.extent == 0 {
            return false;
        }
        true
    }
}

/// Validates a key/record layout pair and returns the record stride.
///
/// `keysat` describes the whole record, the key followed by the satellite
/// payload, so its extent must cover at least the key's.
pub(crate) fn record_stride(key: &TypeLayout, keysat: &TypeLayout) -> SortResult<usize> {
    if !key.is_valid() || !keysat.is_valid() {
        return Err(SortError::InvalidLayout);
    }
    if keysat.extent() < key.extent() {
        return Err(SortError::InvalidLayout);
    }
    Ok(keysat.extent())
}
