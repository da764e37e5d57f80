//! Caller-managed library context.

use log;

use crate::error::{SortError, SortResult};
use crate::layout::TypeLayout;
use crate::op::{self, CompareOp};

const DEFAULT_INSERTION_CUTOFF: usize = 32;
const DEFAULT_GATHER_THRESHOLD: u64 = 32 * 1024 * 1024;
const DEFAULT_PIVOT_SEED: u64 = 0;

/// Context builder. Provides methods for [`Context`] initialization.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    insertion_cutoff: usize,
    gather_threshold: u64,
    pivot_seed: u64,
}

impl ContextBuilder {
    /// Creates a builder with default parameters.
    pub fn new() -> Self {
        ContextBuilder::default()
    }

    /// Sets the record count at or below which local sorting uses the
    /// stable insertion sort.
    pub fn with_insertion_cutoff(mut self, cutoff: usize) -> ContextBuilder {
        self.insertion_cutoff = cutoff;
        return self;
    }

    /// Sets the total byte volume up to which the variable-count
    /// distributed sort gathers all records to a single member instead
    /// of to every member.
    pub fn with_gather_threshold(mut self, bytes: u64) -> ContextBuilder {
        self.gather_threshold = bytes;
        return self;
    }

    /// Sets the quicksort pivot seed. Members of one process group must
    /// configure the same seed, like every other group-wide parameter.
    pub fn with_pivot_seed(mut self, seed: u64) -> ContextBuilder {
        self.pivot_seed = seed;
        return self;
    }

    /// Builds a [`Context`] instance using the provided configuration.
    pub fn build(self) -> Context {
        log::info!(
            "initializing context (insertion cutoff: {}, gather threshold: {} bytes)",
            self.insertion_cutoff,
            self.gather_threshold
        );
        Context {
            insertion_cutoff: self.insertion_cutoff,
            gather_threshold: self.gather_threshold,
            pivot_seed: self.pivot_seed,
            op_int_ascend: CompareOp::basic(TypeLayout::int(), op::int_ascend),
            op_int_descend: CompareOp::basic(TypeLayout::int(), op::int_descend),
        }
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        ContextBuilder {
            insertion_cutoff: DEFAULT_INSERTION_CUTOFF,
            gather_threshold: DEFAULT_GATHER_THRESHOLD,
            pivot_seed: DEFAULT_PIVOT_SEED,
        }
    }
}

/// Library context: owns the predefined comparators and the tuning knobs
/// shared by every operation.
///
/// Constructing the context replaces process-wide library
/// initialization; dropping it tears everything down, including the
/// predefined comparators borrowed from it.
pub struct Context {
    insertion_cutoff: usize,
    gather_threshold: u64,
    pivot_seed: u64,
    op_int_ascend: CompareOp,
    op_int_descend: CompareOp,
}

impl Context {
    /// Creates a context with default configuration.
    pub fn new() -> Self {
        ContextBuilder::new().build()
    }

    /// Creates a context builder.
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// Predefined ascending ordering over native `i32` keys.
    pub fn int_ascending(&self) -> &CompareOp {
        &self.op_int_ascend
    }

    /// Predefined descending ordering over native `i32` keys.
    pub fn int_descending(&self) -> &CompareOp {
        &self.op_int_descend
    }

    pub(crate) fn insertion_cutoff(&self) -> usize {
        self.insertion_cutoff
    }

    pub(crate) fn gather_threshold(&self) -> u64 {
        self.gather_threshold
    }

    pub(crate) fn pivot_seed(&self) -> u64 {
        self.pivot_seed
    }

    /// Copies `src_count` elements laid out as `src_layout` into a
    /// destination described as `dst_count` elements of `dst_layout`.
    ///
    /// Transfer sizes come from the layouts' own rules rather than raw
    /// buffer lengths: the source data must fit the destination
    /// capacity, and each buffer must hold at least its declared
    /// element count.
    pub fn move_records(
        &self,
        dst: &mut [u8],
        dst_count: usize,
        dst_layout: &TypeLayout,
        src: &[u8],
        src_count: usize,
        src_layout: &TypeLayout,
    ) -> SortResult<()> {
        if !dst_layout.is_valid() || !src_layout.is_valid() {
            return Err(SortError::InvalidLayout);
        }
        let src_bytes = src_count * src_layout.size();
        let dst_capacity = dst_count * dst_layout.size();
        if src.len() < src_bytes {
            return Err(SortError::SizeMismatch {
                expected: src_bytes,
                actual: src.len(),
            });
        }
        if dst.len() < dst_capacity {
            return Err(SortError::SizeMismatch {
                expected: dst_capacity,
                actual: dst.len(),
            });
        }
        if src_bytes > dst_capacity {
            return Err(SortError::SizeMismatch {
                expected: dst_capacity,
                actual: src_bytes,
            });
        }
        dst[..src_bytes].copy_from_slice(&src[..src_bytes]);
        return Ok(());
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}
