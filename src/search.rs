//! Insertion-bound search over sorted records.

use std::cmp::Ordering;
use std::ops::Range;

use log;

use crate::context::Context;
use crate::error::{SortError, SortResult};
use crate::group::ProcessGroup;
use crate::layout::{record_stride, TypeLayout};
use crate::op::CompareOp;
use crate::record::{checked_count, Records};

impl Context {
    /// Finds the low insertion bound of `target` in the sorted records
    /// of `list` restricted to `range`: the first index whose record
    /// compares greater than or equal to the target. Returns the bound,
    /// in `range.start..=range.end`, and whether an exact match exists
    /// inside the range.
    pub fn search_low(
        &self,
        target: &[u8],
        list: &[u8],
        range: Range<usize>,
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
    ) -> SortResult<(bool, usize)> {
        let records = checked_list(target, list, &range, key, keysat)?;
        let bound = lower_bound(&records, &range, target, op);
        let found = bound < range.end && op.eval(records.record(bound), target) == Ordering::Equal;
        Ok((found, bound))
    }

    /// Finds the high insertion bound of `target`: the first index in
    /// `range` whose record compares strictly greater than the target.
    pub fn search_high(
        &self,
        target: &[u8],
        list: &[u8],
        range: Range<usize>,
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
    ) -> SortResult<(bool, usize)> {
        let records = checked_list(target, list, &range, key, keysat)?;
        let bound = upper_bound(&records, &range, target, op);
        let found =
            bound > range.start && op.eval(records.record(bound - 1), target) == Ordering::Equal;
        Ok((found, bound))
    }

    /// Finds the low insertion bound of every target in `targets`, a
    /// packed array of key-typed instances, against one sorted list.
    pub fn search_low_list(
        &self,
        targets: &[u8],
        list: &[u8],
        range: Range<usize>,
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
    ) -> SortResult<Vec<usize>> {
        record_stride(key, keysat)?;
        let num = checked_count(targets, key.extent())?;
        let target_views = Records::new(targets, key.extent());

        let mut bounds = Vec::with_capacity(num);
        for at in 0..num {
            let target = target_views.record(at);
            let records = checked_list(target, list, &range, key, keysat)?;
            bounds.push(lower_bound(&records, &range, target, op));
        }
        return Ok(bounds);
    }

    /// Low insertion bound of `target` within a sequence that is sorted
    /// across the whole process group in rank order. Collective.
    ///
    /// Every member searches its own window; one combined reduction sums
    /// the in-window offsets (the sequence is globally sorted, so the
    /// global bound is the total number of records below the target) and
    /// ors the found flags. The returned index addresses the rank-order
    /// concatenation of all searched windows.
    pub fn search_low_group<G: ProcessGroup>(
        &self,
        target: &[u8],
        list: &[u8],
        range: Range<usize>,
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
        group: &G,
    ) -> SortResult<(bool, u64)> {
        let (found, bound) = self.search_low(target, list, range.clone(), key, keysat, op)?;
        combine_bound(found, bound - range.start, group)
    }

    /// High insertion bound of `target` across the process group.
    /// Collective; see [`Context::search_low_group`].
    pub fn search_high_group<G: ProcessGroup>(
        &self,
        target: &[u8],
        list: &[u8],
        range: Range<usize>,
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
        group: &G,
    ) -> SortResult<(bool, u64)> {
        let (found, bound) = self.search_high(target, list, range.clone(), key, keysat, op)?;
        combine_bound(found, bound - range.start, group)
    }

    /// Low insertion bounds of a whole batch of targets across the
    /// process group, amortizing one reduction over every target.
    /// Collective.
    pub fn search_low_list_group<G: ProcessGroup>(
        &self,
        targets: &[u8],
        list: &[u8],
        range: Range<usize>,
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
        group: &G,
    ) -> SortResult<Vec<u64>> {
        let bounds = self.search_low_list(targets, list, range.clone(), key, keysat, op)?;
        let offsets: Vec<u64> = bounds
            .iter()
            .map(|&bound| (bound - range.start) as u64)
            .collect();
        log::debug!("combining {} search bounds across {} members", offsets.len(), group.size());
        let combined = group.all_reduce(&offsets, sum_elements)?;
        return Ok(combined);
    }
}

/// Validates the target and list buffers against the layouts and the
/// searched range, returning the list view.
fn checked_list<'a>(
    target: &[u8],
    list: &'a [u8],
    range: &Range<usize>,
    key: &TypeLayout,
    keysat: &TypeLayout,
) -> SortResult<Records<'a>> {
    let stride = record_stride(key, keysat)?;
    if target.len() != key.extent() {
        return Err(SortError::SizeMismatch {
            expected: key.extent(),
            actual: target.len(),
        });
    }
    let count = checked_count(list, stride)?;
    if range.end > count {
        return Err(SortError::SizeMismatch {
            expected: range.end * stride,
            actual: list.len(),
        });
    }
    Ok(Records::new(list, stride))
}

fn lower_bound(
    records: &Records<'_>,
    range: &Range<usize>,
    target: &[u8],
    op: &CompareOp,
) -> usize {
    let mut lo = range.start;
    let mut hi = range.end;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if op.eval(records.record(mid), target) == Ordering::Less {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

fn upper_bound(
    records: &Records<'_>,
    range: &Range<usize>,
    target: &[u8],
    op: &CompareOp,
) -> usize {
    let mut lo = range.start;
    let mut hi = range.end;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if op.eval(records.record(mid), target) == Ordering::Greater {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

fn combine_bound<G: ProcessGroup>(
    found: bool,
    offset: usize,
    group: &G,
) -> SortResult<(bool, u64)> {
    let local = [offset as u64, u64::from(found)];
    let combined = group.all_reduce(&local, sum_offset_or_flag)?;
    Ok((combined[1] != 0, combined[0]))
}

fn sum_offset_or_flag(acc: &mut [u64], elem: &[u64]) {
    acc[0] += elem[0];
    acc[1] |= elem[1];
}

fn sum_elements(acc: &mut [u64], elem: &[u64]) {
    for (a, e) in acc.iter_mut().zip(elem) {
        *a += e;
    }
}
