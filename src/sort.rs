//! Distributed sorting collectives.

use itertools::Itertools;
use log;

use crate::context::Context;
use crate::error::{SortError, SortResult};
use crate::group::ProcessGroup;
use crate::layout::{record_stride, TypeLayout};
use crate::op::CompareOp;
use crate::record::{checked_count, SortIo};

/// Distributed sort strategy choice for heterogeneous counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSortStrategy {
    /// Every member holds the same count; take the fixed-count path.
    Uniform,
    /// Gather everything to one member, sort once, scatter shares back.
    GatherScatter,
    /// Every member gathers and sorts the full set, keeping its own
    /// share.
    AllGather,
}

pub(crate) const MMS_MIN: usize = 0;
pub(crate) const MMS_MAX: usize = 1;
pub(crate) const MMS_SUM: usize = 2;

/// Combined min/max/sum reduction over per-member record counts.
pub(crate) fn min_max_sum(acc: &mut [u64], elem: &[u64]) {
    if elem[MMS_MIN] < acc[MMS_MIN] {
        acc[MMS_MIN] = elem[MMS_MIN];
    }
    if elem[MMS_MAX] > acc[MMS_MAX] {
        acc[MMS_MAX] = elem[MMS_MAX];
    }
    acc[MMS_SUM] += elem[MMS_SUM];
}

/// Picks the distributed sort strategy from the reduced counts: the
/// fixed-count path when counts agree everywhere, gather-to-one while
/// the total volume fits `gather_threshold` bytes, all-gather beyond
/// that to keep the pressure off a single member.
pub fn choose_group_strategy(
    min: u64,
    max: u64,
    sum: u64,
    stride: usize,
    gather_threshold: u64,
) -> GroupSortStrategy {
    if min == max {
        return GroupSortStrategy::Uniform;
    }
    if sum.saturating_mul(stride as u64) <= gather_threshold {
        return GroupSortStrategy::GatherScatter;
    }
    GroupSortStrategy::AllGather
}

impl Context {
    /// Sorts a distributed sequence in which every member holds exactly
    /// `count` records; afterwards this member's buffer holds its
    /// rank-order share of the global sorted order. Collective.
    ///
    /// Mismatched counts across members are detected from the gathered
    /// buffers and reported as a failure.
    pub fn sort<G: ProcessGroup>(
        &self,
        io: SortIo<'_>,
        count: usize,
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
        group: &G,
    ) -> SortResult<()> {
        let stride = record_stride(key, keysat)?;
        io.validate(count * stride)?;
        self.sort_all_gather(io, stride, key, keysat, op, group, true)
    }

    /// Sorts a distributed sequence with arbitrary (possibly zero)
    /// per-member counts; every member keeps the count it contributed.
    /// Collective.
    pub fn sortv<G: ProcessGroup>(
        &self,
        io: SortIo<'_>,
        count: usize,
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
        group: &G,
    ) -> SortResult<()> {
        let stride = record_stride(key, keysat)?;
        io.validate(count * stride)?;

        let counts = [count as u64, count as u64, count as u64];
        let reduced = group.all_reduce(&counts, min_max_sum)?;
        let strategy = choose_group_strategy(
            reduced[MMS_MIN],
            reduced[MMS_MAX],
            reduced[MMS_SUM],
            stride,
            self.gather_threshold(),
        );
        log::debug!(
            "distributed sort strategy {:?} (counts min {} max {} sum {})",
            strategy,
            reduced[MMS_MIN],
            reduced[MMS_MAX],
            reduced[MMS_SUM]
        );

        match strategy {
            GroupSortStrategy::Uniform => {
                self.sort_all_gather(io, stride, key, keysat, op, group, true)
            }
            GroupSortStrategy::GatherScatter => {
                self.sortv_gather_scatter(io, stride, key, keysat, op, group)
            }
            GroupSortStrategy::AllGather => {
                self.sort_all_gather(io, stride, key, keysat, op, group, false)
            }
        }
    }

    /// Gather-all strategy: every member collects the whole distributed
    /// sequence, sorts it locally with identical results (the local sort
    /// is deterministic for identical inputs and context configuration),
    /// and keeps the slice at its own rank-order offset.
    fn sort_all_gather<G: ProcessGroup>(
        &self,
        io: SortIo<'_>,
        stride: usize,
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
        group: &G,
        require_uniform: bool,
    ) -> SortResult<()> {
        let local_bytes = io.input().len();
        let parts = group.all_gather(io.input())?;
        for part in &parts {
            if require_uniform && part.len() != local_bytes {
                return Err(SortError::SizeMismatch {
                    expected: local_bytes,
                    actual: part.len(),
                });
            }
            checked_count(part, stride)?;
        }

        let offset: usize = parts[..group.rank()].iter().map(|part| part.len()).sum();
        let mut arena = parts.concat();
        let total = arena.len() / stride;
        log::debug!(
            "member {}/{} sorting {} gathered records",
            group.rank(),
            group.size(),
            total
        );
        self.sort_local(SortIo::InPlace(&mut arena), total, key, keysat, op)?;

        io.output().copy_from_slice(&arena[offset..offset + local_bytes]);
        Ok(())
    }

    /// Gather-to-one strategy: the root collects, sorts once, and
    /// scatters back shares split by the originally contributed counts.
    fn sortv_gather_scatter<G: ProcessGroup>(
        &self,
        io: SortIo<'_>,
        stride: usize,
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
        group: &G,
    ) -> SortResult<()> {
        const ROOT: usize = 0;

        let share = match group.gather(ROOT, io.input())? {
            Some(parts) => {
                for part in &parts {
                    checked_count(part, stride)?;
                }
                let sizes = parts.iter().map(|part| part.len()).collect_vec();
                let offsets = sizes
                    .iter()
                    .scan(0, |acc, &len| {
                        let at = *acc;
                        *acc += len;
                        Some(at)
                    })
                    .collect_vec();

                let mut arena = parts.concat();
                let total = arena.len() / stride;
                log::debug!("root sorting {} gathered records", total);
                self.sort_local(SortIo::InPlace(&mut arena), total, key, keysat, op)?;

                let shares = sizes
                    .iter()
                    .zip(&offsets)
                    .map(|(&len, &at)| arena[at..at + len].to_vec())
                    .collect_vec();
                group.scatter(ROOT, &shares)?
            }
            None => group.scatter(ROOT, &[])?,
        };

        let out = io.output();
        if share.len() != out.len() {
            return Err(SortError::SizeMismatch {
                expected: out.len(),
                actual: share.len(),
            });
        }
        out.copy_from_slice(&share);
        Ok(())
    }
}
