//! Distributed ranking.

use std::cmp::Ordering;

use log;

use crate::context::Context;
use crate::error::{SortError, SortResult};
use crate::group::ProcessGroup;
use crate::layout::{record_stride, TypeLayout};
use crate::op::CompareOp;
use crate::record::{checked_count, Records, SortIo};

/// Per-record group assignment produced by ranking. The vectors are
/// indexed by local record index; records the comparator deems equal
/// share one group identifier and group size across the whole process
/// group, and their in-group ranks form a dense `0..size` range in
/// sorted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankResult {
    /// Total number of distinct groups across the process group.
    pub groups: u64,
    /// Group identifier of each local record.
    pub group_id: Vec<u64>,
    /// Size of each local record's group.
    pub group_size: Vec<u64>,
    /// Rank of each local record within its group.
    pub group_rank: Vec<u64>,
}

/// Bytes of origin tag carried behind each key: member rank and local
/// index, both as `u64`.
const ORIGIN_BYTES: usize = 16;

impl Context {
    /// Assigns every record of the distributed sequence to an
    /// equivalence group under `op` and computes each record's in-group
    /// rank. Per-member counts may differ. Collective.
    ///
    /// The keys travel tagged with their origin (member rank, local
    /// index), the tagged set is gathered and sorted everywhere with
    /// identical results, and one scan of the sorted order assigns dense
    /// group identifiers, group sizes, and in-group ranks; every member
    /// then projects out the entries its own records produced.
    pub fn rank<G: ProcessGroup>(
        &self,
        buf: &[u8],
        count: usize,
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
        group: &G,
    ) -> SortResult<RankResult> {
        let stride = record_stride(key, keysat)?;
        if buf.len() != count * stride {
            return Err(SortError::SizeMismatch {
                expected: count * stride,
                actual: buf.len(),
            });
        }

        let key_len = key.extent();
        let mut tagged = Vec::with_capacity(count * (key_len + ORIGIN_BYTES));
        for index in 0..count {
            tagged.extend_from_slice(&buf[index * stride..index * stride + key_len]);
            tagged.extend_from_slice(&(group.rank() as u64).to_ne_bytes());
            tagged.extend_from_slice(&(index as u64).to_ne_bytes());
        }

        self.rank_tagged(&tagged, count, key, op, group)
    }

    /// Ranks text keys byte-lexicographically across the process group.
    /// Collective.
    ///
    /// One reduction finds the longest string; every key then travels as
    /// a fixed-width, zero-padded byte field (the padding terminator
    /// orders shorter strings first, like the C string comparison the
    /// keys stand in for) through the shared ranking path.
    pub fn rank_strings<G: ProcessGroup>(
        &self,
        strings: &[&str],
        group: &G,
    ) -> SortResult<RankResult> {
        let longest = strings.iter().map(|s| s.len()).max().unwrap_or(0);
        let reduced = group.all_reduce(&[longest as u64], max_length)?;
        let width = reduced[0] as usize + 1;

        let mut tagged = Vec::with_capacity(strings.len() * (width + ORIGIN_BYTES));
        for (index, s) in strings.iter().enumerate() {
            tagged.extend_from_slice(s.as_bytes());
            tagged.resize(tagged.len() + (width - s.len()), 0);
            tagged.extend_from_slice(&(group.rank() as u64).to_ne_bytes());
            tagged.extend_from_slice(&(index as u64).to_ne_bytes());
        }

        let key = TypeLayout::contiguous(width);
        let op = CompareOp::basic(key.clone(), bytes_lexicographic);
        self.rank_tagged(&tagged, strings.len(), &key, &op, group)
    }

    fn rank_tagged<G: ProcessGroup>(
        &self,
        tagged: &[u8],
        count: usize,
        key: &TypeLayout,
        op: &CompareOp,
        group: &G,
    ) -> SortResult<RankResult> {
        let tagged_stride = key.extent() + ORIGIN_BYTES;
        let tagged_layout = TypeLayout::contiguous(tagged_stride);

        let parts = group.all_gather(tagged)?;
        for part in &parts {
            checked_count(part, tagged_stride)?;
        }
        let mut arena = parts.concat();
        let total = arena.len() / tagged_stride;
        self.sort_local(SortIo::InPlace(&mut arena), total, key, &tagged_layout, op)?;

        // one scan over the global sorted order: a new group starts
        // wherever adjacent keys compare unequal
        let records = Records::new(&arena, tagged_stride);
        let mut starts: Vec<usize> = Vec::new();
        let mut ids: Vec<u64> = Vec::with_capacity(total);
        for at in 0..total {
            if at == 0 || op.eval(records.record(at - 1), records.record(at)) != Ordering::Equal {
                starts.push(at);
            }
            ids.push((starts.len() - 1) as u64);
        }

        let mut result = RankResult {
            groups: starts.len() as u64,
            group_id: vec![0; count],
            group_size: vec![0; count],
            group_rank: vec![0; count],
        };
        for at in 0..total {
            let record = records.record(at);
            let origin_rank = read_u64(&record[key.extent()..key.extent() + 8]);
            if origin_rank as usize != group.rank() {
                continue;
            }
            let origin_index = read_u64(&record[key.extent() + 8..]) as usize;
            let id = ids[at] as usize;
            let start = starts[id];
            let end = if id + 1 < starts.len() { starts[id + 1] } else { total };
            result.group_id[origin_index] = ids[at];
            result.group_size[origin_index] = (end - start) as u64;
            result.group_rank[origin_index] = (at - start) as u64;
        }

        log::debug!("ranked {} records into {} groups", total, result.groups);
        return Ok(result);
    }
}

fn max_length(acc: &mut [u64], elem: &[u64]) {
    if elem[0] > acc[0] {
        acc[0] = elem[0];
    }
}

/// Byte-lexicographic ordering over equal-width text keys.
fn bytes_lexicographic(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

fn read_u64(bytes: &[u8]) -> u64 {
    u64::from_ne_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use crate::context::Context;
    use crate::group::testutil::run_group;
    use crate::group::ProcessGroup;
    use crate::layout::TypeLayout;
    use crate::rank::RankResult;

    fn pack(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|value| value.to_ne_bytes()).collect()
    }

    #[test]
    fn test_rank_three_records() {
        // distributed sequence [1, 1, 2]: one group of two, one of one
        let results = run_group(2, |member| {
            let ctx = Context::new();
            let layout = TypeLayout::int();
            let inputs = [pack(&[1, 1]), pack(&[2])];
            let buf = &inputs[member.rank()];

            ctx.rank(buf, buf.len() / 4, &layout, &layout, ctx.int_ascending(), &member)
                .unwrap()
        });

        assert_eq!(results[0].groups, 2);
        assert_eq!(results[1].groups, 2);

        assert_eq!(results[0].group_id, vec![0, 0]);
        assert_eq!(results[0].group_size, vec![2, 2]);
        let ranks: HashSet<u64> = results[0].group_rank.iter().copied().collect();
        assert_eq!(ranks, HashSet::from([0, 1]));

        assert_eq!(results[1].group_id, vec![1]);
        assert_eq!(results[1].group_size, vec![1]);
        assert_eq!(results[1].group_rank, vec![0]);
    }

    #[test]
    fn test_rank_groups_span_members() {
        let results = run_group(3, |member| {
            let ctx = Context::new();
            let layout = TypeLayout::int();
            let inputs = [pack(&[7, 3]), pack(&[3, 7]), pack(&[3, 5])];
            let buf = &inputs[member.rank()];

            ctx.rank(buf, 2, &layout, &layout, ctx.int_ascending(), &member)
                .unwrap()
        });

        // groups in sorted key order: 3 (size 3), 5 (size 1), 7 (size 2)
        for result in &results {
            assert_eq!(result.groups, 3);
        }
        assert_eq!(results[0].group_id, vec![2, 0]);
        assert_eq!(results[0].group_size, vec![2, 3]);
        assert_eq!(results[1].group_id, vec![0, 2]);
        assert_eq!(results[2].group_id, vec![0, 1]);
        assert_eq!(results[2].group_size, vec![3, 1]);
        assert_eq!(results[2].group_rank[1], 0);

        // in-group ranks of the three 3-keys form a dense permutation
        let mut ranks_of_threes: Vec<u64> = vec![
            results[0].group_rank[1],
            results[1].group_rank[0],
            results[2].group_rank[0],
        ];
        ranks_of_threes.sort();
        assert_eq!(ranks_of_threes, vec![0, 1, 2]);
    }

    #[test]
    fn test_rank_empty_member() {
        let results = run_group(2, |member| {
            let ctx = Context::new();
            let layout = TypeLayout::int();
            let inputs = [pack(&[4, 4]), pack(&[])];
            let buf = &inputs[member.rank()];

            ctx.rank(buf, buf.len() / 4, &layout, &layout, ctx.int_ascending(), &member)
                .unwrap()
        });

        assert_eq!(results[0].groups, 1);
        assert_eq!(results[0].group_size, vec![2, 2]);
        assert_eq!(results[1], RankResult {
            groups: 1,
            group_id: Vec::new(),
            group_size: Vec::new(),
            group_rank: Vec::new(),
        });
    }

    #[test]
    fn test_rank_strings() {
        let results = run_group(2, |member| {
            let ctx = Context::new();
            let inputs: [Vec<&str>; 2] = [vec!["apple", "banana"], vec!["banana", "cherry"]];
            let strings = &inputs[member.rank()];

            ctx.rank_strings(strings, &member).unwrap()
        });

        // sorted distinct keys: apple (0), banana (1), cherry (2)
        for result in &results {
            assert_eq!(result.groups, 3);
        }
        assert_eq!(results[0].group_id, vec![0, 1]);
        assert_eq!(results[0].group_size, vec![1, 2]);
        assert_eq!(results[1].group_id, vec![1, 2]);
        assert_eq!(results[1].group_size, vec![2, 1]);

        let mut banana_ranks = vec![results[0].group_rank[1], results[1].group_rank[0]];
        banana_ranks.sort();
        assert_eq!(banana_ranks, vec![0, 1]);
    }

    #[test]
    fn test_rank_string_prefixes_order_first() {
        let results = run_group(2, |member| {
            let ctx = Context::new();
            let inputs: [Vec<&str>; 2] = [vec!["ab"], vec!["abc"]];
            let strings = &inputs[member.rank()];

            ctx.rank_strings(strings, &member).unwrap()
        });

        // "ab" sorts before its extension "abc"
        assert_eq!(results[0].group_id, vec![0]);
        assert_eq!(results[1].group_id, vec![1]);
        for result in &results {
            assert_eq!(result.groups, 2);
        }
    }
}
