//! Local sequential sorting.

use std::cmp::Ordering;

use log;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::context::Context;
use crate::error::SortResult;
use crate::layout::{record_stride, TypeLayout};
use crate::op::CompareOp;
use crate::record::{Records, RecordsMut, SortIo};

/// Local sort algorithm choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortStrategy {
    /// Stable insertion sort for small inputs.
    Insertion,
    /// Platform comparison sort over a record permutation; applies when
    /// the comparator is basic and the key spans the whole record.
    Native,
    /// Randomized quicksort with insertion sort below the cutoff.
    Quicksort,
}

/// Picks the local sort algorithm for an input.
pub fn choose_strategy(
    count: usize,
    cutoff: usize,
    key: &TypeLayout,
    keysat: &TypeLayout,
    op: &CompareOp,
) -> SortStrategy {
    if count <= cutoff {
        return SortStrategy::Insertion;
    }
    if matches!(op, CompareOp::Basic { .. }) && key.extent() == keysat.extent() {
        return SortStrategy::Native;
    }
    SortStrategy::Quicksort
}

impl Context {
    /// Sorts `count` records in this process only.
    ///
    /// # Arguments
    /// * `io` - Input/output buffer pair, or a single buffer sorted in place
    /// * `count` - Number of records
    /// * `key` - Layout of the leading key region the comparator inspects
    /// * `keysat` - Layout of the whole record, key plus satellite
    /// * `op` - Ordering relation
    pub fn sort_local(
        &self,
        io: SortIo<'_>,
        count: usize,
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
    ) -> SortResult<()> {
        let stride = record_stride(key, keysat)?;
        let buf = io.materialize(count * stride)?;
        let mut records = RecordsMut::new(buf, stride);

        let strategy = choose_strategy(count, self.insertion_cutoff(), key, keysat, op);
        log::debug!("sorting {} records locally ({:?})", count, strategy);

        match strategy {
            SortStrategy::Insertion => insertion_sort(&mut records, op, 0, count),
            SortStrategy::Native => native_sort(&mut records, op),
            SortStrategy::Quicksort => {
                let mut rng = StdRng::seed_from_u64(self.pivot_seed());
                quicksort(&mut records, op, &mut rng, 0, count, self.insertion_cutoff());
            }
        }
        Ok(())
    }
}

/// Stable insertion sort of the records in `[from, to)`.
fn insertion_sort(records: &mut RecordsMut<'_>, op: &CompareOp, from: usize, to: usize) {
    let mut hold = vec![0u8; records.stride()];
    for i in (from + 1)..to {
        hold.copy_from_slice(records.record(i));
        let mut j = i;
        while j > from && op.eval(records.record(j - 1), &hold) == Ordering::Greater {
            records.copy_record(j, j - 1);
            j -= 1;
        }
        if j != i {
            records.write_record(j, &hold);
        }
    }
}

/// Quicksort of the records in `[from, to)` with pivots drawn from
/// `rng`, switching to insertion sort at `cutoff` records. Iterates on
/// the larger side of each split to bound the recursion depth.
fn quicksort(
    records: &mut RecordsMut<'_>,
    op: &CompareOp,
    rng: &mut StdRng,
    mut from: usize,
    mut to: usize,
    cutoff: usize,
) {
    while to - from > cutoff.max(1) {
        let pivot_at = rng.gen_range(from..to);
        records.swap(from, pivot_at);
        let split = partition(records, op, from, to);
        if split - from < to - split {
            quicksort(records, op, rng, from, split, cutoff);
            from = split + 1;
        } else {
            quicksort(records, op, rng, split + 1, to, cutoff);
            to = split;
        }
    }
    insertion_sort(records, op, from, to);
}

/// Partitions `[from, to)` around the pivot record at `from` and returns
/// the pivot's final position. Both scans stop on keys equal to the
/// pivot, which keeps the split balanced when many keys repeat.
fn partition(records: &mut RecordsMut<'_>, op: &CompareOp, from: usize, to: usize) -> usize {
    let pivot = records.record(from).to_vec();
    let mut i = from;
    let mut j = to;
    loop {
        loop {
            i += 1;
            if i == to || op.eval(records.record(i), &pivot) != Ordering::Less {
                break;
            }
        }
        loop {
            j -= 1;
            if j == from || op.eval(records.record(j), &pivot) != Ordering::Greater {
                break;
            }
        }
        if i >= j {
            break;
        }
        records.swap(i, j);
    }
    records.swap(from, j);
    j
}

/// Reorders the records through the platform sort over an index
/// permutation. Deterministic, at the price of one arena copy.
fn native_sort(records: &mut RecordsMut<'_>, op: &CompareOp) {
    let stride = records.stride();
    let snapshot = records.bytes().to_vec();
    let source = Records::new(&snapshot, stride);

    let mut order: Vec<usize> = (0..source.count()).collect();
    order.sort_unstable_by(|&a, &b| op.eval(source.record(a), source.record(b)));

    for (at, &index) in order.iter().enumerate() {
        records.write_record(at, source.record(index));
    }
}

#[cfg(test)]
mod test {
    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{choose_strategy, SortStrategy};
    use crate::context::Context;
    use crate::layout::TypeLayout;
    use crate::op::{int_ascend, CompareOp};
    use crate::record::SortIo;

    fn pack(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|value| value.to_ne_bytes()).collect()
    }

    fn unpack(bytes: &[u8]) -> Vec<i32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn pack_pairs(pairs: &[(i32, i32)]) -> Vec<u8> {
        pairs
            .iter()
            .flat_map(|(key, payload)| {
                let mut record = key.to_ne_bytes().to_vec();
                record.extend_from_slice(&payload.to_ne_bytes());
                record
            })
            .collect()
    }

    fn unpack_pairs(bytes: &[u8]) -> Vec<(i32, i32)> {
        bytes
            .chunks_exact(8)
            .map(|chunk| {
                (
                    i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                    i32::from_ne_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
                )
            })
            .collect()
    }

    #[rstest]
    #[case(10, SortStrategy::Insertion)]
    #[case(32, SortStrategy::Insertion)]
    #[case(33, SortStrategy::Native)]
    fn test_choose_strategy_key_only(#[case] count: usize, #[case] expected: SortStrategy) {
        let layout = TypeLayout::int();
        let op = CompareOp::basic(layout.clone(), int_ascend);

        assert_eq!(choose_strategy(count, 32, &layout, &layout, &op), expected);
    }

    #[test]
    fn test_choose_strategy_satellite_or_chain() {
        let key = TypeLayout::int();
        let keysat = TypeLayout::contiguous(8);
        let basic = CompareOp::basic(key.clone(), int_ascend);
        let chained = CompareOp::series(&basic, &basic);

        // satellite payload rules out the native fast path
        assert_eq!(choose_strategy(100, 32, &key, &keysat, &basic), SortStrategy::Quicksort);
        // so does a chained comparator, even over key-only records
        assert_eq!(choose_strategy(100, 32, &key, &key, &chained), SortStrategy::Quicksort);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(10)]
    #[case(100)]
    #[case(1000)]
    fn test_sort_local_matches_std(#[case] count: usize) {
        let ctx = Context::new();
        let layout = TypeLayout::int();

        let mut values: Vec<i32> = (0..count as i32).collect();
        values.shuffle(&mut rand::thread_rng());

        let mut buf = pack(&values);
        ctx.sort_local(SortIo::InPlace(&mut buf), count, &layout, &layout, ctx.int_ascending())
            .unwrap();

        values.sort();
        assert_eq!(unpack(&buf), values);
    }

    #[test]
    fn test_sort_local_descending() {
        let ctx = Context::new();
        let layout = TypeLayout::int();

        let mut buf = pack(&[3, 1, 4, 1, 5]);
        ctx.sort_local(SortIo::InPlace(&mut buf), 5, &layout, &layout, ctx.int_descending())
            .unwrap();

        assert_eq!(unpack(&buf), vec![5, 4, 3, 1, 1]);
    }

    #[test]
    fn test_sort_local_separate_output() {
        let ctx = Context::new();
        let layout = TypeLayout::int();

        let input = pack(&[9, 7, 8]);
        let mut output = vec![0u8; input.len()];
        ctx.sort_local(
            SortIo::Separate {
                input: &input,
                output: &mut output,
            },
            3,
            &layout,
            &layout,
            ctx.int_ascending(),
        )
        .unwrap();

        assert_eq!(unpack(&output), vec![7, 8, 9]);
        // the input stays untouched
        assert_eq!(unpack(&input), vec![9, 7, 8]);
    }

    #[test]
    fn test_sort_local_carries_satellite() {
        // force the quicksort path with a low cutoff and a satellite field
        let ctx = Context::builder().with_insertion_cutoff(4).build();
        let key = TypeLayout::int();
        let keysat = TypeLayout::contiguous(8);
        let op = CompareOp::basic(key.clone(), int_ascend);

        let mut pairs: Vec<(i32, i32)> = (0..200).map(|at| (at % 10, at)).collect();
        pairs.shuffle(&mut rand::thread_rng());

        let mut buf = pack_pairs(&pairs);
        ctx.sort_local(SortIo::InPlace(&mut buf), pairs.len(), &key, &keysat, &op)
            .unwrap();

        let sorted = unpack_pairs(&buf);
        // keys ascend and every (key, payload) pair survived the shuffle
        for window in sorted.windows(2) {
            assert!(window[0].0 <= window[1].0);
        }
        let mut expected = pairs.clone();
        expected.sort();
        let mut actual = sorted.clone();
        actual.sort();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_sort_local_all_equal_keys() {
        let ctx = Context::builder().with_insertion_cutoff(2).build();
        let key = TypeLayout::int();
        let keysat = TypeLayout::contiguous(8);
        let op = CompareOp::basic(key.clone(), int_ascend);

        let pairs: Vec<(i32, i32)> = (0..100).map(|at| (7, at)).collect();
        let mut buf = pack_pairs(&pairs);
        ctx.sort_local(SortIo::InPlace(&mut buf), pairs.len(), &key, &keysat, &op)
            .unwrap();

        let mut actual = unpack_pairs(&buf);
        actual.sort();
        assert_eq!(actual, pairs);
    }

    #[test]
    fn test_sort_local_rejects_short_buffer() {
        let ctx = Context::new();
        let layout = TypeLayout::int();

        let mut buf = pack(&[1, 2, 3]);
        let result = ctx.sort_local(SortIo::InPlace(&mut buf), 4, &layout, &layout, ctx.int_ascending());
        assert!(result.is_err());
    }
}
