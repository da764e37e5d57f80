//! Merging locally sorted record sequences.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use log;

use crate::context::Context;
use crate::error::{SortError, SortResult};
use crate::layout::{record_stride, TypeLayout};
use crate::op::CompareOp;
use crate::record::{checked_count, Records, RecordsMut};

impl Context {
    /// Merges two or more locally sorted sequences into one sorted
    /// output of their combined length. Equal records from lower-indexed
    /// inputs precede those from higher-indexed ones, so the merge is
    /// stable.
    ///
    /// Exactly two inputs take a linear two-pointer walk; more take a
    /// k-way merge through a binary min-heap keyed by each input's head
    /// record.
    pub fn merge(
        &self,
        inputs: &[&[u8]],
        out: &mut [u8],
        key: &TypeLayout,
        keysat: &TypeLayout,
        op: &CompareOp,
    ) -> SortResult<()> {
        if inputs.len() < 2 {
            return Err(SortError::TooFewInputs(inputs.len()));
        }
        let stride = record_stride(key, keysat)?;

        let mut total = 0;
        let mut views = Vec::with_capacity(inputs.len());
        for input in inputs {
            total += checked_count(input, stride)?;
            views.push(Records::new(input, stride));
        }
        if out.len() != total * stride {
            return Err(SortError::SizeMismatch {
                expected: total * stride,
                actual: out.len(),
            });
        }
        let mut merged = RecordsMut::new(out, stride);

        log::debug!("merging {} sequences ({} records)", views.len(), total);
        if views.len() == 2 {
            merge_two(&views[0], &views[1], &mut merged, op);
        } else {
            merge_kway(&views, &mut merged, op);
        }
        Ok(())
    }
}

fn merge_two(a: &Records<'_>, b: &Records<'_>, out: &mut RecordsMut<'_>, op: &CompareOp) {
    let mut i = 0;
    let mut j = 0;
    let mut at = 0;
    while i < a.count() && j < b.count() {
        // take from the second input only on a strictly smaller key
        if op.eval(b.record(j), a.record(i)) == Ordering::Less {
            out.write_record(at, b.record(j));
            j += 1;
        } else {
            out.write_record(at, a.record(i));
            i += 1;
        }
        at += 1;
    }
    while i < a.count() {
        out.write_record(at, a.record(i));
        i += 1;
        at += 1;
    }
    while j < b.count() {
        out.write_record(at, b.record(j));
        j += 1;
        at += 1;
    }
}

/// One input's current head record in the merge heap.
struct HeapHead<'a> {
    record: &'a [u8],
    input: usize,
    op: &'a CompareOp,
}

impl Ord for HeapHead<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // the heap is a max-heap, so reverse: the smallest head pops
        // first, with the input index breaking ties to keep stability
        self.op
            .eval(self.record, other.record)
            .then(self.input.cmp(&other.input))
            .reverse()
    }
}

impl PartialOrd for HeapHead<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapHead<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapHead<'_> {}

fn merge_kway<'a>(inputs: &[Records<'a>], out: &mut RecordsMut<'_>, op: &'a CompareOp) {
    let mut cursors = vec![0usize; inputs.len()];
    let mut heads = BinaryHeap::with_capacity(inputs.len());
    for (input, records) in inputs.iter().enumerate() {
        if records.count() > 0 {
            heads.push(HeapHead {
                record: records.record(0),
                input,
                op,
            });
        }
    }

    let mut at = 0;
    while let Some(head) = heads.pop() {
        out.write_record(at, head.record);
        at += 1;

        cursors[head.input] += 1;
        let next = cursors[head.input];
        if next < inputs[head.input].count() {
            heads.push(HeapHead {
                record: inputs[head.input].record(next),
                input: head.input,
                op,
            });
        }
    }
}
