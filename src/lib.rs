//! `dist-sort` is a rust distributed record sort, search and rank algorithms implementation.
//!
//! The library works on a logically single ordered collection whose records are partitioned
//! across a group of cooperating processes, each holding a contiguous local slice. On top of a
//! composable comparator abstraction it provides local sorting, merging and insertion-bound
//! search, and their collective counterparts: fixed-count and variable-count distributed sort,
//! distributed search, and distributed rank. Communication stays behind the
//! [`ProcessGroup`] trait, so any transport with point-to-point byte delivery can carry the
//! collectives; the bundled [`ThreadGroup`] backend runs a whole group inside one process.
//!
//! # Overview
//!
//! `dist-sort` supports the following features:
//!
//! * **Record agnostic:**
//!   records are flat byte regions described by validated [`TypeLayout`] descriptors, a leading
//!   key the comparator inspects and an opaque satellite payload carried along.
//! * **Composable orderings:**
//!   comparators chain lexicographically, including across keys that are not laid out
//!   back-to-back, and predefined integer orderings come with the [`Context`].
//! * **Algorithm selection:**
//!   local sorting picks between insertion sort, a platform fast path and randomized quicksort;
//!   the variable-count distributed sort picks its data movement from one combined min/max/sum
//!   reduction and a configurable volume threshold.
//! * **Transport agnostic:**
//!   every collective is expressed against the [`ProcessGroup`] collectives and never touches a
//!   socket, a runtime, or another process's memory.
//!
//! # Example
//!
//! ```
//! use std::thread;
//!
//! use dist_sort::{Context, ProcessGroup, SortIo, ThreadGroup, TypeLayout};
//!
//! let members = ThreadGroup::create(2);
//! let inputs = vec![vec![3i32, 1, 4, 1], vec![5, 9, 2, 6]];
//!
//! thread::scope(|scope| {
//!     for (member, keys) in members.into_iter().zip(inputs) {
//!         scope.spawn(move || {
//!             let ctx = Context::new();
//!             let layout = TypeLayout::int();
//!             let mut buf: Vec<u8> = keys.iter().flat_map(|key| key.to_ne_bytes()).collect();
//!
//!             ctx.sort(SortIo::InPlace(&mut buf), keys.len(), &layout, &layout, ctx.int_ascending(), &member)
//!                 .unwrap();
//!
//!             let sorted: Vec<i32> = buf
//!                 .chunks_exact(4)
//!                 .map(|chunk| i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
//!                 .collect();
//!             let expected = if member.rank() == 0 { vec![1, 1, 2, 3] } else { vec![4, 5, 6, 9] };
//!             assert_eq!(sorted, expected);
//!         });
//!     }
//! });
//! ```

pub mod context;
pub mod error;
pub mod group;
pub mod layout;
pub mod local;
pub mod merge;
pub mod op;
pub mod rank;
pub mod record;
pub mod search;
pub mod sort;

pub use context::{Context, ContextBuilder};
pub use error::{SortError, SortResult};
pub use group::{GroupError, ProcessGroup, ThreadGroup};
pub use layout::TypeLayout;
pub use local::{choose_strategy, SortStrategy};
pub use op::{CompareFn, CompareOp};
pub use rank::RankResult;
pub use record::SortIo;
pub use sort::{choose_group_strategy, GroupSortStrategy};
