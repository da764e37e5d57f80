//! Process-group collectives.
//!
//! The sorting core drives a fixed group of cooperating members through
//! the [`ProcessGroup`] trait and never implements communication itself.
//! Every distributed operation is a collective: all members of the group
//! must call it, in the same relative order, with matching group-wide
//! arguments. A member that never reaches the call stalls the rest, and
//! an asymmetric early return leaves the group desynchronized; both are
//! caller obligations, not defended against here.
//!
//! [`ThreadGroup`] is an in-process reference backend over channels,
//! used by the tests and demos of this crate and suitable for
//! single-machine runs. A native transport (an MPI binding, say) can
//! implement the trait and override the provided collectives with its
//! own.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log;

/// Process-group communication error.
#[derive(Debug)]
pub enum GroupError {
    /// A peer endpoint is gone.
    Closed,
    /// A member index outside `0..size` was addressed.
    InvalidRank(usize),
    /// A collective received a payload inconsistent with the call.
    Malformed(&'static str),
}

impl Error for GroupError {}

impl Display for GroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            GroupError::Closed => write!(f, "process group peer disconnected"),
            GroupError::InvalidRank(rank) => {
                write!(f, "member index {} outside the process group", rank)
            }
            GroupError::Malformed(what) => write!(f, "malformed collective payload: {}", what),
        }
    }
}

/// Combine function for [`ProcessGroup::all_reduce`]: folds `elem` into
/// `acc`. Must be associative and commutative.
pub type ReduceFn = fn(acc: &mut [u64], elem: &[u64]);

/// A fixed set of cooperating members with a stable rank ordering,
/// exchanging byte buffers.
///
/// Implementors provide the point-to-point primitives; the collectives
/// are provided on top of them. Buffers between one peer pair arrive in
/// send order, and only byte contents ever travel.
pub trait ProcessGroup {
    /// This member's index in the group, in `0..size`.
    fn rank(&self) -> usize;

    /// Number of members in the group.
    fn size(&self) -> usize;

    /// Sends a byte buffer to `dst`. Must not block indefinitely when
    /// the destination has not posted a receive yet.
    fn send(&self, dst: usize, bytes: &[u8]) -> Result<(), GroupError>;

    /// Receives the next byte buffer from `src`, blocking until one
    /// arrives.
    fn recv(&self, src: usize) -> Result<Vec<u8>, GroupError>;

    /// Distributes the root's buffer to every member.
    fn broadcast(&self, root: usize, buf: &mut Vec<u8>) -> Result<(), GroupError> {
        if root >= self.size() {
            return Err(GroupError::InvalidRank(root));
        }
        if self.rank() == root {
            for dst in 0..self.size() {
                if dst != root {
                    self.send(dst, buf)?;
                }
            }
        } else {
            *buf = self.recv(root)?;
        }
        Ok(())
    }

    /// Collects every member's buffer on `root`, in rank order. Returns
    /// `None` on every other member.
    fn gather(&self, root: usize, bytes: &[u8]) -> Result<Option<Vec<Vec<u8>>>, GroupError> {
        if root >= self.size() {
            return Err(GroupError::InvalidRank(root));
        }
        if self.rank() != root {
            self.send(root, bytes)?;
            return Ok(None);
        }
        let mut parts = Vec::with_capacity(self.size());
        for src in 0..self.size() {
            if src == root {
                parts.push(bytes.to_vec());
            } else {
                parts.push(self.recv(src)?);
            }
        }
        Ok(Some(parts))
    }

    /// Collects every member's buffer on every member, in rank order.
    fn all_gather(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, GroupError> {
        for dst in 0..self.size() {
            if dst != self.rank() {
                self.send(dst, bytes)?;
            }
        }
        let mut parts = Vec::with_capacity(self.size());
        for src in 0..self.size() {
            if src == self.rank() {
                parts.push(bytes.to_vec());
            } else {
                parts.push(self.recv(src)?);
            }
        }
        Ok(parts)
    }

    /// Distributes `parts[i]` from `root` to member `i` and returns this
    /// member's share. Only the root's `parts` are consulted; other
    /// members pass an empty slice.
    fn scatter(&self, root: usize, parts: &[Vec<u8>]) -> Result<Vec<u8>, GroupError> {
        if root >= self.size() {
            return Err(GroupError::InvalidRank(root));
        }
        if self.rank() != root {
            return self.recv(root);
        }
        if parts.len() != self.size() {
            return Err(GroupError::Malformed("scatter share count"));
        }
        for dst in 0..self.size() {
            if dst != root {
                self.send(dst, &parts[dst])?;
            }
        }
        Ok(parts[root].clone())
    }

    /// Reduces a fixed-width `u64` vector across the group in one round:
    /// every member contributes `values`, the combine function folds the
    /// contributions together, and every member receives the result.
    fn all_reduce(&self, values: &[u64], combine: ReduceFn) -> Result<Vec<u64>, GroupError> {
        const ROOT: usize = 0;
        let gathered = self.gather(ROOT, &encode_u64s(values))?;
        let mut result = match gathered {
            Some(parts) => {
                let mut acc = decode_u64s(&parts[0])?;
                for part in &parts[1..] {
                    let elem = decode_u64s(part)?;
                    if elem.len() != acc.len() {
                        return Err(GroupError::Malformed("reduce element width"));
                    }
                    combine(&mut acc, &elem);
                }
                encode_u64s(&acc)
            }
            None => Vec::new(),
        };
        self.broadcast(ROOT, &mut result)?;
        decode_u64s(&result)
    }
}

fn encode_u64s(values: &[u64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 8);
    for value in values {
        bytes.extend_from_slice(&value.to_ne_bytes());
    }
    bytes
}

fn decode_u64s(bytes: &[u8]) -> Result<Vec<u64>, GroupError> {
    if bytes.len() % 8 != 0 {
        return Err(GroupError::Malformed("reduce payload length"));
    }
    let values = bytes
        .chunks_exact(8)
        .map(|chunk| {
            u64::from_ne_bytes([
                chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
            ])
        })
        .collect();
    Ok(values)
}

/// In-process process group: members exchange byte buffers over a full
/// mesh of unbounded channels and run on caller-spawned threads.
pub struct ThreadGroup {
    rank: usize,
    senders: Vec<Sender<Vec<u8>>>,
    receivers: Vec<Receiver<Vec<u8>>>,
}

impl ThreadGroup {
    /// Creates a group of `size` members and returns one handle per
    /// member, in rank order. Handles are meant to be moved onto their
    /// own threads; every member must take part in every collective.
    pub fn create(size: usize) -> Vec<ThreadGroup> {
        log::info!("creating thread group (members: {})", size);

        // full mesh: a dedicated channel per ordered peer pair keeps
        // per-pair FIFO ordering and makes self-sends legal
        let mut senders: Vec<Vec<Sender<Vec<u8>>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut receivers: Vec<Vec<Receiver<Vec<u8>>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        for src in 0..size {
            for dst in 0..size {
                let (sender, receiver) = unbounded();
                senders[src].push(sender);
                receivers[dst].push(receiver);
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| ThreadGroup {
                rank,
                senders,
                receivers,
            })
            .collect()
    }
}

impl ProcessGroup for ThreadGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }

    fn send(&self, dst: usize, bytes: &[u8]) -> Result<(), GroupError> {
        let sender = self.senders.get(dst).ok_or(GroupError::InvalidRank(dst))?;
        sender.send(bytes.to_vec()).map_err(|_| GroupError::Closed)
    }

    fn recv(&self, src: usize) -> Result<Vec<u8>, GroupError> {
        let receiver = self.receivers.get(src).ok_or(GroupError::InvalidRank(src))?;
        receiver.recv().map_err(|_| GroupError::Closed)
    }
}


#[cfg(test)]
mod test {
    use super::testutil::run_group;
    use super::{GroupError, ProcessGroup};

    #[test]
    fn test_send_recv_ordering() {
        run_group(2, |member| {
            if member.rank() == 0 {
                member.send(1, &[1]).unwrap();
                member.send(1, &[2]).unwrap();
            } else {
                assert_eq!(member.recv(0).unwrap(), vec![1]);
                assert_eq!(member.recv(0).unwrap(), vec![2]);
            }
        });
    }

    #[test]
    fn test_all_gather_rank_order() {
        let results = run_group(3, |member| {
            let stamp = [member.rank() as u8];
            member.all_gather(&stamp).unwrap()
        });

        for parts in results {
            assert_eq!(parts, vec![vec![0], vec![1], vec![2]]);
        }
    }

    #[test]
    fn test_gather_only_at_root() {
        let results = run_group(3, |member| member.gather(1, &[member.rank() as u8]).unwrap());

        assert!(results[0].is_none());
        assert_eq!(results[1], Some(vec![vec![0], vec![1], vec![2]]));
        assert!(results[2].is_none());
    }

    #[test]
    fn test_scatter_shares() {
        let results = run_group(3, |member| {
            let parts = if member.rank() == 0 {
                vec![vec![10], vec![11], vec![12]]
            } else {
                Vec::new()
            };
            member.scatter(0, &parts).unwrap()
        });

        assert_eq!(results, vec![vec![10], vec![11], vec![12]]);
    }

    #[test]
    fn test_broadcast() {
        let results = run_group(4, |member| {
            let mut buf = if member.rank() == 2 { vec![42] } else { Vec::new() };
            member.broadcast(2, &mut buf).unwrap();
            buf
        });

        assert_eq!(results, vec![vec![42]; 4]);
    }

    #[test]
    fn test_all_reduce_sum() {
        let results = run_group(4, |member| {
            let values = [member.rank() as u64 + 1, 1];
            member
                .all_reduce(&values, |acc, elem| {
                    acc[0] += elem[0];
                    acc[1] += elem[1];
                })
                .unwrap()
        });

        for reduced in results {
            assert_eq!(reduced, vec![10, 4]);
        }
    }

    #[test]
    fn test_invalid_rank() {
        run_group(1, |member| {
            assert!(matches!(member.send(5, &[0]), Err(GroupError::InvalidRank(5))));
            assert!(matches!(member.gather(3, &[0]), Err(GroupError::InvalidRank(3))));
        });
    }

    #[test]
    fn test_self_group() {
        run_group(1, |member| {
            assert_eq!(member.all_gather(&[7]).unwrap(), vec![vec![7]]);
            assert_eq!(member.all_reduce(&[9], |acc, elem| acc[0] += elem[0]).unwrap(), vec![9]);
        });
    }
}
