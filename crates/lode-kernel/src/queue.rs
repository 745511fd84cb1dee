//! Dual-lane concurrent queue biased toward its owning worker.
//!
//! Each worker owns one queue slot and pops from it far more often than any
//! peer steals from it. The owner's steady-state path therefore skips the
//! lock whenever an atomic emptiness check says there is nothing to pop,
//! while the stealing path always pays for full synchronization, including
//! a condition wait until work is observed.

use crate::task::Task;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Priority lane inside a [`BiasedQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Returned before any low-lane task whenever both lanes hold work.
    Normal,
    /// Drained only when the normal lane is empty.
    Low,
}

#[derive(Default)]
struct Lanes {
    normal: VecDeque<Task>,
    low: VecDeque<Task>,
}

impl Lanes {
    fn len(&self) -> usize {
        self.normal.len() + self.low.len()
    }

    fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.low.is_empty()
    }

    fn head(&self) -> Option<&Task> {
        self.normal.front().or_else(|| self.low.front())
    }

    fn take_head(&mut self) -> Option<Task> {
        self.normal.pop_front().or_else(|| self.low.pop_front())
    }
}

/// Concurrent dual-lane FIFO queue with an owner-biased fast path.
///
/// Invariants: FIFO order within a lane under any mix of owner pops and
/// steals; the normal lane strictly precedes the low lane at every
/// retrieval; no task is lost or duplicated. The end-of-work sentinel is
/// only ever removed by the owner path.
pub struct BiasedQueue {
    lanes: Mutex<Lanes>,

    /// Signalled on every push; stealers wait on it while the queue is empty.
    nonempty: Condvar,

    /// Mirror of the queued count, updated under the lock, read without it.
    len: AtomicUsize,
}

impl BiasedQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(Lanes::default()),
            nonempty: Condvar::new(),
            len: AtomicUsize::new(0),
        }
    }

    /// Append `task` to the given lane. Safe against concurrent pops and
    /// steals; never condition-waits.
    pub fn push(&self, task: Task, lane: Lane) {
        let mut lanes = self.lanes.lock();
        match lane {
            Lane::Normal => lanes.normal.push_back(task),
            Lane::Low => lanes.low.push_back(task),
        }
        self.len.store(lanes.len(), Ordering::Release);
        drop(lanes);
        self.nonempty.notify_one();
    }

    /// Owner-side retrieval: remove and return the next task, normal lane
    /// first. Returns `None` (the empty marker, distinct from the sentinel)
    /// without blocking when nothing is queued.
    ///
    /// The atomic pre-check lets the owner skip lock acquisition entirely in
    /// the idle steady state. A stale non-zero read only costs one locked
    /// look at an empty queue; a stale zero read is corrected on the next
    /// call. The locked section is the source of truth.
    pub fn pop_owned(&self) -> Option<Task> {
        if self.is_empty() {
            return None;
        }
        let mut lanes = self.lanes.lock();
        let task = lanes.take_head();
        self.len.store(lanes.len(), Ordering::Release);
        task
    }

    /// Foreign-side retrieval: block until the queue is observed non-empty,
    /// then pop the head under the same lock.
    ///
    /// After waking, the head is re-peeked: if it is the end-of-work
    /// sentinel the call returns `None` without removing it, because a
    /// sentinel is addressed to the owning worker alone. `None` therefore
    /// means "nothing stealable", which is a legitimate outcome and not an
    /// error.
    pub fn try_steal(&self) -> Option<Task> {
        let mut lanes = self.lanes.lock();
        while lanes.is_empty() {
            self.nonempty.wait(&mut lanes);
        }
        match lanes.head() {
            Some(task) if task.is_stop() => None,
            _ => {
                let task = lanes.take_head();
                self.len.store(lanes.len(), Ordering::Release);
                task
            }
        }
    }

    /// Best-effort emptiness check without taking the lock. May race
    /// benignly with concurrent pushes and pops; the locked paths decide
    /// correctness.
    pub fn is_empty(&self) -> bool {
        self.len.load(Ordering::Acquire) == 0
    }

    /// Best-effort queued-task count without taking the lock.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }
}

impl Default for BiasedQueue {
    fn default() -> Self {
        Self::new()
    }
}
