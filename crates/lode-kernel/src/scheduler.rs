//! Central scheduling policy over one biased queue.
//!
//! The scheduler decides which lane an admitted task enters and exposes the
//! two retrieval flavors: owner-side `next` and foreign-side `steal`. The
//! free functions at the bottom are the guarded operation layer the
//! worker-pool collaborator calls when it may not have a kernel yet.

use crate::error::KernelError;
use crate::queue::{BiasedQueue, Lane};
use crate::task::Task;
use tracing::trace;

/// Identifier for a scheduler worker.
pub type WorkerId = usize;

/// Admission priority for a task. No other priorities exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Normal-lane admission.
    #[default]
    Default,
    /// Low-lane admission; drained only when the normal lane is empty.
    Low,
}

impl Priority {
    fn lane(self) -> Lane {
        match self {
            Priority::Default => Lane::Normal,
            Priority::Low => Lane::Low,
        }
    }
}

/// Thin policy layer over one [`BiasedQueue`].
pub struct Scheduler {
    queue: BiasedQueue,
}

impl Scheduler {
    /// Create a scheduler.
    ///
    /// `workers` and `spin_count` are pool-level tuning knobs accepted for
    /// interface compatibility with the kernel-lifecycle collaborator;
    /// per-queue behavior does not depend on them.
    pub fn new(workers: usize, spin_count: usize) -> Self {
        let _ = (workers, spin_count);
        Self {
            queue: BiasedQueue::new(),
        }
    }

    /// Admit `task` into the lane selected by `priority`. The push is
    /// visible to subsequent `next` and `steal` calls immediately.
    pub fn schedule(&self, task: Task, priority: Priority) {
        trace!(task = ?task.id(), ?priority, "task admitted");
        self.queue.push(task, priority.lane());
    }

    /// Owner-side retrieval for the worker's own next task. Non-blocking;
    /// `None` is the empty marker. The worker id identifies the asking
    /// consumer but does not change queue selection: each worker addresses
    /// its own scheduler instance.
    pub fn next(&self, worker: WorkerId) -> Option<Task> {
        let _ = worker;
        self.queue.pop_owned()
    }

    /// Foreign-side retrieval: block until the queue is non-empty, then
    /// take the head unless it is the end-of-work sentinel. `None` means
    /// legitimate absence of stealable work; the caller retries elsewhere.
    pub fn steal(&self) -> Option<Task> {
        let stolen = self.queue.try_steal();
        if let Some(task) = &stolen {
            trace!(task = ?task.id(), "task stolen");
        }
        stolen
    }

    /// The underlying queue.
    pub fn queue(&self) -> &BiasedQueue {
        &self.queue
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(num_cpus::get(), 0)
    }
}

/// Guard for operations that need an initialized kernel.
fn check_kernel(kernel: Option<&Scheduler>) -> Result<&Scheduler, KernelError> {
    kernel.ok_or(KernelError::NoKernel)
}

/// Admit work through an optional kernel handle.
///
/// Surfaces [`KernelError::NoKernel`] when no kernel is initialized; the
/// error is recoverable by initializing one and retrying.
pub fn schedule(
    kernel: Option<&Scheduler>,
    task: Task,
    priority: Priority,
) -> Result<(), KernelError> {
    check_kernel(kernel)?.schedule(task, priority);
    Ok(())
}

/// Owner-side retrieval through an optional kernel handle.
pub fn next(kernel: Option<&Scheduler>, worker: WorkerId) -> Result<Option<Task>, KernelError> {
    Ok(check_kernel(kernel)?.next(worker))
}

/// Foreign-side retrieval through an optional kernel handle.
pub fn steal(kernel: Option<&Scheduler>) -> Result<Option<Task>, KernelError> {
    Ok(check_kernel(kernel)?.steal())
}
