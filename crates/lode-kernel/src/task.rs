//! Schedulable task units.

use crate::handlers::{self, HandlerSnapshot};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a task.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    /// Generate a new unique TaskId.
    pub fn new() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

type TaskFn = Box<dyn FnOnce() + Send + 'static>;

enum TaskKind {
    Work {
        body: TaskFn,
        handlers: HandlerSnapshot,
    },
    Stop,
}

/// A schedulable unit of work.
///
/// A task is either an opaque body plus the client-handler chain captured
/// from the thread that created it, or the end-of-work sentinel that tells a
/// worker to stop looking for more work. The sentinel is personal to the
/// queue's owning consumer; stealing threads never retrieve it.
pub struct Task {
    id: TaskId,
    kind: TaskKind,
}

impl Task {
    /// Create a task from a body, capturing the calling thread's
    /// client-handler chain so it is visible when the body later runs on a
    /// worker thread.
    pub fn new(body: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id: TaskId::new(),
            kind: TaskKind::Work {
                body: Box::new(body),
                handlers: handlers::capture(),
            },
        }
    }

    /// The end-of-work sentinel.
    pub fn stop() -> Self {
        Self {
            id: TaskId::new(),
            kind: TaskKind::Stop,
        }
    }

    /// Get the task ID.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether this is the end-of-work sentinel.
    pub fn is_stop(&self) -> bool {
        matches!(self.kind, TaskKind::Stop)
    }

    /// Run the task body with its captured handler chain installed. The
    /// sentinel carries no body; running it is a no-op.
    pub fn run(self) {
        match self.kind {
            TaskKind::Work { body, handlers: snapshot } => {
                handlers::with_snapshot(&snapshot, body);
            }
            TaskKind::Stop => {}
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TaskKind::Work { .. } => f
                .debug_struct("Task")
                .field("id", &self.id)
                .finish_non_exhaustive(),
            TaskKind::Stop => f
                .debug_struct("Task")
                .field("id", &self.id)
                .field("stop", &true)
                .finish(),
        }
    }
}
