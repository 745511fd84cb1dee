//! Lode execution kernel
//!
//! The execution core of the Lode parallel-task runtime:
//! - **Queue**: a dual-lane concurrent queue biased toward its owning
//!   worker (`queue` module)
//! - **Scheduler**: lane selection and the owner/stealer retrieval split
//!   (`scheduler` module)
//! - **Error transport**: wrapped errors that cross the worker/consumer
//!   thread boundary and re-raise only when unwrapped (`transport` module)
//! - **Handlers & debugger**: dynamically scoped client handlers and the
//!   process-wide serialized inspection session (`handlers`, `debugger`)
//! - **Context**: the per-task non-local-exit barrier and the per-task
//!   installation wrapper (`context` module)
//!
//! The worker-pool collaborator drives the core roughly like this:
//!
//! ```rust,ignore
//! use lode_kernel::{install_and_run, unwrap_result, Priority, Scheduler, Task};
//!
//! let scheduler = Scheduler::new(workers, spin_count);
//! scheduler.schedule(Task::new(|| { /* deliver a result */ }), Priority::Default);
//!
//! // Worker loop:
//! while let Some(task) = scheduler.next(worker_id) {
//!     if task.is_stop() {
//!         break;
//!     }
//!     task.run(); // the body calls install_and_run and sends its outcome
//! }
//!
//! // Consumer side:
//! let value = unwrap_result(outcome)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Per-task execution context, transfer protocol, and install wrapper
pub mod context;

/// Serialized inspection of unhandled task errors
pub mod debugger;

/// Error classes and kernel error types
pub mod error;

/// Dynamically scoped client error handlers
pub mod handlers;

/// Dual-lane concurrent queue biased toward its owner
pub mod queue;

/// Central scheduling policy and the guarded operation layer
pub mod scheduler;

/// Task units and identifiers
pub mod task;

/// Error transport between workers and result consumers
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

pub use context::{
    check_kill, install_and_run, install_and_run_in, run_in_context, transfer, KillSwitch,
    TaskContext,
};
pub use debugger::{enter as debugger_enter, install as install_debugger_hook, with_hook, DebugHook};
pub use error::{ErrorClass, KernelError, TaskError};
pub use handlers::{capture, dispatch, with_handlers, with_snapshot, HandlerEntry, HandlerSnapshot};
pub use queue::{BiasedQueue, Lane};
pub use scheduler::{next, schedule, steal, Priority, Scheduler, WorkerId};
pub use task::{Task, TaskId};
pub use transport::{unwrap_result, TaskOutcome, WrappedError};
