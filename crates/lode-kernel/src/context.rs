//! Per-task execution context, the transfer protocol, and the per-task
//! handler installation wrapper.
//!
//! Each task body runs inside exactly one non-local-exit barrier. An error
//! raised anywhere under it can be converted into an ordinary (wrapped)
//! return value instead of unwinding the worker thread, which is what keeps
//! workers alive across failing tasks.

use crate::debugger;
use crate::error::{ErrorClass, KernelError, TaskError};
use crate::handlers;
use crate::transport::{TaskOutcome, WrappedError};
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared handle used to request cooperative cancellation of one task.
///
/// Killing is a signal, not an interrupt: the running body observes it at
/// the safe points where it calls [`check_kill`].
#[derive(Debug, Clone, Default)]
pub struct KillSwitch(Arc<AtomicBool>);

impl KillSwitch {
    /// Create an unset switch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; observed at the task's next [`check_kill`].
    pub fn kill(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_killed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Execution context for a single task invocation.
///
/// A "current" context exists, thread-locally, only while a task body runs
/// inside [`run_in_context`]. It carries the kill switch and the slot the
/// debugger records the error under inspection into.
pub struct TaskContext {
    kill: KillSwitch,
    inspected: RefCell<Option<TaskError>>,
}

impl TaskContext {
    /// Context with a fresh kill switch.
    pub fn new() -> Self {
        Self::with_kill_switch(KillSwitch::new())
    }

    /// Context sharing an externally held kill switch.
    pub fn with_kill_switch(kill: KillSwitch) -> Self {
        Self {
            kill,
            inspected: RefCell::new(None),
        }
    }

    /// Handle for cancelling this invocation from another thread.
    pub fn kill_switch(&self) -> KillSwitch {
        self.kill.clone()
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload of the designated non-local exit. Only [`run_in_context`] ever
/// catches it, so the unwind is scoped to one task invocation.
struct TransferSignal(WrappedError);

thread_local! {
    static CURRENT: RefCell<Option<Rc<TaskContext>>> = const { RefCell::new(None) };
    static KERNEL_ACTIVE: Cell<bool> = const { Cell::new(false) };
}

struct CurrentGuard {
    prev: Option<Rc<TaskContext>>,
}

impl CurrentGuard {
    fn install(ctx: Rc<TaskContext>) -> Self {
        let prev = CURRENT.with(|slot| slot.borrow_mut().replace(ctx));
        Self { prev }
    }
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT.with(|slot| *slot.borrow_mut() = prev);
    }
}

struct ActiveGuard;

impl ActiveGuard {
    fn set() -> Self {
        KERNEL_ACTIVE.with(|flag| flag.set(true));
        ActiveGuard
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        KERNEL_ACTIVE.with(|flag| flag.set(false));
    }
}

/// Record the error currently under inspection so [`transfer`] can default
/// to it. A no-op outside task execution.
pub(crate) fn set_inspected(error: TaskError) {
    CURRENT.with(|slot| {
        if let Some(ctx) = slot.borrow().as_ref() {
            *ctx.inspected.borrow_mut() = Some(error);
        }
    });
}

fn current_inspected() -> Option<TaskError> {
    CURRENT.with(|slot| {
        slot.borrow()
            .as_ref()
            .and_then(|ctx| ctx.inspected.borrow().clone())
    })
}

/// Establish the non-local-exit barrier around `body` and run it.
///
/// A [`transfer`] anywhere under `body` lands here and becomes the
/// invocation's [`TaskOutcome::Transferred`] value (or
/// [`TaskOutcome::Killed`] when the transferred error is a kill). A stray
/// panic is captured as a transport failure rather than unwinding the
/// worker thread.
pub fn run_in_context<T, F>(ctx: TaskContext, body: F) -> TaskOutcome<T>
where
    F: FnOnce() -> T,
{
    let _current = CurrentGuard::install(Rc::new(ctx));
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => TaskOutcome::Completed(value),
        Err(payload) => match payload.downcast::<TransferSignal>() {
            Ok(signal) => {
                let TransferSignal(wrapped) = *signal;
                if wrapped.error().class().is_a(ErrorClass::TaskKilled) {
                    TaskOutcome::Killed
                } else {
                    TaskOutcome::Transferred(wrapped)
                }
            }
            Err(payload) => TaskOutcome::Transferred(WrappedError::from_kernel(
                KernelError::TaskPanic(panic_message(payload.as_ref())),
            )),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Non-local exit to the current task barrier.
///
/// Yields `error` (or, when `None`, the error currently under inspection)
/// as the task's transported result. Must be called under an active
/// [`run_in_context`]; with neither an argument nor an inspected error the
/// call panics, and the barrier reports that as a captured panic.
pub fn transfer(error: Option<TaskError>) -> ! {
    let error = match error.or_else(current_inspected) {
        Some(error) => error,
        None => panic!("transfer called with no error argument and none under inspection"),
    };
    panic::resume_unwind(Box::new(TransferSignal(WrappedError::new(error))));
}

/// Observe a pending kill request at a cooperative safe point. Raises the
/// kill through the transfer path; a no-op when no kill is pending or no
/// task is executing.
pub fn check_kill() {
    let killed = CURRENT.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(false, |ctx| ctx.kill.is_killed())
    });
    if killed {
        transfer(Some(TaskError::from_kernel(KernelError::TaskKilled)));
    }
}

/// Per-task wrapper with a fresh context; see [`install_and_run_in`].
pub fn install_and_run<T, F>(body: F) -> TaskOutcome<T>
where
    F: FnOnce() -> Result<T, TaskError>,
{
    install_and_run_in(TaskContext::new(), body)
}

/// The full per-task wrapper: mark the thread kernel-active, install the
/// serializing debugger hook, and run `body` inside the task barrier.
///
/// An `Err` from `body` routes through client-handler dispatch, then the
/// serialized debugger session, then transfers to the barrier; it never
/// unwinds past this call uncaught.
///
/// Re-entrant invocation (a task that synchronously triggers nested task
/// execution on its own thread) runs `body` directly: the outer
/// installation's hook, active flag, and barrier stay in force, so an inner
/// error unwinds to the outer barrier instead of stacking a second layer of
/// machinery.
pub fn install_and_run_in<T, F>(ctx: TaskContext, body: F) -> TaskOutcome<T>
where
    F: FnOnce() -> Result<T, TaskError>,
{
    if KERNEL_ACTIVE.with(|flag| flag.get()) {
        return match body() {
            Ok(value) => TaskOutcome::Completed(value),
            Err(error) => resolve_error(error),
        };
    }
    let _active = ActiveGuard::set();
    let _hook = debugger::install();
    run_in_context(ctx, || match body() {
        Ok(value) => value,
        Err(error) => resolve_error(error),
    })
}

/// Route an error raised by a task body: client handlers first, then the
/// serialized debugger, then transfer to the barrier. Never returns.
fn resolve_error(error: TaskError) -> ! {
    handlers::dispatch(&error);
    debugger::enter(&error);
    transfer(Some(error))
}
