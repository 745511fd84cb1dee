//! Serialized inspection of unhandled task errors.
//!
//! Worker threads fail concurrently, but an interactive inspection session
//! is inherently single-operator. One process-wide reentrant lock admits a
//! single session at a time; a thread that already holds it may nest
//! without deadlocking. Hooks chain rather than replace, so stacked
//! installations compose.

use crate::context;
use crate::error::TaskError;
use once_cell::sync::Lazy;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::error;

/// Callback that inspects an unhandled task error, e.g. an interactive
/// session entry point. Runs while the process-wide session lock is held.
pub type DebugHook = Arc<dyn Fn(&TaskError) + Send + Sync>;

static DEBUGGER_LOCK: Lazy<ReentrantMutex<()>> = Lazy::new(|| ReentrantMutex::new(()));

thread_local! {
    static HOOK: RefCell<Option<DebugHook>> = const { RefCell::new(None) };
}

/// Restores the previously installed hook when dropped.
pub struct HookGuard {
    prev: Option<DebugHook>,
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        HOOK.with(|slot| *slot.borrow_mut() = prev);
    }
}

/// Run `body` with `hook` as the thread's base inspection hook.
pub fn with_hook<R>(hook: DebugHook, body: impl FnOnce() -> R) -> R {
    let prev = HOOK.with(|slot| slot.borrow_mut().replace(hook));
    let _guard = HookGuard { prev };
    body()
}

/// Install the serializing inspection hook for the calling thread.
///
/// The produced hook chains to whatever hook was installed before it,
/// records the offending error in the current task context so a later
/// `transfer(None)` defaults to it, and holds the process-wide session lock
/// while the (possibly chained) session runs. Dropping the guard restores
/// the previous hook.
pub fn install() -> HookGuard {
    let prev = HOOK.with(|slot| slot.borrow().clone());
    let chained = prev.clone();
    let hook: DebugHook = Arc::new(move |error: &TaskError| {
        serialized(error, |error| match &chained {
            Some(previous) => previous(error),
            None => default_session(error),
        });
    });
    HOOK.with(|slot| *slot.borrow_mut() = Some(hook));
    HookGuard { prev }
}

/// Hand an unhandled error to the installed hook, or to the default
/// serialized session when none is installed.
pub fn enter(error: &TaskError) {
    let hook = HOOK.with(|slot| slot.borrow().clone());
    match hook {
        Some(hook) => hook(error),
        None => serialized(error, default_session),
    }
}

fn serialized(error: &TaskError, session: impl FnOnce(&TaskError)) {
    // Record before the session starts so transfer() can pick the error up
    // while the session is still on this frame.
    context::set_inspected(error.clone());
    let _session = DEBUGGER_LOCK.lock();
    session(error);
}

fn default_session(error: &TaskError) {
    error!(%error, class = ?error.class(), "unhandled task error");
}
