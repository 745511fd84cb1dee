//! Dynamically scoped client error handlers.
//!
//! Calling code installs (class, handler) pairs for the extent of a body;
//! the chain is thread-local, grows on entry, and is restored on every exit
//! path. A snapshot of the chain travels with each task so handlers stay
//! visible when the body runs on a worker thread.

use crate::error::{ErrorClass, TaskError};
use std::cell::RefCell;
use std::mem;
use std::sync::Arc;

/// Callback invoked when a matching error is dispatched.
///
/// A handler handles by performing a non-local exit (typically
/// [`crate::context::transfer`]); returning normally declines, and dispatch
/// moves on to older entries.
pub type HandlerFn = Arc<dyn Fn(&TaskError) + Send + Sync>;

/// One (class, handler) registration.
#[derive(Clone)]
pub struct HandlerEntry {
    class: ErrorClass,
    handler: HandlerFn,
}

impl HandlerEntry {
    /// Register `handler` for errors whose class is `class` or a descendant
    /// of it.
    pub fn new(class: ErrorClass, handler: impl Fn(&TaskError) + Send + Sync + 'static) -> Self {
        Self {
            class,
            handler: Arc::new(handler),
        }
    }

    /// The class this entry matches against.
    pub fn class(&self) -> ErrorClass {
        self.class
    }
}

/// Snapshot of a handler chain, captured on the submitting thread and
/// reinstalled on whichever worker thread runs the task.
#[derive(Clone, Default)]
pub struct HandlerSnapshot(Vec<HandlerEntry>);

impl HandlerSnapshot {
    /// Number of captured entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot captured an empty chain.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

thread_local! {
    static CHAIN: RefCell<Vec<HandlerEntry>> = const { RefCell::new(Vec::new()) };
}

struct ChainGuard {
    prev_len: usize,
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        CHAIN.with(|chain| chain.borrow_mut().truncate(self.prev_len));
    }
}

struct SwapGuard {
    saved: Option<Vec<HandlerEntry>>,
}

impl Drop for SwapGuard {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            CHAIN.with(|chain| *chain.borrow_mut() = saved);
        }
    }
}

/// Execute `body` with `entries` appended to the calling thread's handler
/// chain. The previous chain is restored on every exit path, including an
/// unwinding transfer.
pub fn with_handlers<R>(entries: Vec<HandlerEntry>, body: impl FnOnce() -> R) -> R {
    let prev_len = CHAIN.with(|chain| {
        let mut chain = chain.borrow_mut();
        let prev_len = chain.len();
        chain.extend(entries);
        prev_len
    });
    let _guard = ChainGuard { prev_len };
    body()
}

/// Capture the calling thread's chain so it can be reinstalled elsewhere.
pub fn capture() -> HandlerSnapshot {
    CHAIN.with(|chain| HandlerSnapshot(chain.borrow().clone()))
}

/// Execute `body` with the chain replaced by `snapshot`, restoring the
/// thread's own chain afterwards. This is the worker-side half of carrying
/// handlers across the thread boundary.
pub fn with_snapshot<R>(snapshot: &HandlerSnapshot, body: impl FnOnce() -> R) -> R {
    let saved = CHAIN.with(|chain| mem::replace(&mut *chain.borrow_mut(), snapshot.0.clone()));
    let _guard = SwapGuard { saved: Some(saved) };
    body()
}

/// Walk the current chain, newest entry first, offering `error` to every
/// entry whose class is a superclass of the error's class.
///
/// Each handler runs with only the older part of the chain installed, so an
/// error raised inside a handler (or an explicit re-dispatch) reaches older
/// entries and can never re-trigger the handler itself. If every handler
/// declines, dispatch returns and the error continues down the ordinary
/// failure path.
pub fn dispatch(error: &TaskError) {
    let entries = CHAIN.with(|chain| chain.borrow().clone());
    for index in (0..entries.len()).rev() {
        let entry = &entries[index];
        if !error.class().is_a(entry.class) {
            continue;
        }
        let saved = CHAIN.with(|chain| {
            mem::replace(&mut *chain.borrow_mut(), entries[..index].to_vec())
        });
        let _restore = SwapGuard { saved: Some(saved) };
        (entry.handler)(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KernelError;
    use parking_lot::Mutex;

    fn record(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> HandlerFn {
        let log = log.clone();
        Arc::new(move |_error: &TaskError| log.lock().push(tag))
    }

    #[test]
    fn test_chain_is_scoped() {
        assert!(capture().is_empty());
        with_handlers(
            vec![HandlerEntry::new(ErrorClass::Any, |_| {})],
            || {
                assert_eq!(capture().len(), 1);
                with_handlers(vec![HandlerEntry::new(ErrorClass::App, |_| {})], || {
                    assert_eq!(capture().len(), 2);
                });
                assert_eq!(capture().len(), 1);
            },
        );
        assert!(capture().is_empty());
    }

    #[test]
    fn test_newest_matching_handler_runs_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let outer = HandlerEntry {
            class: ErrorClass::Kernel,
            handler: record(&log, "outer"),
        };
        let inner = HandlerEntry {
            class: ErrorClass::TaskKilled,
            handler: record(&log, "inner"),
        };

        with_handlers(vec![outer], || {
            with_handlers(vec![inner], || {
                dispatch(&TaskError::from_kernel(KernelError::TaskKilled));
            });
        });

        // The inner (subtype) handler declines by returning, so the outer
        // (supertype) handler still runs after it.
        assert_eq!(*log.lock(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_non_matching_entries_are_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let entry = HandlerEntry {
            class: ErrorClass::TaskKilled,
            handler: record(&log, "killed"),
        };

        with_handlers(vec![entry], || {
            dispatch(&TaskError::from_kernel(KernelError::NoKernel));
        });

        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_handler_cannot_retrigger_itself() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let redispatching = HandlerEntry::new(ErrorClass::Any, move |error: &TaskError| {
            log_clone.lock().push("entered");
            // The entry itself is not current while it runs, so this
            // reaches only older handlers and terminates.
            dispatch(error);
        });

        with_handlers(vec![redispatching], || {
            dispatch(&TaskError::from_kernel(KernelError::NoKernel));
        });

        assert_eq!(*log.lock(), vec!["entered"]);
    }

    #[test]
    fn test_redispatch_reaches_older_handlers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let older = HandlerEntry {
            class: ErrorClass::Kernel,
            handler: record(&log, "older"),
        };
        let log_clone = log.clone();
        let newer = HandlerEntry::new(ErrorClass::TaskKilled, move |error: &TaskError| {
            log_clone.lock().push("newer");
            dispatch(error);
        });

        with_handlers(vec![older], || {
            with_handlers(vec![newer], || {
                dispatch(&TaskError::from_kernel(KernelError::TaskKilled));
            });
        });

        // "older" appears twice: once via the explicit re-dispatch, once
        // because the newer handler declined by returning.
        assert_eq!(*log.lock(), vec!["newer", "older", "older"]);
    }

    #[test]
    fn test_snapshot_reinstalls_on_other_thread() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let entry = HandlerEntry {
            class: ErrorClass::App,
            handler: record(&log, "handled"),
        };

        let snapshot = with_handlers(vec![entry], capture);
        assert_eq!(snapshot.len(), 1);

        let handle = std::thread::spawn(move || {
            with_snapshot(&snapshot, || {
                dispatch(&TaskError::app(KernelError::TaskPanic("x".into())));
            })
        });
        handle.join().unwrap();

        assert_eq!(*log.lock(), vec!["handled"]);
    }
}
