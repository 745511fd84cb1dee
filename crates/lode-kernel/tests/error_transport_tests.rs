//! Integration tests for cross-thread error transport, handler capture, and
//! serialized inspection.

use crossbeam::channel;
use lode_kernel::{
    check_kill, install_and_run, install_and_run_in, transfer, unwrap_result, with_handlers,
    with_hook, DebugHook, ErrorClass, HandlerEntry, KernelError, KillSwitch, Task, TaskContext,
    TaskError, TaskOutcome,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Error)]
#[error("worker failure {0}")]
struct WorkerFailure(u32);

#[test]
fn test_value_crosses_thread_boundary() {
    let (tx, rx) = channel::bounded(1);
    thread::spawn(move || {
        let outcome = install_and_run(|| Ok(123u32));
        tx.send(outcome).unwrap();
    })
    .join()
    .unwrap();

    let outcome = rx.recv().unwrap();
    assert_eq!(unwrap_result(outcome).unwrap(), 123);
}

#[test]
fn test_failure_crosses_thread_boundary() {
    let (tx, rx) = channel::bounded(1);
    thread::spawn(move || {
        let outcome: TaskOutcome<u32> = install_and_run(|| Err(TaskError::app(WorkerFailure(7))));
        tx.send(outcome).unwrap();
    })
    .join()
    .unwrap();

    // The error re-raises here, on the consumer thread, with its kind and
    // payload intact.
    let outcome = rx.recv().unwrap();
    let error = unwrap_result(outcome).unwrap_err();
    assert_eq!(error.class(), ErrorClass::App);
    assert_eq!(error.downcast_ref::<WorkerFailure>(), Some(&WorkerFailure(7)));
}

#[test]
fn test_kill_crosses_thread_boundary() {
    let kill = KillSwitch::new();
    kill.kill();

    let (tx, rx) = channel::bounded(1);
    let handle = kill.clone();
    thread::spawn(move || {
        let ctx = TaskContext::with_kill_switch(handle);
        let outcome: TaskOutcome<u32> = install_and_run_in(ctx, || {
            check_kill();
            Ok(5)
        });
        tx.send(outcome).unwrap();
    })
    .join()
    .unwrap();

    let outcome = rx.recv().unwrap();
    assert!(matches!(outcome, TaskOutcome::Killed));
    let error = unwrap_result(outcome).unwrap_err();
    assert_eq!(error.kernel(), Some(&KernelError::TaskKilled));
}

#[test]
fn test_inspection_sessions_never_overlap() {
    let active = Arc::new(AtomicUsize::new(0));
    let overlapped = Arc::new(AtomicBool::new(false));
    let sessions = Arc::new(AtomicUsize::new(0));

    let probe: DebugHook = {
        let active = active.clone();
        let overlapped = overlapped.clone();
        let sessions = sessions.clone();
        Arc::new(move |_error: &TaskError| {
            if active.fetch_add(1, Ordering::SeqCst) > 0 {
                overlapped.store(true, Ordering::SeqCst);
            }
            // Hold the session open long enough for the other thread to
            // collide if serialization were broken.
            thread::sleep(Duration::from_millis(100));
            active.fetch_sub(1, Ordering::SeqCst);
            sessions.fetch_add(1, Ordering::SeqCst);
        })
    };

    let mut workers = Vec::new();
    for index in 0..2u32 {
        let probe = probe.clone();
        workers.push(thread::spawn(move || {
            with_hook(probe, || {
                let _outcome: TaskOutcome<()> =
                    install_and_run(|| Err(TaskError::app(WorkerFailure(index))));
            });
        }));
    }
    for handle in workers {
        handle.join().unwrap();
    }

    assert_eq!(sessions.load(Ordering::SeqCst), 2);
    assert!(!overlapped.load(Ordering::SeqCst));
}

#[test]
fn test_handlers_survive_worker_boundary() {
    let (tx, rx) = channel::bounded(1);
    let entries = vec![HandlerEntry::new(ErrorClass::App, |_error: &TaskError| {
        transfer(Some(TaskError::from_kernel(KernelError::TaskPanic(
            "intercepted".to_string(),
        ))));
    })];

    // The handler is installed on this thread; the task captures the chain
    // at creation time.
    let task = with_handlers(entries, || {
        let tx = tx.clone();
        Task::new(move || {
            let outcome: TaskOutcome<u32> =
                install_and_run(|| Err(TaskError::app(WorkerFailure(3))));
            tx.send(outcome).unwrap();
        })
    });

    // The worker thread has no handlers of its own.
    thread::spawn(move || task.run()).join().unwrap();

    let outcome = rx.recv().unwrap();
    let error = unwrap_result(outcome).unwrap_err();
    assert_eq!(
        error.kernel(),
        Some(&KernelError::TaskPanic("intercepted".to_string()))
    );
}
