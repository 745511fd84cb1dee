//! Error taxonomy for the execution core.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Position of an error in the handler-dispatch hierarchy.
///
/// Client handlers register against a class and match any error whose class
/// is the same or a descendant. Rust has no runtime subtyping, so the
/// hierarchy is an explicit table walked from class to parent class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Root of the hierarchy; matches every error.
    Any,

    /// Errors raised by the kernel itself.
    Kernel,

    /// A task was stopped by cooperative cancellation.
    TaskKilled,

    /// An operation that needs a running kernel found none.
    NoKernel,

    /// A task body panicked and the payload was captured.
    Panic,

    /// Application-defined errors carried through the kernel.
    App,
}

impl ErrorClass {
    /// Parent class in the hierarchy, or `None` for the root.
    pub fn parent(self) -> Option<ErrorClass> {
        match self {
            ErrorClass::Any => None,
            ErrorClass::Kernel | ErrorClass::Panic | ErrorClass::App => Some(ErrorClass::Any),
            ErrorClass::TaskKilled | ErrorClass::NoKernel => Some(ErrorClass::Kernel),
        }
    }

    /// Whether `self` is `ancestor` or one of its descendants.
    pub fn is_a(self, ancestor: ErrorClass) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == ancestor {
                return true;
            }
            current = class.parent();
        }
        false
    }
}

/// Errors raised by the kernel itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    /// The task observed a kill signal and stopped cooperatively.
    #[error("task was killed before it completed")]
    TaskKilled,

    /// An operation that needs a running kernel found none.
    #[error("no kernel is running; initialize one before submitting work")]
    NoKernel,

    /// A task body panicked; the payload is preserved as a message.
    #[error("task panicked: {0}")]
    TaskPanic(String),
}

impl KernelError {
    /// Dispatch class for this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            KernelError::TaskKilled => ErrorClass::TaskKilled,
            KernelError::NoKernel => ErrorClass::NoKernel,
            KernelError::TaskPanic(_) => ErrorClass::Panic,
        }
    }
}

/// An error object as it travels through the kernel: the underlying error
/// plus the class used for handler dispatch.
///
/// The source is reference-counted so the same object can sit in the
/// debugger's inspection slot while it propagates, and so it can cross the
/// worker/consumer thread boundary without copying the payload.
#[derive(Debug, Clone)]
pub struct TaskError {
    class: ErrorClass,
    source: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl TaskError {
    /// Wrap an error under an explicit dispatch class.
    pub fn new(class: ErrorClass, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            class,
            source: Arc::new(source),
        }
    }

    /// Wrap an application error under the `App` class.
    pub fn app(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(ErrorClass::App, source)
    }

    /// Wrap a kernel error; the class is derived from the variant.
    pub fn from_kernel(error: KernelError) -> Self {
        let class = error.class();
        Self {
            class,
            source: Arc::new(error),
        }
    }

    /// Dispatch class of the underlying error.
    pub fn class(&self) -> ErrorClass {
        self.class
    }

    /// The underlying kernel error, if this wraps one.
    pub fn kernel(&self) -> Option<&KernelError> {
        self.source.downcast_ref()
    }

    /// Downcast the underlying error to a concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref()
    }
}

impl From<KernelError> for TaskError {
    fn from(error: KernelError) -> Self {
        Self::from_kernel(error)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let source: &(dyn std::error::Error + 'static) = &*self.source;
        Some(source)
    }
}
