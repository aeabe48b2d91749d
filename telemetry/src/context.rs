use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An execution-scoped value passed down the call chain of a collection.
///
/// A `Context` carries the caller's cancellation state: an explicit
/// [`CancellationHandle`] and an optional deadline. Long running operations,
/// such as a collection sweep that runs user callbacks, check
/// [`Context::is_cancelled`] at safe points and stop without producing partial
/// output.
///
/// Contexts are cheap to clone; clones share the same cancellation state.
///
/// # Examples
///
/// ```
/// use telemetry::Context;
///
/// let (cx, handle) = Context::new().with_cancellation();
/// assert!(!cx.is_cancelled());
/// handle.cancel();
/// assert!(cx.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct Context {
    cancelled: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled.
    pub fn new() -> Self {
        Context::default()
    }

    /// Returns a copy of this context that is cancelled through the returned
    /// handle, in addition to any existing cancellation.
    pub fn with_cancellation(&self) -> (Self, CancellationHandle) {
        let flag = Arc::new(AtomicBool::new(self.is_cancelled()));
        let cx = Context {
            cancelled: Some(flag.clone()),
            deadline: self.deadline,
        };
        (cx, CancellationHandle(flag))
    }

    /// Returns a copy of this context that is cancelled once `timeout` elapses.
    ///
    /// An earlier existing deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, deadline) {
            (Some(current), Some(new)) => Some(current.min(new)),
            (current, new) => current.or(new),
        };
        Context {
            cancelled: self.cancelled.clone(),
            deadline,
        }
    }

    /// The deadline of this context, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the caller asked for the current operation to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Cancels the [`Context`] it was created with, and every clone of it.
#[derive(Clone, Debug)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }
}
