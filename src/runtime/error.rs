//! Error types for the spindle scheduler
//!
//! Errors are data: a coroutine that fails stores its error on its task,
//! and the error only surfaces when someone reads the task's result.

use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by futures, tasks and the event loop
///
/// `Error` is cheap to clone. A stored error can be read any number of
/// times and delivered to every coroutine awaiting the same future.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The result of a future was read before the future completed
    #[error("future is not done yet")]
    NotReady,

    /// A future was completed a second time
    #[error("future is already completed")]
    AlreadyCompleted,

    /// The ready queue is empty while the root task is still pending
    ///
    /// Nothing on this thread is left to complete the futures the
    /// remaining tasks are blocked on.
    #[error("event loop stalled: no runnable tasks while the root task is pending")]
    Stalled,

    /// A coroutine was resumed after it had already finished
    #[error("coroutine resumed after it finished")]
    Exhausted,

    /// A loop was started while another loop is running on this thread
    #[error("an event loop is already running on this thread")]
    LoopRunning,

    /// A coroutine was resumed with a value of a different type than it awaited
    #[error("coroutine resumed with an unexpected value, expected `{expected}`")]
    UnexpectedValue {
        /// Name of the type the coroutine was waiting for
        expected: &'static str,
    },

    /// An error raised by user code inside a coroutine
    #[error("{0}")]
    Raised(Rc<dyn StdError>),
}

impl Error {
    /// Wraps a user error so it can be raised out of a coroutine
    pub fn raise<E>(err: E) -> Self
    where
        E: StdError + 'static,
    {
        Error::Raised(Rc::new(err))
    }

    /// Raises a plain message
    pub fn msg(message: impl Into<String>) -> Self {
        Error::raise(Message(message.into()))
    }

    /// Returns the raised user error as `E`, if that is what it is
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            Error::Raised(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns true if both errors are the same raised error
    ///
    /// Clones of a raised error share one allocation, so this tells whether
    /// an error coming out of the loop is the very one a coroutine raised.
    pub fn same_raised(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::Raised(a), Error::Raised(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Plain-text error behind [`Error::msg`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message(pub String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl StdError for Boom {}

    #[test]
    fn raised_error_keeps_its_type() {
        let err = Error::raise(Boom);
        assert!(err.downcast_ref::<Boom>().is_some());
        assert!(err.downcast_ref::<Message>().is_none());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn clones_share_identity() {
        let err = Error::msg("disk on fire");
        let copy = err.clone();
        assert!(err.same_raised(&copy));
        assert!(!err.same_raised(&Error::msg("disk on fire")));
        assert_eq!(
            copy.downcast_ref::<Message>(),
            Some(&Message("disk on fire".into()))
        );
    }

    #[test]
    fn scheduler_errors_are_not_raised() {
        assert!(Error::NotReady.downcast_ref::<Message>().is_none());
        assert!(!Error::Stalled.same_raised(&Error::Stalled));
    }
}
