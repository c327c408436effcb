//! Single-assignment result cells
//!
//! A [`Future`] is completed exactly once, with a value or an error, by
//! whoever owns the underlying operation. Coroutines suspend on it through
//! [`Future::wait`] and are resumed once it completes.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use super::coroutine::{Awaitable, Coroutine, Poll, Resume};
use super::error::{Error, Result};

type Callback<T> = Box<dyn FnOnce(&Future<T>)>;

struct State<T> {
    outcome: Option<Result<T>>,
    callbacks: Vec<Callback<T>>,
}

/// The eventual outcome of an operation
///
/// `Future` is a handle: clones share the same cell. It is single-threaded
/// and is only ever touched from the thread driving the event loop.
pub struct Future<T> {
    state: Rc<RefCell<State<T>>>,
}

impl<T> Future<T> {
    /// Creates a pending future
    pub fn new() -> Self {
        Future {
            state: Rc::new(RefCell::new(State {
                outcome: None,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Returns true once the future has completed, with a value or an error
    #[inline]
    pub fn done(&self) -> bool {
        self.state.borrow().outcome.is_some()
    }

    /// Returns the stored error if the future completed with one
    pub fn exception(&self) -> Option<Error> {
        match &self.state.borrow().outcome {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    /// Completes the future with `value`
    ///
    /// Registered callbacks run synchronously, in registration order,
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyCompleted`] if the future is already done.
    /// The stored outcome is left untouched.
    pub fn set_result(&self, value: T) -> Result<()> {
        self.complete(Ok(value))
    }

    /// Completes the future with an error
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyCompleted`] if the future is already done.
    pub fn set_exception(&self, err: Error) -> Result<()> {
        self.complete(Err(err))
    }

    /// Registers `callback` to be called with the future once it completes
    ///
    /// If the future is already done the callback runs immediately, before
    /// this returns.
    pub fn add_done_callback<F>(&self, callback: F)
    where
        F: FnOnce(&Future<T>) + 'static,
    {
        {
            let mut state = self.state.borrow_mut();
            if state.outcome.is_none() {
                state.callbacks.push(Box::new(callback));
                return;
            }
        }
        callback(self);
    }

    /// Returns true if both handles refer to the same cell
    pub fn ptr_eq(&self, other: &Future<T>) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    fn complete(&self, outcome: Result<T>) -> Result<()> {
        let callbacks = {
            let mut state = self.state.borrow_mut();
            if state.outcome.is_some() {
                return Err(Error::AlreadyCompleted);
            }
            state.outcome = Some(outcome);
            mem::take(&mut state.callbacks)
        };
        // No borrow is held here, so callbacks may read the future or
        // register more callbacks on it.
        for callback in callbacks {
            callback(self);
        }
        Ok(())
    }
}

impl<T: Clone> Future<T> {
    /// Returns the stored value, or the stored error
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] if the future has not completed, and a
    /// clone of the stored error if it completed with one.
    pub fn result(&self) -> Result<T> {
        match &self.state.borrow().outcome {
            None => Err(Error::NotReady),
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(err)) => Err(err.clone()),
        }
    }
}

impl<T: Clone + 'static> Future<T> {
    /// Returns a coroutine that waits for this future
    ///
    /// The coroutine finishes at once if the future is already done.
    /// Otherwise it suspends on the future a single time and finishes with
    /// the value it is resumed with, or the error thrown into it.
    pub fn wait(&self) -> Wait<T> {
        Wait {
            future: self.clone(),
            suspended: false,
            finished: false,
        }
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> Default for Future<T> {
    fn default() -> Self {
        Future::new()
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        let status = match &state.outcome {
            None => "pending",
            Some(Ok(_)) => "finished",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("Future")
            .field("status", &status)
            .field("callbacks", &state.callbacks.len())
            .finish()
    }
}

impl<T: Clone + 'static> Awaitable for Future<T> {
    fn is_done(&self) -> bool {
        self.done()
    }

    fn subscribe(&self, wake: Box<dyn FnOnce(Resume)>) {
        self.add_done_callback(move |future| {
            let resume = match future.result() {
                Ok(value) => Resume::value(value),
                Err(err) => Resume::Throw(err),
            };
            wake(resume);
        });
    }
}

/// Coroutine returned by [`Future::wait`]
pub struct Wait<T> {
    future: Future<T>,
    suspended: bool,
    finished: bool,
}

impl<T: Clone + 'static> Coroutine for Wait<T> {
    type Output = T;

    fn resume(&mut self, resume: Resume) -> Poll<T> {
        if self.finished {
            return Poll::Ready(Err(Error::Exhausted));
        }
        if let Resume::Throw(err) = resume {
            self.finished = true;
            return Poll::Ready(Err(err));
        }
        if !self.suspended && !self.future.done() {
            self.suspended = true;
            return Poll::Await(Box::new(self.future.clone()));
        }

        self.finished = true;
        match resume {
            Resume::Value(_) => Poll::Ready(resume.into_value()),
            _ => Poll::Ready(self.future.result()),
        }
    }
}
