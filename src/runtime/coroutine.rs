//! The suspend/resume protocol between coroutines and the scheduler
//!
//! A coroutine is an explicit state machine. Each call to
//! [`Coroutine::resume`] runs it up to its next suspension point and
//! reports what happened as a [`Poll`]: it yielded control, it is waiting
//! on an [`Awaitable`], or it finished with a value or an error. The
//! scheduler answers with a [`Resume`] the next time the coroutine runs.

use std::any::{type_name, Any};
use std::fmt;

use super::error::{Error, Result};

/// A type-erased value sent into a coroutine
pub type Value = Box<dyn Any>;

/// A coroutine boxed for dynamic dispatch
pub type BoxCoroutine<T> = Box<dyn Coroutine<Output = T>>;

/// What a coroutine is resumed with
pub enum Resume {
    /// Plain resumption: the first step, or the step after a cooperative yield
    Next,

    /// The result of the future the coroutine was waiting on
    Value(Value),

    /// The error of the future the coroutine was waiting on, injected at the
    /// suspension point
    Throw(Error),
}

impl Resume {
    /// Wraps a value to send into a coroutine
    pub fn value<T: Any>(value: T) -> Self {
        Resume::Value(Box::new(value))
    }

    /// Converts the resume into the value the coroutine was waiting for
    ///
    /// A thrown error comes back as `Err`. A value of another type, or a
    /// plain resumption, is reported as [`Error::UnexpectedValue`].
    pub fn into_value<T: Any>(self) -> Result<T> {
        let unexpected = || Error::UnexpectedValue {
            expected: type_name::<T>(),
        };
        match self {
            Resume::Value(value) => value
                .downcast::<T>()
                .map(|v| *v)
                .map_err(|_| unexpected()),
            Resume::Throw(err) => Err(err),
            Resume::Next => Err(unexpected()),
        }
    }
}

impl fmt::Debug for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resume::Next => f.write_str("Next"),
            Resume::Value(_) => f.write_str("Value(..)"),
            Resume::Throw(err) => f.debug_tuple("Throw").field(err).finish(),
        }
    }
}

/// The outcome of running a coroutine up to its next suspension point
pub enum Poll<T> {
    /// Gave up control; the task goes straight back on the ready queue
    Yield,

    /// Blocked until the awaitable completes
    Await(Box<dyn Awaitable>),

    /// Finished with a value or an error
    Ready(Result<T>),
}

impl<T> Poll<T> {
    /// Returns true if the coroutine finished
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, Poll::Ready(_))
    }

    /// Re-types a suspension; `Ready` is handed back unchanged in `Err`
    fn suspended<U>(self) -> std::result::Result<Poll<U>, Result<T>> {
        match self {
            Poll::Yield => Ok(Poll::Yield),
            Poll::Await(awaitable) => Ok(Poll::Await(awaitable)),
            Poll::Ready(outcome) => Err(outcome),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Poll<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Poll::Yield => f.write_str("Yield"),
            Poll::Await(awaitable) => f
                .debug_struct("Await")
                .field("done", &awaitable.is_done())
                .finish(),
            Poll::Ready(outcome) => f.debug_tuple("Ready").field(outcome).finish(),
        }
    }
}

/// Something a coroutine can suspend on
///
/// This is the scheduler's type-erased view of a future: it only needs to
/// know whether the future is done and how to be told when it is.
pub trait Awaitable {
    /// Returns true once the outcome is available
    fn is_done(&self) -> bool;

    /// Registers `wake` to be called exactly once with the outcome
    ///
    /// If the outcome is already available `wake` is called before
    /// `subscribe` returns.
    fn subscribe(&self, wake: Box<dyn FnOnce(Resume)>);
}

/// A computation that can suspend and be resumed with a value or an error
///
/// Once `resume` has returned [`Poll::Ready`] the coroutine must not be
/// resumed again. The combinators in this module answer such a call with
/// [`Error::Exhausted`].
pub trait Coroutine {
    /// The value the coroutine finishes with
    type Output;

    /// Runs the coroutine up to its next suspension point
    fn resume(&mut self, resume: Resume) -> Poll<Self::Output>;

    /// Boxes the coroutine
    fn boxed(self) -> BoxCoroutine<Self::Output>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }

    /// Runs this coroutine, then delegates to the one built from its output
    ///
    /// Resumes and thrown errors always go to whichever stage is current,
    /// so the pair behaves like a single coroutine.
    fn then<F, C>(self, f: F) -> Then<Self, F, C>
    where
        Self: Sized,
        F: FnOnce(Self::Output) -> C,
        C: Coroutine,
    {
        Then {
            first: Some(self),
            next: Some(f),
            second: None,
        }
    }

    /// Transforms the output of this coroutine
    fn map<F, U>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
        F: FnOnce(Self::Output) -> U,
    {
        Map {
            inner: self,
            f: Some(f),
        }
    }
}

impl<C: Coroutine + ?Sized> Coroutine for Box<C> {
    type Output = C::Output;

    fn resume(&mut self, resume: Resume) -> Poll<Self::Output> {
        (**self).resume(resume)
    }
}

/// Coroutine returned by [`Coroutine::then`]
pub struct Then<A, F, C> {
    first: Option<A>,
    next: Option<F>,
    second: Option<C>,
}

impl<A, F, C> Coroutine for Then<A, F, C>
where
    A: Coroutine,
    F: FnOnce(A::Output) -> C,
    C: Coroutine,
{
    type Output = C::Output;

    fn resume(&mut self, mut resume: Resume) -> Poll<C::Output> {
        if let Some(first) = self.first.as_mut() {
            match first.resume(resume).suspended() {
                Ok(pending) => return pending,
                Err(Err(err)) => {
                    self.first = None;
                    self.next = None;
                    return Poll::Ready(Err(err));
                }
                Err(Ok(value)) => {
                    self.first = None;
                    match self.next.take() {
                        Some(f) => self.second = Some(f(value)),
                        None => return Poll::Ready(Err(Error::Exhausted)),
                    }
                    resume = Resume::Next;
                }
            }
        }

        match self.second.as_mut() {
            Some(second) => {
                let poll = second.resume(resume);
                if poll.is_ready() {
                    self.second = None;
                }
                poll
            }
            None => Poll::Ready(Err(Error::Exhausted)),
        }
    }
}

/// Coroutine returned by [`Coroutine::map`]
pub struct Map<C, F> {
    inner: C,
    f: Option<F>,
}

impl<C, F, U> Coroutine for Map<C, F>
where
    C: Coroutine,
    F: FnOnce(C::Output) -> U,
{
    type Output = U;

    fn resume(&mut self, resume: Resume) -> Poll<U> {
        match self.inner.resume(resume).suspended() {
            Ok(pending) => pending,
            Err(outcome) => match self.f.take() {
                Some(f) => Poll::Ready(outcome.map(f)),
                None => Poll::Ready(Err(Error::Exhausted)),
            },
        }
    }
}

/// Coroutine returned by [`from_fn`]
pub struct FromFn<F>(F);

/// Builds a coroutine from a closure called once per step
///
/// The closure keeps its state in captured variables.
///
/// ```
/// use spindle::{from_fn, run, Poll};
///
/// let mut left = 3;
/// let countdown = from_fn(move |_| {
///     if left == 0 {
///         return Poll::Ready(Ok("liftoff"));
///     }
///     left -= 1;
///     Poll::Yield
/// });
/// assert_eq!(run(countdown).unwrap(), "liftoff");
/// ```
pub fn from_fn<T, F>(f: F) -> FromFn<F>
where
    F: FnMut(Resume) -> Poll<T>,
{
    FromFn(f)
}

impl<T, F> Coroutine for FromFn<F>
where
    F: FnMut(Resume) -> Poll<T>,
{
    type Output = T;

    fn resume(&mut self, resume: Resume) -> Poll<T> {
        (self.0)(resume)
    }
}

/// Coroutine returned by [`ready`]
pub struct Ready<T>(Option<T>);

/// A coroutine that finishes with `value` on its first step
pub fn ready<T>(value: T) -> Ready<T> {
    Ready(Some(value))
}

impl<T> Coroutine for Ready<T> {
    type Output = T;

    fn resume(&mut self, resume: Resume) -> Poll<T> {
        if let Resume::Throw(err) = resume {
            self.0 = None;
            return Poll::Ready(Err(err));
        }
        Poll::Ready(self.0.take().ok_or(Error::Exhausted))
    }
}

/// Coroutine returned by [`fail`]
pub struct Fail<T> {
    err: Option<Error>,
    _output: std::marker::PhantomData<fn() -> T>,
}

/// A coroutine that raises `err` on its first step
pub fn fail<T>(err: Error) -> Fail<T> {
    Fail {
        err: Some(err),
        _output: std::marker::PhantomData,
    }
}

impl<T> Coroutine for Fail<T> {
    type Output = T;

    fn resume(&mut self, resume: Resume) -> Poll<T> {
        match (self.err.take(), resume) {
            (Some(_), Resume::Throw(thrown)) => Poll::Ready(Err(thrown)),
            (Some(err), _) => Poll::Ready(Err(err)),
            (None, _) => Poll::Ready(Err(Error::Exhausted)),
        }
    }
}

/// Coroutine returned by [`sleep`]
#[derive(Debug, Clone)]
pub struct Sleep {
    remaining: usize,
    finished: bool,
}

/// A coroutine that yields `rounds` times and then finishes
///
/// Time is measured in scheduling rounds, so other ready tasks run while
/// this one sleeps.
pub fn sleep(rounds: usize) -> Sleep {
    Sleep {
        remaining: rounds,
        finished: false,
    }
}

impl Coroutine for Sleep {
    type Output = ();

    fn resume(&mut self, resume: Resume) -> Poll<()> {
        if self.finished {
            return Poll::Ready(Err(Error::Exhausted));
        }
        if let Resume::Throw(err) = resume {
            self.finished = true;
            return Poll::Ready(Err(err));
        }
        if self.remaining == 0 {
            self.finished = true;
            return Poll::Ready(Ok(()));
        }
        self.remaining -= 1;
        Poll::Yield
    }
}
