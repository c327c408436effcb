//! Tasks: coroutines under scheduler control
//!
//! A [`Task`] owns one coroutine and the [`Future`] that receives its
//! outcome. The event loop only sees the type-erased `Schedule` side of
//! a task, so tasks with different output types share one ready queue.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use super::coroutine::{Awaitable, BoxCoroutine, Coroutine, Poll, Resume};
use super::event_loop::{EventLoop, LoopInner};
use super::future::Future;

/// A unique identifier for a task within its event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    /// Gets the raw ID value
    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// The loop-facing side of a task
pub(crate) trait Schedule {
    fn id(&self) -> TaskId;

    /// Plain resumption from the ready queue
    ///
    /// Uses the resume value stashed by the future that woke the task, if
    /// there is one.
    fn run(self: Rc<Self>);

    /// Returns true once the coroutine has finished or been released
    fn is_finished(&self) -> bool;

    /// Drops the coroutine so the task never runs again
    ///
    /// Returns false if there was nothing to release, or if the task is
    /// running right now.
    fn release(&self) -> bool;
}

/// Entry in the ready queue
pub(crate) type TaskRef = Rc<dyn Schedule>;

struct TaskCore<T> {
    id: TaskId,
    /// `None` once the coroutine has finished
    coroutine: RefCell<Option<BoxCoroutine<T>>>,
    future: Future<T>,
    wakeup: Cell<Option<Resume>>,
    event_loop: Weak<LoopInner>,
}

impl<T: 'static> TaskCore<T> {
    fn step(self: &Rc<Self>, resume: Resume) {
        let Ok(mut slot) = self.coroutine.try_borrow_mut() else {
            tracing::warn!(task.id = %self.id, "task stepped while already running");
            return;
        };
        let Some(coroutine) = slot.as_mut() else {
            tracing::trace!(task.id = %self.id, "task already finished, ignoring step");
            return;
        };

        tracing::trace!(task.id = %self.id, ?resume, "Task::step");
        match coroutine.resume(resume) {
            Poll::Yield => {
                drop(slot);
                self.reschedule();
            }
            Poll::Await(awaitable) => {
                drop(slot);
                tracing::trace!(
                    task.id = %self.id,
                    awaited.done = awaitable.is_done(),
                    "task blocked",
                );
                let this = Rc::clone(self);
                awaitable.subscribe(Box::new(move |resume| this.wake(resume)));
            }
            Poll::Ready(outcome) => {
                *slot = None;
                drop(slot);
                tracing::trace!(task.id = %self.id, ok = outcome.is_ok(), "task finished");
                let completed = match outcome {
                    Ok(value) => self.future.set_result(value),
                    Err(err) => self.future.set_exception(err),
                };
                if let Err(err) = completed {
                    tracing::warn!(task.id = %self.id, %err, "task future completed elsewhere");
                }
            }
        }
    }

    /// Called by the awaited future; re-enqueues rather than stepping in place
    fn wake(self: &Rc<Self>, resume: Resume) {
        tracing::trace!(task.id = %self.id, "task woken");
        self.wakeup.set(Some(resume));
        self.reschedule();
    }

    fn reschedule(self: &Rc<Self>) {
        match self.event_loop.upgrade() {
            Some(event_loop) => event_loop.push(Rc::clone(self) as TaskRef),
            None => {
                tracing::warn!(task.id = %self.id, "event loop dropped, task will not run again")
            }
        }
    }
}

impl<T: 'static> Schedule for TaskCore<T> {
    fn id(&self) -> TaskId {
        self.id
    }

    fn run(self: Rc<Self>) {
        let resume = self.wakeup.take().unwrap_or(Resume::Next);
        self.step(resume);
    }

    fn is_finished(&self) -> bool {
        self.coroutine
            .try_borrow()
            .map_or(false, |coroutine| coroutine.is_none())
    }

    fn release(&self) -> bool {
        let coroutine = match self.coroutine.try_borrow_mut() {
            Ok(mut slot) => slot.take(),
            Err(_) => return false,
        };
        self.wakeup.take();
        // dropped here, outside the borrow
        match coroutine {
            Some(coroutine) => {
                tracing::trace!(task.id = %self.id, "task released");
                drop(coroutine);
                true
            }
            None => false,
        }
    }
}

/// A coroutine driven by an event loop
///
/// A task is also the future of its coroutine's outcome: it dereferences
/// to [`Future`], so `done`, `result` and `wait` work on it directly.
pub struct Task<T> {
    core: Rc<TaskCore<T>>,
}

impl<T: 'static> Task<T> {
    /// Wraps `coroutine` in a task and puts it on `event_loop`'s ready queue
    pub fn new<C>(coroutine: C, event_loop: &EventLoop) -> Self
    where
        C: Coroutine<Output = T> + 'static,
    {
        let task = Task {
            core: Rc::new(TaskCore {
                id: event_loop.inner().next_task_id(),
                coroutine: RefCell::new(Some(coroutine.boxed())),
                future: Future::new(),
                wakeup: Cell::new(None),
                event_loop: Rc::downgrade(event_loop.inner()),
            }),
        };
        let tracked: Weak<dyn Schedule> = Rc::downgrade(&task.core) as Weak<TaskCore<T>>;
        event_loop.inner().track(tracked);
        event_loop.put(&task);
        task
    }

    /// Returns this task's unique identifier
    #[inline]
    pub fn id(&self) -> TaskId {
        self.core.id
    }

    /// Resumes the coroutine with `resume`
    ///
    /// Errors raised by the coroutine are stored on the task, never
    /// returned from here. Stepping a finished task does nothing.
    pub fn step(&self, resume: Resume) {
        self.core.step(resume);
    }

    /// Returns the task as the future of its outcome
    pub fn future(&self) -> &Future<T> {
        &self.core.future
    }

    pub(crate) fn as_task_ref(&self) -> TaskRef {
        Rc::clone(&self.core) as TaskRef
    }
}

impl<T> Deref for Task<T> {
    type Target = Future<T>;

    fn deref(&self) -> &Future<T> {
        &self.core.future
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Task {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.core.id)
            .field("future", &self.core.future)
            .finish()
    }
}

impl<T: Clone + 'static> Awaitable for Task<T> {
    fn is_done(&self) -> bool {
        self.core.future.done()
    }

    fn subscribe(&self, wake: Box<dyn FnOnce(Resume)>) {
        self.core.future.subscribe(wake);
    }
}
