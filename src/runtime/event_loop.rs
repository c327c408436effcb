//! The event loop: a FIFO ready queue and the driver that drains it
//!
//! The loop is single-threaded and cooperative. Exactly one task runs at a
//! time, and a task only gives up control at a suspension point.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::thread;
use std::time::Duration;

use crossbeam_deque::Worker;

use super::config::{LoopConfig, StallPolicy};
use super::context::RunningLoop;
use super::coroutine::Coroutine;
use super::error::{Error, Result};
use super::task::{Schedule, Task, TaskId, TaskRef};

/// Smallest registry length worth pruning
const PRUNE_FLOOR: usize = 64;

/// State shared between an [`EventLoop`] handle and its tasks
///
/// Tasks hold it weakly, so dropping every loop handle releases the queue.
pub(crate) struct LoopInner {
    /// Tasks that can run now, in FIFO order
    ready: Worker<TaskRef>,

    /// Every task created on the loop that may not have finished yet
    ///
    /// Blocked tasks are only reachable from the futures they wait on, so
    /// `close` finds them here.
    tracked: RefCell<Vec<Weak<dyn Schedule>>>,

    /// Registry length that triggers the next prune
    prune_at: Cell<usize>,

    config: LoopConfig,

    /// Counter for generating task IDs
    next_task_id: Cell<u64>,

    /// Number of task steps taken
    steps: Cell<u64>,

    /// Number of scheduling rounds started
    rounds: Cell<u64>,
}

impl LoopInner {
    pub(crate) fn push(&self, task: TaskRef) {
        tracing::trace!(
            loop_name = %self.config.name,
            task.id = %task.id(),
            queued = self.ready.len(),
            "EventLoop::put",
        );
        self.ready.push(task);
    }

    pub(crate) fn track(&self, task: Weak<dyn Schedule>) {
        if self.tracked.borrow().len() >= self.prune_at.get() {
            self.prune();
        }
        self.tracked.borrow_mut().push(task);
    }

    /// Forgets tasks that finished or were dropped
    fn prune(&self) {
        let mut tracked = self.tracked.borrow_mut();
        tracked.retain(|task| task.upgrade().map_or(false, |task| !task.is_finished()));
        self.prune_at.set((tracked.len() * 2).max(PRUNE_FLOOR));
    }

    pub(crate) fn next_task_id(&self) -> TaskId {
        let id = self.next_task_id.get();
        self.next_task_id.set(id + 1);
        TaskId(id)
    }

    fn bump(counter: &Cell<u64>) {
        counter.set(counter.get() + 1);
    }
}

/// A snapshot of an event loop's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Tasks currently on the ready queue
    pub queued: usize,

    /// Task steps taken so far
    pub steps: u64,

    /// Scheduling rounds started so far
    ///
    /// A round ends once every task that was ready when it began has been
    /// stepped once.
    pub rounds: u64,

    /// Tasks created on this loop
    pub tasks_spawned: u64,
}

/// A single-threaded cooperative scheduler
///
/// `EventLoop` is a handle; clones drive the same queue.
///
/// # Example
///
/// ```
/// use spindle::{sleep, Coroutine, EventLoop};
///
/// let event_loop = EventLoop::new();
/// let answer = event_loop
///     .run_until_complete(sleep(2).map(|_| 42))
///     .unwrap();
/// assert_eq!(answer, 42);
/// assert_eq!(event_loop.stats().steps, 3);
/// ```
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<LoopInner>,
}

impl EventLoop {
    /// Creates an event loop with the default configuration
    pub fn new() -> Self {
        Self::with_config(LoopConfig::default())
    }

    /// Creates an event loop with the given configuration
    pub fn with_config(config: LoopConfig) -> Self {
        EventLoop {
            inner: Rc::new(LoopInner {
                ready: Worker::new_fifo(),
                tracked: RefCell::new(Vec::new()),
                prune_at: Cell::new(PRUNE_FLOOR),
                config,
                next_task_id: Cell::new(1),
                steps: Cell::new(0),
                rounds: Cell::new(0),
            }),
        }
    }

    /// Returns the loop's configuration
    pub fn config(&self) -> &LoopConfig {
        &self.inner.config
    }

    /// Appends `task` to the back of the ready queue
    pub fn put<T: 'static>(&self, task: &Task<T>) {
        self.inner.push(task.as_task_ref());
    }

    /// Wraps `coroutine` in a task scheduled on this loop
    pub fn create_task<C>(&self, coroutine: C) -> Task<C::Output>
    where
        C: Coroutine + 'static,
        C::Output: 'static,
    {
        Task::new(coroutine, self)
    }

    /// Runs `coroutine` as the root task until it completes
    ///
    /// Ready tasks are stepped in FIFO order. While this runs the loop is
    /// the thread's running loop, so [`create_task`](crate::create_task)
    /// schedules onto it.
    ///
    /// # Errors
    ///
    /// Returns the root task's error if it finished with one,
    /// [`Error::LoopRunning`] if a loop is already running on this thread,
    /// and [`Error::Stalled`] if nothing is left to run while the root task
    /// is pending under [`StallPolicy::Fail`].
    pub fn run_until_complete<C>(&self, coroutine: C) -> Result<C::Output>
    where
        C: Coroutine + 'static,
        C::Output: Clone + 'static,
    {
        let _running = RunningLoop::enter(self)?;
        let root = self.create_task(coroutine);
        tracing::debug!(
            loop_name = %self.inner.config.name,
            root.id = %root.id(),
            "EventLoop::run_until_complete",
        );

        let inner = &self.inner;
        let mut left_in_round = 0usize;
        let mut idle_count = 0u32;

        while !root.done() {
            if left_in_round == 0 && !inner.ready.is_empty() {
                left_in_round = inner.ready.len();
                LoopInner::bump(&inner.rounds);
            }

            match inner.ready.pop() {
                Some(task) => {
                    left_in_round = left_in_round.saturating_sub(1);
                    idle_count = 0;
                    LoopInner::bump(&inner.steps);
                    task.run();
                }
                None => {
                    left_in_round = 0;
                    match inner.config.stall_policy {
                        StallPolicy::Fail => {
                            tracing::warn!(
                                loop_name = %inner.config.name,
                                root.id = %root.id(),
                                "no runnable tasks while root task is pending",
                            );
                            return Err(Error::Stalled);
                        }
                        StallPolicy::Spin => {
                            if idle_count == 0 {
                                tracing::warn!(
                                    loop_name = %inner.config.name,
                                    root.id = %root.id(),
                                    "ready queue empty, spinning",
                                );
                            }
                            idle_count += 1;
                            if idle_count > 1000 {
                                thread::sleep(Duration::from_micros(100));
                                idle_count = 1;
                            } else if idle_count > 100 {
                                thread::yield_now();
                            }
                        }
                    }
                }
            }
        }

        tracing::debug!(
            loop_name = %inner.config.name,
            root.id = %root.id(),
            steps = inner.steps.get(),
            rounds = inner.rounds.get(),
            "root task done",
        );
        root.result()
    }

    /// Drops every task on the ready queue and releases unfinished tasks
    ///
    /// A released task drops its coroutine, along with everything the
    /// coroutine captured, and never runs again. Its future stays pending.
    /// This also frees tasks blocked on futures nobody will complete.
    pub fn close(&self) {
        let mut dropped = 0usize;
        while self.inner.ready.pop().is_some() {
            dropped += 1;
        }
        let tracked = self.inner.tracked.take();
        let released = tracked
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|task| task.release())
            .count();
        self.inner.prune_at.set(PRUNE_FLOOR);
        tracing::debug!(
            loop_name = %self.inner.config.name,
            dropped,
            released,
            "EventLoop::close",
        );
    }

    /// Returns the loop's counters
    pub fn stats(&self) -> LoopStats {
        LoopStats {
            queued: self.inner.ready.len(),
            steps: self.inner.steps.get(),
            rounds: self.inner.rounds.get(),
            tasks_spawned: self.inner.next_task_id.get() - 1,
        }
    }

    /// Returns true if both handles drive the same loop
    pub fn ptr_eq(&self, other: &EventLoop) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn inner(&self) -> &Rc<LoopInner> {
        &self.inner
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        EventLoop::new()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("name", &self.inner.config.name)
            .field("stats", &self.stats())
            .finish()
    }
}
