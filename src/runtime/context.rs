//! The thread's running loop and the top-level entry points
//!
//! Coroutines launch sub-tasks with [`create_task`] without being handed a
//! loop. The loop they land on is the one currently inside
//! [`EventLoop::run_until_complete`] on this thread. That slot is only set
//! while a run is in progress and is cleared by a guard on every exit
//! path, including unwinding.

use std::cell::RefCell;

use super::config::LoopConfig;
use super::coroutine::Coroutine;
use super::error::{Error, Result};
use super::event_loop::EventLoop;
use super::task::Task;

thread_local! {
    static RUNNING_LOOP: RefCell<Option<EventLoop>> = const { RefCell::new(None) };
}

/// Marks a loop as running on this thread until dropped
pub(crate) struct RunningLoop {
    _private: (),
}

impl RunningLoop {
    pub(crate) fn enter(event_loop: &EventLoop) -> Result<Self> {
        RUNNING_LOOP.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_some() {
                return Err(Error::LoopRunning);
            }
            *slot = Some(event_loop.clone());
            Ok(RunningLoop { _private: () })
        })
    }
}

impl Drop for RunningLoop {
    fn drop(&mut self) {
        // The slot may already be gone if the thread is shutting down.
        let _ = RUNNING_LOOP.try_with(|slot| slot.borrow_mut().take());
    }
}

/// Closes a loop when dropped
struct CloseOnExit<'a>(&'a EventLoop);

impl Drop for CloseOnExit<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Creates a new event loop with the default configuration
pub fn new_event_loop() -> EventLoop {
    EventLoop::new()
}

/// Returns the loop running on this thread, if any
pub fn get_running_loop() -> Option<EventLoop> {
    RUNNING_LOOP.with(|slot| slot.borrow().clone())
}

/// Returns the running loop, or a new one if none is running
///
/// A new loop is not registered anywhere. Tasks created on it only run if
/// the caller keeps the loop and runs it.
pub fn get_event_loop() -> EventLoop {
    get_running_loop().unwrap_or_else(new_event_loop)
}

/// Schedules `coroutine` as a new task on the running loop
///
/// The task starts on the loop's next scheduling round; the caller keeps
/// running. Outside of a run the task lands on a fresh loop (see
/// [`get_event_loop`]) that nothing drives.
pub fn create_task<C>(coroutine: C) -> Task<C::Output>
where
    C: Coroutine + 'static,
    C::Output: 'static,
{
    get_event_loop().create_task(coroutine)
}

/// Runs `coroutine` to completion on a fresh event loop
///
/// The loop is the thread's running loop for the duration of the call and
/// is closed afterwards, whether the coroutine succeeded, failed or
/// panicked.
///
/// # Errors
///
/// Returns the error raised by the coroutine, or by a sub-task whose error
/// it let through. Also returns [`Error::LoopRunning`] when called from
/// inside a running loop and [`Error::Stalled`] when every remaining task
/// waits on a future nobody completes.
///
/// # Example
///
/// ```
/// use spindle::{create_task, gather, ready, run, sleep, Coroutine};
///
/// let doubled = run(ready(()).then(|_| {
///     let tasks: Vec<_> = (1..=3)
///         .map(|n| create_task(sleep(1).map(move |_| n * 2)))
///         .collect();
///     gather(tasks)
/// }))
/// .unwrap();
/// assert_eq!(doubled, vec![2, 4, 6]);
/// ```
pub fn run<C>(coroutine: C) -> Result<C::Output>
where
    C: Coroutine + 'static,
    C::Output: Clone + 'static,
{
    run_with_config(LoopConfig::default(), coroutine)
}

/// Runs `coroutine` to completion on a fresh loop built from `config`
///
/// # Errors
///
/// Same as [`run`].
pub fn run_with_config<C>(config: LoopConfig, coroutine: C) -> Result<C::Output>
where
    C: Coroutine + 'static,
    C::Output: Clone + 'static,
{
    if get_running_loop().is_some() {
        return Err(Error::LoopRunning);
    }
    let event_loop = EventLoop::with_config(config);
    let _close = CloseOnExit(&event_loop);
    event_loop.run_until_complete(coroutine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::coroutine::{from_fn, ready, Poll};

    #[test]
    fn no_loop_outside_run() {
        assert!(get_running_loop().is_none());
        let a = get_event_loop();
        let b = get_event_loop();
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn running_loop_visible_inside_run() {
        let seen = run(from_fn(|_| {
            Poll::Ready(Ok(get_running_loop().is_some()))
        }))
        .unwrap();
        assert!(seen);
        assert!(get_running_loop().is_none());
    }

    #[test]
    fn slot_cleared_after_error() {
        let err = run(from_fn(|_| Poll::<()>::Ready(Err(Error::msg("fail"))))).unwrap_err();
        assert_eq!(err.to_string(), "fail");
        assert!(get_running_loop().is_none());
    }

    #[test]
    fn nested_run_is_refused() {
        let nested = run(from_fn(|_| {
            let refused = matches!(run(ready(1)), Err(Error::LoopRunning));
            Poll::Ready(Ok(refused))
        }))
        .unwrap();
        assert!(nested);
    }

    #[test]
    fn create_task_uses_running_loop() {
        let same = run(from_fn(|_| {
            let task = create_task(ready(()));
            let event_loop = get_running_loop();
            let spawned = event_loop.map(|l| l.stats().tasks_spawned);
            Poll::Ready(Ok(spawned == Some(2) && !task.done()))
        }))
        .unwrap();
        assert!(same);
    }

    #[test]
    fn entering_twice_fails() {
        let event_loop = EventLoop::new();
        let guard = RunningLoop::enter(&event_loop).unwrap();
        assert!(matches!(RunningLoop::enter(&event_loop), Err(Error::LoopRunning)));
        drop(guard);
        assert!(RunningLoop::enter(&event_loop).is_ok());
        assert!(get_running_loop().is_none());
    }
}
