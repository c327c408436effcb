//! Waiting on many tasks at once

use std::collections::VecDeque;
use std::mem;

use super::coroutine::{Coroutine, Poll, Resume};
use super::error::{Error, Result};
use super::future::Wait;
use super::task::Task;

/// Coroutine returned by [`gather`]
pub struct Gather<T> {
    pending: VecDeque<Task<T>>,
    current: Option<Wait<T>>,
    results: Vec<T>,
    finished: bool,
}

/// Waits for every task and collects their results in order
///
/// The tasks are already scheduled, so they make progress concurrently;
/// gathering only decides the order the results are read in. The first
/// error found is raised and the remaining results are discarded.
pub fn gather<T, I>(tasks: I) -> Gather<T>
where
    T: Clone + 'static,
    I: IntoIterator<Item = Task<T>>,
{
    let pending: VecDeque<_> = tasks.into_iter().collect();
    Gather {
        results: Vec::with_capacity(pending.len()),
        pending,
        current: None,
        finished: false,
    }
}

impl<T: Clone + 'static> Gather<T> {
    fn finish(&mut self, outcome: Result<Vec<T>>) -> Poll<Vec<T>> {
        self.finished = true;
        self.pending.clear();
        self.current = None;
        Poll::Ready(outcome)
    }
}

impl<T: Clone + 'static> Coroutine for Gather<T> {
    type Output = Vec<T>;

    fn resume(&mut self, mut resume: Resume) -> Poll<Vec<T>> {
        if self.finished {
            return Poll::Ready(Err(Error::Exhausted));
        }
        loop {
            let poll = match self.current.as_mut() {
                Some(waiter) => waiter.resume(resume),
                None => match self.pending.pop_front() {
                    Some(task) => {
                        let mut waiter = task.wait();
                        let poll = waiter.resume(resume);
                        self.current = Some(waiter);
                        poll
                    }
                    None => {
                        let results = mem::take(&mut self.results);
                        return self.finish(Ok(results));
                    }
                },
            };

            match poll {
                Poll::Ready(Ok(value)) => {
                    self.results.push(value);
                    self.current = None;
                    resume = Resume::Next;
                }
                Poll::Ready(Err(err)) => return self.finish(Err(err)),
                Poll::Yield => return Poll::Yield,
                Poll::Await(awaitable) => return Poll::Await(awaitable),
            }
        }
    }
}
