//! # spindle
//!
//! spindle is a single-threaded cooperative scheduler. Coroutines are
//! explicit state machines that suspend by returning a [`Poll`]; an
//! [`EventLoop`] steps them in FIFO order and bridges their suspension
//! points to [`Future`] completion.
//!
//! ## Key Features
//!
//! - **Explicit coroutines**: no compiler-generated state machines; a step
//!   returns `Yield`, `Await(future)` or `Ready(outcome)`
//! - **Single-assignment futures**: completing twice is an error, never an
//!   overwrite
//! - **Errors as data**: a failing coroutine's error is stored on its task
//!   and raised wherever the task is awaited or read
//! - **Scoped running loop**: `create_task` finds the running loop without
//!   it being passed around, and the slot is cleared on every exit path
//!
//! ## Basic Usage
//!
//! ```rust
//! use spindle::{run, sleep, Coroutine};
//!
//! let answer = run(sleep(3).map(|_| "OK")).unwrap();
//! assert_eq!(answer, "OK");
//! ```
//!
//! ## Fan-out
//!
//! ```rust
//! use spindle::{create_task, gather, ready, run, sleep, Coroutine};
//!
//! let replies = run(ready(()).then(|_| {
//!     let tasks: Vec<_> = (0..100)
//!         .map(|_| create_task(sleep(2).map(|_| "OK")))
//!         .collect();
//!     gather(tasks)
//! }))
//! .unwrap();
//! assert_eq!(replies, vec!["OK"; 100]);
//! ```

pub mod runtime;

pub use runtime::{
    create_task, fail, from_fn, gather, get_event_loop, get_running_loop, new_event_loop, ready,
    run, run_with_config, sleep, Awaitable, BoxCoroutine, Coroutine, Error, EventLoop, Future,
    LoopConfig, LoopStats, Poll, Resume, Result, StallPolicy, Task, TaskId,
};
