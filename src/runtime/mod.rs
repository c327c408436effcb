//! spindle runtime core
//!
//! This module provides the pieces of the cooperative scheduler, leaves
//! first.
//!
//! ## Key Components
//!
//! - `Coroutine`: the explicit suspend/resume protocol
//! - `Future`: a single-assignment result cell with completion callbacks
//! - `Task`: a coroutine driven by a loop, and the future of its outcome
//! - `EventLoop`: the FIFO ready queue and its driver
//!
//! ## Module Structure
//!
//! - `error`: error types
//! - `coroutine`: the coroutine trait, resume values and combinators
//! - `future`: futures and the coroutine that waits on one
//! - `task`: task representation and stepping
//! - `event_loop`: the scheduler
//! - `config`: loop settings
//! - `context`: the thread's running loop and the `run` entry points
//! - `gather`: waiting on many tasks

mod config;
mod context;
mod coroutine;
mod error;
mod event_loop;
mod future;
mod gather;
mod task;

pub use self::config::{LoopConfig, StallPolicy};
pub use self::context::{
    create_task, get_event_loop, get_running_loop, new_event_loop, run, run_with_config,
};
pub use self::coroutine::{
    fail, from_fn, ready, sleep, Awaitable, BoxCoroutine, Coroutine, Fail, FromFn, Map, Poll,
    Ready, Resume, Sleep, Then, Value,
};
pub use self::error::{Error, Message, Result};
pub use self::event_loop::{EventLoop, LoopStats};
pub use self::future::{Future, Wait};
pub use self::gather::{gather, Gather};
pub use self::task::{Task, TaskId};
