use spindle::{
    create_task, fail, from_fn, gather, get_running_loop, ready, run, run_with_config, sleep,
    Coroutine, Error, EventLoop, Future, LoopConfig, Poll, Resume, Task,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Answers "OK" after one scheduling round, through a future completed by
/// a helper task
fn get(_url: &str) -> impl Coroutine<Output = &'static str> {
    ready(()).then(|_| {
        let response = Future::new();
        let producer = response.clone();
        create_task(sleep(1).map(move |_| producer.set_result("OK")));
        response.wait()
    })
}

fn generate_text() -> impl Coroutine<Output = &'static str> {
    get("https://api.example.com/health").then(|response| {
        if response != "OK" {
            return ready(response).boxed();
        }
        get("https://api.example.com/generate?prompt=meaning").boxed()
    })
}

fn multiple_generate_text(n: usize) -> impl Coroutine<Output = Vec<&'static str>> {
    sleep(1).then(move |_| gather((0..n).map(|_| create_task(generate_text()))))
}

/// Records when it is dropped
struct DropFlag(Rc<Cell<bool>>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.set(true);
    }
}

/// Waits on `never` while holding `flag`
fn blocked_forever(never: &Future<u8>, flag: DropFlag) -> impl Coroutine<Output = u8> {
    never.wait().map(move |n| {
        let _held = &flag;
        n
    })
}

#[derive(Debug, thiserror::Error)]
#[error("quota exceeded after {0} requests")]
struct QuotaExceeded(u32);

#[test]
fn test_generate_text() {
    assert_eq!(run(generate_text()).unwrap(), "OK");
}

#[test]
fn test_multiple_generate_text() {
    let responses = run(multiple_generate_text(100)).unwrap();
    assert_eq!(responses, vec!["OK"; 100]);
}

#[test]
fn test_fan_out_rounds_do_not_grow_with_task_count() {
    fn rounds_for(n: usize) -> u64 {
        let event_loop = EventLoop::new();
        let responses = event_loop
            .run_until_complete(multiple_generate_text(n))
            .unwrap();
        assert_eq!(responses.len(), n);
        event_loop.stats().rounds
    }

    let single = rounds_for(1);
    let hundred = rounds_for(100);
    assert_eq!(single, hundred);
    assert!(hundred < 20, "took {} rounds", hundred);
}

#[test]
fn test_single_assignment() {
    let future = Future::new();
    future.set_result("first").unwrap();
    assert!(matches!(future.set_result("second"), Err(Error::AlreadyCompleted)));
    assert!(matches!(
        future.set_exception(Error::msg("third")),
        Err(Error::AlreadyCompleted)
    ));
    assert_eq!(future.result().unwrap(), "first");
}

#[test]
fn test_callback_runs_exactly_once() {
    let calls = Rc::new(Cell::new(0));
    let future = Future::<u8>::new();

    let before = calls.clone();
    future.add_done_callback(move |_| before.set(before.get() + 1));
    future.set_exception(Error::msg("gone")).unwrap();
    let after = calls.clone();
    future.add_done_callback(move |_| after.set(after.get() + 1));
    let _ = future.set_result(1);

    assert_eq!(calls.get(), 2);
}

#[test]
fn test_done_is_idempotent() {
    let task = run(ready(()).then(|_| {
        let task = create_task(ready(1));
        task.wait().map(move |_| task)
    }))
    .unwrap();
    for _ in 0..5 {
        assert!(task.done());
    }
    assert_eq!(task.result().unwrap(), 1);
}

#[test]
fn test_fifo_fairness() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let recorder = |name: &'static str| {
        let log = log.clone();
        let mut rounds = 0;
        from_fn(move |_| {
            log.borrow_mut().push(name);
            rounds += 1;
            if rounds == 3 {
                Poll::Ready(Ok(()))
            } else {
                Poll::Yield
            }
        })
    };
    let first = recorder("t1");
    let second = recorder("t2");

    run(ready(()).then(move |_| {
        gather(vec![create_task(first), create_task(second)])
    }))
    .unwrap();

    assert_eq!(*log.borrow(), vec!["t1", "t2", "t1", "t2", "t1", "t2"]);
}

#[test]
fn test_blocked_task_resumes_with_producer_value() {
    let event_loop = EventLoop::new();
    let gate = Future::<String>::new();
    let waiting = Task::new(gate.wait(), &event_loop);
    assert_eq!(event_loop.stats().queued, 1);

    waiting.step(Resume::Next);
    assert!(!waiting.done());
    assert_eq!(event_loop.stats().queued, 1);

    gate.set_result(String::from("payload")).unwrap();
    assert_eq!(event_loop.stats().queued, 2);

    let value = event_loop.run_until_complete(waiting.wait()).unwrap();
    assert_eq!(value, "payload");
    assert_eq!(waiting.result().unwrap(), "payload");
}

#[test]
fn test_producer_task_wakes_consumer_task() {
    let value = run(ready(()).then(|_| {
        let channel = Future::<i32>::new();
        let consumer = create_task(channel.wait().map(|n: i32| n * 2));
        let producer = channel.clone();
        create_task(sleep(2).map(move |_| producer.set_result(21)));
        consumer.wait()
    }))
    .unwrap();
    assert_eq!(value, 42);
}

#[test]
fn test_error_propagation_keeps_identity() {
    let raised = Error::raise(QuotaExceeded(3));
    let expected = raised.clone();
    let err = run(ready(()).then(move |_| create_task(fail::<u8>(raised)).wait()))
        .unwrap_err();

    assert!(err.same_raised(&expected));
    let quota = err.downcast_ref::<QuotaExceeded>().unwrap();
    assert_eq!(quota.0, 3);
    assert_eq!(err.to_string(), "quota exceeded after 3 requests");
}

#[test]
fn test_error_is_thrown_into_awaiting_coroutine() {
    let outcome = run(ready(()).then(|_| {
        let flaky =
            create_task(sleep(1).then(|_| fail::<u32>(Error::msg("flaky upstream"))));
        let mut wait = flaky.wait();
        from_fn(move |resume| match wait.resume(resume) {
            Poll::Ready(Ok(n)) => Poll::Ready(Ok(n.to_string())),
            Poll::Ready(Err(err)) => Poll::Ready(Ok(format!("recovered: {}", err))),
            Poll::Yield => Poll::Yield,
            Poll::Await(awaitable) => Poll::Await(awaitable),
        })
    }))
    .unwrap();
    assert_eq!(outcome, "recovered: flaky upstream");
}

#[test]
fn test_long_dependency_chain() {
    let total = run(ready(()).then(|_| {
        let mut previous = create_task(sleep(1).map(|_| 0u64));
        for _ in 0..10_000 {
            previous = create_task(previous.wait().map(|n| n + 1));
        }
        previous.wait()
    }))
    .unwrap();
    assert_eq!(total, 10_000);
}

#[test]
fn test_stalled_loop_fails() {
    let err = run_with_config(
        LoopConfig::new().name("stall-check"),
        Future::<()>::new().wait(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Stalled));
    assert!(get_running_loop().is_none());
}

#[test]
fn test_stalled_run_frees_blocked_root() {
    let dropped = Rc::new(Cell::new(false));
    let never = Future::new();
    let err = run(blocked_forever(&never, DropFlag(dropped.clone()))).unwrap_err();
    assert!(matches!(err, Error::Stalled));
    assert!(dropped.get());
    assert!(!never.done());
}

#[test]
fn test_finished_run_frees_blocked_sibling() {
    let dropped = Rc::new(Cell::new(false));
    let flag = DropFlag(dropped.clone());
    let never = Future::new();
    let waiter = never.clone();
    let answer = run(ready(()).then(move |_| {
        create_task(blocked_forever(&waiter, flag));
        sleep(2).map(|_| 7)
    }))
    .unwrap();
    assert_eq!(answer, 7);
    assert!(dropped.get());
    assert!(never.set_result(1).is_ok());
}

#[test]
fn test_running_loop_cleared_after_panic() {
    let result = std::panic::catch_unwind(|| {
        run(from_fn(|_| -> Poll<()> { panic!("coroutine panicked") }))
    });
    assert!(result.is_err());
    assert!(get_running_loop().is_none());
    assert_eq!(run(ready(5)).unwrap(), 5);
}

#[test]
fn test_explicit_loop_can_run_twice() {
    let event_loop = EventLoop::new();
    assert_eq!(event_loop.run_until_complete(sleep(1).map(|_| 1)).unwrap(), 1);
    assert_eq!(event_loop.run_until_complete(sleep(1).map(|_| 2)).unwrap(), 2);
    let stats = event_loop.stats();
    assert_eq!(stats.tasks_spawned, 2);
    assert_eq!(stats.steps, 4);
}
