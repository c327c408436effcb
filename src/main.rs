//! spindle demo application
//!
//! Compares awaiting work one piece at a time with launching it as
//! concurrent tasks. Sleeping is measured in scheduling rounds, so the
//! difference shows up in the loop's round counter rather than in
//! wall-clock time.

use std::time::Instant;

use spindle::{create_task, gather, ready, sleep, BoxCoroutine, Coroutine, EventLoop, Result};

/// Rounds each square "waits" before answering
const SLEEP_ROUNDS: usize = 2;

/// Squares `number` after sleeping for a couple of rounds
fn compute_square(number: u64) -> impl Coroutine<Output = u64> {
    sleep(SLEEP_ROUNDS).map(move |_| number * number)
}

/// Awaits each square before starting the next one
fn sequential(numbers: Vec<u64>) -> BoxCoroutine<Vec<u64>> {
    numbers
        .into_iter()
        .fold(ready(Vec::new()).boxed(), |acc, number| {
            acc.then(move |mut results| {
                compute_square(number).map(move |square| {
                    results.push(square);
                    results
                })
            })
            .boxed()
        })
}

/// Launches every square as its own task, then gathers the results
fn concurrent(numbers: Vec<u64>) -> impl Coroutine<Output = Vec<u64>> {
    ready(()).then(move |_| {
        let tasks: Vec<_> = numbers
            .into_iter()
            .map(|number| create_task(compute_square(number)))
            .collect();
        gather(tasks)
    })
}

/// Runs `coroutine` on `event_loop` and reports the rounds it took
fn measure<C>(event_loop: &EventLoop, label: &str, coroutine: C) -> Result<Vec<u64>>
where
    C: Coroutine<Output = Vec<u64>> + 'static,
{
    let before = event_loop.stats();
    let start = Instant::now();
    let results = event_loop.run_until_complete(coroutine)?;
    let after = event_loop.stats();

    println!(
        "{}: {} rounds, {} steps, {} tasks in {:?}",
        label,
        after.rounds - before.rounds,
        after.steps - before.steps,
        after.tasks_spawned - before.tasks_spawned,
        start.elapsed(),
    );
    Ok(results)
}

fn main() -> Result<()> {
    println!("=== spindle: sequential vs concurrent ===");

    let event_loop = EventLoop::new();
    let numbers: Vec<u64> = (1..=5).collect();

    let squares = measure(&event_loop, "Sequential", sequential(numbers.clone()))?;
    println!("  results: {:?}", squares);

    let squares = measure(&event_loop, "Concurrent", concurrent(numbers))?;
    println!("  results: {:?}", squares);

    println!("\n=== Fan-out ===");
    let many: Vec<u64> = (0..10_000).collect();
    let squares = measure(&event_loop, "10k tasks", concurrent(many))?;
    println!("  sum of squares: {}", squares.iter().sum::<u64>());

    event_loop.close();
    Ok(())
}
