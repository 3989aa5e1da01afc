use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fiber_pool::{TaskPoolBuilder, current_task_handle};

fn drain(millis: u64) {
    std::thread::sleep(Duration::from_millis(millis));
}

/// S1: many submissions to the shared queue all land exactly once.
#[test]
fn s1_shared_queue_increments_are_all_observed() {
    let pool = TaskPoolBuilder::new().thread_count(4).build();
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..10_000 {
        let c = counter.clone();
        pool.run(
            move |_: ()| {
                c.fetch_add(1, Ordering::SeqCst);
            },
            (),
        );
    }
    drain(500);
    assert_eq!(counter.load(Ordering::SeqCst), 10_000);
    pool.terminate();
}

/// S2: `run_dist` runs exactly once per worker.
#[test]
fn s2_run_dist_hits_every_worker_exactly_once() {
    let pool = TaskPoolBuilder::new().thread_count(4).build();
    let total = Arc::new(AtomicUsize::new(0));
    let t = total.clone();
    pool.run_dist(
        move |_: ()| {
            t.fetch_add(1, Ordering::SeqCst);
        },
        (),
    );
    drain(300);
    assert_eq!(total.load(Ordering::SeqCst), pool.thread_count());
    pool.terminate();
}

/// S3: `run_h` hands back a handle only once the task has started, and the
/// task can observe its own handle via `current_task_handle`.
#[test]
fn s3_run_h_handle_is_live_by_the_time_it_is_returned() {
    let pool = TaskPoolBuilder::new().thread_count(2).build();
    let started = Arc::new(AtomicUsize::new(0));
    let s = started.clone();
    let handle = pool.run_h(
        move |_: ()| {
            assert!(current_task_handle().is_some());
            s.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
        },
        (),
    );
    let _ = handle;
    drain(200);
    assert_eq!(started.load(Ordering::SeqCst), 1);
    pool.terminate();
}

/// S4 (reduced scale): a burst of no-op capsules from a single producer
/// completes without deadlock.
#[test]
fn s4_large_burst_of_noop_capsules_completes() {
    let pool = TaskPoolBuilder::new().thread_count(8).build();
    for _ in 0..200_000 {
        pool.run(|_: ()| {}, ());
    }
    drain(1000);
    pool.terminate();
}

/// S6: terminating with non-empty queues still drains cleanly (the warning
/// logs are not asserted on here, since log output isn't captured by this
/// test harness, but the pool must still join every worker without hanging).
#[test]
fn s6_terminate_with_nonempty_queues_still_joins_all_workers() {
    let pool = TaskPoolBuilder::new().thread_count(3).build();
    for _ in 0..50_000 {
        pool.run(|_: ()| std::thread::sleep(Duration::from_micros(1)), ());
    }
    pool.run_dist(|_: ()| std::thread::sleep(Duration::from_millis(50)), ());
    pool.terminate();
}

/// Fan-out rejects non-`Clone` argument types at compile time. This is a
/// property we can only assert by *not* writing the non-compiling call; the
/// isolation boundary itself is exercised in `isolation_compile_fail.rs`.
#[test]
fn run_dist_h_delivers_one_handle_per_worker() {
    let pool = TaskPoolBuilder::new().thread_count(3).build();
    let handles = Arc::new(std::sync::Mutex::new(Vec::new()));
    let h = handles.clone();
    pool.run_dist_h(
        move |handle| h.lock().unwrap().push(handle),
        |_: ()| {
            std::thread::sleep(Duration::from_millis(10));
        },
        (),
    );
    assert_eq!(handles.lock().unwrap().len(), 3);
    pool.terminate();
}
