//! Racing-initializer stress tests for `OnceInitializer` and `Lazy`.

#![allow(missing_docs)]

#[macro_use]
mod common;

use common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use sync_core::{Error, ErrorKind, InitState, Lazy, OnceInitializer};

const RACERS: usize = 16;
const ROUNDS: usize = 50;

fn init_test(test_name: &str) {
    init_test_logging();
    test_phase!(test_name);
}

#[derive(Debug)]
struct Registry {
    entries: Vec<u64>,
}

#[test]
fn racing_initializers_run_factory_once_per_round() {
    init_test("racing_initializers_run_factory_once_per_round");

    run_with_deadline(Duration::from_secs(60), "racing rounds", || {
        for round in 0..ROUNDS {
            let cell = Arc::new(OnceInitializer::<Registry>::new());
            let factory_runs = Arc::new(AtomicUsize::new(0));
            let start = Arc::new(Barrier::new(RACERS));

            let handles: Vec<_> = (0..RACERS)
                .map(|_| {
                    let cell = Arc::clone(&cell);
                    let factory_runs = Arc::clone(&factory_runs);
                    let start = Arc::clone(&start);
                    thread::spawn(move || {
                        start.wait();
                        let registry = cell.get_or_init(|| {
                            factory_runs.fetch_add(1, Ordering::SeqCst);
                            Registry {
                                entries: (0..64).collect(),
                            }
                        });
                        // Every reader sees the whole value, never a partial one.
                        assert_eq!(registry.entries.len(), 64);
                        registry.entries.iter().sum::<u64>()
                    })
                })
                .collect();

            for handle in handles {
                assert_eq!(handle.join().expect("racer panicked"), 2_016);
            }
            assert_eq!(factory_runs.load(Ordering::SeqCst), 1, "round {round}");
            assert_eq!(cell.state(), InitState::Done);
            assert_eq!(cell.attempts(), 1);
        }
    });
    test_complete!("racing_initializers_run_factory_once_per_round", rounds = ROUNDS);
}

#[test]
fn flaky_factory_eventually_publishes_once() {
    init_test("flaky_factory_eventually_publishes_once");
    let cell = Arc::new(OnceInitializer::<u64>::new());
    let attempts = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(RACERS));

    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let cell = Arc::clone(&cell);
            let attempts = Arc::clone(&attempts);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                loop {
                    let result = cell.get_or_try_init(|| {
                        // The first three invocations fail.
                        if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                            Err("backend unavailable")
                        } else {
                            Ok(99)
                        }
                    });
                    match result {
                        Ok(value) => break *value,
                        Err(failure) => assert!(failure.attempt() <= 3),
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().expect("racer panicked"), 99);
    }
    assert_with_log!(
        attempts.load(Ordering::SeqCst) == 4,
        "three failures then one success",
        4,
        attempts.load(Ordering::SeqCst)
    );
    assert_eq!(cell.attempts(), 4);
    test_complete!("flaky_factory_eventually_publishes_once");
}

#[test]
fn failure_converts_to_crate_error() {
    init_test("failure_converts_to_crate_error");
    let cell = OnceInitializer::<String>::new();
    let failure = cell
        .get_or_try_init(|| Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing")))
        .expect_err("factory fails");
    let err = Error::from(failure);
    assert_eq!(err.kind(), ErrorKind::InitializationFailed);
    assert!(err.is_retryable());
    assert!(std::error::Error::source(&err).is_some());

    assert_eq!(cell.state(), InitState::NotStarted);
    assert_eq!(cell.get_or_init(|| "ok".to_string()), "ok");
    test_complete!("failure_converts_to_crate_error");
}

static SHARED: Lazy<Vec<u32>> = Lazy::new(|| (1..=10).collect());

#[test]
fn static_lazy_is_shared_by_all_threads() {
    init_test("static_lazy_is_shared_by_all_threads");
    let addresses: Vec<usize> = (0..RACERS)
        .map(|_| thread::spawn(|| std::ptr::addr_of!(*SHARED) as usize))
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().expect("reader panicked"))
        .collect();
    assert!(addresses.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(SHARED.iter().sum::<u32>(), 55);
    test_complete!("static_lazy_is_shared_by_all_threads");
}
