// Concurrency properties of the four singleton variants, exercised both
// through the global accessors and through freshly built holders.
//
// Thread counts shrink under Miri so `cargo miri test` can run the whole
// file with its data-race and aliasing checks enabled.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use design_patterns::config::StressConfig;
use design_patterns::singleton::{
    double_checked, eager, locked, once, same_instance, DoubleCheckedSlot, EagerSlot, Instance,
    LazySlot, LockedSlot, OnceSlot, Worker,
};
use design_patterns::stress::{self, Variant};

#[cfg(not(miri))]
const CALLERS: usize = 128;
#[cfg(miri)]
const CALLERS: usize = 8;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn race_global(get_instance: fn() -> &'static dyn Instance) -> Vec<usize> {
    let barrier = Arc::new(Barrier::new(CALLERS));
    let mut handles = vec![];

    for _ in 0..CALLERS {
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let instance = get_instance();
            instance.work();
            instance as *const dyn Instance as *const () as usize
        }));
    }

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn assert_single_identity(addresses: &[usize]) {
    assert_eq!(addresses.len(), CALLERS);
    assert!(addresses.iter().all(|a| *a == addresses[0]));
}

#[test]
fn test_global_locked_under_contention() {
    init_logging();
    assert_single_identity(&race_global(locked::get_instance));
    assert_eq!(locked::construction_count(), 1);
}

#[test]
fn test_global_double_checked_under_contention() {
    init_logging();
    assert_single_identity(&race_global(double_checked::get_instance));
    assert_eq!(double_checked::construction_count(), 1);
}

#[test]
fn test_global_once_under_contention() {
    init_logging();
    assert_single_identity(&race_global(once::get_instance));
    assert_eq!(once::construction_count(), 1);
}

#[test]
fn test_global_eager_under_contention() {
    assert_single_identity(&race_global(eager::get_instance));
    assert_eq!(eager::get_instance().variant(), "eager");
}

#[test]
fn test_repeated_calls_return_same_instance() {
    let accessors: [fn() -> &'static dyn Instance; 4] = [
        eager::get_instance,
        locked::get_instance,
        double_checked::get_instance,
        once::get_instance,
    ];

    for get_instance in accessors {
        let first = get_instance();
        for _ in 0..1000 {
            assert!(same_instance(first, get_instance()));
        }
    }
    assert_eq!(locked::construction_count(), 1);
    assert_eq!(double_checked::construction_count(), 1);
    assert_eq!(once::construction_count(), 1);
}

#[test]
fn test_eager_holder_is_populated_at_creation() {
    let built = AtomicUsize::new(0);
    let slot = EagerSlot::new({
        built.fetch_add(1, Ordering::SeqCst);
        Worker::new("eager")
    });

    assert_eq!(built.load(Ordering::SeqCst), 1);
    let first: *const Worker = slot.get();
    let second: *const Worker = slot.get();
    assert_eq!(first, second);
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

// Builds a fresh holder and races CALLERS threads at it, with a slow
// constructor so late arrivals hit the slow path while construction runs.
fn race_fresh_holder<S>() -> (usize, Vec<usize>)
where
    S: LazySlot<Worker> + Default + Send + Sync + 'static,
{
    let slot = Arc::new(S::default());
    let built = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));
    let mut handles = vec![];

    for _ in 0..CALLERS {
        let slot = Arc::clone(&slot);
        let built = Arc::clone(&built);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let worker = slot.get_or_init(|| {
                built.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                Worker::new("fresh")
            });
            worker as *const Worker as usize
        }));
    }

    let addresses = handles.into_iter().map(|h| h.join().unwrap()).collect();
    (built.load(Ordering::SeqCst), addresses)
}

#[test]
fn test_fresh_locked_holder_constructs_once() {
    let (built, addresses) = race_fresh_holder::<LockedSlot<Worker>>();
    assert_eq!(built, 1);
    assert_single_identity(&addresses);
}

#[test]
fn test_fresh_double_checked_holder_constructs_once() {
    let (built, addresses) = race_fresh_holder::<DoubleCheckedSlot<Worker>>();
    assert_eq!(built, 1);
    assert_single_identity(&addresses);
}

#[test]
fn test_fresh_once_holder_constructs_once() {
    let (built, addresses) = race_fresh_holder::<OnceSlot<Worker>>();
    assert_eq!(built, 1);
    assert_single_identity(&addresses);
}

#[test]
fn test_double_checked_stress_rounds() {
    init_logging();
    let config = StressConfig {
        callers: CALLERS,
        rounds: if cfg!(miri) { 3 } else { 50 },
        construction_delay_ms: 0,
        variants: vec![Variant::DoubleChecked],
    };

    let report = stress::run(Variant::DoubleChecked, &config).unwrap();
    assert_eq!(report.max_constructions, 1);
    assert_eq!(report.max_identities, 1);
    report.verify().unwrap();
}

#[test]
fn test_failed_construction_is_retried_by_a_later_caller() {
    fn check<S: LazySlot<Worker> + Default>() {
        let slot = S::default();
        let attempts = AtomicUsize::new(0);
        let flaky = || {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err("transient failure")
            } else {
                Ok(Worker::new("retried"))
            }
        };

        assert_eq!(slot.get_or_try_init(flaky).err(), Some("transient failure"));
        assert!(!slot.is_populated());

        let worker = slot.get_or_try_init(flaky).unwrap();
        assert_eq!(worker.variant(), "retried");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(slot.get_or_try_init(flaky).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    check::<LockedSlot<Worker>>();
    check::<DoubleCheckedSlot<Worker>>();
    check::<OnceSlot<Worker>>();
}

#[test]
fn test_held_reference_survives_later_access() {
    fn check<S: LazySlot<String> + Default>() {
        let slot = S::default();
        let first = slot.get_or_init(|| "first".to_string());
        let second = slot.get_or_init(|| "second".to_string());
        let peeked = slot.get().unwrap();

        assert_eq!(first, "first");
        assert!(std::ptr::eq(first, second));
        assert!(std::ptr::eq(first, peeked));
    }

    check::<LockedSlot<String>>();
    check::<DoubleCheckedSlot<String>>();
    check::<OnceSlot<String>>();
}

#[test]
fn test_held_reference_survives_concurrent_access() {
    fn check<S: LazySlot<Worker> + Default + Sync>() {
        let slot = S::default();
        let first = slot.get_or_init(|| Worker::new("held"));

        thread::scope(|scope| {
            for _ in 0..CALLERS {
                scope.spawn(|| {
                    let worker = slot.get_or_init(|| Worker::new("late"));
                    assert_eq!(worker.variant(), "held");
                    assert!(slot.is_populated());
                });
            }
        });

        assert_eq!(first.variant(), "held");
        assert!(std::ptr::eq(first, slot.get().unwrap()));
    }

    check::<LockedSlot<Worker>>();
    check::<DoubleCheckedSlot<Worker>>();
    check::<OnceSlot<Worker>>();
}
