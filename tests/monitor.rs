//! Cross-thread monitor behavior: wait/notify handoff, interrupt delivery
//! and the parker, driven directly against the runtime primitives.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use mochavm::runtime::{
    monitor::{Monitor, Parker},
    thread::{ThreadState, VmThread},
};

#[test]
fn wait_notify_handoff() {
    let monitor = Arc::new(Monitor::new());
    let value = Arc::new(Mutex::new(0i32));

    let consumer = {
        let monitor = monitor.clone();
        let value = value.clone();
        thread::spawn(move || {
            let me = VmThread::new("consumer");
            monitor.enter(&me);
            while *value.lock() == 0 {
                monitor.wait(&me, None).unwrap();
            }
            let observed = *value.lock();
            monitor.exit(&me).unwrap();
            observed
        })
    };

    thread::sleep(Duration::from_millis(20));
    let producer = VmThread::new("producer");
    monitor.enter(&producer);
    *value.lock() = 42;
    monitor.notify_one(&producer).unwrap();
    monitor.exit(&producer).unwrap();

    assert_eq!(consumer.join().unwrap(), 42);
}

#[test]
fn timed_wait_times_out_and_reacquires() {
    let monitor = Monitor::new();
    let me = VmThread::new("t");
    monitor.enter(&me);
    monitor.enter(&me);

    let before = Instant::now();
    monitor.wait(&me, Some(Duration::from_millis(50))).unwrap();
    assert!(before.elapsed() >= Duration::from_millis(40));

    // the saved reentry count survives the wait
    assert!(monitor.is_owned_by(&me));
    monitor.exit(&me).unwrap();
    assert!(monitor.is_owned_by(&me));
    monitor.exit(&me).unwrap();
    assert!(!monitor.is_owned_by(&me));
}

#[test]
fn interrupt_surfaces_after_reacquire() {
    let monitor = Arc::new(Monitor::new());
    let waiter = Arc::new(VmThread::new("waiter"));

    let handle = {
        let monitor = monitor.clone();
        let waiter = waiter.clone();
        thread::spawn(move || {
            monitor.enter(&waiter);
            let result = monitor.wait(&waiter, None);
            let owned = monitor.is_owned_by(&waiter);
            monitor.exit(&waiter).unwrap();
            (result, owned)
        })
    };

    while waiter.state() != ThreadState::Waiting {
        thread::sleep(Duration::from_millis(5));
    }
    waiter.interrupt();

    let other = VmThread::new("other");
    monitor.enter(&other);
    monitor.notify_all(&other).unwrap();
    monitor.exit(&other).unwrap();

    let (result, owned) = handle.join().unwrap();
    assert!(owned, "waiter must reacquire the monitor before raising");
    let err = result.unwrap_err();
    assert_eq!(err.vm_class(), Some("java/lang/InterruptedException"));
    assert!(!waiter.is_interrupted(), "the flag is consumed by the raise");
}

#[test]
fn notify_one_wakes_a_single_waiter() {
    let monitor = Arc::new(Monitor::new());
    let woken = Arc::new(Mutex::new(0u32));
    let threads: Vec<Arc<VmThread>> = (0..3)
        .map(|i| Arc::new(VmThread::new(&format!("w{i}"))))
        .collect();

    let handles: Vec<_> = threads
        .iter()
        .map(|waiter| {
            let monitor = monitor.clone();
            let woken = woken.clone();
            let waiter = waiter.clone();
            thread::spawn(move || {
                monitor.enter(&waiter);
                monitor.wait(&waiter, Some(Duration::from_millis(400))).unwrap();
                *woken.lock() += 1;
                monitor.exit(&waiter).unwrap();
            })
        })
        .collect();

    while threads.iter().any(|t| t.state() != ThreadState::TimedWaiting) {
        thread::sleep(Duration::from_millis(5));
    }

    let notifier = VmThread::new("notifier");
    monitor.enter(&notifier);
    monitor.notify_one(&notifier).unwrap();
    monitor.exit(&notifier).unwrap();

    thread::sleep(Duration::from_millis(100));
    assert_eq!(*woken.lock(), 1, "only the notified waiter proceeds early");

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*woken.lock(), 3);
}

#[test]
fn park_blocks_until_unpark() {
    let parker = Arc::new(Parker::new());
    let handle = {
        let parker = parker.clone();
        thread::spawn(move || {
            let me = VmThread::new("parked");
            let before = Instant::now();
            parker.park(&me, None);
            before.elapsed()
        })
    };

    thread::sleep(Duration::from_millis(60));
    parker.unpark();
    let elapsed = handle.join().unwrap();
    assert!(elapsed >= Duration::from_millis(50));
}
