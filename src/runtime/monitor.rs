//! Per-object monitors and the permit-based parker.
//!
//! A monitor is a mutex-protected owner/count pair plus an explicit wait set.
//! `wait` fully releases the monitor (saving its reentry count) and, once
//! notified, re-contends for ownership like any other entering thread; the
//! notifier keeps ownership until it exits its synchronized region.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::runtime::{Exception, NativeResult, thread::VmThread};

#[derive(Debug)]
pub struct Monitor {
    state: Mutex<MonitorState>,
    /// Entry contention: threads blocked on `enter` or re-acquiring after wait.
    entry: Condvar,
    /// Wait set parking: threads inside `wait`.
    parked: Condvar,
}

#[derive(Debug)]
struct MonitorState {
    owner: Option<u64>,
    count: u32,
    wait_set: Vec<Waiter>,
}

#[derive(Debug)]
struct Waiter {
    thread: u64,
    notified: bool,
}

impl Monitor {
    pub fn new() -> Self {
        Monitor {
            state: Mutex::new(MonitorState {
                owner: None,
                count: 0,
                wait_set: Vec::new(),
            }),
            entry: Condvar::new(),
            parked: Condvar::new(),
        }
    }

    pub fn is_owned_by(&self, thread: &VmThread) -> bool {
        self.state.lock().owner == Some(thread.id)
    }

    /// Acquires the monitor, blocking behind the current owner. Reentrant.
    pub fn enter(&self, thread: &VmThread) {
        let mut state = self.state.lock();
        if state.owner == Some(thread.id) {
            state.count += 1;
            return;
        }
        if state.owner.is_some() {
            thread.set_blocked();
            while state.owner.is_some() {
                self.entry.wait(&mut state);
            }
            thread.set_runnable();
        }
        state.owner = Some(thread.id);
        state.count = 1;
    }

    pub fn exit(&self, thread: &VmThread) -> NativeResult<()> {
        let mut state = self.state.lock();
        if state.owner != Some(thread.id) {
            return Err(Exception::vm("java/lang/IllegalMonitorStateException"));
        }
        state.count -= 1;
        if state.count == 0 {
            state.owner = None;
            self.entry.notify_one();
        }
        Ok(())
    }

    /// `Object.wait`. Two-phase: release and park in the wait set, then on
    /// notify/timeout/interrupt re-contend and restore the saved count before
    /// returning. An interrupt that cut the wait short surfaces as
    /// `InterruptedException` only after the monitor is owned again.
    pub fn wait(&self, thread: &VmThread, timeout: Option<Duration>) -> NativeResult<()> {
        let mut state = self.state.lock();
        if state.owner != Some(thread.id) {
            return Err(Exception::vm("java/lang/IllegalMonitorStateException"));
        }

        let saved_count = state.count;
        state.owner = None;
        state.count = 0;
        state.wait_set.push(Waiter {
            thread: thread.id,
            notified: false,
        });
        self.entry.notify_one();

        thread.set_waiting(timeout.is_some());
        let deadline = timeout.map(|d| Instant::now() + d);
        loop {
            if thread.is_interrupted() {
                break;
            }
            let me = state.wait_set.iter().find(|w| w.thread == thread.id);
            match me {
                Some(waiter) if !waiter.notified => {}
                _ => break,
            }
            match deadline {
                Some(deadline) => {
                    if self.parked.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                None => self.parked.wait(&mut state),
            }
        }
        state.wait_set.retain(|w| w.thread != thread.id);

        // phase two: ordinary entry contention
        if state.owner.is_some() {
            thread.set_blocked();
            while state.owner.is_some() {
                self.entry.wait(&mut state);
            }
        }
        state.owner = Some(thread.id);
        state.count = saved_count;
        drop(state);
        thread.set_runnable();

        if thread.consume_interrupt() {
            return Err(Exception::vm("java/lang/InterruptedException"));
        }
        Ok(())
    }

    /// Marks one arbitrary not-yet-notified waiter eligible to re-contend.
    pub fn notify_one(&self, thread: &VmThread) -> NativeResult<()> {
        let mut state = self.state.lock();
        if state.owner != Some(thread.id) {
            return Err(Exception::vm("java/lang/IllegalMonitorStateException"));
        }
        if let Some(waiter) = state.wait_set.iter_mut().find(|w| !w.notified) {
            waiter.notified = true;
            self.parked.notify_all();
        }
        Ok(())
    }

    pub fn notify_all(&self, thread: &VmThread) -> NativeResult<()> {
        let mut state = self.state.lock();
        if state.owner != Some(thread.id) {
            return Err(Exception::vm("java/lang/IllegalMonitorStateException"));
        }
        for waiter in &mut state.wait_set {
            waiter.notified = true;
        }
        self.parked.notify_all();
        Ok(())
    }

    /// Wakes every parked waiter so interrupted ones can observe their flag.
    pub(crate) fn interrupt_wakeup(&self) {
        let _state = self.state.lock();
        self.parked.notify_all();
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Monitor::new()
    }
}

/// `LockSupport` permit. At most one permit; `unpark` before `park` is
/// remembered, a pending interrupt makes `park` return immediately.
#[derive(Debug)]
pub struct Parker {
    permit: Mutex<bool>,
    cond: Condvar,
}

impl Parker {
    pub fn new() -> Self {
        Parker {
            permit: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    pub fn park(&self, thread: &VmThread, timeout: Option<Duration>) {
        let mut permit = self.permit.lock();
        if *permit {
            *permit = false;
            return;
        }
        if thread.is_interrupted() {
            return;
        }
        match timeout {
            Some(timeout) => {
                self.cond.wait_for(&mut permit, timeout);
            }
            None => self.cond.wait(&mut permit),
        }
        if *permit {
            *permit = false;
        }
    }

    pub fn unpark(&self) {
        let mut permit = self.permit.lock();
        *permit = true;
        self.cond.notify_one();
    }

    /// Wakeup without granting a permit; used by interrupt delivery.
    pub(crate) fn wake(&self) {
        let _permit = self.permit.lock();
        self.cond.notify_all();
    }
}

impl Default for Parker {
    fn default() -> Self {
        Parker::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::thread::VmThread;

    #[test]
    fn reentrant_enter_exit() {
        let monitor = Monitor::new();
        let thread = VmThread::new("t");
        monitor.enter(&thread);
        monitor.enter(&thread);
        assert!(monitor.is_owned_by(&thread));
        monitor.exit(&thread).unwrap();
        assert!(monitor.is_owned_by(&thread));
        monitor.exit(&thread).unwrap();
        assert!(!monitor.is_owned_by(&thread));
    }

    #[test]
    fn exit_by_non_owner_is_illegal() {
        let monitor = Monitor::new();
        let owner = VmThread::new("owner");
        let other = VmThread::new("other");
        monitor.enter(&owner);
        let err = monitor.exit(&other).unwrap_err();
        assert_eq!(
            err.vm_class(),
            Some("java/lang/IllegalMonitorStateException")
        );
        monitor.exit(&owner).unwrap();
    }

    #[test]
    fn wait_without_ownership_is_illegal() {
        let monitor = Monitor::new();
        let thread = VmThread::new("t");
        let err = monitor.wait(&thread, None).unwrap_err();
        assert_eq!(
            err.vm_class(),
            Some("java/lang/IllegalMonitorStateException")
        );
    }

    #[test]
    fn parker_remembers_single_permit() {
        let parker = Parker::new();
        let thread = VmThread::new("t");
        parker.unpark();
        parker.unpark();
        // first park consumes the permit without blocking
        parker.park(&thread, Some(std::time::Duration::from_millis(1)));
        let before = std::time::Instant::now();
        parker.park(&thread, Some(std::time::Duration::from_millis(30)));
        assert!(before.elapsed() >= std::time::Duration::from_millis(25));
    }
}
