//! VM threads. Every guest thread is an OS thread with a `VmThread` record
//! carrying identity, state, the interrupt flag and the parker.

use std::{
    cell::RefCell,
    sync::{
        Arc, LazyLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};

use crate::runtime::{Exception, NativeResult, heap::HeapObject, monitor::Parker};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ThreadState {
    New,
    Runnable,
    Blocked,
    Waiting,
    TimedWaiting,
    Terminated,
}

#[derive(Debug)]
pub struct VmThread {
    pub id: u64,
    pub name: Mutex<String>,
    state: Mutex<ThreadState>,
    state_cv: Condvar,
    interrupted: AtomicBool,
    pub parker: Parker,
    /// Object whose monitor this thread is waiting on, for interrupt wakeup.
    pub(crate) current_wait: Mutex<Option<Arc<HeapObject>>>,
    /// Heap id of the guest `java/lang/Thread` object, once one exists.
    pub object: OnceCell<u32>,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// All live VM threads by id.
pub static THREADS: LazyLock<DashMap<u64, Arc<VmThread>>> = LazyLock::new(DashMap::new);

/// Guest `Thread` object id -> VM thread.
pub static THREAD_OBJECTS: LazyLock<DashMap<u32, Arc<VmThread>>> = LazyLock::new(DashMap::new);

thread_local! {
    static CURRENT: RefCell<Option<Arc<VmThread>>> = const { RefCell::new(None) };
}

impl VmThread {
    pub fn new(name: &str) -> Self {
        VmThread {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: Mutex::new(name.to_string()),
            state: Mutex::new(ThreadState::New),
            state_cv: Condvar::new(),
            interrupted: AtomicBool::new(false),
            parker: Parker::new(),
            current_wait: Mutex::new(None),
            object: OnceCell::new(),
        }
    }

    pub fn state(&self) -> ThreadState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: ThreadState) {
        *self.state.lock() = state;
        self.state_cv.notify_all();
    }

    pub(crate) fn set_blocked(&self) {
        self.set_state(ThreadState::Blocked);
    }

    pub(crate) fn set_runnable(&self) {
        self.set_state(ThreadState::Runnable);
    }

    pub(crate) fn set_waiting(&self, timed: bool) {
        self.set_state(if timed {
            ThreadState::TimedWaiting
        } else {
            ThreadState::Waiting
        });
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Reads and clears the interrupt flag.
    pub fn consume_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    /// Sets the flag and wakes the thread out of `wait`, `sleep`, `join` and
    /// `park`. The woken primitive decides whether to raise
    /// `InterruptedException`.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.parker.wake();
        {
            let _state = self.state.lock();
            self.state_cv.notify_all();
        }
        let waiting_on = self.current_wait.lock().clone();
        if let Some(object) = waiting_on {
            object.monitor.interrupt_wakeup();
        }
    }

    /// `Thread.sleep`. A pending interrupt raises immediately and clears the
    /// flag, like an interrupt arriving mid-sleep.
    pub fn sleep(&self, duration: Duration) -> NativeResult<()> {
        let deadline = Instant::now() + duration;
        let mut state = self.state.lock();
        let previous = *state;
        *state = ThreadState::TimedWaiting;
        loop {
            if self.is_interrupted() {
                break;
            }
            if self.state_cv.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        *state = previous;
        drop(state);
        if self.consume_interrupt() {
            return Err(Exception::vm("java/lang/InterruptedException"));
        }
        Ok(())
    }
}

pub fn register(thread: Arc<VmThread>) {
    THREADS.insert(thread.id, thread);
}

/// Binds `thread` to the calling OS thread.
pub fn set_current(thread: Arc<VmThread>) {
    register(thread.clone());
    CURRENT.with(|current| *current.borrow_mut() = Some(thread));
}

/// The VM thread of the calling OS thread, attaching one on first use.
pub fn current() -> Arc<VmThread> {
    CURRENT.with(|current| {
        let mut current = current.borrow_mut();
        match &*current {
            Some(thread) => thread.clone(),
            None => {
                let name = if THREADS.is_empty() { "main".to_string() } else {
                    format!("Thread-{}", NEXT_ID.load(Ordering::Relaxed))
                };
                let thread = Arc::new(VmThread::new(&name));
                thread.set_state(ThreadState::Runnable);
                register(thread.clone());
                *current = Some(thread.clone());
                thread
            }
        }
    })
}

/// Marks the calling thread dead and drops it from the registry.
pub fn detach_current() {
    CURRENT.with(|current| {
        if let Some(thread) = current.borrow_mut().take() {
            thread.set_state(ThreadState::Terminated);
            THREADS.remove(&thread.id);
        }
    });
}
