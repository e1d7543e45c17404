//! `java.lang.Thread` and `LockSupport` natives. A guest `Thread` object is
//! bound to a `VmThread` at construction; `start` spawns an OS thread that
//! runs the dynamically selected `run()` method.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::runtime::{
    Exception, NativeResult, class_loader, heap,
    heap::{NULL, Value},
    interpreter, native,
    thread::{self, THREAD_OBJECTS, ThreadState, VmThread},
};

pub(super) fn register() {
    let class = "java/lang/Thread";
    native::register(class, "<init>", "()V", init);
    native::register(class, "<init>", "(Ljava/lang/String;)V", init_named);
    native::register(class, "<init>", "(Ljava/lang/Runnable;)V", init_runnable);
    native::register(class, "run", "()V", run);
    native::register(class, "start", "()V", start);
    native::register(class, "interrupt", "()V", interrupt);
    native::register(class, "isInterrupted", "()Z", is_interrupted);
    native::register(class, "isAlive", "()Z", is_alive);
    native::register(class, "join", "()V", join);
    native::register(class, "join", "(J)V", join_timed);
    native::register(class, "getName", "()Ljava/lang/String;", get_name);
    native::register(class, "setName", "(Ljava/lang/String;)V", set_name);
    native::register(class, "sleep", "(J)V", sleep);
    native::register(class, "currentThread", "()Ljava/lang/Thread;", current_thread);
    native::register(class, "interrupted", "()Z", interrupted);

    let lock_support = "java/util/concurrent/locks/LockSupport";
    native::register(lock_support, "park", "()V", park);
    native::register(lock_support, "parkNanos", "(J)V", park_nanos);
    native::register(lock_support, "unpark", "(Ljava/lang/Thread;)V", unpark);
}

fn bound_thread(object_id: u32) -> Option<Arc<VmThread>> {
    THREAD_OBJECTS.get(&object_id).map(|entry| entry.value().clone())
}

fn bind_new_thread(object_id: u32, name: Option<String>) {
    let vm = Arc::new(VmThread::new(""));
    *vm.name.lock() = name.unwrap_or_else(|| format!("Thread-{}", vm.id));
    let _ = vm.object.set(object_id);
    THREAD_OBJECTS.insert(object_id, vm);
}

fn init(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    bind_new_thread(args[0].reference(), None);
    Ok(None)
}

fn init_named(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let name = native::string_text(args[1].reference())?.to_string();
    bind_new_thread(args[0].reference(), Some(name));
    Ok(None)
}

fn init_runnable(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object_id = args[0].reference();
    bind_new_thread(object_id, None);
    let object = heap::get_or_npe(object_id)?;
    if let Some(resolve) = class_loader::resolve_field(&object.class, "target") {
        object.set_field(resolve.field.slot, args[1]);
    }
    Ok(None)
}

/// Default `run`: delegate to the `target` runnable, if one was given.
fn run(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    let target_id = match class_loader::resolve_field(&object.class, "target") {
        Some(resolve) => object.get_field(resolve.field.slot).reference(),
        None => NULL,
    };
    if target_id != NULL {
        let target = heap::get_or_npe(target_id)?;
        let selected = class_loader::select_method(&target.class, "run", "()V")?;
        interpreter::call_method(
            vm_thread,
            &selected.class,
            &selected.method,
            vec![Value::Reference(target_id)],
        )?;
    }
    Ok(None)
}

fn start(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object_id = args[0].reference();
    let object = heap::get_or_npe(object_id)?;
    let vm = bound_thread(object_id)
        .ok_or_else(|| Exception::vm("java/lang/IllegalThreadStateException"))?;
    if vm.state() != ThreadState::New {
        return Err(Exception::vm("java/lang/IllegalThreadStateException"));
    }
    vm.set_state(ThreadState::Runnable);

    let selected = class_loader::select_method(&object.class, "run", "()V")?;
    let spawned = vm.clone();
    std::thread::spawn(move || {
        thread::set_current(spawned.clone());
        let result = interpreter::call_method(
            &spawned,
            &selected.class,
            &selected.method,
            vec![Value::Reference(object_id)],
        );
        if let Err(exception) = result {
            interpreter::report_uncaught(&spawned, exception);
        }
        spawned.set_state(ThreadState::Terminated);
        // joiners wait on the Thread object's monitor
        object.monitor.enter(&spawned);
        let _ = object.monitor.notify_all(&spawned);
        let _ = object.monitor.exit(&spawned);
        thread::detach_current();
    });
    Ok(None)
}

fn interrupt(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    if let Some(vm) = bound_thread(args[0].reference()) {
        vm.interrupt();
    }
    Ok(None)
}

fn is_interrupted(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let flagged = bound_thread(args[0].reference()).is_some_and(|vm| vm.is_interrupted());
    Ok(Some(Value::Int(flagged as i32)))
}

fn interrupted(vm_thread: &Arc<VmThread>, _: Vec<Value>) -> NativeResult<Option<Value>> {
    Ok(Some(Value::Int(vm_thread.consume_interrupt() as i32)))
}

fn is_alive(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let alive = bound_thread(args[0].reference()).is_some_and(|vm| {
        !matches!(vm.state(), ThreadState::New | ThreadState::Terminated)
    });
    Ok(Some(Value::Int(alive as i32)))
}

fn join(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    join_until(vm_thread, args[0].reference(), None)
}

fn join_timed(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let millis = args[1].long();
    if millis < 0 {
        return Err(Exception::vm_msg(
            "java/lang/IllegalArgumentException",
            "timeout value is negative",
        ));
    }
    let timeout = (millis > 0).then(|| Duration::from_millis(millis as u64));
    join_until(vm_thread, args[0].reference(), timeout)
}

fn join_until(
    vm_thread: &Arc<VmThread>,
    object_id: u32,
    timeout: Option<Duration>,
) -> NativeResult<Option<Value>> {
    let Some(target) = bound_thread(object_id) else {
        return Ok(None);
    };
    let object = heap::get_or_npe(object_id)?;
    let deadline = timeout.map(|d| Instant::now() + d);

    object.monitor.enter(vm_thread);
    let result = loop {
        // a never-started thread is not alive, so joining it returns at once
        if matches!(target.state(), ThreadState::New | ThreadState::Terminated) {
            break Ok(());
        }
        let remaining = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    break Ok(());
                }
                Some(deadline - now)
            }
            None => None,
        };
        *vm_thread.current_wait.lock() = Some(object.clone());
        let waited = object.monitor.wait(vm_thread, remaining);
        *vm_thread.current_wait.lock() = None;
        if let Err(exception) = waited {
            break Err(exception);
        }
    };
    let _ = object.monitor.exit(vm_thread);
    result.map(|_| None)
}

fn get_name(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let name = match bound_thread(args[0].reference()) {
        Some(vm) => vm.name.lock().clone(),
        None => String::new(),
    };
    Ok(Some(Value::Reference(heap::allocate_string(&name)?)))
}

fn set_name(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let name = native::string_text(args[1].reference())?;
    if let Some(vm) = bound_thread(args[0].reference()) {
        *vm.name.lock() = name.to_string();
    }
    Ok(None)
}

fn sleep(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let millis = args[0].long();
    if millis < 0 {
        return Err(Exception::vm_msg(
            "java/lang/IllegalArgumentException",
            "timeout value is negative",
        ));
    }
    vm_thread.sleep(Duration::from_millis(millis as u64))?;
    Ok(None)
}

/// Lazily creates the guest object for threads that were attached rather
/// than started from guest code (the main thread in particular).
fn current_thread(vm_thread: &Arc<VmThread>, _: Vec<Value>) -> NativeResult<Option<Value>> {
    let id = vm_thread
        .object
        .get_or_try_init(|| {
            let class = class_loader::resolve_class("java/lang/Thread")?;
            let object_id = heap::allocate_instance(&class)?;
            THREAD_OBJECTS.insert(object_id, vm_thread.clone());
            Ok::<u32, Exception>(object_id)
        })
        .copied()?;
    Ok(Some(Value::Reference(id)))
}

fn park(vm_thread: &Arc<VmThread>, _: Vec<Value>) -> NativeResult<Option<Value>> {
    vm_thread.parker.park(vm_thread, None);
    Ok(None)
}

fn park_nanos(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let nanos = args[0].long();
    if nanos > 0 {
        vm_thread
            .parker
            .park(vm_thread, Some(Duration::from_nanos(nanos as u64)));
    }
    Ok(None)
}

fn unpark(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    if let Some(vm) = bound_thread(args[0].reference()) {
        vm.parker.unpark();
    }
    Ok(None)
}
