//! `java.lang.Object` natives: identity, monitors, cloning.

use std::{sync::Arc, time::Duration};

use crate::runtime::{
    Exception, NativeResult, heap,
    heap::Value,
    native,
    thread::VmThread,
};

pub(super) fn register() {
    let class = "java/lang/Object";
    native::register(class, "<init>", "()V", |_, _| Ok(None));
    native::register(class, "hashCode", "()I", hash_code);
    native::register(class, "equals", "(Ljava/lang/Object;)Z", equals);
    native::register(class, "toString", "()Ljava/lang/String;", to_string);
    native::register(class, "getClass", "()Ljava/lang/Class;", get_class);
    native::register(class, "clone", "()Ljava/lang/Object;", clone);
    native::register(class, "wait", "()V", wait);
    native::register(class, "wait", "(J)V", wait_timed);
    native::register(class, "notify", "()V", notify);
    native::register(class, "notifyAll", "()V", notify_all);
}

/// Heap ids are stable for the object's lifetime, so the id is the identity
/// hash.
fn hash_code(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    Ok(Some(Value::Int(args[0].reference() as i32)))
}

fn equals(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let same = args[0].reference() == args[1].reference();
    Ok(Some(Value::Int(same as i32)))
}

fn to_string(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let id = args[0].reference();
    let object = heap::get_or_npe(id)?;
    let text = format!("{}@{:x}", object.class.name.replace('/', "."), id);
    Ok(Some(Value::Reference(heap::allocate_string(&text)?)))
}

fn get_class(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    Ok(Some(Value::Reference(heap::class_object(&object.class)?)))
}

fn clone(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    Ok(Some(Value::Reference(heap::clone_object(args[0].reference())?)))
}

fn wait(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    wait_on(vm_thread, args[0].reference(), None)
}

fn wait_timed(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let millis = args[1].long();
    if millis < 0 {
        return Err(Exception::vm_msg(
            "java/lang/IllegalArgumentException",
            "timeout value is negative",
        ));
    }
    let timeout = (millis > 0).then(|| Duration::from_millis(millis as u64));
    wait_on(vm_thread, args[0].reference(), timeout)
}

fn wait_on(
    vm_thread: &Arc<VmThread>,
    id: u32,
    timeout: Option<Duration>,
) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(id)?;
    // visible to interrupt() while the thread sits in the wait set
    *vm_thread.current_wait.lock() = Some(object.clone());
    let result = object.monitor.wait(vm_thread, timeout);
    *vm_thread.current_wait.lock() = None;
    result.map(|_| None)
}

fn notify(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    object.monitor.notify_one(vm_thread)?;
    Ok(None)
}

fn notify_all(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    object.monitor.notify_all(vm_thread)?;
    Ok(None)
}
