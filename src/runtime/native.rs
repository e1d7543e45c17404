//! Native method registry. Intrinsic classes declare `ACC_NATIVE` methods;
//! the interpreter routes them here by (class, name, descriptor). Arguments
//! arrive in logical order, receiver first for instance methods.

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use crate::runtime::{
    Class, Exception, MethodInfo, NativeResult, class_loader,
    heap::{self, NULL, Value},
    interpreter, thread::VmThread,
};

mod builder;
mod class;
mod number;
mod object;
mod print_stream;
mod reflect;
mod string;
mod system;
mod thread;
mod throwable;

pub type NativeFunction = fn(&Arc<VmThread>, Vec<Value>) -> NativeResult<Option<Value>>;

type NativeKey = (Arc<str>, Arc<str>, Arc<str>);

static NATIVE_FUNCTIONS: LazyLock<DashMap<NativeKey, NativeFunction>> =
    LazyLock::new(DashMap::new);

pub fn register(class_name: &str, method_name: &str, descriptor: &str, function: NativeFunction) {
    NATIVE_FUNCTIONS.insert(
        (
            Arc::from(class_name),
            Arc::from(method_name),
            Arc::from(descriptor),
        ),
        function,
    );
}

/// Fills the registry. Called once during bootstrap.
pub fn register_natives() {
    object::register();
    string::register();
    builder::register();
    class::register();
    throwable::register();
    print_stream::register();
    system::register();
    thread::register();
    number::register();
    reflect::register();
}

pub fn dispatch(
    vm_thread: &Arc<VmThread>,
    class: &Arc<Class>,
    method: &Arc<MethodInfo>,
    args: Vec<Value>,
) -> NativeResult<Option<Value>> {
    let key = (
        class.name.clone(),
        method.name.clone(),
        method.descriptor_str.clone(),
    );
    match NATIVE_FUNCTIONS.get(&key) {
        Some(function) => function(vm_thread, args),
        None => Err(Exception::vm_msg(
            "java/lang/UnsatisfiedLinkError",
            format!("{}.{}{}", class.name, method.name, method.descriptor_str),
        )),
    }
}

/// Text of a guest string object.
pub(crate) fn string_text(id: u32) -> NativeResult<Arc<str>> {
    heap::get_or_npe(id)?.string_value().ok_or_else(|| {
        Exception::vm_msg("java/lang/IllegalArgumentException", "not a string")
    })
}

/// Renders a reference like `String.valueOf(Object)` does: null prints
/// "null", everything else goes through the dynamic `toString`.
pub(crate) fn guest_to_string(vm_thread: &Arc<VmThread>, id: u32) -> NativeResult<String> {
    if id == NULL {
        return Ok("null".to_string());
    }
    let object = heap::get_or_npe(id)?;
    let target = class_loader::select_method(&object.class, "toString", "()Ljava/lang/String;")?;
    let result = interpreter::call_method(
        vm_thread,
        &target.class,
        &target.method,
        vec![Value::Reference(id)],
    )?;
    match result {
        Some(Value::Reference(string_id)) if string_id != NULL => {
            Ok(string_text(string_id)?.to_string())
        }
        _ => Ok("null".to_string()),
    }
}
