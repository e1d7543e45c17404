//! `java.lang.Throwable` and the intrinsic exception hierarchy. Every class
//! in the hierarchy declares its own native constructors, so each gets a
//! registration; behavior lives on `Throwable`.

use std::sync::Arc;

use crate::runtime::{
    NativeResult, class_loader, heap,
    heap::{NULL, Value},
    interpreter, native, stdio,
    thread::VmThread,
};

pub(super) fn register() {
    let class = "java/lang/Throwable";
    native::register(class, "<init>", "()V", |_, _| Ok(None));
    native::register(class, "<init>", "(Ljava/lang/String;)V", init_with_message);
    native::register(class, "getMessage", "()Ljava/lang/String;", get_message);
    native::register(class, "toString", "()Ljava/lang/String;", to_string);
    native::register(class, "printStackTrace", "()V", print_stack_trace);

    for (name, _) in class_loader::bootstrap::THROWABLE_HIERARCHY {
        native::register(name, "<init>", "()V", |_, _| Ok(None));
        native::register(name, "<init>", "(Ljava/lang/String;)V", init_with_message);
    }
}

fn init_with_message(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    if let Some(resolve) = class_loader::resolve_field(&object.class, "detailMessage") {
        object.set_field(resolve.field.slot, args[1]);
    }
    Ok(None)
}

fn get_message(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    let value = match class_loader::resolve_field(&object.class, "detailMessage") {
        Some(resolve) => object.get_field(resolve.field.slot),
        None => Value::Reference(NULL),
    };
    Ok(Some(value))
}

fn to_string(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = interpreter::describe_throwable(args[0].reference());
    Ok(Some(Value::Reference(heap::allocate_string(&text)?)))
}

/// No stack trace is recorded; this prints the header line only.
fn print_stack_trace(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = interpreter::describe_throwable(args[0].reference());
    stdio::write_err(&format!("{text}\n"));
    Ok(None)
}
