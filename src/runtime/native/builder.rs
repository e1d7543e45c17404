//! `java.lang.StringBuilder` natives over the host-string backing buffer.

use std::sync::Arc;

use crate::runtime::{
    NativeResult, fmt, heap,
    heap::{NULL, Value},
    native,
    thread::VmThread,
};

pub(super) fn register() {
    let class = "java/lang/StringBuilder";
    native::register(class, "<init>", "()V", |_, _| Ok(None));
    native::register(class, "<init>", "(Ljava/lang/String;)V", init_from_string);
    native::register(
        class,
        "append",
        "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
        append_string,
    );
    native::register(
        class,
        "append",
        "(Ljava/lang/Object;)Ljava/lang/StringBuilder;",
        append_object,
    );
    native::register(class, "append", "(I)Ljava/lang/StringBuilder;", append_int);
    native::register(class, "append", "(J)Ljava/lang/StringBuilder;", append_long);
    native::register(class, "append", "(C)Ljava/lang/StringBuilder;", append_char);
    native::register(class, "append", "(Z)Ljava/lang/StringBuilder;", append_boolean);
    native::register(class, "append", "(F)Ljava/lang/StringBuilder;", append_float);
    native::register(class, "append", "(D)Ljava/lang/StringBuilder;", append_double);
    native::register(class, "toString", "()Ljava/lang/String;", to_string);
    native::register(class, "length", "()I", length);
}

fn append_text(receiver: Value, text: &str) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(receiver.reference())?;
    match object.builder() {
        Some(buffer) => buffer.lock().push_str(text),
        None => panic!("append on non-builder object"),
    }
    Ok(Some(receiver))
}

fn init_from_string(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = native::string_text(args[1].reference())?;
    append_text(args[0], &text)?;
    Ok(None)
}

fn append_string(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let id = args[1].reference();
    if id == NULL {
        return append_text(args[0], "null");
    }
    let text = native::string_text(id)?;
    append_text(args[0], &text)
}

fn append_object(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = native::guest_to_string(vm_thread, args[1].reference())?;
    append_text(args[0], &text)
}

fn append_int(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    append_text(args[0], &args[1].int().to_string())
}

fn append_long(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    append_text(args[0], &args[1].long().to_string())
}

fn append_char(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let code = args[1].int() as u32;
    let ch = char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
    append_text(args[0], &ch.to_string())
}

fn append_boolean(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    append_text(args[0], if args[1].int() != 0 { "true" } else { "false" })
}

fn append_float(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    append_text(args[0], &fmt::float_to_string(args[1].float()))
}

fn append_double(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    append_text(args[0], &fmt::double_to_string(args[1].double()))
}

fn to_string(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    let text = match object.builder() {
        Some(buffer) => buffer.lock().clone(),
        None => panic!("toString on non-builder object"),
    };
    Ok(Some(Value::Reference(heap::allocate_string(&text)?)))
}

fn length(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    let count = match object.builder() {
        Some(buffer) => buffer.lock().encode_utf16().count(),
        None => panic!("length on non-builder object"),
    };
    Ok(Some(Value::Int(count as i32)))
}
