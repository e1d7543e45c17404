//! `java.io.PrintStream` natives for `System.out` / `System.err`.

use std::sync::Arc;

use crate::runtime::{
    NativeResult, fmt,
    heap::{NULL, Value},
    native, stdio,
    thread::VmThread,
};

pub(super) fn register() {
    let class = "java/io/PrintStream";
    native::register(class, "println", "()V", |_, args| write(args[0], "", true));
    native::register(class, "println", "(Ljava/lang/String;)V", println_string);
    native::register(class, "println", "(Ljava/lang/Object;)V", println_object);
    native::register(class, "println", "(I)V", |_, args| {
        write(args[0], &args[1].int().to_string(), true)
    });
    native::register(class, "println", "(J)V", |_, args| {
        write(args[0], &args[1].long().to_string(), true)
    });
    native::register(class, "println", "(F)V", |_, args| {
        write(args[0], &fmt::float_to_string(args[1].float()), true)
    });
    native::register(class, "println", "(D)V", |_, args| {
        write(args[0], &fmt::double_to_string(args[1].double()), true)
    });
    native::register(class, "println", "(Z)V", |_, args| {
        write(args[0], boolean_text(args[1]), true)
    });
    native::register(class, "println", "(C)V", |_, args| {
        write(args[0], &char_text(args[1]), true)
    });
    native::register(class, "print", "(Ljava/lang/String;)V", print_string);
    native::register(class, "print", "(Ljava/lang/Object;)V", print_object);
    native::register(class, "print", "(I)V", |_, args| {
        write(args[0], &args[1].int().to_string(), false)
    });
    native::register(class, "print", "(J)V", |_, args| {
        write(args[0], &args[1].long().to_string(), false)
    });
    native::register(class, "print", "(F)V", |_, args| {
        write(args[0], &fmt::float_to_string(args[1].float()), false)
    });
    native::register(class, "print", "(D)V", |_, args| {
        write(args[0], &fmt::double_to_string(args[1].double()), false)
    });
    native::register(class, "print", "(Z)V", |_, args| {
        write(args[0], boolean_text(args[1]), false)
    });
    native::register(class, "print", "(C)V", |_, args| {
        write(args[0], &char_text(args[1]), false)
    });
    native::register(class, "flush", "()V", |_, _| Ok(None));
}

fn boolean_text(value: Value) -> &'static str {
    if value.int() != 0 { "true" } else { "false" }
}

fn char_text(value: Value) -> String {
    char::from_u32(value.int() as u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
        .to_string()
}

fn write(receiver: Value, text: &str, newline: bool) -> NativeResult<Option<Value>> {
    let stream_id = receiver.reference();
    let line = if newline {
        format!("{text}\n")
    } else {
        text.to_string()
    };
    if stdio::is_err_stream(stream_id) {
        stdio::write_err(&line);
    } else {
        stdio::write_out(&line);
    }
    Ok(None)
}

fn string_or_null(id: u32) -> NativeResult<String> {
    if id == NULL {
        Ok("null".to_string())
    } else {
        Ok(native::string_text(id)?.to_string())
    }
}

fn println_string(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = string_or_null(args[1].reference())?;
    write(args[0], &text, true)
}

fn print_string(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = string_or_null(args[1].reference())?;
    write(args[0], &text, false)
}

fn println_object(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = native::guest_to_string(vm_thread, args[1].reference())?;
    write(args[0], &text, true)
}

fn print_object(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = native::guest_to_string(vm_thread, args[1].reference())?;
    write(args[0], &text, false)
}
