//! `java.lang.String` natives. Guest strings are immutable host strings;
//! index-based operations work in UTF-16 code units.

use std::sync::Arc;

use crate::runtime::{
    Exception, NativeResult, heap,
    heap::{NULL, Value, string_table},
    native,
    thread::VmThread,
};

pub(super) fn register() {
    let class = "java/lang/String";
    native::register(class, "<init>", "()V", |_, _| Ok(None));
    native::register(class, "length", "()I", length);
    native::register(class, "isEmpty", "()Z", is_empty);
    native::register(class, "charAt", "(I)C", char_at);
    native::register(class, "hashCode", "()I", hash_code);
    native::register(class, "equals", "(Ljava/lang/Object;)Z", equals);
    native::register(class, "toString", "()Ljava/lang/String;", to_string);
    native::register(class, "intern", "()Ljava/lang/String;", intern);
    native::register(
        class,
        "concat",
        "(Ljava/lang/String;)Ljava/lang/String;",
        concat,
    );
}

fn length(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = native::string_text(args[0].reference())?;
    Ok(Some(Value::Int(text.encode_utf16().count() as i32)))
}

fn is_empty(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = native::string_text(args[0].reference())?;
    Ok(Some(Value::Int(text.is_empty() as i32)))
}

fn char_at(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = native::string_text(args[0].reference())?;
    let index = args[1].int();
    if index < 0 {
        return Err(index_error(index));
    }
    match text.encode_utf16().nth(index as usize) {
        Some(unit) => Ok(Some(Value::Int(unit as i32))),
        None => Err(index_error(index)),
    }
}

fn index_error(index: i32) -> Exception {
    Exception::vm_msg(
        "java/lang/StringIndexOutOfBoundsException",
        format!("index {index}"),
    )
}

/// The published polynomial hash over UTF-16 units, 31 as the multiplier.
fn hash_code(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = native::string_text(args[0].reference())?;
    let hash = text
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32));
    Ok(Some(Value::Int(hash)))
}

fn equals(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = native::string_text(args[0].reference())?;
    let other = args[1].reference();
    let same = other != NULL
        && heap::get_or_npe(other)?
            .string_value()
            .is_some_and(|value| value == text);
    Ok(Some(Value::Int(same as i32)))
}

fn to_string(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    Ok(Some(args[0]))
}

fn intern(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = native::string_text(args[0].reference())?;
    Ok(Some(Value::Reference(string_table::intern(&text)?)))
}

fn concat(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let text = native::string_text(args[0].reference())?;
    let suffix = native::string_text(args[1].reference())?;
    if suffix.is_empty() {
        return Ok(Some(args[0]));
    }
    let combined = format!("{text}{suffix}");
    Ok(Some(Value::Reference(heap::allocate_string(&combined)?)))
}
