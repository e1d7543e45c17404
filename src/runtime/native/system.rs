//! `java.lang.System` natives.

use std::{
    sync::{Arc, LazyLock},
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use crate::runtime::{
    ArrayKind, Exception, NativeResult, heap,
    heap::{ArrayStorage, NULL, Value},
    inheritance, native,
    thread::VmThread,
};

pub(super) fn register() {
    let class = "java/lang/System";
    native::register(
        class,
        "arraycopy",
        "(Ljava/lang/Object;ILjava/lang/Object;II)V",
        arraycopy,
    );
    native::register(class, "currentTimeMillis", "()J", current_time_millis);
    native::register(class, "nanoTime", "()J", nano_time);
    native::register(class, "identityHashCode", "(Ljava/lang/Object;)I", identity_hash_code);
    native::register(class, "exit", "(I)V", exit);
}

fn current_time_millis(_: &Arc<VmThread>, _: Vec<Value>) -> NativeResult<Option<Value>> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    Ok(Some(Value::Long(millis)))
}

static NANO_ORIGIN: LazyLock<Instant> = LazyLock::new(Instant::now);

fn nano_time(_: &Arc<VmThread>, _: Vec<Value>) -> NativeResult<Option<Value>> {
    Ok(Some(Value::Long(NANO_ORIGIN.elapsed().as_nanos() as i64)))
}

fn identity_hash_code(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    Ok(Some(Value::Int(args[0].reference() as i32)))
}

fn exit(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    std::process::exit(args[0].int());
}

fn store_error(class_name: &str) -> Exception {
    Exception::vm_msg("java/lang/ArrayStoreException", class_name.replace('/', "."))
}

fn arraycopy(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let src_id = args[0].reference();
    let src_pos = args[1].int();
    let dest_id = args[2].reference();
    let dest_pos = args[3].int();
    let length = args[4].int();

    let src = heap::get_or_npe(src_id)?;
    let dest = heap::get_or_npe(dest_id)?;
    if !src.class.is_array() {
        return Err(store_error(&src.class.name));
    }
    if !dest.class.is_array() {
        return Err(store_error(&dest.class.name));
    }

    if src_pos < 0
        || dest_pos < 0
        || length < 0
        || src_pos as usize + length as usize > src.array_length()
        || dest_pos as usize + length as usize > dest.array_length()
    {
        return Err(Exception::vm_msg(
            "java/lang/IndexOutOfBoundsException",
            format!("arraycopy [{src_pos}..+{length}] -> [{dest_pos}..+{length}]"),
        ));
    }
    let (from, to, count) = (src_pos as usize, dest_pos as usize, length as usize);

    if src_id == dest_id {
        let mut storage = dest.array().write();
        copy_within(&mut storage, from, to, count);
        return Ok(None);
    }

    let source = src.array().read().clone();
    let mut target = dest.array().write();
    match (&source, &mut *target) {
        (ArrayStorage::Byte(s), ArrayStorage::Byte(d)) => d[to..to + count].copy_from_slice(&s[from..from + count]),
        (ArrayStorage::Char(s), ArrayStorage::Char(d)) => d[to..to + count].copy_from_slice(&s[from..from + count]),
        (ArrayStorage::Short(s), ArrayStorage::Short(d)) => d[to..to + count].copy_from_slice(&s[from..from + count]),
        (ArrayStorage::Int(s), ArrayStorage::Int(d)) => d[to..to + count].copy_from_slice(&s[from..from + count]),
        (ArrayStorage::Long(s), ArrayStorage::Long(d)) => d[to..to + count].copy_from_slice(&s[from..from + count]),
        (ArrayStorage::Float(s), ArrayStorage::Float(d)) => d[to..to + count].copy_from_slice(&s[from..from + count]),
        (ArrayStorage::Double(s), ArrayStorage::Double(d)) => d[to..to + count].copy_from_slice(&s[from..from + count]),
        (ArrayStorage::Reference(s), ArrayStorage::Reference(d)) => {
            let element = match &dest.class.array {
                Some(ArrayKind::Reference(element)) => Some(element.clone()),
                _ => None,
            };
            // element checks run one by one; elements before the first
            // mismatch stay copied
            for offset in 0..count {
                let value = s[from + offset];
                if value != NULL {
                    if let Some(element) = &element {
                        let stored = heap::get_or_npe(value)?;
                        if !inheritance::is_assignable(&stored.class, element) {
                            return Err(store_error(&stored.class.name));
                        }
                    }
                }
                d[to + offset] = value;
            }
        }
        _ => return Err(store_error(&src.class.name)),
    }
    Ok(None)
}

fn copy_within(storage: &mut ArrayStorage, from: usize, to: usize, count: usize) {
    match storage {
        ArrayStorage::Byte(v) => v.copy_within(from..from + count, to),
        ArrayStorage::Char(v) => v.copy_within(from..from + count, to),
        ArrayStorage::Short(v) => v.copy_within(from..from + count, to),
        ArrayStorage::Int(v) => v.copy_within(from..from + count, to),
        ArrayStorage::Long(v) => v.copy_within(from..from + count, to),
        ArrayStorage::Float(v) => v.copy_within(from..from + count, to),
        ArrayStorage::Double(v) => v.copy_within(from..from + count, to),
        ArrayStorage::Reference(v) => v.copy_within(from..from + count, to),
    }
}
