//! Interned strings. The table is keyed by content, so every literal spelling
//! (including names like `__proto__` or `valueOf`) is an ordinary key.

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use crate::runtime::{NativeResult, heap};

static TABLE: LazyLock<DashMap<Arc<str>, u32>> = LazyLock::new(DashMap::new);

/// Reference of the canonical string object for `value`, allocating it on
/// first sight. Two racing interns settle on a single winner.
pub fn intern(value: &str) -> NativeResult<u32> {
    if let Some(id) = TABLE.get(value) {
        return Ok(*id);
    }
    let id = heap::allocate_string(value)?;
    Ok(*TABLE.entry(Arc::from(value)).or_insert(id))
}

/// `String.intern`: an existing object becomes the canonical one if its
/// content is not interned yet.
pub fn intern_object(id: u32) -> NativeResult<u32> {
    let object = heap::get_or_npe(id)?;
    let value = object
        .string_value()
        .unwrap_or_else(|| Arc::from(""));
    Ok(*TABLE.entry(value).or_insert(id))
}
