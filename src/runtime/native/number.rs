//! Primitive box classes and the `Float`/`Double` bit-pattern natives. Every
//! box stores its payload in a single `value` field.

use std::sync::Arc;

use crate::{
    descriptor::FieldType,
    runtime::{
        Class, Exception, NativeResult, class_loader, fmt, heap,
        heap::{NULL, Value},
        native,
        thread::VmThread,
    },
};

const BOX_CLASSES: &[&str] = &[
    "java/lang/Integer",
    "java/lang/Long",
    "java/lang/Float",
    "java/lang/Double",
    "java/lang/Boolean",
    "java/lang/Character",
    "java/lang/Short",
    "java/lang/Byte",
];

pub(super) fn register() {
    for class in BOX_CLASSES {
        native::register(class, "<init>", &init_descriptor(class), init);
        native::register(class, "toString", "()Ljava/lang/String;", to_string);
        native::register(class, "equals", "(Ljava/lang/Object;)Z", equals);
        native::register(class, "hashCode", "()I", hash_code);
    }
    native::register("java/lang/Integer", "intValue", "()I", box_value);
    native::register("java/lang/Long", "longValue", "()J", box_value);
    native::register("java/lang/Float", "floatValue", "()F", box_value);
    native::register("java/lang/Double", "doubleValue", "()D", box_value);
    native::register("java/lang/Boolean", "booleanValue", "()Z", box_value);
    native::register("java/lang/Character", "charValue", "()C", box_value);
    native::register("java/lang/Short", "shortValue", "()S", box_value);
    native::register("java/lang/Byte", "byteValue", "()B", box_value);

    native::register("java/lang/Integer", "valueOf", "(I)Ljava/lang/Integer;", |_, args| {
        Ok(Some(Value::Reference(box_primitive("java/lang/Integer", args[0])?)))
    });
    native::register("java/lang/Long", "valueOf", "(J)Ljava/lang/Long;", |_, args| {
        Ok(Some(Value::Reference(box_primitive("java/lang/Long", args[0])?)))
    });
    native::register("java/lang/Float", "valueOf", "(F)Ljava/lang/Float;", |_, args| {
        Ok(Some(Value::Reference(box_primitive("java/lang/Float", args[0])?)))
    });
    native::register("java/lang/Double", "valueOf", "(D)Ljava/lang/Double;", |_, args| {
        Ok(Some(Value::Reference(box_primitive("java/lang/Double", args[0])?)))
    });
    native::register("java/lang/Boolean", "valueOf", "(Z)Ljava/lang/Boolean;", |_, args| {
        Ok(Some(Value::Reference(box_primitive("java/lang/Boolean", args[0])?)))
    });
    native::register("java/lang/Character", "valueOf", "(C)Ljava/lang/Character;", |_, args| {
        Ok(Some(Value::Reference(box_primitive("java/lang/Character", args[0])?)))
    });
    native::register("java/lang/Short", "valueOf", "(S)Ljava/lang/Short;", |_, args| {
        Ok(Some(Value::Reference(box_primitive("java/lang/Short", args[0])?)))
    });
    native::register("java/lang/Byte", "valueOf", "(B)Ljava/lang/Byte;", |_, args| {
        Ok(Some(Value::Reference(box_primitive("java/lang/Byte", args[0])?)))
    });

    native::register("java/lang/Integer", "parseInt", "(Ljava/lang/String;)I", parse_int);
    native::register("java/lang/Integer", "toString", "(I)Ljava/lang/String;", |_, args| {
        string_result(args[0].int().to_string())
    });
    native::register("java/lang/Long", "toString", "(J)Ljava/lang/String;", |_, args| {
        string_result(args[0].long().to_string())
    });
    native::register("java/lang/Float", "toString", "(F)Ljava/lang/String;", |_, args| {
        string_result(fmt::float_to_string(args[0].float()))
    });
    native::register("java/lang/Double", "toString", "(D)Ljava/lang/String;", |_, args| {
        string_result(fmt::double_to_string(args[0].double()))
    });

    native::register("java/lang/Float", "floatToIntBits", "(F)I", |_, args| {
        let value = args[0].float();
        let bits = if value.is_nan() { 0x7fc0_0000 } else { value.to_bits() as i32 };
        Ok(Some(Value::Int(bits)))
    });
    native::register("java/lang/Float", "floatToRawIntBits", "(F)I", |_, args| {
        Ok(Some(Value::Int(args[0].float().to_bits() as i32)))
    });
    native::register("java/lang/Float", "intBitsToFloat", "(I)F", |_, args| {
        Ok(Some(Value::Float(f32::from_bits(args[0].int() as u32))))
    });
    native::register("java/lang/Float", "isNaN", "(F)Z", |_, args| {
        Ok(Some(Value::Int(args[0].float().is_nan() as i32)))
    });
    native::register("java/lang/Double", "doubleToLongBits", "(D)J", |_, args| {
        let value = args[0].double();
        let bits = if value.is_nan() {
            0x7ff8_0000_0000_0000
        } else {
            value.to_bits() as i64
        };
        Ok(Some(Value::Long(bits)))
    });
    native::register("java/lang/Double", "doubleToRawLongBits", "(D)J", |_, args| {
        Ok(Some(Value::Long(args[0].double().to_bits() as i64)))
    });
    native::register("java/lang/Double", "longBitsToDouble", "(J)D", |_, args| {
        Ok(Some(Value::Double(f64::from_bits(args[0].long() as u64))))
    });
    native::register("java/lang/Double", "isNaN", "(D)Z", |_, args| {
        Ok(Some(Value::Int(args[0].double().is_nan() as i32)))
    });
}

fn init_descriptor(class_name: &str) -> String {
    let descriptor = match class_name {
        "java/lang/Integer" => "I",
        "java/lang/Long" => "J",
        "java/lang/Float" => "F",
        "java/lang/Double" => "D",
        "java/lang/Boolean" => "Z",
        "java/lang/Character" => "C",
        "java/lang/Short" => "S",
        _ => "B",
    };
    format!("({descriptor})V")
}

fn value_slot(class: &Arc<Class>) -> usize {
    class
        .find_field("value")
        .map(|field| field.slot)
        .unwrap_or_else(|| panic!("box class {} without value field", class.name))
}

fn init(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    object.set_field(value_slot(&object.class), args[1]);
    Ok(None)
}

fn box_value(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    Ok(Some(object.get_field(value_slot(&object.class))))
}

/// Allocates a box of `class_name` around a primitive value.
pub(super) fn box_primitive(class_name: &str, value: Value) -> NativeResult<u32> {
    let class = class_loader::resolve_class(class_name)?;
    let id = heap::allocate_instance(&class)?;
    heap::get_or_npe(id)?.set_field(value_slot(&class), value);
    Ok(id)
}

/// Box class for a primitive field type.
pub(super) fn box_class_name(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::Boolean => "java/lang/Boolean",
        FieldType::Byte => "java/lang/Byte",
        FieldType::Char => "java/lang/Character",
        FieldType::Short => "java/lang/Short",
        FieldType::Int => "java/lang/Integer",
        FieldType::Long => "java/lang/Long",
        FieldType::Float => "java/lang/Float",
        FieldType::Double => "java/lang/Double",
        _ => panic!("not a primitive type"),
    }
}

/// Extracts the payload of a box whose class matches `field_type` exactly.
pub(super) fn unbox(field_type: &FieldType, id: u32) -> NativeResult<Value> {
    if id == NULL {
        return Err(Exception::vm_msg(
            "java/lang/IllegalArgumentException",
            "null cannot be unboxed",
        ));
    }
    let object = heap::get_or_npe(id)?;
    if object.class.name.as_ref() != box_class_name(field_type) {
        return Err(Exception::vm_msg(
            "java/lang/IllegalArgumentException",
            "argument type mismatch",
        ));
    }
    Ok(object.get_field(value_slot(&object.class)))
}

fn string_result(text: String) -> NativeResult<Option<Value>> {
    Ok(Some(Value::Reference(heap::allocate_string(&text)?)))
}

fn to_string(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    let value = object.get_field(value_slot(&object.class));
    let text = match (object.class.name.as_ref(), value) {
        ("java/lang/Boolean", Value::Int(v)) => {
            if v != 0 { "true".to_string() } else { "false".to_string() }
        }
        ("java/lang/Character", Value::Int(v)) => char::from_u32(v as u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
            .to_string(),
        (_, Value::Int(v)) => v.to_string(),
        (_, Value::Long(v)) => v.to_string(),
        (_, Value::Float(v)) => fmt::float_to_string(v),
        (_, Value::Double(v)) => fmt::double_to_string(v),
        (_, other) => panic!("box payload {other:?}"),
    };
    string_result(text)
}

fn equals(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    let other_id = args[1].reference();
    if other_id == NULL {
        return Ok(Some(Value::Int(0)));
    }
    let other = heap::get_or_npe(other_id)?;
    if !Arc::ptr_eq(&object.class, &other.class) {
        return Ok(Some(Value::Int(0)));
    }
    let slot = value_slot(&object.class);
    // float boxes compare by bit pattern so NaN equals NaN
    let same = match (object.get_field(slot), other.get_field(slot)) {
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Long(a), Value::Long(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
        _ => false,
    };
    Ok(Some(Value::Int(same as i32)))
}

fn hash_code(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    let hash = match object.get_field(value_slot(&object.class)) {
        Value::Int(v) => {
            if object.class.name.as_ref() == "java/lang/Boolean" {
                if v != 0 { 1231 } else { 1237 }
            } else {
                v
            }
        }
        Value::Long(v) => (v ^ ((v as u64) >> 32) as i64) as i32,
        Value::Float(v) => v.to_bits() as i32,
        Value::Double(v) => {
            let bits = v.to_bits();
            (bits ^ (bits >> 32)) as i32
        }
        other => panic!("box payload {other:?}"),
    };
    Ok(Some(Value::Int(hash)))
}

fn parse_int(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let id = args[0].reference();
    if id == NULL {
        return Err(Exception::vm_msg("java/lang/NumberFormatException", "null"));
    }
    let text = native::string_text(id)?;
    match text.parse::<i32>() {
        Ok(value) => Ok(Some(Value::Int(value))),
        Err(_) => Err(Exception::vm_msg(
            "java/lang/NumberFormatException",
            format!("For input string: \"{text}\""),
        )),
    }
}
