//! `java.lang.reflect` natives: Method, Field and the Array helpers.

use std::sync::Arc;

use crate::{
    descriptor::FieldType,
    runtime::{
        Class, Exception, MethodResolve, NativeResult, class_loader, heap,
        heap::{ArrayStorage, NULL, ObjectData, Value},
        inheritance, interpreter, native,
        native::number,
        thread::VmThread,
    },
};

pub(super) fn register() {
    let method = "java/lang/reflect/Method";
    native::register(method, "getName", "()Ljava/lang/String;", method_name);
    native::register(
        method,
        "invoke",
        "(Ljava/lang/Object;[Ljava/lang/Object;)Ljava/lang/Object;",
        invoke,
    );

    let field = "java/lang/reflect/Field";
    native::register(field, "getName", "()Ljava/lang/String;", field_name);
    native::register(field, "get", "(Ljava/lang/Object;)Ljava/lang/Object;", field_get);
    native::register(
        field,
        "set",
        "(Ljava/lang/Object;Ljava/lang/Object;)V",
        field_set,
    );

    let array = "java/lang/reflect/Array";
    native::register(array, "getLength", "(Ljava/lang/Object;)I", array_length);
    native::register(array, "get", "(Ljava/lang/Object;I)Ljava/lang/Object;", array_get);
    native::register(
        array,
        "set",
        "(Ljava/lang/Object;ILjava/lang/Object;)V",
        array_set,
    );
    native::register(
        array,
        "newInstance",
        "(Ljava/lang/Class;I)Ljava/lang/Object;",
        array_new_instance,
    );
}

fn argument_mismatch() -> Exception {
    Exception::vm_msg("java/lang/IllegalArgumentException", "argument type mismatch")
}

fn reference_class(field_type: &FieldType) -> NativeResult<Arc<Class>> {
    match field_type {
        FieldType::Object(name) => class_loader::resolve_class(name),
        FieldType::Array(_) => class_loader::resolve_class(&field_type.to_descriptor()),
        _ => panic!("not a reference type"),
    }
}

/// Boxes a raw value for return through an `Object`-typed reflective API.
fn box_result(field_type: &FieldType, value: Value) -> NativeResult<Value> {
    match field_type {
        FieldType::Object(_) | FieldType::Array(_) => Ok(value),
        primitive => Ok(Value::Reference(number::box_primitive(
            number::box_class_name(primitive),
            value,
        )?)),
    }
}

/// Converts an `Object`-typed reflective argument into the raw value a
/// `field_type` slot takes.
fn unbox_argument(field_type: &FieldType, value: Value) -> NativeResult<Value> {
    match field_type {
        FieldType::Object(_) | FieldType::Array(_) => {
            let id = value.reference();
            if id != NULL {
                let object = heap::get_or_npe(id)?;
                if !inheritance::is_assignable(&object.class, &reference_class(field_type)?) {
                    return Err(argument_mismatch());
                }
            }
            Ok(value)
        }
        primitive => number::unbox(primitive, value.reference()),
    }
}

fn method_name(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    match &object.data {
        ObjectData::Method { method, .. } => {
            Ok(Some(Value::Reference(heap::allocate_string(&method.name)?)))
        }
        _ => Err(argument_mismatch()),
    }
}

fn invoke(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let handle = heap::get_or_npe(args[0].reference())?;
    let (declaring, method) = match &handle.data {
        ObjectData::Method { declaring, method } => (declaring.clone(), method.clone()),
        _ => return Err(argument_mismatch()),
    };

    let receiver_id = args[1].reference();
    let arguments_id = args[2].reference();

    let boxed: Vec<u32> = if arguments_id == NULL {
        Vec::new()
    } else {
        let object = heap::get_or_npe(arguments_id)?;
        let storage = object.array().read();
        match &*storage {
            ArrayStorage::Reference(slots) => slots.clone(),
            _ => return Err(argument_mismatch()),
        }
    };
    if boxed.len() != method.descriptor.parameters.len() {
        return Err(Exception::vm_msg(
            "java/lang/IllegalArgumentException",
            "wrong number of arguments",
        ));
    }

    let mut call_args = Vec::with_capacity(boxed.len() + 1);
    let target = if method.is_static() {
        class_loader::ensure_initialized(vm_thread, &declaring)?;
        MethodResolve {
            class: declaring,
            method: method.clone(),
        }
    } else {
        let receiver = heap::get_or_npe(receiver_id)?;
        if !inheritance::is_assignable(&receiver.class, &declaring) {
            return Err(argument_mismatch());
        }
        call_args.push(Value::Reference(receiver_id));
        class_loader::select_method(&receiver.class, &method.name, &method.descriptor_str)?
    };
    for (parameter, argument) in method.descriptor.parameters.iter().zip(&boxed) {
        call_args.push(unbox_argument(parameter, Value::Reference(*argument))?);
    }

    let result = interpreter::call_method(vm_thread, &target.class, &target.method, call_args)?;
    match (&method.descriptor.return_type, result) {
        (Some(return_type), Some(value)) => Ok(Some(box_result(return_type, value)?)),
        _ => Ok(Some(Value::Reference(NULL))),
    }
}

fn field_name(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = heap::get_or_npe(args[0].reference())?;
    match &object.data {
        ObjectData::Field { field, .. } => {
            Ok(Some(Value::Reference(heap::allocate_string(&field.name)?)))
        }
        _ => Err(argument_mismatch()),
    }
}

fn field_get(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let handle = heap::get_or_npe(args[0].reference())?;
    let (declaring, field) = match &handle.data {
        ObjectData::Field { declaring, field } => (declaring.clone(), field.clone()),
        _ => return Err(argument_mismatch()),
    };
    let raw = if field.is_static() {
        class_loader::ensure_initialized(vm_thread, &declaring)?;
        declaring.static_value(field.slot)
    } else {
        let object = heap::get_or_npe(args[1].reference())?;
        if !inheritance::is_assignable(&object.class, &declaring) {
            return Err(argument_mismatch());
        }
        object.get_field(field.slot)
    };
    Ok(Some(box_result(field.field_type(), raw)?))
}

fn field_set(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let handle = heap::get_or_npe(args[0].reference())?;
    let (declaring, field) = match &handle.data {
        ObjectData::Field { declaring, field } => (declaring.clone(), field.clone()),
        _ => return Err(argument_mismatch()),
    };
    let raw = unbox_argument(field.field_type(), args[2])?;
    if field.is_static() {
        class_loader::ensure_initialized(vm_thread, &declaring)?;
        declaring.set_static_value(field.slot, raw);
    } else {
        let object = heap::get_or_npe(args[1].reference())?;
        if !inheritance::is_assignable(&object.class, &declaring) {
            return Err(argument_mismatch());
        }
        object.set_field(field.slot, raw);
    }
    Ok(None)
}

fn array_object(id: u32) -> NativeResult<Arc<heap::HeapObject>> {
    let object = heap::get_or_npe(id)?;
    if !object.class.is_array() {
        return Err(argument_mismatch());
    }
    Ok(object)
}

fn array_length(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = array_object(args[0].reference())?;
    Ok(Some(Value::Int(object.array_length() as i32)))
}

fn check_index(index: i32, length: usize) -> NativeResult<usize> {
    if index < 0 || index as usize >= length {
        return Err(Exception::vm_msg(
            "java/lang/ArrayIndexOutOfBoundsException",
            format!("Index {index} out of bounds for length {length}"),
        ));
    }
    Ok(index as usize)
}

fn array_get(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = array_object(args[0].reference())?;
    let storage = object.array().read();
    // index validity is decided before looking at the element type
    let i = check_index(args[1].int(), storage.len())?;
    let value = match &*storage {
        ArrayStorage::Reference(v) => return Ok(Some(Value::Reference(v[i]))),
        ArrayStorage::Byte(v) => (FieldType::Byte, Value::Int(v[i] as i32)),
        ArrayStorage::Char(v) => (FieldType::Char, Value::Int(v[i] as i32)),
        ArrayStorage::Short(v) => (FieldType::Short, Value::Int(v[i] as i32)),
        ArrayStorage::Int(v) => (FieldType::Int, Value::Int(v[i])),
        ArrayStorage::Long(v) => (FieldType::Long, Value::Long(v[i])),
        ArrayStorage::Float(v) => (FieldType::Float, Value::Float(v[i])),
        ArrayStorage::Double(v) => (FieldType::Double, Value::Double(v[i])),
    };
    drop(storage);
    let (field_type, raw) = value;
    // boolean arrays share byte storage; report the declared component
    let field_type = match &object.class.array {
        Some(crate::runtime::ArrayKind::Primitive(FieldType::Boolean)) => FieldType::Boolean,
        _ => field_type,
    };
    Ok(Some(box_result(&field_type, raw)?))
}

fn array_set(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let object = array_object(args[0].reference())?;
    let component = match &object.class.array {
        Some(crate::runtime::ArrayKind::Primitive(primitive)) => primitive.clone(),
        Some(crate::runtime::ArrayKind::Reference(element)) => {
            FieldType::Object(element.name.clone())
        }
        None => return Err(argument_mismatch()),
    };
    let mut storage = object.array().write();
    let i = check_index(args[1].int(), storage.len())?;
    match (&mut *storage, &component) {
        (ArrayStorage::Reference(v), _) => {
            let id = args[2].reference();
            if id != NULL {
                let stored = heap::get_or_npe(id)?;
                if let Some(crate::runtime::ArrayKind::Reference(element)) = &object.class.array {
                    if !inheritance::is_assignable(&stored.class, element) {
                        return Err(argument_mismatch());
                    }
                }
            }
            v[i] = id;
        }
        (ArrayStorage::Byte(v), _) => v[i] = number::unbox(&component, args[2].reference())?.int() as i8,
        (ArrayStorage::Char(v), _) => v[i] = number::unbox(&component, args[2].reference())?.int() as u16,
        (ArrayStorage::Short(v), _) => v[i] = number::unbox(&component, args[2].reference())?.int() as i16,
        (ArrayStorage::Int(v), _) => v[i] = number::unbox(&component, args[2].reference())?.int(),
        (ArrayStorage::Long(v), _) => v[i] = number::unbox(&component, args[2].reference())?.long(),
        (ArrayStorage::Float(v), _) => v[i] = number::unbox(&component, args[2].reference())?.float(),
        (ArrayStorage::Double(v), _) => v[i] = number::unbox(&component, args[2].reference())?.double(),
    }
    Ok(None)
}

fn array_new_instance(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let mirror = heap::get_or_npe(args[0].reference())?;
    let component = mirror.mirrored_class().ok_or_else(argument_mismatch)?;
    let component_type = super::class::mirror_field_type(&component);
    let array_class = class_loader::array_class_of(&component_type)?;
    let id = heap::allocate_array(&array_class, args[1].int())?;
    Ok(Some(Value::Reference(id)))
}
