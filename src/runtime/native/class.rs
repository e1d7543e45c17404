//! `java.lang.Class` natives over the mirror objects.

use std::sync::Arc;

use crate::{
    descriptor::FieldType,
    runtime::{
        ArrayKind, Class, Exception, NativeResult, class_loader, heap,
        heap::{NULL, Value},
        inheritance, interpreter, native,
        thread::VmThread,
    },
};

pub(super) fn register() {
    let class = "java/lang/Class";
    native::register(class, "getName", "()Ljava/lang/String;", get_name);
    native::register(class, "toString", "()Ljava/lang/String;", to_string);
    native::register(class, "isArray", "()Z", is_array);
    native::register(class, "isInterface", "()Z", is_interface);
    native::register(class, "isPrimitive", "()Z", is_primitive);
    native::register(class, "getComponentType", "()Ljava/lang/Class;", component_type);
    native::register(class, "isInstance", "(Ljava/lang/Object;)Z", is_instance);
    native::register(class, "newInstance", "()Ljava/lang/Object;", new_instance);
    native::register(
        class,
        "getMethod",
        "(Ljava/lang/String;[Ljava/lang/Class;)Ljava/lang/reflect/Method;",
        get_method,
    );
    native::register(
        class,
        "getField",
        "(Ljava/lang/String;)Ljava/lang/reflect/Field;",
        get_field,
    );
}

fn mirrored(id: u32) -> NativeResult<Arc<Class>> {
    heap::get_or_npe(id)?.mirrored_class().ok_or_else(|| {
        Exception::vm_msg("java/lang/IllegalArgumentException", "not a class object")
    })
}

/// The type a mirror stands for when it appears in a parameter list.
pub(super) fn mirror_field_type(class: &Arc<Class>) -> FieldType {
    if let Some(primitive) = &class.primitive {
        primitive.clone()
    } else if class.is_array() {
        // array class names are already descriptors
        crate::descriptor::parse_field_descriptor(&class.name)
            .map(|(_, d)| d.0)
            .unwrap_or_else(|_| FieldType::Object(class.name.clone()))
    } else {
        FieldType::Object(class.name.clone())
    }
}

fn get_name(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let class = mirrored(args[0].reference())?;
    let name = class.name.replace('/', ".");
    Ok(Some(Value::Reference(heap::allocate_string(&name)?)))
}

fn to_string(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let class = mirrored(args[0].reference())?;
    let text = if class.is_primitive() {
        class.name.to_string()
    } else if class.is_interface() {
        format!("interface {}", class.name.replace('/', "."))
    } else {
        format!("class {}", class.name.replace('/', "."))
    };
    Ok(Some(Value::Reference(heap::allocate_string(&text)?)))
}

fn is_array(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let class = mirrored(args[0].reference())?;
    Ok(Some(Value::Int(class.is_array() as i32)))
}

fn is_interface(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let class = mirrored(args[0].reference())?;
    Ok(Some(Value::Int(class.is_interface() as i32)))
}

fn is_primitive(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let class = mirrored(args[0].reference())?;
    Ok(Some(Value::Int(class.is_primitive() as i32)))
}

fn component_type(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let class = mirrored(args[0].reference())?;
    let component = match &class.array {
        Some(ArrayKind::Reference(element)) => element.clone(),
        Some(ArrayKind::Primitive(primitive)) => {
            class_loader::resolve_class(primitive_name(primitive))?
        }
        None => return Ok(Some(Value::Reference(NULL))),
    };
    Ok(Some(Value::Reference(heap::class_object(&component)?)))
}

pub(super) fn primitive_name(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::Boolean => "boolean",
        FieldType::Byte => "byte",
        FieldType::Char => "char",
        FieldType::Short => "short",
        FieldType::Int => "int",
        FieldType::Long => "long",
        FieldType::Float => "float",
        FieldType::Double => "double",
        _ => panic!("not a primitive type"),
    }
}

fn is_instance(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let class = mirrored(args[0].reference())?;
    let id = args[1].reference();
    let result = if id == NULL {
        0
    } else {
        inheritance::is_assignable(&heap::get_or_npe(id)?.class, &class) as i32
    };
    Ok(Some(Value::Int(result)))
}

fn new_instance(vm_thread: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let class = mirrored(args[0].reference())?;
    if class.is_interface() || class.is_array() || class.is_primitive() {
        return Err(Exception::vm_msg(
            "java/lang/InstantiationException",
            class.name.replace('/', "."),
        ));
    }
    let constructor = class.find_method("<init>", "()V").ok_or_else(|| {
        Exception::vm_msg(
            "java/lang/InstantiationException",
            class.name.replace('/', "."),
        )
    })?;
    class_loader::ensure_initialized(vm_thread, &class)?;
    let id = heap::allocate_instance(&class)?;
    interpreter::call_method(vm_thread, &class, &constructor, vec![Value::Reference(id)])?;
    Ok(Some(Value::Reference(id)))
}

fn get_method(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let class = mirrored(args[0].reference())?;
    let name = native::string_text(args[1].reference())?;

    let mut parameter_types = Vec::new();
    let types_id = args[2].reference();
    if types_id != NULL {
        let object = heap::get_or_npe(types_id)?;
        let storage = object.array().read();
        if let crate::runtime::heap::ArrayStorage::Reference(slots) = &*storage {
            for slot in slots {
                parameter_types.push(mirror_field_type(&mirrored(*slot)?));
            }
        }
    }

    let mut current = Some(class.clone());
    while let Some(c) = current {
        if let Some(method) = c
            .methods
            .iter()
            .find(|m| m.name.as_ref() == name.as_ref() && m.descriptor.parameters == parameter_types)
        {
            return Ok(Some(Value::Reference(heap::method_object(&c, method)?)));
        }
        current = c.super_class.clone();
    }
    Err(Exception::vm_msg(
        "java/lang/NoSuchMethodException",
        format!("{}.{}", class.name.replace('/', "."), name),
    ))
}

fn get_field(_: &Arc<VmThread>, args: Vec<Value>) -> NativeResult<Option<Value>> {
    let class = mirrored(args[0].reference())?;
    let name = native::string_text(args[1].reference())?;
    match class_loader::resolve_field(&class, &name) {
        Some(resolve) => Ok(Some(Value::Reference(heap::field_object(
            &resolve.class,
            &resolve.field,
        )?))),
        None => Err(Exception::vm_msg(
            "java/lang/NoSuchFieldException",
            format!("{}.{}", class.name.replace('/', "."), name),
        )),
    }
}
