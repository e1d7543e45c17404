//! Id-indexed object heap. Reference 0 is null. Objects are never moved or
//! collected; `Arc` keeps them alive for as long as anything observes them.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::{
    descriptor::FieldType,
    runtime::{
        ArrayKind, Class, Exception, FieldInfo, MethodInfo, NativeResult, class_loader,
        global::HEAP, monitor::Monitor,
    },
};

pub mod string_table;

pub const NULL: u32 = 0;

/// One slot of a local-variable table, operand stack, or field storage.
/// Category-2 values take a single logical slot in field storage but are
/// followed by `Padding` on the stack and in locals.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Reference(u32),
    ReturnAddress(u32),
    Padding,
}

impl Value {
    pub fn int(self) -> i32 {
        match self {
            Value::Int(v) => v,
            other => panic!("expected int slot, found {other:?}"),
        }
    }

    pub fn float(self) -> f32 {
        match self {
            Value::Float(v) => v,
            other => panic!("expected float slot, found {other:?}"),
        }
    }

    pub fn long(self) -> i64 {
        match self {
            Value::Long(v) => v,
            other => panic!("expected long slot, found {other:?}"),
        }
    }

    pub fn double(self) -> f64 {
        match self {
            Value::Double(v) => v,
            other => panic!("expected double slot, found {other:?}"),
        }
    }

    pub fn reference(self) -> u32 {
        match self {
            Value::Reference(v) => v,
            other => panic!("expected reference slot, found {other:?}"),
        }
    }

    pub fn is_wide(self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    pub fn default_for(field_type: &FieldType) -> Value {
        match field_type {
            FieldType::Byte
            | FieldType::Char
            | FieldType::Short
            | FieldType::Int
            | FieldType::Boolean => Value::Int(0),
            FieldType::Float => Value::Float(0.0),
            FieldType::Long => Value::Long(0),
            FieldType::Double => Value::Double(0.0),
            FieldType::Object(_) | FieldType::Array(_) => Value::Reference(NULL),
        }
    }
}

#[derive(Debug)]
pub struct HeapObject {
    pub class: Arc<Class>,
    pub monitor: Monitor,
    pub data: ObjectData,
}

#[derive(Debug)]
pub enum ObjectData {
    Instance { fields: RwLock<Vec<Value>> },
    Array(RwLock<ArrayStorage>),
    /// Immutable intrinsic `java/lang/String`.
    String { value: Arc<str> },
    /// `java/lang/Class` mirror.
    Class { mirror_of: Arc<Class> },
    /// `java/lang/reflect/Method` handle.
    Method {
        declaring: Arc<Class>,
        method: Arc<MethodInfo>,
    },
    /// `java/lang/reflect/Field` handle.
    Field {
        declaring: Arc<Class>,
        field: Arc<FieldInfo>,
    },
    /// Intrinsic `java/lang/StringBuilder` backing buffer.
    Builder(Mutex<String>),
}

/// Array element storage, typed by component. Length never changes after
/// allocation. Booleans share the byte representation.
#[derive(Debug, Clone)]
pub enum ArrayStorage {
    Byte(Vec<i8>),
    Char(Vec<u16>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Reference(Vec<u32>),
}

impl ArrayStorage {
    pub fn len(&self) -> usize {
        match self {
            ArrayStorage::Byte(v) => v.len(),
            ArrayStorage::Char(v) => v.len(),
            ArrayStorage::Short(v) => v.len(),
            ArrayStorage::Int(v) => v.len(),
            ArrayStorage::Long(v) => v.len(),
            ArrayStorage::Float(v) => v.len(),
            ArrayStorage::Double(v) => v.len(),
            ArrayStorage::Reference(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn new(component: &FieldType, length: usize) -> ArrayStorage {
        match component {
            FieldType::Byte | FieldType::Boolean => ArrayStorage::Byte(vec![0; length]),
            FieldType::Char => ArrayStorage::Char(vec![0; length]),
            FieldType::Short => ArrayStorage::Short(vec![0; length]),
            FieldType::Int => ArrayStorage::Int(vec![0; length]),
            FieldType::Long => ArrayStorage::Long(vec![0; length]),
            FieldType::Float => ArrayStorage::Float(vec![0.0; length]),
            FieldType::Double => ArrayStorage::Double(vec![0.0; length]),
            FieldType::Object(_) | FieldType::Array(_) => {
                ArrayStorage::Reference(vec![NULL; length])
            }
        }
    }
}

impl HeapObject {
    pub fn get_field(&self, slot: usize) -> Value {
        match &self.data {
            ObjectData::Instance { fields } => fields.read()[slot],
            other => panic!("field access on non-instance object {other:?}"),
        }
    }

    pub fn set_field(&self, slot: usize, value: Value) {
        match &self.data {
            ObjectData::Instance { fields } => fields.write()[slot] = value,
            other => panic!("field access on non-instance object {other:?}"),
        }
    }

    pub fn array(&self) -> &RwLock<ArrayStorage> {
        match &self.data {
            ObjectData::Array(storage) => storage,
            other => panic!("array access on non-array object {other:?}"),
        }
    }

    pub fn array_length(&self) -> usize {
        self.array().read().len()
    }

    pub fn string_value(&self) -> Option<Arc<str>> {
        match &self.data {
            ObjectData::String { value } => Some(value.clone()),
            _ => None,
        }
    }

    pub fn builder(&self) -> Option<&Mutex<String>> {
        match &self.data {
            ObjectData::Builder(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn mirrored_class(&self) -> Option<Arc<Class>> {
        match &self.data {
            ObjectData::Class { mirror_of } => Some(mirror_of.clone()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Heap {
    objects: Vec<Option<Arc<HeapObject>>>,
}

impl Heap {
    pub fn new() -> Self {
        // slot 0 reserved for null
        Heap {
            objects: vec![None],
        }
    }

    pub fn insert(&mut self, object: HeapObject) -> u32 {
        let id = self.objects.len() as u32;
        self.objects.push(Some(Arc::new(object)));
        id
    }

    pub fn get(&self, id: u32) -> Option<Arc<HeapObject>> {
        self.objects.get(id as usize).and_then(Clone::clone)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

pub fn get(id: u32) -> Option<Arc<HeapObject>> {
    HEAP.read().get(id)
}

pub fn get_or_npe(id: u32) -> NativeResult<Arc<HeapObject>> {
    get(id).ok_or_else(Exception::npe)
}

fn insert(object: HeapObject) -> u32 {
    HEAP.write().insert(object)
}

/// Zeroed field slots for an instance of `class`, inherited fields included.
fn default_fields(class: &Arc<Class>) -> Vec<Value> {
    let mut slots = vec![Value::Padding; class.instance_fields];
    let mut current = Some(class.clone());
    while let Some(c) = current {
        for field in c.fields.iter().filter(|f| !f.is_static()) {
            slots[field.slot] = Value::default_for(field.field_type());
        }
        current = c.super_class.clone();
    }
    slots
}

/// Allocates a plain instance. Intrinsic classes with native-backed storage
/// get their special representation here.
pub fn allocate_instance(class: &Arc<Class>) -> NativeResult<u32> {
    let data = match class.name.as_ref() {
        "java/lang/StringBuilder" => ObjectData::Builder(Mutex::new(String::new())),
        "java/lang/String" => ObjectData::String {
            value: Arc::from(""),
        },
        _ => ObjectData::Instance {
            fields: RwLock::new(default_fields(class)),
        },
    };
    Ok(insert(HeapObject {
        class: class.clone(),
        monitor: Monitor::new(),
        data,
    }))
}

pub fn allocate_array(class: &Arc<Class>, length: i32) -> NativeResult<u32> {
    if length < 0 {
        return Err(Exception::vm_msg(
            "java/lang/NegativeArraySizeException",
            length.to_string(),
        ));
    }
    let component = match &class.array {
        Some(ArrayKind::Primitive(t)) => t.clone(),
        Some(ArrayKind::Reference(element)) => FieldType::Object(element.name.clone()),
        None => panic!("allocate_array on non-array class {}", class.name),
    };
    Ok(insert(HeapObject {
        class: class.clone(),
        monitor: Monitor::new(),
        data: ObjectData::Array(RwLock::new(ArrayStorage::new(&component, length as usize))),
    }))
}

/// A fresh, non-interned string object.
pub fn allocate_string(value: &str) -> NativeResult<u32> {
    let class = class_loader::resolve_class("java/lang/String")?;
    Ok(insert(HeapObject {
        class,
        monitor: Monitor::new(),
        data: ObjectData::String {
            value: Arc::from(value),
        },
    }))
}

/// The `java/lang/Class` mirror for `class`, created once.
pub fn class_object(class: &Arc<Class>) -> NativeResult<u32> {
    class
        .mirror
        .get_or_try_init(|| {
            let mirror_class = class_loader::resolve_class("java/lang/Class")?;
            Ok(insert(HeapObject {
                class: mirror_class,
                monitor: Monitor::new(),
                data: ObjectData::Class {
                    mirror_of: class.clone(),
                },
            }))
        })
        .copied()
}

pub fn method_object(declaring: &Arc<Class>, method: &Arc<MethodInfo>) -> NativeResult<u32> {
    let class = class_loader::resolve_class("java/lang/reflect/Method")?;
    Ok(insert(HeapObject {
        class,
        monitor: Monitor::new(),
        data: ObjectData::Method {
            declaring: declaring.clone(),
            method: method.clone(),
        },
    }))
}

pub fn field_object(declaring: &Arc<Class>, field: &Arc<FieldInfo>) -> NativeResult<u32> {
    let class = class_loader::resolve_class("java/lang/reflect/Field")?;
    Ok(insert(HeapObject {
        class,
        monitor: Monitor::new(),
        data: ObjectData::Field {
            declaring: declaring.clone(),
            field: field.clone(),
        },
    }))
}

/// `Object.clone` support: shallow copies for arrays and `Cloneable`
/// instances, `CloneNotSupportedException` otherwise.
pub fn clone_object(id: u32) -> NativeResult<u32> {
    let object = get_or_npe(id)?;
    let data = match &object.data {
        ObjectData::Array(storage) => ObjectData::Array(RwLock::new(storage.read().clone())),
        ObjectData::Instance { fields } => {
            if !crate::runtime::inheritance::implements(&object.class, "java/lang/Cloneable") {
                return Err(Exception::vm_msg(
                    "java/lang/CloneNotSupportedException",
                    object.class.name.replace('/', "."),
                ));
            }
            ObjectData::Instance {
                fields: RwLock::new(fields.read().clone()),
            }
        }
        ObjectData::String { value } => ObjectData::String {
            value: value.clone(),
        },
        ObjectData::Builder(buffer) => ObjectData::Builder(Mutex::new(buffer.lock().clone())),
        _ => {
            return Err(Exception::vm_msg(
                "java/lang/CloneNotSupportedException",
                object.class.name.replace('/', "."),
            ));
        }
    };
    Ok(insert(HeapObject {
        class: object.class.clone(),
        monitor: Monitor::new(),
        data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_storage_defaults() {
        let ints = ArrayStorage::new(&FieldType::Int, 3);
        assert_eq!(ints.len(), 3);
        match ints {
            ArrayStorage::Int(v) => assert_eq!(v, vec![0, 0, 0]),
            other => panic!("unexpected storage {other:?}"),
        }

        let refs = ArrayStorage::new(&FieldType::Object(Arc::from("java/lang/Object")), 2);
        match refs {
            ArrayStorage::Reference(v) => assert_eq!(v, vec![NULL, NULL]),
            other => panic!("unexpected storage {other:?}"),
        }
    }

    #[test]
    fn heap_ids_start_after_null() {
        let mut heap = Heap::new();
        assert!(heap.get(NULL).is_none());
        let class = crate::runtime::class_loader::testing::bare_class("A");
        let id = heap.insert(HeapObject {
            class,
            monitor: Monitor::new(),
            data: ObjectData::Instance {
                fields: RwLock::new(Vec::new()),
            },
        });
        assert_eq!(id, 1);
        assert!(heap.get(id).is_some());
    }
}
