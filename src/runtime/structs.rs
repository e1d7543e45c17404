use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex, RwLock};

use crate::{
    consts::{ClassAccessFlag, FieldAccessFlag, MethodAccessFlag},
    descriptor::{FieldDescriptor, FieldType, MethodDescriptor},
    runtime::heap::Value,
};

pub mod attributes;
pub mod constant_pool;

pub use attributes::{CodeAttribute, Const, ExceptionTableItem, LineNumberItem};
pub use constant_pool::{Constant, ConstantPool, CpClassInfo, FieldResolve, MethodResolve};

/// A linked runtime class. One instance per binary name; identity comparison
/// via `Arc::ptr_eq` is meaningful.
#[derive(Debug)]
pub struct Class {
    pub name: Arc<str>,
    pub access_flags: ClassAccessFlag,
    pub super_class: Option<Arc<Class>>,
    pub interfaces: Vec<Arc<Class>>,
    pub constant_pool: ConstantPool,
    pub fields: Vec<Arc<FieldInfo>>,
    pub methods: Vec<Arc<MethodInfo>>,
    /// First instance slot used by this class's own fields. Declared fields
    /// always live after every inherited slot, so a field shadowing a
    /// superclass field of the same name gets its own storage.
    pub field_base: usize,
    /// Total instance slots, inherited ones included.
    pub instance_fields: usize,
    pub static_values: Vec<RwLock<Value>>,
    /// `Some` iff this is an array class.
    pub array: Option<ArrayKind>,
    /// `Some` for the synthetic mirrors of primitive types (`int`, ...).
    pub primitive: Option<FieldType>,
    pub source_file: Option<Arc<str>>,
    pub(crate) init: InitLock,
    /// Heap id of the `java/lang/Class` mirror, created on first use.
    pub(crate) mirror: OnceCell<u32>,
}

#[derive(Debug, Clone)]
pub enum ArrayKind {
    Primitive(FieldType),
    Reference(Arc<Class>),
}

impl Class {
    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlag::INTERFACE)
    }

    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive.is_some()
    }

    /// Declared method lookup, this class only.
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<Arc<MethodInfo>> {
        self.methods
            .iter()
            .find(|m| m.name.as_ref() == name && m.descriptor_str.as_ref() == descriptor)
            .cloned()
    }

    /// Declared field lookup, this class only.
    pub fn find_field(&self, name: &str) -> Option<Arc<FieldInfo>> {
        self.fields.iter().find(|f| f.name.as_ref() == name).cloned()
    }

    pub fn static_value(&self, slot: usize) -> Value {
        *self.static_values[slot].read()
    }

    pub fn set_static_value(&self, slot: usize, value: Value) {
        *self.static_values[slot].write() = value;
    }
}

#[derive(Debug)]
pub struct FieldInfo {
    pub access_flags: FieldAccessFlag,
    pub name: Arc<str>,
    pub descriptor: FieldDescriptor,
    pub descriptor_str: Arc<str>,
    /// Instance slot (absolute, `field_base` included) or static slot.
    pub slot: usize,
    pub constant_value: Option<Const>,
}

impl FieldInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlag::STATIC)
    }

    pub fn field_type(&self) -> &FieldType {
        &self.descriptor.0
    }
}

#[derive(Debug)]
pub struct MethodInfo {
    pub access_flags: MethodAccessFlag,
    pub name: Arc<str>,
    pub descriptor: MethodDescriptor,
    pub descriptor_str: Arc<str>,
    pub code: Option<CodeAttribute>,
}

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlag::STATIC)
    }

    pub fn is_native(&self) -> bool {
        self.access_flags.contains(MethodAccessFlag::NATIVE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(MethodAccessFlag::ABSTRACT)
    }

    pub fn is_synchronized(&self) -> bool {
        self.access_flags.contains(MethodAccessFlag::SYNCHRONIZED)
    }
}

/// A throwable in flight. `Vm` variants are synthesized by the runtime and
/// materialized into heap objects only when guest code can observe them
/// (catch handlers, `Throwable` natives, top-of-thread reporting).
#[derive(Debug, Clone)]
pub enum Exception {
    Vm {
        class: &'static str,
        message: Option<String>,
    },
    User(u32),
}

pub type NativeResult<T> = Result<T, Exception>;

impl Exception {
    pub fn vm(class: &'static str) -> Self {
        Exception::Vm {
            class,
            message: None,
        }
    }

    pub fn vm_msg(class: &'static str, message: impl Into<String>) -> Self {
        Exception::Vm {
            class,
            message: Some(message.into()),
        }
    }

    pub fn npe() -> Self {
        Self::vm("java/lang/NullPointerException")
    }

    /// Binary name of the throwable's class, if it is cheap to know.
    pub fn vm_class(&self) -> Option<&'static str> {
        match self {
            Exception::Vm { class, .. } => Some(class),
            Exception::User(_) => None,
        }
    }
}

/// Class initialization state machine, JVMS 5.5.
#[derive(Debug)]
pub(crate) struct InitLock {
    pub(crate) state: Mutex<InitState>,
    pub(crate) cond: Condvar,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum InitState {
    NotInitialized,
    /// Owned by the thread with this id; re-entry by the owner is a no-op.
    InProgress(u64),
    Initialized,
    Erroneous,
}

impl InitLock {
    pub(crate) fn new() -> Self {
        InitLock {
            state: Mutex::new(InitState::NotInitialized),
            cond: Condvar::new(),
        }
    }

    pub(crate) fn initialized() -> Self {
        InitLock {
            state: Mutex::new(InitState::Initialized),
            cond: Condvar::new(),
        }
    }
}
