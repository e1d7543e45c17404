use std::sync::Arc;

use crate::consts::{ClassAccessFlag, FieldAccessFlag, MethodAccessFlag};

/// A parsed class file. Immutable once parsed; constant-pool indices are kept
/// exactly as written so later symbolic references resolve against the same
/// 1-based numbering (including the padding slot after 8-byte constants).
#[derive(Debug, PartialEq)]
pub struct ClassFile {
    pub(crate) minor_version: u16,
    pub(crate) major_version: u16,
    pub(crate) constant_pool: Vec<ConstantPoolInfo>,
    pub(crate) access_flags: ClassAccessFlag,
    pub(crate) this_class: u16,
    pub(crate) super_class: u16,
    pub(crate) interfaces: Vec<u16>,
    pub(crate) fields: Vec<FieldInfo>,
    pub(crate) methods: Vec<MethodInfo>,
    pub(crate) attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    /// Entry at a 1-based pool index; index 0 never names an entry.
    pub(crate) fn entry(&self, index: u16) -> Option<&ConstantPoolInfo> {
        (index as usize)
            .checked_sub(1)
            .and_then(|i| self.constant_pool.get(i))
    }

    pub(crate) fn utf8(&self, index: u16) -> Option<&Arc<str>> {
        match self.entry(index) {
            Some(ConstantPoolInfo::Utf8(s)) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn class_name(&self, index: u16) -> Option<&Arc<str>> {
        match self.entry(index) {
            Some(ConstantPoolInfo::Class { name_index }) => self.utf8(*name_index),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ConstantPoolInfo {
    Utf8(Arc<str>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
    /// Padding slot following a Long/Double entry.
    Empty,
}

#[derive(Debug, PartialEq)]
pub struct FieldInfo {
    pub(crate) access_flags: FieldAccessFlag,
    pub(crate) name_index: u16,
    pub(crate) descriptor_index: u16,
    pub(crate) attributes: Vec<AttributeInfo>,
}

#[derive(Debug, PartialEq)]
pub struct MethodInfo {
    pub(crate) access_flags: MethodAccessFlag,
    pub(crate) name_index: u16,
    pub(crate) descriptor_index: u16,
    pub(crate) attributes: Vec<AttributeInfo>,
}

#[derive(Debug, PartialEq)]
pub struct AttributeInfo {
    pub(crate) attribute_name_index: u16,
    pub(crate) info: Vec<u8>,
}
