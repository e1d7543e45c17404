use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::{
    class::{ClassFile, ConstantPoolInfo, parser::ClassError},
    descriptor::{MethodDescriptor, parse_method_descriptor},
    runtime::{Class, Exception, FieldInfo, MethodInfo, NativeResult, class_loader},
};

/// Runtime constant pool: symbolic references carry lazily resolved caches so
/// resolution happens at most once per entry.
#[derive(Debug)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

#[derive(Debug)]
pub enum Constant {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Utf8(Arc<str>),
    Class(CpClassInfo),
    String(CpStringInfo),
    FieldRef(CpFieldRef),
    MethodRef(CpMethodRef),
    /// Padding after 8-byte constants and entry kinds this VM never executes
    /// (method handles, dynamic constants, module info).
    Unusable,
}

/// A `Constant_Class` entry; the referenced class is resolved on first use.
#[derive(Debug)]
pub struct CpClassInfo {
    pub name: Arc<str>,
    cell: OnceCell<Arc<Class>>,
}

impl CpClassInfo {
    pub fn new(name: Arc<str>) -> Self {
        CpClassInfo {
            name,
            cell: OnceCell::new(),
        }
    }

    pub fn get_or_resolve(&self) -> NativeResult<Arc<Class>> {
        self.cell
            .get_or_try_init(|| class_loader::resolve_class(&self.name))
            .cloned()
    }
}

#[derive(Debug)]
pub struct CpStringInfo {
    pub value: Arc<str>,
    pub(crate) object: OnceCell<u32>,
}

#[derive(Debug)]
pub struct CpFieldRef {
    pub class: CpClassInfo,
    pub name: Arc<str>,
    pub descriptor: Arc<str>,
    resolved: OnceCell<FieldResolve>,
}

/// Outcome of field resolution: the class whose storage actually holds the
/// field (the statically named class or an ancestor), plus the field itself.
#[derive(Debug, Clone)]
pub struct FieldResolve {
    pub class: Arc<Class>,
    pub field: Arc<FieldInfo>,
}

impl CpFieldRef {
    pub fn resolve(&self) -> NativeResult<&FieldResolve> {
        self.resolved.get_or_try_init(|| {
            let class = self.class.get_or_resolve()?;
            class_loader::resolve_field(&class, &self.name).ok_or_else(|| {
                Exception::vm_msg(
                    "java/lang/NoSuchFieldError",
                    format!("{}.{}", self.class.name, self.name),
                )
            })
        })
    }
}

#[derive(Debug)]
pub struct CpMethodRef {
    pub class: CpClassInfo,
    pub name: Arc<str>,
    pub descriptor_str: Arc<str>,
    pub descriptor: MethodDescriptor,
    pub interface: bool,
    resolved: OnceCell<MethodResolve>,
}

#[derive(Debug, Clone)]
pub struct MethodResolve {
    pub class: Arc<Class>,
    pub method: Arc<MethodInfo>,
}

impl CpMethodRef {
    /// Static resolution against the named class; `invokevirtual` and
    /// `invokeinterface` still select the actual target from the receiver.
    pub fn resolve(&self) -> NativeResult<&MethodResolve> {
        self.resolved.get_or_try_init(|| {
            let class = self.class.get_or_resolve()?;
            class_loader::resolve_method(&class, &self.name, &self.descriptor_str)
        })
    }
}

impl ConstantPool {
    pub(crate) fn empty() -> Self {
        ConstantPool {
            entries: Vec::new(),
        }
    }

    /// Converts the raw pool. Descriptors in method references are parsed here
    /// so malformed ones fail the load, not an arbitrary later instruction.
    pub(crate) fn from_class_file(class_file: &ClassFile) -> Result<Self, ClassError> {
        let raw = &class_file.constant_pool;
        let mut entries = Vec::with_capacity(raw.len());
        for info in raw {
            let entry = match info {
                ConstantPoolInfo::Utf8(s) => Constant::Utf8(s.clone()),
                ConstantPoolInfo::Integer(v) => Constant::Integer(*v),
                ConstantPoolInfo::Float(v) => Constant::Float(*v),
                ConstantPoolInfo::Long(v) => Constant::Long(*v),
                ConstantPoolInfo::Double(v) => Constant::Double(*v),
                ConstantPoolInfo::Class { name_index } => Constant::Class(CpClassInfo::new(
                    class_file.utf8(*name_index).ok_or(ClassError::BadReference)?.clone(),
                )),
                ConstantPoolInfo::String { string_index } => Constant::String(CpStringInfo {
                    value: class_file
                        .utf8(*string_index)
                        .ok_or(ClassError::BadReference)?
                        .clone(),
                    object: OnceCell::new(),
                }),
                ConstantPoolInfo::Fieldref {
                    class_index,
                    name_and_type_index,
                } => {
                    let (name, descriptor) =
                        name_and_type(class_file, *name_and_type_index)?;
                    Constant::FieldRef(CpFieldRef {
                        class: CpClassInfo::new(
                            class_file
                                .class_name(*class_index)
                                .ok_or(ClassError::BadReference)?
                                .clone(),
                        ),
                        name,
                        descriptor,
                        resolved: OnceCell::new(),
                    })
                }
                ConstantPoolInfo::Methodref {
                    class_index,
                    name_and_type_index,
                } => method_ref(class_file, *class_index, *name_and_type_index, false)?,
                ConstantPoolInfo::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                } => method_ref(class_file, *class_index, *name_and_type_index, true)?,
                _ => Constant::Unusable,
            };
            entries.push(entry);
        }
        Ok(ConstantPool { entries })
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        (index as usize)
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
    }

    pub fn class_info(&self, index: u16) -> NativeResult<&CpClassInfo> {
        match self.get(index) {
            Some(Constant::Class(info)) => Ok(info),
            _ => Err(bad_entry(index)),
        }
    }

    pub fn field_ref(&self, index: u16) -> NativeResult<&CpFieldRef> {
        match self.get(index) {
            Some(Constant::FieldRef(field_ref)) => Ok(field_ref),
            _ => Err(bad_entry(index)),
        }
    }

    pub fn method_ref(&self, index: u16) -> NativeResult<&CpMethodRef> {
        match self.get(index) {
            Some(Constant::MethodRef(method_ref)) => Ok(method_ref),
            _ => Err(bad_entry(index)),
        }
    }

    pub fn string_info(&self, index: u16) -> NativeResult<&CpStringInfo> {
        match self.get(index) {
            Some(Constant::String(info)) => Ok(info),
            _ => Err(bad_entry(index)),
        }
    }
}

fn bad_entry(index: u16) -> Exception {
    Exception::vm_msg(
        "java/lang/ClassFormatError",
        format!("unusable constant pool entry {index}"),
    )
}

fn name_and_type(
    class_file: &ClassFile,
    index: u16,
) -> Result<(Arc<str>, Arc<str>), ClassError> {
    match class_file.entry(index) {
        Some(ConstantPoolInfo::NameAndType {
            name_index,
            descriptor_index,
        }) => Ok((
            class_file.utf8(*name_index).ok_or(ClassError::BadReference)?.clone(),
            class_file
                .utf8(*descriptor_index)
                .ok_or(ClassError::BadReference)?
                .clone(),
        )),
        _ => Err(ClassError::BadReference),
    }
}

fn method_ref(
    class_file: &ClassFile,
    class_index: u16,
    name_and_type_index: u16,
    interface: bool,
) -> Result<Constant, ClassError> {
    let (name, descriptor_str) = name_and_type(class_file, name_and_type_index)?;
    let descriptor = parse_method_descriptor(&descriptor_str)
        .map_err(|_| ClassError::MalformedDescriptor)?
        .1;
    Ok(Constant::MethodRef(CpMethodRef {
        class: CpClassInfo::new(
            class_file
                .class_name(class_index)
                .ok_or(ClassError::BadReference)?
                .clone(),
        ),
        name,
        descriptor_str,
        descriptor,
        interface,
        resolved: OnceCell::new(),
    }))
}
