//! Loading, linking and initialization. `resolve_class` is the single entry
//! point; it guarantees one `Class` instance per binary name.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::{
    class::{self, ClassFile, parser::ClassError},
    consts::{ClassAccessFlag, FieldAccessFlag},
    descriptor::{FieldType, parse_field_descriptor, parse_method_descriptor},
    runtime::{
        ArrayKind, Class, Const, ConstantPool, Exception, FieldInfo, InitLock, InitState,
        MethodInfo, NativeResult,
        constant_pool::{FieldResolve, MethodResolve},
        global::{CLASS_REGISTRY, CLASS_SOURCES},
        heap::{self, Value, string_table},
        inheritance, interpreter,
        structs::attributes,
        thread::VmThread,
    },
};

pub mod bootstrap;

/// Resolves `name` (binary form, `java/lang/Object` or `[I`) to its unique
/// runtime class, loading and linking on first request. The registry cell is
/// published before linking starts, so concurrent resolvers share one
/// instance and references back to a class being linked reuse its cell.
pub fn resolve_class(name: &str) -> NativeResult<Arc<Class>> {
    bootstrap::ensure_bootstrapped();
    let cell = CLASS_REGISTRY
        .entry(Arc::from(name))
        .or_insert_with(|| Arc::new(OnceCell::new()))
        .clone();
    cell.get_or_try_init(|| load_class(name)).cloned()
}

fn load_class(name: &str) -> NativeResult<Arc<Class>> {
    if name.starts_with('[') {
        return array_class(name);
    }
    let bytes = find_class_bytes(name).ok_or_else(|| {
        Exception::vm_msg("java/lang/NoClassDefFoundError", name.replace('/', "."))
    })?;
    let class_file = class::parser::class_file(&bytes).map_err(class_format_error)?;
    let class = link(&class_file)?;
    if class.name.as_ref() != name {
        return Err(Exception::vm_msg(
            "java/lang/NoClassDefFoundError",
            format!("{} (wrong name: {})", name.replace('/', "."), class.name),
        ));
    }
    Ok(class)
}

fn find_class_bytes(name: &str) -> Option<Vec<u8>> {
    let sources = CLASS_SOURCES.read();
    sources.iter().find_map(|source| source.find(name))
}

fn class_format_error(error: ClassError) -> Exception {
    let class = match error {
        ClassError::UnsupportedVersion(_) => "java/lang/UnsupportedClassVersionError",
        _ => "java/lang/ClassFormatError",
    };
    Exception::vm_msg(class, error.to_string())
}

/// Builds a runtime class from a parsed file: resolves the supertypes, lays
/// out field slots, parses descriptors and code attributes.
fn link(class_file: &ClassFile) -> NativeResult<Arc<Class>> {
    let name = class_file
        .class_name(class_file.this_class)
        .ok_or_else(|| class_format_error(ClassError::BadReference))?
        .clone();
    log::debug!("linking {name}");

    let super_class = if class_file.super_class == 0 {
        None
    } else {
        let super_name = class_file
            .class_name(class_file.super_class)
            .ok_or_else(|| class_format_error(ClassError::BadReference))?;
        Some(resolve_class(super_name)?)
    };

    let mut interfaces = Vec::with_capacity(class_file.interfaces.len());
    for index in &class_file.interfaces {
        let interface_name = class_file
            .class_name(*index)
            .ok_or_else(|| class_format_error(ClassError::BadReference))?;
        interfaces.push(resolve_class(interface_name)?);
    }

    let constant_pool = ConstantPool::from_class_file(class_file).map_err(class_format_error)?;

    let field_base = super_class.as_ref().map_or(0, |s| s.instance_fields);
    let mut instance_slot = field_base;
    let mut static_slot = 0;
    let mut fields = Vec::with_capacity(class_file.fields.len());
    let mut static_values = Vec::new();
    for raw in &class_file.fields {
        let field_name = class_file
            .utf8(raw.name_index)
            .ok_or_else(|| class_format_error(ClassError::BadReference))?
            .clone();
        let descriptor_str = class_file
            .utf8(raw.descriptor_index)
            .ok_or_else(|| class_format_error(ClassError::BadReference))?
            .clone();
        let descriptor = parse_field_descriptor(&descriptor_str)
            .map_err(|_| class_format_error(ClassError::MalformedDescriptor))?
            .1;

        let is_static = raw.access_flags.contains(FieldAccessFlag::STATIC);
        let slot = if is_static {
            static_values.push(RwLock::new(Value::default_for(&descriptor.0)));
            static_slot += 1;
            static_slot - 1
        } else {
            instance_slot += 1;
            instance_slot - 1
        };

        let mut constant_value = None;
        for attribute in &raw.attributes {
            if attributes::attribute_name(class_file, attribute) == Some("ConstantValue") {
                constant_value = Some(
                    attributes::parse_constant_value(class_file, &attribute.info)
                        .map_err(class_format_error)?,
                );
            }
        }

        fields.push(Arc::new(FieldInfo {
            access_flags: raw.access_flags,
            name: field_name,
            descriptor,
            descriptor_str,
            slot,
            constant_value,
        }));
    }

    let mut methods = Vec::with_capacity(class_file.methods.len());
    for raw in &class_file.methods {
        let method_name = class_file
            .utf8(raw.name_index)
            .ok_or_else(|| class_format_error(ClassError::BadReference))?
            .clone();
        let descriptor_str = class_file
            .utf8(raw.descriptor_index)
            .ok_or_else(|| class_format_error(ClassError::BadReference))?
            .clone();
        let descriptor = parse_method_descriptor(&descriptor_str)
            .map_err(|_| class_format_error(ClassError::MalformedDescriptor))?
            .1;

        let mut code = None;
        for attribute in &raw.attributes {
            if attributes::attribute_name(class_file, attribute) == Some("Code") {
                code = Some(
                    attributes::parse_code(class_file, &attribute.info)
                        .map_err(class_format_error)?,
                );
            }
        }

        methods.push(Arc::new(MethodInfo {
            access_flags: raw.access_flags,
            name: method_name,
            descriptor,
            descriptor_str,
            code,
        }));
    }

    let mut source_file = None;
    for attribute in &class_file.attributes {
        if attributes::attribute_name(class_file, attribute) == Some("SourceFile")
            && attribute.info.len() >= 2
        {
            let index = u16::from_be_bytes([attribute.info[0], attribute.info[1]]);
            source_file = class_file.utf8(index).cloned();
        }
    }

    Ok(Arc::new(Class {
        name,
        access_flags: class_file.access_flags,
        super_class,
        interfaces,
        constant_pool,
        fields,
        methods,
        field_base,
        instance_fields: instance_slot,
        static_values,
        array: None,
        primitive: None,
        source_file,
        init: InitLock::new(),
        mirror: OnceCell::new(),
    }))
}

/// Synthesizes an array class from its descriptor-shaped name.
fn array_class(name: &str) -> NativeResult<Arc<Class>> {
    let component_descriptor = &name[1..];
    let kind = if let Some(element_name) = component_descriptor
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
    {
        ArrayKind::Reference(resolve_class(element_name)?)
    } else if component_descriptor.starts_with('[') {
        ArrayKind::Reference(resolve_class(component_descriptor)?)
    } else {
        let field_type = parse_field_descriptor(component_descriptor)
            .map_err(|_| {
                Exception::vm_msg("java/lang/NoClassDefFoundError", name.replace('/', "."))
            })?
            .1
            .0;
        ArrayKind::Primitive(field_type)
    };

    let object = resolve_class("java/lang/Object")?;
    let interfaces = vec![
        resolve_class("java/lang/Cloneable")?,
        resolve_class("java/io/Serializable")?,
    ];

    Ok(Arc::new(Class {
        name: Arc::from(name),
        access_flags: ClassAccessFlag::PUBLIC | ClassAccessFlag::FINAL,
        super_class: Some(object),
        interfaces,
        constant_pool: ConstantPool::empty(),
        fields: Vec::new(),
        methods: Vec::new(),
        field_base: 0,
        instance_fields: 0,
        static_values: Vec::new(),
        array: Some(kind),
        primitive: None,
        source_file: None,
        init: InitLock::initialized(),
        mirror: OnceCell::new(),
    }))
}

/// The runtime class of an array holding `component` elements.
pub fn array_class_of(component: &FieldType) -> NativeResult<Arc<Class>> {
    resolve_class(&FieldType::Array(Box::new(component.clone())).to_descriptor())
}

/// Field lookup starting at the statically named class: the class itself,
/// its direct interfaces, then the superclass chain. The runtime type of the
/// receiver never participates, so shadowed fields resolve to the declaration
/// visible at the reference site.
pub fn resolve_field(class: &Arc<Class>, name: &str) -> Option<FieldResolve> {
    let mut current = Some(class.clone());
    while let Some(c) = current {
        if let Some(field) = c.find_field(name) {
            return Some(FieldResolve { class: c, field });
        }
        for interface in &c.interfaces {
            if let Some(field) = interface.find_field(name) {
                return Some(FieldResolve {
                    class: interface.clone(),
                    field,
                });
            }
        }
        current = c.super_class.clone();
    }
    None
}

/// Static method resolution: the superclass chain first, then the maximally
/// specific superinterface default. Two unrelated defaults with no class
/// override cannot be ordered and fail the link.
pub fn resolve_method(
    class: &Arc<Class>,
    name: &str,
    descriptor: &str,
) -> NativeResult<MethodResolve> {
    let mut current = Some(class.clone());
    while let Some(c) = current {
        if let Some(method) = c.find_method(name, descriptor) {
            return Ok(MethodResolve { class: c, method });
        }
        current = c.super_class.clone();
    }

    let mut defaults: Vec<MethodResolve> = Vec::new();
    let mut abstract_fallback = None;
    for interface in all_superinterfaces(class) {
        if let Some(method) = interface.find_method(name, descriptor) {
            if method.is_abstract() {
                abstract_fallback = Some(MethodResolve {
                    class: interface.clone(),
                    method,
                });
            } else {
                defaults.push(MethodResolve {
                    class: interface,
                    method,
                });
            }
        }
    }
    // keep only maximally specific declarations
    let specific: Vec<&MethodResolve> = defaults
        .iter()
        .filter(|candidate| {
            !defaults.iter().any(|other| {
                !Arc::ptr_eq(&other.class, &candidate.class)
                    && inheritance::implements(&other.class, &candidate.class.name)
            })
        })
        .collect();
    match specific.len() {
        1 => Ok(specific[0].clone()),
        0 => abstract_fallback.ok_or_else(|| {
            Exception::vm_msg(
                "java/lang/NoSuchMethodError",
                format!("{}.{}{}", class.name, name, descriptor),
            )
        }),
        _ => Err(Exception::vm_msg(
            "java/lang/IncompatibleClassChangeError",
            format!(
                "conflicting default methods for {}.{}{}",
                class.name, name, descriptor
            ),
        )),
    }
}

/// Dynamic selection for `invokevirtual`/`invokeinterface`: the most derived
/// concrete override on the receiver's chain, else an applicable default.
pub fn select_method(
    receiver_class: &Arc<Class>,
    name: &str,
    descriptor: &str,
) -> NativeResult<MethodResolve> {
    let resolved = resolve_method(receiver_class, name, descriptor)?;
    if resolved.method.is_abstract() {
        return Err(Exception::vm_msg(
            "java/lang/AbstractMethodError",
            format!("{}.{}{}", receiver_class.name, name, descriptor),
        ));
    }
    Ok(resolved)
}

fn all_superinterfaces(class: &Arc<Class>) -> Vec<Arc<Class>> {
    let mut out: Vec<Arc<Class>> = Vec::new();
    let mut current = Some(class.clone());
    while let Some(c) = current {
        for interface in &c.interfaces {
            collect_interfaces(interface, &mut out);
        }
        current = c.super_class.clone();
    }
    out
}

fn collect_interfaces(interface: &Arc<Class>, out: &mut Vec<Arc<Class>>) {
    if out.iter().any(|i| Arc::ptr_eq(i, interface)) {
        return;
    }
    out.push(interface.clone());
    for sup in &interface.interfaces {
        collect_interfaces(sup, out);
    }
}

/// JVMS 5.5 initialization. Blocks behind another thread's in-progress
/// initialization; re-entry by the owner returns immediately. An `Erroneous`
/// class fails every later use without re-running `<clinit>`. A missing
/// *referenced* class does not poison the referencing class: its state rolls
/// back to `NotInitialized` so a later attempt may succeed once the class
/// becomes available.
pub fn ensure_initialized(thread: &Arc<VmThread>, class: &Arc<Class>) -> NativeResult<()> {
    {
        let mut state = class.init.state.lock();
        loop {
            match *state {
                InitState::Initialized => return Ok(()),
                InitState::Erroneous => {
                    return Err(Exception::vm_msg(
                        "java/lang/NoClassDefFoundError",
                        format!("Could not initialize class {}", class.name.replace('/', ".")),
                    ));
                }
                InitState::InProgress(owner) if owner == thread.id => return Ok(()),
                InitState::InProgress(_) => {
                    class.init.cond.wait(&mut state);
                }
                InitState::NotInitialized => {
                    *state = InitState::InProgress(thread.id);
                    break;
                }
            }
        }
    }

    let result = run_initializer(thread, class);

    let mut state = class.init.state.lock();
    let outcome = match result {
        Ok(()) => {
            *state = InitState::Initialized;
            Ok(())
        }
        Err(exception) => {
            if is_missing_class_exception(&exception) {
                *state = InitState::NotInitialized;
                Err(exception)
            } else if is_error_exception(&exception) {
                *state = InitState::Erroneous;
                Err(exception)
            } else {
                *state = InitState::Erroneous;
                Err(Exception::vm_msg(
                    "java/lang/ExceptionInInitializerError",
                    exception_description(&exception),
                ))
            }
        }
    };
    class.init.cond.notify_all();
    outcome
}

fn run_initializer(thread: &Arc<VmThread>, class: &Arc<Class>) -> NativeResult<()> {
    if let Some(super_class) = &class.super_class {
        ensure_initialized(thread, super_class)?;
    }

    for field in class.fields.iter().filter(|f| f.is_static()) {
        if let Some(constant) = &field.constant_value {
            let value = match constant {
                Const::Int(v) => Value::Int(*v),
                Const::Float(v) => Value::Float(*v),
                Const::Long(v) => Value::Long(*v),
                Const::Double(v) => Value::Double(*v),
                Const::String(s) => Value::Reference(string_table::intern(s)?),
            };
            class.set_static_value(field.slot, value);
        }
    }

    if let Some(clinit) = class.find_method("<clinit>", "()V") {
        log::debug!("running <clinit> of {}", class.name);
        interpreter::call_method(thread, class, &clinit, Vec::new())?;
    }
    Ok(())
}

pub(crate) fn exception_class_name(exception: &Exception) -> Arc<str> {
    match exception {
        Exception::Vm { class, .. } => Arc::from(*class),
        Exception::User(id) => heap::get(*id)
            .map(|object| object.class.name.clone())
            .unwrap_or_else(|| Arc::from("java/lang/NullPointerException")),
    }
}

fn is_missing_class_exception(exception: &Exception) -> bool {
    matches!(
        exception_class_name(exception).as_ref(),
        "java/lang/NoClassDefFoundError" | "java/lang/ClassNotFoundException"
    )
}

fn is_error_exception(exception: &Exception) -> bool {
    let name = exception_class_name(exception);
    match resolve_class(&name) {
        Ok(class) => inheritance::is_same_or_subclass(&class, "java/lang/Error"),
        Err(_) => false,
    }
}

fn exception_description(exception: &Exception) -> String {
    match exception {
        Exception::Vm { class, message } => match message {
            Some(message) => format!("{}: {message}", class.replace('/', ".")),
            None => class.replace('/', "."),
        },
        Exception::User(id) => heap::get(*id)
            .map(|object| object.class.name.replace('/', "."))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A minimal class with no members, enough for heap plumbing tests.
    pub(crate) fn bare_class(name: &str) -> Arc<Class> {
        Arc::new(Class {
            name: Arc::from(name),
            access_flags: ClassAccessFlag::PUBLIC,
            super_class: None,
            interfaces: Vec::new(),
            constant_pool: ConstantPool::empty(),
            fields: Vec::new(),
            methods: Vec::new(),
            field_base: 0,
            instance_fields: 0,
            static_values: Vec::new(),
            array: None,
            primitive: None,
            source_file: None,
            init: InitLock::initialized(),
            mirror: OnceCell::new(),
        })
    }
}
