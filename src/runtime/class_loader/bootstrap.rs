//! Classpath sources and the intrinsic bootstrap classes.
//!
//! The core of `java.lang` is synthesized here instead of being read from a
//! class library: method bodies are native and backed by the registry in
//! `runtime::native`. Everything is registered once, before the first class
//! resolution, into the process-scoped registry.

use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    sync::{Arc, Once},
};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use zip::ZipArchive;

use crate::{
    consts::{ClassAccessFlag, FieldAccessFlag, MethodAccessFlag},
    descriptor::{FieldType, parse_field_descriptor, parse_method_descriptor},
    runtime::{
        Class, ConstantPool, FieldInfo, InitLock, MethodInfo,
        global::{CLASS_REGISTRY, CLASS_SOURCES},
        heap::{self, Value},
        native,
    },
};

/// A place classes can be loaded from. Sources are searched in classpath
/// order; the first hit wins.
pub trait ClassSource: Send + Sync {
    fn find(&self, binary_name: &str) -> Option<Vec<u8>>;
}

/// A directory tree of `.class` files laid out by package.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirSource { root: root.into() }
    }
}

impl ClassSource for DirSource {
    fn find(&self, binary_name: &str) -> Option<Vec<u8>> {
        let path = self.root.join(format!("{binary_name}.class"));
        fs::read(path).ok()
    }
}

/// Classes inside a `.jar` archive.
pub struct JarSource {
    archive: Mutex<ZipArchive<fs::File>>,
}

impl JarSource {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let file = fs::File::open(path.into())?;
        let archive = ZipArchive::new(file).map_err(io::Error::other)?;
        Ok(JarSource {
            archive: Mutex::new(archive),
        })
    }
}

impl ClassSource for JarSource {
    fn find(&self, binary_name: &str) -> Option<Vec<u8>> {
        let mut archive = self.archive.lock();
        let mut entry = archive.by_name(&format!("{binary_name}.class")).ok()?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes).ok()?;
        Some(bytes)
    }
}

/// In-memory class bytes, used by tests and tools that generate classes.
#[derive(Default)]
pub struct MemorySource {
    classes: DashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&self, binary_name: &str, bytes: Vec<u8>) {
        self.classes.insert(binary_name.to_string(), bytes);
    }
}

impl ClassSource for MemorySource {
    fn find(&self, binary_name: &str) -> Option<Vec<u8>> {
        self.classes.get(binary_name).map(|bytes| bytes.clone())
    }
}

pub fn add_source(source: Box<dyn ClassSource>) {
    CLASS_SOURCES.write().push(source);
}

static BOOTSTRAP: Once = Once::new();

/// Installs the intrinsic classes and the native registry, exactly once.
pub fn ensure_bootstrapped() {
    BOOTSTRAP.call_once(|| {
        install_intrinsics();
        native::register_natives();
    });
}

const PUB: MethodAccessFlag = MethodAccessFlag::PUBLIC;

fn native_method(flags: MethodAccessFlag) -> MethodAccessFlag {
    flags.union(MethodAccessFlag::NATIVE)
}

/// Builds one intrinsic class. Supertypes must already be registered; no
/// class resolution happens on this path (it would re-enter the bootstrap).
fn define_intrinsic(
    name: &str,
    super_name: Option<&str>,
    interface_names: &[&str],
    access_flags: ClassAccessFlag,
    field_specs: &[(&str, &str, FieldAccessFlag)],
    method_specs: &[(&str, &str, MethodAccessFlag)],
) {
    let super_class = super_name.map(registered);
    let interfaces = interface_names.iter().map(|n| registered(n)).collect();

    let field_base = super_class.as_ref().map_or(0, |s: &Arc<Class>| s.instance_fields);
    let mut instance_slot = field_base;
    let mut static_slot = 0;
    let mut static_values = Vec::new();
    let mut fields = Vec::new();
    for (field_name, descriptor_str, flags) in field_specs {
        let descriptor = parse_field_descriptor(descriptor_str).unwrap().1;
        let slot = if flags.contains(FieldAccessFlag::STATIC) {
            static_values.push(RwLock::new(Value::default_for(&descriptor.0)));
            static_slot += 1;
            static_slot - 1
        } else {
            instance_slot += 1;
            instance_slot - 1
        };
        fields.push(Arc::new(FieldInfo {
            access_flags: *flags,
            name: Arc::from(*field_name),
            descriptor,
            descriptor_str: Arc::from(*descriptor_str),
            slot,
            constant_value: None,
        }));
    }

    let methods = method_specs
        .iter()
        .map(|(method_name, descriptor_str, flags)| {
            Arc::new(MethodInfo {
                access_flags: *flags,
                name: Arc::from(*method_name),
                descriptor: parse_method_descriptor(descriptor_str).unwrap().1,
                descriptor_str: Arc::from(*descriptor_str),
                code: None,
            })
        })
        .collect();

    let class = Arc::new(Class {
        name: Arc::from(name),
        access_flags,
        super_class,
        interfaces,
        constant_pool: ConstantPool::empty(),
        fields,
        methods,
        field_base,
        instance_fields: instance_slot,
        static_values,
        array: None,
        primitive: None,
        source_file: None,
        init: InitLock::initialized(),
        mirror: OnceCell::new(),
    });

    register(class);
}

fn register(class: Arc<Class>) {
    let cell = CLASS_REGISTRY
        .entry(class.name.clone())
        .or_insert_with(|| Arc::new(OnceCell::new()))
        .clone();
    let _ = cell.set(class);
}

fn registered(name: &str) -> Arc<Class> {
    CLASS_REGISTRY
        .get(name)
        .and_then(|cell| cell.get().cloned())
        .unwrap_or_else(|| panic!("intrinsic {name} not yet defined"))
}

fn define_plain_class(name: &str, super_name: &str) {
    define_intrinsic(
        name,
        Some(super_name),
        &[],
        ClassAccessFlag::PUBLIC,
        &[],
        &[
            ("<init>", "()V", native_method(PUB)),
            ("<init>", "(Ljava/lang/String;)V", native_method(PUB)),
        ],
    );
}

fn define_primitive_mirror(name: &str, field_type: FieldType) {
    let class = Arc::new(Class {
        name: Arc::from(name),
        access_flags: ClassAccessFlag::PUBLIC | ClassAccessFlag::FINAL,
        super_class: None,
        interfaces: Vec::new(),
        constant_pool: ConstantPool::empty(),
        fields: Vec::new(),
        methods: Vec::new(),
        field_base: 0,
        instance_fields: 0,
        static_values: Vec::new(),
        array: None,
        primitive: Some(field_type),
        source_file: None,
        init: InitLock::initialized(),
        mirror: OnceCell::new(),
    });
    register(class);
}

fn define_box_class(name: &str, value_descriptor: &str, accessor: &str, extra: &[(&str, &str)]) {
    let class_descriptor = format!("L{name};");
    let mut methods = vec![
        (
            "<init>".to_string(),
            format!("({value_descriptor})V"),
            native_method(PUB),
        ),
        (
            "valueOf".to_string(),
            format!("({value_descriptor}){class_descriptor}"),
            native_method(PUB | MethodAccessFlag::STATIC),
        ),
        (accessor.to_string(), format!("(){value_descriptor}"), native_method(PUB)),
        (
            "toString".to_string(),
            "()Ljava/lang/String;".to_string(),
            native_method(PUB),
        ),
        (
            "equals".to_string(),
            "(Ljava/lang/Object;)Z".to_string(),
            native_method(PUB),
        ),
        ("hashCode".to_string(), "()I".to_string(), native_method(PUB)),
    ];
    for (method_name, descriptor) in extra {
        methods.push((
            method_name.to_string(),
            descriptor.to_string(),
            native_method(PUB | MethodAccessFlag::STATIC),
        ));
    }
    let method_refs: Vec<(&str, &str, MethodAccessFlag)> = methods
        .iter()
        .map(|(n, d, f)| (n.as_str(), d.as_str(), *f))
        .collect();
    define_intrinsic(
        name,
        Some("java/lang/Object"),
        &[],
        ClassAccessFlag::PUBLIC | ClassAccessFlag::FINAL,
        &[(
            "value",
            value_descriptor,
            FieldAccessFlag::PRIVATE | FieldAccessFlag::FINAL,
        )],
        &method_refs,
    );
}

fn install_intrinsics() {
    let iface = ClassAccessFlag::PUBLIC | ClassAccessFlag::INTERFACE | ClassAccessFlag::ABSTRACT;
    let pubf = ClassAccessFlag::PUBLIC;

    define_intrinsic(
        "java/lang/Object",
        None,
        &[],
        pubf,
        &[],
        &[
            ("<init>", "()V", native_method(PUB)),
            ("hashCode", "()I", native_method(PUB)),
            ("equals", "(Ljava/lang/Object;)Z", native_method(PUB)),
            ("toString", "()Ljava/lang/String;", native_method(PUB)),
            ("getClass", "()Ljava/lang/Class;", native_method(PUB | MethodAccessFlag::FINAL)),
            ("clone", "()Ljava/lang/Object;", native_method(PUB)),
            ("wait", "()V", native_method(PUB | MethodAccessFlag::FINAL)),
            ("wait", "(J)V", native_method(PUB | MethodAccessFlag::FINAL)),
            ("notify", "()V", native_method(PUB | MethodAccessFlag::FINAL)),
            ("notifyAll", "()V", native_method(PUB | MethodAccessFlag::FINAL)),
        ],
    );

    define_intrinsic("java/lang/Cloneable", Some("java/lang/Object"), &[], iface, &[], &[]);
    define_intrinsic("java/io/Serializable", Some("java/lang/Object"), &[], iface, &[], &[]);
    define_intrinsic(
        "java/lang/Runnable",
        Some("java/lang/Object"),
        &[],
        iface,
        &[],
        &[("run", "()V", PUB | MethodAccessFlag::ABSTRACT)],
    );

    define_intrinsic(
        "java/lang/String",
        Some("java/lang/Object"),
        &["java/io/Serializable"],
        pubf | ClassAccessFlag::FINAL,
        &[],
        &[
            ("<init>", "()V", native_method(PUB)),
            ("length", "()I", native_method(PUB)),
            ("isEmpty", "()Z", native_method(PUB)),
            ("charAt", "(I)C", native_method(PUB)),
            ("hashCode", "()I", native_method(PUB)),
            ("equals", "(Ljava/lang/Object;)Z", native_method(PUB)),
            ("toString", "()Ljava/lang/String;", native_method(PUB)),
            ("intern", "()Ljava/lang/String;", native_method(PUB)),
            ("concat", "(Ljava/lang/String;)Ljava/lang/String;", native_method(PUB)),
        ],
    );

    define_intrinsic(
        "java/lang/Class",
        Some("java/lang/Object"),
        &[],
        pubf | ClassAccessFlag::FINAL,
        &[],
        &[
            ("getName", "()Ljava/lang/String;", native_method(PUB)),
            ("toString", "()Ljava/lang/String;", native_method(PUB)),
            ("isArray", "()Z", native_method(PUB)),
            ("isInterface", "()Z", native_method(PUB)),
            ("isPrimitive", "()Z", native_method(PUB)),
            ("getComponentType", "()Ljava/lang/Class;", native_method(PUB)),
            ("isInstance", "(Ljava/lang/Object;)Z", native_method(PUB)),
            ("newInstance", "()Ljava/lang/Object;", native_method(PUB)),
            (
                "getMethod",
                "(Ljava/lang/String;[Ljava/lang/Class;)Ljava/lang/reflect/Method;",
                native_method(PUB),
            ),
            (
                "getField",
                "(Ljava/lang/String;)Ljava/lang/reflect/Field;",
                native_method(PUB),
            ),
        ],
    );

    define_intrinsic(
        "java/lang/StringBuilder",
        Some("java/lang/Object"),
        &[],
        pubf | ClassAccessFlag::FINAL,
        &[],
        &[
            ("<init>", "()V", native_method(PUB)),
            ("<init>", "(Ljava/lang/String;)V", native_method(PUB)),
            ("append", "(Ljava/lang/String;)Ljava/lang/StringBuilder;", native_method(PUB)),
            ("append", "(Ljava/lang/Object;)Ljava/lang/StringBuilder;", native_method(PUB)),
            ("append", "(I)Ljava/lang/StringBuilder;", native_method(PUB)),
            ("append", "(J)Ljava/lang/StringBuilder;", native_method(PUB)),
            ("append", "(C)Ljava/lang/StringBuilder;", native_method(PUB)),
            ("append", "(Z)Ljava/lang/StringBuilder;", native_method(PUB)),
            ("append", "(F)Ljava/lang/StringBuilder;", native_method(PUB)),
            ("append", "(D)Ljava/lang/StringBuilder;", native_method(PUB)),
            ("toString", "()Ljava/lang/String;", native_method(PUB)),
            ("length", "()I", native_method(PUB)),
        ],
    );

    define_intrinsic(
        "java/lang/Throwable",
        Some("java/lang/Object"),
        &["java/io/Serializable"],
        pubf,
        &[("detailMessage", "Ljava/lang/String;", FieldAccessFlag::PRIVATE)],
        &[
            ("<init>", "()V", native_method(PUB)),
            ("<init>", "(Ljava/lang/String;)V", native_method(PUB)),
            ("getMessage", "()Ljava/lang/String;", native_method(PUB)),
            ("toString", "()Ljava/lang/String;", native_method(PUB)),
            ("printStackTrace", "()V", native_method(PUB)),
        ],
    );

    for (name, super_name) in THROWABLE_HIERARCHY {
        define_plain_class(name, super_name);
    }

    define_intrinsic(
        "java/io/PrintStream",
        Some("java/lang/Object"),
        &[],
        pubf,
        &[],
        &[
            ("println", "()V", native_method(PUB)),
            ("println", "(Ljava/lang/String;)V", native_method(PUB)),
            ("println", "(Ljava/lang/Object;)V", native_method(PUB)),
            ("println", "(I)V", native_method(PUB)),
            ("println", "(J)V", native_method(PUB)),
            ("println", "(F)V", native_method(PUB)),
            ("println", "(D)V", native_method(PUB)),
            ("println", "(Z)V", native_method(PUB)),
            ("println", "(C)V", native_method(PUB)),
            ("print", "(Ljava/lang/String;)V", native_method(PUB)),
            ("print", "(Ljava/lang/Object;)V", native_method(PUB)),
            ("print", "(I)V", native_method(PUB)),
            ("print", "(J)V", native_method(PUB)),
            ("print", "(F)V", native_method(PUB)),
            ("print", "(D)V", native_method(PUB)),
            ("print", "(Z)V", native_method(PUB)),
            ("print", "(C)V", native_method(PUB)),
            ("flush", "()V", native_method(PUB)),
        ],
    );

    define_intrinsic(
        "java/lang/System",
        Some("java/lang/Object"),
        &[],
        pubf | ClassAccessFlag::FINAL,
        &[
            (
                "out",
                "Ljava/io/PrintStream;",
                FieldAccessFlag::PUBLIC | FieldAccessFlag::STATIC | FieldAccessFlag::FINAL,
            ),
            (
                "err",
                "Ljava/io/PrintStream;",
                FieldAccessFlag::PUBLIC | FieldAccessFlag::STATIC | FieldAccessFlag::FINAL,
            ),
        ],
        &[
            (
                "arraycopy",
                "(Ljava/lang/Object;ILjava/lang/Object;II)V",
                native_method(PUB | MethodAccessFlag::STATIC),
            ),
            ("currentTimeMillis", "()J", native_method(PUB | MethodAccessFlag::STATIC)),
            ("nanoTime", "()J", native_method(PUB | MethodAccessFlag::STATIC)),
            (
                "identityHashCode",
                "(Ljava/lang/Object;)I",
                native_method(PUB | MethodAccessFlag::STATIC),
            ),
            ("exit", "(I)V", native_method(PUB | MethodAccessFlag::STATIC)),
        ],
    );

    define_intrinsic(
        "java/lang/Thread",
        Some("java/lang/Object"),
        &["java/lang/Runnable"],
        pubf,
        &[("target", "Ljava/lang/Runnable;", FieldAccessFlag::PRIVATE)],
        &[
            ("<init>", "()V", native_method(PUB)),
            ("<init>", "(Ljava/lang/String;)V", native_method(PUB)),
            ("<init>", "(Ljava/lang/Runnable;)V", native_method(PUB)),
            ("run", "()V", native_method(PUB)),
            ("start", "()V", native_method(PUB)),
            ("interrupt", "()V", native_method(PUB)),
            ("isInterrupted", "()Z", native_method(PUB)),
            ("isAlive", "()Z", native_method(PUB)),
            ("join", "()V", native_method(PUB)),
            ("join", "(J)V", native_method(PUB)),
            ("getName", "()Ljava/lang/String;", native_method(PUB)),
            ("setName", "(Ljava/lang/String;)V", native_method(PUB)),
            ("sleep", "(J)V", native_method(PUB | MethodAccessFlag::STATIC)),
            (
                "currentThread",
                "()Ljava/lang/Thread;",
                native_method(PUB | MethodAccessFlag::STATIC),
            ),
            ("interrupted", "()Z", native_method(PUB | MethodAccessFlag::STATIC)),
        ],
    );

    define_box_class("java/lang/Integer", "I", "intValue", &[
        ("parseInt", "(Ljava/lang/String;)I"),
        ("toString", "(I)Ljava/lang/String;"),
    ]);
    define_box_class("java/lang/Long", "J", "longValue", &[
        ("toString", "(J)Ljava/lang/String;"),
    ]);
    define_box_class("java/lang/Float", "F", "floatValue", &[
        ("floatToIntBits", "(F)I"),
        ("floatToRawIntBits", "(F)I"),
        ("intBitsToFloat", "(I)F"),
        ("toString", "(F)Ljava/lang/String;"),
        ("isNaN", "(F)Z"),
    ]);
    define_box_class("java/lang/Double", "D", "doubleValue", &[
        ("doubleToLongBits", "(D)J"),
        ("doubleToRawLongBits", "(D)J"),
        ("longBitsToDouble", "(J)D"),
        ("toString", "(D)Ljava/lang/String;"),
        ("isNaN", "(D)Z"),
    ]);
    define_box_class("java/lang/Boolean", "Z", "booleanValue", &[]);
    define_box_class("java/lang/Character", "C", "charValue", &[]);
    define_box_class("java/lang/Short", "S", "shortValue", &[]);
    define_box_class("java/lang/Byte", "B", "byteValue", &[]);

    define_intrinsic(
        "java/lang/reflect/Method",
        Some("java/lang/Object"),
        &[],
        pubf | ClassAccessFlag::FINAL,
        &[],
        &[
            ("getName", "()Ljava/lang/String;", native_method(PUB)),
            (
                "invoke",
                "(Ljava/lang/Object;[Ljava/lang/Object;)Ljava/lang/Object;",
                native_method(PUB),
            ),
        ],
    );
    define_intrinsic(
        "java/lang/reflect/Field",
        Some("java/lang/Object"),
        &[],
        pubf | ClassAccessFlag::FINAL,
        &[],
        &[
            ("getName", "()Ljava/lang/String;", native_method(PUB)),
            ("get", "(Ljava/lang/Object;)Ljava/lang/Object;", native_method(PUB)),
            ("set", "(Ljava/lang/Object;Ljava/lang/Object;)V", native_method(PUB)),
        ],
    );
    define_intrinsic(
        "java/lang/reflect/Array",
        Some("java/lang/Object"),
        &[],
        pubf | ClassAccessFlag::FINAL,
        &[],
        &[
            (
                "getLength",
                "(Ljava/lang/Object;)I",
                native_method(PUB | MethodAccessFlag::STATIC),
            ),
            (
                "get",
                "(Ljava/lang/Object;I)Ljava/lang/Object;",
                native_method(PUB | MethodAccessFlag::STATIC),
            ),
            (
                "set",
                "(Ljava/lang/Object;ILjava/lang/Object;)V",
                native_method(PUB | MethodAccessFlag::STATIC),
            ),
            (
                "newInstance",
                "(Ljava/lang/Class;I)Ljava/lang/Object;",
                native_method(PUB | MethodAccessFlag::STATIC),
            ),
        ],
    );

    define_intrinsic(
        "java/util/concurrent/locks/LockSupport",
        Some("java/lang/Object"),
        &[],
        pubf | ClassAccessFlag::FINAL,
        &[],
        &[
            ("park", "()V", native_method(PUB | MethodAccessFlag::STATIC)),
            ("parkNanos", "(J)V", native_method(PUB | MethodAccessFlag::STATIC)),
            (
                "unpark",
                "(Ljava/lang/Thread;)V",
                native_method(PUB | MethodAccessFlag::STATIC),
            ),
        ],
    );

    define_primitive_mirror("boolean", FieldType::Boolean);
    define_primitive_mirror("byte", FieldType::Byte);
    define_primitive_mirror("char", FieldType::Char);
    define_primitive_mirror("short", FieldType::Short);
    define_primitive_mirror("int", FieldType::Int);
    define_primitive_mirror("long", FieldType::Long);
    define_primitive_mirror("float", FieldType::Float);
    define_primitive_mirror("double", FieldType::Double);

    install_system_streams();
}

/// `(subclass, superclass)` pairs, in definition order.
pub(crate) const THROWABLE_HIERARCHY: &[(&str, &str)] = &[
    ("java/lang/Exception", "java/lang/Throwable"),
    ("java/lang/Error", "java/lang/Throwable"),
    ("java/lang/RuntimeException", "java/lang/Exception"),
    ("java/lang/InterruptedException", "java/lang/Exception"),
    ("java/lang/CloneNotSupportedException", "java/lang/Exception"),
    ("java/lang/ClassNotFoundException", "java/lang/Exception"),
    ("java/lang/NoSuchMethodException", "java/lang/Exception"),
    ("java/lang/NoSuchFieldException", "java/lang/Exception"),
    ("java/lang/InstantiationException", "java/lang/Exception"),
    ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
    ("java/lang/NullPointerException", "java/lang/RuntimeException"),
    ("java/lang/ClassCastException", "java/lang/RuntimeException"),
    ("java/lang/ArrayStoreException", "java/lang/RuntimeException"),
    ("java/lang/IndexOutOfBoundsException", "java/lang/RuntimeException"),
    (
        "java/lang/ArrayIndexOutOfBoundsException",
        "java/lang/IndexOutOfBoundsException",
    ),
    (
        "java/lang/StringIndexOutOfBoundsException",
        "java/lang/IndexOutOfBoundsException",
    ),
    ("java/lang/NegativeArraySizeException", "java/lang/RuntimeException"),
    ("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
    ("java/lang/NumberFormatException", "java/lang/IllegalArgumentException"),
    ("java/lang/IllegalStateException", "java/lang/RuntimeException"),
    ("java/lang/IllegalMonitorStateException", "java/lang/RuntimeException"),
    ("java/lang/IllegalThreadStateException", "java/lang/IllegalArgumentException"),
    ("java/lang/UnsupportedOperationException", "java/lang/RuntimeException"),
    ("java/lang/LinkageError", "java/lang/Error"),
    ("java/lang/NoClassDefFoundError", "java/lang/LinkageError"),
    ("java/lang/ClassFormatError", "java/lang/LinkageError"),
    ("java/lang/UnsupportedClassVersionError", "java/lang/ClassFormatError"),
    ("java/lang/IncompatibleClassChangeError", "java/lang/LinkageError"),
    ("java/lang/NoSuchMethodError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/NoSuchFieldError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/AbstractMethodError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/InstantiationError", "java/lang/IncompatibleClassChangeError"),
    ("java/lang/UnsatisfiedLinkError", "java/lang/LinkageError"),
    ("java/lang/ExceptionInInitializerError", "java/lang/LinkageError"),
    ("java/lang/VirtualMachineError", "java/lang/Error"),
    ("java/lang/StackOverflowError", "java/lang/VirtualMachineError"),
    ("java/lang/OutOfMemoryError", "java/lang/VirtualMachineError"),
    ("java/lang/InternalError", "java/lang/VirtualMachineError"),
];

fn set_static(class_name: &str, field_name: &str, value: Value) {
    let class = registered(class_name);
    if let Some(field) = class.find_field(field_name) {
        class.set_static_value(field.slot, value);
    }
}

fn install_system_streams() {
    let print_stream = registered("java/io/PrintStream");
    if let (Ok(out_id), Ok(err_id)) = (
        heap::allocate_instance(&print_stream),
        heap::allocate_instance(&print_stream),
    ) {
        set_static("java/lang/System", "out", Value::Reference(out_id));
        set_static("java/lang/System", "err", Value::Reference(err_id));
        crate::runtime::stdio::bind_streams(out_id, err_id);
    }
}
