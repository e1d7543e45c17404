//! Shared test harness: a small class-file assembler and a capture-based
//! runner over an in-memory classpath.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use parking_lot::Mutex;

use mochavm::runtime::{
    Exception,
    class_loader::bootstrap::{self, MemorySource},
    interpreter, stdio,
};

/// Serializes whole-VM tests; the class registry and capture buffer are
/// process-wide.
pub static VM_LOCK: LazyLock<Mutex<()>> = LazyLock::new(Mutex::default);

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_SUPER: u16 = 0x0020;

enum PoolEntry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    Str(u16),
    Fieldref(u16, u16),
    Methodref(u16, u16),
    NameAndType(u16, u16),
}

struct MethodEntry {
    flags: u16,
    name: u16,
    descriptor: u16,
    code: Option<CodeEntry>,
}

struct CodeEntry {
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    /// (start_pc, end_pc, handler_pc, catch_type_index)
    exceptions: Vec<(u16, u16, u16, u16)>,
}

/// Assembles a minimal but well-formed class file.
pub struct ClassBuilder {
    pool: Vec<PoolEntry>,
    next_index: u16,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
    this_class: u16,
    super_class: u16,
    fields: Vec<(u16, u16, u16)>,
    methods: Vec<MethodEntry>,
}

impl ClassBuilder {
    pub fn new(name: &str, super_name: &str) -> Self {
        let mut builder = ClassBuilder {
            pool: Vec::new(),
            next_index: 1,
            utf8_cache: HashMap::new(),
            class_cache: HashMap::new(),
            this_class: 0,
            super_class: 0,
            fields: Vec::new(),
            methods: Vec::new(),
        };
        builder.this_class = builder.class_ref(name);
        builder.super_class = builder.class_ref(super_name);
        builder
    }

    fn push(&mut self, entry: PoolEntry) -> u16 {
        let index = self.next_index;
        self.next_index += match entry {
            PoolEntry::Long(_) | PoolEntry::Double(_) => 2,
            _ => 1,
        };
        self.pool.push(entry);
        index
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        if let Some(index) = self.utf8_cache.get(text) {
            return *index;
        }
        let index = self.push(PoolEntry::Utf8(text.to_string()));
        self.utf8_cache.insert(text.to_string(), index);
        index
    }

    pub fn class_ref(&mut self, name: &str) -> u16 {
        if let Some(index) = self.class_cache.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        let index = self.push(PoolEntry::Class(name_index));
        self.class_cache.insert(name.to_string(), index);
        index
    }

    pub fn string_const(&mut self, value: &str) -> u16 {
        let value_index = self.utf8(value);
        self.push(PoolEntry::Str(value_index))
    }

    pub fn int_const(&mut self, value: i32) -> u16 {
        self.push(PoolEntry::Integer(value))
    }

    pub fn long_const(&mut self, value: i64) -> u16 {
        self.push(PoolEntry::Long(value))
    }

    pub fn float_const(&mut self, value: f32) -> u16 {
        self.push(PoolEntry::Float(value))
    }

    pub fn double_const(&mut self, value: f64) -> u16 {
        self.push(PoolEntry::Double(value))
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.push(PoolEntry::NameAndType(name_index, descriptor_index))
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class_ref(class);
        let nat = self.name_and_type(name, descriptor);
        self.push(PoolEntry::Fieldref(class_index, nat))
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class_ref(class);
        let nat = self.name_and_type(name, descriptor);
        self.push(PoolEntry::Methodref(class_index, nat))
    }

    pub fn add_field(&mut self, flags: u16, name: &str, descriptor: &str) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.fields.push((flags, name_index, descriptor_index));
    }

    pub fn add_method(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
    ) {
        self.add_method_with_handlers(flags, name, descriptor, max_stack, max_locals, code, &[]);
    }

    pub fn add_method_with_handlers(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
        exceptions: &[(u16, u16, u16, u16)],
    ) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.methods.push(MethodEntry {
            flags,
            name: name_index,
            descriptor: descriptor_index,
            code: Some(CodeEntry {
                max_stack,
                max_locals,
                code,
                exceptions: exceptions.to_vec(),
            }),
        });
    }

    pub fn build(mut self) -> Vec<u8> {
        let code_name = self.utf8("Code");

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&52u16.to_be_bytes());

        out.extend_from_slice(&self.next_index.to_be_bytes());
        for entry in &self.pool {
            match entry {
                PoolEntry::Utf8(text) => {
                    out.push(1);
                    out.extend_from_slice(&(text.len() as u16).to_be_bytes());
                    out.extend_from_slice(text.as_bytes());
                }
                PoolEntry::Integer(value) => {
                    out.push(3);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                PoolEntry::Float(value) => {
                    out.push(4);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                PoolEntry::Long(value) => {
                    out.push(5);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                PoolEntry::Double(value) => {
                    out.push(6);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                PoolEntry::Class(name) => {
                    out.push(7);
                    out.extend_from_slice(&name.to_be_bytes());
                }
                PoolEntry::Str(value) => {
                    out.push(8);
                    out.extend_from_slice(&value.to_be_bytes());
                }
                PoolEntry::Fieldref(class, nat) => {
                    out.push(9);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&nat.to_be_bytes());
                }
                PoolEntry::Methodref(class, nat) => {
                    out.push(10);
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&nat.to_be_bytes());
                }
                PoolEntry::NameAndType(name, descriptor) => {
                    out.push(12);
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&descriptor.to_be_bytes());
                }
            }
        }

        out.extend_from_slice(&(ACC_PUBLIC | ACC_SUPER).to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());

        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for (flags, name, descriptor) in &self.fields {
            out.extend_from_slice(&flags.to_be_bytes());
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&descriptor.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        }

        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            out.extend_from_slice(&method.flags.to_be_bytes());
            out.extend_from_slice(&method.name.to_be_bytes());
            out.extend_from_slice(&method.descriptor.to_be_bytes());
            match &method.code {
                Some(code) => {
                    out.extend_from_slice(&1u16.to_be_bytes());
                    out.extend_from_slice(&code_name.to_be_bytes());
                    let length = 12 + code.code.len() + 8 * code.exceptions.len();
                    out.extend_from_slice(&(length as u32).to_be_bytes());
                    out.extend_from_slice(&code.max_stack.to_be_bytes());
                    out.extend_from_slice(&code.max_locals.to_be_bytes());
                    out.extend_from_slice(&(code.code.len() as u32).to_be_bytes());
                    out.extend_from_slice(&code.code);
                    out.extend_from_slice(&(code.exceptions.len() as u16).to_be_bytes());
                    for (start, end, handler, catch_type) in &code.exceptions {
                        out.extend_from_slice(&start.to_be_bytes());
                        out.extend_from_slice(&end.to_be_bytes());
                        out.extend_from_slice(&handler.to_be_bytes());
                        out.extend_from_slice(&catch_type.to_be_bytes());
                    }
                    out.extend_from_slice(&0u16.to_be_bytes());
                }
                None => out.extend_from_slice(&0u16.to_be_bytes()),
            }
        }

        out.extend_from_slice(&0u16.to_be_bytes());
        out
    }
}

/// Runs `main_class.main` against an in-memory classpath, capturing guest
/// stdout. The VM lock is held for the duration.
pub fn run_guest_capturing(
    classes: Vec<(&str, Vec<u8>)>,
    main_class: &str,
) -> (Result<(), Exception>, String) {
    let _guard = VM_LOCK.lock();
    run_guest_locked(classes, main_class)
}

/// Variant for tests that hold `VM_LOCK` themselves across multiple runs.
pub fn run_guest_locked(
    classes: Vec<(&str, Vec<u8>)>,
    main_class: &str,
) -> (Result<(), Exception>, String) {
    let source = MemorySource::new();
    for (name, bytes) in classes {
        source.define(name, bytes);
    }
    bootstrap::add_source(Box::new(source));

    let buffer = Arc::new(Mutex::new(String::new()));
    stdio::capture_into(buffer.clone());
    let result = interpreter::invoke_main(main_class, &[]);
    stdio::release_capture();
    let output = buffer.lock().clone();
    (result, output)
}

/// Runs and asserts a clean exit, returning captured stdout.
pub fn run_guest(classes: Vec<(&str, Vec<u8>)>, main_class: &str) -> String {
    let (result, output) = run_guest_capturing(classes, main_class);
    if let Err(exception) = result {
        panic!(
            "uncaught guest exception: {} (output so far: {output:?})",
            exception_description(exception)
        );
    }
    output
}

pub fn exception_description(exception: Exception) -> String {
    match interpreter::materialize(exception) {
        Ok(id) => interpreter::describe_throwable(id),
        Err(nested) => format!("{nested:?}"),
    }
}

/// Big-endian operand bytes for a constant-pool index.
pub fn idx(index: u16) -> [u8; 2] {
    index.to_be_bytes()
}

/// `aload_0; invokespecial super.<init>; return` for trivial constructors.
pub fn trivial_init(builder: &mut ClassBuilder, super_name: &str) {
    let super_init = builder.method_ref(super_name, "<init>", "()V");
    let code = vec![
        0x2a, // aload_0
        0xb7, // invokespecial
        (super_init >> 8) as u8,
        super_init as u8,
        0xb1, // return
    ];
    builder.add_method(ACC_PUBLIC, "<init>", "()V", 1, 1, code);
}
