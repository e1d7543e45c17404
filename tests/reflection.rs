//! String interning, class mirrors and the `java.lang.reflect` surface.

mod common;

use common::{ACC_PUBLIC, ACC_STATIC, ClassBuilder, VM_LOCK, idx, run_guest_locked};

use mochavm::runtime::{class_loader, heap, heap::string_table};

#[test]
fn interning_is_by_content() {
    let _guard = VM_LOCK.lock();

    let a = string_table::intern("hello").unwrap();
    let b = string_table::intern("hello").unwrap();
    let c = string_table::intern("world").unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);

    // names that collide with host-object members are ordinary keys
    for name in ["__proto__", "valueOf", "hasOwnProperty", "constructor"] {
        let first = string_table::intern(name).unwrap();
        let second = string_table::intern(name).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, a);
    }
}

#[test]
fn class_mirrors_are_canonical() {
    let _guard = VM_LOCK.lock();

    let string_class = class_loader::resolve_class("java/lang/String").unwrap();
    let integer_class = class_loader::resolve_class("java/lang/Integer").unwrap();
    let first = heap::class_object(&string_class).unwrap();
    let second = heap::class_object(&string_class).unwrap();
    assert_eq!(first, second);
    assert_ne!(first, heap::class_object(&integer_class).unwrap());
}

#[test]
fn array_set_checks_index_before_value_type() {
    let _guard = VM_LOCK.lock();

    let mut main = ClassBuilder::new("ReflectArrayMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = main.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let set = main.method_ref(
        "java/lang/reflect/Array",
        "set",
        "(Ljava/lang/Object;ILjava/lang/Object;)V",
    );
    let oob = main.class_ref("java/lang/ArrayIndexOutOfBoundsException");
    let bad_arg = main.class_ref("java/lang/IllegalArgumentException");
    let text = main.string_const("x");
    let bounds = main.string_const("bounds");
    let mismatch = main.string_const("type");

    // int[] a = new int[2];
    // Array.set(a, 5, "x")  -> index rejected first
    // Array.set(a, 0, "x")  -> then the value type
    let mut code = Vec::new();
    code.push(0x05); // 0: iconst_2
    code.extend([0xbc, 0x0a]); // 1: newarray int
    code.push(0x4c); // 3: astore_1
    code.push(0x2b); // 4: aload_1
    code.push(0x08); // 5: iconst_5
    code.push(0x12); // 6: ldc "x"
    code.push(text as u8);
    code.push(0xb8); // 8: invokestatic Array.set
    code.extend(idx(set));
    code.extend([0xa7, 0x00, 0x0c]); // 11: goto 23
    code.push(0x4d); // 14: astore_2
    code.push(0xb2); // 15: getstatic out
    code.extend(idx(out));
    code.push(0x12); // 18: ldc "bounds"
    code.push(bounds as u8);
    code.push(0xb6); // 20: println
    code.extend(idx(println));
    code.push(0x2b); // 23: aload_1
    code.push(0x03); // 24: iconst_0
    code.push(0x12); // 25: ldc "x"
    code.push(text as u8);
    code.push(0xb8); // 27: invokestatic Array.set
    code.extend(idx(set));
    code.extend([0xa7, 0x00, 0x0c]); // 30: goto 42
    code.push(0x4d); // 33: astore_2
    code.push(0xb2); // 34: getstatic out
    code.extend(idx(out));
    code.push(0x12); // 37: ldc "type"
    code.push(mismatch as u8);
    code.push(0xb6); // 39: println
    code.extend(idx(println));
    code.push(0xb1); // 42: return
    main.add_method_with_handlers(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        3,
        3,
        code,
        &[(4, 11, 14, oob), (23, 30, 33, bad_arg)],
    );

    let (result, output) = run_guest_locked(
        vec![("ReflectArrayMain", main.build())],
        "ReflectArrayMain",
    );
    assert!(result.is_ok(), "run failed: {result:?}");
    assert_eq!(output, "bounds\ntype\n");
}

#[test]
fn looked_up_method_invokes_and_boxes() {
    let _guard = VM_LOCK.lock();

    let mut target = ClassBuilder::new("ReflectTarget", "java/lang/Object");
    target.add_method(
        ACC_PUBLIC | ACC_STATIC,
        "answer",
        "()I",
        1,
        0,
        vec![0x10, 42, 0xac], // bipush 42; ireturn
    );

    let mut main = ClassBuilder::new("ReflectInvokeMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = main.method_ref("java/io/PrintStream", "println", "(Ljava/lang/Object;)V");
    let target_class = main.class_ref("ReflectTarget");
    let get_method = main.method_ref(
        "java/lang/Class",
        "getMethod",
        "(Ljava/lang/String;[Ljava/lang/Class;)Ljava/lang/reflect/Method;",
    );
    let invoke = main.method_ref(
        "java/lang/reflect/Method",
        "invoke",
        "(Ljava/lang/Object;[Ljava/lang/Object;)Ljava/lang/Object;",
    );
    let name = main.string_const("answer");

    // ReflectTarget.class.getMethod("answer", null).invoke(null, null)
    let mut code = Vec::new();
    code.push(0xb2); // getstatic out
    code.extend(idx(out));
    code.push(0x12); // ldc ReflectTarget.class
    code.push(target_class as u8);
    code.push(0x12); // ldc "answer"
    code.push(name as u8);
    code.push(0x01); // aconst_null
    code.push(0xb6); // invokevirtual getMethod
    code.extend(idx(get_method));
    code.push(0x01); // aconst_null
    code.push(0x01); // aconst_null
    code.push(0xb6); // invokevirtual invoke
    code.extend(idx(invoke));
    code.push(0xb6); // println(Object) prints the boxed Integer
    code.extend(idx(println));
    code.push(0xb1);
    main.add_method(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V", 4, 1, code);

    let (result, output) = run_guest_locked(
        vec![("ReflectTarget", target.build()), ("ReflectInvokeMain", main.build())],
        "ReflectInvokeMain",
    );
    assert!(result.is_ok(), "run failed: {result:?}");
    assert_eq!(output, "42\n");
}
