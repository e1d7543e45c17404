//! End-to-end bytecode execution through assembled classes.

mod common;

use common::{ACC_PUBLIC, ACC_STATIC, ClassBuilder, idx, run_guest, trivial_init};

#[test]
fn gcd_program_prints_result() {
    let mut main = ClassBuilder::new("GcdMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let sb_class = main.class_ref("java/lang/StringBuilder");
    let sb_init = main.method_ref("java/lang/StringBuilder", "<init>", "()V");
    let append_str = main.method_ref(
        "java/lang/StringBuilder",
        "append",
        "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
    );
    let append_int = main.method_ref(
        "java/lang/StringBuilder",
        "append",
        "(I)Ljava/lang/StringBuilder;",
    );
    let to_string = main.method_ref("java/lang/StringBuilder", "toString", "()Ljava/lang/String;");
    let println = main.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let gcd = main.method_ref("GcdMain", "gcd", "(II)I");
    let label = main.string_const("The GCD of 114 and 84 is ");

    // while (b != 0) { t = b; b = a % b; a = t; } return a;
    let gcd_code = vec![
        0x1b, // iload_1
        0x99, 0x00, 0x0e, // ifeq +14
        0x1b, // iload_1
        0x3d, // istore_2
        0x1a, // iload_0
        0x1b, // iload_1
        0x70, // irem
        0x3c, // istore_1
        0x1c, // iload_2
        0x3b, // istore_0
        0xa7, 0xff, 0xf4, // goto -12
        0x1a, // iload_0
        0xac, // ireturn
    ];
    main.add_method(ACC_PUBLIC | ACC_STATIC, "gcd", "(II)I", 2, 3, gcd_code);

    let mut code = Vec::new();
    code.push(0xb2); // getstatic out
    code.extend(idx(out));
    code.push(0xbb); // new StringBuilder
    code.extend(idx(sb_class));
    code.push(0x59); // dup
    code.push(0xb7); // invokespecial <init>
    code.extend(idx(sb_init));
    code.push(0x12); // ldc label
    code.push(label as u8);
    code.push(0xb6); // append(String)
    code.extend(idx(append_str));
    code.extend([0x11, 0x00, 0x90]); // sipush 144
    code.extend([0x10, 84]); // bipush 84
    code.push(0xb8); // invokestatic gcd
    code.extend(idx(gcd));
    code.push(0xb6); // append(I)
    code.extend(idx(append_int));
    code.push(0xb6); // toString
    code.extend(idx(to_string));
    code.push(0xb6); // println
    code.extend(idx(println));
    code.push(0xb1); // return
    main.add_method(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V", 4, 1, code);

    let output = run_guest(vec![("GcdMain", main.build())], "GcdMain");
    assert_eq!(output, "The GCD of 114 and 84 is 12\n");
}

#[test]
fn caught_division_by_zero() {
    let mut main = ClassBuilder::new("DivMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = main.method_ref("java/io/PrintStream", "println", "(I)V");
    let div = main.method_ref("DivMain", "div", "(II)I");
    let arithmetic = main.class_ref("java/lang/ArithmeticException");

    let div_code = vec![
        0x1a, // iload_0
        0x1b, // iload_1
        0x6c, // idiv
        0xac, // ireturn
        0x4d, // astore_2 (handler)
        0x02, // iconst_m1
        0xac, // ireturn
    ];
    main.add_method_with_handlers(
        ACC_PUBLIC | ACC_STATIC,
        "div",
        "(II)I",
        2,
        3,
        div_code,
        &[(0, 4, 4, arithmetic)],
    );

    let mut code = Vec::new();
    code.push(0xb2);
    code.extend(idx(out));
    code.extend([0x10, 10]); // bipush 10
    code.push(0x03); // iconst_0
    code.push(0xb8);
    code.extend(idx(div));
    code.push(0xb6);
    code.extend(idx(println));
    code.push(0xb1);
    main.add_method(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V", 3, 1, code);

    let output = run_guest(vec![("DivMain", main.build())], "DivMain");
    assert_eq!(output, "-1\n");
}

#[test]
fn lookupswitch_dispatch() {
    let mut main = ClassBuilder::new("SwitchMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = main.method_ref("java/io/PrintStream", "println", "(I)V");
    let pick = main.method_ref("SwitchMain", "pick", "(I)I");

    // switch (x) { case 1: return 10; case 5: return 50; default: return -1; }
    #[rustfmt::skip]
    let pick_code = vec![
        0x1a,             // 0: iload_0
        0xab, 0x00, 0x00, // 1: lookupswitch, padding to 4
        0, 0, 0, 33,      // default -> 34
        0, 0, 0, 2,       // npairs
        0, 0, 0, 1, 0, 0, 0, 27,  // 1 -> 28
        0, 0, 0, 5, 0, 0, 0, 30,  // 5 -> 31
        0x10, 10, 0xac,   // 28: bipush 10; ireturn
        0x10, 50, 0xac,   // 31: bipush 50; ireturn
        0x02, 0xac,       // 34: iconst_m1; ireturn
    ];
    main.add_method(ACC_PUBLIC | ACC_STATIC, "pick", "(I)I", 1, 1, pick_code);

    let mut code = Vec::new();
    for value in [0x08u8, 0x10] {
        code.push(0xb2);
        code.extend(idx(out));
        if value == 0x08 {
            code.push(0x08); // iconst_5
        } else {
            code.extend([0x10, 7]); // bipush 7
        }
        code.push(0xb8);
        code.extend(idx(pick));
        code.push(0xb6);
        code.extend(idx(println));
    }
    code.push(0xb1);
    main.add_method(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V", 3, 1, code);

    let output = run_guest(vec![("SwitchMain", main.build())], "SwitchMain");
    assert_eq!(output, "50\n-1\n");
}

#[test]
fn array_store_covariance_checked() {
    let mut main = ClassBuilder::new("CovariantMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = main.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let string_class = main.class_ref("java/lang/String");
    let object_class = main.class_ref("java/lang/Object");
    let object_init = main.method_ref("java/lang/Object", "<init>", "()V");
    let store_error = main.class_ref("java/lang/ArrayStoreException");
    let caught = main.string_const("caught");

    // Object[] a = new String[1]; a[0] = new Object();
    let mut code = Vec::new();
    code.push(0x04); // 0: iconst_1
    code.push(0xbd); // 1: anewarray String
    code.extend(idx(string_class));
    code.push(0x4c); // 4: astore_1
    code.push(0x2b); // 5: aload_1
    code.push(0x03); // 6: iconst_0
    code.push(0xbb); // 7: new Object
    code.extend(idx(object_class));
    code.push(0x59); // 10: dup
    code.push(0xb7); // 11: invokespecial Object.<init>
    code.extend(idx(object_init));
    code.push(0x53); // 14: aastore
    code.push(0xb1); // 15: return
    code.push(0x4d); // 16: astore_2 (handler)
    code.push(0xb2); // 17: getstatic out
    code.extend(idx(out));
    code.push(0x12); // 20: ldc "caught"
    code.push(caught as u8);
    code.push(0xb6); // 22: invokevirtual println
    code.extend(idx(println));
    code.push(0xb1); // 25: return
    main.add_method_with_handlers(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        4,
        3,
        code,
        &[(0, 15, 16, store_error)],
    );

    let output = run_guest(vec![("CovariantMain", main.build())], "CovariantMain");
    assert_eq!(output, "caught\n");
}

#[test]
fn shadowed_fields_resolve_statically() {
    let mut base = ClassBuilder::new("ShadowA", "java/lang/Object");
    base.add_field(ACC_PUBLIC, "x", "I");
    trivial_init(&mut base, "java/lang/Object");

    let mut derived = ClassBuilder::new("ShadowB", "ShadowA");
    derived.add_field(ACC_PUBLIC, "x", "I");
    trivial_init(&mut derived, "ShadowA");

    let mut main = ClassBuilder::new("ShadowMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = main.method_ref("java/io/PrintStream", "println", "(I)V");
    let b_class = main.class_ref("ShadowB");
    let b_init = main.method_ref("ShadowB", "<init>", "()V");
    let b_x = main.field_ref("ShadowB", "x", "I");
    let a_x = main.field_ref("ShadowA", "x", "I");

    let mut code = Vec::new();
    code.push(0xbb); // new ShadowB
    code.extend(idx(b_class));
    code.push(0x59); // dup
    code.push(0xb7); // invokespecial <init>
    code.extend(idx(b_init));
    code.push(0x4c); // astore_1
    code.push(0x2b); // aload_1
    code.push(0x08); // iconst_5
    code.push(0xb5); // putfield ShadowB.x
    code.extend(idx(b_x));
    code.push(0x2b); // aload_1
    code.extend([0x10, 7]); // bipush 7
    code.push(0xb5); // putfield ShadowA.x
    code.extend(idx(a_x));
    for field in [b_x, a_x] {
        code.push(0xb2); // getstatic out
        code.extend(idx(out));
        code.push(0x2b); // aload_1
        code.push(0xb4); // getfield
        code.extend(idx(field));
        code.push(0xb6); // println(I)
        code.extend(idx(println));
    }
    code.push(0xb1);
    main.add_method(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V", 3, 2, code);

    let output = run_guest(
        vec![
            ("ShadowA", base.build()),
            ("ShadowB", derived.build()),
            ("ShadowMain", main.build()),
        ],
        "ShadowMain",
    );
    assert_eq!(output, "5\n7\n");
}

#[test]
fn long_shift_and_division() {
    let mut main = ClassBuilder::new("LongMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = main.method_ref("java/io/PrintStream", "println", "(J)V");
    let one = main.long_const(1);
    let three = main.long_const(3);

    // (1L << 40) / 3
    let mut code = Vec::new();
    code.push(0xb2);
    code.extend(idx(out));
    code.push(0x14); // ldc2_w 1L
    code.extend(idx(one));
    code.extend([0x10, 40]); // bipush 40
    code.push(0x79); // lshl
    code.push(0x14); // ldc2_w 3L
    code.extend(idx(three));
    code.push(0x6d); // ldiv
    code.push(0xb6);
    code.extend(idx(println));
    code.push(0xb1);
    main.add_method(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V", 6, 1, code);

    let output = run_guest(vec![("LongMain", main.build())], "LongMain");
    assert_eq!(output, "366503875925\n");
}

#[test]
fn nan_comparison_and_narrowing() {
    let mut main = ClassBuilder::new("FloatMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = main.method_ref("java/io/PrintStream", "println", "(I)V");
    let huge = main.double_const(1e20);

    let mut code = Vec::new();
    // fcmpg on NaN pushes 1
    code.push(0xb2);
    code.extend(idx(out));
    code.extend([0x0b, 0x0b, 0x6e, 0x0b, 0x96]); // 0f/0f, 0f, fcmpg
    code.push(0xb6);
    code.extend(idx(println));
    // fcmpl on NaN pushes -1
    code.push(0xb2);
    code.extend(idx(out));
    code.extend([0x0b, 0x0b, 0x6e, 0x0b, 0x95]); // fcmpl
    code.push(0xb6);
    code.extend(idx(println));
    // d2i saturates
    code.push(0xb2);
    code.extend(idx(out));
    code.push(0x14); // ldc2_w 1e20
    code.extend(idx(huge));
    code.push(0x8e); // d2i
    code.push(0xb6);
    code.extend(idx(println));
    code.push(0xb1);
    main.add_method(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V", 5, 1, code);

    let output = run_guest(vec![("FloatMain", main.build())], "FloatMain");
    assert_eq!(output, "1\n-1\n2147483647\n");
}

#[test]
fn out_of_bounds_reference_store_checks_bounds_first() {
    let mut main = ClassBuilder::new("StoreOrderMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = main.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let string_class = main.class_ref("java/lang/String");
    let object_class = main.class_ref("java/lang/Object");
    let object_init = main.method_ref("java/lang/Object", "<init>", "()V");
    let oob = main.class_ref("java/lang/ArrayIndexOutOfBoundsException");
    let store = main.class_ref("java/lang/ArrayStoreException");
    let bounds = main.string_const("bounds");
    let mismatch = main.string_const("store");

    // String[] a = new String[1]; a[5] = new Object();
    // the index is rejected before the element type
    let mut code = Vec::new();
    code.push(0x04); // 0: iconst_1
    code.push(0xbd); // 1: anewarray String
    code.extend(idx(string_class));
    code.push(0x4c); // 4: astore_1
    code.push(0x2b); // 5: aload_1
    code.push(0x08); // 6: iconst_5
    code.push(0xbb); // 7: new Object
    code.extend(idx(object_class));
    code.push(0x59); // 10: dup
    code.push(0xb7); // 11: invokespecial Object.<init>
    code.extend(idx(object_init));
    code.push(0x53); // 14: aastore
    code.extend([0xa7, 0x00, 0x1b]); // 15: goto 42
    code.push(0x4d); // 18: astore_2 (bounds handler)
    code.push(0xb2); // 19: getstatic out
    code.extend(idx(out));
    code.push(0x12); // 22: ldc "bounds"
    code.push(bounds as u8);
    code.push(0xb6); // 24: println
    code.extend(idx(println));
    code.extend([0xa7, 0x00, 0x0f]); // 27: goto 42
    code.push(0x4d); // 30: astore_2 (store handler)
    code.push(0xb2); // 31: getstatic out
    code.extend(idx(out));
    code.push(0x12); // 34: ldc "store"
    code.push(mismatch as u8);
    code.push(0xb6); // 36: println
    code.extend(idx(println));
    code.extend([0xa7, 0x00, 0x03]); // 39: goto 42
    code.push(0xb1); // 42: return
    main.add_method_with_handlers(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        4,
        3,
        code,
        &[(5, 15, 18, oob), (5, 15, 30, store)],
    );

    let output = run_guest(vec![("StoreOrderMain", main.build())], "StoreOrderMain");
    assert_eq!(output, "bounds\n");
}

#[test]
fn arraycopy_store_check_is_element_wise() {
    let mut main = ClassBuilder::new("CopyMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = main.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let object_class = main.class_ref("java/lang/Object");
    let string_class = main.class_ref("java/lang/String");
    let object_init = main.method_ref("java/lang/Object", "<init>", "()V");
    let arraycopy = main.method_ref(
        "java/lang/System",
        "arraycopy",
        "(Ljava/lang/Object;ILjava/lang/Object;II)V",
    );
    let store = main.class_ref("java/lang/ArrayStoreException");
    let a = main.string_const("a");
    let b = main.string_const("b");
    let caught = main.string_const("store");

    // Object[] src = { "a", "b", new Object() }; String[] dst = new String[3];
    // arraycopy(src, 0, dst, 0, 3) fails on the third element; the first two
    // stay copied and dst[2] stays null
    let mut code = Vec::new();
    code.push(0x06); // 0: iconst_3
    code.push(0xbd); // 1: anewarray Object
    code.extend(idx(object_class));
    code.push(0x4c); // 4: astore_1
    code.push(0x2b); // 5: aload_1
    code.push(0x03); // 6: iconst_0
    code.push(0x12); // 7: ldc "a"
    code.push(a as u8);
    code.push(0x53); // 9: aastore
    code.push(0x2b); // 10: aload_1
    code.push(0x04); // 11: iconst_1
    code.push(0x12); // 12: ldc "b"
    code.push(b as u8);
    code.push(0x53); // 14: aastore
    code.push(0x2b); // 15: aload_1
    code.push(0x05); // 16: iconst_2
    code.push(0xbb); // 17: new Object
    code.extend(idx(object_class));
    code.push(0x59); // 20: dup
    code.push(0xb7); // 21: invokespecial Object.<init>
    code.extend(idx(object_init));
    code.push(0x53); // 24: aastore
    code.push(0x06); // 25: iconst_3
    code.push(0xbd); // 26: anewarray String
    code.extend(idx(string_class));
    code.push(0x4d); // 29: astore_2
    code.push(0x2b); // 30: aload_1
    code.push(0x03); // 31: iconst_0
    code.push(0x2c); // 32: aload_2
    code.push(0x03); // 33: iconst_0
    code.push(0x06); // 34: iconst_3
    code.push(0xb8); // 35: invokestatic arraycopy
    code.extend(idx(arraycopy));
    code.extend([0xa7, 0x00, 0x0c]); // 38: goto 50
    code.push(0x4e); // 41: astore_3 (store handler)
    code.push(0xb2); // 42: getstatic out
    code.extend(idx(out));
    code.push(0x12); // 45: ldc "store"
    code.push(caught as u8);
    code.push(0xb6); // 47: println
    code.extend(idx(println));
    for slot in [0x03u8, 0x04, 0x05] {
        code.push(0xb2); // 50/59/68: getstatic out
        code.extend(idx(out));
        code.push(0x2c); // aload_2
        code.push(slot); // iconst_{0,1,2}
        code.push(0x32); // aaload
        code.push(0xb6); // println(String)
        code.extend(idx(println));
    }
    code.push(0xb1); // 77: return
    main.add_method_with_handlers(
        ACC_PUBLIC | ACC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        5,
        4,
        code,
        &[(30, 38, 41, store)],
    );

    let output = run_guest(vec![("CopyMain", main.build())], "CopyMain");
    assert_eq!(output, "store\na\nb\nnull\n");
}
