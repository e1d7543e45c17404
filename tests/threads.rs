//! Guest thread lifecycle through `java.lang.Thread`.

mod common;

use common::{ACC_PUBLIC, ACC_STATIC, ClassBuilder, idx, run_guest, trivial_init};

#[test]
fn join_on_unstarted_thread_returns_immediately() {
    let mut main = ClassBuilder::new("JoinNewMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = main.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let thread_class = main.class_ref("java/lang/Thread");
    let thread_init = main.method_ref("java/lang/Thread", "<init>", "()V");
    let join = main.method_ref("java/lang/Thread", "join", "()V");
    let done = main.string_const("done");

    // new Thread().join() returns because the thread was never alive
    let mut code = Vec::new();
    code.push(0xbb); // 0: new Thread
    code.extend(idx(thread_class));
    code.push(0x59); // 3: dup
    code.push(0xb7); // 4: invokespecial <init>
    code.extend(idx(thread_init));
    code.push(0x4c); // 7: astore_1
    code.push(0x2b); // 8: aload_1
    code.push(0xb6); // 9: invokevirtual join
    code.extend(idx(join));
    code.push(0xb2); // 12: getstatic out
    code.extend(idx(out));
    code.push(0x12); // 15: ldc "done"
    code.push(done as u8);
    code.push(0xb6); // 17: println
    code.extend(idx(println));
    code.push(0xb1);
    main.add_method(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V", 2, 2, code);

    let output = run_guest(vec![("JoinNewMain", main.build())], "JoinNewMain");
    assert_eq!(output, "done\n");
}

#[test]
fn started_thread_runs_before_join_returns() {
    let mut worker = ClassBuilder::new("EchoWorker", "java/lang/Thread");
    trivial_init(&mut worker, "java/lang/Thread");
    let out = worker.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = worker.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let ran = worker.string_const("ran");
    let mut run = Vec::new();
    run.push(0xb2); // getstatic out
    run.extend(idx(out));
    run.push(0x12); // ldc "ran"
    run.push(ran as u8);
    run.push(0xb6); // println
    run.extend(idx(println));
    run.push(0xb1);
    worker.add_method(ACC_PUBLIC, "run", "()V", 2, 1, run);

    let mut main = ClassBuilder::new("EchoMain", "java/lang/Object");
    let out = main.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let println = main.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let worker_class = main.class_ref("EchoWorker");
    let worker_init = main.method_ref("EchoWorker", "<init>", "()V");
    let start = main.method_ref("java/lang/Thread", "start", "()V");
    let join = main.method_ref("java/lang/Thread", "join", "()V");
    let done = main.string_const("done");

    let mut code = Vec::new();
    code.push(0xbb); // 0: new EchoWorker
    code.extend(idx(worker_class));
    code.push(0x59); // 3: dup
    code.push(0xb7); // 4: invokespecial <init>
    code.extend(idx(worker_init));
    code.push(0x4c); // 7: astore_1
    code.push(0x2b); // 8: aload_1
    code.push(0xb6); // 9: invokevirtual start
    code.extend(idx(start));
    code.push(0x2b); // 12: aload_1
    code.push(0xb6); // 13: invokevirtual join
    code.extend(idx(join));
    code.push(0xb2); // 16: getstatic out
    code.extend(idx(out));
    code.push(0x12); // 19: ldc "done"
    code.push(done as u8);
    code.push(0xb6); // 21: println
    code.extend(idx(println));
    code.push(0xb1);
    main.add_method(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V", 2, 2, code);

    let output = run_guest(
        vec![("EchoWorker", worker.build()), ("EchoMain", main.build())],
        "EchoMain",
    );
    assert_eq!(output, "ran\ndone\n");
}
