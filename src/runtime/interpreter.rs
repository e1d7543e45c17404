//! Bytecode execution. One `Frame` per invocation, recursion for calls, and
//! `Exception` values propagated with `?` for athrow/implicit throws.

use std::{cell::Cell, sync::Arc};

use crate::{
    consts::{ClassAccessFlag, array_type_code},
    descriptor::MethodDescriptor,
    runtime::{
        ArrayKind, Class, CodeAttribute, Constant, Exception, MethodInfo, NativeResult,
        class_loader,
        heap::{self, ArrayStorage, NULL, Value, string_table},
        inheritance, native, stdio,
        thread::VmThread,
    },
};

pub mod frame;
pub mod inst;

use frame::Frame;
use inst::*;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Conservative guest recursion limit; overruns surface as
/// `StackOverflowError` instead of smashing the host stack.
const MAX_CALL_DEPTH: usize = 1000;

struct DepthGuard;

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

enum Next {
    Continue(usize),
    Return(Option<Value>),
}

/// Invokes `method` with logical (padding-free) arguments, the receiver first
/// for instance methods. Returns the logical result value, if any.
pub fn call_method(
    thread: &Arc<VmThread>,
    class: &Arc<Class>,
    method: &Arc<MethodInfo>,
    args: Vec<Value>,
) -> NativeResult<Option<Value>> {
    let depth = DEPTH.with(|depth| {
        depth.set(depth.get() + 1);
        depth.get()
    });
    let _guard = DepthGuard;
    if depth > MAX_CALL_DEPTH {
        return Err(Exception::vm("java/lang/StackOverflowError"));
    }

    log::trace!("call {}.{}{}", class.name, method.name, method.descriptor_str);

    let monitor_target = if method.is_synchronized() {
        let object_id = if method.is_static() {
            heap::class_object(class)?
        } else {
            args.first().copied().unwrap_or(Value::Reference(NULL)).reference()
        };
        Some(heap::get_or_npe(object_id)?)
    } else {
        None
    };

    if let Some(object) = &monitor_target {
        object.monitor.enter(thread);
    }
    let result = invoke_body(thread, class, method, args);
    if let Some(object) = &monitor_target {
        // the owner's exit cannot fail; keep the original error if any
        let _ = object.monitor.exit(thread);
    }
    result
}

fn invoke_body(
    thread: &Arc<VmThread>,
    class: &Arc<Class>,
    method: &Arc<MethodInfo>,
    args: Vec<Value>,
) -> NativeResult<Option<Value>> {
    if method.is_native() {
        return native::dispatch(thread, class, method, args);
    }
    let code = method.code.as_ref().ok_or_else(|| {
        Exception::vm_msg(
            "java/lang/AbstractMethodError",
            format!("{}.{}{}", class.name, method.name, method.descriptor_str),
        )
    })?;

    let mut frame = Frame::new(code.max_locals as usize, code.max_stack as usize);
    let mut index = 0;
    for value in args {
        let wide = value.is_wide();
        frame.set_local(index, value);
        index += if wide { 2 } else { 1 };
    }
    run(thread, class, code, frame)
}

fn run(
    thread: &Arc<VmThread>,
    class: &Arc<Class>,
    code: &CodeAttribute,
    mut frame: Frame,
) -> NativeResult<Option<Value>> {
    let bytes = &code.code;
    let mut pc = 0usize;
    loop {
        let op_pc = pc;
        match execute(thread, class, bytes, op_pc, &mut frame) {
            Ok(Next::Continue(next_pc)) => pc = next_pc,
            Ok(Next::Return(value)) => return Ok(value),
            Err(exception) => {
                let id = materialize(exception)?;
                match find_handler(class, code, op_pc, id)? {
                    Some(handler_pc) => {
                        frame.stack.clear();
                        frame.push(Value::Reference(id));
                        pc = handler_pc;
                    }
                    None => return Err(Exception::User(id)),
                }
            }
        }
    }
}

/// Turns an in-flight exception into a heap object guest code can catch.
pub fn materialize(exception: Exception) -> NativeResult<u32> {
    match exception {
        Exception::User(id) => Ok(id),
        Exception::Vm { class, message } => {
            let throw_class = class_loader::resolve_class(class)?;
            let id = heap::allocate_instance(&throw_class)?;
            if let Some(message) = message {
                if let Some(resolve) = class_loader::resolve_field(&throw_class, "detailMessage") {
                    let string_id = heap::allocate_string(&message)?;
                    heap::get_or_npe(id)?.set_field(resolve.field.slot, Value::Reference(string_id));
                }
            }
            Ok(id)
        }
    }
}

/// First applicable handler: PC range covers the faulting site and the catch
/// type is the thrown class or an ancestor (entry order wins).
fn find_handler(
    class: &Arc<Class>,
    code: &CodeAttribute,
    pc: usize,
    exception_id: u32,
) -> NativeResult<Option<usize>> {
    let thrown = heap::get_or_npe(exception_id)?.class.clone();
    for item in &code.exception_table {
        if !(item.start_pc as usize..item.end_pc as usize).contains(&pc) {
            continue;
        }
        if item.catch_type == 0 {
            return Ok(Some(item.handler_pc as usize));
        }
        let catch_class = class
            .constant_pool
            .class_info(item.catch_type)?
            .get_or_resolve()?;
        if inheritance::is_assignable(&thrown, &catch_class) {
            return Ok(Some(item.handler_pc as usize));
        }
    }
    Ok(None)
}

fn u8_at(bytes: &[u8], pc: usize) -> u8 {
    bytes[pc]
}

fn u16_at(bytes: &[u8], pc: usize) -> u16 {
    u16::from_be_bytes([bytes[pc], bytes[pc + 1]])
}

fn i16_at(bytes: &[u8], pc: usize) -> i16 {
    u16_at(bytes, pc) as i16
}

fn i32_at(bytes: &[u8], pc: usize) -> i32 {
    i32::from_be_bytes([bytes[pc], bytes[pc + 1], bytes[pc + 2], bytes[pc + 3]])
}

fn branch(op_pc: usize, offset: i32) -> usize {
    (op_pc as i64 + offset as i64) as usize
}

fn index_error(index: i32, length: usize) -> Exception {
    Exception::vm_msg(
        "java/lang/ArrayIndexOutOfBoundsException",
        format!("Index {index} out of bounds for length {length}"),
    )
}

fn execute(
    thread: &Arc<VmThread>,
    class: &Arc<Class>,
    bytes: &[u8],
    pc: usize,
    frame: &mut Frame,
) -> NativeResult<Next> {
    let opcode = bytes[pc];
    let next = match opcode {
        NOP => Next::Continue(pc + 1),

        ACONST_NULL => {
            frame.push(Value::Reference(NULL));
            Next::Continue(pc + 1)
        }
        ICONST_M1..=ICONST_5 => {
            frame.push(Value::Int(opcode as i32 - ICONST_0 as i32));
            Next::Continue(pc + 1)
        }
        LCONST_0 | LCONST_1 => {
            frame.push_value(Value::Long((opcode - LCONST_0) as i64));
            Next::Continue(pc + 1)
        }
        FCONST_0 | FCONST_1 | FCONST_2 => {
            frame.push(Value::Float((opcode - FCONST_0) as f32));
            Next::Continue(pc + 1)
        }
        DCONST_0 | DCONST_1 => {
            frame.push_value(Value::Double((opcode - DCONST_0) as f64));
            Next::Continue(pc + 1)
        }
        BIPUSH => {
            frame.push(Value::Int(u8_at(bytes, pc + 1) as i8 as i32));
            Next::Continue(pc + 2)
        }
        SIPUSH => {
            frame.push(Value::Int(i16_at(bytes, pc + 1) as i32));
            Next::Continue(pc + 2)
        }
        LDC => {
            load_constant(class, u8_at(bytes, pc + 1) as u16, frame)?;
            Next::Continue(pc + 2)
        }
        LDC_W | LDC2_W => {
            load_constant(class, u16_at(bytes, pc + 1), frame)?;
            Next::Continue(pc + 3)
        }

        ILOAD | FLOAD | ALOAD => {
            frame.push(frame.get_local(u8_at(bytes, pc + 1) as usize));
            Next::Continue(pc + 2)
        }
        LLOAD | DLOAD => {
            frame.push_value(frame.get_local(u8_at(bytes, pc + 1) as usize));
            Next::Continue(pc + 2)
        }
        ILOAD_0..=ILOAD_3 => {
            frame.push(frame.get_local((opcode - ILOAD_0) as usize));
            Next::Continue(pc + 1)
        }
        LLOAD_0..=LLOAD_3 => {
            frame.push_value(frame.get_local((opcode - LLOAD_0) as usize));
            Next::Continue(pc + 1)
        }
        FLOAD_0..=FLOAD_3 => {
            frame.push(frame.get_local((opcode - FLOAD_0) as usize));
            Next::Continue(pc + 1)
        }
        DLOAD_0..=DLOAD_3 => {
            frame.push_value(frame.get_local((opcode - DLOAD_0) as usize));
            Next::Continue(pc + 1)
        }
        ALOAD_0..=ALOAD_3 => {
            frame.push(frame.get_local((opcode - ALOAD_0) as usize));
            Next::Continue(pc + 1)
        }

        IALOAD | LALOAD | FALOAD | DALOAD | AALOAD | BALOAD | CALOAD | SALOAD => {
            array_load(frame, opcode)?;
            Next::Continue(pc + 1)
        }

        ISTORE | FSTORE | ASTORE => {
            let value = frame.pop();
            frame.set_local(u8_at(bytes, pc + 1) as usize, value);
            Next::Continue(pc + 2)
        }
        LSTORE | DSTORE => {
            let value = frame.pop_value();
            frame.set_local(u8_at(bytes, pc + 1) as usize, value);
            Next::Continue(pc + 2)
        }
        ISTORE_0..=ISTORE_3 => {
            let value = frame.pop();
            frame.set_local((opcode - ISTORE_0) as usize, value);
            Next::Continue(pc + 1)
        }
        LSTORE_0..=LSTORE_3 => {
            let value = frame.pop_value();
            frame.set_local((opcode - LSTORE_0) as usize, value);
            Next::Continue(pc + 1)
        }
        FSTORE_0..=FSTORE_3 => {
            let value = frame.pop();
            frame.set_local((opcode - FSTORE_0) as usize, value);
            Next::Continue(pc + 1)
        }
        DSTORE_0..=DSTORE_3 => {
            let value = frame.pop_value();
            frame.set_local((opcode - DSTORE_0) as usize, value);
            Next::Continue(pc + 1)
        }
        ASTORE_0..=ASTORE_3 => {
            let value = frame.pop();
            frame.set_local((opcode - ASTORE_0) as usize, value);
            Next::Continue(pc + 1)
        }

        IASTORE | LASTORE | FASTORE | DASTORE | AASTORE | BASTORE | CASTORE | SASTORE => {
            array_store(frame, opcode)?;
            Next::Continue(pc + 1)
        }

        POP => {
            frame.pop();
            Next::Continue(pc + 1)
        }
        POP2 => {
            frame.pop();
            frame.pop();
            Next::Continue(pc + 1)
        }
        DUP => {
            let top = *frame.stack.last().unwrap();
            frame.push(top);
            Next::Continue(pc + 1)
        }
        DUP_X1 => {
            let len = frame.stack.len();
            let top = frame.stack[len - 1];
            frame.stack.insert(len - 2, top);
            Next::Continue(pc + 1)
        }
        DUP_X2 => {
            let len = frame.stack.len();
            let top = frame.stack[len - 1];
            frame.stack.insert(len - 3, top);
            Next::Continue(pc + 1)
        }
        DUP2 => {
            let len = frame.stack.len();
            let pair = [frame.stack[len - 2], frame.stack[len - 1]];
            frame.stack.extend_from_slice(&pair);
            Next::Continue(pc + 1)
        }
        DUP2_X1 => {
            let len = frame.stack.len();
            let pair = [frame.stack[len - 2], frame.stack[len - 1]];
            frame.stack.insert(len - 3, pair[1]);
            frame.stack.insert(len - 3, pair[0]);
            Next::Continue(pc + 1)
        }
        DUP2_X2 => {
            let len = frame.stack.len();
            let pair = [frame.stack[len - 2], frame.stack[len - 1]];
            frame.stack.insert(len - 4, pair[1]);
            frame.stack.insert(len - 4, pair[0]);
            Next::Continue(pc + 1)
        }
        SWAP => {
            let len = frame.stack.len();
            frame.stack.swap(len - 1, len - 2);
            Next::Continue(pc + 1)
        }

        IADD | ISUB | IMUL | IDIV | IREM | ISHL | ISHR | IUSHR | IAND | IOR | IXOR => {
            let rhs = frame.pop_int();
            let lhs = frame.pop_int();
            let result = match opcode {
                IADD => lhs.wrapping_add(rhs),
                ISUB => lhs.wrapping_sub(rhs),
                IMUL => lhs.wrapping_mul(rhs),
                IDIV => {
                    if rhs == 0 {
                        return Err(Exception::vm_msg(
                            "java/lang/ArithmeticException",
                            "/ by zero",
                        ));
                    }
                    lhs.wrapping_div(rhs)
                }
                IREM => {
                    if rhs == 0 {
                        return Err(Exception::vm_msg(
                            "java/lang/ArithmeticException",
                            "/ by zero",
                        ));
                    }
                    lhs.wrapping_rem(rhs)
                }
                ISHL => lhs.wrapping_shl(rhs as u32 & 0x1f),
                ISHR => lhs.wrapping_shr(rhs as u32 & 0x1f),
                IUSHR => ((lhs as u32).wrapping_shr(rhs as u32 & 0x1f)) as i32,
                IAND => lhs & rhs,
                IOR => lhs | rhs,
                _ => lhs ^ rhs,
            };
            frame.push(Value::Int(result));
            Next::Continue(pc + 1)
        }
        LADD | LSUB | LMUL | LDIV | LREM | LAND | LOR | LXOR => {
            let rhs = frame.pop_long();
            let lhs = frame.pop_long();
            let result = match opcode {
                LADD => lhs.wrapping_add(rhs),
                LSUB => lhs.wrapping_sub(rhs),
                LMUL => lhs.wrapping_mul(rhs),
                LDIV => {
                    if rhs == 0 {
                        return Err(Exception::vm_msg(
                            "java/lang/ArithmeticException",
                            "/ by zero",
                        ));
                    }
                    lhs.wrapping_div(rhs)
                }
                LREM => {
                    if rhs == 0 {
                        return Err(Exception::vm_msg(
                            "java/lang/ArithmeticException",
                            "/ by zero",
                        ));
                    }
                    lhs.wrapping_rem(rhs)
                }
                LAND => lhs & rhs,
                LOR => lhs | rhs,
                _ => lhs ^ rhs,
            };
            frame.push_value(Value::Long(result));
            Next::Continue(pc + 1)
        }
        LSHL | LSHR | LUSHR => {
            let amount = frame.pop_int() as u32 & 0x3f;
            let lhs = frame.pop_long();
            let result = match opcode {
                LSHL => lhs.wrapping_shl(amount),
                LSHR => lhs.wrapping_shr(amount),
                _ => ((lhs as u64).wrapping_shr(amount)) as i64,
            };
            frame.push_value(Value::Long(result));
            Next::Continue(pc + 1)
        }
        FADD | FSUB | FMUL | FDIV | FREM => {
            let rhs = frame.pop_float();
            let lhs = frame.pop_float();
            // IEEE-754 throughout; division by zero yields infinities/NaN
            let result = match opcode {
                FADD => lhs + rhs,
                FSUB => lhs - rhs,
                FMUL => lhs * rhs,
                FDIV => lhs / rhs,
                _ => lhs % rhs,
            };
            frame.push(Value::Float(result));
            Next::Continue(pc + 1)
        }
        DADD | DSUB | DMUL | DDIV | DREM => {
            let rhs = frame.pop_double();
            let lhs = frame.pop_double();
            let result = match opcode {
                DADD => lhs + rhs,
                DSUB => lhs - rhs,
                DMUL => lhs * rhs,
                DDIV => lhs / rhs,
                _ => lhs % rhs,
            };
            frame.push_value(Value::Double(result));
            Next::Continue(pc + 1)
        }
        INEG => {
            let value = frame.pop_int();
            frame.push(Value::Int(value.wrapping_neg()));
            Next::Continue(pc + 1)
        }
        LNEG => {
            let value = frame.pop_long();
            frame.push_value(Value::Long(value.wrapping_neg()));
            Next::Continue(pc + 1)
        }
        FNEG => {
            let value = frame.pop_float();
            frame.push(Value::Float(-value));
            Next::Continue(pc + 1)
        }
        DNEG => {
            let value = frame.pop_double();
            frame.push_value(Value::Double(-value));
            Next::Continue(pc + 1)
        }
        IINC => {
            let index = u8_at(bytes, pc + 1) as usize;
            let delta = u8_at(bytes, pc + 2) as i8 as i32;
            let value = frame.get_local(index).int();
            frame.set_local(index, Value::Int(value.wrapping_add(delta)));
            Next::Continue(pc + 3)
        }

        I2L => {
            let value = frame.pop_int();
            frame.push_value(Value::Long(value as i64));
            Next::Continue(pc + 1)
        }
        I2F => {
            let value = frame.pop_int();
            frame.push(Value::Float(value as f32));
            Next::Continue(pc + 1)
        }
        I2D => {
            let value = frame.pop_int();
            frame.push_value(Value::Double(value as f64));
            Next::Continue(pc + 1)
        }
        L2I => {
            let value = frame.pop_long();
            frame.push(Value::Int(value as i32));
            Next::Continue(pc + 1)
        }
        L2F => {
            let value = frame.pop_long();
            frame.push(Value::Float(value as f32));
            Next::Continue(pc + 1)
        }
        L2D => {
            let value = frame.pop_long();
            frame.push_value(Value::Double(value as f64));
            Next::Continue(pc + 1)
        }
        // `as` saturates and maps NaN to zero, exactly the JVM rule
        F2I => {
            let value = frame.pop_float();
            frame.push(Value::Int(value as i32));
            Next::Continue(pc + 1)
        }
        F2L => {
            let value = frame.pop_float();
            frame.push_value(Value::Long(value as i64));
            Next::Continue(pc + 1)
        }
        F2D => {
            let value = frame.pop_float();
            frame.push_value(Value::Double(value as f64));
            Next::Continue(pc + 1)
        }
        D2I => {
            let value = frame.pop_double();
            frame.push(Value::Int(value as i32));
            Next::Continue(pc + 1)
        }
        D2L => {
            let value = frame.pop_double();
            frame.push_value(Value::Long(value as i64));
            Next::Continue(pc + 1)
        }
        D2F => {
            let value = frame.pop_double();
            frame.push(Value::Float(value as f32));
            Next::Continue(pc + 1)
        }
        I2B => {
            let value = frame.pop_int();
            frame.push(Value::Int(value as i8 as i32));
            Next::Continue(pc + 1)
        }
        I2C => {
            let value = frame.pop_int();
            frame.push(Value::Int(value as u16 as i32));
            Next::Continue(pc + 1)
        }
        I2S => {
            let value = frame.pop_int();
            frame.push(Value::Int(value as i16 as i32));
            Next::Continue(pc + 1)
        }

        LCMP => {
            let rhs = frame.pop_long();
            let lhs = frame.pop_long();
            frame.push(Value::Int(match lhs.cmp(&rhs) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            }));
            Next::Continue(pc + 1)
        }
        FCMPL | FCMPG => {
            let rhs = frame.pop_float();
            let lhs = frame.pop_float();
            frame.push(Value::Int(float_compare(
                lhs as f64,
                rhs as f64,
                opcode == FCMPG,
            )));
            Next::Continue(pc + 1)
        }
        DCMPL | DCMPG => {
            let rhs = frame.pop_double();
            let lhs = frame.pop_double();
            frame.push(Value::Int(float_compare(lhs, rhs, opcode == DCMPG)));
            Next::Continue(pc + 1)
        }

        IFEQ..=IFLE => {
            let value = frame.pop_int();
            let jump = match opcode {
                IFEQ => value == 0,
                IFNE => value != 0,
                IFLT => value < 0,
                IFGE => value >= 0,
                IFGT => value > 0,
                _ => value <= 0,
            };
            if jump {
                Next::Continue(branch(pc, i16_at(bytes, pc + 1) as i32))
            } else {
                Next::Continue(pc + 3)
            }
        }
        IF_ICMPEQ..=IF_ICMPLE => {
            let rhs = frame.pop_int();
            let lhs = frame.pop_int();
            let jump = match opcode {
                IF_ICMPEQ => lhs == rhs,
                IF_ICMPNE => lhs != rhs,
                IF_ICMPLT => lhs < rhs,
                IF_ICMPGE => lhs >= rhs,
                IF_ICMPGT => lhs > rhs,
                _ => lhs <= rhs,
            };
            if jump {
                Next::Continue(branch(pc, i16_at(bytes, pc + 1) as i32))
            } else {
                Next::Continue(pc + 3)
            }
        }
        IF_ACMPEQ | IF_ACMPNE => {
            let rhs = frame.pop_reference();
            let lhs = frame.pop_reference();
            let jump = (lhs == rhs) == (opcode == IF_ACMPEQ);
            if jump {
                Next::Continue(branch(pc, i16_at(bytes, pc + 1) as i32))
            } else {
                Next::Continue(pc + 3)
            }
        }
        IFNULL | IFNONNULL => {
            let value = frame.pop_reference();
            let jump = (value == NULL) == (opcode == IFNULL);
            if jump {
                Next::Continue(branch(pc, i16_at(bytes, pc + 1) as i32))
            } else {
                Next::Continue(pc + 3)
            }
        }

        GOTO => Next::Continue(branch(pc, i16_at(bytes, pc + 1) as i32)),
        GOTO_W => Next::Continue(branch(pc, i32_at(bytes, pc + 1))),
        JSR => {
            frame.push(Value::ReturnAddress((pc + 3) as u32));
            Next::Continue(branch(pc, i16_at(bytes, pc + 1) as i32))
        }
        JSR_W => {
            frame.push(Value::ReturnAddress((pc + 5) as u32));
            Next::Continue(branch(pc, i32_at(bytes, pc + 1)))
        }
        RET => {
            let index = u8_at(bytes, pc + 1) as usize;
            match frame.get_local(index) {
                Value::ReturnAddress(target) => Next::Continue(target as usize),
                other => panic!("ret through non-returnAddress local {other:?}"),
            }
        }

        // both switches are jump tables with a default target
        TABLESWITCH => {
            let base = (pc + 4) & !3;
            let default = i32_at(bytes, base);
            let low = i32_at(bytes, base + 4);
            let high = i32_at(bytes, base + 8);
            let key = frame.pop_int();
            let offset = if key < low || key > high {
                default
            } else {
                i32_at(bytes, base + 12 + (key - low) as usize * 4)
            };
            Next::Continue(branch(pc, offset))
        }
        LOOKUPSWITCH => {
            let base = (pc + 4) & !3;
            let default = i32_at(bytes, base);
            let npairs = i32_at(bytes, base + 4);
            let key = frame.pop_int();
            let mut offset = default;
            for pair in 0..npairs as usize {
                if i32_at(bytes, base + 8 + pair * 8) == key {
                    offset = i32_at(bytes, base + 12 + pair * 8);
                    break;
                }
            }
            Next::Continue(branch(pc, offset))
        }

        IRETURN | FRETURN | ARETURN => Next::Return(Some(frame.pop())),
        LRETURN | DRETURN => Next::Return(Some(frame.pop_value())),
        RETURN => Next::Return(None),

        GETSTATIC => {
            let resolve = class.constant_pool.field_ref(u16_at(bytes, pc + 1))?.resolve()?.clone();
            class_loader::ensure_initialized(thread, &resolve.class)?;
            frame.push_value(resolve.class.static_value(resolve.field.slot));
            Next::Continue(pc + 3)
        }
        PUTSTATIC => {
            let resolve = class.constant_pool.field_ref(u16_at(bytes, pc + 1))?.resolve()?.clone();
            class_loader::ensure_initialized(thread, &resolve.class)?;
            let value = frame.pop_value();
            resolve.class.set_static_value(resolve.field.slot, value);
            Next::Continue(pc + 3)
        }
        GETFIELD => {
            let resolve = class.constant_pool.field_ref(u16_at(bytes, pc + 1))?.resolve()?.clone();
            let object = heap::get_or_npe(frame.pop_reference())?;
            frame.push_value(object.get_field(resolve.field.slot));
            Next::Continue(pc + 3)
        }
        PUTFIELD => {
            let resolve = class.constant_pool.field_ref(u16_at(bytes, pc + 1))?.resolve()?.clone();
            let value = frame.pop_value();
            let object = heap::get_or_npe(frame.pop_reference())?;
            object.set_field(resolve.field.slot, value);
            Next::Continue(pc + 3)
        }

        INVOKEVIRTUAL | INVOKEINTERFACE => {
            let method_ref = class.constant_pool.method_ref(u16_at(bytes, pc + 1))?;
            let args = pop_args(frame, &method_ref.descriptor, true);
            let receiver = heap::get_or_npe(args[0].reference())?;
            let target = class_loader::select_method(
                &receiver.class,
                &method_ref.name,
                &method_ref.descriptor_str,
            )?;
            let result = call_method(thread, &target.class, &target.method, args)?;
            if let Some(value) = result {
                frame.push_value(value);
            }
            let width = if opcode == INVOKEINTERFACE { 5 } else { 3 };
            Next::Continue(pc + width)
        }
        INVOKESPECIAL => {
            let method_ref = class.constant_pool.method_ref(u16_at(bytes, pc + 1))?;
            let resolved = method_ref.resolve()?.clone();
            let args = pop_args(frame, &method_ref.descriptor, true);
            if args[0].reference() == NULL {
                return Err(Exception::npe());
            }
            let result = call_method(thread, &resolved.class, &resolved.method, args)?;
            if let Some(value) = result {
                frame.push_value(value);
            }
            Next::Continue(pc + 3)
        }
        INVOKESTATIC => {
            let method_ref = class.constant_pool.method_ref(u16_at(bytes, pc + 1))?;
            let resolved = method_ref.resolve()?.clone();
            class_loader::ensure_initialized(thread, &resolved.class)?;
            let args = pop_args(frame, &method_ref.descriptor, false);
            let result = call_method(thread, &resolved.class, &resolved.method, args)?;
            if let Some(value) = result {
                frame.push_value(value);
            }
            Next::Continue(pc + 3)
        }
        INVOKEDYNAMIC => {
            return Err(Exception::vm_msg(
                "java/lang/UnsupportedOperationException",
                "invokedynamic",
            ));
        }

        NEW => {
            let target = class
                .constant_pool
                .class_info(u16_at(bytes, pc + 1))?
                .get_or_resolve()?;
            if target.is_interface() || target.access_flags.contains(ClassAccessFlag::ABSTRACT) {
                return Err(Exception::vm_msg(
                    "java/lang/InstantiationError",
                    target.name.replace('/', "."),
                ));
            }
            class_loader::ensure_initialized(thread, &target)?;
            let id = heap::allocate_instance(&target)?;
            frame.push(Value::Reference(id));
            Next::Continue(pc + 3)
        }
        NEWARRAY => {
            let type_code = u8_at(bytes, pc + 1) as i8;
            let name = match type_code {
                array_type_code::BOOLEAN => "[Z",
                array_type_code::CHAR => "[C",
                array_type_code::FLOAT => "[F",
                array_type_code::DOUBLE => "[D",
                array_type_code::BYTE => "[B",
                array_type_code::SHORT => "[S",
                array_type_code::INT => "[I",
                array_type_code::LONG => "[J",
                _ => {
                    return Err(Exception::vm_msg(
                        "java/lang/InternalError",
                        format!("bad newarray type {type_code}"),
                    ));
                }
            };
            let array_class = class_loader::resolve_class(name)?;
            let length = frame.pop_int();
            frame.push(Value::Reference(heap::allocate_array(&array_class, length)?));
            Next::Continue(pc + 2)
        }
        ANEWARRAY => {
            let component = class
                .constant_pool
                .class_info(u16_at(bytes, pc + 1))?
                .get_or_resolve()?;
            let name = if component.is_array() {
                format!("[{}", component.name)
            } else {
                format!("[L{};", component.name)
            };
            let array_class = class_loader::resolve_class(&name)?;
            let length = frame.pop_int();
            frame.push(Value::Reference(heap::allocate_array(&array_class, length)?));
            Next::Continue(pc + 3)
        }
        MULTIANEWARRAY => {
            let array_class = class
                .constant_pool
                .class_info(u16_at(bytes, pc + 1))?
                .get_or_resolve()?;
            let dimension_count = u8_at(bytes, pc + 3) as usize;
            let mut dimensions = vec![0i32; dimension_count];
            for slot in dimensions.iter_mut().rev() {
                *slot = frame.pop_int();
            }
            frame.push(Value::Reference(allocate_multi(&array_class, &dimensions)?));
            Next::Continue(pc + 4)
        }
        ARRAYLENGTH => {
            let object = heap::get_or_npe(frame.pop_reference())?;
            frame.push(Value::Int(object.array_length() as i32));
            Next::Continue(pc + 1)
        }

        ATHROW => {
            let id = frame.pop_reference();
            if id == NULL {
                return Err(Exception::npe());
            }
            return Err(Exception::User(id));
        }

        CHECKCAST => {
            let target = class
                .constant_pool
                .class_info(u16_at(bytes, pc + 1))?
                .get_or_resolve()?;
            let id = frame.pop_reference();
            if id != NULL {
                let object = heap::get_or_npe(id)?;
                if !inheritance::is_assignable(&object.class, &target) {
                    return Err(Exception::vm_msg(
                        "java/lang/ClassCastException",
                        format!(
                            "class {} cannot be cast to class {}",
                            object.class.name.replace('/', "."),
                            target.name.replace('/', ".")
                        ),
                    ));
                }
            }
            frame.push(Value::Reference(id));
            Next::Continue(pc + 3)
        }
        INSTANCEOF => {
            let target = class
                .constant_pool
                .class_info(u16_at(bytes, pc + 1))?
                .get_or_resolve()?;
            let id = frame.pop_reference();
            let result = if id == NULL {
                0
            } else {
                inheritance::is_assignable(&heap::get_or_npe(id)?.class, &target) as i32
            };
            frame.push(Value::Int(result));
            Next::Continue(pc + 3)
        }

        MONITORENTER => {
            let object = heap::get_or_npe(frame.pop_reference())?;
            object.monitor.enter(thread);
            Next::Continue(pc + 1)
        }
        MONITOREXIT => {
            let object = heap::get_or_npe(frame.pop_reference())?;
            object.monitor.exit(thread)?;
            Next::Continue(pc + 1)
        }

        WIDE => {
            let wide_opcode = u8_at(bytes, pc + 1);
            let index = u16_at(bytes, pc + 2) as usize;
            match wide_opcode {
                ILOAD | FLOAD | ALOAD => {
                    frame.push(frame.get_local(index));
                    Next::Continue(pc + 4)
                }
                LLOAD | DLOAD => {
                    frame.push_value(frame.get_local(index));
                    Next::Continue(pc + 4)
                }
                ISTORE | FSTORE | ASTORE => {
                    let value = frame.pop();
                    frame.set_local(index, value);
                    Next::Continue(pc + 4)
                }
                LSTORE | DSTORE => {
                    let value = frame.pop_value();
                    frame.set_local(index, value);
                    Next::Continue(pc + 4)
                }
                RET => match frame.get_local(index) {
                    Value::ReturnAddress(target) => Next::Continue(target as usize),
                    other => panic!("ret through non-returnAddress local {other:?}"),
                },
                IINC => {
                    let delta = i16_at(bytes, pc + 4) as i32;
                    let value = frame.get_local(index).int();
                    frame.set_local(index, Value::Int(value.wrapping_add(delta)));
                    Next::Continue(pc + 6)
                }
                other => panic!("unsupported wide opcode {other:#x}"),
            }
        }

        other => panic!("unsupported opcode {other:#x} at pc {pc}"),
    };
    Ok(next)
}

fn float_compare(lhs: f64, rhs: f64, nan_is_greater: bool) -> i32 {
    if lhs.is_nan() || rhs.is_nan() {
        if nan_is_greater { 1 } else { -1 }
    } else if lhs < rhs {
        -1
    } else if lhs > rhs {
        1
    } else {
        0
    }
}

/// Pops call arguments into logical order: receiver (if any) first, then
/// parameters left to right.
fn pop_args(frame: &mut Frame, descriptor: &MethodDescriptor, has_receiver: bool) -> Vec<Value> {
    let mut args = Vec::with_capacity(descriptor.parameters.len() + 1);
    for _ in &descriptor.parameters {
        args.push(frame.pop_value());
    }
    if has_receiver {
        args.push(frame.pop());
    }
    args.reverse();
    args
}

fn load_constant(class: &Arc<Class>, index: u16, frame: &mut Frame) -> NativeResult<()> {
    match class.constant_pool.get(index) {
        Some(Constant::Integer(v)) => frame.push(Value::Int(*v)),
        Some(Constant::Float(v)) => frame.push(Value::Float(*v)),
        Some(Constant::Long(v)) => frame.push_value(Value::Long(*v)),
        Some(Constant::Double(v)) => frame.push_value(Value::Double(*v)),
        Some(Constant::String(info)) => {
            let id = info
                .object
                .get_or_try_init(|| string_table::intern(&info.value))
                .copied()?;
            frame.push(Value::Reference(id));
        }
        Some(Constant::Class(info)) => {
            let target = info.get_or_resolve()?;
            frame.push(Value::Reference(heap::class_object(&target)?));
        }
        _ => {
            return Err(Exception::vm_msg(
                "java/lang/ClassFormatError",
                format!("unloadable constant {index}"),
            ));
        }
    }
    Ok(())
}

fn array_load(frame: &mut Frame, opcode: u8) -> NativeResult<()> {
    let index = frame.pop_int();
    let object = heap::get_or_npe(frame.pop_reference())?;
    let storage = object.array().read();
    let length = storage.len();
    if index < 0 || index as usize >= length {
        return Err(index_error(index, length));
    }
    let i = index as usize;
    let value = match (&*storage, opcode) {
        (ArrayStorage::Int(v), IALOAD) => Value::Int(v[i]),
        (ArrayStorage::Long(v), LALOAD) => Value::Long(v[i]),
        (ArrayStorage::Float(v), FALOAD) => Value::Float(v[i]),
        (ArrayStorage::Double(v), DALOAD) => Value::Double(v[i]),
        (ArrayStorage::Reference(v), AALOAD) => Value::Reference(v[i]),
        (ArrayStorage::Byte(v), BALOAD) => Value::Int(v[i] as i32),
        (ArrayStorage::Char(v), CALOAD) => Value::Int(v[i] as i32),
        (ArrayStorage::Short(v), SALOAD) => Value::Int(v[i] as i32),
        (storage, opcode) => panic!("array load type confusion: {storage:?} / {opcode:#x}"),
    };
    drop(storage);
    frame.push_value(value);
    Ok(())
}

fn array_store(frame: &mut Frame, opcode: u8) -> NativeResult<()> {
    let value = match opcode {
        LASTORE | DASTORE => frame.pop_value(),
        _ => frame.pop(),
    };
    let index = frame.pop_int();
    let object = heap::get_or_npe(frame.pop_reference())?;

    let mut storage = object.array().write();
    let length = storage.len();
    if index < 0 || index as usize >= length {
        return Err(index_error(index, length));
    }

    // after the bounds check, reference stores check component assignability
    // against the runtime type of the stored value; primitive stores never do
    if opcode == AASTORE {
        let stored = value.reference();
        if stored != NULL {
            let stored_class = heap::get_or_npe(stored)?.class.clone();
            if let Some(ArrayKind::Reference(element)) = &object.class.array {
                if !inheritance::is_assignable(&stored_class, element) {
                    return Err(Exception::vm_msg(
                        "java/lang/ArrayStoreException",
                        stored_class.name.replace('/', "."),
                    ));
                }
            }
        }
    }

    let i = index as usize;
    match (&mut *storage, opcode) {
        (ArrayStorage::Int(v), IASTORE) => v[i] = value.int(),
        (ArrayStorage::Long(v), LASTORE) => v[i] = value.long(),
        (ArrayStorage::Float(v), FASTORE) => v[i] = value.float(),
        (ArrayStorage::Double(v), DASTORE) => v[i] = value.double(),
        (ArrayStorage::Reference(v), AASTORE) => v[i] = value.reference(),
        (ArrayStorage::Byte(v), BASTORE) => v[i] = value.int() as i8,
        (ArrayStorage::Char(v), CASTORE) => v[i] = value.int() as u16,
        (ArrayStorage::Short(v), SASTORE) => v[i] = value.int() as i16,
        (storage, opcode) => panic!("array store type confusion: {storage:?} / {opcode:#x}"),
    }
    Ok(())
}

fn allocate_multi(array_class: &Arc<Class>, dimensions: &[i32]) -> NativeResult<u32> {
    let id = heap::allocate_array(array_class, dimensions[0])?;
    if dimensions.len() > 1 {
        if let Some(ArrayKind::Reference(element)) = &array_class.array {
            let object = heap::get_or_npe(id)?;
            let mut storage = object.array().write();
            if let ArrayStorage::Reference(slots) = &mut *storage {
                for slot in slots.iter_mut() {
                    *slot = allocate_multi(element, &dimensions[1..])?;
                }
            }
        }
    }
    Ok(id)
}

/// Message text of a throwable's `detailMessage`, if set.
pub fn throwable_message(id: u32) -> Option<String> {
    let object = heap::get(id)?;
    let resolve = class_loader::resolve_field(&object.class, "detailMessage")?;
    match object.get_field(resolve.field.slot) {
        Value::Reference(string_id) if string_id != NULL => heap::get(string_id)?
            .string_value()
            .map(|value| value.to_string()),
        _ => None,
    }
}

/// `java.lang.Foo: message` (or just the class name), as printed for
/// uncaught exceptions.
pub fn describe_throwable(id: u32) -> String {
    match heap::get(id) {
        Some(object) => {
            let name = object.class.name.replace('/', ".");
            match throwable_message(id) {
                Some(message) => format!("{name}: {message}"),
                None => name,
            }
        }
        None => "java.lang.NullPointerException".to_string(),
    }
}

/// Prints the standard uncaught-exception line. Only the failing thread dies.
pub fn report_uncaught(thread: &VmThread, exception: Exception) {
    let description = match materialize(exception) {
        Ok(id) => describe_throwable(id),
        Err(_) => "java.lang.InternalError".to_string(),
    };
    stdio::write_err(&format!(
        "Exception in thread \"{}\" {}\n",
        thread.name.lock(),
        description
    ));
}

/// Resolves and runs `main(String[])` of `class_name`.
pub fn invoke_main(class_name: &str, args: &[String]) -> NativeResult<()> {
    let thread = crate::runtime::thread::current();
    let class = class_loader::resolve_class(class_name)?;
    let main = class
        .find_method("main", "([Ljava/lang/String;)V")
        .filter(|m| m.is_static())
        .ok_or_else(|| {
            Exception::vm_msg(
                "java/lang/NoSuchMethodError",
                format!("{class_name}.main([Ljava/lang/String;)V"),
            )
        })?;
    class_loader::ensure_initialized(&thread, &class)?;

    let string_array = class_loader::resolve_class("[Ljava/lang/String;")?;
    let array_id = heap::allocate_array(&string_array, args.len() as i32)?;
    {
        let object = heap::get_or_npe(array_id)?;
        let mut storage = object.array().write();
        if let ArrayStorage::Reference(slots) = &mut *storage {
            for (slot, arg) in slots.iter_mut().zip(args) {
                *slot = string_table::intern(arg)?;
            }
        }
    }

    call_method(&thread, &class, &main, vec![Value::Reference(array_id)])?;
    Ok(())
}
