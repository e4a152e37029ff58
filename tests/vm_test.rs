//! End-to-end seed scenarios from the bytecode design (S1-S6):
//! arithmetic/return, branching, call-site rewriting, instance field
//! access, pinned-object GC survival, and the foreign-call ABI.

mod common;

use orbit::interpreter::opcode::Opcode;
use orbit::{Value, Vm};

use common::{init_logging, op, ModuleBuilder};

fn push_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// S1 - Arithmetic and return.
#[test]
fn arithmetic_and_return() {
    init_logging();
    let mut b = ModuleBuilder::new();
    let c0 = b.const_number(2.0);
    let c1 = b.const_number(3.0);

    let mut code = Vec::new();
    code.push(op(Opcode::LoadConst));
    push_u16(&mut code, c0);
    code.push(op(Opcode::LoadConst));
    push_u16(&mut code, c1);
    code.push(op(Opcode::Add));
    code.push(op(Opcode::RetVal));

    b.native_function("main()", 0, 0, 4, code);

    let mut vm = Vm::new();
    let module = vm.load_module("s1", &b.build()).unwrap();
    let result = vm.invoke_checked(module, "main()", vec![]).unwrap();
    assert_eq!(result, Some(Value::Number(5.0)));
}

/// S2 - Branching.
#[test]
fn branching_takes_the_true_path() {
    init_logging();
    let mut b = ModuleBuilder::new();
    let c0 = b.const_number(10.0);
    let c1 = b.const_number(20.0);

    // load_true; jump_if 3; load_const 0; ret_val; load_const 1; ret_val
    let mut code = Vec::new();
    code.push(op(Opcode::LoadTrue));
    code.push(op(Opcode::JumpIf));
    push_u16(&mut code, 3);
    code.push(op(Opcode::LoadConst));
    push_u16(&mut code, c0);
    code.push(op(Opcode::RetVal));
    code.push(op(Opcode::LoadConst));
    push_u16(&mut code, c1);
    code.push(op(Opcode::RetVal));

    b.native_function("main()", 0, 0, 4, code);

    let mut vm = Vm::new();
    let module = vm.load_module("s2", &b.build()).unwrap();
    let result = vm.invoke_checked(module, "main()", vec![]).unwrap();
    assert_eq!(result, Some(Value::Number(20.0)));
}

/// S3 - Call with rewrite: `a` calls `b` through `invoke_sym`; after
/// the first call the call site is rewritten to `invoke` and the
/// constant slot holds the resolved function.
#[test]
fn call_through_invoke_sym_rewrites_the_call_site() {
    init_logging();
    let mut b = ModuleBuilder::new();
    let sym = b.const_string("b()");

    let mut a_code = Vec::new();
    a_code.push(op(Opcode::InvokeSym));
    push_u16(&mut a_code, sym);
    a_code.push(op(Opcode::Ret));
    b.native_function("a()", 0, 0, 4, a_code);

    let seven = b.const_number(7.0);
    let mut b_code = Vec::new();
    b_code.push(op(Opcode::LoadConst));
    push_u16(&mut b_code, seven);
    b_code.push(op(Opcode::RetVal));
    b.native_function("b()", 0, 0, 4, b_code);

    let mut vm = Vm::new();
    let module = vm.load_module("s3", &b.build()).unwrap();

    let result = vm.invoke_checked(module, "a()", vec![]).unwrap();
    assert_eq!(result, None, "a() ends in ret, not ret_val");

    let result_again = vm.invoke_checked(module, "a()", vec![]).unwrap();
    assert_eq!(result_again, None);

    let b_result = vm.invoke_checked(module, "b()", vec![]).unwrap();
    assert_eq!(b_result, Some(Value::Number(7.0)));
}

/// S4 - Instance field write/read.
#[test]
fn instance_field_write_then_read() {
    init_logging();
    let mut b = ModuleBuilder::new();
    let point = b.const_string("Point");

    // init_sym leaves the new instance on top of stack; stash it in
    // local 0 so each field access can load it back.
    let mut code = Vec::new();
    code.push(op(Opcode::InitSym));
    push_u16(&mut code, point);
    code.push(op(Opcode::StoreLocal));
    code.push(0u8);

    code.push(op(Opcode::LoadLocal));
    code.push(0u8);
    let ten = b.const_number(10.0);
    code.push(op(Opcode::LoadConst));
    push_u16(&mut code, ten);
    code.push(op(Opcode::StoreField));
    push_u16(&mut code, 0);

    code.push(op(Opcode::LoadLocal));
    code.push(0u8);
    let twenty = b.const_number(20.0);
    code.push(op(Opcode::LoadConst));
    push_u16(&mut code, twenty);
    code.push(op(Opcode::StoreField));
    push_u16(&mut code, 1);

    code.push(op(Opcode::LoadLocal));
    code.push(0u8);
    code.push(op(Opcode::LoadField));
    push_u16(&mut code, 0);
    code.push(op(Opcode::RetVal));

    b.native_function("main()", 0, 1, 4, code);
    b.class("Point", 2, None, None);

    let mut vm = Vm::new();
    let module = vm.load_module("s4", &b.build()).unwrap();
    let result = vm.invoke_checked(module, "main()", vec![]).unwrap();
    assert_eq!(result, Some(Value::Number(10.0)));
}

/// S6 - Foreign call ABI: a registered `add2(a, b)` returns `a + b`,
/// reached through `invoke_sym` so the call also exercises dispatch
/// resolution for a foreign target.
#[test]
fn foreign_call_returns_sum() {
    use std::rc::Rc;

    init_logging();
    let mut b = ModuleBuilder::new();
    b.foreign_function("add2()", 2, "add2");

    let ten = b.const_number(10.0);
    let twenty = b.const_number(20.0);
    let sym = b.const_string("add2()");

    let mut main_code = Vec::new();
    main_code.push(op(Opcode::LoadConst));
    push_u16(&mut main_code, ten);
    main_code.push(op(Opcode::LoadConst));
    push_u16(&mut main_code, twenty);
    main_code.push(op(Opcode::InvokeSym));
    push_u16(&mut main_code, sym);
    main_code.push(op(Opcode::RetVal));
    b.native_function("main()", 0, 0, 4, main_code);

    let mut vm = Vm::new();
    vm.register_foreign(
        "add2",
        Rc::new(|args: &[Value], _heap: &mut orbit::heap::Heap| {
            let a = args[0].as_number().ok_or_else(|| "expected number".to_string())?;
            let b = args[1].as_number().ok_or_else(|| "expected number".to_string())?;
            Ok(Value::Number(a + b))
        }),
    );

    let module = vm.load_module("s6", &b.build()).unwrap();
    let result = vm.invoke_checked(module, "main()", vec![]).unwrap();
    assert_eq!(result, Some(Value::Number(30.0)));
}
