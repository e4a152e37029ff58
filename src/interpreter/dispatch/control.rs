//! Jumps, calls, returns, and instance construction (spec §4.5): the
//! opcodes that touch the frame stack instead of just the value stack.

use crate::error::RuntimeFault;
use crate::foreign::ForeignCallback;
use crate::gc;
use crate::heap::{Frame, FunctionKind, GcRef, HeapObject, InstanceObj};
use crate::interpreter::opcode::Opcode;
use crate::value::{display_value, Value};
use crate::vm::Vm;

pub fn module_of(vm: &Vm, function: GcRef) -> GcRef {
    match &vm
        .heap
        .as_function(function)
        .expect("current function missing from heap")
        .kind
    {
        FunctionKind::Native { module, .. } => *module,
        FunctionKind::Foreign { .. } => {
            panic!("interpreter loop fetched bytecode for a foreign function")
        }
    }
}

pub fn jump(ip_after: usize, offset: u16) -> usize {
    ip_after + offset as usize
}

pub fn rjump(ip_after: usize, offset: u16) -> usize {
    ip_after - offset as usize
}

pub fn jump_if(vm: &mut Vm, task: GcRef, ip_after: usize, offset: u16) -> Result<usize, RuntimeFault> {
    let cond = vm
        .heap
        .as_task_mut(task)
        .unwrap()
        .pop()
        .ok_or(RuntimeFault::StackUnderflow)?;
    Ok(if cond.is_truthy() {
        ip_after + offset as usize
    } else {
        ip_after
    })
}

pub fn rjump_if(vm: &mut Vm, task: GcRef, ip_after: usize, offset: u16) -> Result<usize, RuntimeFault> {
    let cond = vm
        .heap
        .as_task_mut(task)
        .unwrap()
        .pop()
        .ok_or(RuntimeFault::StackUnderflow)?;
    Ok(if cond.is_truthy() {
        ip_after - offset as usize
    } else {
        ip_after
    })
}

pub fn debug_prt(vm: &mut Vm, task: GcRef) -> Result<(), RuntimeFault> {
    let value = vm
        .heap
        .as_task_mut(task)
        .unwrap()
        .peek(0)
        .ok_or(RuntimeFault::StackUnderflow)?;
    log::info!("{}", display_value(&value, &vm.heap));
    Ok(())
}

/// Everything `do_invoke` needs about the callee, read without ever
/// cloning a native function's bytecode buffer (spec §4.5's call
/// protocol runs once per call; cloning the body would defeat it).
enum CallTarget {
    Native {
        arity: u8,
        local_count: u16,
        stack_effect: u16,
    },
    Foreign {
        arity: u8,
        signature: String,
        callback: ForeignCallback,
    },
}

fn do_invoke(
    vm: &mut Vm,
    task: GcRef,
    caller_return_ip: Option<usize>,
    callee: GcRef,
) -> Result<(), RuntimeFault> {
    let target = {
        let f = vm.heap.as_function(callee).ok_or(RuntimeFault::NotCallable)?;
        match &f.kind {
            FunctionKind::Native {
                arity,
                local_count,
                stack_effect,
                ..
            } => CallTarget::Native {
                arity: *arity,
                local_count: *local_count,
                stack_effect: *stack_effect,
            },
            FunctionKind::Foreign { arity, callback } => CallTarget::Foreign {
                arity: *arity,
                signature: f.signature.clone(),
                callback: callback.clone(),
            },
        }
    };

    if let Some(ret_ip) = caller_return_ip {
        if let Some(frame) = vm.heap.as_task_mut(task).unwrap().current_frame_mut() {
            frame.ip = ret_ip;
        }
    }

    match target {
        CallTarget::Native {
            arity,
            local_count,
            stack_effect,
        } => {
            let arity = arity as usize;
            let t = vm.heap.as_task_mut(task).unwrap();
            if t.sp < arity {
                return Err(RuntimeFault::StackUnderflow);
            }
            let stack_base = t.sp - arity;
            t.ensure_stack_capacity(stack_effect as usize + local_count as usize);
            t.push_frame(Frame {
                function: callee,
                ip: 0,
                stack_base,
            })
            .map_err(|limit| RuntimeFault::StackOverflow { limit })?;
            t.sp += local_count as usize;
            Ok(())
        }
        CallTarget::Foreign {
            arity,
            signature,
            callback,
        } => {
            let arity = arity as usize;
            let t = vm.heap.as_task_mut(task).unwrap();
            if t.sp < arity {
                return Err(RuntimeFault::StackUnderflow);
            }
            let base = t.sp - arity;
            let args: Vec<Value> = t.stack[base..t.sp].to_vec();
            t.sp = base;
            let result = callback(&args, &mut vm.heap)
                .map_err(|msg| RuntimeFault::ForeignError(signature, msg))?;
            vm.heap.as_task_mut(task).unwrap().push(result);
            Ok(())
        }
    }
}

/// Entry-point call: identical call protocol, but there is no caller
/// frame to stash a resume `ip` into.
pub fn start(vm: &mut Vm, task: GcRef, entry: GcRef) -> Result<(), RuntimeFault> {
    do_invoke(vm, task, None, entry)
}

pub fn invoke(
    vm: &mut Vm,
    task: GcRef,
    function: GcRef,
    ret_ip: usize,
    idx: u16,
) -> Result<(), RuntimeFault> {
    let module = module_of(vm, function);
    let idx = idx as usize;
    let value = {
        let m = vm.heap.as_module(module).expect("current module missing from heap");
        *m.constants
            .get(idx)
            .ok_or(RuntimeFault::ConstantIndexOutOfRange { index: idx, len: m.constants.len() })?
    };
    let callee = value.as_object().ok_or(RuntimeFault::NotCallable)?;
    do_invoke(vm, task, Some(ret_ip), callee)
}

/// `invoke_sym`: resolve the call-site's constant (a signature string)
/// through the dispatch table, rewrite the opcode byte at the call
/// site and the constant slot, then invoke as if `invoke` had been
/// there all along (spec §4.5's late-binding rewrite protocol).
pub fn invoke_sym(
    vm: &mut Vm,
    task: GcRef,
    function: GcRef,
    op_site_ip: usize,
    ret_ip: usize,
    idx: u16,
) -> Result<(), RuntimeFault> {
    let module = module_of(vm, function);
    let idx = idx as usize;
    let symbol_value = {
        let m = vm.heap.as_module(module).expect("current module missing from heap");
        *m.constants
            .get(idx)
            .ok_or(RuntimeFault::ConstantIndexOutOfRange { index: idx, len: m.constants.len() })?
    };
    let name = symbol_value
        .as_object()
        .and_then(|r| vm.heap.as_string(r))
        .map(|s| s.value.clone())
        .ok_or_else(|| RuntimeFault::TypeMismatch {
            op: "invoke_sym",
            detail: "constant is not a string".to_string(),
        })?;

    let resolved = vm
        .heap
        .with_map_mut(vm.dispatch_table, |map, heap| map.get(&symbol_value, heap))
        .flatten();
    let callee = resolved
        .and_then(|v| v.as_object())
        .ok_or_else(|| RuntimeFault::UnresolvedSymbol(name.clone()))?;

    rewrite_call_site(vm, function, module, op_site_ip, idx, Opcode::Invoke, Value::Object(callee));

    do_invoke(vm, task, Some(ret_ip), callee)
}

pub fn init(vm: &mut Vm, task: GcRef, function: GcRef, idx: u16) -> Result<(), RuntimeFault> {
    let module = module_of(vm, function);
    let idx = idx as usize;
    let value = {
        let m = vm.heap.as_module(module).expect("current module missing from heap");
        *m.constants
            .get(idx)
            .ok_or(RuntimeFault::ConstantIndexOutOfRange { index: idx, len: m.constants.len() })?
    };
    let class_ref = value.as_object().ok_or(RuntimeFault::NotAClass)?;
    do_init(vm, task, class_ref)
}

/// `init_sym`: resolve a class name constant through the class table,
/// rewrite the call site the same way `invoke_sym` does. Per spec
/// §9's design note this normalises to a two-byte operand rather than
/// the informative opcode table's one-byte `init_sym` encoding, so
/// rewriting never needs to change operand width.
pub fn init_sym(
    vm: &mut Vm,
    task: GcRef,
    function: GcRef,
    op_site_ip: usize,
    idx: u16,
) -> Result<(), RuntimeFault> {
    let module = module_of(vm, function);
    let idx = idx as usize;
    let name_value = {
        let m = vm.heap.as_module(module).expect("current module missing from heap");
        *m.constants
            .get(idx)
            .ok_or(RuntimeFault::ConstantIndexOutOfRange { index: idx, len: m.constants.len() })?
    };
    let name = name_value
        .as_object()
        .and_then(|r| vm.heap.as_string(r))
        .map(|s| s.value.clone())
        .ok_or_else(|| RuntimeFault::TypeMismatch {
            op: "init_sym",
            detail: "constant is not a string".to_string(),
        })?;

    let resolved = vm
        .heap
        .with_map_mut(vm.class_table, |map, heap| map.get(&name_value, heap))
        .flatten();
    let class_ref = resolved
        .and_then(|v| v.as_object())
        .ok_or_else(|| RuntimeFault::UnresolvedClass(name.clone()))?;

    rewrite_call_site(vm, function, module, op_site_ip, idx, Opcode::Init, Value::Object(class_ref));

    do_init(vm, task, class_ref)
}

fn rewrite_call_site(
    vm: &mut Vm,
    function: GcRef,
    module: GcRef,
    op_site_ip: usize,
    const_idx: usize,
    new_opcode: Opcode,
    new_constant: Value,
) {
    let f = vm
        .heap
        .as_function_mut(function)
        .expect("current function missing from heap");
    if let FunctionKind::Native { bytecode, .. } = &mut f.kind {
        bytecode[op_site_ip] = new_opcode.as_byte();
    }
    let m = vm
        .heap
        .as_module_mut(module)
        .expect("current module missing from heap");
    m.constants[const_idx] = new_constant;
}

fn do_init(vm: &mut Vm, task: GcRef, class_ref: GcRef) -> Result<(), RuntimeFault> {
    let field_count = vm
        .heap
        .as_class(class_ref)
        .ok_or(RuntimeFault::NotAClass)?
        .field_count;
    let instance = InstanceObj::new(class_ref, field_count);
    let size = instance.approx_size();
    let instance_ref = gc::alloc(vm, HeapObject::Instance(instance), size)?;
    vm.heap.as_task_mut(task).unwrap().push(Value::Object(instance_ref));
    Ok(())
}

pub enum RetOutcome {
    Continuing,
    Finished(Option<Value>),
}

pub fn ret(vm: &mut Vm, task: GcRef, return_value: Option<Value>) -> Result<RetOutcome, RuntimeFault> {
    let t = vm.heap.as_task_mut(task).unwrap();
    let frame = t.pop_frame().ok_or(RuntimeFault::StackUnderflow)?;
    t.sp = frame.stack_base;
    if let Some(v) = return_value {
        t.push(v);
    }
    if t.frames.is_empty() {
        Ok(RetOutcome::Finished(return_value))
    } else {
        Ok(RetOutcome::Continuing)
    }
}
