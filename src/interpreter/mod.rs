//! The fetch-decode-dispatch loop (spec §4.5).
//!
//! Each iteration hoists the current frame's function, instruction
//! pointer, and stack base into locals, decodes one opcode, and hands
//! off to the matching `dispatch` handler. Those locals are never held
//! across a handler call that might trigger a GC pass or a frame
//! push/pop — they're re-read from the task at the top of the next
//! iteration, which is what keeps them from going stale after a call,
//! return, or stack growth (spec §4.5, §9).

pub mod dispatch;
pub mod opcode;

use crate::error::RuntimeFault;
use crate::heap::{FunctionKind, GcRef, HeapObject, TaskObj};
use crate::value::Value;
use crate::vm::Vm;

use dispatch::{access, arithmetic, compare, control};
use opcode::Opcode;

/// Runs `entry` in `module` to completion, starting a fresh task bound
/// to it (spec §4.6: `invoke` "constructs a Task bound to the resolved
/// function, and runs the interpreter").
pub fn run(
    vm: &mut Vm,
    module: GcRef,
    entry: &str,
    args: Vec<Value>,
) -> Result<Option<Value>, RuntimeFault> {
    let entry_fn = resolve_entry(vm, module, entry)?;

    let task = vm.heap.insert(HeapObject::Task(TaskObj::new(
        vm.config.initial_stack_capacity,
        vm.config.max_call_stack,
    )));
    vm.current_task = Some(task);

    let arity = vm
        .heap
        .as_function(entry_fn)
        .map(|f| f.arity())
        .unwrap_or(0) as usize;
    {
        let t = vm.heap.as_task_mut(task).unwrap();
        for (i, arg) in args.into_iter().enumerate() {
            if i >= arity {
                break;
            }
            t.push(arg);
        }
    }

    let outcome = run_loop(vm, task, entry_fn);
    vm.current_task = None;
    outcome
}

fn resolve_entry(vm: &Vm, module: GcRef, entry: &str) -> Result<GcRef, RuntimeFault> {
    let m = vm
        .heap
        .as_module(module)
        .ok_or_else(|| RuntimeFault::EntryNotFound {
            module: String::new(),
            entry: entry.to_string(),
        })?;
    m.functions
        .get(entry)
        .copied()
        .ok_or_else(|| RuntimeFault::EntryNotFound {
            module: m.name.clone(),
            entry: entry.to_string(),
        })
}

fn read_u8(vm: &Vm, function: GcRef, ip: usize) -> Result<u8, RuntimeFault> {
    match &vm
        .heap
        .as_function(function)
        .expect("current function missing from heap")
        .kind
    {
        FunctionKind::Native { bytecode, .. } => {
            bytecode.get(ip).copied().ok_or(RuntimeFault::InstructionOutOfBounds)
        }
        FunctionKind::Foreign { .. } => {
            panic!("interpreter loop fetched bytecode for a foreign function")
        }
    }
}

fn read_u16(vm: &Vm, function: GcRef, ip: usize) -> Result<u16, RuntimeFault> {
    let hi = read_u8(vm, function, ip)? as u16;
    let lo = read_u8(vm, function, ip + 1)? as u16;
    Ok((hi << 8) | lo)
}

fn current_frame_state(vm: &Vm, task: GcRef) -> Result<(GcRef, usize, usize), RuntimeFault> {
    let t = vm.heap.as_task(task).expect("current task missing from heap");
    let frame = t.current_frame().ok_or(RuntimeFault::StackUnderflow)?;
    Ok((frame.function, frame.ip, frame.stack_base))
}

fn set_ip(vm: &mut Vm, task: GcRef, ip: usize) {
    if let Some(frame) = vm.heap.as_task_mut(task).unwrap().current_frame_mut() {
        frame.ip = ip;
    }
}

fn local_count_total(vm: &Vm, function: GcRef) -> usize {
    match &vm
        .heap
        .as_function(function)
        .expect("current function missing from heap")
        .kind
    {
        FunctionKind::Native {
            arity, local_count, ..
        } => *arity as usize + *local_count as usize,
        FunctionKind::Foreign { .. } => 0,
    }
}

fn run_loop(vm: &mut Vm, task: GcRef, entry_fn: GcRef) -> Result<Option<Value>, RuntimeFault> {
    control::start(vm, task, entry_fn)?;

    loop {
        let (function, ip, stack_base) = current_frame_state(vm, task)?;
        let op_byte = read_u8(vm, function, ip)?;
        let opcode = Opcode::try_from(op_byte).map_err(RuntimeFault::UnknownOpcode)?;

        match opcode {
            Opcode::Halt => return Ok(None),

            Opcode::LoadNil => {
                set_ip(vm, task, ip + 1);
                vm.heap.as_task_mut(task).unwrap().push(Value::Nil);
            }
            Opcode::LoadTrue => {
                set_ip(vm, task, ip + 1);
                vm.heap.as_task_mut(task).unwrap().push(Value::Bool(true));
            }
            Opcode::LoadFalse => {
                set_ip(vm, task, ip + 1);
                vm.heap.as_task_mut(task).unwrap().push(Value::Bool(false));
            }
            Opcode::LoadConst => {
                let idx = read_u16(vm, function, ip + 1)?;
                set_ip(vm, task, ip + 3);
                let module = control::module_of(vm, function);
                access::load_const(vm, task, module, idx)?;
            }
            Opcode::LoadLocal => {
                let idx = read_u8(vm, function, ip + 1)?;
                set_ip(vm, task, ip + 2);
                let local_count = local_count_total(vm, function);
                access::load_local(vm, task, stack_base, local_count, idx)?;
            }
            Opcode::LoadField => {
                let idx = read_u16(vm, function, ip + 1)?;
                set_ip(vm, task, ip + 3);
                access::load_field(vm, task, idx)?;
            }
            Opcode::LoadGlobal => {
                let idx = read_u16(vm, function, ip + 1)?;
                set_ip(vm, task, ip + 3);
                let module = control::module_of(vm, function);
                access::load_global(vm, task, module, idx)?;
            }
            Opcode::StoreLocal => {
                let idx = read_u8(vm, function, ip + 1)?;
                set_ip(vm, task, ip + 2);
                let local_count = local_count_total(vm, function);
                access::store_local(vm, task, stack_base, local_count, idx)?;
            }
            Opcode::StoreField => {
                let idx = read_u16(vm, function, ip + 1)?;
                set_ip(vm, task, ip + 3);
                access::store_field(vm, task, idx)?;
            }
            Opcode::StoreGlobal => {
                let idx = read_u16(vm, function, ip + 1)?;
                set_ip(vm, task, ip + 3);
                let module = control::module_of(vm, function);
                access::store_global(vm, task, module, idx)?;
            }

            Opcode::Add => {
                set_ip(vm, task, ip + 1);
                arithmetic::add(vm, task)?;
            }
            Opcode::Sub => {
                set_ip(vm, task, ip + 1);
                arithmetic::sub(vm, task)?;
            }
            Opcode::Mul => {
                set_ip(vm, task, ip + 1);
                arithmetic::mul(vm, task)?;
            }
            Opcode::Div => {
                set_ip(vm, task, ip + 1);
                arithmetic::div(vm, task)?;
            }

            Opcode::TestLt => {
                set_ip(vm, task, ip + 1);
                compare::test_lt(vm, task)?;
            }
            Opcode::TestGt => {
                set_ip(vm, task, ip + 1);
                compare::test_gt(vm, task)?;
            }
            Opcode::TestEq => {
                set_ip(vm, task, ip + 1);
                compare::test_eq(vm, task)?;
            }

            Opcode::And => return Err(RuntimeFault::ReservedOpcode("and")),
            Opcode::Or => return Err(RuntimeFault::ReservedOpcode("or")),

            Opcode::Jump => {
                let off = read_u16(vm, function, ip + 1)?;
                let next = control::jump(ip + 3, off);
                set_ip(vm, task, next);
            }
            Opcode::JumpIf => {
                let off = read_u16(vm, function, ip + 1)?;
                let next = control::jump_if(vm, task, ip + 3, off)?;
                set_ip(vm, task, next);
            }
            Opcode::RJump => {
                let off = read_u16(vm, function, ip + 1)?;
                let next = control::rjump(ip + 3, off);
                set_ip(vm, task, next);
            }
            Opcode::RJumpIf => {
                let off = read_u16(vm, function, ip + 1)?;
                let next = control::rjump_if(vm, task, ip + 3, off)?;
                set_ip(vm, task, next);
            }

            Opcode::Pop => {
                set_ip(vm, task, ip + 1);
                access::pop(vm, task)?;
            }
            Opcode::Swap => {
                set_ip(vm, task, ip + 1);
                access::swap(vm, task)?;
            }

            Opcode::InvokeSym => {
                let idx = read_u16(vm, function, ip + 1)?;
                let ret_ip = ip + 3;
                control::invoke_sym(vm, task, function, ip, ret_ip, idx)?;
            }
            Opcode::Invoke => {
                let idx = read_u16(vm, function, ip + 1)?;
                let ret_ip = ip + 3;
                control::invoke(vm, task, function, ret_ip, idx)?;
            }

            Opcode::Ret => {
                if let control::RetOutcome::Finished(v) = control::ret(vm, task, None)? {
                    return Ok(v);
                }
            }
            Opcode::RetVal => {
                let v = access::pop(vm, task)?;
                if let control::RetOutcome::Finished(v) = control::ret(vm, task, Some(v))? {
                    return Ok(v);
                }
            }

            Opcode::InitSym => {
                let idx = read_u16(vm, function, ip + 1)?;
                set_ip(vm, task, ip + 3);
                control::init_sym(vm, task, function, ip, idx)?;
            }
            Opcode::Init => {
                let idx = read_u16(vm, function, ip + 1)?;
                set_ip(vm, task, ip + 3);
                control::init(vm, task, function, idx)?;
            }

            Opcode::DebugPrt => {
                set_ip(vm, task, ip + 1);
                control::debug_prt(vm, task)?;
            }
        }
    }
}
