//! `load_*` / `store_*` opcodes (spec §4.5): constants, locals,
//! instance fields, module globals.

use crate::error::RuntimeFault;
use crate::heap::GcRef;
use crate::value::Value;
use crate::vm::Vm;

pub fn load_const(vm: &mut Vm, task: GcRef, module: GcRef, idx: u16) -> Result<(), RuntimeFault> {
    let idx = idx as usize;
    let value = {
        let m = vm.heap.as_module(module).expect("current module missing from heap");
        *m.constants.get(idx).ok_or(RuntimeFault::ConstantIndexOutOfRange {
            index: idx,
            len: m.constants.len(),
        })?
    };
    vm.heap.as_task_mut(task).unwrap().push(value);
    Ok(())
}

pub fn load_local(
    vm: &mut Vm,
    task: GcRef,
    stack_base: usize,
    local_count: usize,
    idx: u8,
) -> Result<(), RuntimeFault> {
    let idx = idx as usize;
    if idx >= local_count {
        return Err(RuntimeFault::LocalIndexOutOfRange {
            index: idx,
            len: local_count,
        });
    }
    let t = vm.heap.as_task_mut(task).unwrap();
    let value = t.stack[stack_base + idx];
    t.push(value);
    Ok(())
}

pub fn store_local(
    vm: &mut Vm,
    task: GcRef,
    stack_base: usize,
    local_count: usize,
    idx: u8,
) -> Result<(), RuntimeFault> {
    let idx = idx as usize;
    if idx >= local_count {
        return Err(RuntimeFault::LocalIndexOutOfRange {
            index: idx,
            len: local_count,
        });
    }
    let t = vm.heap.as_task_mut(task).unwrap();
    let value = t.pop().ok_or(RuntimeFault::StackUnderflow)?;
    t.stack[stack_base + idx] = value;
    Ok(())
}

pub fn load_field(vm: &mut Vm, task: GcRef, idx: u16) -> Result<(), RuntimeFault> {
    let idx = idx as usize;
    let obj_value = vm
        .heap
        .as_task_mut(task)
        .unwrap()
        .pop()
        .ok_or(RuntimeFault::StackUnderflow)?;
    let instance_ref = obj_value.as_object().filter(|r| {
        matches!(
            vm.heap.kind_of(*r),
            Some(crate::heap::ObjectKind::Instance)
        )
    });
    let value = match instance_ref {
        Some(r) => {
            let instance = vm.heap.as_instance(r).unwrap();
            *instance
                .fields
                .get(idx)
                .ok_or(RuntimeFault::FieldIndexOutOfRange {
                    index: idx,
                    len: instance.fields.len(),
                })?
        }
        None => {
            return Err(RuntimeFault::TypeMismatch {
                op: "load_field",
                detail: "top of stack is not an instance".to_string(),
            })
        }
    };
    vm.heap.as_task_mut(task).unwrap().push(value);
    Ok(())
}

pub fn store_field(vm: &mut Vm, task: GcRef, idx: u16) -> Result<(), RuntimeFault> {
    let idx = idx as usize;
    let t = vm.heap.as_task_mut(task).unwrap();
    let value = t.pop().ok_or(RuntimeFault::StackUnderflow)?;
    let obj_value = t.pop().ok_or(RuntimeFault::StackUnderflow)?;
    let instance_ref = obj_value.as_object().filter(|r| {
        matches!(
            vm.heap.kind_of(*r),
            Some(crate::heap::ObjectKind::Instance)
        )
    });
    match instance_ref {
        Some(r) => {
            let instance = vm.heap.as_instance_mut(r).unwrap();
            let len = instance.fields.len();
            let slot = instance
                .fields
                .get_mut(idx)
                .ok_or(RuntimeFault::FieldIndexOutOfRange { index: idx, len })?;
            *slot = value;
            Ok(())
        }
        None => Err(RuntimeFault::TypeMismatch {
            op: "store_field",
            detail: "target is not an instance".to_string(),
        }),
    }
}

pub fn load_global(vm: &mut Vm, task: GcRef, module: GcRef, idx: u16) -> Result<(), RuntimeFault> {
    let idx = idx as usize;
    let value = {
        let m = vm.heap.as_module(module).expect("current module missing from heap");
        *m.globals.get(idx).ok_or(RuntimeFault::GlobalIndexOutOfRange {
            index: idx,
            len: m.globals.len(),
        })?
    };
    vm.heap.as_task_mut(task).unwrap().push(value);
    Ok(())
}

pub fn store_global(vm: &mut Vm, task: GcRef, module: GcRef, idx: u16) -> Result<(), RuntimeFault> {
    let idx = idx as usize;
    let value = vm
        .heap
        .as_task_mut(task)
        .unwrap()
        .pop()
        .ok_or(RuntimeFault::StackUnderflow)?;
    let m = vm.heap.as_module_mut(module).expect("current module missing from heap");
    let len = m.globals.len();
    let slot = m
        .globals
        .get_mut(idx)
        .ok_or(RuntimeFault::GlobalIndexOutOfRange { index: idx, len })?;
    *slot = value;
    Ok(())
}

pub fn pop(vm: &mut Vm, task: GcRef) -> Result<Value, RuntimeFault> {
    vm.heap
        .as_task_mut(task)
        .unwrap()
        .pop()
        .ok_or(RuntimeFault::StackUnderflow)
}

pub fn swap(vm: &mut Vm, task: GcRef) -> Result<(), RuntimeFault> {
    let t = vm.heap.as_task_mut(task).unwrap();
    if t.sp < 2 {
        return Err(RuntimeFault::StackUnderflow);
    }
    t.stack.swap(t.sp - 1, t.sp - 2);
    Ok(())
}
