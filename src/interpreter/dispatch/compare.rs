//! `test_lt` / `test_gt` / `test_eq` (spec §4.5): pop two values, push
//! a boolean. Ordering compares only numbers; equality uses the full
//! value-equality relation (spec §4.3) and so also accepts strings and
//! object identities.

use crate::error::RuntimeFault;
use crate::heap::GcRef;
use crate::value::{value_eq, Value};
use crate::vm::Vm;

fn pop_two_numbers(vm: &mut Vm, task: GcRef, op: &'static str) -> Result<(f64, f64), RuntimeFault> {
    let t = vm.heap.as_task_mut(task).unwrap();
    let rhs = t.pop().ok_or(RuntimeFault::StackUnderflow)?;
    let lhs = t.pop().ok_or(RuntimeFault::StackUnderflow)?;
    let lhs = lhs
        .as_number()
        .ok_or_else(|| RuntimeFault::TypeMismatch { op, detail: format!("left operand {lhs:?} is not a number") })?;
    let rhs = rhs
        .as_number()
        .ok_or_else(|| RuntimeFault::TypeMismatch { op, detail: format!("right operand {rhs:?} is not a number") })?;
    Ok((lhs, rhs))
}

pub fn test_lt(vm: &mut Vm, task: GcRef) -> Result<(), RuntimeFault> {
    let (a, b) = pop_two_numbers(vm, task, "test_lt")?;
    vm.heap.as_task_mut(task).unwrap().push(Value::Bool(a < b));
    Ok(())
}

pub fn test_gt(vm: &mut Vm, task: GcRef) -> Result<(), RuntimeFault> {
    let (a, b) = pop_two_numbers(vm, task, "test_gt")?;
    vm.heap.as_task_mut(task).unwrap().push(Value::Bool(a > b));
    Ok(())
}

pub fn test_eq(vm: &mut Vm, task: GcRef) -> Result<(), RuntimeFault> {
    let t = vm.heap.as_task_mut(task).unwrap();
    let rhs = t.pop().ok_or(RuntimeFault::StackUnderflow)?;
    let lhs = t.pop().ok_or(RuntimeFault::StackUnderflow)?;
    let eq = value_eq(&lhs, &rhs, &vm.heap);
    vm.heap.as_task_mut(task).unwrap().push(Value::Bool(eq));
    Ok(())
}
