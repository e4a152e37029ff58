//! `add` / `sub` / `mul` / `div` (spec §4.5, §4.3): pop two numbers,
//! push the result. Any other operand shape is a type-mismatch fault —
//! the core has no string concatenation or numeric coercion.

use crate::error::RuntimeFault;
use crate::heap::GcRef;
use crate::value::Value;
use crate::vm::Vm;

fn pop_two(vm: &mut Vm, task: GcRef) -> Result<(f64, f64), RuntimeFault> {
    let t = vm.heap.as_task_mut(task).unwrap();
    let rhs = t.pop().ok_or(RuntimeFault::StackUnderflow)?;
    let lhs = t.pop().ok_or(RuntimeFault::StackUnderflow)?;
    let lhs = lhs.as_number().ok_or_else(|| RuntimeFault::TypeMismatch {
        op: "arithmetic",
        detail: format!("left operand {lhs:?} is not a number"),
    })?;
    let rhs = rhs.as_number().ok_or_else(|| RuntimeFault::TypeMismatch {
        op: "arithmetic",
        detail: format!("right operand {rhs:?} is not a number"),
    })?;
    Ok((lhs, rhs))
}

pub fn add(vm: &mut Vm, task: GcRef) -> Result<(), RuntimeFault> {
    let (a, b) = pop_two(vm, task)?;
    vm.heap.as_task_mut(task).unwrap().push(Value::Number(a + b));
    Ok(())
}

pub fn sub(vm: &mut Vm, task: GcRef) -> Result<(), RuntimeFault> {
    let (a, b) = pop_two(vm, task)?;
    vm.heap.as_task_mut(task).unwrap().push(Value::Number(a - b));
    Ok(())
}

pub fn mul(vm: &mut Vm, task: GcRef) -> Result<(), RuntimeFault> {
    let (a, b) = pop_two(vm, task)?;
    vm.heap.as_task_mut(task).unwrap().push(Value::Number(a * b));
    Ok(())
}

pub fn div(vm: &mut Vm, task: GcRef) -> Result<(), RuntimeFault> {
    let (a, b) = pop_two(vm, task)?;
    vm.heap.as_task_mut(task).unwrap().push(Value::Number(a / b));
    Ok(())
}
