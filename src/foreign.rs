//! Foreign function interface (spec §4.6): the boundary between
//! bytecode and host-provided native callbacks.
//!
//! A foreign function receives the arguments the caller pushed
//! (`arity` values, self excluded for instance methods — see
//! `interpreter::dispatch::control` for the exact arity arithmetic)
//! and the heap to read/allocate against, and returns a single value
//! or a host-defined error string.

use std::rc::Rc;

use crate::heap::Heap;
use crate::value::Value;

pub type ForeignResult = Result<Value, String>;

/// Boxed as `Rc` rather than `Box` so that a `FunctionObj` (which is
/// `Clone`, like every other heap payload) can be cloned cheaply
/// during GC compaction-free sweeps without cloning the closure body.
pub type ForeignCallback = Rc<dyn Fn(&[Value], &mut Heap) -> ForeignResult>;
