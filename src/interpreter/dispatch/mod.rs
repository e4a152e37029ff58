//! Opcode handlers, split by category the way the bytecode table in
//! spec §4.5 groups them: loads/stores, arithmetic, comparisons, and
//! control flow (jumps, calls, returns, instance construction).

pub mod access;
pub mod arithmetic;
pub mod compare;
pub mod control;
