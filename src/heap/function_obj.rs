//! Heap function object (spec §3, §4.3, §4.5): either native bytecode
//! owned by a module, or a foreign callback registered by the host.
//!
//! Functions are looked up by signature string (name plus arity, per
//! spec §4.4) through the VM's dispatch table; `signature` is kept on
//! the object itself so dispatch misses can report a useful name.

use crate::foreign::ForeignCallback;
use crate::heap::GcRef;

#[derive(Clone)]
pub enum FunctionKind {
    Native {
        bytecode: Vec<u8>,
        arity: u8,
        local_count: u16,
        stack_effect: u16,
        module: GcRef,
    },
    Foreign {
        arity: u8,
        callback: ForeignCallback,
    },
}

impl std::fmt::Debug for FunctionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionKind::Native {
                arity,
                local_count,
                stack_effect,
                module,
                ..
            } => f
                .debug_struct("Native")
                .field("arity", arity)
                .field("local_count", local_count)
                .field("stack_effect", stack_effect)
                .field("module", module)
                .finish(),
            FunctionKind::Foreign { arity, .. } => {
                f.debug_struct("Foreign").field("arity", arity).finish()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionObj {
    pub signature: String,
    pub kind: FunctionKind,
}

impl FunctionObj {
    pub fn native(
        signature: impl Into<String>,
        bytecode: Vec<u8>,
        arity: u8,
        local_count: u16,
        stack_effect: u16,
        module: GcRef,
    ) -> Self {
        Self {
            signature: signature.into(),
            kind: FunctionKind::Native {
                bytecode,
                arity,
                local_count,
                stack_effect,
                module,
            },
        }
    }

    pub fn foreign(signature: impl Into<String>, arity: u8, callback: ForeignCallback) -> Self {
        Self {
            signature: signature.into(),
            kind: FunctionKind::Foreign { arity, callback },
        }
    }

    pub fn arity(&self) -> u8 {
        match &self.kind {
            FunctionKind::Native { arity, .. } => *arity,
            FunctionKind::Foreign { arity, .. } => *arity,
        }
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self.kind, FunctionKind::Foreign { .. })
    }

    pub fn approx_size(&self) -> usize {
        let body = match &self.kind {
            FunctionKind::Native { bytecode, .. } => bytecode.capacity(),
            FunctionKind::Foreign { .. } => 0,
        };
        std::mem::size_of::<Self>() + self.signature.capacity() + body
    }
}
