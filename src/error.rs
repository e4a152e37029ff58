//! Error taxonomy (spec §7).
//!
//! Loader failures are the only errors meant to cross the embedding
//! boundary as structured data — `Vm::load_module` returns
//! `Result<(), LoaderError>`. Everything that happens once bytecode is
//! actually running (`RuntimeFault`) is fatal to the in-flight `invoke`
//! call per the core's abort-on-error design; `Vm::invoke` collapses it
//! to the boolean the embedding API promises, while `Vm::invoke_checked`
//! stays available for hosts that want the detail.

use thiserror::Error;

/// Failures while reading and unpacking an `.omf` module (spec §4.4, §6).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("truncated module: expected {expected} more byte(s) at offset {offset}")]
    Truncated { offset: usize, expected: usize },

    #[error("bad magic number: expected {expected:#06x}, found {found:#06x}")]
    BadMagic { expected: u32, found: u32 },

    #[error("unsupported module format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("malformed section '{section}': {reason}")]
    MalformedSection { section: &'static str, reason: String },

    #[error("constant pool index {index} out of range (pool has {len} entries)")]
    ConstantIndexOutOfRange { index: usize, len: usize },

    #[error("string pool index {index} out of range (pool has {len} entries)")]
    StringIndexOutOfRange { index: usize, len: usize },

    #[error("unknown foreign symbol '{name}': no callback registered under that name")]
    UnknownForeignSymbol { name: String },

    #[error("could not open module file for '{name}': {reason}")]
    Io { name: String, reason: String },
}

/// Faults raised while a task is executing (spec §7: dispatch errors,
/// stack-discipline errors, allocation failure). These are fatal to the
/// interpreter run in progress; they are never recovered from mid-task.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeFault {
    #[error("entry point '{entry}' not found in module '{module}'")]
    EntryNotFound { module: String, entry: String },

    #[error("attempt to invoke a value that is not a function")]
    NotCallable,

    #[error("attempt to init a value that is not a class")]
    NotAClass,

    #[error("undefined symbol '{0}': no function registered under that signature")]
    UnresolvedSymbol(String),

    #[error("undefined class '{0}': no class registered under that name")]
    UnresolvedClass(String),

    #[error("type mismatch in '{op}': {detail}")]
    TypeMismatch { op: &'static str, detail: String },

    #[error("field index {index} out of range (instance has {len} field(s))")]
    FieldIndexOutOfRange { index: usize, len: usize },

    #[error("constant index {index} out of range (pool has {len} entries)")]
    ConstantIndexOutOfRange { index: usize, len: usize },

    #[error("global index {index} out of range ({len} global(s) declared)")]
    GlobalIndexOutOfRange { index: usize, len: usize },

    #[error("local index {index} out of range ({len} local slot(s) reserved)")]
    LocalIndexOutOfRange { index: usize, len: usize },

    #[error("value stack underflow")]
    StackUnderflow,

    #[error("call stack depth exceeded the configured limit of {limit}")]
    StackOverflow { limit: usize },

    #[error("reserved opcode '{0}' has no defined semantics")]
    ReservedOpcode(&'static str),

    #[error("unknown opcode byte {0:#04x}")]
    UnknownOpcode(u8),

    #[error("instruction pointer ran past the end of the function's bytecode")]
    InstructionOutOfBounds,

    #[error("foreign function '{0}' raised an error: {1}")]
    ForeignError(String, String),

    #[error("heap exhausted: allocation of {requested} byte(s) exceeds the {limit} byte hard limit")]
    OutOfMemory { requested: usize, limit: usize },

    #[error("pin stack overflow: capacity {capacity} exceeded")]
    PinStackOverflow { capacity: usize },
}
