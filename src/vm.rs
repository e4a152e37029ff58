//! The embedding surface (spec §4, §5, §7).
//!
//! A [`Vm`] owns one heap, one set of global tables (dispatch table,
//! class table, module table — all three themselves GC-allocated
//! `MapObj` instances and registered as roots, per spec §4.1), a
//! bounded pin stack, and at most one running task. The VM is
//! single-threaded and non-reentrant (spec §5): `invoke` runs to
//! completion, or to the first fault, before returning.

use std::collections::HashMap;

use crate::error::{LoaderError, RuntimeFault};
use crate::foreign::ForeignCallback;
use crate::gc;
use crate::gc::PinStack;
use crate::heap::{GcRef, Heap, HeapObject, MapObj};
use crate::interpreter;
use crate::loader;
use crate::value::Value;

/// Logging verbosity gate, kept from the teacher's own `LogLevel`
/// design but routed through the `log` crate's facade instead of raw
/// `println!` so an embedding host controls where diagnostics go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Tunables for the GC and the two growable stacks (spec §4.1, §4.2,
/// §9). There is deliberately no file-based config format here — the
/// embedding host builds this struct directly; persisting it is the
/// host's concern, not the core's.
#[derive(Debug, Clone, Copy)]
pub struct VmConfig {
    /// Live-byte threshold that triggers the first collection.
    pub initial_gc_threshold: usize,
    /// Multiplier applied to post-collection live bytes to pick the
    /// next threshold.
    pub growth_factor: u32,
    /// Floor under which the threshold never shrinks, so a mostly-idle
    /// heap doesn't trigger a collection on every other allocation.
    pub min_threshold: usize,
    /// Hard ceiling on live bytes; crossing it is `RuntimeFault::OutOfMemory`
    /// rather than an ever-growing heap.
    pub hard_memory_limit: usize,
    /// Capacity of the auxiliary root stack for values under
    /// construction (spec §4.2).
    pub pin_stack_capacity: usize,
    /// Maximum call frame depth per task.
    pub max_call_stack: usize,
    /// Initial value-stack capacity allocated for a new task.
    pub initial_stack_capacity: usize,
    pub log_level: LogLevel,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            initial_gc_threshold: 1 << 20,
            growth_factor: 2,
            min_threshold: 1 << 16,
            hard_memory_limit: 1 << 29,
            pin_stack_capacity: 256,
            max_call_stack: 1024,
            initial_stack_capacity: 256,
            log_level: LogLevel::Warn,
        }
    }
}

pub struct Vm {
    pub(crate) heap: Heap,
    pub(crate) config: VmConfig,
    pub(crate) next_gc_threshold: usize,
    pub(crate) pins: PinStack,
    pub(crate) dispatch_table: GcRef,
    pub(crate) class_table: GcRef,
    pub(crate) module_table: GcRef,
    pub(crate) modules_by_name: HashMap<String, GcRef>,
    pub(crate) foreign_symbols: HashMap<String, ForeignCallback>,
    pub(crate) current_task: Option<GcRef>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        log::set_max_level(config.log_level.to_level_filter());
        let mut heap = Heap::new();
        let dispatch_table = heap.insert(HeapObject::Map(MapObj::new()));
        let class_table = heap.insert(HeapObject::Map(MapObj::new()));
        let module_table = heap.insert(HeapObject::Map(MapObj::new()));
        let next_gc_threshold = config.initial_gc_threshold;
        Self {
            heap,
            next_gc_threshold,
            pins: PinStack::new(config.pin_stack_capacity),
            dispatch_table,
            class_table,
            module_table,
            modules_by_name: HashMap::new(),
            foreign_symbols: HashMap::new(),
            current_task: None,
            config,
        }
    }

    /// Releases the VM's heap. Named to mirror the embedding API this
    /// crate replaces (`orbit_vmDealloc`) rather than just relying on
    /// `Drop` (spec §4.6): clears the three global map roots and the
    /// current task reference, then forces a collection, so everything
    /// the VM owned is reclaimed before the record itself is dropped.
    pub fn dealloc(mut self) {
        self.current_task = None;
        self.dispatch_table = self.heap.insert(HeapObject::Map(MapObj::new()));
        self.class_table = self.heap.insert(HeapObject::Map(MapObj::new()));
        self.module_table = self.heap.insert(HeapObject::Map(MapObj::new()));
        gc::collect(&mut self);
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Registers a foreign callback under the signature a `.omf` file
    /// will reference (spec §4.4, §4.6). Must be called before loading
    /// any module that imports it.
    pub fn register_foreign(&mut self, signature: impl Into<String>, callback: ForeignCallback) {
        self.foreign_symbols.insert(signature.into(), callback);
    }

    /// Parses and links an `.omf` module, registering its exported
    /// functions in the dispatch table and its exported classes in the
    /// class table (spec §4.4, §6). Re-loading an already-present
    /// module is a no-op that just returns the existing module.
    pub fn load_module(&mut self, name: &str, bytes: &[u8]) -> Result<GcRef, LoaderError> {
        if let Some(existing) = self.modules_by_name.get(name) {
            return Ok(*existing);
        }
        let module_ref = loader::load(self, name, bytes)?;
        self.modules_by_name.insert(name.to_string(), module_ref);
        Ok(module_ref)
    }

    pub fn module_named(&self, name: &str) -> Option<GcRef> {
        self.modules_by_name.get(name).copied()
    }

    /// Runs `entry` to completion, collapsing any fault to `false` per
    /// the embedding API's boolean success contract. Use
    /// [`Vm::invoke_checked`] to see the fault itself.
    pub fn invoke(&mut self, module: GcRef, entry: &str, args: Vec<Value>) -> bool {
        self.invoke_checked(module, entry, args).is_ok()
    }

    pub fn invoke_checked(
        &mut self,
        module: GcRef,
        entry: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>, RuntimeFault> {
        interpreter::run(self, module, entry, args)
    }
}
