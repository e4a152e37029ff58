//! Mark-sweep collection (spec §4.1, §4.2, §9).
//!
//! `alloc` is the single entry point the rest of the crate uses to put
//! objects on the heap. It checks the growth threshold and collects
//! *before* inserting, never after — an allocation that needs a
//! collection to make room must never let that collection run against
//! a half-built, not-yet-rooted object (spec §9's central GC safety
//! invariant).

use crate::error::RuntimeFault;
use crate::heap::{GcRef, HeapObject};
use crate::vm::Vm;

/// Bounded stack of extra GC roots for values under construction that
/// aren't yet reachable from a task or global table (spec §4.2: "a
/// bounded auxiliary root stack for values under construction").
#[derive(Debug, Default)]
pub struct PinStack {
    refs: Vec<GcRef>,
    capacity: usize,
}

impl PinStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            refs: Vec::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub fn pin(&mut self, r: GcRef) -> Result<(), RuntimeFault> {
        if self.refs.len() >= self.capacity {
            return Err(RuntimeFault::PinStackOverflow {
                capacity: self.capacity,
            });
        }
        self.refs.push(r);
        Ok(())
    }

    pub fn unpin(&mut self) -> Option<GcRef> {
        self.refs.pop()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GcRef> {
        self.refs.iter()
    }
}

/// Allocates `object`, triggering a collection first if the
/// configured threshold has been crossed. `approx_size` is passed
/// separately rather than derived from `object` after the fact so
/// callers can fail fast on `OutOfMemory` without ever constructing
/// the object in cases where that would itself be expensive — in
/// practice every caller just uses `object.approx_size()`.
pub fn alloc(vm: &mut Vm, object: HeapObject, approx_size: usize) -> Result<GcRef, RuntimeFault> {
    maybe_collect(vm, approx_size)?;
    let projected = vm.heap.live_bytes() + approx_size;
    if projected > vm.config.hard_memory_limit {
        return Err(RuntimeFault::OutOfMemory {
            requested: approx_size,
            limit: vm.config.hard_memory_limit,
        });
    }
    Ok(vm.heap.insert(object))
}

/// Collects if the heap's live-byte count plus the incoming
/// allocation would cross `vm.next_gc_threshold`.
pub fn maybe_collect(vm: &mut Vm, incoming_size: usize) -> Result<(), RuntimeFault> {
    if vm.heap.live_bytes() + incoming_size >= vm.next_gc_threshold {
        collect(vm);
    }
    if vm.heap.live_bytes() + incoming_size > vm.config.hard_memory_limit {
        return Err(RuntimeFault::OutOfMemory {
            requested: incoming_size,
            limit: vm.config.hard_memory_limit,
        });
    }
    Ok(())
}

/// Full mark-sweep pass: mark everything reachable from the current
/// task, the three global tables, and the pin stack; then sweep.
pub fn collect(vm: &mut Vm) {
    log::debug!(
        "gc: collecting at {} live byte(s), threshold {}",
        vm.heap.live_bytes(),
        vm.next_gc_threshold
    );

    let mut gray: Vec<GcRef> = Vec::new();

    if let Some(task) = vm.current_task {
        mark_root(vm, task, &mut gray);
    }
    mark_root(vm, vm.dispatch_table, &mut gray);
    mark_root(vm, vm.class_table, &mut gray);
    mark_root(vm, vm.module_table, &mut gray);
    for r in vm.pins.iter().copied().collect::<Vec<_>>() {
        mark_root(vm, r, &mut gray);
    }

    while let Some(r) = gray.pop() {
        trace(vm, r, &mut gray);
    }

    let freed = vm.heap.sweep();
    let live = vm.heap.live_bytes();
    vm.next_gc_threshold = (live * vm.config.growth_factor as usize).max(vm.config.min_threshold);

    log::debug!(
        "gc: freed {freed} object(s), {live} byte(s) live, next threshold {}",
        vm.next_gc_threshold
    );
}

fn mark_root(vm: &mut Vm, r: GcRef, gray: &mut Vec<GcRef>) {
    if vm.heap.mark(r) {
        gray.push(r);
    }
}

/// Pushes every `GcRef` directly reachable from `r` onto `gray`,
/// marking each for the first time it's seen (`Heap::mark` returns
/// `false` on an already-marked object, which is what keeps this
/// terminating on cyclic structures).
fn trace(vm: &mut Vm, r: GcRef, gray: &mut Vec<GcRef>) {
    use crate::heap::HeapObject::*;

    let children: Vec<GcRef> = match vm.heap.get(r) {
        Some(String(_)) => Vec::new(),
        Some(Map(m)) => {
            let mut out = Vec::new();
            for (k, v) in m.iter() {
                if let Some(o) = k.as_object() {
                    out.push(o);
                }
                if let Some(o) = v.as_object() {
                    out.push(o);
                }
            }
            out
        }
        Some(Class(c)) => {
            let mut out = Vec::new();
            if let Some(o) = c.ctor.and_then(|v| v.as_object()) {
                out.push(o);
            }
            if let Some(o) = c.dtor.and_then(|v| v.as_object()) {
                out.push(o);
            }
            out
        }
        Some(Instance(i)) => {
            let mut out = vec![i.class];
            out.extend(i.fields.iter().filter_map(|v| v.as_object()));
            out
        }
        Some(Function(func)) => {
            let mut out = Vec::new();
            if let crate::heap::FunctionKind::Native { module, .. } = &func.kind {
                out.push(*module);
            }
            out
        }
        Some(Task(t)) => {
            let mut out: Vec<GcRef> = t.stack[..t.sp].iter().filter_map(|v| v.as_object()).collect();
            out.extend(t.frames.iter().map(|f| f.function));
            out
        }
        Some(Module(m)) => {
            let mut out: Vec<GcRef> = m.constants.iter().filter_map(|v| v.as_object()).collect();
            out.extend(m.globals.iter().filter_map(|v| v.as_object()));
            out.extend(m.functions.values().copied());
            out.extend(m.classes.values().copied());
            out
        }
        None => Vec::new(),
    };

    for child in children {
        mark_root(vm, child, gray);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::StringObj;
    use crate::vm::VmConfig;

    /// S5 - a collection run must not reclaim anything pinned, and must
    /// reclaim everything once unpinned and no longer referenced.
    #[test]
    fn pinned_strings_survive_collection_unpinned_ones_are_swept() {
        let _ = env_logger::builder().is_test(true).try_init();
        let config = VmConfig {
            initial_gc_threshold: 1,
            ..VmConfig::default()
        };
        let mut vm = Vm::with_config(config);

        let mut pinned = Vec::new();
        for i in 0..8 {
            let obj = HeapObject::String(StringObj::new(format!("pinned-{i}")));
            let r = alloc(&mut vm, obj, 64).unwrap();
            vm.pins.pin(r).unwrap();
            pinned.push(r);
        }

        collect(&mut vm);

        for r in &pinned {
            assert!(vm.heap.get(*r).is_some(), "pinned object swept");
        }

        for _ in &pinned {
            vm.pins.unpin();
        }
        collect(&mut vm);

        for r in &pinned {
            assert!(vm.heap.get(*r).is_none());
        }
        assert_eq!(vm.heap.live_count(), 3, "only the three bootstrap tables remain");
    }

    #[test]
    fn pin_stack_rejects_beyond_capacity() {
        let mut vm = Vm::new();
        let r = vm.heap.insert(HeapObject::String(StringObj::new("x")));
        let mut pins = PinStack::new(1);
        pins.pin(r).unwrap();
        assert!(pins.pin(r).is_err());
    }
}
