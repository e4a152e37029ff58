//! The GC-managed object arena (spec §3, §4.1, §9).
//!
//! Objects are addressed by [`GcRef`], a plain index into `Heap`'s
//! slot vector, rather than by raw pointer. The spec's own design
//! notes sanction this as an alternative to header-first pointer
//! punning, and it keeps every allocation, mark and sweep in this
//! crate free of `unsafe`.
//!
//! `Heap` itself never decides *when* to collect — that policy lives
//! in `gc`. It only owns the slots, does the bookkeeping a collector
//! needs (mark bits, per-object byte size, live byte total) and
//! performs the sweep once told to.

mod class_obj;
mod function_obj;
mod instance_obj;
mod map_obj;
mod module_obj;
mod string_obj;
mod task_obj;

pub use class_obj::ClassObj;
pub use function_obj::{FunctionKind, FunctionObj};
pub use instance_obj::InstanceObj;
pub use map_obj::MapObj;
pub use module_obj::ModuleObj;
pub use string_obj::StringObj;
pub use task_obj::{Frame, TaskObj};

/// A handle to a heap-allocated object. Stable across collections:
/// sweeping never relocates live objects, it only frees dead slots
/// and returns their indices to the free list for reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcRef(u32);

impl GcRef {
    pub fn index(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    String,
    Map,
    Class,
    Instance,
    Function,
    Task,
    Module,
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::String => "string",
            ObjectKind::Map => "map",
            ObjectKind::Class => "class",
            ObjectKind::Instance => "instance",
            ObjectKind::Function => "function",
            ObjectKind::Task => "task",
            ObjectKind::Module => "module",
        }
    }
}

#[derive(Debug, Clone)]
pub enum HeapObject {
    String(StringObj),
    Map(MapObj),
    Class(ClassObj),
    Instance(InstanceObj),
    Function(FunctionObj),
    Task(TaskObj),
    Module(ModuleObj),
}

impl HeapObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            HeapObject::String(_) => ObjectKind::String,
            HeapObject::Map(_) => ObjectKind::Map,
            HeapObject::Class(_) => ObjectKind::Class,
            HeapObject::Instance(_) => ObjectKind::Instance,
            HeapObject::Function(_) => ObjectKind::Function,
            HeapObject::Task(_) => ObjectKind::Task,
            HeapObject::Module(_) => ObjectKind::Module,
        }
    }

    pub fn approx_size(&self) -> usize {
        match self {
            HeapObject::String(o) => o.approx_size(),
            HeapObject::Map(o) => o.approx_size(),
            HeapObject::Class(o) => o.approx_size(),
            HeapObject::Instance(o) => o.approx_size(),
            HeapObject::Function(o) => o.approx_size(),
            HeapObject::Task(o) => o.approx_size(),
            HeapObject::Module(o) => o.approx_size(),
        }
    }
}

struct Entry {
    mark: bool,
    object: HeapObject,
}

/// The arena. `slots[i]` is `None` for a freed or not-yet-used index;
/// `free_list` holds freed indices so `insert` can reuse them instead
/// of growing `slots` forever.
pub struct Heap {
    slots: Vec<Option<Entry>>,
    free_list: Vec<u32>,
    live_bytes: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live_bytes: 0,
        }
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|e| e.is_some()).count()
    }

    /// Allocates `object` unconditionally. Collection policy (whether
    /// to collect first) is `gc`'s job, not this method's — by the
    /// time this is called the decision has already been made.
    pub fn insert(&mut self, object: HeapObject) -> GcRef {
        let size = object.approx_size();
        self.live_bytes += size;
        let entry = Entry { mark: false, object };
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx as usize] = Some(entry);
            GcRef(idx)
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Some(entry));
            GcRef(idx)
        }
    }

    fn entry(&self, r: GcRef) -> Option<&Entry> {
        self.slots.get(r.0 as usize).and_then(|e| e.as_ref())
    }

    fn entry_mut(&mut self, r: GcRef) -> Option<&mut Entry> {
        self.slots.get_mut(r.0 as usize).and_then(|e| e.as_mut())
    }

    pub fn kind_of(&self, r: GcRef) -> Option<ObjectKind> {
        self.entry(r).map(|e| e.object.kind())
    }

    pub fn mark(&mut self, r: GcRef) -> bool {
        match self.entry_mut(r) {
            Some(entry) if !entry.mark => {
                entry.mark = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_marked(&self, r: GcRef) -> bool {
        self.entry(r).map(|e| e.mark).unwrap_or(false)
    }

    /// Frees every unmarked slot and clears mark bits on survivors.
    /// Returns the number of objects reclaimed.
    pub fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if let Some(entry) = slot {
                if entry.mark {
                    entry.mark = false;
                } else {
                    self.live_bytes -= entry.object.approx_size();
                    *slot = None;
                    self.free_list.push(idx as u32);
                    freed += 1;
                }
            }
        }
        freed
    }

    pub fn get(&self, r: GcRef) -> Option<&HeapObject> {
        self.entry(r).map(|e| &e.object)
    }

    pub fn as_string(&self, r: GcRef) -> Option<&StringObj> {
        match &self.entry(r)?.object {
            HeapObject::String(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_string_mut(&mut self, r: GcRef) -> Option<&mut StringObj> {
        match &mut self.entry_mut(r)?.object {
            HeapObject::String(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_map(&self, r: GcRef) -> Option<&MapObj> {
        match &self.entry(r)?.object {
            HeapObject::Map(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self, r: GcRef) -> Option<&mut MapObj> {
        match &mut self.entry_mut(r)?.object {
            HeapObject::Map(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_class(&self, r: GcRef) -> Option<&ClassObj> {
        match &self.entry(r)?.object {
            HeapObject::Class(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_class_mut(&mut self, r: GcRef) -> Option<&mut ClassObj> {
        match &mut self.entry_mut(r)?.object {
            HeapObject::Class(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_instance(&self, r: GcRef) -> Option<&InstanceObj> {
        match &self.entry(r)?.object {
            HeapObject::Instance(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_instance_mut(&mut self, r: GcRef) -> Option<&mut InstanceObj> {
        match &mut self.entry_mut(r)?.object {
            HeapObject::Instance(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_function(&self, r: GcRef) -> Option<&FunctionObj> {
        match &self.entry(r)?.object {
            HeapObject::Function(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self, r: GcRef) -> Option<&mut FunctionObj> {
        match &mut self.entry_mut(r)?.object {
            HeapObject::Function(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_task(&self, r: GcRef) -> Option<&TaskObj> {
        match &self.entry(r)?.object {
            HeapObject::Task(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_task_mut(&mut self, r: GcRef) -> Option<&mut TaskObj> {
        match &mut self.entry_mut(r)?.object {
            HeapObject::Task(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_module(&self, r: GcRef) -> Option<&ModuleObj> {
        match &self.entry(r)?.object {
            HeapObject::Module(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_module_mut(&mut self, r: GcRef) -> Option<&mut ModuleObj> {
        match &mut self.entry_mut(r)?.object {
            HeapObject::Module(o) => Some(o),
            _ => None,
        }
    }

    /// Runs `f` with the map at `r` temporarily removed from the
    /// arena, so `f` can take `&Heap` (for hashing/equality of keys
    /// that may themselves be heap strings) while still holding a
    /// `&mut MapObj`. Legal only because the VM is single-threaded and
    /// non-reentrant (spec §5): nothing else can observe the map's
    /// slot standing empty for the duration of the call.
    pub fn with_map_mut<R>(&mut self, r: GcRef, f: impl FnOnce(&mut MapObj, &Heap) -> R) -> Option<R> {
        let entry = self.slots.get_mut(r.0 as usize)?.take()?;
        let mark = entry.mark;
        let mut object = entry.object;
        let size_before = object.approx_size();
        let result = match &mut object {
            HeapObject::Map(m) => Some(f(m, self)),
            _ => None,
        };
        let size_after = object.approx_size();
        self.slots[r.0 as usize] = Some(Entry { mark, object });
        self.live_bytes = self.live_bytes + size_after - size_before;
        result
    }
}
