//! Heap module object (spec §3, §4.4): the result of loading a `.omf`
//! file — its constant pool, its global slots, and the exported
//! functions/classes other modules and the embedding host can look up
//! by name.

use std::collections::HashMap;

use crate::heap::GcRef;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct ModuleObj {
    pub name: String,
    pub constants: Vec<Value>,
    pub globals: Vec<Value>,
    pub functions: HashMap<String, GcRef>,
    pub classes: HashMap<String, GcRef>,
}

impl ModuleObj {
    pub fn new(name: impl Into<String>, constants: Vec<Value>, global_count: usize) -> Self {
        Self {
            name: name.into(),
            constants,
            globals: vec![Value::Nil; global_count],
            functions: HashMap::new(),
            classes: HashMap::new(),
        }
    }

    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.name.capacity()
            + self.constants.capacity() * std::mem::size_of::<Value>()
            + self.globals.capacity() * std::mem::size_of::<Value>()
    }
}
