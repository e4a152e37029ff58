//! Heap class object (spec §3, §4.3): a template for instances, not an
//! instance itself. Carries optional constructor/destructor functions
//! resolved at load time or left to late binding via `init_sym`.

use crate::value::Value;

#[derive(Debug, Clone)]
pub struct ClassObj {
    pub name: String,
    pub field_count: usize,
    pub ctor: Option<Value>,
    pub dtor: Option<Value>,
}

impl ClassObj {
    pub fn new(name: impl Into<String>, field_count: usize) -> Self {
        Self {
            name: name.into(),
            field_count,
            ctor: None,
            dtor: None,
        }
    }

    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.name.capacity()
    }
}
