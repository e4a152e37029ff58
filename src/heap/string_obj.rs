//! Heap string object (spec §3): immutable, content-hashed, not interned
//! in the general heap (only the dispatch-table key space interns by
//! signature — see `vm::Vm`).

use crate::value::fnv1a_hash;

#[derive(Debug, Clone)]
pub struct StringObj {
    pub value: String,
    pub hash: u32,
}

impl StringObj {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let hash = fnv1a_hash(value.as_bytes());
        Self { value, hash }
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.value.capacity()
    }
}
