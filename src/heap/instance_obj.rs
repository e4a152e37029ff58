//! Heap instance object (spec §3, §4.3): a class handle plus a fixed
//! number of field slots sized at construction time from the class's
//! declared field count.

use crate::heap::GcRef;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct InstanceObj {
    pub class: GcRef,
    pub fields: Vec<Value>,
}

impl InstanceObj {
    pub fn new(class: GcRef, field_count: usize) -> Self {
        Self {
            class,
            fields: vec![Value::Nil; field_count],
        }
    }

    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.fields.capacity() * std::mem::size_of::<Value>()
    }
}
