//! The tagged `Value` union (spec §3, §4.3).

use std::fmt;

use crate::heap::{Heap, GcRef};

/// A dynamically-typed Orbit value. Exactly one of the four shapes is
/// ever active; `Object` carries a handle into the heap arena rather
/// than a raw pointer (spec §9: "best encoded as indices into an
/// owning buffer rather than raw pointers" — the same reasoning the
/// spec applies to the value stack applies to the heap arena here).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Object(GcRef),
}

impl Value {
    /// `false` and `nil` are falsy; everything else, including `0.0`
    /// and the empty string, is truthy (spec §4.3).
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<GcRef> {
        match self {
            Value::Object(r) => Some(*r),
            _ => None,
        }
    }

    pub fn type_name(&self, heap: &Heap) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Object(r) => heap.kind_of(*r).map(|k| k.name()).unwrap_or("object"),
        }
    }
}

/// FNV-1a over raw bytes, 32-bit variant (spec §3, §4.3).
pub fn fnv1a_hash(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Hash a double as the XOR of the two 32-bit halves of its bit
/// pattern (spec §3, §4.3). Bit-equal doubles (including identical
/// NaN payloads) always hash equal; this is the only guarantee the
/// spec asks for.
pub fn hash_double(value: f64) -> u32 {
    let bits = value.to_bits();
    (bits as u32) ^ ((bits >> 32) as u32)
}

/// Spreads a `GcRef`'s index across 32 bits so that reference-identity
/// hashing doesn't cluster small indices into the same map bucket.
fn hash_gcref(r: GcRef) -> u32 {
    r.index().wrapping_mul(0x9E37_79B1)
}

/// Hash of a `Value`, given the heap it may point into. Content-hashed
/// for numbers and strings (so that equal strings/numbers always land
/// in the same map bucket, per spec §3); everything else hashes by
/// reference identity.
pub fn value_hash(value: &Value, heap: &Heap) -> u32 {
    match value {
        Value::Nil => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(n) => hash_double(*n),
        Value::Object(r) => match heap.as_string(*r) {
            Some(s) => s.hash,
            None => hash_gcref(*r),
        },
    }
}

/// Value equality (spec §3, §4.3): tag first, then content. Strings
/// compare by content (no interning is guaranteed in the general
/// heap); every other object kind compares by reference identity.
/// Numbers use ordinary `==` here (not bit equality) — hashing and
/// equality are intentionally allowed to disagree for NaN, same as
/// IEEE-754 float semantics everywhere else in the language.
pub fn value_eq(a: &Value, b: &Value, heap: &Heap) -> bool {
    match (a, b) {
        (Value::Nil, Value::Nil) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => {
            if x == y {
                return true;
            }
            match (heap.as_string(*x), heap.as_string(*y)) {
                (Some(sx), Some(sy)) => sx.value == sy.value,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Debug-friendly rendering used by `debug_prt` and diagnostics; never
/// allocates on the heap itself.
pub fn display_value(value: &Value, heap: &Heap) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(r) => heap
            .as_string(*r)
            .map(|s| s.value.clone())
            .unwrap_or_else(|| format!("<{} #{}>", value.type_name(heap), r.index())),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Object(r) => write!(f, "<object #{}>", r.index()),
        }
    }
}
