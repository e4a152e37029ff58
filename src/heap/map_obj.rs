//! Open-addressed hash map keyed by `Value` (spec §3).
//!
//! Capacity is always a power of two; load factor is kept under
//! [`LOAD_FACTOR_LIMIT`] by rehashing into a doubled table. Probing is
//! linear, which is adequate at the load factor this table tolerates
//! and keeps the implementation a direct match for the spec's
//! description rather than inventing a cleverer scheme.
//!
//! Every operation needs to resolve `Value::Object` handles that
//! refer to strings (for content hashing/equality), but a `MapObj`
//! itself lives inside the same heap arena it needs to read from. The
//! owning `Heap` resolves that by temporarily removing the map from
//! its slot before calling into these methods — see
//! `Heap::with_map_mut`.

use crate::heap::Heap;
use crate::value::{value_eq, value_hash, Value};

const LOAD_FACTOR_LIMIT: f64 = 0.75;
const INITIAL_CAPACITY: usize = 8;

#[derive(Debug, Clone)]
enum Slot {
    Empty,
    Tombstone,
    Occupied(Value, Value),
}

#[derive(Debug, Clone)]
pub struct MapObj {
    slots: Vec<Slot>,
    len: usize, // occupied, excludes tombstones
}

impl Default for MapObj {
    fn default() -> Self {
        Self::new()
    }
}

impl MapObj {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::Empty; INITIAL_CAPACITY],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.slots.capacity() * std::mem::size_of::<Slot>()
    }

    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn find_slot(&self, key: &Value, heap: &Heap) -> (usize, bool) {
        let hash = value_hash(key, heap) as usize;
        let mask = self.mask();
        let mut idx = hash & mask;
        let mut first_tombstone: Option<usize> = None;
        loop {
            match &self.slots[idx] {
                Slot::Empty => {
                    return (first_tombstone.unwrap_or(idx), false);
                }
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(idx);
                    }
                }
                Slot::Occupied(k, _) => {
                    if value_eq(k, key, heap) {
                        return (idx, true);
                    }
                }
            }
            idx = (idx + 1) & mask;
        }
    }

    pub fn get(&self, key: &Value, heap: &Heap) -> Option<Value> {
        let (idx, found) = self.find_slot(key, heap);
        if found {
            match &self.slots[idx] {
                Slot::Occupied(_, v) => Some(*v),
                _ => None,
            }
        } else {
            None
        }
    }

    pub fn contains_key(&self, key: &Value, heap: &Heap) -> bool {
        self.find_slot(key, heap).1
    }

    /// Inserts `key => value`, returning the previous value if any.
    pub fn insert(&mut self, key: Value, value: Value, heap: &Heap) -> Option<Value> {
        if (self.len + 1) as f64 > self.slots.len() as f64 * LOAD_FACTOR_LIMIT {
            self.rehash(self.slots.len() * 2, heap);
        }
        let (idx, found) = self.find_slot(&key, heap);
        let old = match &self.slots[idx] {
            Slot::Occupied(_, v) => Some(*v),
            _ => None,
        };
        if !found {
            self.len += 1;
        }
        self.slots[idx] = Slot::Occupied(key, value);
        old
    }

    pub fn remove(&mut self, key: &Value, heap: &Heap) -> Option<Value> {
        let (idx, found) = self.find_slot(key, heap);
        if !found {
            return None;
        }
        let old = match std::mem::replace(&mut self.slots[idx], Slot::Tombstone) {
            Slot::Occupied(_, v) => Some(v),
            _ => None,
        };
        self.len -= 1;
        old
    }

    fn rehash(&mut self, new_capacity: usize, heap: &Heap) {
        let new_capacity = new_capacity.max(INITIAL_CAPACITY).next_power_of_two();
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; new_capacity]);
        self.len = 0;
        for slot in old {
            if let Slot::Occupied(k, v) = slot {
                let (idx, _) = self.find_slot(&k, heap);
                self.slots[idx] = Slot::Occupied(k, v);
                self.len += 1;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Occupied(k, v) => Some((k, v)),
            _ => None,
        })
    }
}
