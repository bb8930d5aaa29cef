//! Hash table with tombstones.
//!
//! Keys are always `ObjRef`s pointing at interned `StringObj`s and are compared by pointer
//! identity — content comparison only ever happens in [`Table::find_string`], which is the
//! one place callers don't already hold a canonical key.
//!
//! Hand-rolled rather than built on a `std`/`hashbrown` map: the exact tombstone-slot
//! encoding and probe sequence below are load-bearing for the collector's pruning and
//! rewrite passes, not an implementation detail free to delegate to a library.

use crate::heap::Heap;
use crate::value::{ObjRef, Value};

const MAX_LOAD_FACTOR: f64 = 0.75;
const INITIAL_CAPACITY: usize = 8;
const GROWTH_FACTOR: usize = 2;

/// One slot: empty is `(None, Nil)`, tombstone is `(None, Bool(true))`.
#[derive(Debug, Clone, Copy)]
struct Entry {
    key: Option<ObjRef>,
    value: Value,
}

impl Entry {
    const fn empty() -> Self {
        Entry {
            key: None,
            value: Value::Nil,
        }
    }

    fn is_empty(&self) -> bool {
        self.key.is_none() && matches!(self.value, Value::Nil)
    }

    fn is_tombstone(&self) -> bool {
        self.key.is_none() && matches!(self.value, Value::Bool(true))
    }
}

/// An open-addressing, string-keyed table with tombstones. Used for globals, per-class
/// methods, per-instance fields, and the string intern set.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: Vec<Entry>,
    /// Live entry count. Tombstones do not count.
    count: usize,
}

impl Table {
    /// A table with no backing array yet — "initial capacity is signalled by
    /// `capacity_mask == -1`".
    pub fn new() -> Self {
        Table {
            entries: Vec::new(),
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Linear probing from `hash & mask`, returning the index of the slot that already
    /// holds `key`, the first tombstone seen before an empty slot, or that empty slot.
    fn find_entry_slot(entries: &[Entry], hash: u32, key: ObjRef) -> usize {
        let mask = entries.len() - 1;
        let mut index = (hash as usize) & mask;
        let mut tombstone: Option<usize> = None;
        loop {
            let entry = &entries[index];
            if entry.is_empty() {
                return tombstone.unwrap_or(index);
            } else if entry.is_tombstone() {
                if tombstone.is_none() {
                    tombstone = Some(index);
                }
            } else if entry.key == Some(key) {
                return index;
            }
            index = (index + 1) & mask;
        }
    }

    fn grow(&mut self, heap: &Heap, new_capacity: usize) {
        let mut new_entries = vec![Entry::empty(); new_capacity];
        let mut new_count = 0;
        for entry in self.entries.iter().filter(|e| e.key.is_some()) {
            let key = entry.key.unwrap();
            // Rehash using the key's own precomputed hash; since keys are interned
            // strings, their hash never changes even as the string moves.
            let hash = key_hash(heap, key);
            let slot = Self::find_entry_slot(&new_entries, hash, key);
            new_entries[slot] = *entry;
            new_count += 1;
        }
        self.entries = new_entries;
        self.count = new_count;
    }

    /// Grows first if `count + 1` would exceed the load factor, then inserts. Returns
    /// whether `key` was new.
    pub fn set(&mut self, heap: &Heap, key: ObjRef, value: Value) -> bool {
        if self.entries.is_empty() {
            self.entries = vec![Entry::empty(); INITIAL_CAPACITY];
        } else if (self.count + 1) as f64 > self.capacity() as f64 * MAX_LOAD_FACTOR {
            self.grow(heap, self.capacity() * GROWTH_FACTOR);
        }
        let hash = key_hash(heap, key);
        let slot = Self::find_entry_slot(&self.entries, hash, key);
        let entry = &mut self.entries[slot];
        let is_new_key = entry.key.is_none();
        if is_new_key && entry.is_empty() {
            self.count += 1;
        }
        entry.key = Some(key);
        entry.value = value;
        is_new_key
    }

    /// Returns `None` on an empty table or absent key.
    pub fn get(&self, heap: &Heap, key: ObjRef) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        let hash = key_hash(heap, key);
        let slot = Self::find_entry_slot(&self.entries, hash, key);
        let entry = &self.entries[slot];
        if entry.key == Some(key) {
            Some(entry.value)
        } else {
            None
        }
    }

    /// Installs a tombstone; `false` if the key was absent.
    pub fn delete(&mut self, heap: &Heap, key: ObjRef) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let hash = key_hash(heap, key);
        let slot = Self::find_entry_slot(&self.entries, hash, key);
        let entry = &mut self.entries[slot];
        if entry.key != Some(key) {
            return false;
        }
        entry.key = None;
        entry.value = Value::Bool(true);
        true
    }

    /// Copies every live entry from `self` into `dst`.
    pub fn add_all(&self, heap: &Heap, dst: &mut Table) {
        for entry in self.entries.iter().filter(|e| e.key.is_some()) {
            dst.set(heap, entry.key.unwrap(), entry.value);
        }
    }

    /// Probes by raw hash and compares by `(length, hash, bytes)` — the only place string
    /// content is compared rather than pointer identity.
    pub fn find_string(&self, heap: &Heap, chars: &str, hash: u32) -> Option<ObjRef> {
        if self.entries.is_empty() {
            return None;
        }
        let mask = self.entries.len() - 1;
        let mut index = (hash as usize) & mask;
        loop {
            let entry = &self.entries[index];
            if entry.is_empty() {
                return None;
            }
            if let Some(key) = entry.key {
                let candidate = heap
                    .get(key)
                    .data
                    .as_string()
                    .expect("intern-set keys are always strings");
                if candidate.len() == chars.len()
                    && candidate.hash == hash
                    && candidate.as_str() == chars
                {
                    return Some(key);
                }
            }
            index = (index + 1) & mask;
        }
    }

    /// Pushes every key and object-typed value onto the gray worklist.
    pub fn trace(&self, gray: &mut Vec<ObjRef>) {
        for entry in self.entries.iter().filter(|e| e.key.is_some()) {
            gray.push(entry.key.unwrap());
            if let Value::Obj(r) = entry.value {
                gray.push(r);
            }
        }
    }

    /// Deletes every entry whose key is unreachable after a mark pass.
    pub fn remove_unreachable_keys(&mut self, heap: &Heap) {
        for entry in self.entries.iter_mut() {
            if let Some(key) = entry.key {
                if !heap.get(key).header.mark.is_live() {
                    entry.key = None;
                    entry.value = Value::Bool(true);
                }
            }
        }
    }

    /// Rewrites every key and object-typed value to its post-compaction address.
    pub fn update_pointers(&mut self, resolve: &impl Fn(ObjRef) -> ObjRef) {
        for entry in self.entries.iter_mut() {
            if let Some(key) = &mut entry.key {
                *key = resolve(*key);
            }
            if let Value::Obj(r) = &mut entry.value {
                *r = resolve(*r);
            }
        }
    }

    #[cfg(test)]
    fn capacity_for_test(&self) -> usize {
        self.capacity()
    }
}

fn key_hash(heap: &Heap, key: ObjRef) -> u32 {
    heap.get(key)
        .data
        .as_string()
        .expect("table keys are always interned strings")
        .hash
}
