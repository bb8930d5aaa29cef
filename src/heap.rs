//! Heap arena and bump allocator.
//!
//! `Heap` is a fixed-capacity arena of object slots. Allocation is a bump: a new object is always installed at `next`, which then
//! advances. The arena never frees an object individually; dead slots are only reclaimed in
//! bulk by [`crate::collector`]'s sliding compaction.
//!
//! The collection-trigger *decision* lives here ([`Heap::should_collect`]); the collection
//! itself is orchestrated by [`crate::vm::Vm`], because a mark–compact cycle needs the full
//! root set (stack, frames, globals, open upvalues), which only `Vm` owns.

use crate::object::{HeapObject, Mark, ObjectData, ObjectKind};
use crate::value::ObjRef;

/// Boot-time knobs.
#[derive(Debug, Clone, Copy)]
pub struct HeapConfig {
    /// Maximum number of live+dead object slots the arena will ever hold.
    pub capacity: usize,
    /// The `bytes_allocated` threshold that triggers the
    /// first collection.
    pub initial_next_gc: usize,
    /// Forces a collection on every allocating call.
    pub stress_gc: bool,
    /// Emits `log::debug!` events for allocation and each collector phase.
    pub debug_log_gc: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        HeapConfig {
            capacity: 1 << 16,
            initial_next_gc: 1 << 14,
            stress_gc: false,
            debug_log_gc: false,
        }
    }
}

/// The managed heap: a contiguous arena of object slots plus the bookkeeping that decides
/// when the next collection runs.
#[derive(Debug)]
pub struct Heap {
    objects: Vec<HeapObject>,
    capacity: usize,
    bytes_allocated: usize,
    next_gc: usize,
    stress_gc: bool,
    debug_log_gc: bool,
}

impl Heap {
    pub fn new(config: HeapConfig) -> Self {
        Heap {
            objects: Vec::new(),
            capacity: config.capacity,
            bytes_allocated: 0,
            next_gc: config.initial_next_gc,
            stress_gc: config.stress_gc,
            debug_log_gc: config.debug_log_gc,
        }
    }

    /// The current bump cursor — `objects[0..next)` is the used prefix.
    pub fn next(&self) -> usize {
        self.objects.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn next_gc(&self) -> usize {
        self.next_gc
    }

    pub fn stress_gc(&self) -> bool {
        self.stress_gc
    }

    pub fn debug_log_gc(&self) -> bool {
        self.debug_log_gc
    }

    /// Whether `Vm`'s allocation path should run a collection before installing a new
    /// object.
    pub fn should_collect(&self) -> bool {
        self.stress_gc || self.bytes_allocated > self.next_gc
    }

    pub fn get(&self, r: ObjRef) -> &HeapObject {
        &self.objects[r.index()]
    }

    pub fn get_mut(&mut self, r: ObjRef) -> &mut HeapObject {
        &mut self.objects[r.index()]
    }

    /// Marks `r` gray and pushes it onto the worklist, unless it is already marked. Centralizing every mark through this one call keeps the header's
    /// `mark` field and worklist membership from ever drifting apart.
    pub(crate) fn mark(&mut self, r: ObjRef, worklist: &mut Vec<ObjRef>) {
        let header = &mut self.objects[r.index()].header;
        if header.mark == Mark::Unmarked {
            header.mark = Mark::Gray;
            worklist.push(r);
        }
    }

    pub fn kind_of(&self, r: ObjRef) -> ObjectKind {
        self.objects[r.index()].header.kind
    }

    /// Iterates the arena in address order — the walk every collector phase relies on.
    pub fn iter(&self) -> impl Iterator<Item = (ObjRef, &HeapObject)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, obj)| (ObjRef::new(i), obj))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Installs `data` at the current bump cursor. Returns `None` on
    /// [`crate::error::VmError::OutOfMemory`]-worthy exhaustion; the caller (`Vm::alloc`)
    /// is responsible for having already run a collection if one was due.
    pub(crate) fn try_install(&mut self, data: ObjectData) -> Option<ObjRef> {
        if self.objects.len() >= self.capacity {
            return None;
        }
        let obj = HeapObject::new(data);
        let size = obj.size_of();
        self.objects.push(obj);
        self.bytes_allocated += size;
        Some(ObjRef::new(self.objects.len() - 1))
    }

    /// A lone convenience used by tests and the intern path that don't need the full
    /// publish-before-trigger dance: allocates a string directly without running GC.
    /// Production call sites go through `Vm::intern_copy`/`Vm::intern_take`.
    #[cfg(any(test, doc))]
    pub fn allocate_string(&mut self, s: String) -> Result<ObjRef, crate::error::VmError> {
        use crate::object::StringObj;
        self.try_install(ObjectData::String(StringObj::new(s)))
            .ok_or(crate::error::VmError::OutOfMemory {
                requested: 1,
                capacity: self.capacity,
            })
    }

    /// Hands the whole arena to the caller, leaving an empty one behind. Used only by
    /// Phase S, which consumes the pre-slide arena in address order to build the
    /// post-slide one.
    pub(crate) fn take_all(&mut self) -> Vec<HeapObject> {
        std::mem::take(&mut self.objects)
    }

    /// Replaces the arena's contents with the post-compaction slide result and resets the
    /// bookkeeping counters.
    pub(crate) fn replace_after_slide(&mut self, live_objects: Vec<HeapObject>, live_size: usize) {
        self.objects = live_objects;
        self.bytes_allocated = live_size;
        self.next_gc = live_size * 2;
    }
}
