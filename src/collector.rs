//! Mark–compact collector.
//!
//! Four phases, run to completion with exclusive `&mut Vm` access and no intervening
//! allocation:
//!
//! - **M** — mark every root, then drain an explicit gray worklist to a fixpoint instead of
//!   rescanning the heap repeatedly.
//! - **A** — walk the arena in address order, assigning each live object its
//!   post-compaction [`crate::value::ObjRef`], and snapshot the old→new mapping into a
//!   plain forwarding table so Phase U never needs two live borrows of the same heap.
//! - **U** — rewrite every root and intra-heap edge through the forwarding table.
//! - **S** — slide live objects down to their assigned addresses and clear their marks.
//!
//! Three historical bugs in the source this crate is grounded on are fixed here by
//! construction: the open-upvalue list's node `next` pointers and the `open_upvalues` head
//! are both rewritten in Phase U (not a copy of a loop variable); compiler roots are
//! rewritten in Phase U symmetrically with being marked in Phase M; and `Function`'s
//! constant array is walked for object-typed constants in both M and U.

use crate::object::Mark;
use crate::value::{ObjRef, Value};
use crate::vm::Vm;

/// An external capability that walks whatever the compiler is partially constructing when
/// a collection interrupts it.
pub trait CompilerRoots: std::fmt::Debug {
    /// Appends every `ObjRef` the compiler's in-progress state references.
    fn mark_roots(&self, discovered: &mut Vec<ObjRef>);

    /// Rewrites every `ObjRef` the compiler's in-progress state references using `resolve`.
    fn update_roots(&mut self, resolve: &dyn Fn(ObjRef) -> ObjRef);
}

/// `forwarding[old.index()]` is the post-compaction address of `old`, or `None` if `old`
/// did not survive Phase M. Built once by Phase A; consulted read-only throughout Phase U
/// so no rewrite ever needs a second live borrow of the heap it is mutating.
type Forwarding = Vec<Option<ObjRef>>;

impl Vm {
    /// Runs one full mark–compact cycle.
    pub fn collect_garbage(&mut self) {
        let debug = self.heap.debug_log_gc();
        if debug {
            log::debug!(
                "gc begin: bytes_allocated={}, next_gc={}",
                self.heap.bytes_allocated(),
                self.heap.next_gc()
            );
        }

        let mut worklist = self.mark_roots();
        self.trace_references(&mut worklist);
        if debug {
            log::trace!("gc mark: fixpoint reached");
        }

        // Phase boundary: intern-set pruning must happen strictly after Phase M and
        // before Phase A, or canonical strings could move while the intern
        // set still keys the pre-compaction address.
        self.intern.remove_unreachable_keys(&self.heap);

        let (forwarding, live_size) = self.compute_addresses();
        if debug {
            log::trace!(
                "gc compute-addresses: {} objects survive, {live_size} bytes",
                forwarding.iter().filter(|f| f.is_some()).count()
            );
        }

        self.rewrite_pointers(&forwarding);
        if debug {
            log::trace!("gc pointer-rewrite: done");
        }

        self.slide(&forwarding, live_size);
        if debug {
            log::debug!(
                "gc end: bytes_allocated={}, next_gc={}",
                self.heap.bytes_allocated(),
                self.heap.next_gc()
            );
        }
    }

    // ---- Phase M -------------------------------------------------------------------------

    fn mark_roots(&mut self) -> Vec<ObjRef> {
        let mut worklist = Vec::new();

        for value in self.stack.iter() {
            if let Value::Obj(r) = value {
                self.heap.mark(*r, &mut worklist);
            }
        }

        for frame in self.frames.iter() {
            self.heap.mark(frame.closure, &mut worklist);
        }

        // Every node of the open-upvalue list is a root, not merely its head.
        let mut cursor = self.open_upvalues;
        while let Some(node) = cursor {
            self.heap.mark(node, &mut worklist);
            cursor = self
                .heap
                .get(node)
                .data
                .as_upvalue()
                .expect("open_upvalues list must only contain Upvalue objects")
                .next;
        }

        let mut discovered = Vec::new();
        self.globals.trace(&mut discovered);
        for r in discovered {
            self.heap.mark(r, &mut worklist);
        }

        self.heap.mark(self.init_string, &mut worklist);

        if let Some(compiler_roots) = &self.compiler_roots {
            let mut discovered = Vec::new();
            compiler_roots.mark_roots(&mut discovered);
            for r in discovered {
                self.heap.mark(r, &mut worklist);
            }
        }

        worklist
    }

    fn trace_references(&mut self, worklist: &mut Vec<ObjRef>) {
        while let Some(r) = worklist.pop() {
            let mut discovered = Vec::new();
            self.heap.get(r).trace(&mut discovered);
            for edge in discovered {
                self.heap.mark(edge, worklist);
            }
        }
    }

    // ---- Phase A -------------------------------------------------------------------------

    /// Returns the old→new forwarding table and the total live size in notional bytes.
    fn compute_addresses(&mut self) -> (Forwarding, usize) {
        let mut forwarding = vec![None; self.heap.len()];
        let mut to_index = 0usize;
        let mut live_size = 0usize;
        for i in 0..self.heap.len() {
            let r = ObjRef::new(i);
            if self.heap.get(r).header.mark == Mark::Gray {
                let size = self.heap.get(r).size_of();
                let target = ObjRef::new(to_index);
                self.heap.get_mut(r).header.mark = Mark::Forwarded(target);
                forwarding[i] = Some(target);
                to_index += 1;
                live_size += size;
            }
        }
        (forwarding, live_size)
    }

    // ---- Phase U -------------------------------------------------------------------------

    fn rewrite_pointers(&mut self, forwarding: &Forwarding) {
        let resolve = |r: ObjRef| {
            forwarding[r.index()]
                .expect("rewritten reference must point to a live, forwarded object")
        };

        for value in self.stack.iter_mut() {
            if let Value::Obj(r) = value {
                *r = resolve(*r);
            }
        }

        for frame in self.frames.iter_mut() {
            frame.closure = resolve(frame.closure);
        }

        self.rewrite_open_upvalues(&resolve);

        self.globals.update_pointers(&resolve);
        self.init_string = resolve(self.init_string);

        if let Some(compiler_roots) = &mut self.compiler_roots {
            compiler_roots.update_roots(&resolve);
        }

        // Intra-heap edges: every live object's own referenced ObjRefs.
        for i in 0..self.heap.len() {
            if forwarding[i].is_some() {
                self.heap.get_mut(ObjRef::new(i)).rewrite_edges(&resolve);
            }
        }
    }

    /// Rewrites the `open_upvalues` head and every node's `next` field.
    fn rewrite_open_upvalues(&mut self, resolve: &impl Fn(ObjRef) -> ObjRef) {
        let original_head = self.open_upvalues;
        if let Some(head) = original_head {
            self.open_upvalues = Some(resolve(head));
        }

        // Walk the *original* chain: objects haven't physically moved yet (Phase U
        // precedes Phase S), so old addresses are still valid for traversal even though
        // their headers now carry a `Forwarded` mark.
        let mut cursor = original_head;
        while let Some(node) = cursor {
            let original_next = self
                .heap
                .get(node)
                .data
                .as_upvalue()
                .expect("open_upvalues list must only contain Upvalue objects")
                .next;
            self.heap
                .get_mut(node)
                .data
                .as_upvalue_mut()
                .expect("open_upvalues list must only contain Upvalue objects")
                .rewrite(resolve);
            cursor = original_next;
        }
    }

    // ---- Phase S -------------------------------------------------------------------------

    fn slide(&mut self, forwarding: &Forwarding, live_size: usize) {
        let old_objects = self.heap.take_all();
        let mut new_objects = Vec::with_capacity(forwarding.iter().filter(|f| f.is_some()).count());
        for (i, mut obj) in old_objects.into_iter().enumerate() {
            if forwarding[i].is_some() {
                obj.header.mark = Mark::Unmarked;
                new_objects.push(obj);
            }
        }
        self.heap.replace_after_slide(new_objects, live_size);
    }
}
