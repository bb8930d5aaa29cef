//! The VM context object the collector takes exclusive access to (component C6).
//!
//! `Vm` owns everything a collection needs to find every root: the evaluation stack, call
//! frames, the open-upvalue list, globals, the string intern set, the permanent `init`
//! string, and (optionally) a compiler mid-parse. There is exactly one allocation primitive,
//! [`Vm::alloc`]; every constructor below funnels through it so the trigger-then-install
//! protocol (run a collection if due, *then* install) is never duplicated or forgotten.

use crate::collector::CompilerRoots;
use crate::error::{VmError, VmResult};
use crate::heap::{Heap, HeapConfig};
use crate::object::{
    BoundMethodObj, ClassObj, ClosureObj, FunctionObj, InstanceObj, NativeFn, NativeObj,
    ObjectData, StringObj,
};
use crate::table::Table;
use crate::value::{ObjRef, Value};

/// One call's worth of bookkeeping on the call stack.
#[derive(Debug, Clone, Copy)]
pub struct CallFrame {
    pub closure: ObjRef,
    pub ip: usize,
    pub slot_base: usize,
}

/// Top-level knobs a caller passes to [`Vm::new`]; wraps [`HeapConfig`] so a future knob
/// that isn't heap-specific has somewhere to live without disturbing `HeapConfig` itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct VmConfig {
    pub heap: HeapConfig,
}

/// The interpreter's full mutable state.
#[derive(Debug)]
pub struct Vm {
    pub(crate) heap: Heap,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<CallFrame>,
    /// Head of the singly-linked open-upvalue list, ordered by descending stack slot
    /// (lowest slot deepest, matching how closures are expected to find an existing open
    /// upvalue before creating a new one).
    pub(crate) open_upvalues: Option<ObjRef>,
    pub(crate) globals: Table,
    /// Canonical string interning: `StringObj` content maps to a single `ObjRef`.
    pub(crate) intern: Table,
    /// The permanent `"init"` string, allocated once at startup so initializer-method
    /// lookup never needs to re-intern it.
    pub(crate) init_string: ObjRef,
    pub(crate) compiler_roots: Option<Box<dyn CompilerRoots>>,
}

impl Vm {
    /// Boots a fresh interpreter. Interning `"init"` is the very first allocation so every
    /// later lookup can assume `init_string` is already resolved.
    pub fn new(config: VmConfig) -> VmResult<Self> {
        let mut heap = Heap::new(config.heap);
        let capacity = heap.capacity();
        let init_string = heap
            .try_install(ObjectData::String(StringObj::new("init".to_string())))
            .ok_or(VmError::OutOfMemory {
                requested: 1,
                capacity,
            })?;

        Ok(Vm {
            heap,
            stack: Vec::new(),
            frames: Vec::new(),
            open_upvalues: None,
            globals: Table::new(),
            intern: Table::new(),
            init_string,
            compiler_roots: None,
        })
    }

    pub fn set_compiler_roots(&mut self, roots: Box<dyn CompilerRoots>) {
        self.compiler_roots = Some(roots);
    }

    pub fn clear_compiler_roots(&mut self) {
        self.compiler_roots = None;
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    // ---- Allocation --------------------------------------------------------------------

    /// The one path every object reaches the heap through: collect if due, then install.
    /// `VmError::OutOfMemory` means the arena is still full immediately after a collection.
    ///
    /// Every `ObjRef` embedded in `data` must already be reachable from some existing root
    /// (typically still sitting on the value stack) at the moment this is called: a
    /// collection triggered here sees only the roots `Vm` already owns, not the `data`
    /// value passed in, so an `ObjRef` whose only reference is this not-yet-installed
    /// payload would be left dangling by a compaction this very call causes.
    pub fn alloc(&mut self, data: ObjectData) -> VmResult<ObjRef> {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.heap.try_install(data).ok_or(VmError::OutOfMemory {
            requested: 1,
            capacity: self.heap.capacity(),
        })
    }

    pub fn new_function(&mut self, function: FunctionObj) -> VmResult<ObjRef> {
        self.alloc(ObjectData::Function(function))
    }

    pub fn new_closure(&mut self, closure: ClosureObj) -> VmResult<ObjRef> {
        self.alloc(ObjectData::Closure(closure))
    }

    pub fn new_class(&mut self, name: ObjRef) -> VmResult<ObjRef> {
        self.alloc(ObjectData::Class(ClassObj::new(name)))
    }

    pub fn new_instance(&mut self, class: ObjRef) -> VmResult<ObjRef> {
        self.alloc(ObjectData::Instance(InstanceObj::new(class)))
    }

    pub fn new_native(&mut self, arity: u8, function: NativeFn) -> VmResult<ObjRef> {
        self.alloc(ObjectData::Native(NativeObj::new(arity, function)))
    }

    pub fn new_bound_method(&mut self, receiver: Value, method: ObjRef) -> VmResult<ObjRef> {
        self.alloc(ObjectData::BoundMethod(BoundMethodObj { receiver, method }))
    }

    /// Interns a borrowed string, copying only if no canonical copy already exists.
    ///
    /// Follows the publish-before-trigger protocol: the freshly allocated `StringObj` is
    /// pushed onto the value stack *before* it is linked into the intern table, so that if
    /// installing it is itself the allocation that crosses the GC threshold, the string
    /// being interned is already a root and survives its own triggering collection.
    pub fn intern_copy(&mut self, chars: &str) -> VmResult<ObjRef> {
        let hash = crate::object::fnv1a_hash(chars.as_bytes());
        if let Some(existing) = self.intern.find_string(&self.heap, chars, hash) {
            return Ok(existing);
        }
        self.intern_new(StringObj::new(chars.to_string()))
    }

    /// Interns an owned string, taking ownership of its allocation if it turns out to be
    /// new (avoids a copy when the caller already built a fresh `String`).
    pub fn intern_take(&mut self, s: String) -> VmResult<ObjRef> {
        let hash = crate::object::fnv1a_hash(s.as_bytes());
        if let Some(existing) = self.intern.find_string(&self.heap, &s, hash) {
            return Ok(existing);
        }
        self.intern_new(StringObj::new(s))
    }

    fn intern_new(&mut self, string: StringObj) -> VmResult<ObjRef> {
        let r = self.alloc(ObjectData::String(string))?;
        self.push(Value::Obj(r))?;
        self.intern.set(&self.heap, r, Value::Nil);
        self.pop()?;
        Ok(r)
    }

    // ---- Value stack --------------------------------------------------------------------

    pub fn push(&mut self, value: Value) -> VmResult<()> {
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> VmResult<Value> {
        self.stack.pop().ok_or(VmError::StackUnderflow {
            requested: 1,
            available: 0,
        })
    }

    pub fn peek(&self, distance: usize) -> VmResult<Value> {
        let len = self.stack.len();
        if distance >= len {
            return Err(VmError::StackUnderflow {
                requested: distance + 1,
                available: len,
            });
        }
        Ok(self.stack[len - 1 - distance])
    }

    pub fn current_frame(&self) -> VmResult<&CallFrame> {
        self.frames.last().ok_or(VmError::NoActiveFrame)
    }

    pub fn push_frame(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> VmResult<CallFrame> {
        self.frames.pop().ok_or(VmError::NoActiveFrame)
    }

    // ---- Globals ----------------------------------------------------------------------

    pub fn define_global(&mut self, name: ObjRef, value: Value) {
        self.globals.set(&self.heap, name, value);
    }

    pub fn get_global(&self, name: ObjRef) -> Option<Value> {
        self.globals.get(&self.heap, name)
    }

    /// Assigning to an undefined global is an error (implicit declaration is never allowed).
    pub fn set_global(&mut self, name: ObjRef) -> VmResult<()> {
        let value = self.peek(0)?;
        let is_new = self.globals.set(&self.heap, name, value);
        if is_new {
            self.globals.delete(&self.heap, name);
            let label = self
                .heap
                .get(name)
                .data
                .as_string()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default();
            return Err(VmError::InvalidGlobal { name: label });
        }
        Ok(())
    }

    // ---- Upvalues -----------------------------------------------------------------------

    /// Finds an already-open upvalue for `slot`, or creates and links in a new one. The
    /// list is kept ordered by descending slot so both walks can stop early.
    ///
    /// Allocation happens *before* the list is searched for an insertion point: any
    /// `ObjRef` read from the list before a call that can trigger collection would be
    /// left dangling by a compaction that call causes, since plain local variables are not
    /// part of the root set the collector rewrites. The list itself is safe to re-walk
    /// afterward because `open_upvalues` and every node it reaches are roots.
    pub fn open_upvalue(&mut self, slot: usize) -> VmResult<ObjRef> {
        if let Some(existing) = self.find_open_upvalue(slot) {
            return Ok(existing);
        }

        let new_upvalue = self.alloc(ObjectData::Upvalue(crate::object::UpvalueObj::open(
            slot, None,
        )))?;

        let (prev, cursor) = self.find_insertion_point(slot);
        self.heap
            .get_mut(new_upvalue)
            .data
            .as_upvalue_mut()
            .expect("just allocated an Upvalue")
            .next = cursor;
        match prev {
            Some(p) => {
                self.heap
                    .get_mut(p)
                    .data
                    .as_upvalue_mut()
                    .expect("open_upvalues list must only contain Upvalue objects")
                    .next = Some(new_upvalue);
            }
            None => self.open_upvalues = Some(new_upvalue),
        }

        Ok(new_upvalue)
    }

    fn find_open_upvalue(&self, slot: usize) -> Option<ObjRef> {
        let mut cursor = self.open_upvalues;
        while let Some(node) = cursor {
            let upvalue = self
                .heap
                .get(node)
                .data
                .as_upvalue()
                .expect("open_upvalues list must only contain Upvalue objects");
            match upvalue.slot() {
                Some(s) if s == slot => return Some(node),
                Some(s) if s < slot => return None,
                _ => {}
            }
            cursor = upvalue.next;
        }
        None
    }

    /// Returns `(node just before the insertion point, node just after it)`.
    fn find_insertion_point(&self, slot: usize) -> (Option<ObjRef>, Option<ObjRef>) {
        let mut cursor = self.open_upvalues;
        let mut prev = None;
        while let Some(node) = cursor {
            let upvalue = self
                .heap
                .get(node)
                .data
                .as_upvalue()
                .expect("open_upvalues list must only contain Upvalue objects");
            match upvalue.slot() {
                Some(s) if s < slot => break,
                _ => {}
            }
            prev = cursor;
            cursor = upvalue.next;
        }
        (prev, cursor)
    }

    /// Closes every open upvalue at or above `from_slot`, copying the stack value into the
    /// upvalue itself and unlinking it from the open list.
    pub fn close_upvalues(&mut self, from_slot: usize) {
        while let Some(node) = self.open_upvalues {
            let upvalue = self
                .heap
                .get(node)
                .data
                .as_upvalue()
                .expect("open_upvalues list must only contain Upvalue objects");
            let Some(slot) = upvalue.slot() else { break };
            if slot < from_slot {
                break;
            }
            let next = upvalue.next;
            let value = self.stack[slot];
            self.heap
                .get_mut(node)
                .data
                .as_upvalue_mut()
                .expect("open_upvalues list must only contain Upvalue objects")
                .close(value);
            self.open_upvalues = next;
        }
    }

    // ---- Classes and methods ------------------------------------------------------------

    /// `Table::set` needs `&Heap` to hash `name`, which aliases the very `Heap` slot the
    /// target class lives in, so the class's method table is lifted out, mutated against
    /// an unencumbered `&self.heap`, and put back.
    pub fn define_method(&mut self, class: ObjRef, name: ObjRef, method: Value) {
        let mut methods = std::mem::take(
            &mut self
                .heap
                .get_mut(class)
                .data
                .as_class_mut()
                .expect("define_method target must be a Class")
                .methods,
        );
        methods.set(&self.heap, name, method);
        self.heap
            .get_mut(class)
            .data
            .as_class_mut()
            .expect("define_method target must be a Class")
            .methods = methods;
    }

    pub fn bind_method(&mut self, class: ObjRef, name: ObjRef) -> Option<Value> {
        self.heap
            .get(class)
            .data
            .as_class()
            .and_then(|c| c.methods.get(&self.heap, name))
    }

    pub fn get_field(&self, instance: ObjRef, name: ObjRef) -> Option<Value> {
        self.heap
            .get(instance)
            .data
            .as_instance()
            .and_then(|i| i.fields.get(&self.heap, name))
    }

    pub fn set_field(&mut self, instance: ObjRef, name: ObjRef, value: Value) {
        let mut fields = std::mem::take(
            &mut self
                .heap
                .get_mut(instance)
                .data
                .as_instance_mut()
                .expect("set_field target must be an Instance")
                .fields,
        );
        fields.set(&self.heap, name, value);
        self.heap
            .get_mut(instance)
            .data
            .as_instance_mut()
            .expect("set_field target must be an Instance")
            .fields = fields;
    }
}
