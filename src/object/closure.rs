//! Closure object.

use crate::value::ObjRef;

/// A function paired with its captured upvalues. `upvalues` stands in for a flexible
/// trailing array; its length is fixed at construction (`upvalue_count`) and never mutated
/// afterward, which is what lets `size_of` stay a pure function of allocation-time state.
#[derive(Debug, Clone)]
pub struct ClosureObj {
    pub function: ObjRef,
    pub upvalues: Vec<ObjRef>,
}

impl ClosureObj {
    pub fn new(function: ObjRef, upvalues: Vec<ObjRef>) -> Self {
        ClosureObj { function, upvalues }
    }
}
