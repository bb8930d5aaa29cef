//! The VM's tagged runtime value and the arena-relative reference type.
//!
//! `ObjRef` stands in for a heap pointer everywhere in this crate: it is an index into
//! [`crate::heap::Heap`]'s object vector, never a raw address. Indices are rewritten in bulk
//! by the collector's pointer-rewrite phase, so no code outside `collector` may assume an
//! `ObjRef` stays valid across a call to `collect_garbage`.

use derive_more::Display;

/// An arena-relative reference to a heap object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display(fmt = "#{}", _0)]
pub struct ObjRef(pub(crate) u32);

impl ObjRef {
    pub(crate) fn new(index: usize) -> Self {
        ObjRef(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A dynamically-typed VM value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Obj(ObjRef),
}

impl Value {
    pub fn is_obj(&self) -> bool {
        matches!(self, Value::Obj(_))
    }

    pub fn as_obj(&self) -> Option<ObjRef> {
        match self {
            Value::Obj(r) => Some(*r),
            _ => None,
        }
    }

    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<ObjRef> for Value {
    fn from(r: ObjRef) -> Self {
        Value::Obj(r)
    }
}
