//! Native (host-provided) function object.

use crate::value::Value;

/// A host routine callable from the hosted language. Takes no heap edges: the function
/// pointer is 'static and the arguments are passed by value.
pub type NativeFn = fn(&[Value]) -> Value;

#[derive(Clone, Copy)]
pub struct NativeObj {
    pub arity: u8,
    pub function: NativeFn,
}

impl NativeObj {
    pub fn new(arity: u8, function: NativeFn) -> Self {
        NativeObj { arity, function }
    }
}

impl std::fmt::Debug for NativeObj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeObj")
            .field("arity", &self.arity)
            .field("function", &(self.function as usize))
            .finish()
    }
}
