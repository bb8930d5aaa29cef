//! Bound method object.

use crate::value::{ObjRef, Value};

#[derive(Debug, Clone)]
pub struct BoundMethodObj {
    pub receiver: Value,
    pub method: ObjRef,
}

impl BoundMethodObj {
    pub fn new(receiver: Value, method: ObjRef) -> Self {
        BoundMethodObj { receiver, method }
    }
}
