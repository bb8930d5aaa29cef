//! Instance object.

use crate::table::Table;
use crate::value::ObjRef;

#[derive(Debug, Clone)]
pub struct InstanceObj {
    pub class: ObjRef,
    pub fields: Table,
}

impl InstanceObj {
    pub fn new(class: ObjRef) -> Self {
        InstanceObj {
            class,
            fields: Table::new(),
        }
    }
}
