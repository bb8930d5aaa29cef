//! Class object.

use crate::table::Table;
use crate::value::ObjRef;

#[derive(Debug, Clone)]
pub struct ClassObj {
    pub name: ObjRef,
    pub methods: Table,
}

impl ClassObj {
    pub fn new(name: ObjRef) -> Self {
        ClassObj {
            name,
            methods: Table::new(),
        }
    }
}
