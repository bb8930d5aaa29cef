//! # Wisp VM heap
//!
//! A managed heap and mark–compact garbage collector for a small bytecode interpreter.
//!
//! Every heap-allocated value — strings, closures, classes, instances, bound methods,
//! upvalues, native functions — lives in a fixed-capacity [`heap::Heap`] arena and is
//! addressed by an arena-relative [`value::ObjRef`] rather than a raw pointer. When the
//! arena's allocation threshold is crossed, [`vm::Vm::collect_garbage`] runs a four-phase
//! mark–compact cycle (mark, compute addresses, rewrite pointers, slide) that reclaims dead
//! objects and compacts survivors toward the low end of the arena, keeping the bump
//! allocator simple and fragmentation-free.
//!
//! ## Architecture
//!
//! - [`heap`] — the arena, bump allocation, and the collection-trigger policy.
//! - [`object`] — the uniform object header and one submodule per heap object variant.
//! - [`table`] — the open-addressing hash table used for globals, methods, fields, and
//!   string interning.
//! - [`collector`] — the mark–compact cycle itself.
//! - [`vm`] — the context object that owns the root set (stack, call frames, open
//!   upvalues, globals, intern set) the collector walks.
//! - [`value`] — the tagged `Value` and `ObjRef` types threaded through everything above.
//! - [`error`] — the `VmError` enum and `VmResult` alias.
//!
//! ## Example
//!
//! ```rust
//! use wisp_vm::vm::{Vm, VmConfig};
//! use wisp_vm::value::Value;
//!
//! # fn example() -> wisp_vm::error::VmResult<()> {
//! let mut vm = Vm::new(VmConfig::default())?;
//! let name = vm.intern_copy("pi")?;
//! vm.define_global(name, Value::Number(3.1415));
//! assert_eq!(vm.get_global(name), Some(Value::Number(3.1415)));
//! # Ok(())
//! # }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

extern crate std;

/// The mark–compact collector.
pub mod collector;
/// `VmError` and `VmResult`.
pub mod error;
/// The object arena, bump allocator, and collection-trigger policy.
pub mod heap;
/// Heap object headers and per-kind payloads.
pub mod object;
/// The open-addressing hash table backing globals, methods, fields, and string interning.
pub mod table;
/// Tagged runtime values and arena-relative object references.
pub mod value;
/// The interpreter context the collector takes exclusive access to.
pub mod vm;

pub use collector::CompilerRoots;
pub use error::{VmError, VmResult};
pub use heap::{Heap, HeapConfig};
pub use value::{ObjRef, Value};
pub use vm::{CallFrame, Vm, VmConfig};
