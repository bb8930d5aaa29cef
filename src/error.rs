//! Error types for the Wisp VM heap and collector.
//!
//! Mirrors the error-module idiom of a single `thiserror`-derived enum with named fields,
//! trimmed to the conditions this crate's core can actually raise: the collector itself
//! never returns an error, it asserts invariants; only the allocation path and the
//! convenience VM-context wrappers are fallible.

use thiserror::Error;

/// Errors raised by the managed heap, the collector, and the VM context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// The arena could not satisfy a request even after the most recent collection.
    #[error("Out of memory: requested {requested} slots, capacity {capacity}")]
    OutOfMemory { requested: usize, capacity: usize },

    /// A `pop`/`peek` was attempted against an empty or too-shallow value stack.
    #[error(
        "Stack underflow: attempted to access {requested} items, but only {available} available"
    )]
    StackUnderflow { requested: usize, available: usize },

    /// A global lookup or assignment referenced a name that was never defined.
    #[error("Undefined global variable '{name}'")]
    InvalidGlobal { name: String },

    /// A call-frame stack operation was attempted with no active frame.
    #[error("No active call frame")]
    NoActiveFrame,
}

/// Convenience alias used throughout the crate.
pub type VmResult<T> = Result<T, VmError>;
