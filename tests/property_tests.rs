//! Property-based tests for the heap, the intern set, and the value stack.
//!
//! These use proptest to verify:
//! - push/pop/peek roundtrips over arbitrary `Value`s
//! - interning never produces two distinct refs for equal string content
//! - FNV-1a hashing is deterministic and content-sensitive

use proptest::prelude::*;
use wisp_vm::heap::HeapConfig;
use wisp_vm::object::fnv1a_hash;
use wisp_vm::value::Value;
use wisp_vm::vm::{Vm, VmConfig};

fn vm_with_capacity(capacity: usize) -> Vm {
    Vm::new(VmConfig {
        heap: HeapConfig {
            capacity,
            ..HeapConfig::default()
        },
    })
    .unwrap()
}

fn arbitrary_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Nil),
        any::<bool>().prop_map(Value::Bool),
        any::<f64>().prop_filter("exclude NaN, which breaks equality", |n| !n.is_nan())
            .prop_map(Value::Number),
    ]
}

proptest! {
    /// Push then pop returns exactly what was pushed, for every non-object `Value` variant.
    #[test]
    fn push_pop_roundtrip(value in arbitrary_value()) {
        let mut vm = vm_with_capacity(64);
        vm.push(value).unwrap();
        prop_assert_eq!(vm.pop().unwrap(), value);
    }

    /// Peek never removes the item, and repeated peeks see the same value.
    #[test]
    fn peek_does_not_consume(value in arbitrary_value()) {
        let mut vm = vm_with_capacity(64);
        vm.push(value).unwrap();
        let first = vm.peek(0).unwrap();
        let second = vm.peek(0).unwrap();
        prop_assert_eq!(first, value);
        prop_assert_eq!(second, value);
        prop_assert_eq!(vm.pop().unwrap(), value);
    }

    /// Interning the same content twice always yields the same canonical ref, regardless
    /// of content (short strings, empty strings, repeated characters, unicode).
    #[test]
    fn interning_is_idempotent(s in "\\PC{0,64}") {
        let mut vm = vm_with_capacity(4096);
        let a = vm.intern_copy(&s).unwrap();
        let b = vm.intern_copy(&s).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Two different strings almost never collide into the same ref (and when their
    /// content truly differs, never do).
    #[test]
    fn distinct_content_interns_distinctly(s1 in "\\PC{1,32}", s2 in "\\PC{1,32}") {
        prop_assume!(s1 != s2);
        let mut vm = vm_with_capacity(4096);
        let a = vm.intern_copy(&s1).unwrap();
        let b = vm.intern_copy(&s2).unwrap();
        prop_assert_ne!(a, b);
    }

    /// FNV-1a is a pure function of its input bytes.
    #[test]
    fn fnv1a_hash_is_deterministic(bytes in any::<Vec<u8>>()) {
        prop_assert_eq!(fnv1a_hash(&bytes), fnv1a_hash(&bytes));
    }

    /// Changing even one byte almost always changes the hash (a basic avalanche sanity
    /// check, not a collision-resistance proof).
    #[test]
    fn fnv1a_hash_is_content_sensitive(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
        let original = fnv1a_hash(&bytes);
        for i in 0..bytes.len() {
            let mut mutated = bytes.clone();
            mutated[i] = mutated[i].wrapping_add(1);
            if mutated != bytes {
                prop_assert_ne!(fnv1a_hash(&mutated), original);
            }
        }
    }
}
