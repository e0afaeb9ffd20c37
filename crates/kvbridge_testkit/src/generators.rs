//! Property-based test generators using proptest.
//!
//! Keys and values are arbitrary bytes, including NUL and invalid UTF-8,
//! since the engine treats both as opaque.

use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating keys.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..24)
}

/// Strategy for generating values.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for generating a set of entries with distinct keys, sorted
/// by key.
pub fn entries_strategy(max: usize) -> impl Strategy<Value = BTreeMap<Vec<u8>, Vec<u8>>> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 0..max)
}

/// Strategy for generating a pair of range bounds in either order.
pub fn bounds_strategy() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    (key_strategy(), key_strategy())
}

/// An operation against a database, for model-based tests.
#[derive(Debug, Clone)]
pub enum Op {
    /// Insert or replace.
    Put(Vec<u8>, Vec<u8>),
    /// Remove if present.
    Remove(Vec<u8>),
}

/// Strategy for generating operation sequences over a small key space so
/// that replacements and removals hit existing keys.
pub fn ops_strategy(max: usize) -> impl Strategy<Value = Vec<Op>> {
    let key = prop::collection::vec(0u8..4, 1..3);
    let op = prop_oneof![
        3 => (key.clone(), value_strategy()).prop_map(|(k, v)| Op::Put(k, v)),
        1 => key.prop_map(Op::Remove),
    ];
    prop::collection::vec(op, 0..max)
}

/// Applies `ops` to an ordered model.
pub fn apply_to_model(ops: &[Op]) -> BTreeMap<Vec<u8>, Vec<u8>> {
    let mut model = BTreeMap::new();
    for op in ops {
        match op {
            Op::Put(k, v) => {
                model.insert(k.clone(), v.clone());
            }
            Op::Remove(k) => {
                model.remove(k);
            }
        }
    }
    model
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_applies_in_order() {
        let ops = vec![
            Op::Put(vec![1], vec![1]),
            Op::Put(vec![2], vec![2]),
            Op::Put(vec![1], vec![9]),
            Op::Remove(vec![2]),
        ];
        let model = apply_to_model(&ops);
        assert_eq!(model.len(), 1);
        assert_eq!(model.get(&vec![1u8]), Some(&vec![9u8]));
    }

    proptest! {
        #[test]
        fn entries_are_sorted(entries in entries_strategy(16)) {
            let keys: Vec<_> = entries.keys().cloned().collect();
            let mut sorted = keys.clone();
            sorted.sort();
            prop_assert_eq!(keys, sorted);
        }
    }
}
