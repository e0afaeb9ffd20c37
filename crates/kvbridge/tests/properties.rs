//! Property tests comparing the binding against an ordered model.

use kvbridge_testkit::{
    all_entries, apply_to_model, bounds_strategy, entries_strategy, ops_strategy, Op,
    TestDatabase,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::ops::Bound;

fn between<'a>(
    model: &'a BTreeMap<Vec<u8>, Vec<u8>>,
    lo: &[u8],
    hi: &[u8],
) -> Vec<&'a Vec<u8>> {
    if lo >= hi {
        return Vec::new();
    }
    model
        .range::<[u8], _>((Bound::Excluded(lo), Bound::Excluded(hi)))
        .map(|(k, _)| k)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ops_match_model(ops in ops_strategy(40)) {
        let db = TestDatabase::vsmap();
        for op in &ops {
            match op {
                Op::Put(k, v) => db.put(k, v).unwrap(),
                Op::Remove(k) => {
                    db.remove(k).unwrap();
                }
            }
        }
        let model = apply_to_model(&ops);
        let expected: Vec<_> = model.into_iter().collect();
        prop_assert_eq!(all_entries(&db), expected);
    }

    #[test]
    fn point_reads_match_model(entries in entries_strategy(32), probe in prop::collection::vec(any::<u8>(), 0..24)) {
        let db = TestDatabase::with_entries(entries.iter());
        prop_assert_eq!(db.count_all().unwrap(), entries.len());
        prop_assert_eq!(db.exists(&probe).unwrap(), entries.contains_key(&probe));
        let probed = db.get_copy(&probe).unwrap();
        prop_assert_eq!(probed.as_ref(), entries.get(&probe));
        for (k, v) in &entries {
            let got = db.get_copy(k).unwrap();
            prop_assert_eq!(got.as_ref(), Some(v));
        }
    }

    #[test]
    fn ranges_match_model(entries in entries_strategy(32), (lo, hi) in bounds_strategy()) {
        let db = TestDatabase::with_entries(entries.iter());

        let expected = between(&entries, &lo, &hi);
        prop_assert_eq!(db.count_between(&lo, &hi).unwrap(), expected.len());

        let mut scanned = Vec::new();
        db.scan_keys_between(&lo, &hi, |k| {
            scanned.push(k.to_vec());
            Ok(())
        })
        .unwrap();
        let expected: Vec<Vec<u8>> = expected.into_iter().cloned().collect();
        prop_assert_eq!(scanned, expected);

        let above = entries.range::<[u8], _>((Bound::Excluded(lo.as_slice()), Bound::Unbounded)).count();
        prop_assert_eq!(db.count_above(&lo).unwrap(), above);
        let below = entries.range::<[u8], _>((Bound::Unbounded, Bound::Excluded(hi.as_slice()))).count();
        prop_assert_eq!(db.count_below(&hi).unwrap(), below);
    }
}
