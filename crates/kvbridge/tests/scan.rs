//! Integration tests for ordered scans and callback propagation.

use kvbridge::{BorrowedView, CallbackResult, Config, Database, EngineApi, KvError, Status};
use kvbridge_testkit::{all_keys, TestDatabase};
use std::ffi::{c_char, c_int, c_void};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("host rejected key {0:?}")]
struct Rejected(Vec<u8>);

fn letters() -> TestDatabase {
    TestDatabase::with_entries([("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5")])
}

fn collect_keys(
    scan: impl FnOnce(&mut dyn FnMut(&BorrowedView) -> CallbackResult) -> kvbridge::KvResult<()>,
) -> Vec<String> {
    let mut keys = Vec::new();
    scan(&mut |key| {
        keys.push(key.to_str().unwrap().to_owned());
        Ok(())
    })
    .unwrap();
    keys
}

#[test]
fn key_scans_use_exclusive_bounds() {
    let db = letters();
    assert_eq!(collect_keys(|f| db.scan_keys_all(f)), ["a", "b", "c", "d", "e"]);
    assert_eq!(collect_keys(|f| db.scan_keys_above("b", f)), ["c", "d", "e"]);
    assert_eq!(collect_keys(|f| db.scan_keys_below("c", f)), ["a", "b"]);
    assert_eq!(collect_keys(|f| db.scan_keys_between("a", "d", f)), ["b", "c"]);
    assert!(collect_keys(|f| db.scan_keys_between("d", "a", f)).is_empty());
    assert!(collect_keys(|f| db.scan_keys_between("c", "c", f)).is_empty());
    assert!(collect_keys(|f| db.scan_keys_above("e", f)).is_empty());
}

#[test]
fn entry_scans_pass_both_views() {
    let db = letters();
    let mut seen = Vec::new();
    db.scan_above("c", |key, value| {
        seen.push(format!("{}={}", key.to_str()?, value.to_str()?));
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, ["d=4", "e=5"]);

    let mut seen = Vec::new();
    db.scan_below("b", |key, value| {
        seen.push((key.to_vec(), value.to_vec()));
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, [(b"a".to_vec(), b"1".to_vec())]);

    let mut total = 0;
    db.scan_between("a", "e", |_, value| {
        total += value.to_str()?.parse::<u32>()?;
        Ok(())
    })
    .unwrap();
    assert_eq!(total, 2 + 3 + 4);
}

#[test]
fn callback_error_stops_iteration_and_is_returned() {
    let db = letters();
    let mut visited = Vec::new();
    let err = db
        .scan_keys_all(|key| {
            visited.push(key.to_vec());
            if key.as_bytes() == b"c" {
                return Err(Rejected(key.to_vec()).into());
            }
            Ok(())
        })
        .unwrap_err();

    assert_eq!(visited, [b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    assert_eq!(err.callback_error::<Rejected>(), Some(&Rejected(b"c".to_vec())));
    assert_eq!(err.status(), None);
}

#[test]
fn callback_panic_is_contained() {
    let db = letters();
    let mut calls = 0;
    let err = db
        .scan_all(|_, _| {
            calls += 1;
            if calls == 2 {
                panic!("second entry");
            }
            Ok(())
        })
        .unwrap_err();
    assert_eq!(calls, 2);
    match err {
        KvError::CallbackPanicked { message } => assert_eq!(message, "second entry"),
        other => panic!("unexpected error: {other}"),
    }

    // The database stays usable.
    assert_eq!(db.count_all().unwrap(), 5);
}

#[test]
fn callbacks_may_reenter_the_database() {
    let db = letters();
    let mut counts = Vec::new();
    db.scan_keys_all(|key| {
        counts.push(db.count_above(key.as_bytes())?);
        Ok(())
    })
    .unwrap();
    assert_eq!(counts, [4, 3, 2, 1, 0]);
}

#[test]
fn views_are_only_copied_out() {
    let db = letters();
    let mut copies = Vec::new();
    db.scan_keys_all(|key| {
        copies.push(key.to_vec());
        Ok(())
    })
    .unwrap();
    assert_eq!(copies, all_keys(&db));
}

#[test]
fn binary_keys_sort_bytewise() {
    let db = TestDatabase::with_entries([
        (vec![0xffu8], "high"),
        (vec![0x00u8, 0x01], "nul"),
        (vec![0x7fu8], "mid"),
    ]);
    assert_eq!(
        all_keys(&db),
        vec![vec![0x00, 0x01], vec![0x7f], vec![0xff]]
    );
    assert_eq!(db.count_between([0x00u8], [0xffu8]).unwrap(), 2);
}

/// Feeds three fixed keys to the callback and ignores its return value.
unsafe extern "C" fn stubborn_get_all(
    _db: *mut kvbridge_sys::KvDb,
    c: kvbridge_sys::GetKvCallback,
    arg: *mut c_void,
) -> c_int {
    for key in [&b"x"[..], b"y", b"z"] {
        let _ = c(key.as_ptr().cast::<c_char>(), key.len(), std::ptr::null(), 0, arg);
    }
    Status::Ok.code()
}

/// Reports a status code no engine defines.
unsafe extern "C" fn bogus_count_all(_db: *mut kvbridge_sys::KvDb, cnt: *mut usize) -> c_int {
    *cnt = 0;
    42
}

/// Reports a stop without any callback having asked for it.
unsafe extern "C" fn spurious_stop(
    _db: *mut kvbridge_sys::KvDb,
    _c: kvbridge_sys::GetKvCallback,
    _arg: *mut c_void,
) -> c_int {
    Status::StoppedByCallback.code()
}

fn patched(patch: impl FnOnce(&mut EngineApi)) -> Database {
    let mut api = *kvbridge_memkv::api();
    patch(&mut api);
    let api: &'static EngineApi = Box::leak(Box::new(api));
    Database::open(api, "vsmap", &Config::new()).unwrap()
}

#[test]
fn latched_error_wins_when_engine_ignores_abort() {
    let db = patched(|api| api.get_all = stubborn_get_all);
    let mut calls = 0;
    let err = db
        .scan_keys_all(|key| {
            calls += 1;
            Err(Rejected(key.to_vec()).into())
        })
        .unwrap_err();
    assert_eq!(calls, 1);
    assert_eq!(err.callback_error::<Rejected>(), Some(&Rejected(b"x".to_vec())));
}

#[test]
fn unmapped_status_is_an_error() {
    let db = patched(|api| api.count_all = bogus_count_all);
    let err = db.count_all().unwrap_err();
    assert!(matches!(err, KvError::UnmappedStatus { code: 42 }));
}

#[test]
fn engine_stop_without_host_error_surfaces_as_status() {
    let db = patched(|api| api.get_all = spurious_stop);
    let err = db.scan_all(|_, _| Ok(())).unwrap_err();
    assert_eq!(err.status(), Some(Status::StoppedByCallback));
    assert_eq!(err.class().unwrap().name(), "StoppedByCallback");
}
