//! C ABI entry points.
//!
//! Every function clears the thread-local error message, validates its
//! pointers, and returns a raw status code. Failures record a message that
//! `memkv_errormsg` hands back.

use crate::config::MemConfig;
use crate::engine::{Entries, KeyRange, MemDb};
use crate::error::{
    clear_last_config_error, clear_last_error, set_last_config_error, set_last_error, MemkvError,
    MemkvResult,
};
use kvbridge_sys::{GetKvCallback, GetVCallback, KvConfig, KvDb, Status};
use std::ffi::{c_char, c_int, c_void, CStr};

fn fail(err: &MemkvError) -> c_int {
    set_last_error(err.to_string());
    err.status().code()
}

fn finish(result: MemkvResult<()>) -> c_int {
    match result {
        Ok(()) => Status::Ok.code(),
        Err(e) => fail(&e),
    }
}

/// Borrows a byte string passed across the ABI.
///
/// # Safety
///
/// `ptr` must be valid for `len` bytes or null with `len == 0`.
unsafe fn bytes<'a>(ptr: *const c_char, len: usize) -> MemkvResult<&'a [u8]> {
    if ptr.is_null() {
        if len == 0 {
            return Ok(&[]);
        }
        return Err(MemkvError::InvalidArgument(
            "null data pointer with non-zero length".into(),
        ));
    }
    Ok(std::slice::from_raw_parts(ptr.cast::<u8>(), len))
}

/// Borrows a pair of exclusive bounds.
///
/// # Safety
///
/// Both pointers must satisfy the contract of [`bytes`].
unsafe fn between<'a>(
    k1: *const c_char,
    kb1: usize,
    k2: *const c_char,
    kb2: usize,
) -> MemkvResult<KeyRange<'a>> {
    Ok(KeyRange::Between(bytes(k1, kb1)?, bytes(k2, kb2)?))
}

/// Runs `op` against an open database.
///
/// # Safety
///
/// `db` must be null or a handle returned by `memkv_open`.
unsafe fn with_db(db: *mut KvDb, op: impl FnOnce(&MemDb) -> MemkvResult<()>) -> c_int {
    clear_last_error();

    if db.is_null() {
        return fail(&MemkvError::InvalidArgument("null database handle".into()));
    }

    let db = &*(db as *const MemDb);
    finish(op(db))
}

/// Feeds a snapshot to a key/value callback.
///
/// # Safety
///
/// `c` and `arg` must form a valid callback pair.
unsafe fn visit(entries: &Entries, c: GetKvCallback, arg: *mut c_void) -> MemkvResult<()> {
    for (key, value) in entries {
        let rc = c(
            key.as_ptr().cast::<c_char>(),
            key.len(),
            value.as_ptr().cast::<c_char>(),
            value.len(),
            arg,
        );
        if rc != 0 {
            tracing::trace!(rc, "callback stopped iteration");
            return Err(MemkvError::StoppedByCallback);
        }
    }
    Ok(())
}

/// Allocates an empty config.
#[no_mangle]
pub extern "C" fn memkv_config_new() -> *mut KvConfig {
    Box::into_raw(Box::new(MemConfig::new())).cast::<KvConfig>()
}

/// Frees a config.
///
/// # Safety
///
/// `config` must be null or a config returned by `memkv_config_new` that
/// has not been freed or passed to `memkv_open`.
#[no_mangle]
pub unsafe extern "C" fn memkv_config_delete(config: *mut KvConfig) {
    if !config.is_null() {
        drop(Box::from_raw(config.cast::<MemConfig>()));
    }
}

/// Loads config items from a JSON document.
///
/// # Safety
///
/// - `config` must be a valid config
/// - `json` must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn memkv_config_from_json(config: *mut KvConfig, json: *const c_char) -> c_int {
    clear_last_config_error();

    if config.is_null() || json.is_null() {
        let err = MemkvError::InvalidArgument("null pointer argument".into());
        set_last_config_error(err.to_string());
        return err.status().code();
    }

    let config = &mut *config.cast::<MemConfig>();
    let result = CStr::from_ptr(json)
        .to_str()
        .map_err(|_| MemkvError::ConfigParsing("config is not valid UTF-8".into()))
        .and_then(|text| config.load_json(text));

    match result {
        Ok(()) => Status::Ok.code(),
        Err(e) => {
            set_last_config_error(e.to_string());
            e.status().code()
        }
    }
}

/// Opens an engine.
///
/// The config is consumed on success and on failure.
///
/// # Safety
///
/// - `engine` must be a valid null-terminated string
/// - `config` must be a config returned by `memkv_config_new`, or null
/// - `db` must be a valid pointer
#[no_mangle]
pub unsafe extern "C" fn memkv_open(
    engine: *const c_char,
    config: *mut KvConfig,
    db: *mut *mut KvDb,
) -> c_int {
    clear_last_error();

    let config = if config.is_null() {
        Box::new(MemConfig::new())
    } else {
        Box::from_raw(config.cast::<MemConfig>())
    };

    if engine.is_null() || db.is_null() {
        return fail(&MemkvError::InvalidArgument("null pointer argument".into()));
    }

    let Ok(name) = CStr::from_ptr(engine).to_str() else {
        return fail(&MemkvError::InvalidArgument("invalid UTF-8 in engine name".into()));
    };

    match MemDb::open(name, &config) {
        Ok(opened) => {
            *db = Box::into_raw(Box::new(opened)).cast::<KvDb>();
            Status::Ok.code()
        }
        Err(e) => fail(&e),
    }
}

/// Closes an engine.
///
/// # Safety
///
/// `db` must be null or a handle returned by `memkv_open`, and must not be
/// used after this call.
#[no_mangle]
pub unsafe extern "C" fn memkv_close(db: *mut KvDb) {
    if !db.is_null() {
        drop(Box::from_raw(db.cast::<MemDb>()));
    }
}

/// Counts all entries.
///
/// # Safety
///
/// `db` must be a valid handle and `cnt` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn memkv_count_all(db: *mut KvDb, cnt: *mut usize) -> c_int {
    count(db, cnt, Ok(KeyRange::All))
}

/// Counts entries above `k`.
///
/// # Safety
///
/// `db` must be a valid handle, `k` valid for `kb` bytes, `cnt` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn memkv_count_above(
    db: *mut KvDb,
    k: *const c_char,
    kb: usize,
    cnt: *mut usize,
) -> c_int {
    count(db, cnt, bytes(k, kb).map(KeyRange::Above))
}

/// Counts entries below `k`.
///
/// # Safety
///
/// `db` must be a valid handle, `k` valid for `kb` bytes, `cnt` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn memkv_count_below(
    db: *mut KvDb,
    k: *const c_char,
    kb: usize,
    cnt: *mut usize,
) -> c_int {
    count(db, cnt, bytes(k, kb).map(KeyRange::Below))
}

/// Counts entries between `k1` and `k2`.
///
/// # Safety
///
/// `db` must be a valid handle, keys valid for their lengths, `cnt` a valid
/// pointer.
#[no_mangle]
pub unsafe extern "C" fn memkv_count_between(
    db: *mut KvDb,
    k1: *const c_char,
    kb1: usize,
    k2: *const c_char,
    kb2: usize,
    cnt: *mut usize,
) -> c_int {
    count(db, cnt, between(k1, kb1, k2, kb2))
}

unsafe fn count<'a>(
    db: *mut KvDb,
    cnt: *mut usize,
    range: MemkvResult<KeyRange<'a>>,
) -> c_int {
    with_db(db, |db| {
        if cnt.is_null() {
            return Err(MemkvError::InvalidArgument("null count pointer".into()));
        }
        *cnt = db.engine().count(range?)?;
        Ok(())
    })
}

/// Visits all entries.
///
/// # Safety
///
/// `db` must be a valid handle; `c` and `arg` a valid callback pair.
#[no_mangle]
pub unsafe extern "C" fn memkv_get_all(db: *mut KvDb, c: GetKvCallback, arg: *mut c_void) -> c_int {
    scan(db, c, arg, Ok(KeyRange::All))
}

/// Visits entries above `k`.
///
/// # Safety
///
/// `db` must be a valid handle, `k` valid for `kb` bytes; `c` and `arg` a
/// valid callback pair.
#[no_mangle]
pub unsafe extern "C" fn memkv_get_above(
    db: *mut KvDb,
    k: *const c_char,
    kb: usize,
    c: GetKvCallback,
    arg: *mut c_void,
) -> c_int {
    scan(db, c, arg, bytes(k, kb).map(KeyRange::Above))
}

/// Visits entries below `k`.
///
/// # Safety
///
/// `db` must be a valid handle, `k` valid for `kb` bytes; `c` and `arg` a
/// valid callback pair.
#[no_mangle]
pub unsafe extern "C" fn memkv_get_below(
    db: *mut KvDb,
    k: *const c_char,
    kb: usize,
    c: GetKvCallback,
    arg: *mut c_void,
) -> c_int {
    scan(db, c, arg, bytes(k, kb).map(KeyRange::Below))
}

/// Visits entries between `k1` and `k2`.
///
/// # Safety
///
/// `db` must be a valid handle, keys valid for their lengths; `c` and `arg`
/// a valid callback pair.
#[no_mangle]
pub unsafe extern "C" fn memkv_get_between(
    db: *mut KvDb,
    k1: *const c_char,
    kb1: usize,
    k2: *const c_char,
    kb2: usize,
    c: GetKvCallback,
    arg: *mut c_void,
) -> c_int {
    scan(db, c, arg, between(k1, kb1, k2, kb2))
}

unsafe fn scan<'a>(
    db: *mut KvDb,
    c: GetKvCallback,
    arg: *mut c_void,
    range: MemkvResult<KeyRange<'a>>,
) -> c_int {
    with_db(db, |db| {
        let entries = db.engine().snapshot(range?)?;
        visit(&entries, c, arg)
    })
}

/// Checks whether `k` exists.
///
/// # Safety
///
/// `db` must be a valid handle and `k` valid for `kb` bytes.
#[no_mangle]
pub unsafe extern "C" fn memkv_exists(db: *mut KvDb, k: *const c_char, kb: usize) -> c_int {
    with_db(db, |db| db.engine().exists(bytes(k, kb)?))
}

/// Passes the value stored under `k` to `c`.
///
/// # Safety
///
/// `db` must be a valid handle, `k` valid for `kb` bytes; `c` and `arg` a
/// valid callback pair.
#[no_mangle]
pub unsafe extern "C" fn memkv_get(
    db: *mut KvDb,
    k: *const c_char,
    kb: usize,
    c: GetVCallback,
    arg: *mut c_void,
) -> c_int {
    with_db(db, |db| {
        let value = db.engine().get(bytes(k, kb)?)?;
        c(value.as_ptr().cast::<c_char>(), value.len(), arg);
        Ok(())
    })
}

/// Inserts or replaces an entry.
///
/// # Safety
///
/// `db` must be a valid handle; `k` and `v` valid for their lengths.
#[no_mangle]
pub unsafe extern "C" fn memkv_put(
    db: *mut KvDb,
    k: *const c_char,
    kb: usize,
    v: *const c_char,
    vb: usize,
) -> c_int {
    with_db(db, |db| db.engine().put(bytes(k, kb)?, bytes(v, vb)?))
}

/// Removes an entry.
///
/// # Safety
///
/// `db` must be a valid handle and `k` valid for `kb` bytes.
#[no_mangle]
pub unsafe extern "C" fn memkv_remove(db: *mut KvDb, k: *const c_char, kb: usize) -> c_int {
    with_db(db, |db| db.engine().remove(bytes(k, kb)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::live_configs;
    use crate::error::memkv_errormsg;
    use std::ffi::CString;

    unsafe fn open(engine: &str, json: &str) -> (c_int, *mut KvDb) {
        let config = memkv_config_new();
        let json = CString::new(json).unwrap();
        assert_eq!(memkv_config_from_json(config, json.as_ptr()), Status::Ok.code());
        let name = CString::new(engine).unwrap();
        let mut db: *mut KvDb = std::ptr::null_mut();
        let rc = memkv_open(name.as_ptr(), config, &mut db);
        (rc, db)
    }

    unsafe fn put(db: *mut KvDb, k: &str, v: &str) {
        let rc = memkv_put(db, k.as_ptr().cast(), k.len(), v.as_ptr().cast(), v.len());
        assert_eq!(rc, Status::Ok.code());
    }

    unsafe extern "C" fn collect_keys(
        k: *const c_char,
        kb: usize,
        _v: *const c_char,
        _vb: usize,
        arg: *mut c_void,
    ) -> c_int {
        let keys = &mut *arg.cast::<Vec<Vec<u8>>>();
        keys.push(std::slice::from_raw_parts(k.cast::<u8>(), kb).to_vec());
        0
    }

    unsafe extern "C" fn stop_after_first(
        _k: *const c_char,
        _kb: usize,
        _v: *const c_char,
        _vb: usize,
        arg: *mut c_void,
    ) -> c_int {
        *arg.cast::<usize>() += 1;
        1
    }

    unsafe extern "C" fn copy_value(v: *const c_char, vb: usize, arg: *mut c_void) {
        let out = &mut *arg.cast::<Vec<u8>>();
        out.extend_from_slice(std::slice::from_raw_parts(v.cast::<u8>(), vb));
    }

    #[test]
    fn open_put_get_close() {
        unsafe {
            let (rc, db) = open("vsmap", "{}");
            assert_eq!(rc, Status::Ok.code());
            put(db, "key", "value");

            let mut out = Vec::new();
            let key = "key";
            let rc = memkv_get(
                db,
                key.as_ptr().cast(),
                key.len(),
                copy_value,
                (&mut out as *mut Vec<u8>).cast(),
            );
            assert_eq!(rc, Status::Ok.code());
            assert_eq!(out, b"value");

            assert_eq!(memkv_exists(db, key.as_ptr().cast(), key.len()), Status::Ok.code());
            assert_eq!(memkv_remove(db, key.as_ptr().cast(), key.len()), Status::Ok.code());
            assert_eq!(
                memkv_exists(db, key.as_ptr().cast(), key.len()),
                Status::NotFound.code()
            );

            memkv_close(db);
        }
    }

    #[test]
    fn scan_in_order_and_stop() {
        unsafe {
            let (_, db) = open("vsmap", "{}");
            put(db, "c", "3");
            put(db, "a", "1");
            put(db, "b", "2");

            let mut keys: Vec<Vec<u8>> = Vec::new();
            let rc = memkv_get_all(db, collect_keys, (&mut keys as *mut Vec<Vec<u8>>).cast());
            assert_eq!(rc, Status::Ok.code());
            assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

            let mut calls = 0usize;
            let rc = memkv_get_all(db, stop_after_first, (&mut calls as *mut usize).cast());
            assert_eq!(rc, Status::StoppedByCallback.code());
            assert_eq!(calls, 1);

            let mut cnt = 0usize;
            let (lo, hi) = ("a", "c");
            let rc = memkv_count_between(
                db,
                lo.as_ptr().cast(),
                lo.len(),
                hi.as_ptr().cast(),
                hi.len(),
                &mut cnt,
            );
            assert_eq!(rc, Status::Ok.code());
            assert_eq!(cnt, 1);

            memkv_close(db);
        }
    }

    #[test]
    fn open_consumes_config_on_failure() {
        let before = live_configs();
        unsafe {
            let (rc, db) = open("no-such-engine", "{}");
            assert_eq!(rc, Status::WrongEngineName.code());
            assert!(db.is_null());
            let msg = CStr::from_ptr(memkv_errormsg()).to_str().unwrap();
            assert!(msg.contains("no-such-engine"));
        }
        assert_eq!(live_configs(), before);
    }

    #[test]
    fn null_handle_is_invalid_argument() {
        unsafe {
            let key = "k";
            let rc = memkv_exists(std::ptr::null_mut(), key.as_ptr().cast(), 1);
            assert_eq!(rc, Status::InvalidArgument.code());
        }
    }

    #[test]
    fn malformed_config() {
        unsafe {
            let config = memkv_config_new();
            let json = CString::new("{not json").unwrap();
            let rc = memkv_config_from_json(config, json.as_ptr());
            assert_eq!(rc, Status::ConfigParsingError.code());
            let msg = CStr::from_ptr(crate::error::memkv_config_from_json_errormsg());
            assert!(!msg.to_bytes().is_empty());
            memkv_config_delete(config);
        }
    }
}
