//! Bindings to the system libpmemkv.

use crate::api::{EngineApi, GetKvCallback, GetVCallback, KvConfig, KvDb};
use std::ffi::{c_char, c_int, c_void};

#[link(name = "pmemkv")]
extern "C" {
    fn pmemkv_config_new() -> *mut KvConfig;
    fn pmemkv_config_delete(config: *mut KvConfig);
    fn pmemkv_open(engine: *const c_char, config: *mut KvConfig, db: *mut *mut KvDb) -> c_int;
    fn pmemkv_close(db: *mut KvDb);
    fn pmemkv_errormsg() -> *const c_char;

    fn pmemkv_count_all(db: *mut KvDb, cnt: *mut usize) -> c_int;
    fn pmemkv_count_above(db: *mut KvDb, k: *const c_char, kb: usize, cnt: *mut usize) -> c_int;
    fn pmemkv_count_below(db: *mut KvDb, k: *const c_char, kb: usize, cnt: *mut usize) -> c_int;
    fn pmemkv_count_between(
        db: *mut KvDb,
        k1: *const c_char,
        kb1: usize,
        k2: *const c_char,
        kb2: usize,
        cnt: *mut usize,
    ) -> c_int;

    fn pmemkv_get_all(db: *mut KvDb, c: GetKvCallback, arg: *mut c_void) -> c_int;
    fn pmemkv_get_above(
        db: *mut KvDb,
        k: *const c_char,
        kb: usize,
        c: GetKvCallback,
        arg: *mut c_void,
    ) -> c_int;
    fn pmemkv_get_below(
        db: *mut KvDb,
        k: *const c_char,
        kb: usize,
        c: GetKvCallback,
        arg: *mut c_void,
    ) -> c_int;
    fn pmemkv_get_between(
        db: *mut KvDb,
        k1: *const c_char,
        kb1: usize,
        k2: *const c_char,
        kb2: usize,
        c: GetKvCallback,
        arg: *mut c_void,
    ) -> c_int;

    fn pmemkv_exists(db: *mut KvDb, k: *const c_char, kb: usize) -> c_int;
    fn pmemkv_get(
        db: *mut KvDb,
        k: *const c_char,
        kb: usize,
        c: GetVCallback,
        arg: *mut c_void,
    ) -> c_int;
    fn pmemkv_put(db: *mut KvDb, k: *const c_char, kb: usize, v: *const c_char, vb: usize)
        -> c_int;
    fn pmemkv_remove(db: *mut KvDb, k: *const c_char, kb: usize) -> c_int;
}

#[link(name = "pmemkv_json_config")]
extern "C" {
    fn pmemkv_config_from_json(config: *mut KvConfig, json: *const c_char) -> c_int;
    fn pmemkv_config_from_json_errormsg() -> *const c_char;
}

static LIBPMEMKV: EngineApi = EngineApi {
    config_new: pmemkv_config_new,
    config_delete: pmemkv_config_delete,
    config_from_json: pmemkv_config_from_json,
    config_from_json_errormsg: pmemkv_config_from_json_errormsg,
    open: pmemkv_open,
    close: pmemkv_close,
    errormsg: pmemkv_errormsg,
    count_all: pmemkv_count_all,
    count_above: pmemkv_count_above,
    count_below: pmemkv_count_below,
    count_between: pmemkv_count_between,
    get_all: pmemkv_get_all,
    get_above: pmemkv_get_above,
    get_below: pmemkv_get_below,
    get_between: pmemkv_get_between,
    exists: pmemkv_exists,
    get: pmemkv_get,
    put: pmemkv_put,
    remove: pmemkv_remove,
};

/// Returns the function table bound to the system libpmemkv.
pub fn libpmemkv() -> &'static EngineApi {
    &LIBPMEMKV
}
