//! Engine function table and callback signatures.

use std::ffi::{c_char, c_int, c_void};

/// An opaque engine instance.
///
/// Never dereference or modify directly.
#[repr(C)]
pub struct KvDb {
    _private: [u8; 0],
}

/// An opaque engine configuration object.
#[repr(C)]
pub struct KvConfig {
    _private: [u8; 0],
}

/// Key/value iteration callback.
///
/// Invoked once per matching entry. The pointers are only valid for the
/// duration of the call. A non-zero return asks the engine to stop iterating;
/// the engine then returns `STATUS_STOPPED_BY_CB`.
pub type GetKvCallback = unsafe extern "C" fn(
    key: *const c_char,
    keybytes: usize,
    value: *const c_char,
    valuebytes: usize,
    arg: *mut c_void,
) -> c_int;

/// Single value callback used by `get`.
///
/// Has no way to abort: the engine ignores anything the callback does.
pub type GetVCallback =
    unsafe extern "C" fn(value: *const c_char, valuebytes: usize, arg: *mut c_void);

/// Function table of an engine exporting the pmemkv C ABI.
///
/// All functions return a raw status code (see [`crate::Status`]) unless noted.
/// `errormsg` and `config_from_json_errormsg` return a thread-local message
/// describing the last failure on the calling thread.
///
/// # Ownership
///
/// - `config_new` allocates a config that the caller owns until it is either
///   passed to `config_delete` or to `open`.
/// - `open` always consumes the config, on success and on failure.
/// - `close` destroys the instance created by `open`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct EngineApi {
    /// Allocates an empty config. Returns null on allocation failure.
    pub config_new: unsafe extern "C" fn() -> *mut KvConfig,
    /// Frees a config that was not handed to `open`.
    pub config_delete: unsafe extern "C" fn(config: *mut KvConfig),
    /// Loads config items from a null-terminated JSON document.
    pub config_from_json:
        unsafe extern "C" fn(config: *mut KvConfig, json: *const c_char) -> c_int,
    /// Message describing the last `config_from_json` failure.
    pub config_from_json_errormsg: unsafe extern "C" fn() -> *const c_char,
    /// Opens the engine named by a null-terminated string.
    pub open: unsafe extern "C" fn(
        engine: *const c_char,
        config: *mut KvConfig,
        db: *mut *mut KvDb,
    ) -> c_int,
    /// Closes an engine instance.
    pub close: unsafe extern "C" fn(db: *mut KvDb),
    /// Message describing the last failure.
    pub errormsg: unsafe extern "C" fn() -> *const c_char,

    /// Counts all entries.
    pub count_all: unsafe extern "C" fn(db: *mut KvDb, cnt: *mut usize) -> c_int,
    /// Counts entries with keys strictly greater than `k`.
    pub count_above:
        unsafe extern "C" fn(db: *mut KvDb, k: *const c_char, kb: usize, cnt: *mut usize) -> c_int,
    /// Counts entries with keys strictly less than `k`.
    pub count_below:
        unsafe extern "C" fn(db: *mut KvDb, k: *const c_char, kb: usize, cnt: *mut usize) -> c_int,
    /// Counts entries with keys strictly between `k1` and `k2`.
    pub count_between: unsafe extern "C" fn(
        db: *mut KvDb,
        k1: *const c_char,
        kb1: usize,
        k2: *const c_char,
        kb2: usize,
        cnt: *mut usize,
    ) -> c_int,

    /// Visits all entries.
    pub get_all:
        unsafe extern "C" fn(db: *mut KvDb, c: GetKvCallback, arg: *mut c_void) -> c_int,
    /// Visits entries with keys strictly greater than `k`.
    pub get_above: unsafe extern "C" fn(
        db: *mut KvDb,
        k: *const c_char,
        kb: usize,
        c: GetKvCallback,
        arg: *mut c_void,
    ) -> c_int,
    /// Visits entries with keys strictly less than `k`.
    pub get_below: unsafe extern "C" fn(
        db: *mut KvDb,
        k: *const c_char,
        kb: usize,
        c: GetKvCallback,
        arg: *mut c_void,
    ) -> c_int,
    /// Visits entries with keys strictly between `k1` and `k2`.
    pub get_between: unsafe extern "C" fn(
        db: *mut KvDb,
        k1: *const c_char,
        kb1: usize,
        k2: *const c_char,
        kb2: usize,
        c: GetKvCallback,
        arg: *mut c_void,
    ) -> c_int,

    /// Returns OK if the key exists, NOT_FOUND otherwise.
    pub exists: unsafe extern "C" fn(db: *mut KvDb, k: *const c_char, kb: usize) -> c_int,
    /// Passes the value stored under `k` to the callback.
    pub get: unsafe extern "C" fn(
        db: *mut KvDb,
        k: *const c_char,
        kb: usize,
        c: GetVCallback,
        arg: *mut c_void,
    ) -> c_int,
    /// Inserts or replaces an entry.
    pub put: unsafe extern "C" fn(
        db: *mut KvDb,
        k: *const c_char,
        kb: usize,
        v: *const c_char,
        vb: usize,
    ) -> c_int,
    /// Removes an entry. Returns NOT_FOUND if the key is absent.
    pub remove: unsafe extern "C" fn(db: *mut KvDb, k: *const c_char, kb: usize) -> c_int,
}

impl std::fmt::Debug for EngineApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineApi")
            .field("open", &(self.open as *const c_void))
            .finish_non_exhaustive()
    }
}
