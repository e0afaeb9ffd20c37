//! # kvbridge memkv
//!
//! In-process key-value engine exporting the pmemkv C ABI.
//!
//! This crate provides:
//! - C-compatible `memkv_*` exports with the same signatures as libpmemkv
//! - Thread-local error messages (`memkv_errormsg`)
//! - JSON config objects with per-thread allocation accounting
//! - The `vsmap`, `vcmap` and `blackhole` engines
//!
//! It lets the binding be exercised without persistent memory. Hand
//! [`api()`] to anything that accepts an [`EngineApi`].
//!
//! ## Memory ownership
//!
//! - Configs are owned by the caller until `memkv_open` consumes them
//! - Pointers passed to callbacks are only valid during the call
//! - Error message pointers are valid until the next call on the same thread

#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod ffi;

pub use config::{live_configs, MemConfig};
pub use engine::{
    live_databases, BlackholeEngine, Bytes, Engine, Entries, HashEngine, KeyRange, MemDb,
    SortedEngine,
};
pub use error::{
    clear_last_error, memkv_config_from_json_errormsg, memkv_errormsg, set_last_error,
    MemkvError, MemkvResult,
};
pub use ffi::*;

use kvbridge_sys::EngineApi;

static MEMKV: EngineApi = EngineApi {
    config_new: memkv_config_new,
    config_delete: memkv_config_delete,
    config_from_json: memkv_config_from_json,
    config_from_json_errormsg: memkv_config_from_json_errormsg,
    open: memkv_open,
    close: memkv_close,
    errormsg: memkv_errormsg,
    count_all: memkv_count_all,
    count_above: memkv_count_above,
    count_below: memkv_count_below,
    count_between: memkv_count_between,
    get_all: memkv_get_all,
    get_above: memkv_get_above,
    get_below: memkv_get_below,
    get_between: memkv_get_between,
    exists: memkv_exists,
    get: memkv_get,
    put: memkv_put,
    remove: memkv_remove,
};

/// Returns the function table of the in-process engine.
pub fn api() -> &'static EngineApi {
    &MEMKV
}

/// Names of the engines this crate provides.
pub const ENGINES: [&str; 3] = ["vsmap", "vcmap", "blackhole"];
