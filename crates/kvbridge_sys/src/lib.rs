//! # kvbridge sys
//!
//! Raw C ABI of the pmemkv key-value engine.
//!
//! This crate provides:
//! - The closed set of engine status codes ([`Status`])
//! - Opaque handle types ([`KvDb`], [`KvConfig`])
//! - Native callback signatures ([`GetKvCallback`], [`GetVCallback`])
//! - The engine function table ([`EngineApi`])
//!
//! Nothing here is safe to call directly. The `kvbridge` crate wraps the
//! table in a safe facade.
//!
//! ## Engine providers
//!
//! Any library exporting the pmemkv C ABI can fill an [`EngineApi`]. With the
//! `libpmemkv` feature enabled, [`libpmemkv()`] returns a table bound to the
//! system `libpmemkv` and `libpmemkv_json_config` libraries.

#![warn(missing_docs)]

mod api;
#[cfg(feature = "libpmemkv")]
mod libpmemkv;
mod status;

pub use api::{EngineApi, GetKvCallback, GetVCallback, KvConfig, KvDb};
#[cfg(feature = "libpmemkv")]
pub use libpmemkv::libpmemkv;
pub use status::{
    Status, STATUS_COMPARATOR_MISMATCH, STATUS_CONFIG_PARSING_ERROR, STATUS_CONFIG_TYPE_ERROR,
    STATUS_DEFRAG_ERROR, STATUS_INVALID_ARGUMENT, STATUS_NOT_FOUND, STATUS_NOT_SUPPORTED,
    STATUS_OK, STATUS_OUT_OF_MEMORY, STATUS_STOPPED_BY_CB, STATUS_TRANSACTION_SCOPE_ERROR,
    STATUS_UNKNOWN_ERROR, STATUS_WRONG_ENGINE_NAME,
};
