//! # kvbridge
//!
//! Safe binding to key-value engines that export the pmemkv C ABI.
//!
//! This crate provides:
//! - [`Database`], an owned engine handle with put/get/exists/remove,
//!   counts and ordered scans over exclusive key ranges
//! - Zero-copy reads: callbacks receive a [`BorrowedView`] over engine
//!   memory that is only readable while the callback runs
//! - Callback errors and panics that stop the engine's iteration and are
//!   returned from the call that started it
//! - A status registry mapping every engine status to one error class
//!
//! ## Example
//!
//! ```
//! use kvbridge::{Config, Database};
//!
//! let db = Database::open_memkv("vsmap", &Config::new())?;
//! db.put("key1", "value1")?;
//! db.put("key2", "value2")?;
//!
//! let mut keys = Vec::new();
//! db.scan_keys_all(|key| {
//!     keys.push(key.to_vec());
//!     Ok(())
//! })?;
//! assert_eq!(keys, [b"key1".to_vec(), b"key2".to_vec()]);
//! # Ok::<(), kvbridge::KvError>(())
//! ```
//!
//! ## Engines
//!
//! Any [`EngineApi`] table can back a [`Database`]. With the default
//! `memkv` feature the in-process engines are available through
//! [`Database::open_memkv`]; the `libpmemkv` feature links the system
//! library.

#![warn(missing_docs)]

mod classes;
mod config;
mod database;
mod error;
mod registry;
mod trampoline;
mod view;

pub use classes::{ClassHost, ClassOrigin, ErrorClass, ErrorClasses};
pub use config::Config;
pub use database::Database;
pub use error::{CallbackError, CallbackResult, EngineError, KvError, KvResult};
pub use kvbridge_sys::{EngineApi, Status};
pub use registry::{
    descriptor, descriptors, ExceptionHost, ExceptionRegistry, NativeKind, RegisteredStatus,
    RegistryError, RegistryResult, StatusDescriptor, BASE_DOC, BASE_QUALIFIED_NAME,
    BASE_TYPE_NAME, BINDING_OOM_MESSAGE,
};
pub use view::BorrowedView;

/// Builds the process-wide error class table.
///
/// Opening a database does this implicitly; call it up front to pay the
/// cost at startup.
pub fn init() -> &'static ErrorClasses {
    ErrorClasses::global()
}
