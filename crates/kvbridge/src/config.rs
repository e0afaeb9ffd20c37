//! Engine configuration.

use crate::error::{KvError, KvResult};
use kvbridge_sys::{EngineApi, KvConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ffi::{c_int, CStr};
use std::ptr::NonNull;

/// Typed config items passed to an engine on open.
///
/// Serialized to a JSON object and loaded into a native config right before
/// the engine is opened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    items: Map<String, Value>,
}

impl Config {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pool or file path.
    #[must_use]
    pub fn path(self, path: impl Into<String>) -> Self {
        self.put_string("path", path)
    }

    /// Sets the pool size in bytes.
    #[must_use]
    pub fn size(self, size: u64) -> Self {
        self.put_uint("size", size)
    }

    /// Sets whether the pool is created even if it exists.
    #[must_use]
    pub fn force_create(self, value: bool) -> Self {
        self.put_bool("force_create", value)
    }

    /// Sets a string item.
    #[must_use]
    pub fn put_string(self, item: impl Into<String>, value: impl Into<String>) -> Self {
        self.put_value(item, Value::String(value.into()))
    }

    /// Sets an unsigned integer item.
    #[must_use]
    pub fn put_uint(self, item: impl Into<String>, value: u64) -> Self {
        self.put_value(item, Value::from(value))
    }

    /// Sets a signed integer item.
    #[must_use]
    pub fn put_int(self, item: impl Into<String>, value: i64) -> Self {
        self.put_value(item, Value::from(value))
    }

    /// Sets a boolean item.
    #[must_use]
    pub fn put_bool(self, item: impl Into<String>, value: bool) -> Self {
        self.put_value(item, Value::Bool(value))
    }

    /// Sets an arbitrary JSON item.
    #[must_use]
    pub fn put_value(mut self, item: impl Into<String>, value: Value) -> Self {
        self.items.insert(item.into(), value);
        self
    }

    /// Builds a config from any value that serializes to a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::InvalidArgument`] if `value` does not serialize
    /// to an object.
    pub fn from_serialize<T: Serialize>(value: &T) -> KvResult<Self> {
        match serde_json::to_value(value) {
            Ok(Value::Object(items)) => Ok(Self { items }),
            Ok(_) => Err(KvError::invalid_argument("config must serialize to a JSON object")),
            Err(e) => Err(KvError::invalid_argument(format!("config serialization failed: {e}"))),
        }
    }

    /// Parses a config from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::InvalidArgument`] if `json` is not a JSON object.
    pub fn from_json_str(json: &str) -> KvResult<Self> {
        match serde_json::from_str(json) {
            Ok(Value::Object(items)) => Ok(Self { items }),
            Ok(_) => Err(KvError::invalid_argument("config must be a JSON object")),
            Err(e) => Err(KvError::invalid_argument(format!("malformed config: {e}"))),
        }
    }

    /// Returns an item.
    pub fn get(&self, item: &str) -> Option<&Value> {
        self.items.get(item)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no items are set.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Renders the items as a JSON object.
    pub fn to_json(&self) -> String {
        Value::Object(self.items.clone()).to_string()
    }
}

/// Owned native config handle.
///
/// Deleted on drop unless [`into_raw`](Self::into_raw) hands it to the
/// engine's `open`, which takes ownership on success and failure alike.
pub(crate) struct NativeConfig {
    api: &'static EngineApi,
    raw: NonNull<KvConfig>,
}

impl NativeConfig {
    /// Allocates an empty native config, `None` if the engine is out of memory.
    pub(crate) fn new(api: &'static EngineApi) -> Option<Self> {
        // SAFETY: config_new has no preconditions.
        let raw = unsafe { (api.config_new)() };
        NonNull::new(raw).map(|raw| Self { api, raw })
    }

    /// Loads a JSON document and returns the raw status.
    pub(crate) fn load_json(&mut self, json: &CStr) -> c_int {
        // SAFETY: raw is a live config and json is null-terminated.
        unsafe { (self.api.config_from_json)(self.raw.as_ptr(), json.as_ptr()) }
    }

    /// Releases ownership of the handle.
    pub(crate) fn into_raw(self) -> *mut KvConfig {
        let raw = self.raw.as_ptr();
        std::mem::forget(self);
        raw
    }
}

impl Drop for NativeConfig {
    fn drop(&mut self) {
        // SAFETY: raw is live and owned by this handle.
        unsafe { (self.api.config_delete)(self.raw.as_ptr()) }
    }
}
