//! Engine configuration objects.

use crate::error::{MemkvError, MemkvResult};
use serde_json::{Map, Value};
use std::cell::Cell;

thread_local! {
    static LIVE_CONFIGS: Cell<isize> = const { Cell::new(0) };
}

/// Returns the number of config objects allocated on this thread that have
/// not been freed (by `config_delete` or by `open`) on this thread.
///
/// Accounting is per thread so that tests running in parallel do not see
/// each other's allocations.
pub fn live_configs() -> isize {
    LIVE_CONFIGS.with(Cell::get)
}

/// A set of typed config items.
#[derive(Debug)]
pub struct MemConfig {
    items: Map<String, Value>,
}

impl MemConfig {
    /// Creates an empty config and records the allocation.
    pub fn new() -> Self {
        LIVE_CONFIGS.with(|c| c.set(c.get() + 1));
        Self { items: Map::new() }
    }

    /// Loads items from a JSON document.
    ///
    /// The document must be a JSON object. Items already present are
    /// replaced by the document's values.
    pub fn load_json(&mut self, text: &str) -> MemkvResult<()> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| MemkvError::ConfigParsing(format!("config parsing failed: {e}")))?;
        match value {
            Value::Object(items) => {
                self.items.extend(items);
                Ok(())
            }
            other => Err(MemkvError::ConfigParsing(format!(
                "config parsing failed: expected a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Returns a string item.
    pub fn get_string(&self, item: &str) -> MemkvResult<Option<&str>> {
        match self.items.get(item) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(type_error(item, "string")),
        }
    }

    /// Returns an unsigned integer item.
    pub fn get_uint(&self, item: &str) -> MemkvResult<Option<u64>> {
        match self.items.get(item) {
            None => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| type_error(item, "unsigned integer")),
        }
    }

    /// Returns a boolean item.
    pub fn get_bool(&self, item: &str) -> MemkvResult<Option<bool>> {
        match self.items.get(item) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(type_error(item, "bool")),
        }
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no items are set.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for MemConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemConfig {
    fn drop(&mut self) {
        LIVE_CONFIGS.with(|c| c.set(c.get() - 1));
    }
}

fn type_error(item: &str, expected: &'static str) -> MemkvError {
    MemkvError::ConfigType {
        item: item.to_owned(),
        expected,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvbridge_sys::Status;

    #[test]
    fn typed_items() {
        let mut config = MemConfig::new();
        config
            .load_json(r#"{"path": "/tmp/kv", "size": 1024, "force_create": true}"#)
            .unwrap();

        assert_eq!(config.len(), 3);
        assert_eq!(config.get_string("path").unwrap(), Some("/tmp/kv"));
        assert_eq!(config.get_uint("size").unwrap(), Some(1024));
        assert_eq!(config.get_bool("force_create").unwrap(), Some(true));
        assert_eq!(config.get_uint("missing").unwrap(), None);
    }

    #[test]
    fn wrong_type_is_a_type_error() {
        let mut config = MemConfig::new();
        config.load_json(r#"{"size": "large"}"#).unwrap();
        let err = config.get_uint("size").unwrap_err();
        assert_eq!(err.status(), Status::ConfigTypeError);

        let mut config = MemConfig::new();
        config.load_json(r#"{"size": -5}"#).unwrap();
        assert_eq!(config.get_uint("size").unwrap_err().status(), Status::ConfigTypeError);
    }

    #[test]
    fn malformed_json_is_a_parsing_error() {
        let mut config = MemConfig::new();
        let err = config.load_json("{\"path\": ").unwrap_err();
        assert_eq!(err.status(), Status::ConfigParsingError);
        assert!(config.is_empty());
    }

    #[test]
    fn non_object_is_a_parsing_error() {
        let mut config = MemConfig::new();
        let err = config.load_json("[1, 2, 3]").unwrap_err();
        assert_eq!(err.status(), Status::ConfigParsingError);
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn accounting_tracks_drops() {
        let before = live_configs();
        let a = MemConfig::new();
        let b = MemConfig::new();
        assert_eq!(live_configs(), before + 2);
        drop(a);
        drop(b);
        assert_eq!(live_configs(), before);
    }
}
