//! Error types and thread-local error messages.

use kvbridge_sys::Status;
use std::cell::RefCell;
use std::ffi::{c_char, CString};
use thiserror::Error;

/// Result type for engine operations.
pub type MemkvResult<T> = Result<T, MemkvError>;

/// Errors produced by the in-process engine.
///
/// Each variant maps onto exactly one ABI status code.
#[derive(Debug, Error)]
pub enum MemkvError {
    /// Key is not present.
    #[error("key not found")]
    NotFound,

    /// Operation is not implemented by the selected engine.
    #[error("{operation} is not supported by the {engine} engine")]
    NotSupported {
        /// The engine name.
        engine: &'static str,
        /// The rejected operation.
        operation: &'static str,
    },

    /// An argument has a wrong value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The JSON document could not be parsed.
    #[error("{0}")]
    ConfigParsing(String),

    /// A config item has an unexpected type.
    #[error("config item '{item}' has a different type than {expected}")]
    ConfigType {
        /// The offending item.
        item: String,
        /// Expected type name.
        expected: &'static str,
    },

    /// Capacity of the engine is exhausted.
    #[error("out of space: {needed} bytes needed, {available} available")]
    OutOfSpace {
        /// Bytes the operation needs.
        needed: u64,
        /// Bytes left.
        available: u64,
    },

    /// Engine name is not recognized.
    #[error("unknown engine name: {0}")]
    WrongEngineName(String),

    /// Iteration stopped because the callback returned non-zero.
    #[error("iteration stopped by callback")]
    StoppedByCallback,
}

impl MemkvError {
    /// Returns the ABI status for this error.
    pub fn status(&self) -> Status {
        match self {
            MemkvError::NotFound => Status::NotFound,
            MemkvError::NotSupported { .. } => Status::NotSupported,
            MemkvError::InvalidArgument(_) => Status::InvalidArgument,
            MemkvError::ConfigParsing(_) => Status::ConfigParsingError,
            MemkvError::ConfigType { .. } => Status::ConfigTypeError,
            MemkvError::OutOfSpace { .. } => Status::OutOfMemory,
            MemkvError::WrongEngineName(_) => Status::WrongEngineName,
            MemkvError::StoppedByCallback => Status::StoppedByCallback,
        }
    }
}

// Thread-local storage for the last error messages. The config parser keeps
// its own slot, as libpmemkv_json_config does.
thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
    static LAST_CONFIG_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

fn to_cstring(message: String) -> CString {
    CString::new(message).unwrap_or_else(|e| {
        let nul = e.nul_position();
        let mut bytes = e.into_vec();
        bytes.truncate(nul);
        CString::new(bytes).unwrap_or_default()
    })
}

/// Sets the last error message.
pub fn set_last_error(message: impl Into<String>) {
    let msg = to_cstring(message.into());
    LAST_ERROR.with(|e| *e.borrow_mut() = msg);
}

/// Clears the last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = CString::default());
}

/// Sets the last config parsing error message.
pub fn set_last_config_error(message: impl Into<String>) {
    let msg = to_cstring(message.into());
    LAST_CONFIG_ERROR.with(|e| *e.borrow_mut() = msg);
}

/// Clears the last config parsing error.
pub fn clear_last_config_error() {
    LAST_CONFIG_ERROR.with(|e| *e.borrow_mut() = CString::default());
}

/// Gets the last error message as a C string.
///
/// Never returns null; an empty string means no error was recorded.
/// The pointer is valid until the next engine call on this thread.
#[no_mangle]
pub extern "C" fn memkv_errormsg() -> *const c_char {
    LAST_ERROR.with(|e| e.borrow().as_ptr())
}

/// Gets the last config parsing error message as a C string.
///
/// The pointer is valid until the next config call on this thread.
#[no_mangle]
pub extern "C" fn memkv_config_from_json_errormsg() -> *const c_char {
    LAST_CONFIG_ERROR.with(|e| e.borrow().as_ptr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn statuses() {
        assert_eq!(MemkvError::NotFound.status(), Status::NotFound);
        assert_eq!(
            MemkvError::OutOfSpace { needed: 10, available: 2 }.status(),
            Status::OutOfMemory
        );
        assert_eq!(
            MemkvError::WrongEngineName("x".into()).status(),
            Status::WrongEngineName
        );
    }

    #[test]
    fn last_error() {
        clear_last_error();
        // Safety: the pointer is owned by the thread-local slot
        let empty = unsafe { CStr::from_ptr(memkv_errormsg()) };
        assert!(empty.to_bytes().is_empty());

        set_last_error("test error");
        let msg = unsafe { CStr::from_ptr(memkv_errormsg()) };
        assert_eq!(msg.to_str().unwrap(), "test error");

        clear_last_error();
        let cleared = unsafe { CStr::from_ptr(memkv_errormsg()) };
        assert!(cleared.to_bytes().is_empty());
    }

    #[test]
    fn config_error_slot_is_separate() {
        clear_last_error();
        set_last_config_error("bad json");
        let cfg = unsafe { CStr::from_ptr(memkv_config_from_json_errormsg()) };
        let main = unsafe { CStr::from_ptr(memkv_errormsg()) };
        assert_eq!(cfg.to_str().unwrap(), "bad json");
        assert!(main.to_bytes().is_empty());
        clear_last_config_error();
    }

    #[test]
    fn interior_nul_is_truncated() {
        set_last_error("before\0after");
        let msg = unsafe { CStr::from_ptr(memkv_errormsg()) };
        assert_eq!(msg.to_str().unwrap(), "before");
        clear_last_error();
    }
}
