//! Engine status codes.

use std::ffi::c_int;
use std::fmt;

/// Operation succeeded.
pub const STATUS_OK: c_int = 0;
/// Something unexpected happened.
pub const STATUS_UNKNOWN_ERROR: c_int = 1;
/// Entry or config item not found.
pub const STATUS_NOT_FOUND: c_int = 2;
/// Operation not implemented by the engine.
pub const STATUS_NOT_SUPPORTED: c_int = 3;
/// Argument has a wrong value.
pub const STATUS_INVALID_ARGUMENT: c_int = 4;
/// Processing the config failed.
pub const STATUS_CONFIG_PARSING_ERROR: c_int = 5;
/// Config item has a different type than expected.
pub const STATUS_CONFIG_TYPE_ERROR: c_int = 6;
/// A callback asked the engine to stop iterating.
pub const STATUS_STOPPED_BY_CB: c_int = 7;
/// Not enough memory or space on the device.
pub const STATUS_OUT_OF_MEMORY: c_int = 8;
/// Engine name does not match any available engine.
pub const STATUS_WRONG_ENGINE_NAME: c_int = 9;
/// Error in the scope of a libpmemobj transaction.
pub const STATUS_TRANSACTION_SCOPE_ERROR: c_int = 10;
/// Defragmentation failed.
pub const STATUS_DEFRAG_ERROR: c_int = 11;
/// Comparator does not match the one stored in the pool.
pub const STATUS_COMPARATOR_MISMATCH: c_int = 12;

/// Status code returned by every engine operation.
///
/// The set is closed: [`Status::from_code`] returns `None` for anything the
/// engine ABI does not define, and callers must treat that as a fault rather
/// than substituting a default.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    /// Operation succeeded.
    Ok = STATUS_OK,
    /// Something unexpected happened.
    UnknownError = STATUS_UNKNOWN_ERROR,
    /// Entry or config item not found.
    NotFound = STATUS_NOT_FOUND,
    /// Operation not implemented by the engine.
    NotSupported = STATUS_NOT_SUPPORTED,
    /// Argument has a wrong value.
    InvalidArgument = STATUS_INVALID_ARGUMENT,
    /// Processing the config failed.
    ConfigParsingError = STATUS_CONFIG_PARSING_ERROR,
    /// Config item has a different type than expected.
    ConfigTypeError = STATUS_CONFIG_TYPE_ERROR,
    /// A callback asked the engine to stop iterating.
    StoppedByCallback = STATUS_STOPPED_BY_CB,
    /// Not enough memory or space on the device.
    OutOfMemory = STATUS_OUT_OF_MEMORY,
    /// Engine name does not match any available engine.
    WrongEngineName = STATUS_WRONG_ENGINE_NAME,
    /// Error in the scope of a libpmemobj transaction.
    TransactionScopeError = STATUS_TRANSACTION_SCOPE_ERROR,
    /// Defragmentation failed.
    DefragError = STATUS_DEFRAG_ERROR,
    /// Comparator does not match the one stored in the pool.
    ComparatorMismatch = STATUS_COMPARATOR_MISMATCH,
}

impl Status {
    /// Every status the ABI defines, in code order.
    pub const ALL: [Status; 13] = [
        Status::Ok,
        Status::UnknownError,
        Status::NotFound,
        Status::NotSupported,
        Status::InvalidArgument,
        Status::ConfigParsingError,
        Status::ConfigTypeError,
        Status::StoppedByCallback,
        Status::OutOfMemory,
        Status::WrongEngineName,
        Status::TransactionScopeError,
        Status::DefragError,
        Status::ComparatorMismatch,
    ];

    /// Converts a raw code, returning `None` for codes outside the ABI.
    pub fn from_code(code: c_int) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.code() == code)
    }

    /// Returns the raw code.
    pub const fn code(self) -> c_int {
        self as c_int
    }

    /// Returns true for [`Status::Ok`].
    pub const fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }

    /// Returns the C macro name of this status.
    pub const fn name(self) -> &'static str {
        match self {
            Status::Ok => "PMEMKV_STATUS_OK",
            Status::UnknownError => "PMEMKV_STATUS_UNKNOWN_ERROR",
            Status::NotFound => "PMEMKV_STATUS_NOT_FOUND",
            Status::NotSupported => "PMEMKV_STATUS_NOT_SUPPORTED",
            Status::InvalidArgument => "PMEMKV_STATUS_INVALID_ARGUMENT",
            Status::ConfigParsingError => "PMEMKV_STATUS_CONFIG_PARSING_ERROR",
            Status::ConfigTypeError => "PMEMKV_STATUS_CONFIG_TYPE_ERROR",
            Status::StoppedByCallback => "PMEMKV_STATUS_STOPPED_BY_CB",
            Status::OutOfMemory => "PMEMKV_STATUS_OUT_OF_MEMORY",
            Status::WrongEngineName => "PMEMKV_STATUS_WRONG_ENGINE_NAME",
            Status::TransactionScopeError => "PMEMKV_STATUS_TRANSACTION_SCOPE_ERROR",
            Status::DefragError => "PMEMKV_STATUS_DEFRAG_ERROR",
            Status::ComparatorMismatch => "PMEMKV_STATUS_COMPARATOR_MISMATCH",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Status> for c_int {
    fn from(status: Status) -> Self {
        status.code()
    }
}
