//! Error types for the binding.

use crate::classes::ErrorClass;
use crate::registry::NativeKind;
use kvbridge_sys::Status;
use std::ffi::c_int;
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Error a host callback may return to abort an iteration.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for host callbacks.
pub type CallbackResult = Result<(), CallbackError>;

/// Result type for binding operations.
pub type KvResult<T> = Result<T, KvError>;

/// A non-OK status reported by the engine.
///
/// Carries the error class the status resolved to and the engine's last
/// error message, read right after the failing call.
#[derive(Debug, Clone)]
pub struct EngineError {
    status: Status,
    class: Arc<ErrorClass>,
    message: String,
}

impl EngineError {
    pub(crate) fn new(status: Status, class: Arc<ErrorClass>, message: String) -> Self {
        Self {
            status,
            class,
            message,
        }
    }

    /// The engine status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The error class the status resolved to.
    pub fn class(&self) -> &Arc<ErrorClass> {
        &self.class
    }

    /// The engine's error message, possibly empty.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the `std::io` kind for natively mapped statuses.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        self.class.native_kind().map(NativeKind::io_kind)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}: {}", self.class, self.class.doc())
        } else {
            write!(f, "{}: {}", self.class, self.message)
        }
    }
}

impl std::error::Error for EngineError {}

/// Errors returned by [`Database`](crate::Database) operations.
#[derive(Debug, Error)]
pub enum KvError {
    /// The engine reported a non-OK status.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A host callback returned an error and the iteration was aborted.
    #[error("callback failed: {0}")]
    Callback(#[source] CallbackError),

    /// A host callback panicked and the iteration was aborted.
    #[error("callback panicked: {message}")]
    CallbackPanicked {
        /// The panic payload, if it was a string.
        message: String,
    },

    /// The engine returned a status code outside the known set.
    #[error("engine returned unknown status code {code}")]
    UnmappedStatus {
        /// The raw code.
        code: c_int,
    },

    /// An argument was rejected before reaching the engine.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong.
        message: String,
    },

    /// The database has been closed.
    #[error("database is closed")]
    Closed,

    /// The engine could not allocate a config object.
    #[error("cannot allocate config: {message}")]
    ConfigAlloc {
        /// The engine's error message.
        message: String,
    },
}

impl KvError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        KvError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns the engine status, if the error came from the engine.
    pub fn status(&self) -> Option<Status> {
        match self {
            KvError::Engine(e) => Some(e.status()),
            _ => None,
        }
    }

    /// Returns the error class, if the error came from the engine.
    pub fn class(&self) -> Option<&Arc<ErrorClass>> {
        match self {
            KvError::Engine(e) => Some(e.class()),
            _ => None,
        }
    }

    /// Returns true for the engine's not-found status.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(Status::NotFound)
    }

    /// Returns true if a host callback aborted the operation.
    pub fn is_callback(&self) -> bool {
        matches!(self, KvError::Callback(_) | KvError::CallbackPanicked { .. })
    }

    /// Downcasts a callback error to the type the callback returned.
    pub fn callback_error<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            KvError::Callback(e) => e.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Takes the callback error out, returning `self` unchanged otherwise.
    pub fn into_callback_error(self) -> Result<CallbackError, KvError> {
        match self {
            KvError::Callback(e) => Ok(e),
            other => Err(other),
        }
    }
}

impl From<KvError> for io::Error {
    fn from(err: KvError) -> Self {
        let kind = match &err {
            KvError::Engine(e) => e.io_kind().unwrap_or(io::ErrorKind::Other),
            KvError::InvalidArgument { .. } => io::ErrorKind::InvalidInput,
            KvError::ConfigAlloc { .. } => io::ErrorKind::OutOfMemory,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ErrorClasses;

    fn engine_error(status: Status, message: &str) -> KvError {
        let class = ErrorClasses::global().resolve(status).unwrap();
        EngineError::new(status, Arc::clone(class), message.to_owned()).into()
    }

    #[test]
    fn display_uses_qualified_name() {
        let err = engine_error(Status::WrongEngineName, "unknown engine name: foo");
        assert_eq!(
            err.to_string(),
            "kvbridge.WrongEngineName: unknown engine name: foo"
        );

        let err = engine_error(Status::UnknownError, "");
        assert_eq!(
            err.to_string(),
            "kvbridge.UnknownError: Something unexpected happened"
        );
    }

    #[test]
    fn native_statuses_map_to_io_kinds() {
        let err = engine_error(Status::NotFound, "");
        assert!(err.is_not_found());
        assert_eq!(io::Error::from(err).kind(), io::ErrorKind::NotFound);

        let err = engine_error(Status::OutOfMemory, "out of space");
        assert_eq!(io::Error::from(err).kind(), io::ErrorKind::OutOfMemory);

        let err = engine_error(Status::NotSupported, "");
        assert_eq!(io::Error::from(err).kind(), io::ErrorKind::Other);
    }

    #[test]
    fn callback_errors_downcast() {
        #[derive(Debug, Error, PartialEq)]
        #[error("stop here")]
        struct Stop;

        let err = KvError::Callback(Box::new(Stop));
        assert!(err.is_callback());
        assert_eq!(err.status(), None);
        assert_eq!(err.callback_error::<Stop>(), Some(&Stop));
        assert!(err.to_string().contains("stop here"));

        let inner = err.into_callback_error().unwrap();
        assert!(inner.downcast_ref::<Stop>().is_some());

        let other = KvError::Closed.into_callback_error().unwrap_err();
        assert!(matches!(other, KvError::Closed));
    }

    #[test]
    fn binding_errors_have_no_status() {
        assert_eq!(KvError::Closed.status(), None);
        assert_eq!(KvError::UnmappedStatus { code: 42 }.status(), None);
        let err = KvError::invalid_argument("engine name contains a NUL byte");
        assert_eq!(io::Error::from(err).kind(), io::ErrorKind::InvalidInput);
    }
}
