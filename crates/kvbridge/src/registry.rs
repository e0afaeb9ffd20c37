//! Status-to-exception registry.
//!
//! Every non-OK engine status has a [`StatusDescriptor`] in a fixed table.
//! [`ExceptionRegistry::initialize`] walks that table once and asks an
//! [`ExceptionHost`] to materialize one host exception per status:
//!
//! - statuses with a host-native counterpart (not found, out of memory)
//!   reuse the host's own error kind
//! - every other status gets a new type derived from a single base type
//! - the base and every derived type are registered as lookupable symbols
//!
//! Initialization is all-or-nothing. If the host fails to create or register
//! any type, everything created so far is handed back to
//! [`ExceptionHost::release`] and no registry is returned.

use kvbridge_sys::Status;
use thiserror::Error;

/// Name of the common base error type.
pub const BASE_TYPE_NAME: &str = "Error";

/// Qualified name of the common base error type.
pub const BASE_QUALIFIED_NAME: &str = "kvbridge.Error";

/// Docstring of the common base error type.
pub const BASE_DOC: &str = "Base class of every error raised by the key-value engine";

/// Message used when the binding itself cannot allocate an object.
pub const BINDING_OOM_MESSAGE: &str = "Cannot allocate memory for internal objects";

/// Host-native error kinds some statuses map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    /// A lookup failed (`KeyError`, `io::ErrorKind::NotFound`).
    NotFound,
    /// Memory or device space is exhausted (`MemoryError`,
    /// `io::ErrorKind::OutOfMemory`).
    OutOfMemory,
}

impl NativeKind {
    /// Returns the matching `std::io` error kind.
    pub fn io_kind(self) -> std::io::ErrorKind {
        match self {
            NativeKind::NotFound => std::io::ErrorKind::NotFound,
            NativeKind::OutOfMemory => std::io::ErrorKind::OutOfMemory,
        }
    }
}

/// Registry entry describing how one status surfaces to the host.
#[derive(Debug, PartialEq, Eq)]
pub struct StatusDescriptor {
    /// The engine status.
    pub status: Status,
    /// Host-native kind to reuse instead of creating a new type.
    pub native: Option<NativeKind>,
    /// Symbol under which the derived type is registered.
    pub type_name: Option<&'static str>,
    /// Fully qualified name of the derived type.
    pub qualified_name: Option<&'static str>,
    /// Docstring of the type.
    pub message: &'static str,
}

impl StatusDescriptor {
    const fn derived(
        status: Status,
        type_name: &'static str,
        qualified_name: &'static str,
        message: &'static str,
    ) -> Self {
        Self {
            status,
            native: None,
            type_name: Some(type_name),
            qualified_name: Some(qualified_name),
            message,
        }
    }

    const fn native(status: Status, kind: NativeKind, message: &'static str) -> Self {
        Self {
            status,
            native: Some(kind),
            type_name: None,
            qualified_name: None,
            message,
        }
    }

    /// Returns the symbol name, falling back to the status macro name.
    pub fn symbol(&self) -> &'static str {
        self.type_name.unwrap_or(self.status.name())
    }
}

static DESCRIPTORS: [StatusDescriptor; 12] = [
    StatusDescriptor::derived(
        Status::UnknownError,
        "UnknownError",
        "kvbridge.UnknownError",
        "Something unexpected happened",
    ),
    StatusDescriptor::native(
        Status::NotFound,
        NativeKind::NotFound,
        "Database entry or config item not found",
    ),
    StatusDescriptor::derived(
        Status::NotSupported,
        "NotSupported",
        "kvbridge.NotSupported",
        "Function is not implemented by current engine",
    ),
    StatusDescriptor::derived(
        Status::InvalidArgument,
        "InvalidArgument",
        "kvbridge.InvalidArgument",
        "Argument to function has wrong value",
    ),
    StatusDescriptor::derived(
        Status::ConfigParsingError,
        "ConfigParsingError",
        "kvbridge.ConfigParsingError",
        "Processing config failed",
    ),
    StatusDescriptor::derived(
        Status::ConfigTypeError,
        "ConfigTypeError",
        "kvbridge.ConfigTypeError",
        "Config item has different type than expected",
    ),
    StatusDescriptor::derived(
        Status::StoppedByCallback,
        "StoppedByCallback",
        "kvbridge.StoppedByCallback",
        "Callback function aborted in an unexpected way",
    ),
    StatusDescriptor::native(
        Status::OutOfMemory,
        NativeKind::OutOfMemory,
        "Operation failed because there is not enough memory (or space on the device)",
    ),
    StatusDescriptor::derived(
        Status::WrongEngineName,
        "WrongEngineName",
        "kvbridge.WrongEngineName",
        "Engine name does not match any available engine",
    ),
    StatusDescriptor::derived(
        Status::TransactionScopeError,
        "TransactionScopeError",
        "kvbridge.TransactionScopeError",
        "An error with the scope of the libpmemobj transaction",
    ),
    StatusDescriptor::derived(
        Status::DefragError,
        "DefragError",
        "kvbridge.DefragError",
        "Database defragmentation failed",
    ),
    StatusDescriptor::derived(
        Status::ComparatorMismatch,
        "ComparatorMismatch",
        "kvbridge.ComparatorMismatch",
        "Comparator passed in config does not match the one stored in the pool",
    ),
];

/// Returns every descriptor, one per non-OK status.
pub fn descriptors() -> &'static [StatusDescriptor] {
    &DESCRIPTORS
}

/// Returns the descriptor for `status`, `None` only for [`Status::Ok`].
pub fn descriptor(status: Status) -> Option<&'static StatusDescriptor> {
    DESCRIPTORS.iter().find(|d| d.status == status)
}

/// Creates and registers host exception objects.
pub trait ExceptionHost {
    /// Handle to a host exception type.
    type Exception;
    /// Failure reported by the host, typically an allocation failure.
    type Error;

    /// Returns the host-native exception for `kind`.
    fn native(
        &mut self,
        kind: NativeKind,
        descriptor: &'static StatusDescriptor,
    ) -> Result<Self::Exception, Self::Error>;

    /// Creates the common base type.
    fn new_base(
        &mut self,
        type_name: &'static str,
        qualified_name: &'static str,
        doc: &'static str,
    ) -> Result<Self::Exception, Self::Error>;

    /// Creates a type derived from `base` for `descriptor`.
    fn new_derived(
        &mut self,
        descriptor: &'static StatusDescriptor,
        base: &Self::Exception,
    ) -> Result<Self::Exception, Self::Error>;

    /// Makes `exception` lookupable under `name`.
    fn register(&mut self, name: &'static str, exception: &Self::Exception)
        -> Result<(), Self::Error>;

    /// Releases an exception object created during a failed initialization.
    fn release(&mut self, exception: Self::Exception) {
        drop(exception);
    }
}

/// Result type for registry initialization.
pub type RegistryResult<T, E> = Result<T, RegistryError<E>>;

/// Registry initialization failed; nothing was published.
#[derive(Debug, Error)]
#[error("failed to initialize exception type {type_name}: {source}")]
pub struct RegistryError<E> {
    /// Qualified name of the type that could not be created or registered.
    pub type_name: &'static str,
    /// The host failure.
    #[source]
    pub source: E,
}

/// A status together with its host exception.
#[derive(Debug)]
pub struct RegisteredStatus<E> {
    descriptor: &'static StatusDescriptor,
    exception: E,
}

impl<E> RegisteredStatus<E> {
    /// Returns the descriptor.
    pub fn descriptor(&self) -> &'static StatusDescriptor {
        self.descriptor
    }

    /// Returns the host exception.
    pub fn exception(&self) -> &E {
        &self.exception
    }

    /// Returns the status.
    pub fn status(&self) -> Status {
        self.descriptor.status
    }
}

/// Fully initialized mapping from every non-OK status to a host exception.
#[derive(Debug)]
pub struct ExceptionRegistry<E> {
    base: E,
    entries: Vec<RegisteredStatus<E>>,
}

impl<E> ExceptionRegistry<E> {
    /// Creates every host exception object and registers the symbols.
    ///
    /// # Errors
    ///
    /// Returns the first host failure. Every object created before the
    /// failure has been passed to [`ExceptionHost::release`].
    pub fn initialize<H>(host: &mut H) -> RegistryResult<Self, H::Error>
    where
        H: ExceptionHost<Exception = E>,
    {
        let base = host
            .new_base(BASE_TYPE_NAME, BASE_QUALIFIED_NAME, BASE_DOC)
            .map_err(|source| RegistryError {
                type_name: BASE_QUALIFIED_NAME,
                source,
            })?;
        if let Err(source) = host.register(BASE_TYPE_NAME, &base) {
            host.release(base);
            return Err(RegistryError {
                type_name: BASE_QUALIFIED_NAME,
                source,
            });
        }

        let mut entries: Vec<RegisteredStatus<E>> = Vec::with_capacity(DESCRIPTORS.len());
        for descriptor in &DESCRIPTORS {
            match Self::create(host, descriptor, &base) {
                Ok(exception) => entries.push(RegisteredStatus {
                    descriptor,
                    exception,
                }),
                Err(source) => {
                    tracing::debug!(
                        status = %descriptor.status,
                        created = entries.len(),
                        "exception registry initialization failed, releasing partial state"
                    );
                    for entry in entries.into_iter().rev() {
                        host.release(entry.exception);
                    }
                    host.release(base);
                    return Err(RegistryError {
                        type_name: descriptor.qualified_name.unwrap_or(descriptor.status.name()),
                        source,
                    });
                }
            }
        }

        tracing::debug!(entries = entries.len(), "exception registry initialized");
        Ok(Self { base, entries })
    }

    fn create<H>(
        host: &mut H,
        descriptor: &'static StatusDescriptor,
        base: &E,
    ) -> Result<E, H::Error>
    where
        H: ExceptionHost<Exception = E>,
    {
        if let Some(kind) = descriptor.native {
            return host.native(kind, descriptor);
        }
        let exception = host.new_derived(descriptor, base)?;
        if let Err(e) = host.register(descriptor.symbol(), &exception) {
            host.release(exception);
            return Err(e);
        }
        Ok(exception)
    }

    /// Returns the entry for `status`, `None` only for [`Status::Ok`].
    pub fn resolve(&self, status: Status) -> Option<&RegisteredStatus<E>> {
        self.entries.iter().find(|e| e.descriptor.status == status)
    }

    /// Returns the common base type.
    pub fn base(&self) -> &E {
        &self.base
    }

    /// Iterates over all entries in status order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredStatus<E>> {
        self.entries.iter()
    }

    /// Iterates over the registered symbols: the base, then every derived type.
    pub fn symbols(&self) -> impl Iterator<Item = (&'static str, &E)> {
        std::iter::once((BASE_TYPE_NAME, &self.base)).chain(
            self.entries
                .iter()
                .filter(|e| e.descriptor.native.is_none())
                .map(|e| (e.descriptor.symbol(), &e.exception)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq)]
    #[error("allocation failed")]
    struct AllocFailed;

    /// Host that hands out numbered objects and can fail on demand.
    #[derive(Default)]
    struct CountingHost {
        next: usize,
        fail_at: Option<usize>,
        fail_register: Option<&'static str>,
        symbols: BTreeMap<&'static str, usize>,
        released: Vec<usize>,
    }

    impl CountingHost {
        fn alloc(&mut self) -> Result<usize, AllocFailed> {
            if self.fail_at == Some(self.next) {
                return Err(AllocFailed);
            }
            self.next += 1;
            Ok(self.next)
        }
    }

    impl ExceptionHost for CountingHost {
        type Exception = usize;
        type Error = AllocFailed;

        fn native(&mut self, kind: NativeKind, _: &'static StatusDescriptor) -> Result<usize, AllocFailed> {
            Ok(match kind {
                NativeKind::NotFound => 1000,
                NativeKind::OutOfMemory => 2000,
            })
        }

        fn new_base(&mut self, _: &'static str, _: &'static str, _: &'static str) -> Result<usize, AllocFailed> {
            self.alloc()
        }

        fn new_derived(&mut self, _: &'static StatusDescriptor, _: &usize) -> Result<usize, AllocFailed> {
            self.alloc()
        }

        fn register(&mut self, name: &'static str, exception: &usize) -> Result<(), AllocFailed> {
            if self.fail_register == Some(name) {
                return Err(AllocFailed);
            }
            self.symbols.insert(name, *exception);
            Ok(())
        }

        fn release(&mut self, exception: usize) {
            self.released.push(exception);
        }
    }

    #[test]
    fn every_error_status_has_a_descriptor() {
        for status in Status::ALL {
            match status {
                Status::Ok => assert!(descriptor(status).is_none()),
                other => {
                    let d = descriptor(other).unwrap();
                    assert_eq!(d.status, other);
                    assert!(!d.message.is_empty());
                    assert_eq!(d.native.is_some(), d.type_name.is_none());
                }
            }
        }
        assert_eq!(descriptors().len(), Status::ALL.len() - 1);
    }

    #[test]
    fn native_statuses() {
        assert_eq!(descriptor(Status::NotFound).unwrap().native, Some(NativeKind::NotFound));
        assert_eq!(
            descriptor(Status::OutOfMemory).unwrap().native,
            Some(NativeKind::OutOfMemory)
        );
        assert_eq!(NativeKind::NotFound.io_kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn initialize_creates_and_registers() {
        let mut host = CountingHost::default();
        let registry = ExceptionRegistry::initialize(&mut host).unwrap();

        assert_eq!(*registry.base(), 1);
        assert_eq!(host.symbols.get(BASE_TYPE_NAME), Some(&1));
        assert_eq!(host.symbols.len(), 11);
        assert!(host.released.is_empty());

        assert_eq!(*registry.resolve(Status::NotFound).unwrap().exception(), 1000);
        assert_eq!(*registry.resolve(Status::OutOfMemory).unwrap().exception(), 2000);
        let unknown = registry.resolve(Status::UnknownError).unwrap();
        assert_eq!(host.symbols.get("UnknownError"), Some(unknown.exception()));
        assert!(registry.resolve(Status::Ok).is_none());

        let symbols: Vec<_> = registry.symbols().map(|(name, _)| name).collect();
        assert_eq!(symbols.len(), 11);
        assert_eq!(symbols[0], BASE_TYPE_NAME);
        assert!(!symbols.contains(&"NotFound"));
    }

    #[test]
    fn base_failure_publishes_nothing() {
        let mut host = CountingHost {
            fail_at: Some(0),
            ..Default::default()
        };
        let err = ExceptionRegistry::initialize(&mut host).unwrap_err();
        assert_eq!(err.type_name, BASE_QUALIFIED_NAME);
        assert_eq!(err.source, AllocFailed);
        assert!(host.symbols.is_empty());
    }

    #[test]
    fn derived_failure_releases_partial_state() {
        // Base is object 1, UnknownError 2, NotSupported 3, InvalidArgument 4.
        let mut host = CountingHost {
            fail_at: Some(4),
            ..Default::default()
        };
        let err = ExceptionRegistry::initialize(&mut host).unwrap_err();
        assert_eq!(err.type_name, "kvbridge.ConfigParsingError");
        assert!(err.to_string().contains("allocation failed"));

        // Reverse creation order: InvalidArgument, NotSupported, NotFound,
        // UnknownError, then the base.
        assert_eq!(host.released, vec![4, 3, 1000, 2, 1]);
    }

    #[test]
    fn register_failure_releases_the_unregistered_type() {
        let mut host = CountingHost {
            fail_register: Some("NotSupported"),
            ..Default::default()
        };
        let err = ExceptionRegistry::initialize(&mut host).unwrap_err();
        assert_eq!(err.type_name, "kvbridge.NotSupported");
        assert_eq!(host.released, vec![3, 1000, 2, 1]);
    }
}
