//! Error classes for Rust callers.
//!
//! The Rust side of the binding is an [`ExceptionHost`] like any other: the
//! process-wide [`ErrorClasses`] table is built through
//! [`ExceptionRegistry::initialize`] on first use and every [`EngineError`]
//! carries the class its status resolved to.
//!
//! [`EngineError`]: crate::EngineError

use crate::error::{EngineError, KvError, KvResult};
use crate::registry::{ExceptionHost, ExceptionRegistry, NativeKind, StatusDescriptor};
use kvbridge_sys::Status;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::ffi::c_int;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Where an error class comes from.
#[derive(Debug)]
pub enum ClassOrigin {
    /// Stands in for a host-native error kind.
    Native(NativeKind),
    /// The common base class.
    Base,
    /// Derived from the base class.
    Derived(Arc<ErrorClass>),
}

/// A named error type that engine statuses resolve to.
#[derive(Debug)]
pub struct ErrorClass {
    name: &'static str,
    qualified_name: &'static str,
    doc: &'static str,
    origin: ClassOrigin,
}

impl ErrorClass {
    /// Short name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fully qualified name.
    pub fn qualified_name(&self) -> &'static str {
        self.qualified_name
    }

    /// Class docstring.
    pub fn doc(&self) -> &'static str {
        self.doc
    }

    /// Where the class comes from.
    pub fn origin(&self) -> &ClassOrigin {
        &self.origin
    }

    /// Returns the native kind this class stands for, if any.
    pub fn native_kind(&self) -> Option<NativeKind> {
        match self.origin {
            ClassOrigin::Native(kind) => Some(kind),
            _ => None,
        }
    }

    /// Returns the parent class, if any.
    pub fn parent(&self) -> Option<&Arc<ErrorClass>> {
        match &self.origin {
            ClassOrigin::Derived(base) => Some(base),
            _ => None,
        }
    }

    /// Returns true if `self` is `other` or derives from it.
    pub fn is_subclass_of(&self, other: &ErrorClass) -> bool {
        std::ptr::eq(self, other) || self.parent().is_some_and(|p| p.is_subclass_of(other))
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.qualified_name)
    }
}

/// [`ExceptionHost`] producing [`ErrorClass`] values.
#[derive(Debug, Default)]
pub struct ClassHost {
    symbols: BTreeMap<&'static str, Arc<ErrorClass>>,
}

impl ExceptionHost for ClassHost {
    type Exception = Arc<ErrorClass>;
    type Error = Infallible;

    fn native(
        &mut self,
        kind: NativeKind,
        descriptor: &'static StatusDescriptor,
    ) -> Result<Arc<ErrorClass>, Infallible> {
        let (name, qualified_name) = match kind {
            NativeKind::NotFound => ("NotFound", "std::io::ErrorKind::NotFound"),
            NativeKind::OutOfMemory => ("OutOfMemory", "std::io::ErrorKind::OutOfMemory"),
        };
        Ok(Arc::new(ErrorClass {
            name,
            qualified_name,
            doc: descriptor.message,
            origin: ClassOrigin::Native(kind),
        }))
    }

    fn new_base(
        &mut self,
        type_name: &'static str,
        qualified_name: &'static str,
        doc: &'static str,
    ) -> Result<Arc<ErrorClass>, Infallible> {
        Ok(Arc::new(ErrorClass {
            name: type_name,
            qualified_name,
            doc,
            origin: ClassOrigin::Base,
        }))
    }

    fn new_derived(
        &mut self,
        descriptor: &'static StatusDescriptor,
        base: &Arc<ErrorClass>,
    ) -> Result<Arc<ErrorClass>, Infallible> {
        Ok(Arc::new(ErrorClass {
            name: descriptor.symbol(),
            qualified_name: descriptor.qualified_name.unwrap_or(descriptor.status.name()),
            doc: descriptor.message,
            origin: ClassOrigin::Derived(Arc::clone(base)),
        }))
    }

    fn register(&mut self, name: &'static str, exception: &Arc<ErrorClass>) -> Result<(), Infallible> {
        self.symbols.insert(name, Arc::clone(exception));
        Ok(())
    }
}

static CLASSES: OnceLock<ErrorClasses> = OnceLock::new();

/// The process-wide status-to-class table.
#[derive(Debug)]
pub struct ErrorClasses {
    registry: ExceptionRegistry<Arc<ErrorClass>>,
    symbols: BTreeMap<&'static str, Arc<ErrorClass>>,
}

impl ErrorClasses {
    /// Returns the table, building it on first use.
    pub fn global() -> &'static ErrorClasses {
        CLASSES.get_or_init(Self::build)
    }

    fn build() -> Self {
        let mut host = ClassHost::default();
        let registry = match ExceptionRegistry::initialize(&mut host) {
            Ok(registry) => registry,
            Err(e) => match e.source {},
        };
        Self {
            registry,
            symbols: host.symbols,
        }
    }

    /// Returns the class for `status`, `None` only for [`Status::Ok`].
    pub fn resolve(&self, status: Status) -> Option<&Arc<ErrorClass>> {
        self.registry.resolve(status).map(|e| e.exception())
    }

    /// Returns the common base class.
    pub fn base(&self) -> &Arc<ErrorClass> {
        self.registry.base()
    }

    /// Looks up a registered class by symbol name.
    pub fn lookup(&self, name: &str) -> Option<&Arc<ErrorClass>> {
        self.symbols.get(name)
    }

    /// Iterates over the registered symbol names, base first.
    pub fn symbols(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registry.symbols().map(|(name, _)| name)
    }

    /// Returns the underlying registry.
    pub fn registry(&self) -> &ExceptionRegistry<Arc<ErrorClass>> {
        &self.registry
    }

    /// Turns a raw status code into a result.
    ///
    /// `message` is only called for non-OK codes. Codes outside the known
    /// set become [`KvError::UnmappedStatus`].
    pub fn check(&self, code: c_int, message: impl FnOnce() -> String) -> KvResult<()> {
        let Some(status) = Status::from_code(code) else {
            tracing::error!(code, "engine returned an unmapped status code");
            return Err(KvError::UnmappedStatus { code });
        };
        if status.is_ok() {
            return Ok(());
        }
        match self.resolve(status) {
            Some(class) => Err(EngineError::new(status, Arc::clone(class), message()).into()),
            None => Err(KvError::UnmappedStatus { code }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BASE_TYPE_NAME;

    #[test]
    fn every_status_resolves_to_one_class() {
        let classes = ErrorClasses::global();
        for status in Status::ALL {
            let first = classes.resolve(status);
            let second = classes.resolve(status);
            match (first, second) {
                (None, None) => assert_eq!(status, Status::Ok),
                (Some(a), Some(b)) => assert!(Arc::ptr_eq(a, b)),
                _ => unreachable!(),
            }
        }
    }

    #[test]
    fn derived_classes_extend_the_base() {
        let classes = ErrorClasses::global();
        let base = classes.base();
        for status in [
            Status::UnknownError,
            Status::NotSupported,
            Status::InvalidArgument,
            Status::ConfigParsingError,
            Status::ConfigTypeError,
            Status::StoppedByCallback,
            Status::WrongEngineName,
            Status::TransactionScopeError,
            Status::DefragError,
            Status::ComparatorMismatch,
        ] {
            let class = classes.resolve(status).unwrap();
            assert!(class.is_subclass_of(base), "{status}");
            assert!(!std::ptr::eq(class.as_ref(), base.as_ref()));
            assert!(Arc::ptr_eq(classes.lookup(class.name()).unwrap(), class));
        }
    }

    #[test]
    fn native_classes_stand_alone() {
        let classes = ErrorClasses::global();
        let not_found = classes.resolve(Status::NotFound).unwrap();
        assert_eq!(not_found.native_kind(), Some(NativeKind::NotFound));
        assert!(!not_found.is_subclass_of(classes.base()));
        assert!(classes.lookup("NotFound").is_none());

        let oom = classes.resolve(Status::OutOfMemory).unwrap();
        assert_eq!(oom.native_kind(), Some(NativeKind::OutOfMemory));
    }

    #[test]
    fn symbols_are_base_plus_derived() {
        let classes = ErrorClasses::global();
        let symbols: Vec<_> = classes.symbols().collect();
        assert_eq!(symbols.first(), Some(&BASE_TYPE_NAME));
        assert_eq!(symbols.len(), 11);
        assert_eq!(
            classes.lookup("ConfigTypeError").unwrap().qualified_name(),
            "kvbridge.ConfigTypeError"
        );
    }

    #[test]
    fn check_maps_codes() {
        let classes = ErrorClasses::global();
        assert!(classes.check(0, || unreachable!()).is_ok());

        let err = classes.check(4, || "bad key".to_owned()).unwrap_err();
        assert_eq!(err.status(), Some(Status::InvalidArgument));
        assert_eq!(err.to_string(), "kvbridge.InvalidArgument: bad key");

        let err = classes.check(99, || unreachable!()).unwrap_err();
        assert!(matches!(err, KvError::UnmappedStatus { code: 99 }));
        let err = classes.check(-1, String::new).unwrap_err();
        assert!(matches!(err, KvError::UnmappedStatus { code: -1 }));
    }
}
