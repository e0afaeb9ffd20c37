//! Python bindings for kvbridge.
//!
//! This crate provides the `_kvbridge` extension module using PyO3:
//! - `Database`, the engine facade with callback-based reads
//! - `ValueBuffer`, a read-only buffer lent to callbacks
//! - One exception type per engine status, derived from `Error`; missing
//!   keys raise `KeyError` and exhausted space raises `MemoryError`

use kvbridge::{
    BorrowedView, CallbackResult, Database as CoreDatabase, EngineApi, ExceptionHost,
    ExceptionRegistry, KvError, NativeKind, Status, StatusDescriptor, BINDING_OOM_MESSAGE,
};
use pyo3::buffer::PyBuffer;
use pyo3::exceptions::{PyBufferError, PyKeyError, PyMemoryError, PyRuntimeError, PyValueError};
use pyo3::ffi;
use pyo3::panic::PanicException;
use pyo3::prelude::*;
use pyo3::sync::GILOnceCell;
use pyo3::types::{PyBytes, PyString, PyType};
use std::borrow::Cow;
use std::cell::Cell;
use std::ffi::{c_int, c_void, CString};

/// Library version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

static REGISTRY: GILOnceCell<ExceptionRegistry<Py<PyType>>> = GILOnceCell::new();

/// Creates exception types inside the extension module.
struct PyExceptionHost<'a, 'py> {
    module: &'a Bound<'py, PyModule>,
}

fn c_string(text: &str) -> PyResult<CString> {
    CString::new(text).map_err(|e| PyValueError::new_err(e.to_string()))
}

impl ExceptionHost for PyExceptionHost<'_, '_> {
    type Exception = Py<PyType>;
    type Error = PyErr;

    fn native(&mut self, kind: NativeKind, _: &'static StatusDescriptor) -> PyResult<Py<PyType>> {
        let py = self.module.py();
        let ty = match kind {
            NativeKind::NotFound => py.get_type::<PyKeyError>(),
            NativeKind::OutOfMemory => py.get_type::<PyMemoryError>(),
        };
        Ok(ty.unbind())
    }

    fn new_base(
        &mut self,
        _: &'static str,
        qualified_name: &'static str,
        doc: &'static str,
    ) -> PyResult<Py<PyType>> {
        let py = self.module.py();
        let name = c_string(qualified_name)?;
        let doc = c_string(doc)?;
        PyErr::new_type(py, &name, Some(&doc), None, None)
    }

    fn new_derived(
        &mut self,
        descriptor: &'static StatusDescriptor,
        base: &Py<PyType>,
    ) -> PyResult<Py<PyType>> {
        let py = self.module.py();
        let name = c_string(descriptor.qualified_name.unwrap_or(descriptor.status.name()))?;
        let doc = c_string(descriptor.message)?;
        PyErr::new_type(py, &name, Some(&doc), Some(base.bind(py)), None)
    }

    fn register(&mut self, name: &'static str, exception: &Py<PyType>) -> PyResult<()> {
        self.module.add(name, exception.bind(self.module.py()))
    }
}

/// Builds the exception registry once per process and publishes its
/// symbols in `module`.
fn install_exceptions(module: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = module.py();
    if let Some(registry) = REGISTRY.get(py) {
        // Re-import: publish the existing types again.
        for (name, exception) in registry.symbols() {
            module.add(name, exception.bind(py))?;
        }
        return Ok(());
    }

    let mut host = PyExceptionHost { module };
    let registry = ExceptionRegistry::initialize(&mut host).map_err(|e| e.source)?;
    // The GIL is held for the whole initialization, so no other thread can
    // have filled the cell meanwhile.
    let _ = REGISTRY.set(py, registry);
    Ok(())
}

fn raise(py: Python<'_>, status: Status, message: &str) -> PyErr {
    let Some(entry) = REGISTRY.get(py).and_then(|r| r.resolve(status)) else {
        return PyRuntimeError::new_err(format!("{status}: {message}"));
    };
    let message = if message.is_empty() {
        entry.descriptor().message
    } else {
        message
    };
    PyErr::from_type(entry.exception().bind(py).clone(), message.to_owned())
}

fn raise_base(py: Python<'_>, message: String) -> PyErr {
    match REGISTRY.get(py) {
        Some(registry) => PyErr::from_type(registry.base().bind(py).clone(), message),
        None => PyRuntimeError::new_err(message),
    }
}

/// Converts a binding error into the Python exception it stands for.
///
/// Errors raised by Python callbacks come back out unchanged.
fn to_py_err(py: Python<'_>, err: KvError) -> PyErr {
    match err {
        KvError::Engine(e) => raise(py, e.status(), e.message()),
        KvError::Callback(e) => match e.downcast::<PyErr>() {
            Ok(py_err) => *py_err,
            Err(other) => PyRuntimeError::new_err(other.to_string()),
        },
        KvError::CallbackPanicked { message } => PanicException::new_err(message),
        KvError::Closed => raise(py, Status::InvalidArgument, "database is closed"),
        KvError::InvalidArgument { message } => raise(py, Status::InvalidArgument, &message),
        KvError::ConfigAlloc { .. } => PyMemoryError::new_err(BINDING_OOM_MESSAGE),
        other @ KvError::UnmappedStatus { .. } => raise_base(py, other.to_string()),
    }
}

/// Borrows a key or value argument: `bytes`, `str`, or any object that
/// exports a byte buffer.
fn bytes_arg<'a>(obj: &'a Bound<'_, PyAny>) -> PyResult<Cow<'a, [u8]>> {
    if let Ok(bytes) = obj.downcast::<PyBytes>() {
        return Ok(Cow::Borrowed(bytes.as_bytes()));
    }
    if let Ok(text) = obj.downcast::<PyString>() {
        return Ok(Cow::Borrowed(text.to_str()?.as_bytes()));
    }
    let buffer = PyBuffer::<u8>::get(obj)?;
    Ok(Cow::Owned(buffer.to_vec(obj.py())?))
}

/// Read-only view over engine memory, valid only inside a callback.
///
/// Supports `len()`, `bytes()` and the buffer protocol (`memoryview`).
/// Once the callback returns the buffer is detached and reads as empty.
#[pyclass(unsendable, module = "kvbridge")]
pub struct ValueBuffer {
    ptr: Cell<*const u8>,
    len: Cell<usize>,
    exports: Cell<usize>,
}

impl ValueBuffer {
    fn attach(bytes: &[u8]) -> Self {
        Self {
            ptr: Cell::new(bytes.as_ptr()),
            len: Cell::new(bytes.len()),
            exports: Cell::new(0),
        }
    }

    /// Detaches the buffer. Fails if a buffer export is still held.
    fn detach(&self) -> PyResult<()> {
        self.ptr.set(std::ptr::null());
        self.len.set(0);
        match self.exports.get() {
            0 => Ok(()),
            n => {
                tracing::warn!(exports = n, "value buffer still exported at detach");
                Err(PyBufferError::new_err(format!(
                    "ValueBuffer still has {n} buffer export(s) when its callback returned"
                )))
            }
        }
    }

    fn as_bytes(&self) -> &[u8] {
        let ptr = self.ptr.get();
        if ptr.is_null() {
            return &[];
        }
        // SAFETY: ptr is only non-null while the engine memory is lent.
        unsafe { std::slice::from_raw_parts(ptr, self.len.get()) }
    }
}

#[pymethods]
impl ValueBuffer {
    fn __len__(&self) -> usize {
        self.len.get()
    }

    fn __bytes__<'py>(&self, py: Python<'py>) -> Bound<'py, PyBytes> {
        PyBytes::new(py, self.as_bytes())
    }

    fn __repr__(&self) -> String {
        format!("ValueBuffer(len={})", self.len.get())
    }

    /// Whether the buffer still points at engine memory.
    #[getter]
    fn attached(&self) -> bool {
        !self.ptr.get().is_null()
    }

    unsafe fn __getbuffer__(
        slf: Bound<'_, Self>,
        view: *mut ffi::Py_buffer,
        flags: c_int,
    ) -> PyResult<()> {
        if view.is_null() {
            return Err(PyValueError::new_err("NULL view in getbuffer"));
        }
        let this = slf.borrow();
        let bytes = this.as_bytes();
        // Rejects writable requests and takes a reference to the exporter.
        let rc = ffi::PyBuffer_FillInfo(
            view,
            slf.as_ptr(),
            bytes.as_ptr().cast_mut().cast::<c_void>(),
            bytes.len() as ffi::Py_ssize_t,
            1,
            flags,
        );
        if rc != 0 {
            return Err(PyErr::fetch(slf.py()));
        }
        this.exports.set(this.exports.get() + 1);
        Ok(())
    }

    unsafe fn __releasebuffer__(&self, _view: *mut ffi::Py_buffer) {
        self.exports.set(self.exports.get().saturating_sub(1));
    }
}

/// Calls `callable` with one `ValueBuffer` per view and detaches them all
/// afterwards.
fn lend(py: Python<'_>, callable: &Bound<'_, PyAny>, views: &[&BorrowedView]) -> CallbackResult {
    let buffers = views
        .iter()
        .map(|view| Bound::new(py, ValueBuffer::attach(view.as_bytes())))
        .collect::<PyResult<Vec<_>>>()?;

    let args = buffers.iter().map(|b| b.clone().into_any()).collect::<Vec<_>>();
    let outcome = pyo3::types::PyTuple::new(py, args).and_then(|args| callable.call1(args));

    let mut detached = Ok(());
    for buffer in &buffers {
        if let Err(e) = buffer.borrow().detach() {
            detached = Err(e);
        }
    }
    outcome?;
    detached?;
    Ok(())
}

#[cfg(not(feature = "libpmemkv"))]
fn engine_api() -> &'static EngineApi {
    kvbridge_memkv::api()
}

#[cfg(feature = "libpmemkv")]
fn engine_api() -> &'static EngineApi {
    kvbridge_sys::libpmemkv()
}

/// Key-value engine handle.
///
/// Keys and values accept `bytes`, `str` or any buffer. Ranges are
/// exclusive on both ends.
#[pyclass(module = "kvbridge")]
pub struct Database {
    inner: CoreDatabase,
}

#[pymethods]
impl Database {
    /// Opens an engine.
    ///
    /// Args:
    ///     engine: Engine name, e.g. "vsmap".
    ///     config: JSON object with engine config items (default: "{}").
    #[new]
    #[pyo3(signature = (engine, config="{}"))]
    fn new(py: Python<'_>, engine: &str, config: &str) -> PyResult<Self> {
        let inner = CoreDatabase::open_json(engine_api(), engine, config)
            .map_err(|e| to_py_err(py, e))?;
        Ok(Self { inner })
    }

    /// Closes the engine. Further calls raise `InvalidArgument`.
    fn stop(&mut self) {
        self.inner.close();
    }

    /// Whether the engine is still open.
    #[getter]
    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Inserts or replaces a value.
    fn put(&self, py: Python<'_>, key: &Bound<'_, PyAny>, value: &Bound<'_, PyAny>) -> PyResult<()> {
        let (key, value) = (bytes_arg(key)?, bytes_arg(value)?);
        self.inner.put(key, value).map_err(|e| to_py_err(py, e))
    }

    /// Calls `callback(ValueBuffer)` with the value under `key`.
    ///
    /// Raises `KeyError` if the key is missing.
    fn get(&self, py: Python<'_>, key: &Bound<'_, PyAny>, callback: &Bound<'_, PyAny>) -> PyResult<()> {
        let key = bytes_arg(key)?;
        self.inner
            .get(key, |value| lend(py, callback, &[value]))
            .map_err(|e| to_py_err(py, e))
    }

    /// Returns the value under `key` as a string, or None if missing.
    fn get_string(&self, py: Python<'_>, key: &Bound<'_, PyAny>) -> PyResult<Option<String>> {
        let key = bytes_arg(key)?;
        match self.inner.get_copy(key).map_err(|e| to_py_err(py, e))? {
            Some(value) => Ok(Some(String::from_utf8(value)?)),
            None => Ok(None),
        }
    }

    /// Whether `key` is present.
    fn exists(&self, py: Python<'_>, key: &Bound<'_, PyAny>) -> PyResult<bool> {
        let key = bytes_arg(key)?;
        self.inner.exists(key).map_err(|e| to_py_err(py, e))
    }

    /// Removes `key`. Returns False if it was not present.
    fn remove(&self, py: Python<'_>, key: &Bound<'_, PyAny>) -> PyResult<bool> {
        let key = bytes_arg(key)?;
        self.inner.remove(key).map_err(|e| to_py_err(py, e))
    }

    /// Number of entries.
    fn count_all(&self, py: Python<'_>) -> PyResult<usize> {
        self.inner.count_all().map_err(|e| to_py_err(py, e))
    }

    /// Number of entries above `key`.
    fn count_above(&self, py: Python<'_>, key: &Bound<'_, PyAny>) -> PyResult<usize> {
        let key = bytes_arg(key)?;
        self.inner.count_above(key).map_err(|e| to_py_err(py, e))
    }

    /// Number of entries below `key`.
    fn count_below(&self, py: Python<'_>, key: &Bound<'_, PyAny>) -> PyResult<usize> {
        let key = bytes_arg(key)?;
        self.inner.count_below(key).map_err(|e| to_py_err(py, e))
    }

    /// Number of entries between `key1` and `key2`.
    fn count_between(
        &self,
        py: Python<'_>,
        key1: &Bound<'_, PyAny>,
        key2: &Bound<'_, PyAny>,
    ) -> PyResult<usize> {
        let (key1, key2) = (bytes_arg(key1)?, bytes_arg(key2)?);
        self.inner.count_between(key1, key2).map_err(|e| to_py_err(py, e))
    }

    /// Calls `callback(key)` for every key in engine order.
    fn get_keys(&self, py: Python<'_>, callback: &Bound<'_, PyAny>) -> PyResult<()> {
        self.inner
            .scan_keys_all(|k| lend(py, callback, &[k]))
            .map_err(|e| to_py_err(py, e))
    }

    /// Calls `callback(key)` for every key above `key`.
    fn get_keys_above(
        &self,
        py: Python<'_>,
        key: &Bound<'_, PyAny>,
        callback: &Bound<'_, PyAny>,
    ) -> PyResult<()> {
        let key = bytes_arg(key)?;
        self.inner
            .scan_keys_above(key, |k| lend(py, callback, &[k]))
            .map_err(|e| to_py_err(py, e))
    }

    /// Calls `callback(key)` for every key below `key`.
    fn get_keys_below(
        &self,
        py: Python<'_>,
        key: &Bound<'_, PyAny>,
        callback: &Bound<'_, PyAny>,
    ) -> PyResult<()> {
        let key = bytes_arg(key)?;
        self.inner
            .scan_keys_below(key, |k| lend(py, callback, &[k]))
            .map_err(|e| to_py_err(py, e))
    }

    /// Calls `callback(key)` for every key between `key1` and `key2`.
    fn get_keys_between(
        &self,
        py: Python<'_>,
        key1: &Bound<'_, PyAny>,
        key2: &Bound<'_, PyAny>,
        callback: &Bound<'_, PyAny>,
    ) -> PyResult<()> {
        let (key1, key2) = (bytes_arg(key1)?, bytes_arg(key2)?);
        self.inner
            .scan_keys_between(key1, key2, |k| lend(py, callback, &[k]))
            .map_err(|e| to_py_err(py, e))
    }

    /// Calls `callback(key, value)` for every entry in engine order.
    fn get_all(&self, py: Python<'_>, callback: &Bound<'_, PyAny>) -> PyResult<()> {
        self.inner
            .scan_all(|k, v| lend(py, callback, &[k, v]))
            .map_err(|e| to_py_err(py, e))
    }

    /// Calls `callback(key, value)` for every entry above `key`.
    fn get_above(
        &self,
        py: Python<'_>,
        key: &Bound<'_, PyAny>,
        callback: &Bound<'_, PyAny>,
    ) -> PyResult<()> {
        let key = bytes_arg(key)?;
        self.inner
            .scan_above(key, |k, v| lend(py, callback, &[k, v]))
            .map_err(|e| to_py_err(py, e))
    }

    /// Calls `callback(key, value)` for every entry below `key`.
    fn get_below(
        &self,
        py: Python<'_>,
        key: &Bound<'_, PyAny>,
        callback: &Bound<'_, PyAny>,
    ) -> PyResult<()> {
        let key = bytes_arg(key)?;
        self.inner
            .scan_below(key, |k, v| lend(py, callback, &[k, v]))
            .map_err(|e| to_py_err(py, e))
    }

    /// Calls `callback(key, value)` for every entry between `key1` and `key2`.
    fn get_between(
        &self,
        py: Python<'_>,
        key1: &Bound<'_, PyAny>,
        key2: &Bound<'_, PyAny>,
        callback: &Bound<'_, PyAny>,
    ) -> PyResult<()> {
        let (key1, key2) = (bytes_arg(key1)?, bytes_arg(key2)?);
        self.inner
            .scan_between(key1, key2, |k, v| lend(py, callback, &[k, v]))
            .map_err(|e| to_py_err(py, e))
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    #[pyo3(signature = (_exc_type=None, _exc_val=None, _exc_tb=None))]
    fn __exit__(
        &mut self,
        _exc_type: Option<PyObject>,
        _exc_val: Option<PyObject>,
        _exc_tb: Option<PyObject>,
    ) -> bool {
        self.stop();
        false
    }

    fn __repr__(&self) -> String {
        format!("Database({:?}, open={})", self.inner.engine(), self.inner.is_open())
    }
}

/// Python module initialization.
#[pymodule]
fn _kvbridge(m: &Bound<'_, PyModule>) -> PyResult<()> {
    install_exceptions(m)?;
    m.add_class::<Database>()?;
    m.add_class::<ValueBuffer>()?;
    m.add_function(wrap_pyfunction!(version, m)?)?;
    tracing::debug!(version = VERSION, "kvbridge extension module initialized");
    Ok(())
}

/// Returns the kvbridge library version.
#[pyfunction]
fn version() -> &'static str {
    VERSION
}
