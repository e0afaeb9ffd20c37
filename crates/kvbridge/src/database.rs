//! Engine facade.
//!
//! [`Database`] owns one engine handle and exposes every engine operation
//! with Rust types. Raw status codes are turned into [`KvError`] through
//! the process-wide [`ErrorClasses`] table. Closures passed to `get` and to
//! the scan methods run through the trampolines in `trampoline.rs`.

use crate::classes::ErrorClasses;
use crate::config::{Config, NativeConfig};
use crate::error::{CallbackResult, KvError, KvResult};
use crate::trampoline::{entries_trampoline, keys_trampoline, value_trampoline, CallbackContext};
use crate::view::BorrowedView;
use kvbridge_sys::{EngineApi, GetKvCallback, KvDb, Status};
use std::ffi::{c_char, c_int, CStr, CString};
use std::fmt;
use std::ptr::NonNull;

/// Range selector shared by the count and scan families.
#[derive(Debug, Clone, Copy)]
enum Bounds<'a> {
    All,
    Above(&'a [u8]),
    Below(&'a [u8]),
    Between(&'a [u8], &'a [u8]),
}

fn ptr(bytes: &[u8]) -> *const c_char {
    bytes.as_ptr().cast::<c_char>()
}

/// Reads an engine error message.
///
/// # Safety
///
/// `errormsg` must return null or a valid null-terminated string.
unsafe fn read_message(errormsg: unsafe extern "C" fn() -> *const c_char) -> String {
    let msg = errormsg();
    if msg.is_null() {
        return String::new();
    }
    CStr::from_ptr(msg).to_string_lossy().into_owned()
}

/// An open engine.
///
/// The handle is closed by [`close`](Self::close) or on drop. Operations on
/// a closed database fail with [`KvError::Closed`] without reaching the
/// engine.
pub struct Database {
    api: &'static EngineApi,
    handle: Option<NonNull<KvDb>>,
    classes: &'static ErrorClasses,
    engine: String,
}

// SAFETY: engine handles are safe to use from any thread; every mutating
// engine entry point synchronizes internally.
unsafe impl Send for Database {}
// SAFETY: see above.
unsafe impl Sync for Database {}

impl Database {
    /// Opens `engine` through `api` with `config`.
    ///
    /// # Errors
    ///
    /// - [`KvError::InvalidArgument`] if the engine name contains a NUL byte
    /// - [`KvError::ConfigAlloc`] if no native config could be allocated
    /// - [`KvError::Engine`] for any status the engine reports
    pub fn open(api: &'static EngineApi, engine: &str, config: &Config) -> KvResult<Self> {
        Self::open_json(api, engine, &config.to_json())
    }

    /// Opens `engine` with a raw JSON config document.
    ///
    /// The document is handed to the engine unparsed, so malformed JSON
    /// surfaces as the engine's config parsing error.
    pub fn open_json(api: &'static EngineApi, engine: &str, json: &str) -> KvResult<Self> {
        let classes = ErrorClasses::global();
        let name = CString::new(engine)
            .map_err(|_| KvError::invalid_argument("engine name contains a NUL byte"))?;
        let json = CString::new(json)
            .map_err(|_| KvError::invalid_argument("config contains a NUL byte"))?;

        let Some(mut config) = NativeConfig::new(api) else {
            // SAFETY: errormsg returns null or a valid string.
            let message = unsafe { read_message(api.errormsg) };
            return Err(KvError::ConfigAlloc { message });
        };
        let rc = config.load_json(&json);
        // SAFETY: as above.
        classes.check(rc, || unsafe { read_message(api.config_from_json_errormsg) })?;

        let mut raw: *mut KvDb = std::ptr::null_mut();
        // SAFETY: name is null-terminated, open takes ownership of the
        // config, raw is a valid out pointer.
        let rc = unsafe { (api.open)(name.as_ptr(), config.into_raw(), &mut raw) };
        classes.check(rc, || unsafe { read_message(api.errormsg) })?;

        let Some(handle) = NonNull::new(raw) else {
            return Err(KvError::invalid_argument("engine returned a null handle"));
        };
        tracing::debug!(engine, "opened database");
        Ok(Self {
            api,
            handle: Some(handle),
            classes,
            engine: engine.to_owned(),
        })
    }

    /// Opens one of the in-process engines.
    #[cfg(feature = "memkv")]
    pub fn open_memkv(engine: &str, config: &Config) -> KvResult<Self> {
        Self::open(kvbridge_memkv::api(), engine, config)
    }

    /// Opens an engine from the system libpmemkv.
    #[cfg(feature = "libpmemkv")]
    pub fn open_libpmemkv(engine: &str, config: &Config) -> KvResult<Self> {
        Self::open(kvbridge_sys::libpmemkv(), engine, config)
    }

    /// Engine name passed to open.
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Returns true until the database is closed.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Closes the engine. Closing twice is a no-op.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            // SAFETY: handle came from open and is released exactly once.
            unsafe { (self.api.close)(handle.as_ptr()) };
            tracing::debug!(engine = %self.engine, "closed database");
        }
    }

    fn handle(&self) -> KvResult<*mut KvDb> {
        self.handle.map(NonNull::as_ptr).ok_or(KvError::Closed)
    }

    fn check(&self, rc: c_int) -> KvResult<()> {
        let api = self.api;
        // SAFETY: errormsg returns null or a valid string.
        self.classes.check(rc, || unsafe { read_message(api.errormsg) })
    }

    /// Maps NOT_FOUND to `false` and OK to `true`.
    fn found(&self, rc: c_int) -> KvResult<bool> {
        if rc == Status::NotFound.code() {
            return Ok(false);
        }
        self.check(rc)?;
        Ok(true)
    }

    /// Inserts or replaces the value under `key`.
    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> KvResult<()> {
        let db = self.handle()?;
        let (key, value) = (key.as_ref(), value.as_ref());
        // SAFETY: db is live; both slices outlive the call.
        let rc = unsafe { (self.api.put)(db, ptr(key), key.len(), ptr(value), value.len()) };
        self.check(rc)
    }

    /// Passes the value under `key` to `callback`.
    ///
    /// The view is only valid inside the callback. A missing key is an
    /// engine error with status [`Status::NotFound`].
    pub fn get<F>(&self, key: impl AsRef<[u8]>, callback: F) -> KvResult<()>
    where
        F: FnMut(&BorrowedView) -> CallbackResult,
    {
        let db = self.handle()?;
        let key = key.as_ref();
        let mut ctx = CallbackContext::new(callback);
        // SAFETY: db is live; ctx outlives the call and matches the
        // trampoline's type parameter.
        let rc = unsafe { (self.api.get)(db, ptr(key), key.len(), value_trampoline::<F>, ctx.as_arg()) };
        ctx.finish(self.check(rc))
    }

    /// Copies the value under `key` out, `None` if the key is missing.
    pub fn get_copy(&self, key: impl AsRef<[u8]>) -> KvResult<Option<Vec<u8>>> {
        let mut value = None;
        let result = self.get(key, |view| {
            value = Some(view.to_vec());
            Ok(())
        });
        match result {
            Ok(()) => Ok(value),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Copies the value under `key` out as a string, `None` if missing.
    ///
    /// Invalid UTF-8 is replaced.
    pub fn get_string(&self, key: impl AsRef<[u8]>) -> KvResult<Option<String>> {
        Ok(self
            .get_copy(key)?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    /// Returns whether `key` is present.
    pub fn exists(&self, key: impl AsRef<[u8]>) -> KvResult<bool> {
        let db = self.handle()?;
        let key = key.as_ref();
        // SAFETY: db is live; key outlives the call.
        let rc = unsafe { (self.api.exists)(db, ptr(key), key.len()) };
        self.found(rc)
    }

    /// Removes `key`. Returns `false` if it was not present.
    pub fn remove(&self, key: impl AsRef<[u8]>) -> KvResult<bool> {
        let db = self.handle()?;
        let key = key.as_ref();
        // SAFETY: db is live; key outlives the call.
        let rc = unsafe { (self.api.remove)(db, ptr(key), key.len()) };
        self.found(rc)
    }

    /// Number of entries.
    pub fn count_all(&self) -> KvResult<usize> {
        self.count(Bounds::All)
    }

    /// Number of entries with keys strictly greater than `key`.
    pub fn count_above(&self, key: impl AsRef<[u8]>) -> KvResult<usize> {
        self.count(Bounds::Above(key.as_ref()))
    }

    /// Number of entries with keys strictly less than `key`.
    pub fn count_below(&self, key: impl AsRef<[u8]>) -> KvResult<usize> {
        self.count(Bounds::Below(key.as_ref()))
    }

    /// Number of entries with keys strictly between `lo` and `hi`.
    pub fn count_between(&self, lo: impl AsRef<[u8]>, hi: impl AsRef<[u8]>) -> KvResult<usize> {
        self.count(Bounds::Between(lo.as_ref(), hi.as_ref()))
    }

    fn count(&self, bounds: Bounds<'_>) -> KvResult<usize> {
        let db = self.handle()?;
        let api = self.api;
        let mut cnt = 0usize;
        // SAFETY: db is live; keys and cnt outlive the call.
        let rc = unsafe {
            match bounds {
                Bounds::All => (api.count_all)(db, &mut cnt),
                Bounds::Above(k) => (api.count_above)(db, ptr(k), k.len(), &mut cnt),
                Bounds::Below(k) => (api.count_below)(db, ptr(k), k.len(), &mut cnt),
                Bounds::Between(lo, hi) => {
                    (api.count_between)(db, ptr(lo), lo.len(), ptr(hi), hi.len(), &mut cnt)
                }
            }
        };
        self.check(rc)?;
        Ok(cnt)
    }

    /// Visits every key in engine order.
    pub fn scan_keys_all<F>(&self, callback: F) -> KvResult<()>
    where
        F: FnMut(&BorrowedView) -> CallbackResult,
    {
        self.scan(Bounds::All, CallbackContext::new(callback), keys_trampoline::<F>)
    }

    /// Visits keys strictly greater than `key`.
    pub fn scan_keys_above<F>(&self, key: impl AsRef<[u8]>, callback: F) -> KvResult<()>
    where
        F: FnMut(&BorrowedView) -> CallbackResult,
    {
        let bounds = Bounds::Above(key.as_ref());
        self.scan(bounds, CallbackContext::new(callback), keys_trampoline::<F>)
    }

    /// Visits keys strictly less than `key`.
    pub fn scan_keys_below<F>(&self, key: impl AsRef<[u8]>, callback: F) -> KvResult<()>
    where
        F: FnMut(&BorrowedView) -> CallbackResult,
    {
        let bounds = Bounds::Below(key.as_ref());
        self.scan(bounds, CallbackContext::new(callback), keys_trampoline::<F>)
    }

    /// Visits keys strictly between `lo` and `hi`.
    pub fn scan_keys_between<F>(
        &self,
        lo: impl AsRef<[u8]>,
        hi: impl AsRef<[u8]>,
        callback: F,
    ) -> KvResult<()>
    where
        F: FnMut(&BorrowedView) -> CallbackResult,
    {
        let bounds = Bounds::Between(lo.as_ref(), hi.as_ref());
        self.scan(bounds, CallbackContext::new(callback), keys_trampoline::<F>)
    }

    /// Visits every entry in engine order.
    pub fn scan_all<F>(&self, callback: F) -> KvResult<()>
    where
        F: FnMut(&BorrowedView, &BorrowedView) -> CallbackResult,
    {
        self.scan(Bounds::All, CallbackContext::new(callback), entries_trampoline::<F>)
    }

    /// Visits entries with keys strictly greater than `key`.
    pub fn scan_above<F>(&self, key: impl AsRef<[u8]>, callback: F) -> KvResult<()>
    where
        F: FnMut(&BorrowedView, &BorrowedView) -> CallbackResult,
    {
        let bounds = Bounds::Above(key.as_ref());
        self.scan(bounds, CallbackContext::new(callback), entries_trampoline::<F>)
    }

    /// Visits entries with keys strictly less than `key`.
    pub fn scan_below<F>(&self, key: impl AsRef<[u8]>, callback: F) -> KvResult<()>
    where
        F: FnMut(&BorrowedView, &BorrowedView) -> CallbackResult,
    {
        let bounds = Bounds::Below(key.as_ref());
        self.scan(bounds, CallbackContext::new(callback), entries_trampoline::<F>)
    }

    /// Visits entries with keys strictly between `lo` and `hi`.
    pub fn scan_between<F>(
        &self,
        lo: impl AsRef<[u8]>,
        hi: impl AsRef<[u8]>,
        callback: F,
    ) -> KvResult<()>
    where
        F: FnMut(&BorrowedView, &BorrowedView) -> CallbackResult,
    {
        let bounds = Bounds::Between(lo.as_ref(), hi.as_ref());
        self.scan(bounds, CallbackContext::new(callback), entries_trampoline::<F>)
    }

    fn scan<F>(
        &self,
        bounds: Bounds<'_>,
        mut ctx: CallbackContext<F>,
        trampoline: GetKvCallback,
    ) -> KvResult<()> {
        let db = self.handle()?;
        let api = self.api;
        let arg = ctx.as_arg();
        // SAFETY: db is live; keys outlive the call; trampoline was
        // instantiated for F, so arg has the type it expects.
        let rc = unsafe {
            match bounds {
                Bounds::All => (api.get_all)(db, trampoline, arg),
                Bounds::Above(k) => (api.get_above)(db, ptr(k), k.len(), trampoline, arg),
                Bounds::Below(k) => (api.get_below)(db, ptr(k), k.len(), trampoline, arg),
                Bounds::Between(lo, hi) => {
                    (api.get_between)(db, ptr(lo), lo.len(), ptr(hi), hi.len(), trampoline, arg)
                }
            }
        };
        ctx.finish(self.check(rc))
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("engine", &self.engine)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
