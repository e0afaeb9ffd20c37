//! Callback trampolines.
//!
//! The engine calls back through plain C function pointers with an opaque
//! `arg`. Each trampoline below is monomorphized for one host closure type;
//! `arg` points at the [`CallbackContext`] that owns the closure and the
//! views lent to it.
//!
//! Invariants kept on every invocation:
//!
//! - views are attached before the host runs and detached right after, even
//!   if the host fails or panics
//! - a host failure is latched in the context and the trampoline returns a
//!   non-zero value so the engine stops
//! - once a failure is latched the host is never called again, even if the
//!   engine keeps iterating
//! - panics never cross the C boundary

use crate::error::{CallbackResult, KvError, KvResult};
use crate::view::BorrowedView;
use std::any::Any;
use std::ffi::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};

/// Return value that lets the engine continue.
pub(crate) const CONTINUE: c_int = 0;

/// Return value that asks the engine to stop.
pub(crate) const ABORT: c_int = 1;

/// State shared between a binding call and its trampoline.
pub(crate) struct CallbackContext<F> {
    callable: F,
    first: BorrowedView,
    second: BorrowedView,
    latched: Option<KvError>,
    invocations: usize,
}

impl<F> CallbackContext<F> {
    pub(crate) fn new(callable: F) -> Self {
        Self {
            callable,
            first: BorrowedView::detached(),
            second: BorrowedView::detached(),
            latched: None,
            invocations: 0,
        }
    }

    /// Opaque pointer handed to the engine.
    pub(crate) fn as_arg(&mut self) -> *mut c_void {
        (self as *mut Self).cast::<c_void>()
    }

    #[cfg(test)]
    pub(crate) fn invocations(&self) -> usize {
        self.invocations
    }

    /// Combines the engine's outcome with the latched host error.
    ///
    /// A latched error wins over whatever the engine reported.
    pub(crate) fn finish(self, outcome: KvResult<()>) -> KvResult<()> {
        match self.latched {
            Some(err) => {
                match &outcome {
                    Ok(()) => tracing::trace!("engine ignored the abort request"),
                    Err(engine) => tracing::trace!(%engine, "engine status superseded by callback error"),
                }
                Err(err)
            }
            None => outcome,
        }
    }

    /// Runs the host against the given bytes.
    ///
    /// # Safety
    ///
    /// Each `(ptr, len)` pair must be null or valid for reads for the
    /// duration of this call.
    unsafe fn dispatch(
        &mut self,
        first: (*const c_char, usize),
        second: (*const c_char, usize),
        call: impl FnOnce(&mut F, &BorrowedView, &BorrowedView) -> CallbackResult,
    ) -> c_int {
        if self.latched.is_some() {
            return ABORT;
        }
        self.invocations += 1;

        self.first.attach(first.0, first.1);
        self.second.attach(second.0, second.1);
        let Self {
            callable,
            first,
            second,
            ..
        } = &mut *self;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| call(callable, first, second)));
        first.detach();
        second.detach();

        match outcome {
            Ok(Ok(())) => CONTINUE,
            Ok(Err(err)) => {
                tracing::trace!(error = %err, "callback failed, aborting iteration");
                self.latched = Some(KvError::Callback(err));
                ABORT
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(%message, "callback panicked, aborting iteration");
                self.latched = Some(KvError::CallbackPanicked { message });
                ABORT
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Key-only trampoline with the key/value callback signature.
///
/// # Safety
///
/// `arg` must point at a live `CallbackContext<F>`.
pub(crate) unsafe extern "C" fn keys_trampoline<F>(
    key: *const c_char,
    keybytes: usize,
    _value: *const c_char,
    _valuebytes: usize,
    arg: *mut c_void,
) -> c_int
where
    F: FnMut(&BorrowedView) -> CallbackResult,
{
    let ctx = &mut *arg.cast::<CallbackContext<F>>();
    ctx.dispatch((key, keybytes), (std::ptr::null(), 0), |f, key, _| f(key))
}

/// Key/value trampoline.
///
/// # Safety
///
/// `arg` must point at a live `CallbackContext<F>`.
pub(crate) unsafe extern "C" fn entries_trampoline<F>(
    key: *const c_char,
    keybytes: usize,
    value: *const c_char,
    valuebytes: usize,
    arg: *mut c_void,
) -> c_int
where
    F: FnMut(&BorrowedView, &BorrowedView) -> CallbackResult,
{
    let ctx = &mut *arg.cast::<CallbackContext<F>>();
    ctx.dispatch((key, keybytes), (value, valuebytes), |f, key, value| {
        f(key, value)
    })
}

/// Value trampoline. The engine ignores its result, so a failure only
/// shows up through the latched error.
///
/// # Safety
///
/// `arg` must point at a live `CallbackContext<F>`.
pub(crate) unsafe extern "C" fn value_trampoline<F>(
    value: *const c_char,
    valuebytes: usize,
    arg: *mut c_void,
) where
    F: FnMut(&BorrowedView) -> CallbackResult,
{
    let ctx = &mut *arg.cast::<CallbackContext<F>>();
    ctx.dispatch((value, valuebytes), (std::ptr::null(), 0), |f, value, _| {
        f(value)
    });
}
