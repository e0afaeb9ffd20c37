//! Borrowed views over engine-owned bytes.
//!
//! A [`BorrowedView`] is only attached while a callback runs. The engine
//! memory it points at is valid for exactly that long, so the trampoline
//! detaches every view as soon as the callback returns. A detached view
//! reads as empty. The type is neither `Send` nor `Sync`, which keeps it on
//! the callback's thread.

use std::cell::Cell;
use std::ffi::c_char;
use std::fmt;
use std::ops::Deref;
use std::str::Utf8Error;

/// Read-only bytes lent by the engine for the duration of one callback.
pub struct BorrowedView {
    ptr: Cell<*const u8>,
    len: Cell<usize>,
}

impl BorrowedView {
    pub(crate) const fn detached() -> Self {
        Self {
            ptr: Cell::new(std::ptr::null()),
            len: Cell::new(0),
        }
    }

    /// Points the view at engine memory.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or valid for reads of `len` bytes until
    /// [`detach`](Self::detach) is called.
    pub(crate) unsafe fn attach(&self, ptr: *const c_char, len: usize) {
        if ptr.is_null() {
            self.detach();
        } else {
            self.ptr.set(ptr.cast::<u8>());
            self.len.set(len);
        }
    }

    pub(crate) fn detach(&self) {
        self.ptr.set(std::ptr::null());
        self.len.set(0);
    }

    /// Returns the bytes, or an empty slice once detached.
    pub fn as_bytes(&self) -> &[u8] {
        let ptr = self.ptr.get();
        if ptr.is_null() {
            return &[];
        }
        // SAFETY: attach() guarantees validity until detach(), and detach()
        // only runs after the callback holding this borrow has returned.
        unsafe { std::slice::from_raw_parts(ptr, self.len.get()) }
    }

    /// Number of bytes in view.
    pub fn len(&self) -> usize {
        self.len.get()
    }

    /// Returns true if the view is empty.
    pub fn is_empty(&self) -> bool {
        self.len.get() == 0
    }

    /// Returns true while the view points at engine memory.
    pub fn is_attached(&self) -> bool {
        !self.ptr.get().is_null()
    }

    /// Copies the bytes out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// Interprets the bytes as UTF-8.
    pub fn to_str(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(self.as_bytes())
    }
}

impl Deref for BorrowedView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for BorrowedView {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq<[u8]> for BorrowedView {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<&[u8]> for BorrowedView {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_bytes() == *other
    }
}

impl fmt::Debug for BorrowedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BorrowedView")
            .field("len", &self.len())
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attached_view_reads_source() {
        let source = b"hello\0world".to_vec();
        let view = BorrowedView::detached();
        unsafe { view.attach(source.as_ptr().cast(), source.len()) };

        assert!(view.is_attached());
        assert_eq!(view.len(), 11);
        assert_eq!(view.as_bytes(), &source[..]);
        assert_eq!(&view[..5], b"hello");
        assert_eq!(view.to_vec(), source);
    }

    #[test]
    fn detached_view_is_empty() {
        let source = b"value".to_vec();
        let view = BorrowedView::detached();
        unsafe { view.attach(source.as_ptr().cast(), source.len()) };
        view.detach();

        assert!(!view.is_attached());
        assert!(view.is_empty());
        assert_eq!(view.as_bytes(), b"");
        assert_eq!(format!("{view:?}"), "BorrowedView { len: 0, attached: false }");
    }

    #[test]
    fn null_pointer_attaches_as_empty() {
        let view = BorrowedView::detached();
        unsafe { view.attach(std::ptr::null(), 8) };
        assert!(view.is_empty());
        assert!(!view.is_attached());
    }

    #[test]
    fn utf8_access() {
        let text = "k\u{e9}y";
        let view = BorrowedView::detached();
        unsafe { view.attach(text.as_ptr().cast(), text.len()) };
        assert_eq!(view.to_str().unwrap(), text);

        let bad = [0xffu8, 0xfe];
        unsafe { view.attach(bad.as_ptr().cast(), bad.len()) };
        assert!(view.to_str().is_err());
    }
}
