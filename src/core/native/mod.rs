//! Purpose: Seam between the boundary and whatever implements the native parser ABI.
//! Exports: `NativeParser`, `RawResultHandle`, `stub`, and `linked` (feature `native`).
//! Role: Native Call Issuer; issues one parse call and hands back an opaque handle.
//! Invariants: A handle is only meaningful through `core::layout` and only until released.
//! Invariants: Implementations never take ownership of the command buffer.
use std::ffi::{CStr, c_void};
use std::fmt;
use std::ptr::{self, NonNull};

#[cfg(feature = "native")]
pub mod linked;
pub mod stub;

/// Opaque pointer to a native `ParseResult` allocation. Null means the native side
/// could not allocate a result at all.
#[repr(transparent)]
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct RawResultHandle(*mut c_void);

impl RawResultHandle {
    pub fn null() -> Self {
        Self(ptr::null_mut())
    }

    /// Wraps a pointer returned by the native parse function.
    ///
    /// # Safety
    /// `ptr` must be null or point to a live `ParseResult` record laid out as
    /// `core::layout::RESULT_LAYOUT` describes.
    ///
    /// ```compile_fail
    /// use statedb_parser::RawResultHandle;
    ///
    /// let handle = RawResultHandle::from_ptr(0x10 as *mut std::ffi::c_void);
    /// ```
    pub unsafe fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }

    pub(crate) fn non_null(self) -> Option<NonNull<u8>> {
        NonNull::new(self.0.cast::<u8>())
    }

    /// Address only, for logs; never dereferenced.
    pub fn addr(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for RawResultHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawResultHandle({:#x})", self.addr())
    }
}

/// A native command parser that allocates its results outside Rust's allocator.
///
/// # Safety
/// `invoke` must return either a null handle or a handle to a live record laid out as
/// `core::layout::RESULT_LAYOUT` describes, whose non-null string pointers reference
/// NUL-terminated strings. The record and its strings must stay valid and unmodified
/// until the handle is passed to `release`. The boundary decodes such handles without
/// further checks.
///
/// Implementing the trait therefore requires `unsafe impl`:
///
/// ```compile_fail
/// use std::ffi::CStr;
/// use statedb_parser::{NativeParser, RawResultHandle};
///
/// struct Bogus;
///
/// impl NativeParser for Bogus {
///     fn name(&self) -> &str {
///         "bogus"
///     }
///
///     fn invoke(&self, _command: &CStr) -> RawResultHandle {
///         RawResultHandle::null()
///     }
///
///     unsafe fn release(&self, _handle: RawResultHandle) {}
/// }
/// ```
pub unsafe trait NativeParser {
    /// Short label used in logs and CLI output.
    fn name(&self) -> &str;

    /// Parses one NUL-terminated wire command. The buffer stays owned by the caller.
    fn invoke(&self, command: &CStr) -> RawResultHandle;

    /// Returns a result allocation to the native side.
    ///
    /// # Safety
    /// `handle` must be non-null, must have been returned by `invoke` on this parser,
    /// and must not have been released before. No data may be read through it afterwards.
    unsafe fn release(&self, handle: RawResultHandle);
}

unsafe impl<P: NativeParser + ?Sized> NativeParser for &P {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn invoke(&self, command: &CStr) -> RawResultHandle {
        (**self).invoke(command)
    }

    unsafe fn release(&self, handle: RawResultHandle) {
        unsafe { (**self).release(handle) }
    }
}

unsafe impl<P: NativeParser + ?Sized> NativeParser for std::sync::Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn invoke(&self, command: &CStr) -> RawResultHandle {
        (**self).invoke(command)
    }

    unsafe fn release(&self, handle: RawResultHandle) {
        unsafe { (**self).release(handle) }
    }
}
