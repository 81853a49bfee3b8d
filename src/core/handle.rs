//! Purpose: Scoped ownership of one native result allocation.
//! Exports: `OwnedResult`.
//! Role: Ownership Release; the guard's `Drop` hands the record back to the native side.
//! Invariants: Only non-null handles are ever wrapped; a null handle fails with `NullHandle`.
//! Invariants: Release runs exactly once, on every exit path including unwinding.
//! Invariants: Decoding borrows the guard, so no read can follow the release.
use std::ptr::NonNull;

use crate::core::error::{Error, ErrorKind};
use crate::core::layout;
use crate::core::native::{NativeParser, RawResultHandle};
use crate::core::outcome::ParseOutcome;

pub struct OwnedResult<'p, P: NativeParser + ?Sized> {
    parser: &'p P,
    handle: RawResultHandle,
    record: NonNull<u8>,
}

impl<'p, P: NativeParser + ?Sized> OwnedResult<'p, P> {
    /// Takes ownership of a handle returned by `parser.invoke`.
    ///
    /// # Safety
    /// `handle` must come from `parser.invoke` and must not be owned or released elsewhere.
    pub unsafe fn acquire(parser: &'p P, handle: RawResultHandle) -> Result<Self, Error> {
        let Some(record) = handle.non_null() else {
            tracing::warn!(parser = parser.name(), "native parser returned a null result");
            return Err(Error::new(ErrorKind::NullHandle)
                .with_message("native parser returned no result")
                .with_hint("The native side could not allocate a result record; nothing was released."));
        };
        Ok(Self {
            parser,
            handle,
            record,
        })
    }

    pub fn handle(&self) -> RawResultHandle {
        self.handle
    }

    /// Copies the record's contents into an owned outcome.
    pub fn decode(&self) -> Result<ParseOutcome, Error> {
        // The guard keeps the record alive and unreleased for this borrow.
        unsafe { layout::decode_result(self.record) }
    }
}

impl<P: NativeParser + ?Sized> Drop for OwnedResult<'_, P> {
    fn drop(&mut self) {
        tracing::trace!(handle = ?self.handle, parser = self.parser.name(), "releasing native result");
        unsafe { self.parser.release(self.handle) };
    }
}
