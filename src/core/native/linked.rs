//! Purpose: Binding to the prebuilt StateDB native parser library.
//! Exports: `LinkedParser`.
//! Role: Production `NativeParser`; linked by `build.rs` when the `native` feature is on.
//! Invariants: All `extern` declarations for the library live in `sys`.
//! Notes: The library is not documented as thread-safe; keep the boundary serialized.
use std::ffi::CStr;

use crate::core::native::{NativeParser, RawResultHandle};

mod sys {
    // Raw FFI bindings to libstatedb_parser.
    use crate::core::layout::RawParseResult;
    use std::os::raw::c_char;

    unsafe extern "C" {
        pub fn parse_command(input: *const c_char) -> *mut RawParseResult;

        pub fn free_parse_result(result: *mut RawParseResult);
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LinkedParser;

impl LinkedParser {
    pub fn new() -> Self {
        Self
    }
}

// `parse_command` returns null or a heap `ParseResult` that stays valid until
// `free_parse_result`.
unsafe impl NativeParser for LinkedParser {
    fn name(&self) -> &str {
        "native"
    }

    fn invoke(&self, command: &CStr) -> RawResultHandle {
        unsafe {
            let ptr = sys::parse_command(command.as_ptr());
            RawResultHandle::from_ptr(ptr.cast())
        }
    }

    unsafe fn release(&self, handle: RawResultHandle) {
        unsafe { sys::free_parse_result(handle.as_ptr().cast()) }
    }
}
