//! Purpose: Fixed binary layout of the native `ParseResult` record and its decoder.
//! Exports: `RawParseResult`, `FieldSpec`, `FieldKind`, `RESULT_LAYOUT`, `decode_result`.
//! Role: The only place that knows offsets into native memory.
//! Invariants: `RESULT_LAYOUT` matches `RawParseResult` (checked at compile time).
//! Invariants: Every byte referenced by the record is copied into Rust memory before return.
//! Invariants: Exactly one of the two string pointers is non-null, selected by the flag.
use std::ffi::{CStr, c_char};
use std::mem::{align_of, offset_of, size_of};
use std::ptr::NonNull;

use serde_json::Value;

use crate::core::error::{Error, ErrorKind};
use crate::core::outcome::{JsonPayload, ParseOutcome};

/// C view of the record returned by `parse_command`.
///
/// Only used to pin the layout and by native stand-ins; decoding goes through
/// `RESULT_LAYOUT` so no Rust reference into native memory is ever formed.
#[repr(C)]
#[derive(Debug)]
pub struct RawParseResult {
    pub success: bool,
    pub err: *mut c_char,
    pub json_result: *mut c_char,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    /// One byte, zero is false, anything else is true.
    Flag,
    /// Pointer to a NUL-terminated byte string owned by the native side.
    CString,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
    pub kind: FieldKind,
}

const PTR: usize = size_of::<*const c_char>();

pub const SUCCESS_FIELD: FieldSpec = FieldSpec {
    name: "success",
    offset: 0,
    width: 1,
    kind: FieldKind::Flag,
};

// Bytes 1..PTR are padding up to pointer alignment.
pub const ERROR_FIELD: FieldSpec = FieldSpec {
    name: "err",
    offset: PTR,
    width: PTR,
    kind: FieldKind::CString,
};

pub const PAYLOAD_FIELD: FieldSpec = FieldSpec {
    name: "json_result",
    offset: 2 * PTR,
    width: PTR,
    kind: FieldKind::CString,
};

pub const RESULT_LAYOUT: [FieldSpec; 3] = [SUCCESS_FIELD, ERROR_FIELD, PAYLOAD_FIELD];

pub const RESULT_SIZE: usize = 3 * PTR;

const _: () = {
    assert!(offset_of!(RawParseResult, success) == SUCCESS_FIELD.offset);
    assert!(offset_of!(RawParseResult, err) == ERROR_FIELD.offset);
    assert!(offset_of!(RawParseResult, json_result) == PAYLOAD_FIELD.offset);
    assert!(size_of::<RawParseResult>() == RESULT_SIZE);
    assert!(align_of::<RawParseResult>() == PTR);
};

/// Decodes a native result record into an owned `ParseOutcome`.
///
/// # Safety
/// `record` must point to a live record laid out as `RESULT_LAYOUT` describes, whose
/// string pointers (when non-null) reference NUL-terminated strings that stay valid
/// for the duration of the call.
pub unsafe fn decode_result(record: NonNull<u8>) -> Result<ParseOutcome, Error> {
    let success = unsafe { read_flag(record, SUCCESS_FIELD) };
    if success {
        let bytes = unsafe { copy_cstring(record, PAYLOAD_FIELD) }?;
        let text = String::from_utf8(bytes).map_err(|err| {
            corrupt(PAYLOAD_FIELD, "success payload is not valid UTF-8").with_source(err)
        })?;
        let value = serde_json::from_str::<Value>(&text).map_err(|err| {
            corrupt(PAYLOAD_FIELD, "success payload is not valid JSON").with_source(err)
        })?;
        Ok(ParseOutcome::Success(JsonPayload::new(text, value)))
    } else {
        let bytes = unsafe { copy_cstring(record, ERROR_FIELD) }?;
        let message = match String::from_utf8(bytes) {
            Ok(message) => message,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        };
        Ok(ParseOutcome::Failure(message))
    }
}

unsafe fn read_flag(record: NonNull<u8>, field: FieldSpec) -> bool {
    debug_assert_eq!(field.kind, FieldKind::Flag);
    let byte = unsafe { record.as_ptr().add(field.offset).read() };
    byte != 0
}

unsafe fn read_pointer(record: NonNull<u8>, field: FieldSpec) -> *const c_char {
    debug_assert_eq!(field.kind, FieldKind::CString);
    debug_assert_eq!(field.width, PTR);
    unsafe {
        record
            .as_ptr()
            .add(field.offset)
            .cast::<*const c_char>()
            .read_unaligned()
    }
}

unsafe fn copy_cstring(record: NonNull<u8>, field: FieldSpec) -> Result<Vec<u8>, Error> {
    let ptr = unsafe { read_pointer(record, field) };
    if ptr.is_null() {
        return Err(corrupt(field, "pointer selected by the success flag is null"));
    }
    let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes().to_vec();
    Ok(bytes)
}

fn corrupt(field: FieldSpec, message: &str) -> Error {
    tracing::warn!(field = field.name, "native result contract violated: {message}");
    Error::new(ErrorKind::PayloadCorrupt)
        .with_message(message)
        .with_field(field.name)
}
