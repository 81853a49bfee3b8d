//! Purpose: Instrumented stand-in for the native parser library.
//! Exports: `StubParser`, `StubMode`, `StubStats`.
//! Role: Allocates `ParseResult` records with the C allocator so tests and the CLI can
//!       exercise the real boundary without the prebuilt library.
//! Invariants: Records and strings come from `libc::malloc` and go back through `libc::free`.
//! Invariants: Released memory is poisoned; released records stay quarantined (allocated)
//!             until the stub is dropped, so their addresses cannot be handed out again.
//! Invariants: A second release of the same handle is counted, never freed twice.
use std::collections::HashSet;
use std::ffi::{CStr, c_char, c_void};
use std::mem::size_of;
use std::ptr;
use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

use bstr::ByteSlice;
use serde::Serialize;

use crate::core::command::decode_wire;
use crate::core::layout::RawParseResult;
use crate::core::native::{NativeParser, RawResultHandle};

const POISON: u8 = 0xA5;

/// What the stand-in hands back from `invoke`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StubMode {
    /// Parse the wire command and report success or rejection.
    #[default]
    Parse,
    /// Simulate an allocation failure: return a null handle.
    NullHandle,
    /// Success flag set but no payload pointer.
    MissingPayload,
    /// Failure flag set but no error pointer.
    MissingMessage,
    /// Success flag with a payload that is not JSON.
    InvalidJson,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StubStats {
    pub invocations: usize,
    pub releases: usize,
    pub double_releases: usize,
    pub live: usize,
}

#[derive(Debug, Default)]
pub struct StubParser {
    mode: StubMode,
    invocations: AtomicUsize,
    releases: AtomicUsize,
    double_releases: AtomicUsize,
    records: Mutex<RecordLedger>,
}

// Record addresses by state. An address is in at most one set.
#[derive(Debug, Default)]
struct RecordLedger {
    live: HashSet<usize>,
    quarantined: HashSet<usize>,
}

impl StubParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: StubMode) -> Self {
        Self {
            mode,
            invocations: AtomicUsize::default(),
            releases: AtomicUsize::default(),
            double_releases: AtomicUsize::default(),
            records: Mutex::default(),
        }
    }

    pub fn mode(&self) -> StubMode {
        self.mode
    }

    pub fn stats(&self) -> StubStats {
        StubStats {
            invocations: self.invocations.load(Ordering::SeqCst),
            releases: self.releases.load(Ordering::SeqCst),
            double_releases: self.double_releases.load(Ordering::SeqCst),
            live: self.ledger().live.len(),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, RecordLedger> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn build(&self, command: &CStr) -> Reply {
        match self.mode {
            StubMode::Parse => parse_reply(command.to_bytes()),
            StubMode::NullHandle => Reply::Null,
            StubMode::MissingPayload => Reply::Record {
                success: true,
                err: None,
                json: None,
            },
            StubMode::MissingMessage => Reply::Record {
                success: false,
                err: None,
                json: None,
            },
            StubMode::InvalidJson => Reply::Record {
                success: true,
                err: None,
                json: Some(b"{\"command\": ".to_vec()),
            },
        }
    }
}

// Records come from `alloc_record` and stay valid until `release` retires them.
unsafe impl NativeParser for StubParser {
    fn name(&self) -> &str {
        "stub"
    }

    fn invoke(&self, command: &CStr) -> RawResultHandle {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let (success, err, json) = match self.build(command) {
            Reply::Null => return RawResultHandle::null(),
            Reply::Record { success, err, json } => (success, err, json),
        };

        let record = match unsafe { alloc_record(success, err.as_deref(), json.as_deref()) } {
            Some(record) => record,
            None => return RawResultHandle::null(),
        };
        self.ledger().live.insert(record as usize);
        unsafe { RawResultHandle::from_ptr(record.cast::<c_void>()) }
    }

    unsafe fn release(&self, handle: RawResultHandle) {
        let mut ledger = self.ledger();
        if !ledger.live.remove(&handle.addr()) {
            self.double_releases.fetch_add(1, Ordering::SeqCst);
            tracing::error!(
                handle = ?handle,
                quarantined = ledger.quarantined.contains(&handle.addr()),
                "stub parser: release of unknown or released handle"
            );
            return;
        }
        unsafe { retire_record(handle.as_ptr().cast::<RawParseResult>()) };
        ledger.quarantined.insert(handle.addr());
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

enum Reply {
    Null,
    Record {
        success: bool,
        err: Option<Vec<u8>>,
        json: Option<Vec<u8>>,
    },
}

#[derive(Serialize)]
struct StubPayload {
    command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<Vec<String>>,
}

fn parse_reply(wire: &[u8]) -> Reply {
    let rejected = |message: String| Reply::Record {
        success: false,
        err: Some(message.into_bytes()),
        json: None,
    };

    let args = match decode_wire(wire) {
        Ok(args) => args,
        Err(err) => return rejected(err.message().unwrap_or("malformed command").to_string()),
    };
    let name = args[0].to_str_lossy().to_ascii_uppercase();
    let text = |idx: usize| args[idx].to_str_lossy().into_owned();

    let payload = match (name.as_str(), args.len()) {
        ("SET", 3) => StubPayload {
            command: name.clone(),
            key: Some(text(1)),
            value: Some(text(2)),
            args: None,
        },
        ("GET" | "DEL" | "EXISTS", 2) => StubPayload {
            command: name.clone(),
            key: Some(text(1)),
            value: None,
            args: None,
        },
        ("PING", 1 | 2) => StubPayload {
            command: name.clone(),
            key: None,
            value: None,
            args: Some((1..args.len()).map(text).collect()),
        },
        ("SET" | "GET" | "DEL" | "EXISTS" | "PING", _) => {
            return rejected(format!("wrong number of arguments for '{name}'"));
        }
        _ => return rejected(format!("unknown command '{name}'")),
    };

    match serde_json::to_vec(&payload) {
        Ok(json) => Reply::Record {
            success: true,
            err: None,
            json: Some(json),
        },
        Err(err) => rejected(err.to_string()),
    }
}

unsafe fn alloc_record(
    success: bool,
    err: Option<&[u8]>,
    json: Option<&[u8]>,
) -> Option<*mut RawParseResult> {
    let err_ptr = match err {
        Some(bytes) => unsafe { alloc_cstring(bytes)? },
        None => ptr::null_mut(),
    };
    let json_ptr = match json {
        Some(bytes) => match unsafe { alloc_cstring(bytes) } {
            Some(ptr) => ptr,
            None => {
                unsafe { libc::free(err_ptr.cast()) };
                return None;
            }
        },
        None => ptr::null_mut(),
    };

    let record = unsafe { libc::malloc(size_of::<RawParseResult>()) }.cast::<RawParseResult>();
    if record.is_null() {
        unsafe {
            libc::free(err_ptr.cast());
            libc::free(json_ptr.cast());
        }
        return None;
    }
    unsafe {
        record.write(RawParseResult {
            success,
            err: err_ptr,
            json_result: json_ptr,
        });
    }
    Some(record)
}

unsafe fn alloc_cstring(bytes: &[u8]) -> Option<*mut c_char> {
    let ptr = unsafe { libc::malloc(bytes.len() + 1) }.cast::<u8>();
    if ptr.is_null() {
        return None;
    }
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len());
        ptr.add(bytes.len()).write(0);
    }
    Some(ptr.cast::<c_char>())
}

impl Drop for StubParser {
    fn drop(&mut self) {
        let ledger = self.ledger();
        for &addr in &ledger.live {
            let record = addr as *mut RawParseResult;
            unsafe {
                retire_record(record);
                libc::free(record.cast());
            }
        }
        for &addr in &ledger.quarantined {
            unsafe { libc::free((addr as *mut RawParseResult).cast()) };
        }
    }
}

// Frees the strings and poisons the record itself; the record allocation stays
// owned by the ledger.
unsafe fn retire_record(record: *mut RawParseResult) {
    unsafe {
        let RawParseResult {
            err, json_result, ..
        } = record.read();
        poison_and_free_cstring(err);
        poison_and_free_cstring(json_result);
        ptr::write_bytes(record.cast::<u8>(), POISON, size_of::<RawParseResult>());
    }
}

unsafe fn poison_and_free_cstring(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        let len = libc::strlen(ptr);
        ptr::write_bytes(ptr.cast::<u8>(), POISON, len);
        libc::free(ptr.cast());
    }
}
