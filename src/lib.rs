//! Purpose: Safe boundary around the StateDB native command parser.
//! Exports: `core` plus re-exports of the types most callers need.
//! Role: Library backing the `statedb-parse` CLI and downstream Rust callers.
//! Invariants: All native memory access is confined to `core::layout` and `core::native`.
//! Invariants: Values returned to callers never alias native memory.
pub mod core;

pub use crate::core::boundary::{Boundary, BoundaryConfig, Concurrency};
pub use crate::core::command::{Command, CommandBuf};
pub use crate::core::error::{Error, ErrorKind, to_exit_code};
#[cfg(feature = "native")]
pub use crate::core::native::linked::LinkedParser;
pub use crate::core::native::stub::{StubMode, StubParser, StubStats};
pub use crate::core::native::{NativeParser, RawResultHandle};
pub use crate::core::outcome::{JsonPayload, ParseOutcome};
