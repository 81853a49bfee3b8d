//! Purpose: Single entry point for parsing a command through the native parser.
//! Exports: `Boundary`, `BoundaryConfig`, `Concurrency`.
//! Role: Boundary Orchestrator; sequences invoke -> decode -> release as one scoped call.
//! Invariants: A non-null handle is always released before `parse` returns or unwinds.
//! Invariants: `NullHandle`/`PayloadCorrupt` surface as errors, never as `ParseOutcome::Failure`.
//! Invariants: Native calls are serialized unless the caller opts into `Concurrency::Parallel`.
use std::sync::{Mutex, MutexGuard};

use crate::core::command::{Command, CommandBuf};
use crate::core::error::Error;
use crate::core::handle::OwnedResult;
use crate::core::native::NativeParser;
use crate::core::outcome::ParseOutcome;

/// How concurrent callers may reach the native parser.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Concurrency {
    /// One native call at a time across the whole boundary.
    #[default]
    Serialized,
    /// Calls run in parallel. Only valid when the native library is known to be
    /// thread-safe, including its allocator.
    Parallel,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BoundaryConfig {
    pub concurrency: Concurrency,
}

impl BoundaryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }
}

pub struct Boundary<P: NativeParser> {
    parser: P,
    config: BoundaryConfig,
    gate: Mutex<()>,
}

impl<P: NativeParser> Boundary<P> {
    pub fn new(parser: P) -> Self {
        Self::with_config(parser, BoundaryConfig::default())
    }

    pub fn with_config(parser: P, config: BoundaryConfig) -> Self {
        Self {
            parser,
            config,
            gate: Mutex::new(()),
        }
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }

    pub fn config(&self) -> BoundaryConfig {
        self.config
    }

    /// Parses one validated wire command.
    ///
    /// `Ok(Failure)` means the native engine rejected the command; `Err` means the
    /// boundary itself failed.
    pub fn parse(&self, command: &CommandBuf) -> Result<ParseOutcome, Error> {
        let _gate = self.enter();
        tracing::debug!(
            parser = self.parser.name(),
            argc = command.argc(),
            wire_len = command.wire().len(),
            "invoking native parser"
        );

        let handle = self.parser.invoke(command.as_cstr());
        // `NativeParser` is an unsafe trait: a non-null handle points to a live record.
        let owned = unsafe { OwnedResult::acquire(&self.parser, handle) }?;
        let decoded = owned.decode();
        drop(owned);

        match &decoded {
            Ok(ParseOutcome::Success(_)) => tracing::debug!("native parser accepted command"),
            Ok(ParseOutcome::Failure(message)) => {
                tracing::debug!(%message, "native parser rejected command")
            }
            Err(err) => tracing::warn!(error = %err, "native result could not be decoded"),
        }
        decoded
    }

    pub fn parse_command(&self, command: &Command) -> Result<ParseOutcome, Error> {
        self.parse(&command.to_buf()?)
    }

    pub fn parse_args<I, A>(&self, args: I) -> Result<ParseOutcome, Error>
    where
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        self.parse_command(&Command::new(args)?)
    }

    /// Validates caller-supplied wire bytes before they reach the native side.
    pub fn parse_wire(&self, wire: &[u8]) -> Result<ParseOutcome, Error> {
        self.parse(&CommandBuf::from_wire(wire)?)
    }

    fn enter(&self) -> Option<MutexGuard<'_, ()>> {
        match self.config.concurrency {
            Concurrency::Serialized => {
                Some(self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
            }
            Concurrency::Parallel => None,
        }
    }
}
