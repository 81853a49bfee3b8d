//! Purpose: Crate-wide error type for the native parser boundary.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Invariants: Boundary violations (`NullHandle`, `PayloadCorrupt`) are kinds of their own.
//! Invariants: A rejected command is not an error; it travels as `ParseOutcome::Failure`.
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    NullHandle,
    PayloadCorrupt,
    Unsupported,
    Io,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Internal => "internal",
            ErrorKind::Usage => "usage",
            ErrorKind::NullHandle => "null-handle",
            ErrorKind::PayloadCorrupt => "payload-corrupt",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Io => "io",
        }
    }

    /// True for kinds that mean the boundary itself is broken.
    pub fn is_boundary_violation(self) -> bool {
        matches!(self, ErrorKind::NullHandle | ErrorKind::PayloadCorrupt)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    field: Option<&'static str>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            field: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Result-record field the error was raised for, if any.
    pub fn field(&self) -> Option<&'static str> {
        self.field
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_field(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(field) = self.field {
            write!(f, " (field: {field})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::NullHandle => 3,
        ErrorKind::PayloadCorrupt => 4,
        ErrorKind::Unsupported => 5,
        ErrorKind::Io => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};
    use std::error::Error as StdError;

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::NullHandle, 3),
            (ErrorKind::PayloadCorrupt, 4),
            (ErrorKind::Unsupported, 5),
            (ErrorKind::Io, 6),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn only_null_handle_and_corrupt_are_boundary_violations() {
        assert!(ErrorKind::NullHandle.is_boundary_violation());
        assert!(ErrorKind::PayloadCorrupt.is_boundary_violation());
        assert!(!ErrorKind::Usage.is_boundary_violation());
        assert!(!ErrorKind::Internal.is_boundary_violation());
    }

    #[test]
    fn display_includes_message_and_field() {
        let err = Error::new(ErrorKind::PayloadCorrupt)
            .with_message("null pointer")
            .with_field("json_result");
        assert_eq!(
            err.to_string(),
            "PayloadCorrupt: null pointer (field: json_result)"
        );
    }

    #[test]
    fn source_is_exposed() {
        let io = std::io::Error::other("boom");
        let err = Error::new(ErrorKind::Io).with_source(io);
        assert_eq!(err.source().map(|s| s.to_string()), Some("boom".to_string()));
    }
}
