//! Purpose: Wire encoding for commands handed to the native parser.
//! Exports: `Command`, `CommandBuf`, `decode_wire`.
//! Role: Builds and structurally validates `*<argc>\r\n` + `$<len>\r\n<bytes>\r\n` buffers.
//! Invariants: A `CommandBuf` holds exactly one command followed by a single NUL sentinel.
//! Invariants: Interior NUL bytes are rejected; the native side stops reading at the first NUL.
//! Notes: Only structure is checked here. Command names and arity belong to the native engine.
use std::ffi::{CStr, CString};
use std::fmt;

use bstr::ByteSlice;

use crate::core::error::{Error, ErrorKind};

const MAX_ARGC: usize = 1024 * 1024;
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Command {
    args: Vec<Vec<u8>>,
}

impl Command {
    pub fn new<I, A>(args: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        let args: Vec<Vec<u8>> = args.into_iter().map(Into::into).collect();
        if args.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("command has no arguments"));
        }
        Ok(Self { args })
    }

    pub fn name(&self) -> &[u8] {
        &self.args[0]
    }

    pub fn args(&self) -> &[Vec<u8>] {
        &self.args
    }

    pub fn argc(&self) -> usize {
        self.args.len()
    }

    /// Wire bytes without the NUL sentinel.
    pub fn encode(&self) -> Vec<u8> {
        let body: usize = self.args.iter().map(|arg| arg.len() + 16).sum();
        let mut out = Vec::with_capacity(body + 16);
        out.push(b'*');
        out.extend_from_slice(self.args.len().to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        for arg in &self.args {
            out.push(b'$');
            out.extend_from_slice(arg.len().to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(arg);
            out.extend_from_slice(b"\r\n");
        }
        out
    }

    pub fn to_buf(&self) -> Result<CommandBuf, Error> {
        CommandBuf::from_encoded(self.encode(), self.argc())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, arg) in self.args.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", arg.as_bstr())?;
        }
        Ok(())
    }
}

/// A validated, NUL-terminated wire buffer ready to cross into the native parser.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandBuf {
    wire: CString,
    argc: usize,
}

impl CommandBuf {
    /// Accepts one encoded command, with or without its trailing NUL sentinel.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        let body = bytes.strip_suffix(b"\0").unwrap_or(bytes);
        let args = decode_wire(body)?;
        Self::from_encoded(body.to_vec(), args.len())
    }

    fn from_encoded(wire: Vec<u8>, argc: usize) -> Result<Self, Error> {
        let wire = CString::new(wire).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "command contains a NUL byte at offset {}",
                    err.nul_position()
                ))
                .with_hint("The native parser reads up to the first NUL; strip NUL bytes from arguments.")
        })?;
        Ok(Self { wire, argc })
    }

    pub fn as_cstr(&self) -> &CStr {
        &self.wire
    }

    /// Wire bytes without the NUL sentinel.
    pub fn wire(&self) -> &[u8] {
        self.wire.as_bytes()
    }

    pub fn argc(&self) -> usize {
        self.argc
    }
}

impl TryFrom<&Command> for CommandBuf {
    type Error = Error;

    fn try_from(command: &Command) -> Result<Self, Self::Error> {
        command.to_buf()
    }
}

/// Splits one wire-encoded command into its arguments.
///
/// The whole input must be consumed: trailing bytes after the last bulk string are an error.
pub fn decode_wire(bytes: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
    let mut reader = WireReader { bytes, pos: 0 };

    reader.expect_byte(b'*')?;
    let argc = reader.read_len("argument count")?;
    if argc == 0 {
        return Err(malformed(0, "argument count must be at least 1"));
    }
    if argc > MAX_ARGC {
        return Err(malformed(1, "argument count exceeds limit"));
    }

    let mut args = Vec::with_capacity(argc.min(64));
    for _ in 0..argc {
        reader.expect_byte(b'$')?;
        let len = reader.read_len("bulk string length")?;
        if len > MAX_BULK_LEN {
            return Err(malformed(reader.pos, "bulk string length exceeds limit"));
        }
        let arg = reader.take(len)?;
        reader.expect_crlf()?;
        args.push(arg.to_vec());
    }

    if reader.pos != bytes.len() {
        return Err(malformed(reader.pos, "trailing bytes after command"));
    }
    Ok(args)
}

struct WireReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn expect_byte(&mut self, expected: u8) -> Result<(), Error> {
        match self.bytes.get(self.pos) {
            Some(&byte) if byte == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(&byte) => Err(malformed(
                self.pos,
                format!(
                    "expected `{}`, found `{}`",
                    char::from(expected),
                    [byte].as_bstr()
                ),
            )),
            None => Err(malformed(
                self.pos,
                format!("expected `{}`, found end of input", char::from(expected)),
            )),
        }
    }

    fn expect_crlf(&mut self) -> Result<(), Error> {
        if self.bytes.get(self.pos..self.pos + 2) == Some(b"\r\n".as_slice()) {
            self.pos += 2;
            return Ok(());
        }
        Err(malformed(self.pos, "expected CRLF"))
    }

    fn read_len(&mut self, what: &str) -> Result<usize, Error> {
        let start = self.pos;
        let digits = self.bytes[start..]
            .iter()
            .take_while(|byte| byte.is_ascii_digit())
            .count();
        if digits == 0 {
            return Err(malformed(start, format!("{what} is not a decimal number")));
        }
        let text = &self.bytes[start..start + digits];
        self.pos += digits;
        self.expect_crlf()?;
        text.to_str()
            .ok()
            .and_then(|text| text.parse::<usize>().ok())
            .ok_or_else(|| malformed(start, format!("{what} is out of range")))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], Error> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| malformed(self.pos, "bulk string is truncated"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

fn malformed(offset: usize, message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Usage).with_message(format!(
        "malformed wire command at byte {offset}: {}",
        message.into()
    ))
}
