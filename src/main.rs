//! Purpose: `statedb-parse` CLI entry point.
//! Role: Binary crate root; encodes commands and runs them through the native parser boundary.
//! Invariants: Parse results and encodings are emitted as JSON on stdout.
//! Invariants: Errors are emitted on stderr (JSON when stderr is not a terminal).
//! Invariants: Exit code is 0 on success, `REJECTED_EXIT_CODE` for rejected commands,
//!             otherwise `to_exit_code` of the error kind.
use std::ffi::OsString;
use std::io::{self, IsTerminal, Read, Write};

use bstr::ByteSlice;
use clap::{Args, Parser, Subcommand, ValueEnum, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

use statedb_parser::{
    Boundary, BoundaryConfig, Command as WireCommand, CommandBuf, Error, ErrorKind,
    NativeParser, ParseOutcome, StubMode, StubParser, to_exit_code,
};

const REJECTED_EXIT_CODE: i32 = 10;

#[derive(Parser, Debug)]
#[command(
    name = "statedb-parse",
    version,
    about = "Encode commands and parse them with the StateDB native parser",
    arg_required_else_help = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "native",
        value_enum,
        help = "Parser implementation: native (linked library) or stub (built-in stand-in)"
    )]
    engine: Engine,
    #[arg(
        long,
        default_value = "parse",
        value_enum,
        help = "Stand-in behaviour when --engine stub is used"
    )]
    stub_mode: StubModeCli,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Engine {
    Native,
    Stub,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StubModeCli {
    Parse,
    NullHandle,
    MissingPayload,
    MissingMessage,
    InvalidJson,
}

impl From<StubModeCli> for StubMode {
    fn from(mode: StubModeCli) -> Self {
        match mode {
            StubModeCli::Parse => StubMode::Parse,
            StubModeCli::NullHandle => StubMode::NullHandle,
            StubModeCli::MissingPayload => StubMode::MissingPayload,
            StubModeCli::MissingMessage => StubMode::MissingMessage,
            StubModeCli::InvalidJson => StubMode::InvalidJson,
        }
    }
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Print the wire encoding of a command.
    Encode(EncodeArgs),
    /// Parse a command through the native boundary and print the JSON result.
    Parse(ParseArgs),
}

#[derive(Args, Debug)]
struct EncodeArgs {
    #[arg(long, help = "Write the exact wire bytes instead of a JSON summary")]
    raw: bool,
    #[arg(required = true, help = "Command name followed by its arguments")]
    args: Vec<OsString>,
}

#[derive(Args, Debug)]
struct ParseArgs {
    #[arg(long, help = "Pretty-print the JSON result")]
    pretty: bool,
    #[arg(long, help = "Read one wire-encoded command from stdin instead of ARGS")]
    wire: bool,
    #[arg(required_unless_present = "wire", conflicts_with = "wire")]
    args: Vec<OsString>,
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let code = if err.kind() == ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand {
                    2
                } else {
                    0
                };
                return Ok(code);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `statedb-parse --help`."));
            }
        },
    };

    match cli.command {
        CliCommand::Encode(args) => run_encode(args),
        CliCommand::Parse(args) => {
            // One parse per process; the default serialized policy always applies.
            let config = BoundaryConfig::new();
            match cli.engine {
                Engine::Stub => {
                    let parser = StubParser::with_mode(cli.stub_mode.into());
                    run_parse(&Boundary::with_config(parser, config), args)
                }
                Engine::Native => run_native(config, args),
            }
        }
    }
}

#[cfg(feature = "native")]
fn run_native(config: BoundaryConfig, args: ParseArgs) -> Result<i32, Error> {
    let parser = statedb_parser::LinkedParser::new();
    run_parse(&Boundary::with_config(parser, config), args)
}

#[cfg(not(feature = "native"))]
fn run_native(_config: BoundaryConfig, _args: ParseArgs) -> Result<i32, Error> {
    Err(Error::new(ErrorKind::Unsupported)
        .with_message("this build does not link the native parser")
        .with_hint("Rebuild with `--features native`, or pass `--engine stub`."))
}

fn run_encode(args: EncodeArgs) -> Result<i32, Error> {
    let command = WireCommand::new(args.args.into_iter().map(OsString::into_encoded_bytes))?;
    let wire = command.encode();
    if args.raw {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(&wire)
            .and_then(|_| stdout.flush())
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to write wire bytes")
                    .with_source(err)
            })?;
        return Ok(0);
    }
    emit_json(
        &json!({
            "argc": command.argc(),
            "len": wire.len(),
            "wire": wire.to_str_lossy(),
        }),
        false,
    );
    Ok(0)
}

fn run_parse<P: NativeParser>(boundary: &Boundary<P>, args: ParseArgs) -> Result<i32, Error> {
    let command = if args.wire {
        let mut bytes = Vec::new();
        io::stdin().read_to_end(&mut bytes).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read wire command from stdin")
                .with_source(err)
        })?;
        CommandBuf::from_wire(&bytes)?
    } else {
        WireCommand::new(args.args.into_iter().map(OsString::into_encoded_bytes))?.to_buf()?
    };
    tracing::info!(engine = boundary.parser().name(), argc = command.argc(), "parsing command");

    match boundary.parse(&command)? {
        ParseOutcome::Success(payload) => {
            if args.pretty {
                emit_json(payload.value(), true);
            } else {
                println!("{payload}");
            }
            Ok(0)
        }
        ParseOutcome::Failure(message) => {
            emit_json(&json!({ "rejected": { "message": message } }), args.pretty);
            Ok(REJECTED_EXIT_CODE)
        }
    }
}

fn emit_json(value: &Value, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NullHandle => "native parser returned no result".to_string(),
        ErrorKind::PayloadCorrupt => "native result is corrupt".to_string(),
        ErrorKind::Unsupported => "unsupported".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(field) = err.field() {
        inner.insert("field".to_string(), json!(field));
    }
    if err.kind().is_boundary_violation() {
        inner.insert("boundary".to_string(), json!(true));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(field) = err.field() {
        lines.push(format!("field: {field}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
