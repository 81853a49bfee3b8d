// CLI integration tests for encode/parse flows using the built-in stand-in parser.
use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_statedb-parse");
    Command::new(exe)
}

fn parse_json(output: &[u8]) -> Value {
    let text = std::str::from_utf8(output).expect("utf8");
    serde_json::from_str(text.trim()).expect("valid json")
}

// stderr may carry tracing output ahead of the error object.
fn parse_error_line(stderr: &[u8]) -> Value {
    let text = String::from_utf8_lossy(stderr);
    let line = text
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .expect("error line");
    serde_json::from_str(line).expect("valid json")
}

#[test]
fn encode_reports_wire_bytes() {
    let out = cmd()
        .args(["encode", "SET", "mykey", "myvalue"])
        .output()
        .expect("encode");
    assert!(out.status.success());
    let json = parse_json(&out.stdout);
    assert_eq!(json["argc"], 3);
    assert_eq!(
        json["wire"],
        "*3\r\n$3\r\nSET\r\n$5\r\nmykey\r\n$7\r\nmyvalue\r\n"
    );
    assert_eq!(json["len"], 37);
}

#[test]
fn encode_raw_writes_exact_bytes() {
    let out = cmd()
        .args(["encode", "--raw", "GET", "k"])
        .output()
        .expect("encode");
    assert!(out.status.success());
    assert_eq!(out.stdout, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
}

#[test]
fn stub_parse_prints_payload() {
    let out = cmd()
        .args(["--engine", "stub", "parse", "SET", "mykey", "myvalue"])
        .output()
        .expect("parse");
    assert!(out.status.success());
    let json = parse_json(&out.stdout);
    assert_eq!(json["command"], "SET");
    assert_eq!(json["key"], "mykey");
    assert_eq!(json["value"], "myvalue");
}

#[test]
fn stub_parse_reads_wire_from_stdin() {
    let mut child = cmd()
        .args(["--engine", "stub", "parse", "--wire", "--pretty"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"*2\r\n$3\r\nGET\r\n$5\r\nmykey\r\n")
        .expect("write");
    let out = child.wait_with_output().expect("wait");
    assert!(out.status.success());
    let text = String::from_utf8(out.stdout).expect("utf8");
    assert!(text.contains('\n'));
    let json: Value = serde_json::from_str(&text).expect("json");
    assert_eq!(json["key"], "mykey");
}

#[test]
fn rejected_command_has_its_own_exit_code() {
    let out = cmd()
        .args(["--engine", "stub", "parse", "HOVER"])
        .output()
        .expect("parse");
    assert_eq!(out.status.code(), Some(10));
    let json = parse_json(&out.stdout);
    assert_eq!(json["rejected"]["message"], "unknown command 'HOVER'");
}

#[test]
fn boundary_violations_map_to_error_exit_codes() {
    let cases = [("null-handle", 3, "NullHandle"), ("missing-payload", 4, "PayloadCorrupt")];
    for (mode, code, kind) in cases {
        let out = cmd()
            .args(["--engine", "stub", "--stub-mode", mode, "parse", "GET", "k"])
            .output()
            .expect("parse");
        assert_eq!(out.status.code(), Some(code), "mode {mode}");
        assert!(out.stdout.is_empty());
        let err = parse_error_line(&out.stderr);
        assert_eq!(err["error"]["kind"], kind);
        assert_eq!(err["error"]["boundary"], true);
    }
}

#[test]
fn malformed_wire_is_a_usage_error() {
    let mut child = cmd()
        .args(["--engine", "stub", "parse", "--wire"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"*2\r\n$3\r\nGET\r\n")
        .expect("write");
    let out = child.wait_with_output().expect("wait");
    assert_eq!(out.status.code(), Some(2));
    let err = parse_error_line(&out.stderr);
    assert_eq!(err["error"]["kind"], "Usage");
}

#[cfg(not(feature = "native"))]
#[test]
fn native_engine_requires_feature() {
    let out = cmd().args(["parse", "GET", "k"]).output().expect("parse");
    assert_eq!(out.status.code(), Some(5));
    let err = parse_error_line(&out.stderr);
    assert_eq!(err["error"]["kind"], "Unsupported");
}

#[test]
fn parse_has_no_parallel_switch() {
    let out = cmd()
        .args(["--engine", "stub", "parse", "--parallel", "GET", "k"])
        .output()
        .expect("parse");
    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());
    let err = parse_error_line(&out.stderr);
    assert_eq!(err["error"]["kind"], "Usage");
}
