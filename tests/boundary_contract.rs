//! Purpose: Contract coverage for the native parser boundary.
//! Exports: Integration tests only.
//! Role: Drive `Boundary` against the instrumented stand-in and check release discipline.
//! Invariants: Every non-null handle is released exactly once; null handles never are.
//! Invariants: Boundary violations surface as errors, rejections as `ParseOutcome::Failure`.
use std::ffi::CStr;
use std::sync::Arc;
use std::thread;

use statedb_parser::{
    Boundary, BoundaryConfig, CommandBuf, Concurrency, ErrorKind, NativeParser, ParseOutcome,
    RawResultHandle, StubMode, StubParser,
};

const SET_WIRE: &[u8] = b"*3\r\n$3\r\nSET\r\n$5\r\nmykey\r\n$7\r\nmyvalue\r\n";

#[test]
fn set_command_round_trips_to_json() {
    let boundary = Boundary::new(StubParser::new());
    let outcome = boundary.parse_wire(SET_WIRE).expect("parse");

    let payload = outcome.as_success().expect("success");
    let value = payload.value();
    assert_eq!(value["command"], "SET");
    assert_eq!(value["key"], "mykey");
    assert_eq!(value["value"], "myvalue");

    let stats = boundary.parser().stats();
    assert_eq!((stats.invocations, stats.releases, stats.live), (1, 1, 0));
}

#[test]
fn well_formed_commands_yield_exactly_one_outcome() {
    let boundary = Boundary::new(StubParser::new());
    let commands: [&[&str]; 6] = [
        &["SET", "a", "1"],
        &["GET", "a"],
        &["PING"],
        &["PING", "hello"],
        &["GET"],
        &["NOPE", "x"],
    ];
    for args in commands {
        let outcome = boundary.parse_args(args.iter().copied()).expect("outcome");
        assert_ne!(
            outcome.as_success().is_some(),
            outcome.as_failure().is_some(),
            "{args:?}"
        );
    }
    let stats = boundary.parser().stats();
    assert_eq!(stats.invocations, commands.len());
    assert_eq!(stats.releases, commands.len());
    assert_eq!(stats.double_releases, 0);
}

#[test]
fn rejected_command_is_failure_data() {
    let boundary = Boundary::new(StubParser::new());
    let outcome = boundary.parse_args(["FLUSHEVERYTHING"]).expect("outcome");
    assert_eq!(
        outcome,
        ParseOutcome::Failure("unknown command 'FLUSHEVERYTHING'".to_string())
    );
    assert_eq!(boundary.parser().stats().releases, 1);
}

#[test]
fn null_handle_is_reported_without_release() {
    let boundary = Boundary::new(StubParser::with_mode(StubMode::NullHandle));
    let err = boundary.parse_wire(SET_WIRE).expect_err("null handle");
    assert_eq!(err.kind(), ErrorKind::NullHandle);

    let stats = boundary.parser().stats();
    assert_eq!(stats.invocations, 1);
    assert_eq!(stats.releases, 0);
    assert_eq!(stats.double_releases, 0);
}

#[test]
fn success_without_payload_is_corrupt() {
    let boundary = Boundary::new(StubParser::with_mode(StubMode::MissingPayload));
    let err = boundary.parse_wire(SET_WIRE).expect_err("corrupt");
    assert_eq!(err.kind(), ErrorKind::PayloadCorrupt);
    assert_eq!(err.field(), Some("json_result"));
    assert_eq!(boundary.parser().stats().releases, 1);
}

#[test]
fn invalid_json_payload_is_corrupt_and_still_released() {
    let boundary = Boundary::new(StubParser::with_mode(StubMode::InvalidJson));
    let err = boundary.parse_wire(SET_WIRE).expect_err("corrupt");
    assert_eq!(err.kind(), ErrorKind::PayloadCorrupt);
    assert!(err.kind().is_boundary_violation());

    let stats = boundary.parser().stats();
    assert_eq!((stats.releases, stats.double_releases, stats.live), (1, 0, 0));
}

#[test]
fn decoded_values_survive_poisoned_release() {
    let boundary = Boundary::new(StubParser::new());
    let accepted = boundary.parse_wire(SET_WIRE).expect("parse");
    let rejected = boundary.parse_args(["GET"]).expect("parse");

    // Both records were poisoned and freed by now.
    assert_eq!(boundary.parser().stats().live, 0);
    assert_eq!(
        accepted.as_success().map(|p| p.as_str()),
        Some(r#"{"command":"SET","key":"mykey","value":"myvalue"}"#)
    );
    assert_eq!(
        rejected.as_failure(),
        Some("wrong number of arguments for 'GET'")
    );
}

#[test]
fn concurrent_calls_do_not_cross_talk() {
    let boundary = Arc::new(Boundary::with_config(
        StubParser::new(),
        BoundaryConfig::new().with_concurrency(Concurrency::Parallel),
    ));

    let workers: Vec<_> = (0..100)
        .map(|i| {
            let boundary = Arc::clone(&boundary);
            thread::spawn(move || {
                let key = format!("key-{i}");
                let value = format!("value-{i}");
                let outcome = boundary
                    .parse_args(["SET", key.as_str(), value.as_str()])
                    .expect("parse");
                let payload = outcome.into_result().expect("success");
                assert_eq!(payload.value()["key"], key.as_str());
                assert_eq!(payload.value()["value"], value.as_str());
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker");
    }

    let stats = boundary.parser().stats();
    assert_eq!(stats.invocations, 100);
    assert_eq!(stats.releases, 100);
    assert_eq!(stats.double_releases, 0);
    assert_eq!(stats.live, 0);
}

#[test]
fn serialized_boundary_is_shareable_across_threads() {
    let boundary = Arc::new(Boundary::new(StubParser::new()));
    let workers: Vec<_> = (0..8)
        .map(|i| {
            let boundary = Arc::clone(&boundary);
            thread::spawn(move || {
                let key = format!("k{i}");
                let outcome = boundary.parse_args(["GET", key.as_str()]).expect("parse");
                assert_eq!(outcome.as_success().unwrap().value()["key"], key.as_str());
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker");
    }
    assert_eq!(boundary.parser().stats().releases, 8);
}

/// Native side that never manages to allocate a result.
struct AlwaysNull {
    calls: std::sync::atomic::AtomicUsize,
}

unsafe impl NativeParser for AlwaysNull {
    fn name(&self) -> &str {
        "always-null"
    }

    fn invoke(&self, _command: &CStr) -> RawResultHandle {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        RawResultHandle::null()
    }

    unsafe fn release(&self, _handle: RawResultHandle) {
        panic!("null handles must never be released");
    }
}

#[test]
fn custom_parser_null_result_never_released() {
    let parser = AlwaysNull {
        calls: Default::default(),
    };
    let boundary = Boundary::new(&parser);
    let buf = CommandBuf::from_wire(SET_WIRE).expect("buf");
    let err = boundary.parse(&buf).expect_err("null");
    assert_eq!(err.kind(), ErrorKind::NullHandle);
    assert_eq!(parser.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}
