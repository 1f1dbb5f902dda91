//! Tests for the root driver loop and the substrate seam

use super::helpers::{argv, record, take_events, test_runtime};
use crate::config::{Config, FatalPolicy};
use crate::driver::start;
use crate::error::JmpError;
use crate::jmp_buf::JmpBufId;
use crate::runtime::Runtime;
use crate::setjmp::setjmp;
use crate::substrate::{BufferRef, SoftSubstrate, Substrate, UnwindState};
use serde::{Deserialize, Serialize};

fn plain(_rt: &mut Runtime, args: &[String]) -> i32 {
    record(format!("plain {}", args.join(" ")));
    args.len() as i32
}

#[test]
fn test_entry_without_jumps_runs_once() {
    take_events();
    let mut rt = test_runtime();

    let code = start(&mut rt, plain, &argv(&["a", "b"]));

    assert_eq!(code, 3);
    assert_eq!(take_events(), vec!["plain guest a b"]);
    assert_eq!(rt.stats().root_passes, 1);
    assert_eq!(rt.stats().unwinds, 0);
    assert_eq!(rt.state(), UnwindState::Normal);
}

#[test]
fn test_runtime_is_reusable_across_starts() {
    let mut rt = test_runtime();

    assert_eq!(start(&mut rt, crate::programs::countdown, &argv(&["2"])), 2);
    assert_eq!(start(&mut rt, crate::programs::countdown, &argv(&["1"])), 1);

    // 2 + 2 passes for the first run, 1 + 2 for the second
    assert_eq!(rt.stats().root_passes, 7);
    assert_eq!(rt.active(), None);
    assert!(!rt.transfer_pending());
}

/* ===================== Recording substrate ===================== */

/// Logs every substrate call, then forwards to the software substrate
struct RecordingSubstrate {
    inner: SoftSubstrate,
}

fn storage_name(buf: BufferRef) -> &'static str {
    match buf {
        BufferRef::Capture(_) => "capture",
        BufferRef::Longjmp(_) => "longjmp",
    }
}

impl Substrate for RecordingSubstrate {
    fn start_unwind(&mut self, buf: BufferRef) -> Result<(), JmpError> {
        record(format!("start_unwind {}", storage_name(buf)));
        self.inner.start_unwind(buf)
    }

    fn stop_unwind(&mut self) -> Result<(), JmpError> {
        record("stop_unwind");
        self.inner.stop_unwind()
    }

    fn start_rewind(&mut self, buf: BufferRef) -> Result<(), JmpError> {
        record(format!("start_rewind {}", storage_name(buf)));
        self.inner.start_rewind(buf)
    }

    fn stop_rewind(&mut self) -> Result<(), JmpError> {
        record("stop_rewind");
        self.inner.stop_rewind()
    }

    fn state(&self) -> UnwindState {
        self.inner.state()
    }

    fn buffer(&self) -> Option<BufferRef> {
        self.inner.buffer()
    }
}

fn recording_runtime() -> Runtime {
    let config = Config::builder()
        .without_env()
        .on_fatal(FatalPolicy::Panic)
        .build()
        .unwrap();
    Runtime::with_substrate(
        config,
        Box::new(RecordingSubstrate {
            inner: SoftSubstrate::new(),
        }),
    )
}

#[derive(Serialize, Deserialize)]
struct Frame {
    buf: JmpBufId,
}

fn capture_only(rt: &mut Runtime, _args: &[String]) -> i32 {
    let f = rt
        .resume::<Frame>()
        .unwrap_or_else(|| Frame { buf: rt.jmp_buf_new() });
    let value = setjmp(rt, f.buf);
    if rt.suspend(&f) {
        return 0;
    }
    rt.jmp_buf_release(f.buf);
    value
}

#[test]
fn test_capture_is_one_unwind_rewind_round_trip() {
    take_events();
    let mut rt = recording_runtime();

    assert_eq!(start(&mut rt, capture_only, &argv(&[])), 0);
    assert_eq!(
        take_events(),
        vec![
            "start_unwind capture",
            "stop_unwind",
            "start_rewind capture",
            "stop_rewind",
        ]
    );
}

#[test]
fn test_jump_unwinds_into_longjmp_storage_and_rewinds_capture_storage() {
    take_events();
    let mut rt = recording_runtime();

    assert_eq!(start(&mut rt, crate::programs::countdown, &argv(&["1"])), 1);
    assert_eq!(
        take_events(),
        vec![
            "start_unwind capture",
            "stop_unwind",
            "start_rewind capture",
            "stop_rewind",
            "start_unwind longjmp",
            "stop_unwind",
            "start_rewind capture",
            "stop_rewind",
        ]
    );
}

#[test]
fn test_try_catch_intercept_stops_the_unwind_without_a_rewind() {
    take_events();
    let mut rt = recording_runtime();

    assert_eq!(start(&mut rt, crate::programs::exceptions, &argv(&["1"])), 1);
    assert_eq!(take_events(), vec!["start_unwind longjmp", "stop_unwind"]);
    assert_eq!(rt.stats().root_passes, 1);
}
