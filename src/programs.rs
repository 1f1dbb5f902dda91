//! Bundled guest programs
//!
//! Small instrumented entry points run by the CLI. Each one follows the same
//! frame discipline a compiled guest would:
//! - restore the frame record with `rt.resume()` on entry
//! - after every call that may unwind, `if rt.suspend(&frame) { return }`
//! - keep the resume point in a `pc` field so a rewind lands on the call
//!   that was interrupted
//!
//! Arguments follow `argv` conventions: `args[0]` is the program name.

use serde::{Deserialize, Serialize};

use crate::driver::EntryFn;
use crate::error::JmpError;
use crate::jmp_buf::JmpBufId;
use crate::runtime::Runtime;
use crate::setjmp::{jump, setjmp};
use crate::try_catch::{run_protected, TryCatchId};

pub struct Program {
    pub name: &'static str,
    pub about: &'static str,
    pub entry: EntryFn,
}

pub const PROGRAMS: &[Program] = &[
    Program {
        name: "countdown",
        about: "Jump back to one setjmp point N times (default 3); exits with N",
        entry: countdown,
    },
    Program {
        name: "exceptions",
        about: "Raise from N frames deep (default 3) and re-raise from the handler; exits with the sum of caught codes",
        entry: exceptions,
    },
    Program {
        name: "nested",
        about: "Capture inside a protected body, then jump past it to the outer buffer; exits with the payload (default 5)",
        entry: nested,
    },
];

pub fn find(name: &str) -> Option<&'static Program> {
    PROGRAMS.iter().find(|p| p.name == name)
}

fn int_arg(args: &[String], index: usize, default: i32) -> i32 {
    args.get(index)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/* ===================== countdown ===================== */

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[repr(u8)]
enum CountdownPc {
    Capture = 0,
    Jump = 1,
}

#[derive(Debug, Serialize, Deserialize)]
struct CountdownFrame {
    pc: CountdownPc,
    buf: JmpBufId,
    limit: i32,
    value: i32,
}

pub fn countdown(rt: &mut Runtime, args: &[String]) -> i32 {
    let mut f = match rt.resume::<CountdownFrame>() {
        Some(f) => f,
        None => CountdownFrame {
            pc: CountdownPc::Capture,
            buf: rt.jmp_buf_new(),
            limit: int_arg(args, 1, 3),
            value: 0,
        },
    };

    loop {
        match f.pc {
            CountdownPc::Capture => {
                let value = setjmp(rt, f.buf);
                if rt.suspend(&f) {
                    return 0;
                }
                tracing::info!(value, "countdown: landed");

                if value >= f.limit {
                    rt.jmp_buf_release(f.buf);
                    return value;
                }
                f.value = value;
                f.pc = CountdownPc::Jump;
            }
            CountdownPc::Jump => {
                jump(rt, f.buf, f.value + 1);
                if rt.suspend(&f) {
                    return 0;
                }
                rt.fatal(JmpError::JumpReturned(f.buf));
            }
        }
    }
}

/* ===================== exceptions ===================== */

struct Rescue {
    target: JmpBufId,
    depth: i32,
    caught: Vec<i32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[repr(u8)]
enum ExceptionsPc {
    Protect = 0,
    Done = 1,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExceptionsFrame {
    pc: ExceptionsPc,
    target: JmpBufId,
    try_catch: TryCatchId<Rescue>,
}

pub fn exceptions(rt: &mut Runtime, args: &[String]) -> i32 {
    let mut f = match rt.resume::<ExceptionsFrame>() {
        Some(f) => f,
        None => {
            let target = rt.jmp_buf_new();
            let rescue = Rescue {
                target,
                depth: int_arg(args, 1, 3).max(1),
                caught: Vec::new(),
            };
            ExceptionsFrame {
                pc: ExceptionsPc::Protect,
                target,
                try_catch: rt.try_catch_new(raise_from_depth, Some(catch_and_reraise), rescue),
            }
        }
    };

    loop {
        match f.pc {
            ExceptionsPc::Protect => {
                run_protected(rt, f.try_catch, f.target);
                if rt.suspend(&f) {
                    return 0;
                }
                f.pc = ExceptionsPc::Done;
            }
            ExceptionsPc::Done => {
                let rescue = rt.try_catch_release(f.try_catch);
                rt.jmp_buf_release(f.target);
                tracing::info!(caught = ?rescue.caught, "exceptions: done");
                return rescue.caught.iter().sum();
            }
        }
    }
}

fn raise_from_depth(rt: &mut Runtime, rescue: &mut Rescue) {
    raise(rt, rescue.target, rescue.depth, rescue.depth);
}

fn catch_and_reraise(rt: &mut Runtime, rescue: &mut Rescue) {
    let code = rt.payload(rescue.target);
    rescue.caught.push(code);
    tracing::info!(code, "exceptions: caught");

    if code > 1 {
        raise(rt, rescue.target, 0, code - 1);
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RaiseFrame {
    target: JmpBufId,
    level: i32,
    code: i32,
}

/// Recurse `level` frames deep, then jump to `target` with `code`
fn raise(rt: &mut Runtime, target: JmpBufId, level: i32, code: i32) {
    let f = rt
        .resume::<RaiseFrame>()
        .unwrap_or(RaiseFrame { target, level, code });

    if f.level <= 0 {
        jump(rt, f.target, f.code);
        if rt.suspend(&f) {
            return;
        }
        rt.fatal(JmpError::JumpReturned(f.target));
    }

    raise(rt, f.target, f.level - 1, f.code);
    if rt.suspend(&f) {
        return;
    }
}

/* ===================== nested ===================== */

struct Nested {
    outer: JmpBufId,
    inner: JmpBufId,
    payload: i32,
    inner_captures: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[repr(u8)]
enum NestedPc {
    Capture = 0,
    Protect = 1,
}

#[derive(Debug, Serialize, Deserialize)]
struct NestedFrame {
    pc: NestedPc,
    outer: JmpBufId,
    inner: JmpBufId,
    try_catch: TryCatchId<Nested>,
}

pub fn nested(rt: &mut Runtime, args: &[String]) -> i32 {
    let mut f = match rt.resume::<NestedFrame>() {
        Some(f) => f,
        None => {
            let outer = rt.jmp_buf_new();
            let inner = rt.jmp_buf_new();
            let payload = match int_arg(args, 1, 5) {
                0 => 5,
                n => n,
            };
            let context = Nested {
                outer,
                inner,
                payload,
                inner_captures: 0,
            };
            NestedFrame {
                pc: NestedPc::Capture,
                outer,
                inner,
                try_catch: rt.try_catch_new(capture_then_escape, None, context),
            }
        }
    };

    loop {
        match f.pc {
            NestedPc::Capture => {
                let value = setjmp(rt, f.outer);
                if rt.suspend(&f) {
                    return 0;
                }
                if value != 0 {
                    let context = rt.try_catch_release(f.try_catch);
                    tracing::info!(value, inner_captures = context.inner_captures, "nested: landed on outer buffer");
                    rt.jmp_buf_release(f.inner);
                    rt.jmp_buf_release(f.outer);
                    return value;
                }
                f.pc = NestedPc::Protect;
            }
            NestedPc::Protect => {
                run_protected(rt, f.try_catch, f.outer);
                if rt.suspend(&f) {
                    return 0;
                }
                // the body always escapes through the outer buffer
                rt.fatal(JmpError::JumpReturned(f.outer));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[repr(u8)]
enum EscapePc {
    Capture = 0,
    Jump = 1,
}

#[derive(Debug, Serialize, Deserialize)]
struct EscapeFrame {
    pc: EscapePc,
    inner: JmpBufId,
    outer: JmpBufId,
    payload: i32,
}

fn capture_then_escape(rt: &mut Runtime, nested: &mut Nested) {
    let mut f = rt.resume::<EscapeFrame>().unwrap_or(EscapeFrame {
        pc: EscapePc::Capture,
        inner: nested.inner,
        outer: nested.outer,
        payload: nested.payload,
    });

    loop {
        match f.pc {
            EscapePc::Capture => {
                setjmp(rt, f.inner);
                if rt.suspend(&f) {
                    return;
                }
                nested.inner_captures += 1;
                f.pc = EscapePc::Jump;
            }
            EscapePc::Jump => {
                jump(rt, f.outer, f.payload);
                if rt.suspend(&f) {
                    return;
                }
                rt.fatal(JmpError::JumpReturned(f.outer));
            }
        }
    }
}
