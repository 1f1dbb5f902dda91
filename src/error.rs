//! Contract violations
//!
//! None of these are expected at runtime: each one means the calling runtime
//! broke the setjmp/longjmp contract. Internal layers return them as
//! `Result` and the public protocol functions hand them to
//! [`Runtime::fatal`](crate::Runtime::fatal).

use crate::jmp_buf::{JmpBufId, JmpBufState};
use crate::substrate::{BufferRef, UnwindState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JmpError {
    #[error("{op} on jump buffer {buf} in state {state}")]
    UnexpectedState {
        op: &'static str,
        buf: JmpBufId,
        state: JmpBufState,
    },

    #[error("jump to buffer {0} with a zero payload")]
    ZeroPayload(JmpBufId),

    #[error("jump buffer {requested} cannot become active while {active} is mid-transfer")]
    ActiveSlotBusy {
        active: JmpBufId,
        requested: JmpBufId,
    },

    #[error("jump buffer {buf} completed a transfer but the active buffer is {active:?}")]
    NotActive {
        buf: JmpBufId,
        active: Option<JmpBufId>,
    },

    #[error("stack buffer overflow: frame needs {needed} bytes, {available} of {capacity} left")]
    StackOverflow {
        needed: usize,
        available: usize,
        capacity: usize,
    },

    #[error("stack buffer underflow: no frame record left at offset {top}")]
    StackUnderflow { top: usize },

    #[error("frame record could not be encoded or decoded: {0}")]
    FrameCodec(#[from] serde_json::Error),

    #[error("stale handle {0}: its owner already released it")]
    StaleHandle(String),

    #[error("arena is full: every u32 slot index is in use")]
    ArenaFull,

    #[error("handle {0} is in use by a running try/catch")]
    Lent(String),

    #[error("substrate cannot {op} while {state}")]
    SubstrateState {
        op: &'static str,
        state: UnwindState,
    },

    #[error("{0} has no storage allocated")]
    MissingStorage(BufferRef),

    #[error("rewind stopped with {remaining} bytes of frame records left")]
    RewindIncomplete { remaining: usize },

    #[error("entry returned while a rewind was still in progress")]
    RewindNotReached,

    #[error("jump buffer {0} was never captured, nothing to rewind to")]
    NeverCaptured(JmpBufId),

    #[error("instrumented function entered while an unwind is in flight")]
    EnteredWhileUnwinding,

    #[error("jump to buffer {0} returned to its call site")]
    JumpReturned(JmpBufId),
}
