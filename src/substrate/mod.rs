//! Unwind/rewind primitive
//!
//! The substrate is the only way to leave or re-enter a call stack: it can
//! unwind every instrumented frame down to the root while recording them into
//! a buffer, and rewind the recorded frames back down afterwards.
//!
//! The runtime never touches frame storage through the substrate; it only
//! asks which buffer the substrate is currently working on.

pub mod soft;

pub use soft::SoftSubstrate;

use crate::error::JmpError;
use crate::jmp_buf::JmpBufId;
use std::fmt;

/// Substrate state, as reported by `get_state`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnwindState {
    Normal = 0,
    Unwinding = 1,
    Rewinding = 2,
}

impl fmt::Display for UnwindState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnwindState::Normal => "normal",
            UnwindState::Unwinding => "unwinding",
            UnwindState::Rewinding => "rewinding",
        };
        f.write_str(name)
    }
}

/// The storage an unwind writes to or a rewind reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRef {
    /// A jump buffer's capture storage (the only storage ever rewound)
    Capture(JmpBufId),
    /// A jump buffer's write-once longjmp storage
    Longjmp(JmpBufId),
}

impl BufferRef {
    pub fn jmp_buf(&self) -> JmpBufId {
        match self {
            BufferRef::Capture(id) | BufferRef::Longjmp(id) => *id,
        }
    }
}

impl fmt::Display for BufferRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferRef::Capture(id) => write!(f, "capture storage of {}", id),
            BufferRef::Longjmp(id) => write!(f, "longjmp storage of {}", id),
        }
    }
}

/// Primitive operations consumed by the runtime
pub trait Substrate {
    fn start_unwind(&mut self, buf: BufferRef) -> Result<(), JmpError>;
    fn stop_unwind(&mut self) -> Result<(), JmpError>;
    fn start_rewind(&mut self, buf: BufferRef) -> Result<(), JmpError>;
    fn stop_rewind(&mut self) -> Result<(), JmpError>;
    fn state(&self) -> UnwindState;
    /// Buffer of the unwind or rewind in progress
    fn buffer(&self) -> Option<BufferRef>;
}
