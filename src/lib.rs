//! # asyncjmp-core
//!
//! setjmp/longjmp and a try/catch construct for execution substrates whose
//! only way to leave or re-enter a call stack is "unwind everything to the
//! root, then rewind back down re-executing frames".
//!
//! ## Core Principles
//!
//! 1. **Capture is a round trip**: `setjmp` unwinds to the root and is
//!    immediately rewound back to itself, leaving the frames recorded in the
//!    jump buffer.
//! 2. **Jump is a replay**: `longjmp` unwinds to the root, then the root
//!    rewinds the frames recorded by the capture.
//! 3. **One transfer in flight**: the runtime context owns the single active
//!    buffer slot and the pending-transfer indicator.
//! 4. **Instrumented frames**: functions that may be unwound record their
//!    locals with [`Runtime::suspend`] and restore them with
//!    [`Runtime::resume`].

pub mod arena;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod jmp_buf;
pub mod programs;
pub mod runtime;
pub mod setjmp;
pub mod stack_buffer;
pub mod substrate;
pub mod try_catch;

#[cfg(test)]
mod tests;

// Re-export main types
pub use config::{Config, FatalPolicy};
pub use driver::{start, EntryFn};
pub use error::JmpError;
pub use jmp_buf::{JmpBufId, JmpBufState};
pub use runtime::{Runtime, RuntimeStats};
pub use setjmp::{capture, jump, setjmp, CAPTURE_UNWINDING};
pub use substrate::{BufferRef, SoftSubstrate, Substrate, UnwindState};
pub use try_catch::{run_protected, Phase, ProtectedFn, TryCatch, TryCatchId};
