//! Software substrate
//!
//! Drives the same state machine as a compiler-inserted unwind/rewind pass.
//! The frames themselves are recorded and restored by the runtime's
//! [`suspend`](crate::Runtime::suspend) and [`resume`](crate::Runtime::resume)
//! helpers, which consult [`Substrate::state`] and [`Substrate::buffer`].

use super::{BufferRef, Substrate, UnwindState};
use crate::error::JmpError;

#[derive(Debug)]
pub struct SoftSubstrate {
    state: UnwindState,
    buffer: Option<BufferRef>,
}

impl SoftSubstrate {
    pub fn new() -> Self {
        Self {
            state: UnwindState::Normal,
            buffer: None,
        }
    }

    fn expect(&self, op: &'static str, state: UnwindState) -> Result<(), JmpError> {
        if self.state != state {
            return Err(JmpError::SubstrateState {
                op,
                state: self.state,
            });
        }
        Ok(())
    }
}

impl Default for SoftSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

impl Substrate for SoftSubstrate {
    fn start_unwind(&mut self, buf: BufferRef) -> Result<(), JmpError> {
        self.expect("start unwind", UnwindState::Normal)?;
        self.state = UnwindState::Unwinding;
        self.buffer = Some(buf);
        Ok(())
    }

    fn stop_unwind(&mut self) -> Result<(), JmpError> {
        self.expect("stop unwind", UnwindState::Unwinding)?;
        self.state = UnwindState::Normal;
        self.buffer = None;
        Ok(())
    }

    fn start_rewind(&mut self, buf: BufferRef) -> Result<(), JmpError> {
        self.expect("start rewind", UnwindState::Normal)?;
        self.state = UnwindState::Rewinding;
        self.buffer = Some(buf);
        Ok(())
    }

    fn stop_rewind(&mut self) -> Result<(), JmpError> {
        self.expect("stop rewind", UnwindState::Rewinding)?;
        self.state = UnwindState::Normal;
        self.buffer = None;
        Ok(())
    }

    fn state(&self) -> UnwindState {
        self.state
    }

    fn buffer(&self) -> Option<BufferRef> {
        self.buffer
    }
}
