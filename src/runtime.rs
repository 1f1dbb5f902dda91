//! Runtime context
//!
//! The runtime holds everything the protocol shares across an unwind:
//! - substrate: the unwind/rewind engine
//! - jump buffers and try/catch contexts (stored in arenas, addressed by handles)
//! - active: the single jump buffer currently mid-transfer
//! - unwind_buf: the pending-transfer indicator
//!
//! It is threaded through every call as `&mut Runtime`; nothing is global.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;

use crate::arena::Arena;
use crate::config::{Config, FatalPolicy};
use crate::error::JmpError;
use crate::jmp_buf::{JmpBufId, JmpBufState, JumpBuf};
use crate::stack_buffer::StackBuffer;
use crate::substrate::{BufferRef, SoftSubstrate, Substrate, UnwindState};

/* ===================== Statistics ===================== */

/// Counters kept by the runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Times the root driver called the entry function
    pub root_passes: u64,
    pub unwinds: u64,
    pub rewinds: u64,
    /// Captures completed (capture calls that returned 0)
    pub captures: u64,
    /// Jumps requested
    pub jumps: u64,
    /// Jump payloads delivered at a capture call site
    pub deliveries: u64,
    /// Jumps caught by a try/catch loop
    pub intercepts: u64,
    pub frames_saved: u64,
    pub frames_restored: u64,
    /// Largest number of bytes any single storage held
    pub peak_stack_bytes: usize,
}

/* ===================== Fatal Path ===================== */

pub(crate) fn fatal(policy: FatalPolicy, err: JmpError) -> ! {
    tracing::error!(error = %err, "asyncjmp contract violation");
    match policy {
        FatalPolicy::Abort => std::process::abort(),
        FatalPolicy::Panic => panic!("asyncjmp: {}", err),
    }
}

/* ===================== Runtime ===================== */

pub struct Runtime {
    pub(crate) config: Config,
    pub(crate) substrate: Box<dyn Substrate>,
    pub(crate) bufs: Arena<JumpBuf>,
    pub(crate) try_catches: Arena<Box<dyn Any>>,
    pub(crate) active: Option<JmpBufId>,
    pub(crate) unwind_buf: Option<BufferRef>,
    pub(crate) stats: RuntimeStats,
}

impl Runtime {
    pub fn new(config: Config) -> Self {
        Self::with_substrate(config, Box::new(SoftSubstrate::new()))
    }

    pub fn with_substrate(config: Config, substrate: Box<dyn Substrate>) -> Self {
        Self {
            config,
            substrate,
            bufs: Arena::new(),
            try_catches: Arena::new(),
            active: None,
            unwind_buf: None,
            stats: RuntimeStats::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats
    }

    pub fn state(&self) -> UnwindState {
        self.substrate.state()
    }

    pub fn is_unwinding(&self) -> bool {
        self.state() == UnwindState::Unwinding
    }

    pub fn is_rewinding(&self) -> bool {
        self.state() == UnwindState::Rewinding
    }

    /// Whether an unwind is in flight
    pub fn transfer_pending(&self) -> bool {
        self.unwind_buf.is_some()
    }

    /// The jump buffer currently mid-transfer
    pub fn active(&self) -> Option<JmpBufId> {
        self.active
    }

    /// Report a contract violation and stop according to the fatal policy
    pub fn fatal(&self, err: JmpError) -> ! {
        fatal(self.config.on_fatal, err)
    }

    /// Unwrap a result, routing errors to [`Runtime::fatal`]
    pub(crate) fn check<T>(&self, result: Result<T, JmpError>) -> T {
        match result {
            Ok(value) => value,
            Err(err) => self.fatal(err),
        }
    }

    /* ===================== Jump Buffers ===================== */

    /// Allocate a jump buffer in the `Initialized` state
    pub fn jmp_buf_new(&mut self) -> JmpBufId {
        let buf = JumpBuf::new(self.config.stack_buffer_size);
        let result = self.bufs.insert(buf);
        self.check(result)
    }

    /// Free a jump buffer; no transfer may target it afterwards
    pub fn jmp_buf_release(&mut self, id: JmpBufId) {
        if self.active == Some(id) {
            self.fatal(JmpError::UnexpectedState {
                op: "release",
                buf: id,
                state: self.jmp_buf_state(id),
            });
        }
        let result = self.bufs.remove(id).map(drop);
        self.check(result)
    }

    pub fn jmp_buf(&self, id: JmpBufId) -> &JumpBuf {
        let result = self.bufs.get(id);
        self.check(result)
    }

    pub fn jmp_buf_state(&self, id: JmpBufId) -> JmpBufState {
        self.jmp_buf(id).state
    }

    /// Payload delivered by the most recent jump to `id`
    pub fn payload(&self, id: JmpBufId) -> i32 {
        self.jmp_buf(id).payload
    }

    pub(crate) fn buf_mut(&mut self, id: JmpBufId) -> Result<&mut JumpBuf, JmpError> {
        self.bufs.get_mut(id)
    }

    fn storage_mut(&mut self, which: BufferRef) -> Result<&mut StackBuffer, JmpError> {
        let buf = self.bufs.get_mut(which.jmp_buf())?;
        match which {
            BufferRef::Capture(_) => Ok(&mut buf.capture_storage),
            BufferRef::Longjmp(_) => buf
                .longjmp_storage
                .as_mut()
                .ok_or(JmpError::MissingStorage(which)),
        }
    }

    /* ===================== Substrate Calls ===================== */

    /// Start an unwind and raise the pending-transfer indicator
    pub(crate) fn start_unwind(&mut self, buf: BufferRef) -> Result<(), JmpError> {
        self.substrate.start_unwind(buf)?;
        self.unwind_buf = Some(buf);
        self.stats.unwinds += 1;
        Ok(())
    }

    /// Stop the unwind in flight and clear the pending-transfer indicator
    pub(crate) fn stop_unwind(&mut self) -> Result<(), JmpError> {
        self.substrate.stop_unwind()?;
        self.unwind_buf = None;
        Ok(())
    }

    pub(crate) fn start_rewind(&mut self, buf: BufferRef) -> Result<(), JmpError> {
        self.substrate.start_rewind(buf)?;
        self.stats.rewinds += 1;
        Ok(())
    }

    /// Stop the rewind; every recorded frame must have been restored by now
    pub(crate) fn stop_rewind(&mut self) -> Result<(), JmpError> {
        if let Some(buf) = self.substrate.buffer() {
            let remaining = self.storage_mut(buf)?.top();
            if remaining != 0 {
                return Err(JmpError::RewindIncomplete { remaining });
            }
        }
        self.substrate.stop_rewind()
    }

    /* ===================== Frame Instrumentation ===================== */

    /// Restore the frame record of an instrumented function
    ///
    /// Call this first thing in every function that may be unwound. While the
    /// substrate is rewinding it returns the record saved by [`Runtime::suspend`];
    /// otherwise it returns `None` and the function starts fresh.
    pub fn resume<T: DeserializeOwned>(&mut self) -> Option<T> {
        match self.state() {
            UnwindState::Normal => None,
            UnwindState::Unwinding => self.fatal(JmpError::EnteredWhileUnwinding),
            UnwindState::Rewinding => {
                let result = self.pop_frame();
                Some(self.check(result))
            }
        }
    }

    /// Record `frame` if an unwind is in flight
    ///
    /// Call this after every call that may unwind. Returns `true` when the
    /// frame was recorded and the caller must return immediately.
    #[must_use = "the caller must return when suspend() reports an unwind"]
    pub fn suspend<T: Serialize>(&mut self, frame: &T) -> bool {
        if !self.is_unwinding() {
            return false;
        }
        let result = self.push_frame(frame);
        self.check(result);
        true
    }

    fn push_frame<T: Serialize>(&mut self, frame: &T) -> Result<(), JmpError> {
        let which = self
            .substrate
            .buffer()
            .ok_or(JmpError::SubstrateState {
                op: "record a frame",
                state: self.state(),
            })?;
        let record = serde_json::to_vec(frame)?;
        let storage = self.storage_mut(which)?;
        storage.push(&record)?;
        let top = storage.top();

        self.stats.frames_saved += 1;
        self.stats.peak_stack_bytes = self.stats.peak_stack_bytes.max(top);
        Ok(())
    }

    fn pop_frame<T: DeserializeOwned>(&mut self) -> Result<T, JmpError> {
        let which = self
            .substrate
            .buffer()
            .ok_or(JmpError::SubstrateState {
                op: "restore a frame",
                state: self.state(),
            })?;
        let storage = self.storage_mut(which)?;
        let frame = serde_json::from_slice(storage.pop()?)?;

        self.stats.frames_restored += 1;
        Ok(frame)
    }
}
