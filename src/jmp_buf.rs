//! Jump buffer: one settable resumption point

use crate::arena::Handle;
use crate::stack_buffer::StackBuffer;
use std::fmt;

/// Handle to a jump buffer owned by a [`Runtime`](crate::Runtime)
pub type JmpBufId = Handle<JumpBuf>;

/// Jump buffer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JmpBufState {
    /// Fresh, or reset by `setjmp` before a new capture
    Initialized = 0,
    /// Unwinding to the root, or rewinding to the capture call
    Capturing = 1,
    /// Ready to be jumped to
    Captured = 2,
    /// Unwinding to the root, or rewinding to the capture call, on behalf of a jump
    Returning = 3,
}

impl fmt::Display for JmpBufState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JmpBufState::Initialized => "Initialized",
            JmpBufState::Capturing => "Capturing",
            JmpBufState::Captured => "Captured",
            JmpBufState::Returning => "Returning",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct JumpBuf {
    /// Frames recorded by the capture; rewound by every jump to this buffer
    pub(crate) capture_storage: StackBuffer,
    /// Frames recorded while a jump unwinds; never rewound
    pub(crate) longjmp_storage: Option<StackBuffer>,
    /// `capture_storage.top` as the capture unwind left it
    pub(crate) saved_top: Option<usize>,
    pub(crate) payload: i32,
    pub(crate) state: JmpBufState,
}

impl JumpBuf {
    pub fn new(capacity: usize) -> Self {
        Self {
            capture_storage: StackBuffer::new(capacity),
            longjmp_storage: None,
            saved_top: None,
            payload: 0,
            state: JmpBufState::Initialized,
        }
    }

    pub fn state(&self) -> JmpBufState {
        self.state
    }

    pub fn payload(&self) -> i32 {
        self.payload
    }

    pub fn saved_top(&self) -> Option<usize> {
        self.saved_top
    }

    pub fn capture_storage(&self) -> &StackBuffer {
        &self.capture_storage
    }

    pub fn longjmp_storage(&self) -> Option<&StackBuffer> {
        self.longjmp_storage.as_ref()
    }
}
