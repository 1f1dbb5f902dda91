//! Setjmp capture / longjmp resume protocol
//!
//! Capturing costs a full round trip: `capture` requests an unwind to the
//! root, the root driver immediately rewinds the recorded frames, and the
//! same `capture` call is entered again to finish the job. A jump unwinds to
//! the root the same way, then the root rewinds the frames the capture
//! recorded, landing in that first `capture` call once more.
//!
//! Both `capture` and `jump` are leaves: they never record a frame of their
//! own, so the rewind re-enters them from the top.

use crate::error::JmpError;
use crate::jmp_buf::{JmpBufId, JmpBufState};
use crate::runtime::Runtime;
use crate::stack_buffer::StackBuffer;
use crate::substrate::BufferRef;

/// Returned by a `capture` that just started its unwind; always discarded
pub const CAPTURE_UNWINDING: i32 = -1;

/// setjmp: reset `buf` and capture the current execution point
///
/// Returns 0 once the capture completes, and the jump payload each time a
/// jump lands here. While the substrate is rewinding the reset is skipped,
/// because the call is being resumed rather than issued anew.
pub fn setjmp(rt: &mut Runtime, buf: JmpBufId) -> i32 {
    if !rt.is_rewinding() {
        let result = rt.buf_mut(buf).map(|b| b.state = JmpBufState::Initialized);
        rt.check(result);
    }
    capture(rt, buf)
}

/// Drive `buf`'s state machine at a capture call site
pub fn capture(rt: &mut Runtime, buf: JmpBufId) -> i32 {
    let result = try_capture(rt, buf);
    rt.check(result)
}

fn try_capture(rt: &mut Runtime, id: JmpBufId) -> Result<i32, JmpError> {
    let state = rt.buf_mut(id)?.state;
    match state {
        JmpBufState::Initialized => {
            tracing::trace!(buf = %id, "capture: Initialized, unwinding to root");
            if let Some(active) = rt.active {
                return Err(JmpError::ActiveSlotBusy {
                    active,
                    requested: id,
                });
            }

            let buf = rt.buf_mut(id)?;
            buf.state = JmpBufState::Capturing;
            buf.payload = 0;
            buf.longjmp_storage = None;
            buf.saved_top = None;
            buf.capture_storage.reset();

            rt.active = Some(id);
            rt.start_unwind(BufferRef::Capture(id))?;
            Ok(CAPTURE_UNWINDING)
        }

        JmpBufState::Capturing => {
            rt.stop_rewind()?;
            tracing::trace!(buf = %id, "capture: Capturing, capture complete");
            finish_transfer(rt, id)?;

            rt.buf_mut(id)?.state = JmpBufState::Captured;
            rt.stats.captures += 1;
            Ok(0)
        }

        JmpBufState::Returning => {
            rt.stop_rewind()?;
            tracing::trace!(buf = %id, "capture: Returning, delivering payload");
            finish_transfer(rt, id)?;

            let buf = rt.buf_mut(id)?;
            buf.state = JmpBufState::Captured;
            buf.longjmp_storage = None;
            let payload = buf.payload;
            rt.stats.deliveries += 1;
            Ok(payload)
        }

        JmpBufState::Captured => Err(JmpError::UnexpectedState {
            op: "capture",
            buf: id,
            state,
        }),
    }
}

fn finish_transfer(rt: &mut Runtime, id: JmpBufId) -> Result<(), JmpError> {
    if rt.active != Some(id) {
        return Err(JmpError::NotActive {
            buf: id,
            active: rt.active,
        });
    }
    rt.active = None;
    Ok(())
}

/// longjmp: transfer control back to `buf`'s capture call site
///
/// `value` must be nonzero and `buf` must be `Captured`. This function does
/// return, with an unwind in flight; the caller must observe it through
/// [`Runtime::suspend`] and return. Nothing after the call may run.
pub fn jump(rt: &mut Runtime, buf: JmpBufId, value: i32) {
    let result = try_jump(rt, buf, value);
    rt.check(result)
}

fn try_jump(rt: &mut Runtime, id: JmpBufId, value: i32) -> Result<(), JmpError> {
    tracing::trace!(buf = %id, value, "jump");
    let capacity = rt.config.stack_buffer_size;

    let buf = rt.buf_mut(id)?;
    if buf.state != JmpBufState::Captured {
        return Err(JmpError::UnexpectedState {
            op: "jump",
            buf: id,
            state: buf.state,
        });
    }
    if value == 0 {
        return Err(JmpError::ZeroPayload(id));
    }
    if let Some(active) = rt.active {
        return Err(JmpError::ActiveSlotBusy {
            active,
            requested: id,
        });
    }

    let buf = rt.buf_mut(id)?;
    buf.state = JmpBufState::Returning;
    buf.payload = value;
    buf.longjmp_storage = Some(StackBuffer::new(capacity));

    rt.active = Some(id);
    rt.stats.jumps += 1;
    rt.start_unwind(BufferRef::Longjmp(id))
}
