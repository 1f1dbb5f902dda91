//! Root driver loop
//!
//! Wraps the program entry point. Every unwind ends here: the loop stops it,
//! picks the buffer to rewind from the active jump buffer's state, and calls
//! the entry again with the rewind in progress so that execution resumes at
//! the capture call site instead of starting over.

use crate::error::JmpError;
use crate::jmp_buf::JmpBufState;
use crate::runtime::Runtime;
use crate::substrate::BufferRef;

/// Program entry point: `main(argc, argv)`, with the runtime threaded through
pub type EntryFn = fn(&mut Runtime, &[String]) -> i32;

/// Run `entry` to completion, servicing every capture and jump it performs
///
/// Returns the entry's own result. An entry that never captures or jumps is
/// called exactly once.
pub fn start(rt: &mut Runtime, entry: EntryFn, args: &[String]) -> i32 {
    let result = run_until_done(rt, entry, args);
    rt.check(result)
}

fn run_until_done(rt: &mut Runtime, entry: EntryFn, args: &[String]) -> Result<i32, JmpError> {
    loop {
        rt.stats.root_passes += 1;
        let result = entry(rt, args);

        if rt.is_rewinding() {
            return Err(JmpError::RewindNotReached);
        }

        // No unwound buffer means the entry returned normally
        if !rt.transfer_pending() {
            return Ok(result);
        }

        rt.stop_unwind()?;

        match handle_jmp_unwind(rt)? {
            Some(buf) => {
                tracing::debug!(buffer = %buf, "root: rewinding");
                rt.start_rewind(buf)?;
            }
            None => {
                tracing::warn!("unwind reached the root without an active jump buffer");
                return Ok(result);
            }
        }
    }
}

/// Buffer to rewind after a capture or jump reached the root
fn handle_jmp_unwind(rt: &mut Runtime) -> Result<Option<BufferRef>, JmpError> {
    let Some(id) = rt.active else {
        return Ok(None);
    };

    let buf = rt.buf_mut(id)?;
    match buf.state {
        JmpBufState::Capturing => {
            // the first rewind moves top back to the start
            buf.saved_top = Some(buf.capture_storage.top());
        }
        JmpBufState::Returning => {
            let Some(top) = buf.saved_top else {
                return Err(JmpError::NeverCaptured(id));
            };
            buf.capture_storage.set_top(top);
        }
        state => {
            return Err(JmpError::UnexpectedState {
                op: "rewind from root",
                buf: id,
                state,
            });
        }
    }

    Ok(Some(BufferRef::Capture(id)))
}
