//! Fixed-capacity frame record storage
//!
//! The substrate's unwind writes one record per instrumented frame, innermost
//! first; the rewind reads them back last-in first-out, outermost first.
//! Reading only moves `top` down and never erases bytes, so a record set can
//! be replayed again by putting `top` back where the unwind left it.
//!
//! Record layout: `[record bytes][u32 little-endian length]`.

use crate::error::JmpError;

/// Default capacity in bytes
pub const DEFAULT_STACK_BUFFER_SIZE: usize = 32768;

const LEN_BYTES: usize = std::mem::size_of::<u32>();

#[derive(Debug, Clone)]
pub struct StackBuffer {
    top: usize,
    end: usize,
    data: Box<[u8]>,
}

impl StackBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            top: 0,
            end: capacity,
            data: vec![0; capacity].into_boxed_slice(),
        }
    }

    /// Reset both cursors to an empty buffer
    pub fn reset(&mut self) {
        self.top = 0;
        self.end = self.data.len();
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Move `top` back to a value an earlier unwind left behind
    pub fn set_top(&mut self, top: usize) {
        self.top = top.min(self.end);
    }

    pub fn push(&mut self, record: &[u8]) -> Result<(), JmpError> {
        let needed = record.len() + LEN_BYTES;
        let available = self.end - self.top;
        if needed > available {
            return Err(JmpError::StackOverflow {
                needed,
                available,
                capacity: self.capacity(),
            });
        }

        let len = u32::try_from(record.len()).map_err(|_| JmpError::StackOverflow {
            needed,
            available,
            capacity: self.capacity(),
        })?;

        let start = self.top;
        self.data[start..start + record.len()].copy_from_slice(record);
        self.data[start + record.len()..start + needed].copy_from_slice(&len.to_le_bytes());
        self.top += needed;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<&[u8], JmpError> {
        if self.top < LEN_BYTES {
            return Err(JmpError::StackUnderflow { top: self.top });
        }

        let mut len_bytes = [0u8; LEN_BYTES];
        len_bytes.copy_from_slice(&self.data[self.top - LEN_BYTES..self.top]);
        let len = u32::from_le_bytes(len_bytes) as usize;

        let Some(start) = (self.top - LEN_BYTES).checked_sub(len) else {
            return Err(JmpError::StackUnderflow { top: self.top });
        };

        self.top = start;
        Ok(&self.data[start..start + len])
    }
}
