//! Generation-checked slot storage
//!
//! Frames are dropped whenever the substrate unwinds, so anything that has to
//! outlive an unwind (jump buffers, try/catch contexts) is stored here and
//! referenced from frames by a [`Handle`]. Handles are plain data: they can be
//! copied into frame records and restored after a rewind.
//!
//! A slot's generation is bumped every time it is freed, so a handle that
//! outlived its value is detected instead of aliasing a newer value.

use crate::error::JmpError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/* ===================== Handle ===================== */

/// Typed reference to a value stored in an [`Arena`]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Handle<T> {
    index: u32,
    generation: u32,
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}.{})", self.index, self.generation)
    }
}

impl<T> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/* ===================== Arena ===================== */

struct Slot<T> {
    generation: u32,
    /// `None` while vacant
    value: Option<T>,
}

/// Slot storage addressed by generation-checked handles
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Store `value`, reusing a freed slot when there is one
    ///
    /// Fails with [`JmpError::ArenaFull`] once every `u32` index is taken.
    pub fn insert(&mut self, value: T) -> Result<Handle<T>, JmpError> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Ok(Handle::new(index, slot.generation));
        }

        let index = slot_index(self.slots.len())?;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Ok(Handle::new(index, 0))
    }

    pub fn get(&self, handle: Handle<T>) -> Result<&T, JmpError> {
        self.slot(handle)?
            .value
            .as_ref()
            .ok_or_else(|| JmpError::StaleHandle(handle.to_string()))
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Result<&mut T, JmpError> {
        self.slot_mut(handle)?
            .value
            .as_mut()
            .ok_or_else(|| JmpError::StaleHandle(handle.to_string()))
    }

    /// Free the slot and return its value
    pub fn remove(&mut self, handle: Handle<T>) -> Result<T, JmpError> {
        let slot = self.slot_mut(handle)?;
        let value = slot
            .value
            .take()
            .ok_or_else(|| JmpError::StaleHandle(handle.to_string()))?;

        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Ok(value)
    }

    fn slot(&self, handle: Handle<T>) -> Result<&Slot<T>, JmpError> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or_else(|| JmpError::StaleHandle(handle.to_string()))
    }

    fn slot_mut(&mut self, handle: Handle<T>) -> Result<&mut Slot<T>, JmpError> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or_else(|| JmpError::StaleHandle(handle.to_string()))
    }
}

/// Handle index of the slot pushed at position `len`
fn slot_index(len: usize) -> Result<u32, JmpError> {
    u32::try_from(len).map_err(|_| JmpError::ArenaFull)
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
