//! Byte-exact save/restore of engine state
//!
//! One walker serves both directions: every stateful component visits its
//! fields in a fixed order, and the walker either appends them to the
//! buffer or reads them back in that same order.

use crate::error::{Error, Result};

/// Direction-agnostic state walker
#[derive(Debug)]
pub struct SavedState {
    data: Vec<u8>,
    offset: usize,
    saving: bool,
    fault: Option<&'static str>,
}

impl SavedState {
    /// Walker that appends fields to a fresh buffer
    pub fn saver() -> Self {
        Self {
            data: Vec::new(),
            offset: 0,
            saving: true,
            fault: None,
        }
    }

    /// Walker that reads fields back from `data`
    pub fn restorer(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            offset: 0,
            saving: false,
            fault: None,
        }
    }

    /// True when saving, false when restoring
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Visit one field
    pub fn save_restore<T: Persist + ?Sized>(&mut self, value: &mut T) {
        value.persist(self);
    }

    /// Record that a restored value could not be decoded
    pub fn mark_corrupt(&mut self, reason: &'static str) {
        self.fault.get_or_insert(reason);
    }

    fn put(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        // past the end reads zeros; finish() reports the size mismatch
        let mut out = [0u8; N];
        if let Some(bytes) = self.data.get(self.offset..self.offset + N) {
            out.copy_from_slice(bytes);
        }
        self.offset += N;
        out
    }

    /// Finish a save and return the bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Finish a restore, checking that every byte was consumed
    pub fn finish(self) -> Result<()> {
        if self.offset != self.data.len() {
            return Err(Error::StateSize {
                expected: self.offset,
                actual: self.data.len(),
            });
        }
        match self.fault {
            Some(reason) => Err(Error::CorruptState(reason)),
            None => Ok(()),
        }
    }
}

/// A value that can be walked by [`SavedState`]
pub trait Persist {
    /// Save or restore `self`
    fn persist(&mut self, state: &mut SavedState);
}

macro_rules! persist_le {
    ($($ty:ty),*) => {
        $(
            impl Persist for $ty {
                fn persist(&mut self, state: &mut SavedState) {
                    if state.saving {
                        state.put(&self.to_le_bytes());
                    } else {
                        *self = <$ty>::from_le_bytes(state.take());
                    }
                }
            }
        )*
    };
}

persist_le!(u8, u16, u32, i16, i32, u64);

impl Persist for bool {
    fn persist(&mut self, state: &mut SavedState) {
        let mut raw = u8::from(*self);
        raw.persist(state);
        if raw > 1 {
            state.mark_corrupt("boolean out of range");
        }
        *self = raw != 0;
    }
}

impl<T: Persist> Persist for [T] {
    fn persist(&mut self, state: &mut SavedState) {
        for value in self.iter_mut() {
            value.persist(state);
        }
    }
}

impl<T: Persist, const N: usize> Persist for [T; N] {
    fn persist(&mut self, state: &mut SavedState) {
        self.as_mut_slice().persist(state);
    }
}
