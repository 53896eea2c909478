//! Buffer descriptor ring
//!
//! A fixed array of slots walked by three cursors:
//!
//! - `free`: the next slot that accepts a submission
//! - `fill`: the slot the hardware is working on
//! - `active`: the oldest retired slot that the application hasn't read
//!
//! All cursors only move forward, modulo the ring size. A slot is free
//! when it holds no buffer.

use core::ptr::NonNull;

use crate::Events;

/// An application buffer owned by the driver
#[derive(Debug)]
pub(crate) struct Buffer {
    ptr: NonNull<u8>,
    len: usize,
}

// Safety: a buffer is an exclusive, 'static borrow. Moving it
// between execution contexts can't create aliasing.
unsafe impl Send for Buffer {}

impl Buffer {
    pub(crate) fn new(buffer: &'static mut [u8]) -> Self {
        let len = buffer.len();
        Buffer {
            // Safety: slice pointers are never null.
            ptr: unsafe { NonNull::new_unchecked(buffer.as_mut_ptr()) },
            len,
        }
    }

    pub(crate) fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Read `width` bytes at `offset`, little endian
    pub(crate) fn read_word(&self, offset: usize, width: usize) -> u32 {
        // Safety: the driver holds the only reference to the buffer.
        let bytes = unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) };
        bytes[offset..offset + width]
            .iter()
            .rev()
            .fold(0, |word, byte| (word << 8) | u32::from(*byte))
    }

    /// Write the low `width` bytes of `word` at `offset`, little endian
    pub(crate) fn write_word(&mut self, offset: usize, width: usize, word: u32) {
        // Safety: the driver holds the only reference to the buffer.
        let bytes = unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) };
        for (idx, byte) in bytes[offset..offset + width].iter_mut().enumerate() {
            *byte = (word >> (8 * idx)) as u8;
        }
    }

    /// Hand the buffer back to the application
    pub(crate) fn into_slice(self) -> &'static mut [u8] {
        // Safety: reconstructs the slice that produced this buffer. The
        // driver gives up its reference.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// One transfer request
pub(crate) struct Slot {
    /// `None` once the buffer has been handed back
    pub buffer: Option<Buffer>,
    /// Size the application asked for, in bytes
    pub requested_bytes: usize,
    /// Serial words to move; set when the slot is armed
    pub units: usize,
    /// Serial words moved so far
    pub index: usize,
    /// Submitted and not yet retired
    pub in_use: bool,
    /// Moved by DMA instead of the interrupt handler
    pub dma: bool,
    /// Errors that hit this buffer
    pub events: Events,
}

const EMPTY: Slot = Slot {
    buffer: None,
    requested_bytes: 0,
    units: 0,
    index: 0,
    in_use: false,
    dma: false,
    events: Events::NONE,
};

impl Slot {
    /// Holds a buffer that's waiting for the hardware
    pub(crate) fn is_pending(&self) -> bool {
        self.buffer.is_some() && self.in_use
    }
}

pub(crate) struct Ring<const N: usize> {
    slots: [Slot; N],
    free: usize,
    fill: usize,
    active: usize,
}

impl<const N: usize> Ring<N> {
    pub(crate) const fn new() -> Self {
        Ring {
            slots: [EMPTY; N],
            free: 0,
            fill: 0,
            active: 0,
        }
    }

    /// Empty every slot and rewind the cursors
    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    const fn next(idx: usize) -> usize {
        (idx + 1) % N
    }

    /// Place a buffer in the free slot
    ///
    /// Returns the slot index. If the free slot still holds a buffer,
    /// nothing changes and `buffer` comes back.
    pub(crate) fn enqueue(&mut self, buffer: Buffer, dma: bool) -> Result<usize, Buffer> {
        let idx = self.free;
        let slot = &mut self.slots[idx];
        if slot.buffer.is_some() {
            return Err(buffer);
        }
        *slot = Slot {
            requested_bytes: buffer.len(),
            buffer: Some(buffer),
            units: 0,
            index: 0,
            in_use: true,
            dma,
            events: Events::NONE,
        };
        self.free = Self::next(idx);
        Ok(idx)
    }

    /// Undo the last [`enqueue`](Self::enqueue), if its slot wasn't touched
    pub(crate) fn cancel_last(&mut self) -> Option<Buffer> {
        let idx = (self.free + N - 1) % N;
        let slot = &mut self.slots[idx];
        if !slot.is_pending() || slot.index != 0 {
            return None;
        }
        slot.in_use = false;
        self.free = idx;
        slot.buffer.take()
    }

    pub(crate) fn fill_index(&self) -> usize {
        self.fill
    }

    pub(crate) fn fill(&self) -> &Slot {
        &self.slots[self.fill]
    }

    pub(crate) fn fill_mut(&mut self) -> &mut Slot {
        &mut self.slots[self.fill]
    }

    /// Retire the fill slot and advance to the next one
    ///
    /// With `release`, the buffer leaves the ring now, and it's returned.
    /// Otherwise it stays in the slot until [`dequeue`](Self::dequeue).
    pub(crate) fn retire(&mut self, release: bool) -> Option<Buffer> {
        let idx = self.fill;
        let slot = &mut self.slots[idx];
        slot.in_use = false;
        let buffer = if release { slot.buffer.take() } else { None };
        if release && self.active == idx {
            self.active = Self::next(idx);
        }
        self.fill = Self::next(idx);
        buffer
    }

    /// Take the buffer, and its errors, from the active slot and advance
    ///
    /// Returns `None`, without moving, if the active slot is empty or
    /// still in flight.
    pub(crate) fn dequeue(&mut self) -> Option<(Buffer, Events)> {
        if !self.peek() {
            return None;
        }
        let idx = self.active;
        let slot = &mut self.slots[idx];
        let events = slot.events.take();
        let buffer = slot.buffer.take()?;
        self.active = Self::next(idx);
        Some((buffer, events))
    }

    /// Returns `true` if the active slot holds a retired buffer
    pub(crate) fn peek(&self) -> bool {
        let slot = &self.slots[self.active];
        slot.buffer.is_some() && !slot.in_use
    }

    /// Returns `true` if the active slot holds any buffer
    pub(crate) fn has_active(&self) -> bool {
        self.slots[self.active].buffer.is_some()
    }

    #[cfg(test)]
    pub(crate) fn cursors(&self) -> (usize, usize, usize) {
        (self.free, self.fill, self.active)
    }

    #[cfg(test)]
    pub(crate) fn slot_mut(&mut self, idx: usize) -> &mut Slot {
        &mut self.slots[idx]
    }
}
