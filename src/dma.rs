//! µDMA controller support
//!
//! The SPORT driver only needs a slice of the DMA controller: program one
//! basic-mode primary descriptor for a channel, switch the channel on and
//! off, and learn about channel errors.

use crate::{
    config::Direction,
    ral::{self, descriptor, dma, Static},
    Event,
};

/// A DMA fault reported for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaFault {
    /// The channel hit a bus error
    BusError,
    /// The channel fetched an invalid descriptor
    InvalidDescriptor,
}

impl DmaFault {
    pub(crate) const fn event(self) -> Event {
        match self {
            DmaFault::BusError => Event::DmaBusError,
            DmaFault::InvalidDescriptor => Event::DmaInvalidDescriptor,
        }
    }
}

/// A computed descriptor for one buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DmaPlan {
    /// Number of DMA transfers
    pub transfers: usize,
    /// Number of serial words the SPORT moves
    pub words: usize,
    /// Last source address
    pub source_end: u32,
    /// Last destination address
    pub destination_end: u32,
    /// Bytes per DMA transfer
    pub width: usize,
    /// Memory address increment per transfer
    pub increment: usize,
}

impl DmaPlan {
    /// Plan a transfer between the SPORT data register at `fifo` and a
    /// buffer of `len` bytes at `addr`
    ///
    /// Returns `None` if the buffer doesn't describe a whole number of
    /// transfers.
    pub(crate) fn new(
        direction: Direction,
        fifo: u32,
        addr: usize,
        len: usize,
        width: usize,
        increment: usize,
        bytes_per_word: usize,
    ) -> Option<Self> {
        if len == 0 || len % width != 0 {
            return None;
        }
        let mut transfers = len / width;
        let words = len / bytes_per_word;
        let last = addr.wrapping_add(increment * (transfers - 1)) as u32;
        let (source_end, destination_end) = match direction {
            Direction::Rx => (fifo, last),
            Direction::Tx => {
                let mut source_end = last;
                if transfers < words {
                    // Packed words trail the last transfer; prime one more.
                    source_end = source_end.wrapping_add(width as u32);
                    transfers += 1;
                }
                (source_end, fifo)
            }
        };
        Some(DmaPlan {
            transfers,
            words,
            source_end,
            destination_end,
            width,
            increment,
        })
    }
}

const fn size_code(bytes: usize) -> u32 {
    match bytes {
        1 => 0,
        2 => 1,
        _ => 2,
    }
}

/// The µDMA controller
pub struct DmaController {
    registers: Static<dma::RegisterBlock>,
    descriptors: Static<descriptor::RegisterBlock>,
}

impl DmaController {
    /// Create a DMA controller handle
    ///
    /// # Safety
    ///
    /// `registers` must point at the µDMA register block. `descriptors` must
    /// point at the primary descriptor table, aligned as the controller
    /// requires, with one entry for every channel this driver uses.
    pub const unsafe fn new(registers: *const (), descriptors: *const ()) -> Self {
        DmaController {
            registers: Static(registers.cast()),
            descriptors: Static(descriptors.cast()),
        }
    }

    /// Enable the controller and publish the descriptor table
    ///
    /// Calling `init` again has no further effect.
    pub fn init(&self) {
        if ral::read_reg!(crate::ral::dma, self.registers, CFG, MEN == 1) {
            return;
        }
        ral::write_reg!(
            crate::ral::dma,
            self.registers,
            PDBPTR,
            self.descriptors.0 as usize as u32
        );
        ral::write_reg!(crate::ral::dma, self.registers, CFG, MEN: 1);
    }

    fn descriptor(&self, channel: usize) -> &descriptor::RegisterBlock {
        // Safety: the table covers every channel the driver uses. See new().
        unsafe { &*self.descriptors.0.add(channel) }
    }

    /// Program the primary descriptor for `channel`
    pub(crate) fn configure(&self, channel: usize, direction: Direction, plan: &DmaPlan) {
        let desc = self.descriptor(channel);
        let increment = size_code(plan.increment);
        let (src_inc, dst_inc) = match direction {
            Direction::Rx => (descriptor::CTL::INC_NONE, increment),
            Direction::Tx => (increment, descriptor::CTL::INC_NONE),
        };
        ral::write_reg!(crate::ral::descriptor, desc, SRC_END, plan.source_end);
        ral::write_reg!(crate::ral::descriptor, desc, DST_END, plan.destination_end);
        ral::write_reg!(
            crate::ral::descriptor,
            desc,
            CTL,
            CYCLE_CTL: descriptor::CTL::CYCLE_BASIC,
            N_MINUS_1: (plan.transfers - 1) as u32,
            R_POWER: 0,
            SRC_SIZE: size_code(plan.width),
            SRC_INC: src_inc,
            DST_SIZE: size_code(plan.width),
            DST_INC: dst_inc
        );
    }

    /// Unmask requests, select the primary descriptor, and enable `channel`
    pub(crate) fn enable(&self, channel: usize) {
        let bit = 1 << channel;
        ral::write_reg!(crate::ral::dma, self.registers, RMSK_CLR, bit);
        ral::write_reg!(crate::ral::dma, self.registers, ALT_CLR, bit);
        ral::write_reg!(crate::ral::dma, self.registers, EN_SET, bit);
    }

    /// Disable `channel`, and clear its descriptor
    pub(crate) fn disable(&self, channel: usize) {
        ral::write_reg!(crate::ral::dma, self.registers, EN_CLR, 1 << channel);
        self.descriptor(channel).reset();
    }

    /// Take any fault flagged for `channel`
    ///
    /// Clears the flag. A bus error wins if both are set.
    pub(crate) fn take_fault(&self, channel: usize) -> Option<DmaFault> {
        let bit = 1 << channel;
        let bus = ral::read_reg!(crate::ral::dma, self.registers, ERRCHNL_CLR) & bit != 0;
        let invalid =
            ral::read_reg!(crate::ral::dma, self.registers, INVALIDDESC_CLR) & bit != 0;
        if bus {
            ral::write_reg!(crate::ral::dma, self.registers, ERRCHNL_CLR, bit);
        }
        if invalid {
            ral::write_reg!(crate::ral::dma, self.registers, INVALIDDESC_CLR, bit);
        }
        if bus {
            Some(DmaFault::BusError)
        } else if invalid {
            Some(DmaFault::InvalidDescriptor)
        } else {
            None
        }
    }

    #[cfg(test)]
    pub(crate) fn registers(&self) -> &dma::RegisterBlock {
        &self.registers
    }

    #[cfg(test)]
    pub(crate) fn descriptor_for(&self, channel: usize) -> &descriptor::RegisterBlock {
        self.descriptor(channel)
    }
}
