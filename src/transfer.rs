//! Buffer submission
//!
//! Turns the ring's fill slot into a programmed transfer: either a DMA
//! descriptor, or a word count for the interrupt handler to work through.

use crate::{
    config::{Direction, Packing},
    device::{HalfPort, PortState, Session, State, TransferMode, BUFFER_COUNT},
    dma::{DmaController, DmaPlan},
    irq::Interrupts,
    ral::{self, descriptor, sport},
    ring::{Buffer, Slot},
    semaphore::Semaphore,
    Error, Notification, Result,
};

/// The largest word count the SPORT can be programmed with
pub(crate) const MAX_WORDS: usize =
    (sport::NUMTRAN::VALUE::mask >> sport::NUMTRAN::VALUE::offset) as usize;

/// Notifications produced while handling one request or interrupt
///
/// Sized for the worst case: an error report, plus a fault report and a
/// buffer for every slot.
pub(crate) type Notes = heapless::Vec<Notification, { 2 * BUFFER_COUNT + 2 }>;

/// Everything needed to drive one open device
///
/// An `Engine` only exists inside a critical section.
pub(crate) struct Engine<'a> {
    pub regs: &'a sport::RegisterBlock,
    pub port: &'a HalfPort,
    pub dma: &'a DmaController,
    pub interrupts: &'a dyn Interrupts,
    pub state: &'a mut PortState,
    pub session: &'a mut Session,
    pub completions: &'a Semaphore,
    pub notes: &'a mut Notes,
}

impl Engine<'_> {
    /// Fails if a transfer is programmed into the hardware
    pub(crate) fn ensure_stopped(&self) -> Result<()> {
        if self.state.state == State::DataFlowEnabled {
            Err(Error::OperationNotAllowed)
        } else {
            Ok(())
        }
    }

    fn fifo(&self) -> u32 {
        let fifo = match self.session.direction {
            Direction::Rx => &self.regs.RX as *const _ as usize,
            Direction::Tx => &self.regs.TX as *const _ as usize,
        };
        fifo as u32
    }

    fn plan(&self, addr: usize, len: usize) -> Option<DmaPlan> {
        let config = &self.state.config;
        DmaPlan::new(
            self.session.direction,
            self.fifo(),
            addr,
            len,
            config.dma_width,
            config.dma_increment,
            config.bytes_per_data(),
        )
    }

    /// Check a buffer against the current format before it enters the ring
    fn validate(&self, addr: usize, len: usize, dma: bool) -> Result<()> {
        let config = &self.state.config;
        if len == 0 {
            return Err(Error::InvalidParameter);
        }
        if dma {
            if addr % config.dma_width != 0 {
                return Err(Error::InvalidParameter);
            }
            let plan = self.plan(addr, len).ok_or(Error::InvalidParameter)?;
            if plan.transfers > descriptor::MAX_TRANSFERS || plan.words > MAX_WORDS {
                return Err(Error::InvalidParameter);
            }
        } else if len % 4 != 0 || len / config.bytes_per_data() > MAX_WORDS {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }

    /// Queue the buffer in `pending`, and start it if the device is idle
    ///
    /// On success the ring owns the buffer. On failure it's back in
    /// `pending`, and the ring is unchanged.
    pub(crate) fn enqueue(
        &mut self,
        pending: &mut Option<&'static mut [u8]>,
        dma: bool,
    ) -> Result<()> {
        let (addr, len) = match pending {
            Some(buffer) => (buffer.as_ptr() as usize, buffer.len()),
            None => return Err(Error::Failed),
        };
        self.validate(addr, len, dma)?;

        let buffer = Buffer::new(pending.take().ok_or(Error::Failed)?);
        let idx = match self.session.ring.enqueue(buffer, dma) {
            Ok(idx) => idx,
            Err(buffer) => {
                *pending = Some(buffer.into_slice());
                return Err(Error::BuffersNotSubmitted);
            }
        };
        log::trace!("queued {} bytes in slot {} (dma: {})", len, idx, dma);

        if self.session.mode == TransferMode::None {
            let armed = if idx == self.session.ring.fill_index() {
                self.submit()
            } else {
                Err(Error::Failed)
            };
            if let Err(err) = armed {
                if let Some(buffer) = self.session.ring.cancel_last() {
                    *pending = Some(buffer.into_slice());
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Program the hardware for the fill slot
    pub(crate) fn submit(&mut self) -> Result<()> {
        if self.session.ring.fill().dma {
            self.submit_dma()
        } else {
            self.submit_core()
        }
    }

    /// The fill slot must be a fresh, submitted buffer
    fn fresh(slot: &Slot) -> Result<&Buffer> {
        match &slot.buffer {
            Some(buffer) if slot.in_use && slot.index == 0 => Ok(buffer),
            _ => Err(Error::Failed),
        }
    }

    fn submit_dma(&mut self) -> Result<()> {
        let direction = self.session.direction;
        let slot = self.session.ring.fill();
        let buffer = Self::fresh(slot)?;
        let plan = self
            .plan(buffer.addr(), slot.requested_bytes)
            .ok_or(Error::Failed)?;
        if plan.words > MAX_WORDS || plan.transfers > descriptor::MAX_TRANSFERS {
            return Err(Error::Failed);
        }
        self.session.ring.fill_mut().units = plan.words;

        let channel = self.port.dma_channel;
        self.stop_port();
        self.dma.configure(channel, direction, &plan);
        self.dma.enable(channel);

        self.interrupts.clear_pending(self.port.sport_irq);
        self.interrupts.clear_pending(self.port.dma_irq);
        // A transmit isn't done when the DMA channel is; the last word
        // is still in the shift register. Wait for the SPORT instead.
        let ien = match direction {
            Direction::Rx => {
                self.interrupts.enable(self.port.dma_irq);
                sport::IEN::ERRORS
            }
            Direction::Tx => sport::IEN::TF::mask | sport::IEN::ERRORS,
        };
        ral::write_reg!(crate::ral::sport, self.regs, IEN, ien);
        self.interrupts.enable(self.port.sport_irq);

        self.start(plan.words, true);
        Ok(())
    }

    fn submit_core(&mut self) -> Result<()> {
        let config = &self.state.config;
        let bytes = config.bytes_per_data();
        let packing_ok = match config.format.packing {
            Packing::None => true,
            Packing::Pack8 => bytes == 1,
            Packing::Pack16 => bytes == 2,
        };
        let slot = self.session.ring.fill();
        Self::fresh(slot)?;
        let units = slot.requested_bytes / bytes;
        if units == 0 || units > MAX_WORDS || !packing_ok {
            return Err(Error::Failed);
        }
        self.session.ring.fill_mut().units = units;

        self.stop_port();
        self.interrupts.clear_pending(self.port.sport_irq);
        ral::write_reg!(
            crate::ral::sport,
            self.regs,
            IEN,
            TF: 1,
            DATA: 1,
            DERRMSK: 1,
            FSERRMSK: 1,
            SYSDATERR: 1
        );
        self.interrupts.enable(self.port.sport_irq);

        self.start(units, false);
        Ok(())
    }

    /// Load the word count, and enable the half-SPORT
    fn start(&mut self, words: usize, dma: bool) {
        ral::write_reg!(crate::ral::sport, self.regs, NUMTRAN, VALUE: words as u32);
        self.state.state = State::DataFlowEnabled;
        self.session.mode = TransferMode::NonBlocking;
        ral::write_reg!(crate::ral::sport, self.regs, CTL, self.state.config.ctl);
        ral::modify_reg!(crate::ral::sport, self.regs, CTL, SPEN: 1, DMAEN: dma as u32);
    }

    /// Disable the half-SPORT and its DMA requests
    pub(crate) fn stop_port(&self) {
        ral::modify_reg!(crate::ral::sport, self.regs, CTL, SPEN: 0, DMAEN: 0);
    }
}
