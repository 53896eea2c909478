//! SPORT and DMA interrupt handling
//!
//! Completion of a buffer always goes through [`Engine::finish`]: it
//! stops the half-SPORT, retires the fill slot, tells the application,
//! and arms the next queued buffer.

use crate::{
    config::{Direction, Packing},
    device::{State, TransferMode},
    dma::DmaFault,
    ral::{self, sport},
    transfer::Engine,
    Event, Events, Notification,
};

impl Engine<'_> {
    /// Service the SPORT event interrupt
    pub(crate) fn on_sport_interrupt(&mut self) {
        let stat = ral::read_reg!(crate::ral::sport, self.regs, STAT);
        let in_flight = self.session.mode == TransferMode::NonBlocking;

        let errors = Events::from_status(stat);
        if !errors.is_empty() {
            ral::write_reg!(crate::ral::sport, self.regs, STAT, stat & sport::STAT::ERRORS);
            if in_flight {
                self.fail(errors);
                self.finish();
                return;
            }
            self.report(errors);
        }
        if !in_flight {
            return;
        }

        let slot = self.session.ring.fill();
        let dma = slot.dma;
        if !dma && slot.index < slot.units {
            self.pump();
        }
        // Receive DMA completes on the DMA channel's interrupt.
        let dma_rx = dma && self.session.direction == Direction::Rx;
        if stat & sport::STAT::TFI::mask != 0 && !dma_rx {
            self.finish();
        }
    }

    /// Move words between the fill slot and the data register while the
    /// FIFO allows it
    fn pump(&mut self) {
        let regs = self.regs;
        let direction = self.session.direction;
        let bytes = self.state.config.bytes_per_data();
        // Packed words share one 32-bit register access.
        let width = match self.state.config.format.packing {
            Packing::None => bytes,
            Packing::Pack8 | Packing::Pack16 => 4,
        };
        let step = width / bytes;

        let slot = self.session.ring.fill_mut();
        let Some(buffer) = slot.buffer.as_mut() else {
            return;
        };
        while slot.index < slot.units {
            let dxs = ral::read_reg!(crate::ral::sport, regs, STAT, DXS);
            let offset = slot.index * bytes;
            match direction {
                Direction::Tx => {
                    if dxs == sport::STAT::DXS_FULL {
                        break;
                    }
                    ral::write_reg!(crate::ral::sport, regs, TX, buffer.read_word(offset, width));
                }
                Direction::Rx => {
                    if dxs == sport::STAT::DXS_EMPTY {
                        break;
                    }
                    buffer.write_word(offset, width, ral::read_reg!(crate::ral::sport, regs, RX));
                }
            }
            slot.index += step;
        }
    }

    /// Service the DMA done interrupt
    pub(crate) fn on_dma_done(&mut self) {
        if self.session.mode != TransferMode::NonBlocking {
            return;
        }
        let slot = self.session.ring.fill_mut();
        if slot.dma && self.session.direction == Direction::Rx {
            slot.index = slot.units;
            self.finish();
        }
    }

    /// Fail the in-flight DMA buffer, and every DMA buffer queued behind it
    pub(crate) fn on_dma_fault(&mut self, fault: DmaFault) {
        let events = fault.event().into();
        if self.session.mode != TransferMode::NonBlocking {
            self.report(events);
            return;
        }
        self.fail(events);
        self.complete();
        loop {
            let slot = self.session.ring.fill();
            if !(slot.is_pending() && slot.dma) {
                break;
            }
            log::warn!("retiring queued DMA buffer after {:?}", fault);
            self.fail(events);
            self.complete();
        }
        self.advance();
    }

    /// Retire the fill slot and arm the next one
    fn finish(&mut self) {
        self.complete();
        self.advance();
    }

    /// Stop the hardware and retire the fill slot
    fn complete(&mut self) {
        self.stop_port();
        ral::write_reg!(crate::ral::sport, self.regs, IEN, 0);
        ral::write_reg!(crate::ral::sport, self.regs, STAT, TFI: 1);
        if self.session.ring.fill().dma {
            self.dma.disable(self.port.dma_channel);
            self.interrupts.disable(self.port.dma_irq);
        }

        let release = self.session.callback.is_some();
        let direction = self.session.direction;
        log::trace!("retiring slot {}", self.session.ring.fill_index());
        match self.session.ring.retire(release) {
            Some(buffer) => {
                let buffer = buffer.into_slice();
                self.notify(match direction {
                    Direction::Rx => Notification::RxBufferProcessed(buffer),
                    Direction::Tx => Notification::TxBufferProcessed(buffer),
                });
            }
            None => self.completions.post(),
        }
    }

    /// Arm the next queued buffer, or go idle
    ///
    /// A buffer that can't be armed is reported as a driver fault, and
    /// retired.
    fn advance(&mut self) {
        self.session.mode = TransferMode::None;
        while self.session.ring.fill().is_pending() {
            match self.submit() {
                Ok(()) => return,
                Err(err) => {
                    log::warn!("could not arm queued buffer: {}", err);
                    self.fail(Event::DriverFault.into());
                    self.complete();
                }
            }
        }
        self.state.state = State::Paused;
    }

    /// Deliver errors that hit the fill slot's buffer
    ///
    /// Without a callback they stay with the buffer, and come back with it.
    fn fail(&mut self, events: Events) {
        log::warn!(
            "SPORT half errors on slot {}: {}",
            self.session.ring.fill_index(),
            events
        );
        if self.session.callback.is_some() {
            self.notify(Notification::HardwareError(events));
        } else {
            self.session.ring.fill_mut().events |= events;
        }
    }

    /// Deliver errors raised while no buffer was in flight
    ///
    /// Without a callback they're saved for the next retrieval, and a
    /// waiting reader wakes up to collect them.
    fn report(&mut self, events: Events) {
        log::warn!("SPORT half errors while idle: {}", events);
        if self.session.callback.is_some() {
            self.notify(Notification::HardwareError(events));
        } else {
            self.session.hw_error |= events;
            self.completions.post();
        }
    }

    fn notify(&mut self, note: Notification) {
        // Sized for the worst case; see Notes.
        let _ = self.notes.push(note);
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, task::Poll};

    use crate::{
        config::{DataFormat, Direction, Packing},
        ral::{dma, sport::STAT},
        sim::Sim,
        DmaFault, Error, Event, Notification, State,
    };

    const DXS_PARTIAL: u32 = 2 << STAT::DXS::offset;

    #[test]
    fn core_receive_drains_then_retires() {
        let sim = Sim::new();
        let device = sim.sport.open(0, Direction::Rx, Sim::memory()).unwrap();
        device.submit_buffer(Sim::buffer(8, 0), false).unwrap();

        sim.halves[0].RX.write(0x5A);
        sim.raise(0, DXS_PARTIAL);
        assert_eq!(device.is_buffer_available(), Ok(false));

        sim.raise(0, STAT::TFI::mask);
        assert_eq!(device.is_buffer_available(), Ok(true));
        assert_eq!(device.state(), Ok(State::Paused));

        let processed = device.get_buffer().unwrap();
        assert_eq!(processed.status(), Ok(()));
        assert_eq!(processed.buffer(), &[0x5A; 8]);
    }

    #[test]
    fn core_transmit_writes_packed_words() {
        let sim = Sim::new();
        let device = sim.sport.open(0, Direction::Tx, Sim::memory()).unwrap();
        device
            .config_data(&DataFormat {
                word_length: 16,
                packing: Packing::Pack16,
                lsb_first: false,
            })
            .unwrap();
        let buffer = Sim::buffer(8, 0);
        buffer.copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        device.submit_buffer(buffer, false).unwrap();

        sim.raise(0, 0);
        assert_eq!(sim.halves[0].TX.read(), 0x0807_0605);
        sim.raise(0, STAT::TFI::mask);
        assert_eq!(device.get_buffer().unwrap().into_buffer().len(), 8);
    }

    #[test]
    fn frame_sync_error_retires_with_buffer() {
        let sim = Sim::new();
        let device = sim.sport.open(0, Direction::Tx, Sim::memory()).unwrap();
        device.submit_buffer(Sim::buffer(8, 7), false).unwrap();

        sim.raise(0, STAT::FSERR::mask);
        let processed = device.get_buffer().unwrap();
        assert_eq!(
            processed.status(),
            Err(Error::HwError(Event::FrameSyncError.into()))
        );
        assert_eq!(processed.buffer(), &[7; 8]);
        assert_eq!(device.state(), Ok(State::Paused));
    }

    #[test]
    fn idle_errors_wait_for_next_buffer() {
        let sim = Sim::new();
        let device = sim.sport.open(0, Direction::Tx, Sim::memory()).unwrap();
        sim.raise(0, STAT::DERR::mask);
        assert_eq!(device.is_buffer_available(), Err(Error::OperationNotAllowed));

        device.submit_buffer(Sim::buffer(4, 0), true).unwrap();
        sim.raise(0, STAT::TFI::mask);
        let processed = device.get_buffer().unwrap();
        assert!(processed.events().contains(Event::DataError));
        assert!(!processed.events().contains(Event::FrameSyncError));
    }

    #[test]
    fn queued_buffer_armed_after_retirement() {
        let sim = Sim::new();
        let device = sim.sport.open(0, Direction::Tx, Sim::memory()).unwrap();
        device.submit_buffer(Sim::buffer(8, 1), false).unwrap();
        device.submit_buffer(Sim::buffer(12, 2), false).unwrap();

        sim.raise(0, STAT::TFI::mask);
        assert_eq!(device.state(), Ok(State::DataFlowEnabled));
        assert_eq!(sim.halves[0].NUMTRAN.read(), 12);
        assert_eq!(device.get_buffer().unwrap().buffer()[0], 1);

        sim.raise(0, STAT::TFI::mask);
        assert_eq!(device.get_buffer().unwrap().buffer()[0], 2);
        assert_eq!(device.state(), Ok(State::Paused));
    }

    #[test]
    fn receive_dma_completes_on_dma_interrupt() {
        let sim = Sim::new();
        let device = sim.sport.open(0, Direction::Rx, Sim::memory()).unwrap();
        device.submit_buffer(Sim::buffer(16, 0), true).unwrap();

        sim.raise(0, STAT::TFI::mask);
        assert_eq!(device.is_buffer_available(), Ok(false));

        sim.sport.on_dma_interrupt(0);
        assert_eq!(device.is_buffer_available(), Ok(true));
        assert!(!sim.irqs.is_enabled(crate::SPORT0A.dma_irq));
    }

    #[test]
    fn dma_fault_retires_every_queued_dma_buffer() {
        let sim = Sim::new();
        let device = sim.sport.open(0, Direction::Tx, Sim::memory()).unwrap();
        device.submit_buffer(Sim::buffer(4, 1), true).unwrap();
        device.submit_buffer(Sim::buffer(4, 2), true).unwrap();

        sim.sport.on_dma_error(0, DmaFault::BusError);
        assert_eq!(device.state(), Ok(State::Paused));

        let first = device.get_buffer().unwrap();
        assert_eq!(first.buffer()[0], 1);
        assert_eq!(first.status(), Err(Error::HwError(Event::DmaBusError.into())));
        let second = device.get_buffer().unwrap();
        assert_eq!(second.buffer()[0], 2);
        assert_eq!(second.status(), Err(Error::HwError(Event::DmaBusError.into())));
    }

    #[test]
    fn dma_fault_walk_stops_at_core_buffer() {
        let sim = Sim::new();
        let device = sim.sport.open(1, Direction::Tx, Sim::memory()).unwrap();
        device.submit_buffer(Sim::buffer(4, 1), true).unwrap();
        device.submit_buffer(Sim::buffer(8, 2), false).unwrap();

        let channel = crate::SPORT0B.dma_channel;
        let registers: &dma::RegisterBlock = sim.sport.dma.registers();
        registers.INVALIDDESC_CLR.write(1 << channel);
        sim.sport.on_dma_error_interrupt();

        assert_eq!(device.state(), Ok(State::DataFlowEnabled));
        assert_eq!(sim.halves[1].NUMTRAN.read(), 8);
        let first = device.get_buffer().unwrap();
        assert!(first.events().contains(Event::DmaInvalidDescriptor));
        assert_eq!(device.is_buffer_available(), Ok(false));

        sim.raise(1, STAT::TFI::mask);
        let second = device.get_buffer().unwrap();
        assert_eq!(second.buffer()[0], 2);
        assert_eq!(second.status(), Ok(()));
    }

    #[test]
    fn rearm_failure_is_reported_as_driver_fault() {
        let sim = Sim::new();
        let memory = Sim::memory();
        let device = sim.sport.open(0, Direction::Tx, memory).unwrap();
        device.submit_buffer(Sim::buffer(4, 1), false).unwrap();
        device.submit_buffer(Sim::buffer(4, 2), false).unwrap();
        critical_section::with(|cs| {
            let mut session = memory.session.borrow_ref_mut(cs);
            session.as_mut().unwrap().ring.slot_mut(1).index = 1;
        });

        sim.raise(0, STAT::TFI::mask);
        assert_eq!(device.state(), Ok(State::Paused));
        let first = device.get_buffer().unwrap();
        assert_eq!(first.buffer()[0], 1);
        assert_eq!(first.status(), Ok(()));
        let second = device.get_buffer().unwrap();
        assert_eq!(second.buffer()[0], 2);
        assert_eq!(second.status(), Err(Error::HwError(Event::DriverFault.into())));
    }

    #[test]
    fn idle_error_wakes_waiting_reader() {
        let sim = Sim::new();
        let device = sim.sport.open(0, Direction::Rx, Sim::memory()).unwrap();
        let mut wait = Box::pin(device.wait_buffer());
        assert!(crate::poll_no_wake(wait.as_mut()).is_pending());

        sim.raise(0, STAT::DERR::mask);
        match crate::poll_no_wake(wait.as_mut()) {
            Poll::Ready(Err(Error::HwError(events))) => {
                assert!(events.contains(Event::DataError))
            }
            other => panic!("unexpected {other:?}"),
        }

        // Reported once; the next buffer comes back clean.
        device.submit_buffer(Sim::buffer(4, 5), true).unwrap();
        sim.raise(0, STAT::TFI::mask);
        sim.sport.on_dma_interrupt(0);
        let processed = device.get_buffer().unwrap();
        assert_eq!(processed.buffer()[0], 5);
        assert_eq!(processed.status(), Ok(()));
    }

    static SEEN: Mutex<Vec<(char, u8)>> = Mutex::new(Vec::new());

    fn record(note: Notification) {
        let seen = match note {
            Notification::TxBufferProcessed(buffer) => ('t', buffer[0]),
            Notification::RxBufferProcessed(buffer) => ('r', buffer[0]),
            Notification::HardwareError(events) => ('e', events.iter().count() as u8),
        };
        SEEN.lock().unwrap().push(seen);
    }

    #[test]
    fn callback_receives_buffers_in_order() {
        let sim = Sim::new();
        let device = sim.sport.open(0, Direction::Tx, Sim::memory()).unwrap();
        device.register_callback(Some(&record)).unwrap();
        device.submit_buffer(Sim::buffer(4, 1), true).unwrap();
        device.submit_buffer(Sim::buffer(4, 2), true).unwrap();

        sim.raise(0, STAT::TFI::mask);
        sim.raise(0, STAT::FSERR::mask);
        assert_eq!(device.state(), Ok(State::Paused));

        // The ring is free again; callback mode hands buffers back on
        // retirement.
        device.submit_buffer(Sim::buffer(4, 3), true).unwrap();
        device.submit_buffer(Sim::buffer(4, 4), true).unwrap();

        assert_eq!(
            *SEEN.lock().unwrap(),
            [('t', 1), ('e', 1), ('t', 2)]
        );
    }
}
