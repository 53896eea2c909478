//! A simulated SPORT, for host tests
//!
//! Register blocks live in zeroed, leaked memory. Nothing behaves like
//! hardware on its own: tests set status bits, then call the interrupt
//! entry points. Write-one-to-clear bits simply hold the last value
//! written, so set STAT in full before each simulated interrupt.

use std::{collections::BTreeSet, sync::Mutex};

use crate::{
    ral::{descriptor, dma, sport},
    DeviceMemory, DmaController, Interrupts, PortResources, Sport, SPORT0A, SPORT0B,
};

/// Records which interrupt lines are unmasked
#[derive(Default)]
pub(crate) struct Irqs {
    enabled: Mutex<BTreeSet<u16>>,
}

impl Irqs {
    pub(crate) fn is_enabled(&self, irq: u16) -> bool {
        self.enabled.lock().unwrap().contains(&irq)
    }
}

impl Interrupts for Irqs {
    fn enable(&self, irq: u16) {
        self.enabled.lock().unwrap().insert(irq);
    }
    fn disable(&self, irq: u16) {
        self.enabled.lock().unwrap().remove(&irq);
    }
    fn clear_pending(&self, _: u16) {}
}

pub(crate) struct Sim {
    pub sport: &'static Sport,
    pub halves: [&'static sport::RegisterBlock; 2],
    pub irqs: &'static Irqs,
}

fn zeroed<T>() -> &'static T {
    // Safety: register blocks are plain integers; all zeros is valid.
    Box::leak(Box::new(unsafe { core::mem::zeroed::<T>() }))
}

impl Sim {
    pub(crate) fn new() -> Self {
        let halves = [zeroed::<sport::RegisterBlock>(), zeroed()];
        let dma = zeroed::<dma::RegisterBlock>();
        let descriptors = zeroed::<[descriptor::RegisterBlock; 8]>();
        let irqs: &'static Irqs = Box::leak(Box::default());

        let resources = |template: PortResources, regs: &'static sport::RegisterBlock| {
            PortResources {
                registers: regs as *const _ as *const (),
                ..template
            }
        };
        // Safety: every pointer refers to leaked memory that nothing else uses.
        let sport = unsafe {
            Sport::new(
                resources(SPORT0A, halves[0]),
                resources(SPORT0B, halves[1]),
                DmaController::new(
                    dma as *const _ as *const (),
                    descriptors as *const _ as *const (),
                ),
                irqs,
            )
        };
        Sim {
            sport: Box::leak(Box::new(sport)),
            halves,
            irqs,
        }
    }

    pub(crate) fn memory() -> &'static DeviceMemory {
        Box::leak(Box::default())
    }

    /// A word-aligned buffer of `len` bytes, filled with `tag`
    pub(crate) fn buffer(len: usize, tag: u8) -> &'static mut [u8] {
        let words: &'static mut [u32] = Box::leak(vec![0u32; len / 4 + 1].into_boxed_slice());
        // Safety: the words cover at least `len` bytes, and the slice is
        // never used again.
        let bytes = unsafe { core::slice::from_raw_parts_mut(words.as_mut_ptr().cast::<u8>(), len) };
        bytes.fill(tag);
        bytes
    }

    /// Raise the SPORT interrupt of `port` with status `stat`
    pub(crate) fn raise(&self, port: usize, stat: u32) {
        self.halves[port].STAT.write(stat);
        self.sport.on_interrupt(port);
    }
}
