//! Interrupt controller access
//!
//! The driver masks, unmasks, and clears its SPORT and DMA interrupt
//! lines through [`Interrupts`]. [`Nvic`] is the implementation for
//! Cortex-M systems.

use cortex_m::peripheral::NVIC;

/// Control over interrupt lines, by IRQ number
pub trait Interrupts {
    /// Unmask the interrupt
    fn enable(&self, irq: u16);
    /// Mask the interrupt
    fn disable(&self, irq: u16);
    /// Clear the interrupt's pending state
    fn clear_pending(&self, irq: u16);
}

/// The Cortex-M NVIC
pub struct Nvic;

#[derive(Clone, Copy)]
struct Irq(u16);

// Safety: the driver is configured with IRQ numbers valid for the device.
unsafe impl cortex_m::interrupt::InterruptNumber for Irq {
    fn number(self) -> u16 {
        self.0
    }
}

impl Interrupts for Nvic {
    fn enable(&self, irq: u16) {
        // Safety: the driver installs its handlers before enabling
        // interrupts, and never unmasks inside a critical section that
        // relies on masking.
        unsafe { NVIC::unmask(Irq(irq)) }
    }
    fn disable(&self, irq: u16) {
        NVIC::mask(Irq(irq));
    }
    fn clear_pending(&self, irq: u16) {
        NVIC::unpend(Irq(irq));
    }
}
