//! Interrupt cycle counting
//!
//! With the `cycle-count` feature, every driver interrupt entry point
//! samples the DWT cycle counter as it returns. You're responsible for
//! enabling the DWT counter. Without the feature, sampling compiles to
//! nothing.

#[cfg(feature = "cycle-count")]
use core::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "cycle-count")]
static LAST_SAMPLE: AtomicU32 = AtomicU32::new(0);

#[inline(always)]
pub(crate) fn sample() {
    #[cfg(feature = "cycle-count")]
    LAST_SAMPLE.store(
        cortex_m::peripheral::DWT::cycle_count(),
        Ordering::Relaxed,
    );
}

/// Returns the cycle count sampled at the end of the last driver interrupt
#[cfg(feature = "cycle-count")]
pub fn last_sample() -> u32 {
    LAST_SAMPLE.load(Ordering::Relaxed)
}
