//! SPORT (serial port) driver for ADuCM4x50 processors
//!
//! `aducm-sport` drives the two half-SPORTs of a SPORT instance. Each
//! open half-SPORT moves a queue of application buffers, in one direction,
//! either by DMA or word by word from its interrupt handler.
//!
//! - [`Sport`] owns the driver's static state, and provides the interrupt
//!   entry points that you call from your interrupt handlers.
//! - [`Device`] is a handle to an open half-SPORT. Submit buffers with
//!   [`Device::submit_buffer`], then collect them with
//!   [`Device::get_buffer`], or have them delivered to a callback.
//!
//! Buffers are retired in the order they were submitted. Hardware errors
//! are either passed to the callback as they happen, or accumulated and
//! reported with the next buffer you collect.
//!
//! # Critical sections
//!
//! The driver shares state between your code and its interrupt handlers
//! through the `critical-section` crate. Enable the `single-core` feature
//! to use the Cortex-M implementation, or supply your own.
//!
//! ### License
//!
//! Licensed under either of
//!
//! - [Apache License, Version 2.0](http://www.apache.org/licenses/LICENSE-2.0) ([LICENSE-APACHE](./LICENSE-APACHE))
//! - [MIT License](http://opensource.org/licenses/MIT) ([LICENSE-MIT](./LICENSE-MIT))
//!
//! at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted
//! for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
//! dual licensed as above, without any additional terms or conditions.

#![cfg_attr(not(test), no_std)]

mod config;
pub mod cycles;
mod device;
mod dma;
mod error;
mod event;
mod interrupt;
mod irq;
mod ral;
mod ring;
mod semaphore;
#[cfg(test)]
mod sim;
mod transfer;

pub use config::{
    ClockConfig, DataFormat, Direction, FrameSyncConfig, Packing, StaticConfig, TimerMode,
};
pub use device::{
    Callback, Device, DeviceMemory, PortResources, Processed, Sport, State, WaitBuffer,
    BUFFER_COUNT, HALF_PORTS, SPORT0A, SPORT0B,
};
pub use dma::{DmaController, DmaFault};
pub use error::Error;
pub use event::{Event, Events, Notification};
pub use irq::{Interrupts, Nvic};

/// A SPORT driver result
pub type Result<T> = core::result::Result<T, Error>;

use core::{future::Future, pin::Pin, task::Poll};

/// Poll a future with a dummy waker.
///
/// Use `poll_no_wake` when you want to check on a future, like
/// [`Device::wait_buffer`], without an executor.
pub fn poll_no_wake<F>(future: Pin<&mut F>) -> Poll<F::Output>
where
    F: Future,
{
    use core::task::{Context, RawWaker, RawWakerVTable, Waker};
    const VTABLE: RawWakerVTable = RawWakerVTable::new(|_| RAW_WAKER, |_| {}, |_| {}, |_| {});

    const RAW_WAKER: RawWaker = RawWaker::new(core::ptr::null(), &VTABLE);
    // Safety: raw waker meets documented requirements.
    let waker = unsafe { Waker::from_raw(RAW_WAKER) };
    let mut context = Context::from_waker(&waker);
    future.poll(&mut context)
}

/// Block until the future returns a result.
///
/// `block` invokes [`poll_no_wake`] in a loop until the future
/// returns a result. [`Device::get_buffer`] uses `block` to wait for
/// the next processed buffer.
pub fn block<F>(mut future: Pin<&mut F>) -> F::Output
where
    F: Future,
{
    loop {
        match poll_no_wake(future.as_mut()) {
            Poll::Ready(result) => return result,
            Poll::Pending => {}
        }
    }
}
