//! A RAL-like module for SPORT and DMA register access
//!
//! Each peripheral is a `#[repr(C)]` register block. Fields that we
//! manipulate have a module that exposes an `offset` and a `mask`, so
//! the `ral-registers` macros can read, write, and modify them by name.

#![allow(
    non_snake_case, // Compatibility with RAL
    non_upper_case_globals, // Compatibility with RAL
)]

/// Define field modules for a register
///
/// Each entry is `FIELD: offset, width;`.
macro_rules! fields {
    ($($field:ident: $offset:expr, $width:expr;)*) => {
        $(
            pub mod $field {
                pub const offset: u32 = $offset;
                pub const mask: u32 = ((((1u64) << $width) - 1) as u32) << offset;
                pub mod R {}
                pub mod W {}
                pub mod RW {}
            }
        )*
    };
}

pub mod descriptor;
pub mod dma;
pub mod sport;

pub use ral_registers::{modify_reg, read_reg, write_reg};

/// A register block at a fixed address
///
/// Half-SPORTs, the µDMA controller, and the descriptor table are all
/// handed to the driver as addresses. `Static` lets `const` driver
/// objects hold them, and reach the block through `Deref`.
pub(crate) struct Static<T>(pub(crate) *const T);
impl<T> core::ops::Deref for Static<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        // Safety: the driver's constructors require a valid block address
        // that outlives the driver.
        unsafe { &*self.0 }
    }
}
impl<T> Clone for Static<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Static<T> {}
