//! µDMA controller registers
//!
//! Every channel-indexed register uses one bit per channel. The `*_SET`
//! and `*_CLR` registers act on the bits written as one.

use ral_registers::RWRegister;

#[repr(C)]
pub struct RegisterBlock {
    pub STAT: RWRegister<u32>,
    pub CFG: RWRegister<u32>,
    /// Primary descriptor table base
    pub PDBPTR: RWRegister<u32>,
    /// Alternate descriptor table base
    pub ADBPTR: RWRegister<u32>,
    _reserved0: u32,
    pub SWREQ: RWRegister<u32>,
    _reserved1: [u32; 2],
    pub RMSK_SET: RWRegister<u32>,
    pub RMSK_CLR: RWRegister<u32>,
    pub EN_SET: RWRegister<u32>,
    pub EN_CLR: RWRegister<u32>,
    pub ALT_SET: RWRegister<u32>,
    pub ALT_CLR: RWRegister<u32>,
    pub PRI_SET: RWRegister<u32>,
    pub PRI_CLR: RWRegister<u32>,
    _reserved2: [u32; 2],
    /// Bus error per channel, write one to clear
    pub ERRCHNL_CLR: RWRegister<u32>,
    pub ERR_CLR: RWRegister<u32>,
    /// Invalid descriptor per channel, write one to clear
    pub INVALIDDESC_CLR: RWRegister<u32>,
}

pub mod STAT {
    fields! {
        MEN: 0, 1;
        CHANM1: 16, 5;
    }
}

pub mod CFG {
    fields! {
        MEN: 0, 1;
    }
}

pub mod PDBPTR {}
pub mod EN_SET {}
pub mod EN_CLR {}
pub mod RMSK_CLR {}
pub mod ALT_CLR {}
pub mod ERRCHNL_CLR {}
pub mod INVALIDDESC_CLR {}
