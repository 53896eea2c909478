//! µDMA channel control data
//!
//! The controller reads one of these per channel from the descriptor
//! table. Addresses are *end* addresses: the last byte the transfer
//! touches, not the first.

use ral_registers::RWRegister;

#[repr(C)]
pub struct RegisterBlock {
    pub SRC_END: RWRegister<u32>,
    pub DST_END: RWRegister<u32>,
    pub CTL: RWRegister<u32>,
    _reserved: u32,
}

impl RegisterBlock {
    /// Zero the descriptor, which the controller treats as stopped
    pub fn reset(&self) {
        self.SRC_END.write(0);
        self.DST_END.write(0);
        self.CTL.write(0);
    }
}

pub mod CTL {
    fields! {
        CYCLE_CTL: 0, 3;
        NEXT_USEBURST: 3, 1;
        N_MINUS_1: 4, 10;
        R_POWER: 14, 4;
        SRC_PROT_CTL: 18, 3;
        DST_PROT_CTL: 21, 3;
        SRC_SIZE: 24, 2;
        SRC_INC: 26, 2;
        DST_SIZE: 28, 2;
        DST_INC: 30, 2;
    }

    /// Basic cycle: stop after the descriptor completes
    pub const CYCLE_BASIC: u32 = 1;
    /// Address increment value that holds the address fixed
    pub const INC_NONE: u32 = 3;
}

pub mod SRC_END {}
pub mod DST_END {}

/// The maximum number of transfers described by one descriptor
pub const MAX_TRANSFERS: usize = 1024;
