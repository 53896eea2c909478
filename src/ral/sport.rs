//! One half of a SPORT instance

use ral_registers::RWRegister;

#[repr(C)]
pub struct RegisterBlock {
    /// Half SPORT control
    pub CTL: RWRegister<u32>,
    /// Clock and frame sync divisor
    pub DIV: RWRegister<u32>,
    /// Interrupt enable
    pub IEN: RWRegister<u32>,
    /// Status, error bits are write-one-to-clear
    pub STAT: RWRegister<u32>,
    /// Number of words to transfer
    pub NUMTRAN: RWRegister<u32>,
    /// CONVT to frame sync timing
    pub CNVT: RWRegister<u32>,
    _reserved0: [u32; 2],
    /// Transmit data
    pub TX: RWRegister<u32>,
    _reserved1: u32,
    /// Receive data
    pub RX: RWRegister<u32>,
}

pub mod CTL {
    fields! {
        SPEN: 0, 1;
        FSMUXSEL: 1, 1;
        CKMUXSEL: 2, 1;
        LSBF: 3, 1;
        SLEN: 4, 5;
        ICLK: 10, 1;
        OPMODE: 11, 1;
        CKRE: 12, 1;
        FSR: 13, 1;
        IFS: 14, 1;
        DIFS: 15, 1;
        LFS: 16, 1;
        LAFS: 17, 1;
        PACK: 18, 2;
        FSERRMODE: 20, 1;
        GCLKEN: 21, 1;
        SPTRAN: 25, 1;
        DMAEN: 26, 1;
    }

    /// The fields written by [`DataFormat`](crate::DataFormat)
    pub const DATA_FORMAT: u32 = SLEN::mask | PACK::mask | LSBF::mask;
    /// The fields written by [`ClockConfig`](crate::ClockConfig)
    pub const CLOCK: u32 = ICLK::mask | CKRE::mask | GCLKEN::mask;
    /// The fields written by [`FrameSyncConfig`](crate::FrameSyncConfig)
    pub const FRAME_SYNC: u32 =
        FSR::mask | IFS::mask | DIFS::mask | LFS::mask | LAFS::mask | FSERRMODE::mask;
    /// The signal multiplexer selections
    pub const MUX: u32 = FSMUXSEL::mask | CKMUXSEL::mask;
}

pub mod DIV {
    fields! {
        CLKDIV: 0, 16;
        FSDIV: 16, 8;
    }
}

pub mod IEN {
    fields! {
        TF: 0, 1;
        DERRMSK: 1, 1;
        FSERRMSK: 2, 1;
        DATA: 3, 1;
        SYSDATERR: 4, 1;
    }

    /// All error interrupts
    pub const ERRORS: u32 = DERRMSK::mask | FSERRMSK::mask | SYSDATERR::mask;
}

pub mod STAT {
    fields! {
        TFI: 0, 1;
        DERR: 1, 1;
        FSERR: 2, 1;
        DATREQ: 3, 1;
        SYSDATERR: 4, 1;
        DXS: 8, 2;
    }

    /// All error status bits
    pub const ERRORS: u32 = DERR::mask | FSERR::mask | SYSDATERR::mask;

    /// DXS value for an empty FIFO
    pub const DXS_EMPTY: u32 = 0;
    /// DXS value for a full FIFO
    pub const DXS_FULL: u32 = 3;
}

pub mod NUMTRAN {
    fields! {
        VALUE: 0, 12;
    }
}

pub mod CNVT {
    fields! {
        WID: 0, 4;
        POL: 8, 1;
        CNVT2FS: 16, 8;
    }
}

pub mod TX {}
pub mod RX {}
