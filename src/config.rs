//! Half-SPORT configuration
//!
//! The driver mirrors the SPORT control word in memory. Each setter
//! rewrites only its own group of fields. The mirrored control word
//! reaches the hardware when the next buffer is submitted; the divisor
//! and timer registers are written right away.

use crate::ral::{self, sport};
use crate::{Error, Result};

/// Word packing into 32-bit transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Packing {
    /// One word per transfer
    #[default]
    None,
    /// Four 8-bit words per transfer
    Pack8,
    /// Two 16-bit words per transfer
    Pack16,
}

impl Packing {
    const fn raw(self) -> u32 {
        match self {
            Packing::None => 0,
            Packing::Pack8 => 1,
            Packing::Pack16 => 2,
        }
    }
}

/// Transfer direction of a half-SPORT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Receive data into memory
    Rx,
    /// Transmit data from memory
    Tx,
}

/// Serial word format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFormat {
    /// Bits per serial word, `4..=32`
    pub word_length: u8,
    /// Packing of serial words into DMA transfers
    ///
    /// Packing that doesn't match the word size is treated as `None`.
    pub packing: Packing,
    /// Shift out the least significant bit first
    pub lsb_first: bool,
}

impl DataFormat {
    /// 8-bit words, no packing, MSB first
    pub const DEFAULT: Self = DataFormat {
        word_length: 8,
        packing: Packing::None,
        lsb_first: false,
    };

    /// Returns the number of memory bytes that hold one serial word
    ///
    /// Returns `None` if the word length is out of range.
    pub const fn bytes_per_word(&self) -> Option<usize> {
        match self.word_length {
            4..=8 => Some(1),
            9..=16 => Some(2),
            17..=32 => Some(4),
            _ => None,
        }
    }

    /// Returns the packing the hardware actually uses for this format
    pub const fn effective_packing(&self) -> Packing {
        match (self.bytes_per_word(), self.packing) {
            (Some(1), Packing::Pack8) => Packing::Pack8,
            (Some(2), Packing::Pack16) => Packing::Pack16,
            _ => Packing::None,
        }
    }

    /// Returns the DMA transfer width and address increment, in bytes
    ///
    /// Packed formats move a full 32-bit word per transfer. Returns
    /// `None` if the word length is out of range.
    pub const fn dma_unit(&self) -> Option<(usize, usize)> {
        let bytes = match self.bytes_per_word() {
            Some(bytes) => bytes,
            None => return None,
        };
        match self.effective_packing() {
            Packing::None => Some((bytes, bytes)),
            Packing::Pack8 | Packing::Pack16 => Some((4, 4)),
        }
    }
}

impl Default for DataFormat {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Serial clock configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    /// Divisor applied to the peripheral clock when the clock is internal
    pub divisor: u16,
    /// Generate the serial clock internally
    pub internal: bool,
    /// Sample data and frame sync on the rising edge
    pub rising_edge: bool,
    /// Gate the clock when no data moves
    pub gated: bool,
}

impl ClockConfig {
    /// External clock, falling edge, not gated
    pub const DEFAULT: Self = ClockConfig {
        divisor: 0,
        internal: false,
        rising_edge: false,
        gated: false,
    };
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Frame sync configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSyncConfig {
    /// Serial clocks between frame syncs, when generated internally
    pub divisor: u8,
    /// A frame sync is required for every word
    pub required: bool,
    /// Generate the frame sync internally
    pub internal: bool,
    /// Generate frame syncs whether or not data is ready
    pub data_independent: bool,
    /// Frame sync is active low
    pub active_low: bool,
    /// Late frame sync
    pub late: bool,
    /// Flag frame syncs that arrive while a word is in flight
    pub error_detection: bool,
}

impl FrameSyncConfig {
    /// External, data-dependent, required, active high frame sync
    pub const DEFAULT: Self = FrameSyncConfig {
        divisor: 0,
        required: true,
        internal: false,
        data_independent: false,
        active_low: false,
        late: false,
        error_detection: true,
    };
}

impl Default for FrameSyncConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Timer mode: the CONVT signal that precedes each frame sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerMode {
    /// Serial clocks between CONVT and the frame sync
    pub fs_to_cnv_delay: u8,
    /// CONVT pulse width in serial clocks, `0..=15`
    pub width: u8,
    /// CONVT is active low
    pub active_low: bool,
}

/// Configuration applied to a half-SPORT when it's opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticConfig {
    pub data: DataFormat,
    pub clock: ClockConfig,
    pub frame_sync: FrameSyncConfig,
    pub timer: Option<TimerMode>,
}

impl StaticConfig {
    pub const DEFAULT: Self = StaticConfig {
        data: DataFormat::DEFAULT,
        clock: ClockConfig::DEFAULT,
        frame_sync: FrameSyncConfig::DEFAULT,
        timer: None,
    };
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Mirrored half-SPORT registers
///
/// `ctl` never carries `SPEN` or `DMAEN`; the submission path adds them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeviceConfig {
    pub ctl: u32,
    pub div: u32,
    pub cnvt: u32,
    pub format: DataFormat,
    /// Bytes moved by one DMA transfer
    pub dma_width: usize,
    /// Bytes the memory address advances per DMA transfer
    pub dma_increment: usize,
}

impl DeviceConfig {
    pub(crate) const fn new() -> Self {
        DeviceConfig {
            ctl: 0,
            div: 0,
            cnvt: 0,
            format: DataFormat::DEFAULT,
            dma_width: 1,
            dma_increment: 1,
        }
    }

    /// Build the mirror for a freshly opened device
    pub(crate) fn open(direction: Direction, config: &StaticConfig) -> Result<Self> {
        let mut device = DeviceConfig::new();
        device.ctl = match direction {
            Direction::Rx => 0,
            Direction::Tx => sport::CTL::SPTRAN::mask,
        };
        device.set_data_format(&config.data)?;
        device.set_clock(&config.clock);
        device.set_frame_sync(&config.frame_sync);
        if let Some(timer) = &config.timer {
            device.set_timer_mode(timer)?;
        }
        Ok(device)
    }

    /// Returns the number of memory bytes per serial word
    pub(crate) fn bytes_per_data(&self) -> usize {
        self.format.bytes_per_word().unwrap_or(4)
    }

    pub(crate) fn set_data_format(&mut self, format: &DataFormat) -> Result<()> {
        let (dma_width, dma_increment) = format.dma_unit().ok_or(Error::InvalidParameter)?;
        let packing = format.effective_packing();
        self.ctl = (self.ctl & !sport::CTL::DATA_FORMAT)
            | field(sport::CTL::SLEN::offset, sport::CTL::SLEN::mask, u32::from(format.word_length) - 1)
            | field(sport::CTL::PACK::offset, sport::CTL::PACK::mask, packing.raw())
            | flag(sport::CTL::LSBF::mask, format.lsb_first);
        self.format = DataFormat { packing, ..*format };
        self.dma_width = dma_width;
        self.dma_increment = dma_increment;
        Ok(())
    }

    pub(crate) fn set_clock(&mut self, clock: &ClockConfig) {
        self.ctl = (self.ctl & !sport::CTL::CLOCK)
            | flag(sport::CTL::ICLK::mask, clock.internal)
            | flag(sport::CTL::CKRE::mask, clock.rising_edge)
            | flag(sport::CTL::GCLKEN::mask, clock.gated);
        self.div = (self.div & !sport::DIV::CLKDIV::mask)
            | field(sport::DIV::CLKDIV::offset, sport::DIV::CLKDIV::mask, clock.divisor.into());
    }

    pub(crate) fn set_frame_sync(&mut self, fs: &FrameSyncConfig) {
        self.ctl = (self.ctl & !sport::CTL::FRAME_SYNC)
            | flag(sport::CTL::FSR::mask, fs.required)
            | flag(sport::CTL::IFS::mask, fs.internal)
            | flag(sport::CTL::DIFS::mask, fs.data_independent)
            | flag(sport::CTL::LFS::mask, fs.active_low)
            | flag(sport::CTL::LAFS::mask, fs.late)
            | flag(sport::CTL::FSERRMODE::mask, fs.error_detection);
        self.div = (self.div & !sport::DIV::FSDIV::mask)
            | field(sport::DIV::FSDIV::offset, sport::DIV::FSDIV::mask, fs.divisor.into());
    }

    pub(crate) fn set_multiplex(&mut self, frame_sync: bool, clock: bool) {
        self.ctl = (self.ctl & !sport::CTL::MUX)
            | flag(sport::CTL::FSMUXSEL::mask, frame_sync)
            | flag(sport::CTL::CKMUXSEL::mask, clock);
    }

    pub(crate) fn set_timer_mode(&mut self, timer: &TimerMode) -> Result<()> {
        if timer.width > 15 {
            return Err(Error::InvalidParameter);
        }
        self.cnvt = field(sport::CNVT::WID::offset, sport::CNVT::WID::mask, timer.width.into())
            | flag(sport::CNVT::POL::mask, timer.active_low)
            | field(
                sport::CNVT::CNVT2FS::offset,
                sport::CNVT::CNVT2FS::mask,
                timer.fs_to_cnv_delay.into(),
            );
        // Timer mode needs the SPORT's operating mode bit
        self.ctl |= sport::CTL::OPMODE::mask;
        Ok(())
    }

    /// Write the registers that take effect immediately
    pub(crate) fn write_divisors(&self, regs: &sport::RegisterBlock) {
        ral::write_reg!(crate::ral::sport, regs, DIV, self.div);
        ral::write_reg!(crate::ral::sport, regs, CNVT, self.cnvt);
    }
}

const fn field(offset: u32, mask: u32, value: u32) -> u32 {
    (value << offset) & mask
}

const fn flag(mask: u32, set: bool) -> u32 {
    if set {
        mask
    } else {
        0
    }
}
