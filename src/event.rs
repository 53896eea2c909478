//! Driver events and notifications

use crate::ral::sport::STAT;
use core::fmt::{self, Debug, Display};

/// A single error condition reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A frame sync arrived early or late
    FrameSyncError,
    /// Receive overflow or transmit underflow
    DataError,
    /// The SPORT saw an error on the system bus
    SystemDataError,
    /// The DMA channel hit a bus error
    DmaBusError,
    /// The DMA channel fetched an invalid descriptor
    DmaInvalidDescriptor,
    /// The driver could not arm a queued buffer from interrupt context
    DriverFault,
}

impl Event {
    const ALL: [Event; 6] = [
        Event::FrameSyncError,
        Event::DataError,
        Event::SystemDataError,
        Event::DmaBusError,
        Event::DmaInvalidDescriptor,
        Event::DriverFault,
    ];

    const fn bit(self) -> u32 {
        match self {
            Event::FrameSyncError => 1 << 0,
            Event::DataError => 1 << 1,
            Event::SystemDataError => 1 << 2,
            Event::DmaBusError => 1 << 3,
            Event::DmaInvalidDescriptor => 1 << 4,
            Event::DriverFault => 1 << 5,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Event::FrameSyncError => "FSERR",
            Event::DataError => "DERR",
            Event::SystemDataError => "SYSDATERR",
            Event::DmaBusError => "DMA_BUS",
            Event::DmaInvalidDescriptor => "DMA_INVALID_DESC",
            Event::DriverFault => "DRIVER_FAULT",
        }
    }
}

/// A set of [`Event`]s
///
/// The bit layout is the driver's own. Use [`from_status`](Events::from_status)
/// to translate a raw SPORT status word.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Events(u32);

impl Events {
    /// No events
    pub const NONE: Events = Events(0);

    /// Translate the error bits of a raw SPORT status register value
    ///
    /// Bits that don't describe an error are ignored.
    pub const fn from_status(stat: u32) -> Self {
        let mut bits = 0;
        if stat & STAT::FSERR::mask != 0 {
            bits |= Event::FrameSyncError.bit();
        }
        if stat & STAT::DERR::mask != 0 {
            bits |= Event::DataError.bit();
        }
        if stat & STAT::SYSDATERR::mask != 0 {
            bits |= Event::SystemDataError.bit();
        }
        Events(bits)
    }

    /// Returns `true` if there are no events in the set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if `event` is in the set
    pub const fn contains(self, event: Event) -> bool {
        self.0 & event.bit() != 0
    }

    /// Add `event` to the set
    pub fn insert(&mut self, event: Event) {
        self.0 |= event.bit();
    }

    /// Returns the union of both sets
    pub const fn union(self, other: Events) -> Events {
        Events(self.0 | other.0)
    }

    /// Take all events, leaving the set empty
    pub fn take(&mut self) -> Events {
        core::mem::take(self)
    }

    /// Iterate over the events in the set
    pub fn iter(self) -> impl Iterator<Item = Event> {
        Event::ALL.into_iter().filter(move |event| self.contains(*event))
    }
}

impl From<Event> for Events {
    fn from(event: Event) -> Self {
        Events(event.bit())
    }
}

impl core::ops::BitOr for Events {
    type Output = Events;
    fn bitor(self, rhs: Events) -> Events {
        self.union(rhs)
    }
}

impl core::ops::BitOrAssign for Events {
    fn bitor_assign(&mut self, rhs: Events) {
        self.0 |= rhs.0;
    }
}

impl Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Display for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (idx, event) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(" | ")?;
            }
            f.write_str(event.name())?;
        }
        Ok(())
    }
}

/// A notification delivered to a registered callback
///
/// Callbacks run in interrupt context.
#[derive(Debug)]
pub enum Notification {
    /// A receive buffer is full; ownership returns to the application
    RxBufferProcessed(&'static mut [u8]),
    /// A transmit buffer was shifted out; ownership returns to the application
    TxBufferProcessed(&'static mut [u8]),
    /// The driver observed errors that aren't tied to a buffer
    HardwareError(Events),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bits_map_to_events() {
        let events = Events::from_status(STAT::FSERR::mask | STAT::TFI::mask);
        assert!(events.contains(Event::FrameSyncError));
        assert!(!events.contains(Event::DataError));
        assert_eq!(events.iter().count(), 1);

        let events = Events::from_status(STAT::ERRORS);
        assert!(events.contains(Event::DataError));
        assert!(events.contains(Event::SystemDataError));
        assert!(!events.contains(Event::DmaBusError));
    }

    #[test]
    fn take_clears() {
        let mut events = Events::from(Event::DmaBusError);
        events |= Event::DriverFault.into();
        let taken = events.take();
        assert!(events.is_empty());
        assert!(taken.contains(Event::DriverFault));
    }
}
