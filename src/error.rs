//! SPORT driver errors

use crate::Events;
use core::fmt::{self, Display};

/// An error from the SPORT driver
///
/// Every variant except [`HwError`](Error::HwError) describes a misuse
/// or a resource limit detected in the caller's context. No state changes
/// when one of those is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The half-SPORT index does not exist
    InvalidDeviceNum,
    /// The half-SPORT, or the device memory, is already open
    DeviceInUse,
    /// The handle no longer refers to an open device
    InvalidHandle,
    /// An argument is out of range, or a buffer is misaligned or sized wrong
    InvalidParameter,
    /// Every slot in the buffer ring is occupied
    BuffersNotSubmitted,
    /// The call isn't allowed in the current mode or state
    OperationNotAllowed,
    /// The driver could not complete the operation
    Failed,
    /// A completed buffer carried hardware errors
    HwError(Events),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidDeviceNum => f.write_str("invalid SPORT device number"),
            Error::DeviceInUse => f.write_str("SPORT device already in use"),
            Error::InvalidHandle => f.write_str("invalid SPORT device handle"),
            Error::InvalidParameter => f.write_str("invalid parameter"),
            Error::BuffersNotSubmitted => f.write_str("no free buffer slot"),
            Error::OperationNotAllowed => f.write_str("operation not allowed"),
            Error::Failed => f.write_str("operation failed"),
            Error::HwError(events) => write!(f, "hardware error: {events}"),
        }
    }
}
