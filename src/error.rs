//! Error types for the load-cell driver.

use core::fmt;

/// Errors that can occur while talking to the HX711.
///
/// `NotReady`, `TimingViolation` and `InvalidData` are transient: the
/// averaging layer swallows them and retries the conversion. Only `Pin`
/// (fatal I/O), `TareUnstable` (failed startup) and `InvalidWeight`
/// (rejected calibration input) reach callers of the high-level API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// DOUT never signalled data-ready within the poll budget.
    NotReady,

    /// A clock pulse overran the 60 µs power-down threshold. The chip was
    /// resynchronized; the conversion must be retried.
    TimingViolation,

    /// The conversion word was one of the reserved out-of-range patterns.
    InvalidData,

    /// Startup taring did not settle within its attempt budget.
    TareUnstable,

    /// The reference weight handed to `calibrate_scale` was not a positive
    /// number.
    InvalidWeight,

    /// Underlying pin error.
    Pin(E),
}

// Allow ergonomic `?` propagation from raw pin errors.
impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Error::Pin(error)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotReady => write!(f, "no conversion ready within the poll budget"),
            Error::TimingViolation => write!(f, "clock pulse overran the 60 us power-down threshold"),
            Error::InvalidData => write!(f, "conversion word is a reserved out-of-range pattern"),
            Error::TareUnstable => write!(f, "startup tare did not settle"),
            Error::InvalidWeight => write!(f, "reference weight must be a positive number"),
            Error::Pin(e) => write!(f, "pin error: {:?}", e),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotReady => defmt::write!(f, "no conversion ready within the poll budget"),
            Error::TimingViolation => {
                defmt::write!(f, "clock pulse overran the 60 us power-down threshold")
            }
            Error::InvalidData => {
                defmt::write!(f, "conversion word is a reserved out-of-range pattern")
            }
            Error::TareUnstable => defmt::write!(f, "startup tare did not settle"),
            Error::InvalidWeight => defmt::write!(f, "reference weight must be a positive number"),
            Error::Pin(e) => defmt::write!(f, "pin error: {}", e),
        }
    }
}
