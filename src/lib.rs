//! Platform-agnostic driver for the HX711 24-bit load-cell ADC.
//!
//! The HX711 speaks a two-wire protocol with no framing beyond pulse counts:
//! a serial clock output (PD_SCK) and a data input (DOUT). When DOUT drops
//! low a conversion is ready; 24 clock pulses shift it out MSB-first, and
//! 1–3 extra pulses select gain and input channel for the *next* conversion.
//! Holding the clock high for 60 µs or longer puts the chip into power-down,
//! so every pulse is measured against that budget and an overrun triggers a
//! full power-up replay before the read is retried.
//!
//! # Architecture
//!
//! - [`GainChannel`] — the three gain/channel configurations and their pulse
//!   counts.
//! - [`Monotonic`] — microsecond-counter seam used to time clock pulses
//!   (`embedded-hal` has no trait for this).
//! - [`Hx711`] — the driver: readiness polling, bit transfer, sample
//!   averaging, and tare/scale calibration.
//!
//! # Quick start
//!
//! ```no_run
//! # fn example<IN, OUT, D, M, E>(dout: IN, pd_sck: OUT, delay: D, ticks: M)
//! # -> Result<(), load_cell::Error<E>>
//! # where
//! #     IN: embedded_hal::digital::InputPin<Error = E>,
//! #     OUT: embedded_hal::digital::OutputPin<Error = E>,
//! #     D: embedded_hal::delay::DelayNs,
//! #     M: load_cell::Monotonic,
//! # {
//! use load_cell::Hx711;
//!
//! // `dout` and `pd_sck` are any `embedded-hal` pins, `delay` any
//! // `DelayNs`, `ticks` a microsecond counter for the target.
//! let mut scale = Hx711::new(dout, pd_sck, delay, ticks)?;
//! scale.init()?;
//!
//! let grams = scale.read()?;
//! # let _ = grams;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **`defmt`** — `defmt::Format` on error types plus diagnostic logging of
//!   pulse-budget overruns.

#![no_std]

pub use driver::{Hx711, DEFAULT_SCALE};
pub use error::Error;
pub use gain::GainChannel;
pub use monotonic::Monotonic;

mod driver;
mod error;
mod gain;
mod monotonic;
