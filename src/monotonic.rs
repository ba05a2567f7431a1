//! Microsecond-counter seam used to measure clock pulse widths.

/// A free-running monotonic microsecond counter.
///
/// `embedded-hal` provides delays but no way to *read* elapsed time, and the
/// HX711 drops into power-down whenever its clock line stays high for 60 µs,
/// so the driver needs to measure every pulse. Implementations wrap whatever
/// hardware timer the target provides; only differences between two returned
/// values are meaningful.
pub trait Monotonic {
    /// Current counter value in microseconds.
    fn now_us(&mut self) -> u64;
}
