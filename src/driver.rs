//! The driver itself: readiness polling, 24-bit transfer, averaging and
//! calibration.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::Error;
use crate::gain::GainChannel;
use crate::monotonic::Monotonic;

/// Raw counts per physical unit before any calibration has run.
pub const DEFAULT_SCALE: f32 = 35.0;

/// PD_SCK held high at least this long sends the chip into power-down.
const POWER_DOWN_US: u64 = 60;

/// Readiness polls before a read attempt gives up.
const READY_POLL_ATTEMPTS: u32 = 9_999;

/// Pause between readiness polls.
const READY_POLL_INTERVAL_MS: u32 = 1;

/// Data bits per conversion.
const SAMPLE_BITS: u32 = 24;

/// Pulses replayed on top of the gain selection to bring the chip out of
/// power-down.
const RESET_PULSES: u32 = 24;

/// Power-up replays attempted before a resync is abandoned.
const RESYNC_ATTEMPTS: u32 = 10;

/// Samples averaged by [`Hx711::tare`].
const TARE_SAMPLES: u32 = 10;

/// Samples averaged by [`Hx711::calibrate_scale`].
const CALIBRATION_SAMPLES: u32 = 5;

/// Tare rounds attempted by [`Hx711::init`] before giving up.
const TARE_ROUNDS: u32 = 10;

/// A post-tare reading with magnitude below this counts as settled.
const TARE_TOLERANCE: f32 = 0.5;

/// Settling pause after every conversion.
const SETTLE_MS: u32 = 1;

// Reserved conversion words the chip emits when the input is out of range.
const OUT_OF_RANGE_HIGH: u32 = 0x7F_FFFF;
const OUT_OF_RANGE_LOW: u32 = 0x80_0000;

/// Driver for the HX711 load-cell ADC.
///
/// Owns the two protocol lines (DOUT in, PD_SCK out), a millisecond delay
/// and a microsecond counter, plus the calibration state: tare offset,
/// scale factor and the last calibrated reading.
///
/// Offset and scale are only ever changed by [`tare`](Self::tare),
/// [`calibrate_scale`](Self::calibrate_scale) and their explicit setters;
/// every read is otherwise a pure function of device state and the current
/// calibration.
pub struct Hx711<IN, OUT, D, M> {
    dout: IN,
    pd_sck: OUT,
    delay: D,
    ticks: M,
    gain: GainChannel,
    offset: f32,
    scale: f32,
    latest: Option<f32>,
}

impl<IN, OUT, D, M, E> Hx711<IN, OUT, D, M>
where
    IN: InputPin<Error = E>,
    OUT: OutputPin<Error = E>,
    D: DelayNs,
    M: Monotonic,
{
    /// Create a driver with the clock driven to its idle (low) level.
    ///
    /// Starts with gain 128 on channel A, zero offset and the
    /// [`DEFAULT_SCALE`]. Call [`init`](Self::init) to run the startup
    /// tare before taking readings.
    pub fn new(dout: IN, mut pd_sck: OUT, delay: D, ticks: M) -> Result<Self, Error<E>> {
        pd_sck.set_low()?;
        Ok(Self {
            dout,
            pd_sck,
            delay,
            ticks,
            gain: GainChannel::default(),
            offset: 0.0,
            scale: DEFAULT_SCALE,
            latest: None,
        })
    }

    /// Replace the default scale factor before `init`.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Select a non-default gain/channel before `init`.
    pub fn with_gain(mut self, gain: GainChannel) -> Self {
        self.gain = gain;
        self
    }

    /// Bring the scale to its ready state.
    ///
    /// Replays the power-up configuration sequence when a non-default
    /// gain/channel was requested, then tares repeatedly until a fresh
    /// reading settles below half a unit. Gives up with
    /// [`Error::TareUnstable`] after a bounded number of rounds instead of
    /// spinning forever on a drifting sensor.
    pub fn init(&mut self) -> Result<(), Error<E>> {
        if self.gain != GainChannel::default() {
            self.resync()?;
        }
        for _ in 0..TARE_ROUNDS {
            self.tare()?;
            let reading = self.read()?;
            if -TARE_TOLERANCE < reading && reading < TARE_TOLERANCE {
                return Ok(());
            }
        }
        Err(Error::TareUnstable)
    }

    // -----------------------------------------------------------------------
    // Bit-transfer protocol
    // -----------------------------------------------------------------------

    /// Read one raw conversion.
    ///
    /// Waits for DOUT to drop low, shifts the 24-bit word out MSB-first,
    /// appends the gain-selection pulses for the next conversion and decodes
    /// two's complement.
    ///
    /// # Errors
    /// * [`Error::NotReady`] — no conversion within the poll budget
    /// * [`Error::TimingViolation`] — a pulse overran 60 µs; the chip has
    ///   been resynchronized and the caller should retry
    /// * [`Error::InvalidData`] — the word was a reserved clamp pattern
    /// * [`Error::Pin`] — fatal pin I/O
    pub fn read_raw(&mut self) -> Result<i32, Error<E>> {
        self.pd_sck.set_low()?;
        self.wait_ready()?;

        let mut pattern: u32 = 0;
        for _ in 0..SAMPLE_BITS {
            let bit = self.timed_pulse()?;
            pattern = (pattern << 1) | u32::from(bit);
        }

        // The pulse count appended here latches gain/channel for the next
        // conversion; there is no separate configuration register.
        for _ in 0..self.gain.extra_pulses() {
            self.timed_pulse()?;
        }

        self.delay.delay_ms(SETTLE_MS);

        if pattern == OUT_OF_RANGE_HIGH || pattern == OUT_OF_RANGE_LOW {
            return Err(Error::InvalidData);
        }
        Ok(decode_sample(pattern))
    }

    /// Poll DOUT until the chip signals a conversion is ready.
    fn wait_ready(&mut self) -> Result<(), Error<E>> {
        for _ in 0..READY_POLL_ATTEMPTS {
            if self.dout.is_low()? {
                return Ok(());
            }
            self.delay.delay_ms(READY_POLL_INTERVAL_MS);
        }
        Err(Error::NotReady)
    }

    /// One PD_SCK pulse. Returns the DOUT level sampled while the clock was
    /// high, and the measured pulse width in microseconds.
    fn pulse(&mut self) -> Result<(bool, u64), Error<E>> {
        let started = self.ticks.now_us();
        self.pd_sck.set_high()?;
        let bit = self.dout.is_high()?;
        self.pd_sck.set_low()?;
        let width = self.ticks.now_us().wrapping_sub(started);
        Ok((bit, width))
    }

    /// Pulse with the power-down budget enforced.
    ///
    /// An overrun means the chip has already gone to sleep mid-transfer, so
    /// the power-up sequence is replayed before the attempt is reported as
    /// failed.
    fn timed_pulse(&mut self) -> Result<bool, Error<E>> {
        let (bit, width) = self.pulse()?;
        if width >= POWER_DOWN_US {
            #[cfg(feature = "defmt")]
            defmt::warn!("pulse held for {} us, chip assumed powered down", width);
            self.resync()?;
            return Err(Error::TimingViolation);
        }
        Ok(bit)
    }

    /// Bring a powered-down chip back to a known state.
    ///
    /// Bounded retry loop around the power-up replay; once the attempts are
    /// exhausted the violation surfaces instead of retrying forever.
    fn resync(&mut self) -> Result<(), Error<E>> {
        for _ in 0..RESYNC_ATTEMPTS {
            match self.power_up_replay() {
                Ok(()) => return Ok(()),
                Err(Error::TimingViolation) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("power-up replay overran the pulse budget, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::TimingViolation)
    }

    /// One replay of the power-up sequence: the chip must signal ready,
    /// then sees the reset pulses plus the gain selection. Every pulse is
    /// held to the same 60 µs budget.
    fn power_up_replay(&mut self) -> Result<(), Error<E>> {
        self.wait_ready()?;
        for _ in 0..RESET_PULSES + self.gain.extra_pulses() {
            let (_, width) = self.pulse()?;
            if width >= POWER_DOWN_US {
                return Err(Error::TimingViolation);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sampling & averaging
    // -----------------------------------------------------------------------

    /// Arithmetic mean of `count` successful raw conversions.
    ///
    /// Transient failures (`NotReady`, `TimingViolation`, `InvalidData`)
    /// are discarded and the conversion retried until `count` samples have
    /// landed; the chip is assumed to eventually respond. Callers needing
    /// bounded latency must impose their own deadline. `count` below 1 is
    /// treated as 1.
    pub fn read_raw_average(&mut self, count: u32) -> Result<f32, Error<E>> {
        let count = count.max(1);
        let mut sum: i64 = 0;
        let mut taken = 0u32;
        while taken < count {
            match self.read_raw() {
                Ok(sample) => {
                    sum += i64::from(sample);
                    taken += 1;
                }
                Err(Error::Pin(e)) => return Err(Error::Pin(e)),
                Err(_transient) => {
                    #[cfg(feature = "defmt")]
                    defmt::trace!("discarding failed conversion");
                }
            }
        }
        Ok(sum as f32 / count as f32)
    }

    /// Calibrated mean of `count` conversions. Updates the cached latest
    /// reading.
    pub fn read_average(&mut self, count: u32) -> Result<f32, Error<E>> {
        let raw = self.read_raw_average(count)?;
        let value = self.normalize(raw);
        self.latest = Some(value);
        Ok(value)
    }

    /// Single calibrated reading, shorthand for `read_average(1)`.
    pub fn read(&mut self) -> Result<f32, Error<E>> {
        self.read_average(1)
    }

    // -----------------------------------------------------------------------
    // Calibration
    // -----------------------------------------------------------------------

    /// Zero the scale: capture the current load as the new offset.
    ///
    /// Blocks until ten raw samples have been averaged.
    pub fn tare(&mut self) -> Result<(), Error<E>> {
        let avg = self.read_raw_average(TARE_SAMPLES)?;
        self.offset = -avg;
        Ok(())
    }

    /// Derive the scale factor from a known reference weight currently on
    /// the sensor. Returns the new scale.
    ///
    /// The weight must be a positive number; zero, negatives and NaN are
    /// rejected with [`Error::InvalidWeight`] before the device is touched.
    pub fn calibrate_scale(&mut self, known_weight: f32) -> Result<f32, Error<E>> {
        if !(known_weight > 0.0) {
            return Err(Error::InvalidWeight);
        }
        let avg = self.read_raw_average(CALIBRATION_SAMPLES)?;
        self.scale = (avg + self.offset) / known_weight;
        Ok(self.scale)
    }

    /// Apply the current calibration to a raw value: `(raw + offset) / scale`.
    pub fn normalize(&self, raw: f32) -> f32 {
        (raw + self.offset) / self.scale
    }

    // -----------------------------------------------------------------------
    // Configuration & power management
    // -----------------------------------------------------------------------

    /// Switch gain/channel.
    ///
    /// Takes effect by replaying the full power-up sequence, so the next
    /// conversion already uses the new configuration.
    pub fn set_gain_channel(&mut self, gain: GainChannel) -> Result<(), Error<E>> {
        self.gain = gain;
        self.resync()
    }

    /// Put the chip to sleep by parking the clock high.
    pub fn power_down(&mut self) -> Result<(), Error<E>> {
        self.pd_sck.set_high()?;
        Ok(())
    }

    /// Wake the chip. It resets itself to channel A gain 128 on wake, so a
    /// non-default configuration is replayed before returning.
    pub fn power_up(&mut self) -> Result<(), Error<E>> {
        self.pd_sck.set_low()?;
        if self.gain != GainChannel::default() {
            self.resync()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Current gain/channel configuration.
    pub fn gain_channel(&self) -> GainChannel {
        self.gain
    }

    /// Raw-sample value corresponding to zero load.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: f32) {
        self.offset = offset;
    }

    /// Raw counts per physical unit.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    /// Last calibrated reading computed by any read, `None` before the
    /// first successful one.
    pub fn latest_reading(&self) -> Option<f32> {
        self.latest
    }

    /// Release the two protocol lines.
    pub fn release(self) -> (IN, OUT) {
        (self.dout, self.pd_sck)
    }
}

/// Sign-extend a 24-bit two's-complement conversion word.
fn decode_sample(pattern: u32) -> i32 {
    if pattern & 0x80_0000 != 0 {
        (pattern | 0xFF00_0000) as i32
    } else {
        pattern as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_decoding() {
        assert_eq!(decode_sample(0x000000), 0);
        assert_eq!(decode_sample(0x000001), 1);
        assert_eq!(decode_sample(0x000002), 2);
        assert_eq!(decode_sample(0x7FFFFE), 8_388_606);
        assert_eq!(decode_sample(0x800001), -8_388_607);
        assert_eq!(decode_sample(0xFFFFFF), -1);
        assert_eq!(decode_sample(0xFFFFFE), -2);
    }

    #[test]
    fn decoded_samples_stay_in_24_bit_range() {
        for pattern in [0u32, 1, 0x12_3456, 0x7F_FFFE, 0x80_0001, 0xAB_CDEF, 0xFF_FFFF] {
            let value = decode_sample(pattern);
            assert!((-(1 << 23)..(1 << 23)).contains(&value));
        }
    }
}
