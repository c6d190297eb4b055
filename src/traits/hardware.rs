//! Hardware abstraction traits for the SPI bus, chip selects and CAN receive path.
//!
//! This module defines the board-level interfaces that allow rs-motorboard to
//! run on the real controller board and on a desktop host with mocks.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`SpiTransport`] | One full-duplex byte exchange with a timeout |
//! | [`ChipSelectPins`] | Drives the active-low select line of each SPI device |
//! | [`EnablePin`] | Gate driver enable output |
//! | [`CanReceiver`] | Non-blocking source of received CAN frames |
//! | [`Clock`] | Millisecond time source for `no_std` environments |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. Any `embedded-hal` 1.0 bus can be plugged in
//! through `hal::embedded` (requires the `embedded-hal` feature).
//!
//! # Example
//!
//! ```rust
//! use rs_motorboard::traits::{ChipSelectLine, ChipSelectPins, PinLevel, SpiTransport};
//! use rs_motorboard::hal::MockBoard;
//!
//! let board = MockBoard::new();
//! let mut spi = board.spi();
//! let mut cs = board.chip_selects();
//!
//! cs.set_level(ChipSelectLine::GateDriver, PinLevel::Low).unwrap();
//! let _status = spi.exchange_byte(0x00, 50).unwrap();
//! cs.set_level(ChipSelectLine::GateDriver, PinLevel::High).unwrap();
//!
//! assert_eq!(board.cs_level(ChipSelectLine::GateDriver), PinLevel::High);
//! ```

use core::fmt;

use crate::can::CanFrame;

/// Logic level of a digital output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PinLevel {
    /// Driven low. Asserts an active-low chip select.
    Low,
    /// Driven high. Chip selects idle here.
    #[default]
    High,
}

/// GPIO port letter of a microcontroller pin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Port {
    /// Port A
    A,
    /// Port B
    B,
    /// Port C
    C,
}

impl Port {
    /// Returns the port letter.
    pub const fn letter(&self) -> char {
        match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
        }
    }
}

/// A physical `(port, pin)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpioPin {
    /// GPIO port
    pub port: Port,
    /// Pin number within the port
    pub pin: u8,
}

impl GpioPin {
    /// Creates a pin reference.
    pub const fn new(port: Port, pin: u8) -> Self {
        Self { port, pin }
    }
}

impl fmt::Display for GpioPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}{}", self.port.letter(), self.pin)
    }
}

/// Driver enable output (PA9 on the reference board).
pub const DRIVER_ENABLE_PIN: GpioPin = GpioPin::new(Port::A, 9);

/// Chip-select line of one SPI device on the shared bus.
///
/// Lines are active-low. At most one line is asserted at any time and it
/// returns to idle-high between register transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChipSelectLine {
    /// TMC4671 field-oriented motion controller.
    MotionController,
    /// TMC6200 gate driver.
    GateDriver,
    /// First configuration EEPROM next to the driver.
    DriverEeprom1,
    /// Second configuration EEPROM next to the driver.
    DriverEeprom2,
}

impl ChipSelectLine {
    /// Every line, in the order they are released at start-up.
    pub const ALL: [ChipSelectLine; 4] = [
        ChipSelectLine::MotionController,
        ChipSelectLine::GateDriver,
        ChipSelectLine::DriverEeprom1,
        ChipSelectLine::DriverEeprom2,
    ];

    /// Physical pin on the reference board.
    ///
    /// The EEPROM selects are not routed on the current board revision and
    /// return `None`.
    pub const fn default_pin(&self) -> Option<GpioPin> {
        match self {
            ChipSelectLine::MotionController => Some(GpioPin::new(Port::B, 6)),
            ChipSelectLine::GateDriver => Some(GpioPin::new(Port::C, 7)),
            ChipSelectLine::DriverEeprom1 | ChipSelectLine::DriverEeprom2 => None,
        }
    }

    /// Index into per-line tables (0..4).
    pub const fn index(&self) -> usize {
        match self {
            ChipSelectLine::MotionController => 0,
            ChipSelectLine::GateDriver => 1,
            ChipSelectLine::DriverEeprom1 => 2,
            ChipSelectLine::DriverEeprom2 => 3,
        }
    }

    /// Returns a short human-readable name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChipSelectLine::MotionController => "motion-controller",
            ChipSelectLine::GateDriver => "gate-driver",
            ChipSelectLine::DriverEeprom1 => "driver-eeprom-1",
            ChipSelectLine::DriverEeprom2 => "driver-eeprom-2",
        }
    }
}

impl fmt::Display for ChipSelectLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.default_pin() {
            Some(pin) => write!(f, "{} ({})", self.as_str(), pin),
            None => f.write_str(self.as_str()),
        }
    }
}

/// Failure of a single SPI byte exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// The peripheral did not complete the exchange within the timeout.
    Timeout,
    /// The peripheral was still busy with a previous transfer.
    BusBusy,
    /// Any other peripheral-reported failure.
    Bus,
}

impl TransportError {
    /// Returns the error as a short string, as printed in diagnostics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransportError::Timeout => "Timeout",
            TransportError::BusBusy => "Busy",
            TransportError::Bus => "Error",
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

/// Full-duplex SPI byte exchange.
///
/// Implementations clock `out` onto MOSI and return the byte shifted in on
/// MISO during the same eight clocks. Chip selects are *not* touched here;
/// see [`ChipSelectPins`].
pub trait SpiTransport {
    /// Exchanges one byte, giving up after `timeout_ms`.
    fn exchange_byte(&mut self, out: u8, timeout_ms: u32) -> Result<u8, TransportError>;
}

/// Active-low chip-select outputs for every device on the bus.
///
/// A GPIO write that fails is reported as [`TransportError::Bus`] so the
/// transport treats it like any other bus failure.
pub trait ChipSelectPins {
    /// Drives `line` to `level`.
    fn set_level(&mut self, line: ChipSelectLine, level: PinLevel) -> Result<(), TransportError>;

    /// Drives `line` low.
    fn assert(&mut self, line: ChipSelectLine) -> Result<(), TransportError> {
        self.set_level(line, PinLevel::Low)
    }

    /// Drives `line` back to idle-high.
    fn deassert(&mut self, line: ChipSelectLine) -> Result<(), TransportError> {
        self.set_level(line, PinLevel::High)
    }
}

/// Gate driver enable output.
///
/// Held low while the chips are being configured and raised once the
/// configuration has been verified.
pub trait EnablePin {
    /// Enables (`true`) or disables (`false`) the power stage.
    fn set_enabled(&mut self, enabled: bool) -> Result<(), TransportError>;
}

/// Source of received CAN frames.
pub trait CanReceiver {
    /// Returns the next pending frame, if any. Never blocks.
    fn try_receive(&mut self) -> Option<CanFrame>;
}

/// Time source trait for `no_std` compatibility.
///
/// Provides a monotonic millisecond counter. On desktop, this typically wraps
/// `std::time::Instant`. On embedded, it wraps a hardware timer.
///
/// # Example
///
/// ```rust
/// use rs_motorboard::traits::Clock;
/// use rs_motorboard::hal::MockClock;
///
/// let mut clock = MockClock::new();
/// clock.advance(250);
/// assert_eq!(clock.now_ms(), 250);
/// ```
pub trait Clock {
    /// Returns the current time in milliseconds.
    ///
    /// Should be monotonically increasing. Overflow behavior is implementation-defined.
    fn now_ms(&self) -> u64;
}
