//! Adapters from `embedded-hal` 1.0 traits.
//!
//! Plug any HAL's SPI bus and output pins into
//! [`RegisterTransport`](crate::transport::RegisterTransport):
//!
//! ```ignore
//! use rs_motorboard::hal::embedded::{EhChipSelects, EhEnablePin, EhSpiTransport};
//!
//! let spi = EhSpiTransport::new(spi_bus);
//! let cs = EhChipSelects::new(cs_motion_controller, cs_gate_driver);
//! let enable = EhEnablePin::new(drv_enable);
//! ```

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Error as _, ErrorKind, SpiBus};

use crate::traits::{ChipSelectLine, ChipSelectPins, EnablePin, PinLevel, SpiTransport, TransportError};

/// Maps an `embedded-hal` SPI error to the transport taxonomy.
pub fn transport_error(kind: ErrorKind) -> TransportError {
    match kind {
        ErrorKind::Overrun => TransportError::BusBusy,
        _ => TransportError::Bus,
    }
}

/// Byte exchange over an `embedded-hal` [`SpiBus`].
///
/// `embedded-hal` has no per-call timeout; the bus driver's own timeout
/// applies and surfaces as [`TransportError::Bus`].
#[derive(Debug)]
pub struct EhSpiTransport<B> {
    bus: B,
}

impl<B: SpiBus<u8>> EhSpiTransport<B> {
    /// Wraps a configured SPI bus (mode 3 for the TMC parts).
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Gives back the bus.
    pub fn into_inner(self) -> B {
        self.bus
    }
}

impl<B: SpiBus<u8>> SpiTransport for EhSpiTransport<B> {
    fn exchange_byte(&mut self, out: u8, _timeout_ms: u32) -> Result<u8, TransportError> {
        let mut word = [out];
        self.bus
            .transfer_in_place(&mut word)
            .map_err(|e| transport_error(e.kind()))?;
        self.bus.flush().map_err(|e| transport_error(e.kind()))?;
        Ok(word[0])
    }
}

/// Chip-select outputs built from `embedded-hal` pins.
///
/// The EEPROM selects are optional since they are not routed on every board.
#[derive(Debug)]
pub struct EhChipSelects<P> {
    motion_controller: P,
    gate_driver: P,
    eeprom: [Option<P>; 2],
}

impl<P: OutputPin> EhChipSelects<P> {
    /// Chip selects for the two register devices.
    pub fn new(motion_controller: P, gate_driver: P) -> Self {
        Self {
            motion_controller,
            gate_driver,
            eeprom: [None, None],
        }
    }

    /// Adds the EEPROM selects.
    pub fn with_eeproms(mut self, eeprom_1: P, eeprom_2: P) -> Self {
        self.eeprom = [Some(eeprom_1), Some(eeprom_2)];
        self
    }

    fn pin(&mut self, line: ChipSelectLine) -> Option<&mut P> {
        match line {
            ChipSelectLine::MotionController => Some(&mut self.motion_controller),
            ChipSelectLine::GateDriver => Some(&mut self.gate_driver),
            ChipSelectLine::DriverEeprom1 => self.eeprom[0].as_mut(),
            ChipSelectLine::DriverEeprom2 => self.eeprom[1].as_mut(),
        }
    }
}

impl<P: OutputPin> ChipSelectPins for EhChipSelects<P> {
    fn set_level(&mut self, line: ChipSelectLine, level: PinLevel) -> Result<(), TransportError> {
        let Some(pin) = self.pin(line) else {
            return Ok(());
        };
        match level {
            PinLevel::Low => pin.set_low(),
            PinLevel::High => pin.set_high(),
        }
        .map_err(|_| TransportError::Bus)
    }
}

/// Enable output built from an `embedded-hal` pin (active high).
#[derive(Debug)]
pub struct EhEnablePin<P> {
    pin: P,
}

impl<P: OutputPin> EhEnablePin<P> {
    /// Wraps the driver enable pin.
    pub fn new(pin: P) -> Self {
        Self { pin }
    }
}

impl<P: OutputPin> EnablePin for EhEnablePin<P> {
    fn set_enabled(&mut self, enabled: bool) -> Result<(), TransportError> {
        if enabled {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
        .map_err(|_| TransportError::Bus)
    }
}
