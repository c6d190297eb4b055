//! Register read/write protocol shared by the motion controller and gate driver.
//!
//! Both chips speak the same 40-bit SPI datagram:
//!
//! | Byte | MOSI | MISO |
//! |------|------|------|
//! | 0 | `0x80` write flag \| 7-bit address | status |
//! | 1‥4 | value, MSB first (zero on reads) | value, MSB first |
//!
//! The chip select is held low for the whole datagram and released after
//! byte 4. There are no retries: a failed byte is reported to the caller after
//! the datagram has been completed.
//!
//! Address constants live in [`tmc4671`] and [`tmc6200`].

use core::fmt;

use crate::traits::{ChipSelectLine, ChipSelectPins, Datastore, DebugSink, SpiTransport};
use crate::transport::{RegisterTransport, TransportError};

/// Number of byte exchanges in one register access.
pub const DATAGRAM_LEN: usize = 5;

/// Write flag in the address byte.
pub const WRITE_FLAG: u8 = 0x80;

/// Mask for the 7 significant address bits.
pub const ADDRESS_MASK: u8 = 0x7F;

/// TMC4671 motion controller register map (subset used by this firmware).
pub mod tmc4671 {
    /// Delta-sigma ADC input configuration.
    pub const DS_ADC_MCFG_B_MCFG_A: u8 = 0x04;
    /// Delta-sigma ADC clock A.
    pub const DS_ADC_MCLK_A: u8 = 0x05;
    /// Delta-sigma ADC clock B.
    pub const DS_ADC_MCLK_B: u8 = 0x06;
    /// Delta-sigma decimation.
    pub const DS_ADC_MDEC_B_MDEC_A: u8 = 0x07;
    /// Phase current I1 scale and offset.
    pub const ADC_I1_SCALE_OFFSET: u8 = 0x08;
    /// Phase current I0 scale and offset.
    pub const ADC_I0_SCALE_OFFSET: u8 = 0x09;
    /// Phase current channel selection.
    pub const ADC_I_SELECT: u8 = 0x0A;
    /// PWM output polarities.
    pub const PWM_POLARITIES: u8 = 0x17;
    /// PWM period in clock cycles.
    pub const PWM_MAXCNT: u8 = 0x18;
    /// Break-before-make times.
    pub const PWM_BBM_H_BBM_L: u8 = 0x19;
    /// Space-vector PWM and chopper mode.
    pub const PWM_SV_CHOP: u8 = 0x1A;
    /// Motor type and number of pole pairs.
    pub const MOTOR_TYPE_N_POLE_PAIRS: u8 = 0x1B;
    /// Digital hall sensor mode.
    pub const HALL_MODE: u8 = 0x33;
    /// Hall electrical and mechanical angle offsets.
    pub const HALL_PHI_E_PHI_M_OFFSET: u8 = 0x37;
    /// Velocity source selection.
    pub const VELOCITY_SELECTION: u8 = 0x50;
    /// Electrical angle source selection.
    pub const PHI_E_SELECTION: u8 = 0x52;
    /// Flux PI gains.
    pub const PID_FLUX_P_FLUX_I: u8 = 0x54;
    /// Torque PI gains.
    pub const PID_TORQUE_P_TORQUE_I: u8 = 0x56;
    /// Torque and flux limits.
    pub const PID_TORQUE_FLUX_LIMITS: u8 = 0x5E;
    /// Ramp and motion mode.
    pub const MODE_RAMP_MODE_MOTION: u8 = 0x63;
    /// Torque and flux target.
    pub const PID_TORQUE_FLUX_TARGET: u8 = 0x64;
}

/// TMC6200 gate driver register map.
pub mod tmc6200 {
    /// General configuration.
    pub const GCONF: u8 = 0x00;
    /// Global status flags.
    pub const GSTAT: u8 = 0x01;
    /// Short detection configuration.
    pub const SHORT_CONF: u8 = 0x09;
    /// Gate drive configuration.
    pub const DRV_CONF: u8 = 0x0A;
}

/// SPI device that exposes a register file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Chip {
    /// TMC4671 motion controller.
    MotionController,
    /// TMC6200 gate driver.
    GateDriver,
}

impl Chip {
    /// Chip-select line the device sits on.
    pub const fn chip_select(&self) -> ChipSelectLine {
        match self {
            Chip::MotionController => ChipSelectLine::MotionController,
            Chip::GateDriver => ChipSelectLine::GateDriver,
        }
    }

    /// Maps a chip-select line back to its register device.
    pub const fn from_chip_select(line: ChipSelectLine) -> Option<Chip> {
        match line {
            ChipSelectLine::MotionController => Some(Chip::MotionController),
            ChipSelectLine::GateDriver => Some(Chip::GateDriver),
            ChipSelectLine::DriverEeprom1 | ChipSelectLine::DriverEeprom2 => None,
        }
    }

    /// Part number.
    pub const fn part(&self) -> &'static str {
        match self {
            Chip::MotionController => "TMC4671",
            Chip::GateDriver => "TMC6200",
        }
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.part())
    }
}

/// Builds the MOSI bytes of one register access.
///
/// # Example
///
/// ```rust
/// use rs_motorboard::registers::datagram;
///
/// assert_eq!(datagram(0x1B, 0x0003_0004, true), [0x9B, 0x00, 0x03, 0x00, 0x04]);
/// assert_eq!(datagram(0x1B, 0, false), [0x1B, 0, 0, 0, 0]);
/// ```
pub const fn datagram(address: u8, value: u32, write: bool) -> [u8; DATAGRAM_LEN] {
    let header = if write {
        (address & ADDRESS_MASK) | WRITE_FLAG
    } else {
        address & ADDRESS_MASK
    };
    let v = value.to_be_bytes();
    [header, v[0], v[1], v[2], v[3]]
}

/// Extracts the register value from the MISO bytes of one access.
pub const fn datagram_value(response: &[u8; DATAGRAM_LEN]) -> u32 {
    u32::from_be_bytes([response[1], response[2], response[3], response[4]])
}

/// Register-level access to the board's SPI devices.
///
/// Implemented by [`RegisterTransport`] and by
/// [`SharedRegisterBus`](crate::shared::SharedRegisterBus), which adds a
/// critical section around each access.
pub trait RegisterAccess {
    /// Writes `value` to `address` on `chip`.
    fn write_register(&mut self, chip: Chip, address: u8, value: u32)
        -> Result<(), TransportError>;

    /// Reads the register at `address` on `chip`.
    fn read_register(&mut self, chip: Chip, address: u8) -> Result<u32, TransportError>;

    /// Drives every chip select to idle-high.
    fn release_chip_selects(&mut self) -> Result<(), TransportError>;
}

impl<R: RegisterAccess + ?Sized> RegisterAccess for &mut R {
    fn write_register(
        &mut self,
        chip: Chip,
        address: u8,
        value: u32,
    ) -> Result<(), TransportError> {
        (**self).write_register(chip, address, value)
    }

    fn read_register(&mut self, chip: Chip, address: u8) -> Result<u32, TransportError> {
        (**self).read_register(chip, address)
    }

    fn release_chip_selects(&mut self) -> Result<(), TransportError> {
        (**self).release_chip_selects()
    }
}

impl<S, C, D, K> RegisterTransport<S, C, D, K>
where
    S: SpiTransport,
    C: ChipSelectPins,
    D: Datastore,
    K: DebugSink,
{
    /// Clocks one complete datagram, returning the MISO bytes or the first
    /// failure. All bytes are sent even after a failure.
    fn datagram_exchange(
        &mut self,
        chip: Chip,
        mosi: [u8; DATAGRAM_LEN],
    ) -> Result<[u8; DATAGRAM_LEN], TransportError> {
        let line = chip.chip_select();
        let mut miso = [0u8; DATAGRAM_LEN];
        let mut first_error = None;

        for (i, out) in mosi.into_iter().enumerate() {
            match self.transfer_byte(line, out, i == DATAGRAM_LEN - 1) {
                Ok(byte) => miso[i] = byte,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(miso),
        }
    }
}

impl<S, C, D, K> RegisterAccess for RegisterTransport<S, C, D, K>
where
    S: SpiTransport,
    C: ChipSelectPins,
    D: Datastore,
    K: DebugSink,
{
    fn write_register(
        &mut self,
        chip: Chip,
        address: u8,
        value: u32,
    ) -> Result<(), TransportError> {
        self.datagram_exchange(chip, datagram(address, value, true))
            .map(|_| ())
    }

    fn read_register(&mut self, chip: Chip, address: u8) -> Result<u32, TransportError> {
        self.datagram_exchange(chip, datagram(address, 0, false))
            .map(|miso| datagram_value(&miso))
    }

    fn release_chip_selects(&mut self) -> Result<(), TransportError> {
        self.release_all()
    }
}


#[cfg(all(test, feature = "std"))]
mod transport_tests {
    use super::*;
    use crate::hal::{MockBoard, MockDatastore, MockDebugSink};

    #[test]
    fn write_then_read_round_trips() {
        let board = MockBoard::new();
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);

        bus.write_register(Chip::GateDriver, tmc6200::SHORT_CONF, 0x1301_0606)
            .unwrap();
        assert_eq!(
            bus.read_register(Chip::GateDriver, tmc6200::SHORT_CONF),
            Ok(0x1301_0606)
        );
        assert_eq!(board.register(Chip::GateDriver, tmc6200::SHORT_CONF), Some(0x1301_0606));
        assert_eq!(board.register(Chip::MotionController, tmc6200::SHORT_CONF), None);
    }

    #[test]
    fn failed_byte_still_completes_datagram() {
        let board = MockBoard::new();
        board.fail_exchange(2, TransportError::BusBusy);
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);

        let result = bus.write_register(Chip::MotionController, tmc4671::PWM_MAXCNT, 0xF9F);

        assert_eq!(result, Err(TransportError::BusBusy));
        assert_eq!(board.exchange_count(), DATAGRAM_LEN);
        assert_eq!(board.deselect_count(ChipSelectLine::MotionController), 1);
        assert_eq!(datastore.spi_fault_sets(), 1);
        // A partial write must not reach the register file.
        assert_eq!(board.register(Chip::MotionController, tmc4671::PWM_MAXCNT), None);
    }
}
