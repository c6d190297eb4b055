//! ESP32 hardware abstraction layer for the motor controller board.
//!
//! This module wires the ESP-IDF SPI master, GPIO and TWAI drivers into the
//! crate's hardware traits through the `embedded-hal` adapters in
//! [`crate::hal::embedded`].
//!
//! # Hardware Configuration
//!
//! - **MCU**: ESP32-C3 (RISC-V 160MHz)
//! - **Motion controller**: TMC4671 on SPI2, mode 3
//! - **Gate driver**: TMC6200 on the same bus
//! - **CAN**: TWAI controller with an external transceiver, 500 kbit/s
//!
//! # Pin Assignments
//!
//! See the [`pins`] module.

mod can;

pub use can::Esp32Can;

use esp_idf_hal::gpio::{AnyOutputPin, Output, OutputPin, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::prelude::*;
use esp_idf_hal::spi::{config::Config as SpiConfig, SpiBusDriver, SpiDriver, SpiDriverConfig};

use crate::hal::embedded::{EhChipSelects, EhEnablePin, EhSpiTransport};

/// Pin assignments on the ESP32-C3 board.
pub mod pins {
    // =========================================================================
    // SPI bus (TMC4671 + TMC6200)
    // =========================================================================

    /// SPI clock
    pub const SPI_SCLK: i32 = 6;

    /// SPI MOSI (SDI on the TMC parts)
    pub const SPI_MOSI: i32 = 7;

    /// SPI MISO (SDO on the TMC parts)
    pub const SPI_MISO: i32 = 2;

    /// TMC4671 chip select (active low)
    pub const CS_MOTION_CONTROLLER: i32 = 10;

    /// TMC6200 chip select (active low)
    pub const CS_GATE_DRIVER: i32 = 3;

    /// TMC6200 DRV_EN
    pub const DRIVER_ENABLE: i32 = 4;

    // =========================================================================
    // CAN (TWAI)
    // =========================================================================

    /// TWAI TX to transceiver
    pub const CAN_TX: i32 = 5;

    /// TWAI RX from transceiver
    pub const CAN_RX: i32 = 1;
}

/// SPI clock for the TMC parts.
const SPI_BAUDRATE_MHZ: u32 = 1;

/// GPIO output used for chip selects and the enable line.
pub type Esp32Output = PinDriver<'static, AnyOutputPin, Output>;

/// SPI byte transport over the ESP-IDF bus driver.
pub type Esp32Spi = EhSpiTransport<SpiBusDriver<'static, SpiDriver<'static>>>;

/// Chip selects of the board.
pub type Esp32ChipSelects = EhChipSelects<Esp32Output>;

/// Gate driver enable.
pub type Esp32EnablePin = EhEnablePin<Esp32Output>;

/// Every peripheral the motor control core needs.
pub struct Esp32Board {
    /// SPI byte exchange
    pub spi: Esp32Spi,
    /// Chip-select outputs, idle-high
    pub chip_selects: Esp32ChipSelects,
    /// Gate driver enable, low
    pub enable: Esp32EnablePin,
    /// CAN receive path
    pub can: Esp32Can<'static>,
}

impl Esp32Board {
    /// Claims the board peripherals.
    ///
    /// # Errors
    ///
    /// Returns an error if any ESP-IDF driver fails to install.
    pub fn new(peripherals: Peripherals) -> anyhow::Result<Self> {
        let pins = peripherals.pins;

        let driver = SpiDriver::new(
            peripherals.spi2,
            pins.gpio6,
            pins.gpio7,
            Some(pins.gpio2),
            &SpiDriverConfig::new(),
        )?;
        let bus_config = SpiConfig::new()
            .baudrate(SPI_BAUDRATE_MHZ.MHz().into())
            .data_mode(embedded_hal::spi::MODE_3);
        let spi = EhSpiTransport::new(SpiBusDriver::new(driver, &bus_config)?);

        let mut cs_motion_controller = PinDriver::output(pins.gpio10.downgrade_output())?;
        let mut cs_gate_driver = PinDriver::output(pins.gpio3.downgrade_output())?;
        cs_motion_controller.set_high()?;
        cs_gate_driver.set_high()?;
        let chip_selects = EhChipSelects::new(cs_motion_controller, cs_gate_driver);

        let mut drv_enable = PinDriver::output(pins.gpio4.downgrade_output())?;
        drv_enable.set_low()?;
        let enable = EhEnablePin::new(drv_enable);

        let can = Esp32Can::new(peripherals.can, pins.gpio5, pins.gpio1)?;

        Ok(Self {
            spi,
            chip_selects,
            enable,
            can,
        })
    }
}
