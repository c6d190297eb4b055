//! TWAI (CAN) receive path on the ESP32.

use esp_idf_hal::can::{config::Config, config::Timing, CanDriver};
use esp_idf_hal::gpio::{InputPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;

use crate::can::CanFrame;
use crate::traits::CanReceiver;

/// CAN receiver on the ESP32 TWAI controller at 500 kbit/s.
///
/// Extended-id and oversized frames are dropped before dispatch.
///
/// # Example
///
/// ```ignore
/// use rs_motorboard::hal::esp32::Esp32Can;
/// use rs_motorboard::traits::CanReceiver;
///
/// let peripherals = Peripherals::take()?;
/// let mut can = Esp32Can::new(peripherals.can, peripherals.pins.gpio5, peripherals.pins.gpio1)?;
/// while let Some(frame) = can.try_receive() {
///     // dispatch
/// }
/// ```
pub struct Esp32Can<'d> {
    driver: CanDriver<'d>,
}

impl<'d> Esp32Can<'d> {
    /// Configures and starts the TWAI controller.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver cannot be installed or started.
    pub fn new(
        can: impl Peripheral<P = esp_idf_hal::can::CAN> + 'd,
        tx: impl Peripheral<P = impl OutputPin> + 'd,
        rx: impl Peripheral<P = impl InputPin> + 'd,
    ) -> Result<Self, esp_idf_hal::sys::EspError> {
        let config = Config::new().timing(Timing::B500K);
        let mut driver = CanDriver::new(can, tx, rx, &config)?;
        driver.start()?;
        Ok(Self { driver })
    }
}

impl CanReceiver for Esp32Can<'_> {
    fn try_receive(&mut self) -> Option<CanFrame> {
        loop {
            // A zero tick timeout polls the RX queue.
            let frame = self.driver.receive(0).ok()?;
            if frame.is_extended() {
                continue;
            }
            let Ok(id) = u16::try_from(frame.identifier()) else {
                continue;
            };
            if let Some(frame) = CanFrame::new(id, frame.data()) {
                return Some(frame);
            }
        }
    }
}
