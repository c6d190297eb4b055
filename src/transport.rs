//! Byte-level SPI transport with chip-select sequencing.
//!
//! [`RegisterTransport`] is the only code that touches the SPI peripheral and
//! the chip-select outputs. Each call exchanges a single byte on one
//! [`ChipSelectLine`]:
//!
//! 1. The line is driven low if it is not already held for the current
//!    transaction.
//! 2. One byte is exchanged with the configured timeout.
//! 3. If the byte is flagged `last`, the line is released, whatever the
//!    outcome of the exchange.
//!
//! A failed exchange never aborts a transaction. The fault flag is raised in
//! the datastore, a diagnostic line is emitted and the error is handed back
//! to the caller so the byte cannot be mistaken for valid data.
//!
//! # Example
//!
//! ```rust
//! use rs_motorboard::hal::{MockBoard, MockDebugSink};
//! use rs_motorboard::transport::RegisterTransport;
//! use rs_motorboard::traits::{ChipSelectLine, Datastore};
//! use rs_motorboard::SharedDatastore;
//!
//! let board = MockBoard::new();
//! let datastore = SharedDatastore::new();
//! let sink = MockDebugSink::new();
//! let mut transport =
//!     RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);
//!
//! for (i, byte) in [0x9B, 0x00, 0x03, 0x00, 0x04].into_iter().enumerate() {
//!     transport
//!         .transfer_byte(ChipSelectLine::MotionController, byte, i == 4)
//!         .unwrap();
//! }
//!
//! assert_eq!(transport.asserted_line(), None);
//! assert!(!datastore.spi_fault());
//! ```

use crate::config::TransportConfig;
use crate::traits::{ChipSelectPins, Datastore, DebugSink, Severity, SpiTransport};

pub use crate::traits::{ChipSelectLine, TransportError};

/// SPI byte transport shared by every device on the board's bus.
///
/// `D` and `K` are usually references or `Arc`s to the firmware-wide datastore
/// and debug sink.
pub struct RegisterTransport<S, C, D, K> {
    spi: S,
    chip_selects: C,
    datastore: D,
    sink: K,
    timeout_ms: u32,
    /// Line held low by an unfinished transaction.
    asserted: Option<ChipSelectLine>,
}

impl<S, C, D, K> RegisterTransport<S, C, D, K>
where
    S: SpiTransport,
    C: ChipSelectPins,
    D: Datastore,
    K: DebugSink,
{
    /// Creates a transport with the default per-byte timeout.
    pub fn new(spi: S, chip_selects: C, datastore: D, sink: K) -> Self {
        Self {
            spi,
            chip_selects,
            datastore,
            sink,
            timeout_ms: TransportConfig::default().timeout_ms,
            asserted: None,
        }
    }

    /// Overrides the per-byte timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Applies the transport section of the board configuration.
    pub fn with_config(self, config: &TransportConfig) -> Self {
        self.with_timeout_ms(config.timeout_ms)
    }

    /// Per-byte exchange timeout in milliseconds.
    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Line currently held low by an unfinished transaction.
    pub fn asserted_line(&self) -> Option<ChipSelectLine> {
        self.asserted
    }

    /// Drives every chip select to idle-high and forgets any open transaction.
    ///
    /// Every line is attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns the first chip-select failure. The fault flag is raised once.
    pub fn release_all(&mut self) -> Result<(), TransportError> {
        let mut first = Ok(());
        for line in ChipSelectLine::ALL {
            if let Err(err) = self.chip_selects.deassert(line) {
                self.sink.error(format_args!("SPI {} releasing {}", err, line));
                first = first.and(Err(err));
            }
        }
        self.asserted = None;
        if first.is_err() {
            self.datastore.set_spi_fault(true);
        }
        first
    }

    /// Exchanges one byte with the device on `line`.
    ///
    /// Set `last` on the final byte of a transaction to release the line.
    /// If the line cannot be selected the byte is not clocked.
    ///
    /// # Errors
    ///
    /// Returns the first peripheral failure of the call: selecting the line,
    /// the exchange itself or releasing the line. The fault flag has already
    /// been raised and the release has been attempted if `last` was set.
    pub fn transfer_byte(
        &mut self,
        line: ChipSelectLine,
        out: u8,
        last: bool,
    ) -> Result<u8, TransportError> {
        let mut result = match self.select(line) {
            Ok(()) => self
                .spi
                .exchange_byte(out, self.timeout_ms)
                .map_err(|err| (err, Stage::Exchange)),
            Err(err) => Err((err, Stage::Select)),
        };

        if last {
            let released = self.chip_selects.deassert(line);
            self.asserted = None;
            if let Err(err) = released {
                if result.is_ok() {
                    result = Err((err, Stage::Release));
                }
            }
        }

        result.map_err(|(err, stage)| {
            self.datastore.set_spi_fault(true);
            self.sink.error(format_args!(
                "SPI {} on {} during {} (byte {:#04x})",
                err,
                line,
                stage.as_str(),
                out
            ));
            err
        })
    }

    /// Makes `line` the only selected line.
    fn select(&mut self, line: ChipSelectLine) -> Result<(), TransportError> {
        match self.asserted {
            Some(held) if held == line => return Ok(()),
            Some(held) => {
                self.sink.emit(
                    Severity::Warning,
                    format_args!("SPI: {} still selected, releasing before {}", held, line),
                );
                self.asserted = None;
                self.chip_selects.deassert(held)?;
            }
            None => {}
        }
        self.chip_selects.assert(line)?;
        self.asserted = Some(line);
        Ok(())
    }

    /// Gives back the peripheral handles.
    pub fn into_parts(self) -> (S, C) {
        (self.spi, self.chip_selects)
    }
}

/// Step of a byte transfer that failed.
#[derive(Clone, Copy, Debug)]
enum Stage {
    Select,
    Exchange,
    Release,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::Select => "select",
            Stage::Exchange => "exchange",
            Stage::Release => "release",
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::hal::{BusEvent, MockBoard, MockDatastore, MockDebugSink};

    fn transport<'a>(
        board: &MockBoard,
        datastore: &'a MockDatastore,
        sink: &'a MockDebugSink,
    ) -> RegisterTransport<
        crate::hal::MockSpi,
        crate::hal::MockChipSelects,
        &'a MockDatastore,
        &'a MockDebugSink,
    > {
        RegisterTransport::new(board.spi(), board.chip_selects(), datastore, sink)
    }

    #[test]
    fn asserts_once_and_releases_after_last_byte() {
        let board = MockBoard::new();
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut t = transport(&board, &datastore, &sink);

        t.transfer_byte(ChipSelectLine::GateDriver, 0x01, false).unwrap();
        assert_eq!(t.asserted_line(), Some(ChipSelectLine::GateDriver));
        t.transfer_byte(ChipSelectLine::GateDriver, 0x00, false).unwrap();
        t.transfer_byte(ChipSelectLine::GateDriver, 0x00, true).unwrap();
        assert_eq!(t.asserted_line(), None);

        assert_eq!(board.select_count(ChipSelectLine::GateDriver), 1);
        assert_eq!(board.deselect_count(ChipSelectLine::GateDriver), 1);
    }

    #[test]
    fn failure_raises_fault_once_and_still_releases() {
        let board = MockBoard::new();
        board.fail_exchange(0, TransportError::Timeout);
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut t = transport(&board, &datastore, &sink);

        let result = t.transfer_byte(ChipSelectLine::MotionController, 0x9B, true);

        assert_eq!(result, Err(TransportError::Timeout));
        assert_eq!(datastore.spi_fault_sets(), 1);
        assert!(datastore.spi_fault());
        assert_eq!(t.asserted_line(), None);
        assert_eq!(board.cs_level(ChipSelectLine::MotionController), crate::traits::PinLevel::High);
        assert!(sink.contains("SPI Timeout on motion-controller (PB6)"));
    }

    #[test]
    fn switching_lines_releases_previous_one() {
        let board = MockBoard::new();
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut t = transport(&board, &datastore, &sink);

        t.transfer_byte(ChipSelectLine::MotionController, 0x00, false).unwrap();
        t.transfer_byte(ChipSelectLine::GateDriver, 0x00, true).unwrap();

        let events = board.events();
        let mc_released = events
            .iter()
            .position(|e| *e == BusEvent::Deselect(ChipSelectLine::MotionController))
            .unwrap();
        let gd_selected = events
            .iter()
            .position(|e| *e == BusEvent::Select(ChipSelectLine::GateDriver))
            .unwrap();
        assert!(mc_released < gd_selected);
        assert_eq!(sink.count_with(Severity::Warning), 1);
    }

    #[test]
    fn release_all_idles_every_line() {
        let board = MockBoard::new();
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut t = transport(&board, &datastore, &sink);

        t.transfer_byte(ChipSelectLine::DriverEeprom1, 0x00, false).unwrap();
        t.release_all().unwrap();

        for line in ChipSelectLine::ALL {
            assert_eq!(board.cs_level(line), crate::traits::PinLevel::High);
        }
        assert_eq!(t.asserted_line(), None);
    }

    #[test]
    fn failed_select_skips_exchange_and_raises_fault() {
        let board = MockBoard::new();
        board.fail_chip_selects(TransportError::Bus);
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut t = transport(&board, &datastore, &sink);

        let result = t.transfer_byte(ChipSelectLine::GateDriver, 0x01, false);

        assert_eq!(result, Err(TransportError::Bus));
        assert_eq!(board.exchange_count(), 0);
        assert_eq!(t.asserted_line(), None);
        assert_eq!(datastore.spi_fault_sets(), 1);
        assert!(sink.contains("SPI Error on gate-driver (PC7) during select (byte 0x01)"));
    }

    #[test]
    fn failed_release_reports_error_after_good_exchange() {
        let board = MockBoard::new();
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut t = transport(&board, &datastore, &sink);

        t.transfer_byte(ChipSelectLine::MotionController, 0x00, false).unwrap();
        board.fail_chip_selects(TransportError::Bus);
        let result = t.transfer_byte(ChipSelectLine::MotionController, 0x00, true);

        assert_eq!(result, Err(TransportError::Bus));
        assert_eq!(board.exchange_count(), 2);
        assert_eq!(t.asserted_line(), None);
        assert_eq!(datastore.spi_fault_sets(), 1);
        assert!(sink.contains("during release"));
    }

    #[test]
    fn release_all_tries_every_line() {
        let board = MockBoard::new();
        board.fail_chip_selects(TransportError::BusBusy);
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut t = transport(&board, &datastore, &sink);

        assert_eq!(t.release_all(), Err(TransportError::BusBusy));
        assert_eq!(sink.count_containing("releasing"), ChipSelectLine::ALL.len());
        assert_eq!(datastore.spi_fault_sets(), 1);
    }

    #[test]
    fn parts_keep_board_state() {
        let board = MockBoard::new();
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut t = transport(&board, &datastore, &sink);
        t.transfer_byte(ChipSelectLine::GateDriver, 0x00, false).unwrap();

        let (mut spi, mut chip_selects) = t.into_parts();
        chip_selects.deassert(ChipSelectLine::GateDriver).unwrap();
        assert_eq!(spi.exchange_byte(0x00, 50), Ok(0xFF));
        assert_eq!(board.cs_level(ChipSelectLine::GateDriver), crate::traits::PinLevel::High);
    }

    #[test]
    fn timeout_comes_from_config() {
        let board = MockBoard::new();
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let t = transport(&board, &datastore, &sink).with_timeout_ms(5);
        assert_eq!(t.timeout_ms(), 5);

        let t = t.with_config(&TransportConfig::default());
        assert_eq!(t.timeout_ms(), 50);
        drop(t);
        assert_eq!(board.last_timeout_ms(), None);
    }
}
