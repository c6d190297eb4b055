//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware and collaborator traits,
//! enabling development and testing on desktop without the controller board.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockBoard`] | - | Emulates both chips' register files behind one bus |
//! | [`MockSpi`] | [`SpiTransport`] | Byte exchange half of a [`MockBoard`] |
//! | [`MockChipSelects`] | [`ChipSelectPins`] | Chip-select half of a [`MockBoard`] |
//! | [`MockEnablePin`] | [`EnablePin`] | Records enable/disable calls |
//! | [`MockCan`] | [`CanReceiver`] | Queued received frames |
//! | [`MockDatastore`] | [`Datastore`] | Records every write |
//! | [`MockDebugSink`] | [`DebugSink`] | Collects diagnostic lines |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//!
//! # Example
//!
//! ```rust
//! use rs_motorboard::hal::{MockBoard, MockDatastore, MockDebugSink};
//! use rs_motorboard::registers::{tmc6200, Chip, RegisterAccess};
//! use rs_motorboard::transport::{RegisterTransport, TransportError};
//!
//! let board = MockBoard::new();
//! let datastore = MockDatastore::new();
//! let sink = MockDebugSink::new();
//! let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);
//!
//! bus.write_register(Chip::GateDriver, tmc6200::GCONF, 0x10).unwrap();
//! assert_eq!(board.register(Chip::GateDriver, tmc6200::GCONF), Some(0x10));
//!
//! // Make the next exchange time out
//! board.fail_exchange(board.exchange_count(), TransportError::Timeout);
//! assert!(bus.read_register(Chip::GateDriver, tmc6200::GCONF).is_err());
//! assert_eq!(datastore.spi_fault_sets(), 1);
//! ```
//!
//! [`SpiTransport`]: crate::traits::SpiTransport
//! [`ChipSelectPins`]: crate::traits::ChipSelectPins
//! [`EnablePin`]: crate::traits::EnablePin
//! [`CanReceiver`]: crate::traits::CanReceiver
//! [`Datastore`]: crate::traits::Datastore
//! [`DebugSink`]: crate::traits::DebugSink
//! [`Clock`]: crate::traits::Clock

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::can::CanFrame;
use crate::registers::{Chip, ADDRESS_MASK, DATAGRAM_LEN, WRITE_FLAG};
use crate::traits::{
    CanReceiver, ChipSelectLine, ChipSelectPins, Clock, Datastore, DebugSink, EnablePin, PinLevel,
    Severity, SpiTransport, TransportError,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Board Emulation
// ============================================================================

/// One observable change on the emulated bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BusEvent {
    /// A chip select was driven low.
    Select(ChipSelectLine),
    /// A chip select was driven high.
    Deselect(ChipSelectLine),
    /// A byte was clocked (or attempted) while `line` was low.
    Byte {
        /// Chip select low at the time, if exactly one was
        line: Option<ChipSelectLine>,
        /// MOSI byte
        out: u8,
    },
}

/// Datagram being clocked into one chip.
#[derive(Debug, Default)]
struct Datagram {
    /// Bytes seen since the select edge.
    index: usize,
    header: u8,
    payload: [u8; 4],
    response: [u8; 4],
    /// A byte of this datagram failed; do not commit a write.
    corrupted: bool,
}

#[derive(Debug, Default)]
struct BoardState {
    levels: [PinLevel; 4],
    registers: BTreeMap<(Chip, u8), u32>,
    overrides: BTreeMap<(Chip, u8), u32>,
    failures: BTreeMap<usize, TransportError>,
    fail_all: Option<TransportError>,
    chip_select_failure: Option<TransportError>,
    exchanges: usize,
    last_timeout_ms: Option<u32>,
    events: Vec<BusEvent>,
    datagram: Datagram,
}

impl BoardState {
    fn selected(&self) -> Option<ChipSelectLine> {
        let mut low = ChipSelectLine::ALL
            .into_iter()
            .filter(|line| self.levels[line.index()] == PinLevel::Low);
        match (low.next(), low.next()) {
            (Some(line), None) => Some(line),
            _ => None,
        }
    }

    fn exchange(&mut self, out: u8, timeout_ms: u32) -> Result<u8, TransportError> {
        let n = self.exchanges;
        self.exchanges += 1;
        self.last_timeout_ms = Some(timeout_ms);
        let line = self.selected();
        self.events.push(BusEvent::Byte { line, out });

        let failure = self.failures.remove(&n).or(self.fail_all);
        let chip = line.and_then(Chip::from_chip_select);
        let Some(chip) = chip else {
            return match failure {
                Some(err) => Err(err),
                // Nobody drives MISO.
                None => Ok(0xFF),
            };
        };

        let index = self.datagram.index;
        self.datagram.index += 1;
        if let Some(err) = failure {
            self.datagram.corrupted = true;
            return Err(err);
        }

        match index {
            0 => {
                self.datagram.header = out;
                let address = out & ADDRESS_MASK;
                let value = self
                    .overrides
                    .get(&(chip, address))
                    .or_else(|| self.registers.get(&(chip, address)))
                    .copied()
                    .unwrap_or(0);
                self.datagram.response = value.to_be_bytes();
                // Status byte
                Ok(0x00)
            }
            1..=4 => {
                self.datagram.payload[index - 1] = out;
                let miso = if self.datagram.header & WRITE_FLAG == 0 {
                    self.datagram.response[index - 1]
                } else {
                    0x00
                };
                if index == DATAGRAM_LEN - 1
                    && self.datagram.header & WRITE_FLAG != 0
                    && !self.datagram.corrupted
                {
                    let address = self.datagram.header & ADDRESS_MASK;
                    let value = u32::from_be_bytes(self.datagram.payload);
                    self.registers.insert((chip, address), value);
                }
                Ok(miso)
            }
            _ => Ok(0x00),
        }
    }

    fn set_level(&mut self, line: ChipSelectLine, level: PinLevel) -> Result<(), TransportError> {
        if let Some(err) = self.chip_select_failure {
            return Err(err);
        }
        let previous = self.levels[line.index()];
        self.levels[line.index()] = level;
        self.events.push(match level {
            PinLevel::Low => BusEvent::Select(line),
            PinLevel::High => BusEvent::Deselect(line),
        });
        if previous != level {
            self.datagram = Datagram::default();
        }
        Ok(())
    }
}

/// Emulated SPI bus with a TMC4671 and a TMC6200 attached.
///
/// Written registers are stored per chip and returned by later reads. Reads of
/// registers that were never written return 0. Exchanges can be made to fail
/// and readbacks can be overridden to simulate a misbehaving chip. Every
/// chip-select change and byte is recorded as a [`BusEvent`].
///
/// Handles returned by [`spi`](Self::spi) and
/// [`chip_selects`](Self::chip_selects) share state with the board.
#[derive(Clone, Default)]
pub struct MockBoard {
    state: Arc<Mutex<BoardState>>,
}

impl fmt::Debug for MockBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("MockBoard")
            .field("levels", &state.levels)
            .field("registers", &state.registers)
            .field("exchanges", &state.exchanges)
            .finish()
    }
}

impl MockBoard {
    /// Creates a board with empty register files and every line idle-high.
    pub fn new() -> Self {
        Self::default()
    }

    /// SPI handle for a [`RegisterTransport`](crate::transport::RegisterTransport).
    pub fn spi(&self) -> MockSpi {
        MockSpi {
            state: Arc::clone(&self.state),
        }
    }

    /// Chip-select handle for a [`RegisterTransport`](crate::transport::RegisterTransport).
    pub fn chip_selects(&self) -> MockChipSelects {
        MockChipSelects {
            state: Arc::clone(&self.state),
        }
    }

    /// Makes the exchange with zero-based sequence number `n` fail.
    pub fn fail_exchange(&self, n: usize, err: TransportError) {
        lock(&self.state).failures.insert(n, err);
    }

    /// Makes every exchange fail until [`heal`](Self::heal) is called.
    pub fn fail_all(&self, err: TransportError) {
        lock(&self.state).fail_all = Some(err);
    }

    /// Makes every chip-select write fail, leaving the lines where they are,
    /// until [`heal`](Self::heal) is called.
    pub fn fail_chip_selects(&self, err: TransportError) {
        lock(&self.state).chip_select_failure = Some(err);
    }

    /// Clears all pending failures.
    pub fn heal(&self) {
        let mut state = lock(&self.state);
        state.fail_all = None;
        state.chip_select_failure = None;
        state.failures.clear();
    }

    /// Reads of `address` on `chip` return `value` regardless of what was written.
    pub fn override_readback(&self, chip: Chip, address: u8, value: u32) {
        lock(&self.state).overrides.insert((chip, address), value);
    }

    /// Value stored in the emulated register file.
    pub fn register(&self, chip: Chip, address: u8) -> Option<u32> {
        lock(&self.state).registers.get(&(chip, address)).copied()
    }

    /// Register addresses written on `chip`, in ascending order.
    pub fn written_addresses(&self, chip: Chip) -> Vec<u8> {
        lock(&self.state)
            .registers
            .keys()
            .filter(|(c, _)| *c == chip)
            .map(|(_, a)| *a)
            .collect()
    }

    /// Current level of `line`.
    pub fn cs_level(&self, line: ChipSelectLine) -> PinLevel {
        lock(&self.state).levels[line.index()]
    }

    /// Every recorded bus event.
    pub fn events(&self) -> Vec<BusEvent> {
        lock(&self.state).events.clone()
    }

    /// Forgets recorded events (register contents are kept).
    pub fn clear_events(&self) {
        lock(&self.state).events.clear();
    }

    /// Number of times `line` was driven low.
    pub fn select_count(&self, line: ChipSelectLine) -> usize {
        self.count(BusEvent::Select(line))
    }

    /// Number of times `line` was driven high.
    pub fn deselect_count(&self, line: ChipSelectLine) -> usize {
        self.count(BusEvent::Deselect(line))
    }

    fn count(&self, event: BusEvent) -> usize {
        lock(&self.state).events.iter().filter(|e| **e == event).count()
    }

    /// Total byte exchanges attempted.
    pub fn exchange_count(&self) -> usize {
        lock(&self.state).exchanges
    }

    /// Timeout passed with the most recent exchange.
    pub fn last_timeout_ms(&self) -> Option<u32> {
        lock(&self.state).last_timeout_ms
    }
}

/// Byte exchange half of a [`MockBoard`].
#[derive(Clone)]
pub struct MockSpi {
    state: Arc<Mutex<BoardState>>,
}

impl SpiTransport for MockSpi {
    fn exchange_byte(&mut self, out: u8, timeout_ms: u32) -> Result<u8, TransportError> {
        lock(&self.state).exchange(out, timeout_ms)
    }
}

/// Chip-select half of a [`MockBoard`].
#[derive(Clone)]
pub struct MockChipSelects {
    state: Arc<Mutex<BoardState>>,
}

impl ChipSelectPins for MockChipSelects {
    fn set_level(&mut self, line: ChipSelectLine, level: PinLevel) -> Result<(), TransportError> {
        lock(&self.state).set_level(line, level)
    }
}

// ============================================================================
// Discrete Outputs / CAN
// ============================================================================

/// Mock gate driver enable pin.
///
/// # Example
///
/// ```rust
/// use rs_motorboard::hal::MockEnablePin;
/// use rs_motorboard::traits::EnablePin;
///
/// let mut pin = MockEnablePin::new();
/// pin.set_enabled(true).unwrap();
/// assert!(pin.enabled);
/// assert_eq!(pin.history, vec![true]);
/// ```
#[derive(Debug, Default)]
pub struct MockEnablePin {
    /// Current output state
    pub enabled: bool,
    /// Every value written, in order
    pub history: Vec<bool>,
    /// Writes of this level fail and leave the output unchanged
    pub stuck: Option<bool>,
}

impl MockEnablePin {
    /// Creates a disabled pin with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pin whose writes of `level` fail.
    pub fn stuck(level: bool) -> Self {
        Self {
            stuck: Some(level),
            ..Self::default()
        }
    }
}

impl EnablePin for MockEnablePin {
    fn set_enabled(&mut self, enabled: bool) -> Result<(), TransportError> {
        if self.stuck == Some(enabled) {
            return Err(TransportError::Bus);
        }
        self.enabled = enabled;
        self.history.push(enabled);
        Ok(())
    }
}

/// Mock CAN receive queue.
#[derive(Debug, Default)]
pub struct MockCan {
    /// Frames waiting to be received
    pub incoming: VecDeque<CanFrame>,
}

impl MockCan {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a frame. Panics if `payload` is longer than 8 bytes.
    pub fn push(&mut self, id: u16, payload: &[u8]) {
        let frame = CanFrame::new(id, payload).expect("CAN payload longer than 8 bytes");
        self.incoming.push_back(frame);
    }
}

impl CanReceiver for MockCan {
    fn try_receive(&mut self) -> Option<CanFrame> {
        self.incoming.pop_front()
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Datastore that records every write.
///
/// Unlike [`SharedDatastore`](crate::SharedDatastore), this keeps the full
/// history so tests can assert how often a value was written.
#[derive(Debug, Default)]
pub struct MockDatastore {
    throttle: Mutex<Vec<u32>>,
    spi_fault: Mutex<Vec<bool>>,
}

impl MockDatastore {
    /// Creates an empty datastore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every throttle value written, in order.
    pub fn throttle_history(&self) -> Vec<u32> {
        lock(&self.throttle).clone()
    }

    /// Number of times the fault flag was raised.
    pub fn spi_fault_sets(&self) -> usize {
        lock(&self.spi_fault).iter().filter(|f| **f).count()
    }
}

impl Datastore for MockDatastore {
    fn set_throttle_percentage(&self, percentage: u32) {
        lock(&self.throttle).push(percentage);
    }

    fn throttle_percentage(&self) -> u32 {
        lock(&self.throttle).last().copied().unwrap_or(0)
    }

    fn set_spi_fault(&self, fault: bool) {
        lock(&self.spi_fault).push(fault);
    }

    fn spi_fault(&self) -> bool {
        lock(&self.spi_fault).last().copied().unwrap_or(false)
    }
}

/// Debug sink that keeps every line.
#[derive(Debug, Default)]
pub struct MockDebugSink {
    lines: Mutex<Vec<(Severity, String)>>,
}

impl MockDebugSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line emitted, in order.
    pub fn lines(&self) -> Vec<(Severity, String)> {
        lock(&self.lines).clone()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.count_containing(needle) > 0
    }

    /// Number of lines containing `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        lock(&self.lines)
            .iter()
            .filter(|(_, line)| line.contains(needle))
            .count()
    }

    /// Number of lines at `severity`.
    pub fn count_with(&self, severity: Severity) -> usize {
        lock(&self.lines).iter().filter(|(s, _)| *s == severity).count()
    }

    /// Whether nothing was emitted.
    pub fn is_empty(&self) -> bool {
        lock(&self.lines).is_empty()
    }
}

impl DebugSink for MockDebugSink {
    fn emit(&self, severity: Severity, message: fmt::Arguments<'_>) {
        lock(&self.lines).push((severity, message.to_string()));
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Mock clock for testing time-dependent code.
///
/// # Example
///
/// ```rust
/// use rs_motorboard::hal::MockClock;
/// use rs_motorboard::traits::Clock;
///
/// let mut clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current time in milliseconds.
    pub fn set(&mut self, ms: u64) {
        self.current_ms = ms;
    }

    /// Advances the clock by the specified milliseconds.
    pub fn advance(&mut self, ms: u64) {
        self.current_ms += ms;
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms
    }
}
