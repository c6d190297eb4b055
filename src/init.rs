//! Start-up configuration and verification of the motion controller and gate driver.
//!
//! [`MotorInitializer`] moves through
//!
//! ```text
//! Unconfigured -> Writing -> Verifying -> Ready
//!                                      \-> Failed(component)
//! ```
//!
//! While writing, the power stage is disabled and every chip select idles
//! high. The motion controller image is written first, then the gate driver
//! image. A write that fails at transport level is counted and the sequence
//! moves on. Afterwards a subset of registers is read back and compared
//! exactly. Both groups are always checked so the report says which chip is
//! misconfigured.
//!
//! # Example
//!
//! ```rust
//! use rs_motorboard::config::BoardConfig;
//! use rs_motorboard::hal::{MockBoard, MockDebugSink, MockEnablePin};
//! use rs_motorboard::init::{InitState, MotorInitializer};
//! use rs_motorboard::transport::RegisterTransport;
//! use rs_motorboard::SharedDatastore;
//!
//! let board = MockBoard::new();
//! let datastore = SharedDatastore::new();
//! let sink = MockDebugSink::new();
//! let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);
//! let mut enable = MockEnablePin::new();
//!
//! let config = BoardConfig::default();
//! let mut init = MotorInitializer::new(&config);
//! let report = init.run(&mut bus, &mut enable, &sink);
//!
//! assert_eq!(report.state, InitState::Ready);
//! assert!(enable.enabled);
//! ```

use core::fmt;

use crate::config::{BoardConfig, ShortString, GATE_DRIVER_WRITES};
use crate::registers::{tmc4671, tmc6200, Chip, RegisterAccess};
use crate::traits::{DebugSink, EnablePin, Severity, DRIVER_ENABLE_PIN};
use crate::transport::TransportError;

/// Device group checked after configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    /// TMC4671 motion controller.
    MotionController,
    /// TMC6200 gate driver.
    GateDriver,
}

impl Component {
    /// Register device backing the component.
    pub const fn chip(&self) -> Chip {
        match self {
            Component::MotionController => Chip::MotionController,
            Component::GateDriver => Chip::GateDriver,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::MotionController => f.write_str("motion controller"),
            Component::GateDriver => f.write_str("gate driver"),
        }
    }
}

/// Progress of the start-up sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InitState {
    /// Nothing written yet.
    #[default]
    Unconfigured,
    /// Register images are being written.
    Writing,
    /// Registers are being read back.
    Verifying,
    /// Both chips verified, power stage enabled.
    Ready,
    /// Readback of the named component did not match, or the gate driver
    /// could not be enabled.
    Failed(Component),
}

impl InitState {
    /// Whether the sequence has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InitState::Ready | InitState::Failed(_))
    }
}

/// Expected value and readback of one register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterCheck {
    /// Register address
    pub address: u8,
    /// Value that was written
    pub expected: u32,
    /// Value that was read back, or the transport failure
    pub readback: Result<u32, TransportError>,
}

impl RegisterCheck {
    /// Reads `address` on `chip` and records the comparison.
    fn read<R: RegisterAccess>(bus: &mut R, chip: Chip, address: u8, expected: u32) -> Self {
        Self {
            address,
            expected,
            readback: bus.read_register(chip, address),
        }
    }

    /// Exact match with no transport failure.
    pub fn passed(&self) -> bool {
        self.readback == Ok(self.expected)
    }
}

/// Readback checks of one component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupVerification<const N: usize> {
    /// Component under test
    pub component: Component,
    /// Per-register comparisons, in read order
    pub checks: [RegisterCheck; N],
}

impl<const N: usize> GroupVerification<N> {
    /// Every register in the group matched.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(RegisterCheck::passed)
    }

    /// First register that did not match.
    pub fn first_mismatch(&self) -> Option<&RegisterCheck> {
        self.checks.iter().find(|check| !check.passed())
    }
}

/// Outcome of one run of the start-up sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InitReport {
    /// Terminal state
    pub state: InitState,
    /// Pole pair readback
    pub motion_controller: GroupVerification<1>,
    /// GCONF, SHORT_CONF and DRV_CONF readback
    pub gate_driver: GroupVerification<GATE_DRIVER_WRITES>,
    /// Writes that reported a transport failure
    pub write_faults: u32,
}

impl InitReport {
    /// Both chips verified.
    pub fn is_ready(&self) -> bool {
        self.state == InitState::Ready
    }

    /// Component that caused the failure, if any.
    pub fn failed_component(&self) -> Option<Component> {
        match self.state {
            InitState::Failed(component) => Some(component),
            _ => None,
        }
    }
}

/// Drives the start-up sequence for one board.
#[derive(Debug)]
pub struct MotorInitializer<'c> {
    config: &'c BoardConfig,
    state: InitState,
}

impl<'c> MotorInitializer<'c> {
    /// Creates an initializer in [`InitState::Unconfigured`].
    pub fn new(config: &'c BoardConfig) -> Self {
        Self {
            config,
            state: InitState::Unconfigured,
        }
    }

    /// Current state.
    pub fn state(&self) -> InitState {
        self.state
    }

    /// Writes both register images, verifies them and enables the power stage
    /// on success.
    pub fn run<R, E, K>(&mut self, bus: &mut R, enable: &mut E, sink: &K) -> InitReport
    where
        R: RegisterAccess,
        E: EnablePin,
        K: DebugSink,
    {
        self.state = InitState::Writing;
        if let Err(err) = enable.set_enabled(false) {
            sink.error(format_args!(
                "Driver enable {} could not be driven low: {}",
                DRIVER_ENABLE_PIN, err
            ));
        }
        if let Err(err) = bus.release_chip_selects() {
            sink.emit(
                Severity::Warning,
                format_args!("Chip selects not released before configuration: {}", err),
            );
        }

        let mut write_faults = 0;
        let motor_writes = self.config.motor.register_writes();
        let driver_writes = self.config.driver.register_writes();
        let writes = motor_writes
            .iter()
            .map(|w| (Chip::MotionController, *w))
            .chain(driver_writes.iter().map(|w| (Chip::GateDriver, *w)));
        for (chip, (address, value)) in writes {
            if let Err(err) = bus.write_register(chip, address, value) {
                write_faults += 1;
                sink.emit(
                    Severity::Warning,
                    format_args!("{} write {:#04x} failed: {}", chip, address, err),
                );
            }
        }

        self.state = InitState::Verifying;
        let motion_controller = GroupVerification {
            component: Component::MotionController,
            checks: [RegisterCheck::read(
                bus,
                Chip::MotionController,
                tmc4671::MOTOR_TYPE_N_POLE_PAIRS,
                self.config.motor.motor_type_n_pole_pairs,
            )],
        };
        let driver = &self.config.driver;
        let gate_driver = GroupVerification {
            component: Component::GateDriver,
            checks: [
                RegisterCheck::read(bus, Chip::GateDriver, tmc6200::GCONF, driver.general),
                RegisterCheck::read(bus, Chip::GateDriver, tmc6200::SHORT_CONF, driver.short),
                RegisterCheck::read(bus, Chip::GateDriver, tmc6200::DRV_CONF, driver.drive),
            ],
        };

        let labels = &self.config.labels;
        report_group(sink, "Motor Driver", &labels.gate_driver, &gate_driver);
        report_group(sink, "Motor Controller", &labels.motion_controller, &motion_controller);

        self.state = if !gate_driver.passed() {
            InitState::Failed(Component::GateDriver)
        } else if !motion_controller.passed() {
            InitState::Failed(Component::MotionController)
        } else {
            InitState::Ready
        };

        if self.state == InitState::Ready {
            if let Err(err) = enable.set_enabled(true) {
                sink.error(format_args!(
                    "Driver enable {} could not be driven high: {}",
                    DRIVER_ENABLE_PIN, err
                ));
                self.state = InitState::Failed(Component::GateDriver);
            }
        }

        InitReport {
            state: self.state,
            motion_controller,
            gate_driver,
            write_faults,
        }
    }
}

fn report_group<K: DebugSink, const N: usize>(
    sink: &K,
    kind: &str,
    label: &ShortString,
    group: &GroupVerification<N>,
) {
    match group.first_mismatch() {
        None => sink.info(format_args!("{} [{}] successfully initialized!", kind, label)),
        Some(check) => {
            sink.error(format_args!("Failed to initialize {} [{}]", kind, label));
            let chip = group.component.chip();
            match check.readback {
                Ok(actual) => sink.error(format_args!(
                    "  {} register {:#04x}: expected {:#010x}, read {:#010x}",
                    chip, check.address, check.expected, actual
                )),
                Err(err) => sink.error(format_args!(
                    "  {} register {:#04x}: readback failed ({})",
                    chip, check.address, err
                )),
            }
        }
    }
}

/// Quick presence check: reads the pole pair register and the gate driver
/// GCONF and compares them with the configuration.
pub fn validate_link<R: RegisterAccess>(bus: &mut R, config: &BoardConfig) -> bool {
    let pole_pairs = bus.read_register(Chip::MotionController, tmc4671::MOTOR_TYPE_N_POLE_PAIRS);
    let gconf = bus.read_register(Chip::GateDriver, tmc6200::GCONF);
    pole_pairs == Ok(config.motor.motor_type_n_pole_pairs) && gconf == Ok(config.driver.general)
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::hal::{MockBoard, MockDatastore, MockDebugSink, MockEnablePin};
    use crate::transport::RegisterTransport;

    #[test]
    fn initial_state() {
        let config = BoardConfig::default();
        let init = MotorInitializer::new(&config);
        assert_eq!(init.state(), InitState::Unconfigured);
        assert!(!init.state().is_terminal());
    }

    #[test]
    fn ready_logs_both_groups() {
        let board = MockBoard::new();
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);
        let mut enable = MockEnablePin::new();
        let config = BoardConfig::default();
        let mut init = MotorInitializer::new(&config);

        let report = init.run(&mut bus, &mut enable, &sink);

        assert!(report.is_ready());
        assert_eq!(init.state(), InitState::Ready);
        assert_eq!(report.write_faults, 0);
        assert!(sink.contains("Motor Driver [TMC6200] successfully initialized!"));
        assert!(sink.contains("Motor Controller [TMC4671] successfully initialized!"));
        assert_eq!(enable.history, vec![false, true]);
    }

    #[test]
    fn mismatched_pole_pairs_fail_motion_controller() {
        let board = MockBoard::new();
        board.override_readback(Chip::MotionController, tmc4671::MOTOR_TYPE_N_POLE_PAIRS, 0);
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);
        let mut enable = MockEnablePin::new();
        let config = BoardConfig::default();

        let report = MotorInitializer::new(&config).run(&mut bus, &mut enable, &sink);

        assert_eq!(report.failed_component(), Some(Component::MotionController));
        assert!(report.gate_driver.passed());
        assert!(!enable.enabled);
        assert!(sink.contains("Failed to initialize Motor Controller [TMC4671]"));
        assert!(sink.contains("TMC4671 register 0x1b: expected 0x00030004, read 0x00000000"));
    }

    #[test]
    fn enable_failure_keeps_board_out_of_ready() {
        let board = MockBoard::new();
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);
        let mut enable = MockEnablePin::stuck(true);
        let config = BoardConfig::default();

        let report = MotorInitializer::new(&config).run(&mut bus, &mut enable, &sink);

        assert!(report.motion_controller.passed());
        assert!(report.gate_driver.passed());
        assert_eq!(report.state, InitState::Failed(Component::GateDriver));
        assert_eq!(report.failed_component().map(|c| c.chip()), Some(Chip::GateDriver));
        assert!(!enable.enabled);
        assert!(sink.contains("Driver enable PA9 could not be driven high: Error"));
    }

    #[test]
    fn stuck_chip_selects_fail_without_clocking() {
        let board = MockBoard::new();
        board.fail_chip_selects(TransportError::Bus);
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);
        let mut enable = MockEnablePin::new();
        let config = BoardConfig::default();

        let report = MotorInitializer::new(&config).run(&mut bus, &mut enable, &sink);

        assert_eq!(report.state, InitState::Failed(Component::GateDriver));
        let writes = crate::config::MOTION_CONTROLLER_WRITES + GATE_DRIVER_WRITES;
        assert_eq!(report.write_faults as usize, writes);
        assert_eq!(board.exchange_count(), 0);
        assert!(sink.contains("Chip selects not released before configuration"));
        assert_eq!(enable.history, vec![false]);
    }

    #[test]
    fn validate_link_after_init() {
        let board = MockBoard::new();
        let datastore = MockDatastore::new();
        let sink = MockDebugSink::new();
        let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);
        let config = BoardConfig::default();

        assert!(!validate_link(&mut bus, &config));
        MotorInitializer::new(&config).run(&mut bus, &mut MockEnablePin::new(), &sink);
        assert!(validate_link(&mut bus, &config));
    }
}
