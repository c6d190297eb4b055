//! Runtime torque commands.
//!
//! Every command is a single write of the motion controller's torque/flux
//! target register. Rotation commands use the magnitude from
//! [`CommandConfig`].

use crate::config::CommandConfig;
use crate::registers::{tmc4671, Chip, RegisterAccess};
use crate::traits::DebugSink;
use crate::transport::TransportError;

/// Torque command interface of the motion controller.
///
/// # Example
///
/// ```rust
/// use rs_motorboard::config::CommandConfig;
/// use rs_motorboard::hal::{MockBoard, MockDebugSink};
/// use rs_motorboard::motor::MotorCommands;
/// use rs_motorboard::registers::{tmc4671, Chip};
/// use rs_motorboard::transport::RegisterTransport;
/// use rs_motorboard::SharedDatastore;
///
/// let board = MockBoard::new();
/// let datastore = SharedDatastore::new();
/// let sink = MockDebugSink::new();
/// let bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);
/// let mut motor = MotorCommands::new(bus, &sink, &CommandConfig::default());
///
/// motor.rotate_left().unwrap();
/// assert_eq!(
///     board.register(Chip::MotionController, tmc4671::PID_TORQUE_FLUX_TARGET),
///     Some((-0x03E8_0000i32) as u32)
/// );
/// ```
pub struct MotorCommands<R, K> {
    bus: R,
    sink: K,
    rotate_torque: i32,
}

impl<R: RegisterAccess, K: DebugSink> MotorCommands<R, K> {
    /// Wraps a register bus.
    pub fn new(bus: R, sink: K, config: &CommandConfig) -> Self {
        Self {
            bus,
            sink,
            rotate_torque: config.rotate_torque,
        }
    }

    /// Writes `torque` to the torque/flux target register.
    pub fn set_target_torque(&mut self, torque: i32) -> Result<(), TransportError> {
        self.sink.info(format_args!(
            "Writing target torque: {:#010x} [{}]",
            torque as u32, torque
        ));
        self.bus.write_register(
            Chip::MotionController,
            tmc4671::PID_TORQUE_FLUX_TARGET,
            torque as u32,
        )
    }

    /// Positive torque of the configured magnitude.
    pub fn rotate_right(&mut self) -> Result<(), TransportError> {
        self.set_target_torque(self.rotate_torque)
    }

    /// Torque of the configured magnitude, opposite in sign to
    /// [`rotate_right`](Self::rotate_right). `i32::MIN` saturates to `i32::MAX`.
    pub fn rotate_left(&mut self) -> Result<(), TransportError> {
        self.set_target_torque(self.rotate_torque.saturating_neg())
    }

    /// Zero torque.
    pub fn stop(&mut self) -> Result<(), TransportError> {
        self.set_target_torque(0)
    }

    /// Configured rotation magnitude.
    pub fn rotate_torque(&self) -> i32 {
        self.rotate_torque
    }

    /// Gives back the register bus.
    pub fn into_inner(self) -> R {
        self.bus
    }
}
