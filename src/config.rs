//! Board configuration: chip register images, transport and task settings.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! The register images are grouped by category the way they are written
//! during start-up (see [`crate::init`]). Defaults match the reference board:
//! a 4-pole-pair BLDC motor with digital hall sensors and a TMC6200 at its
//! power-on gate drive settings.
//!
//! # Example
//!
//! ```rust
//! use rs_motorboard::config::{BoardConfig, CommandConfig, MotorConfig, TransportConfig};
//!
//! // Use defaults
//! let config = BoardConfig::default();
//! assert_eq!(config.motor.register_writes().len(), 20);
//!
//! // Or customize
//! let config = BoardConfig::default()
//!     .with_motor(MotorConfig::default().with_pole_pairs(7))
//!     .with_transport(TransportConfig::default().with_timeout_ms(5))
//!     .with_commands(CommandConfig::default().with_rotate_torque(500));
//! assert_eq!(config.motor.motor_type_n_pole_pairs, 0x0003_0007);
//! ```

use heapless::String as HString;

use crate::registers::{tmc4671, tmc6200};

/// Maximum length for short config strings (labels)
pub const MAX_SHORT_STRING: usize = 32;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Number of motion controller registers written during start-up.
pub const MOTION_CONTROLLER_WRITES: usize = 20;

/// Number of gate driver registers written during start-up.
pub const GATE_DRIVER_WRITES: usize = 3;

/// `(address, value)` pair of a register image.
pub type RegisterWrite = (u8, u32);

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Create a ShortString from a &str, truncating on a character boundary if too long
pub fn short_string(s: &str) -> ShortString {
    let mut end = s.len().min(MAX_SHORT_STRING);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut hs = ShortString::new();
    let _ = hs.push_str(&s[..end]);
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete board configuration
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardConfig {
    /// Motion controller register image
    pub motor: MotorConfig,
    /// Gate driver register image
    pub driver: DriverConfig,
    /// SPI transport settings
    pub transport: TransportConfig,
    /// Runtime motor command settings
    pub commands: CommandConfig,
    /// Periodic motor task settings
    pub task: TaskConfig,
    /// Names used in diagnostics
    pub labels: LabelConfig,
}

impl BoardConfig {
    /// Set motion controller configuration
    pub fn with_motor(mut self, motor: MotorConfig) -> Self {
        self.motor = motor;
        self
    }

    /// Set gate driver configuration
    pub fn with_driver(mut self, driver: DriverConfig) -> Self {
        self.driver = driver;
        self
    }

    /// Set transport configuration
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Set command configuration
    pub fn with_commands(mut self, commands: CommandConfig) -> Self {
        self.commands = commands;
        self
    }

    /// Set task configuration
    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.task = task;
        self
    }

    /// Set diagnostic labels
    pub fn with_labels(mut self, labels: LabelConfig) -> Self {
        self.labels = labels;
        self
    }
}

// ============================================================================
// Motion Controller (TMC4671)
// ============================================================================

/// Motion controller register image, grouped by category.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorConfig {
    /// Motor type (bits 16..24) and pole pairs (bits 0..16)
    pub motor_type_n_pole_pairs: u32,
    /// PWM generation
    pub pwm: PwmConfig,
    /// Phase current measurement
    pub adc: AdcConfig,
    /// Hall sensor decoding
    pub hall: HallConfig,
    /// Angle and velocity sources
    pub feedback: FeedbackConfig,
    /// Torque/flux output limits
    pub limits: LimitsConfig,
    /// Current loop gains
    pub pi: PiConfig,
    /// Ramp mode and motion mode
    pub mode_ramp_mode_motion: u32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            // BLDC, 4 pole pairs
            motor_type_n_pole_pairs: 0x0003_0004,
            pwm: PwmConfig::default(),
            adc: AdcConfig::default(),
            hall: HallConfig::default(),
            feedback: FeedbackConfig::default(),
            limits: LimitsConfig::default(),
            pi: PiConfig::default(),
            // Torque mode
            mode_ramp_mode_motion: 0x0000_0001,
        }
    }
}

impl MotorConfig {
    /// Set the pole pair count, keeping the motor type
    pub fn with_pole_pairs(mut self, pole_pairs: u16) -> Self {
        self.motor_type_n_pole_pairs =
            (self.motor_type_n_pole_pairs & 0xFFFF_0000) | u32::from(pole_pairs);
        self
    }

    /// Set PWM configuration
    pub fn with_pwm(mut self, pwm: PwmConfig) -> Self {
        self.pwm = pwm;
        self
    }

    /// Set ADC configuration
    pub fn with_adc(mut self, adc: AdcConfig) -> Self {
        self.adc = adc;
        self
    }

    /// Set hall sensor configuration
    pub fn with_hall(mut self, hall: HallConfig) -> Self {
        self.hall = hall;
        self
    }

    /// Set feedback selection
    pub fn with_feedback(mut self, feedback: FeedbackConfig) -> Self {
        self.feedback = feedback;
        self
    }

    /// Set torque/flux limits
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Set PI gains
    pub fn with_pi(mut self, pi: PiConfig) -> Self {
        self.pi = pi;
        self
    }

    /// Register image in the order it must be written.
    pub fn register_writes(&self) -> [RegisterWrite; MOTION_CONTROLLER_WRITES] {
        [
            (tmc4671::MOTOR_TYPE_N_POLE_PAIRS, self.motor_type_n_pole_pairs),
            (tmc4671::PWM_POLARITIES, self.pwm.polarities),
            (tmc4671::PWM_MAXCNT, self.pwm.max_count),
            (tmc4671::PWM_BBM_H_BBM_L, self.pwm.break_before_make),
            (tmc4671::PWM_SV_CHOP, self.pwm.sv_chop),
            (tmc4671::ADC_I_SELECT, self.adc.i_select),
            (tmc4671::DS_ADC_MCFG_B_MCFG_A, self.adc.mcfg),
            (tmc4671::DS_ADC_MCLK_A, self.adc.mclk_a),
            (tmc4671::DS_ADC_MCLK_B, self.adc.mclk_b),
            (tmc4671::DS_ADC_MDEC_B_MDEC_A, self.adc.mdec),
            (tmc4671::ADC_I0_SCALE_OFFSET, self.adc.i0_scale_offset),
            (tmc4671::ADC_I1_SCALE_OFFSET, self.adc.i1_scale_offset),
            (tmc4671::HALL_MODE, self.hall.mode),
            (tmc4671::HALL_PHI_E_PHI_M_OFFSET, self.hall.phi_offsets),
            (tmc4671::PHI_E_SELECTION, self.feedback.phi_e_selection),
            (tmc4671::VELOCITY_SELECTION, self.feedback.velocity_selection),
            (tmc4671::PID_TORQUE_FLUX_LIMITS, self.limits.torque_flux),
            (tmc4671::PID_TORQUE_P_TORQUE_I, self.pi.torque),
            (tmc4671::PID_FLUX_P_FLUX_I, self.pi.flux),
            (tmc4671::MODE_RAMP_MODE_MOTION, self.mode_ramp_mode_motion),
        ]
    }
}

/// PWM generation registers
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PwmConfig {
    /// Low/high side gate polarities
    pub polarities: u32,
    /// PWM period in 10 ns clock cycles
    pub max_count: u32,
    /// Break-before-make, high and low side
    pub break_before_make: u32,
    /// Space-vector enable and chopper mode
    pub sv_chop: u32,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            polarities: 0x0000_0000,
            // 25 kHz
            max_count: 0x0000_0F9F,
            break_before_make: 0x0000_1919,
            // Centered PWM for FOC
            sv_chop: 0x0000_0007,
        }
    }
}

/// Phase current ADC registers
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdcConfig {
    /// I0/I1 channel and UX1/VX2/WY1 mapping
    pub i_select: u32,
    /// Delta-sigma input configuration
    pub mcfg: u32,
    /// Delta-sigma clock A
    pub mclk_a: u32,
    /// Delta-sigma clock B
    pub mclk_b: u32,
    /// Decimation ratios
    pub mdec: u32,
    /// I0 scale (high half) and offset (low half)
    pub i0_scale_offset: u32,
    /// I1 scale (high half) and offset (low half)
    pub i1_scale_offset: u32,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            i_select: 0x1800_0100,
            mcfg: 0x0010_0010,
            mclk_a: 0x2000_0000,
            mclk_b: 0x0000_0000,
            mdec: 0x014E_014E,
            i0_scale_offset: 0x0100_8218,
            i1_scale_offset: 0x0100_820A,
        }
    }
}

/// Hall sensor registers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HallConfig {
    /// Polarity, interpolation and direction
    pub mode: u32,
    /// Electrical (high half) and mechanical (low half) angle offsets
    pub phi_offsets: u32,
}

/// Angle and velocity source selection
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeedbackConfig {
    /// Source of the electrical angle
    pub phi_e_selection: u32,
    /// Source of the velocity measurement
    pub velocity_selection: u32,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            // phi_e_hal
            phi_e_selection: 0x0000_0005,
            // phi_e_hal, electrical velocity
            velocity_selection: 0x0000_000C,
        }
    }
}

/// Current loop limits
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LimitsConfig {
    /// Torque and flux limit
    pub torque_flux: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            torque_flux: 0x0000_03E8,
        }
    }
}

/// Current loop PI gains, P in the high half and I in the low half
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PiConfig {
    /// Torque loop gains
    pub torque: u32,
    /// Flux loop gains
    pub flux: u32,
}

impl Default for PiConfig {
    fn default() -> Self {
        Self {
            torque: 0x0100_0100,
            flux: 0x0100_0100,
        }
    }
}

// ============================================================================
// Gate Driver (TMC6200)
// ============================================================================

/// Gate driver register image
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriverConfig {
    /// GCONF: single-line control, current amplification
    pub general: u32,
    /// SHORT_CONF: short detection levels and filters
    pub short: u32,
    /// DRV_CONF: gate drive current and BBM
    pub drive: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            general: 0x0000_0010,
            short: 0x1301_0606,
            drive: 0x0008_0000,
        }
    }
}

impl DriverConfig {
    /// Register image in the order it must be written.
    pub fn register_writes(&self) -> [RegisterWrite; GATE_DRIVER_WRITES] {
        [
            (tmc6200::GCONF, self.general),
            (tmc6200::SHORT_CONF, self.short),
            (tmc6200::DRV_CONF, self.drive),
        ]
    }
}

// ============================================================================
// Transport / Commands / Task
// ============================================================================

/// SPI transport settings
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportConfig {
    /// Per-byte exchange timeout in milliseconds
    pub timeout_ms: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { timeout_ms: 50 }
    }
}

impl TransportConfig {
    /// Set the per-byte timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Runtime motor command settings
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandConfig {
    /// Torque target written by rotate left/right (sign applied per direction)
    pub rotate_torque: i32,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            // Torque target 1000 in the high half
            rotate_torque: 0x03E8_0000,
        }
    }
}

impl CommandConfig {
    /// Set the rotate torque magnitude
    pub fn with_rotate_torque(mut self, rotate_torque: i32) -> Self {
        self.rotate_torque = rotate_torque;
        self
    }
}

/// Periodic motor task settings
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskConfig {
    /// Cycle period in milliseconds
    pub period_ms: u32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self { period_ms: 1000 }
    }
}

impl TaskConfig {
    /// Set the cycle period
    pub fn with_period_ms(mut self, period_ms: u32) -> Self {
        self.period_ms = period_ms;
        self
    }
}

/// Names used in diagnostics
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LabelConfig {
    /// Motion controller label
    pub motion_controller: ShortString,
    /// Gate driver label
    pub gate_driver: ShortString,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            motion_controller: short_string("TMC4671"),
            gate_driver: short_string("TMC6200"),
        }
    }
}

impl LabelConfig {
    /// Set the motion controller label (truncated to [`MAX_SHORT_STRING`])
    pub fn with_motion_controller(mut self, label: &str) -> Self {
        self.motion_controller = short_string(label);
        self
    }

    /// Set the gate driver label (truncated to [`MAX_SHORT_STRING`])
    pub fn with_gate_driver(mut self, label: &str) -> Self {
        self.gate_driver = short_string(label);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_controller_writes_follow_bring_up_order() {
        let writes = MotorConfig::default().register_writes();
        let addresses: [u8; MOTION_CONTROLLER_WRITES] = writes.map(|(a, _)| a);
        assert_eq!(
            addresses,
            [
                0x1B, 0x17, 0x18, 0x19, 0x1A, 0x0A, 0x04, 0x05, 0x06, 0x07, 0x09, 0x08, 0x33,
                0x37, 0x52, 0x50, 0x5E, 0x56, 0x54, 0x63
            ]
        );
    }

    #[test]
    fn motion_controller_addresses_are_unique() {
        let writes = MotorConfig::default().register_writes();
        for (i, (a, _)) in writes.iter().enumerate() {
            assert!(writes[i + 1..].iter().all(|(b, _)| a != b), "duplicate {a:#04x}");
        }
    }

    #[test]
    fn gate_driver_defaults() {
        assert_eq!(
            DriverConfig::default().register_writes(),
            [(0x00, 0x0000_0010), (0x09, 0x1301_0606), (0x0A, 0x0008_0000)]
        );
    }

    #[test]
    fn pole_pairs_keep_motor_type() {
        let motor = MotorConfig::default().with_pole_pairs(11);
        assert_eq!(motor.motor_type_n_pole_pairs, 0x0003_000B);
    }

    #[test]
    fn ambient_defaults() {
        let config = BoardConfig::default();
        assert_eq!(config.transport.timeout_ms, 50);
        assert_eq!(config.task.period_ms, 1000);
        assert_eq!(config.commands.rotate_torque, 0x03E8_0000);
        assert_eq!(config.labels.gate_driver.as_str(), "TMC6200");
    }

    #[test]
    fn short_string_truncates_on_char_boundary() {
        let long = "é".repeat(40);
        let s = short_string(&long);
        assert!(s.len() <= MAX_SHORT_STRING);
        assert!(s.chars().all(|c| c == 'é'));
        assert_eq!(short_string("GD-1").as_str(), "GD-1");
    }
}
