//! # rs-motorboard
//!
//! Control-plane firmware core for a brushless motor controller board with a
//! TMC4671 motion controller, a TMC6200 gate driver and a CAN interface.
//!
//! ## Features
//!
//! - **CAN dispatch**: Static identifier table routing frames to typed handlers
//! - **Register protocol**: 40-bit SPI datagrams with chip-select sequencing
//! - **Initialize then verify**: Both chips are configured and read back before
//!   the power stage is enabled
//! - **Torque commands**: Single-register writes for runtime control
//! - **Fault reporting**: Transport failures raise a datastore flag and never abort
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `traits` - Hardware and collaborator abstractions
//! - `transport` - Byte-level SPI with chip selects
//! - `registers` - Register datagrams and chip address maps
//! - `init` - Start-up configuration and verification
//! - `motor` - Torque commands
//! - `can` - Frame dispatch table and handlers
//! - `task` - Periodic motor task
//! - `hal` - Concrete implementations (mock for testing, esp32 for hardware)
//!
//! ## Example
//!
//! ```rust
//! use rs_motorboard::{
//!     can::{encode_throttle, CanDispatcher, CanFrame, HandlerContext},
//!     config::BoardConfig,
//!     hal::{MockBoard, MockDebugSink, MockEnablePin},
//!     init::MotorInitializer,
//!     motor::MotorCommands,
//!     traits::Datastore,
//!     transport::RegisterTransport,
//!     SharedDatastore,
//! };
//!
//! let board = MockBoard::new();
//! let datastore = SharedDatastore::new();
//! let sink = MockDebugSink::new();
//! let config = BoardConfig::default();
//!
//! // Bring up both chips
//! let mut bus = RegisterTransport::new(board.spi(), board.chip_selects(), &datastore, &sink);
//! let report = MotorInitializer::new(&config).run(&mut bus, &mut MockEnablePin::new(), &sink);
//! assert!(report.is_ready());
//!
//! // React to a throttle frame
//! let frame = CanFrame::new(0x0001, &encode_throttle(40)).unwrap();
//! CanDispatcher::new().dispatch(&frame, &HandlerContext::new(&datastore, &sink));
//! assert_eq!(datastore.throttle_percentage(), 40);
//!
//! // Spin the motor
//! let mut motor = MotorCommands::new(&mut bus, &sink, &config.commands);
//! motor.rotate_right().unwrap();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// CAN frame dispatch table and message handlers.
pub mod can;
/// Board configuration with register images and runtime settings.
pub mod config;
/// Lock-free datastore implementation.
pub mod datastore;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Start-up configuration and verification sequence.
pub mod init;
/// Runtime torque commands.
pub mod motor;
/// Register datagrams and chip address maps.
pub mod registers;
/// Periodic motor task.
pub mod task;
/// Core traits for hardware and collaborator abstraction.
pub mod traits;
/// Byte-level SPI transport with chip-select sequencing.
pub mod transport;

/// Register bus shared between tasks (std only).
#[cfg(feature = "std")]
pub mod shared;

// Re-exports for convenience
pub use can::{CanDispatcher, CanFrame, DecodeError, DispatchOutcome, HandlerContext};
pub use datastore::SharedDatastore;
pub use init::{Component, InitReport, InitState, MotorInitializer};
pub use motor::MotorCommands;
pub use registers::{Chip, RegisterAccess};
pub use task::MotorTask;
pub use traits::{
    // Hardware
    CanReceiver,
    ChipSelectLine,
    ChipSelectPins,
    Clock,
    // Collaborators
    Datastore,
    DebugSink,
    EnablePin,
    PinLevel,
    Severity,
    SpiTransport,
    TransportError,
};
pub use transport::RegisterTransport;

// Config re-exports
pub use config::{BoardConfig, CommandConfig, DriverConfig, MotorConfig, TaskConfig, TransportConfig};

#[cfg(feature = "std")]
pub use shared::SharedRegisterBus;
