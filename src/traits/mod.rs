//! Trait definitions for hardware abstraction and firmware collaborators.
//!
//! This module defines the core abstractions that allow rs-motorboard to:
//! - Run on different hardware (ESP32, any `embedded-hal` bus, desktop mock)
//! - Report into the firmware's debug port and datastore without owning them
//!
//! # Submodules
//!
//! - `hardware`: SPI byte exchange, chip selects, enable pin, CAN receive, clock
//! - `collaborators`: Debug sink and datastore
//!
//! # Hardware Abstraction
//!
//! The key hardware traits are:
//!
//! - [`SpiTransport`]: One full-duplex byte per call, with a timeout
//! - [`ChipSelectPins`]: Active-low select line per device
//! - [`EnablePin`]: Power stage enable
//! - [`CanReceiver`]: Frames delivered by the CAN peripheral
//! - [`Clock`]: Time source for `no_std` environments

pub mod collaborators;
pub mod hardware;

pub use collaborators::*;
pub use hardware::*;
