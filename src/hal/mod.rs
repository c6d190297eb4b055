//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`] for various platforms.
//!
//! # Available Implementations
//!
//! - `mock`: Test implementations for desktop development (requires `std`)
//! - `log_sink`: Debug sinks on top of the `log` facade
//! - `embedded`: Adapters for any `embedded-hal` 1.0 SPI bus and pins (requires `embedded-hal` feature)
//! - `esp32`: ESP32-C3 board with TMC4671/TMC6200 and TWAI (requires `esp32` feature)

pub mod log_sink;

#[cfg(feature = "std")]
pub mod mock;

#[cfg(feature = "embedded-hal")]
pub mod embedded;

#[cfg(feature = "esp32")]
pub mod esp32;

pub use log_sink::*;

#[cfg(feature = "std")]
pub use mock::*;
