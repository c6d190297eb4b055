//! Interfaces to the firmware services this crate reports into.
//!
//! The debug sink and the datastore are owned elsewhere in the firmware. The
//! core only needs to push diagnostic text into one and read/write a handful
//! of values in the other, so both are modelled as `&self` traits that can be
//! shared between the motor task and the CAN receive path.

use alloc::sync::Arc;
use core::fmt;

/// Severity of a diagnostic record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Verbose protocol tracing.
    Debug,
    /// Normal progress messages.
    Info,
    /// Something unexpected that the firmware recovered from.
    Warning,
    /// A failed operation.
    Error,
}

/// Opaque sink for diagnostic text (the board's serial debug port).
///
/// Emitting must never fail and must be callable from any context.
///
/// # Example
///
/// ```rust
/// use rs_motorboard::traits::{DebugSink, Severity};
/// use rs_motorboard::hal::MockDebugSink;
///
/// let sink = MockDebugSink::new();
/// sink.emit(Severity::Info, format_args!("motor loop"));
/// assert!(sink.contains("motor loop"));
/// ```
pub trait DebugSink {
    /// Records one diagnostic line.
    fn emit(&self, severity: Severity, message: fmt::Arguments<'_>);

    /// Shorthand for an [`Severity::Info`] record.
    fn info(&self, message: fmt::Arguments<'_>) {
        self.emit(Severity::Info, message);
    }

    /// Shorthand for an [`Severity::Error`] record.
    fn error(&self, message: fmt::Arguments<'_>) {
        self.emit(Severity::Error, message);
    }
}

impl<T: DebugSink + ?Sized> DebugSink for &T {
    fn emit(&self, severity: Severity, message: fmt::Arguments<'_>) {
        (**self).emit(severity, message);
    }
}

impl<T: DebugSink + ?Sized> DebugSink for Arc<T> {
    fn emit(&self, severity: Severity, message: fmt::Arguments<'_>) {
        (**self).emit(severity, message);
    }
}

/// Key/value store shared by all firmware tasks.
///
/// The core writes the throttle percentage decoded from CAN and raises the SPI
/// fault flag. Clearing the flag is the datastore owner's decision.
pub trait Datastore {
    /// Stores the most recent throttle command.
    fn set_throttle_percentage(&self, percentage: u32);

    /// Returns the most recent throttle command.
    fn throttle_percentage(&self) -> u32;

    /// Raises (`true`) or clears (`false`) the SPI fault flag.
    fn set_spi_fault(&self, fault: bool);

    /// Returns whether an SPI transfer has failed.
    fn spi_fault(&self) -> bool;
}

impl<T: Datastore + ?Sized> Datastore for &T {
    fn set_throttle_percentage(&self, percentage: u32) {
        (**self).set_throttle_percentage(percentage);
    }

    fn throttle_percentage(&self) -> u32 {
        (**self).throttle_percentage()
    }

    fn set_spi_fault(&self, fault: bool) {
        (**self).set_spi_fault(fault);
    }

    fn spi_fault(&self) -> bool {
        (**self).spi_fault()
    }
}

impl<T: Datastore + ?Sized> Datastore for Arc<T> {
    fn set_throttle_percentage(&self, percentage: u32) {
        (**self).set_throttle_percentage(percentage);
    }

    fn throttle_percentage(&self) -> u32 {
        (**self).throttle_percentage()
    }

    fn set_spi_fault(&self, fault: bool) {
        (**self).set_spi_fault(fault);
    }

    fn spi_fault(&self) -> bool {
        (**self).spi_fault()
    }
}
