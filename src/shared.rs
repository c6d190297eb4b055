//! Register bus shared between the motor task and the CAN receive path.
//!
//! `SharedRegisterBus` wraps a single [`RegisterAccess`] implementation in an
//! `Arc<Mutex<_>>`. Each register access takes the lock for the complete
//! datagram, so two contexts can never interleave bytes or chip-select
//! changes on the bus.
//!
//! # Example
//!
//! ```rust
//! use std::thread;
//! use rs_motorboard::hal::{MockBoard, NullSink};
//! use rs_motorboard::registers::{tmc4671, Chip, RegisterAccess};
//! use rs_motorboard::shared::SharedRegisterBus;
//! use rs_motorboard::transport::RegisterTransport;
//! use rs_motorboard::SharedDatastore;
//! use std::sync::Arc;
//!
//! let board = MockBoard::new();
//! let datastore = Arc::new(SharedDatastore::new());
//! let bus = SharedRegisterBus::new(RegisterTransport::new(
//!     board.spi(),
//!     board.chip_selects(),
//!     datastore,
//!     NullSink,
//! ));
//!
//! let mut task_bus = bus.clone();
//! thread::spawn(move || {
//!     task_bus
//!         .write_register(Chip::MotionController, tmc4671::PID_TORQUE_FLUX_TARGET, 0)
//!         .unwrap();
//! })
//! .join()
//! .unwrap();
//!
//! let asserted = bus.with_bus(|t| t.asserted_line());
//! assert_eq!(asserted, None);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::registers::{Chip, RegisterAccess};
use crate::transport::TransportError;

/// Cloneable handle to a register bus guarded by a mutex.
pub struct SharedRegisterBus<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Clone for SharedRegisterBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedRegisterBus<T> {
    /// Takes ownership of `bus`.
    pub fn new(bus: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(bus)),
        }
    }

    /// Runs `f` with exclusive access to the bus.
    ///
    /// Use this to group several register accesses into one critical section.
    pub fn with_bus<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// A panic in another context leaves the bus itself usable; chip
    /// selects are re-driven by the next access.
    fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: RegisterAccess> RegisterAccess for SharedRegisterBus<T> {
    fn write_register(
        &mut self,
        chip: Chip,
        address: u8,
        value: u32,
    ) -> Result<(), TransportError> {
        self.lock().write_register(chip, address, value)
    }

    fn read_register(&mut self, chip: Chip, address: u8) -> Result<u32, TransportError> {
        self.lock().read_register(chip, address)
    }

    fn release_chip_selects(&mut self) -> Result<(), TransportError> {
        self.lock().release_chip_selects()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockBoard, MockDatastore, MockDebugSink};
    use crate::registers::tmc6200;
    use crate::transport::RegisterTransport;

    #[test]
    fn clones_share_one_bus() {
        let board = MockBoard::new();
        let datastore = Arc::new(MockDatastore::new());
        let sink = Arc::new(MockDebugSink::new());
        let mut a = SharedRegisterBus::new(RegisterTransport::new(
            board.spi(),
            board.chip_selects(),
            datastore,
            sink,
        ));
        let mut b = a.clone();

        a.write_register(Chip::GateDriver, tmc6200::DRV_CONF, 0x0008_0000)
            .unwrap();
        assert_eq!(
            b.read_register(Chip::GateDriver, tmc6200::DRV_CONF),
            Ok(0x0008_0000)
        );
    }

    #[test]
    fn survives_poisoned_lock() {
        let board = MockBoard::new();
        let bus = SharedRegisterBus::new(RegisterTransport::new(
            board.spi(),
            board.chip_selects(),
            Arc::new(MockDatastore::new()),
            Arc::new(MockDebugSink::new()),
        ));
        let poisoner = bus.clone();
        let _ = std::thread::spawn(move || {
            poisoner.with_bus(|_| panic!("task died"));
        })
        .join();

        let mut bus = bus;
        assert!(bus.read_register(Chip::GateDriver, tmc6200::GCONF).is_ok());
    }
}
