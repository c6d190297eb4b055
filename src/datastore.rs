//! Lock-free datastore for the values this crate publishes.
//!
//! [`SharedDatastore`] keeps each value in its own atomic so the CAN receive
//! path and the motor task can both touch it without a critical section.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::traits::Datastore;

/// Datastore backed by atomics.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use rs_motorboard::SharedDatastore;
/// use rs_motorboard::traits::Datastore;
///
/// let datastore = Arc::new(SharedDatastore::new());
/// datastore.set_throttle_percentage(42);
/// assert_eq!(datastore.throttle_percentage(), 42);
///
/// datastore.set_spi_fault(true);
/// assert!(datastore.spi_fault());
/// datastore.clear_spi_fault();
/// assert!(!datastore.spi_fault());
/// assert_eq!(datastore.spi_fault_events(), 1);
/// ```
#[derive(Debug, Default)]
pub struct SharedDatastore {
    throttle_percentage: AtomicU32,
    spi_fault: AtomicBool,
    spi_fault_events: AtomicU32,
}

impl SharedDatastore {
    /// Creates an empty datastore: throttle 0, no fault.
    pub const fn new() -> Self {
        Self {
            throttle_percentage: AtomicU32::new(0),
            spi_fault: AtomicBool::new(false),
            spi_fault_events: AtomicU32::new(0),
        }
    }

    /// Clears the SPI fault flag. The event counter is kept.
    pub fn clear_spi_fault(&self) {
        self.spi_fault.store(false, Ordering::Release);
    }

    /// Number of times the SPI fault flag has been raised since start-up.
    pub fn spi_fault_events(&self) -> u32 {
        self.spi_fault_events.load(Ordering::Relaxed)
    }
}

impl Datastore for SharedDatastore {
    fn set_throttle_percentage(&self, percentage: u32) {
        self.throttle_percentage.store(percentage, Ordering::Release);
    }

    fn throttle_percentage(&self) -> u32 {
        self.throttle_percentage.load(Ordering::Acquire)
    }

    fn set_spi_fault(&self, fault: bool) {
        if fault {
            self.spi_fault_events.fetch_add(1, Ordering::Relaxed);
        }
        self.spi_fault.store(fault, Ordering::Release);
    }

    fn spi_fault(&self) -> bool {
        self.spi_fault.load(Ordering::Acquire)
    }
}
