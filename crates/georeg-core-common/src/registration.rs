//! The seam through which drivers register themselves.
//!
//! Every built-in or plugin driver exposes a registration entry point that
//! receives a [`DriverSink`] and registers its own descriptor(s) into it.
//! Passing the sink in, instead of reaching for a process-wide registry,
//! lets several independent registries coexist (isolated test runs, embedded
//! hosts).

use std::sync::{Arc, Mutex, PoisonError};

use crate::drivers::Driver;
use crate::error::DriverError;

/// Anything drivers can register into.
pub trait DriverSink: Send + Sync {
    /// Registers (or replaces) a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MalformedDriver`] if the descriptor fails shape
    /// validation; nothing is registered in that case.
    fn register_driver(&self, driver: Driver) -> Result<(), DriverError>;
}

/// A registration entry point of a built-in driver.
pub type RegisterFn = fn(&dyn DriverSink) -> Result<(), DriverError>;

/// A registration entry point as produced by a loaded plugin module.
pub type RegistrationEntry =
    Arc<dyn Fn(&dyn DriverSink) -> Result<(), DriverError> + Send + Sync>;

/// Sink that only collects descriptors, for inspection before committing
/// them anywhere.
#[derive(Default)]
pub struct CollectingSink {
    drivers: Mutex<Vec<Driver>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the sink and returns the collected descriptors in
    /// registration order.
    #[must_use]
    pub fn into_drivers(self) -> Vec<Driver> {
        self.drivers
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl DriverSink for CollectingSink {
    fn register_driver(&self, driver: Driver) -> Result<(), DriverError> {
        driver.validate()?;
        let mut drivers = self.drivers.lock().unwrap_or_else(PoisonError::into_inner);
        match drivers
            .iter_mut()
            .find(|d| d.code().eq_ignore_ascii_case(driver.code()))
        {
            Some(existing) => *existing = driver,
            None => drivers.push(driver),
        }
        Ok(())
    }
}
