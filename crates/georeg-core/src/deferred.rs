//! Deferred registration stubs.
//!
//! A stub stands in for a driver whose implementation (and native codec
//! dependencies) should only be brought up when a file actually needs it. It
//! carries enough to take part in probing (code, extensions, signatures) and a
//! materializer that produces the real descriptor.
//!
//! The state machine is explicit:
//!
//! ```text
//! Stub ──materialize()──▶ Materializing ──ok──▶ Materialized(driver)
//!                                       └─err─▶ Failed(error)
//! ```
//!
//! The transition out of `Stub` happens under the stub's mutex, so exactly one
//! caller runs the materializer. Concurrent callers block on a condition
//! variable until the outcome is known and then share it. A materializer
//! that panics settles the stub as `Failed`.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use georeg_core_common::{Driver, Identification, OpenInfo, Signature, drivers::extension_of};
use log::{debug, info, warn};

use crate::error::MaterializationError;

/// Produces the real descriptor of a deferred driver.
pub type Materializer = Box<dyn Fn() -> Result<Driver, MaterializationError> + Send + Sync>;

/// Lifecycle state of a [`DeferredDriver`].
#[derive(Debug, Clone)]
pub enum StubState {
    /// Declared, never touched.
    Stub,
    /// One caller is running the materializer.
    Materializing,
    /// The real driver is available.
    Materialized(Arc<Driver>),
    /// Materialization failed; the stub is removed from its table.
    Failed(MaterializationError),
}

impl StubState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stub => "stub",
            Self::Materializing => "materializing",
            Self::Materialized(_) => "materialized",
            Self::Failed(_) => "failed",
        }
    }
}

/// A lightweight placeholder for a driver that is loaded on first use.
pub struct DeferredDriver {
    code: String,
    long_name: String,
    extensions: Vec<String>,
    signatures: Vec<Signature>,
    missing_dependency: Option<String>,
    materializer: Materializer,
    state: Mutex<StubState>,
    settled: Condvar,
}

impl DeferredDriver {
    pub fn new(
        code: impl Into<String>,
        long_name: impl Into<String>,
        materializer: impl Fn() -> Result<Driver, MaterializationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            code: code.into(),
            long_name: long_name.into(),
            extensions: Vec::new(),
            signatures: Vec::new(),
            missing_dependency: None,
            materializer: Box::new(materializer),
            state: Mutex::new(StubState::Stub),
            settled: Condvar::new(),
        }
    }

    #[must_use]
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions.extend(
            extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase()),
        );
        self
    }

    #[must_use]
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signatures.push(signature);
        self
    }

    /// Names the native library the real driver needs, for diagnostics.
    #[must_use]
    pub fn with_dependency(mut self, dependency: &str) -> Self {
        self.missing_dependency = Some(dependency.to_string());
        self
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    #[must_use]
    pub fn dependency(&self) -> Option<&str> {
        self.missing_dependency.as_deref()
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> StubState {
        self.lock_state().clone()
    }

    /// Cheap pre-check used while probing, without materializing.
    ///
    /// A signature hit is [`Identification::Recognized`], an extension hit is
    /// [`Identification::Unknown`]. Files matching neither never force the
    /// real driver to load.
    #[must_use]
    pub fn might_claim(&self, info: &OpenInfo) -> Identification {
        if self.signatures.iter().any(|s| s.matches(info.header())) {
            return Identification::Recognized;
        }
        let by_extension = extension_of(info.filename())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext));
        if by_extension {
            Identification::Unknown
        } else {
            Identification::NotRecognized
        }
    }

    /// Returns the real driver, running the materializer on first use.
    ///
    /// Exactly one caller runs the materializer; callers arriving while it
    /// runs wait for its outcome. Once settled, the outcome is returned to
    /// every later caller without running the materializer again.
    ///
    /// # Errors
    ///
    /// Returns the [`MaterializationError`] of the (single) failed attempt.
    pub fn materialize(&self) -> Result<Arc<Driver>, MaterializationError> {
        let mut state = self.lock_state();
        loop {
            let in_flight = match &*state {
                StubState::Materialized(driver) => return Ok(Arc::clone(driver)),
                StubState::Failed(err) => return Err(err.clone()),
                StubState::Materializing => true,
                StubState::Stub => false,
            };
            if !in_flight {
                break;
            }
            state = self
                .settled
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *state = StubState::Materializing;
        drop(state);

        debug!("Materializing deferred driver {}", self.code);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.materializer)()))
            .unwrap_or_else(|_| Err(self.failure("materializer panicked")))
            .and_then(|driver| self.check(driver));

        let mut state = self.lock_state();
        let result = match outcome {
            Ok(driver) => {
                info!("Deferred driver {} materialized", self.code);
                *state = StubState::Materialized(Arc::clone(&driver));
                Ok(driver)
            },
            Err(err) => {
                warn!("{err}");
                *state = StubState::Failed(err.clone());
                Err(err)
            },
        };
        self.settled.notify_all();
        result
    }

    fn check(&self, driver: Driver) -> Result<Arc<Driver>, MaterializationError> {
        if !driver.code().eq_ignore_ascii_case(&self.code) {
            return Err(self.failure(format!(
                "materializer produced driver '{}'",
                driver.code()
            )));
        }
        driver
            .validate()
            .map_err(|e| self.failure(e.to_string()))?;
        Ok(Arc::new(driver))
    }

    /// A [`MaterializationError`] for this stub.
    #[must_use]
    pub fn failure(&self, reason: impl Into<String>) -> MaterializationError {
        MaterializationError {
            code: self.code.clone(),
            dependency: self.missing_dependency.clone(),
            reason: reason.into(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for DeferredDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredDriver")
            .field("code", &self.code)
            .field("long_name", &self.long_name)
            .field("extensions", &self.extensions)
            .field("dependency", &self.missing_dependency)
            .field("state", &self.lock_state().name())
            .finish_non_exhaustive()
    }
}
