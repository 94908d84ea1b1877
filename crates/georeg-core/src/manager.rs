//! The driver manager: one registry instance with an explicit lifecycle.
//!
//! [`DriverManager::initialize`] runs the startup sequence:
//!
//! 1. register the built-in table (eager drivers and deferred stubs),
//! 2. auto-load installed plugins,
//! 3. apply the skip list, after every candidate is known,
//! 4. reorder the probe order.
//!
//! Afterwards the manager identifies, opens and creates datasets by walking
//! the probe order. Several managers can live side by side; nothing here is
//! process-global.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use georeg_core_common::{
    CreateRequest, Dataset, Driver, DriverCapabilities, DriverError, Identification, OpenInfo,
    options::validate_creation_options,
};
use georeg_gtiff::CodecError;
use log::{debug, info, warn};

use crate::builtin::register_builtin_drivers;
use crate::config::RegistryConfig;
use crate::deferred::DeferredDriver;
use crate::error::{GeoRegError, MaterializationError, Result};
use crate::plugin::{DirectoryPluginHost, DiscoveryReport, ModuleLoader, PluginHost, PluginLoader};
use crate::policy::{SkipList, SkipPolicy};
use crate::reorder::ReorderPlan;
use crate::table::{DriverEntry, DriverOrigin, DriverTable};

/// What [`DriverManager::initialize`] did.
#[derive(Debug, Default)]
pub struct InitReport {
    /// Eagerly registered built-in drivers.
    pub registered: Vec<String>,
    /// Declared deferred stubs.
    pub deferred: Vec<String>,
    /// Drivers loaded from plugin modules.
    pub plugins_loaded: Vec<String>,
    /// Drivers that failed to register or load, with the reason.
    pub failures: Vec<(String, String)>,
    /// Drivers removed by the skip list.
    pub skipped: Vec<String>,
    /// Configured plugin directories the manager's plugin host does not
    /// scan.
    pub ignored_search_paths: Vec<PathBuf>,
}

/// Listing row of [`DriverManager::drivers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSummary {
    pub code: String,
    pub long_name: String,
    pub origin: DriverOrigin,
    /// Still a stub; capabilities unknown until first use.
    pub deferred: bool,
    pub capabilities: Option<DriverCapabilities>,
    pub extensions: Vec<String>,
}

impl DriverSummary {
    fn new(entry: &DriverEntry, origin: DriverOrigin) -> Self {
        let (capabilities, extensions) = match entry {
            DriverEntry::Loaded(driver) => {
                (Some(driver.capabilities()), driver.extensions().to_vec())
            },
            DriverEntry::Deferred(stub) => (None, stub.extensions().to_vec()),
        };
        Self {
            code: entry.code().to_string(),
            long_name: entry.long_name().to_string(),
            origin,
            deferred: entry.is_deferred(),
            capabilities,
            extensions,
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    initialized: bool,
    skip_policy: SkipPolicy,
    /// Entries removed by the skip list, still reachable by code under
    /// [`SkipPolicy::AutoProbeOnly`].
    parked: Vec<(DriverEntry, DriverOrigin)>,
}

/// A driver registry with an explicit `initialize` / `shutdown` lifecycle.
pub struct DriverManager {
    table: DriverTable,
    loader: PluginLoader,
    lifecycle: Mutex<Lifecycle>,
}

/// The driver a probe settled on, and the dataset if probing had to open it.
struct Claim {
    driver: Arc<Driver>,
    dataset: Option<Box<dyn Dataset>>,
}

impl DriverManager {
    /// A manager whose plugins come from `host`.
    pub fn new(host: Arc<dyn PluginHost>) -> Self {
        Self {
            table: DriverTable::new(),
            loader: PluginLoader::new(host),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    /// A manager looking for plugin modules in `search_paths`.
    pub fn with_search_paths(search_paths: Vec<PathBuf>, loader: Arc<dyn ModuleLoader>) -> Self {
        Self::new(Arc::new(DirectoryPluginHost::new(search_paths, loader)))
    }

    /// Runs the startup sequence. Calling it again before
    /// [`DriverManager::shutdown`] does nothing and returns an empty report.
    pub fn initialize(&self, config: &RegistryConfig) -> InitReport {
        let mut lifecycle = self.lock();
        if lifecycle.initialized {
            debug!("Driver manager already initialized");
            return InitReport::default();
        }

        let mut report = InitReport::default();
        let builtin = register_builtin_drivers(&self.table, &self.loader);
        report.registered = builtin.registered;
        report.deferred = builtin.deferred;
        report
            .failures
            .extend(builtin.failures.into_iter().map(|(c, e)| (c, e.to_string())));

        report.ignored_search_paths = self.loader.unsearched(&config.plugin_search_paths);
        for path in &report.ignored_search_paths {
            warn!(
                "Plugin search path {} is not scanned by this manager's plugin host",
                path.display()
            );
        }

        if config.autoload_plugins {
            let discovered = self.loader.auto_discover(&self.table);
            report.plugins_loaded = discovered.loaded;
            report
                .failures
                .extend(discovered.failures.into_iter().map(|(c, e)| (c, e.to_string())));
        } else {
            debug!("Plugin auto-loading disabled");
        }

        let removed = config.skip_list.apply(&self.table);
        report.skipped = removed.iter().map(|(e, _)| e.code().to_string()).collect();
        lifecycle.parked.extend(removed);
        lifecycle.skip_policy = config.skip_policy;

        config.reorder_plan.apply(&self.table);
        lifecycle.initialized = true;

        info!(
            "Driver manager initialized: {} drivers ({} deferred, {} from plugins, {} skipped)",
            self.table.len(),
            report.deferred.len(),
            report.plugins_loaded.len(),
            report.skipped.len()
        );
        report
    }

    /// Drops every driver and returns to the uninitialized state.
    pub fn shutdown(&self) {
        let mut lifecycle = self.lock();
        self.table.clear();
        *lifecycle = Lifecycle::default();
        debug!("Driver manager shut down");
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// The underlying table.
    #[must_use]
    pub fn table(&self) -> &DriverTable {
        &self.table
    }

    #[must_use]
    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    /// Registers a driver at the end of the probe order, or in place if its
    /// code is already registered.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MalformedDriver`] for an invalid descriptor.
    pub fn register(&self, driver: Driver) -> Result<()> {
        self.register_at(driver, None)
    }

    /// Registers a driver before `position`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MalformedDriver`] for an invalid descriptor.
    pub fn register_at(&self, driver: Driver, position: Option<usize>) -> Result<()> {
        self.table
            .register_at(driver, DriverOrigin::Application, position)?;
        Ok(())
    }

    /// Declares a driver to be loaded on first use.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MalformedDriver`] for an invalid code.
    pub fn declare_deferred(&self, stub: DeferredDriver, position: Option<usize>) -> Result<()> {
        self.table
            .declare_deferred(stub, DriverOrigin::Application, position)?;
        Ok(())
    }

    /// Raw entry for `code`, without materializing stubs. Skipped drivers
    /// are included unless the skip policy hides them everywhere.
    #[must_use]
    pub fn entry(&self, code: &str) -> Option<DriverEntry> {
        if let Some(entry) = self.table.find(code) {
            return Some(entry);
        }
        let lifecycle = self.lock();
        if lifecycle.skip_policy == SkipPolicy::Everywhere {
            return None;
        }
        lifecycle
            .parked
            .iter()
            .find(|(entry, _)| entry.code().eq_ignore_ascii_case(code))
            .map(|(entry, _)| entry.clone())
    }

    /// Looks a driver up by code, materializing it if it is deferred.
    ///
    /// # Errors
    ///
    /// [`DriverError::NotFound`] when no driver has that code (or it was
    /// skipped under [`SkipPolicy::Everywhere`]), or the stub's
    /// [`MaterializationError`].
    pub fn find(&self, code: &str) -> Result<Arc<Driver>> {
        if let Some(entry) = self.table.find(code) {
            return Ok(self.table.resolve(&entry)?);
        }
        let parked = self.entry(code).ok_or_else(|| DriverError::NotFound {
            name: code.to_string(),
            available: self.table.codes().join(", "),
        })?;
        Ok(self.resolve_parked(&parked)?)
    }

    fn resolve_parked(&self, entry: &DriverEntry) -> std::result::Result<Arc<Driver>, MaterializationError> {
        let DriverEntry::Deferred(stub) = entry else {
            return entry.driver();
        };
        let outcome = stub.materialize();
        let mut lifecycle = self.lock();
        let slot = lifecycle.parked.iter_mut().find(|(e, _)| {
            matches!(e, DriverEntry::Deferred(current) if Arc::ptr_eq(current, stub))
        });
        if let (Some((slot, _)), Ok(driver)) = (slot, &outcome) {
            *slot = DriverEntry::Loaded(Arc::clone(driver));
        }
        outcome
    }

    /// Snapshot of the probe order with listing details.
    #[must_use]
    pub fn drivers(&self) -> Vec<DriverSummary> {
        self.table
            .entries()
            .iter()
            .map(|(entry, origin)| DriverSummary::new(entry, *origin))
            .collect()
    }

    /// Codes in probe order.
    #[must_use]
    pub fn probe_order(&self) -> Vec<String> {
        self.table.codes()
    }

    /// Codes removed by the skip list.
    #[must_use]
    pub fn skipped(&self) -> Vec<String> {
        self.lock()
            .parked
            .iter()
            .map(|(entry, _)| entry.code().to_string())
            .collect()
    }

    /// Returns the first driver in probe order that claims the file.
    ///
    /// # Errors
    ///
    /// When no driver claims the file but a deferred driver that might have
    /// failed to load, that [`MaterializationError`] is returned so the
    /// caller learns about the missing dependency.
    pub fn identify(&self, info: &OpenInfo) -> Result<Option<Arc<Driver>>> {
        Ok(self.claim(info, false)?.map(|claim| claim.driver))
    }

    /// Opens a dataset with the first driver in probe order that claims it.
    ///
    /// # Errors
    ///
    /// [`GeoRegError::Unrecognized`] when nothing claims the file, the
    /// materialization error of a stub that might have, or the opener's
    /// error.
    pub fn open(&self, info: &OpenInfo) -> Result<Box<dyn Dataset>> {
        let claim = self
            .claim(info, true)?
            .ok_or_else(|| GeoRegError::Unrecognized {
                filename: info.filename().to_string(),
            })?;
        match claim.dataset {
            Some(dataset) => Ok(dataset),
            None => claim.driver.open(info).map_err(into_registry_error),
        }
    }

    /// Creates a dataset with the driver named `code`.
    ///
    /// Options the driver does not declare, or values outside their declared
    /// range, are logged as warnings; the driver itself decides what is
    /// fatal.
    ///
    /// # Errors
    ///
    /// Lookup errors as for [`DriverManager::find`], or the creator's error.
    /// Codec negotiation failures come back as [`GeoRegError::Codec`].
    pub fn create(&self, code: &str, request: &CreateRequest) -> Result<Box<dyn Dataset>> {
        let driver = self.find(code)?;
        for issue in validate_creation_options(driver.creation_options(), &request.options) {
            warn!("{}: {issue}", driver.code());
        }
        driver.create(request).map_err(into_registry_error)
    }

    /// Loads exactly one named plugin.
    ///
    /// # Errors
    ///
    /// The [`crate::PluginError`] describing why the plugin did not load.
    pub fn register_plugin(&self, code: &str) -> Result<()> {
        self.loader.load_by_name(&self.table, code)?;
        Ok(())
    }

    /// Loads every installed plugin not registered yet.
    pub fn auto_load_plugins(&self) -> DiscoveryReport {
        self.loader.auto_discover(&self.table)
    }

    /// Removes the listed drivers from the probe order and returns their
    /// codes. They stay reachable by code unless the skip policy is
    /// [`SkipPolicy::Everywhere`].
    pub fn apply_skip_list(&self, skip_list: &SkipList) -> Vec<String> {
        let removed = skip_list.apply(&self.table);
        let codes = removed.iter().map(|(e, _)| e.code().to_string()).collect();
        self.lock().parked.extend(removed);
        codes
    }

    pub fn set_skip_policy(&self, policy: SkipPolicy) {
        self.lock().skip_policy = policy;
    }

    pub fn reorder(&self, plan: &ReorderPlan) {
        plan.apply(&self.table);
    }

    /// Walks the probe order. Deferred stubs are only materialized when
    /// their own signatures or extensions point at the file.
    fn claim(&self, info: &OpenInfo, open: bool) -> Result<Option<Claim>> {
        let mut load_failure: Option<MaterializationError> = None;
        for entry in self.table.all() {
            let driver = match &entry {
                DriverEntry::Loaded(driver) => Arc::clone(driver),
                DriverEntry::Deferred(stub) => {
                    if stub.might_claim(info) == Identification::NotRecognized {
                        continue;
                    }
                    match self.table.resolve(&entry) {
                        Ok(driver) => driver,
                        Err(err) => {
                            warn!("Cannot probe {} with {}: {err}", info.filename(), err.code);
                            if load_failure.is_none() {
                                load_failure = Some(err);
                            }
                            continue;
                        },
                    }
                },
            };
            match driver.probe(info) {
                Identification::Recognized => {
                    debug!("{} recognized by {}", info.filename(), driver.code());
                    return Ok(Some(Claim {
                        driver,
                        dataset: None,
                    }));
                },
                Identification::Unknown if driver.has_opener() => match driver.open(info) {
                    Ok(dataset) => {
                        debug!("{} opened by {}", info.filename(), driver.code());
                        return Ok(Some(Claim {
                            driver,
                            dataset: open.then_some(dataset),
                        }));
                    },
                    Err(err) => debug!("{} rejected {}: {err:#}", driver.code(), info.filename()),
                },
                Identification::Unknown | Identification::NotRecognized => {},
            }
        }
        match load_failure {
            Some(err) => Err(err.into()),
            None => Ok(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DriverManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverManager")
            .field("table", &self.table)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

/// Turns a driver callback error back into a typed registry error where the
/// type is known.
fn into_registry_error(err: anyhow::Error) -> GeoRegError {
    let err = match err.downcast::<CodecError>() {
        Ok(codec) => return GeoRegError::Codec(codec),
        Err(err) => err,
    };
    match err.downcast::<DriverError>() {
        Ok(driver) => GeoRegError::Driver(driver),
        Err(err) => GeoRegError::Other(err),
    }
}
