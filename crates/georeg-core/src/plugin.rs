//! Plugin loader for drivers packaged outside the core binary.
//!
//! This module resolves a driver code to a plugin module, loads it, runs its
//! registration entry point and folds the result into a [`DriverTable`].
//!
//! Locating and loading modules is delegated to a [`PluginHost`]:
//!
//! - [`DirectoryPluginHost`] scans search directories for
//!   `georeg_<CODE>.<dll extension>` files and hands the actual mapping of a
//!   module to a [`ModuleLoader`].
//! - [`StaticPluginHost`] serves modules compiled into the process, for
//!   embedding and for tests.
//!
//! A module's entry point registers into a collecting sink first. Nothing
//! reaches the table unless the module registered the code it was loaded for.

use std::collections::HashSet;
use std::env::consts::DLL_EXTENSION;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use georeg_core_common::{CollectingSink, Driver, DriverSink, RegistrationEntry};
use log::{debug, info, warn};

use crate::error::PluginError;
use crate::table::{DriverEntry, DriverOrigin, DriverTable};

/// File name prefix of plugin modules.
pub const PLUGIN_PREFIX: &str = "georeg_";

/// A plugin module found by a host, not yet loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginLocation {
    /// Driver code the module is named after.
    pub code: String,
    /// Where the module lives.
    pub path: PathBuf,
}

/// Resolves driver codes to plugin modules and loads them.
pub trait PluginHost: Send + Sync {
    /// Finds the module for `code`, if one is installed.
    fn locate(&self, code: &str) -> Option<PluginLocation>;

    /// Lists every installed module.
    fn enumerate(&self) -> Vec<PluginLocation>;

    /// Loads a module and returns its registration entry point.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Load`] when the module cannot be loaded or
    /// initialized.
    fn load(&self, location: &PluginLocation) -> Result<RegistrationEntry, PluginError>;

    /// Directories this host scans, if it scans any.
    fn search_paths(&self) -> Option<&[PathBuf]> {
        None
    }
}

/// Maps a module file into the process and returns its entry point.
pub trait ModuleLoader: Send + Sync {
    /// # Errors
    ///
    /// Any error describing why the module could not be loaded.
    fn load_module(&self, path: &Path) -> anyhow::Result<RegistrationEntry>;
}

/// Loader for builds without dynamic loading support; every load fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDynamicLoading;

impl ModuleLoader for NoDynamicLoading {
    fn load_module(&self, path: &Path) -> anyhow::Result<RegistrationEntry> {
        Err(anyhow::anyhow!(
            "dynamic module loading is not available in this build (module {})",
            path.display()
        ))
    }
}

/// File name of the plugin module for `code` on this platform.
#[must_use]
pub fn plugin_file_name(code: &str) -> String {
    format!("{PLUGIN_PREFIX}{code}.{DLL_EXTENSION}")
}

fn code_from_file_name(path: &Path) -> Option<String> {
    if path.extension().and_then(|s| s.to_str()) != Some(DLL_EXTENSION) {
        return None;
    }
    let stem = path.file_stem().and_then(|s| s.to_str())?;
    let code = stem.strip_prefix(PLUGIN_PREFIX)?;
    (!code.is_empty()).then(|| code.to_string())
}

/// Finds plugin modules in a list of directories.
pub struct DirectoryPluginHost {
    search_paths: Vec<PathBuf>,
    loader: Arc<dyn ModuleLoader>,
}

impl DirectoryPluginHost {
    pub fn new(search_paths: Vec<PathBuf>, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            search_paths,
            loader,
        }
    }

    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn add_search_path(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }
}

impl PluginHost for DirectoryPluginHost {
    fn locate(&self, code: &str) -> Option<PluginLocation> {
        let file_name = plugin_file_name(code);
        let exact = self
            .search_paths
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file());
        if let Some(path) = exact {
            return Some(PluginLocation {
                code: code.to_string(),
                path,
            });
        }
        self.enumerate()
            .into_iter()
            .find(|location| location.code.eq_ignore_ascii_case(code))
    }

    fn enumerate(&self) -> Vec<PluginLocation> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for dir in &self.search_paths {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Skipping plugin directory {}: {e}", dir.display());
                    continue;
                },
            };
            let mut paths: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect();
            paths.sort();
            for path in paths {
                let Some(code) = code_from_file_name(&path) else {
                    continue;
                };
                // Earlier directories shadow later ones.
                if seen.insert(code.to_ascii_uppercase()) {
                    found.push(PluginLocation { code, path });
                }
            }
        }
        found
    }

    fn load(&self, location: &PluginLocation) -> Result<RegistrationEntry, PluginError> {
        self.loader
            .load_module(&location.path)
            .map_err(|e| PluginError::Load {
                code: location.code.clone(),
                path: location.path.clone(),
                reason: format!("{e:#}"),
            })
    }

    fn search_paths(&self) -> Option<&[PathBuf]> {
        Some(&self.search_paths)
    }
}

impl fmt::Debug for DirectoryPluginHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryPluginHost")
            .field("search_paths", &self.search_paths)
            .finish_non_exhaustive()
    }
}

enum StaticModule {
    Ready(RegistrationEntry),
    Broken(String),
}

/// In-process plugin modules.
#[derive(Default)]
pub struct StaticPluginHost {
    modules: RwLock<Vec<(String, StaticModule)>>,
}

impl StaticPluginHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module named `code` whose entry point is `entry`.
    pub fn add<F>(&self, code: &str, entry: F)
    where
        F: Fn(&dyn DriverSink) -> Result<(), georeg_core_common::DriverError>
            + Send
            + Sync
            + 'static,
    {
        self.insert(code, StaticModule::Ready(Arc::new(entry)));
    }

    /// Adds a module that fails to load with `reason`.
    pub fn add_broken(&self, code: &str, reason: &str) {
        self.insert(code, StaticModule::Broken(reason.to_string()));
    }

    fn insert(&self, code: &str, module: StaticModule) {
        let mut modules = self.modules.write().unwrap_or_else(PoisonError::into_inner);
        modules.retain(|(c, _)| !c.eq_ignore_ascii_case(code));
        modules.push((code.to_string(), module));
    }

    fn location(code: &str) -> PluginLocation {
        PluginLocation {
            code: code.to_string(),
            path: PathBuf::from("static").join(plugin_file_name(code)),
        }
    }
}

impl PluginHost for StaticPluginHost {
    fn locate(&self, code: &str) -> Option<PluginLocation> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        modules
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(code))
            .map(|(c, _)| Self::location(c))
    }

    fn enumerate(&self) -> Vec<PluginLocation> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        modules.iter().map(|(c, _)| Self::location(c)).collect()
    }

    fn load(&self, location: &PluginLocation) -> Result<RegistrationEntry, PluginError> {
        let modules = self.modules.read().unwrap_or_else(PoisonError::into_inner);
        match modules
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(&location.code))
        {
            Some((_, StaticModule::Ready(entry))) => Ok(Arc::clone(entry)),
            Some((_, StaticModule::Broken(reason))) => Err(PluginError::Load {
                code: location.code.clone(),
                path: location.path.clone(),
                reason: reason.clone(),
            }),
            None => Err(PluginError::NotFound {
                code: location.code.clone(),
            }),
        }
    }
}

/// Outcome of [`PluginLoader::auto_discover`].
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Codes loaded, in discovery order.
    pub loaded: Vec<String>,
    /// Plugins that failed, each with its error.
    pub failures: Vec<(String, PluginError)>,
}

impl DiscoveryReport {
    #[must_use]
    pub fn count(&self) -> usize {
        self.loaded.len()
    }
}

/// Loads plugin drivers through a [`PluginHost`].
#[derive(Clone)]
pub struct PluginLoader {
    host: Arc<dyn PluginHost>,
}

impl PluginLoader {
    pub fn new(host: Arc<dyn PluginHost>) -> Self {
        Self { host }
    }

    /// Configured paths that this loader's host never scans.
    #[must_use]
    pub fn unsearched(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        let searched = self.host.search_paths().unwrap_or_default();
        paths
            .iter()
            .filter(|p| !searched.contains(p))
            .cloned()
            .collect()
    }

    /// Runs the module for `code` into a collecting sink and returns what it
    /// registered, which always includes `code`.
    fn collect(&self, code: &str) -> Result<Vec<Driver>, PluginError> {
        let location = self
            .host
            .locate(code)
            .ok_or_else(|| PluginError::NotFound {
                code: code.to_string(),
            })?;
        debug!("Loading plugin {} from {}", code, location.path.display());
        let entry = self.host.load(&location)?;

        let sink = CollectingSink::new();
        entry(&sink).map_err(|e| PluginError::Load {
            code: code.to_string(),
            path: location.path.clone(),
            reason: e.to_string(),
        })?;
        let drivers = sink.into_drivers();

        if !drivers.iter().any(|d| d.code().eq_ignore_ascii_case(code)) {
            return Err(PluginError::RegistrationMismatch {
                expected: code.to_string(),
                registered: drivers.iter().map(|d| d.code().to_string()).collect(),
            });
        }
        Ok(drivers)
    }

    /// Loads the plugin for `code` and returns its descriptor without
    /// committing anything to a table.
    ///
    /// Used to materialize deferred stubs, which splice the descriptor
    /// themselves.
    ///
    /// # Errors
    ///
    /// See [`PluginLoader::load_by_name`].
    pub fn fetch(&self, code: &str) -> Result<Driver, PluginError> {
        let drivers = self.collect(code)?;
        drivers
            .into_iter()
            .find(|d| d.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| PluginError::RegistrationMismatch {
                expected: code.to_string(),
                registered: Vec::new(),
            })
    }

    /// Loads exactly one named plugin into `table`.
    ///
    /// Every descriptor the module registers is committed, as long as one of
    /// them carries `code`.
    ///
    /// # Errors
    ///
    /// [`PluginError::NotFound`] if no module resolves, [`PluginError::Load`]
    /// if it fails to load or its entry point fails,
    /// [`PluginError::RegistrationMismatch`] if it registers another code or
    /// none at all.
    pub fn load_by_name(&self, table: &DriverTable, code: &str) -> Result<(), PluginError> {
        for driver in self.collect(code)? {
            table.insert_entry(
                DriverEntry::Loaded(Arc::new(driver)),
                DriverOrigin::Plugin,
                None,
            );
        }
        info!("Loaded plugin driver {code}");
        Ok(())
    }

    /// Loads every installed plugin whose code is not in `table` yet.
    ///
    /// Failures are logged and recorded; they never stop the remaining
    /// plugins from loading.
    pub fn auto_discover(&self, table: &DriverTable) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        for location in self.host.enumerate() {
            if table.contains(&location.code) {
                debug!("Plugin {} already registered, skipping", location.code);
                continue;
            }
            match self.load_by_name(table, &location.code) {
                Ok(()) => report.loaded.push(location.code),
                Err(err) => {
                    warn!("Skipping plugin {}: {err}", location.code);
                    report.failures.push((location.code, err));
                },
            }
        }
        report
    }
}

impl fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLoader").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn register(code: &'static str) -> impl Fn(&dyn DriverSink) -> Result<(), georeg_core_common::DriverError> + Send + Sync + 'static {
        move |sink: &dyn DriverSink| sink.register_driver(Driver::builder(code, code).raster().build())
    }

    #[test]
    fn test_load_by_name_commits_on_match() {
        let host = StaticPluginHost::new();
        host.add("netCDF", register("netCDF"));
        let loader = PluginLoader::new(Arc::new(host));
        let table = DriverTable::new();

        loader.load_by_name(&table, "netcdf").unwrap();
        assert_eq!(table.origin("NETCDF"), Some(DriverOrigin::Plugin));
    }

    #[test]
    fn test_mismatch_commits_nothing() {
        let host = StaticPluginHost::new();
        host.add("Wanted", register("Other"));
        host.add("Silent", |_: &dyn DriverSink| Ok(()));
        let loader = PluginLoader::new(Arc::new(host));
        let table = DriverTable::new();

        let err = loader.load_by_name(&table, "Wanted").unwrap_err();
        assert_eq!(
            err,
            PluginError::RegistrationMismatch {
                expected: "Wanted".to_string(),
                registered: vec!["Other".to_string()],
            }
        );
        assert!(matches!(
            loader.load_by_name(&table, "Silent"),
            Err(PluginError::RegistrationMismatch { ref registered, .. }) if registered.is_empty()
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_not_found_and_load_errors() {
        let host = StaticPluginHost::new();
        host.add_broken("Broken", "undefined symbol: georeg_register");
        let loader = PluginLoader::new(Arc::new(host));
        let table = DriverTable::new();

        assert!(matches!(
            loader.load_by_name(&table, "Nothing"),
            Err(PluginError::NotFound { .. })
        ));
        assert!(matches!(
            loader.load_by_name(&table, "Broken"),
            Err(PluginError::Load { ref reason, .. }) if reason.contains("undefined symbol")
        ));
    }

    #[test]
    fn test_auto_discover_tolerates_failures() {
        let host = StaticPluginHost::new();
        host.add("One", register("One"));
        host.add_broken("Two", "bad module");
        host.add("Three", register("Three"));
        host.add("Present", register("Present"));
        let loader = PluginLoader::new(Arc::new(host));
        let table = DriverTable::new();
        table
            .register(Driver::builder("Present", "built in").build(), DriverOrigin::BuiltIn)
            .unwrap();

        let report = loader.auto_discover(&table);
        assert_eq!(report.loaded, ["One", "Three"]);
        assert_eq!(report.count(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "Two");
        assert_eq!(table.origin("Present"), Some(DriverOrigin::BuiltIn));
    }

    #[test]
    fn test_fetch_does_not_commit() {
        let host = StaticPluginHost::new();
        host.add("Lazy", register("Lazy"));
        let loader = PluginLoader::new(Arc::new(host));
        let driver = loader.fetch("Lazy").unwrap();
        assert_eq!(driver.code(), "Lazy");
    }

    #[test]
    fn test_directory_host_enumerates_modules() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(first.path().join(plugin_file_name("netCDF")), b"").unwrap();
        fs::write(first.path().join("README.txt"), b"").unwrap();
        fs::write(second.path().join(plugin_file_name("NETCDF")), b"").unwrap();
        fs::write(second.path().join(plugin_file_name("PDF")), b"").unwrap();

        let host = DirectoryPluginHost::new(
            vec![
                first.path().to_path_buf(),
                second.path().to_path_buf(),
                PathBuf::from("/definitely/not/here"),
            ],
            Arc::new(NoDynamicLoading),
        );
        let codes: Vec<String> = host.enumerate().into_iter().map(|l| l.code).collect();
        assert_eq!(codes, ["netCDF", "PDF"]);

        let location = host.locate("pdf").unwrap();
        assert_eq!(location.path, second.path().join(plugin_file_name("PDF")));
        assert!(host.locate("HDF5").is_none());
    }

    #[test]
    fn test_directory_host_reports_loader_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(plugin_file_name("PDF")), b"").unwrap();
        let host = DirectoryPluginHost::new(vec![dir.path().to_path_buf()], Arc::new(NoDynamicLoading));
        let loader = PluginLoader::new(Arc::new(host));

        let err = loader.fetch("PDF").unwrap_err();
        assert!(matches!(err, PluginError::Load { .. }));
        assert!(err.to_string().contains("not available in this build"));
    }
}
