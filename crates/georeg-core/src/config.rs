//! Registry configuration.
//!
//! Settings come from the environment once, at initialization:
//!
//! - `GEOREG_SKIP`: comma or space separated driver codes to skip.
//! - `GEOREG_SKIP_POLICY`: `auto-probe` (default) or `everywhere`.
//! - `GEOREG_DRIVER_PATH`: plugin directories, separated like `PATH`. The
//!   value `disable` turns plugin auto-loading off.

use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::policy::{SkipList, SkipPolicy};
use crate::reorder::ReorderPlan;

pub const SKIP_VAR: &str = "GEOREG_SKIP";
pub const SKIP_POLICY_VAR: &str = "GEOREG_SKIP_POLICY";
pub const DRIVER_PATH_VAR: &str = "GEOREG_DRIVER_PATH";

/// Everything [`crate::DriverManager::initialize`] needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub skip_list: SkipList,
    pub skip_policy: SkipPolicy,
    /// Directories scanned for plugin modules. The manager does not build
    /// its plugin host from these; pass them to
    /// [`crate::DriverManager::with_search_paths`]. A manager whose host does
    /// not search them reports them in [`crate::InitReport`].
    pub plugin_search_paths: Vec<PathBuf>,
    pub autoload_plugins: bool,
    pub reorder_plan: ReorderPlan,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            skip_list: SkipList::new(),
            skip_policy: SkipPolicy::default(),
            plugin_search_paths: Vec::new(),
            autoload_plugins: true,
            reorder_plan: ReorderPlan::default_plan(),
        }
    }
}

impl RegistryConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for an unknown skip policy.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for an unknown skip policy.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(skip) = lookup(SKIP_VAR) {
            config.skip_list = SkipList::parse(&skip);
        }
        if let Some(policy) = lookup(SKIP_POLICY_VAR) {
            config.skip_policy = policy.parse()?;
        }
        if let Some(paths) = lookup(DRIVER_PATH_VAR) {
            config.set_driver_path(&paths);
        }
        Ok(config)
    }

    /// Applies a `GEOREG_DRIVER_PATH` style value.
    pub fn set_driver_path(&mut self, value: &str) {
        if value.trim().eq_ignore_ascii_case("disable") {
            self.autoload_plugins = false;
            self.plugin_search_paths.clear();
            return;
        }
        self.plugin_search_paths = env::split_paths(value)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
    }

    #[must_use]
    pub fn with_skip_list(mut self, skip_list: SkipList) -> Self {
        self.skip_list = skip_list;
        self
    }

    #[must_use]
    pub fn with_skip_policy(mut self, skip_policy: SkipPolicy) -> Self {
        self.skip_policy = skip_policy;
        self
    }

    #[must_use]
    pub fn with_plugin_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.plugin_search_paths.push(path.into());
        self
    }

    #[must_use]
    pub fn without_plugins(mut self) -> Self {
        self.autoload_plugins = false;
        self
    }

    #[must_use]
    pub fn with_reorder_plan(mut self, plan: ReorderPlan) -> Self {
        self.reorder_plan = plan;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = RegistryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RegistryConfig::default());
        assert!(config.autoload_plugins);
        assert_eq!(config.skip_policy, SkipPolicy::AutoProbeOnly);
    }

    #[test]
    fn test_reads_skip_and_paths() {
        let joined = env::join_paths(["/opt/georeg/plugins", "/usr/lib/georeg"]).unwrap();
        let joined = joined.to_string_lossy().into_owned();
        let config = RegistryConfig::from_lookup(lookup(&[
            (SKIP_VAR, "PNG, jpeg"),
            (SKIP_POLICY_VAR, "everywhere"),
            (DRIVER_PATH_VAR, joined.as_str()),
        ]))
        .unwrap();

        assert_eq!(config.skip_list.codes(), ["PNG", "jpeg"]);
        assert_eq!(config.skip_policy, SkipPolicy::Everywhere);
        assert_eq!(
            config.plugin_search_paths,
            [PathBuf::from("/opt/georeg/plugins"), PathBuf::from("/usr/lib/georeg")]
        );
    }

    #[test]
    fn test_driver_path_disable() {
        let config = RegistryConfig::from_lookup(lookup(&[(DRIVER_PATH_VAR, "DISABLE")])).unwrap();
        assert!(!config.autoload_plugins);
        assert!(config.plugin_search_paths.is_empty());
    }

    #[test]
    fn test_bad_policy_is_an_error() {
        let err = RegistryConfig::from_lookup(lookup(&[(SKIP_POLICY_VAR, "never")])).unwrap_err();
        assert!(err.to_string().contains("skip policy"));
    }
}
