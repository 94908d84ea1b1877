//! `georeg-core` is the format-driver registry of the `GeoReg` project.
//!
//! This crate includes:
//! - **Driver Table**: the ordered probe sequence with O(1) lookup by code.
//! - **Deferred drivers**: stubs that load their real driver on first use.
//! - **Plugin Loader**: explicit and automatic loading of out-of-tree drivers.
//! - **Skip lists** and **probe order** policy applied after registration.
//! - **Driver Manager**: the initialize / probe / shutdown lifecycle over all
//!   of the above, driven by a [`RegistryConfig`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use georeg_core::{DriverManager, RegistryConfig, StaticPluginHost};
//! use georeg_core_common::OpenInfo;
//!
//! let manager = DriverManager::new(Arc::new(StaticPluginHost::new()));
//! manager.initialize(&RegistryConfig::default());
//!
//! let info = OpenInfo::from_bytes("scene.tif", b"II*\0\x08\0\0\0".to_vec());
//! let driver = manager.identify(&info).unwrap().unwrap();
//! assert_eq!(driver.code(), "GTiff");
//! ```

pub mod builtin;
pub mod config;
pub mod deferred;
pub mod error;
pub mod manager;
pub mod plugin;
pub mod policy;
pub mod reorder;
pub mod table;

pub use builtin::{BUILTIN_DRIVERS, BuiltinDriver, BuiltinEntry, register_builtin_drivers};
pub use config::RegistryConfig;
pub use deferred::{DeferredDriver, StubState};
pub use error::{ConfigError, GeoRegError, MaterializationError, PluginError, Result};
pub use manager::{DriverManager, DriverSummary, InitReport};
pub use plugin::{
    DirectoryPluginHost, DiscoveryReport, ModuleLoader, NoDynamicLoading, PluginHost,
    PluginLocation, PluginLoader, StaticPluginHost,
};
pub use policy::{SkipList, SkipPolicy};
pub use reorder::{ProbeGroup, ReorderPlan};
pub use table::{DriverEntry, DriverOrigin, DriverTable};
