//! Error types for registry operations.
//!
//! Each component reports a domain-specific `thiserror` enum. [`GeoRegError`]
//! wraps them all so callers of the manager deal with a single type, and adds
//! user-facing messages and recovery hints for the CLI.

use std::path::PathBuf;

use georeg_core_common::DriverError;
use georeg_gtiff::CodecError;
use thiserror::Error;

/// Main error type for `GeoReg` operations.
///
/// This is the root error type that encompasses all domain-specific errors.
/// It uses `#[error(transparent)]` to delegate display formatting to the
/// underlying error variants.
#[derive(Debug, Error)]
pub enum GeoRegError {
    /// Descriptor validation, lookup and unsupported operations
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Plugin location, loading and registration errors
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// A deferred driver could not be brought up
    #[error(transparent)]
    Materialization(#[from] MaterializationError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Codec negotiation failures reported by the GeoTIFF driver
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// No driver in the probe order claims the file
    #[error("No registered driver recognizes '{filename}'")]
    Unrecognized {
        /// The file being opened
        filename: String,
    },

    /// Errors reported by driver entry points
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Plugin loader errors.
///
/// All of them are recoverable during auto-discovery: the failing plugin is
/// logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    /// No plugin module resolves for the code
    #[error("No plugin module found for driver '{code}'")]
    NotFound {
        /// The requested driver code
        code: String,
    },

    /// The module was found but could not be loaded or initialized
    #[error("Failed to load plugin '{code}' from '{path}': {reason}", path = path.display())]
    Load {
        /// The requested driver code
        code: String,
        /// Where the module was found
        path: PathBuf,
        /// Why loading failed
        reason: String,
    },

    /// The module registered another code, or nothing at all
    #[error("Plugin for '{expected}' registered {}", describe_registered(registered))]
    RegistrationMismatch {
        /// The code the module was loaded for
        expected: String,
        /// Codes the module actually registered
        registered: Vec<String>,
    },
}

fn describe_registered(registered: &[String]) -> String {
    if registered.is_empty() {
        "no driver".to_string()
    } else {
        format!("'{}' instead", registered.join("', '"))
    }
}

/// Failure to turn a deferred stub into its real driver.
///
/// Cloned to every caller that waited on the same materialization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Driver '{code}' could not be loaded: {reason}{}", dependency.as_ref().map(|d| format!(" (requires {d})")).unwrap_or_default())]
pub struct MaterializationError {
    /// The stub's driver code
    pub code: String,
    /// Native dependency the driver needs, when known
    pub dependency: Option<String>,
    /// What went wrong
    pub reason: String,
}

/// Configuration errors.
///
/// These errors occur when options or configuration are invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Invalid option value
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },
}

/// Type alias for Results using `GeoRegError`.
pub type Result<T> = std::result::Result<T, GeoRegError>;

impl GeoRegError {
    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Driver(e) => driver_user_message(e),
            Self::Plugin(e) => e.to_string(),
            Self::Materialization(e) => match &e.dependency {
                Some(dependency) => format!(
                    "The '{}' driver needs {dependency}, which is not available: {}",
                    e.code, e.reason
                ),
                None => e.to_string(),
            },
            Self::Config(e) => format!("Configuration error: {e}"),
            Self::Codec(e) => format!("Cannot create dataset: {e}"),
            Self::Unrecognized { .. } => self.to_string(),
            Self::Other(e) => format!("Error: {e:#}"),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Driver(DriverError::NotFound { .. }) => {
                Some("Run 'georeg drivers' to see all registered drivers.".to_string())
            },
            Self::Driver(DriverError::OperationNotSupported { .. }) => {
                Some("Try using a different driver that supports this operation.".to_string())
            },
            Self::Plugin(PluginError::NotFound { .. }) => Some(
                "Check GEOREG_DRIVER_PATH or pass --driver-path with the plugin directory."
                    .to_string(),
            ),
            Self::Materialization(MaterializationError {
                dependency: Some(_),
                ..
            }) => Some(
                "This is a build or packaging issue, not a data issue. Install the plugin for this driver."
                    .to_string(),
            ),
            Self::Codec(e) => e.recovery_suggestion(),
            Self::Unrecognized { .. } => Some(
                "Check that the file exists and that its driver is not skipped (GEOREG_SKIP)."
                    .to_string(),
            ),
            _ => None,
        }
    }

    /// Check if this error is potentially recoverable.
    ///
    /// Recoverable errors might be fixed by retrying with different
    /// parameters or after the user takes some action.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Plugin(_) | Self::Codec(CodecError::IncompatibleConfig { .. })
        )
    }
}

fn driver_user_message(error: &DriverError) -> String {
    match error {
        DriverError::NotFound { name, available } => {
            format!(
                "Driver '{name}' not found.\n\nAvailable drivers:\n{}",
                available
                    .split(", ")
                    .map(|d| format!("  - {d}"))
                    .collect::<Vec<_>>()
                    .join("\n")
            )
        },
        DriverError::OperationNotSupported { driver, operation } => {
            format!("The '{driver}' driver does not support {operation}.")
        },
        DriverError::MalformedDriver { .. } | DriverError::InvalidCreationOption { .. } => {
            error.to_string()
        },
    }
}
