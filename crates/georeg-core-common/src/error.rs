//! Driver-level errors shared by the registry and format crates.

use thiserror::Error;

/// Driver-related errors.
///
/// These errors occur when a descriptor is registered, looked up, or asked
/// for an operation it does not provide.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Descriptor failed shape validation and was not registered
    #[error("Malformed driver '{code}': {reason}")]
    MalformedDriver {
        /// The offending driver code (may be empty)
        code: String,
        /// What is wrong with the descriptor
        reason: String,
    },

    /// Driver was not found in the registry
    #[error("Driver '{name}' not found. Available drivers: {available}")]
    NotFound {
        /// The requested driver name
        name: String,
        /// Comma-separated list of available drivers
        available: String,
    },

    /// Driver does not support the requested operation
    #[error("Driver '{driver}' does not support {operation}")]
    OperationNotSupported {
        /// The driver name
        driver: String,
        /// The operation that's not supported (e.g., "opening", "creation")
        operation: String,
    },

    /// A creation option could not be parsed
    #[error("Invalid creation option '{option}': {message}")]
    InvalidCreationOption {
        /// The option as given
        option: String,
        /// Why it's invalid
        message: String,
    },
}
