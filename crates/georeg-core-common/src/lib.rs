//! Common types and traits shared across `GeoReg` crates.
//!
//! This crate provides the driver descriptor and entry-point abstractions
//! shared between `georeg-core` and format implementation crates, preventing
//! circular dependencies.

pub mod drivers;
pub mod error;
pub mod io;
pub mod options;
pub mod registration;

// Re-export commonly used types
pub use drivers::{Driver, DriverBuilder, DriverCapabilities, Signature, SupportStatus};
pub use error::DriverError;
pub use io::{
    CreateRequest, Dataset, DatasetCreator, DatasetOpener, FormatIdentifier, Identification,
    OpenInfo, SampleType,
};
pub use options::{CreationOptionDef, CreationOptions, OptionIssue, OptionKind};
pub use registration::{CollectingSink, DriverSink, RegisterFn, RegistrationEntry};
