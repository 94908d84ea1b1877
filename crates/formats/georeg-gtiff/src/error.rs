//! Codec negotiation errors.

use thiserror::Error;

use crate::build_info::CodecLibrary;

/// Reasons a creation request cannot be turned into a codec configuration.
///
/// Both variants abort the creation request that triggered them. They point
/// at a mismatch between the request and the build, so they are never retried
/// and never silently downgraded to another codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The compression name is unknown, or its codec library is not part of this build
    #[error("COMPRESS={name} is not supported: {detail}")]
    UnsupportedCompression {
        /// Compression name as requested
        name: String,
        /// Human readable explanation
        detail: String,
        /// Codec library missing from the build, if that is the cause
        missing_library: Option<CodecLibrary>,
    },

    /// Options that cannot be combined, or a value out of range
    #[error("Incompatible {option} option: {reason}")]
    IncompatibleConfig {
        /// The creation option at fault
        option: String,
        /// What is wrong with it
        reason: String,
    },
}

impl CodecError {
    pub(crate) fn unknown_compression(name: &str) -> Self {
        Self::UnsupportedCompression {
            name: name.to_string(),
            detail: "unknown compression method".to_string(),
            missing_library: None,
        }
    }

    pub(crate) fn missing_codec(name: &str, library: CodecLibrary) -> Self {
        Self::UnsupportedCompression {
            name: name.to_string(),
            detail: format!(
                "this build does not include the {} codec (enable the `{}` feature)",
                library.name(),
                library.feature()
            ),
            missing_library: Some(library),
        }
    }

    pub(crate) fn incompatible(option: &str, reason: impl Into<String>) -> Self {
        Self::IncompatibleConfig {
            option: option.to_string(),
            reason: reason.into(),
        }
    }

    /// Suggestion for the operator, if there is an obvious one.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::UnsupportedCompression {
                missing_library: Some(library),
                ..
            } => Some(format!(
                "Rebuild with the `{}` feature or pick another COMPRESS value.",
                library.feature()
            )),
            Self::UnsupportedCompression { .. } => {
                Some("Run 'georeg compressions' to list the methods this build supports.".to_string())
            },
            Self::IncompatibleConfig { .. } => None,
        }
    }
}

/// Result alias for negotiation functions.
pub type Result<T> = std::result::Result<T, CodecError>;
