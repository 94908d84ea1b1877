//! Compression method catalogue.
//!
//! Maps creation-option names (`COMPRESS=DEFLATE`) to TIFF compression tag
//! values and to the codec libraries they need. The three LERC variants share
//! one tag value and differ in the additional compression applied on top.

use std::collections::BTreeSet;

use log::debug;

use crate::build_info::{BuildFeatures, CodecLibrary};
use crate::error::{CodecError, Result};

pub const COMPRESSION_NONE: u16 = 1;
pub const COMPRESSION_CCITTRLE: u16 = 2;
pub const COMPRESSION_CCITTFAX3: u16 = 3;
pub const COMPRESSION_CCITTFAX4: u16 = 4;
pub const COMPRESSION_LZW: u16 = 5;
pub const COMPRESSION_JPEG: u16 = 7;
pub const COMPRESSION_ADOBE_DEFLATE: u16 = 8;
pub const COMPRESSION_PACKBITS: u16 = 32773;
pub const COMPRESSION_LERC: u16 = 34887;
pub const COMPRESSION_LZMA: u16 = 34925;
pub const COMPRESSION_ZSTD: u16 = 50000;
pub const COMPRESSION_WEBP: u16 = 50001;
pub const COMPRESSION_JXL: u16 = 52546;

/// A compression method selectable through `COMPRESS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    None,
    CcittRle,
    CcittFax3,
    CcittFax4,
    Lzw,
    Jpeg,
    Deflate,
    PackBits,
    Lerc,
    LercDeflate,
    LercZstd,
    Lzma,
    Zstd,
    WebP,
    Jxl,
}

impl Compression {
    /// Catalogue order, which is also the order creation option lists use.
    pub const ALL: [Compression; 15] = [
        Self::None,
        Self::Lzw,
        Self::PackBits,
        Self::Jpeg,
        Self::CcittRle,
        Self::CcittFax3,
        Self::CcittFax4,
        Self::Deflate,
        Self::Lzma,
        Self::Zstd,
        Self::Lerc,
        Self::LercDeflate,
        Self::LercZstd,
        Self::WebP,
        Self::Jxl,
    ];

    /// Creation option spelling.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::CcittRle => "CCITTRLE",
            Self::CcittFax3 => "CCITTFAX3",
            Self::CcittFax4 => "CCITTFAX4",
            Self::Lzw => "LZW",
            Self::Jpeg => "JPEG",
            Self::Deflate => "DEFLATE",
            Self::PackBits => "PACKBITS",
            Self::Lerc => "LERC",
            Self::LercDeflate => "LERC_DEFLATE",
            Self::LercZstd => "LERC_ZSTD",
            Self::Lzma => "LZMA",
            Self::Zstd => "ZSTD",
            Self::WebP => "WEBP",
            Self::Jxl => "JXL",
        }
    }

    /// TIFF `Compression` tag value.
    #[must_use]
    pub fn tiff_code(self) -> u16 {
        match self {
            Self::None => COMPRESSION_NONE,
            Self::CcittRle => COMPRESSION_CCITTRLE,
            Self::CcittFax3 => COMPRESSION_CCITTFAX3,
            Self::CcittFax4 => COMPRESSION_CCITTFAX4,
            Self::Lzw => COMPRESSION_LZW,
            Self::Jpeg => COMPRESSION_JPEG,
            Self::Deflate => COMPRESSION_ADOBE_DEFLATE,
            Self::PackBits => COMPRESSION_PACKBITS,
            Self::Lerc | Self::LercDeflate | Self::LercZstd => COMPRESSION_LERC,
            Self::Lzma => COMPRESSION_LZMA,
            Self::Zstd => COMPRESSION_ZSTD,
            Self::WebP => COMPRESSION_WEBP,
            Self::Jxl => COMPRESSION_JXL,
        }
    }

    /// Optional libraries the method needs. Empty for codecs every TIFF
    /// library carries.
    #[must_use]
    pub fn required_libraries(self) -> &'static [CodecLibrary] {
        match self {
            Self::None | Self::CcittRle | Self::CcittFax3 | Self::CcittFax4 | Self::PackBits => {
                &[]
            },
            Self::Lzw => &[CodecLibrary::Lzw],
            Self::Jpeg => &[CodecLibrary::Jpeg],
            Self::Deflate => &[CodecLibrary::Deflate],
            Self::Lerc => &[CodecLibrary::Lerc],
            Self::LercDeflate => &[CodecLibrary::Lerc, CodecLibrary::Deflate],
            Self::LercZstd => &[CodecLibrary::Lerc, CodecLibrary::Zstd],
            Self::Lzma => &[CodecLibrary::Lzma],
            Self::Zstd => &[CodecLibrary::Zstd],
            Self::WebP => &[CodecLibrary::WebP],
            Self::Jxl => &[CodecLibrary::Jxl],
        }
    }

    /// Lossy methods ignore predictors and may alter sample values.
    #[must_use]
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg | Self::WebP)
    }

    #[must_use]
    pub fn is_ccitt(self) -> bool {
        matches!(self, Self::CcittRle | Self::CcittFax3 | Self::CcittFax4)
    }

    /// Methods a cloud-optimized GeoTIFF may use.
    #[must_use]
    pub fn allowed_for_cog(self) -> bool {
        !self.is_ccitt() && self != Self::PackBits
    }

    /// Case-insensitive lookup by creation option name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    /// Whether every library the method needs is in `build`.
    #[must_use]
    pub fn is_available(self, build: &BuildFeatures) -> bool {
        self.required_libraries().iter().all(|lib| build.has(*lib))
    }
}

/// Resolves a compression name to a method available in `build`.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedCompression`] when the name is unknown or
/// when the method's codec library is missing from the build. The error
/// names the missing library.
pub fn resolve_compression(name: &str, build: &BuildFeatures) -> Result<Compression> {
    let compression =
        Compression::from_name(name).ok_or_else(|| CodecError::unknown_compression(name))?;
    if let Some(missing) = compression
        .required_libraries()
        .iter()
        .find(|lib| !build.has(**lib))
    {
        return Err(CodecError::missing_codec(compression.name(), *missing));
    }
    debug!(
        "COMPRESS={} resolved to TIFF compression {}",
        compression.name(),
        compression.tiff_code()
    );
    Ok(compression)
}

/// Resolves a compression name to its TIFF tag value.
///
/// # Errors
///
/// See [`resolve_compression`].
pub fn resolve_compression_method(name: &str, build: &BuildFeatures) -> Result<u16> {
    resolve_compression(name, build).map(Compression::tiff_code)
}

/// Creation option name of a TIFF compression tag value.
///
/// LERC variants collapse to `"LERC"` since they share the tag value.
#[must_use]
pub fn compression_method_name(code: u16) -> Option<&'static str> {
    Compression::ALL
        .into_iter()
        .find(|c| c.tiff_code() == code)
        .map(Compression::name)
}

/// Whether the compression tag value accepts a differencing predictor.
#[must_use]
pub fn supports_predictor(code: u16) -> bool {
    matches!(
        code,
        COMPRESSION_LZW | COMPRESSION_ADOBE_DEFLATE | COMPRESSION_ZSTD
    )
}

/// Methods usable with `build`, in catalogue order.
#[must_use]
pub fn build_supported_compressions(build: &BuildFeatures, for_cog: bool) -> Vec<Compression> {
    Compression::ALL
        .into_iter()
        .filter(|c| c.is_available(build))
        .filter(|c| !for_cog || c.allowed_for_cog())
        .collect()
}

/// Names of the compression methods `build` supports.
///
/// Lets callers tell "not requested" apart from "not available in this
/// build" when validating creation options or answering capability queries.
#[must_use]
pub fn enumerate_build_supported_compressions(
    build: &BuildFeatures,
    for_cog: bool,
) -> BTreeSet<&'static str> {
    build_supported_compressions(build, for_cog)
        .into_iter()
        .map(Compression::name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_deflate_is_stable() {
        let build = BuildFeatures::all();
        let first = resolve_compression_method("deflate", &build).unwrap();
        let second = resolve_compression_method("DEFLATE", &build).unwrap();
        assert_eq!(first, COMPRESSION_ADOBE_DEFLATE);
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_unknown_name() {
        let err = resolve_compression_method("not-a-real-codec", &BuildFeatures::all()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnsupportedCompression {
                missing_library: None,
                ..
            }
        ));
    }

    #[test]
    fn test_resolve_names_missing_library() {
        let build = BuildFeatures::all().with(CodecLibrary::Zstd, false);
        let err = resolve_compression("lerc_zstd", &build).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnsupportedCompression {
                name: "LERC_ZSTD".to_string(),
                detail: "this build does not include the ZSTD codec (enable the `zstd` feature)"
                    .to_string(),
                missing_library: Some(CodecLibrary::Zstd),
            }
        );
    }

    #[test]
    fn test_builtin_codecs_need_no_library() {
        let build = BuildFeatures::minimal();
        assert_eq!(resolve_compression_method("packbits", &build).unwrap(), 32773);
        assert_eq!(resolve_compression_method("NONE", &build).unwrap(), 1);
        assert!(resolve_compression_method("LZW", &build).is_err());
    }

    #[test]
    fn test_supports_predictor() {
        assert!(supports_predictor(COMPRESSION_LZW));
        assert!(supports_predictor(COMPRESSION_ADOBE_DEFLATE));
        assert!(supports_predictor(COMPRESSION_ZSTD));
        for code in [
            COMPRESSION_NONE,
            COMPRESSION_JPEG,
            COMPRESSION_PACKBITS,
            COMPRESSION_LERC,
            COMPRESSION_LZMA,
            COMPRESSION_WEBP,
            COMPRESSION_JXL,
            COMPRESSION_CCITTFAX4,
        ] {
            assert!(!supports_predictor(code), "code {code}");
        }
    }

    #[test]
    fn test_method_name_round_trip() {
        assert_eq!(compression_method_name(COMPRESSION_LERC), Some("LERC"));
        assert_eq!(compression_method_name(COMPRESSION_WEBP), Some("WEBP"));
        assert_eq!(compression_method_name(6), None);
    }

    #[test]
    fn test_enumerate_minimal_build() {
        let names = enumerate_build_supported_compressions(&BuildFeatures::minimal(), false);
        let expected: BTreeSet<&str> =
            ["NONE", "PACKBITS", "CCITTRLE", "CCITTFAX3", "CCITTFAX4"].into();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_enumerate_for_cog() {
        let build = BuildFeatures::minimal()
            .with(CodecLibrary::Deflate, true)
            .with(CodecLibrary::Lerc, true);
        let names = enumerate_build_supported_compressions(&build, true);
        let expected: BTreeSet<&str> = ["NONE", "DEFLATE", "LERC", "LERC_DEFLATE"].into();
        assert_eq!(names, expected);
    }
}
