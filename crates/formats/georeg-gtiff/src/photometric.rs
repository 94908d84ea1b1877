//! Photometric interpretation, planar configuration and extra samples.

use std::fmt;

use georeg_core_common::SampleType;

use crate::compression::Compression;
use crate::error::{CodecError, Result};

/// TIFF `PhotometricInterpretation` values a writer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Photometric {
    MinIsWhite,
    MinIsBlack,
    Rgb,
    Palette,
    Cmyk,
    YCbCr,
    CieLab,
    IccLab,
    ItuLab,
}

impl Photometric {
    const ALL: [Photometric; 9] = [
        Self::MinIsBlack,
        Self::MinIsWhite,
        Self::Rgb,
        Self::Cmyk,
        Self::YCbCr,
        Self::CieLab,
        Self::IccLab,
        Self::ItuLab,
        Self::Palette,
    ];

    /// `PHOTOMETRIC` creation option spelling.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::MinIsWhite => "MINISWHITE",
            Self::MinIsBlack => "MINISBLACK",
            Self::Rgb => "RGB",
            Self::Palette => "PALETTE",
            Self::Cmyk => "CMYK",
            Self::YCbCr => "YCBCR",
            Self::CieLab => "CIELAB",
            Self::IccLab => "ICCLAB",
            Self::ItuLab => "ITULAB",
        }
    }

    #[must_use]
    pub fn tiff_value(self) -> u16 {
        match self {
            Self::MinIsWhite => 0,
            Self::MinIsBlack => 1,
            Self::Rgb => 2,
            Self::Palette => 3,
            Self::Cmyk => 5,
            Self::YCbCr => 6,
            Self::CieLab => 8,
            Self::IccLab => 9,
            Self::ItuLab => 10,
        }
    }

    /// Number of bands the interpretation consumes as color channels.
    #[must_use]
    pub fn color_channels(self) -> u32 {
        match self {
            Self::MinIsWhite | Self::MinIsBlack | Self::Palette => 1,
            Self::Rgb | Self::YCbCr | Self::CieLab | Self::IccLab | Self::ItuLab => 3,
            Self::Cmyk => 4,
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Names accepted by the `PHOTOMETRIC` option.
    #[must_use]
    pub fn option_values() -> Vec<&'static str> {
        Self::ALL.into_iter().map(Self::name).collect()
    }
}

impl fmt::Display for Photometric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// TIFF `PlanarConfiguration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanarConfig {
    /// Samples of a pixel stored together (`INTERLEAVE=PIXEL`).
    Contig,
    /// One plane per band (`INTERLEAVE=BAND`).
    Separate,
}

impl PlanarConfig {
    #[must_use]
    pub fn tiff_value(self) -> u16 {
        match self {
            Self::Contig => 1,
            Self::Separate => 2,
        }
    }

    #[must_use]
    pub fn interleave_name(self) -> &'static str {
        match self {
            Self::Contig => "PIXEL",
            Self::Separate => "BAND",
        }
    }

    fn from_interleave(value: &str) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PIXEL" => Ok(Self::Contig),
            "BAND" => Ok(Self::Separate),
            other => Err(CodecError::incompatible(
                "INTERLEAVE",
                format!("unknown value '{other}', expected PIXEL or BAND"),
            )),
        }
    }
}

/// TIFF `ExtraSamples` value of one band beyond the color channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtraSample {
    Unspecified,
    AssociatedAlpha,
    UnassociatedAlpha,
}

impl ExtraSample {
    #[must_use]
    pub fn tiff_value(self) -> u16 {
        match self {
            Self::Unspecified => 0,
            Self::AssociatedAlpha => 1,
            Self::UnassociatedAlpha => 2,
        }
    }

    #[must_use]
    pub fn is_alpha(self) -> bool {
        self != Self::Unspecified
    }
}

/// Maps an `ALPHA` option value to the extra-samples value of the alpha band.
///
/// `NO` yields `None`.
///
/// # Errors
///
/// Returns [`CodecError::IncompatibleConfig`] for unknown values.
pub fn alpha_value(value: &str) -> Result<Option<ExtraSample>> {
    match value.trim().to_ascii_uppercase().as_str() {
        "YES" | "NON-PREMULTIPLIED" => Ok(Some(ExtraSample::UnassociatedAlpha)),
        "PREMULTIPLIED" => Ok(Some(ExtraSample::AssociatedAlpha)),
        "UNSPECIFIED" => Ok(Some(ExtraSample::Unspecified)),
        "NO" => Ok(None),
        other => Err(CodecError::incompatible(
            "ALPHA",
            format!(
                "unknown value '{other}', expected YES, NON-PREMULTIPLIED, PREMULTIPLIED, UNSPECIFIED or NO"
            ),
        )),
    }
}

/// Inputs of the layout check, taken from a creation request.
#[derive(Debug, Clone, Copy)]
pub struct LayoutRequest<'a> {
    pub photometric: Option<&'a str>,
    pub interleave: Option<&'a str>,
    pub alpha: Option<&'a str>,
    pub bands: u32,
    pub sample_type: SampleType,
    pub compression: Compression,
}

/// Resolved photometric interpretation, planar configuration and the
/// `ExtraSamples` entries for bands beyond the color channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLayout {
    pub photometric: Photometric,
    pub planar_config: PlanarConfig,
    pub extra_samples: Vec<ExtraSample>,
}

/// Checks the requested photometric interpretation against the band layout.
///
/// Without a `PHOTOMETRIC` option, 3 or 4 Byte bands are written as RGB and
/// everything else as MINISBLACK. Mismatches are reported, never coerced:
/// a palette needs exactly one Byte or UInt16 band stored contiguously,
/// YCbCr needs JPEG compression with three pixel-interleaved bands, and
/// `ALPHA` needs a band beyond the color channels to describe.
///
/// # Errors
///
/// Returns [`CodecError::IncompatibleConfig`] naming the offending option.
pub fn validate_photometric_and_planar_config(
    request: &LayoutRequest<'_>,
) -> Result<ResolvedLayout> {
    let bands = request.bands;
    if bands == 0 {
        return Err(CodecError::incompatible(
            "BANDS",
            "a TIFF dataset needs at least one band",
        ));
    }
    // SamplesPerPixel is a SHORT.
    if bands > u32::from(u16::MAX) {
        return Err(CodecError::incompatible(
            "BANDS",
            format!("a TIFF dataset holds at most {} bands, got {bands}", u16::MAX),
        ));
    }

    let explicit_planar = request
        .interleave
        .map(PlanarConfig::from_interleave)
        .transpose()?;

    let photometric = match request.photometric {
        Some(name) => Photometric::from_name(name).ok_or_else(|| {
            CodecError::incompatible(
                "PHOTOMETRIC",
                format!("unknown photometric interpretation '{}'", name.trim()),
            )
        })?,
        None if matches!(bands, 3 | 4) && request.sample_type == SampleType::Byte => {
            Photometric::Rgb
        },
        None => Photometric::MinIsBlack,
    };

    let planar_config = match photometric {
        Photometric::Palette => {
            if bands != 1 {
                return Err(CodecError::incompatible(
                    "PHOTOMETRIC",
                    format!("PALETTE requires exactly 1 band, got {bands}"),
                ));
            }
            if !matches!(request.sample_type, SampleType::Byte | SampleType::UInt16) {
                return Err(CodecError::incompatible(
                    "PHOTOMETRIC",
                    format!(
                        "PALETTE requires Byte or UInt16 samples, got {}",
                        request.sample_type
                    ),
                ));
            }
            if explicit_planar == Some(PlanarConfig::Separate) {
                return Err(CodecError::incompatible(
                    "INTERLEAVE",
                    "PALETTE requires INTERLEAVE=PIXEL",
                ));
            }
            PlanarConfig::Contig
        },
        Photometric::YCbCr => {
            if request.compression != Compression::Jpeg {
                return Err(CodecError::incompatible(
                    "PHOTOMETRIC",
                    format!(
                        "YCBCR requires COMPRESS=JPEG, got COMPRESS={}",
                        request.compression.name()
                    ),
                ));
            }
            if bands != 3 {
                return Err(CodecError::incompatible(
                    "PHOTOMETRIC",
                    format!("YCBCR requires exactly 3 bands, got {bands}"),
                ));
            }
            if explicit_planar == Some(PlanarConfig::Separate) {
                return Err(CodecError::incompatible(
                    "INTERLEAVE",
                    "YCBCR requires INTERLEAVE=PIXEL",
                ));
            }
            PlanarConfig::Contig
        },
        other => {
            if bands < other.color_channels() {
                return Err(CodecError::incompatible(
                    "PHOTOMETRIC",
                    format!(
                        "{} requires at least {} bands, got {bands}",
                        other.name(),
                        other.color_channels()
                    ),
                ));
            }
            explicit_planar.unwrap_or(PlanarConfig::Contig)
        },
    };

    let extra_count = (bands - photometric.color_channels()) as usize;
    let alpha = request.alpha.map(alpha_value).transpose()?.flatten();
    if alpha.is_some() && extra_count == 0 {
        return Err(CodecError::incompatible(
            "ALPHA",
            format!(
                "{} with {bands} band(s) leaves no extra band for alpha",
                photometric.name()
            ),
        ));
    }

    let mut extra_samples = vec![ExtraSample::Unspecified; extra_count];
    let first_extra = match alpha {
        Some(value) => Some(value),
        // A fourth band next to RGB is alpha unless the caller said otherwise.
        None if request.alpha.is_none() && photometric == Photometric::Rgb && bands == 4 => {
            Some(ExtraSample::UnassociatedAlpha)
        },
        None => None,
    };
    if let (Some(value), Some(slot)) = (first_extra, extra_samples.first_mut()) {
        *slot = value;
    }

    Ok(ResolvedLayout {
        photometric,
        planar_config,
        extra_samples,
    })
}
