//! Turns a creation request into a codec configuration the build supports.
//!
//! Negotiation runs once per create call, after the driver has been selected.
//! It either returns a [`CodecConfig`] every part of which this build can
//! encode, or a [`CodecError`] naming the option that cannot be honored.

use std::fmt;

use georeg_core_common::{CreateRequest, CreationOptions, SampleType};
use log::{debug, warn};

use crate::build_info::BuildFeatures;
use crate::compression::{Compression, resolve_compression, supports_predictor};
use crate::error::{CodecError, Result};
use crate::photometric::{
    ExtraSample, LayoutRequest, Photometric, PlanarConfig, validate_photometric_and_planar_config,
};

pub const DEFAULT_JPEG_QUALITY: u8 = 75;
pub const DEFAULT_ZLEVEL: u8 = 6;
pub const DEFAULT_ZSTD_LEVEL: u8 = 9;
pub const DEFAULT_LZMA_PRESET: u8 = 6;
pub const DEFAULT_WEBP_LEVEL: u8 = 75;

/// Size above which `BIGTIFF=IF_NEEDED` switches to BigTIFF.
const CLASSIC_TIFF_LIMIT: u64 = 4_000_000_000;
/// `IF_SAFER` leaves room for compression that inflates the data.
const CLASSIC_TIFF_SAFE_LIMIT: u64 = 2_000_000_000;

/// TIFF `Predictor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predictor {
    None,
    Horizontal,
    FloatingPoint,
}

impl Predictor {
    #[must_use]
    pub fn tiff_value(self) -> u16 {
        match self {
            Self::None => 1,
            Self::Horizontal => 2,
            Self::FloatingPoint => 3,
        }
    }

    fn parse(value: &str, sample_type: SampleType) -> Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "1" | "NO" | "NONE" => Ok(Self::None),
            "2" | "STANDARD" => Ok(Self::Horizontal),
            "3" | "FLOATING_POINT" => Ok(Self::FloatingPoint),
            "YES" if sample_type.is_float() => Ok(Self::FloatingPoint),
            "YES" => Ok(Self::Horizontal),
            other => Err(CodecError::incompatible(
                "PREDICTOR",
                format!("unknown value '{other}', expected 1, 2, 3, YES or NO"),
            )),
        }
    }
}

/// TIFF `SampleFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    UnsignedInt,
    SignedInt,
    IeeeFloat,
    ComplexInt,
    ComplexFloat,
}

impl SampleFormat {
    #[must_use]
    pub fn of(sample_type: SampleType) -> Self {
        match (sample_type.is_complex(), sample_type.is_float()) {
            (true, true) => Self::ComplexFloat,
            (true, false) => Self::ComplexInt,
            (false, true) => Self::IeeeFloat,
            (false, false) if sample_type.is_signed() => Self::SignedInt,
            (false, false) => Self::UnsignedInt,
        }
    }

    #[must_use]
    pub fn tiff_value(self) -> u16 {
        match self {
            Self::UnsignedInt => 1,
            Self::SignedInt => 2,
            Self::IeeeFloat => 3,
            Self::ComplexInt => 5,
            Self::ComplexFloat => 6,
        }
    }
}

/// Codec specific tuning resolved from the level options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CodecLevel {
    JpegQuality(u8),
    Deflate(u8),
    Zstd(u8),
    LzmaPreset(u8),
    WebP { level: u8, lossless: bool },
    /// `additional_level` is the DEFLATE or ZSTD level of the LERC variants.
    Lerc { max_z_error: f64, additional_level: Option<u8> },
    Jxl { lossless: bool },
}

impl fmt::Display for CodecLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JpegQuality(q) => write!(f, "JPEG_QUALITY={q}"),
            Self::Deflate(l) => write!(f, "ZLEVEL={l}"),
            Self::Zstd(l) => write!(f, "ZSTD_LEVEL={l}"),
            Self::LzmaPreset(p) => write!(f, "LZMA_PRESET={p}"),
            Self::WebP { lossless: true, .. } => f.write_str("WEBP_LOSSLESS=YES"),
            Self::WebP { level, .. } => write!(f, "WEBP_LEVEL={level}"),
            Self::Lerc {
                max_z_error,
                additional_level: Some(level),
            } => write!(f, "MAX_Z_ERROR={max_z_error}, level {level}"),
            Self::Lerc { max_z_error, .. } => write!(f, "MAX_Z_ERROR={max_z_error}"),
            Self::Jxl { lossless } => {
                write!(f, "JXL_LOSSLESS={}", if *lossless { "YES" } else { "NO" })
            },
        }
    }
}

/// A fully negotiated encoding configuration for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecConfig {
    pub compression: Compression,
    pub compression_code: u16,
    pub predictor: Predictor,
    pub photometric: Photometric,
    pub planar_config: PlanarConfig,
    pub extra_samples: Vec<ExtraSample>,
    pub bands: u32,
    pub sample_type: SampleType,
    pub bits_per_sample: u16,
    pub sample_format: SampleFormat,
    pub level: Option<CodecLevel>,
    pub tiled: bool,
    pub bigtiff: bool,
}

impl CodecConfig {
    /// The configuration as `KEY=VALUE` pairs, for dataset metadata and
    /// listings.
    #[must_use]
    pub fn metadata(&self) -> Vec<(String, String)> {
        let mut items = vec![
            ("COMPRESSION".to_string(), self.compression.name().to_string()),
            (
                "COMPRESSION_CODE".to_string(),
                self.compression_code.to_string(),
            ),
            (
                "PREDICTOR".to_string(),
                self.predictor.tiff_value().to_string(),
            ),
            ("PHOTOMETRIC".to_string(), self.photometric.name().to_string()),
            (
                "INTERLEAVE".to_string(),
                self.planar_config.interleave_name().to_string(),
            ),
            ("BANDS".to_string(), self.bands.to_string()),
            ("DATA_TYPE".to_string(), self.sample_type.to_string()),
            (
                "BITS_PER_SAMPLE".to_string(),
                self.bits_per_sample.to_string(),
            ),
            (
                "SAMPLE_FORMAT".to_string(),
                self.sample_format.tiff_value().to_string(),
            ),
        ];
        if !self.extra_samples.is_empty() {
            let values: Vec<String> = self
                .extra_samples
                .iter()
                .map(|e| e.tiff_value().to_string())
                .collect();
            items.push(("EXTRA_SAMPLES".to_string(), values.join(",")));
        }
        if let Some(level) = &self.level {
            items.push(("LEVEL".to_string(), level.to_string()));
        }
        items.push((
            "TILED".to_string(),
            if self.tiled { "YES" } else { "NO" }.to_string(),
        ));
        items.push((
            "BIGTIFF".to_string(),
            if self.bigtiff { "YES" } else { "NO" }.to_string(),
        ));
        items
    }
}

/// Negotiates a GeoTIFF creation request.
///
/// # Errors
///
/// [`CodecError::UnsupportedCompression`] when the requested compression is
/// unknown or not built in, [`CodecError::IncompatibleConfig`] for option
/// combinations the format or codec cannot represent.
pub fn negotiate(request: &CreateRequest, build: &BuildFeatures) -> Result<CodecConfig> {
    let name = request.options.get("COMPRESS").unwrap_or("NONE");
    let compression = resolve_compression(name, build)?;
    let tiled = option_bool(&request.options, "TILED", false)?;
    negotiate_resolved(request, compression, None, tiled)
}

/// Negotiates a cloud-optimized GeoTIFF creation request.
///
/// Compression defaults to LZW, CCITT and PACKBITS are refused, and three
/// Byte bands compressed with JPEG default to YCbCr. Output is always tiled.
///
/// # Errors
///
/// Same as [`negotiate`].
pub fn negotiate_cog(request: &CreateRequest, build: &BuildFeatures) -> Result<CodecConfig> {
    let name = request.options.get("COMPRESS").unwrap_or("LZW");
    let compression = resolve_compression(name, build)?;
    if !compression.allowed_for_cog() {
        return Err(CodecError::UnsupportedCompression {
            name: compression.name().to_string(),
            detail: "not available for cloud optimized GeoTIFF".to_string(),
            missing_library: None,
        });
    }
    let photometric = (compression == Compression::Jpeg
        && request.bands == 3
        && request.sample_type == SampleType::Byte
        && request.options.get("PHOTOMETRIC").is_none())
    .then_some(Photometric::YCbCr);
    negotiate_resolved(request, compression, photometric, true)
}

fn negotiate_resolved(
    request: &CreateRequest,
    compression: Compression,
    default_photometric: Option<Photometric>,
    tiled: bool,
) -> Result<CodecConfig> {
    let options = &request.options;
    let sample_type = request.sample_type;

    let bits_per_sample = resolve_bits(options, sample_type, compression)?;
    check_codec_samples(compression, request.bands, sample_type, bits_per_sample)?;

    let layout = validate_photometric_and_planar_config(&LayoutRequest {
        photometric: options
            .get("PHOTOMETRIC")
            .or(default_photometric.map(Photometric::name)),
        interleave: options.get("INTERLEAVE"),
        alpha: options.get("ALPHA"),
        bands: request.bands,
        sample_type,
        compression,
    })?;

    let predictor = match options.get("PREDICTOR") {
        None => Predictor::None,
        Some(value) => Predictor::parse(value, sample_type)?,
    };
    if predictor != Predictor::None {
        if !supports_predictor(compression.tiff_code()) {
            return Err(CodecError::incompatible(
                "PREDICTOR",
                format!(
                    "COMPRESS={} does not support a predictor",
                    compression.name()
                ),
            ));
        }
        if predictor == Predictor::FloatingPoint && !sample_type.is_float() {
            return Err(CodecError::incompatible(
                "PREDICTOR",
                format!("PREDICTOR=3 requires floating point samples, got {sample_type}"),
            ));
        }
    }

    let level = resolve_level(options, compression)?;
    let bigtiff = resolve_bigtiff(request, bits_per_sample)?;

    let config = CodecConfig {
        compression,
        compression_code: compression.tiff_code(),
        predictor,
        photometric: layout.photometric,
        planar_config: layout.planar_config,
        extra_samples: layout.extra_samples,
        bands: request.bands,
        sample_type,
        bits_per_sample,
        sample_format: SampleFormat::of(sample_type),
        level,
        tiled,
        bigtiff,
    };
    debug!(
        "Negotiated {}: COMPRESS={} PHOTOMETRIC={} PREDICTOR={}",
        request.filename,
        config.compression.name(),
        config.photometric.name(),
        config.predictor.tiff_value()
    );
    Ok(config)
}

fn option_bool(options: &CreationOptions, key: &str, default: bool) -> Result<bool> {
    options
        .get_bool(key, default)
        .map_err(|_| CodecError::incompatible(key, "expected YES or NO"))
}

fn resolve_bits(
    options: &CreationOptions,
    sample_type: SampleType,
    compression: Compression,
) -> Result<u16> {
    let full = sample_type.bits();
    let Some(value) = options.get("NBITS") else {
        return Ok(if compression.is_ccitt() { 1 } else { full });
    };
    if sample_type.is_float() || sample_type.is_complex() {
        return Err(CodecError::incompatible(
            "NBITS",
            format!("not supported for {sample_type} samples"),
        ));
    }
    match value.trim().parse::<u16>() {
        Ok(bits) if (1..=full).contains(&bits) => Ok(bits),
        _ => Err(CodecError::incompatible(
            "NBITS",
            format!("'{value}' is out of range 1..={full} for {sample_type}"),
        )),
    }
}

fn check_codec_samples(
    compression: Compression,
    bands: u32,
    sample_type: SampleType,
    bits: u16,
) -> Result<()> {
    let reject = |reason: String| Err(CodecError::incompatible("COMPRESS", reason));
    match compression {
        Compression::Jpeg => {
            let eight_bit = sample_type == SampleType::Byte && bits == 8;
            let twelve_bit = sample_type == SampleType::UInt16 && bits == 12;
            if !(eight_bit || twelve_bit) {
                return reject(format!(
                    "JPEG requires 8-bit Byte or 12-bit UInt16 samples, got {bits}-bit {sample_type}"
                ));
            }
        },
        Compression::WebP => {
            if sample_type != SampleType::Byte || !(3..=4).contains(&bands) {
                return reject(format!(
                    "WEBP requires 3 or 4 Byte bands, got {bands} {sample_type} band(s)"
                ));
            }
        },
        Compression::Lerc | Compression::LercDeflate | Compression::LercZstd => {
            if sample_type.is_complex() {
                return reject(format!("LERC does not support {sample_type} samples"));
            }
        },
        Compression::Jxl => {
            if sample_type.is_complex() || sample_type.bits() > 32 {
                return reject(format!("JXL does not support {sample_type} samples"));
            }
        },
        c if c.is_ccitt() => {
            if bands != 1 || sample_type != SampleType::Byte || bits != 1 {
                return reject(format!(
                    "{} requires a single 1-bit Byte band, got {bands} {bits}-bit {sample_type} band(s)",
                    c.name()
                ));
            }
        },
        _ => {},
    }
    Ok(())
}

/// Level options and the compressions they tune.
const LEVEL_OPTIONS: [(&str, &[Compression]); 8] = [
    ("JPEG_QUALITY", &[Compression::Jpeg]),
    ("ZLEVEL", &[Compression::Deflate, Compression::LercDeflate]),
    ("ZSTD_LEVEL", &[Compression::Zstd, Compression::LercZstd]),
    ("LZMA_PRESET", &[Compression::Lzma]),
    ("WEBP_LEVEL", &[Compression::WebP]),
    ("WEBP_LOSSLESS", &[Compression::WebP]),
    (
        "MAX_Z_ERROR",
        &[Compression::Lerc, Compression::LercDeflate, Compression::LercZstd],
    ),
    ("JXL_LOSSLESS", &[Compression::Jxl]),
];

fn resolve_level(options: &CreationOptions, compression: Compression) -> Result<Option<CodecLevel>> {
    for (key, applies_to) in LEVEL_OPTIONS {
        if options.get(key).is_some() && !applies_to.contains(&compression) {
            warn!(
                "{key} has no effect with COMPRESS={}, ignoring it",
                compression.name()
            );
        }
    }

    let level = match compression {
        Compression::Jpeg => Some(CodecLevel::JpegQuality(int_option(
            options,
            "JPEG_QUALITY",
            1,
            100,
            DEFAULT_JPEG_QUALITY,
        )?)),
        Compression::Deflate => Some(CodecLevel::Deflate(int_option(
            options,
            "ZLEVEL",
            1,
            12,
            DEFAULT_ZLEVEL,
        )?)),
        Compression::Zstd => Some(CodecLevel::Zstd(int_option(
            options,
            "ZSTD_LEVEL",
            1,
            22,
            DEFAULT_ZSTD_LEVEL,
        )?)),
        Compression::Lzma => Some(CodecLevel::LzmaPreset(int_option(
            options,
            "LZMA_PRESET",
            0,
            9,
            DEFAULT_LZMA_PRESET,
        )?)),
        Compression::WebP => Some(CodecLevel::WebP {
            level: int_option(options, "WEBP_LEVEL", 1, 100, DEFAULT_WEBP_LEVEL)?,
            lossless: option_bool(options, "WEBP_LOSSLESS", false)?,
        }),
        Compression::Lerc | Compression::LercDeflate | Compression::LercZstd => {
            let additional_level = match compression {
                Compression::LercDeflate => {
                    Some(int_option(options, "ZLEVEL", 1, 12, DEFAULT_ZLEVEL)?)
                },
                Compression::LercZstd => Some(int_option(
                    options,
                    "ZSTD_LEVEL",
                    1,
                    22,
                    DEFAULT_ZSTD_LEVEL,
                )?),
                _ => None,
            };
            Some(CodecLevel::Lerc {
                max_z_error: max_z_error(options)?,
                additional_level,
            })
        },
        Compression::Jxl => Some(CodecLevel::Jxl {
            lossless: option_bool(options, "JXL_LOSSLESS", true)?,
        }),
        _ => None,
    };
    Ok(level)
}

fn int_option(options: &CreationOptions, key: &str, min: u8, max: u8, default: u8) -> Result<u8> {
    let Some(value) = options.get(key) else {
        return Ok(default);
    };
    match value.trim().parse::<u8>() {
        Ok(v) if (min..=max).contains(&v) => Ok(v),
        _ => Err(CodecError::incompatible(
            key,
            format!("'{value}' is out of range {min}..={max}"),
        )),
    }
}

fn max_z_error(options: &CreationOptions) -> Result<f64> {
    let Some(value) = options.get("MAX_Z_ERROR") else {
        return Ok(0.0);
    };
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(CodecError::incompatible(
            "MAX_Z_ERROR",
            format!("'{value}' is not a non-negative number"),
        )),
    }
}

fn resolve_bigtiff(request: &CreateRequest, bits_per_sample: u16) -> Result<bool> {
    let components: u64 = if request.sample_type.is_complex() { 2 } else { 1 };
    // Saturates: a size past u64 needs BigTIFF all the same.
    let uncompressed = u64::from(request.width)
        .saturating_mul(u64::from(request.height))
        .saturating_mul(u64::from(request.bands))
        .saturating_mul(u64::from(bits_per_sample))
        .saturating_mul(components)
        / 8;
    match request
        .options
        .get("BIGTIFF")
        .map(|v| v.trim().to_ascii_uppercase())
        .as_deref()
    {
        Some("YES") => Ok(true),
        Some("NO") => Ok(false),
        None | Some("IF_NEEDED") => Ok(uncompressed > CLASSIC_TIFF_LIMIT),
        Some("IF_SAFER") => Ok(uncompressed > CLASSIC_TIFF_SAFE_LIMIT),
        Some(other) => Err(CodecError::incompatible(
            "BIGTIFF",
            format!("unknown value '{other}', expected YES, NO, IF_NEEDED or IF_SAFER"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(bands: u32, sample_type: SampleType, options: &[&str]) -> CreateRequest {
        let mut request = CreateRequest::new("out.tif", 256, 256, bands, sample_type);
        request.options = CreationOptions::parse(options).unwrap();
        request
    }

    #[test]
    fn test_default_is_uncompressed() {
        let config = negotiate(&request(1, SampleType::Byte, &[]), &BuildFeatures::all()).unwrap();
        assert_eq!(config.compression, Compression::None);
        assert_eq!(config.compression_code, 1);
        assert_eq!(config.predictor, Predictor::None);
        assert_eq!(config.level, None);
        assert!(!config.tiled);
        assert!(!config.bigtiff);
    }

    #[test]
    fn test_predictor_rejected_for_lzma() {
        let err = negotiate(
            &request(1, SampleType::Int16, &["COMPRESS=LZMA", "PREDICTOR=2"]),
            &BuildFeatures::all(),
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::IncompatibleConfig { ref option, .. } if option == "PREDICTOR"));
    }

    #[test]
    fn test_predictor_yes_follows_sample_type() {
        let build = BuildFeatures::all();
        let float = negotiate(
            &request(1, SampleType::Float32, &["COMPRESS=ZSTD", "PREDICTOR=YES"]),
            &build,
        )
        .unwrap();
        assert_eq!(float.predictor, Predictor::FloatingPoint);

        let int = negotiate(
            &request(1, SampleType::UInt16, &["COMPRESS=ZSTD", "PREDICTOR=YES"]),
            &build,
        )
        .unwrap();
        assert_eq!(int.predictor, Predictor::Horizontal);
    }

    #[test]
    fn test_floating_point_predictor_needs_floats() {
        let err = negotiate(
            &request(1, SampleType::Int32, &["COMPRESS=DEFLATE", "PREDICTOR=3"]),
            &BuildFeatures::all(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("floating point"));
    }

    #[test]
    fn test_level_ranges() {
        let build = BuildFeatures::all();
        let config = negotiate(
            &request(1, SampleType::Byte, &["COMPRESS=DEFLATE", "ZLEVEL=9"]),
            &build,
        )
        .unwrap();
        assert_eq!(config.level, Some(CodecLevel::Deflate(9)));

        let err = negotiate(
            &request(1, SampleType::Byte, &["COMPRESS=ZSTD", "ZSTD_LEVEL=23"]),
            &build,
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::IncompatibleConfig { ref option, .. } if option == "ZSTD_LEVEL"));
    }

    #[test]
    fn test_level_for_other_codec_is_ignored() {
        let config = negotiate(
            &request(1, SampleType::Byte, &["COMPRESS=LZW", "JPEG_QUALITY=500"]),
            &BuildFeatures::all(),
        )
        .unwrap();
        assert_eq!(config.level, None);
    }

    #[test]
    fn test_lerc_variants() {
        let config = negotiate(
            &request(
                1,
                SampleType::Float32,
                &["COMPRESS=LERC_ZSTD", "MAX_Z_ERROR=0.01"],
            ),
            &BuildFeatures::all(),
        )
        .unwrap();
        assert_eq!(config.compression_code, 34887);
        assert_eq!(
            config.level,
            Some(CodecLevel::Lerc {
                max_z_error: 0.01,
                additional_level: Some(DEFAULT_ZSTD_LEVEL),
            })
        );

        assert!(
            negotiate(
                &request(1, SampleType::CFloat32, &["COMPRESS=LERC"]),
                &BuildFeatures::all()
            )
            .is_err()
        );
    }

    #[test]
    fn test_jpeg_sample_rules() {
        let build = BuildFeatures::all();
        assert!(negotiate(&request(3, SampleType::Int16, &["COMPRESS=JPEG"]), &build).is_err());
        let twelve = negotiate(
            &request(1, SampleType::UInt16, &["COMPRESS=JPEG", "NBITS=12"]),
            &build,
        )
        .unwrap();
        assert_eq!(twelve.bits_per_sample, 12);
    }

    #[test]
    fn test_webp_band_rules() {
        let build = BuildFeatures::all();
        assert!(negotiate(&request(1, SampleType::Byte, &["COMPRESS=WEBP"]), &build).is_err());
        let config = negotiate(
            &request(4, SampleType::Byte, &["COMPRESS=WEBP", "WEBP_LOSSLESS=YES"]),
            &build,
        )
        .unwrap();
        assert_eq!(
            config.level,
            Some(CodecLevel::WebP {
                level: DEFAULT_WEBP_LEVEL,
                lossless: true
            })
        );
    }

    #[test]
    fn test_ccitt_is_one_bit() {
        let build = BuildFeatures::minimal();
        let config = negotiate(&request(1, SampleType::Byte, &["COMPRESS=CCITTFAX4"]), &build).unwrap();
        assert_eq!(config.bits_per_sample, 1);
        assert!(negotiate(&request(2, SampleType::Byte, &["COMPRESS=CCITTFAX4"]), &build).is_err());
    }

    #[test]
    fn test_cog_defaults() {
        let build = BuildFeatures::all();
        let lzw = negotiate_cog(&request(1, SampleType::Byte, &[]), &build).unwrap();
        assert_eq!(lzw.compression, Compression::Lzw);
        assert!(lzw.tiled);

        let jpeg = negotiate_cog(&request(3, SampleType::Byte, &["COMPRESS=JPEG"]), &build).unwrap();
        assert_eq!(jpeg.photometric, Photometric::YCbCr);

        let rgb = negotiate_cog(
            &request(3, SampleType::Byte, &["COMPRESS=JPEG", "PHOTOMETRIC=RGB"]),
            &build,
        )
        .unwrap();
        assert_eq!(rgb.photometric, Photometric::Rgb);

        assert!(matches!(
            negotiate_cog(&request(1, SampleType::Byte, &["COMPRESS=PACKBITS"]), &build),
            Err(CodecError::UnsupportedCompression { .. })
        ));
    }

    #[test]
    fn test_bigtiff_modes() {
        let build = BuildFeatures::all();
        let mut big = request(1, SampleType::Float64, &[]);
        big.width = 40_000;
        big.height = 40_000;
        assert!(negotiate(&big, &build).unwrap().bigtiff);

        big.options.set("BIGTIFF", "NO");
        assert!(!negotiate(&big, &build).unwrap().bigtiff);

        let forced = request(1, SampleType::Byte, &["BIGTIFF=YES"]);
        assert!(negotiate(&forced, &build).unwrap().bigtiff);
    }

    #[test]
    fn test_maximum_dimensions_need_bigtiff() {
        let build = BuildFeatures::all();
        let huge = CreateRequest::new(
            "big.tif",
            u32::MAX,
            u32::MAX,
            u32::from(u16::MAX),
            SampleType::CFloat64,
        );
        assert!(negotiate(&huge, &build).unwrap().bigtiff);

        let too_many_bands = CreateRequest::new("big.tif", 1, 1, u32::MAX, SampleType::Byte);
        assert!(matches!(
            negotiate(&too_many_bands, &build),
            Err(CodecError::IncompatibleConfig { ref option, .. }) if option == "BANDS"
        ));

        let single = CreateRequest::new("big.tif", u32::MAX, u32::MAX, 1, SampleType::Byte);
        assert!(negotiate(&single, &build).unwrap().bigtiff);
    }

    #[test]
    fn test_metadata_lists_resolution() {
        let config = negotiate(
            &request(4, SampleType::Byte, &["COMPRESS=DEFLATE", "PREDICTOR=2"]),
            &BuildFeatures::all(),
        )
        .unwrap();
        let metadata = config.metadata();
        assert!(metadata.contains(&("COMPRESSION".to_string(), "DEFLATE".to_string())));
        assert!(metadata.contains(&("EXTRA_SAMPLES".to_string(), "2".to_string())));
        assert!(metadata.contains(&("LEVEL".to_string(), "ZLEVEL=6".to_string())));
    }
}
