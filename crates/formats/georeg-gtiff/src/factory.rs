//! Driver descriptors for GeoTIFF and cloud-optimized GeoTIFF.
//!
//! This module builds the descriptors the registry sees and the entry points
//! behind them. Opening parses the TIFF header; creation runs codec
//! negotiation and hands back a dataset carrying the resolved configuration.

use anyhow::{Result, anyhow};
use georeg_core_common::{
    CreateRequest, CreationOptionDef, Dataset, DatasetCreator, DatasetOpener, Driver,
    DriverError, DriverSink, OpenInfo, OptionKind, Signature, SupportStatus,
};
use log::debug;

use crate::build_info::BuildFeatures;
use crate::compression::build_supported_compressions;
use crate::header::{ByteOrder, TiffHeader};
use crate::negotiate::{CodecConfig, negotiate, negotiate_cog};
use crate::photometric::Photometric;

pub const GTIFF_CODE: &str = "GTiff";
pub const COG_CODE: &str = "COG";

/// A TIFF file opened for reading.
#[derive(Debug)]
pub struct TiffDataset {
    filename: String,
    header: TiffHeader,
}

impl TiffDataset {
    #[must_use]
    pub fn header(&self) -> &TiffHeader {
        &self.header
    }
}

impl Dataset for TiffDataset {
    fn driver_code(&self) -> &str {
        GTIFF_CODE
    }

    fn description(&self) -> &str {
        &self.filename
    }

    fn metadata(&self) -> Vec<(String, String)> {
        let byte_order = match self.header.byte_order {
            ByteOrder::LittleEndian => "LITTLE_ENDIAN",
            ByteOrder::BigEndian => "BIG_ENDIAN",
        };
        vec![
            ("BYTE_ORDER".to_string(), byte_order.to_string()),
            (
                "BIGTIFF".to_string(),
                if self.header.is_bigtiff() { "YES" } else { "NO" }.to_string(),
            ),
            (
                "FIRST_IFD_OFFSET".to_string(),
                self.header.first_ifd_offset.to_string(),
            ),
        ]
    }
}

/// A dataset being created, with its negotiated codec configuration.
#[derive(Debug)]
pub struct NewTiffDataset {
    driver_code: &'static str,
    filename: String,
    width: u32,
    height: u32,
    config: CodecConfig,
}

impl NewTiffDataset {
    #[must_use]
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Dataset for NewTiffDataset {
    fn driver_code(&self) -> &str {
        self.driver_code
    }

    fn description(&self) -> &str {
        &self.filename
    }

    fn metadata(&self) -> Vec<(String, String)> {
        self.config.metadata()
    }
}

/// Open entry point of the GTiff driver.
struct TiffOpener;

impl DatasetOpener for TiffOpener {
    fn open(&self, info: &OpenInfo) -> Result<Box<dyn Dataset>> {
        let header = TiffHeader::parse(info.header())
            .ok_or_else(|| anyhow!("'{}' does not start with a TIFF header", info.filename()))?;
        debug!(
            "Opened {} ({:?}, first IFD at {})",
            info.filename(),
            header.variant,
            header.first_ifd_offset
        );
        Ok(Box::new(TiffDataset {
            filename: info.filename().to_string(),
            header,
        }))
    }
}

/// Create entry point shared by GTiff and COG.
struct TiffCreator {
    build: BuildFeatures,
    cog: bool,
}

impl DatasetCreator for TiffCreator {
    fn create(&self, request: &CreateRequest) -> Result<Box<dyn Dataset>> {
        if request.width == 0 || request.height == 0 {
            return Err(anyhow!(
                "cannot create '{}' with a {}x{} raster",
                request.filename,
                request.width,
                request.height
            ));
        }
        let (driver_code, config) = if self.cog {
            (COG_CODE, negotiate_cog(request, &self.build)?)
        } else {
            (GTIFF_CODE, negotiate(request, &self.build)?)
        };
        Ok(Box::new(NewTiffDataset {
            driver_code,
            filename: request.filename.clone(),
            width: request.width,
            height: request.height,
            config,
        }))
    }
}

/// Creation options understood by the driver, with the compression list
/// narrowed to what `build` supports.
#[must_use]
pub fn creation_option_schema(build: &BuildFeatures, for_cog: bool) -> Vec<CreationOptionDef> {
    let compressions: Vec<&str> = build_supported_compressions(build, for_cog)
        .into_iter()
        .map(|c| c.name())
        .collect();
    let default_compress = if for_cog { "LZW" } else { "NONE" };

    let mut schema = vec![
        CreationOptionDef::new("COMPRESS", OptionKind::StringSelect, "Compression method")
            .with_values(compressions)
            .with_default(default_compress),
        CreationOptionDef::new("PREDICTOR", OptionKind::StringSelect, "Predictor type")
            .with_values(["1", "2", "3", "YES", "NO", "STANDARD", "FLOATING_POINT"])
            .with_default("1"),
        CreationOptionDef::new(
            "JPEG_QUALITY",
            OptionKind::Int { min: 1, max: 100 },
            "JPEG quality",
        )
        .with_default("75"),
        CreationOptionDef::new(
            "ZLEVEL",
            OptionKind::Int { min: 1, max: 12 },
            "DEFLATE compression level",
        )
        .with_default("6"),
        CreationOptionDef::new(
            "ZSTD_LEVEL",
            OptionKind::Int { min: 1, max: 22 },
            "ZSTD compression level",
        )
        .with_default("9"),
        CreationOptionDef::new(
            "LZMA_PRESET",
            OptionKind::Int { min: 0, max: 9 },
            "LZMA compression level",
        )
        .with_default("6"),
        CreationOptionDef::new(
            "WEBP_LEVEL",
            OptionKind::Int { min: 1, max: 100 },
            "WEBP quality",
        )
        .with_default("75"),
        CreationOptionDef::new("WEBP_LOSSLESS", OptionKind::Boolean, "Lossless WEBP")
            .with_default("NO"),
        CreationOptionDef::new(
            "MAX_Z_ERROR",
            OptionKind::Float { min: 0.0 },
            "Maximum error threshold of LERC compression",
        )
        .with_default("0"),
        CreationOptionDef::new("JXL_LOSSLESS", OptionKind::Boolean, "Lossless JPEG-XL")
            .with_default("YES"),
        CreationOptionDef::new(
            "PHOTOMETRIC",
            OptionKind::StringSelect,
            "Photometric interpretation",
        )
        .with_values(Photometric::option_values()),
        CreationOptionDef::new(
            "ALPHA",
            OptionKind::StringSelect,
            "Mark the first extra band as alpha",
        )
        .with_values(["YES", "NON-PREMULTIPLIED", "PREMULTIPLIED", "UNSPECIFIED", "NO"]),
        CreationOptionDef::new("INTERLEAVE", OptionKind::StringSelect, "Sample layout")
            .with_values(["PIXEL", "BAND"])
            .with_default("PIXEL"),
        CreationOptionDef::new(
            "NBITS",
            OptionKind::Int { min: 1, max: 32 },
            "Bits per sample for integer types",
        ),
        CreationOptionDef::new("BIGTIFF", OptionKind::StringSelect, "Write a BigTIFF file")
            .with_values(["YES", "NO", "IF_NEEDED", "IF_SAFER"])
            .with_default("IF_NEEDED"),
    ];
    if !for_cog {
        schema.push(
            CreationOptionDef::new("TILED", OptionKind::Boolean, "Write a tiled TIFF")
                .with_default("NO"),
        );
    }
    schema
}

/// GeoTIFF descriptor for the given build profile.
#[must_use]
pub fn gtiff_driver(build: BuildFeatures) -> Driver {
    Driver::builder(GTIFF_CODE, "GeoTIFF")
        .raster()
        .extensions(&["tif", "tiff"])
        .signature(Signature::magic(b"II*\0"))
        .signature(Signature::magic(b"MM\0*"))
        .signature(Signature::magic(b"II+\0"))
        .signature(Signature::magic(b"MM\0+"))
        .info(SupportStatus::Supported)
        .read(SupportStatus::Supported)
        .write(SupportStatus::Supported)
        .opener(TiffOpener)
        .creator(TiffCreator { build, cog: false })
        .creation_options(creation_option_schema(&build, false))
        .help_topic("drivers/raster/gtiff.html")
        .build()
}

/// Cloud optimized GeoTIFF descriptor. Create only: COG files are read by
/// the GTiff driver.
#[must_use]
pub fn cog_driver(build: BuildFeatures) -> Driver {
    Driver::builder(COG_CODE, "Cloud optimized GeoTIFF generator")
        .raster()
        .write(SupportStatus::Supported)
        .creator(TiffCreator { build, cog: true })
        .creation_options(creation_option_schema(&build, true))
        .help_topic("drivers/raster/cog.html")
        .build()
}

/// Registers the GTiff driver, built with this binary's codec libraries.
///
/// # Errors
///
/// Propagates the sink's validation error.
pub fn register_gtiff_format(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(gtiff_driver(BuildFeatures::compiled()))
}

/// Registers the COG driver, built with this binary's codec libraries.
///
/// # Errors
///
/// Propagates the sink's validation error.
pub fn register_cog_format(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(cog_driver(BuildFeatures::compiled()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use georeg_core_common::{CollectingSink, Identification};

    #[test]
    fn test_descriptors_validate() {
        let sink = CollectingSink::new();
        register_gtiff_format(&sink).unwrap();
        register_cog_format(&sink).unwrap();
        let drivers = sink.into_drivers();
        assert_eq!(drivers.len(), 2);
        assert_eq!(drivers[0].code(), GTIFF_CODE);
        assert!(drivers[1].has_creator());
        assert!(!drivers[1].has_opener());
    }

    #[test]
    fn test_probe_by_magic() {
        let driver = gtiff_driver(BuildFeatures::all());
        let info = OpenInfo::from_bytes("scene", b"MM\0*\0\0\0\x08".to_vec());
        assert_eq!(driver.probe(&info), Identification::Recognized);
        assert_eq!(
            cog_driver(BuildFeatures::all()).probe(&info),
            Identification::NotRecognized
        );
    }

    #[test]
    fn test_schema_follows_build() {
        let schema = creation_option_schema(&BuildFeatures::minimal(), false);
        let compress = schema.iter().find(|d| d.name == "COMPRESS").unwrap();
        assert!(compress.allowed_values.contains(&"PACKBITS".to_string()));
        assert!(!compress.allowed_values.contains(&"DEFLATE".to_string()));

        let cog = creation_option_schema(&BuildFeatures::all(), true);
        let compress = cog.iter().find(|d| d.name == "COMPRESS").unwrap();
        assert_eq!(compress.default.as_deref(), Some("LZW"));
        assert!(!compress.allowed_values.contains(&"CCITTFAX4".to_string()));
        assert!(cog.iter().all(|d| d.name != "TILED"));
    }

    #[test]
    fn test_create_rejects_empty_raster() {
        let driver = gtiff_driver(BuildFeatures::all());
        let request = CreateRequest::new("empty.tif", 0, 10, 1, georeg_core_common::SampleType::Byte);
        assert!(driver.create(&request).is_err());
    }
}
