//! GeoTIFF driver and its codec negotiation layer.
//!
//! The driver registers two descriptors, `GTiff` (read and write) and `COG`
//! (cloud-optimized writer). Both resolve creation options into a
//! [`CodecConfig`] against the [`BuildFeatures`] of the binary, so requests for
//! codecs that were not compiled in fail at request time with a
//! [`CodecError`] that names the missing library.

pub mod build_info;
pub mod compression;
pub mod error;
pub mod factory;
pub mod header;
pub mod negotiate;
pub mod photometric;

pub use build_info::{BuildFeatures, CodecLibrary};
pub use compression::{
    Compression, build_supported_compressions, compression_method_name,
    enumerate_build_supported_compressions, resolve_compression, resolve_compression_method,
    supports_predictor,
};
pub use error::CodecError;
pub use factory::{
    COG_CODE, GTIFF_CODE, NewTiffDataset, TiffDataset, cog_driver, creation_option_schema,
    gtiff_driver, register_cog_format, register_gtiff_format,
};
pub use header::TiffHeader;
pub use negotiate::{CodecConfig, CodecLevel, Predictor, SampleFormat, negotiate, negotiate_cog};
pub use photometric::{
    ExtraSample, LayoutRequest, Photometric, PlanarConfig, ResolvedLayout, alpha_value,
    validate_photometric_and_planar_config,
};
