//! Entry-point traits drivers implement, and the requests passed to them.
//!
//! The registry never decodes pixels or features itself. It hands an
//! [`OpenInfo`] (file name plus the leading header bytes) or a
//! [`CreateRequest`] to the selected driver and gets an opaque [`Dataset`]
//! handle back, which is owned by the caller from then on.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;

use crate::drivers::extension_of;
use crate::error::DriverError;
use crate::options::CreationOptions;

/// Number of leading bytes read from a file for format sniffing.
pub const HEADER_PROBE_BYTES: usize = 1024;

/// What a driver gets to look at when asked to identify or open a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenInfo {
    filename: String,
    header: Vec<u8>,
}

impl OpenInfo {
    /// Builds probe information from an already read header.
    pub fn from_bytes(filename: impl Into<String>, header: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            header: header.into(),
        }
    }

    /// Probe information for a name with no readable content, such as a URL.
    pub fn from_name(filename: impl Into<String>) -> Self {
        Self::from_bytes(filename, Vec::new())
    }

    /// Reads the first [`HEADER_PROBE_BYTES`] of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be opened or read.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let mut header = Vec::with_capacity(HEADER_PROBE_BYTES);
        File::open(path)?
            .take(HEADER_PROBE_BYTES as u64)
            .read_to_end(&mut header)?;
        Ok(Self {
            filename: path.to_string_lossy().into_owned(),
            header,
        })
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    /// Lower-cased file extension, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.filename)
    }

    #[must_use]
    pub fn has_prefix_ignore_case(&self, prefix: &str) -> bool {
        self.filename
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    }
}

/// Answer of a driver's identify step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identification {
    /// The driver positively recognizes the file.
    Recognized,
    /// The driver is certain the file is not its format.
    NotRecognized,
    /// Cannot tell without attempting a full open.
    Unknown,
}

/// An open or freshly created dataset.
///
/// Whatever per-dataset state a driver keeps (codec handles, negotiated
/// configuration) lives behind this trait and belongs to the caller.
pub trait Dataset: Send {
    /// Code of the driver that produced the dataset.
    fn driver_code(&self) -> &str;

    /// File name or connection string of the dataset.
    fn description(&self) -> &str;

    /// Driver specific key/value metadata.
    fn metadata(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

impl fmt::Debug for dyn Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("driver", &self.driver_code())
            .field("description", &self.description())
            .finish()
    }
}

/// Open entry point of a driver.
pub trait DatasetOpener: Send + Sync {
    /// Opens the dataset described by `info`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is not readable by this driver.
    fn open(&self, info: &OpenInfo) -> Result<Box<dyn Dataset>>;
}

impl<F> DatasetOpener for F
where
    F: Fn(&OpenInfo) -> Result<Box<dyn Dataset>> + Send + Sync,
{
    fn open(&self, info: &OpenInfo) -> Result<Box<dyn Dataset>> {
        self(info)
    }
}

/// Create entry point of a driver.
pub trait DatasetCreator: Send + Sync {
    /// Creates a new dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be satisfied, including codec
    /// negotiation failures.
    fn create(&self, request: &CreateRequest) -> Result<Box<dyn Dataset>>;
}

impl<F> DatasetCreator for F
where
    F: Fn(&CreateRequest) -> Result<Box<dyn Dataset>> + Send + Sync,
{
    fn create(&self, request: &CreateRequest) -> Result<Box<dyn Dataset>> {
        self(request)
    }
}

/// Identify entry point of a driver.
pub trait FormatIdentifier: Send + Sync {
    fn identify(&self, info: &OpenInfo) -> Identification;
}

impl<F> FormatIdentifier for F
where
    F: Fn(&OpenInfo) -> Identification + Send + Sync,
{
    fn identify(&self, info: &OpenInfo) -> Identification {
        self(info)
    }
}

/// Pixel sample type of a raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    Byte,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float32,
    Float64,
    CInt16,
    CInt32,
    CFloat32,
    CFloat64,
}

impl SampleType {
    /// Bits per sample component (one half of a complex value).
    #[must_use]
    pub fn bits(self) -> u16 {
        match self {
            Self::Byte | Self::Int8 => 8,
            Self::UInt16 | Self::Int16 | Self::CInt16 => 16,
            Self::UInt32 | Self::Int32 | Self::Float32 | Self::CInt32 | Self::CFloat32 => 32,
            Self::UInt64 | Self::Int64 | Self::Float64 | Self::CFloat64 => 64,
        }
    }

    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(
            self,
            Self::Float32 | Self::Float64 | Self::CFloat32 | Self::CFloat64
        )
    }

    #[must_use]
    pub fn is_complex(self) -> bool {
        matches!(
            self,
            Self::CInt16 | Self::CInt32 | Self::CFloat32 | Self::CFloat64
        )
    }

    #[must_use]
    pub fn is_signed(self) -> bool {
        !matches!(
            self,
            Self::Byte | Self::UInt16 | Self::UInt32 | Self::UInt64
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Byte => "Byte",
            Self::Int8 => "Int8",
            Self::UInt16 => "UInt16",
            Self::Int16 => "Int16",
            Self::UInt32 => "UInt32",
            Self::Int32 => "Int32",
            Self::UInt64 => "UInt64",
            Self::Int64 => "Int64",
            Self::Float32 => "Float32",
            Self::Float64 => "Float64",
            Self::CInt16 => "CInt16",
            Self::CInt32 => "CInt32",
            Self::CFloat32 => "CFloat32",
            Self::CFloat64 => "CFloat64",
        }
    }

    const ALL: [SampleType; 14] = [
        Self::Byte,
        Self::Int8,
        Self::UInt16,
        Self::Int16,
        Self::UInt32,
        Self::Int32,
        Self::UInt64,
        Self::Int64,
        Self::Float32,
        Self::Float64,
        Self::CInt16,
        Self::CInt32,
        Self::CFloat32,
        Self::CFloat64,
    ];
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleType {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DriverError::InvalidCreationOption {
                option: "DATA_TYPE".to_string(),
                message: format!("unknown sample type '{s}'"),
            })
    }
}

/// A request to create a new raster dataset.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub bands: u32,
    pub sample_type: SampleType,
    pub options: CreationOptions,
}

impl CreateRequest {
    pub fn new(
        filename: impl Into<String>,
        width: u32,
        height: u32,
        bands: u32,
        sample_type: SampleType,
    ) -> Self {
        Self {
            filename: filename.into(),
            width,
            height,
            bands,
            sample_type,
            options: CreationOptions::default(),
        }
    }

    /// Adds a single `KEY=VALUE` creation option.
    #[must_use]
    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.set(key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_path_reads_bounded_header() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&vec![7u8; HEADER_PROBE_BYTES * 3]).unwrap();

        let info = OpenInfo::from_path(file.path()).unwrap();
        assert_eq!(info.header().len(), HEADER_PROBE_BYTES);
    }

    #[test]
    fn test_from_path_missing_file() {
        assert!(OpenInfo::from_path("/definitely/not/here.tif").is_err());
    }

    #[test]
    fn test_prefix_match_handles_short_names() {
        let info = OpenInfo::from_name("ht");
        assert!(!info.has_prefix_ignore_case("http://"));
        assert!(OpenInfo::from_name("Http://x").has_prefix_ignore_case("http://"));
    }

    #[test]
    fn test_sample_type_parse() {
        assert_eq!("float32".parse::<SampleType>().unwrap(), SampleType::Float32);
        assert_eq!(" CInt16 ".parse::<SampleType>().unwrap(), SampleType::CInt16);
        assert!("Float128".parse::<SampleType>().is_err());
    }

    #[test]
    fn test_sample_type_properties() {
        assert_eq!(SampleType::CFloat32.bits(), 32);
        assert!(SampleType::CFloat32.is_complex());
        assert!(SampleType::CFloat32.is_float());
        assert!(!SampleType::UInt16.is_signed());
        assert!(SampleType::Int8.is_signed());
    }

    #[test]
    fn test_create_request_options() {
        let request = CreateRequest::new("out.tif", 10, 10, 1, SampleType::Byte)
            .with_option("compress", "deflate");
        assert_eq!(request.options.get("COMPRESS"), Some("deflate"));
    }
}
