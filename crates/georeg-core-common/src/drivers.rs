//! Capability descriptors for geospatial format drivers.
//!
//! A [`Driver`] is the registry's immutable record of one format handler: its
//! short code, display name, the extensions and byte signatures used while
//! sniffing files, the open/create/identify entry points it supplies, and the
//! creation options it understands. Descriptors are built once with
//! [`Driver::builder`] and shared behind an `Arc` for the life of the process.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::error::DriverError;
use crate::io::{
    CreateRequest, Dataset, DatasetCreator, DatasetOpener, FormatIdentifier, Identification,
    OpenInfo,
};
use crate::options::CreationOptionDef;

/// Support status for a specific driver operation.
///
/// Indicates whether a driver operation (info, read, or write) is currently supported,
/// planned for future implementation, or not supported at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportStatus {
    /// The feature is fully supported and implemented.
    Supported,
    /// The feature is not supported by the driver.
    NotSupported,
    /// The feature is planned for future implementation.
    Planned,
}

impl SupportStatus {
    /// Returns `true` if the operation is fully supported and implemented.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(self, SupportStatus::Supported)
    }

    /// Returns `true` if the operation is supported or planned (i.e., not explicitly unsupported).
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self, SupportStatus::NotSupported)
    }

    /// Returns the string representation of this support status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            SupportStatus::Supported => "Supported",
            SupportStatus::NotSupported => "Not Supported",
            SupportStatus::Planned => "Planned",
        }
    }
}

/// Capabilities advertised by a driver.
///
/// `info`, `read` and `write` carry a [`SupportStatus`]; `raster` and `vector`
/// say which data model the driver serves (some serve both).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCapabilities {
    /// Support status for reading dataset metadata and information.
    pub info: SupportStatus,
    /// Support status for reading data from this format.
    pub read: SupportStatus,
    /// Support status for writing data to this format.
    pub write: SupportStatus,
    /// Driver handles raster data.
    pub raster: bool,
    /// Driver handles vector data.
    pub vector: bool,
}

impl DriverCapabilities {
    /// Capabilities with every operation unsupported.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            info: SupportStatus::NotSupported,
            read: SupportStatus::NotSupported,
            write: SupportStatus::NotSupported,
            raster: false,
            vector: false,
        }
    }

    /// Returns `true` if at least one operation is supported or planned.
    #[must_use]
    pub fn has_any_support(&self) -> bool {
        self.info.is_available() || self.read.is_available() || self.write.is_available()
    }

    /// Returns `true` if at least one operation is fully supported and implemented.
    #[must_use]
    pub fn has_supported_operation(&self) -> bool {
        self.info.is_supported() || self.read.is_supported() || self.write.is_supported()
    }
}

impl Default for DriverCapabilities {
    fn default() -> Self {
        Self::none()
    }
}

/// A byte pattern expected at a fixed offset of a file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Offset of the first pattern byte within the header.
    pub offset: usize,
    /// Expected bytes.
    pub bytes: Vec<u8>,
    /// Compare ASCII letters without regard to case.
    pub ignore_ascii_case: bool,
}

impl Signature {
    /// A magic number at the very start of the file.
    #[must_use]
    pub fn magic(bytes: &[u8]) -> Self {
        Self::at(0, bytes)
    }

    /// A magic number at `offset`.
    #[must_use]
    pub fn at(offset: usize, bytes: &[u8]) -> Self {
        Self {
            offset,
            bytes: bytes.to_vec(),
            ignore_ascii_case: false,
        }
    }

    /// A leading ASCII keyword, matched case-insensitively.
    ///
    /// Used by formats with loosely structured text headers, which are the
    /// weakest kind of signature the registry knows about.
    #[must_use]
    pub fn ascii_keyword(keyword: &str) -> Self {
        Self {
            offset: 0,
            bytes: keyword.as_bytes().to_vec(),
            ignore_ascii_case: true,
        }
    }

    /// Returns `true` when `header` carries this pattern.
    #[must_use]
    pub fn matches(&self, header: &[u8]) -> bool {
        let Some(end) = self.offset.checked_add(self.bytes.len()) else {
            return false;
        };
        let Some(window) = header.get(self.offset..end) else {
            return false;
        };
        if self.ignore_ascii_case {
            window.eq_ignore_ascii_case(&self.bytes)
        } else {
            window == self.bytes.as_slice()
        }
    }
}

/// Immutable description of one format driver.
///
/// The `code` is the primary key in a driver table. The entry points are
/// optional: a read-only driver has no creator, a create-only driver (such as
/// a cloud-optimized writer) has no opener.
#[derive(Clone)]
pub struct Driver {
    code: String,
    long_name: String,
    extensions: Vec<String>,
    signatures: Vec<Signature>,
    url_prefixes: Vec<String>,
    capabilities: DriverCapabilities,
    opener: Option<Arc<dyn DatasetOpener>>,
    creator: Option<Arc<dyn DatasetCreator>>,
    identifier: Option<Arc<dyn FormatIdentifier>>,
    creation_options: Vec<CreationOptionDef>,
    help_topic: Option<String>,
}

impl Driver {
    /// Starts building a descriptor for `code`.
    #[must_use]
    pub fn builder(code: impl Into<String>, long_name: impl Into<String>) -> DriverBuilder {
        DriverBuilder {
            driver: Driver {
                code: code.into(),
                long_name: long_name.into(),
                extensions: Vec::new(),
                signatures: Vec::new(),
                url_prefixes: Vec::new(),
                capabilities: DriverCapabilities::none(),
                opener: None,
                creator: None,
                identifier: None,
                creation_options: Vec::new(),
                help_topic: None,
            },
        }
    }

    /// Short code used for lookups and skip lists (e.g. `"GTiff"`).
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Human readable name.
    #[must_use]
    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    /// File extensions, lower case and without the leading dot.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Header signatures that positively identify the format.
    #[must_use]
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Name prefixes (such as URL schemes) claimed by the driver.
    #[must_use]
    pub fn url_prefixes(&self) -> &[String] {
        &self.url_prefixes
    }

    #[must_use]
    pub fn capabilities(&self) -> DriverCapabilities {
        self.capabilities
    }

    /// Creation option schema, in declaration order.
    #[must_use]
    pub fn creation_options(&self) -> &[CreationOptionDef] {
        &self.creation_options
    }

    #[must_use]
    pub fn help_topic(&self) -> Option<&str> {
        self.help_topic.as_deref()
    }

    #[must_use]
    pub fn has_opener(&self) -> bool {
        self.opener.is_some()
    }

    #[must_use]
    pub fn has_creator(&self) -> bool {
        self.creator.is_some()
    }

    #[must_use]
    pub fn has_identifier(&self) -> bool {
        self.identifier.is_some()
    }

    /// Checks the basic shape of the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MalformedDriver`] when the code is empty or
    /// contains characters reserved by skip lists, or when the driver claims
    /// read (write) support without an opener (creator).
    pub fn validate(&self) -> Result<(), DriverError> {
        let malformed = |reason: &str| DriverError::MalformedDriver {
            code: self.code.clone(),
            reason: reason.to_string(),
        };

        if self.code.trim().is_empty() {
            return Err(malformed("driver code is empty"));
        }
        if self
            .code
            .chars()
            .any(|c| c.is_whitespace() || c == ',' || c.is_control())
        {
            return Err(malformed(
                "driver code must not contain whitespace or commas",
            ));
        }
        if self.capabilities.read.is_supported() && self.opener.is_none() {
            return Err(malformed("claims read support but has no open entry point"));
        }
        if self.capabilities.write.is_supported() && self.creator.is_none() {
            return Err(malformed(
                "claims write support but has no create entry point",
            ));
        }
        Ok(())
    }

    /// Returns `true` when the file name ends with one of the driver's extensions.
    #[must_use]
    pub fn matches_extension(&self, filename: &str) -> bool {
        extension_of(filename)
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
    }

    /// Decides whether this driver claims the file described by `info`.
    ///
    /// An explicit identify entry point wins. Otherwise a name prefix or a
    /// header signature gives a positive answer, an extension match alone is
    /// only [`Identification::Unknown`].
    #[must_use]
    pub fn probe(&self, info: &OpenInfo) -> Identification {
        if let Some(identifier) = &self.identifier {
            return identifier.identify(info);
        }
        if self
            .url_prefixes
            .iter()
            .any(|prefix| info.has_prefix_ignore_case(prefix))
        {
            return Identification::Recognized;
        }
        if self.signatures.iter().any(|s| s.matches(info.header())) {
            return Identification::Recognized;
        }
        if self.matches_extension(info.filename()) {
            return Identification::Unknown;
        }
        Identification::NotRecognized
    }

    /// Opens a dataset with this driver.
    ///
    /// # Errors
    ///
    /// Fails with [`DriverError::OperationNotSupported`] for drivers without an
    /// opener, or with whatever the opener reports.
    pub fn open(&self, info: &OpenInfo) -> Result<Box<dyn Dataset>> {
        let opener = self
            .opener
            .as_ref()
            .ok_or_else(|| DriverError::OperationNotSupported {
                driver: self.code.clone(),
                operation: "opening".to_string(),
            })?;
        opener.open(info)
    }

    /// Creates a dataset with this driver.
    ///
    /// # Errors
    ///
    /// Fails with [`DriverError::OperationNotSupported`] for read-only drivers,
    /// or with whatever the creator reports.
    pub fn create(&self, request: &CreateRequest) -> Result<Box<dyn Dataset>> {
        let creator = self
            .creator
            .as_ref()
            .ok_or_else(|| DriverError::OperationNotSupported {
                driver: self.code.clone(),
                operation: "creation".to_string(),
            })?;
        creator.create(request)
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("code", &self.code)
            .field("long_name", &self.long_name)
            .field("extensions", &self.extensions)
            .field("signatures", &self.signatures.len())
            .field("url_prefixes", &self.url_prefixes)
            .field("capabilities", &self.capabilities)
            .field("open", &self.opener.is_some())
            .field("create", &self.creator.is_some())
            .field("identify", &self.identifier.is_some())
            .field("creation_options", &self.creation_options.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Driver`].
pub struct DriverBuilder {
    driver: Driver,
}

impl DriverBuilder {
    #[must_use]
    pub fn extension(mut self, ext: &str) -> Self {
        self.driver
            .extensions
            .push(ext.trim_start_matches('.').to_ascii_lowercase());
        self
    }

    #[must_use]
    pub fn extensions(self, exts: &[&str]) -> Self {
        exts.iter().fold(self, |b, ext| b.extension(ext))
    }

    #[must_use]
    pub fn signature(mut self, signature: Signature) -> Self {
        self.driver.signatures.push(signature);
        self
    }

    #[must_use]
    pub fn url_prefix(mut self, prefix: &str) -> Self {
        self.driver.url_prefixes.push(prefix.to_string());
        self
    }

    #[must_use]
    pub fn raster(mut self) -> Self {
        self.driver.capabilities.raster = true;
        self
    }

    #[must_use]
    pub fn vector(mut self) -> Self {
        self.driver.capabilities.vector = true;
        self
    }

    #[must_use]
    pub fn info(mut self, status: SupportStatus) -> Self {
        self.driver.capabilities.info = status;
        self
    }

    #[must_use]
    pub fn read(mut self, status: SupportStatus) -> Self {
        self.driver.capabilities.read = status;
        self
    }

    #[must_use]
    pub fn write(mut self, status: SupportStatus) -> Self {
        self.driver.capabilities.write = status;
        self
    }

    #[must_use]
    pub fn opener(mut self, opener: impl DatasetOpener + 'static) -> Self {
        self.driver.opener = Some(Arc::new(opener));
        self
    }

    /// Closure form of [`DriverBuilder::opener`].
    #[must_use]
    pub fn open_with<F>(self, f: F) -> Self
    where
        F: Fn(&OpenInfo) -> Result<Box<dyn Dataset>> + Send + Sync + 'static,
    {
        self.opener(f)
    }

    #[must_use]
    pub fn creator(mut self, creator: impl DatasetCreator + 'static) -> Self {
        self.driver.creator = Some(Arc::new(creator));
        self
    }

    /// Closure form of [`DriverBuilder::creator`].
    #[must_use]
    pub fn create_with<F>(self, f: F) -> Self
    where
        F: Fn(&CreateRequest) -> Result<Box<dyn Dataset>> + Send + Sync + 'static,
    {
        self.creator(f)
    }

    #[must_use]
    pub fn identifier(mut self, identifier: impl FormatIdentifier + 'static) -> Self {
        self.driver.identifier = Some(Arc::new(identifier));
        self
    }

    /// Closure form of [`DriverBuilder::identifier`].
    #[must_use]
    pub fn identify_with<F>(self, f: F) -> Self
    where
        F: Fn(&OpenInfo) -> Identification + Send + Sync + 'static,
    {
        self.identifier(f)
    }

    #[must_use]
    pub fn creation_option(mut self, option: CreationOptionDef) -> Self {
        self.driver.creation_options.push(option);
        self
    }

    #[must_use]
    pub fn creation_options(mut self, options: impl IntoIterator<Item = CreationOptionDef>) -> Self {
        self.driver.creation_options.extend(options);
        self
    }

    #[must_use]
    pub fn help_topic(mut self, topic: &str) -> Self {
        self.driver.help_topic = Some(topic.to_string());
        self
    }

    /// Finishes the descriptor. Shape validation happens at registration.
    #[must_use]
    pub fn build(self) -> Driver {
        self.driver
    }
}

/// Lower-cased extension of a file name or URL path, if any.
#[must_use]
pub fn extension_of(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiff_like() -> Driver {
        Driver::builder("TIFFish", "Tiff-like")
            .raster()
            .extensions(&[".tif", "TIFF"])
            .signature(Signature::magic(b"II*\0"))
            .info(SupportStatus::Supported)
            .build()
    }

    #[test]
    fn test_support_status() {
        assert!(SupportStatus::Supported.is_supported());
        assert!(!SupportStatus::NotSupported.is_supported());
        assert!(!SupportStatus::Planned.is_supported());

        assert!(SupportStatus::Supported.is_available());
        assert!(!SupportStatus::NotSupported.is_available());
        assert!(SupportStatus::Planned.is_available());
        assert_eq!(SupportStatus::NotSupported.as_str(), "Not Supported");
    }

    #[test]
    fn test_signature_offsets() {
        let sig = Signature::at(4, b"ftyp");
        assert!(sig.matches(b"\0\0\0\x18ftypavif"));
        assert!(!sig.matches(b"\0\0\0\x18"));
        assert!(!Signature::at(usize::MAX, b"x").matches(b"xyz"));
    }

    #[test]
    fn test_ascii_keyword_is_case_insensitive() {
        let sig = Signature::ascii_keyword("ncols");
        assert!(sig.matches(b"NCOLS 10\nnrows 4"));
        assert!(!sig.matches(b"nrows 4"));
    }

    #[test]
    fn test_extensions_are_normalized() {
        let driver = tiff_like();
        assert_eq!(driver.extensions(), ["tif", "tiff"]);
        assert!(driver.matches_extension("/data/DEM.TIF"));
        assert!(!driver.matches_extension("archive.tif.zip"));
        assert!(!driver.matches_extension(".tif"));
    }

    #[test]
    fn test_probe_prefers_signature_over_extension() {
        let driver = tiff_like();
        let by_magic = OpenInfo::from_bytes("noext", b"II*\0\x08\0\0\0".to_vec());
        let by_name = OpenInfo::from_bytes("x.tif", b"garbage".to_vec());
        let neither = OpenInfo::from_bytes("x.png", b"garbage".to_vec());

        assert_eq!(driver.probe(&by_magic), Identification::Recognized);
        assert_eq!(driver.probe(&by_name), Identification::Unknown);
        assert_eq!(driver.probe(&neither), Identification::NotRecognized);
    }

    #[test]
    fn test_probe_url_prefix() {
        let driver = Driver::builder("HTTP", "HTTP Fetching Wrapper")
            .url_prefix("https://")
            .build();
        assert_eq!(
            driver.probe(&OpenInfo::from_name("HTTPS://example.com/a.tif")),
            Identification::Recognized
        );
    }

    #[test]
    fn test_validate_rejects_empty_code() {
        let driver = Driver::builder("  ", "Nothing").build();
        assert!(matches!(
            driver.validate(),
            Err(DriverError::MalformedDriver { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_read_without_opener() {
        let driver = Driver::builder("RO", "Read only")
            .read(SupportStatus::Supported)
            .build();
        let err = driver.validate().unwrap_err();
        assert!(err.to_string().contains("no open entry point"));
    }

    #[test]
    fn test_validate_accepts_planned_capabilities() {
        let driver = Driver::builder("Later", "Comes later")
            .read(SupportStatus::Planned)
            .write(SupportStatus::Planned)
            .build();
        assert!(driver.validate().is_ok());
    }

    #[test]
    fn test_open_without_opener_is_reported() {
        let driver = tiff_like();
        let err = driver
            .open(&OpenInfo::from_name("a.tif"))
            .err()
            .expect("no opener");
        assert_eq!(err.to_string(), "Driver 'TIFFish' does not support opening");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a/b/c.GeoJSON").as_deref(), Some("geojson"));
        assert_eq!(extension_of("https://host/x.tif").as_deref(), Some("tif"));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of("dir.d/file"), None);
    }
}
