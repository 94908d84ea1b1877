//! The built-in driver table.
//!
//! Which drivers are compiled in is data, not scattered conditionals: every
//! row names a driver, carries its availability flag (a Cargo feature) and
//! says how it registers. Rows are listed in registration order, which is
//! also the initial probe order before reordering.
//!
//! Eager rows run a registration function straight away. Deferred rows only
//! declare a stub; the real driver is fetched from its plugin module the
//! first time a file needs it.

use anyhow::{Result, bail};
use georeg_core_common::{
    Dataset, Driver, DriverError, DriverSink, Identification, OpenInfo, RegisterFn, Signature,
    SupportStatus,
};
use log::{debug, warn};

use crate::deferred::DeferredDriver;
use crate::error::MaterializationError;
use crate::plugin::PluginLoader;
use crate::table::{DriverOrigin, DriverTable};

/// How a built-in row registers.
#[derive(Debug, Clone, Copy)]
pub enum BuiltinEntry {
    /// Register the full descriptor now.
    Eager(RegisterFn),
    /// Declare a stub that loads the driver on first use.
    Deferred(DeferredSpec),
}

/// What a deferred row knows before its driver is loaded.
#[derive(Debug, Clone, Copy)]
pub struct DeferredSpec {
    pub long_name: &'static str,
    pub extensions: &'static [&'static str],
    pub signatures: &'static [Magic],
    /// Native library the real driver links against.
    pub dependency: &'static str,
}

/// A byte pattern at a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct Magic {
    pub offset: usize,
    pub bytes: &'static [u8],
}

impl Magic {
    const fn at(offset: usize, bytes: &'static [u8]) -> Self {
        Self { offset, bytes }
    }

    fn signature(&self) -> Signature {
        Signature::at(self.offset, self.bytes)
    }
}

/// One row of the built-in table.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinDriver {
    pub code: &'static str,
    /// Whether the driver is compiled into this build.
    pub available: bool,
    pub entry: BuiltinEntry,
}

const fn eager(code: &'static str, available: bool, register: RegisterFn) -> BuiltinDriver {
    BuiltinDriver {
        code,
        available,
        entry: BuiltinEntry::Eager(register),
    }
}

const fn deferred(code: &'static str, available: bool, spec: DeferredSpec) -> BuiltinDriver {
    BuiltinDriver {
        code,
        available,
        entry: BuiltinEntry::Deferred(spec),
    }
}

/// Built-in drivers in registration order.
pub static BUILTIN_DRIVERS: &[BuiltinDriver] = &[
    eager("GTiff", cfg!(feature = "gtiff"), georeg_gtiff::register_gtiff_format),
    eager("COG", cfg!(feature = "gtiff"), georeg_gtiff::register_cog_format),
    deferred(
        "netCDF",
        cfg!(feature = "netcdf"),
        DeferredSpec {
            long_name: "Network Common Data Format",
            extensions: &["nc"],
            signatures: &[Magic::at(0, b"CDF\x01"), Magic::at(0, b"CDF\x02")],
            dependency: "libnetcdf",
        },
    ),
    eager("HFA", true, register_hfa),
    eager("PNG", true, register_png),
    eager("JPEG", true, register_jpeg),
    eager("GIF", true, register_gif),
    eager("BMP", true, register_bmp),
    eager("NITF", true, register_nitf),
    deferred(
        "JP2OpenJPEG",
        cfg!(feature = "openjpeg"),
        DeferredSpec {
            long_name: "JPEG-2000 driver based on OpenJPEG library",
            extensions: &["jp2", "j2k"],
            signatures: &[
                Magic::at(0, b"\0\0\0\x0cjP  \r\n\x87\n"),
                Magic::at(0, b"\xff\x4f\xff\x51"),
            ],
            dependency: "libopenjp2",
        },
    ),
    deferred(
        "WEBP",
        cfg!(feature = "webp"),
        DeferredSpec {
            long_name: "WEBP",
            extensions: &["webp"],
            signatures: &[Magic::at(8, b"WEBP")],
            dependency: "libwebp",
        },
    ),
    deferred(
        "PDF",
        cfg!(feature = "pdf"),
        DeferredSpec {
            long_name: "Geospatial PDF",
            extensions: &["pdf"],
            signatures: &[Magic::at(0, b"%PDF")],
            dependency: "libpoppler",
        },
    ),
    eager("GeoJSON", true, register_geojson),
    deferred(
        "Parquet",
        cfg!(feature = "parquet"),
        DeferredSpec {
            long_name: "(Geo)Parquet",
            extensions: &["parquet"],
            signatures: &[Magic::at(0, b"PAR1")],
            dependency: "libarrow",
        },
    ),
    eager("AAIGrid", true, register_aaigrid),
    eager("USGSDEM", true, register_usgsdem),
    eager("HDF5", true, register_hdf5),
    eager("XYZ", true, register_xyz),
    eager("CSV", true, register_csv),
    eager("ENVI", true, register_envi),
    eager("HTTP", true, register_http),
];

/// Outcome of registering the built-in table.
#[derive(Debug, Default)]
pub struct BuiltinReport {
    pub registered: Vec<String>,
    pub deferred: Vec<String>,
    /// Rows left out because their feature is disabled.
    pub unavailable: Vec<String>,
    pub failures: Vec<(String, DriverError)>,
}

/// Registers every available row of [`BUILTIN_DRIVERS`] into `table`.
///
/// A failing row is logged and recorded; the remaining rows still register.
pub fn register_builtin_drivers(table: &DriverTable, loader: &PluginLoader) -> BuiltinReport {
    register_rows(BUILTIN_DRIVERS, table, loader)
}

pub(crate) fn register_rows(
    rows: &[BuiltinDriver],
    table: &DriverTable,
    loader: &PluginLoader,
) -> BuiltinReport {
    let mut report = BuiltinReport::default();
    let sink = table.sink(DriverOrigin::BuiltIn);
    for row in rows {
        if !row.available {
            debug!("Driver {} is not part of this build", row.code);
            report.unavailable.push(row.code.to_string());
            continue;
        }
        match row.entry {
            BuiltinEntry::Eager(register) => match register(&sink) {
                Ok(()) => report.registered.push(row.code.to_string()),
                Err(err) => {
                    warn!("Built-in driver {} failed to register: {err}", row.code);
                    report.failures.push((row.code.to_string(), err));
                },
            },
            BuiltinEntry::Deferred(spec) => {
                let stub = deferred_stub(row.code, &spec, loader);
                match table.declare_deferred(stub, DriverOrigin::BuiltIn, None) {
                    Ok(()) => report.deferred.push(row.code.to_string()),
                    Err(err) => {
                        warn!("Deferred driver {} failed to register: {err}", row.code);
                        report.failures.push((row.code.to_string(), err));
                    },
                }
            },
        }
    }
    report
}

/// Builds the stub of a deferred row, materializing through `loader`.
#[must_use]
pub fn deferred_stub(code: &'static str, spec: &DeferredSpec, loader: &PluginLoader) -> DeferredDriver {
    let loader = loader.clone();
    let dependency = spec.dependency;
    let stub = DeferredDriver::new(code, spec.long_name, move || {
        loader.fetch(code).map_err(|e| MaterializationError {
            code: code.to_string(),
            dependency: Some(dependency.to_string()),
            reason: e.to_string(),
        })
    })
    .with_extensions(spec.extensions)
    .with_dependency(dependency);
    spec.signatures
        .iter()
        .fold(stub, |stub, magic| stub.with_signature(magic.signature()))
}

/// A file recognized from its header only.
#[derive(Debug)]
pub struct HeaderDataset {
    driver_code: String,
    filename: String,
    header_len: usize,
}

impl Dataset for HeaderDataset {
    fn driver_code(&self) -> &str {
        &self.driver_code
    }

    fn description(&self) -> &str {
        &self.filename
    }

    fn metadata(&self) -> Vec<(String, String)> {
        vec![("HEADER_BYTES".to_string(), self.header_len.to_string())]
    }
}

/// A format identified by magic bytes, or by extension alone when it has
/// none. Such drivers report what they recognize; pixel and feature access
/// is not implemented yet.
fn simple_driver(
    code: &'static str,
    long_name: &'static str,
    extensions: &'static [&'static str],
    signatures: Vec<Signature>,
    vector: bool,
) -> Driver {
    let builder = Driver::builder(code, long_name)
        .extensions(extensions)
        .info(SupportStatus::Supported)
        .read(SupportStatus::Planned)
        .write(SupportStatus::NotSupported);
    let builder = if vector { builder.vector() } else { builder.raster() };
    let builder = signatures
        .iter()
        .fold(builder, |b, s| b.signature(s.clone()));

    builder
        .open_with(move |info: &OpenInfo| -> Result<Box<dyn Dataset>> {
            let claimed = if signatures.is_empty() {
                info.extension()
                    .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
            } else {
                signatures.iter().any(|s| s.matches(info.header()))
            };
            if !claimed {
                bail!("'{}' is not a {code} file", info.filename());
            }
            Ok(Box::new(HeaderDataset {
                driver_code: code.to_string(),
                filename: info.filename().to_string(),
                header_len: info.header().len(),
            }))
        })
        .build()
}

fn register_hfa(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(simple_driver(
        "HFA",
        "Erdas Imagine Images (.img)",
        &["img"],
        vec![Signature::magic(b"EHFA_HEADER_TAG")],
        false,
    ))
}

fn register_png(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(simple_driver(
        "PNG",
        "Portable Network Graphics",
        &["png"],
        vec![Signature::magic(b"\x89PNG\r\n\x1a\n")],
        false,
    ))
}

fn register_jpeg(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(simple_driver(
        "JPEG",
        "JPEG JFIF",
        &["jpg", "jpeg"],
        vec![Signature::magic(b"\xff\xd8\xff")],
        false,
    ))
}

fn register_gif(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(simple_driver(
        "GIF",
        "Graphics Interchange Format (.gif)",
        &["gif"],
        vec![Signature::magic(b"GIF87a"), Signature::magic(b"GIF89a")],
        false,
    ))
}

fn register_bmp(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(simple_driver(
        "BMP",
        "MS Windows Device Independent Bitmap",
        &["bmp"],
        vec![Signature::magic(b"BM")],
        false,
    ))
}

fn register_nitf(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(simple_driver(
        "NITF",
        "National Imagery Transmission Format",
        &["ntf", "nitf", "nsf"],
        vec![Signature::magic(b"NITF"), Signature::magic(b"NSIF")],
        false,
    ))
}

fn register_hdf5(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(simple_driver(
        "HDF5",
        "Hierarchical Data Format Release 5",
        &["h5", "hdf5"],
        vec![Signature::magic(b"\x89HDF\r\n\x1a\n")],
        false,
    ))
}

fn register_aaigrid(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(simple_driver(
        "AAIGrid",
        "Arc/Info ASCII Grid",
        &["asc"],
        vec![Signature::ascii_keyword("ncols")],
        false,
    ))
}

fn register_usgsdem(sink: &dyn DriverSink) -> Result<(), DriverError> {
    // Level code field of the type A record.
    sink.register_driver(simple_driver(
        "USGSDEM",
        "USGS Optional ASCII DEM (and CDED)",
        &["dem"],
        vec![Signature::at(156, b"     0"), Signature::at(156, b"     1")],
        false,
    ))
}

fn register_xyz(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(simple_driver("XYZ", "ASCII Gridded XYZ", &["xyz"], Vec::new(), false))
}

fn register_csv(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(simple_driver(
        "CSV",
        "Comma Separated Value (.csv)",
        &["csv"],
        Vec::new(),
        true,
    ))
}

fn register_envi(sink: &dyn DriverSink) -> Result<(), DriverError> {
    sink.register_driver(simple_driver(
        "ENVI",
        "ENVI .hdr Labelled",
        &["hdr"],
        vec![Signature::ascii_keyword("ENVI")],
        false,
    ))
}

/// GeoJSON is text, so it is identified by its leading object rather than
/// by magic bytes.
fn identify_geojson(info: &OpenInfo) -> Identification {
    let text = String::from_utf8_lossy(info.header());
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('{')
        && trimmed.contains("\"type\"")
        && ["\"FeatureCollection\"", "\"Feature\"", "\"coordinates\""]
            .iter()
            .any(|marker| trimmed.contains(marker))
    {
        return Identification::Recognized;
    }
    let by_extension = info
        .extension()
        .is_some_and(|ext| ext == "geojson");
    if by_extension {
        Identification::Unknown
    } else {
        Identification::NotRecognized
    }
}

fn register_geojson(sink: &dyn DriverSink) -> Result<(), DriverError> {
    let driver = Driver::builder("GeoJSON", "GeoJSON")
        .vector()
        .extensions(&["json", "geojson"])
        .info(SupportStatus::Supported)
        .read(SupportStatus::Planned)
        .write(SupportStatus::NotSupported)
        .identify_with(identify_geojson)
        .open_with(|info: &OpenInfo| -> Result<Box<dyn Dataset>> {
            if identify_geojson(info) != Identification::Recognized {
                bail!("'{}' is not a GeoJSON document", info.filename());
            }
            Ok(Box::new(HeaderDataset {
                driver_code: "GeoJSON".to_string(),
                filename: info.filename().to_string(),
                header_len: info.header().len(),
            }))
        })
        .build();
    sink.register_driver(driver)
}

/// A remote resource claimed by the HTTP driver.
#[derive(Debug)]
pub struct RemoteDataset {
    url: String,
}

impl Dataset for RemoteDataset {
    fn driver_code(&self) -> &str {
        "HTTP"
    }

    fn description(&self) -> &str {
        &self.url
    }

    fn metadata(&self) -> Vec<(String, String)> {
        let scheme = self.url.split_once("://").map_or("", |(s, _)| s);
        vec![("SCHEME".to_string(), scheme.to_ascii_lowercase())]
    }
}

const HTTP_PREFIXES: [&str; 3] = ["http://", "https://", "ftp://"];

fn register_http(sink: &dyn DriverSink) -> Result<(), DriverError> {
    let builder = Driver::builder("HTTP", "HTTP Fetching Wrapper")
        .raster()
        .vector()
        .info(SupportStatus::Supported)
        .read(SupportStatus::Supported)
        .write(SupportStatus::NotSupported);
    let driver = HTTP_PREFIXES
        .iter()
        .fold(builder, |b, prefix| b.url_prefix(prefix))
        .open_with(|info: &OpenInfo| -> Result<Box<dyn Dataset>> {
            if !HTTP_PREFIXES
                .iter()
                .any(|prefix| info.has_prefix_ignore_case(prefix))
            {
                bail!("'{}' is not a URL", info.filename());
            }
            Ok(Box::new(RemoteDataset {
                url: info.filename().to_string(),
            }))
        })
        .build();
    sink.register_driver(driver)
}

/// Codes of the rows compiled into this build, in registration order.
#[must_use]
pub fn available_builtin_codes() -> Vec<&'static str> {
    BUILTIN_DRIVERS
        .iter()
        .filter(|row| row.available)
        .map(|row| row.code)
        .collect()
}

impl BuiltinDriver {
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self.entry, BuiltinEntry::Deferred(_))
    }
}
