//! Display utilities for formatting CLI output.
//!
//! Rows double as the JSON shape of `--json` output, so they derive both
//! [`Tabled`] and [`Serialize`].

use georeg_core::{DriverOrigin, DriverSummary};
use georeg_gtiff::{Compression, supports_predictor};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Table row representation for displaying driver information.
#[derive(Debug, Tabled, Serialize)]
pub struct DriverRow {
    /// Driver code used for lookup (e.g., `GTiff`, `PNG`).
    #[tabled(rename = "Code")]
    pub code: String,
    /// Full descriptive name of the driver format.
    #[tabled(rename = "Long Name")]
    pub long_name: String,
    /// Built-in, deferred, plugin or application.
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Info")]
    pub info: String,
    #[tabled(rename = "Read")]
    pub read: String,
    #[tabled(rename = "Write")]
    pub write: String,
}

impl From<&DriverSummary> for DriverRow {
    fn from(summary: &DriverSummary) -> Self {
        let kind = if summary.deferred {
            "deferred"
        } else {
            match summary.origin {
                DriverOrigin::BuiltIn => "built-in",
                DriverOrigin::Plugin => "plugin",
                DriverOrigin::Application => "application",
            }
        };
        let status = |pick: fn(&georeg_core_common::DriverCapabilities) -> &str| {
            summary
                .capabilities
                .as_ref()
                .map_or("-", pick)
                .to_string()
        };
        Self {
            code: summary.code.clone(),
            long_name: summary.long_name.clone(),
            kind: kind.to_string(),
            info: status(|c| c.info.as_str()),
            read: status(|c| c.read.as_str()),
            write: status(|c| c.write.as_str()),
        }
    }
}

/// A `KEY=VALUE` metadata item.
#[derive(Debug, Tabled, Serialize)]
pub struct MetadataRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// A compression method available in this build.
#[derive(Debug, Tabled, Serialize)]
pub struct CompressionRow {
    #[tabled(rename = "Name")]
    pub name: String,
    /// TIFF `Compression` tag value.
    #[tabled(rename = "TIFF Code")]
    pub code: u16,
    #[tabled(rename = "Lossy")]
    pub lossy: String,
    #[tabled(rename = "Predictor")]
    pub predictor: String,
}

impl From<Compression> for CompressionRow {
    fn from(compression: Compression) -> Self {
        let yes_no = |flag: bool| if flag { "Yes" } else { "No" }.to_string();
        Self {
            name: compression.name().to_string(),
            code: compression.tiff_code(),
            lossy: yes_no(compression.is_lossy()),
            predictor: yes_no(supports_predictor(compression.tiff_code())),
        }
    }
}

/// Builds metadata rows from dataset or negotiation key/value pairs.
pub fn metadata_rows(items: Vec<(String, String)>) -> Vec<MetadataRow> {
    items
        .into_iter()
        .map(|(key, value)| MetadataRow { key, value })
        .collect()
}

/// Renders `rows` as a table, or as pretty JSON when `json` is set.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render<T: Tabled + Serialize>(rows: &[T], json: bool) -> anyhow::Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(rows)?)
    } else {
        Ok(Table::new(rows).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use georeg_core_common::{DriverCapabilities, SupportStatus};

    fn summary(deferred: bool) -> DriverSummary {
        DriverSummary {
            code: "GTiff".to_string(),
            long_name: "GeoTIFF".to_string(),
            origin: DriverOrigin::BuiltIn,
            deferred,
            capabilities: (!deferred).then(|| DriverCapabilities {
                info: SupportStatus::Supported,
                read: SupportStatus::Supported,
                write: SupportStatus::Planned,
                raster: true,
                vector: false,
            }),
            extensions: vec!["tif".to_string()],
        }
    }

    #[test]
    fn test_driver_row_from_summary() {
        let row = DriverRow::from(&summary(false));
        assert_eq!(row.kind, "built-in");
        assert_eq!(row.read, "Supported");
        assert_eq!(row.write, "Planned");

        let stub = DriverRow::from(&summary(true));
        assert_eq!(stub.kind, "deferred");
        assert_eq!(stub.info, "-");
    }

    #[test]
    fn test_compression_row() {
        let row = CompressionRow::from(Compression::Deflate);
        assert_eq!(row.name, "DEFLATE");
        assert_eq!(row.code, 8);
        assert_eq!(row.lossy, "No");
        assert_eq!(row.predictor, "Yes");
    }

    #[test]
    fn test_render_json() {
        let rows = metadata_rows(vec![("COMPRESSION".to_string(), "LZW".to_string())]);
        let json = render(&rows, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["key"], "COMPRESSION");
        assert!(render(&rows, false).unwrap().contains("LZW"));
    }
}
