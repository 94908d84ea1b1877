//! Command-line interface for `GeoReg`, the geospatial format-driver registry.
//!
//! This binary provides a thin front end over [`georeg_core`]: it builds the
//! registry configuration from the environment and flags, initializes a
//! [`DriverManager`] and runs one command against it.
//!
//! # Architecture
//!
//! The CLI is built using [`clap`] for argument parsing and [`tracing`] for structured logging.
//! Library crates log through the `log` facade, which is bridged into the
//! tracing subscriber.
//!
//! # Available Commands
//!
//! - `drivers` - List registered drivers in probe order
//! - `identify` - Report which driver claims a file
//! - `load-plugin` - Load one named plugin driver
//! - `compressions` - List GeoTIFF compressions supported by this build
//! - `negotiate` - Resolve GeoTIFF creation options into a codec configuration

mod display;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{Level, debug, info, warn};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use georeg_core::{
    DriverManager, GeoRegError, NoDynamicLoading, RegistryConfig, SkipList,
};
use georeg_core_common::{CreateRequest, CreationOptions, OpenInfo, SampleType};
use georeg_gtiff::{BuildFeatures, COG_CODE, GTIFF_CODE, build_supported_compressions};

use display::{CompressionRow, DriverRow, metadata_rows, render};

#[derive(Parser)]
#[command(
    name = "georeg",
    version,
    about = "Geospatial format-driver registry",
    long_about = "GeoReg registers format drivers in a deterministic probe order, loads\n\
                  deferred and plugin drivers on demand, and negotiates GeoTIFF codecs\n\
                  against what this build supports."
)]
/// Command-line arguments and options for the `GeoReg` CLI.
///
/// Global flags control logging and override the `GEOREG_*` environment
/// variables that configure the registry.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    /// Driver codes to skip, comma or space separated (overrides `GEOREG_SKIP`).
    #[arg(long, global = true, value_name = "CODES")]
    skip: Option<String>,

    /// Plugin search path (overrides `GEOREG_DRIVER_PATH`, `disable` turns
    /// plugin loading off).
    #[arg(long, global = true, value_name = "PATHS")]
    driver_path: Option<String>,

    /// Do not auto-load plugins.
    #[arg(long, global = true)]
    no_plugins: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `GeoReg` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Lists registered drivers in probe order.
    Drivers {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Reports which driver claims a file or URL.
    Identify {
        /// Path or URL of the dataset.
        #[arg(value_name = "DATASET")]
        input: String,
    },

    /// Loads exactly one plugin driver by code.
    LoadPlugin {
        /// Driver code of the plugin.
        #[arg(value_name = "CODE")]
        code: String,
    },

    /// Lists the GeoTIFF compression methods this build supports.
    Compressions {
        /// Only methods usable for cloud optimized GeoTIFF.
        #[arg(long)]
        cog: bool,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Resolves GeoTIFF creation options into a codec configuration.
    Negotiate {
        /// Number of bands.
        #[arg(long, default_value_t = 1)]
        bands: u32,

        /// Sample data type (Byte, UInt16, Float32, ...).
        #[arg(long, default_value = "Byte")]
        data_type: String,

        #[arg(long, default_value_t = 256)]
        width: u32,

        #[arg(long, default_value_t = 256)]
        height: u32,

        /// Negotiate for cloud optimized GeoTIFF.
        #[arg(long)]
        cog: bool,

        /// Creation option as KEY=VALUE, repeatable.
        #[arg(long = "co", value_name = "KEY=VALUE")]
        creation_options: Vec<String>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

/// Entry point for the `GeoReg` command-line interface.
///
/// # Errors
///
/// Returns an error if command execution fails or if the logging system cannot be initialized.
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity flags
    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true) // Show module paths for better context
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = build_config(&cli)?;

    match cli.command {
        Commands::Drivers { json } => handle_drivers(&config, json),
        Commands::Identify { input } => {
            info!("Identifying {input}");
            handle_identify(&config, &input)
        },
        Commands::LoadPlugin { code } => handle_load_plugin(&config, &code),
        Commands::Compressions { cog, json } => handle_compressions(cog, json),
        Commands::Negotiate {
            bands,
            data_type,
            width,
            height,
            cog,
            creation_options,
            json,
        } => {
            let sample_type: SampleType = data_type.parse().map_err(explain)?;
            let mut request = CreateRequest::new("negotiate.tif", width, height, bands, sample_type);
            request.options = CreationOptions::parse(&creation_options).map_err(explain)?;
            handle_negotiate(&config, &request, cog, json)
        },
    }
}

/// Environment first, then command-line overrides.
fn build_config(cli: &Cli) -> Result<RegistryConfig> {
    let mut config = RegistryConfig::from_env().map_err(explain)?;
    if let Some(skip) = &cli.skip {
        config.skip_list = SkipList::parse(skip);
    }
    if let Some(paths) = &cli.driver_path {
        config.set_driver_path(paths);
    }
    if cli.no_plugins {
        config.autoload_plugins = false;
    }
    debug!("Registry configuration: {config:?}");
    Ok(config)
}

fn manager(config: &RegistryConfig) -> DriverManager {
    // Modules can be located, but this binary links no dynamic loader, so
    // each one found is reported as a load failure.
    let manager = DriverManager::with_search_paths(
        config.plugin_search_paths.clone(),
        Arc::new(NoDynamicLoading),
    );
    let report = manager.initialize(config);
    for (code, reason) in &report.failures {
        warn!("Driver {code} not available: {reason}");
    }
    manager
}

/// Turns a registry error into a CLI error carrying the recovery hint.
fn explain(err: impl Into<GeoRegError>) -> anyhow::Error {
    let err = err.into();
    match err.recovery_suggestion() {
        Some(hint) => anyhow!("{}\n\nHint: {hint}", err.user_message()),
        None => anyhow!(err.user_message()),
    }
}

fn handle_drivers(config: &RegistryConfig, json: bool) -> Result<()> {
    let manager = manager(config);
    let rows: Vec<DriverRow> = manager.drivers().iter().map(DriverRow::from).collect();

    if !json {
        println!("\nRegistered Drivers ({} total, in probe order):\n", rows.len());
    }
    println!("{}", render(&rows, json)?);

    let skipped = manager.skipped();
    if !json && !skipped.is_empty() {
        println!("\nSkipped: {}", skipped.join(", "));
    }
    Ok(())
}

fn handle_identify(config: &RegistryConfig, input: &str) -> Result<()> {
    let info = if input.contains("://") {
        OpenInfo::from_name(input)
    } else {
        OpenInfo::from_path(input).map_err(|e| anyhow!("Cannot read '{input}': {e}"))?
    };
    let manager = manager(config);
    match manager.identify(&info).map_err(explain)? {
        Some(driver) => {
            println!("{input}: {} ({})", driver.code(), driver.long_name());
            Ok(())
        },
        None => Err(explain(GeoRegError::Unrecognized {
            filename: input.to_string(),
        })),
    }
}

fn handle_load_plugin(config: &RegistryConfig, code: &str) -> Result<()> {
    let manager = manager(config);
    manager.register_plugin(code).map_err(explain)?;
    println!("Loaded plugin driver {code}");
    Ok(())
}

fn handle_compressions(cog: bool, json: bool) -> Result<()> {
    let rows: Vec<CompressionRow> = build_supported_compressions(&BuildFeatures::compiled(), cog)
        .into_iter()
        .map(CompressionRow::from)
        .collect();
    println!("{}", render(&rows, json)?);
    Ok(())
}

fn handle_negotiate(
    config: &RegistryConfig,
    request: &CreateRequest,
    cog: bool,
    json: bool,
) -> Result<()> {
    let manager = manager(config);
    let code = if cog { COG_CODE } else { GTIFF_CODE };
    let dataset = manager.create(code, request).map_err(explain)?;
    println!("{}", render(&metadata_rows(dataset.metadata()), json)?);
    Ok(())
}
