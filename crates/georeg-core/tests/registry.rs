use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use anyhow::Result;
use georeg_core::{
    DeferredDriver, DriverEntry, DriverManager, GeoRegError, NoDynamicLoading, ProbeGroup,
    RegistryConfig, ReorderPlan, SkipList, StaticPluginHost,
};
use georeg_core_common::{
    Dataset, Driver, DriverSink, Identification, OpenInfo, Signature, SupportStatus,
};
use tempfile::TempDir;

#[derive(Debug)]
struct Probe {
    code: String,
    filename: String,
}

impl Dataset for Probe {
    fn driver_code(&self) -> &str {
        &self.code
    }

    fn description(&self) -> &str {
        &self.filename
    }
}

fn readable(builder: georeg_core_common::DriverBuilder, code: &'static str) -> Driver {
    builder
        .info(SupportStatus::Supported)
        .read(SupportStatus::Supported)
        .open_with(move |info: &OpenInfo| -> anyhow::Result<Box<dyn Dataset>> {
            Ok(Box::new(Probe {
                code: code.to_string(),
                filename: info.filename().to_string(),
            }))
        })
        .build()
}

/// Strong magic, weak ASCII header, catch-all network driver.
fn abc_manager() -> Result<DriverManager> {
    let manager = DriverManager::new(Arc::new(StaticPluginHost::new()));
    manager.register(readable(
        Driver::builder("C", "Network catch-all").url_prefix("net://"),
        "C",
    ))?;
    manager.register(readable(
        Driver::builder("B", "Loose ASCII header").signature(Signature::ascii_keyword("grd")),
        "B",
    ))?;
    manager.register(readable(
        Driver::builder("A", "Strong magic").signature(Signature::magic(b"GRD1")),
        "A",
    ))?;
    Ok(manager)
}

fn abc_plan() -> ReorderPlan {
    ReorderPlan::empty()
        .with_group(ProbeGroup::new("weak", &["B"]))
        .with_group(ProbeGroup::new("network", &["C"]))
}

#[test]
fn test_strong_signature_wins_after_reorder() -> Result<()> {
    let manager = abc_manager()?;
    manager.reorder(&abc_plan());
    assert_eq!(manager.probe_order(), ["A", "B", "C"]);

    // Matches A's magic and B's case-insensitive keyword.
    let info = OpenInfo::from_bytes("grid.bin", b"GRD1 header".to_vec());
    let driver = manager.identify(&info)?.expect("claimed");
    assert_eq!(driver.code(), "A");

    let weak_only = OpenInfo::from_bytes("grid.bin", b"grd header".to_vec());
    assert_eq!(manager.identify(&weak_only)?.expect("claimed").code(), "B");

    let url = OpenInfo::from_name("net://host/layer");
    assert_eq!(manager.open(&url)?.driver_code(), "C");

    manager.reorder(&abc_plan());
    assert_eq!(manager.probe_order(), ["A", "B", "C"]);
    Ok(())
}

#[test]
fn test_skip_list_keeps_direct_access() -> Result<()> {
    let manager = abc_manager()?;
    let skip = SkipList::parse("b");

    assert_eq!(manager.apply_skip_list(&skip), ["B"]);
    assert!(manager.apply_skip_list(&skip).is_empty());
    assert_eq!(manager.probe_order(), ["C", "A"]);

    assert_eq!(manager.find("B")?.code(), "B");
    let weak_only = OpenInfo::from_bytes("grid.bin", b"grd header".to_vec());
    assert!(manager.identify(&weak_only)?.is_none());
    Ok(())
}

#[test]
fn test_reregistration_keeps_position() -> Result<()> {
    let manager = abc_manager()?;
    manager.register(Driver::builder("b", "Replaced").build())?;
    assert_eq!(manager.probe_order(), ["C", "b", "A"]);
    assert_eq!(manager.find("B")?.long_name(), "Replaced");
    Ok(())
}

#[test]
fn test_malformed_registration_is_rejected() {
    let manager = DriverManager::new(Arc::new(StaticPluginHost::new()));
    let no_opener = Driver::builder("Broken", "Claims read")
        .read(SupportStatus::Supported)
        .build();
    assert!(matches!(
        manager.register(no_opener),
        Err(GeoRegError::Driver(_))
    ));
    assert!(manager.probe_order().is_empty());
}

#[test]
fn test_concurrent_first_use_materializes_once() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let manager = Arc::new(DriverManager::new(Arc::new(StaticPluginHost::new())));
    manager.register(Driver::builder("Before", "Before").build())?;
    manager.declare_deferred(
        DeferredDriver::new("Lazy", "Lazy format", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(20));
            Ok(readable(
                Driver::builder("Lazy", "Lazy format").signature(Signature::magic(b"LAZY")),
                "Lazy",
            ))
        })
        .with_signature(Signature::magic(b"LAZY")),
        None,
    )?;
    manager.register(Driver::builder("After", "After").build())?;

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                if i % 2 == 0 {
                    manager.find("lazy").map(|d| d.code().to_string())
                } else {
                    let info = OpenInfo::from_bytes("x.lzy", b"LAZY0001".to_vec());
                    manager.open(&info).map(|d| d.driver_code().to_string())
                }
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("thread")?, "Lazy");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(manager.probe_order(), ["Before", "Lazy", "After"]);
    assert!(matches!(
        manager.table().find("Lazy"),
        Some(DriverEntry::Loaded(_))
    ));
    Ok(())
}

#[test]
fn test_concurrent_failed_load_removes_stub_once() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let manager = DriverManager::new(Arc::new(StaticPluginHost::new()));
    manager.register(Driver::builder("Before", "Before").build())?;
    manager.declare_deferred(
        DeferredDriver::new("Broken", "Broken format", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(20));
            Err(georeg_core::MaterializationError {
                code: "Broken".to_string(),
                dependency: Some("libbroken".to_string()),
                reason: "module not installed".to_string(),
            })
        }),
        None,
    )?;
    manager.register(Driver::builder("After", "After").build())?;

    // Every caller holds the entry before any of them resolves it.
    let entry = manager.table().find("Broken").expect("declared");
    let manager = Arc::new(manager);
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            let entry = entry.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.table().resolve(&entry)
            })
        })
        .collect();

    let errors: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread").expect_err("load fails"))
        .collect();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(errors.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(errors[0].dependency.as_deref(), Some("libbroken"));

    assert_eq!(manager.probe_order(), ["Before", "After"]);
    assert!(matches!(
        manager.find("Broken"),
        Err(GeoRegError::Driver(_))
    ));
    Ok(())
}

#[test]
fn test_stub_not_materialized_for_other_files() -> Result<()> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let manager = DriverManager::new(Arc::new(StaticPluginHost::new()));
    manager.declare_deferred(
        DeferredDriver::new("Lazy", "Lazy format", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Driver::builder("Lazy", "Lazy format").build())
        })
        .with_extensions(&["lzy"]),
        None,
    )?;

    let info = OpenInfo::from_bytes("other.bin", b"????".to_vec());
    assert!(manager.identify(&info)?.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn test_plugin_failures_do_not_stop_discovery() {
    let host = StaticPluginHost::new();
    host.add("First", |sink: &dyn DriverSink| {
        sink.register_driver(Driver::builder("First", "First plugin").build())
    });
    host.add_broken("Broken", "missing symbol georeg_register");
    host.add("Liar", |sink: &dyn DriverSink| {
        sink.register_driver(Driver::builder("Someone", "Wrong code").build())
    });
    host.add("Last", |sink: &dyn DriverSink| {
        sink.register_driver(Driver::builder("Last", "Last plugin").build())
    });

    let manager = DriverManager::new(Arc::new(host));
    let report = manager.initialize(&RegistryConfig::default().with_reorder_plan(ReorderPlan::empty()));

    assert_eq!(report.plugins_loaded, ["First", "Last"]);
    let failed: Vec<&str> = report.failures.iter().map(|(c, _)| c.as_str()).collect();
    assert_eq!(failed, ["Broken", "Liar"]);
    assert!(manager.table().contains("GTiff"));
    assert!(!manager.table().contains("Someone"));
}

#[test]
fn test_directory_plugins_without_dynamic_loading() -> Result<()> {
    let dir = TempDir::new()?;
    let module = dir
        .path()
        .join(format!("georeg_Extra.{}", std::env::consts::DLL_EXTENSION));
    fs::write(&module, b"")?;

    let manager = DriverManager::with_search_paths(
        vec![dir.path().to_path_buf()],
        Arc::new(NoDynamicLoading),
    );
    let report = manager.initialize(&RegistryConfig::default());

    assert!(report.plugins_loaded.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "Extra");
    assert!(manager.table().contains("GTiff"));
    Ok(())
}

#[test]
fn test_initialize_applies_config() {
    let manager = DriverManager::new(Arc::new(StaticPluginHost::new()));
    let config = RegistryConfig::default()
        .without_plugins()
        .with_skip_list(SkipList::parse("PNG JPEG"));
    let report = manager.initialize(&config);

    assert_eq!(report.skipped, ["PNG", "JPEG"]);
    let order = manager.probe_order();
    assert!(!order.iter().any(|c| c == "PNG" || c == "JPEG"));
    assert_eq!(order.last().map(String::as_str), Some("HTTP"));

    let png = OpenInfo::from_bytes("a.png", b"\x89PNG\r\n\x1a\n".to_vec());
    let identified = manager.identify(&png).unwrap();
    assert!(identified.is_none_or(|d| d.code() != "PNG"));
    assert_eq!(
        manager.find("PNG").unwrap().probe(&png),
        Identification::Recognized
    );
}
