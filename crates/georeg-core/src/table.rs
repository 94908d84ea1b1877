//! The driver table: ordered probe sequence plus a code index.
//!
//! Order is the probe order for files that more than one driver might claim,
//! so it is never changed implicitly: re-registering a code replaces the entry
//! where it stands, and only [`DriverTable::move_to_end`] /
//! [`DriverTable::move_to_front`] move entries.
//!
//! Sequence and index live behind one `RwLock`. Every structural change
//! happens under the write guard, so readers see the table either before or
//! after it, never in between. Lookups are ASCII case-insensitive; the stored
//! code keeps the spelling it was registered with.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use georeg_core_common::{Driver, DriverError, DriverSink};
use log::{debug, info};

use crate::deferred::DeferredDriver;
use crate::error::MaterializationError;

/// Where a table entry came from. Only used for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOrigin {
    /// Compiled-in driver from the built-in table.
    BuiltIn,
    /// Loaded from a plugin module.
    Plugin,
    /// Registered directly by the embedding application.
    Application,
}

impl DriverOrigin {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::BuiltIn => "built-in",
            Self::Plugin => "plugin",
            Self::Application => "application",
        }
    }
}

/// One slot of the table: a loaded descriptor or a deferred stub.
#[derive(Debug, Clone)]
pub enum DriverEntry {
    Loaded(Arc<Driver>),
    Deferred(Arc<DeferredDriver>),
}

impl DriverEntry {
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Loaded(driver) => driver.code(),
            Self::Deferred(stub) => stub.code(),
        }
    }

    #[must_use]
    pub fn long_name(&self) -> &str {
        match self {
            Self::Loaded(driver) => driver.long_name(),
            Self::Deferred(stub) => stub.long_name(),
        }
    }

    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// The descriptor, if this entry is already loaded.
    #[must_use]
    pub fn loaded(&self) -> Option<&Arc<Driver>> {
        match self {
            Self::Loaded(driver) => Some(driver),
            Self::Deferred(_) => None,
        }
    }

    /// The descriptor, materializing a deferred stub if necessary.
    ///
    /// This does not splice the result into any table; use
    /// [`DriverTable::resolve`] for that.
    ///
    /// # Errors
    ///
    /// Returns the stub's [`MaterializationError`].
    pub fn driver(&self) -> Result<Arc<Driver>, MaterializationError> {
        match self {
            Self::Loaded(driver) => Ok(Arc::clone(driver)),
            Self::Deferred(stub) => stub.materialize(),
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    entry: DriverEntry,
    origin: DriverOrigin,
}

#[derive(Default)]
struct Inner {
    slots: Vec<Slot>,
    /// Upper-cased code to position in `slots`.
    index: HashMap<String, usize>,
}

impl Inner {
    fn position(&self, code: &str) -> Option<usize> {
        self.index.get(&index_key(code)).copied()
    }

    fn reindex(&mut self) {
        self.index = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (index_key(slot.entry.code()), i))
            .collect();
    }

    /// Replaces in place when the code exists, otherwise inserts at
    /// `position` (clamped) or at the end. Returns the replaced entry.
    fn upsert(&mut self, slot: Slot, position: Option<usize>) -> Option<DriverEntry> {
        if let Some(existing) = self.position(slot.entry.code()) {
            let old = std::mem::replace(&mut self.slots[existing], slot);
            return Some(old.entry);
        }
        match position {
            Some(at) if at < self.slots.len() => {
                self.slots.insert(at, slot);
                self.reindex();
            },
            _ => {
                self.index
                    .insert(index_key(slot.entry.code()), self.slots.len());
                self.slots.push(slot);
            },
        }
        None
    }

    fn remove(&mut self, code: &str) -> Option<Slot> {
        let at = self.position(code)?;
        let slot = self.slots.remove(at);
        self.reindex();
        Some(slot)
    }
}

fn index_key(code: &str) -> String {
    code.to_ascii_uppercase()
}

/// Ordered collection of driver entries keyed by code.
#[derive(Default)]
pub struct DriverTable {
    inner: RwLock<Inner>,
}

impl DriverTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a descriptor at the end of the probe order, or in place of
    /// an existing entry with the same code.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MalformedDriver`] when the descriptor fails
    /// validation; the table is left unchanged.
    pub fn register(&self, driver: Driver, origin: DriverOrigin) -> Result<(), DriverError> {
        self.register_at(driver, origin, None)
    }

    /// Like [`DriverTable::register`], inserting a new code at `position`.
    ///
    /// An existing code keeps its position regardless of `position`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MalformedDriver`] when the descriptor fails
    /// validation.
    pub fn register_at(
        &self,
        driver: Driver,
        origin: DriverOrigin,
        position: Option<usize>,
    ) -> Result<(), DriverError> {
        driver.validate()?;
        self.insert_entry(DriverEntry::Loaded(Arc::new(driver)), origin, position);
        Ok(())
    }

    /// Declares a deferred stub, with the same placement rules as
    /// [`DriverTable::register_at`].
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MalformedDriver`] for an empty or ill-formed code.
    pub fn declare_deferred(
        &self,
        stub: DeferredDriver,
        origin: DriverOrigin,
        position: Option<usize>,
    ) -> Result<(), DriverError> {
        if stub.code().trim().is_empty()
            || stub.code().chars().any(|c| c.is_whitespace() || c == ',')
        {
            return Err(DriverError::MalformedDriver {
                code: stub.code().to_string(),
                reason: "deferred driver code must be non-empty without whitespace or commas"
                    .to_string(),
            });
        }
        self.insert_entry(DriverEntry::Deferred(Arc::new(stub)), origin, position);
        Ok(())
    }

    /// Inserts an already validated entry.
    pub(crate) fn insert_entry(
        &self,
        entry: DriverEntry,
        origin: DriverOrigin,
        position: Option<usize>,
    ) {
        let code = entry.code().to_string();
        let replaced = self.write().upsert(Slot { entry, origin }, position);
        if replaced.is_some() {
            info!("Replaced driver {code} in place");
        } else {
            debug!("Registered driver {code}");
        }
    }

    #[must_use]
    pub fn find(&self, code: &str) -> Option<DriverEntry> {
        let inner = self.read();
        inner.position(code).map(|at| inner.slots[at].entry.clone())
    }

    #[must_use]
    pub fn origin(&self, code: &str) -> Option<DriverOrigin> {
        let inner = self.read();
        inner.position(code).map(|at| inner.slots[at].origin)
    }

    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.read().position(code).is_some()
    }

    #[must_use]
    pub fn position(&self, code: &str) -> Option<usize> {
        self.read().position(code)
    }

    /// Snapshot of the entries in probe order.
    #[must_use]
    pub fn all(&self) -> Vec<DriverEntry> {
        self.read()
            .slots
            .iter()
            .map(|slot| slot.entry.clone())
            .collect()
    }

    /// Snapshot of the entries with their origins, in probe order.
    #[must_use]
    pub fn entries(&self) -> Vec<(DriverEntry, DriverOrigin)> {
        self.read()
            .slots
            .iter()
            .map(|slot| (slot.entry.clone(), slot.origin))
            .collect()
    }

    /// Codes in probe order.
    #[must_use]
    pub fn codes(&self) -> Vec<String> {
        self.read()
            .slots
            .iter()
            .map(|slot| slot.entry.code().to_string())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().slots.is_empty()
    }

    /// Removes the entry for `code`. No-op if absent.
    pub fn remove(&self, code: &str) -> Option<(DriverEntry, DriverOrigin)> {
        let slot = self.write().remove(code)?;
        debug!("Removed driver {}", slot.entry.code());
        Some((slot.entry, slot.origin))
    }

    /// Moves `code` to the end of the probe order. Returns `false` if absent.
    pub fn move_to_end(&self, code: &str) -> bool {
        let mut inner = self.write();
        let Some(slot) = inner.remove(code) else {
            return false;
        };
        inner.upsert(slot, None);
        true
    }

    /// Moves `code` to the front of the probe order. Returns `false` if absent.
    pub fn move_to_front(&self, code: &str) -> bool {
        let mut inner = self.write();
        let Some(slot) = inner.remove(code) else {
            return false;
        };
        inner.upsert(slot, Some(0));
        true
    }

    pub fn clear(&self) {
        let mut inner = self.write();
        inner.slots.clear();
        inner.index.clear();
    }

    /// Returns the loaded descriptor for `entry`, materializing and splicing
    /// deferred stubs.
    ///
    /// On success the stub's slot is replaced by the real descriptor, at the
    /// same position, as long as the slot still holds that very stub. On
    /// failure the stub is removed.
    ///
    /// # Errors
    ///
    /// Returns the stub's [`MaterializationError`].
    pub fn resolve(&self, entry: &DriverEntry) -> Result<Arc<Driver>, MaterializationError> {
        let stub = match entry {
            DriverEntry::Loaded(driver) => return Ok(Arc::clone(driver)),
            DriverEntry::Deferred(stub) => stub,
        };
        let outcome = stub.materialize();

        let mut inner = self.write();
        let Some(at) = inner.position(stub.code()) else {
            return outcome;
        };
        let still_this_stub = matches!(
            &inner.slots[at].entry,
            DriverEntry::Deferred(current) if Arc::ptr_eq(current, stub)
        );
        if !still_this_stub {
            return outcome;
        }
        match &outcome {
            Ok(driver) => {
                inner.slots[at].entry = DriverEntry::Loaded(Arc::clone(driver));
                debug!("Spliced materialized driver {} at position {at}", stub.code());
            },
            Err(_) => {
                inner.slots.remove(at);
                inner.reindex();
                debug!("Removed failed deferred driver {}", stub.code());
            },
        }
        outcome
    }

    /// A sink that registers into this table with the given origin.
    #[must_use]
    pub fn sink(&self, origin: DriverOrigin) -> TableSink<'_> {
        TableSink {
            table: self,
            origin,
        }
    }
}

impl fmt::Debug for DriverTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverTable")
            .field("codes", &self.codes())
            .finish()
    }
}

/// [`DriverSink`] adapter over a [`DriverTable`].
pub struct TableSink<'a> {
    table: &'a DriverTable,
    origin: DriverOrigin,
}

impl DriverSink for TableSink<'_> {
    fn register_driver(&self, driver: Driver) -> Result<(), DriverError> {
        self.table.register(driver, self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use georeg_core_common::SupportStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn driver(code: &str, long_name: &str) -> Driver {
        Driver::builder(code, long_name).build()
    }

    #[test]
    fn test_register_preserves_insertion_order() {
        let table = DriverTable::new();
        for code in ["A", "B", "C"] {
            table.register(driver(code, code), DriverOrigin::BuiltIn).unwrap();
        }
        assert_eq!(table.codes(), ["A", "B", "C"]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_reregistration_replaces_in_place() {
        let table = DriverTable::new();
        for code in ["A", "B", "C"] {
            table.register(driver(code, "old"), DriverOrigin::BuiltIn).unwrap();
        }
        table.register(driver("b", "new"), DriverOrigin::Plugin).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.position("B"), Some(1));
        assert_eq!(table.find("B").unwrap().long_name(), "new");
        assert_eq!(table.origin("B"), Some(DriverOrigin::Plugin));
    }

    #[test]
    fn test_register_at_position() {
        let table = DriverTable::new();
        table.register(driver("A", "a"), DriverOrigin::BuiltIn).unwrap();
        table.register(driver("C", "c"), DriverOrigin::BuiltIn).unwrap();
        table
            .register_at(driver("B", "b"), DriverOrigin::BuiltIn, Some(1))
            .unwrap();
        table
            .register_at(driver("Z", "z"), DriverOrigin::BuiltIn, Some(99))
            .unwrap();
        assert_eq!(table.codes(), ["A", "B", "C", "Z"]);
        assert_eq!(table.position("c"), Some(2));
    }

    #[test]
    fn test_malformed_driver_is_not_inserted() {
        let table = DriverTable::new();
        let bad = Driver::builder("RW", "claims read")
            .read(SupportStatus::Supported)
            .build();
        assert!(matches!(
            table.register(bad, DriverOrigin::BuiltIn),
            Err(DriverError::MalformedDriver { .. })
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_and_moves_keep_index_consistent() {
        let table = DriverTable::new();
        for code in ["A", "B", "C", "D"] {
            table.register(driver(code, code), DriverOrigin::BuiltIn).unwrap();
        }
        assert!(table.remove("b").is_some());
        assert!(table.remove("B").is_none());
        assert!(table.move_to_end("A"));
        assert!(table.move_to_front("D"));
        assert!(!table.move_to_end("missing"));

        assert_eq!(table.codes(), ["D", "C", "A"]);
        for (i, code) in table.codes().iter().enumerate() {
            assert_eq!(table.position(code), Some(i));
        }
    }

    #[test]
    fn test_resolve_splices_in_place() {
        let table = DriverTable::new();
        table.register(driver("A", "a"), DriverOrigin::BuiltIn).unwrap();
        table
            .declare_deferred(
                DeferredDriver::new("Lazy", "lazy", || Ok(Driver::builder("Lazy", "real").build())),
                DriverOrigin::BuiltIn,
                None,
            )
            .unwrap();
        table.register(driver("C", "c"), DriverOrigin::BuiltIn).unwrap();

        let entry = table.find("lazy").unwrap();
        assert!(entry.is_deferred());
        let resolved = table.resolve(&entry).unwrap();

        assert_eq!(resolved.long_name(), "real");
        assert_eq!(table.codes(), ["A", "Lazy", "C"]);
        let now = table.find("Lazy").unwrap();
        assert!(Arc::ptr_eq(now.loaded().unwrap(), &resolved));
    }

    #[test]
    fn test_resolve_failure_removes_stub() {
        let table = DriverTable::new();
        let stub = DeferredDriver::new("Gone", "gone", || {
            Err(MaterializationError {
                code: "Gone".to_string(),
                dependency: None,
                reason: "missing".to_string(),
            })
        });
        table
            .declare_deferred(stub, DriverOrigin::BuiltIn, None)
            .unwrap();
        let entry = table.find("Gone").unwrap();
        assert!(table.resolve(&entry).is_err());
        assert!(table.find("Gone").is_none());
    }

    #[test]
    fn test_resolve_does_not_overwrite_reregistered_code() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let table = DriverTable::new();
        table
            .declare_deferred(
                DeferredDriver::new("X", "stub", move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Driver::builder("X", "from stub").build())
                }),
                DriverOrigin::BuiltIn,
                None,
            )
            .unwrap();
        let stale = table.find("X").unwrap();
        table.register(driver("X", "explicit"), DriverOrigin::Application).unwrap();

        table.resolve(&stale).unwrap();
        assert_eq!(table.find("X").unwrap().long_name(), "explicit");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sink_registers_with_origin() {
        let table = DriverTable::new();
        table
            .sink(DriverOrigin::Plugin)
            .register_driver(driver("P", "plugged"))
            .unwrap();
        assert_eq!(table.origin("p"), Some(DriverOrigin::Plugin));
    }
}
