//! Operator skip lists.

use std::fmt;
use std::str::FromStr;

use log::{debug, info};

use crate::error::ConfigError;
use crate::table::{DriverEntry, DriverOrigin, DriverTable};

/// What a skipped driver is hidden from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SkipPolicy {
    /// Skipped drivers leave the probe order but stay reachable by code.
    #[default]
    AutoProbeOnly,
    /// Skipped drivers are gone altogether.
    Everywhere,
}

impl SkipPolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoProbeOnly => "auto-probe",
            Self::Everywhere => "everywhere",
        }
    }
}

impl fmt::Display for SkipPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkipPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto-probe" | "auto_probe" | "autoprobe" => Ok(Self::AutoProbeOnly),
            "everywhere" | "all" => Ok(Self::Everywhere),
            other => Err(ConfigError::InvalidOption {
                option: "skip policy".to_string(),
                message: format!("'{other}' is not one of auto-probe, everywhere"),
            }),
        }
    }
}

/// Driver codes to remove from the table after registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipList {
    codes: Vec<String>,
}

impl SkipList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma and/or whitespace separated list of codes.
    ///
    /// Empty items are ignored and duplicates (compared case-insensitively)
    /// are kept once.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        source
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|code| !code.is_empty())
            .collect()
    }

    pub fn insert(&mut self, code: &str) {
        if !self.contains(code) {
            self.codes.push(code.to_string());
        }
    }

    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c.eq_ignore_ascii_case(code))
    }

    #[must_use]
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Removes every listed driver from `table` and returns what was removed.
    ///
    /// Codes not present are ignored, so applying the same list again is a
    /// no-op.
    pub fn apply(&self, table: &DriverTable) -> Vec<(DriverEntry, DriverOrigin)> {
        let mut removed = Vec::new();
        for code in &self.codes {
            match table.remove(code) {
                Some(entry) => {
                    info!("Skipping driver {}", entry.0.code());
                    removed.push(entry);
                },
                None => debug!("Skip list names {code}, which is not registered"),
            }
        }
        removed
    }
}

impl<'a> FromIterator<&'a str> for SkipList {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut list = Self::new();
        for code in iter {
            list.insert(code);
        }
        list
    }
}

impl fmt::Display for SkipList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.codes.join(","))
    }
}
