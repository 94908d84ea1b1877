//! Probe order policy.
//!
//! Drivers whose detection is weak or expensive are pushed to the end of the
//! probe order so that a file matching a strong signature is claimed by that
//! driver first. The plan is an explicit list of groups; each group's codes
//! are moved to the end in sequence, so the last group ends up last.

use log::debug;

use crate::table::DriverTable;

/// A named set of drivers moved to the end together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeGroup {
    pub name: String,
    pub codes: Vec<String>,
}

impl ProbeGroup {
    pub fn new(name: &str, codes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            codes: codes.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

/// Ordered list of [`ProbeGroup`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPlan {
    groups: Vec<ProbeGroup>,
}

impl Default for ReorderPlan {
    fn default() -> Self {
        Self::default_plan()
    }
}

impl ReorderPlan {
    /// A plan that leaves the registration order untouched.
    #[must_use]
    pub fn empty() -> Self {
        Self { groups: Vec::new() }
    }

    /// The built-in plan.
    ///
    /// 1. `raw-ascii-header`: formats labelled by a loose ASCII header, which
    ///    other formats' files can be mistaken for.
    /// 2. `weak-or-expensive`: detection needs parsing content or is weak.
    /// 3. `sidecar`: formats that look for sidecar files while identifying.
    /// 4. `catch-all-network`: drivers accepting any URL, tried last of all.
    #[must_use]
    pub fn default_plan() -> Self {
        Self::empty()
            .with_group(ProbeGroup::new("raw-ascii-header", &["AAIGrid"]))
            .with_group(ProbeGroup::new(
                "weak-or-expensive",
                &["USGSDEM", "HDF5", "XYZ", "CSV"],
            ))
            .with_group(ProbeGroup::new("sidecar", &["ENVI"]))
            .with_group(ProbeGroup::new("catch-all-network", &["HTTP"]))
    }

    /// Appends a group, which will end up after every earlier group.
    #[must_use]
    pub fn with_group(mut self, group: ProbeGroup) -> Self {
        self.groups.push(group);
        self
    }

    #[must_use]
    pub fn groups(&self) -> &[ProbeGroup] {
        &self.groups
    }

    /// Moves every listed driver to the end of the probe order.
    ///
    /// Codes not in the table are ignored. Applying the same plan twice in a
    /// row leaves the order unchanged the second time.
    pub fn apply(&self, table: &DriverTable) {
        for group in &self.groups {
            let moved: Vec<&str> = group
                .codes
                .iter()
                .filter(|code| table.move_to_end(code))
                .map(String::as_str)
                .collect();
            if !moved.is_empty() {
                debug!("Moved {} group to end: {}", group.name, moved.join(", "));
            }
        }
    }
}
