//! What happened to each dependency in one resolution run.

use std::path::PathBuf;

use haul_schema::{DependencyName, FailurePolicy, Version};

use crate::coordination::ConstraintConflict;

/// A dependency that is on disk after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    /// Registry name.
    pub name: DependencyName,
    /// Version on disk.
    pub version: Version,
    /// Artifact location.
    pub path: PathBuf,
}

/// A dependency given up on under a lenient failure policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Registry name.
    pub name: DependencyName,
    /// Why it was skipped.
    pub reason: String,
}

/// A dependency whose failure the host has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failed {
    /// Registry name.
    pub name: DependencyName,
    /// Rendered error.
    pub error: String,
    /// Policy that decides what the host does about it.
    pub policy: FailurePolicy,
}

/// Every processed dependency lands in exactly one of the four buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Fetched during this run.
    pub downloaded: Vec<Installed>,
    /// Already present and still acceptable.
    pub existing: Vec<Installed>,
    /// Given up on without blocking the host.
    pub skipped: Vec<Skipped>,
    /// Failed under a policy the host must honour.
    pub failed: Vec<Failed>,
    /// Constraint merges that fell back to the higher minimum.
    pub conflicts: Vec<ConstraintConflict>,
}

impl ResolutionReport {
    /// Empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// New artifacts only take effect after the host restarts.
    pub fn requires_restart(&self) -> bool {
        !self.downloaded.is_empty()
    }

    /// Whether nothing landed in `failed`.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of dependencies processed.
    pub fn len(&self) -> usize {
        self.downloaded.len() + self.existing.len() + self.skipped.len() + self.failed.len()
    }

    /// Whether no dependency was processed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every artifact on disk, new or not.
    pub fn installed(&self) -> impl Iterator<Item = &Installed> {
        self.downloaded.iter().chain(&self.existing)
    }

    /// Failure entry for `name`, if it failed.
    pub fn failure(&self, name: &str) -> Option<&Failed> {
        self.failed.iter().find(|f| f.name == name)
    }

    pub(crate) fn push_downloaded(&mut self, name: DependencyName, version: Version, path: PathBuf) {
        self.downloaded.push(Installed { name, version, path });
    }

    pub(crate) fn push_existing(&mut self, name: DependencyName, version: Version, path: PathBuf) {
        self.existing.push(Installed { name, version, path });
    }

    pub(crate) fn push_skipped(&mut self, name: DependencyName, reason: String) {
        self.skipped.push(Skipped { name, reason });
    }

    pub(crate) fn push_failed(&mut self, name: DependencyName, error: String, policy: FailurePolicy) {
        self.failed.push(Failed { name, error, policy });
    }
}
