//! Reporter trait for dependency injection
//!
//! Lets the resolver report progress without being coupled to how a host
//! displays it (console, in-game chat, nothing at all).

use haul_schema::{DependencyName, Version, VersionConstraint};

/// Receives progress events from the resolver.
pub trait Reporter: Send + Sync {
    /// A dependency is about to be resolved against `constraint`.
    fn resolving(&self, name: &DependencyName, constraint: &VersionConstraint);

    /// Updates the progress of a download.
    fn downloading(&self, name: &DependencyName, version: &Version, current: u64, total: Option<u64>);

    /// The dependency is in place; `detail` is `"downloaded"` or `"existing"`.
    fn done(&self, name: &DependencyName, version: &Version, detail: &str);

    /// The dependency was skipped under its failure policy.
    fn skipped(&self, name: &DependencyName, reason: &str);

    /// The dependency failed.
    fn failed(&self, name: &DependencyName, reason: &str);

    /// Something worth surfacing that is not tied to a single outcome.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn resolving(&self, name: &DependencyName, constraint: &VersionConstraint) {
        (**self).resolving(name, constraint);
    }
    fn downloading(&self, name: &DependencyName, version: &Version, current: u64, total: Option<u64>) {
        (**self).downloading(name, version, current, total);
    }
    fn done(&self, name: &DependencyName, version: &Version, detail: &str) {
        (**self).done(name, version, detail);
    }
    fn skipped(&self, name: &DependencyName, reason: &str) {
        (**self).skipped(name, reason);
    }
    fn failed(&self, name: &DependencyName, reason: &str) {
        (**self).failed(name, reason);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A no-op reporter for silent operations (e.g., background resolution, testing).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn resolving(&self, _: &DependencyName, _: &VersionConstraint) {}
    fn downloading(&self, _: &DependencyName, _: &Version, _: u64, _: Option<u64>) {}
    fn done(&self, _: &DependencyName, _: &Version, _: &str) {}
    fn skipped(&self, _: &DependencyName, _: &str) {}
    fn failed(&self, _: &DependencyName, _: &str) {}
    fn warning(&self, _: &str) {}
}
