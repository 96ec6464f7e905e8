//! Which caller asked for which dependency, and the constraint they agree on.
//!
//! Persisted as `registry.json`:
//!
//! ```json
//! {
//!   "version": 1,
//!   "generated": "2026-01-01T00:00:00Z",
//!   "registrations": {
//!     "ProtocolLib": {
//!       "requestedBy": ["PluginA", "PluginB"],
//!       "constraints": [
//!         { "plugin": "PluginA", "minVersion": "5.0.0", "updatePolicy": "MINOR", "constraint": ">=5.0.0" }
//!       ],
//!       "mergedConstraint": { "minVersion": "5.0.0", "constraint": ">=5.0.0" }
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;

use haul_schema::{DependencyName, UpdatePolicy, VersionConstraint};
use serde::{Deserialize, Serialize};

use super::{load_json, now_rfc3339, save_json};
use crate::dependency::Dependency;

const FORMAT_VERSION: u32 = 1;

/// Who asked for which dependency, and under what constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default = "format_version")]
    version: u32,
    #[serde(default)]
    generated: String,
    #[serde(default)]
    registrations: BTreeMap<DependencyName, Registration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Registration {
    #[serde(default)]
    requested_by: Vec<String>,
    #[serde(default)]
    constraints: Vec<CallerConstraint>,
    #[serde(default)]
    merged_constraint: Option<ConstraintRecord>,
}

/// One caller's requirement on a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerConstraint {
    /// Caller name.
    pub plugin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Floor the caller asked for.
    pub min_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Caller's update policy.
    pub update_policy: Option<UpdatePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Full constraint expression, when it is more than a floor.
    pub constraint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConstraintRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    constraint: Option<String>,
}

impl ConstraintRecord {
    fn of(constraint: &VersionConstraint) -> Self {
        Self {
            min_version: constraint.floor().map(|v| v.raw().to_string()),
            constraint: Some(constraint.to_string()),
        }
    }
}

impl CallerConstraint {
    fn new(caller: &str, dependency: &Dependency) -> Self {
        let constraint = dependency.constraint.as_ref();
        Self {
            plugin: caller.to_string(),
            min_version: constraint.and_then(VersionConstraint::floor).map(|v| v.raw().to_string()),
            update_policy: Some(dependency.update_policy),
            constraint: constraint.map(ToString::to_string),
        }
    }

    /// The stored expression, or `>= minVersion` for records that only carry a floor.
    pub fn constraint(&self) -> Option<VersionConstraint> {
        let parsed = self
            .constraint
            .as_deref()
            .and_then(|c| VersionConstraint::parse(c).ok());
        parsed.or_else(|| {
            self.min_version
                .as_deref()
                .and_then(|v| VersionConstraint::parse(&format!(">={v}")).ok())
        })
    }
}

/// Two callers whose constraints have no common version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintConflict {
    /// Dependency the callers disagree on.
    pub dependency: DependencyName,
    /// Caller whose constraint could not be merged in.
    pub caller: String,
    /// What the earlier callers had agreed on.
    pub existing: VersionConstraint,
    /// What the caller asked for.
    pub requested: VersionConstraint,
    /// The higher-minimum fallback that was used instead.
    pub chosen: VersionConstraint,
}

impl fmt::Display for ConstraintConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: '{}' from {} conflicts with '{}', using '{}'",
            self.dependency, self.requested, self.caller, self.existing, self.chosen
        )
    }
}

/// Result of folding every registered constraint for one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedConstraint {
    /// Constraint to resolve against.
    pub constraint: VersionConstraint,
    /// Merges that had to fall back.
    pub conflicts: Vec<ConstraintConflict>,
}

fn format_version() -> u32 {
    FORMAT_VERSION
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry stamped with the current time.
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            generated: now_rfc3339(),
            registrations: BTreeMap::new(),
        }
    }

    /// Read `path`; a missing or unreadable registry is empty.
    pub fn load(path: &Path) -> Self {
        load_json(path, "registry").unwrap_or_default()
    }

    /// Write to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        save_json(path, self)
    }

    /// Replace everything `caller` registered before with `dependencies`.
    pub fn register(&mut self, caller: &str, dependencies: &[Dependency]) {
        let wanted: Vec<&str> = dependencies.iter().map(|d| d.name.as_str()).collect();
        for (name, registration) in &mut self.registrations {
            if !wanted.contains(&name.as_str()) {
                registration.requested_by.retain(|c| c != caller);
                registration.constraints.retain(|c| c.plugin != caller);
            }
        }
        self.registrations
            .retain(|_, r| !r.requested_by.is_empty() || !r.constraints.is_empty());

        for dep in dependencies {
            let registration = self.registrations.entry(dep.name.clone()).or_default();
            if !registration.requested_by.iter().any(|c| c == caller) {
                registration.requested_by.push(caller.to_string());
            }
            registration.constraints.retain(|c| c.plugin != caller);
            registration.constraints.push(CallerConstraint::new(caller, dep));
        }

        for (name, registration) in &mut self.registrations {
            registration.merged_constraint = registration
                .fold(name)
                .map(|merged| ConstraintRecord::of(&merged.constraint));
        }
        self.generated = now_rfc3339();
    }

    /// The constraint every registered caller agrees on, in registration order.
    pub fn merged_constraint(&self, name: &str) -> Option<MergedConstraint> {
        let (key, registration) = self.registrations.get_key_value(name)?;
        registration.fold(key)
    }

    /// Callers that registered `name`, in registration order.
    pub fn requesting_callers(&self, name: &str) -> &[String] {
        self.registrations
            .get(name)
            .map(|r| r.requested_by.as_slice())
            .unwrap_or_default()
    }

    /// Per-caller constraints on `name`.
    pub fn constraints(&self, name: &str) -> &[CallerConstraint] {
        self.registrations
            .get(name)
            .map(|r| r.constraints.as_slice())
            .unwrap_or_default()
    }

    /// Registered dependency names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &DependencyName> {
        self.registrations.keys()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl Registration {
    fn fold(&self, name: &DependencyName) -> Option<MergedConstraint> {
        let mut records = self.constraints.iter();
        let first = records.next()?;
        let mut merged = first.constraint().unwrap_or_default();
        let mut conflicts = Vec::new();

        for record in records {
            let Some(other) = record.constraint() else {
                continue;
            };
            if let Some(next) = merged.merge(&other) {
                merged = next;
                continue;
            }

            let chosen = match (merged.floor(), other.floor()) {
                (Some(a), Some(b)) => VersionConstraint::at_least(a.max(b).clone()),
                (None, Some(b)) => VersionConstraint::at_least(b.clone()),
                _ => merged.clone(),
            };
            let conflict = ConstraintConflict {
                dependency: name.clone(),
                caller: record.plugin.clone(),
                existing: merged,
                requested: other,
                chosen: chosen.clone(),
            };
            conflicts.push(conflict);
            merged = chosen;
        }

        Some(MergedConstraint {
            constraint: merged,
            conflicts,
        })
    }
}
