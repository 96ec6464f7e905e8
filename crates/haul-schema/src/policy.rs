//! Update and failure policies attached to each dependency.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How far a resolved version may drift from a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdatePolicy {
    /// Only the baseline itself.
    None,
    /// Same `major.minor`.
    Patch,
    /// Same major.
    #[default]
    Minor,
    /// Anything at or above the baseline.
    Major,
}

impl UpdatePolicy {
    /// Upper-case name used in manifests and the registry.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdatePolicy::None => "NONE",
            UpdatePolicy::Patch => "PATCH",
            UpdatePolicy::Minor => "MINOR",
            UpdatePolicy::Major => "MAJOR",
        }
    }

    /// The more restrictive of the two policies.
    pub fn merge(self, other: UpdatePolicy) -> UpdatePolicy {
        self.min(other)
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(UpdatePolicy::None),
            "patch" => Ok(UpdatePolicy::Patch),
            "minor" => Ok(UpdatePolicy::Minor),
            "major" => Ok(UpdatePolicy::Major),
            _ => Err(format!("Unknown update policy: {s}")),
        }
    }
}

/// What happens to a dependency that cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailurePolicy {
    /// Record a hard failure.
    #[default]
    Fail,
    /// Fall back to the newest available version when the constraint cannot
    /// be met; other errors are still failures but logged as warnings.
    WarnUseLatest,
    /// Record the dependency as skipped.
    WarnSkip,
}

impl FailurePolicy {
    /// Upper-case name used in manifests and the registry.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Fail => "FAIL",
            FailurePolicy::WarnUseLatest => "WARN_USE_LATEST",
            FailurePolicy::WarnSkip => "WARN_SKIP",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "fail" => Ok(FailurePolicy::Fail),
            "warn_use_latest" | "use_latest" => Ok(FailurePolicy::WarnUseLatest),
            "warn_skip" | "skip" => Ok(FailurePolicy::WarnSkip),
            _ => Err(format!("Unknown failure policy: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_takes_stricter() {
        assert_eq!(UpdatePolicy::Major.merge(UpdatePolicy::Patch), UpdatePolicy::Patch);
        assert_eq!(UpdatePolicy::Minor.merge(UpdatePolicy::None), UpdatePolicy::None);
        assert_eq!(UpdatePolicy::Minor.merge(UpdatePolicy::Major), UpdatePolicy::Minor);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&FailurePolicy::WarnUseLatest).unwrap();
        assert_eq!(json, "\"WARN_USE_LATEST\"");
        let policy: UpdatePolicy = serde_json::from_str("\"PATCH\"").unwrap();
        assert_eq!(policy, UpdatePolicy::Patch);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("skip".parse::<FailurePolicy>(), Ok(FailurePolicy::WarnSkip));
        assert_eq!("warn-use-latest".parse::<FailurePolicy>(), Ok(FailurePolicy::WarnUseLatest));
        assert_eq!("Major".parse::<UpdatePolicy>(), Ok(UpdatePolicy::Major));
        assert!("sometimes".parse::<UpdatePolicy>().is_err());
    }
}
