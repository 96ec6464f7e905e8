//! Version constraints and the algebra used to combine them.
//!
//! Accepted expressions:
//!
//! - `*` or empty: latest
//! - `5.4.0` or `=5.4.0`: exact
//! - `>=5.0.0`, `>5.0.0`, `<6.0.0`, `<=6.0.0`: one bound
//! - `>=5.0.0 <6.0.0` (or comma separated): range

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::policy::UpdatePolicy;
use crate::version::{ParseVersionError, Version};

static CONSTRAINT_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([<>=!]+)?\s*([^\s,<>=!]+)").expect("valid constraint regex")
});

/// Errors produced by [`VersionConstraint::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseConstraintError {
    /// A bound or exact value is not a version.
    #[error(transparent)]
    Version(#[from] ParseVersionError),

    /// Operator other than `>=`, `>`, `<=`, `<`, `=`, `==`.
    #[error("unknown constraint operator '{0}'")]
    UnknownOperator(String),

    /// Operators were present but produced no bound.
    #[error("could not parse constraint '{0}'")]
    NoBounds(String),

    /// The lower bound lies above the upper bound.
    #[error("constraint '{0}' describes an empty range")]
    EmptyRange(String),

    /// An exact version sits next to other terms.
    #[error("exact version in '{0}' cannot be combined with other terms")]
    ExactWithOthers(String),
}

/// One end of a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    /// Where the range ends.
    pub version: Version,
    /// Whether `version` itself is inside the range.
    pub inclusive: bool,
}

impl Bound {
    /// Bound that includes `version`.
    pub fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    /// Bound that stops short of `version`.
    pub fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// A predicate over [`Version`]s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionConstraint {
    /// Matches every version.
    #[default]
    Latest,
    /// Matches one version.
    Exact(Version),
    /// Matches versions between the present bounds.
    ///
    /// When both bounds are present `min <= max`, and equal bounds are both
    /// inclusive. Build ranges with [`VersionConstraint::bounded`] to keep that.
    Range {
        /// Lower bound, if any.
        min: Option<Bound>,
        /// Upper bound, if any.
        max: Option<Bound>,
    },
}

impl VersionConstraint {
    /// Matches anything; resolves to the newest release.
    pub fn latest() -> Self {
        VersionConstraint::Latest
    }

    /// Matches `version` only.
    pub fn exact(version: Version) -> Self {
        VersionConstraint::Exact(version)
    }

    /// `>= min`
    pub fn at_least(min: Version) -> Self {
        VersionConstraint::Range {
            min: Some(Bound::inclusive(min)),
            max: None,
        }
    }

    /// `>= min <max`, or `None` when the range is empty.
    pub fn range(min: Version, max: Version) -> Option<Self> {
        Self::bounded(Some(Bound::inclusive(min)), Some(Bound::exclusive(max)))
    }

    /// Range with explicit bounds, or `None` when no version could satisfy it.
    pub fn bounded(min: Option<Bound>, max: Option<Bound>) -> Option<Self> {
        if let (Some(lo), Some(hi)) = (&min, &max) {
            let empty = lo.version > hi.version
                || (lo.version == hi.version && !(lo.inclusive && hi.inclusive));
            if empty {
                return None;
            }
        }
        Some(VersionConstraint::Range { min, max })
    }

    /// Constraint covering every acceptable update from `baseline`.
    pub fn from_policy(baseline: Version, policy: UpdatePolicy) -> Self {
        let ceiling = match policy {
            UpdatePolicy::None => return Self::exact(baseline),
            UpdatePolicy::Major => return Self::at_least(baseline),
            UpdatePolicy::Patch => format!(
                "{}.{}.0",
                baseline.major(),
                baseline.minor().saturating_add(1)
            ),
            UpdatePolicy::Minor => format!("{}.0.0", baseline.major().saturating_add(1)),
        };

        match Version::parse(&ceiling) {
            Ok(max) => Self::range(baseline.clone(), max).unwrap_or(Self::at_least(baseline)),
            Err(_) => Self::at_least(baseline),
        }
    }

    /// Parse a constraint expression.
    ///
    /// # Errors
    ///
    /// Fails on unparseable versions, unknown operators (`!=`, `=>`), an
    /// exact version combined with other terms, an operator list that yields
    /// no bound, or an empty range.
    pub fn parse(expression: &str) -> Result<Self, ParseConstraintError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::Latest);
        }

        if !trimmed.contains(['<', '>', '=']) {
            return Ok(Self::Exact(Version::parse(trimmed)?));
        }

        let mut min = None;
        let mut max = None;
        let parts: Vec<_> = CONSTRAINT_PART.captures_iter(trimmed).collect();
        for caps in &parts {
            let op = caps.get(1).map_or("", |m| m.as_str());
            let version = Version::parse(&caps[2])?;
            match op {
                "" | "=" | "==" if parts.len() > 1 => {
                    return Err(ParseConstraintError::ExactWithOthers(trimmed.to_string()));
                }
                "" | "=" | "==" => return Ok(Self::Exact(version)),
                ">=" => min = Some(Bound::inclusive(version)),
                ">" => min = Some(Bound::exclusive(version)),
                "<=" => max = Some(Bound::inclusive(version)),
                "<" => max = Some(Bound::exclusive(version)),
                other => return Err(ParseConstraintError::UnknownOperator(other.to_string())),
            }
        }

        if min.is_none() && max.is_none() {
            return Err(ParseConstraintError::NoBounds(trimmed.to_string()));
        }
        Self::bounded(min, max).ok_or_else(|| ParseConstraintError::EmptyRange(trimmed.to_string()))
    }

    /// Whether this is the unconstrained `*`.
    pub fn is_latest(&self) -> bool {
        matches!(self, VersionConstraint::Latest)
    }

    /// Lower bound of the constraint. An exact constraint is its own floor.
    pub fn floor(&self) -> Option<&Version> {
        match self {
            VersionConstraint::Latest => None,
            VersionConstraint::Exact(v) => Some(v),
            VersionConstraint::Range { min, .. } => min.as_ref().map(|b| &b.version),
        }
    }

    /// Whether `version` lies inside the constraint.
    pub fn is_satisfied_by(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Latest => true,
            VersionConstraint::Exact(exact) => version == exact,
            VersionConstraint::Range { min, max } => {
                let above = min.as_ref().is_none_or(|b| {
                    if b.inclusive {
                        version >= &b.version
                    } else {
                        version > &b.version
                    }
                });
                let below = max.as_ref().is_none_or(|b| {
                    if b.inclusive {
                        version <= &b.version
                    } else {
                        version < &b.version
                    }
                });
                above && below
            }
        }
    }

    /// Highest candidate that satisfies the constraint.
    pub fn select_best<'a>(&self, candidates: &'a [Version]) -> Option<&'a Version> {
        let mut sorted: Vec<&Version> = candidates.iter().collect();
        sorted.sort_by(|a, b| b.cmp(a));
        sorted.into_iter().find(|v| self.is_satisfied_by(v))
    }

    /// Intersection of two constraints, `None` when they cannot both hold.
    pub fn merge(&self, other: &VersionConstraint) -> Option<VersionConstraint> {
        match (self, other) {
            (Self::Latest, Self::Latest) => Some(Self::Latest),
            (Self::Exact(a), Self::Exact(b)) => (a == b).then(|| self.clone()),
            (Self::Exact(a), _) => other.is_satisfied_by(a).then(|| self.clone()),
            (_, Self::Exact(b)) => self.is_satisfied_by(b).then(|| other.clone()),
            _ => {
                let (min_a, max_a) = self.bounds();
                let (min_b, max_b) = other.bounds();
                let min = tighter(min_a, min_b, |a, b| a > b);
                let max = tighter(max_a, max_b, |a, b| a < b);
                Self::bounded(min, max)
            }
        }
    }

    fn bounds(&self) -> (Option<&Bound>, Option<&Bound>) {
        match self {
            VersionConstraint::Range { min, max } => (min.as_ref(), max.as_ref()),
            _ => (None, None),
        }
    }
}

/// Picks the stricter of two bounds; `wins(a, b)` says `a` is strictly tighter.
/// Equal versions keep the bound only inclusive if both were.
fn tighter(
    a: Option<&Bound>,
    b: Option<&Bound>,
    wins: impl Fn(&Version, &Version) -> bool,
) -> Option<Bound> {
    match (a, b) {
        (Some(a), Some(b)) if wins(&a.version, &b.version) => Some(a.clone()),
        (Some(a), Some(b)) if wins(&b.version, &a.version) => Some(b.clone()),
        (Some(a), Some(b)) => Some(Bound {
            version: a.version.clone(),
            inclusive: a.inclusive && b.inclusive,
        }),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Latest => f.write_str("*"),
            VersionConstraint::Exact(v) => write!(f, "{v}"),
            VersionConstraint::Range { min, max } => {
                if let Some(b) = min {
                    write!(f, "{}{}", if b.inclusive { ">=" } else { ">" }, b.version)?;
                }
                if let Some(b) = max {
                    if min.is_some() {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}{}", if b.inclusive { "<=" } else { "<" }, b.version)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = ParseConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionConstraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionConstraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
