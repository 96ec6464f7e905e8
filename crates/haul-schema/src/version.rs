//! Free-form version strings and their total order.
//!
//! Plugin authors publish versions in every shape imaginable: `5.4.0`,
//! `v2.1.0-beta.3`, `R0.1`, `1_20_4`, `build-123`, `#456`. [`Version`] accepts
//! all of them and orders them consistently:
//!
//! 1. numeric components, missing trailing components count as `0`
//! 2. a release outranks any qualified (pre-release) version
//! 3. qualifier rank: `snapshot < dev < alpha < beta < rc < unknown < final`
//! 4. embedded build number
//! 5. case-insensitive qualifier text
//!
//! Equality follows the same key, so `5.4` and `5.4.0` are the same version
//! even though they print differently.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::policy::UpdatePolicy;

/// Pure build-counter form: `build-123`, `build.7`, `build#9`, `#456`.
static BUILD_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:build[-.]?#?|#)([0-9]+)$").expect("valid build-number regex")
});

/// Optional prefix, numeric run, optional qualifier, optional `+metadata`.
static STRUCTURED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([a-zA-Z]*-?)?([0-9]+(?:[._][0-9]+)*)(?:[-.]?([a-zA-Z][a-zA-Z0-9]*(?:[-._][a-zA-Z0-9]+)*))?(?:\+(.+))?$",
    )
    .expect("valid version regex")
});

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid digit regex"));

static TRAILING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)$").expect("valid trailing-digit regex"));

/// Errors produced when a string cannot be interpreted as a [`Version`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseVersionError {
    /// The input was empty or whitespace only.
    #[error("version string is empty")]
    Empty,
    /// The input carries no digit at all, so not even the fallback applies.
    #[error("cannot parse version '{0}': no numeric component")]
    NoDigits(String),
}

/// A parsed, immutable version.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    prefix: Option<String>,
    components: Vec<u64>,
    qualifier: Option<String>,
    build_number: Option<u64>,
    metadata: Option<String>,
}

impl Version {
    /// Parse a version string.
    ///
    /// Tries the build-counter form, then the structured grammar, then falls
    /// back to collecting every digit run in order. Any input containing at
    /// least one ASCII digit therefore parses.
    ///
    /// # Errors
    ///
    /// Returns [`ParseVersionError`] when the input is blank or digit-free.
    pub fn parse(input: &str) -> Result<Self, ParseVersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ParseVersionError::Empty);
        }

        if let Some(caps) = BUILD_ONLY.captures(trimmed) {
            return Ok(Self {
                raw: trimmed.to_string(),
                prefix: Some("build-".to_string()),
                components: Vec::new(),
                qualifier: None,
                build_number: Some(parse_number(&caps[1])),
                metadata: None,
            });
        }

        if let Some(caps) = STRUCTURED.captures(trimmed) {
            let prefix = caps
                .get(1)
                .map(|m| m.as_str().trim_end_matches('-'))
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            let components = caps[2].split(['.', '_']).map(parse_number).collect();
            let qualifier = caps.get(3).map(|m| m.as_str().to_string());
            let build_number = qualifier
                .as_deref()
                .and_then(|q| TRAILING_DIGITS.captures(q))
                .map(|c| parse_number(&c[1]));

            return Ok(Self {
                raw: trimmed.to_string(),
                prefix,
                components,
                qualifier,
                build_number,
                metadata: caps.get(4).map(|m| m.as_str().to_string()),
            });
        }

        let components: Vec<u64> = DIGIT_RUN
            .find_iter(trimmed)
            .map(|m| parse_number(m.as_str()))
            .collect();
        if components.is_empty() {
            return Err(ParseVersionError::NoDigits(trimmed.to_string()));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            prefix: None,
            components,
            qualifier: None,
            build_number: None,
            metadata: None,
        })
    }

    /// Like [`Version::parse`] but returns `None` instead of an error.
    pub fn try_parse(input: &str) -> Option<Self> {
        Self::parse(input).ok()
    }

    /// The trimmed input this version was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Leading alphabetic marker such as `v` or `R`.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Numeric components in order of significance.
    pub fn components(&self) -> &[u64] {
        &self.components
    }

    /// Pre-release or build tag, e.g. `SNAPSHOT` or `beta.2`.
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Build counter from a `build-N` string or the trailing digits of a qualifier.
    pub fn build_number(&self) -> Option<u64> {
        self.build_number
    }

    /// Text following a `+`.
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// First component, `0` when absent.
    pub fn major(&self) -> u64 {
        self.component(0)
    }

    /// Second component, `0` when absent.
    pub fn minor(&self) -> u64 {
        self.component(1)
    }

    /// Third component, `0` when absent.
    pub fn patch(&self) -> u64 {
        self.component(2)
    }

    /// Component at `index`, or `0` if the version is shorter.
    pub fn component(&self, index: usize) -> u64 {
        self.components.get(index).copied().unwrap_or(0)
    }

    /// Whether the qualifier marks an unstable build.
    pub fn is_pre_release(&self) -> bool {
        self.qualifier.as_deref().is_some_and(|q| {
            let lower = q.to_ascii_lowercase();
            ["snapshot", "alpha", "beta", "dev", "rc", "cr"]
                .iter()
                .any(|marker| lower.contains(marker))
        })
    }

    /// Whether this version is an acceptable update from `baseline` under `policy`.
    pub fn is_allowed_by(&self, baseline: &Version, policy: UpdatePolicy) -> bool {
        match policy {
            UpdatePolicy::None => self == baseline,
            _ if self < baseline => false,
            UpdatePolicy::Patch => {
                self.major() == baseline.major() && self.minor() == baseline.minor()
            }
            UpdatePolicy::Minor => self.major() == baseline.major(),
            UpdatePolicy::Major => true,
        }
    }

    /// Components with trailing zeros removed.
    ///
    /// Comparing these lexicographically is the same as comparing the full
    /// sequences padded with zeros.
    fn significant(&self) -> &[u64] {
        let end = self
            .components
            .iter()
            .rposition(|&c| c != 0)
            .map_or(0, |i| i + 1);
        &self.components[..end]
    }

    fn qualifier_rank(&self) -> u8 {
        self.qualifier.as_deref().map_or(u8::MAX, qualifier_rank)
    }
}

fn parse_number(digits: &str) -> u64 {
    digits.parse().unwrap_or(u64::MAX)
}

/// Rank of a qualifier, matched on its letters only, first hit wins.
fn qualifier_rank(qualifier: &str) -> u8 {
    const ORDER: [(&str, u8); 9] = [
        ("snapshot", 0),
        ("dev", 1),
        ("alpha", 2),
        ("beta", 3),
        ("rc", 4),
        ("cr", 4),
        ("final", 6),
        ("ga", 6),
        ("release", 6),
    ];
    const UNKNOWN: u8 = 5;

    let letters: String = qualifier
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    ORDER
        .iter()
        .find(|(marker, _)| letters.contains(marker))
        .map_or(UNKNOWN, |&(_, rank)| rank)
}

fn lowercase(qualifier: Option<&str>) -> Option<String> {
    qualifier.map(str::to_ascii_lowercase)
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.significant()
            .cmp(other.significant())
            .then_with(|| self.qualifier.is_none().cmp(&other.qualifier.is_none()))
            .then_with(|| self.qualifier_rank().cmp(&other.qualifier_rank()))
            .then_with(|| self.build_number.cmp(&other.build_number))
            .then_with(|| lowercase(self.qualifier()).cmp(&lowercase(other.qualifier())))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
        lowercase(self.qualifier()).hash(state);
        self.build_number.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
