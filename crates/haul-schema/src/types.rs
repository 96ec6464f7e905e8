//! Dependency names and source kinds.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name under which a dependency is registered, locked and reported.
///
/// Defaults to the source identifier. Unlike package names elsewhere it keeps
/// its case, since it doubles as a display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyName(String);

impl DependencyName {
    /// Wrap a name as given.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DependencyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for DependencyName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for DependencyName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DependencyName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for DependencyName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DependencyName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for DependencyName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DependencyName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Kind of remote repository a dependency is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Slug-addressed project registry with a per-platform download map.
    Hangar,
    /// Slug-addressed registry whose versions carry several files.
    Modrinth,
    /// Numeric resource catalog.
    Spiget,
    /// Tagged releases of an `owner/repo` repository.
    Github,
    /// A fixed download URL.
    Url,
}

impl SourceKind {
    /// Every kind, in the order they are tried when parsing.
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Hangar,
        SourceKind::Modrinth,
        SourceKind::Spiget,
        SourceKind::Github,
        SourceKind::Url,
    ];

    /// Lower-case name used in manifests and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Hangar => "hangar",
            SourceKind::Modrinth => "modrinth",
            SourceKind::Spiget => "spiget",
            SourceKind::Github => "github",
            SourceKind::Url => "url",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        SourceKind::ALL
            .into_iter()
            .find(|k| k.as_str() == lower)
            .ok_or_else(|| format!("Unknown source: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_name_keeps_case() {
        let name = DependencyName::from("PacketEvents");
        assert_eq!(name, "PacketEvents");
        assert_ne!(name, "packetevents");
        assert_eq!(name.len(), 12);
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("GitHub".parse::<SourceKind>(), Ok(SourceKind::Github));
        assert_eq!("url".parse::<SourceKind>(), Ok(SourceKind::Url));
        assert!("maven".parse::<SourceKind>().is_err());
    }
}
