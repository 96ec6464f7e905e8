//! Lockfile for reproducible installs
//!
//! `haul.lock` pins the version, source URL, checksum and file name last
//! installed for every dependency name.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use haul_schema::{Checksum, ChecksumAlgorithm, DependencyName, Version};
use serde::{Deserialize, Serialize};

use super::{load_json, now_rfc3339, save_json};
use crate::sources::ResolvedArtifact;

const FORMAT_VERSION: u32 = 1;

/// A locked dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EntryRecord", into = "EntryRecord")]
pub struct LockEntry {
    /// Registry name.
    pub name: DependencyName,
    /// Version string as the source reported it.
    pub resolved_version: String,
    /// Digest the artifact was verified against.
    pub checksum: Option<Checksum>,
    /// Where it was fetched from.
    pub download_url: String,
    /// File name inside the install directory.
    pub file_name: String,
}

impl LockEntry {
    /// Parsed `resolved_version`.
    pub fn version(&self) -> Option<Version> {
        Version::try_parse(&self.resolved_version)
    }
}

/// On-disk shape. Older files carry a bare `sha256` instead of
/// `checksum` + `checksumType`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    resolved_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum_type: Option<String>,
    #[serde(default, skip_serializing)]
    sha256: Option<String>,
    #[serde(default)]
    download_url: String,
    #[serde(default)]
    file_name: String,
}

impl From<EntryRecord> for LockEntry {
    fn from(record: EntryRecord) -> Self {
        let checksum = match (record.checksum_type, record.checksum, record.sha256) {
            (Some(kind), Some(value), _) => kind
                .parse::<ChecksumAlgorithm>()
                .ok()
                .map(|alg| Checksum::new(alg, value)),
            (None, _, Some(legacy)) => Some(Checksum::sha256(legacy)),
            _ => None,
        };
        Self {
            name: DependencyName::new(record.name),
            resolved_version: record.resolved_version,
            checksum,
            download_url: record.download_url,
            file_name: record.file_name,
        }
    }
}

impl From<LockEntry> for EntryRecord {
    fn from(entry: LockEntry) -> Self {
        let (checksum, checksum_type) = match entry.checksum {
            Some(c) => (Some(c.value), Some(c.algorithm.as_str().to_string())),
            None => (None, None),
        };
        Self {
            name: entry.name.to_string(),
            resolved_version: entry.resolved_version,
            checksum,
            checksum_type,
            sha256: None,
            download_url: entry.download_url,
            file_name: entry.file_name,
        }
    }
}

/// The lockfile structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default = "format_version")]
    version: u32,
    #[serde(default)]
    generated: String,
    #[serde(default)]
    dependencies: BTreeMap<DependencyName, LockEntry>,
}

fn format_version() -> u32 {
    FORMAT_VERSION
}

impl Default for Lockfile {
    fn default() -> Self {
        Self::new()
    }
}

impl Lockfile {
    /// Empty lockfile stamped with the current time.
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            generated: now_rfc3339(),
            dependencies: BTreeMap::new(),
        }
    }

    /// Read `path`; a missing or unreadable lockfile is empty.
    pub fn load(path: &Path) -> Self {
        let mut lockfile: Self = load_json(path, "lockfile").unwrap_or_default();
        for (key, entry) in &mut lockfile.dependencies {
            if entry.name.is_empty() {
                entry.name = key.clone();
            }
        }
        lockfile
    }

    /// Write to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        save_json(path, self)
    }

    /// Entry for `name`.
    pub fn entry(&self, name: &str) -> Option<&LockEntry> {
        self.dependencies.get(name)
    }

    /// Record `artifact` as installed, replacing any previous entry.
    pub fn update(&mut self, artifact: &ResolvedArtifact) {
        let entry = LockEntry {
            name: artifact.name.clone(),
            resolved_version: artifact.version.raw().to_string(),
            checksum: artifact.checksum.clone(),
            download_url: artifact.download_url.clone(),
            file_name: artifact.file_name.clone(),
        };
        self.dependencies.insert(artifact.name.clone(), entry);
        self.generated = now_rfc3339();
    }

    /// Drop the entry for `name`.
    pub fn remove(&mut self, name: &str) -> Option<LockEntry> {
        let removed = self.dependencies.remove(name);
        if removed.is_some() {
            self.generated = now_rfc3339();
        }
        removed
    }

    /// Entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = &LockEntry> {
        self.dependencies.values()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Whether nothing is locked.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn artifact(name: &str, version: &str, checksum: Option<Checksum>) -> ResolvedArtifact {
        ResolvedArtifact {
            name: DependencyName::new(name),
            version: Version::parse(version).unwrap(),
            download_url: format!("https://example.com/{name}.jar"),
            checksum,
            file_name: format!("{name}.jar"),
        }
    }

    #[test]
    fn test_lockfile_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("haul.lock");

        let mut lockfile = Lockfile::new();
        lockfile.update(&artifact("ProtocolLib", "5.3.0", Some(Checksum::sha512("ab"))));
        lockfile.update(&artifact("Vault", "1.7", None));
        lockfile.save(&path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let entry = &json["dependencies"]["ProtocolLib"];
        assert_eq!(entry["resolvedVersion"], "5.3.0");
        assert_eq!(entry["checksum"], "ab");
        assert_eq!(entry["checksumType"], "SHA512");
        assert!(json["dependencies"]["Vault"].get("checksumType").is_none());

        let loaded = Lockfile::load(&path);
        assert_eq!(loaded.len(), 2);
        let entry = loaded.entry("ProtocolLib").unwrap();
        assert_eq!(entry.checksum, Some(Checksum::sha512("ab")));
        assert_eq!(entry.version(), Some(Version::parse("5.3.0").unwrap()));
        assert_eq!(loaded.entry("Vault").unwrap().checksum, None);
    }

    #[test]
    fn test_update_replaces_whole_entry() {
        let mut lockfile = Lockfile::new();
        lockfile.update(&artifact("Vault", "1.7", Some(Checksum::sha256("aa"))));
        lockfile.update(&artifact("Vault", "1.8", None));
        let entry = lockfile.entry("Vault").unwrap();
        assert_eq!(entry.resolved_version, "1.8");
        assert_eq!(entry.checksum, None);
        assert!(lockfile.remove("Vault").is_some());
        assert!(lockfile.is_empty());
    }

    #[test]
    fn test_legacy_sha256_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("haul.lock");
        std::fs::write(
            &path,
            r#"{"version":1,"generated":"x","dependencies":{
                "Old":{"resolvedVersion":"1.0","sha256":"cafe","downloadUrl":"u","fileName":"Old.jar"},
                "Odd":{"name":"Odd","resolvedVersion":"2.0","checksum":"00","checksumType":"CRC32",
                       "downloadUrl":"u","fileName":"Odd.jar"}}}"#,
        )
        .unwrap();

        let lockfile = Lockfile::load(&path);
        let old = lockfile.entry("Old").unwrap();
        assert_eq!(old.name, "Old");
        assert_eq!(old.checksum, Some(Checksum::sha256("cafe")));
        assert_eq!(lockfile.entry("Odd").unwrap().checksum, None);
    }

    #[test]
    fn test_missing_or_corrupt_is_empty() {
        let dir = tempdir().unwrap();
        assert!(Lockfile::load(&dir.path().join("haul.lock")).is_empty());
        let path = dir.path().join("bad.lock");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(Lockfile::load(&path).is_empty());
    }
}
