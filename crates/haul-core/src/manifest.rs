//! `haul.toml`: a dependency list kept next to a plugin instead of in code.
//!
//! ```toml
//! caller = "MyPlugin"
//!
//! [[dependency]]
//! source = "hangar"
//! id = "ViaVersion"
//! version = ">=5.0.0"
//! on-failure = "warn-skip"
//!
//! [[dependency]]
//! source = "github"
//! id = "dmulloy2/ProtocolLib"
//! pinned = "5.3.0"
//! update-policy = "patch"
//! asset-pattern = "ProtocolLib*.jar"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use haul_schema::{AssetPattern, FailurePolicy, Platform, SourceKind, UpdatePolicy, Version, VersionConstraint};
use serde::Deserialize;

use crate::dependency::Dependency;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Dependency list a host plugin ships, in TOML.
pub struct Manifest {
    /// Registry identity; hosts usually pass their own name instead.
    pub caller: Option<String>,
    #[serde(default, rename = "dependency")]
    /// `[[dependency]]` tables, in file order.
    pub dependencies: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
/// One `[[dependency]]` table. Values stay strings until validated.
pub struct ManifestEntry {
    /// Source kind name, e.g. `modrinth`.
    pub source: String,
    /// Identifier within the source.
    pub id: String,
    /// Registry name; defaults to `id`.
    pub name: Option<String>,
    /// Constraint expression, e.g. `>=5.0 <6.0` or `5.2.1`.
    pub version: Option<String>,
    /// Baseline widened by `update-policy`.
    pub pinned: Option<String>,
    /// `NONE`, `PATCH`, `MINOR` or `MAJOR`.
    pub update_policy: Option<String>,
    /// Failure policy name.
    pub on_failure: Option<String>,
    /// File name override.
    pub file_name: Option<String>,
    /// Expected SHA-256 hex digest.
    pub sha256: Option<String>,
    /// Runtime version filter.
    pub runtime_version: Option<String>,
    /// Release asset glob.
    pub asset_pattern: Option<String>,
    /// Required platform.
    pub platform: Option<String>,
}

impl Manifest {
    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse manifest text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Build validated descriptors, in file order.
    pub fn dependencies(&self) -> Result<Vec<Dependency>> {
        self.dependencies
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                entry
                    .to_dependency()
                    .with_context(|| format!("dependency #{} ('{}')", i + 1, entry.id))
            })
            .collect()
    }
}

impl ManifestEntry {
    /// Validate the entry into a descriptor.
    pub fn to_dependency(&self) -> Result<Dependency> {
        let source: SourceKind = self.source.parse().map_err(anyhow::Error::msg)?;
        let mut dep = Dependency::from_source(source, self.id.as_str());

        if let Some(name) = &self.name {
            dep = dep.named(name.as_str());
        }
        if let Some(policy) = &self.update_policy {
            dep = dep.update_policy(policy.parse::<UpdatePolicy>().map_err(anyhow::Error::msg)?);
        }
        if let Some(policy) = &self.on_failure {
            dep = dep.on_failure(policy.parse::<FailurePolicy>().map_err(anyhow::Error::msg)?);
        }
        match (&self.version, &self.pinned) {
            (Some(_), Some(_)) => anyhow::bail!("'version' and 'pinned' are mutually exclusive"),
            (Some(expr), None) => {
                let constraint = VersionConstraint::parse(expr)
                    .with_context(|| format!("invalid version constraint '{expr}'"))?;
                dep = dep.constraint(constraint);
            }
            (None, Some(baseline)) => {
                let baseline = Version::parse(baseline)
                    .with_context(|| format!("invalid pinned version '{baseline}'"))?;
                dep = dep.pinned(baseline);
            }
            (None, None) => {}
        }
        if let Some(file_name) = &self.file_name {
            dep = dep.file_name(file_name.as_str());
        }
        if let Some(sha256) = &self.sha256 {
            dep = dep.sha256(sha256.as_str());
        }
        if let Some(rv) = &self.runtime_version {
            dep = dep.runtime_version(rv.as_str());
        }
        if let Some(glob) = &self.asset_pattern {
            let pattern = AssetPattern::new(glob).with_context(|| format!("invalid asset pattern '{glob}'"))?;
            dep = dep.asset_pattern(pattern);
        }
        if let Some(platform) = &self.platform {
            dep = dep.platform(platform.parse::<Platform>().map_err(anyhow::Error::msg)?);
        }

        dep.validate()?;
        Ok(dep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
caller = "MyPlugin"

[[dependency]]
source = "hangar"
id = "ViaVersion"
version = ">=5.0.0"
on-failure = "warn-skip"

[[dependency]]
source = "github"
id = "dmulloy2/ProtocolLib"
pinned = "5.3.0"
update-policy = "patch"
asset-pattern = "ProtocolLib*.jar"
platform = "folia"
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.caller.as_deref(), Some("MyPlugin"));

        let deps = manifest.dependencies().unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].source, SourceKind::Hangar);
        assert_eq!(deps[0].failure_policy, FailurePolicy::WarnSkip);
        assert_eq!(deps[0].constraint, Some(VersionConstraint::parse(">=5.0.0").unwrap()));

        let pl = &deps[1];
        assert_eq!(pl.name, "dmulloy2/ProtocolLib");
        assert_eq!(pl.platform, Platform::Folia);
        assert!(pl.asset_pattern.as_ref().unwrap().matches("ProtocolLib-5.3.1.jar"));
        let constraint = pl.constraint.as_ref().unwrap();
        assert!(constraint.is_satisfied_by(&Version::parse("5.3.9").unwrap()));
        assert!(!constraint.is_satisfied_by(&Version::parse("5.4.0").unwrap()));
    }

    #[test]
    fn test_bad_entries_name_their_position() {
        let manifest = Manifest::parse(
            r#"
[[dependency]]
source = "spiget"
id = "not-a-number"
"#,
        )
        .unwrap();
        let err = manifest.dependencies().unwrap_err();
        assert!(format!("{err:#}").contains("dependency #1"));

        let err = Manifest::parse(
            r#"
[[dependency]]
source = "ftp"
id = "x"
"#,
        )
        .unwrap()
        .dependencies()
        .unwrap_err();
        assert!(format!("{err:#}").contains("ftp"));

        assert!(Manifest::parse("[[dependency]]\nsource = \"hangar\"\nid = \"x\"\ncolour = 1\n").is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("haul.toml");
        std::fs::write(&path, MANIFEST).unwrap();
        assert_eq!(Manifest::load(&path).unwrap().dependencies.len(), 2);
        assert!(Manifest::load(&dir.path().join("missing.toml")).is_err());
    }
}
