//! Dependency descriptors supplied by callers.

use haul_schema::{
    AssetPattern, DependencyName, FailurePolicy, Platform, SourceKind, UpdatePolicy, Version,
    VersionConstraint,
};
use reqwest::Url;

use crate::error::ResolveError;
use crate::paths;

/// One artifact a caller needs.
///
/// Built with a constructor per source kind and refined with the chained
/// setters:
///
/// ```
/// use haul_core::Dependency;
/// use haul_schema::{FailurePolicy, VersionConstraint};
///
/// let dep = Dependency::modrinth("packetevents")
///     .named("PacketEvents")
///     .constraint(VersionConstraint::parse(">=2.0.0").unwrap())
///     .on_failure(FailurePolicy::WarnSkip);
/// assert_eq!(dep.name, "PacketEvents");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    /// Where the artifact comes from.
    pub source: SourceKind,
    /// Slug, numeric resource id, `owner/repo` or URL depending on `source`.
    pub id: String,
    /// Registry, lockfile and report key. Defaults to `id`.
    pub name: DependencyName,
    /// Overrides the file name chosen by the source.
    pub file_name: Option<String>,
    /// Expected SHA-256 for sources that publish none.
    pub sha256: Option<String>,
    /// Acceptable versions; `None` means the latest.
    pub constraint: Option<VersionConstraint>,
    /// Drift allowed when the constraint is built from a baseline.
    pub update_policy: UpdatePolicy,
    /// What a failure means for the host plugin.
    pub failure_policy: FailurePolicy,
    /// Only consider versions built for this runtime (e.g. `1.21.4`).
    pub runtime_version: Option<String>,
    /// Picks one asset out of a multi-asset release.
    pub asset_pattern: Option<AssetPattern>,
    /// Platform the artifact must be built for.
    pub platform: Platform,
}

impl Dependency {
    fn new(source: SourceKind, id: impl Into<String>) -> Self {
        let id = id.into().trim().to_string();
        Self {
            source,
            name: DependencyName::new(id.clone()),
            id,
            file_name: None,
            sha256: None,
            constraint: None,
            update_policy: UpdatePolicy::default(),
            failure_policy: FailurePolicy::default(),
            runtime_version: None,
            asset_pattern: None,
            platform: Platform::Auto,
        }
    }

    /// Project on the slug registry.
    pub fn hangar(slug: impl Into<String>) -> Self {
        Self::new(SourceKind::Hangar, slug)
    }

    /// Project on the multi-file registry, by slug or id.
    pub fn modrinth(slug_or_id: impl Into<String>) -> Self {
        Self::new(SourceKind::Modrinth, slug_or_id)
    }

    /// Resource in the numeric catalog.
    pub fn spiget(resource_id: u64) -> Self {
        Self::new(SourceKind::Spiget, resource_id.to_string())
    }

    /// Releases of an `owner/repo` repository.
    pub fn github(repo: impl Into<String>) -> Self {
        Self::new(SourceKind::Github, repo)
    }

    /// A fixed download URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self::new(SourceKind::Url, url)
    }

    /// Descriptor for any source kind.
    pub fn from_source(source: SourceKind, id: impl Into<String>) -> Self {
        Self::new(source, id)
    }

    /// Set the registry name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = DependencyName::new(name.into());
        self
    }

    /// Install under this file name.
    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Expect this SHA-256 hex digest.
    pub fn sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }

    /// Set the version constraint.
    pub fn constraint(mut self, constraint: VersionConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    /// Require exactly `version`.
    pub fn version(self, version: Version) -> Self {
        self.constraint(VersionConstraint::exact(version))
    }

    /// Require `version` or newer.
    pub fn min_version(self, version: Version) -> Self {
        self.constraint(VersionConstraint::at_least(version))
    }

    /// Accept updates from `baseline` within the current update policy.
    pub fn pinned(self, baseline: Version) -> Self {
        let policy = self.update_policy;
        self.constraint(VersionConstraint::from_policy(baseline, policy))
    }

    /// Accept whatever is newest.
    pub fn latest(self) -> Self {
        self.constraint(VersionConstraint::latest())
    }

    /// Set the update policy. Call before [`Dependency::pinned`].
    pub fn update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    /// Set the failure policy.
    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Only accept versions built for this runtime.
    pub fn runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = Some(version.into());
        self
    }

    /// Pick the release asset matching this glob.
    pub fn asset_pattern(mut self, pattern: AssetPattern) -> Self {
        self.asset_pattern = Some(pattern);
        self
    }

    /// Require a build for `platform`.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Identity used for deduplication.
    pub fn key(&self) -> (SourceKind, &str) {
        (self.source, &self.id)
    }

    /// Whether the caller asked for whatever is newest.
    pub fn is_latest(&self) -> bool {
        self.constraint.as_ref().is_none_or(VersionConstraint::is_latest)
    }

    /// Check the identifier against the source kind.
    pub fn validate(&self) -> Result<(), ResolveError> {
        let invalid = |msg: String| Err(ResolveError::InvalidDescriptor(msg));

        if self.id.is_empty() {
            return invalid(format!("empty {} identifier", self.source));
        }
        if self.name.is_empty() {
            return invalid("empty dependency name".to_string());
        }
        match self.source {
            SourceKind::Github => {
                let mut parts = self.id.split('/');
                let well_formed = matches!(
                    (parts.next(), parts.next(), parts.next()),
                    (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty()
                );
                if !well_formed {
                    return invalid(format!(
                        "expected 'owner/repo' for a release repository, got '{}'",
                        self.id
                    ));
                }
            }
            SourceKind::Spiget => {
                if self.id.parse::<u64>().is_err() {
                    return invalid(format!("resource id must be numeric, got '{}'", self.id));
                }
            }
            SourceKind::Url => match Url::parse(&self.id) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => return invalid(format!("not an http(s) URL: '{}'", self.id)),
            },
            SourceKind::Hangar | SourceKind::Modrinth => {}
        }
        if let Some(file_name) = self.file_name.as_deref().filter(|f| !paths::is_plain_file_name(f)) {
            return invalid(format!("file name '{file_name}' is not a plain file name"));
        }
        Ok(())
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.id)?;
        if let Some(c) = &self.constraint {
            write!(f, "@{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_defaults_to_id() {
        let dep = Dependency::hangar("ViaVersion");
        assert_eq!(dep.name, "ViaVersion");
        assert_eq!(dep.key(), (SourceKind::Hangar, "ViaVersion"));
        assert!(dep.is_latest());
        assert_eq!(dep.update_policy, UpdatePolicy::Minor);
        assert_eq!(dep.failure_policy, FailurePolicy::Fail);
    }

    #[test]
    fn test_display() {
        let dep = Dependency::spiget(1997).min_version(Version::parse("5.0").unwrap());
        assert_eq!(dep.to_string(), "spiget:1997@>=5.0");
    }

    #[test]
    fn test_pinned_uses_update_policy() {
        let dep = Dependency::modrinth("lp")
            .update_policy(UpdatePolicy::Patch)
            .pinned(Version::parse("5.4.1").unwrap());
        assert_eq!(dep.constraint.unwrap().to_string(), ">=5.4.1 <5.5.0");
    }

    #[test]
    fn test_validate() {
        assert!(Dependency::github("owner/repo").validate().is_ok());
        assert!(Dependency::github("owner").validate().is_err());
        assert!(Dependency::github("a/b/c").validate().is_err());
        assert!(Dependency::github("/repo").validate().is_err());
        assert!(Dependency::url("https://example.com/a.jar").validate().is_ok());
        assert!(Dependency::url("ftp://example.com/a.jar").validate().is_err());
        assert!(Dependency::from_source(SourceKind::Spiget, "abc").validate().is_err());
        assert!(Dependency::hangar("").validate().is_err());
        assert!(
            Dependency::hangar("x")
                .file_name("../escape.jar")
                .validate()
                .is_err()
        );
    }
}
