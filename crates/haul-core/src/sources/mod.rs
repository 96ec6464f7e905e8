//! Remote repositories a dependency can come from.
//!
//! Each [`SourceKind`] has one [`Source`] implementation. A source answers two
//! questions: which versions exist, and where the artifact for one of them
//! lives. The resolver decides everything else.

use std::collections::HashMap;

use haul_schema::{Checksum, DependencyName, Platform, SourceKind, Version};
use reqwest::Url;

use crate::config::HaulConfig;
use crate::dependency::Dependency;
use crate::error::ResolveError;
use crate::http::HttpClient;
use crate::paths;

pub mod github;
pub mod hangar;
pub mod modrinth;
pub mod spiget;
pub mod url;

pub use github::GithubSource;
pub use hangar::HangarSource;
pub use modrinth::ModrinthSource;
pub use spiget::SpigetSource;
pub use url::UrlSource;

/// A dependency together with the host settings that apply to it.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    /// The descriptor being resolved.
    pub dependency: &'a Dependency,
    /// Never [`Platform::Auto`].
    pub platform: Platform,
    /// Runtime version filter, if any.
    pub runtime_version: Option<&'a str>,
}

impl<'a> Lookup<'a> {
    /// Fill in the dependency's unset platform and runtime filter from `config`.
    pub fn new(dependency: &'a Dependency, config: &'a HaulConfig) -> Self {
        let platform = dependency.platform.or(config.platform).or(Platform::Paper);
        Self {
            dependency,
            platform,
            runtime_version: dependency
                .runtime_version
                .as_deref()
                .or(config.runtime_version.as_deref()),
        }
    }

    /// The dependency's id within its source.
    pub fn id(&self) -> &'a str {
        &self.dependency.id
    }
}

/// Where to fetch one specific version from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Registry name.
    pub name: DependencyName,
    /// Version chosen.
    pub version: Version,
    /// Absolute download URL.
    pub download_url: String,
    /// Published or configured digest.
    pub checksum: Option<Checksum>,
    /// Safe file name inside the install directory.
    pub file_name: String,
}

impl ResolvedArtifact {
    /// Build an artifact, letting the dependency's own file name win over the
    /// source's. Remote file names that would escape the install directory
    /// are replaced by `default_file_name`.
    pub fn new(
        lookup: &Lookup<'_>,
        version: &Version,
        download_url: String,
        checksum: Option<Checksum>,
        remote_file_name: Option<String>,
        default_file_name: String,
    ) -> Self {
        let file_name = lookup
            .dependency
            .file_name
            .clone()
            .or(remote_file_name.filter(|n| paths::is_plain_file_name(n)))
            .unwrap_or(default_file_name);
        Self {
            name: lookup.dependency.name.clone(),
            version: version.clone(),
            download_url,
            checksum,
            file_name,
        }
    }
}

/// A remote repository.
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Kind of dependency this source serves.
    fn kind(&self) -> SourceKind;

    /// Versions available for the dependency, in no particular order.
    ///
    /// An empty catalog is an error, not an empty list.
    fn fetch_versions(&self, lookup: &Lookup<'_>) -> Result<Vec<Version>, ResolveError>;

    /// Download metadata for `version`.
    fn resolve(&self, lookup: &Lookup<'_>, version: &Version) -> Result<ResolvedArtifact, ResolveError>;
}

/// Sources keyed by the kind they serve.
#[derive(Debug, Default)]
pub struct SourceSet {
    sources: HashMap<SourceKind, Box<dyn Source>>,
}

impl SourceSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// One source per kind, talking to the endpoints in `config`.
    pub fn standard(http: &HttpClient, config: &HaulConfig) -> Self {
        let endpoints = &config.endpoints;
        Self::new()
            .with(HangarSource::new(http.clone(), &endpoints.hangar))
            .with(ModrinthSource::new(http.clone(), &endpoints.modrinth))
            .with(SpigetSource::new(http.clone(), &endpoints.spiget))
            .with(GithubSource::new(http.clone(), &endpoints.github))
            .with(UrlSource::new())
    }

    /// Add a source, replacing any previous one of the same kind.
    pub fn with(mut self, source: impl Source + 'static) -> Self {
        self.insert(Box::new(source));
        self
    }

    /// Register a source, replacing any previous one of the same kind.
    pub fn insert(&mut self, source: Box<dyn Source>) {
        self.sources.insert(source.kind(), source);
    }

    /// Take out the source for `kind`.
    pub fn remove(&mut self, kind: SourceKind) -> Option<Box<dyn Source>> {
        self.sources.remove(&kind)
    }

    /// Source serving `kind`.
    pub fn get(&self, kind: SourceKind) -> Option<&dyn Source> {
        self.sources.get(&kind).map(AsRef::as_ref)
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the set has no sources.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// `base` plus percent-encoded path segments and query pairs.
pub(crate) fn endpoint(base: &str, segments: &[&str], query: &[(&str, &str)]) -> Result<String, ResolveError> {
    let mut url = Url::parse(base)
        .map_err(|e| ResolveError::InvalidDescriptor(format!("bad endpoint '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ResolveError::InvalidDescriptor(format!("bad endpoint '{base}'")))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url.into())
}

/// Parse every name that looks like a version, dropping the rest.
pub(crate) fn parse_versions<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<Version> {
    names.into_iter().filter_map(Version::try_parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes() {
        let url = endpoint(
            "https://api.example.com/v2",
            &["project", "my plugin", "version"],
            &[("loaders", r#"["paper"]"#)],
        )
        .unwrap();
        assert_eq!(
            url,
            "https://api.example.com/v2/project/my%20plugin/version?loaders=%5B%22paper%22%5D"
        );
    }

    #[test]
    fn test_endpoint_without_query() {
        let url = endpoint("http://127.0.0.1:1234", &["resources", "42"], &[]).unwrap();
        assert_eq!(url, "http://127.0.0.1:1234/resources/42");
    }

    #[test]
    fn test_lookup_resolves_auto() {
        let config = HaulConfig::new("/tmp/p").with_platform(Platform::Velocity);
        let dep = Dependency::hangar("x");
        let lookup = Lookup::new(&dep, &config);
        assert_eq!(lookup.platform, Platform::Velocity);
        assert_eq!(lookup.runtime_version, None);

        let dep = Dependency::hangar("x").platform(Platform::Folia).runtime_version("1.21");
        let config = config.with_runtime_version("1.20");
        let lookup = Lookup::new(&dep, &config);
        assert_eq!(lookup.platform, Platform::Folia);
        assert_eq!(lookup.runtime_version, Some("1.21"));
    }

    #[test]
    fn test_artifact_file_name_precedence() {
        let config = HaulConfig::new("/tmp/p");
        let version = Version::parse("1.0").unwrap();

        let dep = Dependency::hangar("x");
        let lookup = Lookup::new(&dep, &config);
        let art = ResolvedArtifact::new(&lookup, &version, "u".into(), None, Some("remote.jar".into()), "x-1.0.jar".into());
        assert_eq!(art.file_name, "remote.jar");
        let art = ResolvedArtifact::new(&lookup, &version, "u".into(), None, Some("../evil.jar".into()), "x-1.0.jar".into());
        assert_eq!(art.file_name, "x-1.0.jar");

        let dep = Dependency::hangar("x").file_name("Mine.jar");
        let lookup = Lookup::new(&dep, &config);
        let art = ResolvedArtifact::new(&lookup, &version, "u".into(), None, Some("remote.jar".into()), "x-1.0.jar".into());
        assert_eq!(art.file_name, "Mine.jar");
    }
}
