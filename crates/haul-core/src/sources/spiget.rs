//! Numeric-id resource registry (`/v2`).
//!
//! Publishes no checksums; verification relies on the dependency's own
//! `sha256`, if any.

use haul_schema::{Checksum, SourceKind, Version};
use serde::Deserialize;

use super::{Lookup, ResolvedArtifact, Source, endpoint, parse_versions};
use crate::error::ResolveError;
use crate::http::HttpClient;
use crate::paths;

/// Numeric resource catalog.
#[derive(Debug, Clone)]
pub struct SpigetSource {
    http: HttpClient,
    base: String,
}

#[derive(Deserialize)]
struct Resource {
    name: Option<String>,
    /// Current version; a plain string on some mirrors, an object on others.
    #[serde(default)]
    version: serde_json::Value,
    #[serde(default)]
    external: bool,
    file: Option<ResourceFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceFile {
    external_url: Option<String>,
}

#[derive(Deserialize)]
struct ResourceVersion {
    name: Option<String>,
}

impl SpigetSource {
    /// Source rooted at the resource API `base`.
    pub fn new(http: HttpClient, base: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn resource(&self, id: &str) -> Result<Resource, ResolveError> {
        let url = endpoint(&self.base, &["resources", id], &[])?;
        self.http.get_json(&url)
    }
}

impl Source for SpigetSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Spiget
    }

    fn fetch_versions(&self, lookup: &Lookup<'_>) -> Result<Vec<Version>, ResolveError> {
        let id = lookup.id();
        let resource = self.resource(id)?;

        let url = endpoint(
            &self.base,
            &["resources", id, "versions"],
            &[("size", "25"), ("sort", "-releaseDate")],
        )?;
        let history = match self.http.get_json::<serde_json::Value>(&url) {
            Ok(history) => history,
            Err(ResolveError::Json { source, .. }) => {
                tracing::debug!(resource = id, "Unreadable version history: {source}");
                serde_json::Value::Null
            }
            Err(e) => return Err(e),
        };
        // Anything but an array of `{name}` objects counts as no history.
        let listed: Vec<ResourceVersion> = serde_json::from_value(history).unwrap_or_default();
        let mut versions = parse_versions(listed.iter().filter_map(|v| v.name.as_deref()));

        if versions.is_empty() {
            versions.extend(resource.version.as_str().and_then(Version::try_parse));
        }
        if versions.is_empty() {
            return Err(ResolveError::NoVersions);
        }
        Ok(versions)
    }

    fn resolve(&self, lookup: &Lookup<'_>, version: &Version) -> Result<ResolvedArtifact, ResolveError> {
        let id = lookup.id();
        let resource = self.resource(id)?;

        let external_url = resource
            .file
            .and_then(|f| f.external_url)
            .filter(|u| resource.external && !u.is_empty());
        let download_url = match external_url {
            Some(url) => url,
            None => endpoint(&self.base, &["resources", id, "download"], &[])?,
        };

        let display = resource.name.unwrap_or_else(|| format!("Resource-{id}"));
        let checksum = lookup.dependency.sha256.clone().map(Checksum::sha256);

        Ok(ResolvedArtifact::new(
            lookup,
            version,
            download_url,
            checksum,
            None,
            format!("{}-{}.jar", paths::sanitize_file_component(&display), version.raw()),
        ))
    }
}
