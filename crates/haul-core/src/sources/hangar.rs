//! Slug registry with per-platform downloads (`/api/v1`).

use std::collections::BTreeMap;

use haul_schema::{Checksum, SourceKind, Version};
use serde::Deserialize;

use super::{Lookup, ResolvedArtifact, Source, endpoint, parse_versions};
use crate::error::ResolveError;
use crate::http::HttpClient;

const PAGE_SIZE: &str = "25";

/// Slug registry with per-platform downloads.
#[derive(Debug, Clone)]
pub struct HangarSource {
    http: HttpClient,
    /// Site root; the API lives under `api/v1` and relative download links
    /// are resolved against it.
    base: String,
}

#[derive(Deserialize)]
struct VersionPage {
    #[serde(default)]
    result: Vec<VersionSummary>,
}

#[derive(Deserialize)]
struct VersionSummary {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionDetail {
    #[serde(default)]
    downloads: BTreeMap<String, PlatformDownload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlatformDownload {
    file_info: Option<FileInfo>,
    download_url: Option<String>,
    external_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileInfo {
    name: Option<String>,
    sha256_hash: Option<String>,
}

impl HangarSource {
    /// Source rooted at the slug registry site `base`.
    pub fn new(http: HttpClient, base: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn api(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<String, ResolveError> {
        let mut full = vec!["api", "v1", "projects"];
        full.extend_from_slice(segments);
        endpoint(&self.base, &full, query)
    }

    fn absolute(&self, url: String) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url
        } else if url.starts_with('/') {
            format!("{}{url}", self.base)
        } else {
            format!("{}/{url}", self.base)
        }
    }
}

impl Source for HangarSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Hangar
    }

    fn fetch_versions(&self, lookup: &Lookup<'_>) -> Result<Vec<Version>, ResolveError> {
        let platform = lookup.platform.primary_id();
        let mut query = vec![("limit", PAGE_SIZE), ("platform", platform)];
        if let Some(rv) = lookup.runtime_version {
            query.push(("platformVersion", rv));
        }
        let url = self.api(&[lookup.id(), "versions"], &query)?;

        let page: VersionPage = self.http.get_json(&url)?;
        let versions = parse_versions(page.result.iter().map(|v| v.name.as_str()));
        if versions.is_empty() {
            return Err(ResolveError::NoVersions);
        }
        Ok(versions)
    }

    fn resolve(&self, lookup: &Lookup<'_>, version: &Version) -> Result<ResolvedArtifact, ResolveError> {
        let slug = lookup.id();
        let url = self.api(&[slug, "versions", version.raw()], &[])?;
        let mut detail: VersionDetail = self.http.get_json(&url)?;

        // Fall back to the first listed platform; its key names the download endpoint.
        let chosen = detail
            .downloads
            .remove_entry(lookup.platform.primary_id())
            .or_else(|| detail.downloads.pop_first());
        let Some((platform, download)) = chosen else {
            return Err(ResolveError::NotFound(format!("{slug} {version}: no downloads")));
        };

        let (remote_name, sha256) = match download.file_info {
            Some(info) => (info.name, info.sha256_hash),
            None => (None, None),
        };
        let download_url = match download.download_url.or(download.external_url) {
            Some(u) => self.absolute(u),
            None => self.api(&[slug, "versions", version.raw(), platform.as_str(), "download"], &[])?,
        };

        Ok(ResolvedArtifact::new(
            lookup,
            version,
            download_url,
            sha256.filter(|s| !s.is_empty()).map(Checksum::sha256),
            remote_name,
            format!("{slug}-{}.jar", version.raw()),
        ))
    }
}
