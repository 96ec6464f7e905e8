//! Direct download links. There is no catalog; the version is whatever the
//! dependency pins, or a placeholder.

use haul_schema::{Checksum, SourceKind, Version, VersionConstraint};

use super::{Lookup, ResolvedArtifact, Source};
use crate::error::ResolveError;
use crate::paths;

const PLACEHOLDER_VERSION: &str = "1.0.0";

/// Direct links with no version catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlSource;

impl UrlSource {
    /// The URL source.
    pub fn new() -> Self {
        Self
    }
}

impl Source for UrlSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Url
    }

    fn fetch_versions(&self, lookup: &Lookup<'_>) -> Result<Vec<Version>, ResolveError> {
        match &lookup.dependency.constraint {
            Some(VersionConstraint::Exact(v)) => Ok(vec![v.clone()]),
            _ => Ok(vec![Version::parse(PLACEHOLDER_VERSION).map_err(|e| {
                ResolveError::InvalidDescriptor(e.to_string())
            })?]),
        }
    }

    fn resolve(&self, lookup: &Lookup<'_>, version: &Version) -> Result<ResolvedArtifact, ResolveError> {
        let url = lookup.id();
        let fallback = || format!("download-{}.jar", chrono::Utc::now().timestamp_millis());
        let default_name = paths::filename_from_url(url)
            .filter(|n| paths::is_plain_file_name(n))
            .unwrap_or_else(fallback);

        Ok(ResolvedArtifact::new(
            lookup,
            version,
            url.to_string(),
            lookup.dependency.sha256.clone().map(Checksum::sha256),
            None,
            default_name,
        ))
    }
}
