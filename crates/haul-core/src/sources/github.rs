//! Release assets of `owner/repo` projects.

use std::sync::LazyLock;

use haul_schema::{SourceKind, Version};
use regex::Regex;
use serde::Deserialize;

use super::{Lookup, ResolvedArtifact, Source, endpoint};
use crate::error::ResolveError;
use crate::http::{ACCEPT_GITHUB, HttpClient};

static V_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[vV]").expect("valid prefix regex"));
static RELEASE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^release[-_]?").expect("valid prefix regex"));

/// Tagged releases of `owner/repo` repositories.
#[derive(Debug, Clone)]
pub struct GithubSource {
    http: HttpClient,
    base: String,
}

#[derive(Deserialize)]
struct Release {
    tag_name: Option<String>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Deserialize)]
struct Asset {
    name: Option<String>,
    browser_download_url: Option<String>,
}

/// Strip a leading `v` and then a leading `release-`/`release_`.
fn clean_tag(tag: &str) -> String {
    let tag = V_PREFIX.replace(tag, "");
    RELEASE_PREFIX.replace(&tag, "").into_owned()
}

fn tag_version(tag: &str) -> Option<Version> {
    Version::try_parse(&clean_tag(tag)).or_else(|| Version::try_parse(tag))
}

fn find_asset(assets: &[Asset], pred: impl Fn(&str) -> bool) -> Option<&Asset> {
    assets.iter().find(|a| a.name.as_deref().is_some_and(&pred))
}

impl GithubSource {
    /// Source rooted at the release repository API `base`.
    pub fn new(http: HttpClient, base: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn releases(&self, repo: &str, per_page: &str) -> Result<Vec<Release>, ResolveError> {
        let (owner, name) = repo
            .split_once('/')
            .ok_or_else(|| ResolveError::InvalidDescriptor(format!("'{repo}' is not owner/repo")))?;
        let url = endpoint(
            &self.base,
            &["repos", owner, name, "releases"],
            &[("per_page", per_page)],
        )?;
        self.http.get_json_with(&url, ACCEPT_GITHUB)
    }
}

impl Source for GithubSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Github
    }

    fn fetch_versions(&self, lookup: &Lookup<'_>) -> Result<Vec<Version>, ResolveError> {
        let releases = self.releases(lookup.id(), "25")?;
        if releases.is_empty() {
            return Err(ResolveError::NoVersions);
        }
        Ok(releases
            .iter()
            .filter(|r| !r.draft)
            .filter_map(|r| r.tag_name.as_deref())
            .filter_map(tag_version)
            .collect())
    }

    fn resolve(&self, lookup: &Lookup<'_>, version: &Version) -> Result<ResolvedArtifact, ResolveError> {
        let repo = lookup.id();
        let releases = self.releases(repo, "50")?;
        let release = releases.into_iter().find(|r| {
            r.tag_name
                .as_deref()
                .is_some_and(|tag| tag == version.raw() || clean_tag(tag) == version.raw())
        });
        let Some(release) = release else {
            return Err(ResolveError::NotFound(format!("{repo} release {version}")));
        };

        let assets = &release.assets;
        let asset = lookup
            .dependency
            .asset_pattern
            .as_ref()
            .and_then(|pattern| find_asset(assets, |n| pattern.matches(n)))
            .or_else(|| find_asset(assets, |n| n.ends_with(".jar")))
            .or(assets.first())
            .ok_or_else(|| ResolveError::NotFound(format!("{repo} {version}: release has no assets")))?;

        let download_url = asset
            .browser_download_url
            .clone()
            .ok_or_else(|| ResolveError::NotFound(format!("{repo} {version}: asset has no download URL")))?;
        let fallback = format!("{}-{}.jar", repo.replace('/', "-"), version.raw());

        Ok(ResolvedArtifact::new(
            lookup,
            version,
            download_url,
            lookup.dependency.sha256.clone().map(haul_schema::Checksum::sha256),
            asset.name.clone(),
            fallback,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HaulConfig;
    use crate::dependency::Dependency;
    use haul_schema::AssetPattern;
    use mockito::Matcher;

    const RELEASES: &str = r#"[
        {"tag_name":"v2.1.0","draft":true,"assets":[]},
        {"tag_name":"v2.0.0","assets":[
            {"name":"notes.txt","browser_download_url":"https://dl.example/notes.txt"},
            {"name":"Tool-2.0.0-velocity.jar","browser_download_url":"https://dl.example/velocity.jar"},
            {"name":"Tool-2.0.0-paper.jar","browser_download_url":"https://dl.example/paper.jar"}]},
        {"tag_name":"release-1.9","assets":[
            {"name":"source.zip","browser_download_url":"https://dl.example/source.zip"}]},
        {"tag_name":"nightly","assets":[]}
    ]"#;

    fn server() -> mockito::ServerGuard {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/repos/acme/tool/releases")
            .match_query(Matcher::Any)
            .match_header("accept", ACCEPT_GITHUB)
            .with_body(RELEASES)
            .create();
        server
    }

    fn source(server: &mockito::ServerGuard) -> GithubSource {
        let http = HttpClient::new(&HaulConfig::new("/tmp/unused")).unwrap();
        GithubSource::new(http, &server.url())
    }

    #[test]
    fn test_clean_tag() {
        assert_eq!(clean_tag("v1.2"), "1.2");
        assert_eq!(clean_tag("V1.2"), "1.2");
        assert_eq!(clean_tag("release-3"), "3");
        assert_eq!(clean_tag("vrelease_3"), "3");
        assert_eq!(clean_tag("1.0"), "1.0");
    }

    #[test]
    fn test_fetch_versions_skips_drafts() {
        let server = server();
        let config = HaulConfig::new("/tmp/p");
        let dep = Dependency::github("acme/tool");
        let versions = source(&server).fetch_versions(&Lookup::new(&dep, &config)).unwrap();
        let raws: Vec<_> = versions.iter().map(Version::raw).collect();
        assert_eq!(raws, ["2.0.0", "1.9"]);
    }

    #[test]
    fn test_resolve_asset_selection() {
        let server = server();
        let config = HaulConfig::new("/tmp/p");

        let dep = Dependency::github("acme/tool");
        let lookup = Lookup::new(&dep, &config);
        let art = source(&server).resolve(&lookup, &Version::parse("2.0.0").unwrap()).unwrap();
        assert_eq!(art.download_url, "https://dl.example/velocity.jar");
        assert_eq!(art.file_name, "Tool-2.0.0-velocity.jar");
        assert_eq!(art.checksum, None);

        let dep = Dependency::github("acme/tool").asset_pattern(AssetPattern::new("*-paper.jar").unwrap());
        let lookup = Lookup::new(&dep, &config);
        let art = source(&server).resolve(&lookup, &Version::parse("2.0.0").unwrap()).unwrap();
        assert_eq!(art.download_url, "https://dl.example/paper.jar");

        let art = source(&server).resolve(&lookup, &Version::parse("1.9").unwrap()).unwrap();
        assert_eq!(art.download_url, "https://dl.example/source.zip");

        let err = source(&server)
            .resolve(&lookup, &Version::parse("3.0").unwrap())
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }

    #[test]
    fn test_empty_release_list() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/repos/acme/empty/releases")
            .match_query(Matcher::Any)
            .with_body("[]")
            .create();
        let config = HaulConfig::new("/tmp/p");
        let dep = Dependency::github("acme/empty");
        let err = source(&server).fetch_versions(&Lookup::new(&dep, &config)).unwrap_err();
        assert!(matches!(err, ResolveError::NoVersions));
    }
}
