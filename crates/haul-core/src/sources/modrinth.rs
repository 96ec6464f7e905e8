//! Multi-file registry keyed by slug or project id (`/v2`).

use std::collections::HashMap;

use haul_schema::{Checksum, Platform, SourceKind, Version};
use serde::Deserialize;

use super::{Lookup, ResolvedArtifact, Source, endpoint, parse_versions};
use crate::error::ResolveError;
use crate::http::HttpClient;

/// Multi-file registry addressed by project slug or id.
#[derive(Debug, Clone)]
pub struct ModrinthSource {
    http: HttpClient,
    base: String,
}

#[derive(Deserialize)]
struct ProjectVersion {
    version_number: Option<String>,
    #[serde(default)]
    files: Vec<VersionFile>,
}

#[derive(Debug, Deserialize)]
struct VersionFile {
    url: Option<String>,
    filename: Option<String>,
    #[serde(default)]
    hashes: HashMap<String, String>,
    #[serde(default)]
    primary: bool,
}

impl VersionFile {
    fn lower_name(&self) -> Option<String> {
        self.filename.as_deref().map(str::to_lowercase)
    }
}

impl ModrinthSource {
    /// Source rooted at the multi-file registry API `base`.
    pub fn new(http: HttpClient, base: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn list(&self, slug: &str, query: &[(&str, &str)]) -> Result<Vec<ProjectVersion>, ResolveError> {
        let url = endpoint(&self.base, &["project", slug, "version"], query)?;
        self.http.get_json(&url)
    }
}

/// Pick the file built for `platform` out of a multi-file version.
///
/// Order: sole file, first file naming a preferred marker, first file naming
/// no incompatible marker, the primary file, the first file.
fn select_file(files: &[VersionFile], platform: Platform) -> Option<&VersionFile> {
    if files.len() <= 1 {
        return files.first();
    }

    let names: Vec<Option<String>> = files.iter().map(VersionFile::lower_name).collect();
    let contains = |i: usize, marker: &str| names[i].as_deref().is_some_and(|n| n.contains(marker));

    for marker in platform.preferred_markers() {
        if let Some(i) = (0..files.len()).find(|&i| contains(i, marker)) {
            return Some(&files[i]);
        }
    }

    let avoid = platform.incompatible_markers();
    let compatible = (0..files.len())
        .filter(|&i| names[i].is_some())
        .find(|&i| !avoid.iter().any(|m| contains(i, m)));
    if let Some(i) = compatible {
        return Some(&files[i]);
    }

    files.iter().find(|f| f.primary).or(files.first())
}

impl Source for ModrinthSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Modrinth
    }

    fn fetch_versions(&self, lookup: &Lookup<'_>) -> Result<Vec<Version>, ResolveError> {
        let loaders = serde_json::to_string(lookup.platform.loaders()).unwrap_or_default();
        let game_versions = lookup
            .runtime_version
            .map(|rv| serde_json::to_string(&[rv]).unwrap_or_default());

        let mut query = vec![("loaders", loaders.as_str())];
        if let Some(gv) = game_versions.as_deref() {
            query.push(("game_versions", gv));
        }

        let listed = self.list(lookup.id(), &query)?;
        if listed.is_empty() {
            return Err(ResolveError::NoVersions);
        }
        Ok(parse_versions(
            listed.iter().filter_map(|v| v.version_number.as_deref()),
        ))
    }

    fn resolve(&self, lookup: &Lookup<'_>, version: &Version) -> Result<ResolvedArtifact, ResolveError> {
        let slug = lookup.id();
        let listed = self.list(slug, &[])?;
        let Some(matching) = listed
            .iter()
            .find(|v| v.version_number.as_deref() == Some(version.raw()))
        else {
            return Err(ResolveError::NotFound(format!("{slug} {version}")));
        };

        let file = select_file(&matching.files, lookup.platform)
            .ok_or_else(|| ResolveError::NotFound(format!("{slug} {version}: no files")))?;
        let (Some(url), Some(filename)) = (file.url.clone(), file.filename.clone()) else {
            return Err(ResolveError::NotFound(format!("{slug} {version}: incomplete file entry")));
        };
        let checksum = file.hashes.get("sha512").cloned().map(Checksum::sha512);

        Ok(ResolvedArtifact::new(
            lookup,
            version,
            url,
            checksum,
            Some(filename),
            format!("{slug}-{}.jar", version.raw()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HaulConfig;
    use crate::dependency::Dependency;
    use mockito::Matcher;

    fn file(name: &str, primary: bool) -> VersionFile {
        VersionFile {
            url: Some(format!("https://cdn.example.com/{name}")),
            filename: Some(name.to_string()),
            hashes: HashMap::new(),
            primary,
        }
    }

    fn picked(files: &[VersionFile], platform: Platform) -> &str {
        select_file(files, platform).and_then(|f| f.filename.as_deref()).unwrap()
    }

    #[test]
    fn test_select_file_by_platform() {
        let files = [
            file("LuckPerms-Bukkit.jar", true),
            file("LuckPerms-Velocity.jar", false),
            file("LuckPerms-Folia.jar", false),
        ];
        assert_eq!(picked(&files, Platform::Velocity), "LuckPerms-Velocity.jar");
        assert_eq!(picked(&files, Platform::Folia), "LuckPerms-Folia.jar");
        assert_eq!(picked(&files, Platform::Bukkit), "LuckPerms-Bukkit.jar");
        // no "paper" file: first one free of folia/velocity/bungee markers
        assert_eq!(picked(&files, Platform::Paper), "LuckPerms-Bukkit.jar");
    }

    #[test]
    fn test_select_file_falls_back_to_primary() {
        let files = [file("x-velocity.jar", false), file("x-bungee.jar", true)];
        assert_eq!(picked(&files, Platform::Spigot), "x-bungee.jar");
        let files = [file("x-velocity.jar", false), file("x-bungee.jar", false)];
        assert_eq!(picked(&files, Platform::Spigot), "x-velocity.jar");
        let single = [file("only-velocity.jar", false)];
        assert_eq!(picked(&single, Platform::Paper), "only-velocity.jar");
        assert!(select_file(&[], Platform::Paper).is_none());
    }

    const LISTING: &str = r#"[
        {"version_number":"5.4.0","files":[
            {"url":"https://cdn.example.com/a.jar","filename":"a.jar","hashes":{"sha512":"ff00"},"primary":true}]},
        {"version_number":"5.3.1","files":[]},
        {"version_number":"beta"}
    ]"#;

    #[test]
    fn test_fetch_versions_sends_loader_filter() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/project/luckperms/version")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("loaders".into(), r#"["velocity"]"#.into()),
                Matcher::UrlEncoded("game_versions".into(), r#"["1.21"]"#.into()),
            ]))
            .with_body(LISTING)
            .create();

        let http = HttpClient::new(&HaulConfig::new("/tmp/unused")).unwrap();
        let source = ModrinthSource::new(http, &server.url());
        let config = HaulConfig::new("/tmp/p")
            .with_platform(Platform::Velocity)
            .with_runtime_version("1.21");
        let dep = Dependency::modrinth("luckperms");
        let versions = source.fetch_versions(&Lookup::new(&dep, &config)).unwrap();
        assert_eq!(versions.len(), 2);
        mock.assert();
    }

    #[test]
    fn test_resolve_matches_version_number() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/project/luckperms/version")
            .match_query(Matcher::Any)
            .with_body(LISTING)
            .create();

        let http = HttpClient::new(&HaulConfig::new("/tmp/unused")).unwrap();
        let source = ModrinthSource::new(http, &server.url());
        let config = HaulConfig::new("/tmp/p");
        let dep = Dependency::modrinth("luckperms");
        let lookup = Lookup::new(&dep, &config);

        let art = source.resolve(&lookup, &Version::parse("5.4.0").unwrap()).unwrap();
        assert_eq!(art.download_url, "https://cdn.example.com/a.jar");
        assert_eq!(art.file_name, "a.jar");
        assert_eq!(art.checksum, Some(Checksum::sha512("ff00")));

        let err = source.resolve(&lookup, &Version::parse("5.3.1").unwrap()).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
        let err = source.resolve(&lookup, &Version::parse("9.9").unwrap()).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
    }
}
