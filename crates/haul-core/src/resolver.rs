//! Per-dependency resolution.
//!
//! For one caller's batch, under the coordination lock:
//!
//! 1. Effective constraint: the registry's merge over every caller, else the
//!    dependency's own, else latest.
//! 2. Lockfile fast path: a locked version that still satisfies the constraint
//!    and is still on disk needs no network at all.
//! 3. Source dispatch, version listing and selection.
//! 4. Artifact resolution and the existing-file check.
//! 5. Download with checksum verification, then the lockfile update.
//!
//! Errors from any step become a report entry according to the dependency's
//! [`FailurePolicy`]; they never stop the rest of the batch.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use haul_schema::{DependencyName, FailurePolicy, Version, VersionConstraint};

use crate::checksum::ChecksumVerifier;
use crate::config::HaulConfig;
use crate::coordination::Coordinator;
use crate::dependency::Dependency;
use crate::error::{HaulError, ResolveError};
use crate::http::HttpClient;
use crate::io::DownloadRequest;
use crate::outcome::ResolutionReport;
use crate::paths;
use crate::reporter::{NullReporter, Reporter};
use crate::sources::{Lookup, ResolvedArtifact, SourceSet};

/// How a dependency ended up on disk.
enum Resolved {
    Downloaded(Version, PathBuf),
    Existing(Version, PathBuf),
}

/// Drives resolution runs against one configuration and source set.
pub struct Resolver {
    config: HaulConfig,
    http: HttpClient,
    sources: SourceSet,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// A resolver talking to the catalogs configured in `config`.
    pub fn new(config: HaulConfig) -> Result<Self, HaulError> {
        let http = HttpClient::new(&config)?;
        let sources = SourceSet::standard(&http, &config);
        Ok(Self::with_sources(config, http, sources))
    }

    /// A resolver with an explicit source set.
    pub fn with_sources(config: HaulConfig, http: HttpClient, sources: SourceSet) -> Self {
        Self {
            config,
            http,
            sources,
            reporter: Arc::new(NullReporter),
        }
    }

    /// Send progress events to `reporter`.
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &HaulConfig {
        &self.config
    }

    /// Sources in use.
    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    /// Resolve `dependencies` for `caller` into the configured install directory.
    pub fn resolve(&self, caller: &str, dependencies: &[Dependency]) -> Result<ResolutionReport, HaulError> {
        self.resolve_in(
            caller,
            dependencies,
            &self.config.install_dir,
            &self.config.coordination_dir,
        )
    }

    /// Resolve `dependencies` for `caller` into `install_dir`, coordinating
    /// through `coordination_dir`.
    ///
    /// Only an unreachable install or coordination directory fails the call;
    /// everything else is reported per dependency.
    pub fn resolve_in(
        &self,
        caller: &str,
        dependencies: &[Dependency],
        install_dir: &Path,
        coordination_dir: &Path,
    ) -> Result<ResolutionReport, HaulError> {
        fs::create_dir_all(install_dir).map_err(|source| HaulError::InstallDir {
            path: install_dir.to_path_buf(),
            source,
        })?;

        let mut seen = HashSet::new();
        let batch: Vec<Dependency> = dependencies
            .iter()
            .filter(|d| {
                let fresh = seen.insert(d.key());
                if !fresh {
                    tracing::debug!(caller, dependency = %d, "Ignoring duplicate dependency");
                }
                fresh
            })
            .cloned()
            .collect();

        let mut coord = Coordinator::open(coordination_dir, self.config.lock_mode)?;
        coord.registry.register(caller, &batch);

        let mut report = ResolutionReport::new();
        for dep in &batch {
            self.process(&mut coord, install_dir, dep, &mut report);
        }

        coord.persist()?;
        if let Err(e) = coord.release() {
            tracing::warn!(caller, "Failed to release coordination lock: {e}");
        }

        tracing::info!(
            caller,
            downloaded = report.downloaded.len(),
            existing = report.existing.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Resolution finished"
        );
        Ok(report)
    }

    fn process(&self, coord: &mut Coordinator, install_dir: &Path, dep: &Dependency, report: &mut ResolutionReport) {
        let constraint = self.effective_constraint(coord, dep, report);
        tracing::debug!(dependency = %dep.name, %constraint, "Resolving");
        self.reporter.resolving(&dep.name, &constraint);

        match self.resolve_dependency(coord, install_dir, dep, &constraint) {
            Ok(Resolved::Downloaded(version, path)) => {
                self.reporter.done(&dep.name, &version, "downloaded");
                report.push_downloaded(dep.name.clone(), version, path);
            }
            Ok(Resolved::Existing(version, path)) => {
                self.reporter.done(&dep.name, &version, "existing");
                report.push_existing(dep.name.clone(), version, path);
            }
            Err(e) => self.handle_failure(dep, &e, report),
        }
    }

    fn effective_constraint(
        &self,
        coord: &Coordinator,
        dep: &Dependency,
        report: &mut ResolutionReport,
    ) -> VersionConstraint {
        match coord.registry.merged_constraint(&dep.name) {
            Some(merged) => {
                for conflict in merged.conflicts {
                    tracing::warn!(dependency = %dep.name, "Incompatible constraints: {conflict}");
                    self.reporter.warning(&conflict.to_string());
                    report.conflicts.push(conflict);
                }
                merged.constraint
            }
            None => dep.constraint.clone().unwrap_or_default(),
        }
    }

    fn resolve_dependency(
        &self,
        coord: &mut Coordinator,
        install_dir: &Path,
        dep: &Dependency,
        constraint: &VersionConstraint,
    ) -> Result<Resolved, ResolveError> {
        dep.validate()?;

        if let Some(hit) = fast_path(coord, install_dir, &dep.name, constraint) {
            return Ok(hit);
        }

        let source = self
            .sources
            .get(dep.source)
            .ok_or(ResolveError::UnknownSource(dep.source))?;
        let lookup = Lookup::new(dep, &self.config);

        tracing::debug!(dependency = %dep.name, source = %dep.source, "Fetching versions");
        let versions = source.fetch_versions(&lookup)?;
        if versions.is_empty() {
            return Err(ResolveError::NoVersions);
        }
        let version = self.select(dep, constraint, &versions)?;
        tracing::debug!(dependency = %dep.name, %version, "Selected version");

        let artifact = source.resolve(&lookup, &version)?;
        if !paths::is_plain_file_name(&artifact.file_name) {
            return Err(ResolveError::InvalidDescriptor(format!(
                "refusing to write outside the install directory: '{}'",
                artifact.file_name
            )));
        }
        let target = install_dir.join(&artifact.file_name);

        if target.exists() {
            match &artifact.checksum {
                Some(expected) => {
                    let valid = ChecksumVerifier::verify_file(&target, expected)
                        .map_err(|e| ResolveError::io(&target, e))?;
                    if valid {
                        tracing::debug!(dependency = %dep.name, %version, "Already downloaded");
                        coord.lockfile.update(&artifact);
                        return Ok(Resolved::Existing(version, target));
                    }
                    tracing::warn!(
                        dependency = %dep.name,
                        path = %target.display(),
                        "Existing file fails checksum, downloading again"
                    );
                    fs::remove_file(&target).map_err(|e| ResolveError::io(&target, e))?;
                }
                None => {
                    tracing::debug!(dependency = %dep.name, %version, "Already downloaded (no checksum)");
                    coord.lockfile.update(&artifact);
                    return Ok(Resolved::Existing(version, target));
                }
            }
        }

        self.download(&artifact, &target)?;
        coord.lockfile.update(&artifact);
        Ok(Resolved::Downloaded(version, target))
    }

    /// Best candidate under `constraint`, or the newest one when the
    /// dependency asked for that fallback.
    fn select(
        &self,
        dep: &Dependency,
        constraint: &VersionConstraint,
        versions: &[Version],
    ) -> Result<Version, ResolveError> {
        if let Some(best) = constraint.select_best(versions) {
            return Ok(best.clone());
        }
        if dep.failure_policy != FailurePolicy::WarnUseLatest {
            return Err(ResolveError::Unsatisfiable(constraint.clone()));
        }
        let newest = versions.iter().max().ok_or(ResolveError::NoVersions)?;
        let msg = format!("{}: no version satisfies {constraint}, using newest {newest}", dep.name);
        tracing::warn!(dependency = %dep.name, "{msg}");
        self.reporter.warning(&msg);
        Ok(newest.clone())
    }

    fn download(&self, artifact: &ResolvedArtifact, target: &Path) -> Result<(), ResolveError> {
        tracing::info!(
            dependency = %artifact.name,
            version = %artifact.version,
            url = %artifact.download_url,
            "Downloading"
        );
        let downloaded = DownloadRequest {
            http: &self.http,
            name: &artifact.name,
            version: &artifact.version,
            url: &artifact.download_url,
            dest: target,
            checksum: artifact.checksum.as_ref(),
            reporter: self.reporter.as_ref(),
        }
        .execute()?;
        tracing::debug!(
            dependency = %artifact.name,
            bytes = downloaded.bytes,
            path = %downloaded.path.display(),
            "Download complete"
        );
        Ok(())
    }

    fn handle_failure(&self, dep: &Dependency, error: &ResolveError, report: &mut ResolutionReport) {
        let message = error.to_string();
        match dep.failure_policy {
            FailurePolicy::Fail => {
                tracing::error!(dependency = %dep.name, "Failed to resolve: {message}");
                self.reporter.failed(&dep.name, &message);
                report.push_failed(dep.name.clone(), message, FailurePolicy::Fail);
            }
            FailurePolicy::WarnUseLatest => {
                tracing::warn!(dependency = %dep.name, "Failed to resolve: {message}");
                self.reporter.failed(&dep.name, &message);
                report.push_failed(dep.name.clone(), message, FailurePolicy::WarnUseLatest);
            }
            FailurePolicy::WarnSkip => {
                tracing::warn!(dependency = %dep.name, "Skipping: {message}");
                self.reporter.skipped(&dep.name, &message);
                report.push_skipped(dep.name.clone(), message);
            }
        }
    }
}

/// A locked version that still satisfies `constraint` and is still on disk.
fn fast_path(
    coord: &Coordinator,
    install_dir: &Path,
    name: &DependencyName,
    constraint: &VersionConstraint,
) -> Option<Resolved> {
    let entry = coord.lockfile.entry(name)?;
    let version = entry.version()?;
    if !constraint.is_satisfied_by(&version) || !paths::is_plain_file_name(&entry.file_name) {
        return None;
    }
    let path = install_dir.join(&entry.file_name);
    if !path.is_file() {
        return None;
    }
    tracing::debug!(dependency = %name, %version, "Locked version is current");
    Some(Resolved::Existing(version, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockMode;
    use crate::sources::Source;
    use haul_schema::{Checksum, SourceKind};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory catalog that counts how often it is asked.
    #[derive(Debug)]
    struct Catalog {
        versions: Vec<&'static str>,
        url: String,
        checksum: Option<Checksum>,
        calls: Arc<AtomicUsize>,
    }

    impl Source for Catalog {
        fn kind(&self) -> SourceKind {
            SourceKind::Hangar
        }

        fn fetch_versions(&self, _: &Lookup<'_>) -> Result<Vec<Version>, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.versions.iter().map(|v| Version::parse(v).unwrap()).collect())
        }

        fn resolve(&self, lookup: &Lookup<'_>, version: &Version) -> Result<ResolvedArtifact, ResolveError> {
            Ok(ResolvedArtifact::new(
                lookup,
                version,
                self.url.clone(),
                self.checksum.clone(),
                None,
                format!("{}-{}.jar", lookup.id(), version.raw()),
            ))
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl Reporter for Recording {
        fn resolving(&self, name: &DependencyName, _: &VersionConstraint) {
            self.0.lock().unwrap().push(format!("resolving {name}"));
        }
        fn downloading(&self, _: &DependencyName, _: &Version, _: u64, _: Option<u64>) {}
        fn done(&self, name: &DependencyName, version: &Version, detail: &str) {
            self.0.lock().unwrap().push(format!("{detail} {name} {version}"));
        }
        fn skipped(&self, name: &DependencyName, _: &str) {
            self.0.lock().unwrap().push(format!("skipped {name}"));
        }
        fn failed(&self, name: &DependencyName, _: &str) {
            self.0.lock().unwrap().push(format!("failed {name}"));
        }
        fn warning(&self, _: &str) {}
    }

    fn resolver(dir: &Path, catalog: Catalog) -> Resolver {
        let config = HaulConfig::new(dir).with_lock_mode(LockMode::Blocking);
        let http = HttpClient::new(&config).unwrap();
        Resolver::with_sources(config, http, SourceSet::new().with(catalog))
    }

    fn catalog(versions: Vec<&'static str>, url: String) -> (Catalog, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let catalog = Catalog {
            versions,
            url,
            checksum: None,
            calls: calls.clone(),
        };
        (catalog, calls)
    }

    #[test]
    fn test_download_then_fast_path() {
        let mut server = mockito::Server::new();
        let download = server.mock("GET", "/a.jar").with_body("jar-bytes").expect(1).create();
        let dir = tempfile::tempdir().unwrap();
        let (catalog, calls) = catalog(vec!["1.0", "1.2", "2.0"], format!("{}/a.jar", server.url()));
        let resolver = resolver(dir.path(), catalog);

        let dep = Dependency::hangar("Lib").min_version(Version::parse("1.0").unwrap());
        let report = resolver.resolve("Host", std::slice::from_ref(&dep)).unwrap();
        assert_eq!(report.downloaded.len(), 1);
        assert_eq!(report.downloaded[0].version.raw(), "2.0");
        assert_eq!(fs::read(dir.path().join("Lib-2.0.jar")).unwrap(), b"jar-bytes");

        let report = resolver.resolve("Host", &[dep]).unwrap();
        assert_eq!(report.existing.len(), 1);
        assert!(!report.requires_restart());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        download.assert();
    }

    #[test]
    fn test_unknown_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, _) = catalog(vec!["1.0"], "http://127.0.0.1:9/x.jar".into());
        let resolver = resolver(dir.path(), catalog);

        let report = resolver
            .resolve("Host", &[Dependency::modrinth("other")])
            .unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("modrinth"));
    }

    #[test]
    fn test_failure_policies() {
        let dir = tempfile::tempdir().unwrap();
        let (catalog, _) = catalog(vec!["1.0", "1.5"], "http://127.0.0.1:9/x.jar".into());
        let events = Arc::new(Recording::default());
        let resolver = resolver(dir.path(), catalog).with_reporter(events.clone());
        let too_new = || Dependency::hangar("Lib").min_version(Version::parse("3.0").unwrap());

        let report = resolver
            .resolve("Host", &[too_new().on_failure(FailurePolicy::WarnSkip)])
            .unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert!(report.failed.is_empty());
        assert!(report.is_success());

        let report = resolver.resolve("Host", &[too_new()]).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].policy, FailurePolicy::Fail);
        assert!(report.failed[0].error.contains("No version satisfies"));

        let events = events.0.lock().unwrap();
        assert_eq!(*events, ["resolving Lib", "skipped Lib", "resolving Lib", "failed Lib"]);
    }

    #[test]
    fn test_use_latest_fallback() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/x.jar").with_body("x").create();
        let dir = tempfile::tempdir().unwrap();
        let (catalog, _) = catalog(vec!["1.0", "1.5"], format!("{}/x.jar", server.url()));
        let resolver = resolver(dir.path(), catalog);

        let dep = Dependency::hangar("Lib")
            .min_version(Version::parse("3.0").unwrap())
            .on_failure(FailurePolicy::WarnUseLatest);
        let report = resolver.resolve("Host", &[dep]).unwrap();
        assert_eq!(report.downloaded.len(), 1);
        assert_eq!(report.downloaded[0].version.raw(), "1.5");
    }

    #[test]
    fn test_duplicates_resolved_once() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/x.jar").with_body("x").create();
        let dir = tempfile::tempdir().unwrap();
        let (catalog, calls) = catalog(vec!["1.0"], format!("{}/x.jar", server.url()));
        let resolver = resolver(dir.path(), catalog);

        let report = resolver
            .resolve("Host", &[Dependency::hangar("Lib"), Dependency::hangar("Lib")])
            .unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
