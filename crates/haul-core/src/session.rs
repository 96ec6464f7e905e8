//! Caller-facing entry point: register a plugin's dependencies, resolve them,
//! ask whether the plugin is ready.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dependency::Dependency;
use crate::error::HaulError;
use crate::outcome::ResolutionReport;
use crate::paths;
use crate::resolver::Resolver;

/// What the core needs to know about a host plugin.
pub trait HostPlugin {
    /// Caller identity used in the registry.
    fn name(&self) -> &str;

    /// Directory the plugin's dependencies are installed into.
    fn install_directory(&self) -> PathBuf;
}

/// Registrations and readiness for every caller sharing one resolver.
#[derive(Debug)]
pub struct Session {
    resolver: Resolver,
    registrations: HashMap<String, Vec<Dependency>>,
    ready: HashMap<String, bool>,
}

impl Session {
    /// Session with no registrations.
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            registrations: HashMap::new(),
            ready: HashMap::new(),
        }
    }

    /// The shared resolver.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Replace `caller`'s dependency list.
    pub fn register(&mut self, caller: impl Into<String>, dependencies: Vec<Dependency>) {
        let caller = caller.into();
        tracing::debug!(caller = %caller, count = dependencies.len(), "Registered dependencies");
        self.ready.remove(&caller);
        self.registrations.insert(caller, dependencies);
    }

    /// [`Session::register`] under the host's name.
    pub fn register_host(&mut self, host: &dyn HostPlugin, dependencies: Vec<Dependency>) {
        self.register(host.name(), dependencies);
    }

    /// What `caller` registered, if anything.
    pub fn dependencies(&self, caller: &str) -> Option<&[Dependency]> {
        self.registrations.get(caller).map(Vec::as_slice)
    }

    /// Resolve everything `caller` registered into `install_dir`.
    ///
    /// The coordination directory is the configured one when `install_dir` is
    /// the configured install directory, `<install_dir>/.haul` otherwise.
    pub fn resolve(&mut self, caller: &str, install_dir: &Path) -> Result<ResolutionReport, HaulError> {
        let dependencies = self
            .registrations
            .get(caller)
            .ok_or_else(|| HaulError::NotRegistered(caller.to_string()))?;

        let config = self.resolver.config();
        let coordination_dir = if install_dir == config.install_dir {
            config.coordination_dir.clone()
        } else {
            paths::coordination_dir(install_dir)
        };

        let report = self
            .resolver
            .resolve_in(caller, dependencies, install_dir, &coordination_dir)?;
        self.ready.insert(caller.to_string(), report.is_success());
        Ok(report)
    }

    /// Resolve a host's registrations into its own install directory.
    pub fn resolve_host(&mut self, host: &dyn HostPlugin) -> Result<ResolutionReport, HaulError> {
        self.resolve(host.name(), &host.install_directory())
    }

    /// Whether the last resolution for `caller` had no failures.
    pub fn is_ready(&self, caller: &str) -> bool {
        self.ready.get(caller).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HaulConfig;
    use crate::http::HttpClient;
    use crate::sources::{SourceSet, UrlSource};

    struct Plugin {
        dir: PathBuf,
    }

    impl HostPlugin for Plugin {
        fn name(&self) -> &str {
            "Demo"
        }

        fn install_directory(&self) -> PathBuf {
            self.dir.clone()
        }
    }

    fn session(dir: &Path) -> Session {
        let config = HaulConfig::new(dir);
        let http = HttpClient::new(&config).unwrap();
        Session::new(Resolver::with_sources(config, http, SourceSet::new().with(UrlSource)))
    }

    #[test]
    fn test_unregistered_caller() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(dir.path());
        let err = session.resolve("Nobody", dir.path()).unwrap_err();
        assert!(matches!(err, HaulError::NotRegistered(_)));
        assert!(!session.is_ready("Nobody"));
    }

    #[test]
    fn test_host_plugin_readiness() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/lib.jar").with_body("lib").create();
        let dir = tempfile::tempdir().unwrap();
        let plugin = Plugin {
            dir: dir.path().join("Demo").join("libs"),
        };
        let mut session = session(dir.path());

        session.register_host(&plugin, vec![Dependency::url(format!("{}/lib.jar", server.url()))]);
        assert!(!session.is_ready("Demo"));
        let report = session.resolve_host(&plugin).unwrap();
        assert_eq!(report.downloaded.len(), 1);
        assert!(session.is_ready("Demo"));
        assert!(plugin.dir.join("lib.jar").exists());
        assert!(paths::registry_path(&paths::coordination_dir(&plugin.dir)).exists());

        session.register("Demo", vec![Dependency::url("https://127.0.0.1:9/missing.jar")]);
        assert!(!session.is_ready("Demo"));
        let report = session.resolve_host(&plugin).unwrap();
        assert!(!report.is_success());
        assert!(!session.is_ready("Demo"));
    }
}
