//! Runtime configuration for a resolver.

use std::path::{Path, PathBuf};
use std::time::Duration;

use haul_schema::Platform;

use crate::paths;

/// How the coordination lock is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Wait until no other process holds the lock.
    #[default]
    Blocking,
    /// Give up immediately and run uncoordinated if the lock is busy.
    NonBlocking,
}

/// Base URLs of the remote catalogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Site root of the slug registry; the API lives under `/api/v1`.
    pub hangar: String,
    /// Base of the multi-file registry API.
    pub modrinth: String,
    /// Base of the numeric resource API.
    pub spiget: String,
    /// Base of the release repository API.
    pub github: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            hangar: "https://hangar.papermc.io".to_string(),
            modrinth: "https://api.modrinth.com/v2".to_string(),
            spiget: "https://api.spiget.org/v2".to_string(),
            github: "https://api.github.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every catalog at one base URL, e.g. a local mock server.
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            hangar: base.to_string(),
            modrinth: base.to_string(),
            spiget: base.to_string(),
            github: base.to_string(),
        }
    }
}

/// Settings shared by every dependency in a run.
#[derive(Debug, Clone)]
pub struct HaulConfig {
    /// Directory the artifacts are written to.
    pub install_dir: PathBuf,
    /// Directory holding the lock, registry and lockfile.
    pub coordination_dir: PathBuf,
    /// Sent with every request.
    pub user_agent: String,
    /// Limit on establishing a connection.
    pub connect_timeout: Duration,
    /// Limit on a metadata request.
    pub request_timeout: Duration,
    /// Limit on a whole artifact download.
    pub download_timeout: Duration,
    /// Platform substituted for [`Platform::Auto`].
    pub platform: Platform,
    /// Runtime version filter used when a dependency does not set its own.
    pub runtime_version: Option<String>,
    /// How the coordination lock is taken.
    pub lock_mode: LockMode,
    /// Bearer token for the release repository API.
    pub github_token: Option<String>,
    /// Catalog base URLs.
    pub endpoints: Endpoints,
}

impl HaulConfig {
    /// Defaults for installing into `install_dir`.
    ///
    /// The coordination directory is derived from the install directory.
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        let install_dir = install_dir.into();
        Self {
            coordination_dir: paths::coordination_dir(&install_dir),
            install_dir,
            user_agent: crate::USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(300),
            platform: Platform::Paper,
            runtime_version: None,
            lock_mode: LockMode::Blocking,
            github_token: None,
            endpoints: Endpoints::default(),
        }
    }

    /// Defaults overridden by `HAUL_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env(install_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(install_dir);

        if let Ok(dir) = std::env::var("HAUL_COORDINATION_DIR") {
            config.coordination_dir = PathBuf::from(dir);
        }
        if let Some(version) = non_empty_var("HAUL_RUNTIME_VERSION") {
            config.runtime_version = Some(version);
        }
        if let Ok(platform) = std::env::var("HAUL_PLATFORM") {
            match platform.parse() {
                Ok(p) => config.platform = p,
                Err(e) => tracing::warn!("Ignoring HAUL_PLATFORM: {e}"),
            }
        }
        if let Ok(mode) = std::env::var("HAUL_LOCK_MODE") {
            match mode.to_ascii_lowercase().as_str() {
                "blocking" => config.lock_mode = LockMode::Blocking,
                "nonblocking" | "non-blocking" | "try" => config.lock_mode = LockMode::NonBlocking,
                other => tracing::warn!("Ignoring HAUL_LOCK_MODE: unknown mode '{other}'"),
            }
        }
        if let Some(token) = non_empty_var("GITHUB_TOKEN") {
            config.github_token = Some(token);
        }

        config
    }

    /// Override the coordination directory.
    pub fn with_coordination_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.coordination_dir = dir.into();
        self
    }

    /// Set the host platform.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Set the default runtime version filter.
    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = Some(version.into());
        self
    }

    /// Set how the coordination lock is taken.
    pub fn with_lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    /// Authenticate release repository requests with `token`.
    pub fn with_github_token(mut self, token: impl Into<String>) -> Self {
        self.github_token = Some(token.into());
        self
    }

    /// Replace the catalog base URLs.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Where an artifact with this file name lives.
    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.install_dir.join(file_name)
    }

    /// Directory the artifacts are written to.
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HaulConfig::new("/srv/plugins");
        assert_eq!(config.coordination_dir, PathBuf::from("/srv/plugins/.haul"));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.download_timeout, Duration::from_secs(300));
        assert_eq!(config.platform, Platform::Paper);
        assert_eq!(config.lock_mode, LockMode::Blocking);
        assert!(config.user_agent.starts_with("haul/"));
    }

    #[test]
    fn test_endpoints_all_trims_slash() {
        let endpoints = Endpoints::all("http://127.0.0.1:1234/");
        assert_eq!(endpoints.github, "http://127.0.0.1:1234");
        assert_eq!(endpoints.hangar, endpoints.spiget);
    }

    #[test]
    fn test_artifact_path() {
        let config = HaulConfig::new("/srv/plugins").with_platform(Platform::Velocity);
        assert_eq!(
            config.artifact_path("a.jar"),
            PathBuf::from("/srv/plugins/a.jar")
        );
        assert_eq!(config.platform, Platform::Velocity);
    }
}
