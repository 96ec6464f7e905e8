//! Resolve, download and verify plugin dependencies from Hangar, Modrinth,
//! Spiget, GitHub releases and plain URLs.
//!
//! Callers sharing an install directory coordinate through a file lock, a
//! registry of everyone's constraints and a lockfile of what was installed.

pub mod checksum;
pub mod config;
pub mod coordination;
pub mod dependency;
pub mod error;
pub mod http;
pub mod io;
pub mod manifest;
pub mod outcome;
pub mod paths;
pub mod reporter;
pub mod resolver;
pub mod session;
pub mod sources;

pub use checksum::ChecksumVerifier;
pub use config::{Endpoints, HaulConfig, LockMode};
pub use coordination::{ConstraintConflict, Coordinator, LockEntry, Lockfile, Registry};
pub use dependency::Dependency;
pub use error::{HaulError, ResolveError};
pub use http::HttpClient;
pub use manifest::Manifest;
pub use outcome::{Failed, Installed, ResolutionReport, Skipped};
pub use reporter::{NullReporter, Reporter};
pub use resolver::Resolver;
pub use session::{HostPlugin, Session};
pub use sources::{Lookup, ResolvedArtifact, Source, SourceSet};

pub use haul_schema::{
    AssetPattern, Checksum, ChecksumAlgorithm, DependencyName, FailurePolicy, Platform, SourceKind, UpdatePolicy,
    Version, VersionConstraint,
};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("haul/", env!("CARGO_PKG_VERSION"));
