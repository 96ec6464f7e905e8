//! Error types for dependency resolution.
//!
//! [`ResolveError`] covers everything that can go wrong for a single
//! dependency; the resolver turns it into a report entry. [`HaulError`] is
//! reserved for failures that make the whole batch impossible.

use std::path::PathBuf;

use haul_schema::{ChecksumAlgorithm, SourceKind, VersionConstraint};
use thiserror::Error;

/// Failure resolving, downloading or verifying one dependency.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The descriptor is incomplete or contradicts itself.
    #[error("Invalid dependency: {0}")]
    InvalidDescriptor(String),

    /// No source of this kind is configured.
    #[error("No source available for '{0}'")]
    UnknownSource(SourceKind),

    /// The remote catalog has no such project.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The project exists but lists no usable versions.
    #[error("No versions found")]
    NoVersions,

    /// Versions exist, but none satisfies the constraint.
    #[error("No version satisfies constraint: {0}")]
    Unsatisfiable(VersionConstraint),

    /// The request never produced a response.
    #[error("Request to {url} failed: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status code returned.
        status: u16,
    },

    /// The response body did not decode.
    #[error("Unexpected response from {url}: {source}")]
    Json {
        /// Requested URL.
        url: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// The downloaded bytes do not match the published digest.
    #[error("Checksum verification failed ({algorithm}): expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Algorithm the expected value uses.
        algorithm: ChecksumAlgorithm,
        /// Published digest.
        expected: String,
        /// Digest of the downloaded bytes.
        actual: String,
    },

    /// Local filesystem failure.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ResolveError {
    /// [`ResolveError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Failure that aborts a whole resolution run.
#[derive(Error, Debug)]
pub enum HaulError {
    /// The shared coordination directory could not be created.
    #[error("Failed to create coordination directory {}: {source}", path.display())]
    CoordinationDir {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The install directory could not be created.
    #[error("Failed to create install directory {}: {source}", path.display())]
    InstallDir {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The coordination lock could not be taken.
    #[error("Failed to acquire coordination lock {}: {source}", path.display())]
    Lock {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The registry or lockfile could not be written.
    #[error("Failed to persist {}: {source}", path.display())]
    Persist {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// `resolve_host` was called for a plugin that never registered.
    #[error("No dependencies registered for '{0}'")]
    NotRegistered(String),
}
