//! Shared value types for haul: versions, constraints, checksums, platforms.
//!
//! Nothing in this crate touches the network or the filesystem.

pub mod asset_pattern;
pub mod constraint;
pub mod hash;
pub mod platform;
pub mod policy;
pub mod types;
pub mod version;

// Re-exports
pub use asset_pattern::AssetPattern;
pub use constraint::{Bound, ParseConstraintError, VersionConstraint};
pub use hash::{Checksum, ChecksumAlgorithm};
pub use platform::Platform;
pub use policy::{FailurePolicy, UpdatePolicy};
pub use types::{DependencyName, SourceKind};
pub use version::{ParseVersionError, Version};
