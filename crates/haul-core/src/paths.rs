//! Where haul keeps things on disk, and file-name hygiene for artifacts.

use std::io;
use std::path::{Path, PathBuf};

use reqwest::Url;
use tempfile::NamedTempFile;

/// Name of the coordination directory inside the install directory.
pub const COORDINATION_DIR: &str = ".haul";
/// Advisory lock file guarding the coordination state.
pub const LOCK_FILE: &str = ".coordination.lock";
/// Caller registrations.
pub const REGISTRY_FILE: &str = "registry.json";
/// Resolved versions.
pub const LOCKFILE_FILE: &str = "haul.lock";

/// Default coordination directory: `<install_dir>/.haul`
pub fn coordination_dir(install_dir: &Path) -> PathBuf {
    install_dir.join(COORDINATION_DIR)
}

/// Lock file inside a coordination directory.
pub fn lock_path(coordination_dir: &Path) -> PathBuf {
    coordination_dir.join(LOCK_FILE)
}

/// Registry file inside a coordination directory.
pub fn registry_path(coordination_dir: &Path) -> PathBuf {
    coordination_dir.join(REGISTRY_FILE)
}

/// Lockfile inside a coordination directory.
pub fn lockfile_path(coordination_dir: &Path) -> PathBuf {
    coordination_dir.join(LOCKFILE_FILE)
}

/// Uniquely named `.haul-*.tmp` file in `target`'s directory.
///
/// Deleted on drop unless persisted over `target`, so concurrent writers of
/// the same target never share a temp file.
pub fn temp_file_beside(target: &Path) -> io::Result<NamedTempFile> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(".haul-")
        .suffix(".tmp")
        .tempfile_in(dir)
}

/// Last non-empty path segment of a URL, ignoring query and fragment.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .rev()
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Replace anything outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_file_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Whether a file name stays inside the directory it is joined to.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.contains('\0')
}
