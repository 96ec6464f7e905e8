//! Artifact download with streaming checksum verification.
//!
//! Bytes are written to a uniquely named temp file next to the target while
//! being hashed; it is renamed over the target only once the digest matches.

use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use haul_schema::{Checksum, DependencyName, Version};
use tempfile::NamedTempFile;

use crate::checksum::HashingWriter;
use crate::error::ResolveError;
use crate::http::HttpClient;
use crate::paths;
use crate::reporter::Reporter;

const CHUNK: usize = 64 * 1024;

/// Request for a download operation
pub struct DownloadRequest<'a> {
    /// Client to fetch with.
    pub http: &'a HttpClient,
    /// Dependency being fetched, for progress events.
    pub name: &'a DependencyName,
    /// Version being fetched, for progress events.
    pub version: &'a Version,
    /// Where to fetch from.
    pub url: &'a str,
    /// Final location; replaced only after verification.
    pub dest: &'a Path,
    /// Digest the bytes must match.
    pub checksum: Option<&'a Checksum>,
    /// Receives progress.
    pub reporter: &'a dyn Reporter,
}

impl std::fmt::Debug for DownloadRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("name", self.name)
            .field("version", &self.version.raw())
            .field("url", &self.url)
            .field("dest", &self.dest)
            .field("checksum", &self.checksum)
            .finish_non_exhaustive()
    }
}

/// A file that landed at its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    /// Where the file is now.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
    /// Hex digest under the requested algorithm, if a checksum was given.
    pub digest: Option<String>,
}

impl DownloadRequest<'_> {
    /// Fetch, verify and move the artifact into place.
    ///
    /// The temp file is removed when anything fails before the rename.
    pub fn execute(self) -> Result<Downloaded, ResolveError> {
        let mut tmp = paths::temp_file_beside(self.dest).map_err(|e| ResolveError::io(self.dest, e))?;

        let (bytes, digest) = self.fetch_to(&mut tmp)?;

        tmp.persist(self.dest)
            .map_err(|e| ResolveError::io(self.dest, e.error))?;
        Ok(Downloaded {
            path: self.dest.to_path_buf(),
            bytes,
            digest,
        })
    }

    fn fetch_to(&self, tmp: &mut NamedTempFile) -> Result<(u64, Option<String>), ResolveError> {
        let tmp_path = tmp.path().to_path_buf();
        let mut response = self.http.get_stream(self.url)?;
        let total = response.content_length();

        let mut writer = HashingWriter::new(BufWriter::new(&mut *tmp), self.checksum.map(|c| c.algorithm));

        self.reporter.downloading(self.name, self.version, 0, total);
        let mut buf = vec![0u8; CHUNK];
        loop {
            let n = response.read(&mut buf).map_err(|e| ResolveError::io(&tmp_path, e))?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).map_err(|e| ResolveError::io(&tmp_path, e))?;
            self.reporter
                .downloading(self.name, self.version, writer.written(), total);
        }

        let bytes = writer.written();
        let (inner, digest) = writer.finish();
        inner
            .into_inner()
            .map_err(|e| ResolveError::io(&tmp_path, e.into_error()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| ResolveError::io(&tmp_path, e))?;

        match (self.checksum, digest.as_deref()) {
            (Some(expected), Some(actual)) if !expected.matches(actual) => {
                return Err(ResolveError::ChecksumMismatch {
                    algorithm: expected.algorithm,
                    expected: expected.value.clone(),
                    actual: actual.to_string(),
                });
            }
            _ => {}
        }
        Ok((bytes, digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::checksum::ChecksumVerifier;
    use crate::config::HaulConfig;
    use crate::reporter::NullReporter;
    use haul_schema::ChecksumAlgorithm;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_verified_download_lands_alone() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/a.jar").with_body("payload").create();
        let dir = tempfile::tempdir().unwrap();
        let http = HttpClient::new(&HaulConfig::new(dir.path())).unwrap();
        let name = DependencyName::from("A");
        let version = Version::parse("1.0").unwrap();
        let sha = ChecksumVerifier::digest_reader(ChecksumAlgorithm::Sha256, &b"payload"[..]).unwrap();
        let checksum = Checksum::sha256(sha.clone());
        let dest = dir.path().join("A-1.0.jar");

        let downloaded = DownloadRequest {
            http: &http,
            name: &name,
            version: &version,
            url: &format!("{}/a.jar", server.url()),
            dest: &dest,
            checksum: Some(&checksum),
            reporter: &NullReporter,
        }
        .execute()
        .unwrap();

        assert_eq!(downloaded.bytes, 7);
        assert_eq!(downloaded.digest, Some(sha));
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
        assert_eq!(entries(dir.path()), ["A-1.0.jar"]);
    }

    #[test]
    fn test_concurrent_writers_use_distinct_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("A-1.0.jar");
        let other_writer = paths::temp_file_beside(&dest).unwrap();
        let mut server = mockito::Server::new();
        server.mock("GET", "/a.jar").with_body("mine").create();
        let http = HttpClient::new(&HaulConfig::new(dir.path())).unwrap();
        let name = DependencyName::from("A");
        let version = Version::parse("1.0").unwrap();

        DownloadRequest {
            http: &http,
            name: &name,
            version: &version,
            url: &format!("{}/a.jar", server.url()),
            dest: &dest,
            checksum: None,
            reporter: &NullReporter,
        }
        .execute()
        .unwrap();

        assert!(other_writer.path().exists());
        assert_eq!(fs::read(&dest).unwrap(), b"mine");
    }

    #[test]
    fn test_mismatch_removes_temp_file() {
        let mut server = mockito::Server::new();
        server.mock("GET", "/a.jar").with_body("tampered").create();
        let dir = tempfile::tempdir().unwrap();
        let http = HttpClient::new(&HaulConfig::new(dir.path())).unwrap();
        let name = DependencyName::from("A");
        let version = Version::parse("1.0").unwrap();
        let checksum = Checksum::sha256("00");
        let dest = dir.path().join("A-1.0.jar");

        let err = DownloadRequest {
            http: &http,
            name: &name,
            version: &version,
            url: &format!("{}/a.jar", server.url()),
            dest: &dest,
            checksum: Some(&checksum),
            reporter: &NullReporter,
        }
        .execute()
        .unwrap_err();

        assert!(matches!(err, ResolveError::ChecksumMismatch { .. }));
        assert!(entries(dir.path()).is_empty());
    }
}
