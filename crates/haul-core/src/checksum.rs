//! Streaming digests over files and download streams.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use haul_schema::{Checksum, ChecksumAlgorithm};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// Incremental hasher for any supported algorithm.
#[derive(Clone)]
pub enum ChecksumVerifier {
    /// SHA-256 state.
    Sha256(Sha256),
    /// SHA-512 state.
    Sha512(Sha512),
    /// SHA-1 state.
    Sha1(Sha1),
    /// MD5 state.
    Md5(Md5),
}

impl std::fmt::Debug for ChecksumVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ChecksumVerifier")
            .field(&self.algorithm())
            .finish()
    }
}

impl ChecksumVerifier {
    /// Fresh hasher for `algorithm`.
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            ChecksumAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
            ChecksumAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            ChecksumAlgorithm::Md5 => Self::Md5(Md5::new()),
        }
    }

    /// Algorithm this hasher computes.
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        match self {
            Self::Sha256(_) => ChecksumAlgorithm::Sha256,
            Self::Sha512(_) => ChecksumAlgorithm::Sha512,
            Self::Sha1(_) => ChecksumAlgorithm::Sha1,
            Self::Md5(_) => ChecksumAlgorithm::Md5,
        }
    }

    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Sha1(h) => h.update(data),
            Self::Md5(h) => h.update(data),
        }
    }

    /// Lowercase hex digest.
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Md5(h) => hex::encode(h.finalize()),
        }
    }

    /// Digest everything `reader` yields.
    pub fn digest_reader(algorithm: ChecksumAlgorithm, mut reader: impl Read) -> io::Result<String> {
        let mut hasher = Self::new(algorithm);
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize_hex())
    }

    /// Lower-case hex digest of a file on disk.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or read.
    pub fn digest_file(path: &Path, algorithm: ChecksumAlgorithm) -> io::Result<String> {
        Self::digest_reader(algorithm, File::open(path)?)
    }

    /// Whether the file at `path` has the expected digest.
    ///
    /// A missing file does not match.
    pub fn verify_file(path: &Path, expected: &Checksum) -> io::Result<bool> {
        match Self::digest_file(path, expected.algorithm) {
            Ok(actual) => Ok(expected.matches(&actual)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Write for ChecksumVerifier {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer that hashes everything passing through it.
#[derive(Debug)]
pub struct HashingWriter<W> {
    inner: W,
    hasher: Option<ChecksumVerifier>,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    /// `algorithm = None` just counts bytes.
    pub fn new(inner: W, algorithm: Option<ChecksumAlgorithm>) -> Self {
        Self {
            inner,
            hasher: algorithm.map(ChecksumVerifier::new),
            written: 0,
        }
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Return the inner writer and the hex digest, if hashing.
    pub fn finish(self) -> (W, Option<String>) {
        (self.inner, self.hasher.map(ChecksumVerifier::finalize_hex))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if let Some(hasher) = &mut self.hasher {
            hasher.update(&buf[..n]);
        }
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
