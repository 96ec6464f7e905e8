//! Checksum algorithms and expected digests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Digest algorithm of a published checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChecksumAlgorithm {
    #[serde(rename = "SHA256")]
    /// SHA-256, the default for sources that publish a single hash.
    Sha256,
    #[serde(rename = "SHA512")]
    /// SHA-512.
    Sha512,
    #[serde(rename = "SHA1")]
    /// SHA-1, kept for older registries.
    Sha1,
    #[serde(rename = "MD5")]
    /// MD5, kept for older registries.
    Md5,
}

impl ChecksumAlgorithm {
    /// Name used in the lockfile's `checksumType` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sha256 => "SHA256",
            ChecksumAlgorithm::Sha512 => "SHA512",
            ChecksumAlgorithm::Sha1 => "SHA1",
            ChecksumAlgorithm::Md5 => "MD5",
        }
    }

    /// Length of the hex-encoded digest.
    pub fn hex_len(&self) -> usize {
        match self {
            ChecksumAlgorithm::Sha256 => 64,
            ChecksumAlgorithm::Sha512 => 128,
            ChecksumAlgorithm::Sha1 => 40,
            ChecksumAlgorithm::Md5 => 32,
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "").as_str() {
            "SHA256" => Ok(ChecksumAlgorithm::Sha256),
            "SHA512" => Ok(ChecksumAlgorithm::Sha512),
            "SHA1" => Ok(ChecksumAlgorithm::Sha1),
            "MD5" => Ok(ChecksumAlgorithm::Md5),
            _ => Err(format!("Unknown checksum algorithm: {s}")),
        }
    }
}

/// An expected digest: algorithm plus hex string.
///
/// The hex value is stored as published; comparisons ignore case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    /// Digest the value was computed with.
    pub algorithm: ChecksumAlgorithm,
    /// Hex digest, as published.
    pub value: String,
}

impl Checksum {
    /// Checksum without validation.
    pub fn new(algorithm: ChecksumAlgorithm, value: impl Into<String>) -> Self {
        Self {
            algorithm,
            value: value.into(),
        }
    }

    /// SHA-256 checksum.
    pub fn sha256(value: impl Into<String>) -> Self {
        Self::new(ChecksumAlgorithm::Sha256, value)
    }

    /// SHA-512 checksum.
    pub fn sha512(value: impl Into<String>) -> Self {
        Self::new(ChecksumAlgorithm::Sha512, value)
    }

    /// Validate the hex string against the algorithm's digest length.
    ///
    /// # Errors
    ///
    /// Returns an error string if the value has the wrong length or is not hex.
    pub fn validated(algorithm: ChecksumAlgorithm, value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value.len() == algorithm.hex_len() && value.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self::new(algorithm, value))
        } else {
            Err(format!(
                "Invalid {algorithm} checksum: expected {} hex chars, got '{value}'",
                algorithm.hex_len()
            ))
        }
    }

    /// Case-insensitive comparison against a computed hex digest.
    pub fn matches(&self, actual_hex: &str) -> bool {
        self.value.eq_ignore_ascii_case(actual_hex)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str().to_ascii_lowercase(), self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_names() {
        assert_eq!("sha-256".parse::<ChecksumAlgorithm>(), Ok(ChecksumAlgorithm::Sha256));
        assert_eq!("MD5".parse::<ChecksumAlgorithm>(), Ok(ChecksumAlgorithm::Md5));
        assert!("crc32".parse::<ChecksumAlgorithm>().is_err());
        assert_eq!(ChecksumAlgorithm::Sha512.to_string(), "SHA512");
    }

    #[test]
    fn test_matches_ignores_case() {
        let sum = Checksum::sha256("ABCDEF");
        assert!(sum.matches("abcdef"));
        assert!(!sum.matches("abcdee"));
    }

    #[test]
    fn test_validated() {
        let hex = "a".repeat(40);
        assert!(Checksum::validated(ChecksumAlgorithm::Sha1, &hex).is_ok());
        assert!(Checksum::validated(ChecksumAlgorithm::Sha256, &hex).is_err());
        assert!(Checksum::validated(ChecksumAlgorithm::Md5, &"z".repeat(32)).is_err());
    }
}
