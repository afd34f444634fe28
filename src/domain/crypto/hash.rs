//! Digest algorithm domain type.
//!
//! Provides the `DigestAlgorithm` enumeration used for per-entry and manifest
//! digests. SM3 is the default; SHA-256 is available for interoperability.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use sm3::Sm3;

use super::DigestBytes;
use crate::infra::error::SigningError;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sm3,
    Sha256,
}

impl DigestAlgorithm {
    /// Every supported algorithm, default first.
    pub const ALL: [DigestAlgorithm; 2] = [DigestAlgorithm::Sm3, DigestAlgorithm::Sha256];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sm3 => "sm3",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }

    #[must_use]
    pub fn digest_size(&self) -> usize {
        32
    }

    /// Name used as the prefix of digest attributes (`SM3-Digest`, `SHA-256-Digest`).
    #[must_use]
    pub fn jar_name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sm3 => "SM3",
            DigestAlgorithm::Sha256 => "SHA-256",
        }
    }

    /// Per-entry manifest attribute key.
    #[must_use]
    pub fn entry_attribute(&self) -> String {
        format!("{}-Digest", self.jar_name())
    }

    /// Signature-file attribute key carrying the whole-manifest digest.
    #[must_use]
    pub fn manifest_attribute(&self) -> String {
        format!("{}-Digest-Manifest", self.jar_name())
    }

    /// Hash `data` with this algorithm.
    #[must_use]
    pub fn digest(&self, data: &[u8]) -> DigestBytes {
        let bytes = match self {
            DigestAlgorithm::Sm3 => Sm3::digest(data).to_vec(),
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        };
        DigestBytes::from_computed(*self, bytes)
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sm3" => Ok(DigestAlgorithm::Sm3),
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            other => Err(SigningError::ValidationError(format!(
                "Unsupported digest algorithm: {other}"
            ))),
        }
    }
}
