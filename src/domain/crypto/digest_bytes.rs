use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::DigestAlgorithm;

/// Strongly typed digest bytes paired with the algorithm that produced them.
///
/// Invariant: `bytes.len() == algo.digest_size()`.
#[derive(Clone, Eq, PartialEq)]
pub struct DigestBytes {
    algo: DigestAlgorithm,
    bytes: Box<[u8]>,
}

impl DigestBytes {
    pub fn new(algo: DigestAlgorithm, bytes: Vec<u8>) -> Result<Self, DigestBytesError> {
        if bytes.len() != algo.digest_size() {
            return Err(DigestBytesError::LengthMismatch {
                expected: algo.digest_size(),
                actual: bytes.len(),
            });
        }
        Ok(Self {
            algo,
            bytes: bytes.into_boxed_slice(),
        })
    }

    pub(super) fn from_computed(algo: DigestAlgorithm, bytes: Vec<u8>) -> Self {
        Self {
            algo,
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Decode a base64 attribute value as produced by [`DigestBytes::to_base64`].
    pub fn from_base64(algo: DigestAlgorithm, value: &str) -> Result<Self, DigestBytesError> {
        let bytes = STANDARD
            .decode(value.trim())
            .map_err(|e| DigestBytesError::Base64(e.to_string()))?;
        Self::new(algo, bytes)
    }

    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algo
    }
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

impl fmt::Debug for DigestBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DigestBytes(algo={:?}, len={})",
            self.algo,
            self.bytes.len()
        )
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestBytesError {
    #[error("digest length mismatch (expected {expected}, actual {actual})")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("digest is not valid base64: {0}")]
    Base64(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_round_trip_keeps_algorithm() {
        let digest = DigestAlgorithm::Sm3.digest(b"hello");
        let decoded = DigestBytes::from_base64(DigestAlgorithm::Sm3, &digest.to_base64()).unwrap();
        assert_eq!(digest, decoded);
    }

    #[test]
    fn rejects_truncated_digest() {
        let err = DigestBytes::from_base64(DigestAlgorithm::Sm3, "AAAA").unwrap_err();
        assert_eq!(
            err,
            DigestBytesError::LengthMismatch {
                expected: 32,
                actual: 3
            }
        );
    }
}
