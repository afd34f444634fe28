//! Signature file construction over finalized manifest bytes.

use crate::domain::constants::DEFAULT_CREATED_BY;
use crate::domain::crypto::DigestAlgorithm;
use crate::domain::signature_file::SignatureFile;

/// Builds `<alias>.SF` content binding the manifest digest.
#[derive(Debug, Clone)]
pub struct SignatureFileBuilder {
    created_by: String,
}

impl Default for SignatureFileBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CREATED_BY)
    }
}

impl SignatureFileBuilder {
    pub fn new(created_by: impl Into<String>) -> Self {
        Self {
            created_by: created_by.into(),
        }
    }

    /// Digest `manifest_bytes` exactly as they will be stored in the archive.
    #[must_use]
    pub fn build(&self, manifest_bytes: &[u8], algorithm: DigestAlgorithm) -> SignatureFile {
        let digest = algorithm.digest(manifest_bytes);
        log::debug!(
            "Manifest {} digest: {}",
            algorithm.jar_name(),
            digest.to_base64()
        );
        SignatureFile::new(&self.created_by, &digest)
    }
}
