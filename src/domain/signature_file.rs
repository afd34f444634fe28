//! Detached signature file (`META-INF/<alias>.SF`).

use crate::domain::constants::{CREATED_BY_KEY, SIGNATURE_VERSION, SIGNATURE_VERSION_KEY};
use crate::domain::crypto::{DigestAlgorithm, DigestBytes};
use crate::domain::manifest::{write_header, Attributes, Manifest};
use crate::infra::error::{SigningError, SigningResult};

/// Header attributes of a signature file, in written order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureFile {
    attributes: Attributes,
}

impl SignatureFile {
    /// Signature file binding `manifest_digest` under the algorithm's manifest attribute.
    #[must_use]
    pub fn new(created_by: &str, manifest_digest: &DigestBytes) -> Self {
        let mut attributes = Attributes::new();
        attributes.set(SIGNATURE_VERSION_KEY, SIGNATURE_VERSION);
        attributes.set(CREATED_BY_KEY, created_by);
        attributes.set(
            &manifest_digest.algorithm().manifest_attribute(),
            manifest_digest.to_base64(),
        );
        Self { attributes }
    }

    pub fn parse(bytes: &[u8]) -> SigningResult<Self> {
        let parsed = Manifest::parse(bytes).map_err(|e| match e {
            SigningError::MalformedArchive(msg) => {
                SigningError::MalformedArchive(format!("Signature file: {msg}"))
            }
            other => other,
        })?;
        Ok(Self {
            attributes: parsed.main_attributes().clone(),
        })
    }

    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn created_by(&self) -> Option<&str> {
        self.attributes.get(CREATED_BY_KEY)
    }

    /// Declared manifest digest for the first supported algorithm present.
    #[must_use]
    pub fn manifest_digest(&self) -> Option<(DigestAlgorithm, &str)> {
        [DigestAlgorithm::Sm3, DigestAlgorithm::Sha256]
            .into_iter()
            .find_map(|algo| {
                self.attributes
                    .get(&algo.manifest_attribute())
                    .map(|value| (algo, value))
            })
    }

    /// Header lines with CRLF endings followed by the blank terminator line.
    pub fn to_bytes(&self) -> SigningResult<Vec<u8>> {
        let mut out = Vec::new();
        for (key, value) in self.attributes.iter() {
            write_header(&mut out, key, value)?;
        }
        out.extend_from_slice(b"\r\n");
        Ok(out)
    }
}
