//! Cryptographic backend traits injected into the engines.
//!
//! This module defines the seams between the signing/verification pipelines
//! and concrete key material:
//! - `ArchiveSigningKey`: a private-key handle producing signature bytes
//! - `SignatureVerifier`: checks a signature under a certificate public key
//! - `CredentialProvider`: resolves a key reference into a key and a chain

use spki::SubjectPublicKeyInfoOwned;

use crate::domain::crypto::CertificateChain;
use crate::domain::types::{KeyReference, Passphrase};
use crate::infra::error::SigningResult;

/// Private-key handle used by the signing pipeline.
pub trait ArchiveSigningKey: Send + Sync {
    /// Sign `message`, returning the signature in its stored encoding.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails to produce a signature.
    fn sign(&self, message: &[u8]) -> SigningResult<Vec<u8>>;

    /// Whether this key is the private half of `public_key`.
    ///
    /// # Errors
    ///
    /// Returns error if `public_key` cannot be interpreted by this backend.
    fn matches_public_key(&self, public_key: &SubjectPublicKeyInfoOwned) -> SigningResult<bool>;

    /// Short algorithm label for logs.
    fn algorithm(&self) -> &'static str;
}

/// Signature verification under a certificate's public key.
pub trait SignatureVerifier: Send + Sync {
    /// Verify `signature` over `message`.
    ///
    /// Returns `Ok(false)` when the signature does not match.
    ///
    /// # Errors
    ///
    /// Returns error if the public key is unsupported or malformed.
    fn verify(
        &self,
        public_key: &SubjectPublicKeyInfoOwned,
        message: &[u8],
        signature: &[u8],
    ) -> SigningResult<bool>;
}

/// Private key plus leaf-first certificate chain.
pub struct SigningCredentials {
    pub key: Box<dyn ArchiveSigningKey>,
    pub chain: CertificateChain,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("key", &self.key.algorithm())
            .field("chain", &self.chain)
            .finish()
    }
}

/// Source of signing credentials.
pub trait CredentialProvider {
    /// Load the key and chain named by `key_ref`.
    ///
    /// # Errors
    ///
    /// Returns `SigningError::CredentialUnavailable` for a wrong passphrase,
    /// an unsupported key encoding, or unreadable key material.
    fn load(
        &self,
        key_ref: &KeyReference,
        passphrase: Option<&Passphrase>,
    ) -> SigningResult<SigningCredentials>;
}
