//! SM2 JAR Signer Library
//!
//! Signs and verifies JAR archives with SM2 signatures over SM3 digests.
//! A signed archive carries per-entry digests in `META-INF/MANIFEST.MF`, a
//! signature file `META-INF/<alias>.SF` binding the manifest digest, and a
//! signature block `META-INF/<alias>.SM2` holding the certificate chain and
//! the SM2 signature over the signature file.
//!
//! Layers:
//! - `domain`: archive, manifest, certificate and verification types
//! - `services`: extraction, digesting, signature-file and block codecs, chain validation
//! - `pipelines`: `SignEngine` and `VerifyEngine`
//! - `adapters`: SM2 backend and PEM credential providers
//! - `infra`: errors and configuration

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

#[cfg(test)]
mod test_support;

use std::path::Path;

pub use adapters::backend::{ArchiveSigningKey, CredentialProvider, SignatureVerifier, SigningCredentials};
pub use adapters::pem_credentials::{PemCredentialProvider, StaticCredentialProvider};
pub use adapters::sm2_backend::{Sm2SigningKey, Sm2Verifier};
pub use domain::crypto::{Certificate, CertificateChain, DigestAlgorithm};
pub use domain::types::{KeyReference, Passphrase, SignerAlias};
pub use domain::verification::{ChainPolicy, VerificationResult, VerifyFailure};
pub use infra::error::{SigningError, SigningResult};
pub use pipelines::{check_archive_on_startup, SignEngine, SignOptions, SignOutcome, VerifyEngine};

/// Sign `input` with a PEM key and chain using the default SM2 backend.
pub fn sign_archive<P: AsRef<Path>>(
    input: P,
    key_ref: &KeyReference,
    passphrase: Option<&Passphrase>,
    options: &SignOptions,
) -> SigningResult<SignOutcome> {
    SignEngine::new(Box::new(PemCredentialProvider::new())).sign(
        input.as_ref(),
        key_ref,
        passphrase,
        options,
    )
}

/// Verify `path` with SM3 entry digests and the lenient chain policy.
pub fn verify_archive<P: AsRef<Path>>(path: P) -> SigningResult<VerificationResult> {
    VerifyEngine::default().verify_file(path.as_ref())
}
