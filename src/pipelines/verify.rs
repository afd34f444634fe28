//! `VerifyEngine`: signature discovery, block decoding, chain validation,
//! signature and manifest checks, then per-entry digest verification.
//!
//! Expected failures end up in the returned `VerificationResult`; `Err` is
//! reserved for a missing input file and unexpected I/O.

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use crate::adapters::backend::SignatureVerifier;
use crate::adapters::sm2_backend::Sm2Verifier;
use crate::domain::archive::{is_metadata_path, ArchiveContents, ArchiveEntry};
use crate::domain::constants::{MANIFEST_FILE_NAME, SIGNATURE_BLOCK_EXTENSIONS, SIGNATURE_FILE_EXTENSION};
use crate::domain::crypto::{Certificate, DigestAlgorithm};
use crate::domain::manifest::Manifest;
use crate::domain::signature_file::SignatureFile;
use crate::domain::verification::{
    CertificateInfo, ChainFailure, ChainPolicy, ChainValidationResult, SignerReport,
    VerificationResult, VerifyFailure,
};
use crate::infra::error::{SigningError, SigningResult};
use crate::services::archive_extractor::ArchiveExtractor;
use crate::services::cert_validator::ChainValidator;
use crate::services::signature_block_codec::SignatureBlockCodec;

/// Whether verification may continue after one signer.
enum SignerOutcome {
    Continue,
    Abort,
}

/// Verifies signed archives.
pub struct VerifyEngine {
    digest_algorithm: DigestAlgorithm,
    verifier: Arc<dyn SignatureVerifier>,
    validator: ChainValidator,
    policy: ChainPolicy,
    trusted_root: Option<Certificate>,
    extractor: ArchiveExtractor,
    codec: SignatureBlockCodec,
}

impl Default for VerifyEngine {
    fn default() -> Self {
        Self::new(DigestAlgorithm::default(), Arc::new(Sm2Verifier::new()))
    }
}

impl VerifyEngine {
    #[must_use]
    pub fn new(digest_algorithm: DigestAlgorithm, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self {
            digest_algorithm,
            validator: ChainValidator::new(Arc::clone(&verifier)),
            verifier,
            policy: ChainPolicy::default(),
            trusted_root: None,
            extractor: ArchiveExtractor::new(),
            codec: SignatureBlockCodec::new(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ChainPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Anchor chains to `root`. Single-certificate chains are then validated too.
    #[must_use]
    pub fn with_trusted_root(mut self, root: Certificate) -> Self {
        self.trusted_root = Some(root);
        self
    }

    #[must_use]
    pub fn policy(&self) -> ChainPolicy {
        self.policy
    }

    /// Verify the archive at `path`.
    pub fn verify_file(&self, path: &Path) -> SigningResult<VerificationResult> {
        if !path.is_file() {
            return Err(SigningError::InputMissing(format!(
                "Archive not found: {}",
                path.display()
            )));
        }
        log::info!("Verifying {}", path.display());
        match self.extractor.read(path) {
            Ok(contents) => Ok(self.verify_contents(&contents)),
            Err(SigningError::MalformedArchive(reason)) => Ok(malformed(reason)),
            Err(e) => Err(e),
        }
    }

    /// Verify an in-memory archive.
    #[must_use]
    pub fn verify_bytes(&self, bytes: &[u8]) -> VerificationResult {
        match self.extractor.read_bytes(bytes) {
            Ok(contents) => self.verify_contents(&contents),
            Err(e) => malformed(e.to_string()),
        }
    }

    /// Verify already-read archive entries.
    #[must_use]
    pub fn verify_contents(&self, contents: &ArchiveContents) -> VerificationResult {
        let mut result = VerificationResult {
            total_files: contents.content_files().count(),
            ..VerificationResult::default()
        };

        let Some(manifest_entry) = contents.find_metadata_file(MANIFEST_FILE_NAME) else {
            result.fail(VerifyFailure::MissingManifest);
            result.finalize();
            return result;
        };
        let manifest = match Manifest::parse(&manifest_entry.contents) {
            Ok(manifest) => manifest,
            Err(e) => {
                result.fail(VerifyFailure::MalformedArchive {
                    reason: e.to_string(),
                });
                result.finalize();
                return result;
            }
        };

        let aliases = contents.signer_aliases();
        if aliases.is_empty() {
            result.fail(VerifyFailure::NotSigned);
            result.finalize();
            return result;
        }
        log::debug!("Found signer(s): {}", aliases.join(", "));

        let now = SystemTime::now();
        for alias in &aliases {
            let outcome =
                self.verify_signer(contents, alias, &manifest_entry.contents, &manifest, now, &mut result);
            if matches!(outcome, SignerOutcome::Abort) {
                result.finalize();
                return result;
            }
        }

        if result.signer().is_some() {
            self.verify_entries(contents, &manifest, &mut result);
        }
        result.finalize();
        log::info!("{}", result.message);
        result
    }

    fn verify_signer(
        &self,
        contents: &ArchiveContents,
        alias: &str,
        manifest_bytes: &[u8],
        manifest: &Manifest,
        now: SystemTime,
        result: &mut VerificationResult,
    ) -> SignerOutcome {
        let sf_name = format!("{alias}.{SIGNATURE_FILE_EXTENSION}");
        let Some(sf_entry) = contents.find_metadata_file(&sf_name) else {
            return SignerOutcome::Continue;
        };
        let Some(block_entry) = find_block(contents, alias) else {
            result.fail(VerifyFailure::MissingSignatureBlock {
                alias: alias.to_string(),
            });
            return SignerOutcome::Continue;
        };

        let (block, encoding) = match self.codec.decode(&block_entry.contents) {
            Ok(decoded) => decoded,
            Err(e) => {
                result.fail(VerifyFailure::Encoding {
                    alias: alias.to_string(),
                    reason: e.to_string(),
                });
                return SignerOutcome::Continue;
            }
        };
        log::debug!(
            "[{alias}] {} decoded ({encoding}): {} certificate(s), {} signature bytes",
            block_entry.path,
            block.chain.len(),
            block.signature.len()
        );
        if encoding.is_legacy() {
            result.warn(format!("[{alias}] signature block uses the legacy layout"));
        }

        let certificates: Vec<CertificateInfo> = block
            .chain
            .certificates()
            .iter()
            .map(|cert| CertificateInfo::from_certificate(cert, now))
            .collect();
        if let Some(leaf) = certificates.first() {
            if leaf.is_expired() {
                result.warn(format!("[{alias}] signer certificate has expired: {}", leaf.subject));
            } else if leaf.expires_soon() {
                result.warn(format!(
                    "[{alias}] signer certificate expires in {} days: {}",
                    leaf.days_until_expiry, leaf.subject
                ));
            }
        }

        let chain_validation = if block.chain.len() > 1 || self.trusted_root.is_some() {
            let validation = self
                .validator
                .validate_at(&block.chain, self.trusted_root.as_ref(), now)
                .unwrap_or_else(|e| {
                    ChainValidationResult::invalid(ChainFailure::Malformed {
                        subject: block.chain.leaf().subject(),
                        reason: e.to_string(),
                    })
                });
            if let Some(failure) = &validation.failure {
                match self.policy {
                    ChainPolicy::Lenient => {
                        result.warn(format!("[{alias}] certificate chain invalid: {failure}"));
                    }
                    ChainPolicy::Strict => result.fail(VerifyFailure::ChainValidation {
                        alias: alias.to_string(),
                        failure: failure.clone(),
                    }),
                }
            } else {
                result.add_detail(format!(
                    "[{alias}] certificate chain of {} is valid",
                    block.chain.len()
                ));
            }
            Some(validation)
        } else {
            None
        };

        let signature_file = match SignatureFile::parse(&sf_entry.contents) {
            Ok(sf) => sf,
            Err(e) => {
                result.fail(VerifyFailure::Encoding {
                    alias: alias.to_string(),
                    reason: e.to_string(),
                });
                return SignerOutcome::Continue;
            }
        };

        let leaf = block.chain.leaf();
        match self
            .verifier
            .verify(leaf.public_key_info(), &sf_entry.contents, &block.signature)
        {
            Ok(true) => result.add_detail(format!(
                "[{alias}] signature verified for {}",
                leaf.subject()
            )),
            Ok(false) => {
                result.fail(VerifyFailure::SignatureMismatch {
                    alias: alias.to_string(),
                });
                return SignerOutcome::Abort;
            }
            Err(e) => {
                result.fail(VerifyFailure::Encoding {
                    alias: alias.to_string(),
                    reason: e.to_string(),
                });
                return SignerOutcome::Continue;
            }
        }

        let Some((algorithm, declared)) = signature_file.manifest_digest() else {
            result.fail(VerifyFailure::MissingManifestDigest {
                alias: alias.to_string(),
            });
            return SignerOutcome::Continue;
        };
        let declared = declared.trim();
        let raw_matches = algorithm.digest(manifest_bytes).to_base64() == declared;
        let manifest_digest_valid =
            raw_matches
                || manifest
                    .to_bytes()
                    .is_ok_and(|bytes| algorithm.digest(&bytes).to_base64() == declared);
        if !manifest_digest_valid {
            result.fail(VerifyFailure::ManifestDigestMismatch {
                alias: alias.to_string(),
            });
            return SignerOutcome::Abort;
        }
        if !raw_matches {
            log::debug!("[{alias}] manifest digest matched the re-serialized manifest");
        }

        result.signers.push(SignerReport {
            alias: alias.to_string(),
            block_path: block_entry.path.clone(),
            encoding,
            chain: block.chain,
            certificates,
            chain_validation,
            signature_valid: true,
            manifest_digest_valid,
            digest_algorithm: algorithm,
        });
        SignerOutcome::Continue
    }

    fn verify_entries(
        &self,
        contents: &ArchiveContents,
        manifest: &Manifest,
        result: &mut VerificationResult,
    ) {
        let preference = self.entry_digest_preference(result);
        let mut undigested = 0usize;

        for entry in contents.content_files() {
            let declared = manifest.entry(&entry.path).and_then(|attributes| {
                preference.iter().find_map(|algorithm| {
                    attributes
                        .get(&algorithm.entry_attribute())
                        .map(|value| (*algorithm, value))
                })
            });
            let Some((algorithm, declared)) = declared else {
                log::debug!("No supported digest attribute for {}", entry.path);
                undigested += 1;
                continue;
            };
            result.files_with_digest += 1;
            let actual = algorithm.digest(&entry.contents).to_base64();
            if actual != declared.trim() {
                result.fail(VerifyFailure::DigestMismatch {
                    path: entry.path.clone(),
                });
                return;
            }
            result.verified_files += 1;
        }

        if undigested > 0 {
            result.warn(format!("{undigested} entries are not covered by the manifest"));
        }
        for (path, attributes) in manifest.entries() {
            if preference
                .iter()
                .any(|algorithm| attributes.get(&algorithm.entry_attribute()).is_some())
                && !is_metadata_path(path)
                && contents.get(path).is_none()
            {
                result.warn(format!("Manifest lists missing entry {path}"));
            }
        }
        if result.total_files > 0 && result.files_with_digest == 0 {
            result.fail(VerifyFailure::NoDigestedEntries);
        }
    }

    /// Entry digest attributes in lookup order: the engine's own algorithm,
    /// then the algorithms the verified signers declared, then the rest.
    fn entry_digest_preference(&self, result: &VerificationResult) -> Vec<DigestAlgorithm> {
        let mut order = vec![self.digest_algorithm];
        let declared = result.signers.iter().map(|signer| signer.digest_algorithm);
        for algorithm in declared.chain(DigestAlgorithm::ALL) {
            if !order.contains(&algorithm) {
                order.push(algorithm);
            }
        }
        order
    }
}

/// Paired signature block, first matching extension wins.
fn find_block<'a>(contents: &'a ArchiveContents, alias: &str) -> Option<&'a ArchiveEntry> {
    SIGNATURE_BLOCK_EXTENSIONS
        .iter()
        .find_map(|ext| contents.find_metadata_file(&format!("{alias}.{ext}")))
}

fn malformed(reason: String) -> VerificationResult {
    let mut result = VerificationResult::default();
    result.fail(VerifyFailure::MalformedArchive { reason });
    result.finalize();
    result
}

/// Verify `path` with the default SM2/SM3 backend before trusting it.
///
/// In strict mode an invalid archive is an error and chain failures count as
/// hard failures; otherwise the result is returned for the caller to inspect.
pub fn check_archive_on_startup(path: &Path, strict: bool) -> SigningResult<VerificationResult> {
    let policy = if strict {
        ChainPolicy::Strict
    } else {
        ChainPolicy::Lenient
    };
    let result = VerifyEngine::default().with_policy(policy).verify_file(path)?;
    if strict && !result.valid {
        return Err(SigningError::VerificationFailed(format!(
            "{}: {}",
            path.display(),
            result.message
        )));
    }
    if !result.valid {
        log::warn!("{} failed verification: {}", path.display(), result.message);
    }
    Ok(result)
}
