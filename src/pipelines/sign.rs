//! `SignEngine` orchestrates archive signing.
//!
//! Stages: Idle -> Extracted -> Digested -> SfBuilt -> BlockBuilt -> Repacked -> Cleaned.
//! The working tree is removed on every exit path and the destination is only
//! replaced once the complete archive has been produced.

use std::cell::Cell;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::adapters::backend::{CredentialProvider, SignatureVerifier, SigningCredentials};
use crate::adapters::sm2_backend::Sm2Verifier;
use crate::domain::archive::is_signature_related;
use crate::domain::constants::{
    DEFAULT_CREATED_BY, MANIFEST_FILE_NAME, MANIFEST_PATH, SIGNATURE_BLOCK_EXTENSIONS,
};
use crate::domain::crypto::DigestAlgorithm;
use crate::domain::types::{KeyReference, Passphrase, SignerAlias};
use crate::domain::verification::VerificationResult;
use crate::infra::error::{SigningError, SigningResult};
use crate::pipelines::verify::VerifyEngine;
use crate::services::archive_extractor::{ArchiveExtractor, WorkingTree};
use crate::services::manifest_builder::DigestManifestBuilder;
use crate::services::signature_block_codec::SignatureBlockCodec;
use crate::services::signature_file_builder::SignatureFileBuilder;

/// Signing stage, in the order the engine passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignState {
    Idle,
    Extracted,
    Digested,
    SfBuilt,
    BlockBuilt,
    Repacked,
    Cleaned,
}

impl fmt::Display for SignState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignState::Idle => "idle",
            SignState::Extracted => "extracted",
            SignState::Digested => "digested",
            SignState::SfBuilt => "signature file built",
            SignState::BlockBuilt => "signature block built",
            SignState::Repacked => "repacked",
            SignState::Cleaned => "cleaned",
        };
        f.write_str(name)
    }
}

/// Per-call signing options.
#[derive(Debug, Clone)]
pub struct SignOptions {
    pub alias: SignerAlias,
    /// Destination archive; `None` replaces the input.
    pub output: Option<PathBuf>,
    pub digest_algorithm: DigestAlgorithm,
    pub created_by: String,
    /// Verify the produced archive before it replaces the destination.
    pub verify_after_sign: bool,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            alias: SignerAlias::default(),
            output: None,
            digest_algorithm: DigestAlgorithm::default(),
            created_by: DEFAULT_CREATED_BY.to_string(),
            verify_after_sign: true,
        }
    }
}

/// Result of a successful signing run.
#[derive(Debug, Clone)]
pub struct SignOutcome {
    pub output: PathBuf,
    pub alias: SignerAlias,
    pub digested_entries: usize,
    pub chain_length: usize,
    pub signature_file_path: String,
    pub block_path: String,
    /// Signature entries from earlier signings that were removed.
    pub stripped: Vec<String>,
    pub verification: Option<VerificationResult>,
}

/// Archive bytes plus what was written into them.
struct SignedArchive {
    bytes: Vec<u8>,
    digested_entries: usize,
    signature_file_path: String,
    block_path: String,
    stripped: Vec<String>,
}

/// Signs archives with credentials from an injected provider.
pub struct SignEngine {
    provider: Box<dyn CredentialProvider>,
    verifier: Arc<dyn SignatureVerifier>,
    extractor: ArchiveExtractor,
    codec: SignatureBlockCodec,
    state: Cell<SignState>,
}

impl SignEngine {
    /// Engine using the SM2 verifier for post-sign verification.
    pub fn new(provider: Box<dyn CredentialProvider>) -> Self {
        Self::with_verifier(provider, Arc::new(Sm2Verifier::new()))
    }

    pub fn with_verifier(
        provider: Box<dyn CredentialProvider>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            provider,
            verifier,
            extractor: ArchiveExtractor::new(),
            codec: SignatureBlockCodec::new(),
            state: Cell::new(SignState::Idle),
        }
    }

    /// Stage reached by the most recent run.
    #[must_use]
    pub fn state(&self) -> SignState {
        self.state.get()
    }

    fn enter(&self, next: SignState) {
        log::debug!("Sign stage: {} -> {next}", self.state.get());
        self.state.set(next);
    }

    /// Load credentials for `key_ref` and sign `input`.
    pub fn sign(
        &self,
        input: &Path,
        key_ref: &KeyReference,
        passphrase: Option<&Passphrase>,
        options: &SignOptions,
    ) -> SigningResult<SignOutcome> {
        self.state.set(SignState::Idle);
        check_input(input)?;
        let credentials = self.provider.load(key_ref, passphrase)?;
        self.sign_with_credentials(input, &credentials, options)
    }

    /// Sign `input` with already loaded credentials.
    pub fn sign_with_credentials(
        &self,
        input: &Path,
        credentials: &SigningCredentials,
        options: &SignOptions,
    ) -> SigningResult<SignOutcome> {
        self.state.set(SignState::Idle);
        check_input(input)?;
        let leaf = credentials.chain.leaf();
        if !credentials.key.matches_public_key(leaf.public_key_info())? {
            return Err(SigningError::CredentialUnavailable(format!(
                "Private key does not match signer certificate {}",
                leaf.subject()
            )));
        }

        log::info!(
            "Signing {} as '{}' with {} certificate(s), signer: {}",
            input.display(),
            options.alias,
            credentials.chain.len(),
            leaf.subject()
        );

        let mut tree = self.extractor.extract(input)?;
        self.enter(SignState::Extracted);
        let produced = self.produce(&mut tree, credentials, options);
        let closed = tree.close();
        self.enter(SignState::Cleaned);
        let signed = produced?;
        closed?;

        let output = options
            .output
            .clone()
            .unwrap_or_else(|| input.to_path_buf());
        let verification = self.write_output(&output, &signed.bytes, options)?;

        log::info!(
            "Signed {} entries into {}",
            signed.digested_entries,
            output.display()
        );
        Ok(SignOutcome {
            output,
            alias: options.alias.clone(),
            digested_entries: signed.digested_entries,
            chain_length: credentials.chain.len(),
            signature_file_path: signed.signature_file_path,
            block_path: signed.block_path,
            stripped: signed.stripped,
            verification,
        })
    }

    fn produce(
        &self,
        tree: &mut WorkingTree,
        credentials: &SigningCredentials,
        options: &SignOptions,
    ) -> SigningResult<SignedArchive> {
        let stripped = strip_signatures(tree)?;

        let builder = DigestManifestBuilder::new(options.digest_algorithm);
        let digested = builder.build(tree, &options.created_by)?;
        if let Some(existing) = tree.find_metadata_file(MANIFEST_FILE_NAME)? {
            if existing != MANIFEST_PATH {
                tree.remove_file(&existing)?;
            }
        }
        tree.write_file(MANIFEST_PATH, &digested.bytes)?;
        self.enter(SignState::Digested);

        let sf_bytes = SignatureFileBuilder::new(options.created_by.as_str())
            .build(&digested.bytes, options.digest_algorithm)
            .to_bytes()?;
        let signature_file_path = options.alias.signature_file_path();
        tree.write_file(&signature_file_path, &sf_bytes)?;
        self.enter(SignState::SfBuilt);

        let signature = credentials.key.sign(&sf_bytes)?;
        let block = self.codec.encode(&credentials.chain, &signature)?;
        let block_path = options.alias.block_path(SIGNATURE_BLOCK_EXTENSIONS[0]);
        tree.write_file(&block_path, &block)?;
        log::debug!(
            "Wrote {block_path}: {} byte block, {} byte {} signature",
            block.len(),
            signature.len(),
            credentials.key.algorithm()
        );
        self.enter(SignState::BlockBuilt);

        let bytes = self.extractor.repack(tree)?;
        self.enter(SignState::Repacked);

        Ok(SignedArchive {
            bytes,
            digested_entries: digested.digested,
            signature_file_path,
            block_path,
            stripped,
        })
    }

    /// Stage the archive next to `output`, optionally verify it, then rename.
    fn write_output(
        &self,
        output: &Path,
        bytes: &[u8],
        options: &SignOptions,
    ) -> SigningResult<Option<VerificationResult>> {
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut staged = NamedTempFile::new_in(&dir).map_err(|e| {
            SigningError::IoError(format!(
                "Failed to create temporary output in {}: {e}",
                dir.display()
            ))
        })?;
        staged
            .write_all(bytes)
            .and_then(|()| staged.flush())
            .map_err(|e| SigningError::IoError(format!("Failed to write signed archive: {e}")))?;

        let verification = if options.verify_after_sign {
            let result = VerifyEngine::new(options.digest_algorithm, Arc::clone(&self.verifier))
                .verify_file(staged.path())?;
            if !result.valid {
                return Err(SigningError::VerificationFailed(format!(
                    "Signed archive did not verify: {}",
                    result.message
                )));
            }
            log::info!("Post-sign verification passed");
            Some(result)
        } else {
            None
        };

        staged.persist(output).map_err(|e| {
            SigningError::IoError(format!("Failed to write {}: {}", output.display(), e.error))
        })?;
        Ok(verification)
    }
}

fn check_input(input: &Path) -> SigningResult<()> {
    if input.is_file() {
        Ok(())
    } else {
        Err(SigningError::InputMissing(format!(
            "Archive not found: {}",
            input.display()
        )))
    }
}

/// Remove every signature file and block left by earlier signings.
fn strip_signatures(tree: &mut WorkingTree) -> SigningResult<Vec<String>> {
    let stale: Vec<String> = tree
        .entries()?
        .into_iter()
        .filter(|(path, is_dir)| !is_dir && is_signature_related(path))
        .map(|(path, _)| path)
        .collect();
    for path in &stale {
        log::warn!("Removing existing signature entry {path}");
        tree.remove_file(path)?;
    }
    Ok(stale)
}
