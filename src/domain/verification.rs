//! Verification domain types for signed archives.
//!
//! Aggregates the outcome of every verification step into a stable reporting
//! contract. Expected failure modes are values here, never errors.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use crate::domain::constants::EXPIRY_WARNING_DAYS;
use crate::domain::crypto::{Certificate, CertificateChain, DigestAlgorithm};
use crate::domain::signature_block::BlockEncoding;
use crate::infra::error::SigningError;

const SECONDS_PER_DAY: i64 = 86_400;

/// Why a certificate chain was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainFailure {
    /// `now` lies outside the certificate's validity window.
    OutsideValidity { index: usize, subject: String },
    /// Issuer name of `subject` does not equal the subject of the next certificate.
    IssuerMismatch { subject: String, issuer: String },
    /// Signature of `subject` does not verify under the next certificate's key.
    BadSignature { subject: String, issuer: String },
    /// Terminal certificate is neither the trusted root, signed by it, nor self-signed.
    UntrustedRoot { subject: String },
    /// A certificate could not be processed (unsupported key, unencodable TBS).
    Malformed { subject: String, reason: String },
}

impl fmt::Display for ChainFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainFailure::OutsideValidity { index, subject } => {
                write!(f, "certificate #{index} ({subject}) is outside its validity window")
            }
            ChainFailure::IssuerMismatch { subject, issuer } => {
                write!(f, "issuer of '{subject}' does not match subject of '{issuer}'")
            }
            ChainFailure::BadSignature { subject, issuer } => {
                write!(f, "signature of '{subject}' does not verify under '{issuer}'")
            }
            ChainFailure::UntrustedRoot { subject } => {
                write!(f, "terminal certificate '{subject}' is not trusted")
            }
            ChainFailure::Malformed { subject, reason } => {
                write!(f, "certificate '{subject}' cannot be checked: {reason}")
            }
        }
    }
}

/// Outcome of chain validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainValidationResult {
    pub failure: Option<ChainFailure>,
}

impl ChainValidationResult {
    #[must_use]
    pub fn valid() -> Self {
        Self { failure: None }
    }

    #[must_use]
    pub fn invalid(failure: ChainFailure) -> Self {
        Self {
            failure: Some(failure),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }
}

/// What to do with a failing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainPolicy {
    /// Record the failure as a warning and keep verifying.
    #[default]
    Lenient,
    /// Record the failure as a hard failure.
    Strict,
}

impl fmt::Display for ChainPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainPolicy::Lenient => f.write_str("lenient"),
            ChainPolicy::Strict => f.write_str("strict"),
        }
    }
}

impl FromStr for ChainPolicy {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Ok(ChainPolicy::Lenient),
            "strict" => Ok(ChainPolicy::Strict),
            other => Err(SigningError::ConfigurationError(format!(
                "Unknown chain policy: {other} (expected lenient or strict)"
            ))),
        }
    }
}

/// A reason that makes the overall verification result invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyFailure {
    /// No `META-INF/*.SF` entry was found.
    NotSigned,
    MissingManifest,
    MissingSignatureBlock { alias: String },
    /// Signature block decodes in neither layout.
    Encoding { alias: String, reason: String },
    SignatureMismatch { alias: String },
    MissingManifestDigest { alias: String },
    ManifestDigestMismatch { alias: String },
    ChainValidation { alias: String, failure: ChainFailure },
    DigestMismatch { path: String },
    /// Content entries exist but none carries a digest.
    NoDigestedEntries,
    MalformedArchive { reason: String },
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyFailure::NotSigned => write!(f, "archive is not signed"),
            VerifyFailure::MissingManifest => write!(f, "manifest not found"),
            VerifyFailure::MissingSignatureBlock { alias } => {
                write!(f, "[{alias}] signature block not found")
            }
            VerifyFailure::Encoding { alias, reason } => {
                write!(f, "[{alias}] signature block cannot be decoded: {reason}")
            }
            VerifyFailure::SignatureMismatch { alias } => {
                write!(f, "[{alias}] signature does not verify")
            }
            VerifyFailure::MissingManifestDigest { alias } => {
                write!(f, "[{alias}] signature file has no manifest digest")
            }
            VerifyFailure::ManifestDigestMismatch { alias } => {
                write!(f, "[{alias}] manifest digest mismatch")
            }
            VerifyFailure::ChainValidation { alias, failure } => {
                write!(f, "[{alias}] certificate chain invalid: {failure}")
            }
            VerifyFailure::DigestMismatch { path } => write!(f, "digest mismatch: {path}"),
            VerifyFailure::NoDigestedEntries => write!(f, "no entry carries a digest"),
            VerifyFailure::MalformedArchive { reason } => write!(f, "malformed archive: {reason}"),
        }
    }
}

/// Human-oriented summary of one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
    /// Negative once expired.
    pub days_until_expiry: i64,
    pub self_issued: bool,
    pub signature_algorithm: String,
}

impl CertificateInfo {
    #[must_use]
    pub fn from_certificate(cert: &Certificate, now: SystemTime) -> Self {
        let not_after = cert.not_after();
        Self {
            subject: cert.subject(),
            issuer: cert.issuer(),
            serial: cert.serial_hex(),
            not_before: cert.not_before(),
            not_after,
            days_until_expiry: days_between(now, not_after),
            self_issued: cert.is_self_issued(),
            signature_algorithm: cert.signature_algorithm().to_string(),
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.days_until_expiry < 0
    }

    #[must_use]
    pub fn expires_soon(&self) -> bool {
        (0..EXPIRY_WARNING_DAYS).contains(&self.days_until_expiry)
    }
}

impl fmt::Display for CertificateInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (issuer: {}, serial: {}, valid {} .. {}, {} days left)",
            self.subject,
            self.issuer,
            self.serial,
            format_time(self.not_before),
            format_time(self.not_after),
            self.days_until_expiry
        )
    }
}

fn format_time(time: SystemTime) -> String {
    der::DateTime::from_system_time(time)
        .map(|dt| dt.to_string())
        .unwrap_or_else(|_| "<out of range>".to_string())
}

fn days_between(from: SystemTime, to: SystemTime) -> i64 {
    let seconds = match to.duration_since(from) {
        Ok(ahead) => i64::try_from(ahead.as_secs()).unwrap_or(i64::MAX),
        Err(behind) => -i64::try_from(behind.duration().as_secs()).unwrap_or(i64::MAX),
    };
    seconds.div_euclid(SECONDS_PER_DAY)
}

/// Per-signer outcome.
#[derive(Debug, Clone)]
pub struct SignerReport {
    pub alias: String,
    pub block_path: String,
    pub encoding: BlockEncoding,
    pub chain: CertificateChain,
    pub certificates: Vec<CertificateInfo>,
    /// `None` when the chain has a single certificate.
    pub chain_validation: Option<ChainValidationResult>,
    pub signature_valid: bool,
    pub manifest_digest_valid: bool,
    /// Algorithm the signature file used for the manifest digest.
    pub digest_algorithm: DigestAlgorithm,
}

impl SignerReport {
    #[must_use]
    pub fn verified(&self) -> bool {
        self.signature_valid && self.manifest_digest_valid
    }

    #[must_use]
    pub fn signer_subject(&self) -> String {
        self.chain.leaf().subject()
    }
}

/// Aggregate verification outcome.
#[derive(Debug, Clone, Default)]
pub struct VerificationResult {
    pub valid: bool,
    pub message: String,
    /// Ordered diagnostics, warnings included.
    pub details: Vec<String>,
    pub signers: Vec<SignerReport>,
    /// Content entries (metadata directory excluded).
    pub total_files: usize,
    /// Content entries carrying a digest attribute in the manifest.
    pub files_with_digest: usize,
    /// Digested entries whose digest matched.
    pub verified_files: usize,
    pub hard_failures: Vec<VerifyFailure>,
}

impl VerificationResult {
    pub fn add_detail(&mut self, detail: impl Into<String>) {
        self.details.push(detail.into());
    }

    pub fn warn(&mut self, detail: impl Into<String>) {
        let detail = detail.into();
        log::warn!("{detail}");
        self.details.push(format!("WARNING: {detail}"));
    }

    pub fn fail(&mut self, failure: VerifyFailure) {
        log::error!("Verification failure: {failure}");
        self.details.push(format!("FAILURE: {failure}"));
        self.hard_failures.push(failure);
    }

    /// First signer whose signature and manifest digest verified.
    #[must_use]
    pub fn signer(&self) -> Option<&SignerReport> {
        self.signers.iter().find(|s| s.verified())
    }

    /// Chain of the resolved signer.
    #[must_use]
    pub fn chain(&self) -> Option<&CertificateChain> {
        self.signer().map(|s| &s.chain)
    }

    /// Compute `valid` and `message` from the collected outcomes.
    pub fn finalize(&mut self) {
        self.valid = self.hard_failures.is_empty() && self.signer().is_some();
        self.message = if self.valid {
            format!(
                "Signature verified: {}/{} digested entries match",
                self.verified_files, self.files_with_digest
            )
        } else if let Some(first) = self.hard_failures.first() {
            format!("Verification failed: {first}")
        } else {
            "Verification failed: no signer could be verified".to_string()
        };
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Status:  {}", if self.valid { "VALID" } else { "INVALID" })?;
        writeln!(f, "Message: {}", self.message)?;
        for signer in &self.signers {
            writeln!(
                f,
                "Signer:  {} [{}] via {} ({})",
                signer.signer_subject(),
                signer.alias,
                signer.block_path,
                signer.encoding
            )?;
            for (index, cert) in signer.certificates.iter().enumerate() {
                writeln!(f, "  #{index} {cert}")?;
            }
        }
        writeln!(
            f,
            "Entries: total={} digested={} verified={}",
            self.total_files, self.files_with_digest, self.verified_files
        )?;
        for detail in &self.details {
            writeln!(f, "  - {detail}")?;
        }
        Ok(())
    }
}
