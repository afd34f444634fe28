//! Certificate chain validation service.
//!
//! Checks, in order: validity windows, issuer/subject linkage with issuer
//! signatures, and trust of the terminal certificate. The first violation
//! ends validation.

use std::sync::Arc;
use std::time::SystemTime;

use crate::adapters::backend::SignatureVerifier;
use crate::domain::crypto::{Certificate, CertificateChain};
use crate::domain::verification::{ChainFailure, ChainValidationResult};
use crate::infra::error::SigningResult;

/// Validates leaf-first certificate chains with an injected signature verifier.
#[derive(Clone)]
pub struct ChainValidator {
    verifier: Arc<dyn SignatureVerifier>,
}

impl ChainValidator {
    #[must_use]
    pub fn new(verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { verifier }
    }

    /// Validate `chain` against the current time.
    pub fn validate(
        &self,
        chain: &CertificateChain,
        trusted_root: Option<&Certificate>,
    ) -> SigningResult<ChainValidationResult> {
        self.validate_at(chain, trusted_root, SystemTime::now())
    }

    /// Validate `chain` as of `now`.
    ///
    /// Ordinary validation failures are reported in the result; an error is
    /// returned only when a certificate cannot be re-encoded for checking.
    pub fn validate_at(
        &self,
        chain: &CertificateChain,
        trusted_root: Option<&Certificate>,
        now: SystemTime,
    ) -> SigningResult<ChainValidationResult> {
        log::debug!("Validating certificate chain of {} certificate(s)", chain.len());
        let certs = chain.certificates();

        for (index, cert) in certs.iter().enumerate() {
            if !cert.is_valid_at(now) {
                log::warn!("Certificate #{index} ({}) is outside its validity window", cert.subject());
                return Ok(ChainValidationResult::invalid(ChainFailure::OutsideValidity {
                    index,
                    subject: cert.subject(),
                }));
            }
        }

        for pair in certs.windows(2) {
            let (child, issuer) = (&pair[0], &pair[1]);
            if child.issuer_name() != issuer.subject_name() {
                return Ok(ChainValidationResult::invalid(ChainFailure::IssuerMismatch {
                    subject: child.subject(),
                    issuer: issuer.subject(),
                }));
            }
            if let Some(failure) = self.check_issued_by(child, issuer)? {
                return Ok(ChainValidationResult::invalid(failure));
            }
        }

        let terminal = chain.terminal();
        let trusted = match trusted_root {
            Some(root) if terminal == root => true,
            Some(root) => {
                terminal.issuer_name() == root.subject_name()
                    && self.check_issued_by(terminal, root)?.is_none()
            }
            None => terminal.is_self_issued() && self.check_issued_by(terminal, terminal)?.is_none(),
        };
        if !trusted {
            log::warn!("Terminal certificate {} is not trusted", terminal.subject());
            return Ok(ChainValidationResult::invalid(ChainFailure::UntrustedRoot {
                subject: terminal.subject(),
            }));
        }

        log::debug!("Certificate chain is valid");
        Ok(ChainValidationResult::valid())
    }

    /// `None` when `issuer`'s key verifies `child`'s signature.
    fn check_issued_by(
        &self,
        child: &Certificate,
        issuer: &Certificate,
    ) -> SigningResult<Option<ChainFailure>> {
        let tbs = child.tbs_der()?;
        match self
            .verifier
            .verify(issuer.public_key_info(), &tbs, child.signature_bytes())
        {
            Ok(true) => Ok(None),
            Ok(false) => Ok(Some(ChainFailure::BadSignature {
                subject: child.subject(),
                issuer: issuer.subject(),
            })),
            Err(e) => Ok(Some(ChainFailure::Malformed {
                subject: child.subject(),
                reason: e.to_string(),
            })),
        }
    }
}
