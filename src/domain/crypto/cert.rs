use std::fmt;
use std::time::SystemTime;

use const_oid::ObjectIdentifier;
use der::{Decode, Encode};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::name::Name;

use crate::infra::error::{SigningError, SigningResult};

/// X.509 certificate kept together with the exact DER it was read from.
///
/// The original bytes are preserved so a certificate read from a signature
/// block is re-emitted byte-for-byte.
#[derive(Clone)]
pub struct Certificate {
    der: Box<[u8]>,
    parsed: x509_cert::Certificate,
}

impl Certificate {
    /// Parse a DER certificate. Trailing bytes are rejected.
    pub fn from_der(der: Vec<u8>) -> SigningResult<Self> {
        let parsed = x509_cert::Certificate::from_der(&der)
            .map_err(|e| SigningError::CertificateError(format!("Invalid certificate DER: {e}")))?;
        Ok(Self {
            der: der.into_boxed_slice(),
            parsed,
        })
    }

    /// Wrap an already parsed certificate, producing its canonical DER.
    pub fn from_parsed(parsed: x509_cert::Certificate) -> SigningResult<Self> {
        let der = parsed.to_der()?;
        Ok(Self {
            der: der.into_boxed_slice(),
            parsed,
        })
    }

    /// Load every `CERTIFICATE` block from PEM text, in file order.
    pub fn load_pem_chain(pem: &[u8]) -> SigningResult<Vec<Self>> {
        let parsed = x509_cert::Certificate::load_pem_chain(pem)
            .map_err(|e| SigningError::CertificateError(format!("Invalid certificate PEM: {e}")))?;
        parsed.into_iter().map(Self::from_parsed).collect()
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn parsed(&self) -> &x509_cert::Certificate {
        &self.parsed
    }

    #[must_use]
    pub fn subject_name(&self) -> &Name {
        &self.parsed.tbs_certificate.subject
    }

    #[must_use]
    pub fn issuer_name(&self) -> &Name {
        &self.parsed.tbs_certificate.issuer
    }

    /// Subject distinguished name in RFC 4514 form.
    #[must_use]
    pub fn subject(&self) -> String {
        self.subject_name().to_string()
    }

    /// Issuer distinguished name in RFC 4514 form.
    #[must_use]
    pub fn issuer(&self) -> String {
        self.issuer_name().to_string()
    }

    #[must_use]
    pub fn serial_hex(&self) -> String {
        hex::encode(self.parsed.tbs_certificate.serial_number.as_bytes())
    }

    #[must_use]
    pub fn not_before(&self) -> SystemTime {
        self.parsed.tbs_certificate.validity.not_before.to_system_time()
    }

    #[must_use]
    pub fn not_after(&self) -> SystemTime {
        self.parsed.tbs_certificate.validity.not_after.to_system_time()
    }

    /// Whether `now` lies inside the inclusive validity window.
    #[must_use]
    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        self.not_before() <= now && now <= self.not_after()
    }

    #[must_use]
    pub fn public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.parsed.tbs_certificate.subject_public_key_info
    }

    /// Signature algorithm declared on the outer certificate.
    #[must_use]
    pub fn signature_algorithm(&self) -> &ObjectIdentifier {
        &self.parsed.signature_algorithm.oid
    }

    /// Issuer's signature over the TBS portion.
    #[must_use]
    pub fn signature_bytes(&self) -> &[u8] {
        self.parsed.signature.raw_bytes()
    }

    /// DER of the to-be-signed portion, i.e. the bytes the issuer signed.
    pub fn tbs_der(&self) -> SigningResult<Vec<u8>> {
        Ok(self.parsed.tbs_certificate.to_der()?)
    }

    /// Subject equals issuer. Says nothing about the signature.
    #[must_use]
    pub fn is_self_issued(&self) -> bool {
        self.subject_name() == self.issuer_name()
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Certificate(subject={}, len={})",
            self.subject(),
            self.der.len()
        )
    }
}

/// Ordered certificate chain, leaf first. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateChain {
    certs: Vec<Certificate>,
}

impl CertificateChain {
    pub fn new(certs: Vec<Certificate>) -> SigningResult<Self> {
        if certs.is_empty() {
            return Err(SigningError::CertificateError(
                "Certificate chain is empty".to_string(),
            ));
        }
        Ok(Self { certs })
    }

    #[must_use]
    pub fn single(leaf: Certificate) -> Self {
        Self { certs: vec![leaf] }
    }

    #[must_use]
    pub fn leaf(&self) -> &Certificate {
        &self.certs[0]
    }

    /// Last certificate of the chain (the root when the chain is complete).
    #[must_use]
    pub fn terminal(&self) -> &Certificate {
        &self.certs[self.certs.len() - 1]
    }

    #[must_use]
    pub fn certificates(&self) -> &[Certificate] {
        &self.certs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Certificate> {
        self.certs
    }
}

impl fmt::Debug for CertificateChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CertificateChain(leaf={}, len={})",
            self.leaf().subject(),
            self.certs.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CertBuilder, TestKey};

    #[test]
    fn der_bytes_are_preserved() {
        let key = TestKey::generate();
        let cert = CertBuilder::new("CN=Leaf").self_signed(&key);
        let reparsed = Certificate::from_der(cert.as_der().to_vec()).unwrap();
        assert_eq!(cert, reparsed);
        assert!(reparsed.is_self_issued());
        assert_eq!(reparsed.subject(), "CN=Leaf");
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let key = TestKey::generate();
        let cert = CertBuilder::new("CN=Leaf").self_signed(&key);
        let mut der = cert.as_der().to_vec();
        der.extend_from_slice(&[0u8; 8]);
        assert!(Certificate::from_der(der).is_err());
    }

    #[test]
    fn empty_chain_is_rejected() {
        assert!(CertificateChain::new(Vec::new()).is_err());
    }
}
