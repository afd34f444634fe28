//! SM2 key and certificate fixtures.
//!
//! Shared between the library's unit tests and the integration tests; the
//! including module provides `signer_lib` pointing at the library.

#![allow(dead_code)]

use std::str::FromStr;
use std::time::{Duration, SystemTime};

use der::asn1::{BitString, Uint};
use der::{Decode, Encode};
use rand::rngs::OsRng;
use signature::Signer;
use sm2::dsa::{Signature, SigningKey};
use sm2::pkcs8::EncodePublicKey;
use sm2::SecretKey;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::{TbsCertificate, Version};

use super::signer_lib::adapters::sm2_backend::Sm2SigningKey;
use super::signer_lib::domain::constants::{OID_SM2_WITH_SM3, SM2_DEFAULT_DISTID};
use super::signer_lib::domain::crypto::{Certificate, CertificateChain};

const DAY: Duration = Duration::from_secs(86_400);

/// Freshly generated SM2 key pair.
pub struct TestKey {
    pub secret: SecretKey,
}

impl TestKey {
    pub fn generate() -> Self {
        Self {
            secret: SecretKey::random(&mut OsRng),
        }
    }

    pub fn spki(&self) -> SubjectPublicKeyInfoOwned {
        let doc = self.secret.public_key().to_public_key_der().unwrap();
        SubjectPublicKeyInfoOwned::from_der(doc.as_bytes()).unwrap()
    }

    pub fn signer(&self) -> Sm2SigningKey {
        Sm2SigningKey::new(&self.secret).unwrap()
    }

    /// DER `SEQUENCE { r, s }` signature over `message`.
    pub fn sign_der(&self, message: &[u8]) -> Vec<u8> {
        let key = SigningKey::new(SM2_DEFAULT_DISTID, &self.secret).unwrap();
        let signature: Signature = key.sign(message);
        let raw = signature.to_bytes();
        let r = Uint::new(&raw[..32]).unwrap();
        let s = Uint::new(&raw[32..]).unwrap();
        vec![r, s].to_der().unwrap()
    }
}

/// Builder for SM2-with-SM3 X.509 certificates.
pub struct CertBuilder {
    subject: String,
    issuer_override: Option<String>,
    serial: u8,
    not_before: SystemTime,
    not_after: SystemTime,
}

impl CertBuilder {
    /// Valid from one day ago for a year.
    pub fn new(subject: &str) -> Self {
        let now = SystemTime::now();
        Self {
            subject: subject.to_string(),
            issuer_override: None,
            serial: 1,
            not_before: now - DAY,
            not_after: now + 365 * DAY,
        }
    }

    pub fn serial(mut self, serial: u8) -> Self {
        self.serial = serial;
        self
    }

    pub fn validity(mut self, not_before: SystemTime, not_after: SystemTime) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    /// Validity window that ended yesterday.
    pub fn expired(self) -> Self {
        let now = SystemTime::now();
        self.validity(now - 30 * DAY, now - DAY)
    }

    /// Write `issuer` as the issuer name regardless of who signs.
    pub fn issuer_name(mut self, issuer: &str) -> Self {
        self.issuer_override = Some(issuer.to_string());
        self
    }

    pub fn self_signed(self, key: &TestKey) -> Certificate {
        let issuer = Name::from_str(&self.subject).unwrap();
        self.build(key, issuer, key)
    }

    pub fn issued_by(self, subject_key: &TestKey, issuer: &Certificate, issuer_key: &TestKey) -> Certificate {
        self.build(subject_key, issuer.subject_name().clone(), issuer_key)
    }

    fn build(self, subject_key: &TestKey, issuer: Name, issuer_key: &TestKey) -> Certificate {
        let issuer = match &self.issuer_override {
            Some(name) => Name::from_str(name).unwrap(),
            None => issuer,
        };
        let algorithm = AlgorithmIdentifierOwned {
            oid: OID_SM2_WITH_SM3,
            parameters: None,
        };
        let serial = if self.serial & 0x80 == 0 {
            vec![self.serial]
        } else {
            vec![0, self.serial]
        };
        let tbs = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&serial).unwrap(),
            signature: algorithm.clone(),
            issuer,
            validity: Validity {
                not_before: Time::try_from(self.not_before).unwrap(),
                not_after: Time::try_from(self.not_after).unwrap(),
            },
            subject: Name::from_str(&self.subject).unwrap(),
            subject_public_key_info: subject_key.spki(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: None,
        };
        let tbs_der = tbs.to_der().unwrap();
        let signature = issuer_key.sign_der(&tbs_der);
        let cert = x509_cert::Certificate {
            tbs_certificate: tbs,
            signature_algorithm: algorithm,
            signature: BitString::from_bytes(&signature).unwrap(),
        };
        Certificate::from_parsed(cert).unwrap()
    }
}

/// Root, intermediate and leaf with correct linkage.
pub struct TestPki {
    pub root_key: TestKey,
    pub root: Certificate,
    pub intermediate_key: TestKey,
    pub intermediate: Certificate,
    pub leaf_key: TestKey,
    pub leaf: Certificate,
}

impl TestPki {
    pub fn generate() -> Self {
        let root_key = TestKey::generate();
        let root = CertBuilder::new("CN=Test Root CA,O=Example").serial(1).self_signed(&root_key);
        let intermediate_key = TestKey::generate();
        let intermediate = CertBuilder::new("CN=Test Intermediate CA,O=Example")
            .serial(2)
            .issued_by(&intermediate_key, &root, &root_key);
        let leaf_key = TestKey::generate();
        let leaf = CertBuilder::new("CN=Release Signer,O=Example")
            .serial(3)
            .issued_by(&leaf_key, &intermediate, &intermediate_key);
        Self {
            root_key,
            root,
            intermediate_key,
            intermediate,
            leaf_key,
            leaf,
        }
    }

    /// Leaf, intermediate, root.
    pub fn chain(&self) -> CertificateChain {
        CertificateChain::new(vec![
            self.leaf.clone(),
            self.intermediate.clone(),
            self.root.clone(),
        ])
        .unwrap()
    }
}
