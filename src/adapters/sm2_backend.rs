//! SM2 signing and verification backed by the RustCrypto `sm2` crate.

use der::asn1::ObjectIdentifier;
use signature::{Signer, Verifier};
use sm2::dsa::{Signature, SigningKey, VerifyingKey};
use sm2::{PublicKey, SecretKey};
use spki::SubjectPublicKeyInfoOwned;

use crate::adapters::backend::{ArchiveSigningKey, SignatureVerifier};
use crate::domain::constants::{OID_EC_PUBLIC_KEY, OID_SM2_CURVE, SM2_DEFAULT_DISTID};
use crate::domain::crypto::Sm2SignatureValue;
use crate::infra::error::{SigningError, SigningResult};

/// Decode an SM2 public key from a SubjectPublicKeyInfo.
///
/// Accepts `id-ecPublicKey` with the `sm2p256v1` curve (or no curve
/// parameter), and the curve OID used directly as the algorithm.
pub fn public_key_from_spki(spki: &SubjectPublicKeyInfoOwned) -> SigningResult<PublicKey> {
    let algorithm = spki.algorithm.oid;
    if algorithm == OID_EC_PUBLIC_KEY {
        if let Some(params) = &spki.algorithm.parameters {
            let curve: ObjectIdentifier = params.decode_as().map_err(|e| {
                SigningError::CertificateError(format!("Invalid EC curve parameter: {e}"))
            })?;
            if curve != OID_SM2_CURVE {
                return Err(SigningError::CertificateError(format!(
                    "Unsupported EC curve: {curve}"
                )));
            }
        }
    } else if algorithm != OID_SM2_CURVE {
        return Err(SigningError::CertificateError(format!(
            "Unsupported public key algorithm: {algorithm}"
        )));
    }

    PublicKey::from_sec1_bytes(spki.subject_public_key.raw_bytes())
        .map_err(|e| SigningError::CertificateError(format!("Invalid SM2 public key: {e}")))
}

/// SM2 private key with a fixed distinguishing identifier.
pub struct Sm2SigningKey {
    public: PublicKey,
    signer: SigningKey,
}

impl Sm2SigningKey {
    pub fn new(secret: &SecretKey) -> SigningResult<Self> {
        Self::with_distid(secret, SM2_DEFAULT_DISTID)
    }

    pub fn with_distid(secret: &SecretKey, distid: &str) -> SigningResult<Self> {
        let signer = SigningKey::new(distid, secret)
            .map_err(|e| SigningError::CredentialUnavailable(format!("Invalid SM2 key: {e}")))?;
        Ok(Self {
            public: secret.public_key(),
            signer,
        })
    }

    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }
}

impl ArchiveSigningKey for Sm2SigningKey {
    fn sign(&self, message: &[u8]) -> SigningResult<Vec<u8>> {
        let signature: Signature = self.signer.try_sign(message)?;
        let value = Sm2SignatureValue::from_raw(&signature.to_bytes())?;
        Ok(value.as_der().to_vec())
    }

    fn matches_public_key(&self, public_key: &SubjectPublicKeyInfoOwned) -> SigningResult<bool> {
        Ok(public_key_from_spki(public_key)? == self.public)
    }

    fn algorithm(&self) -> &'static str {
        "SM2"
    }
}

/// SM2-with-SM3 verifier.
#[derive(Debug, Clone)]
pub struct Sm2Verifier {
    distid: String,
}

impl Default for Sm2Verifier {
    fn default() -> Self {
        Self {
            distid: SM2_DEFAULT_DISTID.to_string(),
        }
    }
}

impl Sm2Verifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_distid(distid: impl Into<String>) -> Self {
        Self {
            distid: distid.into(),
        }
    }
}

impl SignatureVerifier for Sm2Verifier {
    fn verify(
        &self,
        public_key: &SubjectPublicKeyInfoOwned,
        message: &[u8],
        signature: &[u8],
    ) -> SigningResult<bool> {
        let public = public_key_from_spki(public_key)?;
        let verifying_key = VerifyingKey::new(&self.distid, public)
            .map_err(|e| SigningError::CryptographicError(format!("Invalid SM2 key: {e}")))?;

        let raw = match Sm2SignatureValue::from_bytes(signature).and_then(|v| v.to_raw()) {
            Ok(raw) => raw,
            Err(e) => {
                log::debug!("Signature bytes are not an SM2 signature: {e}");
                return Ok(false);
            }
        };
        // Out-of-range scalars simply fail to verify
        let Ok(signature) = Signature::from_slice(&raw) else {
            return Ok(false);
        };
        Ok(verifying_key.verify(message, &signature).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestKey;

    #[test]
    fn sign_then_verify() {
        let key = TestKey::generate();
        let spki = key.spki();
        let signature = key.signer().sign(b"payload").unwrap();

        let verifier = Sm2Verifier::new();
        assert!(verifier.verify(&spki, b"payload", &signature).unwrap());
        assert!(!verifier.verify(&spki, b"tampered", &signature).unwrap());
    }

    #[test]
    fn raw_signatures_are_accepted() {
        let key = TestKey::generate();
        let der = key.signer().sign(b"payload").unwrap();
        let raw = Sm2SignatureValue::from_bytes(&der).unwrap().to_raw().unwrap();
        assert!(Sm2Verifier::new()
            .verify(&key.spki(), b"payload", &raw)
            .unwrap());
    }

    #[test]
    fn distinguishing_id_is_bound() {
        let key = TestKey::generate();
        let signature = key.signer().sign(b"payload").unwrap();
        let other = Sm2Verifier::with_distid("ALICE123@YAHOO.COM");
        assert!(!other.verify(&key.spki(), b"payload", &signature).unwrap());
    }

    #[test]
    fn key_matching() {
        let key = TestKey::generate();
        let other = TestKey::generate();
        assert!(key.signer().matches_public_key(&key.spki()).unwrap());
        assert!(!key.signer().matches_public_key(&other.spki()).unwrap());
    }

    #[test]
    fn garbage_signature_is_a_mismatch_not_an_error() {
        let key = TestKey::generate();
        assert!(!Sm2Verifier::new()
            .verify(&key.spki(), b"payload", &[0u8; 10])
            .unwrap());
    }
}
