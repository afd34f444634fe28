//! Binary signature-block codec.
//!
//! Chain-aware layout (the only one written):
//!
//! ```text
//! [count: u32 BE] ( [len: u32 BE] [certificate DER] ){count} [signature bytes]
//! ```
//!
//! Legacy layout (read-only): certificate DER immediately followed by the
//! signature, with no framing. Boundaries are recovered from the leading DER
//! headers; a bounded offset scan is the last resort.

use der::{Decode, Reader, SliceReader};

use crate::domain::constants::{
    LEGACY_MIN_SIGNATURE_LEN, LEGACY_SCAN_MAX_OFFSET, LEGACY_SCAN_MIN_OFFSET,
    MAX_CERTIFICATE_SIZE, MAX_CHAIN_CERTIFICATES,
};
use crate::domain::crypto::{Certificate, CertificateChain};
use crate::domain::signature_block::{BlockEncoding, SignatureBlock};
use crate::infra::error::{SigningError, SigningResult};

const LENGTH_FIELD: usize = 4;

/// Stateless encoder/decoder for signature blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureBlockCodec;

impl SignatureBlockCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Encode `chain` and `signature` in the chain-aware layout.
    pub fn encode(&self, chain: &CertificateChain, signature: &[u8]) -> SigningResult<Vec<u8>> {
        if chain.len() > MAX_CHAIN_CERTIFICATES {
            return Err(SigningError::EncodingError(format!(
                "Chain has {} certificates, maximum is {MAX_CHAIN_CERTIFICATES}",
                chain.len()
            )));
        }
        if signature.is_empty() {
            return Err(SigningError::EncodingError(
                "Signature is empty".to_string(),
            ));
        }

        let body: usize = chain
            .certificates()
            .iter()
            .map(|c| LENGTH_FIELD + c.as_der().len())
            .sum();
        let mut out = Vec::with_capacity(LENGTH_FIELD + body + signature.len());
        out.extend_from_slice(&u32_field(chain.len())?.to_be_bytes());
        for cert in chain.certificates() {
            let der = cert.as_der();
            if der.len() > MAX_CERTIFICATE_SIZE {
                return Err(SigningError::EncodingError(format!(
                    "Certificate '{}' is {} bytes, maximum is {MAX_CERTIFICATE_SIZE}",
                    cert.subject(),
                    der.len()
                )));
            }
            out.extend_from_slice(&u32_field(der.len())?.to_be_bytes());
            out.extend_from_slice(der);
        }
        out.extend_from_slice(signature);

        log::debug!(
            "Encoded signature block: {} certificate(s), {} signature bytes, {} total",
            chain.len(),
            signature.len(),
            out.len()
        );
        Ok(out)
    }

    /// Decode a block, trying the chain-aware layout first and the legacy one second.
    pub fn decode(&self, bytes: &[u8]) -> SigningResult<(SignatureBlock, BlockEncoding)> {
        let chain_aware_error = match self.decode_chain_aware(bytes) {
            Ok(block) => return Ok((block, BlockEncoding::ChainAware)),
            Err(e) => e,
        };
        log::debug!("Chain-aware decoding failed ({chain_aware_error}), trying legacy layout");

        self.decode_legacy(bytes).map_err(|legacy_error| {
            SigningError::EncodingError(format!(
                "not a chain-aware block ({chain_aware_error}) nor a legacy block ({legacy_error})"
            ))
        })
    }

    /// Strict chain-aware decoding.
    pub fn decode_chain_aware(&self, bytes: &[u8]) -> SigningResult<SignatureBlock> {
        let mut cursor = 0usize;
        let count = read_u32(bytes, &mut cursor)?;
        if count == 0 || count > MAX_CHAIN_CERTIFICATES {
            return Err(SigningError::EncodingError(format!(
                "implausible certificate count {count}"
            )));
        }

        let mut certs = Vec::with_capacity(count);
        for index in 0..count {
            let len = read_u32(bytes, &mut cursor)?;
            if len == 0 || len > MAX_CERTIFICATE_SIZE {
                return Err(SigningError::EncodingError(format!(
                    "certificate #{index} has implausible length {len}"
                )));
            }
            let end = cursor
                .checked_add(len)
                .filter(|end| *end <= bytes.len())
                .ok_or_else(|| {
                    SigningError::EncodingError(format!(
                        "certificate #{index} overruns the block ({len} bytes at offset {cursor})"
                    ))
                })?;
            let cert = Certificate::from_der(bytes[cursor..end].to_vec()).map_err(|e| {
                SigningError::EncodingError(format!("certificate #{index}: {e}"))
            })?;
            certs.push(cert);
            cursor = end;
        }

        let signature = bytes[cursor..].to_vec();
        if signature.is_empty() {
            return Err(SigningError::EncodingError(
                "no signature bytes after the certificate chain".to_string(),
            ));
        }
        Ok(SignatureBlock::new(CertificateChain::new(certs)?, signature))
    }

    /// Legacy decoding: structural introspection, then the bounded offset scan.
    pub fn decode_legacy(&self, bytes: &[u8]) -> SigningResult<(SignatureBlock, BlockEncoding)> {
        match split_leading_certificates(bytes) {
            Ok(block) => return Ok((block, BlockEncoding::Legacy)),
            Err(e) => log::debug!("Structural legacy decoding failed: {e}"),
        }
        scan_legacy_boundary(bytes).map(|block| (block, BlockEncoding::LegacyScanned))
    }
}

/// Read consecutive DER certificates from the front of `bytes` using their
/// own length headers; the remainder is the signature.
fn split_leading_certificates(bytes: &[u8]) -> SigningResult<SignatureBlock> {
    let mut offset = 0usize;
    let mut certs = Vec::new();

    while certs.len() < MAX_CHAIN_CERTIFICATES && offset < bytes.len() {
        let rest = &bytes[offset..];
        let Some(consumed) = leading_certificate_len(rest) else {
            break;
        };
        certs.push(Certificate::from_der(rest[..consumed].to_vec())?);
        offset += consumed;
    }

    if certs.is_empty() {
        return Err(SigningError::EncodingError(
            "no leading certificate".to_string(),
        ));
    }
    let signature = bytes[offset..].to_vec();
    if signature.is_empty() {
        return Err(SigningError::EncodingError(
            "no signature bytes after the certificate".to_string(),
        ));
    }
    Ok(SignatureBlock::new(CertificateChain::new(certs)?, signature))
}

/// Encoded length of the certificate at the start of `bytes`, if one is there.
fn leading_certificate_len(bytes: &[u8]) -> Option<usize> {
    let mut reader = SliceReader::new(bytes).ok()?;
    x509_cert::Certificate::decode(&mut reader).ok()?;
    let consumed = usize::try_from(reader.position()).ok()?;
    (consumed <= MAX_CERTIFICATE_SIZE).then_some(consumed)
}

/// Recover a concatenated chain by scanning for certificate boundaries.
///
/// Each certificate is found by trying every boundary in
/// `[LEGACY_SCAN_MIN_OFFSET, min(remaining - 64, LEGACY_SCAN_MAX_OFFSET)]` and
/// taking the first whose prefix is exactly one certificate. Scanning repeats
/// on the remainder until no further certificate is found.
fn scan_legacy_boundary(bytes: &[u8]) -> SigningResult<SignatureBlock> {
    let mut offset = 0usize;
    let mut certs = Vec::new();

    while certs.len() < MAX_CHAIN_CERTIFICATES {
        let rest = &bytes[offset..];
        let Some(boundary) = scan_one_certificate(rest) else {
            break;
        };
        certs.push(Certificate::from_der(rest[..boundary].to_vec())?);
        log::debug!(
            "Legacy boundary #{} found by scan at offset {}",
            certs.len(),
            offset + boundary
        );
        offset += boundary;
    }

    if certs.is_empty() {
        let upper = scan_upper_bound(bytes);
        return Err(SigningError::EncodingError(format!(
            "no certificate boundary in offsets {LEGACY_SCAN_MIN_OFFSET}..={upper}"
        )));
    }
    Ok(SignatureBlock::new(
        CertificateChain::new(certs)?,
        bytes[offset..].to_vec(),
    ))
}

fn scan_one_certificate(bytes: &[u8]) -> Option<usize> {
    (LEGACY_SCAN_MIN_OFFSET..=scan_upper_bound(bytes))
        .find(|offset| x509_cert::Certificate::from_der(&bytes[..*offset]).is_ok())
}

fn scan_upper_bound(bytes: &[u8]) -> usize {
    bytes
        .len()
        .saturating_sub(LEGACY_MIN_SIGNATURE_LEN)
        .min(LEGACY_SCAN_MAX_OFFSET)
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> SigningResult<usize> {
    let end = *cursor + LENGTH_FIELD;
    let field = bytes.get(*cursor..end).ok_or_else(|| {
        SigningError::EncodingError(format!("truncated length field at offset {cursor}"))
    })?;
    *cursor = end;
    let value = u32::from_be_bytes([field[0], field[1], field[2], field[3]]);
    usize::try_from(value)
        .map_err(|_| SigningError::EncodingError(format!("length {value} does not fit")))
}

fn u32_field(value: usize) -> SigningResult<u32> {
    u32::try_from(value)
        .map_err(|_| SigningError::EncodingError(format!("length {value} exceeds 4 bytes")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CertBuilder, TestKey, TestPki};

    fn signature_bytes(key: &TestKey) -> Vec<u8> {
        key.sign_der(b"signature file")
    }

    #[test]
    fn chain_aware_layout_is_length_prefixed() {
        let key = TestKey::generate();
        let cert = CertBuilder::new("CN=Leaf").self_signed(&key);
        let chain = CertificateChain::single(cert.clone());
        let sig = signature_bytes(&key);

        let encoded = SignatureBlockCodec::new().encode(&chain, &sig).unwrap();
        assert_eq!(&encoded[..4], &1u32.to_be_bytes());
        let len = u32::from_be_bytes(encoded[4..8].try_into().unwrap()) as usize;
        assert_eq!(len, cert.as_der().len());
        assert_eq!(&encoded[8..8 + len], cert.as_der());
        assert_eq!(&encoded[8 + len..], sig.as_slice());
    }

    #[test]
    fn round_trip_preserves_chain_and_signature() {
        let pki = TestPki::generate();
        let codec = SignatureBlockCodec::new();
        let sig = signature_bytes(&pki.leaf_key);

        for chain in [
            CertificateChain::single(pki.leaf.clone()),
            CertificateChain::new(vec![pki.leaf.clone(), pki.intermediate.clone()]).unwrap(),
            pki.chain(),
        ] {
            let encoded = codec.encode(&chain, &sig).unwrap();
            let (block, encoding) = codec.decode(&encoded).unwrap();
            assert_eq!(encoding, BlockEncoding::ChainAware);
            assert_eq!(block.chain, chain);
            assert_eq!(block.signature, sig);
        }
    }

    #[test]
    fn legacy_single_certificate_is_recovered() {
        let key = TestKey::generate();
        let cert = CertBuilder::new("CN=Legacy").self_signed(&key);
        let sig = signature_bytes(&key);
        let mut legacy = cert.as_der().to_vec();
        legacy.extend_from_slice(&sig);

        let (block, encoding) = SignatureBlockCodec::new().decode(&legacy).unwrap();
        assert_eq!(encoding, BlockEncoding::Legacy);
        assert_eq!(block.chain.leaf(), &cert);
        assert_eq!(block.chain.len(), 1);
        assert_eq!(block.signature, sig);
    }

    #[test]
    fn legacy_concatenated_chain_is_recovered() {
        let pki = TestPki::generate();
        let sig = signature_bytes(&pki.leaf_key);
        let mut legacy = Vec::new();
        for cert in pki.chain().certificates() {
            legacy.extend_from_slice(cert.as_der());
        }
        legacy.extend_from_slice(&sig);

        let (block, _) = SignatureBlockCodec::new().decode(&legacy).unwrap();
        assert_eq!(block.chain, pki.chain());
        assert_eq!(block.signature, sig);
    }

    #[test]
    fn boundary_scan_finds_certificate_end() {
        let key = TestKey::generate();
        let cert = CertBuilder::new("CN=Scanned").self_signed(&key);
        let sig = signature_bytes(&key);
        let mut legacy = cert.as_der().to_vec();
        legacy.extend_from_slice(&sig);

        let block = scan_legacy_boundary(&legacy).unwrap();
        assert_eq!(block.chain.leaf(), &cert);
        assert_eq!(block.signature, sig);
    }

    #[test]
    fn boundary_scan_recovers_every_certificate_of_a_chain() {
        let pki = TestPki::generate();
        let sig = signature_bytes(&pki.leaf_key);
        let mut legacy = Vec::new();
        for cert in pki.chain().certificates() {
            legacy.extend_from_slice(cert.as_der());
        }
        legacy.extend_from_slice(&sig);

        let block = scan_legacy_boundary(&legacy).unwrap();
        assert_eq!(block.chain, pki.chain());
        assert_eq!(block.signature, sig);
    }

    #[test]
    fn boundary_scan_accepts_short_certificates() {
        let key = TestKey::generate();
        let cert = CertBuilder::new("CN=S").self_signed(&key);
        assert!(cert.as_der().len() > LEGACY_SCAN_MIN_OFFSET);
        let mut legacy = cert.as_der().to_vec();
        legacy.extend_from_slice(&signature_bytes(&key));

        let block = scan_legacy_boundary(&legacy).unwrap();
        assert_eq!(block.chain.leaf(), &cert);
    }

    #[test]
    fn boundary_scan_is_bounded() {
        let garbage = vec![0xA5u8; 64 * 1024];
        let err = scan_legacy_boundary(&garbage).unwrap_err();
        assert!(err.to_string().contains("..=16384"));
    }

    #[test]
    fn corrupt_blocks_fail_with_encoding_error() {
        let codec = SignatureBlockCodec::new();
        let key = TestKey::generate();
        let cert = CertBuilder::new("CN=Leaf").self_signed(&key);
        let good = codec
            .encode(&CertificateChain::single(cert), &signature_bytes(&key))
            .unwrap();

        let mut zero_count = good.clone();
        zero_count[..4].copy_from_slice(&0u32.to_be_bytes());
        let mut huge_count = good.clone();
        huge_count[..4].copy_from_slice(&1000u32.to_be_bytes());
        let mut overrun = good.clone();
        overrun[4..8].copy_from_slice(&(good.len() as u32).to_be_bytes());
        let cert_len = u32::from_be_bytes(good[4..8].try_into().unwrap()) as usize;
        let no_signature = good[..8 + cert_len].to_vec();

        for bad in [
            Vec::new(),
            vec![0, 0],
            zero_count,
            huge_count,
            overrun,
            no_signature,
            vec![0x30; 500],
        ] {
            let err = codec.decode(&bad).unwrap_err();
            assert!(
                matches!(err, SigningError::EncodingError(_)),
                "unexpected error: {err:?}"
            );
        }
    }

    #[test]
    fn empty_signature_is_not_encoded() {
        let key = TestKey::generate();
        let chain = CertificateChain::single(CertBuilder::new("CN=Leaf").self_signed(&key));
        assert!(SignatureBlockCodec::new().encode(&chain, &[]).is_err());
    }

    proptest::proptest! {
        #[test]
        fn decode_rejects_arbitrary_bytes_without_panicking(
            bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..4096)
        ) {
            let _ = SignatureBlockCodec::new().decode(&bytes);
        }
    }
}
