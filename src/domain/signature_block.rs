//! Signature block: certificate chain plus raw signature bytes.

use std::fmt;

use crate::domain::crypto::CertificateChain;

/// Wire layout a block was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEncoding {
    /// `[count][len cert]* [signature]`, big-endian 4-byte fields.
    ChainAware,
    /// Unframed `[cert]* [signature]`, recovered by structural introspection.
    Legacy,
    /// Unframed single certificate, recovered by the bounded boundary scan.
    LegacyScanned,
}

impl BlockEncoding {
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        !matches!(self, BlockEncoding::ChainAware)
    }
}

impl fmt::Display for BlockEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockEncoding::ChainAware => "chain-aware",
            BlockEncoding::Legacy => "legacy",
            BlockEncoding::LegacyScanned => "legacy (scanned)",
        };
        f.write_str(name)
    }
}

/// Decoded signature block.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureBlock {
    pub chain: CertificateChain,
    /// Signature over the signature-file bytes, exactly as stored.
    pub signature: Vec<u8>,
}

impl SignatureBlock {
    #[must_use]
    pub fn new(chain: CertificateChain, signature: Vec<u8>) -> Self {
        Self { chain, signature }
    }
}

impl fmt::Debug for SignatureBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SignatureBlock(chain_len={}, signature_len={})",
            self.chain.len(),
            self.signature.len()
        )
    }
}
