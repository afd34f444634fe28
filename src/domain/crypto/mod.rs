//! Foundational cryptographic domain types.
//!
//! Provides strongly-typed wrappers for cryptographic artifacts including:
//! - Digest algorithms and digest values with size validation
//! - Certificate representations and leaf-first chain structures
//! - SM2 signature values with DER/raw conversions
//!
//! These types keep byte-level representations stable so that values read
//! from an archive can be written back unchanged.

mod cert;
mod digest_bytes;
mod hash;
mod signature;

pub use cert::{Certificate, CertificateChain};
pub use digest_bytes::{DigestBytes, DigestBytesError};
pub use hash::DigestAlgorithm;
pub use signature::Sm2SignatureValue;
