//! Adapter layer modules for cryptographic backends and key material.
//!
//! Provides adapters for:
//! - SM2 signing keys and signature verification
//! - PEM private keys (plain, encrypted PKCS#8, SEC1) and certificate chains

pub mod backend;
pub mod pem_credentials;
pub mod sm2_backend;
