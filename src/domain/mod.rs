//! Domain layer: archive entries, manifest and signature-file models,
//! signature blocks, cryptographic value types and verification results.
//!
//! Nothing here performs I/O; services and pipelines build on these types.

pub mod archive;
pub mod constants;
pub mod crypto;
pub mod manifest;
pub mod signature_block;
pub mod signature_file;
pub mod types;
pub mod verification;
