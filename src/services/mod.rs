//! Service layer module root.
//! Stateless building blocks composed by the signing and verification pipelines.

pub mod archive_extractor;
pub mod cert_validator;
pub mod manifest_builder;
pub mod signature_block_codec;
pub mod signature_file_builder;

pub use archive_extractor::{ArchiveExtractor, WorkingTree};
pub use cert_validator::ChainValidator;
pub use manifest_builder::{DigestManifestBuilder, DigestedManifest};
pub use signature_block_codec::SignatureBlockCodec;
pub use signature_file_builder::SignatureFileBuilder;
