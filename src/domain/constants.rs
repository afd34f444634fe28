//! Domain constants for archive layout, attribute keys and algorithm identifiers.
//! Keep this intentionally small; only broadly reused literals should live here.

use const_oid::ObjectIdentifier;

// === Archive layout ===

/// Reserved metadata directory name (first path component, compared ASCII case-insensitively)
pub const META_INF_DIR: &str = "META-INF";

/// Manifest entry path inside the archive
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Manifest file name within the metadata directory
pub const MANIFEST_FILE_NAME: &str = "MANIFEST.MF";

/// Extension of the detached signature file (`<alias>.SF`)
pub const SIGNATURE_FILE_EXTENSION: &str = "SF";

/// Signature-block extensions, in lookup order. The first one is the one we write.
pub const SIGNATURE_BLOCK_EXTENSIONS: [&str; 4] = ["SM2", "RSA", "DSA", "EC"];

/// Alias used when the caller does not name one
pub const DEFAULT_SIGNER_ALIAS: &str = "sm2signer";

/// Creator tag written into the manifest and the signature file
pub const DEFAULT_CREATED_BY: &str = "SM2 JAR Signer";

// === Manifest / signature-file attributes ===

pub const MANIFEST_VERSION_KEY: &str = "Manifest-Version";
pub const MANIFEST_VERSION: &str = "1.0";
pub const CREATED_BY_KEY: &str = "Created-By";
pub const NAME_KEY: &str = "Name";
pub const SIGNATURE_VERSION_KEY: &str = "Signature-Version";
pub const SIGNATURE_VERSION: &str = "1.0";

/// Maximum manifest line length in bytes, including the key and separator
pub const MANIFEST_LINE_WIDTH: usize = 72;

// === Signature block codec limits ===

/// Upper bound on certificates accepted in a chain-aware block
pub const MAX_CHAIN_CERTIFICATES: usize = 16;

/// Upper bound on a single encoded certificate
pub const MAX_CERTIFICATE_SIZE: usize = 64 * 1024;

/// Smallest boundary tried by the legacy offset scan.
///
/// An SM2 certificate carries at least a 91-byte public key and a ~72-byte
/// signature, so no real certificate ends before this offset.
pub const LEGACY_SCAN_MIN_OFFSET: usize = 128;

/// Largest boundary tried by the legacy offset scan
pub const LEGACY_SCAN_MAX_OFFSET: usize = 16 * 1024;

/// Minimum number of signature bytes the legacy scan leaves after the boundary
pub const LEGACY_MIN_SIGNATURE_LEN: usize = 64;

// === SM2 ===

/// Default SM2 distinguishing identifier (GM/T 0009)
pub const SM2_DEFAULT_DISTID: &str = "1234567812345678";

/// SM2 signature with SM3 (GM/T 0006)
pub const OID_SM2_WITH_SM3: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.501");

/// SM2 elliptic curve (sm2p256v1)
pub const OID_SM2_CURVE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.301");

/// id-ecPublicKey (RFC 5480)
pub const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// Days before expiry at which certificate reports carry a warning
pub const EXPIRY_WARNING_DAYS: i64 = 90;
