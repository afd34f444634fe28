//! Error types for archive signing and verification.
//! Error handling types and result definitions shared by every layer.

use thiserror::Error;

/// Result type for signing operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Comprehensive error types for signing and verification operations
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SigningError {
    /// A required input (archive, key, certificate chain) does not exist.
    #[error("Input missing: {0}")]
    #[diagnostic(help("check the path passed on the command line or in the configuration"))]
    InputMissing(String),

    /// Key material could not be loaded, decrypted or matched to the certificate.
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    /// Signature block could not be decoded in either layout.
    #[error("Signature block encoding error: {0}")]
    EncodingError(String),

    #[error("Digest mismatch for entry '{path}'")]
    DigestMismatch { path: String },

    #[error("Certificate chain validation failed: {0}")]
    ChainValidationFailure(String),

    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("Cryptographic error: {0}")]
    CryptographicError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("ASN.1 encoding/decoding error: {0}")]
    Asn1Error(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<der::Error> for SigningError {
    fn from(error: der::Error) -> Self {
        SigningError::Asn1Error(error.to_string())
    }
}

impl From<std::io::Error> for SigningError {
    fn from(error: std::io::Error) -> Self {
        SigningError::IoError(error.to_string())
    }
}

impl From<zip::result::ZipError> for SigningError {
    fn from(error: zip::result::ZipError) -> Self {
        match error {
            zip::result::ZipError::Io(io) => SigningError::IoError(io.to_string()),
            other => SigningError::MalformedArchive(other.to_string()),
        }
    }
}

impl From<walkdir::Error> for SigningError {
    fn from(error: walkdir::Error) -> Self {
        SigningError::IoError(error.to_string())
    }
}

impl From<pkcs8::Error> for SigningError {
    fn from(error: pkcs8::Error) -> Self {
        SigningError::CredentialUnavailable(error.to_string())
    }
}

impl From<signature::Error> for SigningError {
    fn from(error: signature::Error) -> Self {
        SigningError::CryptographicError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SigningError::InputMissing("app.jar".to_string());
        assert_eq!(error.to_string(), "Input missing: app.jar");

        let error = SigningError::DigestMismatch {
            path: "com/example/App.class".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Digest mismatch for entry 'com/example/App.class'"
        );
    }

    #[test]
    fn test_zip_error_conversion() {
        let error: SigningError = zip::result::ZipError::InvalidArchive("bad header".into()).into();
        match error {
            SigningError::MalformedArchive(msg) => assert!(msg.contains("bad header")),
            other => panic!("Wrong error type: {other:?}"),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: SigningError = io.into();
        assert!(matches!(error, SigningError::IoError(_)));
    }
}
