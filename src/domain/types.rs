//! Type-safe wrappers using the new-type pattern
//!
//! Validated inputs for signer aliases, key passphrases and key references.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::constants::DEFAULT_SIGNER_ALIAS;
use crate::infra::error::{SigningError, SigningResult};

/// Signer alias, the base name of `META-INF/<alias>.SF` and its block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignerAlias(String);

impl SignerAlias {
    /// Create a new SignerAlias after validation
    pub fn new(alias: impl AsRef<str>) -> SigningResult<Self> {
        let alias = alias.as_ref();
        Self::validate_alias(alias)?;
        Ok(SignerAlias(alias.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `META-INF/<alias>.SF`
    #[must_use]
    pub fn signature_file_path(&self) -> String {
        format!(
            "{}/{}.{}",
            crate::domain::constants::META_INF_DIR,
            self.0,
            crate::domain::constants::SIGNATURE_FILE_EXTENSION
        )
    }

    /// `META-INF/<alias>.<ext>`
    #[must_use]
    pub fn block_path(&self, extension: &str) -> String {
        format!(
            "{}/{}.{}",
            crate::domain::constants::META_INF_DIR,
            self.0,
            extension
        )
    }

    fn validate_alias(alias: &str) -> SigningResult<()> {
        if alias.is_empty() {
            return Err(SigningError::ValidationError(
                "Signer alias cannot be empty".to_string(),
            ));
        }

        if alias.len() > 64 {
            return Err(SigningError::ValidationError(format!(
                "Signer alias too long: {} characters (maximum 64)",
                alias.len()
            )));
        }

        // The alias becomes an archive entry name; keep it to a portable charset
        if !alias
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(SigningError::ValidationError(format!(
                "Signer alias may only contain ASCII letters, digits, '-' and '_': {alias}"
            )));
        }

        Ok(())
    }
}

impl Default for SignerAlias {
    fn default() -> Self {
        SignerAlias(DEFAULT_SIGNER_ALIAS.to_string())
    }
}

impl FromStr for SignerAlias {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for SignerAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Passphrase protecting an encrypted private key.
#[derive(Clone)]
pub struct Passphrase(String);

impl Passphrase {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Passphrase(passphrase.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

// Never print the secret, not even in debug output
impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passphrase([REDACTED])")
    }
}

impl fmt::Display for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[PASSPHRASE REDACTED]")
    }
}

/// Reference to key material understood by a credential provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyReference {
    key_path: PathBuf,
    chain_path: PathBuf,
}

impl KeyReference {
    pub fn new(key_path: impl AsRef<Path>, chain_path: impl AsRef<Path>) -> SigningResult<Self> {
        let key_path = key_path.as_ref().to_path_buf();
        let chain_path = chain_path.as_ref().to_path_buf();
        for path in [&key_path, &chain_path] {
            if path.as_os_str().is_empty() {
                return Err(SigningError::ValidationError(
                    "Key reference path cannot be empty".to_string(),
                ));
            }
        }
        Ok(Self {
            key_path,
            chain_path,
        })
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn chain_path(&self) -> &Path {
        &self.chain_path
    }
}

impl fmt::Display for KeyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key={} chain={}",
            self.key_path.display(),
            self.chain_path.display()
        )
    }
}
