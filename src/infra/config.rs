//! Configuration management infrastructure.
//!
//! Persists signer defaults (alias, digest algorithm, chain policy, trust
//! anchor) as TOML, with JSON/YAML export and named profiles.

use crate::domain::constants::{DEFAULT_CREATED_BY, DEFAULT_SIGNER_ALIAS};
use crate::domain::crypto::DigestAlgorithm;
use crate::domain::types::SignerAlias;
use crate::domain::verification::ChainPolicy;
use crate::infra::error::{SigningError, SigningResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "sm2-jar-signer";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Signer defaults applied when the command line does not override them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfiguration {
    /// Alias used for `META-INF/<alias>.SF` and its block
    pub default_alias: String,

    /// Entry digest algorithm (`sm3` or `sha256`)
    pub digest_algorithm: String,

    /// Creator tag written to new manifests and signature files
    pub created_by: String,

    /// `lenient` or `strict`
    pub chain_policy: String,

    /// PEM certificate every chain must lead to
    pub trusted_root: Option<PathBuf>,

    /// Verify each archive right after signing it
    pub verify_after_sign: bool,

    /// Whether to show verbose output
    pub verbose: bool,
}

impl Default for SignerConfiguration {
    fn default() -> Self {
        Self {
            default_alias: DEFAULT_SIGNER_ALIAS.to_string(),
            digest_algorithm: DigestAlgorithm::default().as_str().to_string(),
            created_by: DEFAULT_CREATED_BY.to_string(),
            chain_policy: ChainPolicy::default().to_string(),
            trusted_root: None,
            verify_after_sign: true,
            verbose: false,
        }
    }
}

impl SignerConfiguration {
    pub fn signer_alias(&self) -> SigningResult<SignerAlias> {
        SignerAlias::new(&self.default_alias)
    }

    pub fn digest(&self) -> SigningResult<DigestAlgorithm> {
        self.digest_algorithm.parse().map_err(|_| {
            SigningError::ConfigurationError(format!(
                "Invalid digest algorithm: {}",
                self.digest_algorithm
            ))
        })
    }

    pub fn policy(&self) -> SigningResult<ChainPolicy> {
        self.chain_policy.parse()
    }

    /// Check every field that has a constrained value.
    pub fn validate(&self) -> SigningResult<()> {
        self.signer_alias()?;
        self.digest()?;
        self.policy()?;
        if self.created_by.trim().is_empty() {
            return Err(SigningError::ConfigurationError(
                "created_by cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration manager for handling config files
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new configuration manager with default path
    pub fn new() -> SigningResult<Self> {
        Ok(Self {
            config_path: Self::default_config_path(),
        })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Per-user config directory, or the working directory when there is none
    #[must_use]
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir().map_or_else(|| PathBuf::from("."), |dir| dir.join(CONFIG_DIR_NAME))
    }

    #[must_use]
    pub fn default_config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME),
            None => PathBuf::from(format!("{CONFIG_DIR_NAME}-{CONFIG_FILE_NAME}")),
        }
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load_or_create_default(&self) -> SigningResult<SignerConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = SignerConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load configuration, falling back to defaults without writing anything
    pub fn load_or_default(&self) -> SigningResult<SignerConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            Ok(SignerConfiguration::default())
        }
    }

    /// Load configuration from file
    pub fn load(&self) -> SigningResult<SignerConfiguration> {
        log::debug!("Loading configuration from: {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: SignerConfiguration = toml::from_str(&content).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &SignerConfiguration) -> SigningResult<()> {
        log::info!("Saving configuration to: {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SigningError::ConfigurationError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Update a specific configuration value
    pub fn update_value(&self, key: &str, value: &str) -> SigningResult<()> {
        let mut config = self.load_or_default()?;

        match key {
            "default_alias" => {
                SignerAlias::new(value)?;
                config.default_alias = value.to_string();
            }
            "digest_algorithm" => {
                let algorithm: DigestAlgorithm = value.parse().map_err(|_| {
                    SigningError::ConfigurationError(format!("Invalid digest algorithm: {value}"))
                })?;
                config.digest_algorithm = algorithm.as_str().to_string();
            }
            "created_by" => {
                config.created_by = value.to_string();
            }
            "chain_policy" => {
                config.chain_policy = value.parse::<ChainPolicy>()?.to_string();
            }
            "trusted_root" => {
                config.trusted_root = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "verify_after_sign" => {
                config.verify_after_sign = parse_bool(value)?;
            }
            "verbose" => {
                config.verbose = parse_bool(value)?;
            }
            _ => {
                return Err(SigningError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        config.validate()?;
        self.save(&config)
    }

    /// Get the configuration file path
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Export configuration as a portable format
    pub fn export_config(&self, format: ExportFormat) -> SigningResult<String> {
        let config = self.load_or_default()?;

        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("TOML export failed: {e}"))),
            ExportFormat::Json => serde_json::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("JSON export failed: {e}"))),
            ExportFormat::Yaml => serde_yaml::to_string(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("YAML export failed: {e}"))),
        }
    }

    /// Import configuration from a string
    pub fn import_config(&self, content: &str, format: ExportFormat) -> SigningResult<()> {
        let config: SignerConfiguration = match format {
            ExportFormat::Toml => toml::from_str(content).map_err(|e| {
                SigningError::ConfigurationError(format!("TOML import failed: {e}"))
            })?,
            ExportFormat::Json => serde_json::from_str(content).map_err(|e| {
                SigningError::ConfigurationError(format!("JSON import failed: {e}"))
            })?,
            ExportFormat::Yaml => serde_yaml::from_str(content).map_err(|e| {
                SigningError::ConfigurationError(format!("YAML import failed: {e}"))
            })?,
        };

        config.validate()?;
        self.save(&config)
    }
}

fn parse_bool(value: &str) -> SigningResult<bool> {
    value
        .parse()
        .map_err(|_| SigningError::ConfigurationError(format!("Invalid boolean value: {value}")))
}

/// Configuration export/import formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Toml,
    Json,
    Yaml,
}

impl std::str::FromStr for ExportFormat {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(SigningError::ConfigurationError(format!(
                "Unknown configuration format: {other}"
            ))),
        }
    }
}

/// Configuration profile for different environments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigProfile {
    pub name: String,
    pub description: String,
    pub config: SignerConfiguration,
}

/// Profile manager for handling multiple configuration profiles
pub struct ProfileManager {
    profiles_dir: PathBuf,
}

impl ProfileManager {
    /// Create a new profile manager
    pub fn new() -> SigningResult<Self> {
        Ok(Self::with_dir(ConfigManager::default_config_dir().join("profiles")))
    }

    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            profiles_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// List available profiles
    pub fn list_profiles(&self) -> SigningResult<Vec<String>> {
        if !self.profiles_dir.exists() {
            return Ok(Vec::new());
        }

        let mut profiles = Vec::new();
        let entries = fs::read_dir(&self.profiles_dir).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to read profiles directory: {e}"))
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                SigningError::ConfigurationError(format!("Failed to read directory entry: {e}"))
            })?;
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
            {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    profiles.push(stem.to_string());
                }
            }
        }

        profiles.sort();
        Ok(profiles)
    }

    /// Save a configuration profile
    pub fn save_profile(&self, profile: &ConfigProfile) -> SigningResult<()> {
        SignerAlias::new(&profile.name).map_err(|_| {
            SigningError::ConfigurationError(format!("Invalid profile name: {}", profile.name))
        })?;
        profile.config.validate()?;
        fs::create_dir_all(&self.profiles_dir).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to create profiles directory: {e}"))
        })?;

        let profile_path = self.profiles_dir.join(format!("{}.toml", profile.name));
        let content = toml::to_string_pretty(profile).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to serialize profile: {e}"))
        })?;

        fs::write(&profile_path, content).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to write profile {}: {}",
                profile_path.display(),
                e
            ))
        })?;

        log::info!("Profile '{}' saved", profile.name);
        Ok(())
    }

    /// Load a configuration profile
    pub fn load_profile(&self, name: &str) -> SigningResult<ConfigProfile> {
        let profile_path = self.profiles_dir.join(format!("{name}.toml"));

        if !profile_path.exists() {
            return Err(SigningError::ConfigurationError(format!(
                "Profile '{name}' not found"
            )));
        }

        let content = fs::read_to_string(&profile_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to read profile {}: {}",
                profile_path.display(),
                e
            ))
        })?;

        let profile: ConfigProfile = toml::from_str(&content).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to parse profile: {e}"))
        })?;
        profile.config.validate()?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_configuration() {
        let config = SignerConfiguration::default();
        assert_eq!(config.default_alias, "sm2signer");
        assert_eq!(config.digest().unwrap(), DigestAlgorithm::Sm3);
        assert_eq!(config.policy().unwrap(), ChainPolicy::Lenient);
        assert!(config.verify_after_sign);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SignerConfiguration = toml::from_str("chain_policy = \"strict\"\n").unwrap();
        assert_eq!(config.policy().unwrap(), ChainPolicy::Strict);
        assert_eq!(config.default_alias, "sm2signer");
    }

    #[test]
    fn test_config_manager_with_temp_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");
        let manager = ConfigManager::with_path(&config_path);

        let config = manager.load_or_create_default().unwrap();
        assert!(config_path.exists());
        assert_eq!(manager.load().unwrap(), config);
    }

    #[test]
    fn test_update_value_validates() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));

        manager.update_value("digest_algorithm", "SHA-256").unwrap();
        manager.update_value("chain_policy", "strict").unwrap();
        let config = manager.load().unwrap();
        assert_eq!(config.digest().unwrap(), DigestAlgorithm::Sha256);
        assert_eq!(config.policy().unwrap(), ChainPolicy::Strict);

        assert!(manager.update_value("default_alias", "bad alias!").is_err());
        assert!(manager.update_value("chain_policy", "paranoid").is_err());
        assert!(manager.update_value("verbose", "maybe").is_err());
        assert!(manager.update_value("no_such_key", "1").is_err());
    }

    #[test]
    fn test_export_import_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let source = ConfigManager::with_path(temp_dir.path().join("a.toml"));
        source.update_value("default_alias", "release").unwrap();
        let target = ConfigManager::with_path(temp_dir.path().join("b.toml"));

        for format in [ExportFormat::Toml, ExportFormat::Json, ExportFormat::Yaml] {
            let exported = source.export_config(format).unwrap();
            target.import_config(&exported, format).unwrap();
            assert_eq!(target.load().unwrap().default_alias, "release");
        }
    }

    #[test]
    fn test_profiles() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ProfileManager::with_dir(temp_dir.path().join("profiles"));
        assert!(manager.list_profiles().unwrap().is_empty());

        let profile = ConfigProfile {
            name: "ci".to_string(),
            description: "Build server".to_string(),
            config: SignerConfiguration {
                chain_policy: "strict".to_string(),
                ..SignerConfiguration::default()
            },
        };
        manager.save_profile(&profile).unwrap();
        assert_eq!(manager.list_profiles().unwrap(), vec!["ci".to_string()]);
        let loaded = manager.load_profile("ci").unwrap();
        assert_eq!(loaded.config.policy().unwrap(), ChainPolicy::Strict);
        assert!(manager.load_profile("missing").is_err());
    }
}
