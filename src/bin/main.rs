//! SM2 JAR Signer CLI
//!
//! Signs JAR archives with SM2/SM3, verifies signed archives and manages
//! signer configuration and profiles.

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use sm2_jar_signer::{
    infra::config::{ConfigManager, ConfigProfile, ExportFormat, ProfileManager, SignerConfiguration},
    Certificate, ChainPolicy, DigestAlgorithm, KeyReference, Passphrase, SignOptions, SignerAlias,
    VerifyEngine, Sm2Verifier,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PASSPHRASE_ENV: &str = "SM2_KEY_PASSPHRASE";

#[derive(Parser)]
#[command(name = "sm2-jar-signer")]
#[command(about = "Sign and verify JAR archives with SM2/SM3")]
#[command(long_about = "
SM2 JAR Signer - detached SM2 signatures for JAR archives

EXAMPLES:
    # Sign in place with a PEM key and certificate chain
    sm2-jar-signer sign app.jar --key signer.key --chain chain.pem

    # Sign to a new file under a custom alias
    sm2-jar-signer sign app.jar -k signer.key -c chain.pem -a release -o app-signed.jar

    # Verify, treating chain problems as failures
    sm2-jar-signer verify app-signed.jar --strict --trusted-root root.pem

    # Create a configuration profile
    sm2-jar-signer config create-profile ci

ENVIRONMENT VARIABLES:
    SM2_KEY_PASSPHRASE     Passphrase for an encrypted PKCS#8 key
    SM2_JAR_SIGNER_CONFIG  Configuration file path
    RUST_LOG               Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "SM2_JAR_SIGNER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a JAR archive
    Sign {
        /// Archive to sign
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// PEM private key (PKCS#8, encrypted PKCS#8 or SEC1)
        #[arg(short, long, value_name = "PEM")]
        key: PathBuf,

        /// PEM certificate chain, leaf first
        #[arg(short, long, value_name = "PEM")]
        chain: PathBuf,

        /// Signer alias (overrides config)
        #[arg(short, long)]
        alias: Option<String>,

        /// Output archive (defaults to overwriting the input)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Entry digest algorithm (overrides config)
        #[arg(long, value_enum)]
        digest: Option<DigestArg>,

        /// Skip verifying the signed archive before writing it
        #[arg(long)]
        no_verify: bool,
    },

    /// Verify a signed JAR archive
    Verify {
        /// Archive to verify
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Treat certificate chain failures as hard failures
        #[arg(long)]
        strict: bool,

        /// PEM certificate every chain must lead to
        #[arg(long, value_name = "PEM")]
        trusted_root: Option<PathBuf>,

        /// Entry digest algorithm (overrides config)
        #[arg(long, value_enum)]
        digest: Option<DigestArg>,

        /// Print the full report
        #[arg(short, long)]
        verbose: bool,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Export configuration
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import configuration
    Import {
        /// Configuration file to import
        file: PathBuf,
        /// Import format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
    },

    /// Save the current configuration as a named profile
    CreateProfile {
        /// Profile name
        name: String,
        /// Profile description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List available profiles
    ListProfiles,

    /// Make a profile the current configuration
    LoadProfile {
        /// Profile name
        name: String,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum DigestArg {
    Sm3,
    Sha256,
}

impl From<DigestArg> for DigestAlgorithm {
    fn from(arg: DigestArg) -> Self {
        match arg {
            DigestArg::Sm3 => DigestAlgorithm::Sm3,
            DigestArg::Sha256 => DigestAlgorithm::Sha256,
        }
    }
}

#[derive(ValueEnum, Clone)]
enum ExportFormatArg {
    Toml,
    Json,
    Yaml,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Yaml => ExportFormat::Yaml,
        }
    }
}

/// Parameters for the sign command
struct SignCommandArgs {
    archive: PathBuf,
    key: PathBuf,
    chain: PathBuf,
    alias: Option<String>,
    output: Option<PathBuf>,
    digest: Option<DigestArg>,
    no_verify: bool,
}

/// Parameters for the verify command
struct VerifyCommandArgs {
    archive: PathBuf,
    strict: bool,
    trusted_root: Option<PathBuf>,
    digest: Option<DigestArg>,
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new().into_diagnostic()?,
    };

    match cli.command {
        Commands::Sign {
            archive,
            key,
            chain,
            alias,
            output,
            digest,
            no_verify,
        } => {
            let args = SignCommandArgs {
                archive,
                key,
                chain,
                alias,
                output,
                digest,
                no_verify,
            };
            handle_sign_command(&config_manager, args)?;
        }

        Commands::Verify {
            archive,
            strict,
            trusted_root,
            digest,
            verbose,
        } => {
            let args = VerifyCommandArgs {
                archive,
                strict,
                trusted_root,
                digest,
                verbose,
            };
            handle_verify_command(&config_manager, args)?;
        }

        Commands::Config(config_cmd) => {
            handle_config_command(&config_manager, config_cmd)?;
        }
    }

    Ok(())
}

fn handle_sign_command(config_manager: &ConfigManager, args: SignCommandArgs) -> Result<()> {
    let config = config_manager.load_or_default().into_diagnostic()?;

    let alias = match &args.alias {
        Some(alias) => SignerAlias::new(alias).into_diagnostic()?,
        None => config.signer_alias().into_diagnostic()?,
    };
    let digest_algorithm = match args.digest {
        Some(arg) => arg.into(),
        None => config.digest().into_diagnostic()?,
    };
    let options = SignOptions {
        alias,
        output: args.output,
        digest_algorithm,
        created_by: config.created_by.clone(),
        verify_after_sign: config.verify_after_sign && !args.no_verify,
    };

    let key_ref = KeyReference::new(&args.key, &args.chain).into_diagnostic()?;
    let passphrase = std::env::var(PASSPHRASE_ENV).ok().map(Passphrase::new);

    let outcome = sm2_jar_signer::sign_archive(&args.archive, &key_ref, passphrase.as_ref(), &options)
        .with_context(|| format!("Failed to sign {}", args.archive.display()))?;

    println!("✅ Archive signed successfully!");
    println!("  Output: {}", outcome.output.display());
    println!("  Alias: {}", outcome.alias);
    println!("  Digested entries: {}", outcome.digested_entries);
    println!("  Certificates in chain: {}", outcome.chain_length);
    println!("  Signature block: {}", outcome.block_path);
    if !outcome.stripped.is_empty() {
        println!("  Replaced previous signature entries:");
        for path in &outcome.stripped {
            println!("    - {path}");
        }
    }
    if config.verbose {
        if let Some(result) = &outcome.verification {
            println!("\n{result}");
        }
    }
    Ok(())
}

fn handle_verify_command(config_manager: &ConfigManager, args: VerifyCommandArgs) -> Result<()> {
    let config = config_manager.load_or_default().into_diagnostic()?;

    let policy = if args.strict {
        ChainPolicy::Strict
    } else {
        config.policy().into_diagnostic()?
    };
    let digest_algorithm = match args.digest {
        Some(arg) => arg.into(),
        None => config.digest().into_diagnostic()?,
    };

    let mut engine =
        VerifyEngine::new(digest_algorithm, Arc::new(Sm2Verifier::new())).with_policy(policy);
    if let Some(root_path) = args.trusted_root.as_ref().or(config.trusted_root.as_ref()) {
        engine = engine.with_trusted_root(load_trusted_root(root_path)?);
    }

    let result = engine
        .verify_file(&args.archive)
        .with_context(|| format!("Failed to verify {}", args.archive.display()))?;

    if args.verbose || config.verbose {
        println!("{result}");
    } else if result.valid {
        println!("✅ {}", result.message);
        if let Some(signer) = result.signer() {
            println!("  Signer: {}", signer.signer_subject());
        }
    } else {
        println!("❌ {}", result.message);
    }

    if !result.valid {
        std::process::exit(1);
    }
    Ok(())
}

fn load_trusted_root(path: &Path) -> Result<Certificate> {
    let pem = std::fs::read(path)
        .into_diagnostic()
        .with_context(|| format!("Failed to read trusted root {}", path.display()))?;
    let mut certs = Certificate::load_pem_chain(&pem).into_diagnostic()?;
    if certs.is_empty() {
        return Err(miette::miette!("No certificate found in {}", path.display()));
    }
    Ok(certs.remove(0))
}

fn handle_config_command(config_manager: &ConfigManager, config_cmd: ConfigCommands) -> Result<()> {
    match config_cmd {
        ConfigCommands::Show => match config_manager.load() {
            Ok(config) => print_config(&config, config_manager.config_path()),
            Err(_) => {
                println!("📋 No configuration file found. Use 'config init' to create one.");
            }
        },

        ConfigCommands::Init => {
            let _config = config_manager.load_or_create_default().into_diagnostic()?;
            println!(
                "✅ Configuration initialized: {}",
                config_manager.config_path().display()
            );
            println!("   Edit the file to customize settings, or use 'config set' commands.");
        }

        ConfigCommands::Set { key, value } => {
            config_manager
                .update_value(&key, &value)
                .into_diagnostic()?;
            println!("✅ Configuration updated: {key} = {value}");
        }

        ConfigCommands::Export { format, output } => {
            let content = config_manager
                .export_config(format.into())
                .into_diagnostic()?;

            if let Some(output_path) = output {
                std::fs::write(&output_path, content).into_diagnostic()?;
                println!("✅ Configuration exported to: {}", output_path.display());
            } else {
                println!("{content}");
            }
        }

        ConfigCommands::Import { file, format } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            config_manager
                .import_config(&content, format.into())
                .into_diagnostic()?;
            println!("✅ Configuration imported from: {}", file.display());
        }

        ConfigCommands::CreateProfile { name, description } => {
            let profile = ConfigProfile {
                description: description.unwrap_or_else(|| format!("Profile {name}")),
                name,
                config: config_manager.load_or_default().into_diagnostic()?,
            };
            ProfileManager::new()
                .into_diagnostic()?
                .save_profile(&profile)
                .into_diagnostic()?;
            println!("✅ Profile '{}' created", profile.name);
        }

        ConfigCommands::ListProfiles => {
            let profiles = ProfileManager::new().into_diagnostic()?.list_profiles().into_diagnostic()?;
            if profiles.is_empty() {
                println!("📁 No profiles found");
            } else {
                println!("📁 Profiles:");
                for name in profiles {
                    println!("  - {name}");
                }
            }
        }

        ConfigCommands::LoadProfile { name } => {
            let profile = ProfileManager::new()
                .into_diagnostic()?
                .load_profile(&name)
                .into_diagnostic()?;
            config_manager.save(&profile.config).into_diagnostic()?;
            println!("✅ Profile '{name}' loaded: {}", profile.description);
        }
    }

    Ok(())
}

fn print_config(config: &SignerConfiguration, path: &Path) {
    println!("📋 Current Configuration:");
    println!("  Default alias: {}", config.default_alias);
    println!("  Digest algorithm: {}", config.digest_algorithm);
    println!("  Created-By: {}", config.created_by);
    println!("  Chain policy: {}", config.chain_policy);
    match &config.trusted_root {
        Some(root) => println!("  Trusted root: {}", root.display()),
        None => println!("  Trusted root: (none)"),
    }
    println!("  Verify after sign: {}", config.verify_after_sign);
    println!("  Verbose: {}", config.verbose);
    println!("  Configuration file: {}", path.display());
}
