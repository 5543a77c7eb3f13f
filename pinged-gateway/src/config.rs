//! Configuration system for the Pinged gateway.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/pinged-gateway/config.toml`)
//! 4. Compiled defaults
//!
//! The JWT secret has no compiled default; starting without one is a
//! configuration error.

use std::path::PathBuf;

/// Errors that can occur when loading gateway configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// No JWT secret was provided by any configuration layer.
    #[error("no JWT secret configured (set --jwt-secret, PINGED_JWT_SECRET, or [auth] jwt_secret)")]
    MissingJwtSecret,
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure for the gateway.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct GatewayConfigFile {
    server: ServerFileConfig,
    auth: AuthFileConfig,
}

/// `[server]` section of the gateway config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    max_content_bytes: Option<usize>,
    store_timeout_secs: Option<u64>,
}

/// `[auth]` section of the gateway config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AuthFileConfig {
    jwt_secret: Option<String>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the gateway server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Pinged realtime gateway")]
pub struct GatewayCliArgs {
    /// Address to bind the gateway to.
    #[arg(short, long, env = "PINGED_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/pinged-gateway/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Shared secret for verifying session tokens.
    #[arg(long, env = "PINGED_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Maximum message content size in bytes.
    #[arg(long)]
    pub max_content_bytes: Option<usize>,

    /// Upper bound in seconds for a single store call.
    #[arg(long)]
    pub store_timeout_secs: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "PINGED_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:9100`).
    pub bind_addr: String,
    /// Shared secret for verifying session tokens.
    pub jwt_secret: String,
    /// Maximum message content size in bytes.
    pub max_content_bytes: usize,
    /// Upper bound in seconds for a single store call.
    pub store_timeout_secs: u64,
    /// Log level filter string.
    pub log_level: String,
}

impl GatewayConfig {
    /// Default bind address.
    pub const DEFAULT_BIND_ADDR: &'static str = "0.0.0.0:9100";
    /// Default maximum content size (64 KB).
    pub const DEFAULT_MAX_CONTENT_BYTES: usize = 64 * 1024;
    /// Default store call bound in seconds.
    pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 5;

    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or if no layer supplies a JWT secret.
    pub fn load(cli: &GatewayCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `GatewayConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &GatewayCliArgs, file: &GatewayConfigFile) -> Result<Self, ConfigError> {
        let jwt_secret = cli
            .jwt_secret
            .clone()
            .or_else(|| file.auth.jwt_secret.clone())
            .ok_or(ConfigError::MissingJwtSecret)?;

        Ok(Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or_else(|| Self::DEFAULT_BIND_ADDR.to_string()),
            jwt_secret,
            max_content_bytes: cli
                .max_content_bytes
                .or(file.server.max_content_bytes)
                .unwrap_or(Self::DEFAULT_MAX_CONTENT_BYTES),
            store_timeout_secs: cli
                .store_timeout_secs
                .or(file.server.store_timeout_secs)
                .unwrap_or(Self::DEFAULT_STORE_TIMEOUT_SECS),
            log_level: cli.log_level.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file for the gateway.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<GatewayConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(GatewayConfigFile::default());
        };
        config_dir.join("pinged-gateway").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GatewayConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
