use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Bitbucket Cloud REST API v2 base URL.
pub const DEFAULT_API_BASE: &str = "https://api.bitbucket.org/2.0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .bitbucket-mcp.toml.
///
/// All fields are optional; the server starts with zero config and picks
/// credentials up from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bitbucket: BitbucketConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BitbucketConfig {
    /// Account email used as the Basic-auth identity.
    /// If None, falls back to the BITBUCKET_EMAIL env var.
    pub email: Option<String>,

    /// API token (app password). If None, falls back to BITBUCKET_TOKEN.
    pub token: Option<String>,

    /// API base URL override, mainly for pointing tests at a mock server.
    pub api_base: Option<String>,
}

impl Config {
    /// Load configuration from .bitbucket-mcp.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(".bitbucket-mcp.toml");
        let config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };

        Ok(config)
    }

    /// Load from a specific path (useful for testing and --config).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the account email: config file value takes precedence,
    /// falls back to the BITBUCKET_EMAIL env var.
    pub fn email(&self) -> Option<String> {
        self.bitbucket
            .email
            .clone()
            .or_else(|| std::env::var("BITBUCKET_EMAIL").ok())
    }

    /// Resolve the API token: config file value takes precedence,
    /// falls back to the BITBUCKET_TOKEN env var.
    pub fn token(&self) -> Option<String> {
        self.bitbucket
            .token
            .clone()
            .or_else(|| std::env::var("BITBUCKET_TOKEN").ok())
    }

    /// Resolve the API base URL, defaulting to Bitbucket Cloud.
    pub fn api_base(&self) -> String {
        self.bitbucket
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
    }
}
