use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "smartbuy.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Everything a run needs: where to look, what to look for and who to tell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Deals page to check.
    pub url: String,
    /// Sender mailbox, also the account the OAuth consent is given for.
    pub from: String,
    /// Recipient of the alert.
    pub to: String,
    /// Product keywords, matched case-insensitively.
    pub products: Vec<String>,
    #[serde(default = "default_token_cache")]
    pub token_cache: PathBuf,
    #[serde(default = "default_client_secrets")]
    pub client_secrets: PathBuf,
    #[serde(default = "default_error_log")]
    pub error_log: PathBuf,
}

fn default_token_cache() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_client_secrets() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_error_log() -> PathBuf {
    PathBuf::from("errors.log")
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        url::Url::parse(&self.url)
            .map_err(|e| ConfigError::Invalid(format!("url '{}': {e}", self.url)))?;
        if self.products.is_empty() {
            return Err(ConfigError::Invalid(
                "products must list at least one keyword".to_string(),
            ));
        }
        if self.products.iter().any(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "products must not contain blank keywords".to_string(),
            ));
        }
        for (field, address) in [("from", &self.from), ("to", &self.to)] {
            if !address.contains('@') {
                return Err(ConfigError::Invalid(format!(
                    "{field} is not a mail address: '{address}'"
                )));
            }
        }
        Ok(self)
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validate()
    }
}
