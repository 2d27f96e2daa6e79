use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExchangeRateApiConfig {
    #[serde(default = "default_exchangerate_url")]
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PostgrestConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FileSourceConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    pub exchangerate_api: Option<ExchangeRateApiConfig>,
    pub postgrest: Option<PostgrestConfig>,
    pub file: Option<FileSourceConfig>,
}

/// Names of the two configuration tables in the table source.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub countries: String,
    pub accounts: String,
}

impl Default for TableNames {
    fn default() -> Self {
        TableNames {
            countries: "countries_config".to_string(),
            accounts: "accounts_config".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub tables: TableNames,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

fn default_base_currency() -> String {
    "EUR".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    600
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_exchangerate_url() -> String {
    "https://v6.exchangerate-api.com".to_string()
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fxclose", "fxclose")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config = Self::from_yaml(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.base_currency = config.base_currency.trim().to_uppercase();
        config.validate()?;
        Ok(config)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.base_currency.len() != 3
            || !self.base_currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            bail!(
                "base_currency must be a three letter code, got '{}'",
                self.base_currency
            );
        }
        if self.providers.postgrest.is_some() && self.providers.file.is_some() {
            bail!("Configure either providers.postgrest or providers.file, not both");
        }
        Ok(())
    }
}
